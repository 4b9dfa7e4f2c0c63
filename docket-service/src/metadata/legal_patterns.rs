//! Regex signals for legal documents.
//!
//! These run alongside the LLM and only fill fields it left empty.

use chrono::NaiveDate;
use regex::Regex;
use serde::Serialize;
use std::sync::LazyLock;

use super::PartialMetadata;

/// Cap on values kept per signal
const MAX_SIGNALS: usize = 20;

/// Plausible discount-rate range for percentages
const PERCENT_RANGE: std::ops::RangeInclusive<f64> = 0.0..=30.0;

static DOLLAR_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\$\s?\d+(?:,\d{3})*(?:\.\d+)?(?:\s+(?:thousand|million|billion)\b)?")
        .expect("valid dollar regex")
});

static PERCENT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(\d{1,3}(?:\.\d+)?)\s?(?:%|percent\b)").expect("valid percent regex")
});

static CASE_NAME_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"\b([A-Z][\w.'&-]*(?:\s+[A-Z][\w.'&-]*){0,4})\s+vs?\.\s+([A-Z][\w'&-]*(?:\s+[A-Z][\w'&-]*){0,4}\.?)",
    )
    .expect("valid case name regex")
});

static COURT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"\b(?:(?:United States|U\.S\.)\s+)?(?:Supreme Court|Court of Appeals?|District Court|Circuit Court|Superior Court|Bankruptcy Court|Tax Court|Court of Chancery)(?:\s+(?:of|for)\s+(?:the\s+)?[A-Z][A-Za-z]*(?:\s+[A-Z][A-Za-z]*){0,3})?|\b(?:First|Second|Third|Fourth|Fifth|Sixth|Seventh|Eighth|Ninth|Tenth|Eleventh|D\.C\.|Federal)\s+Circuit\b",
    )
    .expect("valid court regex")
});

static DATE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"\b(?:January|February|March|April|May|June|July|August|September|October|November|December)\s+\d{1,2},\s+\d{4}\b|\b\d{4}-\d{2}-\d{2}\b",
    )
    .expect("valid date regex")
});

static STATE_COURT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:Supreme Court|Court of Appeals?|Superior Court)\s+of\s+(?:the\s+State\s+of\s+)?([A-Z][A-Za-z]*(?:\s+[A-Z][A-Za-z]*)?)")
        .expect("valid state court regex")
});

/// Figures and references found in document text
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct LegalSignals {
    pub dollar_amounts: Vec<String>,
    pub percentages: Vec<f64>,
    pub case_names: Vec<String>,
    pub courts: Vec<String>,
    pub dates: Vec<String>,
}

impl LegalSignals {
    pub fn is_empty(&self) -> bool {
        self.dollar_amounts.is_empty()
            && self.percentages.is_empty()
            && self.case_names.is_empty()
            && self.courts.is_empty()
            && self.dates.is_empty()
    }

    /// Fields these signals can supply: first case name, first court and
    /// its jurisdiction, first parseable date.
    pub fn to_partial(&self) -> PartialMetadata {
        let court = self.courts.first().cloned();
        PartialMetadata {
            case_name: self.case_names.first().cloned(),
            jurisdiction: court.as_deref().and_then(jurisdiction_for_court),
            court,
            document_date: self.dates.iter().find_map(|d| parse_date(d)),
            ..PartialMetadata::default()
        }
    }
}

/// Scan text for legal signals
pub fn scan(text: &str) -> LegalSignals {
    LegalSignals {
        dollar_amounts: collect_unique(DOLLAR_RE.find_iter(text).map(|m| m.as_str().to_string())),
        percentages: PERCENT_RE
            .captures_iter(text)
            .filter_map(|c| c[1].parse::<f64>().ok())
            .filter(|p| PERCENT_RANGE.contains(p))
            .fold(Vec::new(), |mut acc, p| {
                if acc.len() < MAX_SIGNALS && !acc.contains(&p) {
                    acc.push(p);
                }
                acc
            }),
        case_names: collect_unique(CASE_NAME_RE.captures_iter(text).map(|c| {
            let defendant = c[2].trim_end_matches('.');
            format!("{} v. {}", &c[1], defendant)
        })),
        courts: collect_unique(COURT_RE.find_iter(text).map(|m| m.as_str().to_string())),
        dates: collect_unique(DATE_RE.find_iter(text).map(|m| m.as_str().to_string())),
    }
}

fn collect_unique(values: impl Iterator<Item = String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for value in values {
        if out.len() >= MAX_SIGNALS {
            break;
        }
        if !out.contains(&value) {
            out.push(value);
        }
    }
    out
}

/// Parse `Month D, YYYY` or ISO dates
pub fn parse_date(value: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(value, "%B %d, %Y"))
        .ok()
}

/// Jurisdiction implied by a court name
pub fn jurisdiction_for_court(court: &str) -> Option<String> {
    let federal = ["United States", "U.S.", "Federal", "Circuit", "Bankruptcy", "Tax Court"];
    let is_state_circuit_court = court.contains("Circuit Court");

    if !is_state_circuit_court && federal.iter().any(|marker| court.contains(marker)) {
        return Some("Federal".to_string());
    }
    if court.starts_with("United States") || court.starts_with("U.S.") {
        return Some("Federal".to_string());
    }

    STATE_COURT_RE
        .captures(court)
        .map(|c| c[1].to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    const OPINION: &str = "OPINION. Decided March 5, 2021. The Supreme Court of Ohio considered \
        Smith v. Jones Manufacturing. Plaintiff sought $1,250,000.50 in damages and $3 million \
        in lost wages, applying a 4.5% discount rate over 12 percent of 150% of earnings. \
        See also Doe v. Roe. Filed 2020-11-30.";

    #[test]
    fn test_scan_opinion() {
        let signals = scan(OPINION);
        assert_eq!(signals.dollar_amounts, vec!["$1,250,000.50", "$3 million"]);
        assert_eq!(signals.percentages, vec![4.5, 12.0]);
        assert_eq!(
            signals.case_names,
            vec!["Smith v. Jones Manufacturing", "Doe v. Roe"]
        );
        assert_eq!(signals.courts, vec!["Supreme Court of Ohio"]);
        assert_eq!(signals.dates, vec!["March 5, 2021", "2020-11-30"]);
    }

    #[test]
    fn test_to_partial() {
        let partial = scan(OPINION).to_partial();
        assert_eq!(partial.case_name.as_deref(), Some("Smith v. Jones Manufacturing"));
        assert_eq!(partial.court.as_deref(), Some("Supreme Court of Ohio"));
        assert_eq!(partial.jurisdiction.as_deref(), Some("Ohio"));
        assert_eq!(partial.document_date, NaiveDate::from_ymd_opt(2021, 3, 5));
        assert!(partial.title.is_none());
    }

    #[test]
    fn test_empty_text() {
        let signals = scan("nothing of note here");
        assert!(signals.is_empty());
        assert_eq!(signals.to_partial(), PartialMetadata::default());
    }

    #[test]
    fn test_federal_courts() {
        let signals = scan("Appeal from the United States District Court for the Southern District, then the Ninth Circuit.");
        assert_eq!(
            signals.courts,
            vec![
                "United States District Court for the Southern District",
                "Ninth Circuit"
            ]
        );
        assert_eq!(jurisdiction_for_court("Ninth Circuit").as_deref(), Some("Federal"));
        assert_eq!(
            jurisdiction_for_court("Supreme Court of the United States").as_deref(),
            Some("Federal")
        );
        assert_eq!(
            jurisdiction_for_court("Superior Court of New Jersey").as_deref(),
            Some("New Jersey")
        );
        assert_eq!(jurisdiction_for_court("Circuit Court"), None);
    }

    #[test]
    fn test_parse_date() {
        assert_eq!(parse_date("2021-03-05"), NaiveDate::from_ymd_opt(2021, 3, 5));
        assert_eq!(parse_date("December 31, 1999"), NaiveDate::from_ymd_opt(1999, 12, 31));
        assert_eq!(parse_date("2021-13-40"), None);
    }
}
