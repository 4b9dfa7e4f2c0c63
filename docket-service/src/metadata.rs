//! Document metadata derivation.
//!
//! Metadata comes from up to three sources, in order of precedence:
//! the LLM (or the filename heuristic when no LLM is configured), regex
//! signals over the document text, and values derived from other fields
//! (practice area from category, jurisdiction from court).

pub mod legal_patterns;
pub mod prompt;
pub mod validation;

use chrono::NaiveDate;
use std::collections::BTreeMap;
use tracing::debug;

use crate::config::MetadataConfig;
use crate::db::{DocCategory, DocType, Document};
use crate::error::LlmError;
use crate::llm::LlmProvider;
use legal_patterns::{LegalSignals, jurisdiction_for_court};

/// Confidence assigned to every heuristic field
const HEURISTIC_CONFIDENCE: f64 = 0.1;

/// Metadata fields from one source. `None` means the source had nothing.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PartialMetadata {
    pub title: Option<String>,
    pub authors: Option<Vec<String>>,
    pub publication_date: Option<NaiveDate>,
    pub doc_type: Option<DocType>,
    pub doc_category: Option<DocCategory>,
    pub description: Option<String>,
    pub keywords: Option<Vec<String>>,
    pub citation: Option<String>,
    pub case_name: Option<String>,
    pub court: Option<String>,
    pub jurisdiction: Option<String>,
    pub practice_area: Option<String>,
    pub document_date: Option<NaiveDate>,
    pub confidence_scores: BTreeMap<String, f64>,
}

impl PartialMetadata {
    /// Fill fields missing here from a lower-precedence source
    pub fn merge_missing(self, other: PartialMetadata) -> Self {
        let mut confidence_scores = other.confidence_scores;
        confidence_scores.extend(self.confidence_scores);

        Self {
            title: self.title.or(other.title),
            authors: self.authors.or(other.authors),
            publication_date: self.publication_date.or(other.publication_date),
            doc_type: self.doc_type.or(other.doc_type),
            doc_category: self.doc_category.or(other.doc_category),
            description: self.description.or(other.description),
            keywords: self.keywords.or(other.keywords),
            citation: self.citation.or(other.citation),
            case_name: self.case_name.or(other.case_name),
            court: self.court.or(other.court),
            jurisdiction: self.jurisdiction.or(other.jurisdiction),
            practice_area: self.practice_area.or(other.practice_area),
            document_date: self.document_date.or(other.document_date),
            confidence_scores,
        }
    }

    /// Fill practice area and jurisdiction from category and court
    pub fn with_derived_fields(mut self) -> Self {
        if self.practice_area.is_none() {
            self.practice_area = self
                .doc_category
                .and_then(|c| c.practice_area())
                .map(str::to_string);
        }
        if self.jurisdiction.is_none() {
            self.jurisdiction = self.court.as_deref().and_then(jurisdiction_for_court);
        }
        self
    }

    /// Mean of the per-field confidence scores
    pub fn mean_confidence(&self) -> Option<f64> {
        if self.confidence_scores.is_empty() {
            return None;
        }
        let total: f64 = self.confidence_scores.values().sum();
        Some(total / self.confidence_scores.len() as f64)
    }

    /// Write supplied fields onto a document, leaving the rest untouched
    pub fn apply_to(self, doc: &mut Document) {
        doc.confidence_score = self.mean_confidence().or(doc.confidence_score);
        if let Some(title) = self.title {
            doc.title = title;
        }
        if let Some(authors) = self.authors {
            doc.authors = authors;
        }
        if let Some(keywords) = self.keywords {
            doc.keywords = keywords;
        }
        if let Some(doc_type) = self.doc_type {
            doc.doc_type = doc_type;
        }
        if let Some(doc_category) = self.doc_category {
            doc.doc_category = doc_category;
        }
        doc.publication_date = self.publication_date.or(doc.publication_date);
        doc.description = self.description.or(doc.description.take());
        doc.citation = self.citation.or(doc.citation.take());
        doc.case_name = self.case_name.or(doc.case_name.take());
        doc.court = self.court.or(doc.court.take());
        doc.jurisdiction = self.jurisdiction.or(doc.jurisdiction.take());
        doc.practice_area = self.practice_area.or(doc.practice_area.take());
        doc.document_date = self.document_date.or(doc.document_date);
        if !self.confidence_scores.is_empty() {
            doc.confidence_scores = self.confidence_scores;
        }
    }
}

/// Metadata guessed from the filename alone
pub fn heuristic_metadata(filename: &str) -> PartialMetadata {
    let stem = filename
        .rsplit_once('.')
        .map(|(stem, _)| stem)
        .unwrap_or(filename);
    let title = stem
        .replace(['_', '-'], " ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ");

    let lower = title.to_lowercase();
    let words: Vec<&str> = lower.split_whitespace().collect();
    let has = |candidates: &[&str]| words.iter().any(|w| candidates.contains(w));

    let doc_type = if has(&["v", "v.", "vs", "vs."]) {
        DocType::CaseLaw
    } else if has(&["statute", "statutes", "code"]) {
        DocType::Statute
    } else if has(&["report"]) {
        DocType::ExpertReport
    } else {
        DocType::Other
    };

    let confidence_scores = ["title", "authors", "date", "type", "category"]
        .into_iter()
        .map(|field| (field.to_string(), HEURISTIC_CONFIDENCE))
        .collect();

    PartialMetadata {
        title: (!title.is_empty()).then_some(title),
        doc_type: Some(doc_type),
        doc_category: Some(DocCategory::Other),
        confidence_scores,
        ..PartialMetadata::default()
    }
}

/// Result of metadata analysis
#[derive(Debug, Clone)]
pub struct AnalyzedMetadata {
    pub metadata: PartialMetadata,
    pub signals: LegalSignals,
    /// Provider name, or `heuristic`
    pub source: &'static str,
}

impl AnalyzedMetadata {
    /// Write merged metadata and regex signals onto the document
    pub fn apply_to(self, doc: &mut Document) {
        doc.legal_signals = if self.signals.is_empty() {
            None
        } else {
            serde_json::to_value(&self.signals).ok()
        };
        self.metadata.apply_to(doc);
    }
}

/// Derive metadata for a document's text.
///
/// Only the first `max_prompt_chars` characters are analyzed. Without an
/// LLM the filename heuristic stands in; an LLM failure is an error.
pub async fn analyze(
    llm: Option<&dyn LlmProvider>,
    text: &str,
    filename: &str,
    config: &MetadataConfig,
) -> Result<AnalyzedMetadata, LlmError> {
    let text = prompt::truncate_for_prompt(text, config.max_prompt_chars);
    let signals = legal_patterns::scan(&text);

    let (primary, source) = match llm {
        Some(llm) => {
            let request = prompt::build_prompt(&text, filename);
            let response = llm.extract(&request).await?;
            (validation::parse_llm_response(&response)?, llm.name())
        }
        None => (heuristic_metadata(filename), "heuristic"),
    };

    let metadata = primary
        .merge_missing(signals.to_partial())
        .with_derived_fields();

    debug!(
        source,
        case_names = signals.case_names.len(),
        courts = signals.courts.len(),
        "Metadata analyzed"
    );

    Ok(AnalyzedMetadata {
        metadata,
        signals,
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    struct FixedLlm(Result<&'static str, ()>);

    #[async_trait]
    impl LlmProvider for FixedLlm {
        fn name(&self) -> &'static str {
            "fixed"
        }

        async fn extract(&self, _prompt: &str) -> Result<String, LlmError> {
            self.0.map(str::to_string).map_err(|_| LlmError::Api {
                provider: "fixed",
                status: 503,
                message: "unavailable".to_string(),
            })
        }
    }

    fn placeholder() -> Document {
        Document::placeholder("smith_v_jones.pdf", "hash", "application/pdf", 10, "tester")
    }

    #[test]
    fn test_heuristic_metadata() {
        let meta = heuristic_metadata("Smith_v._Jones-2021.pdf");
        assert_eq!(meta.title.as_deref(), Some("Smith v. Jones 2021"));
        assert_eq!(meta.doc_type, Some(DocType::CaseLaw));
        assert_eq!(meta.mean_confidence(), Some(0.1));

        assert_eq!(heuristic_metadata("ohio_revised_code.txt").doc_type, Some(DocType::Statute));
        assert_eq!(
            heuristic_metadata("economist-report.docx").doc_type,
            Some(DocType::ExpertReport)
        );
        assert_eq!(heuristic_metadata("notes.md").doc_type, Some(DocType::Other));
    }

    #[test]
    fn test_merge_precedence() {
        let llm = PartialMetadata {
            title: Some("From LLM".to_string()),
            court: Some("District Court".to_string()),
            ..Default::default()
        };
        let regex = PartialMetadata {
            title: Some("From regex".to_string()),
            court: Some("Supreme Court of Ohio".to_string()),
            case_name: Some("A v. B".to_string()),
            ..Default::default()
        };
        let merged = llm.merge_missing(regex);
        assert_eq!(merged.title.as_deref(), Some("From LLM"));
        assert_eq!(merged.court.as_deref(), Some("District Court"));
        assert_eq!(merged.case_name.as_deref(), Some("A v. B"));
    }

    #[test]
    fn test_derived_fields() {
        let meta = PartialMetadata {
            doc_category: Some(DocCategory::WrongfulDeath),
            court: Some("Supreme Court of Texas".to_string()),
            ..Default::default()
        }
        .with_derived_fields();
        assert_eq!(meta.practice_area.as_deref(), Some("Wrongful Death"));
        assert_eq!(meta.jurisdiction.as_deref(), Some("Texas"));

        let explicit = PartialMetadata {
            doc_category: Some(DocCategory::Employment),
            practice_area: Some("Labor".to_string()),
            ..Default::default()
        }
        .with_derived_fields();
        assert_eq!(explicit.practice_area.as_deref(), Some("Labor"));
    }

    #[tokio::test]
    async fn test_analyze_with_llm_merges_signals() {
        let llm = FixedLlm(Ok(
            r#"{"title":"Smith v. Jones","doc_type":"case_law","doc_category":"PI",
                "authors":["Judge Roe"],"confidence_scores":{"title":0.8,"type":0.6}}"#,
        ));
        let text = "In Smith v. Jones, the Supreme Court of Ohio awarded $40,000 at 3% interest.";

        let analyzed = analyze(Some(&llm), text, "x.pdf", &MetadataConfig::default())
            .await
            .unwrap();
        assert_eq!(analyzed.source, "fixed");
        assert_eq!(analyzed.metadata.court.as_deref(), Some("Supreme Court of Ohio"));
        assert_eq!(analyzed.metadata.jurisdiction.as_deref(), Some("Ohio"));
        assert_eq!(analyzed.metadata.practice_area.as_deref(), Some("Personal Injury"));

        let mut doc = placeholder();
        analyzed.apply_to(&mut doc);
        assert_eq!(doc.title, "Smith v. Jones");
        assert_eq!(doc.doc_type, DocType::CaseLaw);
        assert_eq!(doc.authors, vec!["Judge Roe"]);
        assert!((doc.confidence_score.unwrap() - 0.7).abs() < 1e-9);
        let signals = doc.legal_signals.unwrap();
        assert_eq!(signals["dollar_amounts"][0], "$40,000");
        assert_eq!(signals["percentages"][0], 3.0);
    }

    #[tokio::test]
    async fn test_analyze_without_llm_uses_filename() {
        let analyzed = analyze(None, "plain body", "expert_report.pdf", &MetadataConfig::default())
            .await
            .unwrap();
        assert_eq!(analyzed.source, "heuristic");
        assert_eq!(analyzed.metadata.title.as_deref(), Some("expert report"));
        assert_eq!(analyzed.metadata.doc_type, Some(DocType::ExpertReport));

        let mut doc = placeholder();
        analyzed.apply_to(&mut doc);
        assert_eq!(doc.confidence_score, Some(0.1));
        assert!(doc.legal_signals.is_none());
    }

    #[tokio::test]
    async fn test_analyze_errors() {
        let bad_json = FixedLlm(Ok("I could not read the document."));
        assert!(matches!(
            analyze(Some(&bad_json), "text", "a.txt", &MetadataConfig::default()).await,
            Err(LlmError::InvalidJson { .. })
        ));

        let down = FixedLlm(Err(()));
        assert!(matches!(
            analyze(Some(&down), "text", "a.txt", &MetadataConfig::default()).await,
            Err(LlmError::Api { status: 503, .. })
        ));
    }
}
