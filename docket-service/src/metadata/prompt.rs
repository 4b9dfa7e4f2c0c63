use std::borrow::Cow;

use crate::db::{DocCategory, DocType};

const TRUNCATION_MARKER: &str = "...[truncated]";

/// Keep at most `max_chars` characters of document text for the prompt
pub fn truncate_for_prompt(text: &str, max_chars: usize) -> Cow<'_, str> {
    match text.char_indices().nth(max_chars) {
        None => Cow::Borrowed(text),
        Some((cut, _)) => Cow::Owned(format!("{}{}", &text[..cut], TRUNCATION_MARKER)),
    }
}

/// Build the metadata extraction prompt
pub fn build_prompt(text: &str, filename: &str) -> String {
    let doc_types = DocType::ALL
        .iter()
        .map(|t| t.as_str())
        .collect::<Vec<_>>()
        .join(", ");
    let categories = DocCategory::ALL
        .iter()
        .map(|c| c.as_str())
        .collect::<Vec<_>>()
        .join(", ");

    format!(
        r#"Analyze this document and extract metadata in JSON format.

Document filename: {filename}
Document text:
{text}

Extract the following metadata:

1. title: Clear, descriptive title (derive from content if not stated)
2. authors: List of author names (empty list if none found)
3. publication_date: ISO date (YYYY-MM-DD) or null
4. doc_type: One of [{doc_types}]
   - book: Books, textbooks, reference materials
   - article: Academic papers, journal articles
   - statute: Laws, regulations, statutes
   - case_law: Court opinions, legal precedents
   - expert_report: Expert witness reports, professional analyses
   - other: Anything else
5. doc_category: One of [{categories}]
   - PI: Personal Injury
   - WD: Wrongful Death
   - EM: Employment
   - BV: Business Valuation
   - Other: Anything else
6. description: 2-3 sentence summary
7. keywords: 5-10 relevant keywords
8. citation: Bluebook citation for case_law or statute documents, otherwise null
9. case_name, court, jurisdiction: for legal documents, otherwise null
10. confidence_scores: confidence (0-1) for title, authors, date, type, category

Return ONLY a JSON object with this shape:

{{
  "title": "string",
  "authors": ["string"],
  "publication_date": "YYYY-MM-DD or null",
  "doc_type": "string",
  "doc_category": "string",
  "description": "string",
  "keywords": ["string"],
  "citation": "string or null",
  "case_name": "string or null",
  "court": "string or null",
  "jurisdiction": "string or null",
  "confidence_scores": {{
    "title": 0.0,
    "authors": 0.0,
    "date": 0.0,
    "type": 0.0,
    "category": 0.0
  }}
}}"#
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_for_prompt() {
        assert_eq!(truncate_for_prompt("short", 10), "short");
        assert_eq!(truncate_for_prompt("exactly10!", 10), "exactly10!");
        assert_eq!(truncate_for_prompt("§§§§§§", 3), "§§§...[truncated]");
    }

    #[test]
    fn test_prompt_lists_enums() {
        let prompt = build_prompt("Body", "brief.pdf");
        assert!(prompt.contains("Document filename: brief.pdf"));
        assert!(prompt.contains("book, article, statute, case_law, expert_report, other"));
        assert!(prompt.contains("PI, WD, EM, BV, Other"));
    }
}
