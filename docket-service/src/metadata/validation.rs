//! LLM response parsing and coercion.

use chrono::NaiveDate;
use serde_json::{Map, Value};
use std::collections::BTreeMap;

use super::PartialMetadata;
use crate::db::{DocCategory, DocType};
use crate::error::LlmError;

/// Strip a surrounding markdown code fence, if any
pub fn strip_code_fences(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Drop the info string (e.g. "json") on the opening fence line
    let body = rest.split_once('\n').map(|(_, body)| body).unwrap_or("");
    body.trim_end().strip_suffix("```").unwrap_or(body).trim()
}

/// Parse and coerce an LLM metadata response.
///
/// Unknown doc types and categories become `other`/`Other`, non-list
/// authors and keywords become empty lists and malformed dates are dropped.
pub fn parse_llm_response(raw: &str) -> Result<PartialMetadata, LlmError> {
    let value: Value =
        serde_json::from_str(strip_code_fences(raw)).map_err(|e| LlmError::InvalidJson {
            message: e.to_string(),
        })?;

    let Value::Object(fields) = value else {
        return Err(LlmError::InvalidJson {
            message: "expected a JSON object".to_string(),
        });
    };

    Ok(PartialMetadata {
        title: string_field(&fields, "title"),
        authors: list_field(&fields, "authors"),
        publication_date: date_field(&fields, "publication_date"),
        doc_type: fields
            .get("doc_type")
            .filter(|v| !v.is_null())
            .map(|v| DocType::from_db(v.as_str().unwrap_or_default())),
        doc_category: fields
            .get("doc_category")
            .filter(|v| !v.is_null())
            .map(|v| DocCategory::from_db(v.as_str().unwrap_or_default())),
        description: string_field(&fields, "description"),
        keywords: list_field(&fields, "keywords"),
        citation: string_field(&fields, "citation")
            .or_else(|| string_field(&fields, "bluebook_citation")),
        case_name: string_field(&fields, "case_name"),
        court: string_field(&fields, "court"),
        jurisdiction: string_field(&fields, "jurisdiction"),
        practice_area: string_field(&fields, "practice_area"),
        document_date: None,
        confidence_scores: confidence_field(&fields),
    })
}

/// Non-empty trimmed string; "null" strings count as absent
fn string_field(fields: &Map<String, Value>, key: &str) -> Option<String> {
    fields
        .get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty() && !s.eq_ignore_ascii_case("null"))
        .map(str::to_string)
}

fn list_field(fields: &Map<String, Value>, key: &str) -> Option<Vec<String>> {
    let value = fields.get(key)?;
    let items = match value {
        Value::Array(items) => items
            .iter()
            .filter_map(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect(),
        _ => Vec::new(),
    };
    Some(items)
}

fn date_field(fields: &Map<String, Value>, key: &str) -> Option<NaiveDate> {
    let value = string_field(fields, key)?;
    // Accept full timestamps by their date prefix
    let date = value.get(..10).unwrap_or(&value);
    NaiveDate::parse_from_str(date, "%Y-%m-%d").ok()
}

/// Numeric scores clamped to [0, 1], keyed without a `_confidence` suffix
fn confidence_field(fields: &Map<String, Value>) -> BTreeMap<String, f64> {
    let Some(Value::Object(scores)) = fields.get("confidence_scores") else {
        return BTreeMap::new();
    };
    scores
        .iter()
        .filter_map(|(key, value)| {
            let score = value.as_f64()?;
            let key = key.strip_suffix("_confidence").unwrap_or(key);
            Some((key.to_string(), score.clamp(0.0, 1.0)))
        })
        .collect()
}
