//! Document ingestion: upload validation, hashing, text extraction and
//! chunking.

pub mod chunking;
#[cfg(feature = "docx")]
pub mod docx;
pub mod hash;
#[cfg(feature = "pdf")]
pub mod pdf;
pub mod text;
pub mod validation;

pub use chunking::{TextChunk, TextChunker};
pub use hash::compute_content_hash;
pub use validation::{ValidatedUpload, storage_path, validate_upload};

use crate::config::DOCX_MIME;
use crate::error::ProcessingError;

/// Words assumed per page when the format has no page concept
const WORDS_PER_PAGE: u64 = 500;

/// Text pulled out of an uploaded file
#[derive(Debug, Clone)]
pub struct ExtractedText {
    pub text: String,
    pub page_count: u32,
    pub word_count: u64,
    pub char_count: u64,
}

impl ExtractedText {
    fn new(text: String, page_count: Option<u32>) -> Self {
        let word_count = text.split_whitespace().count() as u64;
        let char_count = text.chars().count() as u64;
        Self {
            page_count: page_count.unwrap_or_else(|| estimate_page_count(word_count)),
            text,
            word_count,
            char_count,
        }
    }
}

fn estimate_page_count(word_count: u64) -> u32 {
    (word_count / WORDS_PER_PAGE).max(1) as u32
}

/// Extract text from raw file bytes, dispatching on MIME type.
///
/// This is CPU-bound; call it from a blocking task.
pub fn extract_text(
    bytes: &[u8],
    mime_type: &str,
    max_chars: usize,
) -> Result<ExtractedText, ProcessingError> {
    let extracted = match mime_type {
        "application/pdf" => extract_pdf(bytes)?,
        DOCX_MIME => extract_docx(bytes)?,
        "text/plain" | "text/markdown" => {
            ExtractedText::new(text::decode_text(bytes).into_owned(), None)
        }
        other => {
            return Err(ProcessingError::UnsupportedMimeType {
                mime: other.to_string(),
                detail: None,
            });
        }
    };

    if extracted.char_count as usize > max_chars {
        return Err(ProcessingError::TextTooLarge {
            chars: extracted.char_count as usize,
            max: max_chars,
        });
    }

    Ok(extracted)
}

#[cfg(feature = "pdf")]
fn extract_pdf(bytes: &[u8]) -> Result<ExtractedText, ProcessingError> {
    let (text, pages) = pdf::extract_pdf_text(bytes)?;
    Ok(ExtractedText::new(text, Some(pages)))
}

#[cfg(not(feature = "pdf"))]
fn extract_pdf(_bytes: &[u8]) -> Result<ExtractedText, ProcessingError> {
    Err(ProcessingError::UnsupportedMimeType {
        mime: "application/pdf".to_string(),
        detail: Some("built without PDF support".to_string()),
    })
}

#[cfg(feature = "docx")]
fn extract_docx(bytes: &[u8]) -> Result<ExtractedText, ProcessingError> {
    Ok(ExtractedText::new(docx::extract_docx_text(bytes)?, None))
}

#[cfg(not(feature = "docx"))]
fn extract_docx(_bytes: &[u8]) -> Result<ExtractedText, ProcessingError> {
    Err(ProcessingError::UnsupportedMimeType {
        mime: DOCX_MIME.to_string(),
        detail: Some("built without DOCX support".to_string()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_text_counts() {
        let extracted = extract_text(b"The court held for the plaintiff.", "text/plain", 1000).unwrap();
        assert_eq!(extracted.word_count, 6);
        assert_eq!(extracted.char_count, 33);
        assert_eq!(extracted.page_count, 1);
    }

    #[test]
    fn test_page_estimate() {
        assert_eq!(estimate_page_count(0), 1);
        assert_eq!(estimate_page_count(499), 1);
        assert_eq!(estimate_page_count(1500), 3);
    }

    #[test]
    fn test_markdown_latin1() {
        let extracted = extract_text(b"# R\xe9sum\xe9", "text/markdown", 1000).unwrap();
        assert_eq!(extracted.text, "# Résumé");
    }

    #[test]
    fn test_text_too_large_is_error() {
        let err = extract_text(&[b'a'; 20], "text/plain", 10).unwrap_err();
        assert!(matches!(err, ProcessingError::TextTooLarge { chars: 20, max: 10 }));
    }

    #[test]
    fn test_unsupported_mime() {
        let err = extract_text(b"x", "image/png", 10).unwrap_err();
        assert_eq!(err.to_string(), "Unsupported MIME type for extraction: image/png");
    }

    #[cfg(feature = "docx")]
    #[test]
    fn test_docx_dispatch() {
        let bytes = docx::tests::build_docx("<w:p><w:r><w:t>Expert report</w:t></w:r></w:p>");
        let extracted = extract_text(&bytes, DOCX_MIME, 1000).unwrap();
        assert_eq!(extracted.text, "Expert report");
        assert_eq!(extracted.word_count, 2);
    }
}
