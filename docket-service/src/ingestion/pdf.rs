//! PDF text extraction via PDFium (dynamically linked).

use pdfium_render::prelude::*;
use tracing::{debug, warn};

use crate::error::ProcessingError;

/// Bind to libpdfium.
///
/// Searches the current directory, then `vendor/pdfium/lib/`, then the system
/// library paths. A missing library degrades to an unsupported-type error.
fn create_pdfium() -> Result<Pdfium, ProcessingError> {
    let bindings = Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path("./"))
        .or_else(|_| {
            Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path(
                "./vendor/pdfium/lib/",
            ))
        })
        .or_else(|_| Pdfium::bind_to_system_library())
        .map_err(|e| ProcessingError::UnsupportedMimeType {
            mime: "application/pdf".to_string(),
            detail: Some(format!("PDFium library not available: {:?}", e)),
        })?;

    Ok(Pdfium::new(bindings))
}

/// Extract text page by page. Returns the joined text and the page count.
pub fn extract_pdf_text(bytes: &[u8]) -> Result<(String, u32), ProcessingError> {
    let pdfium = create_pdfium()?;

    let document = pdfium
        .load_pdf_from_byte_slice(bytes, None)
        .map_err(|e| ProcessingError::Pdf {
            message: format!("Failed to load PDF: {:?}", e),
        })?;

    let page_count = document.pages().len() as u32;
    debug!(pages = page_count, "Extracting PDF text");

    let mut pages = Vec::new();
    for (index, page) in document.pages().iter().enumerate() {
        let text = page.text().map_err(|e| {
            warn!(page = index + 1, error = ?e, "Failed to get text object for page");
            ProcessingError::Pdf {
                message: format!("Failed to extract text from page {}: {:?}", index + 1, e),
            }
        })?;

        let page_text = text.all();
        let page_text = page_text.trim();
        if !page_text.is_empty() {
            pages.push(page_text.to_string());
        }
    }

    Ok((pages.join("\n\n"), page_count))
}
