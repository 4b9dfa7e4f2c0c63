//! DOCX text extraction: paragraphs from `word/document.xml`.

use quick_xml::Reader;
use quick_xml::events::Event;
use std::io::{Cursor, Read};

use crate::error::ProcessingError;

/// Extract non-empty paragraphs joined by blank lines
pub fn extract_docx_text(bytes: &[u8]) -> Result<String, ProcessingError> {
    let mut archive = zip::ZipArchive::new(Cursor::new(bytes)).map_err(|e| ProcessingError::Docx {
        message: format!("Failed to open DOCX: {}", e),
    })?;

    let mut document_xml = archive
        .by_name("word/document.xml")
        .map_err(|e| ProcessingError::Docx {
            message: format!("Failed to find document.xml: {}", e),
        })?;

    let mut xml = String::new();
    document_xml
        .read_to_string(&mut xml)
        .map_err(|e| ProcessingError::Docx {
            message: format!("Failed to read document.xml: {}", e),
        })?;

    let paragraphs = parse_paragraphs(&xml)?;
    Ok(paragraphs.join("\n\n"))
}

fn parse_paragraphs(xml: &str) -> Result<Vec<String>, ProcessingError> {
    let mut reader = Reader::from_str(xml);

    let mut paragraphs = Vec::new();
    let mut current = String::new();
    let mut in_text = false;

    loop {
        match reader.read_event() {
            Ok(Event::Start(ref e)) => match e.local_name().as_ref() {
                b"t" => in_text = true,
                b"p" => current.clear(),
                _ => {}
            },
            Ok(Event::Empty(ref e)) => match e.local_name().as_ref() {
                b"tab" => current.push('\t'),
                b"br" => current.push('\n'),
                _ => {}
            },
            Ok(Event::End(ref e)) => match e.local_name().as_ref() {
                b"t" => in_text = false,
                b"p" => {
                    let paragraph = current.trim();
                    if !paragraph.is_empty() {
                        paragraphs.push(paragraph.to_string());
                    }
                    current.clear();
                }
                _ => {}
            },
            Ok(Event::Text(e)) if in_text => {
                let decoded = e.unescape().map_err(|e| ProcessingError::Docx {
                    message: format!("XML text decoding error: {}", e),
                })?;
                current.push_str(&decoded);
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(ProcessingError::Docx {
                    message: format!("XML parsing error: {}", e),
                });
            }
            _ => {}
        }
    }

    Ok(paragraphs)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::io::Write;
    use zip::write::SimpleFileOptions;

    /// Build a minimal DOCX archive from a document body
    pub(crate) fn build_docx(body: &str) -> Vec<u8> {
        let xml = format!(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:body>{}</w:body></w:document>"#,
            body
        );
        let mut buffer = Cursor::new(Vec::new());
        {
            let mut zip = zip::ZipWriter::new(&mut buffer);
            zip.start_file("word/document.xml", SimpleFileOptions::default())
                .unwrap();
            zip.write_all(xml.as_bytes()).unwrap();
            zip.finish().unwrap();
        }
        buffer.into_inner()
    }

    #[test]
    fn test_extracts_paragraphs() {
        let docx = build_docx(
            "<w:p><w:r><w:t>Smith v. Jones</w:t></w:r></w:p>\
             <w:p></w:p>\
             <w:p><w:r><w:t xml:space=\"preserve\">Held: </w:t></w:r><w:r><w:t>affirmed &amp; remanded.</w:t></w:r></w:p>",
        );
        let text = extract_docx_text(&docx).unwrap();
        assert_eq!(text, "Smith v. Jones\n\nHeld: affirmed & remanded.");
    }

    #[test]
    fn test_rejects_non_zip() {
        assert!(matches!(
            extract_docx_text(b"not a zip"),
            Err(ProcessingError::Docx { .. })
        ));
    }

    #[test]
    fn test_missing_document_xml() {
        let mut buffer = Cursor::new(Vec::new());
        {
            let mut zip = zip::ZipWriter::new(&mut buffer);
            zip.start_file("other.xml", SimpleFileOptions::default())
                .unwrap();
            zip.write_all(b"<x/>").unwrap();
            zip.finish().unwrap();
        }
        let err = extract_docx_text(&buffer.into_inner()).unwrap_err();
        assert!(err.to_string().contains("document.xml"));
    }
}
