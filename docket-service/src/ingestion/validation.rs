//! Upload validation.
//!
//! Runs before any state is created: filename safety, extension, size and
//! MIME type checks.

use crate::config::LimitsConfig;
use crate::error::ValidationError;

pub const MAX_FILENAME_LEN: usize = 255;

const FORBIDDEN_FILENAME_PARTS: [&str; 10] = ["..", "/", "\\", "<", ">", ":", "\"", "|", "?", "*"];

const ALLOWED_EXTENSIONS: [&str; 4] = [".pdf", ".txt", ".md", ".docx"];

/// Facts established by a successful validation
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedUpload {
    /// Lowercase extension including the dot
    pub extension: String,
    /// MIME essence, e.g. `text/plain`
    pub mime_type: String,
}

/// Validate one uploaded file against the configured limits
pub fn validate_upload(
    filename: &str,
    declared_mime: Option<&str>,
    size: u64,
    limits: &LimitsConfig,
) -> Result<ValidatedUpload, ValidationError> {
    validate_filename(filename)?;

    let extension = file_extension(filename);
    if !ALLOWED_EXTENSIONS.contains(&extension.as_str()) {
        return Err(ValidationError::UnsupportedExtension { extension });
    }

    if size == 0 {
        return Err(ValidationError::EmptyFile);
    }

    if size > limits.max_file_size_bytes {
        return Err(ValidationError::FileTooLarge {
            size_mb: size as f64 / (1024.0 * 1024.0),
            max_mb: limits.max_file_size_bytes / (1024 * 1024),
        });
    }

    let mime_type = resolve_mime_type(filename, declared_mime);
    if !limits.supported_mime_types.iter().any(|m| m == &mime_type) {
        return Err(ValidationError::UnsupportedMimeType { mime: mime_type });
    }

    Ok(ValidatedUpload {
        extension,
        mime_type,
    })
}

fn validate_filename(filename: &str) -> Result<(), ValidationError> {
    if filename.trim().is_empty() {
        return Err(ValidationError::EmptyFilename);
    }
    if filename.chars().count() > MAX_FILENAME_LEN {
        return Err(ValidationError::FilenameTooLong {
            max: MAX_FILENAME_LEN,
        });
    }
    if FORBIDDEN_FILENAME_PARTS
        .iter()
        .any(|part| filename.contains(part))
    {
        return Err(ValidationError::InvalidFilename {
            filename: filename.to_string(),
        });
    }
    Ok(())
}

/// Lowercase extension including the dot, or empty
pub fn file_extension(filename: &str) -> String {
    filename
        .rfind('.')
        .map(|i| filename[i..].to_lowercase())
        .unwrap_or_default()
}

/// Use the declared content type unless it is missing or generic, else guess
/// from the extension.
fn resolve_mime_type(filename: &str, declared: Option<&str>) -> String {
    let declared = declared
        .and_then(|d| d.parse::<mime::Mime>().ok())
        .filter(|m| *m != mime::APPLICATION_OCTET_STREAM);

    match declared {
        Some(m) => m.essence_str().to_string(),
        None => mime_guess::from_path(filename)
            .first()
            .map(|m| m.essence_str().to_string())
            .unwrap_or_else(|| mime::APPLICATION_OCTET_STREAM.to_string()),
    }
}

/// Blob path for a stored upload
pub fn storage_path(file_id: &str, extension: &str) -> String {
    format!("uploads/doc_{}{}", file_id, extension)
}
