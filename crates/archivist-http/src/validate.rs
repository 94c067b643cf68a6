//! Upload validation: filename
//! sanitization and extension allowlisting, checked before any Document
//! row or blob write happens so a single bad file in a batch fails the
//! whole request cleanly.

use archivist_core::AppError;

const ALLOWED_EXTENSIONS: &[&str] = &["pdf", "jpg", "jpeg", "png", "txt", "docx"];

pub fn validate_filename(filename: &str) -> Result<(), AppError> {
    if filename.is_empty() {
        return Err(AppError::ValidationError("filename must not be empty".into()));
    }
    if filename.len() > 255 {
        return Err(AppError::ValidationError("filename must be at most 255 characters".into()));
    }
    if filename.contains('\0') {
        return Err(AppError::ValidationError("filename must not contain NUL bytes".into()));
    }
    if filename.contains("..") || filename.contains('/') || filename.contains('\\') {
        return Err(AppError::ValidationError("filename must not contain path separators or '..'".into()));
    }
    Ok(())
}

pub fn extension_of(filename: &str) -> String {
    std::path::Path::new(filename)
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_lowercase()
}

pub fn validate_extension(filename: &str) -> Result<(), AppError> {
    let ext = extension_of(filename);
    if ALLOWED_EXTENSIONS.contains(&ext.as_str()) {
        Ok(())
    } else {
        Err(AppError::ValidationError(format!("unsupported file extension: {ext}")))
    }
}

pub fn validate_size(size: u64, max_bytes: u64) -> Result<(), AppError> {
    if size > max_bytes {
        Err(AppError::PayloadTooLarge(format!("file size {size} exceeds limit of {max_bytes} bytes")))
    } else {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_path_traversal() {
        assert!(validate_filename("../../etc/passwd").is_err());
    }

    #[test]
    fn rejects_empty_and_nul() {
        assert!(validate_filename("").is_err());
        assert!(validate_filename("a\0b").is_err());
    }

    #[test]
    fn accepts_plain_filename() {
        assert!(validate_filename("report.pdf").is_ok());
    }

    #[test]
    fn rejects_disallowed_extension() {
        assert!(validate_extension("script.sh").is_err());
        assert!(validate_extension("report.pdf").is_ok());
        assert!(validate_extension("scan.JPG").is_ok());
    }

    #[test]
    fn enforces_size_limit() {
        assert!(validate_size(100, 100).is_ok());
        assert!(validate_size(101, 100).is_err());
    }
}
