//! PDF header detection.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use crate::error::OpenError;

/// PDF format information read from the file header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PdfFormat {
    /// PDF version (e.g., "1.7", "2.0")
    pub version: String,
}

impl std::fmt::Display for PdfFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "PDF {}", self.version)
    }
}

/// PDF magic bytes: %PDF-
const PDF_MAGIC: &[u8] = b"%PDF-";
const PDF_MAGIC_LEN: usize = 5;
const VERSION_LEN: usize = 3; // e.g., "1.7"

/// Many producers put junk before the header; readers accept it within the
/// first kilobyte.
const HEADER_SEARCH_LEN: usize = 1024;

/// Detect the PDF format from a file path.
pub fn detect_format_from_path<P: AsRef<Path>>(path: P) -> Result<PdfFormat, OpenError> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|e| open_error(path, e))?;
    let mut header = Vec::with_capacity(HEADER_SEARCH_LEN);
    file.take(HEADER_SEARCH_LEN as u64)
        .read_to_end(&mut header)
        .map_err(|e| open_error(path, e))?;
    detect_format_from_bytes(&header)
}

/// Detect the PDF format from the leading bytes of a file.
pub fn detect_format_from_bytes(data: &[u8]) -> Result<PdfFormat, OpenError> {
    let window = &data[..data.len().min(HEADER_SEARCH_LEN)];
    let start = window
        .windows(PDF_MAGIC_LEN)
        .position(|w| w == PDF_MAGIC)
        .ok_or(OpenError::NotPdf)?;

    let version_bytes = data
        .get(start + PDF_MAGIC_LEN..start + PDF_MAGIC_LEN + VERSION_LEN)
        .ok_or(OpenError::NotPdf)?;
    let version = String::from_utf8_lossy(version_bytes).to_string();

    if !is_valid_version(&version) {
        return Err(OpenError::UnsupportedVersion(version));
    }

    Ok(PdfFormat { version })
}

/// Map an I/O failure on the source to the matching open error.
pub(crate) fn open_error(path: &Path, err: std::io::Error) -> OpenError {
    if err.kind() == std::io::ErrorKind::NotFound {
        OpenError::NotFound(path.to_path_buf())
    } else {
        OpenError::Unreadable {
            path: path.to_path_buf(),
            source: err,
        }
    }
}

/// Check if a version string looks like `d.d`.
fn is_valid_version(version: &str) -> bool {
    let bytes = version.as_bytes();
    bytes.len() == 3 && bytes[0].is_ascii_digit() && bytes[1] == b'.' && bytes[2].is_ascii_digit()
}

/// Check if bytes start like a PDF file.
pub fn is_pdf_bytes(data: &[u8]) -> bool {
    detect_format_from_bytes(data).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_valid_pdf() {
        let data = b"%PDF-1.7\n%\xe2\xe3\xcf\xd3";
        let format = detect_format_from_bytes(data).unwrap();
        assert_eq!(format.version, "1.7");
        assert_eq!(format.to_string(), "PDF 1.7");
    }

    #[test]
    fn test_detect_leading_garbage() {
        let data = b"\x00\x00junk%PDF-1.4\n";
        assert_eq!(detect_format_from_bytes(data).unwrap().version, "1.4");
    }

    #[test]
    fn test_detect_invalid_format() {
        let result = detect_format_from_bytes(b"<!DOCTYPE html>");
        assert!(matches!(result, Err(OpenError::NotPdf)));
    }

    #[test]
    fn test_detect_too_short() {
        assert!(matches!(
            detect_format_from_bytes(b"%PDF"),
            Err(OpenError::NotPdf)
        ));
        assert!(matches!(
            detect_format_from_bytes(b"%PDF-1"),
            Err(OpenError::NotPdf)
        ));
    }

    #[test]
    fn test_detect_bad_version() {
        assert!(matches!(
            detect_format_from_bytes(b"%PDF-x.y\n"),
            Err(OpenError::UnsupportedVersion(_))
        ));
    }

    #[test]
    fn test_missing_file() {
        let result = detect_format_from_path("/definitely/not/here.pdf");
        assert!(matches!(result, Err(OpenError::NotFound(_))));
    }

    #[test]
    fn test_is_pdf_bytes() {
        assert!(is_pdf_bytes(b"%PDF-1.4\n"));
        assert!(!is_pdf_bytes(b"Not a PDF"));
        assert!(!is_pdf_bytes(b""));
    }
}
