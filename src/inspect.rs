//! Structural inspection of finished files.
//!
//! Reparses generated bytes with `lopdf` and summarizes what a viewer
//! would see. Useful in tests and for callers that want to sanity-check
//! output without opening a viewer.

use std::path::Path;

use lopdf::{Document as LoDocument, Object as LoObject};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InspectErrorCode {
    ParseFailed,
    IoError,
}

impl InspectErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            InspectErrorCode::ParseFailed => "PARSE_FAILED",
            InspectErrorCode::IoError => "IO_ERROR",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InspectError {
    pub code: InspectErrorCode,
    pub message: String,
}

impl std::fmt::Display for InspectError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code.as_str(), self.message)
    }
}

impl std::error::Error for InspectError {}

/// What reparsing a file revealed.
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentReport {
    pub pdf_version: String,
    pub page_count: usize,
    pub object_count: usize,
    pub file_size_bytes: usize,
    /// `/BaseFont` names of every font object, sorted.
    pub font_names: Vec<String>,
    /// Number of image XObjects, soft masks included.
    pub image_count: usize,
}

pub fn inspect_bytes(bytes: &[u8]) -> Result<DocumentReport, InspectError> {
    let pdf = LoDocument::load_mem(bytes).map_err(|err| InspectError {
        code: InspectErrorCode::ParseFailed,
        message: err.to_string(),
    })?;

    let mut font_names = Vec::new();
    let mut image_count = 0;
    for object in pdf.objects.values() {
        let dict = match object {
            LoObject::Dictionary(d) => d,
            LoObject::Stream(s) => &s.dict,
            _ => continue,
        };
        match dict.get(b"Type") {
            Ok(LoObject::Name(name)) if name == b"Font" => {
                if let Ok(LoObject::Name(base)) = dict.get(b"BaseFont") {
                    font_names.push(String::from_utf8_lossy(base).into_owned());
                }
            }
            Ok(LoObject::Name(name)) if name == b"XObject" => {
                if let Ok(LoObject::Name(sub)) = dict.get(b"Subtype") {
                    if sub == b"Image" {
                        image_count += 1;
                    }
                }
            }
            _ => {}
        }
    }
    font_names.sort();

    Ok(DocumentReport {
        pdf_version: pdf.version.clone(),
        page_count: pdf.get_pages().len(),
        object_count: pdf.objects.len(),
        file_size_bytes: bytes.len(),
        font_names,
        image_count,
    })
}

pub fn inspect_path(path: &Path) -> Result<DocumentReport, InspectError> {
    let data = std::fs::read(path).map_err(|err| InspectError {
        code: InspectErrorCode::IoError,
        message: err.to_string(),
    })?;
    inspect_bytes(&data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::Document;
    use crate::layout::CellOptions;

    #[test]
    fn reports_pages_and_fonts() {
        let mut doc = Document::default();
        doc.add_page(None, None).unwrap();
        doc.set_font("helvetica", "B", 12.0).unwrap();
        doc.cell(0.0, 10.0, "inspected", CellOptions::default())
            .unwrap();
        doc.add_page(None, None).unwrap();
        doc.set_font("courier", "", 10.0).unwrap();
        doc.cell(0.0, 10.0, "more", CellOptions::default()).unwrap();
        let bytes = doc.output().unwrap();

        let report = inspect_bytes(&bytes).expect("inspect");
        assert_eq!(report.page_count, 2);
        assert_eq!(report.pdf_version, "1.3");
        assert_eq!(report.file_size_bytes, bytes.len());
        assert_eq!(
            report.font_names,
            vec!["Courier".to_string(), "Helvetica-Bold".to_string()]
        );
        assert_eq!(report.image_count, 0);
    }

    #[test]
    fn rejects_malformed_data() {
        let err = inspect_bytes(b"not a pdf").expect_err("invalid");
        assert_eq!(err.code, InspectErrorCode::ParseFailed);
    }

    #[test]
    fn path_io_error_for_missing_file() {
        let missing = std::env::temp_dir().join(format!(
            "platen_inspect_missing_{}.pdf",
            std::process::id()
        ));
        let err = inspect_path(&missing).expect_err("missing");
        assert_eq!(err.code, InspectErrorCode::IoError);
    }

    #[test]
    fn path_report_matches_bytes_report() {
        let mut doc = Document::default();
        let bytes = doc.output().unwrap();
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("one.pdf");
        std::fs::write(&path, &bytes).expect("write");

        let from_path = inspect_path(&path).expect("inspect path");
        let from_bytes = inspect_bytes(&bytes).expect("inspect bytes");
        assert_eq!(from_path, from_bytes);
    }
}
