//! Text extraction for binary document formats.
//!
//! The loader hands this module raw bytes plus the file extension; it
//! returns plain UTF-8 text. Plain-text formats never reach this module.

use std::io::Read;

/// Decompressed-size cap for a single ZIP entry (zip-bomb protection).
const MAX_XML_ENTRY_BYTES: u64 = 50 * 1024 * 1024;

/// Extraction failure for a single file. The loader logs and skips the
/// file; it is not fatal to the corpus.
#[derive(Debug)]
pub enum ExtractError {
    UnsupportedExtension(String),
    Pdf(String),
    Docx(String),
}

impl std::fmt::Display for ExtractError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExtractError::UnsupportedExtension(ext) => write!(f, "unsupported extension: {}", ext),
            ExtractError::Pdf(e) => write!(f, "PDF extraction failed: {}", e),
            ExtractError::Docx(e) => write!(f, "DOCX extraction failed: {}", e),
        }
    }
}

impl std::error::Error for ExtractError {}

/// True if `extension` names a format this module can extract.
pub fn is_binary_format(extension: &str) -> bool {
    matches!(extension, "pdf" | "docx")
}

/// Extract plain text from binary content, dispatching on file extension.
pub fn extract_text(bytes: &[u8], extension: &str) -> Result<String, ExtractError> {
    match extension {
        "pdf" => extract_pdf(bytes),
        "docx" => extract_docx(bytes),
        other => Err(ExtractError::UnsupportedExtension(other.to_string())),
    }
}

fn extract_pdf(bytes: &[u8]) -> Result<String, ExtractError> {
    pdf_extract::extract_text_from_mem(bytes).map_err(|e| ExtractError::Pdf(e.to_string()))
}

/// A docx is a ZIP archive; the document body lives in `word/document.xml`
/// as `<w:t>` text runs.
fn extract_docx(bytes: &[u8]) -> Result<String, ExtractError> {
    let mut archive = zip::ZipArchive::new(std::io::Cursor::new(bytes))
        .map_err(|e| ExtractError::Docx(e.to_string()))?;

    let entry = archive
        .by_name("word/document.xml")
        .map_err(|_| ExtractError::Docx("word/document.xml not found".to_string()))?;

    let mut xml = Vec::new();
    entry
        .take(MAX_XML_ENTRY_BYTES)
        .read_to_end(&mut xml)
        .map_err(|e| ExtractError::Docx(e.to_string()))?;
    if xml.len() as u64 >= MAX_XML_ENTRY_BYTES {
        return Err(ExtractError::Docx(
            "word/document.xml exceeds size limit".to_string(),
        ));
    }

    collect_text_runs(&xml)
}

/// Walk the XML stream and concatenate the contents of `t` elements,
/// inserting a space between runs so words from separate paragraphs do
/// not fuse.
fn collect_text_runs(xml: &[u8]) -> Result<String, ExtractError> {
    let mut out = String::new();
    let mut reader = quick_xml::Reader::from_reader(xml);
    reader.config_mut().trim_text(true);
    let mut buf = Vec::new();
    let mut in_text_run = false;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(quick_xml::events::Event::Start(e)) => {
                in_text_run = e.local_name().as_ref() == b"t";
            }
            Ok(quick_xml::events::Event::Text(te)) if in_text_run => {
                let text = te.unescape().unwrap_or_default();
                if !out.is_empty() && !text.is_empty() {
                    out.push(' ');
                }
                out.push_str(text.as_ref());
            }
            Ok(quick_xml::events::Event::End(_)) => {
                in_text_run = false;
            }
            Ok(quick_xml::events::Event::Eof) => break,
            Err(e) => return Err(ExtractError::Docx(e.to_string())),
            _ => {}
        }
        buf.clear();
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unsupported_extension_is_an_error() {
        let err = extract_text(b"data", "png").unwrap_err();
        assert!(matches!(err, ExtractError::UnsupportedExtension(_)));
    }

    #[test]
    fn invalid_pdf_is_an_error() {
        let err = extract_text(b"not a pdf", "pdf").unwrap_err();
        assert!(matches!(err, ExtractError::Pdf(_)));
    }

    #[test]
    fn invalid_zip_is_an_error_for_docx() {
        let err = extract_text(b"not a zip", "docx").unwrap_err();
        assert!(matches!(err, ExtractError::Docx(_)));
    }

    #[test]
    fn binary_format_detection() {
        assert!(is_binary_format("pdf"));
        assert!(is_binary_format("docx"));
        assert!(!is_binary_format("md"));
        assert!(!is_binary_format("txt"));
    }
}
