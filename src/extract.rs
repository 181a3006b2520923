//! Text extraction for imported documents.
//!
//! The extractor is chosen by file extension: plain text and Markdown are
//! read as-is, PDFs go through `pdf_extract`, and `.docx` is unpacked from
//! its ZIP container and parsed with `quick-xml`. The docx path emits one
//! `\n` per paragraph so empty paragraphs become the line-break runs the
//! splitter infers its delimiter from, and carries bold/italic run formatting
//! through as inline `<b>`/`<i>` tags.

use std::io::Read;
use std::path::Path;

use crate::error::SourceError;

/// Maximum decompressed bytes to read from a single ZIP entry (zip-bomb
/// protection).
const MAX_XML_ENTRY_BYTES: u64 = 50 * 1024 * 1024;

/// Extracts text content from a document. Per-source failures are reported
/// to the batch as [`SourceError`]; nothing here panics on malformed input.
pub fn extract_text(path: &Path) -> Result<String, SourceError> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();

    match ext.as_str() {
        "txt" | "md" => Ok(std::fs::read_to_string(path)?),
        "pdf" => {
            let bytes = std::fs::read(path)?;
            pdf_extract::extract_text_from_mem(&bytes)
                .map_err(|e| SourceError::Extraction(format!("PDF extraction failed: {}", e)))
        }
        "docx" => {
            let bytes = std::fs::read(path)?;
            extract_docx(&bytes)
        }
        other => Err(SourceError::Extraction(format!(
            "unsupported file type: .{}",
            other
        ))),
    }
}

/// True if the text contains at least one alphabetic character. Extraction
/// output failing this check means the document is scanned or flattened and
/// needs the visual pipeline instead.
pub fn has_alphabetic(text: &str) -> bool {
    text.chars().any(|c| c.is_ascii_alphabetic())
}

fn extract_docx(bytes: &[u8]) -> Result<String, SourceError> {
    let mut archive = zip::ZipArchive::new(std::io::Cursor::new(bytes))
        .map_err(|e| SourceError::Extraction(e.to_string()))?;

    let mut doc_xml = Vec::new();
    {
        let entry = archive
            .by_name("word/document.xml")
            .map_err(|_| SourceError::Extraction("word/document.xml not found".to_string()))?;
        entry
            .take(MAX_XML_ENTRY_BYTES)
            .read_to_end(&mut doc_xml)
            .map_err(|e| SourceError::Extraction(e.to_string()))?;
        if doc_xml.len() as u64 >= MAX_XML_ENTRY_BYTES {
            return Err(SourceError::Extraction(
                "word/document.xml exceeds size limit".to_string(),
            ));
        }
    }

    extract_document_xml(&doc_xml)
}

/// Walks `word/document.xml`, concatenating `w:t` text runs. Paragraph ends
/// become `\n`; runs whose properties mark bold or italic are wrapped in
/// `<b>`/`<i>`.
fn extract_document_xml(xml: &[u8]) -> Result<String, SourceError> {
    use quick_xml::events::Event;

    let mut out = String::new();
    let mut reader = quick_xml::Reader::from_reader(xml);
    let mut buf = Vec::new();

    let mut in_rpr = false;
    let mut bold = false;
    let mut italic = false;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => match e.local_name().as_ref() {
                b"r" => {
                    bold = false;
                    italic = false;
                }
                b"rPr" => in_rpr = true,
                b"b" if in_rpr => bold = flag_enabled(&e),
                b"i" if in_rpr => italic = flag_enabled(&e),
                b"t" => {
                    if let Ok(Event::Text(te)) = reader.read_event_into(&mut buf) {
                        let text = te.unescape().unwrap_or_default();
                        push_run(&mut out, &text, bold, italic);
                    }
                }
                _ => {}
            },
            Ok(Event::Empty(e)) => match e.local_name().as_ref() {
                b"b" if in_rpr => bold = flag_enabled(&e),
                b"i" if in_rpr => italic = flag_enabled(&e),
                _ => {}
            },
            Ok(Event::End(e)) => match e.local_name().as_ref() {
                b"rPr" => in_rpr = false,
                b"r" => {
                    bold = false;
                    italic = false;
                }
                b"p" => out.push('\n'),
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => return Err(SourceError::Extraction(e.to_string())),
            _ => {}
        }
        buf.clear();
    }

    Ok(out)
}

/// A `w:b`/`w:i` element enables its property unless `w:val` says otherwise.
fn flag_enabled(e: &quick_xml::events::BytesStart<'_>) -> bool {
    for attr in e.attributes().flatten() {
        if attr.key.local_name().as_ref() == b"val" {
            return !matches!(attr.value.as_ref(), b"0" | b"false" | b"none");
        }
    }
    true
}

fn push_run(out: &mut String, text: &str, bold: bool, italic: bool) {
    if bold {
        out.push_str("<b>");
    }
    if italic {
        out.push_str("<i>");
    }
    out.push_str(text);
    if italic {
        out.push_str("</i>");
    }
    if bold {
        out.push_str("</b>");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use zip::write::SimpleFileOptions;

    fn docx_with_document_xml(document_xml: &str) -> Vec<u8> {
        let mut writer = zip::ZipWriter::new(std::io::Cursor::new(Vec::new()));
        writer
            .start_file("word/document.xml", SimpleFileOptions::default())
            .unwrap();
        writer.write_all(document_xml.as_bytes()).unwrap();
        writer.finish().unwrap().into_inner()
    }

    #[test]
    fn unsupported_extension_is_an_extraction_error() {
        let file = tempfile::Builder::new().suffix(".exe").tempfile().unwrap();
        let err = extract_text(file.path()).unwrap_err();
        assert!(matches!(err, SourceError::Extraction(_)));
    }

    #[test]
    fn invalid_zip_is_an_extraction_error() {
        let err = extract_docx(b"not a zip").unwrap_err();
        assert!(matches!(err, SourceError::Extraction(_)));
    }

    #[test]
    fn missing_document_xml_is_an_extraction_error() {
        let mut writer = zip::ZipWriter::new(std::io::Cursor::new(Vec::new()));
        writer
            .start_file("word/other.xml", SimpleFileOptions::default())
            .unwrap();
        writer.write_all(b"<x/>").unwrap();
        let bytes = writer.finish().unwrap().into_inner();

        let err = extract_docx(&bytes).unwrap_err();
        assert!(matches!(err, SourceError::Extraction(_)));
    }

    #[test]
    fn paragraphs_become_line_breaks() {
        let bytes = docx_with_document_xml(
            r#"<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main">
              <w:body>
                <w:p><w:r><w:t>Intro</w:t></w:r></w:p>
                <w:p></w:p>
                <w:p><w:r><w:t>Body</w:t></w:r></w:p>
              </w:body>
            </w:document>"#,
        );
        let text = extract_docx(&bytes).unwrap();
        assert_eq!(text, "Intro\n\nBody\n");
    }

    #[test]
    fn bold_and_italic_runs_are_tagged() {
        let bytes = docx_with_document_xml(
            r#"<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main">
              <w:body>
                <w:p>
                  <w:r><w:rPr><w:b/></w:rPr><w:t>Heading</w:t></w:r>
                  <w:r><w:t> plain</w:t></w:r>
                  <w:r><w:rPr><w:i/></w:rPr><w:t>aside</w:t></w:r>
                </w:p>
              </w:body>
            </w:document>"#,
        );
        let text = extract_docx(&bytes).unwrap();
        assert!(text.contains("<b>Heading</b>"));
        assert!(text.contains(" plain"));
        assert!(text.contains("<i>aside</i>"));
    }

    #[test]
    fn explicitly_disabled_bold_stays_plain() {
        let bytes = docx_with_document_xml(
            r#"<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main">
              <w:body>
                <w:p><w:r><w:rPr><w:b w:val="0"/></w:rPr><w:t>not bold</w:t></w:r></w:p>
              </w:body>
            </w:document>"#,
        );
        let text = extract_docx(&bytes).unwrap();
        assert!(text.contains("not bold"));
        assert!(!text.contains("<b>"));
    }

    #[test]
    fn has_alphabetic_distinguishes_noise() {
        assert!(has_alphabetic("Chapter 1"));
        assert!(!has_alphabetic("1234 --- ..."));
        assert!(!has_alphabetic(""));
    }
}
