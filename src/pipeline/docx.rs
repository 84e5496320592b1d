//! DOCX text extraction.
//!
//! A `.docx` file is a zip archive; all body text lives in
//! `word/document.xml` as `<w:t>` text nodes inside `<w:p>` paragraphs.
//! Extraction streams the XML once, joining text nodes and emitting a
//! blank line between paragraphs. Styling, tables-as-layout, headers and
//! footers are deliberately ignored — analysis operates on the flat
//! narrative text.

use std::io::{Cursor, Read};

use quick_xml::events::Event;
use quick_xml::Reader;
use tracing::debug;

use crate::error::ExtractionError;

const DOCUMENT_PART: &str = "word/document.xml";

/// Extract flat text from DOCX bytes.
pub fn extract_text(bytes: &[u8]) -> Result<String, ExtractionError> {
    let mut archive = zip::ZipArchive::new(Cursor::new(bytes)).map_err(|e| {
        ExtractionError::InvalidDocx {
            detail: format!("not a zip archive: {e}"),
        }
    })?;

    let mut xml = String::new();
    archive
        .by_name(DOCUMENT_PART)
        .map_err(|e| ExtractionError::InvalidDocx {
            detail: format!("missing {DOCUMENT_PART}: {e}"),
        })?
        .read_to_string(&mut xml)
        .map_err(|e| ExtractionError::InvalidDocx {
            detail: format!("unreadable {DOCUMENT_PART}: {e}"),
        })?;

    let text = parse_document_xml(&xml)?;
    debug!(chars = text.len(), "extracted docx text");

    if text.trim().is_empty() {
        return Err(ExtractionError::NoTextRecovered {
            detail: "document.xml contains no text nodes".into(),
        });
    }
    Ok(text)
}

fn parse_document_xml(xml: &str) -> Result<String, ExtractionError> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(false);

    let mut out = String::new();
    let mut in_text_node = false;
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => match e.local_name().as_ref() {
                b"t" => in_text_node = true,
                // Explicit breaks and tab stops inside a run.
                b"br" => out.push('\n'),
                b"tab" => out.push('\t'),
                _ => {}
            },
            Ok(Event::Empty(e)) => match e.local_name().as_ref() {
                b"br" => out.push('\n'),
                b"tab" => out.push('\t'),
                _ => {}
            },
            Ok(Event::End(e)) => match e.local_name().as_ref() {
                b"t" => in_text_node = false,
                b"p" => {
                    if !out.ends_with("\n\n") {
                        out.push_str("\n\n");
                    }
                }
                _ => {}
            },
            Ok(Event::Text(t)) if in_text_node => {
                let decoded = t.unescape().map_err(|e| ExtractionError::InvalidDocx {
                    detail: format!("malformed text node: {e}"),
                })?;
                out.push_str(&decoded);
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(e) => {
                return Err(ExtractionError::InvalidDocx {
                    detail: format!("malformed document.xml: {e}"),
                })
            }
        }
        buf.clear();
    }

    Ok(out.trim().to_string())
}
