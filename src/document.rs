//! Output types of the extraction stage.
//!
//! A [`ProcessedDocument`] is created once per uploaded file and is
//! immutable afterwards: re-processing a file produces a new record rather
//! than mutating an old one, because analysis highlight offsets are valid
//! only against the exact text snapshot they were computed over.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// File kinds the pipeline can ingest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentKind {
    Pdf,
    Docx,
    Image,
}

impl DocumentKind {
    /// Map a declared MIME type (or filename extension fallback) to a kind.
    pub fn from_mime(mime: &str, filename: &str) -> Option<Self> {
        let mime = mime.to_ascii_lowercase();
        if mime.contains("pdf") {
            return Some(Self::Pdf);
        }
        if mime.contains("docx") || mime.contains("wordprocessingml") {
            return Some(Self::Docx);
        }
        if mime.starts_with("image") {
            return Some(Self::Image);
        }
        // Extension fallback for callers that only know the filename.
        let lower = filename.to_ascii_lowercase();
        if lower.ends_with(".pdf") {
            Some(Self::Pdf)
        } else if lower.ends_with(".docx") {
            Some(Self::Docx)
        } else if [".png", ".jpg", ".jpeg", ".tif", ".tiff", ".bmp"]
            .iter()
            .any(|ext| lower.ends_with(ext))
        {
            Some(Self::Image)
        } else {
            None
        }
    }
}

/// OCR confidence metadata attached when text came through the OCR path.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OcrResults {
    /// Mean recognition confidence, 0–100.
    pub confidence: f32,
    /// Language the engine was run with.
    pub language: String,
}

/// Metadata describing one processed file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentMetadata {
    /// Original filename.
    pub title: String,
    pub kind: DocumentKind,
    /// True page count of the source document, when the format has pages.
    /// Remains the real count even when text came from the OCR fallback.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page_count: Option<usize>,
    /// Whitespace-delimited token count of the extracted text.
    pub word_count: usize,
    pub processed_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ocr: Option<OcrResults>,
}

/// A positioned run of text within a line.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TextRun {
    /// Horizontal position in PDF layout units.
    pub x: f32,
    pub text: String,
    pub width: f32,
    pub height: f32,
}

/// One visual line: runs sharing a rounded vertical coordinate, ordered
/// left to right.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StructuredLine {
    /// Rounded vertical position. Higher values are nearer the top of the
    /// page in PDF coordinates.
    pub y: i32,
    pub runs: Vec<TextRun>,
}

impl StructuredLine {
    /// Flatten the line's runs into a single space-joined string.
    pub fn text(&self) -> String {
        self.runs
            .iter()
            .map(|r| r.text.as_str())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Consecutive lines whose vertical gap stayed under the paragraph-break
/// threshold.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StructuredParagraph {
    pub lines: Vec<StructuredLine>,
    /// Pre-flattened paragraph text, line texts space-joined.
    pub text: String,
}

/// Layout-preserving structure for one page.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StructuredPage {
    /// 1-indexed page number.
    pub number: usize,
    pub paragraphs: Vec<StructuredParagraph>,
}

/// Nested page → paragraph → line → run layout representation.
///
/// Invariant: concatenating the runs in order must be consistent
/// (whitespace-insensitively) with the flat `text` field of the owning
/// [`ProcessedDocument`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StructuredText {
    pub pages: Vec<StructuredPage>,
}

impl StructuredText {
    /// Flatten the whole structure into plain text, pages separated by
    /// blank lines. Used by tests to verify consistency with the flat text.
    pub fn flatten(&self) -> String {
        self.pages
            .iter()
            .map(|p| {
                p.paragraphs
                    .iter()
                    .map(|para| para.text.as_str())
                    .collect::<Vec<_>>()
                    .join("\n")
            })
            .collect::<Vec<_>>()
            .join("\n\n")
    }

    /// Total paragraph count across pages; feeds the layout complexity
    /// heuristic.
    pub fn paragraph_count(&self) -> usize {
        self.pages.iter().map(|p| p.paragraphs.len()).sum()
    }
}

/// The extraction stage's output: flat text, metadata, and (for PDFs with a
/// text layer) the layout structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessedDocument {
    /// Full extracted plain text.
    pub text: String,
    pub metadata: DocumentMetadata,
    /// Present only for PDFs extracted through the text-layer path. DOCX
    /// and OCR-derived text have no reliable layout to preserve.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub structured: Option<StructuredText>,
}

/// Whitespace-delimited token count; the definition every `word_count`
/// field in the crate uses.
pub fn count_words(text: &str) -> usize {
    text.split_whitespace().count()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_from_mime() {
        assert_eq!(
            DocumentKind::from_mime("application/pdf", "a.bin"),
            Some(DocumentKind::Pdf)
        );
        assert_eq!(
            DocumentKind::from_mime(
                "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
                "a.bin"
            ),
            Some(DocumentKind::Docx)
        );
        assert_eq!(
            DocumentKind::from_mime("image/png", "a.bin"),
            Some(DocumentKind::Image)
        );
        assert_eq!(DocumentKind::from_mime("text/html", "a.html"), None);
    }

    #[test]
    fn kind_falls_back_to_extension() {
        assert_eq!(
            DocumentKind::from_mime("application/octet-stream", "contract.PDF"),
            Some(DocumentKind::Pdf)
        );
        assert_eq!(
            DocumentKind::from_mime("", "scan.jpeg"),
            Some(DocumentKind::Image)
        );
    }

    #[test]
    fn count_words_matches_whitespace_split() {
        assert_eq!(count_words("one two  three\n four"), 4);
        assert_eq!(count_words(""), 0);
        assert_eq!(count_words("   "), 0);
    }

    #[test]
    fn flatten_joins_pages_and_paragraphs() {
        let st = StructuredText {
            pages: vec![StructuredPage {
                number: 1,
                paragraphs: vec![
                    StructuredParagraph {
                        lines: vec![],
                        text: "first".into(),
                    },
                    StructuredParagraph {
                        lines: vec![],
                        text: "second".into(),
                    },
                ],
            }],
        };
        assert_eq!(st.flatten(), "first\nsecond");
        assert_eq!(st.paragraph_count(), 2);
    }
}
