//! Stage 1: document extraction.
//!
//! Turns raw uploaded bytes into a [`ProcessedDocument`]: plain text, layout
//! structure where the source carries one, and metadata. Every format routes
//! through the same progress milestones (10 accepted, 20 parsing, 70 text
//! recovered, 80 metadata assembled, 100 done) so callers can drive a single
//! progress bar regardless of input kind.
//!
//! ## Why spawn_blocking?
//!
//! The `pdfium-render` crate wraps the pdfium C++ library, which uses
//! thread-local state internally and is not safe to call from async
//! contexts. `tokio::task::spawn_blocking` moves parsing and rasterisation
//! onto the blocking thread pool so Tokio workers never stall on a large
//! document.
//!
//! ## OCR fallback
//!
//! Scanned PDFs open fine but yield no text runs. When a whole document
//! comes back empty, the first page is rasterised to PNG and handed to the
//! OCR engine; the reported page count stays the true count even though only
//! one page was recognised.

use std::sync::Arc;

use chrono::Utc;
use image::codecs::png::PngEncoder;
use image::{ExtendedColorType, ImageEncoder};
use pdfium_render::prelude::*;
use tracing::{debug, info, warn};

use crate::config::AnalyzerConfig;
use crate::document::{
    count_words, DocumentKind, DocumentMetadata, OcrResults, ProcessedDocument, StructuredPage,
    StructuredText,
};
use crate::error::{ExtractionError, PageError};
use crate::ocr::SharedOcr;
use crate::pipeline::{docx, layout};
use crate::progress::{ProgressReporter, SharedProgress};
use crate::store::{session_id, DocumentStore, StoredDocument};

/// Orchestrates extraction for all supported document kinds.
pub struct DocumentProcessor {
    ocr: SharedOcr,
    store: Arc<dyn DocumentStore>,
    config: AnalyzerConfig,
}

struct PdfExtraction {
    text: String,
    page_count: usize,
    structured: Option<StructuredText>,
}

enum PdfOutcome {
    /// At least one page carried real text runs.
    Text(PdfExtraction),
    /// No text anywhere; first page rasterised for OCR.
    NeedsOcr {
        page_count: usize,
        first_page_png: Vec<u8>,
    },
}

impl DocumentProcessor {
    pub fn new(ocr: SharedOcr, store: Arc<dyn DocumentStore>, config: AnalyzerConfig) -> Self {
        Self { ocr, store, config }
    }

    /// Process one uploaded document end to end.
    ///
    /// Never reports progress backwards; on failure the bar is reset to 0
    /// and the error surfaces to the caller.
    pub async fn process(
        &self,
        bytes: Vec<u8>,
        file_name: &str,
        mime: &str,
        identity: Option<&str>,
        progress: SharedProgress,
    ) -> Result<ProcessedDocument, ExtractionError> {
        let reporter = ProgressReporter::new(progress);
        match self
            .process_inner(bytes, file_name, mime, identity, &reporter)
            .await
        {
            Ok(document) => {
                reporter.advance(100);
                Ok(document)
            }
            Err(e) => {
                reporter.reset();
                Err(e)
            }
        }
    }

    async fn process_inner(
        &self,
        bytes: Vec<u8>,
        file_name: &str,
        mime: &str,
        identity: Option<&str>,
        reporter: &ProgressReporter,
    ) -> Result<ProcessedDocument, ExtractionError> {
        let kind = DocumentKind::from_mime(mime, file_name).ok_or_else(|| {
            ExtractionError::UnsupportedKind {
                mime: mime.to_string(),
            }
        })?;
        reporter.advance(10);
        info!(file = file_name, ?kind, bytes = bytes.len(), "processing document");

        reporter.advance(20);
        let (text, page_count, structured, ocr) = match kind {
            DocumentKind::Pdf => self.extract_pdf(&bytes).await?,
            DocumentKind::Docx => {
                let text = docx::extract_text(&bytes)?;
                (text, None, None, None)
            }
            DocumentKind::Image => {
                let outcome = self
                    .ocr
                    .recognize(&bytes, &self.config.ocr_language)
                    .await?;
                if outcome.text.trim().is_empty() {
                    return Err(ExtractionError::NoTextRecovered {
                        detail: "image OCR produced no text".into(),
                    });
                }
                let ocr = OcrResults {
                    confidence: outcome.confidence,
                    language: self.config.ocr_language.clone(),
                };
                (outcome.text, Some(1), None, Some(ocr))
            }
        };
        reporter.advance(70);

        let metadata = DocumentMetadata {
            title: title_from_file_name(file_name),
            kind,
            page_count,
            word_count: count_words(&text),
            processed_at: Utc::now(),
            ocr,
        };

        let document = ProcessedDocument {
            text,
            metadata,
            structured,
        };
        reporter.advance(80);

        self.persist(&document, file_name, identity).await;
        Ok(document)
    }

    async fn extract_pdf(
        &self,
        bytes: &[u8],
    ) -> Result<
        (
            String,
            Option<usize>,
            Option<StructuredText>,
            Option<OcrResults>,
        ),
        ExtractionError,
    > {
        let owned = bytes.to_vec();
        let config = self.config.clone();
        let outcome = tokio::task::spawn_blocking(move || extract_pdf_blocking(&owned, &config))
            .await
            .map_err(|e| ExtractionError::Internal(format!("extraction task panicked: {e}")))??;
        self.resolve_pdf_outcome(outcome).await
    }

    /// Turn a parsed-PDF outcome into the common extraction tuple, running
    /// OCR when the document carried no embedded text. `page_count` stays
    /// the true count even though only page 1 is recognised.
    async fn resolve_pdf_outcome(
        &self,
        outcome: PdfOutcome,
    ) -> Result<
        (
            String,
            Option<usize>,
            Option<StructuredText>,
            Option<OcrResults>,
        ),
        ExtractionError,
    > {
        match outcome {
            PdfOutcome::Text(extraction) => Ok((
                extraction.text,
                Some(extraction.page_count),
                extraction.structured,
                None,
            )),
            PdfOutcome::NeedsOcr {
                page_count,
                first_page_png,
            } => {
                info!(page_count, "no embedded text, falling back to OCR");
                let recognized = self
                    .ocr
                    .recognize(&first_page_png, &self.config.ocr_language)
                    .await?;
                if recognized.text.trim().is_empty() {
                    return Err(ExtractionError::NoTextRecovered {
                        detail: "document has no embedded text and OCR found none".into(),
                    });
                }
                let ocr = OcrResults {
                    confidence: recognized.confidence,
                    language: self.config.ocr_language.clone(),
                };
                Ok((recognized.text, Some(page_count), None, Some(ocr)))
            }
        }
    }

    async fn persist(&self, document: &ProcessedDocument, file_name: &str, identity: Option<&str>) {
        let record = StoredDocument {
            id: session_id(Utc::now()),
            identity: identity.map(str::to_string),
            file_name: file_name.to_string(),
            content: document.text.clone(),
            metadata: document.metadata.clone(),
            created_at: Utc::now(),
        };
        // Persistence is best-effort: analysis proceeds from the in-memory
        // document even when the store is down.
        if let Err(e) = self.store.insert(record).await {
            warn!(error = %e, file = file_name, "failed to persist document");
        }
    }
}

fn title_from_file_name(file_name: &str) -> String {
    std::path::Path::new(file_name)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(file_name)
        .to_string()
}

fn extract_pdf_blocking(
    bytes: &[u8],
    config: &AnalyzerConfig,
) -> Result<PdfOutcome, ExtractionError> {
    let pdfium = Pdfium::default();

    let document = match pdfium.load_pdf_from_byte_slice(bytes, None) {
        Ok(document) => document,
        Err(e) => {
            let detail = format!("{e:?}");
            if detail.to_ascii_lowercase().contains("password") {
                return Err(ExtractionError::PasswordProtected);
            }
            // Structurally damaged files sometimes still open on a second
            // attempt with an explicit empty password. The text layer of
            // such a file is untrusted, so page 1 goes straight to OCR.
            warn!(error = %detail, "pdf open failed, attempting recovery load");
            return match recover_damaged_pdf(&pdfium, bytes, config) {
                Ok(outcome) => Ok(outcome),
                Err(recovery) => {
                    warn!(error = %recovery, "recovery load failed");
                    Err(ExtractionError::CorruptPdf { detail })
                }
            };
        }
    };

    let pages = document.pages();
    let page_count = pages.len() as usize;
    debug!(page_count, "pdf opened");

    let page_results: Vec<Result<Vec<layout::RawRun>, PageError>> = pages
        .iter()
        .enumerate()
        .map(|(index, page)| extract_page_runs(&page, index + 1))
        .collect();
    let (text, structured_pages) = assemble_pdf_pages(page_results, config.paragraph_gap);

    if text.trim().is_empty() {
        let first_page_png = render_first_page_png(&document, config.ocr_render_width)?;
        return Ok(PdfOutcome::NeedsOcr {
            page_count,
            first_page_png,
        });
    }

    let structured = if structured_pages.iter().any(|p| !p.paragraphs.is_empty()) {
        Some(StructuredText {
            pages: structured_pages,
        })
    } else {
        None
    };

    Ok(PdfOutcome::Text(PdfExtraction {
        text,
        page_count,
        structured,
    }))
}

/// Assemble per-page run extraction results into flat text and structured
/// pages. A failed page is logged and skipped; its neighbours keep their
/// original page numbers.
fn assemble_pdf_pages(
    page_results: Vec<Result<Vec<layout::RawRun>, PageError>>,
    paragraph_gap: f32,
) -> (String, Vec<StructuredPage>) {
    let mut page_texts: Vec<String> = Vec::with_capacity(page_results.len());
    let mut structured_pages: Vec<StructuredPage> = Vec::with_capacity(page_results.len());

    for (index, result) in page_results.into_iter().enumerate() {
        let number = index + 1;
        match result {
            Ok(runs) => {
                let structured = layout::build_page(number, runs, paragraph_gap);
                let flat = structured
                    .paragraphs
                    .iter()
                    .map(|p| p.text.as_str())
                    .collect::<Vec<_>>()
                    .join("\n\n");
                if !flat.trim().is_empty() {
                    page_texts.push(flat);
                }
                structured_pages.push(structured);
            }
            Err(e) => {
                // A bad page never sinks the document.
                warn!(error = %e, page = number, "skipping page");
            }
        }
    }

    (page_texts.join("\n\n"), structured_pages)
}

/// Second-chance open for a file the normal load rejected. When it works,
/// the first page is rasterised for OCR; any failure here surfaces to the
/// caller, which reports the original load error instead.
fn recover_damaged_pdf(
    pdfium: &Pdfium,
    bytes: &[u8],
    config: &AnalyzerConfig,
) -> Result<PdfOutcome, ExtractionError> {
    let document = pdfium
        .load_pdf_from_byte_slice(bytes, Some(""))
        .map_err(|e| ExtractionError::CorruptPdf {
            detail: format!("{e:?}"),
        })?;
    let page_count = document.pages().len() as usize;
    info!(page_count, "recovery load succeeded, routing page 1 to OCR");
    let first_page_png = render_first_page_png(&document, config.ocr_render_width)?;
    Ok(PdfOutcome::NeedsOcr {
        page_count,
        first_page_png,
    })
}

fn extract_page_runs(page: &PdfPage<'_>, number: usize) -> Result<Vec<layout::RawRun>, PageError> {
    let text = page.text().map_err(|e| PageError::TextFailed {
        page: number,
        detail: format!("{e:?}"),
    })?;

    let mut runs = Vec::new();
    for segment in text.segments().iter() {
        let content = segment.text();
        if content.trim().is_empty() {
            continue;
        }
        let bounds = segment.bounds();
        runs.push(layout::RawRun {
            x: bounds.left.value,
            y: bounds.bottom.value,
            width: (bounds.right.value - bounds.left.value).abs(),
            height: (bounds.top.value - bounds.bottom.value).abs(),
            text: content,
        });
    }
    Ok(runs)
}

fn render_first_page_png(
    document: &PdfDocument<'_>,
    target_width: u32,
) -> Result<Vec<u8>, ExtractionError> {
    let page = document
        .pages()
        .get(0)
        .map_err(|e| ExtractionError::CorruptPdf {
            detail: format!("{e:?}"),
        })?;

    let render_config = PdfRenderConfig::new().set_target_width(target_width as i32);
    let bitmap = page.render_with_config(&render_config).map_err(|e| {
        ExtractionError::OcrFailed {
            detail: format!("page render failed: {e:?}"),
        }
    })?;

    let width = bitmap.width() as u32;
    let height = bitmap.height() as u32;
    let rgba = bitmap.as_rgba_bytes();

    let mut encoded = Vec::new();
    PngEncoder::new(&mut encoded)
        .write_image(&rgba, width, height, ExtendedColorType::Rgba8)
        .map_err(|e| ExtractionError::Internal(format!("png encode failed: {e}")))?;
    Ok(encoded)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ocr::MockOcrEngine;
    use crate::progress::ProgressCallback;
    use crate::store::SessionStore;
    use std::io::Write;
    use std::sync::Mutex;
    use zip::write::SimpleFileOptions;

    struct Recording(Mutex<Vec<u8>>);

    impl ProgressCallback for Recording {
        fn on_progress(&self, percent: u8) {
            self.0.lock().unwrap().push(percent);
        }
    }

    fn sample_docx() -> Vec<u8> {
        let mut cursor = std::io::Cursor::new(Vec::new());
        {
            let mut writer = zip::ZipWriter::new(&mut cursor);
            writer
                .start_file("word/document.xml", SimpleFileOptions::default())
                .unwrap();
            writer
                .write_all(
                    br#"<w:document xmlns:w="ns"><w:body><w:p><w:r><w:t>This agreement renews automatically each year.</w:t></w:r></w:p></w:body></w:document>"#,
                )
                .unwrap();
            writer.finish().unwrap();
        }
        cursor.into_inner()
    }

    fn processor_with(ocr: SharedOcr) -> (DocumentProcessor, Arc<SessionStore>) {
        let store = Arc::new(SessionStore::new());
        let processor = DocumentProcessor::new(ocr, store.clone(), AnalyzerConfig::default());
        (processor, store)
    }

    #[tokio::test]
    async fn docx_path_reports_full_milestones() {
        let (processor, store) = processor_with(SharedOcr::preloaded(Box::new(
            MockOcrEngine::new("unused", 0.9),
        )));
        let recording = Arc::new(Recording(Mutex::new(Vec::new())));
        let document = processor
            .process(
                sample_docx(),
                "contract.docx",
                "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
                None,
                recording.clone(),
            )
            .await
            .unwrap();

        assert!(document.text.contains("renews automatically"));
        assert_eq!(document.metadata.kind, DocumentKind::Docx);
        assert_eq!(document.metadata.word_count, 6);
        assert!(document.metadata.ocr.is_none());

        let seen = recording.0.lock().unwrap().clone();
        assert_eq!(seen, vec![10, 20, 70, 80, 100]);

        let stored = store.list(None).await.unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].file_name, "contract.docx");
        assert!(stored[0].id.starts_with("temp-"));
    }

    #[tokio::test]
    async fn image_path_runs_ocr_and_records_confidence() {
        let (processor, _store) = processor_with(SharedOcr::preloaded(Box::new(
            MockOcrEngine::new("Payment is due within 30 days.", 0.84),
        )));
        let document = processor
            .process(
                vec![0x89, b'P', b'N', b'G'],
                "scan.png",
                "image/png",
                None,
                Arc::new(crate::progress::NoopProgress),
            )
            .await
            .unwrap();

        assert_eq!(document.text, "Payment is due within 30 days.");
        assert_eq!(document.metadata.kind, DocumentKind::Image);
        assert_eq!(document.metadata.page_count, Some(1));
        let ocr = document.metadata.ocr.expect("ocr metadata");
        assert!((ocr.confidence - 0.84).abs() < f32::EPSILON);
    }

    #[tokio::test]
    async fn unsupported_mime_fails_and_resets_progress() {
        let (processor, store) = processor_with(SharedOcr::preloaded(Box::new(
            MockOcrEngine::new("unused", 0.9),
        )));
        let recording = Arc::new(Recording(Mutex::new(Vec::new())));
        let err = processor
            .process(
                b"%!PS".to_vec(),
                "doc.ps",
                "application/postscript",
                None,
                recording.clone(),
            )
            .await
            .unwrap_err();

        assert!(matches!(err, ExtractionError::UnsupportedKind { .. }));
        let seen = recording.0.lock().unwrap().clone();
        assert_eq!(seen.last(), Some(&0));
        assert!(store.list(None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn empty_image_ocr_is_no_text_recovered() {
        let (processor, _store) = processor_with(SharedOcr::preloaded(Box::new(
            MockOcrEngine::new("   ", 0.1),
        )));
        let err = processor
            .process(
                vec![1, 2, 3],
                "blank.png",
                "image/png",
                None,
                Arc::new(crate::progress::NoopProgress),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ExtractionError::NoTextRecovered { .. }));
    }

    #[tokio::test]
    async fn identity_is_attached_to_stored_record() {
        let (processor, store) = processor_with(SharedOcr::preloaded(Box::new(
            MockOcrEngine::new("unused", 0.9),
        )));
        processor
            .process(
                sample_docx(),
                "lease.docx",
                "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
                Some("user-42"),
                Arc::new(crate::progress::NoopProgress),
            )
            .await
            .unwrap();

        let mine = store.list(Some("user-42")).await.unwrap();
        assert_eq!(mine.len(), 1);
        assert!(store.list(Some("someone-else")).await.unwrap().is_empty());
    }

    fn single_line_page(text: &str) -> Vec<layout::RawRun> {
        vec![layout::RawRun {
            x: 72.0,
            y: 700.0,
            width: 200.0,
            height: 12.0,
            text: text.to_string(),
        }]
    }

    #[test]
    fn bad_page_skipped_neighbours_keep_numbers() {
        let results = vec![
            Ok(single_line_page("Page one clause.")),
            Err(PageError::TextFailed {
                page: 2,
                detail: "glyph table truncated".into(),
            }),
            Ok(single_line_page("Page three clause.")),
        ];
        let (text, pages) = assemble_pdf_pages(results, 20.0);

        assert!(text.contains("Page one clause."));
        assert!(text.contains("Page three clause."));
        let numbers: Vec<usize> = pages.iter().map(|p| p.number).collect();
        assert_eq!(numbers, vec![1, 3]);
    }

    #[test]
    fn runless_pages_produce_no_text() {
        // Scanned pages open fine but carry zero text runs.
        let results: Vec<Result<Vec<layout::RawRun>, PageError>> =
            vec![Ok(Vec::new()), Ok(Vec::new()), Ok(Vec::new())];
        let (text, pages) = assemble_pdf_pages(results, 20.0);

        assert!(text.trim().is_empty());
        assert_eq!(pages.len(), 3);
        assert!(pages.iter().all(|p| p.paragraphs.is_empty()));
    }

    #[tokio::test]
    async fn scanned_outcome_runs_ocr_and_keeps_true_page_count() {
        let (processor, _store) = processor_with(SharedOcr::preloaded(Box::new(
            MockOcrEngine::new("Scanned lease terms.", 0.91),
        )));
        let (text, page_count, structured, ocr) = processor
            .resolve_pdf_outcome(PdfOutcome::NeedsOcr {
                page_count: 4,
                first_page_png: vec![0x89, b'P', b'N', b'G'],
            })
            .await
            .unwrap();

        assert_eq!(text, "Scanned lease terms.");
        assert_eq!(page_count, Some(4));
        assert!(structured.is_none());
        let ocr = ocr.expect("ocr metadata");
        assert!((ocr.confidence - 0.91).abs() < f32::EPSILON);
    }

    #[tokio::test]
    async fn scanned_outcome_with_blank_ocr_is_no_text_recovered() {
        let (processor, _store) = processor_with(SharedOcr::preloaded(Box::new(
            MockOcrEngine::new("   ", 0.0),
        )));
        let err = processor
            .resolve_pdf_outcome(PdfOutcome::NeedsOcr {
                page_count: 2,
                first_page_png: Vec::new(),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, ExtractionError::NoTextRecovered { .. }));
    }

    #[test]
    fn title_strips_extension() {
        assert_eq!(title_from_file_name("Master Services.pdf"), "Master Services");
        assert_eq!(title_from_file_name("noext"), "noext");
    }
}
