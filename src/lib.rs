//! # clausemark
//!
//! Turn contracts and other uploaded documents into risk-annotated,
//! navigable text.
//!
//! ## Why this crate?
//!
//! Reading a dense agreement for risk is slow and error-prone. This crate
//! ingests PDF, DOCX, or scanned-image uploads, recovers clean text (with
//! layout structure where the source has one and an OCR fallback where it
//! does not), asks a completion service for a structured risk assessment,
//! and splices the resulting highlights back into the original text as
//! styled, offset-accurate markup. The completion service is treated as
//! unreliable by construction: malformed responses run through a repair
//! cascade, and total failures degrade to a local pattern analyzer rather
//! than an error.
//!
//! ## Pipeline Overview
//!
//! ```text
//! upload
//!  │
//!  ├─ 1. Extract   pdfium text runs / docx XML / tesseract OCR
//!  ├─ 2. Layout    reading order + paragraph grouping
//!  ├─ 3. Analyze   classify, prompt the completion service
//!  ├─ 4. Repair    fence-strip → object-extract → sentinel-excise → partial
//!  ├─ 5. Fallback  local risk patterns when the service gives nothing
//!  └─ 6. Annotate  right-to-left highlight splicing over the original text
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use clausemark::{
//!     AnalyzerConfig, DocumentProcessor, DynamicDocumentAnalyzer,
//!     HttpCompletionClient, NoopProgress, SessionStore, SharedOcr,
//!     apply_highlighting,
//! };
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = AnalyzerConfig::default();
//!     let processor = DocumentProcessor::new(
//!         SharedOcr::tesseract(),
//!         Arc::new(SessionStore::new()),
//!         config.clone(),
//!     );
//!     let bytes = std::fs::read("agreement.pdf")?;
//!     let document = processor
//!         .process(bytes, "agreement.pdf", "application/pdf", None, Arc::new(NoopProgress))
//!         .await?;
//!
//!     let client = HttpCompletionClient::new(
//!         "https://api.example.com/v1/chat/completions",
//!         std::env::var("COMPLETION_API_KEY")?,
//!         config.api_timeout_secs,
//!     )?;
//!     let analyzer = DynamicDocumentAnalyzer::new(Arc::new(client), config);
//!     let analysis = analyzer.analyze_document(&document, "agreement.pdf").await;
//!
//!     let result = analysis.result();
//!     let html = apply_highlighting(
//!         &result.structured_text,
//!         &result.highlights,
//!         &result.visual_config.color_scheme,
//!     );
//!     println!("{html}");
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `clausemark` binary (clap + anyhow + tracing-subscriber) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! clausemark = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod analysis;
pub mod completion;
pub mod config;
pub mod document;
pub mod error;
pub mod highlight;
pub mod ocr;
pub mod pipeline;
pub mod progress;
pub mod prompts;
pub mod store;
pub mod theme;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use analysis::{
    AnalysisOutcome, AnalysisSummary, DocumentHighlight, DocumentIssue, DynamicAnalysisResult,
    HighlightKind, RiskLevel, Severity, VisualConfig,
};
pub use completion::{ChatMessage, CompletionClient, CompletionOptions, HttpCompletionClient};
pub use config::{AnalyzerConfig, AnalyzerConfigBuilder};
pub use document::{
    DocumentKind, DocumentMetadata, OcrResults, ProcessedDocument, StructuredText,
};
pub use error::{AnalysisFailure, ExtractionError, PageError, StoreError};
pub use highlight::{
    animation_css, apply_highlighting, expand_to_sentence, format_structured_text,
    highlight_style,
};
pub use ocr::{MockOcrEngine, OcrEngine, OcrOutcome, SharedOcr, TesseractCli};
pub use pipeline::analyze::{detect_document_type, DynamicDocumentAnalyzer};
pub use pipeline::extract::DocumentProcessor;
pub use progress::{NoopProgress, ProgressCallback, SharedProgress};
pub use store::{DocumentStore, SessionStore, StoredDocument};
pub use theme::{color_scheme, layout, ColorScheme, DocumentStats, LayoutConfig};
