//! Error types for the clausemark library.
//!
//! Three distinct error types reflect three distinct failure modes:
//!
//! * [`ExtractionError`] — **Fatal**: no text could be obtained from a file
//!   (corrupt data, unsupported encryption, OCR fallback cascade exhausted).
//!   Returned as `Err(ExtractionError)` from
//!   [`crate::pipeline::extract::DocumentProcessor::process`].
//!
//! * [`PageError`] — **Non-fatal**: a single PDF page failed to extract but
//!   the rest of the document is fine. Logged and skipped; the overall
//!   extraction continues as long as at least one page succeeds or the OCR
//!   fallback recovers text.
//!
//! * [`StoreError`] — storage write failure after a successful extraction.
//!   Logged and swallowed by the processor; the extracted document is still
//!   returned to the caller.
//!
//! Analysis-stage failures are deliberately absent from this list: the
//! analyzer never propagates them. A transport error, a rate limit, or a
//! malformed completion all degrade to the local heuristic path, so callers
//! of `analyze_document` always receive a best-effort result. The internal
//! [`AnalysisFailure`] type exists only so the fallback path can record *why*
//! it was taken.

use thiserror::Error;

/// All fatal errors returned by the extraction stage.
///
/// Page-level failures use [`PageError`] and are logged rather than
/// propagated here.
#[derive(Debug, Error)]
pub enum ExtractionError {
    /// The document could not be opened by the PDF parser, and the
    /// recovery re-open also failed.
    #[error("PDF is corrupt or unreadable: {detail}")]
    CorruptPdf { detail: String },

    /// Password-protected PDFs are rejected up front; no OCR fallback is
    /// attempted because rasterisation would fail identically.
    #[error("password-protected PDFs are not supported")]
    PasswordProtected,

    /// The document parsed but yielded no text, and the OCR fallback on the
    /// first page also failed.
    #[error("no text could be extracted: {detail}")]
    NoTextRecovered { detail: String },

    /// The DOCX container or its document part could not be read.
    #[error("DOCX extraction failed: {detail}")]
    InvalidDocx { detail: String },

    /// OCR on a standalone image failed.
    #[error("OCR failed: {detail}")]
    OcrFailed { detail: String },

    /// The declared file kind is not one the pipeline handles.
    #[error("unsupported file kind: {mime}")]
    UnsupportedKind { mime: String },

    /// Unexpected internal error (blocking task panic, I/O on a temp file).
    #[error("internal error: {0}")]
    Internal(String),
}

/// A non-fatal error for a single PDF page.
///
/// Emitted at `warn` level by the extraction loop; never aborts the
/// document unless every page fails and OCR recovery also fails.
#[derive(Debug, Clone, Error)]
pub enum PageError {
    /// Text extraction failed for one page.
    #[error("page {page}: text extraction failed: {detail}")]
    TextFailed { page: usize, detail: String },

    /// Rasterisation for the OCR fallback failed.
    #[error("page {page}: rasterisation failed: {detail}")]
    RenderFailed { page: usize, detail: String },
}

/// Storage write failure. Swallowed by the processor so persistence can
/// never block a successful extraction.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store rejected the document: {0}")]
    Rejected(String),

    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Internal analysis-stage failure. Never crosses the public API; it is the
/// reason recorded on [`crate::analysis::AnalysisOutcome::Degraded`].
#[derive(Debug, Clone, Error)]
pub enum AnalysisFailure {
    /// The completion service call failed (network, auth, rate limit).
    #[error("completion service call failed: {0}")]
    Service(String),

    /// The response survived no step of the repair cascade.
    #[error("completion response unparseable: {0}")]
    Unparseable(String),
}
