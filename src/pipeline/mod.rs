//! Pipeline stages for document ingestion and risk annotation.
//!
//! Each submodule implements exactly one transformation step.
//! Keeping stages separate makes each independently testable and lets us
//! swap implementations (e.g. a different OCR backend) without touching
//! other stages.
//!
//! ## Data Flow
//!
//! ```text
//! bytes ──▶ extract ──▶ analyze ──▶ annotate
//! (upload)  (pdfium/    (completion  (highlight
//!            docx/OCR)   + repair)    splicing)
//! ```
//!
//! 1. [`extract`] — bytes to [`crate::document::ProcessedDocument`]; pdfium
//!    work runs in `spawn_blocking` because the library is not async-safe
//! 2. [`layout`]  — pure reading-order reconstruction for PDF text runs
//! 3. [`docx`]    — zip + XML pull-parse of `word/document.xml`
//! 4. [`analyze`] — classification, completion call, fallback heuristics;
//!    the only stage with network I/O
//! 5. [`repair`]  — deterministic JSON-repair cascade for malformed
//!    completion responses
//!
//! The annotation stage is pure string work and lives at the crate root in
//! [`crate::highlight`].

pub mod analyze;
pub mod docx;
pub mod extract;
pub mod layout;
pub mod repair;
