//! OCR engine abstraction and the shared worker handle.
//!
//! The engine behind [`OcrEngine`] is the one shared, mutable resource in
//! the pipeline. [`SharedOcr`] owns it: lazily started on first use, reused
//! across calls, serialised behind an async mutex (the underlying engines
//! are not safe for concurrent recognition), and explicitly released via
//! [`SharedOcr::shutdown`]. Construction is injected so tests substitute
//! [`MockOcrEngine`] without touching global state.
//!
//! The production implementation shells out to the `tesseract` binary in
//! TSV mode, which yields both the recognised words and per-word
//! confidences in a single invocation.

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::error::ExtractionError;

/// Text plus mean recognition confidence (0–100).
#[derive(Debug, Clone)]
pub struct OcrOutcome {
    pub text: String,
    pub confidence: f32,
}

/// An OCR backend: PNG bytes in, recognised text out.
#[async_trait]
pub trait OcrEngine: Send + Sync {
    async fn recognize(&self, png: &[u8], language: &str) -> Result<OcrOutcome, ExtractionError>;

    /// Release any held worker resources. Default is a no-op.
    async fn shutdown(&self) {}
}

type EngineFactory = Box<dyn Fn() -> Box<dyn OcrEngine> + Send + Sync>;

/// Lazily-started, mutex-guarded handle to the shared OCR engine.
///
/// Owned exclusively by the extraction stage; no other component reaches
/// into the engine directly.
pub struct SharedOcr {
    engine: Mutex<Option<Box<dyn OcrEngine>>>,
    factory: Option<EngineFactory>,
}

impl SharedOcr {
    /// Lazy handle: the engine is built by `factory` on first recognition
    /// and rebuilt after a `shutdown`.
    pub fn lazy(factory: impl Fn() -> Box<dyn OcrEngine> + Send + Sync + 'static) -> Self {
        Self {
            engine: Mutex::new(None),
            factory: Some(Box::new(factory)),
        }
    }

    /// Handle over an already-constructed engine. After `shutdown` this
    /// handle cannot recognise again.
    pub fn preloaded(engine: Box<dyn OcrEngine>) -> Self {
        Self {
            engine: Mutex::new(Some(engine)),
            factory: None,
        }
    }

    /// Default production handle: lazy CLI tesseract.
    pub fn tesseract() -> Self {
        Self::lazy(|| Box::new(TesseractCli::new()))
    }

    /// Run recognition, starting the engine if needed. The mutex guards
    /// both lazy initialisation and the recognition call itself.
    pub async fn recognize(
        &self,
        png: &[u8],
        language: &str,
    ) -> Result<OcrOutcome, ExtractionError> {
        let mut guard = self.engine.lock().await;
        if guard.is_none() {
            match &self.factory {
                Some(factory) => {
                    debug!("starting OCR engine");
                    *guard = Some(factory());
                }
                None => {
                    return Err(ExtractionError::OcrFailed {
                        detail: "OCR engine has been released".into(),
                    })
                }
            }
        }
        guard
            .as_ref()
            .expect("engine initialised above")
            .recognize(png, language)
            .await
    }

    /// Tear down the engine, releasing its worker resources. A lazy handle
    /// restarts on the next recognition; a preloaded one stays released.
    pub async fn shutdown(&self) {
        let mut guard = self.engine.lock().await;
        if let Some(engine) = guard.take() {
            engine.shutdown().await;
            debug!("OCR engine released");
        }
    }
}

/// Shell-out implementation over the `tesseract` binary.
pub struct TesseractCli {
    binary: String,
}

impl TesseractCli {
    pub fn new() -> Self {
        Self {
            binary: "tesseract".into(),
        }
    }

    pub fn with_binary(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
        }
    }
}

impl Default for TesseractCli {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl OcrEngine for TesseractCli {
    async fn recognize(&self, png: &[u8], language: &str) -> Result<OcrOutcome, ExtractionError> {
        let dir = tempfile::tempdir().map_err(|e| ExtractionError::Internal(format!(
            "tempdir for OCR input: {e}"
        )))?;
        let img_path = dir.path().join("page.png");
        tokio::fs::write(&img_path, png)
            .await
            .map_err(|e| ExtractionError::Internal(format!("write OCR input: {e}")))?;

        let output = tokio::process::Command::new(&self.binary)
            .arg(&img_path)
            .arg("stdout")
            .arg("-l")
            .arg(language)
            .arg("tsv")
            .output()
            .await
            .map_err(|e| ExtractionError::OcrFailed {
                detail: format!("failed to run {}: {e}", self.binary),
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            warn!("tesseract exited with {}: {}", output.status, stderr.trim());
            return Err(ExtractionError::OcrFailed {
                detail: format!("tesseract exited with {}", output.status),
            });
        }

        Ok(parse_tsv(&String::from_utf8_lossy(&output.stdout)))
    }
}

/// Assemble text and mean confidence from tesseract's TSV output.
///
/// Level-5 rows are words; the line/paragraph numbering columns drive
/// whitespace reconstruction. Rows with negative confidence (layout rows,
/// rejected glyphs) are excluded from the mean.
fn parse_tsv(tsv: &str) -> OcrOutcome {
    let mut text = String::new();
    let mut confidences: Vec<f32> = Vec::new();
    let mut last_line_key: Option<(u32, u32, u32)> = None;

    for row in tsv.lines().skip(1) {
        let cols: Vec<&str> = row.split('\t').collect();
        if cols.len() < 12 {
            continue;
        }
        let level: u32 = cols[0].parse().unwrap_or(0);
        if level != 5 {
            continue;
        }
        let word = cols[11];
        if word.trim().is_empty() {
            continue;
        }

        let line_key = (
            cols[2].parse().unwrap_or(0), // block
            cols[3].parse().unwrap_or(0), // paragraph
            cols[4].parse().unwrap_or(0), // line
        );
        match last_line_key {
            Some(prev) if prev == line_key => text.push(' '),
            Some(_) => text.push('\n'),
            None => {}
        }
        last_line_key = Some(line_key);
        text.push_str(word);

        if let Ok(conf) = cols[10].parse::<f32>() {
            if conf >= 0.0 {
                confidences.push(conf);
            }
        }
    }

    let confidence = if confidences.is_empty() {
        0.0
    } else {
        confidences.iter().sum::<f32>() / confidences.len() as f32
    };

    OcrOutcome { text, confidence }
}

/// Fixed-response engine for tests and for deployments without tesseract.
pub struct MockOcrEngine {
    text: String,
    confidence: f32,
}

impl MockOcrEngine {
    pub fn new(text: impl Into<String>, confidence: f32) -> Self {
        Self {
            text: text.into(),
            confidence,
        }
    }
}

#[async_trait]
impl OcrEngine for MockOcrEngine {
    async fn recognize(&self, _png: &[u8], _language: &str) -> Result<OcrOutcome, ExtractionError> {
        Ok(OcrOutcome {
            text: self.text.clone(),
            confidence: self.confidence,
        })
    }
}
