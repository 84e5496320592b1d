//! Configuration for the ingestion and analysis pipeline.
//!
//! All tunable behaviour lives in one [`AnalyzerConfig`], built via its
//! [`AnalyzerConfigBuilder`]. Keeping every knob in one struct makes it
//! trivial to share configs across stages, log them, and diff two runs to
//! understand why their outputs differ.
//!
//! Several fields are empirically tuned thresholds inherited from the
//! production corpus (paragraph gap, sentence expansion bounds). They are
//! deliberately configuration rather than hardcoded constants so they can be
//! adjusted per document corpus without a code change.

use serde::{Deserialize, Serialize};

/// Configuration shared by the extraction, analysis, and annotation stages.
///
/// Built via [`AnalyzerConfig::builder()`] or [`AnalyzerConfig::default()`].
///
/// # Example
/// ```rust
/// use clausemark::AnalyzerConfig;
///
/// let config = AnalyzerConfig::builder()
///     .model("claude-3-5-sonnet-20241022")
///     .max_analysis_chars(10_000)
///     .build()
///     .unwrap();
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyzerConfig {
    /// Completion model identifier sent with every analysis request.
    pub model: String,

    /// Sampling temperature for the completion request. Default: 0.1.
    ///
    /// Low temperature keeps the model faithful to the schema in the prompt.
    /// Higher values increase the rate of malformed JSON the repair cascade
    /// has to absorb.
    pub temperature: f32,

    /// Maximum tokens the completion may generate. Default: 4000.
    pub max_tokens: usize,

    /// Per-request timeout for the completion call in seconds. Default: 60.
    pub api_timeout_secs: u64,

    /// Maximum number of characters of document text included in the
    /// analysis request. Default: 15 000.
    ///
    /// The full text is always retained separately for the final result's
    /// `structured_text` — the truncated prefix exists only to respect the
    /// completion service's context limits.
    pub max_analysis_chars: usize,

    /// Vertical gap (in PDF layout units) above which two consecutive lines
    /// are considered separate paragraphs. Default: 20.0.
    pub paragraph_gap: f32,

    /// Minimum length of an expanded highlight span in characters.
    /// Default: 50.
    pub expand_min_chars: usize,

    /// Maximum length of an expanded highlight span in characters.
    /// Default: 500. Spans over the limit are truncated at the nearest word
    /// boundary.
    pub expand_max_chars: usize,

    /// Paragraphs shorter than this are skipped when rendering structured
    /// text, to avoid visual noise from extraction fragments. Default: 50.
    pub min_paragraph_chars: usize,

    /// Target pixel width when rasterising a PDF page for the OCR fallback.
    /// Default: 1600.
    pub ocr_render_width: u32,

    /// OCR language code passed to the engine. Default: "eng".
    pub ocr_language: String,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            model: "claude-3-5-sonnet-20241022".to_string(),
            temperature: 0.1,
            max_tokens: 4000,
            api_timeout_secs: 60,
            max_analysis_chars: 15_000,
            paragraph_gap: 20.0,
            expand_min_chars: 50,
            expand_max_chars: 500,
            min_paragraph_chars: 50,
            ocr_render_width: 1600,
            ocr_language: "eng".to_string(),
        }
    }
}

impl AnalyzerConfig {
    /// Create a new builder for `AnalyzerConfig`.
    pub fn builder() -> AnalyzerConfigBuilder {
        AnalyzerConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`AnalyzerConfig`].
#[derive(Debug)]
pub struct AnalyzerConfigBuilder {
    config: AnalyzerConfig,
}

impl AnalyzerConfigBuilder {
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = model.into();
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn max_tokens(mut self, n: usize) -> Self {
        self.config.max_tokens = n;
        self
    }

    pub fn api_timeout_secs(mut self, secs: u64) -> Self {
        self.config.api_timeout_secs = secs;
        self
    }

    pub fn max_analysis_chars(mut self, n: usize) -> Self {
        self.config.max_analysis_chars = n;
        self
    }

    pub fn paragraph_gap(mut self, gap: f32) -> Self {
        self.config.paragraph_gap = gap.max(0.0);
        self
    }

    pub fn expand_min_chars(mut self, n: usize) -> Self {
        self.config.expand_min_chars = n;
        self
    }

    pub fn expand_max_chars(mut self, n: usize) -> Self {
        self.config.expand_max_chars = n;
        self
    }

    pub fn min_paragraph_chars(mut self, n: usize) -> Self {
        self.config.min_paragraph_chars = n;
        self
    }

    pub fn ocr_render_width(mut self, px: u32) -> Self {
        self.config.ocr_render_width = px.max(100);
        self
    }

    pub fn ocr_language(mut self, lang: impl Into<String>) -> Self {
        self.config.ocr_language = lang.into();
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<AnalyzerConfig, crate::error::ExtractionError> {
        let c = &self.config;
        if c.max_analysis_chars == 0 {
            return Err(crate::error::ExtractionError::Internal(
                "max_analysis_chars must be ≥ 1".into(),
            ));
        }
        if c.expand_min_chars > c.expand_max_chars {
            return Err(crate::error::ExtractionError::Internal(format!(
                "expand_min_chars ({}) exceeds expand_max_chars ({})",
                c.expand_min_chars, c.expand_max_chars
            )));
        }
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_tuned_thresholds() {
        let c = AnalyzerConfig::default();
        assert_eq!(c.max_analysis_chars, 15_000);
        assert_eq!(c.paragraph_gap, 20.0);
        assert_eq!(c.expand_min_chars, 50);
        assert_eq!(c.expand_max_chars, 500);
    }

    #[test]
    fn builder_rejects_inverted_expansion_bounds() {
        let result = AnalyzerConfig::builder()
            .expand_min_chars(600)
            .expand_max_chars(500)
            .build();
        assert!(result.is_err());
    }

    #[test]
    fn temperature_is_clamped() {
        let c = AnalyzerConfig::builder().temperature(5.0).build().unwrap();
        assert_eq!(c.temperature, 2.0);
    }
}
