//! Output types of the analysis stage.
//!
//! A [`DynamicAnalysisResult`] is recomputed on every analysis request and
//! is not persisted as history — callers may associate the latest result
//! with a document, but each run returns fresh. Highlight offsets are valid
//! only against the exact `structured_text` they were computed over.

use serde::{Deserialize, Serialize};

use crate::error::AnalysisFailure;
use crate::theme::{ColorScheme, LayoutConfig};

/// Risk classification attached to a highlight span.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HighlightKind {
    Favorable,
    Risky,
    Attention,
    Neutral,
}

impl HighlightKind {
    /// CSS class suffix used by the annotation stage.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Favorable => "favorable",
            Self::Risky => "risky",
            Self::Attention => "attention",
            Self::Neutral => "neutral",
        }
    }
}

/// A `[start, end)` character-offset annotation over a specific text
/// snapshot.
///
/// Invariant: `0 <= start < end <= structured_text.len()`. Spans may
/// overlap as produced by detection; the annotation stage processes them in
/// descending start order so earlier offsets stay valid while splicing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentHighlight {
    pub start: usize,
    pub end: usize,
    #[serde(rename = "type")]
    pub kind: HighlightKind,
    /// 0.0–1.0.
    pub confidence: f32,
    pub reason: String,
    pub category: String,
}

/// Severity of a document-level issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Critical,
    Warning,
    Info,
}

/// A document-level finding, positioned as a percentage through the text.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentIssue {
    pub severity: Severity,
    pub title: String,
    pub description: String,
    /// 0–100, percent through the document.
    pub location: u8,
    /// 1–10.
    pub visual_priority: u8,
    pub action_required: bool,
    pub compliance_issue: bool,
    pub icon: String,
    pub color: String,
}

/// Overall risk level for the document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

/// Summary block of an analysis.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisSummary {
    pub overall_risk: RiskLevel,
    pub key_points: Vec<String>,
    pub recommendations: Vec<String>,
    pub word_count: usize,
    /// Wall-clock time the analysis took, including any repair or fallback
    /// work.
    #[serde(default)]
    pub processing_time_ms: u64,
}

impl AnalysisSummary {
    /// Neutral defaults used when the summary could not be recovered.
    pub fn placeholder(word_count: usize) -> Self {
        Self {
            overall_risk: RiskLevel::Medium,
            key_points: Vec::new(),
            recommendations: Vec::new(),
            word_count,
            processing_time_ms: 0,
        }
    }
}

/// Presentation hints derived deterministically from document type and
/// risk level.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VisualConfig {
    pub color_scheme: ColorScheme,
    pub layout: LayoutConfig,
}

/// The analysis stage's output.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DynamicAnalysisResult {
    /// Always the original extracted text (never a paraphrase) — it is the
    /// substrate for offset-based highlighting.
    pub structured_text: String,
    /// Classification tag, e.g. `legal_agreement`, `financial_report`.
    pub document_type: String,
    pub highlights: Vec<DocumentHighlight>,
    pub issues: Vec<DocumentIssue>,
    pub summary: AnalysisSummary,
    pub visual_config: VisualConfig,
}

/// How much trust a caller can place in an analysis.
///
/// `analyze_document` never fails; instead the provenance of the result is
/// tagged so callers can distinguish a fully model-derived analysis from
/// one stitched together by the repair cascade or computed locally.
#[derive(Debug, Clone)]
pub enum AnalysisOutcome {
    /// The completion parsed cleanly (possibly after cosmetic repair such
    /// as fence stripping).
    Full(DynamicAnalysisResult),
    /// The completion was malformed; individual fields were recovered in
    /// isolation and the rest defaulted.
    Recovered(DynamicAnalysisResult),
    /// The remote call failed or nothing was recoverable; the result comes
    /// entirely from the local heuristic analyzer.
    Degraded(DynamicAnalysisResult, AnalysisFailure),
}

impl AnalysisOutcome {
    /// The analysis result, whatever its provenance.
    pub fn result(&self) -> &DynamicAnalysisResult {
        match self {
            Self::Full(r) | Self::Recovered(r) | Self::Degraded(r, _) => r,
        }
    }

    /// Consume the outcome, discarding provenance.
    pub fn into_result(self) -> DynamicAnalysisResult {
        match self {
            Self::Full(r) | Self::Recovered(r) | Self::Degraded(r, _) => r,
        }
    }

    pub fn is_degraded(&self) -> bool {
        matches!(self, Self::Degraded(..))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn highlight_kind_serializes_lowercase() {
        let json = serde_json::to_string(&HighlightKind::Favorable).unwrap();
        assert_eq!(json, "\"favorable\"");
        let back: HighlightKind = serde_json::from_str("\"risky\"").unwrap();
        assert_eq!(back, HighlightKind::Risky);
    }

    #[test]
    fn highlight_kind_field_named_type_on_the_wire() {
        let h = DocumentHighlight {
            start: 0,
            end: 10,
            kind: HighlightKind::Attention,
            confidence: 0.9,
            reason: "r".into(),
            category: "c".into(),
        };
        let json = serde_json::to_value(&h).unwrap();
        assert_eq!(json["type"], "attention");
    }

    #[test]
    fn outcome_accessors() {
        let r = DynamicAnalysisResult {
            structured_text: "t".into(),
            document_type: "legal_agreement".into(),
            highlights: vec![],
            issues: vec![],
            summary: AnalysisSummary::placeholder(1),
            visual_config: VisualConfig {
                color_scheme: crate::theme::color_scheme("legal_agreement", RiskLevel::Low),
                layout: LayoutConfig::default(),
            },
        };
        let outcome = AnalysisOutcome::Degraded(
            r,
            crate::error::AnalysisFailure::Service("down".into()),
        );
        assert!(outcome.is_degraded());
        assert_eq!(outcome.result().document_type, "legal_agreement");
    }
}
