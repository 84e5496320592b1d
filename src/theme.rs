//! Presentation hints: per-document-type color schemes and layout density.
//!
//! Everything here is a pure lookup or a pure function of document
//! statistics — no I/O, no state. The palettes are fixed per document type
//! and only the high-risk override changes them.

use serde::{Deserialize, Serialize};

use crate::analysis::RiskLevel;

/// Palette used by the annotation stage and any UI on top of it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColorScheme {
    pub primary: String,
    pub gradient: String,
    pub favorable: String,
    pub risky: String,
    pub attention: String,
    pub neutral: String,
}

impl ColorScheme {
    fn new(
        primary: &str,
        gradient: &str,
        favorable: &str,
        risky: &str,
        attention: &str,
        neutral: &str,
    ) -> Self {
        Self {
            primary: primary.into(),
            gradient: gradient.into(),
            favorable: favorable.into(),
            risky: risky.into(),
            attention: attention.into(),
            neutral: neutral.into(),
        }
    }
}

/// Base palette for a document type. Unknown types get the legal-agreement
/// palette.
fn base_scheme(document_type: &str) -> ColorScheme {
    match document_type {
        "financial_report" => ColorScheme::new(
            "#0891b2",
            "linear-gradient(135deg, #0891b2 0%, #1e40af 100%)",
            "#059669",
            "#dc2626",
            "#d97706",
            "#6b7280",
        ),
        "policy_document" => ColorScheme::new(
            "#7c2d12",
            "linear-gradient(135deg, #7c2d12 0%, #92400e 100%)",
            "#16a34a",
            "#dc2626",
            "#ea580c",
            "#78716c",
        ),
        "employment_contract" => ColorScheme::new(
            "#be185d",
            "linear-gradient(135deg, #be185d 0%, #c2410c 100%)",
            "#16a34a",
            "#dc2626",
            "#d97706",
            "#6b7280",
        ),
        "lease_agreement" => ColorScheme::new(
            "#7c3aed",
            "linear-gradient(135deg, #7c3aed 0%, #a21caf 100%)",
            "#059669",
            "#dc2626",
            "#ea580c",
            "#64748b",
        ),
        "technical_spec" => ColorScheme::new(
            "#0f766e",
            "linear-gradient(135deg, #0f766e 0%, #065f46 100%)",
            "#10b981",
            "#ef4444",
            "#f59e0b",
            "#6b7280",
        ),
        _ => ColorScheme::new(
            "#4f46e5",
            "linear-gradient(135deg, #4f46e5 0%, #7c3aed 100%)",
            "#10b981",
            "#ef4444",
            "#f59e0b",
            "#64748b",
        ),
    }
}

/// Palette for a document type, with the high-risk override applied.
///
/// High overall risk swaps the primary color and gradient for the red
/// palette regardless of type; the per-kind highlight colors are unchanged.
pub fn color_scheme(document_type: &str, risk: RiskLevel) -> ColorScheme {
    let mut scheme = base_scheme(document_type);
    if risk == RiskLevel::High {
        scheme.primary = "#dc2626".into();
        scheme.gradient = "linear-gradient(135deg, #dc2626 0%, #991b1b 100%)".into();
    }
    scheme
}

/// Document statistics feeding the layout heuristic.
#[derive(Debug, Clone, Copy)]
pub struct DocumentStats {
    pub word_count: usize,
    pub page_count: usize,
    pub paragraph_count: usize,
}

/// Discrete UI density choices derived from document complexity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LayoutConfig {
    pub sidebar_width: String,
    pub main_content_cols: u8,
    pub show_mini_map: bool,
    pub navigation_style: String,
    pub highlight_density: String,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            sidebar_width: "280px".into(),
            main_content_cols: 1,
            show_mini_map: false,
            navigation_style: "simple".into(),
            highlight_density: "spacious".into(),
        }
    }
}

/// Complexity score in [0, 1] from word count, page count, and paragraph
/// count thresholds.
fn complexity(stats: DocumentStats) -> f32 {
    let mut score: f32 = 0.0;
    if stats.word_count > 5_000 {
        score += 0.3;
    }
    if stats.word_count > 10_000 {
        score += 0.2;
    }
    if stats.page_count > 10 {
        score += 0.2;
    }
    if stats.page_count > 20 {
        score += 0.2;
    }
    if stats.paragraph_count > 50 {
        score += 0.1;
    }
    score.min(1.0)
}

/// Map document stats and highlight volume to discrete layout choices.
pub fn layout(stats: DocumentStats, highlight_count: usize) -> LayoutConfig {
    let c = complexity(stats);
    LayoutConfig {
        sidebar_width: if c > 0.7 { "320px" } else { "280px" }.into(),
        main_content_cols: if c > 0.8 { 2 } else { 1 },
        show_mini_map: stats.page_count > 5,
        navigation_style: if c > 0.6 { "detailed" } else { "simple" }.into(),
        highlight_density: if highlight_count > 50 {
            "compact"
        } else {
            "spacious"
        }
        .into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_type_gets_legal_palette() {
        let scheme = color_scheme("shopping_list", RiskLevel::Low);
        assert_eq!(scheme.primary, "#4f46e5");
    }

    #[test]
    fn high_risk_overrides_primary() {
        let scheme = color_scheme("financial_report", RiskLevel::High);
        assert_eq!(scheme.primary, "#dc2626");
        // Per-kind colors keep the type palette.
        assert_eq!(scheme.favorable, "#059669");
    }

    #[test]
    fn complexity_is_capped_at_one() {
        let stats = DocumentStats {
            word_count: 50_000,
            page_count: 100,
            paragraph_count: 500,
        };
        assert!(complexity(stats) <= 1.0);
    }

    #[test]
    fn simple_document_gets_simple_layout() {
        let stats = DocumentStats {
            word_count: 800,
            page_count: 2,
            paragraph_count: 12,
        };
        let l = layout(stats, 5);
        assert_eq!(l.main_content_cols, 1);
        assert!(!l.show_mini_map);
        assert_eq!(l.navigation_style, "simple");
        assert_eq!(l.highlight_density, "spacious");
    }

    #[test]
    fn dense_document_gets_dense_layout() {
        let stats = DocumentStats {
            word_count: 12_000,
            page_count: 25,
            paragraph_count: 80,
        };
        let l = layout(stats, 60);
        assert_eq!(l.sidebar_width, "320px");
        assert_eq!(l.main_content_cols, 2);
        assert!(l.show_mini_map);
        assert_eq!(l.navigation_style, "detailed");
        assert_eq!(l.highlight_density, "compact");
    }
}
