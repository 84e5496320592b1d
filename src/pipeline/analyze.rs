//! Stage 2: risk analysis.
//!
//! [`DynamicDocumentAnalyzer`] classifies the document, asks the completion
//! service for a structured risk assessment, repairs whatever JSON comes
//! back, and — when the service fails outright or returns nothing
//! salvageable — falls back to a local pattern analyzer. The stage never
//! returns an error: every path ends in a usable
//! [`DynamicAnalysisResult`], tagged with its provenance via
//! [`AnalysisOutcome`].

use std::sync::Arc;
use std::time::Instant;

use once_cell::sync::Lazy;
use regex::{Regex, RegexBuilder};
use tracing::{debug, info, warn};

use crate::analysis::{
    AnalysisOutcome, AnalysisSummary, DocumentHighlight, DocumentIssue, DynamicAnalysisResult,
    HighlightKind, RiskLevel, Severity, VisualConfig,
};
use crate::completion::{ChatMessage, CompletionClient, CompletionOptions};
use crate::config::AnalyzerConfig;
use crate::document::ProcessedDocument;
use crate::error::AnalysisFailure;
use crate::highlight::expand_to_sentence;
use crate::pipeline::repair::{parse_completion, RecoveredAnalysis, RepairFidelity};
use crate::prompts::{analysis_prompt, STRUCTURED_TEXT_SENTINEL};
use crate::theme::{color_scheme, layout, DocumentStats};

/// Default classification when no category scores a single match.
pub const DEFAULT_DOCUMENT_TYPE: &str = "legal_agreement";

/// Score bonus when the filename itself matches a category.
const FILENAME_BOOST: usize = 5;

struct Category {
    name: &'static str,
    patterns: Vec<Regex>,
}

fn ci(pattern: &str) -> Regex {
    RegexBuilder::new(pattern)
        .case_insensitive(true)
        .build()
        .expect("static category pattern")
}

static CATEGORIES: Lazy<Vec<Category>> = Lazy::new(|| {
    vec![
        Category {
            name: "legal_agreement",
            patterns: vec![
                ci(r"\bagreement\b"),
                ci(r"\bcontract\b"),
                ci(r"\bparty\b|\bparties\b"),
                ci(r"terms\s+and\s+conditions"),
                ci(r"\bwhereas\b"),
                ci(r"\bhereby\b"),
                ci(r"\bobligations?\b"),
            ],
        },
        Category {
            name: "financial_report",
            patterns: vec![
                ci(r"\brevenue\b"),
                ci(r"\bprofit\b|\bloss\b"),
                ci(r"balance\s+sheet"),
                ci(r"\bfiscal\b"),
                ci(r"\bquarterly\b|\bannual\s+report\b"),
                ci(r"\bearnings\b"),
                ci(r"\bassets\b|\bliabilities\b"),
            ],
        },
        Category {
            name: "policy_document",
            patterns: vec![
                ci(r"\bpolicy\b|\bpolicies\b"),
                ci(r"\bprocedures?\b"),
                ci(r"\bcompliance\b"),
                ci(r"\bguidelines?\b"),
                ci(r"\bregulations?\b"),
            ],
        },
        Category {
            name: "employment_contract",
            patterns: vec![
                ci(r"\bemployee\b"),
                ci(r"\bemployer\b"),
                ci(r"\bsalary\b|\bcompensation\b"),
                ci(r"\bemployment\b"),
                ci(r"\bbenefits\b"),
                ci(r"\bprobation(ary)?\b"),
            ],
        },
        Category {
            name: "lease_agreement",
            patterns: vec![
                ci(r"\blease\b"),
                ci(r"\blandlord\b"),
                ci(r"\btenant\b"),
                ci(r"\brent\b"),
                ci(r"\bpremises\b"),
                ci(r"security\s+deposit"),
            ],
        },
        Category {
            name: "technical_spec",
            patterns: vec![
                ci(r"\bspecifications?\b"),
                ci(r"\bapi\b"),
                ci(r"\barchitecture\b"),
                ci(r"system\s+requirements"),
                ci(r"\bimplementation\b"),
            ],
        },
    ]
});

/// Classify a document by keyword frequency, with a fixed score bonus when
/// the filename itself names the category. Ties resolve to the earlier
/// category in declaration order; no matches at all resolve to
/// [`DEFAULT_DOCUMENT_TYPE`].
pub fn detect_document_type(text: &str, file_name: &str) -> String {
    // Collapse separators so "employment-contract_v2.pdf" still matches.
    let collapsed_name: String = file_name
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect();

    let mut best: Option<(&'static str, usize)> = None;
    for category in CATEGORIES.iter() {
        let mut score: usize = category
            .patterns
            .iter()
            .map(|p| p.find_iter(text).count())
            .sum();
        if category.patterns.iter().any(|p| p.is_match(&collapsed_name)) {
            score += FILENAME_BOOST;
        }
        match best {
            Some((_, top)) if score <= top => {}
            _ if score == 0 => {}
            _ => best = Some((category.name, score)),
        }
    }

    best.map(|(name, _)| name.to_string())
        .unwrap_or_else(|| DEFAULT_DOCUMENT_TYPE.to_string())
}

/// The analysis stage.
pub struct DynamicDocumentAnalyzer {
    client: Arc<dyn CompletionClient>,
    config: AnalyzerConfig,
}

impl DynamicDocumentAnalyzer {
    pub fn new(client: Arc<dyn CompletionClient>, config: AnalyzerConfig) -> Self {
        Self { client, config }
    }

    /// Analyze one processed document. Infallible: service or parse
    /// failures degrade to the local pattern analyzer, and the outcome tag
    /// records which path produced the result.
    pub async fn analyze_document(
        &self,
        document: &ProcessedDocument,
        file_name: &str,
    ) -> AnalysisOutcome {
        let started = Instant::now();
        let document_type = detect_document_type(&document.text, file_name);
        debug!(document_type, words = document.metadata.word_count, "analysis started");

        let excerpt = truncate_at_char_boundary(&document.text, self.config.max_analysis_chars);
        let prompt = analysis_prompt(&document_type, excerpt, document.metadata.word_count);
        let options = CompletionOptions {
            model: self.config.model.clone(),
            temperature: self.config.temperature,
            max_tokens: self.config.max_tokens,
        };

        let raw = match self
            .client
            .complete(&[ChatMessage::user(prompt)], &options)
            .await
        {
            Ok(raw) => raw,
            Err(failure) => {
                warn!(error = %failure, "completion service failed, using pattern analysis");
                let result = self.pattern_analysis(document, &document_type, started);
                return AnalysisOutcome::Degraded(result, failure);
            }
        };

        match parse_completion(&raw) {
            Ok((recovered, fidelity)) => {
                let result =
                    self.assemble(document, &document_type, recovered, started);
                info!(
                    document_type = result.document_type,
                    highlights = result.highlights.len(),
                    issues = result.issues.len(),
                    degraded = false,
                    elapsed_ms = result.summary.processing_time_ms,
                    "analysis complete"
                );
                match fidelity {
                    RepairFidelity::Clean => AnalysisOutcome::Full(result),
                    RepairFidelity::Partial => AnalysisOutcome::Recovered(result),
                }
            }
            Err(failure) => {
                warn!(error = %failure, "completion unparseable, using pattern analysis");
                let result = self.pattern_analysis(document, &document_type, started);
                AnalysisOutcome::Degraded(result, failure)
            }
        }
    }

    /// Build the final result from a repaired completion.
    fn assemble(
        &self,
        document: &ProcessedDocument,
        document_type: &str,
        recovered: RecoveredAnalysis,
        started: Instant,
    ) -> DynamicAnalysisResult {
        // The model is told to return the sentinel, not the text. A returned
        // text is accepted only when it is plausibly the full document;
        // anything shorter is a paraphrase and would invalidate offsets.
        let structured_text = match recovered.structured_text {
            Some(ref t)
                if t != STRUCTURED_TEXT_SENTINEL
                    && t.len() * 10 >= document.text.len() * 8 =>
            {
                t.clone()
            }
            _ => document.text.clone(),
        };

        let highlights = sanitize_highlights(&structured_text, recovered.highlights);

        let mut summary = AnalysisSummary::placeholder(document.metadata.word_count);
        if let Some(summary_in) = recovered.summary {
            if let Some(risk) = summary_in.overall_risk {
                summary.overall_risk = risk;
            }
            summary.key_points = summary_in.key_points;
            summary.recommendations = summary_in.recommendations;
        }
        summary.processing_time_ms = started.elapsed().as_millis() as u64;
        let overall_risk = summary.overall_risk;

        let visual_config =
            self.visual_config(document, document_type, overall_risk, highlights.len());

        DynamicAnalysisResult {
            structured_text,
            document_type: document_type.to_string(),
            highlights,
            issues: recovered.issues,
            summary,
            visual_config,
        }
    }

    /// Local heuristic analysis: fixed risk patterns over the raw text.
    fn pattern_analysis(
        &self,
        document: &ProcessedDocument,
        document_type: &str,
        started: Instant,
    ) -> DynamicAnalysisResult {
        let text = &document.text;
        let mut highlights = Vec::new();

        for rule in RISK_RULES.iter() {
            for found in rule.pattern.find_iter(text) {
                let (start, end) = expand_to_sentence(text, found.start(), found.end(), &self.config);
                highlights.push(DocumentHighlight {
                    start,
                    end,
                    kind: rule.kind,
                    confidence: PATTERN_CONFIDENCE,
                    reason: rule.reason.to_string(),
                    category: "Pattern Analysis".to_string(),
                });
            }
        }

        let risky = highlights
            .iter()
            .filter(|h| h.kind == HighlightKind::Risky)
            .count();

        let mut issues = Vec::new();
        if risky > 0 {
            issues.push(DocumentIssue {
                severity: Severity::Warning,
                title: "Unfavorable terms detected".into(),
                description: format!(
                    "Pattern analysis flagged {risky} clause(s) that commonly disadvantage the signing party."
                ),
                location: 50,
                visual_priority: 7,
                action_required: true,
                compliance_issue: false,
                icon: "alert-triangle".into(),
                color: "#f59e0b".into(),
            });
        }

        let overall_risk = if risky > 2 {
            RiskLevel::High
        } else if risky > 0 {
            RiskLevel::Medium
        } else {
            RiskLevel::Low
        };

        let summary = AnalysisSummary {
            overall_risk,
            key_points: vec![format!(
                "Automated pattern review flagged {} clause(s) across {} known risk categories",
                highlights.len(),
                RISK_RULES.len()
            )],
            recommendations: vec![
                "Review the flagged clauses with a qualified professional".into(),
            ],
            word_count: document.metadata.word_count,
            processing_time_ms: started.elapsed().as_millis() as u64,
        };

        let visual_config =
            self.visual_config(document, document_type, overall_risk, highlights.len());

        DynamicAnalysisResult {
            structured_text: text.clone(),
            document_type: document_type.to_string(),
            highlights,
            issues,
            summary,
            visual_config,
        }
    }

    fn visual_config(
        &self,
        document: &ProcessedDocument,
        document_type: &str,
        risk: RiskLevel,
        highlight_count: usize,
    ) -> VisualConfig {
        let stats = DocumentStats {
            word_count: document.metadata.word_count,
            page_count: document.metadata.page_count.unwrap_or(1),
            paragraph_count: document
                .structured
                .as_ref()
                .map(|s| s.paragraph_count())
                .unwrap_or_else(|| document.text.split("\n\n").count()),
        };
        VisualConfig {
            color_scheme: color_scheme(document_type, risk),
            layout: layout(stats, highlight_count),
        }
    }
}

const PATTERN_CONFIDENCE: f32 = 0.7;

struct RiskRule {
    pattern: Regex,
    kind: HighlightKind,
    reason: &'static str,
}

static RISK_RULES: Lazy<Vec<RiskRule>> = Lazy::new(|| {
    vec![
        RiskRule {
            pattern: ci(r"auto(?:matic(?:ally)?)?[\s-]*renew\w*"),
            kind: HighlightKind::Risky,
            reason: "Automatic renewal clause: the agreement extends itself unless actively cancelled",
        },
        RiskRule {
            pattern: ci(r"non-?refundable"),
            kind: HighlightKind::Risky,
            reason: "Non-refundable payment: money is not recoverable if the deal falls through",
        },
        RiskRule {
            pattern: ci(r"indemnif\w*"),
            kind: HighlightKind::Attention,
            reason: "Indemnification clause: one party shoulders the other's losses or legal costs",
        },
        RiskRule {
            pattern: ci(r"force\s+majeure"),
            kind: HighlightKind::Neutral,
            reason: "Force majeure clause: standard allocation of risk for events outside either party's control",
        },
        RiskRule {
            pattern: ci(r"terminat(?:e|ion|ed)\b"),
            kind: HighlightKind::Attention,
            reason: "Termination provision: review the notice period and grounds for ending the agreement",
        },
        RiskRule {
            pattern: ci(r"limitation\s+of\s+liability|liability\s+(?:is|shall\s+be)\s+limited"),
            kind: HighlightKind::Attention,
            reason: "Liability cap: recoverable damages are contractually limited",
        },
        RiskRule {
            pattern: ci(r"confidential\w*"),
            kind: HighlightKind::Favorable,
            reason: "Confidentiality clause: shared information is contractually protected",
        },
        RiskRule {
            pattern: ci(r"payment\s+(?:is\s+)?due|due\s+within\s+\d+\s+days"),
            kind: HighlightKind::Attention,
            reason: "Payment deadline: verify the due date and any late-payment consequences",
        },
    ]
});

/// Enforce offset validity against the text the highlights will annotate:
/// ends are clamped to the text length, and spans that remain empty or
/// land off a character boundary are dropped.
fn sanitize_highlights(
    text: &str,
    highlights: Vec<DocumentHighlight>,
) -> Vec<DocumentHighlight> {
    let len = text.len();
    highlights
        .into_iter()
        .filter_map(|mut h| {
            if h.end > len {
                h.end = len;
            }
            while h.end > 0 && !text.is_char_boundary(h.end) {
                h.end -= 1;
            }
            if h.start >= h.end || !text.is_char_boundary(h.start) {
                return None;
            }
            Some(h)
        })
        .collect()
}

fn truncate_at_char_boundary(text: &str, max: usize) -> &str {
    if text.len() <= max {
        return text;
    }
    let mut cut = max;
    while cut > 0 && !text.is_char_boundary(cut) {
        cut -= 1;
    }
    &text[..cut]
}
