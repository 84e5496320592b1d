//! Repair cascade for malformed completion-service JSON.
//!
//! ## Why is repair necessary?
//!
//! The completion service is not contract-reliable. Even with a prompt that
//! demands bare JSON, responses arrive:
//!
//! - wrapped in ` ```json … ``` ` fences,
//! - surrounded by prose ("Here is the analysis you asked for: {…}"),
//! - with the literal document text inlined into the `structured_text`
//!   field despite the sentinel instruction — unescaped quotes and raw
//!   newlines that break any JSON parser,
//! - or truncated mid-object.
//!
//! Each failure mode gets its own named, independently-testable step, run
//! in a fixed order. The cascade ends in partial recovery: the
//! `highlights`, `issues`, and `summary` fields are regex-extracted and
//! parsed in isolation, with any sub-failure yielding a default rather
//! than aborting the whole result. Only when nothing at all is salvageable
//! does the caller fall back to the local heuristic analyzer.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use serde_json::Value;

use crate::analysis::{DocumentHighlight, DocumentIssue, RiskLevel};
use crate::error::AnalysisFailure;
use crate::prompts::STRUCTURED_TEXT_SENTINEL;

/// Summary fields as far as they could be recovered.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RecoveredSummary {
    pub overall_risk: Option<RiskLevel>,
    #[serde(default)]
    pub key_points: Vec<String>,
    #[serde(default)]
    pub recommendations: Vec<String>,
    pub word_count: Option<usize>,
}

/// A completion response after repair: every field best-effort.
#[derive(Debug, Clone, Default)]
pub struct RecoveredAnalysis {
    pub structured_text: Option<String>,
    pub highlights: Vec<DocumentHighlight>,
    pub issues: Vec<DocumentIssue>,
    pub summary: Option<RecoveredSummary>,
}

impl RecoveredAnalysis {
    fn is_empty(&self) -> bool {
        self.highlights.is_empty() && self.issues.is_empty() && self.summary.is_none()
    }
}

/// How much of the response survived parsing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RepairFidelity {
    /// Parsed as one JSON document (possibly after cosmetic repair).
    Clean,
    /// Stitched together from independently-recovered fields.
    Partial,
}

/// Run the full cascade over a raw completion response.
///
/// Steps, in order: fence strip → largest-object extraction → sentinel
/// field excision → whole-document parse; on failure, per-field partial
/// recovery. Errors only when no field is salvageable.
pub fn parse_completion(
    raw: &str,
) -> Result<(RecoveredAnalysis, RepairFidelity), AnalysisFailure> {
    let defenced = strip_code_fences(raw);
    let candidate = extract_json_object(&defenced).unwrap_or(defenced.as_str());

    // A response that parses as-is is taken verbatim: a correctly escaped
    // structured_text value must survive untouched. Excision is strictly a
    // recovery step for responses the parser rejects.
    if let Ok(value) = serde_json::from_str::<Value>(candidate) {
        return Ok((from_value(value), RepairFidelity::Clean));
    }

    let excised = excise_sentinel_field(candidate);
    if let Ok(value) = serde_json::from_str::<Value>(&excised) {
        return Ok((from_value(value), RepairFidelity::Clean));
    }

    let partial = recover_partial(raw);
    if partial.is_empty() {
        return Err(AnalysisFailure::Unparseable(format!(
            "no recoverable fields in {}-byte response",
            raw.len()
        )));
    }
    Ok((partial, RepairFidelity::Partial))
}

// ── Step 1: strip markdown code fences ──────────────────────────────────

static RE_FENCES: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)^```(?:json)?\s*\n?(.*?)\n?```\s*$").unwrap());

/// Remove an outer ` ```json … ``` ` (or bare ``` … ```) wrapper.
pub fn strip_code_fences(input: &str) -> String {
    let trimmed = input.trim();
    match RE_FENCES.captures(trimmed) {
        Some(caps) => caps[1].to_string(),
        None => trimmed.to_string(),
    }
}

// ── Step 2: extract the JSON object from surrounding prose ──────────────

/// The largest `{…}` substring: first opening brace to last closing brace.
pub fn extract_json_object(input: &str) -> Option<&str> {
    let start = input.find('{')?;
    let end = input.rfind('}')?;
    if end <= start {
        return None;
    }
    Some(&input[start..=end])
}

// ── Step 3: excise an inlined structured_text value ──────────────────────

/// Replace the value of the `structured_text` field with the sentinel when
/// the model ignored the instruction and inlined real document text.
///
/// The scan walks from the value's opening quote looking for the closing
/// quote, skipping escaped quotes and refusing to close while inside a
/// brace nesting — inlined contract text routinely contains `{` and `}`
/// from template placeholders, and a quote inside those is not the end of
/// the value. If no safe closing quote is found the input is returned
/// unchanged and the cascade falls through to partial recovery.
pub fn excise_sentinel_field(input: &str) -> String {
    let quoted_sentinel = format!("\"{STRUCTURED_TEXT_SENTINEL}\"");
    if !input.contains("\"structured_text\"") || input.contains(&quoted_sentinel) {
        return input.to_string();
    }

    let bytes = input.as_bytes();
    let Some(field_pos) = input.find("\"structured_text\"") else {
        return input.to_string();
    };
    // Opening quote of the value: first quote after the field's colon.
    let after_field = field_pos + "\"structured_text\"".len();
    let Some(colon_off) = input[after_field..].find(':') else {
        return input.to_string();
    };
    let Some(quote_off) = input[after_field + colon_off..].find('"') else {
        return input.to_string();
    };
    let value_start = after_field + colon_off + quote_off + 1;

    let mut brace_depth: u32 = 0;
    let mut value_end = None;
    let mut i = value_start;
    while i < bytes.len() {
        match bytes[i] {
            b'"' if i > 0 && bytes[i - 1] != b'\\' => {
                // Only a quote at brace depth 0 that is followed by `,` or
                // `}` can be the value's closing quote; inlined text is full
                // of quotes followed by more prose.
                if brace_depth == 0 && closes_json_string(bytes, i) {
                    value_end = Some(i);
                    break;
                }
            }
            b'{' => brace_depth += 1,
            // Inlined text can contain `}` before any `{`; a negative depth
            // would keep the depth-0 check from ever firing again.
            b'}' => brace_depth = brace_depth.saturating_sub(1),
            _ => {}
        }
        i += 1;
    }

    match value_end {
        Some(end) if end > value_start => {
            let mut repaired = String::with_capacity(input.len());
            repaired.push_str(&input[..value_start]);
            repaired.push_str(STRUCTURED_TEXT_SENTINEL);
            repaired.push_str(&input[end..]);
            repaired
        }
        _ => input.to_string(),
    }
}

/// A quote ends a JSON string only when the next non-whitespace byte is a
/// separator (`,` or `}`) or the input ends.
fn closes_json_string(bytes: &[u8], quote: usize) -> bool {
    let mut j = quote + 1;
    while j < bytes.len() && bytes[j].is_ascii_whitespace() {
        j += 1;
    }
    j >= bytes.len() || bytes[j] == b',' || bytes[j] == b'}'
}

// ── Step 4: lenient conversion of a parsed document ──────────────────────

/// Convert a parsed JSON document, dropping malformed array elements
/// instead of rejecting the response.
fn from_value(value: Value) -> RecoveredAnalysis {
    let structured_text = value
        .get("structured_text")
        .and_then(Value::as_str)
        .map(String::from);

    RecoveredAnalysis {
        structured_text,
        highlights: lenient_array(value.get("highlights")),
        issues: lenient_array(value.get("issues")),
        summary: value
            .get("summary")
            .cloned()
            .and_then(|s| serde_json::from_value(s).ok()),
    }
}

/// Parse each array element independently; malformed elements are dropped.
fn lenient_array<T: serde::de::DeserializeOwned>(value: Option<&Value>) -> Vec<T> {
    value
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(|item| serde_json::from_value(item.clone()).ok())
                .collect()
        })
        .unwrap_or_default()
}

// ── Step 5: partial recovery of individual fields ────────────────────────

static RE_HIGHLIGHTS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?s)"highlights"\s*:\s*\[(.*?)\]"#).unwrap());
static RE_ISSUES: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?s)"issues"\s*:\s*\[(.*?)\]"#).unwrap());
static RE_SUMMARY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?s)"summary"\s*:\s*\{(.*?)\}"#).unwrap());

/// Regex-extract `highlights`, `issues`, and `summary` from an otherwise
/// unparseable response and parse each in isolation.
pub fn recover_partial(raw: &str) -> RecoveredAnalysis {
    let highlights = RE_HIGHLIGHTS
        .captures(raw)
        .map(|caps| parse_array_body(&caps[1]))
        .unwrap_or_default();
    let issues = RE_ISSUES
        .captures(raw)
        .map(|caps| parse_array_body(&caps[1]))
        .unwrap_or_default();
    let summary = RE_SUMMARY
        .captures(raw)
        .and_then(|caps| serde_json::from_str(&format!("{{{}}}", &caps[1])).ok());

    RecoveredAnalysis {
        structured_text: None,
        highlights,
        issues,
        summary,
    }
}

fn parse_array_body<T: serde::de::DeserializeOwned>(body: &str) -> Vec<T> {
    match serde_json::from_str::<Value>(&format!("[{body}]")) {
        Ok(Value::Array(items)) => items
            .into_iter()
            .filter_map(|item| serde_json::from_value(item).ok())
            .collect(),
        _ => Vec::new(),
    }
}
