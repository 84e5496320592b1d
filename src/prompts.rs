//! Prompts for the analysis stage.
//!
//! Centralising the prompt here keeps the contract between the analyzer and
//! the repair cascade in one place: the cascade's sentinel-excision step is
//! coupled to [`STRUCTURED_TEXT_SENTINEL`], so both must change together.
//! Unit tests can inspect the prompt directly without a live completion
//! service.

/// Placeholder the model is instructed to return for the `structured_text`
/// field instead of echoing document text. Echoed text breaks naive JSON
/// parsing (unescaped quotes, raw newlines) and is untrustworthy anyway —
/// the analyzer always substitutes the true original.
pub const STRUCTURED_TEXT_SENTINEL: &str = "USE_ORIGINAL_TEXT";

/// Build the analysis prompt for one document.
///
/// `document_type` is the detected category tag (underscores become spaces
/// for readability); `text` must already be truncated to the configured
/// analysis limit; `word_count` is the full document's count, which the
/// model copies into the summary.
pub fn analysis_prompt(document_type: &str, text: &str, word_count: usize) -> String {
    let readable_type = document_type.replace('_', " ");
    format!(
        r##"Analyze this {readable_type} document and return ONLY a valid JSON response. Do not include any text before or after the JSON.

CRITICAL: Return ONLY valid JSON with this exact structure:

{{
  "structured_text": "{STRUCTURED_TEXT_SENTINEL}",
  "highlights": [
    {{
      "start": 0,
      "end": 50,
      "type": "favorable",
      "confidence": 0.92,
      "reason": "Detailed explanation",
      "category": "Category name"
    }}
  ],
  "issues": [
    {{
      "severity": "warning",
      "title": "Brief title",
      "description": "One sentence explanation",
      "location": 75,
      "visual_priority": 8,
      "action_required": true,
      "compliance_issue": false,
      "icon": "alert-triangle",
      "color": "#f59e0b"
    }}
  ],
  "summary": {{
    "overall_risk": "medium",
    "key_points": ["Point 1", "Point 2"],
    "recommendations": ["Rec 1", "Rec 2"],
    "word_count": {word_count}
  }}
}}

RULES:
- For structured_text field, use exactly "{STRUCTURED_TEXT_SENTINEL}" - do not include actual text
- Create 3-8 highlights covering 50-200 character spans
- Use types: favorable, risky, attention, neutral
- Ensure all JSON strings are properly escaped
- Do not include any markdown formatting or code blocks

Document to analyze: {text}
"##
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prompt_carries_sentinel_and_text() {
        let p = analysis_prompt("legal_agreement", "The parties agree.", 3);
        assert!(p.contains(STRUCTURED_TEXT_SENTINEL));
        assert!(p.contains("legal agreement"));
        assert!(p.contains("The parties agree."));
        assert!(p.contains("\"word_count\": 3"));
        assert!(p.contains("\"color\": \"#f59e0b\""));
    }
}
