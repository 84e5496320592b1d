//! Annotation stage: render character-offset highlight spans as inline
//! HTML without corrupting the surrounding text.
//!
//! Everything here is a pure, stateless transform. The one invariant that
//! matters is splice order: spans are sorted by start offset **descending**
//! and spliced right-to-left, so the offsets of every not-yet-processed
//! span remain valid — nothing before the current splice point has been
//! mutated yet.
//!
//! Overlapping spans are neither merged nor rejected. Processing right to
//! left keeps the markup well-formed for the later-processed span; visual
//! artifacts from the overlap itself are accepted (see DESIGN.md).

use crate::analysis::{DocumentHighlight, HighlightKind};
use crate::config::AnalyzerConfig;
use crate::document::StructuredText;
use crate::theme::ColorScheme;

/// Inline style set for one highlight kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HighlightStyle {
    pub background: &'static str,
    pub border_left: &'static str,
    pub box_shadow: &'static str,
}

/// Fixed per-kind style table.
pub fn highlight_style(kind: HighlightKind) -> HighlightStyle {
    match kind {
        HighlightKind::Favorable => HighlightStyle {
            background: "linear-gradient(120deg, #d1fae5 0%, #a7f3d0 100%)",
            border_left: "3px solid #10b981",
            box_shadow: "0 2px 4px rgba(16, 185, 129, 0.1)",
        },
        HighlightKind::Risky => HighlightStyle {
            background: "linear-gradient(120deg, #fef2f2 0%, #fecaca 100%)",
            border_left: "3px solid #ef4444",
            box_shadow: "0 2px 4px rgba(239, 68, 68, 0.1)",
        },
        HighlightKind::Attention => HighlightStyle {
            background: "linear-gradient(120deg, #fefce8 0%, #fde68a 100%)",
            border_left: "3px solid #f59e0b",
            box_shadow: "0 2px 4px rgba(245, 158, 11, 0.1)",
        },
        HighlightKind::Neutral => HighlightStyle {
            background: "linear-gradient(120deg, #f1f5f9 0%, #e2e8f0 100%)",
            border_left: "3px solid #64748b",
            box_shadow: "0 2px 4px rgba(100, 116, 139, 0.1)",
        },
    }
}

/// Drop spans that cannot be rendered: out of bounds, inverted, not on a
/// character boundary, or covering only whitespace.
fn valid_highlights<'a>(
    text: &str,
    highlights: &'a [DocumentHighlight],
) -> Vec<&'a DocumentHighlight> {
    highlights
        .iter()
        .filter(|h| {
            h.start < h.end
                && h.end <= text.len()
                && text.is_char_boundary(h.start)
                && text.is_char_boundary(h.end)
                && !text[h.start..h.end].trim().is_empty()
        })
        .collect()
}

/// Wrap each highlight span in a styled container with tooltip and
/// confidence badge, splicing right to left.
pub fn apply_highlighting(
    text: &str,
    highlights: &[DocumentHighlight],
    _scheme: &ColorScheme,
) -> String {
    let mut sorted = valid_highlights(text, highlights);
    if sorted.is_empty() {
        return text.to_string();
    }
    // Descending start offset: the splice-order invariant.
    sorted.sort_by(|a, b| b.start.cmp(&a.start));

    let mut result = text.to_string();
    for h in sorted {
        if h.end > result.len()
            || !result.is_char_boundary(h.start)
            || !result.is_char_boundary(h.end)
        {
            // An earlier (higher-start) overlapping splice moved this span's
            // end past safety; skip rather than corrupt.
            continue;
        }
        let covered = &result[h.start..h.end];
        if covered.trim().is_empty() {
            continue;
        }
        let wrapped = render_span(covered, h);
        result.replace_range(h.start..h.end, &wrapped);
    }
    result
}

/// The markup for one highlighted span.
fn render_span(covered: &str, h: &DocumentHighlight) -> String {
    let style = highlight_style(h.kind);
    let confidence_pct = (h.confidence * 100.0).round() as u32;
    format!(
        "<span class=\"highlight-{kind}\" style=\"background: {bg}; border-left: {bl}; \
         box-shadow: {bs}; border-radius: 4px; padding: 3px 6px; position: relative; \
         cursor: help;\">{covered}<span class=\"tooltip\">\
         <span class=\"tooltip-category\">{category}</span>\
         <span class=\"tooltip-reason\">{reason}</span>\
         <span class=\"tooltip-confidence\">Confidence: {confidence_pct}%</span>\
         </span><span class=\"confidence-badge\">{confidence_pct}%</span></span>",
        kind = h.kind.as_str(),
        bg = style.background,
        bl = style.border_left,
        bs = style.box_shadow,
        category = h.category,
        reason = h.reason,
    )
}

/// Static stylesheet for tooltip hover behaviour. Presentation only.
pub fn animation_css() -> &'static str {
    r#"<style>
.highlight-favorable, .highlight-risky, .highlight-attention, .highlight-neutral {
  display: inline; position: relative; transition: all 0.2s ease;
}
.highlight-favorable:hover, .highlight-risky:hover,
.highlight-attention:hover, .highlight-neutral:hover {
  transform: translateY(-1px);
  box-shadow: 0 4px 12px rgba(0, 0, 0, 0.15);
}
.tooltip {
  position: absolute; bottom: 100%; left: 50%; transform: translateX(-50%);
  background: #1e293b; color: white; padding: 8px 12px; border-radius: 6px;
  font-size: 12px; opacity: 0; visibility: hidden; transition: all 0.2s ease;
  z-index: 1000; pointer-events: none; max-width: 250px;
}
.highlight-favorable:hover .tooltip, .highlight-risky:hover .tooltip,
.highlight-attention:hover .tooltip, .highlight-neutral:hover .tooltip {
  opacity: 1; visibility: visible;
}
.confidence-badge {
  background: rgba(0, 0, 0, 0.8); color: white; font-size: 10px;
  padding: 2px 6px; border-radius: 10px; margin-left: 6px; font-weight: 600;
}
</style>"#
}

/// Expand a raw match span to the enclosing sentence or clause.
///
/// Scans backward from `start` to the nearest preceding sentence terminator
/// (`.`, `!`, `?`) or document start, and forward from `end` to the nearest
/// following terminator or document end. The result is then forced into the
/// configured bounds: under the minimum it is extended forward; over the
/// maximum it is truncated at the nearest word boundary.
pub fn expand_to_sentence(
    text: &str,
    start: usize,
    end: usize,
    config: &AnalyzerConfig,
) -> (usize, usize) {
    let bytes = text.as_bytes();
    let len = bytes.len();
    let start = start.min(len);
    let end = end.min(len);

    let is_terminator = |b: u8| b == b'.' || b == b'!' || b == b'?';

    // Backward: land just after the previous terminator, skipping whitespace.
    let mut expanded_start = 0;
    for i in (0..start).rev() {
        if is_terminator(bytes[i]) {
            let mut s = i + 1;
            while s < len && bytes[s].is_ascii_whitespace() {
                s += 1;
            }
            expanded_start = s.min(start);
            break;
        }
    }

    // Forward: include the terminator itself.
    let mut expanded_end = len;
    for (off, &b) in bytes[end..].iter().enumerate() {
        if is_terminator(b) {
            expanded_end = end + off + 1;
            break;
        }
    }

    // Minimum length: extend forward as far as the document allows.
    if expanded_end - expanded_start < config.expand_min_chars && expanded_end < len {
        let deficit = config.expand_min_chars - (expanded_end - expanded_start);
        expanded_end = (expanded_end + deficit).min(len);
    }

    // Maximum length: truncate forward at the nearest word boundary.
    if expanded_end - expanded_start > config.expand_max_chars {
        expanded_end = expanded_start + config.expand_max_chars;
        let floor = expanded_start + config.expand_max_chars.saturating_sub(100);
        while expanded_end > floor
            && expanded_end < len
            && !bytes[expanded_end].is_ascii_whitespace()
        {
            expanded_end -= 1;
        }
    }

    // Clamp to character boundaries for non-ASCII documents.
    let mut s = expanded_start.min(len);
    while s > 0 && !text.is_char_boundary(s) {
        s -= 1;
    }
    let mut e = expanded_end.min(len);
    while e < len && !text.is_char_boundary(e) {
        e += 1;
    }
    (s, e)
}

/// Render the nested page → paragraph structure as section markup, skipping
/// fragment paragraphs under the configured minimum length.
pub fn format_structured_text(
    structured: &StructuredText,
    scheme: &ColorScheme,
    config: &AnalyzerConfig,
) -> String {
    let mut html = String::new();
    let multi_page = structured.pages.len() > 1;

    for page in &structured.pages {
        if multi_page {
            html.push_str(&format!(
                "<div class=\"page-header\" style=\"color: {};\">Page {}</div>\n",
                scheme.primary, page.number
            ));
        }
        for paragraph in &page.paragraphs {
            if paragraph.text.len() < config.min_paragraph_chars {
                continue;
            }
            html.push_str(&format!(
                "<div class=\"document-paragraph\"><div class=\"paragraph-content\">{}</div></div>\n",
                paragraph.text
            ));
        }
    }
    html
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::RiskLevel;
    use crate::document::{StructuredPage, StructuredParagraph};
    use crate::theme::color_scheme;
    use once_cell::sync::Lazy;
    use regex::Regex;

    fn mk(start: usize, end: usize, kind: HighlightKind) -> DocumentHighlight {
        DocumentHighlight {
            start,
            end,
            kind,
            confidence: 0.8,
            reason: "reason".into(),
            category: "category".into(),
        }
    }

    fn scheme() -> ColorScheme {
        color_scheme("legal_agreement", RiskLevel::Low)
    }

    static RE_TAGS: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]+>").unwrap());

    /// Strip markup and the injected tooltip/badge text, leaving only the
    /// visible document text.
    fn visible_text(markup: &str) -> String {
        static RE_TOOLTIP: Lazy<Regex> = Lazy::new(|| {
            Regex::new(r#"(?s)<span class="tooltip">.*?</span></span><span class="confidence-badge">[^<]*</span>"#)
                .unwrap()
        });
        let without_tooltips = RE_TOOLTIP.replace_all(markup, "");
        RE_TAGS.replace_all(&without_tooltips, "").to_string()
    }

    #[test]
    fn invalid_spans_are_discarded() {
        let text = "short text";
        let highlights = vec![
            mk(50, 60, HighlightKind::Risky),  // out of bounds
            mk(5, 5, HighlightKind::Risky),    // empty
            mk(5, 6, HighlightKind::Risky),    // whitespace only
        ];
        assert_eq!(apply_highlighting(text, &highlights, &scheme()), text);
    }

    #[test]
    fn splice_preserves_visible_text() {
        // P4: de-tagged output reconstructs the input exactly.
        let text = "Alpha bravo charlie delta echo foxtrot.";
        let highlights = vec![
            mk(0, 5, HighlightKind::Favorable),
            mk(6, 11, HighlightKind::Risky),
            mk(20, 25, HighlightKind::Attention),
        ];
        let markup = apply_highlighting(text, &highlights, &scheme());
        assert_eq!(visible_text(&markup), text);
    }

    #[test]
    fn spans_carry_kind_class_and_badge() {
        let text = "The supplier shall indemnify the customer fully.";
        let highlights = vec![mk(13, 41, HighlightKind::Risky)];
        let markup = apply_highlighting(text, &highlights, &scheme());
        assert!(markup.contains("highlight-risky"));
        assert!(markup.contains("confidence-badge"));
        assert!(markup.contains("80%"));
        assert!(markup.contains("reason"));
    }

    #[test]
    fn overlapping_spans_do_not_corrupt_markup() {
        // Scenario 6: {0,10} and {5,15} — the later-processed lower-start
        // span still produces valid markup.
        let text = "abcdefghijklmnop";
        let highlights = vec![
            mk(0, 10, HighlightKind::Risky),
            mk(5, 15, HighlightKind::Attention),
        ];
        let markup = apply_highlighting(text, &highlights, &scheme());
        // Every opened span is closed.
        assert_eq!(markup.matches("<span").count(), markup.matches("</span>").count());
        assert!(markup.contains("highlight-risky"));
    }

    #[test]
    fn expansion_reaches_sentence_bounds() {
        let text = "This auto-renews unless you cancel. See section 4 for details and conditions.";
        let config = AnalyzerConfig::default();
        let pos = text.find("auto-renews").unwrap();
        let (s, e) = expand_to_sentence(text, pos, pos + "auto-renews".len(), &config);
        let span = &text[s..e];
        assert!(span.starts_with("This auto-renews"));
        // Minimum length pulls the span past the first sentence end.
        assert!(e - s >= config.expand_min_chars);
    }

    #[test]
    fn expansion_respects_document_end() {
        // P7: length may fall under the minimum only at document end.
        let text = "Short clause here.";
        let config = AnalyzerConfig::default();
        let (s, e) = expand_to_sentence(text, 6, 12, &config);
        assert_eq!(&text[s..e], text);
    }

    #[test]
    fn expansion_caps_at_maximum() {
        let word = "lorem ";
        let text = word.repeat(200); // 1200 chars, no terminators
        let config = AnalyzerConfig::default();
        let (s, e) = expand_to_sentence(&text, 300, 310, &config);
        assert!(e - s <= config.expand_max_chars);
        // Truncated at a word boundary.
        assert!(text.as_bytes()[e].is_ascii_whitespace() || e == text.len());
        assert_eq!(s, 0);
    }

    #[test]
    fn structured_text_skips_fragments() {
        let structured = StructuredText {
            pages: vec![StructuredPage {
                number: 1,
                paragraphs: vec![
                    StructuredParagraph {
                        lines: vec![],
                        text: "tiny".into(),
                    },
                    StructuredParagraph {
                        lines: vec![],
                        text: "This paragraph is comfortably longer than fifty characters in total."
                            .into(),
                    },
                ],
            }],
        };
        let html =
            format_structured_text(&structured, &scheme(), &AnalyzerConfig::default());
        assert!(!html.contains("tiny"));
        assert!(html.contains("comfortably longer"));
        // Single page: no page header.
        assert!(!html.contains("page-header"));
    }

    #[test]
    fn multi_page_structured_text_has_headers() {
        let page = |n: usize| StructuredPage {
            number: n,
            paragraphs: vec![StructuredParagraph {
                lines: vec![],
                text: "A paragraph long enough to be rendered by the formatter, clearly."
                    .into(),
            }],
        };
        let structured = StructuredText {
            pages: vec![page(1), page(2)],
        };
        let html =
            format_structured_text(&structured, &scheme(), &AnalyzerConfig::default());
        assert!(html.contains("Page 1"));
        assert!(html.contains("Page 2"));
    }
}
