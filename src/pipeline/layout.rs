//! Layout reconstruction for PDF text runs.
//!
//! pdfium hands back text segments in content-stream order with page-space
//! bounds. Reading order is recovered in three deterministic passes:
//! bucket runs into lines by rounded vertical coordinate, sort lines top to
//! bottom (PDF y grows upward), sort runs within a line left to right, then
//! merge consecutive lines into paragraphs while the vertical gap stays
//! under the configured threshold. The threshold default (20 layout units)
//! is an empirically tuned constant; see [`crate::config::AnalyzerConfig`].

use std::collections::BTreeMap;

use crate::document::{StructuredLine, StructuredParagraph, StructuredPage, TextRun};

/// A text run as pulled from the PDF parser, before ordering.
#[derive(Debug, Clone)]
pub struct RawRun {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub text: String,
}

/// Bucket runs into lines by rounded y, lines top-to-bottom, runs
/// left-to-right within each line.
pub fn group_runs_into_lines(runs: Vec<RawRun>) -> Vec<StructuredLine> {
    let mut buckets: BTreeMap<i32, Vec<TextRun>> = BTreeMap::new();
    for run in runs {
        if run.text.trim().is_empty() {
            continue;
        }
        let y = run.y.round() as i32;
        buckets.entry(y).or_default().push(TextRun {
            x: run.x,
            text: run.text,
            width: run.width,
            height: run.height,
        });
    }

    // BTreeMap iterates ascending; PDF y grows upward, so reverse for
    // top-to-bottom reading order.
    let mut lines: Vec<StructuredLine> = buckets
        .into_iter()
        .rev()
        .map(|(y, mut runs)| {
            runs.sort_by(|a, b| a.x.partial_cmp(&b.x).unwrap_or(std::cmp::Ordering::Equal));
            StructuredLine { y, runs }
        })
        .collect();

    lines.retain(|l| !l.runs.is_empty());
    lines
}

/// Merge consecutive lines into paragraphs: a vertical gap above
/// `paragraph_gap` starts a new paragraph.
pub fn group_lines_into_paragraphs(
    lines: Vec<StructuredLine>,
    paragraph_gap: f32,
) -> Vec<StructuredParagraph> {
    let mut paragraphs = Vec::new();
    let mut current: Vec<StructuredLine> = Vec::new();
    let mut last_y: Option<i32> = None;

    for line in lines {
        if let Some(prev) = last_y {
            let spacing = (prev - line.y).abs() as f32;
            if spacing > paragraph_gap && !current.is_empty() {
                paragraphs.push(finish_paragraph(std::mem::take(&mut current)));
            }
        }
        last_y = Some(line.y);
        current.push(line);
    }

    if !current.is_empty() {
        paragraphs.push(finish_paragraph(current));
    }
    paragraphs
}

fn finish_paragraph(lines: Vec<StructuredLine>) -> StructuredParagraph {
    let text = lines
        .iter()
        .map(StructuredLine::text)
        .collect::<Vec<_>>()
        .join(" ");
    StructuredParagraph { lines, text }
}

/// Full layout pass for one page.
pub fn build_page(number: usize, runs: Vec<RawRun>, paragraph_gap: f32) -> StructuredPage {
    let lines = group_runs_into_lines(runs);
    StructuredPage {
        number,
        paragraphs: group_lines_into_paragraphs(lines, paragraph_gap),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(x: f32, y: f32, text: &str) -> RawRun {
        RawRun {
            x,
            y,
            width: text.len() as f32 * 5.0,
            height: 10.0,
            text: text.into(),
        }
    }

    #[test]
    fn lines_sorted_top_to_bottom_runs_left_to_right() {
        let runs = vec![
            run(50.0, 700.0, "right"),
            run(10.0, 700.2, "left"), // same line after rounding
            run(10.0, 760.0, "title"),
        ];
        let lines = group_runs_into_lines(runs);
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].text(), "title");
        assert_eq!(lines[1].text(), "left right");
    }

    #[test]
    fn whitespace_runs_are_dropped(){
        let runs = vec![run(0.0, 100.0, "   "), run(0.0, 100.0, "word")];
        let lines = group_runs_into_lines(runs);
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].runs.len(), 1);
    }

    #[test]
    fn small_gaps_stay_in_one_paragraph() {
        let lines = group_runs_into_lines(vec![
            run(0.0, 700.0, "first line"),
            run(0.0, 688.0, "second line"),
            run(0.0, 676.0, "third line"),
        ]);
        let paragraphs = group_lines_into_paragraphs(lines, 20.0);
        assert_eq!(paragraphs.len(), 1);
        assert_eq!(paragraphs[0].text, "first line second line third line");
    }

    #[test]
    fn large_gap_starts_new_paragraph() {
        let lines = group_runs_into_lines(vec![
            run(0.0, 700.0, "intro"),
            run(0.0, 688.0, "continues"),
            run(0.0, 640.0, "next section"), // 48-unit gap
        ]);
        let paragraphs = group_lines_into_paragraphs(lines, 20.0);
        assert_eq!(paragraphs.len(), 2);
        assert_eq!(paragraphs[0].text, "intro continues");
        assert_eq!(paragraphs[1].text, "next section");
    }

    #[test]
    fn build_page_is_consistent_with_flat_text() {
        let page = build_page(
            1,
            vec![
                run(0.0, 700.0, "Terms"),
                run(40.0, 700.0, "of"),
                run(60.0, 700.0, "Service"),
                run(0.0, 650.0, "Section one."),
            ],
            20.0,
        );
        let flat: String = page
            .paragraphs
            .iter()
            .map(|p| p.text.as_str())
            .collect::<Vec<_>>()
            .join(" ");
        // Whitespace-insensitive reconstruction invariant.
        assert_eq!(
            flat.split_whitespace().collect::<Vec<_>>(),
            ["Terms", "of", "Service", "Section", "one."]
        );
    }
}
