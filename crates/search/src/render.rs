//! Plain-text rendering of ranked results

use crate::ranking::{RankedPaper, RankedResult};
use risotto_common::models::RelevanceMetric;
use std::fmt::Write;

/// Message shown when nothing passes the filters
pub const NO_RESULTS: &str = "There aren't relevant papers";

/// Render one paper as a short block
pub fn render_paper(metric: RelevanceMetric, ranked: &RankedPaper) -> String {
    let paper = &ranked.paper;
    let mut out = String::new();

    let title = if paper.title.is_empty() {
        paper.id.as_str()
    } else {
        paper.title.as_str()
    };
    match paper.publish_time {
        Some(date) => {
            let _ = writeln!(out, "**{} ({})**", title, date);
        }
        None => {
            let _ = writeln!(out, "**{}**", title);
        }
    }

    if !paper.authors.is_empty() {
        let _ = writeln!(out, "{}", paper.authors.join("; "));
    }
    if let Some(url) = paper.doi_url() {
        let _ = writeln!(out, "{}", url);
    }

    let _ = write!(
        out,
        "{}: {}; PageRank: {:.2}",
        metric.label(),
        metric.display(ranked.relevance),
        ranked.importance
    );
    out
}

/// Render a whole result list, blocks separated by blank lines
pub fn render(result: &RankedResult) -> String {
    if result.is_empty() {
        return NO_RESULTS.to_string();
    }
    result
        .papers
        .iter()
        .map(|p| render_paper(result.metric, p))
        .collect::<Vec<_>>()
        .join("\n\n")
}
