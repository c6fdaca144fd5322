// Copyright 2025 AgentReplay (https://github.com/agentreplay)
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! Plain-text rendering of traces and timelines.

use spanscope_core::{
    flatten, Score, Selection, TimelineNode, TimelineStats, TraceDetail, TraceSummary,
};
use std::fmt::Write;

/// Negative latencies (end before start) are printed as-is.
pub fn format_latency(seconds: Option<f64>) -> String {
    match seconds {
        None => String::new(),
        Some(s) if s.abs() < 1.0 => format!("{}ms", (s * 1000.0).round() as i64),
        Some(s) => format!("{:.2}s", s),
    }
}

fn format_scores(scores: &[Score]) -> String {
    scores
        .iter()
        .map(|s| format!("{}={:.2}", s.name, s.value))
        .collect::<Vec<_>>()
        .join(" ")
}

/// One tree row: selection marker, indent, kind badge, name, latency, scores.
pub fn node_line(node: &TimelineNode, depth: usize, selected: bool) -> String {
    let mut line = String::new();
    line.push_str(if selected { "> " } else { "  " });
    line.push_str(&"  ".repeat(depth));
    let _ = write!(
        line,
        "{} {}",
        node.observation.kind.badge(),
        node.observation.display_name()
    );

    let latency = format_latency(node.latency_seconds);
    if !latency.is_empty() {
        let _ = write!(line, "  {}", latency);
    }
    if !node.observation.scores.is_empty() {
        let _ = write!(line, "  [{}]", format_scores(&node.observation.scores));
    }
    line
}

pub fn render_tree(forest: &[TimelineNode], selection: &Selection) -> String {
    let mut out = String::new();
    for (depth, node) in flatten(forest) {
        out.push_str(&node_line(node, depth, selection.is_selected(node.id())));
        out.push('\n');
    }
    out
}

pub fn render_header(detail: &TraceDetail, stats: &TimelineStats) -> String {
    let mut out = format!("Trace {}", detail.display_name());
    if detail.name.is_some() {
        let _ = write!(out, " ({})", detail.id);
    }
    let latency = format_latency(detail.latency_seconds);
    if !latency.is_empty() {
        let _ = write!(out, "  {}", latency);
    }
    let _ = write!(
        out,
        "\n{} observations, {} roots, depth {}",
        stats.total_nodes, stats.root_count, stats.max_depth
    );
    if !detail.scores.is_empty() {
        let _ = write!(out, "\nscores: {}", format_scores(&detail.scores));
    }
    out
}

/// Detail pane text for the current selection.
pub fn render_selection(
    detail: &TraceDetail,
    forest: &[TimelineNode],
    selection: &Selection,
) -> Result<String, serde_json::Error> {
    match selection {
        Selection::Trace => serde_json::to_string_pretty(detail),
        Selection::Observation(id) => match selection.resolve(forest) {
            Some(node) => serde_json::to_string_pretty(&node.observation),
            None => Ok(format!("observation {} is not in the current view", id)),
        },
    }
}

pub fn render_summaries(traces: &[TraceSummary]) -> String {
    let mut out = String::new();
    for trace in traces {
        let _ = write!(out, "{:<40} {}", trace.id, trace.name.as_deref().unwrap_or("-"));
        if let Some(ts) = trace.timestamp {
            let _ = write!(out, "  {}", ts.format("%Y-%m-%d %H:%M:%S"));
        }
        let latency = format_latency(trace.latency_seconds);
        if !latency.is_empty() {
            let _ = write!(out, "  {}", latency);
        }
        out.push('\n');
    }
    out
}
