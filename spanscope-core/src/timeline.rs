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

//! Timeline reconstruction
//!
//! Turns the flat, parent-pointer-linked observation list of a trace into a
//! forest ready for indented rendering.
//!
//! # Rules
//!
//! - An observation without a parent, with a parent id that is not part of
//!   the batch, or pointing at itself is a root.
//! - Siblings (and roots) are ordered by `start_time` ascending. Missing start
//!   times sort last; ties keep input order.
//! - Parent cycles are broken by promoting the cycle member that appears
//!   first in the input to root level.
//! - Every input observation appears exactly once in the output.
//!
//! Building is O(n log n): children are collected in an index-addressed map
//! once, and the forest is assembled with an explicit stack. Nothing that
//! walks a tree recurses (clone, equality and drop included), so depth is
//! bounded by memory, not by the thread stack.

use crate::observation::Observation;
use serde::Serialize;
use std::cmp::Ordering;
use std::collections::HashMap;

/// Node of the rendered timeline. Built fresh on every build or filter call.
#[derive(Debug, Serialize)]
pub struct TimelineNode {
    pub observation: Observation,
    /// Derived from the observation's timestamps.
    pub latency_seconds: Option<f64>,
    pub children: Vec<TimelineNode>,
}

impl TimelineNode {
    /// Leaf node for a single observation.
    pub fn leaf(observation: Observation) -> Self {
        Self::with_children(observation, Vec::new())
    }

    pub fn with_children(observation: Observation, children: Vec<TimelineNode>) -> Self {
        Self {
            latency_seconds: observation.latency_seconds(),
            observation,
            children,
        }
    }

    pub fn id(&self) -> &str {
        &self.observation.id
    }

    /// Lowercased JSON text of the observation, used for filtering.
    pub fn search_text(&self) -> String {
        serde_json::to_string(&self.observation)
            .unwrap_or_else(|_| {
                format!(
                    "{} {} {}",
                    self.observation.id,
                    self.observation.kind,
                    self.observation.name.as_deref().unwrap_or_default()
                )
            })
            .to_lowercase()
    }

    /// `needle` must already be lowercase.
    pub fn matches(&self, needle: &str) -> bool {
        self.search_text().contains(needle)
    }

    /// Same observation and latency over a new set of children.
    pub(crate) fn copy_with_children(&self, children: Vec<TimelineNode>) -> TimelineNode {
        TimelineNode {
            observation: self.observation.clone(),
            latency_seconds: self.latency_seconds,
            children,
        }
    }
}

impl Clone for TimelineNode {
    fn clone(&self) -> Self {
        rebuild(std::slice::from_ref(self), |node, children| {
            Some(node.copy_with_children(children))
        })
        .pop()
        .unwrap_or_else(|| TimelineNode::leaf(self.observation.clone()))
    }
}

impl PartialEq for TimelineNode {
    fn eq(&self, other: &Self) -> bool {
        let mut stack = vec![(self, other)];
        while let Some((a, b)) = stack.pop() {
            if a.observation != b.observation
                || a.latency_seconds != b.latency_seconds
                || a.children.len() != b.children.len()
            {
                return false;
            }
            stack.extend(a.children.iter().zip(&b.children));
        }
        true
    }
}

impl Drop for TimelineNode {
    fn drop(&mut self) {
        let mut pending = std::mem::take(&mut self.children);
        while let Some(mut node) = pending.pop() {
            pending.append(&mut node.children);
        }
    }
}

/// Post-order rebuild over an explicit stack. `keep` receives each node with
/// its already rebuilt children and returns the replacement, or `None` to
/// drop it from its parent.
pub(crate) fn rebuild<F>(forest: &[TimelineNode], mut keep: F) -> Vec<TimelineNode>
where
    F: FnMut(&TimelineNode, Vec<TimelineNode>) -> Option<TimelineNode>,
{
    let mut done: Vec<Option<TimelineNode>> = Vec::new();
    let mut stack: Vec<(&TimelineNode, bool)> = forest.iter().rev().map(|n| (n, false)).collect();

    while let Some((node, expanded)) = stack.pop() {
        if !expanded {
            stack.push((node, true));
            stack.extend(node.children.iter().rev().map(|c| (c, false)));
            continue;
        }
        // Each finished child left exactly one slot behind.
        let first = done.len() - node.children.len();
        let children = done.drain(first..).flatten().collect();
        done.push(keep(node, children));
    }

    done.into_iter().flatten().collect()
}

/// Build the timeline forest from a flat observation list.
pub fn build_timeline(observations: &[Observation]) -> Vec<TimelineNode> {
    let n = observations.len();
    if n == 0 {
        return Vec::new();
    }

    // First occurrence wins when ids repeat.
    let mut index: HashMap<&str, usize> = HashMap::with_capacity(n);
    for (i, obs) in observations.iter().enumerate() {
        index.entry(obs.id.as_str()).or_insert(i);
    }

    let mut parents: Vec<Option<usize>> = observations
        .iter()
        .enumerate()
        .map(|(i, obs)| {
            obs.parent_observation_id
                .as_deref()
                .and_then(|pid| index.get(pid).copied())
                .filter(|&p| p != i)
        })
        .collect();

    let mut children: Vec<Vec<usize>> = vec![Vec::new(); n];
    let mut roots = Vec::new();
    for (i, parent) in parents.iter().enumerate() {
        match parent {
            Some(p) => children[*p].push(i),
            None => roots.push(i),
        }
    }

    let mut reached = vec![false; n];
    for &root in &roots {
        mark_reachable(root, &children, &mut reached);
    }

    // Anything unreached sits on or below a parent cycle.
    for start in 0..n {
        if reached[start] {
            continue;
        }
        let root = cycle_member(start, &parents);
        tracing::debug!(
            observation_id = %observations[root].id,
            "breaking parent cycle, promoting observation to root"
        );
        if let Some(p) = parents[root].take() {
            children[p].retain(|&c| c != root);
        }
        roots.push(root);
        mark_reachable(root, &children, &mut reached);
    }

    roots.sort_by(|&a, &b| compare_start(observations, a, b));
    for siblings in children.iter_mut() {
        siblings.sort_by(|&a, &b| compare_start(observations, a, b));
    }

    assemble(observations, &roots, &children)
}

fn mark_reachable(root: usize, children: &[Vec<usize>], reached: &mut [bool]) {
    let mut stack = vec![root];
    while let Some(i) = stack.pop() {
        if std::mem::replace(&mut reached[i], true) {
            continue;
        }
        stack.extend(children[i].iter().copied());
    }
}

/// Walk up from `start` until a position repeats and return the earliest
/// (by input position) member of the cycle found.
fn cycle_member(start: usize, parents: &[Option<usize>]) -> usize {
    let mut path: Vec<usize> = Vec::new();
    let mut seen: HashMap<usize, usize> = HashMap::new();
    let mut current = start;

    loop {
        if let Some(&pos) = seen.get(&current) {
            return path[pos..].iter().copied().min().unwrap_or(current);
        }
        seen.insert(current, path.len());
        path.push(current);

        match parents[current] {
            Some(p) => current = p,
            // Unreachable nodes always have a parent; treat a top as its own root.
            None => return current,
        }
    }
}

fn compare_start(observations: &[Observation], a: usize, b: usize) -> Ordering {
    let by_time = match (observations[a].start_time, observations[b].start_time) {
        (Some(x), Some(y)) => x.cmp(&y),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    };
    by_time.then(a.cmp(&b))
}

/// Post-order assembly over the ordered child map.
fn assemble(
    observations: &[Observation],
    roots: &[usize],
    children: &[Vec<usize>],
) -> Vec<TimelineNode> {
    let n = observations.len();
    let mut built: Vec<Option<TimelineNode>> = (0..n).map(|_| None).collect();
    let mut entered = vec![false; n];
    let mut stack: Vec<(usize, bool)> = roots.iter().rev().map(|&r| (r, false)).collect();

    while let Some((i, expanded)) = stack.pop() {
        if expanded {
            let kids = children[i]
                .iter()
                .filter_map(|&c| built[c].take())
                .collect();
            built[i] = Some(TimelineNode::with_children(observations[i].clone(), kids));
            continue;
        }
        if std::mem::replace(&mut entered[i], true) {
            continue;
        }
        stack.push((i, true));
        stack.extend(children[i].iter().rev().map(|&c| (c, false)));
    }

    roots.iter().filter_map(|&r| built[r].take()).collect()
}

/// Depth-first, pre-order walk yielding `(depth, node)` with roots at depth 0.
pub fn flatten(forest: &[TimelineNode]) -> Vec<(usize, &TimelineNode)> {
    let mut out = Vec::new();
    let mut stack: Vec<(usize, &TimelineNode)> = forest.iter().rev().map(|n| (0, n)).collect();
    while let Some((depth, node)) = stack.pop() {
        out.push((depth, node));
        stack.extend(node.children.iter().rev().map(|c| (depth + 1, c)));
    }
    out
}

/// Shape of a built (or filtered) timeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct TimelineStats {
    pub total_nodes: usize,
    /// Number of levels; a forest of bare roots has depth 1.
    pub max_depth: usize,
    pub root_count: usize,
}

impl TimelineStats {
    pub fn of(forest: &[TimelineNode]) -> Self {
        let flat = flatten(forest);
        Self {
            total_nodes: flat.len(),
            max_depth: flat.iter().map(|(depth, _)| depth + 1).max().unwrap_or(0),
            root_count: forest.len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observation_types::ObservationKind;
    use chrono::{DateTime, TimeZone, Utc};

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    fn obs(id: &str, parent: Option<&str>, start: Option<i64>) -> Observation {
        let mut o = Observation::new(id, ObservationKind::Span).with_times(start.map(at), None);
        o.parent_observation_id = parent.map(String::from);
        o
    }

    fn ids(nodes: &[TimelineNode]) -> Vec<&str> {
        nodes.iter().map(TimelineNode::id).collect()
    }

    fn flat_ids(forest: &[TimelineNode]) -> Vec<String> {
        flatten(forest).into_iter().map(|(_, n)| n.id().to_string()).collect()
    }

    #[test]
    fn test_empty_input() {
        assert!(build_timeline(&[]).is_empty());
        assert_eq!(TimelineStats::of(&[]), TimelineStats::default());
    }

    #[test]
    fn test_builds_nested_tree() {
        let forest = build_timeline(&[
            obs("child", Some("root"), Some(1)),
            obs("root", None, Some(0)),
            obs("grandchild", Some("child"), Some(2)),
        ]);

        assert_eq!(ids(&forest), vec!["root"]);
        assert_eq!(ids(&forest[0].children), vec!["child"]);
        assert_eq!(ids(&forest[0].children[0].children), vec!["grandchild"]);

        let stats = TimelineStats::of(&forest);
        assert_eq!(stats.total_nodes, 3);
        assert_eq!(stats.max_depth, 3);
        assert_eq!(stats.root_count, 1);
    }

    #[test]
    fn test_sibling_ordering_missing_last() {
        let forest = build_timeline(&[
            obs("root", None, Some(0)),
            obs("c3", Some("root"), Some(3)),
            obs("c1", Some("root"), Some(1)),
            obs("cx", Some("root"), None),
            obs("c2", Some("root"), Some(2)),
        ]);
        assert_eq!(ids(&forest[0].children), vec!["c1", "c2", "c3", "cx"]);
    }

    #[test]
    fn test_ties_keep_input_order() {
        let forest = build_timeline(&[
            obs("b", None, Some(5)),
            obs("y", None, None),
            obs("a", None, Some(5)),
            obs("x", None, None),
        ]);
        assert_eq!(ids(&forest), vec!["b", "a", "y", "x"]);
    }

    #[test]
    fn test_dangling_parent_becomes_root() {
        let forest = build_timeline(&[
            obs("a", None, Some(0)),
            obs("orphan", Some("missing"), Some(1)),
        ]);
        assert_eq!(ids(&forest), vec!["a", "orphan"]);
    }

    #[test]
    fn test_self_parent_becomes_root() {
        let forest = build_timeline(&[obs("loop", Some("loop"), None)]);
        assert_eq!(ids(&forest), vec!["loop"]);
        assert!(forest[0].children.is_empty());
    }

    #[test]
    fn test_two_node_cycle() {
        let forest = build_timeline(&[obs("a", Some("b"), None), obs("b", Some("a"), None)]);
        assert_eq!(ids(&forest), vec!["a"]);
        assert_eq!(ids(&forest[0].children), vec!["b"]);
        assert_eq!(flat_ids(&forest), vec!["a", "b"]);
    }

    #[test]
    fn test_cycle_with_hanging_descendant() {
        // d hangs below the a <-> b cycle and is listed first.
        let forest = build_timeline(&[
            obs("d", Some("a"), Some(9)),
            obs("b", Some("a"), Some(2)),
            obs("a", Some("b"), Some(1)),
            obs("r", None, Some(0)),
        ]);
        assert_eq!(ids(&forest), vec!["r", "b"]);
        let b = &forest[1];
        assert_eq!(ids(&b.children), vec!["a"]);
        assert_eq!(ids(&b.children[0].children), vec!["d"]);
        assert_eq!(TimelineStats::of(&forest).total_nodes, 4);
    }

    #[test]
    fn test_duplicate_ids_are_all_kept() {
        let forest = build_timeline(&[
            obs("dup", None, Some(0)),
            obs("dup", None, Some(1)),
            obs("kid", Some("dup"), Some(2)),
        ]);
        assert_eq!(ids(&forest), vec!["dup", "dup"]);
        assert_eq!(ids(&forest[0].children), vec!["kid"]);
        assert!(forest[1].children.is_empty());
    }

    #[test]
    fn test_latency_is_derived() {
        let o = Observation::new("gen", ObservationKind::Generation)
            .with_times(Some(at(0)), Some(at(4)));
        let forest = build_timeline(&[o, obs("open", None, Some(1))]);
        assert_eq!(forest[0].latency_seconds, Some(4.0));
        assert_eq!(forest[1].latency_seconds, None);
    }

    fn chain(len: i64) -> Vec<Observation> {
        let mut chain = vec![obs("n0", None, Some(0))];
        for i in 1..len {
            chain.push(obs(&format!("n{}", i), Some(&format!("n{}", i - 1)), Some(i)));
        }
        chain
    }

    #[test]
    fn test_deep_chain_build_clone_drop() {
        let forest = build_timeline(&chain(100_000));
        let stats = TimelineStats::of(&forest);
        assert_eq!(stats.total_nodes, 100_000);
        assert_eq!(stats.max_depth, 100_000);

        let copy = forest.clone();
        assert_eq!(copy, forest);
        drop(copy);
        drop(forest);
    }

    #[test]
    fn test_equality_sees_nested_differences() {
        let a = build_timeline(&[obs("r", None, Some(0)), obs("c", Some("r"), Some(1))]);
        let b = build_timeline(&[obs("r", None, Some(0)), obs("d", Some("r"), Some(1))]);
        let c = build_timeline(&[obs("r", None, Some(0))]);
        assert_eq!(a, a.clone());
        assert_ne!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_flatten_depths() {
        let forest = build_timeline(&[
            obs("r1", None, Some(0)),
            obs("c", Some("r1"), Some(1)),
            obs("r2", None, Some(2)),
        ]);
        let flat: Vec<(usize, &str)> = flatten(&forest).into_iter().map(|(d, n)| (d, n.id())).collect();
        assert_eq!(flat, vec![(0, "r1"), (1, "c"), (0, "r2")]);
    }
}
