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

//! Live text filtering over a built timeline.

use crate::timeline::{rebuild, TimelineNode};

/// Keep every node that matches `query` or has a matching descendant.
///
/// Matching is a case-insensitive substring test against the node's
/// serialized observation. Ancestors of a match stay so the path to it
/// remains visible; subtrees without any match are pruned. A blank query
/// returns the forest unchanged. The input is never modified.
pub fn filter_timeline(forest: &[TimelineNode], query: &str) -> Vec<TimelineNode> {
    let needle = query.trim().to_lowercase();
    if needle.is_empty() {
        return forest.to_vec();
    }
    rebuild(forest, |node, children| {
        if children.is_empty() && !node.matches(&needle) {
            return None;
        }
        Some(node.copy_with_children(children))
    })
}
