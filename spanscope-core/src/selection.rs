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

//! What the detail pane shows: the trace itself or one observation.
//!
//! Selection lives next to the forest, owned by the caller. Changing it never
//! rebuilds the timeline.

use crate::timeline::TimelineNode;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "type", content = "id", rename_all = "snake_case")]
pub enum Selection {
    /// The root trace.
    #[default]
    Trace,
    Observation(String),
}

impl Selection {
    pub fn observation(id: impl Into<String>) -> Self {
        Selection::Observation(id.into())
    }

    pub fn is_trace(&self) -> bool {
        matches!(self, Selection::Trace)
    }

    pub fn observation_id(&self) -> Option<&str> {
        match self {
            Selection::Trace => None,
            Selection::Observation(id) => Some(id),
        }
    }

    pub fn is_selected(&self, id: &str) -> bool {
        self.observation_id() == Some(id)
    }

    /// Node for the selected observation, if it is visible in `forest`.
    pub fn resolve<'a>(&self, forest: &'a [TimelineNode]) -> Option<&'a TimelineNode> {
        self.observation_id().and_then(|id| find_node(forest, id))
    }
}

/// Depth-first lookup by observation id.
pub fn find_node<'a>(forest: &'a [TimelineNode], id: &str) -> Option<&'a TimelineNode> {
    let mut stack: Vec<&TimelineNode> = forest.iter().rev().collect();
    while let Some(node) = stack.pop() {
        if node.id() == id {
            return Some(node);
        }
        stack.extend(node.children.iter().rev());
    }
    None
}
