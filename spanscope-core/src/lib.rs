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

//! Spanscope Core
//!
//! Trace and observation records plus the timeline builder that turns a
//! flat observation list into a filterable, render-ready forest.
//!
//! ```
//! use spanscope_core::{build_timeline, filter_timeline, Observation, ObservationKind};
//!
//! let observations = vec![
//!     Observation::new("root", ObservationKind::Span).with_name("agent"),
//!     Observation::new("llm", ObservationKind::Generation)
//!         .with_parent("root")
//!         .with_name("chat-completion"),
//! ];
//!
//! let forest = build_timeline(&observations);
//! assert_eq!(forest[0].children[0].id(), "llm");
//!
//! let filtered = filter_timeline(&forest, "chat");
//! assert_eq!(filtered.len(), 1);
//! ```

pub mod filter;
pub mod observation;
pub mod observation_types;
pub mod selection;
pub mod timeline;
pub mod trace;

pub use filter::filter_timeline;
pub use observation::{Observation, Score};
pub use observation_types::ObservationKind;
pub use selection::{find_node, Selection};
pub use timeline::{build_timeline, flatten, TimelineNode, TimelineStats};
pub use trace::{TraceDetail, TraceSummary};
