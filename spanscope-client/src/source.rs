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

//! The read side of the tracing API, as seen by the poller and loader.

use async_trait::async_trait;
use spanscope_core::{Observation, TraceDetail};
use thiserror::Error;

/// Errors surfaced by a [`TraceSource`].
///
/// Only [`SourceError::NotFound`] is transient: the resource may not have
/// been materialized yet. Everything else is terminal for a poll.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SourceError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("HTTP request failed: {0}")]
    Transport(String),

    #[error("invalid response body: {0}")]
    Decode(String),

    #[error("invalid API url: {0}")]
    InvalidUrl(String),

    #[error("trace source failed: {0}")]
    Internal(String),
}

impl SourceError {
    pub fn is_transient(&self) -> bool {
        matches!(self, SourceError::NotFound(_))
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            SourceError::NotFound(_) => Some(404),
            SourceError::Api { status, .. } => Some(*status),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for SourceError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            SourceError::Decode(e.to_string())
        } else {
            SourceError::Transport(e.to_string())
        }
    }
}

impl From<serde_json::Error> for SourceError {
    fn from(e: serde_json::Error) -> Self {
        SourceError::Decode(e.to_string())
    }
}

/// Fetch operations the poller and loader depend on.
#[async_trait]
pub trait TraceSource: Send + Sync {
    /// Full trace detail; `NotFound` while the trace is not materialized.
    async fn fetch_trace_detail(&self, trace_id: &str) -> Result<TraceDetail, SourceError>;

    /// Flat observation list for a trace.
    async fn fetch_observations(&self, trace_id: &str) -> Result<Vec<Observation>, SourceError>;
}
