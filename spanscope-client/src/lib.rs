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

//! # Spanscope Client
//!
//! Reads traces from the tracing API, waits for freshly created traces to be
//! ingested, and turns their observations into a timeline.
//!
//! ## Quick Start
//!
//! ```no_run
//! use spanscope_client::{ClientConfig, PollOptions, SpanscopeClient, TimelineLoader};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = SpanscopeClient::new(ClientConfig::new("http://localhost:3000"))?;
//!     let loader = TimelineLoader::new(Arc::new(client), PollOptions::default());
//!
//!     let trace = loader.load("trace-123").await?;
//!     println!("{} observations", trace.stats().total_nodes);
//!     Ok(())
//! }
//! ```
//!
//! ## Callback-style polling
//!
//! ```no_run
//! use spanscope_client::{ClientConfig, PollOptions, SpanscopeClient, TracePoller};
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = SpanscopeClient::new(ClientConfig::new("http://localhost:3000"))?;
//! let poller = TracePoller::new(Arc::new(client), PollOptions::from_millis(500, 10_000));
//!
//! let handle = poller.start(
//!     "trace-123",
//!     |trace| println!("ready: {}", trace.display_name()),
//!     |err| eprintln!("{} ({})", err, err.kind()),
//! );
//!
//! // Later, e.g. when the user navigates away:
//! handle.cancel();
//! # Ok(())
//! # }
//! ```

mod client;
pub mod config;
pub mod loader;
pub mod poller;
pub mod retry;
pub mod source;
mod types;

pub use client::{ClientConfig, Result, SpanscopeClient};
pub use config::{BackoffKind, ConfigError, SpanscopeConfig};
pub use loader::{LoadError, LoadedTrace, TimelineLoader};
pub use poller::{PollAttempt, PollError, PollErrorKind, PollHandle, PollOptions, PollState, TracePoller};
pub use retry::{Backoff, RetryPolicy};
pub use source::{SourceError, TraceSource};
pub use types::*;
