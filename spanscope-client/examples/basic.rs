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

//! Spanscope Client Basic Example
//!
//! Waits for a trace to be ingested, then prints its observation tree.
//!
//! ```text
//! cargo run -p spanscope-client --example basic -- <TRACE_ID> [QUERY]
//! ```

use spanscope_client::{PollErrorKind, SpanscopeClient, SpanscopeConfig, TimelineLoader, LoadError};
use spanscope_core::flatten;
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mut args = std::env::args().skip(1);
    let Some(trace_id) = args.next() else {
        eprintln!("usage: basic <TRACE_ID> [QUERY]");
        return Ok(());
    };
    let query = args.next().unwrap_or_default();

    let config = SpanscopeConfig::from_env();
    let client = SpanscopeClient::new(config.client_config())?;
    let loader = TimelineLoader::new(Arc::new(client), config.retry_policy());

    println!("Waiting for trace {} at {}...", trace_id, config.api.url);
    let loaded = match loader.load(&trace_id).await {
        Ok(loaded) => loaded,
        Err(LoadError::Poll(e)) if e.kind() == PollErrorKind::NotReadyTimeout => {
            println!("   Trace not ingested yet: {}", e);
            return Ok(());
        }
        Err(e) => return Err(e.into()),
    };

    let stats = loaded.stats();
    println!(
        "{} ({} observations, depth {})\n",
        loaded.detail.display_name(),
        stats.total_nodes,
        stats.max_depth
    );

    let forest = loaded.filtered(&query);
    for (depth, node) in flatten(&forest) {
        let latency = node
            .latency_seconds
            .map(|s| format!(" {:.2}s", s))
            .unwrap_or_default();
        println!(
            "{}{} {}{}",
            "  ".repeat(depth),
            node.observation.kind.badge(),
            node.observation.display_name(),
            latency
        );
    }

    Ok(())
}
