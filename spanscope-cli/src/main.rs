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

//! Spanscope CLI
//!
//! Command-line viewer for trace timelines served by the tracing API.

mod render;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use spanscope_client::{
    LoadedTrace, PollError, PollState, SpanscopeClient, SpanscopeConfig, TimelineLoader,
    TraceListFilter,
};
use spanscope_core::{Selection, TraceDetail};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "spanscope", author, version)]
#[command(about = "Spanscope - trace timeline viewer", long_about = None)]
struct Cli {
    /// Path to configuration file (TOML)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// API base URL (overrides config file)
    #[arg(long, env = "SPANSCOPE_URL")]
    url: Option<String>,

    /// Project scope (overrides config file)
    #[arg(long, env = "SPANSCOPE_PROJECT_ID")]
    project_id: Option<String>,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Output as JSON (machine-readable)
    #[arg(long)]
    json: bool,

    /// Emit logs as JSON lines
    #[arg(long)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Check API health
    Health,

    /// List recent traces
    List {
        #[arg(long, default_value = "20")]
        limit: u32,

        #[arg(long)]
        page: Option<u32>,

        /// Filter by trace name
        #[arg(long)]
        name: Option<String>,
    },

    /// Print the timeline of an ingested trace
    Tree {
        trace_id: String,

        /// Case-insensitive text filter; ancestors of matches are kept
        #[arg(short, long, default_value = "")]
        filter: String,

        /// Observation id to show in detail
        #[arg(long)]
        select: Option<String>,
    },

    /// Wait for a trace to be ingested, then print its timeline
    Watch {
        trace_id: String,

        #[arg(short, long, default_value = "")]
        filter: String,

        #[arg(long)]
        select: Option<String>,

        /// Delay between attempts (overrides config)
        #[arg(long)]
        interval_ms: Option<u64>,

        /// Overall wait budget (overrides config)
        #[arg(long)]
        timeout_ms: Option<u64>,
    },
}

fn init_tracing(verbose: bool, log_json: bool) {
    let default_filter = if verbose {
        "spanscope=debug,spanscope_client=debug,spanscope_core=debug"
    } else {
        "spanscope=info,spanscope_client=info,spanscope_core=info"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(log_json.then(|| {
            tracing_subscriber::fmt::layer()
                .json()
                .with_writer(std::io::stderr)
        }))
        .with((!log_json).then(|| tracing_subscriber::fmt::layer().with_writer(std::io::stderr)))
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.log_json);

    // Load configuration
    let mut config = SpanscopeConfig::load(cli.config.clone()).context("Failed to load configuration")?;

    // Apply CLI overrides
    if let Some(url) = &cli.url {
        config.api.url = url.clone();
    }
    if let Some(project_id) = &cli.project_id {
        config.api.project_id = Some(project_id.clone());
    }
    if let Commands::Watch {
        interval_ms,
        timeout_ms,
        ..
    } = &cli.command
    {
        if let Some(interval_ms) = interval_ms {
            config.poll.interval_ms = *interval_ms;
        }
        if let Some(timeout_ms) = timeout_ms {
            config.poll.timeout_ms = *timeout_ms;
        }
    }
    config.validate()?;

    let client = SpanscopeClient::new(config.client_config()).context("Failed to create API client")?;

    match cli.command {
        Commands::Health => {
            let health = client.health().await.context("Health check failed")?;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&health)?);
            } else {
                println!(
                    "✓ {} is {} {}",
                    config.api.url,
                    health.status,
                    health.version.as_deref().unwrap_or_default()
                );
            }
        }

        Commands::List { limit, page, name } => {
            let filter = TraceListFilter {
                name,
                page,
                limit: Some(limit),
                ..Default::default()
            };
            let traces = client
                .list_traces(Some(&filter))
                .await
                .context("Failed to list traces")?;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&traces.data)?);
            } else if traces.data.is_empty() {
                println!("No traces found");
            } else {
                print!("{}", render::render_summaries(&traces.data));
            }
        }

        Commands::Tree {
            trace_id,
            filter,
            select,
        } => {
            let loader = TimelineLoader::new(Arc::new(client), config.retry_policy());
            let loaded = loader
                .load_ready(&trace_id)
                .await
                .with_context(|| format!("Failed to load trace {}", trace_id))?;
            print_trace(&loaded, &filter, &selection(select), cli.json)?;
        }

        Commands::Watch {
            trace_id,
            filter,
            select,
            ..
        } => {
            let loader = TimelineLoader::new(Arc::new(client), config.retry_policy());
            if let Some(loaded) = watch(&loader, &trace_id).await? {
                print_trace(&loaded, &filter, &selection(select), cli.json)?;
            }
        }
    }

    Ok(())
}

fn selection(select: Option<String>) -> Selection {
    select.map(Selection::Observation).unwrap_or_default()
}

/// Poll in the background, reporting progress until the trace is ready.
/// Returns `None` when interrupted.
async fn watch(loader: &TimelineLoader, trace_id: &str) -> Result<Option<LoadedTrace>> {
    let (tx, mut rx) = mpsc::unbounded_channel::<Result<TraceDetail, PollError>>();
    let failure_tx = tx.clone();
    let handle = loader.poller().start(
        trace_id,
        move |detail| {
            let _ = tx.send(Ok(detail));
        },
        move |err| {
            let _ = failure_tx.send(Err(err));
        },
    );

    let policy = loader.poller().policy();
    info!(
        trace_id,
        interval_ms = policy.interval.as_millis() as u64,
        timeout_ms = policy.timeout.as_millis() as u64,
        expected_attempts = ?policy.expected_attempts(),
        "waiting for trace"
    );
    let mut progress = tokio::time::interval(Duration::from_secs(1));
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    let outcome = loop {
        tokio::select! {
            outcome = rx.recv() => break outcome,
            _ = &mut ctrl_c => {
                handle.cancel();
                eprintln!("Cancelled");
                return Ok(None);
            }
            _ = progress.tick() => {
                if let PollState::Polling(attempt) = handle.state() {
                    eprintln!(
                        "  waiting for {} (attempt {}, {:.1}s)",
                        attempt.trace_id,
                        attempt.attempt_count,
                        attempt.elapsed().as_secs_f64()
                    );
                }
            }
        }
    };

    let detail = match outcome {
        Some(result) => result.with_context(|| format!("Trace {} did not become ready", trace_id))?,
        None => anyhow::bail!("Poller for {} stopped without a result", trace_id),
    };
    let loaded = loader
        .complete(detail)
        .await
        .with_context(|| format!("Failed to load observations for {}", trace_id))?;
    Ok(Some(loaded))
}

fn print_trace(loaded: &LoadedTrace, filter: &str, selection: &Selection, json: bool) -> Result<()> {
    let forest = loaded.filtered(filter);

    if json {
        let out = serde_json::json!({
            "trace": loaded.detail,
            "stats": loaded.stats(),
            "timeline": forest,
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }

    println!("{}\n", render::render_header(&loaded.detail, &loaded.stats()));
    if forest.is_empty() && !filter.trim().is_empty() {
        println!("No observations match {:?}", filter.trim());
    } else {
        print!("{}", render::render_tree(&forest, selection));
    }

    if !selection.is_trace() {
        println!("\n{}", render::render_selection(&loaded.detail, &forest, selection)?);
    }
    Ok(())
}
