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

//! Poll, fetch and build: the full path from a trace id to a timeline.

use crate::poller::{PollError, TracePoller};
use crate::retry::RetryPolicy;
use crate::source::{SourceError, TraceSource};
use spanscope_core::{
    build_timeline, filter_timeline, Observation, TimelineNode, TimelineStats, TraceDetail,
};
use std::sync::Arc;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum LoadError {
    #[error(transparent)]
    Poll(#[from] PollError),

    #[error("failed to fetch trace {trace_id}: {source}")]
    Trace {
        trace_id: String,
        #[source]
        source: SourceError,
    },

    #[error("failed to fetch observations for trace {trace_id}: {source}")]
    Observations {
        trace_id: String,
        #[source]
        source: SourceError,
    },
}

/// A trace with its observations and the forest built from them.
#[derive(Debug, Clone)]
pub struct LoadedTrace {
    pub detail: TraceDetail,
    pub observations: Vec<Observation>,
    pub forest: Vec<TimelineNode>,
}

impl LoadedTrace {
    pub fn from_parts(detail: TraceDetail, observations: Vec<Observation>) -> Self {
        let forest = build_timeline(&observations);
        Self {
            detail,
            observations,
            forest,
        }
    }

    /// Filter the already-built forest; nothing is refetched.
    pub fn filtered(&self, query: &str) -> Vec<TimelineNode> {
        filter_timeline(&self.forest, query)
    }

    pub fn stats(&self) -> TimelineStats {
        TimelineStats::of(&self.forest)
    }
}

pub struct TimelineLoader {
    source: Arc<dyn TraceSource>,
    poller: TracePoller,
}

impl TimelineLoader {
    pub fn new(source: Arc<dyn TraceSource>, policy: impl Into<RetryPolicy>) -> Self {
        let poller = TracePoller::new(source.clone(), policy);
        Self { source, poller }
    }

    pub fn poller(&self) -> &TracePoller {
        &self.poller
    }

    /// Wait for the trace to become ready, then fetch its observations once.
    pub async fn load(&self, trace_id: &str) -> Result<LoadedTrace, LoadError> {
        let detail = self.poller.poll(trace_id).await?;
        self.complete(detail).await
    }

    /// Fetch observations for a trace detail the poller already returned.
    pub async fn complete(&self, detail: TraceDetail) -> Result<LoadedTrace, LoadError> {
        let observations = self.observations(&detail.id).await?;
        Ok(LoadedTrace::from_parts(detail, observations))
    }

    /// Load a trace that is expected to exist already; no polling.
    pub async fn load_ready(&self, trace_id: &str) -> Result<LoadedTrace, LoadError> {
        let detail = self
            .source
            .fetch_trace_detail(trace_id)
            .await
            .map_err(|source| LoadError::Trace {
                trace_id: trace_id.to_string(),
                source,
            })?;
        let observations = self.observations(trace_id).await?;
        Ok(LoadedTrace::from_parts(detail, observations))
    }

    async fn observations(&self, trace_id: &str) -> Result<Vec<Observation>, LoadError> {
        match self.source.fetch_observations(trace_id).await {
            Ok(observations) => {
                tracing::debug!(trace_id, count = observations.len(), "fetched observations");
                Ok(observations)
            }
            // A ready trace without ingested observations renders as empty.
            Err(SourceError::NotFound(_)) => {
                tracing::warn!(trace_id, "no observations found for trace");
                Ok(Vec::new())
            }
            Err(source) => Err(LoadError::Observations {
                trace_id: trace_id.to_string(),
                source,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::poller::PollOptions;
    use async_trait::async_trait;
    use spanscope_core::ObservationKind;

    struct FixedSource {
        detail: Result<TraceDetail, SourceError>,
        observations: Result<Vec<Observation>, SourceError>,
    }

    #[async_trait]
    impl TraceSource for FixedSource {
        async fn fetch_trace_detail(&self, _trace_id: &str) -> Result<TraceDetail, SourceError> {
            self.detail.clone()
        }

        async fn fetch_observations(&self, _trace_id: &str) -> Result<Vec<Observation>, SourceError> {
            self.observations.clone()
        }
    }

    fn loader(source: FixedSource) -> TimelineLoader {
        TimelineLoader::new(Arc::new(source), PollOptions::from_millis(10, 50))
    }

    #[tokio::test]
    async fn test_load_builds_forest() {
        let loader = loader(FixedSource {
            detail: Ok(TraceDetail::new("t1")),
            observations: Ok(vec![
                Observation::new("child", ObservationKind::Generation)
                    .with_parent("root")
                    .with_name("llm-call"),
                Observation::new("root", ObservationKind::Span).with_name("agent"),
            ]),
        });

        let loaded = loader.load("t1").await.unwrap();
        assert_eq!(loaded.detail.id, "t1");
        assert_eq!(loaded.forest.len(), 1);
        assert_eq!(loaded.forest[0].id(), "root");
        assert_eq!(loaded.stats().total_nodes, 2);
        assert_eq!(loaded.filtered("llm-call")[0].children.len(), 1);
    }

    #[tokio::test]
    async fn test_missing_observations_load_as_empty() {
        let loader = loader(FixedSource {
            detail: Ok(TraceDetail::new("t1")),
            observations: Err(SourceError::NotFound("/api/public/observations".into())),
        });

        let loaded = loader.load_ready("t1").await.unwrap();
        assert!(loaded.forest.is_empty());
    }

    #[tokio::test]
    async fn test_observation_errors_propagate() {
        let loader = loader(FixedSource {
            detail: Ok(TraceDetail::new("t1")),
            observations: Err(SourceError::Api {
                status: 500,
                message: "db down".into(),
            }),
        });

        let err = loader.load("t1").await.unwrap_err();
        assert!(matches!(err, LoadError::Observations { .. }));
    }

    #[tokio::test]
    async fn test_load_ready_does_not_poll() {
        let loader = loader(FixedSource {
            detail: Err(SourceError::NotFound("/api/public/traces/t1".into())),
            observations: Ok(Vec::new()),
        });

        let err = loader.load_ready("t1").await.unwrap_err();
        assert!(matches!(
            err,
            LoadError::Trace {
                source: SourceError::NotFound(_),
                ..
            }
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_load_surfaces_poll_timeout() {
        let loader = loader(FixedSource {
            detail: Err(SourceError::NotFound("/api/public/traces/t1".into())),
            observations: Ok(Vec::new()),
        });

        match loader.load("t1").await {
            Err(LoadError::Poll(err)) => {
                assert_eq!(err.kind(), crate::poller::PollErrorKind::NotReadyTimeout)
            }
            other => panic!("unexpected result: {:?}", other.map(|l| l.detail.id)),
        }
    }
}
