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

//! Trace poller
//!
//! Traces are ingested asynchronously, so a freshly created trace id usually
//! answers 404 for a while. The poller keeps asking until the trace detail is
//! available, a non-transient error occurs, the deadline passes, or the caller
//! cancels.
//!
//! Two entry points share one attempt loop:
//! - [`TracePoller::poll`] returns a future resolving to the trace detail.
//! - [`TracePoller::start`] runs the loop on a tokio task and reports through
//!   callbacks; the returned [`PollHandle`] exposes state and cancellation.
//!
//! Callback contract for `start`: exactly one of `on_success`/`on_failure`
//! runs, at most once, and neither runs once `cancel()` has been called.

use crate::retry::{RetryPolicy, DEFAULT_POLL_INTERVAL, DEFAULT_POLL_TIMEOUT};
use crate::source::{SourceError, TraceSource};
use futures::FutureExt;
use parking_lot::Mutex;
use spanscope_core::TraceDetail;
use std::any::Any;
use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, timeout_at, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Caller-facing polling knobs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollOptions {
    pub interval: Duration,
    pub timeout: Duration,
    pub max_attempts: Option<u32>,
}

impl Default for PollOptions {
    fn default() -> Self {
        Self {
            interval: DEFAULT_POLL_INTERVAL,
            timeout: DEFAULT_POLL_TIMEOUT,
            max_attempts: None,
        }
    }
}

impl PollOptions {
    pub fn from_millis(interval_ms: u64, timeout_ms: u64) -> Self {
        Self {
            interval: Duration::from_millis(interval_ms),
            timeout: Duration::from_millis(timeout_ms),
            max_attempts: None,
        }
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = Some(max_attempts);
        self
    }
}

impl From<PollOptions> for RetryPolicy {
    fn from(options: PollOptions) -> Self {
        let policy = RetryPolicy::constant(options.interval, options.timeout);
        match options.max_attempts {
            Some(max) => policy.with_max_attempts(max),
            None => policy,
        }
    }
}

/// Progress of a running poll.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollAttempt {
    pub trace_id: String,
    /// Attempts issued so far, including the one in flight.
    pub attempt_count: u32,
    pub started_at: Instant,
}

impl PollAttempt {
    pub fn elapsed(&self) -> Duration {
        self.started_at.elapsed()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollState {
    Idle,
    Polling(PollAttempt),
    Ready,
    Failed,
    TimedOut,
    Cancelled,
}

impl PollState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            PollState::Ready | PollState::Failed | PollState::TimedOut | PollState::Cancelled
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PollState::Idle => "idle",
            PollState::Polling(_) => "polling",
            PollState::Ready => "ready",
            PollState::Failed => "failed",
            PollState::TimedOut => "timed-out",
            PollState::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for PollState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PollErrorKind {
    NotReadyTimeout,
    FetchError,
}

impl PollErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            PollErrorKind::NotReadyTimeout => "not-ready-timeout",
            PollErrorKind::FetchError => "fetch-error",
        }
    }
}

impl fmt::Display for PollErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum PollError {
    #[error("trace {trace_id} not ready after {attempts} attempts ({elapsed:?})")]
    NotReadyTimeout {
        trace_id: String,
        attempts: u32,
        elapsed: Duration,
    },

    #[error("failed to fetch trace {trace_id}: {source}")]
    FetchError {
        trace_id: String,
        #[source]
        source: SourceError,
    },
}

impl PollError {
    pub fn kind(&self) -> PollErrorKind {
        match self {
            PollError::NotReadyTimeout { .. } => PollErrorKind::NotReadyTimeout,
            PollError::FetchError { .. } => PollErrorKind::FetchError,
        }
    }

    pub fn trace_id(&self) -> &str {
        match self {
            PollError::NotReadyTimeout { trace_id, .. } | PollError::FetchError { trace_id, .. } => {
                trace_id
            }
        }
    }
}

/// Polls a [`TraceSource`] until a trace is ready.
#[derive(Clone)]
pub struct TracePoller {
    source: Arc<dyn TraceSource>,
    policy: RetryPolicy,
}

impl TracePoller {
    pub fn new(source: Arc<dyn TraceSource>, policy: impl Into<RetryPolicy>) -> Self {
        Self {
            source,
            policy: policy.into(),
        }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Poll until ready, as a plain future. Dropping the future stops polling.
    pub async fn poll(&self, trace_id: &str) -> Result<TraceDetail, PollError> {
        run_attempts(self.source.as_ref(), &self.policy, trace_id, None).await
    }

    /// Poll on a background task, reporting through callbacks.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start<S, F>(&self, trace_id: impl Into<String>, on_success: S, on_failure: F) -> PollHandle
    where
        S: FnOnce(TraceDetail) + Send + 'static,
        F: FnOnce(PollError) + Send + 'static,
    {
        let trace_id = trace_id.into();
        let state = Arc::new(Mutex::new(PollState::Idle));
        let cancel = CancellationToken::new();

        let task = tokio::spawn(drive(
            self.source.clone(),
            self.policy.clone(),
            trace_id.clone(),
            state.clone(),
            cancel.clone(),
            on_success,
            on_failure,
        ));

        PollHandle {
            trace_id,
            state,
            cancel,
            task,
        }
    }
}

impl fmt::Debug for TracePoller {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TracePoller")
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

/// Handle to a poll started with [`TracePoller::start`].
///
/// Dropping the handle detaches the task; it keeps polling and still invokes
/// its callbacks.
#[derive(Debug)]
pub struct PollHandle {
    trace_id: String,
    state: Arc<Mutex<PollState>>,
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl PollHandle {
    pub fn trace_id(&self) -> &str {
        &self.trace_id
    }

    pub fn state(&self) -> PollState {
        self.state.lock().clone()
    }

    /// Stop polling. No callback runs after this returns unless the poll had
    /// already reached a terminal state. Idempotent.
    pub fn cancel(&self) {
        {
            let mut state = self.state.lock();
            if !state.is_terminal() {
                debug!(trace_id = %self.trace_id, "poll cancelled");
                *state = PollState::Cancelled;
            }
        }
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Wait for the task to exit and return the final state.
    pub async fn finished(self) -> PollState {
        if let Err(e) = self.task.await {
            warn!(trace_id = %self.trace_id, error = %e, "poll task ended abnormally");
        }
        let state = self.state.lock().clone();
        state
    }
}

async fn drive<S, F>(
    source: Arc<dyn TraceSource>,
    policy: RetryPolicy,
    trace_id: String,
    state: Arc<Mutex<PollState>>,
    cancel: CancellationToken,
    on_success: S,
    on_failure: F,
) where
    S: FnOnce(TraceDetail) + Send + 'static,
    F: FnOnce(PollError) + Send + 'static,
{
    let outcome = tokio::select! {
        biased;
        _ = cancel.cancelled() => return,
        outcome = run_attempts(source.as_ref(), &policy, &trace_id, Some(state.as_ref())) => outcome,
    };

    // Decide under the lock, call back outside it.
    let fire = {
        let mut guard = state.lock();
        if guard.is_terminal() {
            false
        } else {
            *guard = match &outcome {
                Ok(_) => PollState::Ready,
                Err(PollError::NotReadyTimeout { .. }) => PollState::TimedOut,
                Err(PollError::FetchError { .. }) => PollState::Failed,
            };
            true
        }
    };
    if !fire {
        return;
    }

    match outcome {
        Ok(detail) => on_success(detail),
        Err(err) => on_failure(err),
    }
}

async fn run_attempts(
    source: &dyn TraceSource,
    policy: &RetryPolicy,
    trace_id: &str,
    state: Option<&Mutex<PollState>>,
) -> Result<TraceDetail, PollError> {
    let started_at = Instant::now();
    let deadline = policy.deadline(started_at);
    let mut attempt = PollAttempt {
        trace_id: trace_id.to_string(),
        attempt_count: 0,
        started_at,
    };

    loop {
        attempt.attempt_count += 1;
        if let Some(state) = state {
            let mut guard = state.lock();
            if !guard.is_terminal() {
                *guard = PollState::Polling(attempt.clone());
            }
        }
        debug!(trace_id, attempt = attempt.attempt_count, "polling trace");

        let fetch = AssertUnwindSafe(source.fetch_trace_detail(trace_id)).catch_unwind();
        let result = match timeout_at(deadline, fetch).await {
            Ok(Ok(result)) => result,
            Ok(Err(panic)) => Err(SourceError::Internal(panic_message(panic.as_ref()))),
            Err(_) => {
                warn!(
                    trace_id,
                    attempts = attempt.attempt_count,
                    "trace not ready before deadline (fetch in flight)"
                );
                return Err(not_ready(&attempt));
            }
        };

        match result {
            Ok(detail) => {
                info!(
                    trace_id,
                    attempts = attempt.attempt_count,
                    elapsed_ms = attempt.elapsed().as_millis() as u64,
                    "trace ready"
                );
                return Ok(detail);
            }
            Err(e) if e.is_transient() => {
                match policy.next_attempt_at(started_at, Instant::now(), attempt.attempt_count) {
                    Some(at) => sleep_until(at).await,
                    None => {
                        warn!(trace_id, attempts = attempt.attempt_count, "trace not ready before deadline");
                        return Err(not_ready(&attempt));
                    }
                }
            }
            Err(source) => {
                warn!(
                    trace_id,
                    attempts = attempt.attempt_count,
                    status = ?source.status(),
                    error = %source,
                    "trace fetch failed"
                );
                return Err(PollError::FetchError {
                    trace_id: trace_id.to_string(),
                    source,
                });
            }
        }
    }
}

fn not_ready(attempt: &PollAttempt) -> PollError {
    PollError::NotReadyTimeout {
        trace_id: attempt.trace_id.clone(),
        attempts: attempt.attempt_count,
        elapsed: attempt.elapsed(),
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        format!("panicked: {}", s)
    } else if let Some(s) = panic.downcast_ref::<String>() {
        format!("panicked: {}", s)
    } else {
        "panicked".to_string()
    }
}
