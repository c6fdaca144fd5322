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

//! Retry policy for polling (delay schedule + wall-clock deadline).
//!
//! All scheduling math lives here so the poller only asks "when is the next
//! attempt, if any". Instants are tokio instants, which makes the policy
//! testable under a paused clock.

use rand::random;
use std::time::Duration;
use tokio::time::Instant;

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(2_000);
pub const DEFAULT_POLL_TIMEOUT: Duration = Duration::from_millis(30_000);

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Backoff {
    /// Same delay between every attempt.
    Constant,
    /// `interval * multiplier^n`, capped at `max_delay`.
    Exponential { multiplier: f64, max_delay: Duration },
}

#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Delay after the first attempt.
    pub interval: Duration,
    /// Overall budget, measured from the start of polling.
    pub timeout: Duration,
    /// Optional cap on attempts in addition to the deadline.
    pub max_attempts: Option<u32>,
    pub backoff: Backoff,
    /// Relative jitter in `[0, 1)`; 0 disables it.
    pub jitter: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::constant(DEFAULT_POLL_INTERVAL, DEFAULT_POLL_TIMEOUT)
    }
}

impl RetryPolicy {
    pub fn constant(interval: Duration, timeout: Duration) -> Self {
        Self {
            interval,
            timeout,
            max_attempts: None,
            backoff: Backoff::Constant,
            jitter: 0.0,
        }
    }

    pub fn exponential(initial: Duration, timeout: Duration) -> Self {
        Self {
            interval: initial,
            timeout,
            max_attempts: None,
            backoff: Backoff::Exponential {
                multiplier: 2.0,
                max_delay: Duration::from_secs(10),
            },
            jitter: 0.1,
        }
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = Some(max_attempts);
        self
    }

    pub fn with_jitter(mut self, jitter: f64) -> Self {
        self.jitter = jitter.clamp(0.0, 0.99);
        self
    }

    /// Delay to wait after attempt number `attempt` (0-based) before the next.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        if self.backoff == Backoff::Constant && self.jitter <= 0.0 {
            return self.interval;
        }
        let base = match self.backoff {
            Backoff::Constant => self.interval.as_secs_f64(),
            Backoff::Exponential {
                multiplier,
                max_delay,
            } => (self.interval.as_secs_f64() * multiplier.powi(attempt as i32))
                .min(max_delay.as_secs_f64()),
        };
        let jittered = if self.jitter > 0.0 {
            base * (1.0 + (random::<f64>() - 0.5) * 2.0 * self.jitter)
        } else {
            base
        };
        Duration::from_secs_f64(jittered.max(0.0))
    }

    pub fn deadline(&self, started_at: Instant) -> Instant {
        started_at + self.timeout
    }

    /// When to issue the next attempt after `attempts_made` attempts, or
    /// `None` when the budget is exhausted. An attempt may start exactly at
    /// the deadline but never after it.
    pub fn next_attempt_at(
        &self,
        started_at: Instant,
        now: Instant,
        attempts_made: u32,
    ) -> Option<Instant> {
        if self
            .max_attempts
            .is_some_and(|max| attempts_made >= max)
        {
            return None;
        }
        let at = now + self.delay_for_attempt(attempts_made.saturating_sub(1));
        (at <= self.deadline(started_at)).then_some(at)
    }

    /// Attempts made when every fetch returns instantly. Only constant,
    /// jitter-free schedules are predictable; others return `None`.
    pub fn expected_attempts(&self) -> Option<u32> {
        if self.backoff != Backoff::Constant || self.jitter > 0.0 {
            return None;
        }
        let by_deadline = if self.interval.is_zero() {
            u32::MAX
        } else {
            let gaps = self.timeout.as_nanos() / self.interval.as_nanos();
            u32::try_from(gaps).unwrap_or(u32::MAX).saturating_add(1)
        };
        Some(match self.max_attempts {
            Some(max) => by_deadline.min(max),
            None => by_deadline,
        })
    }
}
