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

//! Observation records as returned by the tracing API.
//!
//! Observations arrive as a flat list linked to their parent by id. Every
//! field except `id` may be missing from the payload; missing values degrade
//! rendering (no latency, sorted last) instead of failing deserialization.

use crate::observation_types::ObservationKind;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A named numeric score attached to a trace or observation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Score {
    pub name: String,
    pub value: f64,
}

impl Score {
    pub fn new(name: impl Into<String>, value: f64) -> Self {
        Self {
            name: name.into(),
            value,
        }
    }
}

/// A single span, generation or event belonging to a trace.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Observation {
    /// Unique observation identifier.
    pub id: String,
    /// Trace this observation belongs to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trace_id: Option<String>,
    /// Parent observation; `None` means root level.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_observation_id: Option<String>,
    #[serde(rename = "type", default)]
    pub kind: ObservationKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_time: Option<DateTime<Utc>>,
    /// Absent while the observation is still in flight.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_time: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub level: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub scores: Vec<Score>,
}

impl Observation {
    /// Create a bare observation of the given kind.
    pub fn new(id: impl Into<String>, kind: ObservationKind) -> Self {
        Self {
            id: id.into(),
            kind,
            ..Default::default()
        }
    }

    pub fn with_parent(mut self, parent_id: impl Into<String>) -> Self {
        self.parent_observation_id = Some(parent_id.into());
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_times(mut self, start: Option<DateTime<Utc>>, end: Option<DateTime<Utc>>) -> Self {
        self.start_time = start;
        self.end_time = end;
        self
    }

    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = Some(metadata);
        self
    }

    pub fn with_score(mut self, score: Score) -> Self {
        self.scores.push(score);
        self
    }

    /// `end_time - start_time` in seconds, when both are known.
    ///
    /// Negative durations (end before start) are returned unchanged.
    pub fn latency_seconds(&self) -> Option<f64> {
        latency_between(self.start_time, self.end_time)
    }

    /// Display name, falling back to the kind.
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or_else(|| self.kind.as_str())
    }
}

pub(crate) fn latency_between(
    start: Option<DateTime<Utc>>,
    end: Option<DateTime<Utc>>,
) -> Option<f64> {
    let (start, end) = (start?, end?);
    let delta = end.signed_duration_since(start);
    match delta.num_microseconds() {
        Some(us) => Some(us as f64 / 1_000_000.0),
        None => Some(delta.num_milliseconds() as f64 / 1_000.0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    #[test]
    fn test_latency_requires_both_timestamps() {
        let obs = Observation::new("a", ObservationKind::Span).with_times(Some(at(0)), None);
        assert_eq!(obs.latency_seconds(), None);

        let obs = Observation::new("a", ObservationKind::Span).with_times(None, Some(at(1)));
        assert_eq!(obs.latency_seconds(), None);
    }

    #[test]
    fn test_latency_fractional_and_negative() {
        let start = at(0);
        let obs = Observation::new("a", ObservationKind::Generation)
            .with_times(Some(start), Some(start + Duration::milliseconds(1500)));
        assert_eq!(obs.latency_seconds(), Some(1.5));

        let obs = Observation::new("b", ObservationKind::Span).with_times(Some(at(5)), Some(at(2)));
        assert_eq!(obs.latency_seconds(), Some(-3.0));
    }

    #[test]
    fn test_deserialize_sparse_payload() {
        let obs: Observation = serde_json::from_str(r#"{"id": "obs-1"}"#).unwrap();
        assert_eq!(obs.id, "obs-1");
        assert_eq!(obs.kind, ObservationKind::Span);
        assert!(obs.parent_observation_id.is_none());
        assert!(obs.scores.is_empty());
    }

    #[test]
    fn test_deserialize_camel_case_payload() {
        let json = r#"{
            "id": "obs-2",
            "traceId": "trace-1",
            "parentObservationId": "obs-1",
            "type": "GENERATION",
            "name": "llm-call",
            "startTime": "2024-01-01T00:00:00Z",
            "endTime": "2024-01-01T00:00:02.250Z",
            "model": "gpt-4o",
            "scores": [{"name": "accuracy", "value": 0.9}]
        }"#;
        let obs: Observation = serde_json::from_str(json).unwrap();
        assert_eq!(obs.parent_observation_id.as_deref(), Some("obs-1"));
        assert_eq!(obs.kind, ObservationKind::Generation);
        assert_eq!(obs.latency_seconds(), Some(2.25));
        assert_eq!(obs.scores, vec![Score::new("accuracy", 0.9)]);
        assert_eq!(obs.display_name(), "llm-call");
    }
}
