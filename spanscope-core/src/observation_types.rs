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

//! Observation Kind Taxonomy
//!
//! The closed set of observation kinds reported by the tracing API, open to
//! extension through [`ObservationKind::Other`]. Kinds only drive rendering
//! (badges/icons), never tree construction.

use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use std::fmt;
use std::str::FromStr;

/// Kind of an observation within a trace.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ObservationKind {
    /// A unit of work with a duration.
    #[default]
    Span,
    /// An LLM call.
    Generation,
    /// A point-in-time event.
    Event,
    /// Any kind this client does not know about.
    Other(String),
}

impl ObservationKind {
    /// Wire representation.
    pub fn as_str(&self) -> &str {
        match self {
            ObservationKind::Span => "SPAN",
            ObservationKind::Generation => "GENERATION",
            ObservationKind::Event => "EVENT",
            ObservationKind::Other(s) => s.as_str(),
        }
    }

    /// Short fixed-width label used when rendering a timeline row.
    pub fn badge(&self) -> &'static str {
        match self {
            ObservationKind::Span => "[S]",
            ObservationKind::Generation => "[G]",
            ObservationKind::Event => "[E]",
            ObservationKind::Other(_) => "[?]",
        }
    }
}

impl fmt::Display for ObservationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for ObservationKind {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "SPAN" => Ok(ObservationKind::Span),
            "GENERATION" => Ok(ObservationKind::Generation),
            "EVENT" => Ok(ObservationKind::Event),
            _ => Ok(ObservationKind::Other(s.to_string())),
        }
    }
}

impl From<String> for ObservationKind {
    fn from(s: String) -> Self {
        match s.parse() {
            Ok(kind) => kind,
            Err(never) => match never {},
        }
    }
}

impl From<ObservationKind> for String {
    fn from(kind: ObservationKind) -> Self {
        kind.as_str().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_str() {
        assert_eq!(
            "generation".parse::<ObservationKind>().unwrap(),
            ObservationKind::Generation
        );
        assert_eq!("SPAN".parse::<ObservationKind>().unwrap(), ObservationKind::Span);
        assert!(matches!(
            "TOOL".parse::<ObservationKind>().unwrap(),
            ObservationKind::Other(s) if s == "TOOL"
        ));
    }

    #[test]
    fn test_serde_uses_wire_names() {
        let json = serde_json::to_string(&ObservationKind::Event).unwrap();
        assert_eq!(json, "\"EVENT\"");

        let kind: ObservationKind = serde_json::from_str("\"RETRIEVER\"").unwrap();
        assert_eq!(kind, ObservationKind::Other("RETRIEVER".into()));
        assert_eq!(serde_json::to_string(&kind).unwrap(), "\"RETRIEVER\"");
    }
}
