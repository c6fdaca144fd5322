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

use crate::client::ClientConfig;
use crate::retry::RetryPolicy;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Spanscope Configuration
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct SpanscopeConfig {
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub poll: PollConfig,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ApiConfig {
    /// Base URL of the tracing API (e.g., "http://localhost:3000")
    #[serde(default = "default_url")]
    pub url: String,

    /// Project scope sent with every request
    #[serde(default)]
    pub project_id: Option<String>,

    /// Request timeout in seconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct PollConfig {
    /// Delay between attempts in milliseconds
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,

    /// Overall polling budget in milliseconds
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    #[serde(default)]
    pub max_attempts: Option<u32>,

    /// Delay schedule between attempts
    #[serde(default)]
    pub backoff: BackoffKind,

    /// Relative jitter in [0, 1); unset keeps the schedule's own default
    #[serde(default)]
    pub jitter: Option<f64>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BackoffKind {
    #[default]
    Constant,
    Exponential,
}

impl FromStr for BackoffKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "constant" => Ok(BackoffKind::Constant),
            "exponential" => Ok(BackoffKind::Exponential),
            other => Err(ConfigError::Invalid(format!("unknown backoff {:?}", other))),
        }
    }
}

fn default_url() -> String {
    "http://localhost:3000".to_string()
}

fn default_request_timeout() -> u64 {
    30
}

fn default_interval_ms() -> u64 {
    2_000
}

fn default_timeout_ms() -> u64 {
    30_000
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            url: default_url(),
            project_id: None,
            request_timeout_secs: default_request_timeout(),
        }
    }
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval_ms: default_interval_ms(),
            timeout_ms: default_timeout_ms(),
            max_attempts: None,
            backoff: BackoffKind::Constant,
            jitter: None,
        }
    }
}

impl SpanscopeConfig {
    /// Load configuration from TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(toml::from_str(&content)?)
    }

    /// Load configuration from environment variables
    ///
    /// Supported environment variables:
    /// - SPANSCOPE_URL: API base URL (default: http://localhost:3000)
    /// - SPANSCOPE_PROJECT_ID: Project scope header
    /// - SPANSCOPE_REQUEST_TIMEOUT_SECS: Request timeout in seconds (default: 30)
    /// - SPANSCOPE_POLL_INTERVAL_MS: Poll interval (default: 2000)
    /// - SPANSCOPE_POLL_TIMEOUT_MS: Poll timeout (default: 30000)
    /// - SPANSCOPE_POLL_BACKOFF: constant or exponential (default: constant)
    /// - SPANSCOPE_POLL_JITTER: Relative jitter, e.g. 0.1
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.apply_env(|key| std::env::var(key).ok());
        config
    }

    /// Load configuration with priority: file > env > defaults
    pub fn load(config_file: Option<PathBuf>) -> Result<Self, ConfigError> {
        let config = match config_file {
            Some(path) if path.exists() => {
                tracing::info!("Loading configuration from file: {:?}", path);
                Self::from_file(&path)?
            }
            Some(path) => {
                tracing::warn!("Config file not found: {:?}, using defaults", path);
                Self::default()
            }
            None => Self::default(),
        };

        Ok(Self::merge_with_env(config))
    }

    /// Fill in values from environment variables that are explicitly set.
    fn merge_with_env(mut config: Self) -> Self {
        config.apply_env(|key| std::env::var(key).ok());
        config
    }

    fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(url) = lookup("SPANSCOPE_URL") {
            self.api.url = url;
        }
        if let Some(project_id) = lookup("SPANSCOPE_PROJECT_ID") {
            self.api.project_id = Some(project_id).filter(|p| !p.is_empty());
        }
        parse_env(&lookup, "SPANSCOPE_REQUEST_TIMEOUT_SECS", &mut self.api.request_timeout_secs);
        parse_env(&lookup, "SPANSCOPE_POLL_INTERVAL_MS", &mut self.poll.interval_ms);
        parse_env(&lookup, "SPANSCOPE_POLL_TIMEOUT_MS", &mut self.poll.timeout_ms);
        parse_env(&lookup, "SPANSCOPE_POLL_BACKOFF", &mut self.poll.backoff);
        if let Some(raw) = lookup("SPANSCOPE_POLL_JITTER") {
            match raw.trim().parse() {
                Ok(jitter) => self.poll.jitter = Some(jitter),
                Err(_) => tracing::warn!("Ignoring invalid SPANSCOPE_POLL_JITTER={:?}", raw),
            }
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        let url = self.api.url.trim();
        if url.is_empty() {
            return Err(ConfigError::Invalid("api.url must not be empty".into()));
        }
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(ConfigError::Invalid(format!(
                "api.url must be an http(s) URL, got {:?}",
                url
            )));
        }
        if self.api.request_timeout_secs == 0 {
            return Err(ConfigError::Invalid("api.request_timeout_secs must be > 0".into()));
        }
        if self.poll.timeout_ms == 0 {
            return Err(ConfigError::Invalid("poll.timeout_ms must be > 0".into()));
        }
        if self.poll.interval_ms == 0 {
            return Err(ConfigError::Invalid("poll.interval_ms must be > 0".into()));
        }
        if self.poll.interval_ms > self.poll.timeout_ms {
            return Err(ConfigError::Invalid(format!(
                "poll.interval_ms ({}) must not exceed poll.timeout_ms ({})",
                self.poll.interval_ms, self.poll.timeout_ms
            )));
        }
        if let Some(jitter) = self.poll.jitter {
            if !(0.0..1.0).contains(&jitter) {
                return Err(ConfigError::Invalid(format!(
                    "poll.jitter must be in [0, 1), got {}",
                    jitter
                )));
            }
        }
        if self.poll.max_attempts == Some(0) {
            return Err(ConfigError::Invalid("poll.max_attempts must be > 0".into()));
        }
        Ok(())
    }

    pub fn client_config(&self) -> ClientConfig {
        let config = ClientConfig::new(self.api.url.trim())
            .with_timeout(Duration::from_secs(self.api.request_timeout_secs));
        match &self.api.project_id {
            Some(project_id) => config.with_project_id(project_id),
            None => config,
        }
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        let interval = Duration::from_millis(self.poll.interval_ms);
        let timeout = Duration::from_millis(self.poll.timeout_ms);
        let mut policy = match self.poll.backoff {
            BackoffKind::Constant => RetryPolicy::constant(interval, timeout),
            BackoffKind::Exponential => RetryPolicy::exponential(interval, timeout),
        };
        if let Some(jitter) = self.poll.jitter {
            policy = policy.with_jitter(jitter);
        }
        match self.poll.max_attempts {
            Some(max) => policy.with_max_attempts(max),
            None => policy,
        }
    }
}

fn parse_env<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str, target: &mut T) {
    if let Some(raw) = lookup(key) {
        match raw.trim().parse() {
            Ok(val) => *target = val,
            Err(_) => tracing::warn!("Ignoring invalid {}={:?}", key, raw),
        }
    }
}
