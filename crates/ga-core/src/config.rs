use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::stream::ChunkSize;

/// Top-level configuration loaded from `~/.git-agent/config.toml`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub agent: AgentConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Load config from `~/.git-agent/config.toml`, falling back to
    /// defaults when the file does not exist.
    pub fn load() -> Result<Self, ConfigError> {
        let path = Self::default_path();
        if path.exists() {
            Self::load_from(path)
        } else {
            let cfg = Config::default();
            cfg.validate()?;
            Ok(cfg)
        }
    }

    /// Load from a specific path.
    pub fn load_from(path: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        let path = path.into();
        let text = std::fs::read_to_string(&path).map_err(|e| ConfigError::Io(e.to_string()))?;
        Self::parse(&text)
    }

    pub fn parse(text: &str) -> Result<Self, ConfigError> {
        let cfg: Config = toml::from_str(text).map_err(|e| ConfigError::Parse(e.to_string()))?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Serialize config to TOML string.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        self.validate()?;
        toml::to_string_pretty(self).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.agent.validate()
    }

    pub fn default_path() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".git-agent")
            .join("config.toml")
    }
}

// ---------------------------------------------------------------------------
// Error
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("io: {0}")]
    Io(String),
    #[error("parse: {0}")]
    Parse(String),
    #[error("validation: {0}")]
    Validation(String),
}

// ---------------------------------------------------------------------------
// Section structs
// ---------------------------------------------------------------------------

/// Per-agent settings, fixed when the agent starts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Elements per streamed chunk when a call does not override it.
    #[serde(default)]
    pub stream_chunk_size: ChunkSize,
    /// Default per-call deadline.
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
    /// Stop after this long without requests. Absent means never.
    #[serde(default)]
    pub idle_timeout_ms: Option<u64>,
    #[serde(default = "default_cache_capacity")]
    pub cache_capacity: usize,
    #[serde(default = "default_max_open_streams")]
    pub max_open_streams: usize,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            stream_chunk_size: ChunkSize::default(),
            request_timeout_ms: default_request_timeout_ms(),
            idle_timeout_ms: None,
            cache_capacity: default_cache_capacity(),
            max_open_streams: default_max_open_streams(),
        }
    }
}

impl AgentConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn idle_timeout(&self) -> Option<Duration> {
        self.idle_timeout_ms.map(Duration::from_millis)
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout_ms = timeout.as_millis().try_into().unwrap_or(u64::MAX);
        self
    }

    pub fn with_idle_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.idle_timeout_ms = timeout.map(|t| t.as_millis().try_into().unwrap_or(u64::MAX));
        self
    }

    pub fn with_chunk_size(mut self, size: ChunkSize) -> Self {
        self.stream_chunk_size = size;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.request_timeout_ms == 0 {
            return Err(ConfigError::Validation(
                "agent.request_timeout_ms must be positive".into(),
            ));
        }
        if self.idle_timeout_ms == Some(0) {
            return Err(ConfigError::Validation(
                "agent.idle_timeout_ms must be positive (omit it to never stop)".into(),
            ));
        }
        if self.cache_capacity == 0 {
            return Err(ConfigError::Validation(
                "agent.cache_capacity must be positive".into(),
            ));
        }
        if self.max_open_streams == 0 {
            return Err(ConfigError::Validation(
                "agent.max_open_streams must be positive".into(),
            ));
        }
        Ok(())
    }
}

fn default_request_timeout_ms() -> u64 {
    5_000
}
fn default_cache_capacity() -> usize {
    1_024
}
fn default_max_open_streams() -> usize {
    64
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

fn default_log_level() -> String {
    "info".into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_yields_defaults() {
        let cfg = Config::parse("").unwrap();
        assert_eq!(cfg, Config::default());
        assert_eq!(cfg.agent.idle_timeout(), None);
        assert_eq!(cfg.agent.request_timeout(), Duration::from_secs(5));
    }

    #[test]
    fn chunk_size_accepts_unbounded() {
        let cfg = Config::parse(
            r#"
            [agent]
            stream_chunk_size = "unbounded"
            idle_timeout_ms = 250
            "#,
        )
        .unwrap();
        assert!(cfg.agent.stream_chunk_size.is_unbounded());
        assert_eq!(cfg.agent.idle_timeout(), Some(Duration::from_millis(250)));
    }

    #[test]
    fn zero_values_are_rejected() {
        for text in [
            "[agent]\nrequest_timeout_ms = 0",
            "[agent]\nidle_timeout_ms = 0",
            "[agent]\ncache_capacity = 0",
            "[agent]\nmax_open_streams = 0",
        ] {
            assert!(
                matches!(Config::parse(text), Err(ConfigError::Validation(_))),
                "{text} should fail validation"
            );
        }
        assert!(matches!(
            Config::parse("[agent]\nstream_chunk_size = 0"),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn toml_round_trip_keeps_settings() {
        let mut cfg = Config::default();
        cfg.agent.stream_chunk_size = ChunkSize::new(7).unwrap();
        cfg.agent.idle_timeout_ms = Some(1_000);
        cfg.logging.json = true;
        let text = cfg.to_toml().unwrap();
        assert_eq!(Config::parse(&text).unwrap(), cfg);
    }

    #[test]
    fn load_from_missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = Config::load_from(dir.path().join("nope.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }
}
