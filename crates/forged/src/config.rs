//! Daemon configuration.
//!
//! A simple key=value file at `.forge/config`, scoped to what the workflow
//! coordinator actually needs. Precedence: CLI flags > `--config` file >
//! `.forge/config` > defaults.

use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),
    #[error("invalid config line: {0}")]
    InvalidLine(String),
    #[error("invalid number value for {key}: {value}")]
    InvalidNumber { key: String, value: String },
    #[error("unknown config key: {0}")]
    UnknownKey(String),
}

/// Daemon configuration. Field names match the keys accepted in
/// `.forge/config`.
#[derive(Debug, Clone)]
pub struct Config {
    /// Path to the project charter. Default `PROJECT.md`.
    pub charter_path: PathBuf,
    /// Root directory of the artifact store. Default `.forge/workflows`.
    pub store_root: PathBuf,
    /// Directory for per-workflow event logs.
    pub log_dir: PathBuf,
    /// Default model hint passed through to agent invocations.
    pub model: String,
    /// Timeout, in seconds, for the alignment validator's invocation: 1800
    /// by default, by analogy with the pipeline stage default in
    /// `forge_core::registry::DEFAULT_STAGE_TIMEOUT_SEC`. Each pipeline
    /// stage's own timeout is declared per-stage in the registry; this is
    /// the one invocation the registry doesn't cover.
    pub alignment_timeout_sec: u64,
    /// Worker pool size for the parallel validator cluster.
    pub validator_concurrency: usize,
    /// Alignment confidence threshold for the Unclear-scope rule, pinned
    /// at 0.80 by default.
    pub alignment_confidence_threshold: f64,
    /// Executable used for agent runtime invocations (`invoke_subagent`).
    /// The concrete LLM provider is out of scope, so this is a configured
    /// path/name rather than a hardcoded binary.
    pub agent_cli_bin: String,
    pub agent_retries: u32,
    pub agent_retry_backoff_sec: u32,
    /// Server bind address, used by `forged serve`.
    pub bind_addr: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            charter_path: PathBuf::from("PROJECT.md"),
            store_root: PathBuf::from(".forge/workflows"),
            log_dir: PathBuf::from(".forge/logs/workflows"),
            model: "default".to_string(),
            alignment_timeout_sec: 1800,
            validator_concurrency: 3,
            alignment_confidence_threshold: 0.80,
            agent_cli_bin: "agent-runtime".to_string(),
            agent_retries: 0,
            agent_retry_backoff_sec: 5,
            bind_addr: "127.0.0.1:7701".to_string(),
        }
    }
}

impl Config {
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        config.load_file(path)?;
        Ok(config)
    }

    pub fn load_file(&mut self, path: &Path) -> Result<(), ConfigError> {
        let content = std::fs::read_to_string(path)?;
        self.parse_content(&content)
    }

    fn parse_content(&mut self, content: &str) -> Result<(), ConfigError> {
        for line in content.lines() {
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }
            let Some((key, value)) = trimmed.split_once('=') else {
                return Err(ConfigError::InvalidLine(line.to_string()));
            };
            let key = key.trim();
            let value = Self::unquote(value.trim());
            self.apply_value(key, &value)?;
        }
        Ok(())
    }

    fn unquote(value: &str) -> String {
        if value.len() >= 2
            && ((value.starts_with('"') && value.ends_with('"'))
                || (value.starts_with('\'') && value.ends_with('\'')))
        {
            return value[1..value.len() - 1].to_string();
        }
        value.to_string()
    }

    fn apply_value(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        match key {
            "charter_path" => self.charter_path = PathBuf::from(value),
            "store_root" => self.store_root = PathBuf::from(value),
            "log_dir" => self.log_dir = PathBuf::from(value),
            "model" => self.model = value.to_string(),
            "alignment_timeout_sec" => self.alignment_timeout_sec = Self::parse_u64(key, value)?,
            "validator_concurrency" => {
                self.validator_concurrency = Self::parse_u64(key, value)? as usize;
            }
            "alignment_confidence_threshold" => {
                self.alignment_confidence_threshold =
                    value.parse().map_err(|_| ConfigError::InvalidNumber {
                        key: key.to_string(),
                        value: value.to_string(),
                    })?;
            }
            "agent_cli_bin" => self.agent_cli_bin = value.to_string(),
            "agent_retries" => self.agent_retries = Self::parse_u64(key, value)? as u32,
            "agent_retry_backoff_sec" => {
                self.agent_retry_backoff_sec = Self::parse_u64(key, value)? as u32;
            }
            "bind_addr" => self.bind_addr = value.to_string(),
            other => return Err(ConfigError::UnknownKey(other.to_string())),
        }
        Ok(())
    }

    fn parse_u64(key: &str, value: &str) -> Result<u64, ConfigError> {
        value.parse().map_err(|_| ConfigError::InvalidNumber {
            key: key.to_string(),
            value: value.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec() {
        let config = Config::default();
        assert_eq!(config.charter_path, PathBuf::from("PROJECT.md"));
        assert_eq!(config.alignment_timeout_sec, 1800);
        assert_eq!(config.validator_concurrency, 3);
        assert!((config.alignment_confidence_threshold - 0.80).abs() < f64::EPSILON);
    }

    #[test]
    fn parses_key_value_pairs() {
        let mut config = Config::default();
        config
            .parse_content("charter_path = CHARTER.md\nalignment_timeout_sec=900\n# comment\n")
            .unwrap();
        assert_eq!(config.charter_path, PathBuf::from("CHARTER.md"));
        assert_eq!(config.alignment_timeout_sec, 900);
    }

    #[test]
    fn rejects_unknown_key() {
        let mut config = Config::default();
        let err = config.parse_content("bogus_key=1\n").unwrap_err();
        assert!(matches!(err, ConfigError::UnknownKey(_)));
    }

    #[test]
    fn rejects_malformed_line() {
        let mut config = Config::default();
        let err = config.parse_content("not-a-key-value-line\n").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidLine(_)));
    }

    #[test]
    fn strips_surrounding_quotes() {
        let mut config = Config::default();
        config.parse_content("model=\"opus\"\n").unwrap();
        assert_eq!(config.model, "opus");
    }
}
