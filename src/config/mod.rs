//! Runtime configuration (layered: code > env > TOML file).

use std::path::Path;
use std::sync::OnceLock;

use bon::Builder;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::error::{MasError, Result};

/// Global default config (lazy-initialized from env).
static DEFAULT_CONFIG: OnceLock<MasConfig> = OnceLock::new();

/// Per-session turn scheduling policy. Only sequential turns are
/// supported: a session never has more than one open turn.
#[derive(
    Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Display, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum TurnConcurrency {
    #[default]
    Sequential,
}

/// Runtime limits for turn coordination.
#[derive(Debug, Clone, Builder, Serialize, Deserialize, PartialEq)]
pub struct MasConfig {
    /// Hop-count ceiling per turn; exceeding it fails the turn.
    #[builder(default = 16)]
    #[serde(default = "default_max_hops")]
    pub max_hops: u32,
    /// Deadline for a single hop dispatch, in milliseconds.
    #[builder(default = 60_000)]
    #[serde(default = "default_hop_timeout_ms")]
    pub hop_timeout_ms: u64,
    /// How many times a timed-out hop is retried before failing.
    #[builder(default = 2)]
    #[serde(default = "default_retry_budget")]
    pub retry_budget: u32,
    #[builder(default)]
    #[serde(default)]
    pub turn_concurrency: TurnConcurrency,
}

fn default_max_hops() -> u32 {
    16
}

fn default_hop_timeout_ms() -> u64 {
    60_000
}

fn default_retry_budget() -> u32 {
    2
}

impl Default for MasConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl MasConfig {
    /// Load from environment variables, honoring a `.env` file if present.
    ///
    /// Recognized variables: `OXYMAS_MAX_HOPS`, `OXYMAS_HOP_TIMEOUT_MS`,
    /// `OXYMAS_RETRY_BUDGET`, `OXYMAS_TURN_CONCURRENCY`.
    pub fn from_env() -> Result<Self> {
        let _ = dotenvy::dotenv(); // load .env if present, ignore error
        let mut config = Self::default();

        if let Ok(v) = std::env::var("OXYMAS_MAX_HOPS") {
            config.max_hops = parse_env("OXYMAS_MAX_HOPS", &v)?;
        }
        if let Ok(v) = std::env::var("OXYMAS_HOP_TIMEOUT_MS") {
            config.hop_timeout_ms = parse_env("OXYMAS_HOP_TIMEOUT_MS", &v)?;
        }
        if let Ok(v) = std::env::var("OXYMAS_RETRY_BUDGET") {
            config.retry_budget = parse_env("OXYMAS_RETRY_BUDGET", &v)?;
        }
        if let Ok(v) = std::env::var("OXYMAS_TURN_CONCURRENCY") {
            config.turn_concurrency = v.parse().map_err(|_| {
                MasError::Configuration(format!(
                    "OXYMAS_TURN_CONCURRENCY: unrecognized value '{v}' (expected 'sequential')"
                ))
            })?;
        }

        Ok(config)
    }

    /// Load from a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let contents = std::fs::read_to_string(path.as_ref())?;
        toml::from_str(&contents)
            .map_err(|e| MasError::Configuration(format!("invalid config file: {e}")))
    }

    /// Load from the platform config directory (`<config>/oxymas/config.toml`),
    /// falling back to defaults when the file does not exist.
    pub fn load_default_file() -> Result<Self> {
        let Some(dirs) = directories::ProjectDirs::from("", "", "oxymas") else {
            return Ok(Self::default());
        };
        let path = dirs.config_dir().join("config.toml");
        if path.exists() {
            Self::from_file(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Get (or create) the global default config.
    pub fn global() -> &'static MasConfig {
        DEFAULT_CONFIG.get_or_init(|| Self::from_env().unwrap_or_default())
    }

    /// Hop deadline as a [`std::time::Duration`].
    pub fn hop_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.hop_timeout_ms)
    }
}

fn parse_env<T: std::str::FromStr>(var: &str, value: &str) -> Result<T> {
    value
        .parse()
        .map_err(|_| MasError::Configuration(format!("{var}: cannot parse '{value}'")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let config = MasConfig::default();
        assert_eq!(config.max_hops, 16);
        assert_eq!(config.hop_timeout_ms, 60_000);
        assert_eq!(config.retry_budget, 2);
        assert_eq!(config.turn_concurrency, TurnConcurrency::Sequential);
    }

    #[test]
    fn builder_overrides_fields() {
        let config = MasConfig::builder().max_hops(4).retry_budget(0).build();
        assert_eq!(config.max_hops, 4);
        assert_eq!(config.retry_budget, 0);
        assert_eq!(config.hop_timeout_ms, 60_000);
    }

    #[test]
    fn toml_parses_partial_config() {
        let config: MasConfig = toml::from_str("max_hops = 8").unwrap();
        assert_eq!(config.max_hops, 8);
        assert_eq!(config.retry_budget, 2);
    }

    #[test]
    fn toml_rejects_unknown_concurrency() {
        let parsed: std::result::Result<MasConfig, _> =
            toml::from_str("turn_concurrency = \"parallel\"");
        assert!(parsed.is_err());
    }

    #[test]
    fn from_file_reads_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "max_hops = 3\nhop_timeout_ms = 250\n").unwrap();

        let config = MasConfig::from_file(&path).unwrap();
        assert_eq!(config.max_hops, 3);
        assert_eq!(config.hop_timeout_ms, 250);
    }

    #[test]
    fn from_file_rejects_garbage() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "max_hops = \"lots\"").unwrap();

        let err = MasConfig::from_file(&path).unwrap_err();
        assert!(matches!(err, MasError::Configuration(_)));
    }

    #[test]
    fn turn_concurrency_round_trips() {
        assert_eq!(TurnConcurrency::Sequential.to_string(), "sequential");
        assert_eq!(
            "sequential".parse::<TurnConcurrency>().unwrap(),
            TurnConcurrency::Sequential
        );
    }
}
