//! Trace contract configuration loading
//!
//! Loads configuration from `~/.config/codex/trace_contract.toml` (or the
//! `TRACE_CONTRACT_CONFIG` env var). A missing file means defaults.

use crate::errors::{Result, TraceContractError};
use crate::validator::ValidateOptions;
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Root configuration for the trace contract layer
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct TraceContractConfig {
    /// Log every validation finding at debug level
    #[serde(default)]
    pub dev_mode: bool,

    /// Escalate substance-contract violations through the strict validator
    #[serde(default)]
    pub strict_substance: bool,

    /// Treat schema version drift as an error (non-rolling deploys)
    #[serde(default)]
    pub version_mismatch_is_error: bool,

    /// Enrichment cache settings
    #[serde(default)]
    pub enrichment: EnrichmentConfig,
}

/// Enrichment cache configuration
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct EnrichmentConfig {
    /// Seconds before a cached annotation expires
    #[serde(default = "default_ttl_seconds")]
    pub ttl_seconds: u64,

    /// Maximum cached annotations before least-recently-used eviction
    #[serde(default = "default_max_entries")]
    pub max_entries: usize,
}

fn default_ttl_seconds() -> u64 {
    3600
}

fn default_max_entries() -> usize {
    256
}

impl Default for EnrichmentConfig {
    fn default() -> Self {
        Self {
            ttl_seconds: default_ttl_seconds(),
            max_entries: default_max_entries(),
        }
    }
}

impl Default for TraceContractConfig {
    fn default() -> Self {
        Self {
            dev_mode: false,
            strict_substance: false,
            version_mismatch_is_error: false,
            enrichment: EnrichmentConfig::default(),
        }
    }
}

impl TraceContractConfig {
    /// Environment variable for config path override
    pub const ENV_CONFIG_PATH: &'static str = "TRACE_CONTRACT_CONFIG";

    /// Default config filename
    pub const DEFAULT_CONFIG_FILENAME: &'static str = "trace_contract.toml";

    /// Load configuration from file
    ///
    /// Resolution order:
    /// 1. `TRACE_CONTRACT_CONFIG` environment variable
    /// 2. `~/.config/codex/trace_contract.toml`
    ///
    /// If the config file doesn't exist, returns default configuration.
    pub fn load() -> Result<Self> {
        let path = Self::resolve_config_path();

        if !path.exists() {
            tracing::info!(
                path = %path.display(),
                "Trace contract config not found, using defaults"
            );
            return Ok(Self::default());
        }

        Self::load_from_path(&path)
    }

    /// Load configuration from a specific path
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            TraceContractError::config_with_source(
                format!("failed to read config at {}", path.display()),
                e,
            )
        })?;

        Self::parse(&contents)
    }

    /// Parse configuration from TOML string
    pub fn parse(contents: &str) -> Result<Self> {
        let cfg: TraceContractConfig = toml::from_str(contents)
            .map_err(|e| TraceContractError::config_with_source("failed to parse config", e))?;

        cfg.validate()?;
        Ok(cfg)
    }

    /// Options for a validation pass
    pub fn validate_options(&self) -> ValidateOptions {
        ValidateOptions {
            dev_mode: self.dev_mode,
            version_mismatch_is_error: self.version_mismatch_is_error,
        }
    }

    fn resolve_config_path() -> PathBuf {
        if let Ok(path) = std::env::var(Self::ENV_CONFIG_PATH) {
            return PathBuf::from(path);
        }

        dirs::home_dir()
            .map(|h| {
                h.join(".config")
                    .join("codex")
                    .join(Self::DEFAULT_CONFIG_FILENAME)
            })
            .unwrap_or_else(|| PathBuf::from(Self::DEFAULT_CONFIG_FILENAME))
    }

    fn validate(&self) -> Result<()> {
        if self.enrichment.max_entries == 0 {
            return Err(TraceContractError::config(
                "enrichment.max_entries must be at least 1",
            ));
        }

        if self.enrichment.ttl_seconds == 0 {
            tracing::warn!("enrichment.ttl_seconds is 0; every annotation lookup will miss");
        }

        Ok(())
    }
}
