//! Configuration resolution
//!
//! Two-tier resolution with ENV -> TOML priority; every field has a
//! built-in default so the service runs with no configuration at all.
//! The TOML file is looked up at `PERF_INSIGHT_CONFIG` or
//! `./perf-insight.toml`.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

const DEFAULT_DB_PATH: &str = "data/perf-insight.db";
const DEFAULT_BIND_ADDRESS: &str = "127.0.0.1:8080";
const DEFAULT_API_URL: &str = "https://api.groq.com/openai/v1/chat/completions";
const DEFAULT_MODEL: &str = "llama-3.3-70b-versatile";
const DEFAULT_MAX_RETRIES: u32 = 3;

/// Resolved service configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub database_path: PathBuf,
    pub bind_address: String,
    pub remote_api_url: String,
    /// Empty key is allowed; every remote call then fails and the
    /// rule-based fallback produces the narratives.
    pub remote_api_key: String,
    pub remote_model: String,
    pub remote_max_retries: u32,
}

/// On-disk TOML shape; all fields optional
#[derive(Debug, Default, Deserialize)]
struct TomlConfig {
    database_path: Option<PathBuf>,
    bind_address: Option<String>,
    remote_api_url: Option<String>,
    remote_api_key: Option<String>,
    remote_model: Option<String>,
    remote_max_retries: Option<u32>,
}

impl Config {
    /// Load configuration with ENV -> TOML -> default priority
    pub fn load() -> Result<Self> {
        let toml_path = std::env::var("PERF_INSIGHT_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("perf-insight.toml"));
        let toml = read_toml(&toml_path)?;

        let config = Self {
            database_path: env_var("PERF_INSIGHT_DB")
                .map(PathBuf::from)
                .or(toml.database_path)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_DB_PATH)),
            bind_address: env_var("PERF_INSIGHT_BIND")
                .or(toml.bind_address)
                .unwrap_or_else(|| DEFAULT_BIND_ADDRESS.to_string()),
            remote_api_url: env_var("PERF_INSIGHT_API_URL")
                .or(toml.remote_api_url)
                .unwrap_or_else(|| DEFAULT_API_URL.to_string()),
            remote_api_key: env_var("PERF_INSIGHT_API_KEY")
                .or(toml.remote_api_key)
                .unwrap_or_default(),
            remote_model: env_var("PERF_INSIGHT_MODEL")
                .or(toml.remote_model)
                .unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            remote_max_retries: env_var("PERF_INSIGHT_MAX_RETRIES")
                .and_then(|v| v.parse().ok())
                .or(toml.remote_max_retries)
                .unwrap_or(DEFAULT_MAX_RETRIES),
        };

        if config.remote_api_key.trim().is_empty() {
            warn!(
                "No remote API key configured (PERF_INSIGHT_API_KEY); \
                 narratives will use the rule-based fallback"
            );
        }

        Ok(config)
    }
}

fn env_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn read_toml(path: &Path) -> Result<TomlConfig> {
    if !path.exists() {
        return Ok(TomlConfig::default());
    }
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file {}", path.display()))?;
    let config = toml::from_str(&content)
        .with_context(|| format!("Failed to parse config file {}", path.display()))?;
    info!("Configuration loaded from {}", path.display());
    Ok(config)
}
