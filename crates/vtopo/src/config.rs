//! vtopo.toml configuration parser.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::backoff::RetryPolicy;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TopoConfig {
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub actions: ActionsConfig,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoreConfig {
    /// redb file backing the node store. In-memory when absent.
    pub path: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionsConfig {
    #[serde(default = "default_retry_floor")]
    pub retry_floor: String,
    #[serde(default = "default_retry_jitter")]
    pub retry_jitter: String,
    #[serde(default = "default_wait_timeout")]
    pub wait_timeout: String,
}

fn default_retry_floor() -> String {
    "5s".to_string()
}

fn default_retry_jitter() -> String {
    "55s".to_string()
}

fn default_wait_timeout() -> String {
    "30s".to_string()
}

impl Default for ActionsConfig {
    fn default() -> Self {
        Self {
            retry_floor: default_retry_floor(),
            retry_jitter: default_retry_jitter(),
            wait_timeout: default_wait_timeout(),
        }
    }
}

impl TopoConfig {
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> anyhow::Result<Self> {
        let config: TopoConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml_string(&self) -> anyhow::Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Check that every duration field parses.
    pub fn validate(&self) -> anyhow::Result<()> {
        self.retry_policy()?;
        self.wait_timeout()?;
        Ok(())
    }

    pub fn retry_policy(&self) -> anyhow::Result<RetryPolicy> {
        Ok(RetryPolicy::new(
            parse_duration(&self.actions.retry_floor).context("actions.retry_floor")?,
            parse_duration(&self.actions.retry_jitter).context("actions.retry_jitter")?,
        ))
    }

    pub fn wait_timeout(&self) -> anyhow::Result<Duration> {
        parse_duration(&self.actions.wait_timeout).context("actions.wait_timeout")
    }
}

/// Parse `250ms`, `5s`, `2m`, or a bare number of seconds.
pub fn parse_duration(s: &str) -> anyhow::Result<Duration> {
    let s = s.trim();
    let (digits, unit_ms) = if let Some(ms) = s.strip_suffix("ms") {
        (ms, 1)
    } else if let Some(secs) = s.strip_suffix('s') {
        (secs, 1_000)
    } else if let Some(mins) = s.strip_suffix('m') {
        (mins, 60_000)
    } else {
        (s, 1_000)
    };
    let value: u64 = digits
        .trim()
        .parse()
        .with_context(|| format!("invalid duration {s:?}"))?;
    Ok(Duration::from_millis(value.saturating_mul(unit_ms)))
}
