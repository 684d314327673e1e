//! Configuration for the composer, the remote store client and the dev node.
//!
//! Settings are layered, lowest priority first:
//! 1. compiled defaults ([`OutreachConfig::default`]),
//! 2. an optional TOML file (partial files are fine; missing keys keep defaults),
//! 3. `OUTREACH_*` environment variables.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{OutreachError, Result};

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutreachConfig {
    pub store: StoreConfig,
    pub composer: ComposerConfig,
    pub lifecycle: LifecycleConfig,
    pub node: NodeConfig,
}

/// Where and how to reach the remote draft store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Base URL of the outreach backend.
    pub base_url: String,

    /// Bearer token sent with every request, if any.
    pub api_token: Option<String>,

    /// Per-request timeout in milliseconds.
    pub timeout_ms: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8000".to_string(),
            api_token: None,
            timeout_ms: 30_000,
        }
    }
}

/// Templates wrapped around generated opening lines.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ComposerConfig {
    pub pitch: String,
    pub valediction: String,
    pub signature: String,
    pub subject_template: String,
}

impl Default for ComposerConfig {
    fn default() -> Self {
        Self {
            pitch: "I'd love to connect and share some ideas.".to_string(),
            valediction: "Best,".to_string(),
            signature: "Sanjay".to_string(),
            subject_template: "Quick question regarding {company}".to_string(),
        }
    }
}

/// Lifecycle manager behaviour.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LifecycleConfig {
    /// Re-fetch the canonical history after a successful send.
    pub refresh_history_after_send: bool,

    /// Capacity of the change-event broadcast channel.
    pub event_capacity: usize,
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            refresh_history_after_send: true,
            event_capacity: 256,
        }
    }
}

/// Local development node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    /// Socket address to listen on.
    pub bind: String,

    /// Whether the stub store pretends outbound mail is configured.
    pub outbound_configured: bool,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:8000".to_string(),
            outbound_configured: true,
        }
    }
}

impl OutreachConfig {
    /// Load defaults, then `path` if given and present, then the environment.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(p) if p.exists() => Self::from_file(p)?,
            Some(p) => {
                tracing::debug!(path = %p.display(), "config file not found, using defaults");
                Self::default()
            }
            None => Self::default(),
        };
        config.apply_env_from(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Parse a TOML config file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            OutreachError::Config(format!("failed to read {}: {}", path.display(), e))
        })?;
        Self::from_toml(&raw)
    }

    pub fn from_toml(raw: &str) -> Result<Self> {
        Ok(toml::from_str(raw)?)
    }

    /// Apply `OUTREACH_*` overrides using `lookup` to read variables.
    pub fn apply_env_from<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup("OUTREACH_STORE_URL") {
            self.store.base_url = url;
        }
        if let Some(token) = lookup("OUTREACH_API_TOKEN") {
            self.store.api_token = Some(token).filter(|t| !t.is_empty());
        }
        if let Some(raw) = lookup("OUTREACH_TIMEOUT_MS") {
            self.store.timeout_ms = parse_env("OUTREACH_TIMEOUT_MS", &raw)?;
        }
        if let Some(signature) = lookup("OUTREACH_SIGNATURE") {
            self.composer.signature = signature;
        }
        if let Some(subject) = lookup("OUTREACH_SUBJECT_TEMPLATE") {
            self.composer.subject_template = subject;
        }
        if let Some(raw) = lookup("OUTREACH_REFRESH_AFTER_SEND") {
            self.lifecycle.refresh_history_after_send =
                parse_env("OUTREACH_REFRESH_AFTER_SEND", &raw)?;
        }
        if let Some(bind) = lookup("OUTREACH_NODE_BIND") {
            self.node.bind = bind;
        }
        if let Some(raw) = lookup("OUTREACH_OUTBOUND_CONFIGURED") {
            self.node.outbound_configured = parse_env("OUTREACH_OUTBOUND_CONFIGURED", &raw)?;
        }
        Ok(())
    }
}

fn parse_env<T: std::str::FromStr>(key: &str, raw: &str) -> Result<T> {
    raw.trim()
        .parse()
        .map_err(|_| OutreachError::Config(format!("invalid value for {}: {:?}", key, raw)))
}
