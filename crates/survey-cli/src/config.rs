//! `--config` file: capability switches and the default log level.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;
use survey_engine::{Capabilities, Capability};

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CliConfig {
    pub capabilities: CapabilityConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CapabilityConfig {
    pub budgeting: bool,
    pub geo_budgeting: bool,
    pub map: bool,
    pub attachment: bool,
}

impl Default for CapabilityConfig {
    fn default() -> Self {
        Self {
            budgeting: true,
            geo_budgeting: true,
            map: true,
            attachment: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoggingConfig {
    /// `tracing` filter directive used when `RUST_LOG` is unset.
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "warn".into(),
        }
    }
}

impl CliConfig {
    /// Reads the config file, or returns the defaults when no path is given.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let raw = fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        Self::from_toml(&raw).with_context(|| format!("invalid config {}", path.display()))
    }

    pub fn from_toml(raw: &str) -> Result<Self> {
        Ok(toml::from_str(raw)?)
    }

    pub fn capabilities(&self) -> Capabilities {
        let switches = &self.capabilities;
        let mut capabilities = Capabilities::none();
        capabilities.set(Capability::Budgeting, switches.budgeting);
        capabilities.set(Capability::GeoBudgeting, switches.geo_budgeting);
        capabilities.set(Capability::Map, switches.map);
        capabilities.set(Capability::Attachment, switches.attachment);
        capabilities
    }
}
