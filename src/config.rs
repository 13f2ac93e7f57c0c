//! Configuration management for scopemux
//!
//! Handles loading, parsing and validating the YAML configuration file.

use crate::replay::builtin;
use crate::scope::Diagnostics;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Root configuration structure
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MuxConfig {
    /// Verbosity of configuration errors; build default when omitted
    #[serde(default)]
    pub diagnostics: Diagnostics,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Namespace name -> built-in transition function
    #[serde(default = "default_namespaces")]
    pub namespaces: BTreeMap<String, String>,
}

impl Default for MuxConfig {
    fn default() -> Self {
        Self {
            diagnostics: Diagnostics::default(),
            log_level: default_log_level(),
            namespaces: default_namespaces(),
        }
    }
}

impl MuxConfig {
    /// Load configuration from file with validation
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        Self::from_yaml(&contents)
            .with_context(|| format!("Invalid config file: {}", path.display()))
    }

    /// Parse and validate a YAML document
    pub fn from_yaml(contents: &str) -> Result<Self> {
        let config: MuxConfig =
            serde_yaml::from_str(contents).context("Failed to parse YAML config")?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.namespaces.is_empty() {
            anyhow::bail!("At least one namespace must be configured");
        }

        for (namespace, transition) in &self.namespaces {
            if namespace.is_empty() {
                anyhow::bail!("Namespace names cannot be empty");
            }
            if builtin::lookup(transition).is_none() {
                anyhow::bail!(
                    "Namespace '{}' uses unknown transition '{}' (available: {})",
                    namespace,
                    transition,
                    builtin::NAMES.join(", ")
                );
            }
        }

        Ok(())
    }
}

// Default value functions
fn default_log_level() -> String { "info".to_string() }
fn default_namespaces() -> BTreeMap<String, String> {
    builtin::NAMES
        .iter()
        .map(|name| (name.to_string(), name.to_string()))
        .collect()
}
