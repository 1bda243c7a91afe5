//! Spring config registry
//!
//! A named collection of [`SpringConfig`]s for inspection and live-tuning
//! tools. The registry does not take part in integration; removing a config
//! leaves every spring that uses it untouched.
//!
//! Applications typically create one registry at startup and pass it to
//! whatever needs to publish or tune configs.

use crate::config::SpringConfig;
use crate::error::{ReboundError, Result};
use crate::presets::PresetFile;
use indexmap::IndexMap;

/// Name the default config is registered under
pub const DEFAULT_CONFIG_NAME: &str = "default config";

/// Registry of named spring configs, keyed by config identity
#[derive(Debug, Default)]
pub struct SpringConfigRegistry {
    configs: IndexMap<SpringConfig, String>,
}

impl SpringConfigRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry that already contains the default config
    pub fn with_default_entry() -> Self {
        let mut registry = Self::new();
        registry
            .configs
            .insert(SpringConfig::default_config(), DEFAULT_CONFIG_NAME.to_string());
        registry
    }

    /// Add a config under a name
    ///
    /// Returns `Ok(false)` if this config (by identity) is already present.
    pub fn add(&mut self, config: &SpringConfig, name: impl Into<String>) -> Result<bool> {
        let name = name.into();
        check_name(&name)?;
        if self.configs.contains_key(config) {
            return Ok(false);
        }
        tracing::trace!("registering spring config {:?} as {}", config, name);
        self.configs.insert(config.clone(), name);
        Ok(true)
    }

    /// Remove a config, returning whether it was present
    pub fn remove(&mut self, config: &SpringConfig) -> bool {
        self.configs.shift_remove(config).is_some()
    }

    /// Snapshot of every registered config and its name, in insertion order
    pub fn all(&self) -> IndexMap<SpringConfig, String> {
        self.configs.clone()
    }

    /// Name a config was registered under
    pub fn name_of(&self, config: &SpringConfig) -> Option<&str> {
        self.configs.get(config).map(String::as_str)
    }

    /// Look up the first config registered under a name
    pub fn find(&self, name: &str) -> Option<SpringConfig> {
        self.configs
            .iter()
            .find(|(_, n)| n.as_str() == name)
            .map(|(config, _)| config.clone())
    }

    pub fn len(&self) -> usize {
        self.configs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.configs.is_empty()
    }

    /// Remove every config
    pub fn clear(&mut self) {
        self.configs.clear();
    }

    /// Parse a TOML preset file and register every preset under its name
    ///
    /// Nothing is registered unless the whole file parses and converts.
    /// Returns the new configs in file order.
    pub fn load_presets(&mut self, source: &str) -> Result<Vec<(String, SpringConfig)>> {
        let configs = PresetFile::parse(source)?.configs()?;
        for (name, _) in &configs {
            check_name(name)?;
        }
        for (name, config) in &configs {
            self.add(config, name.as_str())?;
        }
        tracing::debug!("loaded {} spring presets", configs.len());
        Ok(configs)
    }
}

fn check_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(ReboundError::InvalidArgument(
            "config name is required".to_string(),
        ));
    }
    Ok(())
}
