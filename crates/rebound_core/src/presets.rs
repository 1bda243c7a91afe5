//! Named spring presets loaded from TOML
//!
//! ```toml
//! [presets.card]
//! tension = 40.0
//! friction = 7.0
//!
//! [presets.raw-drawer]
//! tension = 230.2
//! friction = 22.0
//! units = "raw"
//!
//! [presets.bouncy-button]
//! bounciness = 10.0
//! speed = 12.0
//! ```

use crate::config::SpringConfig;
use crate::error::{ReboundError, Result};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Units a tension/friction preset is written in
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PresetUnits {
    #[default]
    Origami,
    Raw,
}

/// A single spring preset
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum SpringPreset {
    /// Explicit tension and friction
    Physical {
        tension: f64,
        friction: f64,
        #[serde(default)]
        units: PresetUnits,
    },
    /// Origami "Bouncy" speed and bounciness
    Bouncy { bounciness: f64, speed: f64 },
}

impl SpringPreset {
    /// Build a fresh config for this preset
    pub fn to_config(&self) -> Result<SpringConfig> {
        match *self {
            SpringPreset::Physical {
                tension,
                friction,
                units,
            } => {
                check_coefficient("tension", tension)?;
                check_coefficient("friction", friction)?;
                Ok(match units {
                    PresetUnits::Origami => {
                        SpringConfig::from_origami_tension_and_friction(tension, friction)
                    }
                    PresetUnits::Raw => SpringConfig::new(tension, friction),
                })
            }
            SpringPreset::Bouncy { bounciness, speed } => {
                check_coefficient("bounciness", bounciness)?;
                check_coefficient("speed", speed)?;
                Ok(SpringConfig::from_bounciness_and_speed(bounciness, speed))
            }
        }
    }
}

fn check_coefficient(name: &str, value: f64) -> Result<()> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(ReboundError::InvalidArgument(format!(
            "{} must be finite and non-negative, got {}",
            name, value
        )))
    }
}

/// A preset file: an ordered table of named presets
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
pub struct PresetFile {
    #[serde(default)]
    pub presets: IndexMap<String, SpringPreset>,
}

impl PresetFile {
    /// Parse a preset file from TOML source
    pub fn parse(source: &str) -> Result<Self> {
        Ok(toml::from_str(source)?)
    }

    /// Serialize back to TOML
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| ReboundError::Preset(e.to_string()))
    }

    /// Build a config for every preset, in file order
    pub fn configs(&self) -> Result<Vec<(String, SpringConfig)>> {
        self.presets
            .iter()
            .map(|(name, preset)| Ok((name.clone(), preset.to_config()?)))
            .collect()
    }
}
