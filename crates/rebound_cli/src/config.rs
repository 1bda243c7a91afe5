//! Spring config resolution for the command line
//!
//! A config comes from one of three places, in priority order: a named
//! preset in a TOML preset file, explicit tension/friction flags, or the
//! shared default config.

use anyhow::{Context, Result};
use rebound_core::{PresetFile, SpringConfig};
use std::fs;
use std::path::Path;

/// Read and parse a preset file
pub fn load_preset_file(path: &Path) -> Result<PresetFile> {
    let source = fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    PresetFile::parse(&source).with_context(|| format!("Failed to parse {}", path.display()))
}

/// Where the simulated spring's config comes from
#[derive(Debug, Default)]
pub struct ConfigSource<'a> {
    pub tension: Option<f64>,
    pub friction: Option<f64>,
    /// Treat tension/friction as raw values instead of origami values
    pub raw: bool,
    pub preset: Option<&'a str>,
    pub presets_file: Option<&'a Path>,
}

impl ConfigSource<'_> {
    pub fn resolve(&self) -> Result<SpringConfig> {
        if let Some(name) = self.preset {
            let Some(path) = self.presets_file else {
                anyhow::bail!("--preset requires --presets <FILE>");
            };
            let file = load_preset_file(path)?;
            let preset = file.presets.get(name).with_context(|| {
                format!(
                    "No preset named '{}' in {}. Available: {:?}",
                    name,
                    path.display(),
                    file.presets.keys().collect::<Vec<_>>()
                )
            })?;
            return Ok(preset.to_config()?);
        }

        match (self.tension, self.friction) {
            (None, None) => Ok(SpringConfig::default_config()),
            (tension, friction) => {
                let tension = tension.context("--friction requires --tension")?;
                let friction = friction.context("--tension requires --friction")?;
                if !tension.is_finite() || !friction.is_finite() || tension < 0.0 || friction < 0.0
                {
                    anyhow::bail!(
                        "Tension and friction must be finite and non-negative (got {}, {})",
                        tension,
                        friction
                    );
                }
                Ok(if self.raw {
                    SpringConfig::new(tension, friction)
                } else {
                    SpringConfig::from_origami_tension_and_friction(tension, friction)
                })
            }
        }
    }
}
