//! Configuration module for the displacement renderer

use serde::Deserialize;
use config::{Config, ConfigError, Environment, File};
use std::path::PathBuf;

use crate::domain::DEFAULT_STRENGTH;
use crate::pattern::{BrokenMap, Direction};

/// Main application settings
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub engine: EngineSettings,
    #[serde(default)]
    pub loader: LoaderSettings,
    #[serde(default)]
    pub render: RenderSettings,
    #[serde(default)]
    pub pattern: PatternSettings,
    #[serde(default)]
    pub job: JobSettings,
    #[serde(default)]
    pub log: LogSettings,
}

/// Output surface configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EngineSettings {
    pub width: u32,
    pub height: u32,
    pub strength: f64,
}

/// Asset loader configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoaderSettings {
    pub timeout_secs: u64,
    pub user_agent: String,
}

/// Render loop configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RenderSettings {
    /// Split the sampling pass across the rayon pool
    pub parallel: bool,
}

/// Procedural map generation, used when the job has no map reference
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PatternSettings {
    pub noise_density: f64,
    pub direction: Direction,
    pub block_size: u32,
    pub seed: u64,
}

/// Single render job for the `displace` binary
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct JobSettings {
    /// Base image reference (path, URL or data URL)
    pub base: Option<String>,
    /// Displacement map reference; a generated map is used when absent
    pub map: Option<String>,
    pub output: Option<PathBuf>,
    pub preview: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct LogSettings {
    pub json: bool,
}

impl Settings {
    /// Load configuration from files and environment variables
    ///
    /// Configuration priority (highest to lowest):
    /// 1. Environment variables (prefixed with DISPLACE_)
    /// 2. config/local.toml (gitignored)
    /// 3. config/default.toml
    pub fn load() -> Result<Self, ConfigError> {
        let config_dir = std::env::var("CONFIG_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("config"));

        let builder = Config::builder()
            .add_source(File::from(config_dir.join("default.toml")).required(false))
            .add_source(File::from(config_dir.join("local.toml")).required(false))
            // DISPLACE_ENGINE__WIDTH, DISPLACE_JOB__BASE, etc.
            .add_source(
                Environment::with_prefix("DISPLACE")
                    .separator("__")
                    .try_parsing(true),
            );

        builder.build()?.try_deserialize()
    }
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            engine: EngineSettings::default(),
            loader: LoaderSettings::default(),
            render: RenderSettings::default(),
            pattern: PatternSettings::default(),
            job: JobSettings::default(),
            log: LogSettings::default(),
        }
    }
}

impl Default for EngineSettings {
    fn default() -> Self {
        EngineSettings {
            width: 800,
            height: 600,
            strength: DEFAULT_STRENGTH,
        }
    }
}

impl Default for LoaderSettings {
    fn default() -> Self {
        LoaderSettings {
            timeout_secs: 30,
            user_agent: format!("displacement-engine/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl Default for RenderSettings {
    fn default() -> Self {
        RenderSettings { parallel: true }
    }
}

impl Default for PatternSettings {
    fn default() -> Self {
        PatternSettings {
            noise_density: 0.5,
            direction: Direction::Both,
            block_size: 4,
            seed: 0,
        }
    }
}

impl PatternSettings {
    pub fn to_broken_map(&self) -> BrokenMap {
        BrokenMap::new(self.noise_density, self.direction, self.block_size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_sources_fill_defaults() {
        let settings: Settings = Config::builder()
            .set_override("engine.width", 64)
            .unwrap()
            .set_override("engine.height", 32)
            .unwrap()
            .set_override("pattern.noise_density", 0.25)
            .unwrap()
            .set_override("pattern.direction", "vertical")
            .unwrap()
            .set_override("pattern.block_size", 2)
            .unwrap()
            .set_override("pattern.seed", 9)
            .unwrap()
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();

        assert_eq!(settings.engine.width, 64);
        assert_eq!(settings.engine.strength, DEFAULT_STRENGTH);
        assert_eq!(settings.loader.timeout_secs, 30);
        assert!(settings.render.parallel);
        assert_eq!(settings.pattern.direction, Direction::Vertical);
        assert!(settings.job.base.is_none());
        assert!(!settings.log.json);
    }
}
