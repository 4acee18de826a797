//! Nebula configuration.
//!
//! Window, engine choice and engine tuning. Loaded from
//! `<config dir>/nebula/nebula.toml`; a missing or unreadable file means
//! defaults.

use nebula_kernel::{EngineVariant, FieldSettings, Particle2DSettings};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::controller::ControllerSettings;

/// Configuration file name.
const CONFIG_FILE: &str = "nebula.toml";

/// Nebula configuration parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NebulaConfig {
    // === Window Settings ===
    /// Window width in pixels
    pub window_width: u32,
    /// Window height in pixels
    pub window_height: u32,
    /// Enable VSync
    pub vsync: bool,

    // === Background Settings ===
    /// Engine mounted at startup
    pub initial_engine: EngineVariant,
    /// Show the control overlay at startup (Alt+B toggles it)
    pub show_overlay: bool,
    /// Mount the 2D engine when the GPU field has no context
    pub fallback_to_2d: bool,
    /// RNG seed (None = random)
    pub seed: Option<u64>,

    // === Engine Tuning ===
    /// 2D particle engine
    pub particles: Particle2DSettings,
    /// GPU particle field
    pub field: FieldSettings,
}

impl Default for NebulaConfig {
    fn default() -> Self {
        Self {
            window_width: 1280,
            window_height: 720,
            vsync: true,

            initial_engine: EngineVariant::Particles2D,
            show_overlay: false,
            fallback_to_2d: true,
            seed: None,

            particles: Particle2DSettings::default(),
            field: FieldSettings::default(),
        }
    }
}

impl NebulaConfig {
    /// Load configuration from the default file location.
    /// Returns default config if file doesn't exist.
    pub fn load() -> Self {
        Self::load_from(Self::config_path())
    }

    /// Load configuration from a specific path.
    /// Returns default config if file doesn't exist or is invalid.
    pub fn load_from<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref();

        if !path.exists() {
            info!("Config file not found, using defaults");
            return Self::default();
        }

        match fs::File::open(path) {
            Ok(mut file) => {
                let mut contents = String::new();
                if let Err(e) = file.read_to_string(&mut contents) {
                    warn!("Failed to read config file: {e}");
                    return Self::default();
                }

                match toml::from_str(&contents) {
                    Ok(config) => {
                        info!("Loaded config from {}", path.display());
                        config
                    },
                    Err(e) => {
                        warn!("Failed to parse config file: {e}");
                        Self::default()
                    },
                }
            },
            Err(e) => {
                warn!("Failed to open config file: {e}");
                Self::default()
            },
        }
    }

    /// Save configuration to the default file location.
    pub fn save(&self) -> io::Result<()> {
        self.save_to(Self::config_path())
    }

    /// Save configuration to a specific path.
    pub fn save_to<P: AsRef<Path>>(&self, path: P) -> io::Result<()> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let contents = toml::to_string_pretty(self)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;

        let mut file = fs::File::create(path)?;
        file.write_all(contents.as_bytes())?;

        info!("Saved config to {}", path.display());
        Ok(())
    }

    /// Get the default configuration file path.
    fn config_path() -> PathBuf {
        dirs::config_dir()
            .map_or_else(|| PathBuf::from(CONFIG_FILE), |dir| dir.join("nebula").join(CONFIG_FILE))
    }

    /// Validate and clamp configuration values to sensible ranges.
    pub fn validate(&mut self) {
        // Window size
        self.window_width = self.window_width.clamp(320, 7680);
        self.window_height = self.window_height.clamp(240, 4320);

        // 2D engine
        self.particles.area_per_particle = self.particles.area_per_particle.clamp(1000, 1_000_000);
        self.particles.max_particles = self.particles.max_particles.min(2000);

        // GPU field
        self.field.point_count = self.field.point_count.clamp(1, 200_000);
        self.field.cloud_radius = self.field.cloud_radius.clamp(10.0, 5000.0);
        self.field.pixel_ratio = self.field.pixel_ratio.clamp(0.5, 4.0);
    }

    /// Settings for the background controller.
    #[must_use]
    pub fn controller_settings(&self) -> ControllerSettings {
        ControllerSettings {
            initial: self.initial_engine,
            overlay_visible: self.show_overlay,
            fallback_to_2d: self.fallback_to_2d,
            seed: self.seed,
            particles: self.particles,
            field: self.field,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = NebulaConfig::default();
        assert_eq!(config.window_width, 1280);
        assert_eq!(config.initial_engine, EngineVariant::Particles2D);
        assert!(config.fallback_to_2d);
        assert!(!config.show_overlay);
        assert_eq!(config.particles.area_per_particle, 9000);
        assert_eq!(config.particles.max_particles, 150);
        assert_eq!(config.field.point_count, 10_000);
    }

    #[test]
    fn test_config_validation() {
        let mut config = NebulaConfig::default();

        config.window_width = 10;
        config.particles.area_per_particle = 0;
        config.field.point_count = 0;
        config.field.pixel_ratio = 9.0;

        config.validate();

        assert_eq!(config.window_width, 320);
        assert_eq!(config.particles.area_per_particle, 1000);
        assert_eq!(config.field.point_count, 1);
        assert!((config.field.pixel_ratio - 4.0).abs() < f32::EPSILON);
    }

    #[test]
    fn test_config_save_load() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let config_path = temp_dir.path().join("nested").join("nebula.toml");

        let mut config = NebulaConfig::default();
        config.initial_engine = EngineVariant::GpuField;
        config.seed = Some(7);
        config.particles.max_particles = 40;

        config.save_to(&config_path).expect("Failed to save config");

        let loaded = NebulaConfig::load_from(&config_path);
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_config_path_in_platform_config_dir() {
        let path = NebulaConfig::config_path();
        assert!(path.ends_with(CONFIG_FILE));
        if let Some(dir) = dirs::config_dir() {
            assert_eq!(path, dir.join("nebula").join(CONFIG_FILE));
        }
    }

    #[test]
    fn test_config_load_missing_file() {
        let config = NebulaConfig::load_from("/nonexistent/path/nebula.toml");
        assert_eq!(config, NebulaConfig::default());
    }

    #[test]
    fn test_config_load_invalid_file() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let config_path = temp_dir.path().join("nebula.toml");
        fs::write(&config_path, "initial_engine = 3\n[[").expect("write");

        assert_eq!(NebulaConfig::load_from(&config_path), NebulaConfig::default());
    }

    #[test]
    fn test_partial_file_keeps_other_defaults() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let config_path = temp_dir.path().join("nebula.toml");
        fs::write(
            &config_path,
            "initial_engine = \"gpu_field\"\n\n[particles]\nmax_particles = 60\n",
        )
        .expect("write");

        let loaded = NebulaConfig::load_from(&config_path);
        assert_eq!(loaded.initial_engine, EngineVariant::GpuField);
        assert_eq!(loaded.particles.max_particles, 60);
        assert_eq!(loaded.particles.area_per_particle, 9000);
        assert_eq!(loaded.window_height, 720);
    }

    #[test]
    fn test_controller_settings_mirror_config() {
        let mut config = NebulaConfig::default();
        config.show_overlay = true;
        config.fallback_to_2d = false;
        let settings = config.controller_settings();
        assert!(settings.overlay_visible);
        assert!(!settings.fallback_to_2d);
        assert_eq!(settings.particles, config.particles);
    }
}
