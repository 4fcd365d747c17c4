//! YAML configuration with defaults for every field.
//!
//! Every struct is `#[serde(default)]`, so a file only needs to name the
//! values it overrides. An empty document yields [`LumenConfig::default`].

use std::path::Path;

use glam::{Vec3, Vec4};
use serde::{Deserialize, Serialize};

use crate::types::RenderMode;

/// Errors from loading or validating a configuration file.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("YAML error: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("invalid value for {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

/// Top-level renderer configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LumenConfig {
    pub window: WindowConfig,
    pub camera: CameraConfig,
    pub stereo: StereoConfig,
    pub lights: LightConfig,
    pub render: RenderConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WindowConfig {
    pub width: u32,
    pub height: u32,
    pub title: String,
    /// Present with vsync (Fifo) instead of the lowest-latency mode available.
    pub vsync: bool,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 960,
            title: "Deferred Rendering".into(),
            vsync: true,
        }
    }
}

/// Starting camera state. Rotation is given in degrees for readability and
/// converted to radians by the camera crate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    pub position: Vec3,
    pub rotation_degrees: Vec3,
    /// Vertical field of view in radians, `0 < fov < π`.
    pub fov: f32,
    pub near_clip: f32,
    pub far_clip: f32,
    /// World units per second.
    pub move_speed: f32,
    /// Radians per second.
    pub rotation_speed: f32,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            position: Vec3::new(-320.0, 70.0, 100.0),
            rotation_degrees: Vec3::new(8.0, 115.0, 0.0),
            fov: std::f32::consts::FRAC_PI_4,
            near_clip: 1.0,
            far_clip: 50_000.0,
            move_speed: 120.0,
            rotation_speed: 1.3,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StereoConfig {
    pub interocular: f32,
    pub screen_distance: f32,
}

impl Default for StereoConfig {
    fn default() -> Self {
        Self {
            interocular: 0.65,
            screen_distance: 20.0,
        }
    }
}

/// Inclusive-exclusive float range used for randomised light attributes.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Range {
    pub min: f32,
    pub max: f32,
}

impl Range {
    pub const fn new(min: f32, max: f32) -> Self {
        Self { min, max }
    }

    fn check(&self, field: &'static str) -> Result<(), ConfigError> {
        if self.min > self.max {
            return Err(ConfigError::Invalid {
                field,
                reason: format!("min {} is greater than max {}", self.min, self.max),
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SeedLightConfig {
    pub position: Vec3,
    pub radius: f32,
    pub color: Vec4,
}

impl Default for SeedLightConfig {
    fn default() -> Self {
        Self {
            position: Vec3::new(-18_000.0, 4_000.0, 6_000.0),
            radius: 25_000.0,
            color: Vec4::new(0.4, 0.4, 0.7, 0.0),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LightConfig {
    /// Hard upper bound on live lights.
    pub capacity: usize,
    /// New lights per second until capacity is reached.
    pub spawn_frequency: f32,
    pub seed_light: SeedLightConfig,
    pub spawn_x: Range,
    pub spawn_y: Range,
    pub spawn_z: Range,
    pub spawn_radius: Range,
    pub spawn_color: Range,
    /// RNG seed so light populations replay identically.
    pub rng_seed: u64,
}

impl Default for LightConfig {
    fn default() -> Self {
        Self {
            capacity: 25_600,
            spawn_frequency: 5_000.0,
            seed_light: SeedLightConfig::default(),
            spawn_x: Range::new(-600.0, 600.0),
            spawn_y: Range::new(5.0, 40.0),
            spawn_z: Range::new(-600.0, 600.0),
            spawn_radius: Range::new(20.0, 40.0),
            spawn_color: Range::new(0.4, 1.0),
            rng_seed: 0x5EED,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    pub ambient_color: Vec3,
    pub start_mode: RenderMode,
    /// Seconds over which frame times are averaged for the statistics line.
    pub stats_period: f32,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            ambient_color: Vec3::new(0.1, 0.1, 0.15),
            start_mode: RenderMode::Deferred,
            stats_period: 1.0,
        }
    }
}

impl LumenConfig {
    /// Load and validate a YAML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path.as_ref())?;
        let config = Self::from_yaml_str(&text)?;
        tracing::debug!(path = %path.as_ref().display(), "configuration loaded");
        Ok(config)
    }

    /// Load from a path when given, otherwise fall back to defaults.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(p) => Self::load(p),
            None => Ok(Self::default()),
        }
    }

    pub fn from_yaml_str(text: &str) -> Result<Self, ConfigError> {
        // serde_yaml rejects an empty document, treat it as "all defaults".
        let config: Self = if text.trim().is_empty() {
            Self::default()
        } else {
            serde_yaml::from_str(text)?
        };
        config.validate()?;
        Ok(config)
    }

    pub fn to_yaml_string(&self) -> Result<String, ConfigError> {
        Ok(serde_yaml::to_string(self)?)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        std::fs::write(path, self.to_yaml_string()?)?;
        Ok(())
    }

    /// Reject values the camera and light code treat as preconditions.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let cam = &self.camera;
        if !(cam.fov > 0.0 && cam.fov < std::f32::consts::PI) {
            return Err(ConfigError::Invalid {
                field: "camera.fov",
                reason: format!("{} is outside (0, pi)", cam.fov),
            });
        }
        if cam.near_clip <= 0.0 {
            return Err(ConfigError::Invalid {
                field: "camera.near_clip",
                reason: "must be positive".into(),
            });
        }
        if cam.far_clip <= cam.near_clip {
            return Err(ConfigError::Invalid {
                field: "camera.far_clip",
                reason: "must be greater than near_clip".into(),
            });
        }
        if self.window.width == 0 || self.window.height == 0 {
            return Err(ConfigError::Invalid {
                field: "window",
                reason: "extent must be non-zero".into(),
            });
        }

        let lights = &self.lights;
        if lights.capacity == 0 {
            return Err(ConfigError::Invalid {
                field: "lights.capacity",
                reason: "must hold at least the seed light".into(),
            });
        }
        if lights.spawn_frequency <= 0.0 {
            return Err(ConfigError::Invalid {
                field: "lights.spawn_frequency",
                reason: "must be positive".into(),
            });
        }
        lights.spawn_x.check("lights.spawn_x")?;
        lights.spawn_y.check("lights.spawn_y")?;
        lights.spawn_z.check("lights.spawn_z")?;
        lights.spawn_radius.check("lights.spawn_radius")?;
        lights.spawn_color.check("lights.spawn_color")?;

        if self.render.stats_period <= 0.0 {
            return Err(ConfigError::Invalid {
                field: "render.stats_period",
                reason: "must be positive".into(),
            });
        }
        Ok(())
    }
}
