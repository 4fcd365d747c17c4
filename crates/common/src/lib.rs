//! Shared types for the lumen renderer: render/stereo modes, viewport,
//! configuration and frame statistics.
//!
//! # Invariants
//! - Configuration is validated once at load; downstream code treats the
//!   validated values (e.g. `0 < fov < π`) as preconditions.

pub mod config;
pub mod timing;
pub mod types;

pub use config::{
    CameraConfig, ConfigError, LightConfig, LumenConfig, Range, RenderConfig, SeedLightConfig,
    StereoConfig, WindowConfig,
};
pub use timing::{FrameStats, FrameSummary};
pub use types::{RenderMode, StereoMode, Viewport};
