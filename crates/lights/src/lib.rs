//! Point-light population for the deferred renderer.
//!
//! A single seed light exists at startup. New lights are appended at a
//! throttled rate until the container is full; every light but the seed
//! orbits the vertical axis; the whole live prefix is re-uploaded each frame.
//!
//! # Invariants
//! - Live count never exceeds capacity and never decreases.
//! - Light index 0 is never moved.
//! - Uploads always write the full live prefix, never a partial diff.

mod light;
mod population;
mod upload;

pub use light::{BoundedLights, ContainerFull, PointLight};
pub use population::{LightPopulation, LightStats, SpawnRanges};
pub use upload::{HostLightBuffer, LightBufferWriter, LightUploadError};
