//! Render sequencing for the lumen renderer.
//!
//! [`RenderSequencer`] drives a [`RenderBackend`] through one frame in a
//! fixed order, choosing forward or deferred lighting for the opaque scene.
//! [`SoftwareBackend`] implements the backend on the CPU for tests and
//! headless rendering.
//!
//! # Invariants
//! - The G-buffer is fully written by the geometry pass before any pass reads it.
//! - Ambient resolve precedes light accumulation; light flares are drawn last.
//! - The G-buffer is never bound as a target and an input at the same time.
//! - The renderer never mutates the camera or the light population.

mod backend;
mod error;
mod mesh;
mod scene;
mod sequencer;
pub mod shading;
mod software;

pub use backend::{
    FrameUniforms, GBuffer, GBufferId, GBufferSlot, GeometryId, RenderBackend, RenderTargets,
    Technique,
};
pub use error::RenderError;
pub use mesh::{RenderableMesh, SceneMesh};
pub use scene::DemoScene;
pub use sequencer::{FrameInput, FrameReport, RenderSequencer};
pub use software::{Command, SoftwareBackend, TargetKind};
