//! wgpu render backend for the lumen renderer.
//!
//! [`WgpuBackend`] implements [`lumen_render::RenderBackend`] on a window
//! surface. Draw calls are validated and grouped into render passes as they
//! arrive, then encoded and submitted in one command buffer at present.
//!
//! # Invariants
//! - The G-buffer is never a colour attachment of a pass that samples it.
//! - Lights are drawn straight from the light buffer as instanced quads.

mod backend;
mod frame;
mod pipelines;
mod shaders;
mod targets;

pub use backend::{BackendOptions, WgpuBackend};
