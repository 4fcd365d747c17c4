use lumen_lights::LightUploadError;
use lumen_mesh::MeshError;

use crate::backend::{GBufferId, GeometryId, Technique};

/// Errors raised while creating render resources or executing a frame.
///
/// None of these are retried: a creation error aborts initialisation and a
/// frame error drops the frame.
#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error("failed to create {what}: {reason}")]
    ResourceCreation { what: &'static str, reason: String },
    #[error("light upload failed: {0}")]
    LightUpload(#[from] LightUploadError),
    #[error("mesh data rejected: {0}")]
    Mesh(#[from] MeshError),
    #[error("G-buffer {0:?} is bound as a render target and a shader input at once")]
    GBufferHazard(GBufferId),
    #[error("{0:?} reads the G-buffer but none is bound as input")]
    GBufferNotBound(Technique),
    #[error("render target mismatch: {0}")]
    TargetMismatch(String),
    #[error("unknown geometry {0:?}")]
    UnknownGeometry(GeometryId),
    #[error("{technique:?} cannot be used for {draw}")]
    UnsupportedTechnique {
        technique: Technique,
        draw: &'static str,
    },
    /// The frame could not be acquired; later frames may succeed.
    #[error("surface error: {0}")]
    Surface(String),
    #[error("out of GPU memory while {0}")]
    OutOfMemory(&'static str),
}
