//! Camera: world/view/projection synthesis, stereoscopic offsets, and
//! first-person keyboard navigation.
//!
//! # Invariants
//! - The view matrix is always the exact inverse of the world matrix.
//! - Matrices change only in [`Camera::update_matrices`]; navigation
//!   mutates position/rotation and must run before the update each frame.
//! - Monoscopic queries return cached matrices without recomputation.
//!
//! # Conventions
//! Left-handed, +Z forward, clip depth 0..1. Matrices are glam
//! column-vector matrices, so the camera's local right, up and forward
//! axes are the `x_axis`, `y_axis` and `z_axis` columns of the world
//! matrix and its position is `w_axis`.

mod camera;

pub use camera::{Camera, CameraBindings, CameraMatrices, CameraSpeeds};
