//! Mesh data for the lumen renderer.
//!
//! Sub-meshes store interleaved vertex bytes described by a [`VertexLayout`]
//! and 16-bit triangle-list indices. Vertex attributes are read through the
//! layout, never by assuming where a field lives.
//!
//! # Invariants
//! - Every layout contains a position field.
//! - Sub-mesh vertex data is a whole number of vertices; every index is in
//!   range; the index count is a multiple of three.

mod data;
mod layout;
pub mod shapes;

pub use data::{Bounds, Material, MeshData, MeshError, SubMeshData};
pub use layout::{VertexField, VertexLayout};
