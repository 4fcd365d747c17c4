//! Procedural scene geometry.
//!
//! Faces wind so that `(b - a) x (c - a)` points along the outward normal,
//! which is clockwise on screen under a left-handed projection.

use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec3};

use crate::data::{Material, MeshData, MeshError, SubMeshData};
use crate::layout::VertexLayout;

/// Vertex matching [`VertexLayout::lit`].
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct LitVertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
    pub uv: [f32; 2],
}

/// Normal and two in-plane axes with `u x v == normal`.
const FACES: [(Vec3, Vec3, Vec3); 6] = [
    (Vec3::X, Vec3::Y, Vec3::Z),
    (Vec3::NEG_X, Vec3::Z, Vec3::Y),
    (Vec3::Y, Vec3::Z, Vec3::X),
    (Vec3::NEG_Y, Vec3::X, Vec3::Z),
    (Vec3::Z, Vec3::X, Vec3::Y),
    (Vec3::NEG_Z, Vec3::Y, Vec3::X),
];

/// Accumulates lit vertices for one sub-mesh.
#[derive(Debug, Default)]
pub struct SubMeshBuilder {
    vertices: Vec<LitVertex>,
    indices: Vec<u16>,
}

impl SubMeshBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an axis-aligned box. `inward` flips normals and winding so the
    /// faces are visible from inside.
    pub fn add_box(&mut self, center: Vec3, half_extents: Vec3, inward: bool) -> &mut Self {
        for (n, u, v) in FACES {
            let corner = |su: f32, sv: f32| center + half_extents * (n + u * su + v * sv);
            let corners = [
                (corner(-1.0, -1.0), [0.0, 1.0]),
                (corner(1.0, -1.0), [1.0, 1.0]),
                (corner(1.0, 1.0), [1.0, 0.0]),
                (corner(-1.0, 1.0), [0.0, 0.0]),
            ];
            let normal = if inward { -n } else { n };
            let base = self.vertices.len() as u16;
            for (position, uv) in corners {
                self.vertices.push(LitVertex {
                    position: position.to_array(),
                    normal: normal.to_array(),
                    uv,
                });
            }
            let quad: [u16; 6] = if inward {
                [0, 2, 1, 0, 3, 2]
            } else {
                [0, 1, 2, 0, 2, 3]
            };
            self.indices.extend(quad.iter().map(|i| base + i));
        }
        self
    }

    pub fn build(self, material: Material) -> Result<SubMeshData, MeshError> {
        if self.vertices.len() > usize::from(u16::MAX) + 1 {
            return Err(MeshError::TooManyVertices(self.vertices.len()));
        }
        SubMeshData::new(
            VertexLayout::lit(),
            bytemuck::cast_slice(&self.vertices).to_vec(),
            self.indices,
            material,
        )
    }
}

/// Axis-aligned cube centred on the origin.
pub fn cube(half_size: f32, material: Material) -> Result<MeshData, MeshError> {
    let mut builder = SubMeshBuilder::new();
    builder.add_box(Vec3::ZERO, Vec3::splat(half_size), false);
    MeshData::new(vec![builder.build(material)?])
}

/// Floor slab with a grid of pillars: the scene the lights orbit over.
pub fn level() -> Result<MeshData, MeshError> {
    let mut floor = SubMeshBuilder::new();
    floor.add_box(Vec3::new(0.0, -2.0, 0.0), Vec3::new(640.0, 2.0, 640.0), false);

    let mut pillars = SubMeshBuilder::new();
    for ix in -2..=2 {
        for iz in -2..=2 {
            let center = Vec3::new(ix as f32 * 240.0, 45.0, iz as f32 * 240.0);
            pillars.add_box(center, Vec3::new(14.0, 45.0, 14.0), false);
        }
    }

    MeshData::new(vec![
        floor.build(Material {
            diffuse: Vec3::new(0.55, 0.55, 0.5),
            specular: 0.3,
        })?,
        pillars.build(Material {
            diffuse: Vec3::new(0.7, 0.55, 0.4),
            specular: 0.6,
        })?,
    ])
}

/// Inward-facing unit box scaled out to enclose the scene.
pub fn skybox(scale: f32) -> Result<MeshData, MeshError> {
    let mut builder = SubMeshBuilder::new();
    builder.add_box(Vec3::ZERO, Vec3::ONE, true);
    let sub = builder
        .build(Material {
            diffuse: Vec3::new(0.08, 0.08, 0.16),
            specular: 0.0,
        })?
        .with_transform(Mat4::from_scale(Vec3::splat(scale)));
    MeshData::new(vec![sub])
}
