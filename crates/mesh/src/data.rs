use glam::{Mat4, Vec3};

use crate::layout::{VertexField, VertexLayout};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MeshError {
    #[error("mesh has no sub-meshes")]
    Empty,
    #[error("sub-mesh {0} has no triangles")]
    EmptySubMesh(usize),
    #[error("vertex layout has no {0:?} field")]
    MissingField(VertexField),
    #[error("{0:?} is not a three-component float field")]
    NotVector(VertexField),
    #[error("index {index} out of range for {vertex_count} vertices")]
    IndexOutOfRange { index: usize, vertex_count: usize },
    #[error("{len} vertex bytes is not a multiple of the {stride}-byte stride")]
    Stride { len: usize, stride: usize },
    #[error("{0} indices do not form whole triangles")]
    IndexCount(usize),
    #[error("{0} vertices exceed the 16-bit index range")]
    TooManyVertices(usize),
}

/// Surface parameters shared by every triangle of a sub-mesh.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Material {
    pub diffuse: Vec3,
    /// Written to the alpha channel of the diffuse G-buffer target.
    pub specular: f32,
}

impl Default for Material {
    fn default() -> Self {
        Self {
            diffuse: Vec3::splat(0.8),
            specular: 0.5,
        }
    }
}

/// One draw call worth of geometry.
#[derive(Debug, Clone, PartialEq)]
pub struct SubMeshData {
    layout: VertexLayout,
    vertices: Vec<u8>,
    indices: Vec<u16>,
    material: Material,
    /// Placement relative to the owning mesh.
    transform: Mat4,
}

impl SubMeshData {
    pub fn new(
        layout: VertexLayout,
        vertices: Vec<u8>,
        indices: Vec<u16>,
        material: Material,
    ) -> Result<Self, MeshError> {
        let stride = layout.stride();
        if vertices.len() % stride != 0 {
            return Err(MeshError::Stride {
                len: vertices.len(),
                stride,
            });
        }
        if indices.len() % 3 != 0 {
            return Err(MeshError::IndexCount(indices.len()));
        }
        let vertex_count = vertices.len() / stride;
        if let Some(&bad) = indices.iter().find(|&&i| usize::from(i) >= vertex_count) {
            return Err(MeshError::IndexOutOfRange {
                index: usize::from(bad),
                vertex_count,
            });
        }
        Ok(Self {
            layout,
            vertices,
            indices,
            material,
            transform: Mat4::IDENTITY,
        })
    }

    pub fn with_transform(mut self, transform: Mat4) -> Self {
        self.transform = transform;
        self
    }

    pub fn layout(&self) -> &VertexLayout {
        &self.layout
    }

    pub fn vertex_bytes(&self) -> &[u8] {
        &self.vertices
    }

    pub fn indices(&self) -> &[u16] {
        &self.indices
    }

    pub fn material(&self) -> &Material {
        &self.material
    }

    pub fn transform(&self) -> Mat4 {
        self.transform
    }

    pub fn num_vertices(&self) -> usize {
        self.vertices.len() / self.layout.stride()
    }

    pub fn num_triangles(&self) -> usize {
        self.indices.len() / 3
    }

    /// Read a three-float field of one vertex.
    pub fn read_vec3(&self, vertex: usize, field: VertexField) -> Result<Vec3, MeshError> {
        if !field.is_vec3() {
            return Err(MeshError::NotVector(field));
        }
        let offset = self
            .layout
            .offset(field)
            .ok_or(MeshError::MissingField(field))?;
        let vertex_count = self.num_vertices();
        if vertex >= vertex_count {
            return Err(MeshError::IndexOutOfRange {
                index: vertex,
                vertex_count,
            });
        }
        let start = vertex * self.layout.stride() + offset;
        Ok(self.vec3_at(start))
    }

    /// Position of a vertex known to be in range. Position is always the
    /// first field.
    fn position(&self, vertex: usize) -> Vec3 {
        self.vec3_at(vertex * self.layout.stride())
    }

    fn vec3_at(&self, start: usize) -> Vec3 {
        let xyz: [f32; 3] = bytemuck::pod_read_unaligned(&self.vertices[start..start + 12]);
        Vec3::from_array(xyz)
    }

    pub fn positions(&self) -> impl Iterator<Item = Vec3> + '_ {
        (0..self.num_vertices()).map(|v| self.position(v))
    }

    pub fn triangles(&self) -> impl Iterator<Item = [Vec3; 3]> + '_ {
        self.indices.chunks_exact(3).map(|tri| {
            [
                self.position(usize::from(tri[0])),
                self.position(usize::from(tri[1])),
                self.position(usize::from(tri[2])),
            ]
        })
    }
}

/// Axis-aligned extent plus the largest distance of any vertex from the
/// mesh origin.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    pub min: Vec3,
    pub max: Vec3,
    pub radius: f32,
}

/// A renderable model: one or more sub-meshes.
#[derive(Debug, Clone, PartialEq)]
pub struct MeshData {
    sub_meshes: Vec<SubMeshData>,
}

impl MeshData {
    pub fn new(sub_meshes: Vec<SubMeshData>) -> Result<Self, MeshError> {
        if sub_meshes.is_empty() {
            return Err(MeshError::Empty);
        }
        if let Some(i) = sub_meshes
            .iter()
            .position(|s| s.num_vertices() == 0 || s.num_triangles() == 0)
        {
            return Err(MeshError::EmptySubMesh(i));
        }
        Ok(Self { sub_meshes })
    }

    pub fn sub_meshes(&self) -> &[SubMeshData] {
        &self.sub_meshes
    }

    pub fn num_vertices(&self) -> usize {
        self.sub_meshes.iter().map(SubMeshData::num_vertices).sum()
    }

    pub fn num_triangles(&self) -> usize {
        self.sub_meshes.iter().map(SubMeshData::num_triangles).sum()
    }

    /// Vertex positions across all sub-meshes, in sub-mesh order.
    pub fn vertices(&self) -> impl Iterator<Item = Vec3> + '_ {
        self.sub_meshes.iter().flat_map(SubMeshData::positions)
    }

    /// Triangle corner positions across all sub-meshes.
    pub fn triangles(&self) -> impl Iterator<Item = [Vec3; 3]> + '_ {
        self.sub_meshes.iter().flat_map(SubMeshData::triangles)
    }

    pub fn bounds(&self) -> Bounds {
        let mut bounds = Bounds {
            min: Vec3::splat(f32::MAX),
            max: Vec3::splat(f32::MIN),
            radius: 0.0,
        };
        for v in self.vertices() {
            bounds.min = bounds.min.min(v);
            bounds.max = bounds.max.max(v);
            bounds.radius = bounds.radius.max(v.length());
        }
        bounds
    }
}
