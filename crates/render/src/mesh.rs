use glam::Mat4;
use lumen_mesh::MeshData;

use crate::backend::{GeometryId, RenderBackend, Technique};
use crate::error::RenderError;

/// Something the sequencer can draw with a given technique.
pub trait RenderableMesh {
    /// Issue one draw per sub-mesh. Returns the number of draws.
    fn render(
        &self,
        backend: &mut dyn RenderBackend,
        technique: Technique,
    ) -> Result<usize, RenderError>;
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Part {
    geometry: GeometryId,
    transform: Mat4,
}

/// A mesh whose sub-meshes live on a backend, placed by a world matrix.
#[derive(Debug, Clone, PartialEq)]
pub struct SceneMesh {
    world: Mat4,
    parts: Vec<Part>,
}

impl SceneMesh {
    /// Upload every sub-mesh of `mesh` to the backend.
    pub fn upload(
        backend: &mut dyn RenderBackend,
        mesh: &MeshData,
        world: Mat4,
    ) -> Result<Self, RenderError> {
        let parts = mesh
            .sub_meshes()
            .iter()
            .map(|sub| {
                Ok(Part {
                    geometry: backend.upload_sub_mesh(sub)?,
                    transform: sub.transform(),
                })
            })
            .collect::<Result<Vec<_>, RenderError>>()?;
        tracing::debug!(
            sub_meshes = parts.len(),
            triangles = mesh.num_triangles(),
            "mesh uploaded"
        );
        Ok(Self { world, parts })
    }

    pub fn world(&self) -> Mat4 {
        self.world
    }

    pub fn set_world(&mut self, world: Mat4) {
        self.world = world;
    }

    pub fn geometry(&self) -> impl Iterator<Item = GeometryId> + '_ {
        self.parts.iter().map(|p| p.geometry)
    }
}

impl RenderableMesh for SceneMesh {
    fn render(
        &self,
        backend: &mut dyn RenderBackend,
        technique: Technique,
    ) -> Result<usize, RenderError> {
        for part in &self.parts {
            backend.set_world_matrix(self.world * part.transform);
            backend.draw_geometry(part.geometry, technique)?;
        }
        Ok(self.parts.len())
    }
}
