use glam::Mat4;
use lumen_mesh::shapes;

use crate::backend::RenderBackend;
use crate::error::RenderError;
use crate::mesh::{RenderableMesh, SceneMesh};

/// The demo scene: a lit floor-and-pillars level inside a star skybox.
#[derive(Debug, Clone)]
pub struct DemoScene {
    level: SceneMesh,
    skybox: SceneMesh,
}

impl DemoScene {
    pub const SKYBOX_SCALE: f32 = 10_000.0;

    pub fn upload(backend: &mut dyn RenderBackend) -> Result<Self, RenderError> {
        let level = SceneMesh::upload(backend, &shapes::level()?, Mat4::IDENTITY)?;
        let skybox = SceneMesh::upload(
            backend,
            &shapes::skybox(Self::SKYBOX_SCALE)?,
            Mat4::IDENTITY,
        )?;
        Ok(Self { level, skybox })
    }

    pub fn opaque(&self) -> [&dyn RenderableMesh; 1] {
        [&self.level]
    }

    pub fn background(&self) -> [&dyn RenderableMesh; 1] {
        [&self.skybox]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::software::SoftwareBackend;
    use lumen_common::Viewport;

    #[test]
    fn uploads_level_and_skybox() {
        let mut backend = SoftwareBackend::new(Viewport::new(8, 8), 1);
        let scene = DemoScene::upload(&mut backend).unwrap();
        assert!(scene.level.geometry().count() >= 1);
        assert_eq!(scene.skybox.geometry().count(), 1);
        assert_eq!(scene.opaque().len(), 1);
        assert_eq!(scene.background().len(), 1);
    }
}
