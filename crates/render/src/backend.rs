use glam::{Mat4, Vec3, Vec4};
use lumen_camera::Camera;
use lumen_common::{StereoConfig, StereoMode, Viewport};
use lumen_lights::LightBufferWriter;
use lumen_mesh::SubMeshData;

use crate::error::RenderError;

/// Shading program selected for a draw.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Technique {
    /// Forward lighting: ambient plus every point light, per pixel.
    PixelLit,
    /// Ambient only. For backdrops that no light should reach.
    Background,
    /// Writes diffuse/specular, normal and world position to the G-buffer.
    GBufferFill,
    /// Full-screen `diffuse * ambient` from the G-buffer.
    AmbientResolve,
    /// One additive quad per light covering its radius of influence.
    PointLightAccumulate,
    /// Camera-facing additive sprites marking each light.
    LightFlares,
}

/// Backend handle for uploaded sub-mesh geometry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GeometryId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GBufferId(pub u32);

/// The three G-buffer targets, in attachment order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GBufferSlot {
    /// RGB diffuse, A specular strength.
    DiffuseSpecular = 0,
    /// RGB world-space normal.
    WorldNormal = 1,
    /// RGB world-space position.
    WorldPosition = 2,
}

impl GBufferSlot {
    pub const ALL: [GBufferSlot; 3] = [
        GBufferSlot::DiffuseSpecular,
        GBufferSlot::WorldNormal,
        GBufferSlot::WorldPosition,
    ];

    pub fn index(self) -> usize {
        self as usize
    }
}

/// Handle to a backend-owned set of three same-sized G-buffer targets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GBuffer {
    id: GBufferId,
    viewport: Viewport,
}

impl GBuffer {
    /// Only backends mint handles.
    pub fn new(id: GBufferId, viewport: Viewport) -> Self {
        Self { id, viewport }
    }

    pub fn id(&self) -> GBufferId {
        self.id
    }

    pub fn viewport(&self) -> Viewport {
        self.viewport
    }
}

/// Colour targets for subsequent draws. Depth is always the backend's
/// single depth buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderTargets<'a> {
    BackBuffer,
    /// All three G-buffer targets at once. Binding clears them.
    GBuffer(&'a GBuffer),
}

/// Per-frame constants shared by every technique.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameUniforms {
    pub view: Mat4,
    /// The camera world matrix.
    pub inverse_view: Mat4,
    pub projection: Mat4,
    pub view_projection: Mat4,
    pub camera_position: Vec3,
    pub near_clip: f32,
    pub ambient_color: Vec3,
    pub viewport: Viewport,
}

impl Default for FrameUniforms {
    fn default() -> Self {
        Self {
            view: Mat4::IDENTITY,
            inverse_view: Mat4::IDENTITY,
            projection: Mat4::IDENTITY,
            view_projection: Mat4::IDENTITY,
            camera_position: Vec3::ZERO,
            near_clip: 1.0,
            ambient_color: Vec3::ZERO,
            viewport: Viewport::default(),
        }
    }
}

impl FrameUniforms {
    /// Uniforms from the camera's cached monoscopic matrices.
    pub fn mono(camera: &Camera, ambient_color: Vec3, viewport: Viewport) -> Self {
        let matrices = camera.matrices();
        Self {
            view: matrices.view,
            inverse_view: matrices.world,
            projection: matrices.projection,
            view_projection: matrices.view_projection,
            camera_position: camera.position(StereoMode::Monoscopic, 0.0),
            near_clip: camera.near_clip(),
            ambient_color,
            viewport,
        }
    }

    /// Gather the camera matrices for one eye.
    pub fn from_camera(
        camera: &Camera,
        stereo: StereoMode,
        stereo_config: &StereoConfig,
        ambient_color: Vec3,
        viewport: Viewport,
    ) -> Self {
        let iod = stereo_config.interocular;
        let screen = stereo_config.screen_distance;
        Self {
            view: camera.view_matrix(stereo, iod),
            inverse_view: camera.world_matrix(stereo, iod),
            projection: camera.projection_matrix(stereo, iod, screen),
            view_projection: camera.view_projection_matrix(stereo, iod, screen),
            camera_position: camera.position(stereo, iod),
            near_clip: camera.near_clip(),
            ambient_color,
            viewport,
        }
    }
}

/// The device-facing half of the renderer.
///
/// Accepts matrices, scalars and the light buffer, and executes draws in the
/// order they are issued. Implementations own every GPU resource; callers
/// hold only handles.
pub trait RenderBackend: LightBufferWriter {
    /// Current back-buffer extent.
    fn viewport(&self) -> Viewport;

    /// Allocate a G-buffer. Any previous G-buffer from this backend is released.
    fn create_gbuffer(&mut self, viewport: Viewport) -> Result<GBuffer, RenderError>;

    fn upload_sub_mesh(&mut self, sub_mesh: &SubMeshData) -> Result<GeometryId, RenderError>;

    fn set_frame_uniforms(&mut self, uniforms: &FrameUniforms);

    fn set_viewport(&mut self, viewport: Viewport);

    fn clear_back_buffer(&mut self, color: Vec4);

    fn clear_depth(&mut self, depth: f32);

    fn bind_targets(&mut self, targets: RenderTargets<'_>) -> Result<(), RenderError>;

    /// Bind the G-buffer as shader input, or unbind with `None`.
    fn bind_gbuffer_inputs(&mut self, gbuffer: Option<&GBuffer>) -> Result<(), RenderError>;

    fn set_light_count(&mut self, count: u32);

    fn set_world_matrix(&mut self, world: Mat4);

    fn draw_geometry(&mut self, geometry: GeometryId, technique: Technique)
    -> Result<(), RenderError>;

    /// Draw a quad covering the viewport; vertices are generated, not read.
    fn draw_fullscreen_quad(&mut self, technique: Technique) -> Result<(), RenderError>;

    /// Draw the first `count` uploaded lights as points expanded to quads.
    fn draw_light_points(&mut self, count: u32, technique: Technique) -> Result<(), RenderError>;

    fn present(&mut self) -> Result<(), RenderError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gbuffer_slots_in_attachment_order() {
        let indices: Vec<usize> = GBufferSlot::ALL.iter().map(|s| s.index()).collect();
        assert_eq!(indices, vec![0, 1, 2]);
    }

    #[test]
    fn mono_uniforms_match_monoscopic_eye() {
        let mut camera = Camera::default();
        camera.set_position(Vec3::new(3.0, 1.0, -7.0));
        camera.set_rotation(Vec3::new(0.2, -0.4, 0.0));
        camera.update_matrices();
        let mono = FrameUniforms::mono(&camera, Vec3::ONE, Viewport::new(64, 48));
        let stereo = StereoConfig {
            interocular: 4.0,
            screen_distance: 90.0,
        };
        let eye = FrameUniforms::from_camera(
            &camera,
            StereoMode::Monoscopic,
            &stereo,
            Vec3::ONE,
            Viewport::new(64, 48),
        );
        assert_eq!(mono, eye);
        assert_eq!(mono.camera_position, Vec3::new(3.0, 1.0, -7.0));
    }

    #[test]
    fn uniforms_from_mono_camera_use_cached_matrices() {
        let camera = Camera::default();
        let uniforms = FrameUniforms::from_camera(
            &camera,
            StereoMode::Monoscopic,
            &StereoConfig::default(),
            Vec3::splat(0.2),
            Viewport::default(),
        );
        assert_eq!(uniforms.view_projection, camera.matrices().view_projection);
        assert_eq!(uniforms.inverse_view, camera.matrices().world);
        assert_eq!(uniforms.camera_position, Vec3::ZERO);
    }
}
