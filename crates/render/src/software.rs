//! CPU reference backend.
//!
//! Rasterises triangles into real depth, G-buffer and back-buffer arrays and
//! applies the same lighting as the GPU shaders. Every call is appended to a
//! command log so frame ordering can be inspected. Triangles are clipped
//! against the near plane before rasterisation.

use glam::{Mat3, Mat4, Vec2, Vec3, Vec4, Vec4Swizzles};
use lumen_common::Viewport;
use lumen_lights::{HostLightBuffer, LightBufferWriter, LightUploadError, PointLight};
use lumen_mesh::{Material, SubMeshData, VertexField};

use crate::backend::{
    FrameUniforms, GBuffer, GBufferId, GBufferSlot, GeometryId, RenderBackend, RenderTargets,
    Technique,
};
use crate::error::RenderError;
use crate::shading::{self, SurfacePoint};

/// Flare sprite half-size as a fraction of the light radius.
const FLARE_SCALE: f32 = 0.15;

/// Colour targets a command referred to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetKind {
    BackBuffer,
    GBuffer(GBufferId),
}

/// One recorded backend call.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Command {
    SetFrameUniforms,
    SetViewport(Viewport),
    WriteLights(usize),
    SetLightCount(u32),
    ClearBackBuffer,
    ClearDepth,
    BindTargets(TargetKind),
    BindInputs(Option<GBufferId>),
    SetWorldMatrix,
    DrawGeometry {
        geometry: GeometryId,
        technique: Technique,
    },
    DrawFullscreenQuad(Technique),
    DrawLightPoints {
        count: u32,
        technique: Technique,
    },
    Present,
}

#[derive(Debug, Clone)]
struct Geometry {
    positions: Vec<Vec3>,
    normals: Vec<Vec3>,
    indices: Vec<u16>,
    material: Material,
}

#[derive(Debug)]
struct GBufferPixels {
    handle: GBuffer,
    targets: [Vec<Vec4>; 3],
}

/// A rasterised pixel of a triangle.
struct Fragment {
    index: usize,
    depth: f32,
    position: Vec3,
    normal: Vec3,
}

/// A transformed vertex before the perspective divide.
#[derive(Debug, Clone, Copy)]
struct ClipVertex {
    clip: Vec4,
    world: Vec3,
    normal: Vec3,
}

impl ClipVertex {
    fn lerp(self, other: Self, t: f32) -> Self {
        Self {
            clip: self.clip.lerp(other.clip, t),
            world: self.world.lerp(other.world, t),
            normal: self.normal.lerp(other.normal, t),
        }
    }
}

/// Clip a triangle to the near plane (`z >= 0` in clip space). The result is
/// a convex polygon of zero, three or four vertices.
fn clip_near(tri: [ClipVertex; 3]) -> Vec<ClipVertex> {
    let mut polygon = Vec::with_capacity(4);
    for i in 0..3 {
        let (current, next) = (tri[i], tri[(i + 1) % 3]);
        let (dc, dn) = (current.clip.z, next.clip.z);
        if dc >= 0.0 {
            polygon.push(current);
        }
        if (dc >= 0.0) != (dn >= 0.0) {
            polygon.push(current.lerp(next, dc / (dc - dn)));
        }
    }
    polygon
}

pub struct SoftwareBackend {
    viewport: Viewport,
    back: Vec<Vec4>,
    front: Vec<Vec4>,
    depth: Vec<f32>,
    gbuffer: Option<GBufferPixels>,
    next_gbuffer: u32,
    targets: Option<TargetKind>,
    inputs: Option<GBufferId>,
    uniforms: FrameUniforms,
    world: Mat4,
    lights: HostLightBuffer,
    light_count: u32,
    geometry: Vec<Geometry>,
    commands: Vec<Command>,
    presented: u64,
}

impl SoftwareBackend {
    pub fn new(viewport: Viewport, light_capacity: usize) -> Self {
        let pixels = viewport.pixel_count();
        Self {
            viewport,
            back: vec![Vec4::ZERO; pixels],
            front: vec![Vec4::ZERO; pixels],
            depth: vec![1.0; pixels],
            gbuffer: None,
            next_gbuffer: 0,
            targets: None,
            inputs: None,
            uniforms: FrameUniforms::default(),
            world: Mat4::IDENTITY,
            lights: HostLightBuffer::new(light_capacity),
            light_count: 0,
            geometry: Vec::new(),
            commands: Vec::new(),
            presented: 0,
        }
    }

    /// Change the back-buffer extent. The G-buffer must be recreated.
    pub fn resize(&mut self, viewport: Viewport) {
        let pixels = viewport.pixel_count();
        self.viewport = viewport;
        self.back = vec![Vec4::ZERO; pixels];
        self.front = vec![Vec4::ZERO; pixels];
        self.depth = vec![1.0; pixels];
        self.targets = None;
        self.inputs = None;
    }

    /// The last presented image, row-major from the top-left.
    pub fn front_buffer(&self) -> &[Vec4] {
        &self.front
    }

    pub fn depth_buffer(&self) -> &[f32] {
        &self.depth
    }

    /// Contents of one G-buffer target, if `gbuffer` is still live.
    pub fn gbuffer_target(&self, gbuffer: &GBuffer, slot: GBufferSlot) -> Option<&[Vec4]> {
        self.gbuffer
            .as_ref()
            .filter(|g| g.handle.id() == gbuffer.id())
            .map(|g| g.targets[slot.index()].as_slice())
    }

    pub fn commands(&self) -> &[Command] {
        &self.commands
    }

    /// Drain the command log.
    pub fn take_commands(&mut self) -> Vec<Command> {
        std::mem::take(&mut self.commands)
    }

    pub fn frames_presented(&self) -> u64 {
        self.presented
    }

    pub fn inputs_bound(&self) -> Option<GBufferId> {
        self.inputs
    }

    fn live_lights(&self, count: u32) -> &[PointLight] {
        let uploaded = self.lights.lights();
        &uploaded[..uploaded.len().min(count as usize)]
    }

    fn require_back_buffer(&self, technique: Technique) -> Result<(), RenderError> {
        match self.targets {
            Some(TargetKind::BackBuffer) => Ok(()),
            other => Err(RenderError::TargetMismatch(format!(
                "{technique:?} draws to the back buffer but {other:?} is bound"
            ))),
        }
    }

    fn to_screen(&self, clip: Vec4) -> Vec3 {
        let ndc = clip.xyz() / clip.w;
        Vec3::new(
            (ndc.x * 0.5 + 0.5) * self.viewport.width as f32,
            (0.5 - ndc.y * 0.5) * self.viewport.height as f32,
            ndc.z,
        )
    }

    /// Rasterise the triangles of one geometry under the current world matrix.
    fn rasterise(&self, geometry: &Geometry) -> Vec<Fragment> {
        let normal_matrix = Mat3::from_mat4(self.world).inverse().transpose();
        let vertices: Vec<ClipVertex> = geometry
            .positions
            .iter()
            .zip(&geometry.normals)
            .map(|(p, n)| {
                let world = self.world.transform_point3(*p);
                ClipVertex {
                    clip: self.uniforms.view_projection * world.extend(1.0),
                    world,
                    normal: (normal_matrix * *n).normalize_or_zero(),
                }
            })
            .collect();

        let mut fragments = Vec::new();
        for tri in geometry.indices.chunks_exact(3) {
            let polygon = clip_near([tri[0], tri[1], tri[2]].map(|i| vertices[usize::from(i)]));
            for k in 1..polygon.len().saturating_sub(1) {
                self.rasterise_triangle([polygon[0], polygon[k], polygon[k + 1]], &mut fragments);
            }
        }
        fragments
    }

    fn rasterise_triangle(&self, tri: [ClipVertex; 3], fragments: &mut Vec<Fragment>) {
        let (width, height) = (self.viewport.width as usize, self.viewport.height as usize);
        let s = tri.map(|v| self.to_screen(v.clip));
        let area = edge(s[0].truncate(), s[1].truncate(), s[2].truncate());
        if area.abs() <= f32::EPSILON {
            return;
        }

        let min = s[0].min(s[1]).min(s[2]);
        let max = s[0].max(s[1]).max(s[2]);
        let x0 = min.x.floor().max(0.0) as usize;
        let y0 = min.y.floor().max(0.0) as usize;
        let x1 = (max.x.ceil().max(0.0) as usize).min(width);
        let y1 = (max.y.ceil().max(0.0) as usize).min(height);
        let inv_w = tri.map(|v| 1.0 / v.clip.w);

        for y in y0..y1 {
            for x in x0..x1 {
                let p = Vec2::new(x as f32 + 0.5, y as f32 + 0.5);
                let w0 = edge(s[1].truncate(), s[2].truncate(), p) / area;
                let w1 = edge(s[2].truncate(), s[0].truncate(), p) / area;
                let w2 = edge(s[0].truncate(), s[1].truncate(), p) / area;
                if w0 < 0.0 || w1 < 0.0 || w2 < 0.0 {
                    continue;
                }
                let depth = w0 * s[0].z + w1 * s[1].z + w2 * s[2].z;
                if !(0.0..=1.0).contains(&depth) {
                    continue;
                }
                // Perspective-correct weights
                let pw = [w0 * inv_w[0], w1 * inv_w[1], w2 * inv_w[2]];
                let sum = pw[0] + pw[1] + pw[2];
                let lerp = |v: [Vec3; 3]| (v[0] * pw[0] + v[1] * pw[1] + v[2] * pw[2]) / sum;
                fragments.push(Fragment {
                    index: y * width + x,
                    depth,
                    position: lerp(tri.map(|v| v.world)),
                    normal: lerp(tri.map(|v| v.normal)).normalize_or_zero(),
                });
            }
        }
    }

    /// Pixel rectangle covering a light's sphere of influence, or the whole
    /// viewport when the sphere reaches behind the camera.
    fn light_rect(&self, center: Vec3, radius: f32) -> Option<(usize, usize, usize, usize)> {
        let (width, height) = (self.viewport.width as usize, self.viewport.height as usize);
        let mut min = Vec2::splat(f32::MAX);
        let mut max = Vec2::splat(f32::MIN);
        for i in 0..8 {
            let corner = center
                + Vec3::new(
                    if i & 1 == 0 { -radius } else { radius },
                    if i & 2 == 0 { -radius } else { radius },
                    if i & 4 == 0 { -radius } else { radius },
                );
            let clip = self.uniforms.view_projection * corner.extend(1.0);
            if clip.w <= self.uniforms.near_clip {
                return Some((0, 0, width, height));
            }
            let screen = self.to_screen(clip).truncate();
            min = min.min(screen);
            max = max.max(screen);
        }
        let x0 = min.x.floor().max(0.0) as usize;
        let y0 = min.y.floor().max(0.0) as usize;
        let x1 = (max.x.ceil().max(0.0) as usize).min(width);
        let y1 = (max.y.ceil().max(0.0) as usize).min(height);
        (x0 < x1 && y0 < y1).then_some((x0, y0, x1, y1))
    }

    fn accumulate_lights(&mut self, count: u32) -> Result<(), RenderError> {
        let technique = Technique::PointLightAccumulate;
        self.require_back_buffer(technique)?;
        let gbuffer = bound_inputs(self.inputs, &self.gbuffer, technique)?;
        let width = self.viewport.width as usize;
        let camera = self.uniforms.camera_position;

        let mut added = vec![Vec3::ZERO; self.back.len()];
        for light in self.live_lights(count) {
            let Some((x0, y0, x1, y1)) = self.light_rect(light.position(), light.radius) else {
                continue;
            };
            for y in y0..y1 {
                for x in x0..x1 {
                    let i = y * width + x;
                    let diffuse = gbuffer.targets[0][i];
                    let normal = gbuffer.targets[1][i].xyz();
                    if normal == Vec3::ZERO {
                        continue;
                    }
                    let surface = SurfacePoint {
                        position: gbuffer.targets[2][i].xyz(),
                        normal,
                        diffuse: diffuse.xyz(),
                        specular: diffuse.w,
                    };
                    added[i] += shading::point_light(&surface, light, camera);
                }
            }
        }
        for (pixel, add) in self.back.iter_mut().zip(added) {
            *pixel += add.extend(0.0);
        }
        Ok(())
    }

    fn draw_flares(&mut self, count: u32) -> Result<(), RenderError> {
        self.require_back_buffer(Technique::LightFlares)?;
        let width = self.viewport.width as usize;
        let height = self.viewport.height as usize;
        let lights: Vec<PointLight> = self.live_lights(count).to_vec();
        for light in &lights {
            let clip = self.uniforms.view_projection * light.position().extend(1.0);
            if clip.w <= self.uniforms.near_clip {
                continue;
            }
            let center = self.to_screen(clip);
            if !(0.0..=1.0).contains(&center.z) {
                continue;
            }
            let half = light.radius * FLARE_SCALE;
            let pixel_radius = half * self.uniforms.projection.y_axis.y / clip.w * height as f32 * 0.5;
            if pixel_radius < 0.5 {
                continue;
            }
            let x0 = (center.x - pixel_radius).floor().max(0.0) as usize;
            let y0 = (center.y - pixel_radius).floor().max(0.0) as usize;
            let x1 = ((center.x + pixel_radius).ceil().max(0.0) as usize).min(width);
            let y1 = ((center.y + pixel_radius).ceil().max(0.0) as usize).min(height);
            for y in y0..y1 {
                for x in x0..x1 {
                    let i = y * width + x;
                    if center.z >= self.depth[i] {
                        continue;
                    }
                    let d = Vec2::new(x as f32 + 0.5, y as f32 + 0.5).distance(center.truncate())
                        / pixel_radius;
                    if d < 1.0 {
                        let falloff = (1.0 - d) * (1.0 - d);
                        self.back[i] += (light.color().truncate() * falloff).extend(0.0);
                    }
                }
            }
        }
        Ok(())
    }
}

/// The G-buffer bound as shader input. Borrows only the G-buffer field so
/// callers can write the back buffer while reading it.
fn bound_inputs(
    inputs: Option<GBufferId>,
    gbuffer: &Option<GBufferPixels>,
    technique: Technique,
) -> Result<&GBufferPixels, RenderError> {
    match (inputs, gbuffer.as_ref()) {
        (Some(id), Some(g)) if g.handle.id() == id => Ok(g),
        _ => Err(RenderError::GBufferNotBound(technique)),
    }
}

/// Twice the signed area of triangle `(a, b, p)`.
fn edge(a: Vec2, b: Vec2, p: Vec2) -> f32 {
    (b.x - a.x) * (p.y - a.y) - (b.y - a.y) * (p.x - a.x)
}

impl LightBufferWriter for SoftwareBackend {
    fn write_lights(&mut self, lights: &[PointLight]) -> Result<(), LightUploadError> {
        self.lights.write_lights(lights)?;
        self.commands.push(Command::WriteLights(lights.len()));
        Ok(())
    }
}

impl RenderBackend for SoftwareBackend {
    fn viewport(&self) -> Viewport {
        self.viewport
    }

    fn create_gbuffer(&mut self, viewport: Viewport) -> Result<GBuffer, RenderError> {
        if viewport != self.viewport {
            return Err(RenderError::ResourceCreation {
                what: "G-buffer",
                reason: format!(
                    "{}x{} does not match the {}x{} back buffer",
                    viewport.width, viewport.height, self.viewport.width, self.viewport.height
                ),
            });
        }
        let handle = GBuffer::new(GBufferId(self.next_gbuffer), viewport);
        self.next_gbuffer += 1;
        let pixels = viewport.pixel_count();
        self.gbuffer = Some(GBufferPixels {
            handle: handle.clone(),
            targets: std::array::from_fn(|_| vec![Vec4::ZERO; pixels]),
        });
        self.inputs = None;
        if matches!(self.targets, Some(TargetKind::GBuffer(_))) {
            self.targets = None;
        }
        Ok(handle)
    }

    fn upload_sub_mesh(&mut self, sub_mesh: &SubMeshData) -> Result<GeometryId, RenderError> {
        let count = sub_mesh.num_vertices();
        let positions = (0..count)
            .map(|v| sub_mesh.read_vec3(v, VertexField::Position))
            .collect::<Result<Vec<_>, _>>()?;
        let normals = (0..count)
            .map(|v| sub_mesh.read_vec3(v, VertexField::Normal))
            .collect::<Result<Vec<_>, _>>()?;
        let id = GeometryId(self.geometry.len() as u32);
        self.geometry.push(Geometry {
            positions,
            normals,
            indices: sub_mesh.indices().to_vec(),
            material: *sub_mesh.material(),
        });
        Ok(id)
    }

    fn set_frame_uniforms(&mut self, uniforms: &FrameUniforms) {
        self.uniforms = *uniforms;
        self.commands.push(Command::SetFrameUniforms);
    }

    fn set_viewport(&mut self, viewport: Viewport) {
        self.commands.push(Command::SetViewport(viewport));
    }

    fn clear_back_buffer(&mut self, color: Vec4) {
        self.back.fill(color);
        self.commands.push(Command::ClearBackBuffer);
    }

    fn clear_depth(&mut self, depth: f32) {
        self.depth.fill(depth);
        self.commands.push(Command::ClearDepth);
    }

    fn bind_targets(&mut self, targets: RenderTargets<'_>) -> Result<(), RenderError> {
        let kind = match targets {
            RenderTargets::BackBuffer => TargetKind::BackBuffer,
            RenderTargets::GBuffer(handle) => {
                if self.inputs == Some(handle.id()) {
                    return Err(RenderError::GBufferHazard(handle.id()));
                }
                let pixels = self
                    .gbuffer
                    .as_mut()
                    .filter(|g| g.handle == *handle)
                    .ok_or_else(|| {
                        RenderError::TargetMismatch(format!("G-buffer {:?} is not live", handle.id()))
                    })?;
                for target in &mut pixels.targets {
                    target.fill(Vec4::ZERO);
                }
                TargetKind::GBuffer(handle.id())
            }
        };
        self.targets = Some(kind);
        self.commands.push(Command::BindTargets(kind));
        Ok(())
    }

    fn bind_gbuffer_inputs(&mut self, gbuffer: Option<&GBuffer>) -> Result<(), RenderError> {
        if let Some(handle) = gbuffer {
            if self.targets == Some(TargetKind::GBuffer(handle.id())) {
                return Err(RenderError::GBufferHazard(handle.id()));
            }
            if !self.gbuffer.as_ref().is_some_and(|g| g.handle == *handle) {
                return Err(RenderError::TargetMismatch(format!(
                    "G-buffer {:?} is not live",
                    handle.id()
                )));
            }
        }
        self.inputs = gbuffer.map(GBuffer::id);
        self.commands.push(Command::BindInputs(self.inputs));
        Ok(())
    }

    fn set_light_count(&mut self, count: u32) {
        self.light_count = count;
        self.commands.push(Command::SetLightCount(count));
    }

    fn set_world_matrix(&mut self, world: Mat4) {
        self.world = world;
        self.commands.push(Command::SetWorldMatrix);
    }

    fn draw_geometry(
        &mut self,
        geometry: GeometryId,
        technique: Technique,
    ) -> Result<(), RenderError> {
        let mesh = self
            .geometry
            .get(geometry.0 as usize)
            .ok_or(RenderError::UnknownGeometry(geometry))?;
        let fragments = self.rasterise(mesh);
        let material = mesh.material;

        match technique {
            Technique::PixelLit | Technique::Background => {
                self.require_back_buffer(technique)?;
                let lights = match technique {
                    Technique::PixelLit => self.live_lights(self.light_count).to_vec(),
                    _ => Vec::new(),
                };
                for f in fragments {
                    if f.depth >= self.depth[f.index] {
                        continue;
                    }
                    self.depth[f.index] = f.depth;
                    let surface = SurfacePoint {
                        position: f.position,
                        normal: f.normal,
                        diffuse: material.diffuse,
                        specular: material.specular,
                    };
                    let color = shading::forward(
                        &surface,
                        &lights,
                        self.uniforms.ambient_color,
                        self.uniforms.camera_position,
                    );
                    self.back[f.index] = color.extend(1.0);
                }
            }
            Technique::GBufferFill => {
                let Some(TargetKind::GBuffer(id)) = self.targets else {
                    return Err(RenderError::TargetMismatch(
                        "G-buffer fill without the G-buffer bound".into(),
                    ));
                };
                let gbuffer = self
                    .gbuffer
                    .as_mut()
                    .filter(|g| g.handle.id() == id)
                    .ok_or_else(|| {
                        RenderError::TargetMismatch(format!("G-buffer {id:?} is not live"))
                    })?;
                for f in fragments {
                    if f.depth >= self.depth[f.index] {
                        continue;
                    }
                    self.depth[f.index] = f.depth;
                    gbuffer.targets[0][f.index] = material.diffuse.extend(material.specular);
                    gbuffer.targets[1][f.index] = f.normal.extend(0.0);
                    gbuffer.targets[2][f.index] = f.position.extend(0.0);
                }
            }
            other => {
                return Err(RenderError::UnsupportedTechnique {
                    technique: other,
                    draw: "mesh geometry",
                });
            }
        }
        self.commands.push(Command::DrawGeometry {
            geometry,
            technique,
        });
        Ok(())
    }

    fn draw_fullscreen_quad(&mut self, technique: Technique) -> Result<(), RenderError> {
        if technique != Technique::AmbientResolve {
            return Err(RenderError::UnsupportedTechnique {
                technique,
                draw: "a full-screen quad",
            });
        }
        self.require_back_buffer(technique)?;
        let gbuffer = bound_inputs(self.inputs, &self.gbuffer, technique)?;
        let ambient_color = self.uniforms.ambient_color;
        for (pixel, diffuse) in self.back.iter_mut().zip(&gbuffer.targets[0]) {
            *pixel = shading::ambient(diffuse.xyz(), ambient_color).extend(1.0);
        }
        self.commands.push(Command::DrawFullscreenQuad(technique));
        Ok(())
    }

    fn draw_light_points(&mut self, count: u32, technique: Technique) -> Result<(), RenderError> {
        match technique {
            Technique::PointLightAccumulate => self.accumulate_lights(count)?,
            Technique::LightFlares => self.draw_flares(count)?,
            other => {
                return Err(RenderError::UnsupportedTechnique {
                    technique: other,
                    draw: "light points",
                });
            }
        }
        self.commands.push(Command::DrawLightPoints { count, technique });
        Ok(())
    }

    fn present(&mut self) -> Result<(), RenderError> {
        self.front.clone_from(&self.back);
        self.presented += 1;
        self.commands.push(Command::Present);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn backend() -> SoftwareBackend {
        SoftwareBackend::new(Viewport::new(8, 6), 4)
    }

    fn vertex(z: f32) -> ClipVertex {
        ClipVertex {
            clip: Vec4::new(0.0, 0.0, z, 1.0),
            world: Vec3::new(0.0, 0.0, z),
            normal: Vec3::Y,
        }
    }

    #[test]
    fn near_clipping_keeps_visible_part() {
        assert_eq!(clip_near([vertex(0.5), vertex(0.6), vertex(0.7)]).len(), 3);
        assert!(clip_near([vertex(-0.5), vertex(-0.6), vertex(-0.7)]).is_empty());

        // One vertex behind: the triangle becomes a quad
        let quad = clip_near([vertex(-1.0), vertex(1.0), vertex(1.0)]);
        assert_eq!(quad.len(), 4);
        assert!(quad.iter().all(|v| v.clip.z >= 0.0));

        // Two behind: a smaller triangle
        let tri = clip_near([vertex(-1.0), vertex(-1.0), vertex(1.0)]);
        assert_eq!(tri.len(), 3);
        assert!(tri.iter().all(|v| v.clip.z >= 0.0));
    }

    #[test]
    fn sampling_bound_target_is_a_hazard() {
        let mut b = backend();
        let g = b.create_gbuffer(b.viewport()).unwrap();
        b.bind_targets(RenderTargets::GBuffer(&g)).unwrap();
        assert!(matches!(
            b.bind_gbuffer_inputs(Some(&g)),
            Err(RenderError::GBufferHazard(_))
        ));
    }

    #[test]
    fn binding_sampled_gbuffer_as_target_is_a_hazard() {
        let mut b = backend();
        let g = b.create_gbuffer(b.viewport()).unwrap();
        b.bind_targets(RenderTargets::BackBuffer).unwrap();
        b.bind_gbuffer_inputs(Some(&g)).unwrap();
        assert!(matches!(
            b.bind_targets(RenderTargets::GBuffer(&g)),
            Err(RenderError::GBufferHazard(_))
        ));
        b.bind_gbuffer_inputs(None).unwrap();
        b.bind_targets(RenderTargets::GBuffer(&g)).unwrap();
    }

    #[test]
    fn resolve_requires_inputs() {
        let mut b = backend();
        b.create_gbuffer(b.viewport()).unwrap();
        b.bind_targets(RenderTargets::BackBuffer).unwrap();
        assert!(matches!(
            b.draw_fullscreen_quad(Technique::AmbientResolve),
            Err(RenderError::GBufferNotBound(Technique::AmbientResolve))
        ));
        assert!(matches!(
            b.draw_light_points(0, Technique::PointLightAccumulate),
            Err(RenderError::GBufferNotBound(_))
        ));
    }

    #[test]
    fn stale_handle_rejected_after_recreate() {
        let mut b = backend();
        let old = b.create_gbuffer(b.viewport()).unwrap();
        let new = b.create_gbuffer(b.viewport()).unwrap();
        assert_ne!(old.id(), new.id());
        assert!(b.bind_targets(RenderTargets::GBuffer(&old)).is_err());
        assert!(b.gbuffer_target(&old, GBufferSlot::WorldNormal).is_none());
    }

    #[test]
    fn gbuffer_must_match_viewport() {
        let mut b = backend();
        assert!(matches!(
            b.create_gbuffer(Viewport::new(4, 4)),
            Err(RenderError::ResourceCreation { .. })
        ));
    }

    #[test]
    fn unknown_geometry() {
        let mut b = backend();
        b.bind_targets(RenderTargets::BackBuffer).unwrap();
        assert!(matches!(
            b.draw_geometry(GeometryId(7), Technique::PixelLit),
            Err(RenderError::UnknownGeometry(GeometryId(7)))
        ));
    }

    #[test]
    fn wrong_technique_for_draw() {
        let mut b = backend();
        b.bind_targets(RenderTargets::BackBuffer).unwrap();
        assert!(matches!(
            b.draw_fullscreen_quad(Technique::PixelLit),
            Err(RenderError::UnsupportedTechnique { .. })
        ));
        assert!(matches!(
            b.draw_light_points(1, Technique::GBufferFill),
            Err(RenderError::UnsupportedTechnique { .. })
        ));
    }

    #[test]
    fn gbuffer_bind_clears_targets() {
        let mut b = backend();
        let g = b.create_gbuffer(b.viewport()).unwrap();
        if let Some(pixels) = b.gbuffer.as_mut() {
            pixels.targets[0].fill(Vec4::ONE);
        }
        b.bind_targets(RenderTargets::GBuffer(&g)).unwrap();
        let diffuse = b.gbuffer_target(&g, GBufferSlot::DiffuseSpecular).unwrap();
        assert!(diffuse.iter().all(|p| *p == Vec4::ZERO));
    }

    #[test]
    fn oversized_light_upload_fails() {
        let mut b = backend();
        let lights = [PointLight::default(); 5];
        assert!(b.write_lights(&lights).is_err());
        assert!(b.commands().is_empty());
    }
}
