//! Per-frame command recording.
//!
//! Backend calls arrive one at a time but wgpu encodes work in render passes,
//! so draws are validated and grouped here and only encoded at present.

use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec4};
use lumen_common::Viewport;
use lumen_render::{GBuffer, GBufferId, GeometryId, RenderError, RenderTargets, TargetKind, Technique};

/// Per-draw uniforms, one dynamic-offset slot each.
#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, Pod, Zeroable)]
pub(crate) struct ObjectUniforms {
    pub world: [[f32; 4]; 4],
    /// RGB diffuse, A specular strength.
    pub material: [f32; 4],
}

/// Uniform dynamic offsets must be multiples of this.
pub(crate) const OBJECT_SLOT_STRIDE: usize = 256;

/// Lay out object uniforms at [`OBJECT_SLOT_STRIDE`] intervals.
pub(crate) fn pack_objects(objects: &[ObjectUniforms]) -> Vec<u8> {
    let mut bytes = vec![0u8; objects.len() * OBJECT_SLOT_STRIDE];
    for (slot, object) in bytes.chunks_exact_mut(OBJECT_SLOT_STRIDE).zip(objects) {
        let data = bytemuck::bytes_of(object);
        slot[..data.len()].copy_from_slice(data);
    }
    bytes
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum DrawOp {
    SetViewport(Viewport),
    Geometry {
        geometry: GeometryId,
        technique: Technique,
        object: u32,
    },
    FullscreenQuad {
        technique: Technique,
        inputs: GBufferId,
    },
    LightPoints {
        count: u32,
        technique: Technique,
        inputs: Option<GBufferId>,
    },
}

/// One wgpu render pass worth of draws.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct PassRecord {
    pub target: TargetKind,
    pub viewport: Viewport,
    pub clear_color: Option<Vec4>,
    pub clear_gbuffer: bool,
    pub clear_depth: Option<f32>,
    pub ops: Vec<DrawOp>,
}

impl PassRecord {
    fn new(target: TargetKind, viewport: Viewport) -> Self {
        Self {
            target,
            viewport,
            clear_color: None,
            clear_gbuffer: false,
            clear_depth: None,
            ops: Vec::new(),
        }
    }
}

#[derive(Debug, Default)]
pub(crate) struct RecordedFrame {
    pub passes: Vec<PassRecord>,
    pub objects: Vec<ObjectUniforms>,
}

#[derive(Debug, Default)]
pub(crate) struct FrameRecorder {
    passes: Vec<PassRecord>,
    objects: Vec<ObjectUniforms>,
    viewport: Viewport,
    pending_color_clear: Option<Vec4>,
    pending_depth_clear: Option<f32>,
    live_gbuffer: Option<GBufferId>,
    inputs: Option<GBufferId>,
    world: Mat4,
}

impl FrameRecorder {
    pub fn new(viewport: Viewport) -> Self {
        Self {
            viewport,
            world: Mat4::IDENTITY,
            ..Self::default()
        }
    }

    /// A new G-buffer replaces the old one and drops its input binding.
    pub fn gbuffer_created(&mut self, id: GBufferId) {
        self.live_gbuffer = Some(id);
        self.inputs = None;
    }

    fn current_target(&self) -> Option<TargetKind> {
        self.passes.last().map(|p| p.target)
    }

    /// Start a fresh pass on the current targets so a clear can be applied
    /// after draws have already been recorded.
    fn restart_pass(&mut self) -> Option<&mut PassRecord> {
        let last = self.passes.last()?;
        if !last.ops.is_empty() {
            let next = PassRecord::new(last.target, self.viewport);
            self.passes.push(next);
        }
        self.passes.last_mut()
    }

    pub fn set_viewport(&mut self, viewport: Viewport) {
        self.viewport = viewport;
        if let Some(pass) = self.passes.last_mut() {
            pass.ops.push(DrawOp::SetViewport(viewport));
        }
    }

    pub fn clear_back_buffer(&mut self, color: Vec4) {
        if self.current_target() == Some(TargetKind::BackBuffer) {
            if let Some(pass) = self.restart_pass() {
                pass.clear_color = Some(color);
                return;
            }
        }
        self.pending_color_clear = Some(color);
    }

    pub fn clear_depth(&mut self, depth: f32) {
        match self.restart_pass() {
            Some(pass) => pass.clear_depth = Some(depth),
            None => self.pending_depth_clear = Some(depth),
        }
    }

    pub fn bind_targets(&mut self, targets: RenderTargets<'_>) -> Result<(), RenderError> {
        let mut pass = match targets {
            RenderTargets::BackBuffer => {
                let mut pass = PassRecord::new(TargetKind::BackBuffer, self.viewport);
                pass.clear_color = self.pending_color_clear.take();
                pass
            }
            RenderTargets::GBuffer(handle) => {
                let id = handle.id();
                if self.inputs == Some(id) {
                    return Err(RenderError::GBufferHazard(id));
                }
                if self.live_gbuffer != Some(id) {
                    return Err(RenderError::TargetMismatch(format!(
                        "G-buffer {id:?} is not live"
                    )));
                }
                let mut pass = PassRecord::new(TargetKind::GBuffer(id), self.viewport);
                pass.clear_gbuffer = true;
                pass
            }
        };
        pass.clear_depth = self.pending_depth_clear.take();
        self.passes.push(pass);
        Ok(())
    }

    pub fn bind_inputs(&mut self, gbuffer: Option<&GBuffer>) -> Result<(), RenderError> {
        if let Some(handle) = gbuffer {
            let id = handle.id();
            if self.current_target() == Some(TargetKind::GBuffer(id)) {
                return Err(RenderError::GBufferHazard(id));
            }
            if self.live_gbuffer != Some(id) {
                return Err(RenderError::TargetMismatch(format!(
                    "G-buffer {id:?} is not live"
                )));
            }
        }
        self.inputs = gbuffer.map(GBuffer::id);
        Ok(())
    }

    pub fn set_world(&mut self, world: Mat4) {
        self.world = world;
    }

    fn open_pass(&mut self) -> Result<&mut PassRecord, RenderError> {
        self.passes
            .last_mut()
            .ok_or_else(|| RenderError::TargetMismatch("no render targets bound".into()))
    }

    fn require_back_buffer(&self, technique: Technique) -> Result<(), RenderError> {
        match self.current_target() {
            Some(TargetKind::BackBuffer) => Ok(()),
            other => Err(RenderError::TargetMismatch(format!(
                "{technique:?} needs the back buffer, bound: {other:?}"
            ))),
        }
    }

    fn require_inputs(&self, technique: Technique) -> Result<GBufferId, RenderError> {
        match self.inputs {
            Some(id) if self.live_gbuffer == Some(id) => Ok(id),
            _ => Err(RenderError::GBufferNotBound(technique)),
        }
    }

    /// Record a mesh draw with the current world matrix and `material`.
    pub fn draw_geometry(
        &mut self,
        geometry: GeometryId,
        material: [f32; 4],
        technique: Technique,
    ) -> Result<(), RenderError> {
        match technique {
            Technique::PixelLit | Technique::Background => self.require_back_buffer(technique)?,
            Technique::GBufferFill => {
                if !matches!(self.current_target(), Some(TargetKind::GBuffer(_))) {
                    return Err(RenderError::TargetMismatch(
                        "G-buffer fill without the G-buffer bound".into(),
                    ));
                }
            }
            other => {
                return Err(RenderError::UnsupportedTechnique {
                    technique: other,
                    draw: "mesh geometry",
                });
            }
        }
        let object = self.objects.len() as u32;
        self.objects.push(ObjectUniforms {
            world: self.world.to_cols_array_2d(),
            material,
        });
        self.open_pass()?.ops.push(DrawOp::Geometry {
            geometry,
            technique,
            object,
        });
        Ok(())
    }

    pub fn draw_fullscreen_quad(&mut self, technique: Technique) -> Result<(), RenderError> {
        if technique != Technique::AmbientResolve {
            return Err(RenderError::UnsupportedTechnique {
                technique,
                draw: "a full-screen quad",
            });
        }
        self.require_back_buffer(technique)?;
        let inputs = self.require_inputs(technique)?;
        self.open_pass()?
            .ops
            .push(DrawOp::FullscreenQuad { technique, inputs });
        Ok(())
    }

    pub fn draw_light_points(&mut self, count: u32, technique: Technique) -> Result<(), RenderError> {
        let inputs = match technique {
            Technique::PointLightAccumulate => {
                self.require_back_buffer(technique)?;
                Some(self.require_inputs(technique)?)
            }
            Technique::LightFlares => {
                self.require_back_buffer(technique)?;
                None
            }
            other => {
                return Err(RenderError::UnsupportedTechnique {
                    technique: other,
                    draw: "light points",
                });
            }
        };
        self.open_pass()?.ops.push(DrawOp::LightPoints {
            count,
            technique,
            inputs,
        });
        Ok(())
    }

    /// Hand over the recorded passes and reset for the next frame. A back
    /// buffer clear that no pass consumed gets a pass of its own.
    pub fn finish(&mut self) -> RecordedFrame {
        if let Some(color) = self.pending_color_clear.take() {
            let mut pass = PassRecord::new(TargetKind::BackBuffer, self.viewport);
            pass.clear_color = Some(color);
            pass.clear_depth = self.pending_depth_clear.take();
            self.passes.push(pass);
        }
        self.pending_depth_clear = None;
        self.world = Mat4::IDENTITY;
        RecordedFrame {
            passes: std::mem::take(&mut self.passes),
            objects: std::mem::take(&mut self.objects),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn recorder() -> (FrameRecorder, GBuffer) {
        let viewport = Viewport::new(64, 48);
        let mut rec = FrameRecorder::new(viewport);
        let gbuffer = GBuffer::new(GBufferId(0), viewport);
        rec.gbuffer_created(gbuffer.id());
        (rec, gbuffer)
    }

    const MATERIAL: [f32; 4] = [0.8, 0.8, 0.8, 0.5];

    #[test]
    fn deferred_frame_groups_into_two_passes() {
        let (mut rec, gbuffer) = recorder();
        rec.clear_back_buffer(Vec4::new(0.0, 0.0, 0.0, 1.0));
        rec.clear_depth(1.0);
        rec.bind_targets(RenderTargets::GBuffer(&gbuffer)).unwrap();
        rec.draw_geometry(GeometryId(0), MATERIAL, Technique::GBufferFill)
            .unwrap();
        rec.bind_targets(RenderTargets::BackBuffer).unwrap();
        rec.bind_inputs(Some(&gbuffer)).unwrap();
        rec.draw_fullscreen_quad(Technique::AmbientResolve).unwrap();
        rec.draw_light_points(3, Technique::PointLightAccumulate)
            .unwrap();
        rec.bind_inputs(None).unwrap();
        rec.draw_light_points(3, Technique::LightFlares).unwrap();

        let frame = rec.finish();
        assert_eq!(frame.passes.len(), 2);
        let (fill, lighting) = (&frame.passes[0], &frame.passes[1]);
        assert_eq!(fill.target, TargetKind::GBuffer(GBufferId(0)));
        assert!(fill.clear_gbuffer);
        assert_eq!(fill.clear_depth, Some(1.0));
        assert_eq!(fill.clear_color, None);
        assert_eq!(lighting.target, TargetKind::BackBuffer);
        assert_eq!(lighting.clear_color, Some(Vec4::new(0.0, 0.0, 0.0, 1.0)));
        assert_eq!(lighting.clear_depth, None);
        assert_eq!(lighting.ops.len(), 3);
        assert_eq!(frame.objects.len(), 1);
    }

    #[test]
    fn forward_frame_is_one_cleared_pass() {
        let (mut rec, _) = recorder();
        rec.clear_back_buffer(Vec4::W);
        rec.clear_depth(1.0);
        rec.bind_targets(RenderTargets::BackBuffer).unwrap();
        rec.draw_geometry(GeometryId(1), MATERIAL, Technique::PixelLit)
            .unwrap();
        let frame = rec.finish();
        assert_eq!(frame.passes.len(), 1);
        assert_eq!(frame.passes[0].clear_color, Some(Vec4::W));
        assert_eq!(frame.passes[0].clear_depth, Some(1.0));
    }

    #[test]
    fn background_draws_only_on_back_buffer() {
        let (mut rec, gbuffer) = recorder();
        rec.bind_targets(RenderTargets::GBuffer(&gbuffer)).unwrap();
        assert!(matches!(
            rec.draw_geometry(GeometryId(2), MATERIAL, Technique::Background),
            Err(RenderError::TargetMismatch(_))
        ));
        rec.bind_targets(RenderTargets::BackBuffer).unwrap();
        rec.draw_geometry(GeometryId(2), MATERIAL, Technique::Background)
            .unwrap();
        let frame = rec.finish();
        assert!(frame.passes.iter().flat_map(|p| &p.ops).any(|op| matches!(
            op,
            DrawOp::Geometry {
                technique: Technique::Background,
                ..
            }
        )));
    }

    #[test]
    fn clear_after_draws_starts_a_new_pass() {
        let (mut rec, _) = recorder();
        rec.bind_targets(RenderTargets::BackBuffer).unwrap();
        rec.draw_geometry(GeometryId(0), MATERIAL, Technique::PixelLit)
            .unwrap();
        rec.clear_depth(1.0);
        let frame = rec.finish();
        assert_eq!(frame.passes.len(), 2);
        assert_eq!(frame.passes[1].clear_depth, Some(1.0));
        assert!(frame.passes[1].ops.is_empty());
    }

    #[test]
    fn unconsumed_clear_still_reaches_the_back_buffer() {
        let (mut rec, _) = recorder();
        rec.clear_back_buffer(Vec4::W);
        let frame = rec.finish();
        assert_eq!(frame.passes.len(), 1);
        assert_eq!(frame.passes[0].clear_color, Some(Vec4::W));
    }

    #[test]
    fn world_matrix_is_captured_per_draw() {
        let (mut rec, _) = recorder();
        rec.bind_targets(RenderTargets::BackBuffer).unwrap();
        let moved = Mat4::from_translation(glam::Vec3::new(1.0, 2.0, 3.0));
        rec.set_world(moved);
        rec.draw_geometry(GeometryId(0), MATERIAL, Technique::PixelLit)
            .unwrap();
        rec.set_world(Mat4::IDENTITY);
        rec.draw_geometry(GeometryId(0), MATERIAL, Technique::PixelLit)
            .unwrap();
        let frame = rec.finish();
        assert_eq!(frame.objects[0].world, moved.to_cols_array_2d());
        assert_eq!(frame.objects[1].world, Mat4::IDENTITY.to_cols_array_2d());
        assert_eq!(
            frame.passes[0].ops[1],
            DrawOp::Geometry {
                geometry: GeometryId(0),
                technique: Technique::PixelLit,
                object: 1
            }
        );
    }

    #[test]
    fn gbuffer_cannot_be_target_and_input() {
        let (mut rec, gbuffer) = recorder();
        rec.bind_targets(RenderTargets::GBuffer(&gbuffer)).unwrap();
        assert!(matches!(
            rec.bind_inputs(Some(&gbuffer)),
            Err(RenderError::GBufferHazard(_))
        ));

        rec.bind_targets(RenderTargets::BackBuffer).unwrap();
        rec.bind_inputs(Some(&gbuffer)).unwrap();
        assert!(matches!(
            rec.bind_targets(RenderTargets::GBuffer(&gbuffer)),
            Err(RenderError::GBufferHazard(_))
        ));
    }

    #[test]
    fn resolve_needs_inputs() {
        let (mut rec, _) = recorder();
        rec.bind_targets(RenderTargets::BackBuffer).unwrap();
        assert!(matches!(
            rec.draw_fullscreen_quad(Technique::AmbientResolve),
            Err(RenderError::GBufferNotBound(Technique::AmbientResolve))
        ));
        assert!(matches!(
            rec.draw_light_points(1, Technique::PointLightAccumulate),
            Err(RenderError::GBufferNotBound(_))
        ));
    }

    #[test]
    fn stale_gbuffer_rejected() {
        let (mut rec, old) = recorder();
        rec.gbuffer_created(GBufferId(1));
        assert!(matches!(
            rec.bind_targets(RenderTargets::GBuffer(&old)),
            Err(RenderError::TargetMismatch(_))
        ));
    }

    #[test]
    fn draws_need_targets() {
        let (mut rec, _) = recorder();
        assert!(rec
            .draw_light_points(1, Technique::LightFlares)
            .is_err());
        assert!(matches!(
            rec.draw_geometry(GeometryId(0), MATERIAL, Technique::LightFlares),
            Err(RenderError::UnsupportedTechnique { .. })
        ));
    }

    #[test]
    fn objects_pack_at_slot_stride() {
        let objects = [
            ObjectUniforms {
                world: Mat4::IDENTITY.to_cols_array_2d(),
                material: [1.0, 2.0, 3.0, 4.0],
            },
            ObjectUniforms {
                world: Mat4::IDENTITY.to_cols_array_2d(),
                material: [5.0, 6.0, 7.0, 8.0],
            },
        ];
        let bytes = pack_objects(&objects);
        assert_eq!(bytes.len(), 2 * OBJECT_SLOT_STRIDE);
        let second: ObjectUniforms = bytemuck::pod_read_unaligned(
            &bytes[OBJECT_SLOT_STRIDE..OBJECT_SLOT_STRIDE + size_of::<ObjectUniforms>()],
        );
        assert_eq!(second.material, [5.0, 6.0, 7.0, 8.0]);
    }
}
