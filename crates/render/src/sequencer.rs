use glam::{Vec3, Vec4};
use lumen_camera::Camera;
use lumen_common::{RenderMode, Viewport};
use lumen_lights::PointLight;

use crate::backend::{FrameUniforms, GBuffer, RenderBackend, RenderTargets, Technique};
use crate::error::RenderError;
use crate::mesh::RenderableMesh;

/// Everything one frame reads.
pub struct FrameInput<'a> {
    pub camera: &'a Camera,
    pub mode: RenderMode,
    /// The live light prefix; uploaded in full every frame.
    pub lights: &'a [PointLight],
    /// Lit scene geometry, drawn forward or through the G-buffer.
    pub opaque: &'a [&'a dyn RenderableMesh],
    /// Backdrop drawn forward with ambient only, after the lighting passes.
    pub background: &'a [&'a dyn RenderableMesh],
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameReport {
    pub mode: RenderMode,
    pub light_count: usize,
    pub draw_calls: usize,
}

/// Orders the passes of a frame and owns the G-buffer.
///
/// A deferred frame always fills the G-buffer before reading it, so a mode
/// switch can never resolve stale contents. The G-buffer is unbound as an
/// input before the frame ends.
#[derive(Debug)]
pub struct RenderSequencer {
    gbuffer: GBuffer,
    ambient_color: Vec3,
    clear_color: Vec4,
    frame_index: u64,
}

impl RenderSequencer {
    /// Allocate a G-buffer matching the backend's viewport.
    pub fn new(backend: &mut dyn RenderBackend, ambient_color: Vec3) -> Result<Self, RenderError> {
        let viewport = backend.viewport();
        let gbuffer = backend.create_gbuffer(viewport)?;
        tracing::debug!(
            width = viewport.width,
            height = viewport.height,
            "G-buffer allocated"
        );
        Ok(Self {
            gbuffer,
            ambient_color,
            clear_color: Vec4::new(0.0, 0.0, 0.0, 1.0),
            frame_index: 0,
        })
    }

    pub fn gbuffer(&self) -> &GBuffer {
        &self.gbuffer
    }

    pub fn ambient_color(&self) -> Vec3 {
        self.ambient_color
    }

    pub fn set_ambient_color(&mut self, color: Vec3) {
        self.ambient_color = color;
    }

    pub fn frame_index(&self) -> u64 {
        self.frame_index
    }

    /// Reallocate the G-buffer if `viewport` differs from its current size.
    pub fn resize(
        &mut self,
        backend: &mut dyn RenderBackend,
        viewport: Viewport,
    ) -> Result<(), RenderError> {
        if self.gbuffer.viewport() != viewport {
            self.gbuffer = backend.create_gbuffer(viewport)?;
            tracing::debug!(
                width = viewport.width,
                height = viewport.height,
                "G-buffer reallocated"
            );
        }
        Ok(())
    }

    /// Render and present one frame.
    ///
    /// On error the frame is abandoned without presenting.
    pub fn render_frame(
        &mut self,
        backend: &mut dyn RenderBackend,
        frame: &FrameInput<'_>,
    ) -> Result<FrameReport, RenderError> {
        let _span = tracing::info_span!("render_frame", frame = self.frame_index).entered();

        let viewport = backend.viewport();
        self.resize(backend, viewport)?;

        // Frame constants, viewport and lights
        let uniforms = FrameUniforms::mono(frame.camera, self.ambient_color, viewport);
        backend.set_frame_uniforms(&uniforms);
        backend.set_viewport(viewport);
        backend.write_lights(frame.lights)?;
        let light_count = frame.lights.len() as u32;
        backend.set_light_count(light_count);

        backend.clear_back_buffer(self.clear_color);
        backend.clear_depth(1.0);

        let mut draw_calls = 0;
        match frame.mode {
            RenderMode::Forward => {
                backend.bind_targets(RenderTargets::BackBuffer)?;
                for mesh in frame.opaque {
                    draw_calls += mesh.render(backend, Technique::PixelLit)?;
                }
            }
            RenderMode::Deferred => {
                draw_calls += self.deferred_passes(backend, frame.opaque, light_count)?;
            }
        }

        for mesh in frame.background {
            draw_calls += mesh.render(backend, Technique::Background)?;
        }

        // Transparent sprites go last
        backend.draw_light_points(light_count, Technique::LightFlares)?;
        draw_calls += 1;

        backend.present()?;
        self.frame_index += 1;
        tracing::trace!(lights = light_count, draw_calls, "frame presented");

        Ok(FrameReport {
            mode: frame.mode,
            light_count: frame.lights.len(),
            draw_calls,
        })
    }

    fn deferred_passes(
        &self,
        backend: &mut dyn RenderBackend,
        opaque: &[&dyn RenderableMesh],
        light_count: u32,
    ) -> Result<usize, RenderError> {
        let mut draw_calls = 0;

        backend.bind_targets(RenderTargets::GBuffer(&self.gbuffer))?;
        for mesh in opaque {
            draw_calls += mesh.render(backend, Technique::GBufferFill)?;
        }

        backend.bind_targets(RenderTargets::BackBuffer)?;
        backend.bind_gbuffer_inputs(Some(&self.gbuffer))?;

        backend.draw_fullscreen_quad(Technique::AmbientResolve)?;
        backend.draw_light_points(light_count, Technique::PointLightAccumulate)?;
        draw_calls += 2;

        backend.bind_gbuffer_inputs(None)?;
        Ok(draw_calls)
    }
}
