use glam::{Vec3, Vec4};
use lumen_common::Viewport;
use lumen_lights::{LightBufferWriter, LightUploadError, PointLight};
use lumen_mesh::shapes::LitVertex;
use lumen_mesh::{SubMeshData, VertexField, VertexLayout};
use lumen_render::{
    FrameUniforms, GBuffer, GBufferId, GeometryId, RenderBackend, RenderError, RenderTargets,
    TargetKind, Technique,
};
use wgpu::util::DeviceExt;

use crate::frame::{DrawOp, FrameRecorder, OBJECT_SLOT_STRIDE, PassRecord, pack_objects};
use crate::pipelines::{FrameBlock, Layouts, Pipelines};
use crate::targets::{self, GpuGBuffer};

/// Settings for [`WgpuBackend::new`].
#[derive(Debug, Clone, Copy)]
pub struct BackendOptions {
    pub viewport: Viewport,
    /// Maximum number of lights the light buffer holds.
    pub light_capacity: usize,
    pub vsync: bool,
}

struct GpuGeometry {
    vertex_buffer: wgpu::Buffer,
    index_buffer: wgpu::Buffer,
    index_count: u32,
    material: [f32; 4],
}

/// wgpu implementation of [`RenderBackend`], presenting to a window surface.
pub struct WgpuBackend {
    device: wgpu::Device,
    queue: wgpu::Queue,
    surface: wgpu::Surface<'static>,
    config: wgpu::SurfaceConfiguration,
    layouts: Layouts,
    pipelines: Pipelines,
    depth_view: wgpu::TextureView,
    frame_buffer: wgpu::Buffer,
    frame_bind_group: wgpu::BindGroup,
    object_buffer: wgpu::Buffer,
    object_capacity: usize,
    object_bind_group: wgpu::BindGroup,
    light_buffer: wgpu::Buffer,
    light_capacity: usize,
    uploaded_lights: u32,
    flare_bind_group: wgpu::BindGroup,
    gbuffer: Option<GpuGBuffer>,
    next_gbuffer: u32,
    geometry: Vec<GpuGeometry>,
    uniforms: FrameUniforms,
    light_count: u32,
    recorder: FrameRecorder,
}

fn creation_error(what: &'static str, reason: impl ToString) -> RenderError {
    RenderError::ResourceCreation {
        what,
        reason: reason.to_string(),
    }
}

impl WgpuBackend {
    /// Pick an adapter for `surface`, create the device and every
    /// size-independent resource.
    pub async fn new(
        instance: &wgpu::Instance,
        surface: wgpu::Surface<'static>,
        options: BackendOptions,
    ) -> Result<Self, RenderError> {
        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await
            .ok_or_else(|| creation_error("adapter", "no compatible GPU adapter"))?;
        tracing::info!(adapter = ?adapter.get_info().name, "using adapter");

        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: Some("lumen_device"),
                    required_features: wgpu::Features::empty(),
                    required_limits: wgpu::Limits::default(),
                    memory_hints: wgpu::MemoryHints::Performance,
                },
                None,
            )
            .await
            .map_err(|e| creation_error("device", e))?;

        let caps = surface.get_capabilities(&adapter);
        let format = caps
            .formats
            .iter()
            .copied()
            .find(|f| f.is_srgb())
            .or_else(|| caps.formats.first().copied())
            .ok_or_else(|| creation_error("surface", "surface reports no formats"))?;
        let viewport = options.viewport;
        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format,
            width: viewport.width,
            height: viewport.height,
            present_mode: if options.vsync {
                wgpu::PresentMode::AutoVsync
            } else {
                wgpu::PresentMode::AutoNoVsync
            },
            alpha_mode: caps
                .alpha_modes
                .first()
                .copied()
                .unwrap_or(wgpu::CompositeAlphaMode::Auto),
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&device, &config);

        let layouts = Layouts::new(&device);
        let pipelines = Pipelines::new(&device, &layouts, format);

        let frame_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("frame_uniform_buffer"),
            contents: bytemuck::bytes_of(&FrameBlock::new(&FrameUniforms::default(), 0)),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });
        let light_capacity = options.light_capacity.max(1);
        let light_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("light_buffer"),
            size: (light_capacity * PointLight::SIZE) as u64,
            usage: wgpu::BufferUsages::VERTEX
                | wgpu::BufferUsages::STORAGE
                | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let frame_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("frame_bind_group"),
            layout: &layouts.frame,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: frame_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: light_buffer.as_entire_binding(),
                },
            ],
        });

        let object_capacity = 64;
        let (object_buffer, object_bind_group) =
            Self::create_object_slots(&device, &layouts, object_capacity);

        let flare_view = targets::create_flare_texture(&device, &queue);
        let flare_sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("flare_sampler"),
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            ..Default::default()
        });
        let flare_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("flare_bind_group"),
            layout: &layouts.flare,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(&flare_view),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::Sampler(&flare_sampler),
                },
            ],
        });

        let depth_view = targets::create_depth_texture(&device, viewport);

        Ok(Self {
            device,
            queue,
            surface,
            config,
            layouts,
            pipelines,
            depth_view,
            frame_buffer,
            frame_bind_group,
            object_buffer,
            object_capacity,
            object_bind_group,
            light_buffer,
            light_capacity: options.light_capacity,
            uploaded_lights: 0,
            flare_bind_group,
            gbuffer: None,
            next_gbuffer: 0,
            geometry: Vec::new(),
            uniforms: FrameUniforms::default(),
            light_count: 0,
            recorder: FrameRecorder::new(viewport),
        })
    }

    fn create_object_slots(
        device: &wgpu::Device,
        layouts: &Layouts,
        capacity: usize,
    ) -> (wgpu::Buffer, wgpu::BindGroup) {
        let buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("object_uniform_buffer"),
            size: (capacity * OBJECT_SLOT_STRIDE) as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("object_bind_group"),
            layout: &layouts.object,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: wgpu::BindingResource::Buffer(wgpu::BufferBinding {
                    buffer: &buffer,
                    offset: 0,
                    size: wgpu::BufferSize::new(size_of::<crate::frame::ObjectUniforms>() as u64),
                }),
            }],
        });
        (buffer, bind_group)
    }

    /// Reconfigure the surface and depth buffer. The G-buffer is recreated
    /// by the sequencer on its next frame.
    pub fn resize(&mut self, viewport: Viewport) {
        if viewport.width == self.config.width && viewport.height == self.config.height {
            return;
        }
        self.config.width = viewport.width;
        self.config.height = viewport.height;
        self.surface.configure(&self.device, &self.config);
        self.depth_view = targets::create_depth_texture(&self.device, viewport);
        tracing::debug!(
            width = viewport.width,
            height = viewport.height,
            "surface resized"
        );
    }

    pub fn surface_format(&self) -> wgpu::TextureFormat {
        self.config.format
    }

    fn grow_object_slots(&mut self, needed: usize) {
        if needed <= self.object_capacity {
            return;
        }
        let capacity = needed.next_power_of_two();
        let (buffer, bind_group) = Self::create_object_slots(&self.device, &self.layouts, capacity);
        self.object_buffer = buffer;
        self.object_bind_group = bind_group;
        self.object_capacity = capacity;
        tracing::debug!(capacity, "object uniform slots grown");
    }

    fn gbuffer_for(&self, id: GBufferId) -> Result<&GpuGBuffer, RenderError> {
        self.gbuffer
            .as_ref()
            .filter(|g| g.handle.id() == id)
            .ok_or_else(|| RenderError::TargetMismatch(format!("G-buffer {id:?} is not live")))
    }

    fn encode_pass(
        &self,
        encoder: &mut wgpu::CommandEncoder,
        back_buffer: &wgpu::TextureView,
        record: &PassRecord,
    ) -> Result<(), RenderError> {
        let color_ops = |clear: Option<wgpu::Color>| wgpu::Operations {
            load: clear.map_or(wgpu::LoadOp::Load, wgpu::LoadOp::Clear),
            store: wgpu::StoreOp::Store,
        };
        let attachments: Vec<Option<wgpu::RenderPassColorAttachment<'_>>> = match record.target {
            TargetKind::BackBuffer => vec![Some(wgpu::RenderPassColorAttachment {
                view: back_buffer,
                resolve_target: None,
                ops: color_ops(record.clear_color.map(|c| wgpu::Color {
                    r: c.x as f64,
                    g: c.y as f64,
                    b: c.z as f64,
                    a: c.w as f64,
                })),
            })],
            TargetKind::GBuffer(id) => {
                let gbuffer = self.gbuffer_for(id)?;
                let clear = record.clear_gbuffer.then_some(wgpu::Color::TRANSPARENT);
                gbuffer
                    .views
                    .iter()
                    .map(|view| {
                        Some(wgpu::RenderPassColorAttachment {
                            view,
                            resolve_target: None,
                            ops: color_ops(clear),
                        })
                    })
                    .collect()
            }
        };

        let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some(match record.target {
                TargetKind::BackBuffer => "back_buffer_pass",
                TargetKind::GBuffer(_) => "gbuffer_pass",
            }),
            color_attachments: &attachments,
            depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                view: &self.depth_view,
                depth_ops: Some(wgpu::Operations {
                    load: record
                        .clear_depth
                        .map_or(wgpu::LoadOp::Load, wgpu::LoadOp::Clear),
                    store: wgpu::StoreOp::Store,
                }),
                stencil_ops: None,
            }),
            ..Default::default()
        });

        let set_viewport = |pass: &mut wgpu::RenderPass<'_>, viewport: Viewport| {
            let width = viewport.width.min(self.config.width) as f32;
            let height = viewport.height.min(self.config.height) as f32;
            pass.set_viewport(0.0, 0.0, width, height, 0.0, 1.0);
        };
        set_viewport(&mut pass, record.viewport);
        pass.set_bind_group(0, &self.frame_bind_group, &[]);

        for op in &record.ops {
            match *op {
                DrawOp::SetViewport(viewport) => set_viewport(&mut pass, viewport),
                DrawOp::Geometry {
                    geometry,
                    technique,
                    object,
                } => {
                    let mesh = self
                        .geometry
                        .get(geometry.0 as usize)
                        .ok_or(RenderError::UnknownGeometry(geometry))?;
                    pass.set_pipeline(self.pipelines.get(technique));
                    let offset = object * OBJECT_SLOT_STRIDE as u32;
                    pass.set_bind_group(1, &self.object_bind_group, &[offset]);
                    pass.set_vertex_buffer(0, mesh.vertex_buffer.slice(..));
                    pass.set_index_buffer(mesh.index_buffer.slice(..), wgpu::IndexFormat::Uint16);
                    pass.draw_indexed(0..mesh.index_count, 0, 0..1);
                }
                DrawOp::FullscreenQuad { technique, inputs } => {
                    let gbuffer = self.gbuffer_for(inputs)?;
                    pass.set_pipeline(self.pipelines.get(technique));
                    pass.set_bind_group(1, &gbuffer.bind_group, &[]);
                    pass.draw(0..4, 0..1);
                }
                DrawOp::LightPoints {
                    count,
                    technique,
                    inputs,
                } => {
                    let count = count.min(self.uploaded_lights);
                    if count == 0 {
                        continue;
                    }
                    pass.set_pipeline(self.pipelines.get(technique));
                    match inputs {
                        Some(id) => pass.set_bind_group(1, &self.gbuffer_for(id)?.bind_group, &[]),
                        None => pass.set_bind_group(1, &self.flare_bind_group, &[]),
                    }
                    let bytes = count as u64 * PointLight::SIZE as u64;
                    pass.set_vertex_buffer(0, self.light_buffer.slice(..bytes));
                    pass.draw(0..4, 0..count);
                }
            }
        }
        Ok(())
    }
}

/// Interleave an arbitrary sub-mesh into the lit vertex format.
fn lit_vertices(sub_mesh: &SubMeshData) -> Result<Vec<u8>, RenderError> {
    if *sub_mesh.layout() == VertexLayout::lit() {
        return Ok(sub_mesh.vertex_bytes().to_vec());
    }
    let has_normal = sub_mesh.layout().contains(VertexField::Normal);
    let vertices = (0..sub_mesh.num_vertices())
        .map(|v| {
            let position = sub_mesh.read_vec3(v, VertexField::Position)?;
            let normal = if has_normal {
                sub_mesh.read_vec3(v, VertexField::Normal)?
            } else {
                Vec3::Y
            };
            Ok(LitVertex {
                position: position.to_array(),
                normal: normal.to_array(),
                uv: [0.0; 2],
            })
        })
        .collect::<Result<Vec<_>, lumen_mesh::MeshError>>()?;
    Ok(bytemuck::cast_slice(&vertices).to_vec())
}

impl LightBufferWriter for WgpuBackend {
    fn write_lights(&mut self, lights: &[PointLight]) -> Result<(), LightUploadError> {
        if lights.len() > self.light_capacity {
            return Err(LightUploadError::CapacityExceeded {
                count: lights.len(),
                capacity: self.light_capacity,
            });
        }
        if !lights.is_empty() {
            self.queue
                .write_buffer(&self.light_buffer, 0, bytemuck::cast_slice(lights));
        }
        self.uploaded_lights = lights.len() as u32;
        Ok(())
    }
}

impl RenderBackend for WgpuBackend {
    fn viewport(&self) -> Viewport {
        Viewport::new(self.config.width, self.config.height)
    }

    fn create_gbuffer(&mut self, viewport: Viewport) -> Result<GBuffer, RenderError> {
        let current = self.viewport();
        if viewport != current {
            return Err(creation_error(
                "G-buffer",
                format!(
                    "{}x{} does not match the {}x{} surface",
                    viewport.width, viewport.height, current.width, current.height
                ),
            ));
        }
        let handle = GBuffer::new(GBufferId(self.next_gbuffer), viewport);
        self.next_gbuffer += 1;
        self.gbuffer = Some(GpuGBuffer::new(
            &self.device,
            &self.layouts.gbuffer,
            handle.clone(),
        ));
        self.recorder.gbuffer_created(handle.id());
        Ok(handle)
    }

    fn upload_sub_mesh(&mut self, sub_mesh: &SubMeshData) -> Result<GeometryId, RenderError> {
        let vertices = lit_vertices(sub_mesh)?;
        let vertex_buffer = self
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("mesh_vertex_buffer"),
                contents: &vertices,
                usage: wgpu::BufferUsages::VERTEX,
            });
        // Index buffers must be a multiple of 4 bytes
        let mut indices = sub_mesh.indices().to_vec();
        if indices.len() % 2 == 1 {
            indices.push(0);
        }
        let index_buffer = self
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("mesh_index_buffer"),
                contents: bytemuck::cast_slice(&indices),
                usage: wgpu::BufferUsages::INDEX,
            });
        let material = sub_mesh.material();
        let id = GeometryId(self.geometry.len() as u32);
        self.geometry.push(GpuGeometry {
            vertex_buffer,
            index_buffer,
            index_count: sub_mesh.indices().len() as u32,
            material: material.diffuse.extend(material.specular).to_array(),
        });
        Ok(id)
    }

    fn set_frame_uniforms(&mut self, uniforms: &FrameUniforms) {
        self.uniforms = *uniforms;
    }

    fn set_viewport(&mut self, viewport: Viewport) {
        self.recorder.set_viewport(viewport);
    }

    fn clear_back_buffer(&mut self, color: Vec4) {
        self.recorder.clear_back_buffer(color);
    }

    fn clear_depth(&mut self, depth: f32) {
        self.recorder.clear_depth(depth);
    }

    fn bind_targets(&mut self, targets: RenderTargets<'_>) -> Result<(), RenderError> {
        self.recorder.bind_targets(targets)
    }

    fn bind_gbuffer_inputs(&mut self, gbuffer: Option<&GBuffer>) -> Result<(), RenderError> {
        self.recorder.bind_inputs(gbuffer)
    }

    fn set_light_count(&mut self, count: u32) {
        self.light_count = count;
    }

    fn set_world_matrix(&mut self, world: glam::Mat4) {
        self.recorder.set_world(world);
    }

    fn draw_geometry(
        &mut self,
        geometry: GeometryId,
        technique: Technique,
    ) -> Result<(), RenderError> {
        let material = self
            .geometry
            .get(geometry.0 as usize)
            .ok_or(RenderError::UnknownGeometry(geometry))?
            .material;
        self.recorder.draw_geometry(geometry, material, technique)
    }

    fn draw_fullscreen_quad(&mut self, technique: Technique) -> Result<(), RenderError> {
        self.recorder.draw_fullscreen_quad(technique)
    }

    fn draw_light_points(&mut self, count: u32, technique: Technique) -> Result<(), RenderError> {
        self.recorder.draw_light_points(count, technique)
    }

    fn present(&mut self) -> Result<(), RenderError> {
        let frame = self.recorder.finish();

        let output = match self.surface.get_current_texture() {
            Ok(texture) => texture,
            Err(e) => {
                if matches!(e, wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) {
                    self.surface.configure(&self.device, &self.config);
                }
                return Err(surface_error(e));
            }
        };
        let view = output
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        let light_count = self.light_count.min(self.uploaded_lights);
        self.queue.write_buffer(
            &self.frame_buffer,
            0,
            bytemuck::bytes_of(&FrameBlock::new(&self.uniforms, light_count)),
        );
        self.grow_object_slots(frame.objects.len());
        if !frame.objects.is_empty() {
            self.queue
                .write_buffer(&self.object_buffer, 0, &pack_objects(&frame.objects));
        }

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("frame_encoder"),
            });
        for record in &frame.passes {
            self.encode_pass(&mut encoder, &view, record)?;
        }
        self.queue.submit(std::iter::once(encoder.finish()));
        output.present();
        Ok(())
    }
}

/// Lost, outdated and timed-out surfaces drop one frame. Running out of
/// memory is fatal.
fn surface_error(err: wgpu::SurfaceError) -> RenderError {
    match err {
        wgpu::SurfaceError::OutOfMemory => {
            RenderError::OutOfMemory("acquiring the surface texture")
        }
        wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated => {
            RenderError::Surface("surface lost, reconfigured".into())
        }
        other => RenderError::Surface(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn out_of_memory_is_not_a_dropped_frame() {
        assert!(matches!(
            surface_error(wgpu::SurfaceError::OutOfMemory),
            RenderError::OutOfMemory(_)
        ));
    }

    #[test]
    fn transient_surface_errors_drop_the_frame() {
        for err in [
            wgpu::SurfaceError::Lost,
            wgpu::SurfaceError::Outdated,
            wgpu::SurfaceError::Timeout,
        ] {
            assert!(matches!(surface_error(err), RenderError::Surface(_)));
        }
    }
}
