//! Bind group layouts and one render pipeline per technique.

use bytemuck::{Pod, Zeroable};
use lumen_lights::PointLight;
use lumen_mesh::shapes::LitVertex;
use lumen_render::{FrameUniforms, Technique};

use crate::shaders;
use crate::targets::{DEPTH_FORMAT, GBUFFER_FORMATS};

/// GPU image of [`FrameUniforms`] plus the live light count.
#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, Pod, Zeroable)]
pub(crate) struct FrameBlock {
    view: [[f32; 4]; 4],
    inverse_view: [[f32; 4]; 4],
    projection: [[f32; 4]; 4],
    view_projection: [[f32; 4]; 4],
    camera_position: [f32; 3],
    near_clip: f32,
    ambient_color: [f32; 3],
    light_count: u32,
    viewport_size: [f32; 2],
    _pad: [f32; 2],
}

impl FrameBlock {
    pub fn new(uniforms: &FrameUniforms, light_count: u32) -> Self {
        Self {
            view: uniforms.view.to_cols_array_2d(),
            inverse_view: uniforms.inverse_view.to_cols_array_2d(),
            projection: uniforms.projection.to_cols_array_2d(),
            view_projection: uniforms.view_projection.to_cols_array_2d(),
            camera_position: uniforms.camera_position.to_array(),
            near_clip: uniforms.near_clip,
            ambient_color: uniforms.ambient_color.to_array(),
            light_count,
            viewport_size: [
                uniforms.viewport.width as f32,
                uniforms.viewport.height as f32,
            ],
            _pad: [0.0; 2],
        }
    }
}

pub(crate) struct Layouts {
    /// Frame uniforms and the light storage buffer.
    pub frame: wgpu::BindGroupLayout,
    /// Per-draw world matrix and material, dynamic offset.
    pub object: wgpu::BindGroupLayout,
    pub gbuffer: wgpu::BindGroupLayout,
    pub flare: wgpu::BindGroupLayout,
}

impl Layouts {
    pub fn new(device: &wgpu::Device) -> Self {
        let frame = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("frame_bind_group_layout"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Storage { read_only: true },
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
            ],
        });

        let object = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("object_bind_group_layout"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: true,
                    min_binding_size: wgpu::BufferSize::new(
                        size_of::<crate::frame::ObjectUniforms>() as u64,
                    ),
                },
                count: None,
            }],
        });

        let gbuffer_entry = |binding| wgpu::BindGroupLayoutEntry {
            binding,
            visibility: wgpu::ShaderStages::FRAGMENT,
            ty: wgpu::BindingType::Texture {
                sample_type: wgpu::TextureSampleType::Float { filterable: false },
                view_dimension: wgpu::TextureViewDimension::D2,
                multisampled: false,
            },
            count: None,
        };
        let gbuffer = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("gbuffer_bind_group_layout"),
            entries: &[gbuffer_entry(0), gbuffer_entry(1), gbuffer_entry(2)],
        });

        let flare = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("flare_bind_group_layout"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
            ],
        });

        Self {
            frame,
            object,
            gbuffer,
            flare,
        }
    }
}

const ADDITIVE: wgpu::BlendState = wgpu::BlendState {
    color: wgpu::BlendComponent {
        src_factor: wgpu::BlendFactor::One,
        dst_factor: wgpu::BlendFactor::One,
        operation: wgpu::BlendOperation::Add,
    },
    alpha: wgpu::BlendComponent {
        src_factor: wgpu::BlendFactor::Zero,
        dst_factor: wgpu::BlendFactor::One,
        operation: wgpu::BlendOperation::Add,
    },
};

const MESH_ATTRIBUTES: [wgpu::VertexAttribute; 3] = wgpu::vertex_attr_array![
    0 => Float32x3,
    1 => Float32x3,
    2 => Float32x2,
];

const LIGHT_ATTRIBUTES: [wgpu::VertexAttribute; 3] = wgpu::vertex_attr_array![
    0 => Float32x3,
    1 => Float32,
    2 => Float32x4,
];

fn mesh_vertex_layout() -> wgpu::VertexBufferLayout<'static> {
    wgpu::VertexBufferLayout {
        array_stride: size_of::<LitVertex>() as u64,
        step_mode: wgpu::VertexStepMode::Vertex,
        attributes: &MESH_ATTRIBUTES,
    }
}

/// Lights are read straight from the light buffer, one instance each.
fn light_instance_layout() -> wgpu::VertexBufferLayout<'static> {
    wgpu::VertexBufferLayout {
        array_stride: PointLight::SIZE as u64,
        step_mode: wgpu::VertexStepMode::Instance,
        attributes: &LIGHT_ATTRIBUTES,
    }
}

/// Depth state for a pipeline. Every pass carries the depth attachment, so
/// every pipeline declares it even when it neither tests nor writes.
fn depth(write: bool, compare: wgpu::CompareFunction) -> Option<wgpu::DepthStencilState> {
    Some(wgpu::DepthStencilState {
        format: DEPTH_FORMAT,
        depth_write_enabled: write,
        depth_compare: compare,
        stencil: Default::default(),
        bias: Default::default(),
    })
}

struct PipelineDesc<'a> {
    label: &'static str,
    layout: &'a wgpu::PipelineLayout,
    module: &'a wgpu::ShaderModule,
    vs: &'static str,
    fs: &'static str,
    buffers: &'a [wgpu::VertexBufferLayout<'static>],
    targets: &'a [Option<wgpu::ColorTargetState>],
    topology: wgpu::PrimitiveTopology,
    cull_back: bool,
    depth: Option<wgpu::DepthStencilState>,
}

fn create_pipeline(device: &wgpu::Device, desc: PipelineDesc<'_>) -> wgpu::RenderPipeline {
    device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some(desc.label),
        layout: Some(desc.layout),
        vertex: wgpu::VertexState {
            module: desc.module,
            entry_point: Some(desc.vs),
            compilation_options: Default::default(),
            buffers: desc.buffers,
        },
        fragment: Some(wgpu::FragmentState {
            module: desc.module,
            entry_point: Some(desc.fs),
            compilation_options: Default::default(),
            targets: desc.targets,
        }),
        primitive: wgpu::PrimitiveState {
            topology: desc.topology,
            // Mesh faces are clockwise on screen
            front_face: wgpu::FrontFace::Cw,
            cull_mode: desc.cull_back.then_some(wgpu::Face::Back),
            ..Default::default()
        },
        depth_stencil: desc.depth,
        multisample: Default::default(),
        multiview: None,
        cache: None,
    })
}

pub(crate) struct Pipelines {
    pixel_lit: wgpu::RenderPipeline,
    background: wgpu::RenderPipeline,
    gbuffer_fill: wgpu::RenderPipeline,
    ambient_resolve: wgpu::RenderPipeline,
    light_accumulate: wgpu::RenderPipeline,
    light_flares: wgpu::RenderPipeline,
}

impl Pipelines {
    pub fn new(
        device: &wgpu::Device,
        layouts: &Layouts,
        surface_format: wgpu::TextureFormat,
    ) -> Self {
        let module = |label: &'static str, body: &str| {
            device.create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some(label),
                source: wgpu::ShaderSource::Wgsl(shaders::module_source(body).into()),
            })
        };
        let mesh_shader = module("mesh_shader", shaders::MESH_SHADER);
        let resolve_shader = module("resolve_shader", shaders::RESOLVE_SHADER);
        let flare_shader = module("flare_shader", shaders::FLARE_SHADER);

        let pipeline_layout = |label: &'static str, second: &wgpu::BindGroupLayout| {
            device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some(label),
                bind_group_layouts: &[&layouts.frame, second],
                push_constant_ranges: &[],
            })
        };
        let mesh_layout = pipeline_layout("mesh_pipeline_layout", &layouts.object);
        let resolve_layout = pipeline_layout("resolve_pipeline_layout", &layouts.gbuffer);
        let flare_layout = pipeline_layout("flare_pipeline_layout", &layouts.flare);

        let opaque = [Some(wgpu::ColorTargetState {
            format: surface_format,
            blend: Some(wgpu::BlendState::REPLACE),
            write_mask: wgpu::ColorWrites::ALL,
        })];
        let additive = [Some(wgpu::ColorTargetState {
            format: surface_format,
            blend: Some(ADDITIVE),
            write_mask: wgpu::ColorWrites::ALL,
        })];
        let gbuffer_targets = GBUFFER_FORMATS.map(|format| {
            Some(wgpu::ColorTargetState {
                format,
                blend: None,
                write_mask: wgpu::ColorWrites::ALL,
            })
        });

        let pixel_lit = create_pipeline(device, PipelineDesc {
            label: "pixel_lit_pipeline",
            layout: &mesh_layout,
            module: &mesh_shader,
            vs: "vs_mesh",
            fs: "fs_pixel_lit",
            buffers: &[mesh_vertex_layout()],
            targets: &opaque,
            topology: wgpu::PrimitiveTopology::TriangleList,
            cull_back: true,
            depth: depth(true, wgpu::CompareFunction::Less),
        });
        let background = create_pipeline(device, PipelineDesc {
            label: "background_pipeline",
            layout: &mesh_layout,
            module: &mesh_shader,
            vs: "vs_mesh",
            fs: "fs_background",
            buffers: &[mesh_vertex_layout()],
            targets: &opaque,
            topology: wgpu::PrimitiveTopology::TriangleList,
            cull_back: true,
            depth: depth(true, wgpu::CompareFunction::Less),
        });
        let gbuffer_fill = create_pipeline(device, PipelineDesc {
            label: "gbuffer_fill_pipeline",
            layout: &mesh_layout,
            module: &mesh_shader,
            vs: "vs_mesh",
            fs: "fs_gbuffer",
            buffers: &[mesh_vertex_layout()],
            targets: &gbuffer_targets,
            topology: wgpu::PrimitiveTopology::TriangleList,
            cull_back: true,
            depth: depth(true, wgpu::CompareFunction::Less),
        });
        let ambient_resolve = create_pipeline(device, PipelineDesc {
            label: "ambient_resolve_pipeline",
            layout: &resolve_layout,
            module: &resolve_shader,
            vs: "vs_fullscreen",
            fs: "fs_ambient",
            buffers: &[],
            targets: &opaque,
            topology: wgpu::PrimitiveTopology::TriangleStrip,
            cull_back: false,
            depth: depth(false, wgpu::CompareFunction::Always),
        });
        let light_accumulate = create_pipeline(device, PipelineDesc {
            label: "light_accumulate_pipeline",
            layout: &resolve_layout,
            module: &resolve_shader,
            vs: "vs_light",
            fs: "fs_light",
            buffers: &[light_instance_layout()],
            targets: &additive,
            topology: wgpu::PrimitiveTopology::TriangleStrip,
            cull_back: false,
            depth: depth(false, wgpu::CompareFunction::Always),
        });
        let light_flares = create_pipeline(device, PipelineDesc {
            label: "light_flare_pipeline",
            layout: &flare_layout,
            module: &flare_shader,
            vs: "vs_flare",
            fs: "fs_flare",
            buffers: &[light_instance_layout()],
            targets: &additive,
            topology: wgpu::PrimitiveTopology::TriangleStrip,
            cull_back: false,
            depth: depth(false, wgpu::CompareFunction::LessEqual),
        });

        Self {
            pixel_lit,
            background,
            gbuffer_fill,
            ambient_resolve,
            light_accumulate,
            light_flares,
        }
    }

    pub fn get(&self, technique: Technique) -> &wgpu::RenderPipeline {
        match technique {
            Technique::PixelLit => &self.pixel_lit,
            Technique::Background => &self.background,
            Technique::GBufferFill => &self.gbuffer_fill,
            Technique::AmbientResolve => &self.ambient_resolve,
            Technique::PointLightAccumulate => &self.light_accumulate,
            Technique::LightFlares => &self.light_flares,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_block_matches_wgsl_layout() {
        // 4 matrices + 3 vec4-sized rows
        assert_eq!(size_of::<FrameBlock>(), 4 * 64 + 3 * 16);
    }

    #[test]
    fn frame_block_carries_light_count() {
        let block = FrameBlock::new(&FrameUniforms::default(), 7);
        assert_eq!(block.light_count, 7);
        assert_eq!(block.near_clip, 1.0);
    }

    #[test]
    fn light_instance_stride_matches_point_light() {
        assert_eq!(light_instance_layout().array_stride, 32);
        assert_eq!(mesh_vertex_layout().array_stride, 32);
    }
}
