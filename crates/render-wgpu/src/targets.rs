//! Textures owned by the backend: depth, G-buffer and the flare sprite.

use lumen_common::Viewport;
use lumen_render::{GBuffer, GBufferSlot};
use wgpu::util::DeviceExt;

pub(crate) const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;

/// G-buffer formats in [`GBufferSlot`] order. Positions keep full precision;
/// the three together stay within the 32-byte colour attachment budget.
pub(crate) const GBUFFER_FORMATS: [wgpu::TextureFormat; 3] = [
    wgpu::TextureFormat::Rgba8Unorm,
    wgpu::TextureFormat::Rgba16Float,
    wgpu::TextureFormat::Rgba32Float,
];

pub(crate) const FLARE_SIZE: u32 = 64;

fn extent(viewport: Viewport) -> wgpu::Extent3d {
    wgpu::Extent3d {
        width: viewport.width,
        height: viewport.height,
        depth_or_array_layers: 1,
    }
}

pub(crate) fn create_depth_texture(device: &wgpu::Device, viewport: Viewport) -> wgpu::TextureView {
    let texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some("depth_texture"),
        size: extent(viewport),
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: DEPTH_FORMAT,
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
        view_formats: &[],
    });
    texture.create_view(&wgpu::TextureViewDescriptor::default())
}

/// G-buffer textures plus the bind group that exposes them to the
/// lighting passes.
pub(crate) struct GpuGBuffer {
    pub handle: GBuffer,
    pub views: [wgpu::TextureView; 3],
    pub bind_group: wgpu::BindGroup,
}

impl GpuGBuffer {
    pub fn new(device: &wgpu::Device, layout: &wgpu::BindGroupLayout, handle: GBuffer) -> Self {
        let size = extent(handle.viewport());
        let views = GBufferSlot::ALL.map(|slot| {
            let texture = device.create_texture(&wgpu::TextureDescriptor {
                label: Some(match slot {
                    GBufferSlot::DiffuseSpecular => "gbuffer_diffuse_specular",
                    GBufferSlot::WorldNormal => "gbuffer_world_normal",
                    GBufferSlot::WorldPosition => "gbuffer_world_position",
                }),
                size,
                mip_level_count: 1,
                sample_count: 1,
                dimension: wgpu::TextureDimension::D2,
                format: GBUFFER_FORMATS[slot.index()],
                usage: wgpu::TextureUsages::RENDER_ATTACHMENT
                    | wgpu::TextureUsages::TEXTURE_BINDING,
                view_formats: &[],
            });
            texture.create_view(&wgpu::TextureViewDescriptor::default())
        });
        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("gbuffer_bind_group"),
            layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(&views[0]),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::TextureView(&views[1]),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: wgpu::BindingResource::TextureView(&views[2]),
                },
            ],
        });
        Self {
            handle,
            views,
            bind_group,
        }
    }
}

/// Single-channel radial glow, bright in the middle and zero at the rim.
pub(crate) fn flare_pixels(size: u32) -> Vec<u8> {
    let half = size as f32 * 0.5;
    let mut pixels = Vec::with_capacity((size * size * 4) as usize);
    for y in 0..size {
        for x in 0..size {
            let dx = (x as f32 + 0.5 - half) / half;
            let dy = (y as f32 + 0.5 - half) / half;
            let falloff = (1.0 - (dx * dx + dy * dy).sqrt()).max(0.0);
            let value = (falloff * falloff * 255.0).round() as u8;
            pixels.extend_from_slice(&[value, value, value, 255]);
        }
    }
    pixels
}

pub(crate) fn create_flare_texture(device: &wgpu::Device, queue: &wgpu::Queue) -> wgpu::TextureView {
    let texture = device.create_texture_with_data(
        queue,
        &wgpu::TextureDescriptor {
            label: Some("flare_texture"),
            size: wgpu::Extent3d {
                width: FLARE_SIZE,
                height: FLARE_SIZE,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu::TextureFormat::Rgba8Unorm,
            usage: wgpu::TextureUsages::TEXTURE_BINDING,
            view_formats: &[],
        },
        wgpu::util::TextureDataOrder::LayerMajor,
        &flare_pixels(FLARE_SIZE),
    );
    texture.create_view(&wgpu::TextureViewDescriptor::default())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flare_peaks_in_the_centre() {
        let size = 16;
        let pixels = flare_pixels(size);
        assert_eq!(pixels.len(), (size * size * 4) as usize);
        let at = |x: u32, y: u32| pixels[((y * size + x) * 4) as usize];
        assert_eq!(at(0, 0), 0);
        assert!(at(8, 8) > 200);
        assert!(at(8, 8) > at(12, 8));
    }

    #[test]
    fn gbuffer_fits_attachment_budget() {
        let bytes: u32 = GBUFFER_FORMATS
            .iter()
            .filter_map(|f| f.block_copy_size(None))
            .sum();
        assert!(bytes <= 32);
    }
}
