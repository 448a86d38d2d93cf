use crate::coords::{VRAM_HEIGHT, VRAM_WIDTH};
use crate::error::RendererError;

pub(super) const NATIVE_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::R16Uint;
pub(super) const TARGET_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;
pub(super) const ORDER_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;

/// Largest scale whose render target fits the device's texture limit.
pub(super) fn max_scale(device: &wgpu::Device) -> u32 {
    device.limits().max_texture_dimension_2d / VRAM_WIDTH as u32
}

fn texture(
    device: &wgpu::Device,
    label: &'static str,
    width: u32,
    height: u32,
    format: wgpu::TextureFormat,
    usage: wgpu::TextureUsages,
) -> (wgpu::Texture, wgpu::TextureView) {
    let texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some(label),
        size: wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format,
        usage,
        view_formats: &[],
    });
    let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
    (texture, view)
}

/// Upscaled render target with its order buffer.
pub(super) struct RenderTarget {
    _color: wgpu::Texture,
    pub color_view: wgpu::TextureView,
    pub order_view: wgpu::TextureView,
    _order: wgpu::Texture,
    pub scale: u32,
}

impl RenderTarget {
    pub fn new(device: &wgpu::Device, scale: u32) -> Result<Self, RendererError> {
        let limit = device.limits().max_texture_dimension_2d;
        let width = VRAM_WIDTH as u32 * scale;
        let height = VRAM_HEIGHT as u32 * scale;
        if scale == 0 || width > limit || height > limit {
            return Err(RendererError::UnsupportedCapability(format!(
                "{scale}x render target ({width}x{height}) exceeds the device texture limit {limit}"
            )));
        }

        let (color, color_view) = texture(
            device,
            "ember render target",
            width,
            height,
            TARGET_FORMAT,
            wgpu::TextureUsages::RENDER_ATTACHMENT
                | wgpu::TextureUsages::TEXTURE_BINDING
                | wgpu::TextureUsages::COPY_SRC,
        );
        let (order, order_view) = texture(
            device,
            "ember order buffer",
            width,
            height,
            ORDER_FORMAT,
            wgpu::TextureUsages::RENDER_ATTACHMENT,
        );
        Ok(Self {
            _color: color,
            color_view,
            order_view,
            _order: order,
            scale,
        })
    }
}

/// Native store plus render target.
pub(super) struct TexelStorePair {
    pub native: wgpu::Texture,
    pub native_view: wgpu::TextureView,
    pub target: RenderTarget,
}

impl TexelStorePair {
    pub fn new(device: &wgpu::Device, scale: u32) -> Result<Self, RendererError> {
        let (native, native_view) = texture(
            device,
            "ember native texel store",
            VRAM_WIDTH as u32,
            VRAM_HEIGHT as u32,
            NATIVE_FORMAT,
            wgpu::TextureUsages::TEXTURE_BINDING
                | wgpu::TextureUsages::RENDER_ATTACHMENT
                | wgpu::TextureUsages::COPY_DST
                | wgpu::TextureUsages::COPY_SRC,
        );
        Ok(Self {
            native,
            native_view,
            target: RenderTarget::new(device, scale)?,
        })
    }

    #[inline]
    pub fn scale(&self) -> u32 {
        self.target.scale
    }
}

/// Frontend framebuffer the output program draws into.
pub(super) struct FrontendTarget {
    pub texture: wgpu::Texture,
    pub view: wgpu::TextureView,
    pub width: u32,
    pub height: u32,
}

impl FrontendTarget {
    pub fn new(device: &wgpu::Device, width: u32, height: u32) -> Self {
        let (texture, view) = texture(
            device,
            "ember frontend framebuffer",
            width.max(1),
            height.max(1),
            TARGET_FORMAT,
            wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::COPY_SRC,
        );
        Self {
            texture,
            view,
            width,
            height,
        }
    }
}
