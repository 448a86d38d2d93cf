use bytemuck::{Pod, Zeroable};

use crate::coords::{Color, TopLeft};

use super::{TextureBlendMode, TextureDepth, VertexLayout};

/// Vertex of an emulated draw command.
///
/// `position[2]` is not a depth: the renderer overwrites it with the
/// primitive order index so the order buffer can keep submission order
/// across batches drawn out of order.
#[repr(C)]
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Pod, Zeroable)]
pub struct CommandVertex {
    /// Position in VRAM coordinates (before the draw offset) and order index.
    pub position: [i16; 3],
    _pad0: i16,
    /// RGB color, 8 bits per component.
    pub color: [u8; 3],
    /// See [`TextureBlendMode`].
    pub texture_blend_mode: u8,
    /// Texture coordinates within the page.
    pub texture_coord: [u16; 2],
    /// Texture page (base offset in VRAM used for texture lookup).
    pub texture_page: [u16; 2],
    /// Color look-up table (palette) coordinates in VRAM.
    pub clut: [u16; 2],
    /// Right shift from 16 bits, see [`TextureDepth`].
    pub depth_shift: u8,
    /// Non-zero if dithering is enabled for this primitive.
    pub dither: u8,
    /// Non-zero if the primitive is semi-transparent.
    pub semi_transparent: u8,
    _pad1: u8,
}

impl CommandVertex {
    const ATTRS: [wgpu::VertexAttribute; 6] = wgpu::vertex_attr_array![
        0 => Sint16x4, // position + order, padding lane ignored
        1 => Uint8x4,  // color + texture_blend_mode
        2 => Uint16x2, // texture_coord
        3 => Uint16x2, // texture_page
        4 => Uint16x2, // clut
        5 => Uint8x4   // depth_shift, dither, semi_transparent
    ];

    /// Untextured vertex.
    #[inline]
    pub fn new(x: i16, y: i16, color: Color) -> Self {
        Self {
            position: [x, y, 0],
            color: color.to_array(),
            ..Self::default()
        }
    }

    /// Adds texturing information.
    #[inline]
    pub fn textured(
        mut self,
        uv: [u16; 2],
        page: TopLeft,
        clut: TopLeft,
        depth: TextureDepth,
        blend: TextureBlendMode,
    ) -> Self {
        self.texture_coord = uv;
        self.texture_page = [page.x, page.y];
        self.clut = [clut.x, clut.y];
        self.depth_shift = depth.shift();
        self.texture_blend_mode = blend as u8;
        self
    }

    #[inline]
    pub fn with_dither(mut self, dither: bool) -> Self {
        self.dither = dither as u8;
        self
    }

    #[inline]
    pub fn x(&self) -> i16 {
        self.position[0]
    }

    #[inline]
    pub fn y(&self) -> i16 {
        self.position[1]
    }

    /// Primitive order index.
    #[inline]
    pub fn order(&self) -> i16 {
        self.position[2]
    }

    #[inline]
    pub fn blend_mode(&self) -> TextureBlendMode {
        TextureBlendMode::from_raw(self.texture_blend_mode)
    }

    #[inline]
    pub fn texture_depth(&self) -> TextureDepth {
        TextureDepth::from_shift(self.depth_shift)
    }

    #[inline]
    pub fn is_dithered(&self) -> bool {
        self.dither != 0
    }

    #[inline]
    pub fn is_semi_transparent(&self) -> bool {
        self.semi_transparent != 0
    }

    /// Stamps renderer-owned fields before staging.
    #[inline]
    pub(crate) fn stamp(&mut self, order: i16, semi_transparent: bool) {
        self.position[2] = order;
        self.semi_transparent = semi_transparent as u8;
    }
}

impl VertexLayout for CommandVertex {
    fn layout() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<CommandVertex>() as u64,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &Self::ATTRS,
        }
    }
}
