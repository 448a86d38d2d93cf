use crate::coords::{Dimensions, TopLeft, VRAM_HEIGHT, VRAM_WIDTH};

/// Precision of the render target.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Hash)]
pub enum ColorDepth {
    /// Native 5 bits per channel, dithering enabled.
    #[default]
    Bits16,
    /// 8 bits per channel, dithering disabled.
    Bits32,
}

impl ColorDepth {
    #[inline]
    pub const fn bits(self) -> u32 {
        match self {
            Self::Bits16 => 16,
            Self::Bits32 => 32,
        }
    }
}

/// Draw-state snapshot supplied by the host at construction.
///
/// The renderer keeps its own copy and mutates it through setters; the host
/// never shares this struct with a live renderer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DrawConfig {
    /// Clip rectangle applied at rasterization.
    pub draw_area_top_left: TopLeft,
    pub draw_area_dimensions: Dimensions,
    /// Signed offset added to every vertex position before rasterization.
    pub draw_offset: (i16, i16),
    /// VRAM region presented to the frontend.
    pub display_top_left: TopLeft,
    pub display_resolution: Dimensions,
    /// Display reads VRAM as packed 24-bit RGB.
    pub display_24bpp: bool,
    /// Render-target scale over native VRAM.
    pub internal_upscaling: u32,
    pub internal_color_depth: ColorDepth,
}

impl Default for DrawConfig {
    fn default() -> Self {
        Self {
            draw_area_top_left: TopLeft::origin(),
            draw_area_dimensions: Dimensions::new(VRAM_WIDTH, VRAM_HEIGHT),
            draw_offset: (0, 0),
            display_top_left: TopLeft::origin(),
            display_resolution: Dimensions::new(320, 240),
            display_24bpp: false,
            internal_upscaling: 1,
            internal_color_depth: ColorDepth::Bits16,
        }
    }
}

impl DrawConfig {
    #[inline]
    pub fn with_upscaling(mut self, upscaling: u32) -> Self {
        self.internal_upscaling = upscaling;
        self
    }

    #[inline]
    pub fn with_color_depth(mut self, depth: ColorDepth) -> Self {
        self.internal_color_depth = depth;
        self
    }

    #[inline]
    pub fn with_display(mut self, top_left: TopLeft, resolution: Dimensions, depth_24bpp: bool) -> Self {
        self.display_top_left = top_left;
        self.display_resolution = resolution;
        self.display_24bpp = depth_24bpp;
        self
    }
}
