use crate::config::ColorDepth;
use crate::coords::{FrontendResolution, VramRect};
use crate::vertex::{SemiTransparencyMode, Topology};

/// 4×4 ordered dither offsets, indexed `[y & 3][x & 3]`.
pub const DITHER_MATRIX: [[i8; 4]; 4] = [
    [-4, 0, -3, 1],
    [2, -2, 3, -1],
    [-3, 1, -4, 0],
    [3, -1, 2, -2],
];

/// Rasterization state captured when a command batch is flushed.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct DrawState {
    /// Draw area in native texels.
    pub scissor: VramRect,
    /// Added to every vertex position.
    pub offset: (i16, i16),
    pub color_depth: ColorDepth,
    /// Index the dither matrix with render-target coordinates.
    pub scale_dither: bool,
}

/// Blend configuration of a command batch.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum CommandPassKind {
    /// Every fragment written, no blending.
    Opaque,
    /// Two passes: mask-clear texels opaque, then semi-transparent
    /// fragments blended with the mode's equation.
    SemiTransparent(SemiTransparencyMode),
}

/// Pass descriptor for command draws.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct CommandPass {
    pub topology: Topology,
    pub kind: CommandPassKind,
    pub wireframe: bool,
    pub state: DrawState,
}

/// Pass descriptor for image loads (native store → render target).
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct ImageLoadPass {
    /// Order index stamped into the order buffer for the loaded texels.
    pub order: i16,
}

/// Pass descriptor for the presentation blit.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct OutputPass {
    /// Decode VRAM as packed 24-bit RGB at native resolution.
    pub depth_24bpp: bool,
    pub resolution: FrontendResolution,
}
