//! Coordinate, size and color types shared by the renderer and its backends.
//!
//! Canonical space:
//! - native VRAM texels (1024 × 512)
//! - origin top-left
//! - +X right, +Y down
//!
//! Backends scale these coordinates by the internal upscaling factor; nothing
//! above the backend seam ever sees upscaled coordinates.

mod color;
mod rect;
mod size;
mod top_left;

pub use color::{expand_5_to_8, rgb_to_texel, texel_to_rgb, Color};
pub use rect::VramRect;
pub use size::{Dimensions, FrontendResolution};
pub use top_left::TopLeft;

/// VRAM width in 16-bit texels.
pub const VRAM_WIDTH: u16 = 1024;
/// VRAM height in lines.
pub const VRAM_HEIGHT: u16 = 512;
/// Total number of texels in VRAM.
pub const VRAM_PIXELS: usize = VRAM_WIDTH as usize * VRAM_HEIGHT as usize;
