use crate::coords::{Dimensions, FrontendResolution, TopLeft, VramRect, VRAM_HEIGHT, VRAM_WIDTH};

pub use crate::backend::Frame;

/// `len` texels from `start`, wrapped at `limit`: the span up to the edge
/// and the part continuing from 0 (possibly empty).
#[inline]
fn wrapped_spans(start: u16, len: u32, limit: u16) -> [(i32, i32); 2] {
    let limit = limit as i32;
    let start = start as i32 % limit;
    let end = start + (len as i32).min(limit);
    if end <= limit {
        [(start, end), (0, 0)]
    } else {
        [(start, limit), (0, end - limit)]
    }
}

/// Display region and depth, applied at the next frame boundary.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct DisplayMode {
    pub top_left: TopLeft,
    pub resolution: Dimensions,
    pub depth_24bpp: bool,
}

impl DisplayMode {
    /// Same mode with the resolution limited to the VRAM grid.
    pub fn clamped(self) -> Self {
        Self {
            resolution: Dimensions::new(
                self.resolution.w.min(VRAM_WIDTH),
                self.resolution.h.min(VRAM_HEIGHT),
            ),
            ..self
        }
    }

    /// Native VRAM texels the display reads (24-bit pixels span 1.5 texels).
    ///
    /// The display wraps around the grid edges, so up to four rectangles
    /// are returned; unused ones are empty.
    pub fn vram_rects(&self) -> [VramRect; 4] {
        let w = if self.depth_24bpp {
            (self.resolution.w as u32 * 3).div_ceil(2)
        } else {
            self.resolution.w as u32
        };
        let xs = wrapped_spans(self.top_left.x, w, VRAM_WIDTH);
        let ys = wrapped_spans(self.top_left.y, self.resolution.h as u32, VRAM_HEIGHT);
        let rect = |(x0, x1): (i32, i32), (y0, y1): (i32, i32)| VramRect::clamped(x0, y0, x1, y1);
        [
            rect(xs[0], ys[0]),
            rect(xs[1], ys[0]),
            rect(xs[0], ys[1]),
            rect(xs[1], ys[1]),
        ]
    }

    /// Frontend framebuffer size at `upscaling`.
    ///
    /// 24-bit output is decoded from the native store, so it never scales.
    pub fn frontend_resolution(&self, upscaling: u32) -> FrontendResolution {
        let s = if self.depth_24bpp { 1 } else { upscaling };
        FrontendResolution::new(self.resolution.w as u32 * s, self.resolution.h as u32 * s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn packed_24bit_display_reads_one_and_a_half_texels_per_pixel() {
        let mode = DisplayMode {
            top_left: TopLeft::new(0, 0),
            resolution: Dimensions::new(320, 240),
            depth_24bpp: true,
        };
        assert_eq!(mode.vram_rects()[0].width(), 480);
        assert!(mode.vram_rects()[1..].iter().all(|r| r.is_empty()));
        assert_eq!(mode.frontend_resolution(4), FrontendResolution::new(320, 240));
    }

    #[test]
    fn fifteen_bit_display_scales_with_upscaling() {
        let mode = DisplayMode {
            top_left: TopLeft::new(0, 256),
            resolution: Dimensions::new(256, 224),
            depth_24bpp: false,
        };
        assert_eq!(mode.vram_rects()[0].bottom, 480);
        assert_eq!(mode.frontend_resolution(2), FrontendResolution::new(512, 448));
    }

    #[test]
    fn display_past_the_right_edge_wraps_to_column_zero() {
        let mode = DisplayMode {
            top_left: TopLeft::new(900, 0),
            resolution: Dimensions::new(320, 16),
            depth_24bpp: true,
        };
        let [main, wrapped, ..] = mode.vram_rects();
        assert_eq!((main.left, main.right), (900, 1024));
        assert_eq!((wrapped.left, wrapped.right, wrapped.bottom), (0, 356, 16));
    }

    #[test]
    fn display_wraps_at_the_bottom_edge() {
        let mode = DisplayMode {
            top_left: TopLeft::new(0, 500),
            resolution: Dimensions::new(64, 20),
            depth_24bpp: false,
        };
        let rects = mode.vram_rects();
        assert_eq!((rects[0].top, rects[0].bottom), (500, 512));
        assert_eq!((rects[2].top, rects[2].bottom), (0, 8));
        assert!(rects[1].is_empty() && rects[3].is_empty());
    }

    #[test]
    fn oversized_display_is_clamped_to_vram() {
        let mode = DisplayMode {
            top_left: TopLeft::origin(),
            resolution: Dimensions::new(u16::MAX, u16::MAX),
            depth_24bpp: false,
        }
        .clamped();
        assert_eq!(mode.resolution, Dimensions::new(1024, 512));
        assert_eq!(mode.frontend_resolution(8), FrontendResolution::new(8192, 4096));
    }
}
