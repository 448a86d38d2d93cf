use crate::coords::FrontendResolution;

/// Presented frame, XRGB8888 row-major (`0x00RRGGBB`).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Frame {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u32>,
}

impl Frame {
    /// Black frame of the given size.
    pub fn new(resolution: FrontendResolution) -> Self {
        Self {
            width: resolution.w,
            height: resolution.h,
            pixels: vec![0; resolution.pixel_count()],
        }
    }

    #[inline]
    pub fn resolution(&self) -> FrontendResolution {
        FrontendResolution::new(self.width, self.height)
    }

    /// Pixel at `(x, y)`, `None` outside the frame.
    #[inline]
    pub fn pixel(&self, x: u32, y: u32) -> Option<u32> {
        if x >= self.width || y >= self.height {
            return None;
        }
        self.pixels.get(y as usize * self.width as usize + x as usize).copied()
    }

    /// Pixel at `(x, y)` as `[r, g, b]`.
    #[inline]
    pub fn rgb(&self, x: u32, y: u32) -> Option<[u8; 3]> {
        self.pixel(x, y)
            .map(|p| [(p >> 16) as u8, (p >> 8) as u8, p as u8])
    }

    /// Converts to tightly packed RGBA8 bytes (alpha = 255).
    pub fn to_rgba8(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.pixels.len() * 4);
        for p in &self.pixels {
            out.extend_from_slice(&[(p >> 16) as u8, (p >> 8) as u8, *p as u8, 0xff]);
        }
        out
    }
}

#[inline]
pub(crate) fn pack_xrgb(rgb: [u8; 3]) -> u32 {
    (rgb[0] as u32) << 16 | (rgb[1] as u32) << 8 | rgb[2] as u32
}
