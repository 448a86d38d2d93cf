/// 24-bit RGB color as issued by draw commands.
///
/// Field order is always (r, g, b). Channels are 8-bit; VRAM stores 5 bits
/// per channel, see [`rgb_to_texel`] / [`texel_to_rgb`].
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Hash)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Color {
    #[inline]
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    #[inline]
    pub const fn black() -> Self {
        Self::new(0, 0, 0)
    }

    #[inline]
    pub const fn white() -> Self {
        Self::new(255, 255, 255)
    }

    #[inline]
    pub const fn to_array(self) -> [u8; 3] {
        [self.r, self.g, self.b]
    }

    /// Packs the color into a VRAM texel with the mask bit cleared.
    #[inline]
    pub const fn to_texel(self) -> u16 {
        rgb_to_texel(self.to_array(), false)
    }
}

/// Expands a 5-bit channel to 8 bits, replicating the top bits so that
/// 31 maps to 255 and `expanded >> 3` gives back the original value.
#[inline]
pub const fn expand_5_to_8(c: u16) -> u8 {
    let c = (c & 0x1f) as u8;
    (c << 3) | (c >> 2)
}

/// Packs 8-bit RGB into a 1-5-5-5 texel (bit 15 = mask).
#[inline]
pub const fn rgb_to_texel(rgb: [u8; 3], mask: bool) -> u16 {
    let r = (rgb[0] >> 3) as u16;
    let g = (rgb[1] >> 3) as u16;
    let b = (rgb[2] >> 3) as u16;
    let m = if mask { 0x8000 } else { 0 };
    m | (b << 10) | (g << 5) | r
}

/// Unpacks a texel to 8-bit RGB and its mask bit.
#[inline]
pub const fn texel_to_rgb(texel: u16) -> ([u8; 3], bool) {
    (
        [
            expand_5_to_8(texel),
            expand_5_to_8(texel >> 5),
            expand_5_to_8(texel >> 10),
        ],
        texel & 0x8000 != 0,
    )
}
