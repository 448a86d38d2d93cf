/// How the vertex color and the sampled texel are combined.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum TextureBlendMode {
    /// No texture: gouraud-shaded vertex color.
    #[default]
    Untextured = 0,
    /// Texel color used as-is.
    Raw = 1,
    /// Texel color modulated by the vertex color (128 = identity).
    Blended = 2,
}

impl TextureBlendMode {
    #[inline]
    pub const fn from_raw(v: u8) -> Self {
        match v {
            1 => Self::Raw,
            2 => Self::Blended,
            _ => Self::Untextured,
        }
    }

    #[inline]
    pub const fn is_textured(self) -> bool {
        !matches!(self, Self::Untextured)
    }
}

/// Texture color depth. The discriminant is the right shift from 16 bits.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum TextureDepth {
    #[default]
    T16Bpp = 0,
    T8Bpp = 1,
    T4Bpp = 2,
}

impl TextureDepth {
    #[inline]
    pub const fn from_shift(shift: u8) -> Self {
        match shift {
            1 => Self::T8Bpp,
            2 => Self::T4Bpp,
            _ => Self::T16Bpp,
        }
    }

    #[inline]
    pub const fn shift(self) -> u8 {
        self as u8
    }

    /// VRAM columns spanned by a 256-texel wide texture page.
    #[inline]
    pub const fn page_width(self) -> u16 {
        256 >> self.shift()
    }

    /// CLUT entries used by one lookup, 0 for direct color.
    #[inline]
    pub const fn clut_entries(self) -> u16 {
        match self {
            Self::T16Bpp => 0,
            Self::T8Bpp => 256,
            Self::T4Bpp => 16,
        }
    }
}

/// The four hardware semi-transparency equations (`B` = framebuffer, `F` = fragment).
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Hash)]
pub enum SemiTransparencyMode {
    /// B/2 + F/2
    #[default]
    Average,
    /// B + F
    Add,
    /// B - F
    SubtractSource,
    /// B + F/4
    AddQuarterSource,
}

impl SemiTransparencyMode {
    pub const ALL: [SemiTransparencyMode; 4] = [
        Self::Average,
        Self::Add,
        Self::SubtractSource,
        Self::AddQuarterSource,
    ];

    /// Decodes the two-bit hardware field.
    #[inline]
    pub const fn from_bits(bits: u8) -> Self {
        match bits & 3 {
            0 => Self::Average,
            1 => Self::Add,
            2 => Self::SubtractSource,
            _ => Self::AddQuarterSource,
        }
    }

    #[inline]
    pub const fn index(self) -> usize {
        self as usize
    }

    /// Blends one 8-bit channel. Results saturate at 0 and 255.
    #[inline]
    pub const fn blend_channel(self, src: u8, dst: u8) -> u8 {
        let s = src as i32;
        let d = dst as i32;
        let v = match self {
            Self::Average => (s + d) / 2,
            Self::Add => s + d,
            Self::SubtractSource => d - s,
            Self::AddQuarterSource => d + s / 4,
        };
        if v < 0 {
            0
        } else if v > 255 {
            255
        } else {
            v as u8
        }
    }

    #[inline]
    pub const fn blend(self, src: [u8; 3], dst: [u8; 3]) -> [u8; 3] {
        [
            self.blend_channel(src[0], dst[0]),
            self.blend_channel(src[1], dst[1]),
            self.blend_channel(src[2], dst[2]),
        ]
    }
}

/// Primitive topology of a command batch.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Hash)]
pub enum Topology {
    #[default]
    Triangles,
    Lines,
}

impl Topology {
    /// Vertices consumed per primitive.
    #[inline]
    pub const fn vertices_per_primitive(self) -> usize {
        match self {
            Self::Triangles => 3,
            Self::Lines => 2,
        }
    }
}
