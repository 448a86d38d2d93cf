/// Size of a VRAM region, in native texels.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Hash)]
pub struct Dimensions {
    pub w: u16,
    pub h: u16,
}

impl Dimensions {
    #[inline]
    pub const fn new(w: u16, h: u16) -> Self {
        Self { w, h }
    }

    #[inline]
    pub const fn is_empty(self) -> bool {
        self.w == 0 || self.h == 0
    }

    /// Number of texels covered.
    #[inline]
    pub const fn area(self) -> usize {
        self.w as usize * self.h as usize
    }
}

/// Size of the framebuffer handed to the frontend, in output pixels.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Hash)]
pub struct FrontendResolution {
    pub w: u32,
    pub h: u32,
}

impl FrontendResolution {
    #[inline]
    pub const fn new(w: u32, h: u32) -> Self {
        Self { w, h }
    }

    #[inline]
    pub const fn pixel_count(self) -> usize {
        self.w as usize * self.h as usize
    }
}
