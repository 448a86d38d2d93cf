/// Top-left corner of a VRAM region, in native texels.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Hash)]
pub struct TopLeft {
    pub x: u16,
    pub y: u16,
}

impl TopLeft {
    #[inline]
    pub const fn new(x: u16, y: u16) -> Self {
        Self { x, y }
    }

    #[inline]
    pub const fn origin() -> Self {
        Self { x: 0, y: 0 }
    }
}
