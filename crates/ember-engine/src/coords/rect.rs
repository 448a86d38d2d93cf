use super::{Dimensions, TopLeft, VRAM_HEIGHT, VRAM_WIDTH};

/// Axis-aligned VRAM rectangle in native texels, half-open: `[left, right) × [top, bottom)`.
///
/// Always lies inside the 1024 × 512 grid. Empty rectangles are allowed and
/// never intersect anything.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Hash)]
pub struct VramRect {
    pub left: u16,
    pub top: u16,
    pub right: u16,
    pub bottom: u16,
}

impl VramRect {
    /// The whole VRAM grid.
    pub const FULL: VramRect = VramRect {
        left: 0,
        top: 0,
        right: VRAM_WIDTH,
        bottom: VRAM_HEIGHT,
    };

    /// Builds the rectangle covering `dimensions` texels at `top_left`.
    ///
    /// Returns `None` if any part falls outside VRAM.
    #[inline]
    pub fn new(top_left: TopLeft, dimensions: Dimensions) -> Option<Self> {
        let right = top_left.x as u32 + dimensions.w as u32;
        let bottom = top_left.y as u32 + dimensions.h as u32;
        if right > VRAM_WIDTH as u32 || bottom > VRAM_HEIGHT as u32 {
            return None;
        }
        Some(Self {
            left: top_left.x,
            top: top_left.y,
            right: right as u16,
            bottom: bottom as u16,
        })
    }

    /// Builds a rectangle from signed bounds, clamping it to VRAM.
    #[inline]
    pub fn clamped(left: i32, top: i32, right: i32, bottom: i32) -> Self {
        let cx = |v: i32| v.clamp(0, VRAM_WIDTH as i32) as u16;
        let cy = |v: i32| v.clamp(0, VRAM_HEIGHT as i32) as u16;
        let (l, r) = (cx(left), cx(right));
        let (t, b) = (cy(top), cy(bottom));
        Self {
            left: l,
            top: t,
            right: r.max(l),
            bottom: b.max(t),
        }
    }

    #[inline]
    pub const fn top_left(self) -> TopLeft {
        TopLeft::new(self.left, self.top)
    }

    #[inline]
    pub const fn dimensions(self) -> Dimensions {
        Dimensions::new(self.width(), self.height())
    }

    #[inline]
    pub const fn width(self) -> u16 {
        self.right.saturating_sub(self.left)
    }

    #[inline]
    pub const fn height(self) -> u16 {
        self.bottom.saturating_sub(self.top)
    }

    #[inline]
    pub const fn is_empty(self) -> bool {
        self.right <= self.left || self.bottom <= self.top
    }

    /// Half-open containment.
    #[inline]
    pub fn contains(self, x: u16, y: u16) -> bool {
        x >= self.left && x < self.right && y >= self.top && y < self.bottom
    }

    #[inline]
    pub fn intersect(self, other: VramRect) -> Option<VramRect> {
        let left = self.left.max(other.left);
        let top = self.top.max(other.top);
        let right = self.right.min(other.right);
        let bottom = self.bottom.min(other.bottom);

        if right <= left || bottom <= top {
            None
        } else {
            Some(VramRect { left, top, right, bottom })
        }
    }

    #[inline]
    pub fn intersects(self, other: VramRect) -> bool {
        self.intersect(other).is_some()
    }

    /// Smallest rectangle covering both. Empty operands are ignored.
    #[inline]
    pub fn union(self, other: VramRect) -> VramRect {
        if self.is_empty() {
            return other;
        }
        if other.is_empty() {
            return self;
        }
        VramRect {
            left: self.left.min(other.left),
            top: self.top.min(other.top),
            right: self.right.max(other.right),
            bottom: self.bottom.max(other.bottom),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn r(x: u16, y: u16, w: u16, h: u16) -> VramRect {
        VramRect::new(TopLeft::new(x, y), Dimensions::new(w, h)).unwrap()
    }

    // ── new ───────────────────────────────────────────────────────────────

    #[test]
    fn new_accepts_full_grid() {
        assert_eq!(r(0, 0, 1024, 512), VramRect::FULL);
    }

    #[test]
    fn new_rejects_out_of_bounds() {
        assert!(VramRect::new(TopLeft::new(1000, 0), Dimensions::new(25, 1)).is_none());
        assert!(VramRect::new(TopLeft::new(0, 511), Dimensions::new(1, 2)).is_none());
    }

    #[test]
    fn clamped_limits_to_vram() {
        let c = VramRect::clamped(-10, -10, 2000, 2000);
        assert_eq!(c, VramRect::FULL);
        assert!(VramRect::clamped(20, 20, 10, 10).is_empty());
    }

    // ── contains ──────────────────────────────────────────────────────────

    #[test]
    fn contains_top_left_inclusive_bottom_right_exclusive() {
        let rect = r(10, 10, 5, 5);
        assert!(rect.contains(10, 10));
        assert!(rect.contains(14, 14));
        assert!(!rect.contains(15, 14));
        assert!(!rect.contains(14, 15));
    }

    // ── intersect ─────────────────────────────────────────────────────────

    #[test]
    fn intersect_overlapping() {
        assert_eq!(r(0, 0, 10, 10).intersect(r(5, 5, 10, 10)), Some(r(5, 5, 5, 5)));
    }

    #[test]
    fn intersect_touching_edge_returns_none() {
        assert!(r(0, 0, 10, 10).intersect(r(10, 0, 10, 10)).is_none());
    }

    // ── union ─────────────────────────────────────────────────────────────

    #[test]
    fn union_ignores_empty() {
        let a = r(3, 4, 5, 6);
        assert_eq!(VramRect::default().union(a), a);
        assert_eq!(a.union(VramRect::default()), a);
    }

    #[test]
    fn union_covers_both() {
        assert_eq!(r(0, 0, 2, 2).union(r(10, 10, 2, 2)), r(0, 0, 12, 12));
    }
}
