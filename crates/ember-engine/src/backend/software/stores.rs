use crate::coords::{texel_to_rgb, rgb_to_texel, VramRect, VRAM_HEIGHT, VRAM_PIXELS, VRAM_WIDTH};
use crate::error::RendererError;

/// Stored order of a cleared order-buffer entry: every fragment passes.
pub(super) const ORDER_CLEARED: i32 = -1;

const MASK_BIT: u32 = 1 << 24;

/// Packs a render-target pixel: RGB in the low 24 bits, mask in bit 24.
#[inline]
pub(super) fn pack(rgb: [u8; 3], mask: bool) -> u32 {
    let m = if mask { MASK_BIT } else { 0 };
    m | (rgb[0] as u32) << 16 | (rgb[1] as u32) << 8 | rgb[2] as u32
}

#[inline]
pub(super) fn unpack(pixel: u32) -> ([u8; 3], bool) {
    (
        [(pixel >> 16) as u8, (pixel >> 8) as u8, pixel as u8],
        pixel & MASK_BIT != 0,
    )
}

/// CPU texel store pair.
#[derive(Debug)]
pub(super) struct TexelStores {
    /// Native 1024 × 512 store, row-major.
    pub native: Vec<u16>,
    /// Render target, `1024·s × 512·s`, packed with [`pack`].
    pub target: Vec<u32>,
    /// Order buffer, same size as `target`.
    pub order: Vec<i32>,
    pub scale: u32,
}

impl TexelStores {
    pub fn new(scale: u32) -> Result<Self, RendererError> {
        let native = try_alloc(VRAM_PIXELS, 0u16, "native texel store")?;
        let (target, order) = alloc_target(scale)?;
        Ok(Self {
            native,
            target,
            order,
            scale,
        })
    }

    /// Replaces the render target; leaves `self` untouched on failure.
    pub fn reallocate(&mut self, scale: u32) -> Result<(), RendererError> {
        let (target, order) = alloc_target(scale)?;
        self.target = target;
        self.order = order;
        self.scale = scale;
        Ok(())
    }

    #[inline]
    pub fn target_width(&self) -> usize {
        VRAM_WIDTH as usize * self.scale as usize
    }

    #[inline]
    pub fn target_height(&self) -> usize {
        VRAM_HEIGHT as usize * self.scale as usize
    }

    pub fn write_native(&mut self, rect: VramRect, texels: &[u16]) {
        let w = rect.width() as usize;
        for (row, y) in (rect.top..rect.bottom).enumerate() {
            let dst = y as usize * VRAM_WIDTH as usize + rect.left as usize;
            self.native[dst..dst + w].copy_from_slice(&texels[row * w..(row + 1) * w]);
        }
    }

    pub fn read_native(&self, rect: VramRect) -> Vec<u16> {
        let w = rect.width() as usize;
        let mut out = Vec::with_capacity(w * rect.height() as usize);
        for y in rect.top..rect.bottom {
            let src = y as usize * VRAM_WIDTH as usize + rect.left as usize;
            out.extend_from_slice(&self.native[src..src + w]);
        }
        out
    }

    /// Nearest-neighbor downsample of `rect` into the native store.
    pub fn sync_native(&mut self, rect: VramRect) {
        let s = self.scale as usize;
        let tw = self.target_width();
        for y in rect.top..rect.bottom {
            for x in rect.left..rect.right {
                let (rgb, mask) = unpack(self.target[y as usize * s * tw + x as usize * s]);
                self.native[y as usize * VRAM_WIDTH as usize + x as usize] = rgb_to_texel(rgb, mask);
            }
        }
    }

    /// Expands `rect` of the native store into the render target, stamping
    /// `order` into the order buffer.
    pub fn load_rect(&mut self, rect: VramRect, order: i16) {
        let s = self.scale as usize;
        let tw = self.target_width();
        for ty in rect.top as usize * s..rect.bottom as usize * s {
            for tx in rect.left as usize * s..rect.right as usize * s {
                let (rgb, mask) = texel_to_rgb(self.native[(ty / s) * VRAM_WIDTH as usize + tx / s]);
                let i = ty * tw + tx;
                self.target[i] = pack(rgb, mask);
                self.order[i] = order as i32;
            }
        }
    }

    pub fn clear_order(&mut self) {
        self.order.fill(ORDER_CLEARED);
    }
}

#[inline]
pub(super) fn native_at(native: &[u16], x: u32, y: u32) -> u16 {
    let x = x % VRAM_WIDTH as u32;
    let y = y % VRAM_HEIGHT as u32;
    native[y as usize * VRAM_WIDTH as usize + x as usize]
}

fn alloc_target(scale: u32) -> Result<(Vec<u32>, Vec<i32>), RendererError> {
    let len = (VRAM_WIDTH as usize * scale as usize)
        .checked_mul(VRAM_HEIGHT as usize * scale as usize)
        .ok_or_else(|| RendererError::Allocation {
            what: "render target",
            message: format!("{scale}x target size overflows"),
        })?;
    let target = try_alloc(len, 0u32, "render target")?;
    let order = try_alloc(len, ORDER_CLEARED, "order buffer")?;
    Ok((target, order))
}

fn try_alloc<T: Copy>(len: usize, value: T, what: &'static str) -> Result<Vec<T>, RendererError> {
    let mut v = Vec::new();
    v.try_reserve_exact(len).map_err(|e| RendererError::Allocation {
        what,
        message: e.to_string(),
    })?;
    v.resize(len, value);
    Ok(v)
}
