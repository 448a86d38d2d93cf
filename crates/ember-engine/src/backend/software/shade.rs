use crate::backend::{DrawState, DITHER_MATRIX};
use crate::config::ColorDepth;
use crate::coords::texel_to_rgb;
use crate::vertex::{CommandVertex, TextureBlendMode, TextureDepth};

use super::raster::Interp;
use super::stores::native_at;

/// Shaded fragment, before the order test.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub(super) struct Fragment {
    pub rgb: [u8; 3],
    pub mask: bool,
    /// Fragment takes the semi-transparent path.
    pub semi: bool,
}

/// Samples the texture described by `flat` at in-page coordinates `uv`.
pub(super) fn fetch_texel(native: &[u16], flat: &CommandVertex, uv: [u16; 2]) -> u16 {
    let u = (uv[0] & 0xff) as u32;
    let v = (uv[1] & 0xff) as u32;
    let [page_x, page_y] = flat.texture_page.map(u32::from);
    let [clut_x, clut_y] = flat.clut.map(u32::from);
    let y = page_y + v;

    match flat.texture_depth() {
        TextureDepth::T16Bpp => native_at(native, page_x + u, y),
        TextureDepth::T8Bpp => {
            let word = native_at(native, page_x + u / 2, y);
            let index = (word >> ((u & 1) * 8)) & 0xff;
            native_at(native, clut_x + index as u32, clut_y)
        }
        TextureDepth::T4Bpp => {
            let word = native_at(native, page_x + u / 4, y);
            let index = (word >> ((u & 3) * 4)) & 0xf;
            native_at(native, clut_x + index as u32, clut_y)
        }
    }
}

/// Texel modulated by the vertex color, 128 being identity.
#[inline]
pub(super) fn modulate(texel: [u8; 3], color: [u8; 3]) -> [u8; 3] {
    std::array::from_fn(|i| (texel[i] as u32 * color[i] as u32 / 128).min(255) as u8)
}

#[inline]
pub(super) fn dither(rgb: [u8; 3], x: u32, y: u32) -> [u8; 3] {
    let d = DITHER_MATRIX[(y & 3) as usize][(x & 3) as usize] as i32;
    rgb.map(|c| (c as i32 + d).clamp(0, 255) as u8)
}

/// Computes the fragment at render-target pixel `(x, y)`.
///
/// `flat` carries the primitive's flat attributes (first vertex). Returns
/// `None` for fully transparent texels.
pub(super) fn shade(
    native: &[u16],
    flat: &CommandVertex,
    interp: Interp,
    state: &DrawState,
    scale: u32,
    x: u32,
    y: u32,
) -> Option<Fragment> {
    let mode = flat.blend_mode();
    let (mut rgb, mask, semi) = if mode.is_textured() {
        let texel = fetch_texel(native, flat, interp.uv);
        if texel == 0 {
            return None;
        }
        let (tex, mask) = texel_to_rgb(texel);
        let rgb = match mode {
            TextureBlendMode::Blended => modulate(tex, interp.color),
            _ => tex,
        };
        (rgb, mask, flat.is_semi_transparent() && mask)
    } else {
        (interp.color, false, flat.is_semi_transparent())
    };

    if state.color_depth == ColorDepth::Bits16 {
        if flat.is_dithered() {
            rgb = if state.scale_dither {
                dither(rgb, x, y)
            } else {
                dither(rgb, x / scale, y / scale)
            };
        }
        rgb = rgb.map(|c| c & 0xf8);
    }

    Some(Fragment { rgb, mask, semi })
}
