use crate::backend::frame::pack_xrgb;
use crate::backend::Frame;

use super::stores::{native_at, unpack, TexelStores};

/// Display rectangle in VRAM texels (pixels for 24-bit mode).
#[derive(Debug, Copy, Clone)]
pub(super) struct DisplayRect {
    pub left: u32,
    pub top: u32,
    pub width: u32,
    pub height: u32,
}

/// Scales the render-target region to the frame size.
pub(super) fn blit_15bpp(stores: &TexelStores, rect: DisplayRect, frame: &mut Frame) {
    let s = stores.scale;
    let (tw, th) = (stores.target_width() as u32, stores.target_height() as u32);
    let (fw, fh) = (frame.width.max(1), frame.height.max(1));

    for fy in 0..frame.height {
        let ty = (rect.top * s + fy * rect.height * s / fh) % th;
        for fx in 0..frame.width {
            let tx = (rect.left * s + fx * rect.width * s / fw) % tw;
            let (rgb, _) = unpack(stores.target[ty as usize * tw as usize + tx as usize]);
            frame.pixels[(fy * frame.width + fx) as usize] = pack_xrgb(rgb);
        }
    }
}

/// Decodes the native store as packed 24-bit RGB (3 bytes per pixel
/// across little-endian texels).
pub(super) fn blit_24bpp(stores: &TexelStores, rect: DisplayRect, frame: &mut Frame) {
    let (fw, fh) = (frame.width.max(1), frame.height.max(1));
    for fy in 0..frame.height {
        let y = rect.top + fy * rect.height / fh;
        let byte = |k: u32| {
            let word = native_at(&stores.native, rect.left + k / 2, y);
            (word >> ((k & 1) * 8)) as u8
        };
        for fx in 0..frame.width {
            let k = (fx * rect.width / fw) * 3;
            frame.pixels[(fy * frame.width + fx) as usize] = pack_xrgb([byte(k), byte(k + 1), byte(k + 2)]);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coords::{Dimensions, FrontendResolution, TopLeft, VramRect};

    #[test]
    fn decodes_packed_24bit_pixels() {
        let mut stores = TexelStores::new(1).unwrap();
        // two pixels: (0x11, 0x22, 0x33) and (0x44, 0x55, 0x66)
        let rect = VramRect::new(TopLeft::new(8, 4), Dimensions::new(3, 1)).unwrap();
        stores.write_native(rect, &[0x2211, 0x4433, 0x6655]);
        let mut frame = Frame::new(FrontendResolution::new(2, 1));
        let display = DisplayRect { left: 8, top: 4, width: 2, height: 1 };
        blit_24bpp(&stores, display, &mut frame);
        assert_eq!(frame.pixels, vec![0x112233, 0x445566]);
    }

    #[test]
    fn upscaled_blit_is_one_to_one() {
        let mut stores = TexelStores::new(2).unwrap();
        let rect = VramRect::new(TopLeft::new(0, 0), Dimensions::new(1, 1)).unwrap();
        stores.write_native(rect, &[0x001f]);
        stores.load_rect(rect, 0);
        let mut frame = Frame::new(FrontendResolution::new(4, 4));
        blit_15bpp(&stores, DisplayRect { left: 0, top: 0, width: 2, height: 2 }, &mut frame);
        assert_eq!(frame.pixel(1, 1), Some(0xff0000));
        assert_eq!(frame.pixel(2, 0), Some(0));
    }
}
