//! Scan conversion.
//!
//! Triangles are rasterized in render-target space with integer edge
//! functions on doubled coordinates (pixel centers land on odd values), so
//! coverage and interpolation are exact and batching-independent. Lines are
//! stepped in native space and every native point covers an `s × s` block.

use crate::vertex::CommandVertex;

/// Interpolated per-fragment attributes.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub(super) struct Interp {
    pub color: [u8; 3],
    pub uv: [u16; 2],
}

/// Half-open clip rectangle in render-target pixels.
#[derive(Debug, Copy, Clone)]
pub(super) struct PixelClip {
    pub left: i64,
    pub top: i64,
    pub right: i64,
    pub bottom: i64,
}

#[inline]
fn edge(a: (i64, i64), b: (i64, i64), p: (i64, i64)) -> i64 {
    (b.0 - a.0) * (p.1 - a.1) - (b.1 - a.1) * (p.0 - a.0)
}

/// Top-left fill rule for a positively oriented edge `a → b`.
#[inline]
fn is_top_left(a: (i64, i64), b: (i64, i64)) -> bool {
    let dx = b.0 - a.0;
    let dy = b.1 - a.1;
    (dy == 0 && dx > 0) || dy < 0
}

#[inline]
fn covers(w: i64, top_left: bool) -> bool {
    w > 0 || (w == 0 && top_left)
}

/// Rasterizes one triangle, calling `emit(x, y, interp)` per covered pixel.
pub(super) fn triangle(
    vertices: [&CommandVertex; 3],
    offset: (i16, i16),
    scale: u32,
    clip: PixelClip,
    mut emit: impl FnMut(u32, u32, Interp),
) {
    let s = scale as i64;
    let point = |v: &CommandVertex| {
        (
            (v.x() as i64 + offset.0 as i64) * 2 * s,
            (v.y() as i64 + offset.1 as i64) * 2 * s,
        )
    };

    let mut v = vertices;
    let mut p = v.map(point);
    let mut area = edge(p[0], p[1], p[2]);
    if area == 0 {
        return;
    }
    if area < 0 {
        v.swap(1, 2);
        p.swap(1, 2);
        area = -area;
    }

    let tl = [
        is_top_left(p[1], p[2]),
        is_top_left(p[2], p[0]),
        is_top_left(p[0], p[1]),
    ];

    let min_x = p.iter().map(|q| q.0).min().unwrap_or(0).div_euclid(2).max(clip.left);
    let max_x = (p.iter().map(|q| q.0).max().unwrap_or(0).div_euclid(2) + 1).min(clip.right);
    let min_y = p.iter().map(|q| q.1).min().unwrap_or(0).div_euclid(2).max(clip.top);
    let max_y = (p.iter().map(|q| q.1).max().unwrap_or(0).div_euclid(2) + 1).min(clip.bottom);

    for y in min_y..max_y {
        for x in min_x..max_x {
            let c = (2 * x + 1, 2 * y + 1);
            let w = [edge(p[1], p[2], c), edge(p[2], p[0], c), edge(p[0], p[1], c)];
            if !(covers(w[0], tl[0]) && covers(w[1], tl[1]) && covers(w[2], tl[2])) {
                continue;
            }
            let color = std::array::from_fn(|i| {
                let num: i64 = (0..3).map(|k| w[k] * v[k].color[i] as i64).sum();
                (2 * num + area).div_euclid(2 * area).clamp(0, 255) as u8
            });
            let uv = std::array::from_fn(|i| {
                let num: i64 = (0..3).map(|k| w[k] * v[k].texture_coord[i] as i64).sum();
                num.div_euclid(area) as u16
            });
            emit(x as u32, y as u32, Interp { color, uv });
        }
    }
}

#[inline]
fn round_div(n: i64, d: i64) -> i64 {
    (2 * n + d).div_euclid(2 * d)
}

/// Rasterizes one line, both endpoints included.
pub(super) fn line(
    a: &CommandVertex,
    b: &CommandVertex,
    offset: (i16, i16),
    scale: u32,
    clip: PixelClip,
    mut emit: impl FnMut(u32, u32, Interp),
) {
    let s = scale as i64;
    let (x0, y0) = (a.x() as i64 + offset.0 as i64, a.y() as i64 + offset.1 as i64);
    let (x1, y1) = (b.x() as i64 + offset.0 as i64, b.y() as i64 + offset.1 as i64);
    let (dx, dy) = (x1 - x0, y1 - y0);
    let steps = dx.abs().max(dy.abs());

    for i in 0..=steps {
        let (x, y, interp) = if steps == 0 {
            (x0, y0, Interp { color: a.color, uv: a.texture_coord })
        } else {
            let color = std::array::from_fn(|c| {
                let (c0, c1) = (a.color[c] as i64, b.color[c] as i64);
                (c0 + round_div((c1 - c0) * i, steps)).clamp(0, 255) as u8
            });
            let uv = std::array::from_fn(|c| {
                let (u0, u1) = (a.texture_coord[c] as i64, b.texture_coord[c] as i64);
                (u0 + ((u1 - u0) * i).div_euclid(steps)) as u16
            });
            (
                x0 + round_div(dx * i, steps),
                y0 + round_div(dy * i, steps),
                Interp { color, uv },
            )
        };

        for ty in (y * s).max(clip.top)..((y + 1) * s).min(clip.bottom) {
            for tx in (x * s).max(clip.left)..((x + 1) * s).min(clip.right) {
                emit(tx as u32, ty as u32, interp);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coords::Color;

    const CLIP: PixelClip = PixelClip {
        left: 0,
        top: 0,
        right: 1024,
        bottom: 512,
    };

    fn collect_triangle(v: [CommandVertex; 3], scale: u32, clip: PixelClip) -> Vec<(u32, u32)> {
        let mut out = Vec::new();
        triangle([&v[0], &v[1], &v[2]], (0, 0), scale, clip, |x, y, _| out.push((x, y)));
        out.sort_unstable();
        out
    }

    fn vx(x: i16, y: i16) -> CommandVertex {
        CommandVertex::new(x, y, Color::white())
    }

    // ── coverage ─────────────────────────────────────────────────────────

    #[test]
    fn quad_halves_cover_each_pixel_once() {
        let a = collect_triangle([vx(0, 0), vx(4, 0), vx(0, 4)], 1, CLIP);
        let b = collect_triangle([vx(4, 0), vx(4, 4), vx(0, 4)], 1, CLIP);
        let mut all = [a.clone(), b.clone()].concat();
        all.sort_unstable();
        all.dedup();
        assert_eq!(all.len(), a.len() + b.len());
        assert_eq!(all.len(), 16);
    }

    #[test]
    fn winding_does_not_change_coverage() {
        let cw = collect_triangle([vx(1, 1), vx(9, 2), vx(3, 7)], 1, CLIP);
        let ccw = collect_triangle([vx(1, 1), vx(3, 7), vx(9, 2)], 1, CLIP);
        assert_eq!(cw, ccw);
        assert!(!cw.is_empty());
    }

    #[test]
    fn degenerate_triangle_emits_nothing() {
        assert!(collect_triangle([vx(0, 0), vx(5, 5), vx(10, 10)], 1, CLIP).is_empty());
    }

    #[test]
    fn upscaled_coverage_is_scaled_footprint() {
        let px = collect_triangle([vx(0, 0), vx(4, 0), vx(0, 4)], 1, CLIP).len();
        let px4 = collect_triangle([vx(0, 0), vx(4, 0), vx(0, 4)], 4, CLIP).len();
        // 4x4 half without its diagonal, then the 16x16 half without its diagonal
        assert_eq!(px, 6);
        assert_eq!(px4, 120);
    }

    #[test]
    fn clip_is_exact() {
        let clip = PixelClip { left: 2, top: 1, right: 3, bottom: 3 };
        let px = collect_triangle([vx(0, 0), vx(8, 0), vx(0, 8)], 1, clip);
        assert_eq!(px, vec![(2, 1), (2, 2)]);
    }

    // ── interpolation ────────────────────────────────────────────────────

    #[test]
    fn uv_matches_pixel_on_affine_quad() {
        let t = |x: i16, y: i16| {
            let mut v = vx(x, y);
            v.texture_coord = [x as u16 + 100, y as u16];
            v
        };
        let v = [t(0, 0), t(8, 0), t(0, 8)];
        triangle([&v[0], &v[1], &v[2]], (0, 0), 1, CLIP, |x, y, i| {
            assert_eq!(i.uv, [x as u16 + 100, y as u16]);
        });
    }

    #[test]
    fn flat_color_is_exact() {
        let c = |x, y| CommandVertex::new(x, y, Color::new(10, 200, 33));
        let v = [c(0, 0), c(6, 1), c(2, 9)];
        triangle([&v[0], &v[1], &v[2]], (0, 0), 2, CLIP, |_, _, i| {
            assert_eq!(i.color, [10, 200, 33]);
        });
    }

    // ── lines ────────────────────────────────────────────────────────────

    #[test]
    fn line_includes_both_endpoints() {
        let mut px = Vec::new();
        line(&vx(2, 3), &vx(6, 5), (0, 0), 1, CLIP, |x, y, _| px.push((x, y)));
        assert_eq!(px.len(), 5);
        assert_eq!(px.first(), Some(&(2, 3)));
        assert_eq!(px.last(), Some(&(6, 5)));
    }

    #[test]
    fn upscaled_line_point_fills_block() {
        let mut px = Vec::new();
        line(&vx(1, 1), &vx(1, 1), (0, 0), 3, CLIP, |x, y, _| px.push((x, y)));
        assert_eq!(px.len(), 9);
        assert!(px.iter().all(|&(x, y)| (3..6).contains(&x) && (3..6).contains(&y)));
    }

    #[test]
    fn line_color_reaches_endpoint_color() {
        let a = CommandVertex::new(0, 0, Color::black());
        let b = CommandVertex::new(4, 0, Color::new(200, 100, 40));
        let mut last = None;
        line(&a, &b, (0, 0), 1, CLIP, |_, _, i| last = Some(i.color));
        assert_eq!(last, Some([200, 100, 40]));
    }
}
