use bytemuck::{Pod, Zeroable};

use super::VertexLayout;

/// Vertex of the presentation blit.
#[repr(C)]
#[derive(Debug, Copy, Clone, Default, PartialEq, Pod, Zeroable)]
pub struct OutputVertex {
    /// Vertex position on the screen (normalized device coordinates).
    pub position: [f32; 2],
    /// Corresponding coordinate in the framebuffer (native VRAM texels).
    pub fb_coord: [u16; 2],
}

impl OutputVertex {
    const ATTRS: [wgpu::VertexAttribute; 2] = wgpu::vertex_attr_array![
        0 => Float32x2,
        1 => Uint16x2
    ];

    /// Two triangles mapping the whole screen onto `fb_coord` corners.
    pub fn quad(left: u16, top: u16, right: u16, bottom: u16) -> [OutputVertex; 6] {
        let v = |x: f32, y: f32, u: u16, w: u16| OutputVertex {
            position: [x, y],
            fb_coord: [u, w],
        };
        [
            v(-1.0, 1.0, left, top),
            v(1.0, 1.0, right, top),
            v(1.0, -1.0, right, bottom),
            v(-1.0, 1.0, left, top),
            v(1.0, -1.0, right, bottom),
            v(-1.0, -1.0, left, bottom),
        ]
    }

    /// `[left, top, right, bottom]` framebuffer bounds of a vertex run.
    pub fn fb_bounds(vertices: &[OutputVertex]) -> Option<[u16; 4]> {
        let first = vertices.first()?;
        let mut b = [first.fb_coord[0], first.fb_coord[1], first.fb_coord[0], first.fb_coord[1]];
        for v in vertices {
            b[0] = b[0].min(v.fb_coord[0]);
            b[1] = b[1].min(v.fb_coord[1]);
            b[2] = b[2].max(v.fb_coord[0]);
            b[3] = b[3].max(v.fb_coord[1]);
        }
        Some(b)
    }
}

impl VertexLayout for OutputVertex {
    fn layout() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<OutputVertex>() as u64,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &Self::ATTRS,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quad_maps_top_left_corner_to_screen_top_left() {
        let q = OutputVertex::quad(0, 240, 320, 480);
        assert_eq!(q[0].position, [-1.0, 1.0]);
        assert_eq!(q[0].fb_coord, [0, 240]);
        assert_eq!(OutputVertex::fb_bounds(&q), Some([0, 240, 320, 480]));
    }
}
