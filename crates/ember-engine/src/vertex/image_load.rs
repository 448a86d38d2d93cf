use bytemuck::{Pod, Zeroable};

use crate::coords::VramRect;

use super::VertexLayout;

/// Vertex of a raw VRAM upload into the render target.
#[repr(C)]
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Pod, Zeroable)]
pub struct ImageLoadVertex {
    /// Vertex position in VRAM.
    pub position: [u16; 2],
}

impl ImageLoadVertex {
    const ATTRS: [wgpu::VertexAttribute; 1] = wgpu::vertex_attr_array![0 => Uint16x2];

    /// Two triangles covering `rect`.
    pub fn quad(rect: VramRect) -> [ImageLoadVertex; 6] {
        let v = |x: u16, y: u16| ImageLoadVertex { position: [x, y] };
        [
            v(rect.left, rect.top),
            v(rect.right, rect.top),
            v(rect.right, rect.bottom),
            v(rect.left, rect.top),
            v(rect.right, rect.bottom),
            v(rect.left, rect.bottom),
        ]
    }

    /// Bounding rectangle of a vertex run, `None` if empty.
    pub fn bounds(vertices: &[ImageLoadVertex]) -> Option<VramRect> {
        let first = vertices.first()?;
        let (mut l, mut t) = (first.position[0], first.position[1]);
        let (mut r, mut b) = (l, t);
        for v in vertices {
            l = l.min(v.position[0]);
            t = t.min(v.position[1]);
            r = r.max(v.position[0]);
            b = b.max(v.position[1]);
        }
        Some(VramRect::clamped(l as i32, t as i32, r as i32, b as i32))
    }
}

impl VertexLayout for ImageLoadVertex {
    fn layout() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<ImageLoadVertex>() as u64,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &Self::ATTRS,
        }
    }
}
