use crate::coords::{Color, Dimensions, TopLeft};
use crate::vertex::{CommandVertex, SemiTransparencyMode};

/// One emulated GPU command, as decoded by the host.
///
/// Pixel payloads are borrowed; the renderer copies them before returning.
#[derive(Debug, Clone, PartialEq)]
pub enum DrawCommand<'a> {
    Triangle {
        vertices: [CommandVertex; 3],
        semi_transparency: Option<SemiTransparencyMode>,
    },
    Line {
        vertices: [CommandVertex; 2],
        semi_transparency: Option<SemiTransparencyMode>,
    },
    FillRect {
        color: Color,
        top_left: TopLeft,
        dimensions: Dimensions,
    },
    CopyRect {
        src: TopLeft,
        dst: TopLeft,
        dimensions: Dimensions,
    },
    UploadTextures {
        top_left: TopLeft,
        dimensions: Dimensions,
        texels: &'a [u16],
    },
    UploadVramWindow {
        top_left: TopLeft,
        dimensions: Dimensions,
        texels: &'a [u16],
    },
    SetDrawOffset {
        x: i16,
        y: i16,
    },
    SetDrawArea {
        top_left: TopLeft,
        dimensions: Dimensions,
    },
    SetDisplayMode {
        top_left: TopLeft,
        resolution: Dimensions,
        depth_24bpp: bool,
    },
    Flush,
}

impl DrawCommand<'_> {
    /// Opaque triangle.
    pub fn triangle(vertices: [CommandVertex; 3]) -> Self {
        Self::Triangle {
            vertices,
            semi_transparency: None,
        }
    }

    /// Opaque line.
    pub fn line(vertices: [CommandVertex; 2]) -> Self {
        Self::Line {
            vertices,
            semi_transparency: None,
        }
    }
}
