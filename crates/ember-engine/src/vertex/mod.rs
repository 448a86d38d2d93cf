//! Vertex formats.
//!
//! Three POD layouts, one per batch role:
//! - [`CommandVertex`]: emulated draw commands (triangles, lines, fills)
//! - [`OutputVertex`]: presentation blit into the frontend framebuffer
//! - [`ImageLoadVertex`]: raw VRAM uploads into the render target
//!
//! Layouts are `#[repr(C)]` and uploaded verbatim with `bytemuck`.

mod command;
mod image_load;
mod mode;
mod output;

pub use command::CommandVertex;
pub use image_load::ImageLoadVertex;
pub use mode::{SemiTransparencyMode, TextureBlendMode, TextureDepth, Topology};
pub use output::OutputVertex;

/// A vertex type that can be streamed into a GPU vertex buffer.
pub trait VertexLayout: bytemuck::Pod {
    /// Attribute layout matching the vertex shader inputs of its program.
    fn layout() -> wgpu::VertexBufferLayout<'static>;
}
