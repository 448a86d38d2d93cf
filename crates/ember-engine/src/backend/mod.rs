//! GPU seam.
//!
//! The renderer talks to the GPU only through [`Backend`]: three
//! [`DrawSink`]s (one per vertex format / program) plus texel-store
//! operations. Two implementations:
//! - [`gpu::WgpuBackend`]: wgpu programs and textures
//! - [`software::SoftwareBackend`]: CPU reference rasterizer with the same
//!   semantics, used for tests and headless replay
//!
//! Every call is synchronous from the caller's point of view: once it
//! returns, later calls observe its writes.

mod frame;
mod pass;

pub mod gpu;
pub mod software;

pub use frame::Frame;
pub use pass::{CommandPass, CommandPassKind, DrawState, ImageLoadPass, OutputPass, DITHER_MATRIX};

use crate::batch::DrawSink;
use crate::coords::{FrontendResolution, VramRect};
use crate::error::{BackendError, RendererError};
use crate::vertex::{CommandVertex, ImageLoadVertex, OutputVertex};

/// Host GPU abstraction used by the renderer.
///
/// Texel store pair:
/// - native store: 1024 × 512 16-bit texels, texture-read source for draws
/// - render target: `1024·s × 512·s` color + order buffer, draw destination
pub trait Backend:
    DrawSink<CommandVertex, Pass = CommandPass>
    + DrawSink<ImageLoadVertex, Pass = ImageLoadPass>
    + DrawSink<OutputVertex, Pass = OutputPass>
{
    /// Short identifier for logs.
    fn name(&self) -> &'static str;

    /// Current render-target scale.
    fn upscaling(&self) -> u32;

    /// Largest scale the device can allocate.
    fn max_upscaling(&self) -> u32;

    /// Whether outline rasterization is available.
    fn supports_wireframe(&self) -> bool;

    /// Reallocates the render target and order buffer at `upscaling`.
    ///
    /// Render-target contents are undefined afterwards; the native store is
    /// untouched. On error the previous allocation stays valid.
    fn reallocate(&mut self, upscaling: u32) -> Result<(), RendererError>;

    /// Resets the order buffer so any order index passes.
    fn clear_order(&mut self) -> Result<(), BackendError>;

    /// Writes `texels` (row-major, exactly `rect` sized) into the native store.
    fn write_native(&mut self, rect: VramRect, texels: &[u16]) -> Result<(), BackendError>;

    /// Reads `rect` from the native store.
    fn read_native(&mut self, rect: VramRect) -> Result<Vec<u16>, BackendError>;

    /// Downsamples `rect` of the render target into the native store
    /// (nearest neighbor: native `(x, y)` takes target `(x·s, y·s)`).
    fn sync_native(&mut self, rect: VramRect) -> Result<(), BackendError>;

    /// (Re)binds the frontend framebuffer that output draws land in.
    fn bind_frontend(&mut self, resolution: FrontendResolution) -> Result<(), BackendError>;

    /// Reads back the frontend framebuffer.
    fn frontend_frame(&mut self) -> Result<Frame, BackendError>;
}
