//! Error types.
//!
//! Two tiers:
//! - [`RendererError`]: construction and reallocation failures, returned to the host
//! - [`FrameFault`]: runtime failures inside a frame, logged and counted; the
//!   offending command is dropped and the frame continues

use crate::batch::BatchFull;
use crate::config::ColorDepth;
use crate::coords::VramRect;

/// Failure to build (or rebuild) the renderer's GPU resources.
#[derive(Debug, thiserror::Error)]
pub enum RendererError {
    #[error("shader `{program}` failed to compile: {message}")]
    ShaderCompile { program: &'static str, message: String },

    #[error("program `{program}` failed to link: {message}")]
    ProgramLink { program: &'static str, message: String },

    #[error("failed to allocate {what}: {message}")]
    Allocation { what: &'static str, message: String },

    #[error("unsupported capability: {0}")]
    UnsupportedCapability(String),

    #[error("no suitable GPU adapter: {0}")]
    NoAdapter(String),

    #[error("failed to create GPU device: {0}")]
    Device(String),
}

/// Failure of a single backend operation while a frame is in flight.
#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    #[error(transparent)]
    BatchFull(#[from] BatchFull),

    #[error("GPU device error: {0}")]
    Device(String),

    #[error("readback failed: {0}")]
    Readback(String),
}

/// Rejected pixel transfer.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransferError {
    #[error("rectangle {x},{y} {w}x{h} lies outside VRAM")]
    OutOfBounds { x: u16, y: u16, w: u16, h: u16 },

    #[error("pixel buffer holds {actual} texels, expected {expected}")]
    LengthMismatch { expected: usize, actual: usize },

    #[error("backend rejected the transfer: {0}")]
    Backend(String),
}

/// Command family a [`FrameFault`] was raised for.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum CommandKind {
    Triangle,
    Line,
    FillRect,
    CopyRect,
    Upload,
    Download,
    Sync,
    Present,
    Flush,
}

/// Runtime fault context: enough to diagnose the dropped command.
#[derive(Debug, Clone)]
pub struct FrameFault {
    pub command: CommandKind,
    /// VRAM region the command touched, if known.
    pub region: Option<VramRect>,
    pub upscaling: u32,
    pub color_depth: ColorDepth,
    pub message: String,
}

impl FrameFault {
    pub(crate) fn log(&self) {
        log::warn!(
            "dropped {:?} command (region {:?}, upscaling {}x, {:?}): {}",
            self.command,
            self.region,
            self.upscaling,
            self.color_depth,
            self.message
        );
    }
}

/// Upscaling change that could not be applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpscalingDowngrade {
    pub requested: u32,
    /// Scale still in use.
    pub kept: u32,
    pub reason: String,
}
