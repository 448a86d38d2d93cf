//! Ember engine crate.
//!
//! GPU-side draw engine for a PlayStation-style graphics processor: batches
//! fixed-function 2D draw commands into GPU draws while keeping the
//! hardware's ordering, blending and texel-precision rules.
//!
//! Layout:
//! - `coords` / `vertex`: plain data shared by every layer
//! - `batch`: the generic vertex batch buffer
//! - `backend`: the GPU seam plus the wgpu and software implementations
//! - `renderer`: the orchestrator exposing the per-command API

pub mod backend;
pub mod batch;
pub mod config;
pub mod coords;
pub mod error;
pub mod logging;
pub mod renderer;
pub mod vertex;

pub use backend::software::SoftwareBackend;
pub use backend::Backend;
pub use backend::gpu::{GpuInit, WgpuBackend};
pub use config::{BatchLimits, ColorDepth, DrawConfig, RendererSettings, SettingsProvider, StaticSettings};
pub use coords::{Color, Dimensions, FrontendResolution, TopLeft, VramRect};
pub use error::{CommandKind, FrameFault, RendererError, TransferError, UpscalingDowngrade};
pub use renderer::{DisplayMode, DrawCommand, Frame, Renderer};
pub use vertex::{CommandVertex, SemiTransparencyMode, TextureBlendMode, TextureDepth, Topology};
