//! Renderer configuration.
//!
//! - [`DrawConfig`]: the host's draw-state snapshot at construction time
//! - [`RendererSettings`] / [`SettingsProvider`]: frontend options polled by
//!   `Renderer::refresh_variables`
//! - [`BatchLimits`]: batch buffer capacities
//!
//! Option parsing and persistence belong to the host; everything here is
//! already typed.

mod draw;
mod limits;
mod settings;

pub use draw::{ColorDepth, DrawConfig};
pub use limits::BatchLimits;
pub use settings::{RendererSettings, SettingsProvider, StaticSettings, MAX_UPSCALING};
