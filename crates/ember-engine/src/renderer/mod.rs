//! Renderer orchestrator.
//!
//! [`Renderer`] owns the batches, the ordering counter and the draw
//! configuration, and exposes one method per emulated command plus the
//! frame lifecycle:
//!
//! ```text
//! prepare_render → draw(..)* → finalize_frame → Frame
//! ```

mod command;
mod frame;
mod orchestrator;
mod ordering;
mod regions;

pub use command::DrawCommand;
pub use frame::{DisplayMode, Frame};
pub use orchestrator::Renderer;
