//! Vertex batch buffers.
//!
//! A [`DrawBuffer`] stages vertices of one layout on the CPU and hands them to
//! a [`DrawSink`] (a backend program) in a single draw. Buffers never know
//! which backend they feed; the pass descriptor travels with each flush.

mod buffer;

pub use buffer::{BatchFull, DrawBuffer, DrawSink, FlushPolicy};

/// Nominal capacity of every batch buffer, in vertices.
pub const VERTEX_BUFFER_LEN: usize = 2048;
