use crate::error::BackendError;

/// Consumer of a staged vertex run: one draw call with the sink's program.
pub trait DrawSink<V> {
    /// Per-draw state (topology, blend configuration, scissor, ...).
    type Pass;

    fn draw(&mut self, vertices: &[V], pass: &Self::Pass) -> Result<(), BackendError>;
}

/// What happens to staged vertices when the buffer is flushed.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum FlushPolicy {
    /// Drawn once, then discarded. A push that does not fit flushes first.
    Discard,
    /// Kept after a flush and redrawn until [`DrawBuffer::clear`].
    /// Pushing past capacity is an error.
    Retain,
}

/// Returned when a push does not fit and the buffer cannot make room itself.
#[derive(Debug, Copy, Clone, Eq, PartialEq, thiserror::Error)]
#[error("{label}: {requested} vertices do not fit ({remaining} of {capacity} free)")]
pub struct BatchFull {
    pub label: &'static str,
    pub requested: usize,
    pub remaining: usize,
    pub capacity: usize,
}

/// Capacity-bounded, typed vertex accumulator.
///
/// Performance characteristics:
/// - `push()` is O(n) in the pushed vertices, no allocation after construction
/// - `flush()` issues exactly one draw when non-empty
#[derive(Debug)]
pub struct DrawBuffer<V> {
    label: &'static str,
    staged: Vec<V>,
    capacity: usize,
    policy: FlushPolicy,
}

impl<V: Copy> DrawBuffer<V> {
    /// Creates a buffer holding at most `capacity` vertices (at least 1).
    pub fn new(label: &'static str, capacity: usize, policy: FlushPolicy) -> Self {
        let capacity = capacity.max(1);
        Self {
            label,
            staged: Vec::with_capacity(capacity),
            capacity,
            policy,
        }
    }

    #[inline]
    pub fn label(&self) -> &'static str {
        self.label
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.staged.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.staged.is_empty()
    }

    #[inline]
    pub fn remaining(&self) -> usize {
        self.capacity - self.staged.len()
    }

    #[inline]
    pub fn policy(&self) -> FlushPolicy {
        self.policy
    }

    /// Staged vertices in push order.
    #[inline]
    pub fn vertices(&self) -> &[V] {
        &self.staged
    }

    /// Returns true if `n` more vertices fit without a flush.
    #[inline]
    pub fn fits(&self, n: usize) -> bool {
        n <= self.remaining()
    }

    /// Appends `vertices` if they fit.
    pub fn try_push(&mut self, vertices: &[V]) -> Result<(), BatchFull> {
        if !self.fits(vertices.len()) {
            return Err(BatchFull {
                label: self.label,
                requested: vertices.len(),
                remaining: self.remaining(),
                capacity: self.capacity,
            });
        }
        self.staged.extend_from_slice(vertices);
        Ok(())
    }

    /// Appends `vertices`, flushing into `sink` first if they would not fit.
    ///
    /// Only [`FlushPolicy::Discard`] buffers flush implicitly; a retained
    /// buffer reports [`BackendError::BatchFull`] instead.
    pub fn push<S>(&mut self, vertices: &[V], sink: &mut S, pass: &S::Pass) -> Result<(), BackendError>
    where
        S: DrawSink<V>,
    {
        match self.try_push(vertices) {
            Ok(()) => Ok(()),
            Err(full) if self.policy == FlushPolicy::Retain || vertices.len() > self.capacity => {
                Err(BackendError::BatchFull(full))
            }
            Err(_) => {
                self.flush(sink, pass)?;
                self.try_push(vertices).map_err(BackendError::BatchFull)
            }
        }
    }

    /// Draws every staged vertex in one call.
    ///
    /// Discard buffers are empty afterwards, even when the draw failed: a
    /// failed batch is dropped so the rest of the frame can proceed.
    pub fn flush<S>(&mut self, sink: &mut S, pass: &S::Pass) -> Result<(), BackendError>
    where
        S: DrawSink<V>,
    {
        if self.staged.is_empty() {
            return Ok(());
        }
        let result = sink.draw(&self.staged, pass);
        if self.policy == FlushPolicy::Discard {
            self.staged.clear();
        }
        result
    }

    /// Drops staged vertices without drawing them.
    #[inline]
    pub fn clear(&mut self) {
        self.staged.clear();
    }
}
