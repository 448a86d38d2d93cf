use crate::batch::VERTEX_BUFFER_LEN;

/// Batch buffer capacities, in vertices.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct BatchLimits {
    /// Opaque command batch.
    pub command: usize,
    /// Semi-transparent staging batch.
    pub semi_transparent: usize,
    /// Image-load batch (six vertices per upload).
    pub image_load: usize,
}

impl Default for BatchLimits {
    fn default() -> Self {
        Self {
            command: VERTEX_BUFFER_LEN,
            semi_transparent: VERTEX_BUFFER_LEN,
            image_load: VERTEX_BUFFER_LEN,
        }
    }
}

impl BatchLimits {
    /// One primitive per flush. Output must match the default limits exactly.
    pub const fn eager() -> Self {
        Self {
            command: 3,
            semi_transparent: 3,
            image_load: 6,
        }
    }

    /// Raises every capacity to what one primitive or upload needs.
    pub(crate) fn sanitized(self) -> Self {
        Self {
            command: self.command.max(3),
            semi_transparent: self.semi_transparent.max(3),
            image_load: self.image_load.max(6),
        }
    }
}
