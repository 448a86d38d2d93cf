/// Primitive ordering counter.
///
/// Hands out one order index per primitive within an epoch. Indices fit the
/// order buffer's `i16` range; once exhausted the caller must flush, clear
/// the order buffer and [`reset`](Self::reset) before drawing again.
#[derive(Debug, Clone, Default)]
pub(crate) struct OrderCounter {
    next: i32,
    epoch: u64,
}

impl OrderCounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Next order index, or `None` when the epoch is exhausted.
    #[inline]
    pub fn take(&mut self) -> Option<i16> {
        let order = i16::try_from(self.next).ok()?;
        self.next += 1;
        Some(order)
    }

    /// Indices handed out in the current epoch.
    #[inline]
    pub fn used(&self) -> u32 {
        self.next as u32
    }

    #[inline]
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    /// Starts a new epoch at order 0.
    pub fn reset(&mut self) {
        self.next = 0;
        self.epoch += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn indices_increase_from_zero() {
        let mut c = OrderCounter::new();
        assert_eq!(c.take(), Some(0));
        assert_eq!(c.take(), Some(1));
        assert_eq!(c.used(), 2);
    }

    #[test]
    fn exhausts_after_i16_max() {
        let mut c = OrderCounter::new();
        for _ in 0..=i16::MAX as i32 {
            assert!(c.take().is_some());
        }
        assert_eq!(c.take(), None);
        assert_eq!(c.take(), None);
    }

    #[test]
    fn reset_starts_a_new_epoch() {
        let mut c = OrderCounter::new();
        c.take();
        c.reset();
        assert_eq!(c.epoch(), 1);
        assert_eq!(c.take(), Some(0));
    }
}
