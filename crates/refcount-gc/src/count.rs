//! Single-threaded reference counter.
//!
//! Handles in this crate are `!Send + !Sync`, so a plain `Cell` is enough to
//! mutate a count through a shared reference to its control block.

use std::cell::Cell;
use std::fmt;

/// A non-atomic count stored inside a bookkeeping unit.
#[derive(Default)]
pub(crate) struct Count(Cell<usize>);

impl Count {
    #[inline]
    pub(crate) const fn new(initial: usize) -> Self {
        Self(Cell::new(initial))
    }

    #[inline]
    pub(crate) fn get(&self) -> usize {
        self.0.get()
    }

    /// Increment and return the new value.
    #[inline]
    pub(crate) fn increment(&self) -> usize {
        let val = self.0.get() + 1;
        self.0.set(val);
        val
    }

    /// Decrement and return the new value.
    #[inline]
    pub(crate) fn decrement(&self) -> usize {
        let val = self.0.get();
        debug_assert!(val > 0, "Decrementing zero reference count");
        let val = val.saturating_sub(1);
        self.0.set(val);
        val
    }
}

impl fmt::Debug for Count {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.get())
    }
}
