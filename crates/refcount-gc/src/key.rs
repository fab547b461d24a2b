//! Registry keys.
//!
//! A registry slot hosts a sequence of objects over its lifetime. Each
//! occupant gets the next epoch, so a key names exactly one object even after
//! its slot has been handed to a successor. A slot whose epochs run out is
//! retired instead of wrapping back to an epoch that old keys may still hold.

use std::fmt;

/// Occupancy counter of a registry slot.
pub type Epoch = u32;

/// Epoch of the first object stored in a fresh slot.
pub(crate) const FIRST_EPOCH: Epoch = 1;

/// Identity of one object tracked by a [`Registry`](crate::Registry).
///
/// Ordering is by slot, then epoch. Keys are only meaningful for the registry
/// that issued them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectKey {
    slot: u32,
    epoch: Epoch,
}

impl ObjectKey {
    /// Key for the first occupant of a freshly pushed slot.
    #[inline]
    pub(crate) const fn first(slot: u32) -> Self {
        Self {
            slot,
            epoch: FIRST_EPOCH,
        }
    }

    /// Key the next occupant of this slot will get, `None` once the slot's
    /// epochs are exhausted.
    #[inline]
    pub(crate) fn successor(self) -> Option<Self> {
        self.epoch.checked_add(1).map(|epoch| Self {
            slot: self.slot,
            epoch,
        })
    }

    /// Index of the slot in the registry table.
    #[inline]
    pub const fn slot(self) -> u32 {
        self.slot
    }

    #[inline]
    pub const fn epoch(self) -> Epoch {
        self.epoch
    }

    /// True when `self` named an earlier occupant of `other`'s slot.
    pub fn precedes(self, other: ObjectKey) -> bool {
        self.slot == other.slot && self.epoch < other.epoch
    }
}

impl fmt::Display for ObjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}v{}", self.slot, self.epoch)
    }
}

#[cfg(test)]
impl ObjectKey {
    pub(crate) const fn at(slot: u32, epoch: Epoch) -> Self {
        Self { slot, epoch }
    }
}
