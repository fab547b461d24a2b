//! Out-of-line bookkeeping table for the registry strategy.
//!
//! A [`Registry`] holds strong and weak counts for objects whose payloads
//! live elsewhere. Each object gets a slot identified by an [`ObjectKey`];
//! freed slots go on a free list and are reused under a later epoch.
//!
//! Registries are explicit values shared through `Rc`, so every
//! [`RegistryAllocator`](crate::RegistryAllocator) can own an isolated table
//! and the table is torn down with its last handle.

use crate::config::RegistryConfig;
use crate::error::{RefError, RefResult};
use crate::key::ObjectKey;
use std::cell::RefCell;
use std::fmt;
use tracing::{debug, trace, warn};

/// Slot state in the registry.
#[derive(Debug)]
enum Slot {
    /// At least one strong handle exists.
    Live {
        key: ObjectKey,
        strong: usize,
        weak: usize,
    },
    /// Payload released; weak handles still point here.
    Expired { key: ObjectKey, weak: usize },
    /// Reusable slot; `next` is the key its next occupant gets.
    Free {
        next_free: Option<u32>,
        next: ObjectKey,
    },
    /// Every epoch has been handed out. Never reused.
    Retired,
}

impl Slot {
    /// True when this slot currently tracks the object named by `key`.
    fn tracks(&self, key: ObjectKey) -> bool {
        match self {
            Slot::Live { key: held, .. } | Slot::Expired { key: held, .. } => *held == key,
            Slot::Free { .. } | Slot::Retired => false,
        }
    }
}

/// Outcome of dropping one strong reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Release {
    /// Other strong references remain; carries the new count.
    Retained(usize),
    /// That was the last strong reference. The caller owns payload teardown.
    Released,
}

#[derive(Debug, Default)]
struct Slots {
    slots: Vec<Slot>,
    free_head: Option<u32>,
    live: usize,
}

impl Slots {
    fn insert(&mut self) -> ObjectKey {
        let key = match self.free_head {
            Some(free_idx) => {
                let slot = &mut self.slots[free_idx as usize];
                let (next_free, key) = match *slot {
                    Slot::Free { next_free, next } => (next_free, next),
                    _ => unreachable!("free head pointed to an occupied slot"),
                };
                self.free_head = next_free;
                *slot = Slot::Live {
                    key,
                    strong: 1,
                    weak: 0,
                };
                key
            }
            None => {
                let key = ObjectKey::first(self.slots.len() as u32);
                self.slots.push(Slot::Live {
                    key,
                    strong: 1,
                    weak: 0,
                });
                key
            }
        };
        self.live += 1;
        key
    }

    fn slot_mut(&mut self, key: ObjectKey) -> RefResult<&mut Slot> {
        match self.slots.get_mut(key.slot() as usize) {
            Some(slot) if slot.tracks(key) => Ok(slot),
            _ => Err(RefError::Unregistered(key)),
        }
    }

    fn find(&self, key: ObjectKey) -> Option<&Slot> {
        self.slots.get(key.slot() as usize).filter(|slot| slot.tracks(key))
    }

    /// Hand the slot of `key` to its next occupant, or retire it.
    fn free(&mut self, key: ObjectKey) {
        let index = key.slot();
        match key.successor() {
            Some(next) => {
                self.slots[index as usize] = Slot::Free {
                    next_free: self.free_head,
                    next,
                };
                self.free_head = Some(index);
                debug!(%key, "registry slot freed");
            }
            None => {
                self.slots[index as usize] = Slot::Retired;
                warn!(%key, "registry slot retired after exhausting its epochs");
            }
        }
    }
}

/// Table of reference counts keyed by [`ObjectKey`].
///
/// Mutating operations are crate-internal: counts only move through the
/// handles in [`registered`](crate::registered), which keeps every payload
/// pointer they hold valid. The public surface is read-only.
///
/// # Example
///
/// ```
/// use refcount_gc::{Allocator, RegistryAllocator, StrongRef};
///
/// let alloc = RegistryAllocator::new();
/// let obj = alloc.allocate(7);
/// let key = obj.key().unwrap();
///
/// assert_eq!(alloc.registry().strong_count(key), Some(1));
/// drop(obj);
/// assert!(!alloc.registry().contains(key));
/// ```
pub struct Registry {
    inner: RefCell<Slots>,
}

impl Registry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            inner: RefCell::new(Slots::default()),
        }
    }

    /// Create a registry with room for `capacity` slots.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            inner: RefCell::new(Slots {
                slots: Vec::with_capacity(capacity),
                ..Slots::default()
            }),
        }
    }

    pub fn from_config(config: &RegistryConfig) -> Self {
        Self::with_capacity(config.initial_capacity)
    }

    /// Number of objects with at least one strong reference.
    #[inline]
    pub fn len(&self) -> usize {
        self.inner.borrow().live
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Total slot capacity, including free and expired slots.
    pub fn capacity(&self) -> usize {
        self.inner.borrow().slots.capacity()
    }

    /// True while the object has at least one strong reference.
    pub fn contains(&self, key: ObjectKey) -> bool {
        self.strong_count(key).is_some()
    }

    /// Strong count of a live object, `None` once released.
    pub fn strong_count(&self, key: ObjectKey) -> Option<usize> {
        match self.inner.borrow().find(key) {
            Some(Slot::Live { strong, .. }) => Some(*strong),
            _ => None,
        }
    }

    /// Weak count of an object that is live or still observed.
    pub fn weak_count(&self, key: ObjectKey) -> Option<usize> {
        match self.inner.borrow().find(key) {
            Some(Slot::Live { weak, .. } | Slot::Expired { weak, .. }) => Some(*weak),
            _ => None,
        }
    }

    /// True when exactly one strong and no weak reference exist.
    pub fn is_unique(&self, key: ObjectKey) -> bool {
        matches!(
            self.inner.borrow().find(key),
            Some(Slot::Live {
                strong: 1,
                weak: 0,
                ..
            })
        )
    }

    /// Register a new object with a strong count of 1.
    pub(crate) fn register(&self) -> ObjectKey {
        let key = self.inner.borrow_mut().insert();
        trace!(%key, "registered");
        key
    }

    /// Add a strong reference to a live object.
    pub(crate) fn increase(&self, key: ObjectKey) -> RefResult<usize> {
        let mut inner = self.inner.borrow_mut();
        match inner.slot_mut(key)? {
            Slot::Live { strong, .. } => {
                *strong += 1;
                trace!(%key, strong = *strong, "increase");
                Ok(*strong)
            }
            Slot::Expired { .. } => Err(RefError::Expired(key)),
            Slot::Free { .. } | Slot::Retired => Err(RefError::Unregistered(key)),
        }
    }

    /// Add a strong reference only if the object is still live.
    ///
    /// Returns `Ok(None)` for an expired object.
    pub(crate) fn lock(&self, key: ObjectKey) -> RefResult<Option<usize>> {
        let mut inner = self.inner.borrow_mut();
        match inner.slot_mut(key)? {
            Slot::Live { strong, .. } => {
                *strong += 1;
                trace!(%key, strong = *strong, "lock");
                Ok(Some(*strong))
            }
            Slot::Expired { .. } => {
                trace!(%key, "lock on expired object");
                Ok(None)
            }
            Slot::Free { .. } | Slot::Retired => Err(RefError::Unregistered(key)),
        }
    }

    /// Drop a strong reference.
    ///
    /// On the last one the slot becomes expired (weak observers remain) or
    /// free (none remain).
    pub(crate) fn decrease(&self, key: ObjectKey) -> RefResult<Release> {
        let mut inner = self.inner.borrow_mut();
        let weak = match inner.slot_mut(key)? {
            Slot::Live { strong, weak, .. } => {
                debug_assert!(*strong > 0, "Decrementing zero reference count");
                *strong -= 1;
                trace!(%key, strong = *strong, "decrease");
                if *strong > 0 {
                    return Ok(Release::Retained(*strong));
                }
                *weak
            }
            Slot::Expired { .. } => return Err(RefError::Expired(key)),
            Slot::Free { .. } | Slot::Retired => return Err(RefError::Unregistered(key)),
        };

        inner.live -= 1;
        if weak == 0 {
            inner.free(key);
        } else {
            inner.slots[key.slot() as usize] = Slot::Expired { key, weak };
            debug!(%key, weak, "object expired with weak observers");
        }
        Ok(Release::Released)
    }

    /// Add a weak reference to a live or expired object.
    pub(crate) fn downgrade(&self, key: ObjectKey) -> RefResult<usize> {
        let mut inner = self.inner.borrow_mut();
        match inner.slot_mut(key)? {
            Slot::Live { weak, .. } | Slot::Expired { weak, .. } => {
                *weak += 1;
                trace!(%key, weak = *weak, "downgrade");
                Ok(*weak)
            }
            Slot::Free { .. } | Slot::Retired => Err(RefError::Unregistered(key)),
        }
    }

    /// Drop a weak reference, freeing an expired slot with the last one.
    pub(crate) fn release_weak(&self, key: ObjectKey) -> RefResult<usize> {
        let mut inner = self.inner.borrow_mut();
        let (remaining, expired) = match inner.slot_mut(key)? {
            Slot::Live { weak, .. } => {
                debug_assert!(*weak > 0, "Decrementing zero weak count");
                *weak = weak.saturating_sub(1);
                (*weak, false)
            }
            Slot::Expired { weak, .. } => {
                debug_assert!(*weak > 0, "Decrementing zero weak count");
                *weak = weak.saturating_sub(1);
                (*weak, true)
            }
            Slot::Free { .. } | Slot::Retired => return Err(RefError::Unregistered(key)),
        };
        trace!(%key, weak = remaining, "release weak");

        if expired && remaining == 0 {
            inner.free(key);
        }
        Ok(remaining)
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.borrow();
        f.debug_struct("Registry")
            .field("live", &inner.live)
            .field("slots", &inner.slots.len())
            .finish()
    }
}
