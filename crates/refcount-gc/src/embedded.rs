//! Embedded-control-block strategy.
//!
//! The counts and the payload share a single heap block, so one pointer
//! reaches both. Strong handles own the payload; weak handles only keep the
//! block (and its counts) readable, so `lock` can always tell whether the
//! payload is still alive.

use crate::allocator::{Allocator, StrongRef, WeakRef};
use crate::count::Count;
use crate::error::{fatal, RefError};
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;
use std::mem::ManuallyDrop;
use std::ops::{Deref, DerefMut};
use std::ptr::{self, NonNull};
use tracing::{debug, trace};

/// Counts and payload in one allocation.
struct ControlBlock<T> {
    strong: Count,
    /// Weak handles, plus one held jointly by all strong handles.
    weak: Count,
    value: ManuallyDrop<T>,
}

/// Borrow the two counts of a block without touching the payload.
///
/// # Safety
///
/// `block` must point to an allocated control block for the lifetime `'a`.
#[inline]
unsafe fn counts<'a, T>(block: NonNull<ControlBlock<T>>) -> (&'a Count, &'a Count) {
    let ptr = block.as_ptr();
    (&(*ptr).strong, &(*ptr).weak)
}

/// Drop one weak reference and free the block with the last one.
///
/// # Safety
///
/// `block` must point to an allocated control block and the caller must own
/// one of its weak references.
unsafe fn release_weak<T>(block: NonNull<ControlBlock<T>>) {
    let (_, weak) = counts(block);
    let remaining = weak.decrement();
    if remaining == 0 {
        debug!(block = ?block.as_ptr(), "control block freed");
        drop(Box::from_raw(block.as_ptr()));
    }
}

/// Strong handle into an embedded control block.
///
/// # Example
///
/// ```
/// use refcount_gc::{Allocator, EmbeddedAllocator, StrongRef};
///
/// let a = EmbeddedAllocator.allocate(vec![1, 2, 3]);
/// let b = a.clone();
///
/// assert_eq!(a, b);
/// assert_eq!(a.strong_count(), 2);
/// assert_eq!(*b, vec![1, 2, 3]);
/// ```
pub struct Object<T> {
    block: Option<NonNull<ControlBlock<T>>>,
    _marker: PhantomData<ControlBlock<T>>,
}

impl<T> Object<T> {
    fn from_block(block: NonNull<ControlBlock<T>>) -> Self {
        Self {
            block: Some(block),
            _marker: PhantomData,
        }
    }

    #[inline]
    fn counts(&self) -> Option<(&Count, &Count)> {
        // A non-empty strong handle keeps its block allocated.
        self.block.map(|block| unsafe { counts(block) })
    }
}

impl<T> StrongRef<T> for Object<T> {
    type Weak = WeakObject<T>;

    #[inline]
    fn get(&self) -> Option<&T> {
        // The payload stays initialized while any strong handle exists.
        self.block
            .map(|block| unsafe { &*ptr::addr_of!((*block.as_ptr()).value) }.deref())
    }

    fn get_mut(&mut self) -> Option<&mut T> {
        let block = self.block?;
        let (strong, weak) = unsafe { counts(block) };
        if strong.get() == 1 && weak.get() == 1 {
            Some(unsafe { &mut *ptr::addr_of_mut!((*block.as_ptr()).value) }.deref_mut())
        } else {
            None
        }
    }

    #[inline]
    fn as_ptr(&self) -> *const T {
        match self.get() {
            Some(value) => value as *const T,
            None => ptr::null(),
        }
    }

    fn strong_count(&self) -> usize {
        self.counts().map_or(0, |(strong, _)| strong.get())
    }

    fn weak_count(&self) -> usize {
        self.counts().map_or(0, |(_, weak)| weak.get() - 1)
    }

    fn downgrade(&self) -> WeakObject<T> {
        if let Some((_, weak)) = self.counts() {
            let weak = weak.increment();
            trace!(block = ?self.block, weak = weak - 1, "downgrade");
        }
        WeakObject {
            block: self.block,
            _marker: PhantomData,
        }
    }
}

impl<T> Clone for Object<T> {
    fn clone(&self) -> Self {
        if let Some((strong, _)) = self.counts() {
            let strong = strong.increment();
            trace!(block = ?self.block, strong, "increase");
        }
        Self {
            block: self.block,
            _marker: PhantomData,
        }
    }

    fn clone_from(&mut self, source: &Self) {
        if self.block != source.block {
            *self = source.clone();
        }
    }
}

impl<T> Drop for Object<T> {
    fn drop(&mut self) {
        let Some(block) = self.block.take() else {
            return;
        };

        let (strong, _) = unsafe { counts(block) };
        let strong = strong.decrement();
        trace!(block = ?block.as_ptr(), strong, "decrease");
        if strong > 0 {
            return;
        }

        debug!(block = ?block.as_ptr(), "payload released");
        unsafe {
            ManuallyDrop::drop(&mut *ptr::addr_of_mut!((*block.as_ptr()).value));
            // The implicit weak reference shared by all strong handles.
            release_weak(block);
        }
    }
}

impl<T> Default for Object<T> {
    fn default() -> Self {
        Self {
            block: None,
            _marker: PhantomData,
        }
    }
}

impl<T> Deref for Object<T> {
    type Target = T;

    #[track_caller]
    fn deref(&self) -> &T {
        match self.get() {
            Some(value) => value,
            None => fatal(RefError::EmptyHandle),
        }
    }
}

impl<T> PartialEq for Object<T> {
    fn eq(&self, other: &Self) -> bool {
        self.block == other.block
    }
}

impl<T> Eq for Object<T> {}

impl<T> PartialOrd for Object<T> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<T> Ord for Object<T> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.as_ptr().cmp(&other.as_ptr())
    }
}

impl<T> Hash for Object<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        ptr::hash(self.as_ptr(), state);
    }
}

impl<T: fmt::Debug> fmt::Debug for Object<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.get() {
            Some(value) => f
                .debug_struct("Object")
                .field("value", value)
                .field("strong", &self.strong_count())
                .finish(),
            None => f.write_str("Object(<empty>)"),
        }
    }
}

impl<T> fmt::Pointer for Object<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Pointer::fmt(&self.as_ptr(), f)
    }
}

/// Weak handle into an embedded control block.
pub struct WeakObject<T> {
    block: Option<NonNull<ControlBlock<T>>>,
    _marker: PhantomData<ControlBlock<T>>,
}

impl<T> WeakObject<T> {
    #[inline]
    fn counts(&self) -> Option<(&Count, &Count)> {
        // The weak count keeps the block allocated even after the payload drops.
        self.block.map(|block| unsafe { counts(block) })
    }
}

impl<T> WeakRef<T> for WeakObject<T> {
    type Strong = Object<T>;

    fn lock(&self) -> Object<T> {
        match (self.block, self.counts()) {
            (Some(block), Some((strong, _))) if strong.get() > 0 => {
                let strong = strong.increment();
                trace!(block = ?block.as_ptr(), strong, "lock");
                Object::from_block(block)
            }
            _ => Object::default(),
        }
    }

    fn strong_count(&self) -> usize {
        self.counts().map_or(0, |(strong, _)| strong.get())
    }

    fn is_empty(&self) -> bool {
        self.block.is_none()
    }
}

impl<T> Clone for WeakObject<T> {
    fn clone(&self) -> Self {
        if let Some((_, weak)) = self.counts() {
            weak.increment();
        }
        Self {
            block: self.block,
            _marker: PhantomData,
        }
    }
}

impl<T> Drop for WeakObject<T> {
    fn drop(&mut self) {
        if let Some(block) = self.block.take() {
            unsafe { release_weak(block) };
        }
    }
}

impl<T> Default for WeakObject<T> {
    fn default() -> Self {
        Self {
            block: None,
            _marker: PhantomData,
        }
    }
}

impl<T> fmt::Debug for WeakObject<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.block {
            Some(block) => f
                .debug_struct("WeakObject")
                .field("block", &block.as_ptr())
                .field("expired", &self.is_expired())
                .finish(),
            None => f.write_str("WeakObject(<empty>)"),
        }
    }
}

/// Allocator for the embedded-control-block strategy.
///
/// Stateless: every block comes from the global allocator.
#[derive(Debug, Clone, Copy, Default)]
pub struct EmbeddedAllocator;

impl Allocator for EmbeddedAllocator {
    type Strong<T> = Object<T>;
    type Weak<T> = WeakObject<T>;

    fn try_allocate_with<T, E, F>(&self, init: F) -> Result<Object<T>, E>
    where
        F: FnOnce() -> Result<T, E>,
    {
        let value = init()?;
        let block = Box::new(ControlBlock {
            strong: Count::new(1),
            weak: Count::new(1),
            value: ManuallyDrop::new(value),
        });
        let block = NonNull::from(Box::leak(block));
        trace!(block = ?block.as_ptr(), "allocated");
        Ok(Object::from_block(block))
    }
}
