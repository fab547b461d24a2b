//! Capability traits shared by both strategies.
//!
//! Code written against [`Allocator`] works unchanged with
//! [`EmbeddedAllocator`](crate::EmbeddedAllocator) and
//! [`RegistryAllocator`](crate::RegistryAllocator).

use crate::error::{RefError, RefResult};
use std::convert::Infallible;
use std::hash::Hash;
use std::ops::Deref;

/// An owning, reference-counted handle.
///
/// A default-constructed handle is empty. Equality, ordering and hashing
/// use the identity of the target, never the payload value.
pub trait StrongRef<T>: Clone + Default + Deref<Target = T> + Eq + Ord + Hash {
    /// Matching non-owning handle.
    type Weak: WeakRef<T, Strong = Self>;

    /// Borrow the payload, `None` for an empty handle.
    fn get(&self) -> Option<&T>;

    /// Mutable access when this is the only strong handle and nothing
    /// observes the target weakly.
    fn get_mut(&mut self) -> Option<&mut T>;

    /// Address of the payload, null for an empty handle.
    fn as_ptr(&self) -> *const T;

    fn strong_count(&self) -> usize;

    fn weak_count(&self) -> usize;

    /// Create a weak handle to the same target.
    fn downgrade(&self) -> Self::Weak;

    fn try_get(&self) -> RefResult<&T> {
        self.get().ok_or(RefError::EmptyHandle)
    }

    #[inline]
    fn is_empty(&self) -> bool {
        self.as_ptr().is_null()
    }

    /// Move the target out, leaving this handle empty.
    fn take(&mut self) -> Self {
        std::mem::take(self)
    }

    /// True when both handles refer to the same target.
    fn ptr_eq(&self, other: &Self) -> bool {
        self.as_ptr() == other.as_ptr()
    }
}

/// A non-owning handle that never affects the strong count.
pub trait WeakRef<T>: Clone + Default {
    type Strong: StrongRef<T, Weak = Self>;

    /// Produce a new strong handle if the target is still alive, otherwise
    /// an empty one.
    fn lock(&self) -> Self::Strong;

    /// Strong count of the target, 0 once it has been released.
    fn strong_count(&self) -> usize;

    /// True for a default-constructed handle.
    fn is_empty(&self) -> bool;

    /// `Option` form of [`lock`](WeakRef::lock).
    fn upgrade(&self) -> Option<Self::Strong> {
        let strong = self.lock();
        if strong.is_empty() {
            None
        } else {
            Some(strong)
        }
    }

    fn is_expired(&self) -> bool {
        self.strong_count() == 0
    }
}

/// Allocation strategy exposing its handle types.
///
/// # Example
///
/// ```
/// use refcount_gc::{Allocator, EmbeddedAllocator, RegistryAllocator, StrongRef, WeakRef};
///
/// fn roundtrip<A: Allocator>(alloc: &A) -> usize {
///     let strong = alloc.allocate(String::from("hello"));
///     let weak: A::Weak<String> = strong.downgrade();
///     weak.lock().strong_count()
/// }
///
/// assert_eq!(roundtrip(&EmbeddedAllocator), 2);
/// assert_eq!(roundtrip(&RegistryAllocator::new()), 2);
/// ```
pub trait Allocator {
    type Strong<T>: StrongRef<T, Weak = Self::Weak<T>>;
    type Weak<T>: WeakRef<T, Strong = Self::Strong<T>>;

    /// Construct the payload, then allocate its bookkeeping.
    ///
    /// If `init` fails nothing has been allocated or registered.
    fn try_allocate_with<T, E, F>(&self, init: F) -> Result<Self::Strong<T>, E>
    where
        F: FnOnce() -> Result<T, E>;

    /// Allocate `value` with a strong count of 1.
    fn allocate<T>(&self, value: T) -> Self::Strong<T> {
        self.allocate_with(|| value)
    }

    fn allocate_with<T, F>(&self, init: F) -> Self::Strong<T>
    where
        F: FnOnce() -> T,
    {
        match self.try_allocate_with(|| Ok::<T, Infallible>(init())) {
            Ok(strong) => strong,
            Err(never) => match never {},
        }
    }
}
