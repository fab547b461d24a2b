//! Registry strategy.
//!
//! Payloads are boxed on their own; their counts live in a shared
//! [`Registry`]. Each handle carries the registry it was allocated from, so
//! several allocators can coexist without sharing state.

use crate::allocator::{Allocator, StrongRef, WeakRef};
use crate::config::RegistryConfig;
use crate::error::{fatal, RefError};
use crate::key::ObjectKey;
use crate::registry::{Registry, Release};
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;
use std::ops::Deref;
use std::ptr::{self, NonNull};
use std::rc::Rc;
use tracing::debug;

/// Where a handle points: payload, registry slot, and the registry itself.
struct Target<T> {
    ptr: NonNull<T>,
    key: ObjectKey,
    registry: Rc<Registry>,
}

/// Which registry entry a handle refers to.
///
/// Payload addresses are not unique for zero-sized types, so identity is the
/// registry plus the key it issued.
type Identity = (*const Registry, ObjectKey);

impl<T> Target<T> {
    fn identity(&self) -> Identity {
        (Rc::as_ptr(&self.registry), self.key)
    }

    fn share(&self) -> Self {
        Self {
            ptr: self.ptr,
            key: self.key,
            registry: Rc::clone(&self.registry),
        }
    }
}

/// Strong handle to a registry-tracked payload.
///
/// # Example
///
/// ```
/// use refcount_gc::{Allocator, RegistryAllocator, StrongRef, WeakRef};
///
/// let alloc = RegistryAllocator::new();
/// let strong = alloc.allocate(43);
/// let weak = strong.downgrade();
///
/// let locked = weak.lock();
/// assert_eq!(locked.as_ptr(), strong.as_ptr());
/// assert_eq!(strong.strong_count(), 2);
/// ```
pub struct Object<T> {
    target: Option<Target<T>>,
    _marker: PhantomData<T>,
}

impl<T> Object<T> {
    fn from_target(target: Target<T>) -> Self {
        Self {
            target: Some(target),
            _marker: PhantomData,
        }
    }

    /// Registry key of the target, `None` for an empty handle.
    pub fn key(&self) -> Option<ObjectKey> {
        self.target.as_ref().map(|t| t.key)
    }

    /// Registry the target is tracked in.
    pub fn registry(&self) -> Option<&Rc<Registry>> {
        self.target.as_ref().map(|t| &t.registry)
    }

    #[inline]
    fn identity(&self) -> Option<Identity> {
        self.target.as_ref().map(Target::identity)
    }
}

impl<T> StrongRef<T> for Object<T> {
    type Weak = WeakObject<T>;

    #[inline]
    fn get(&self) -> Option<&T> {
        // A live strong handle keeps the payload allocated.
        self.target.as_ref().map(|t| unsafe { t.ptr.as_ref() })
    }

    fn get_mut(&mut self) -> Option<&mut T> {
        let target = self.target.as_mut()?;
        if target.registry.is_unique(target.key) {
            Some(unsafe { target.ptr.as_mut() })
        } else {
            None
        }
    }

    #[inline]
    fn as_ptr(&self) -> *const T {
        self.target
            .as_ref()
            .map_or(ptr::null(), |t| t.ptr.as_ptr() as *const T)
    }

    fn strong_count(&self) -> usize {
        self.target
            .as_ref()
            .and_then(|t| t.registry.strong_count(t.key))
            .unwrap_or(0)
    }

    fn weak_count(&self) -> usize {
        self.target
            .as_ref()
            .and_then(|t| t.registry.weak_count(t.key))
            .unwrap_or(0)
    }

    fn downgrade(&self) -> WeakObject<T> {
        let target = self.target.as_ref().map(|t| {
            if let Err(err) = t.registry.downgrade(t.key) {
                fatal(err);
            }
            t.share()
        });
        WeakObject { target }
    }

    fn ptr_eq(&self, other: &Self) -> bool {
        self.identity() == other.identity()
    }
}

impl<T> Clone for Object<T> {
    fn clone(&self) -> Self {
        let target = self.target.as_ref().map(|t| {
            if let Err(err) = t.registry.increase(t.key) {
                fatal(err);
            }
            t.share()
        });
        Self {
            target,
            _marker: PhantomData,
        }
    }

    fn clone_from(&mut self, source: &Self) {
        if !self.ptr_eq(source) {
            *self = source.clone();
        }
    }
}

impl<T> Drop for Object<T> {
    fn drop(&mut self) {
        let Some(target) = self.target.take() else {
            return;
        };

        match target.registry.decrease(target.key) {
            Ok(Release::Retained(_)) => {}
            Ok(Release::Released) => {
                debug!(key = %target.key, "payload released");
                // The registry borrow has ended, so the payload's own drop may
                // touch the same registry.
                drop(unsafe { Box::from_raw(target.ptr.as_ptr()) });
            }
            Err(err) => fatal(err),
        }
    }
}

impl<T> Default for Object<T> {
    fn default() -> Self {
        Self {
            target: None,
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
        self.ptr_eq(other)
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
        self.identity().cmp(&other.identity())
    }
}

impl<T> Hash for Object<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.identity().hash(state);
    }
}

impl<T: fmt::Debug> fmt::Debug for Object<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.target, self.get()) {
            (Some(target), Some(value)) => f
                .debug_struct("Object")
                .field("key", &target.key)
                .field("value", value)
                .finish(),
            _ => f.write_str("Object(<empty>)"),
        }
    }
}

impl<T> fmt::Pointer for Object<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Pointer::fmt(&self.as_ptr(), f)
    }
}

/// Weak handle to a registry-tracked payload.
///
/// Holding one keeps the registry slot from being reused, never the payload.
pub struct WeakObject<T> {
    target: Option<Target<T>>,
}

impl<T> WeakObject<T> {
    pub fn key(&self) -> Option<ObjectKey> {
        self.target.as_ref().map(|t| t.key)
    }
}

impl<T> WeakRef<T> for WeakObject<T> {
    type Strong = Object<T>;

    fn lock(&self) -> Object<T> {
        let Some(target) = &self.target else {
            return Object::default();
        };
        match target.registry.lock(target.key) {
            Ok(Some(_)) => Object::from_target(target.share()),
            Ok(None) => Object::default(),
            Err(err) => fatal(err),
        }
    }

    fn strong_count(&self) -> usize {
        self.target
            .as_ref()
            .and_then(|t| t.registry.strong_count(t.key))
            .unwrap_or(0)
    }

    fn is_empty(&self) -> bool {
        self.target.is_none()
    }
}

impl<T> Clone for WeakObject<T> {
    fn clone(&self) -> Self {
        let target = self.target.as_ref().map(|t| {
            if let Err(err) = t.registry.downgrade(t.key) {
                fatal(err);
            }
            t.share()
        });
        Self { target }
    }
}

impl<T> Drop for WeakObject<T> {
    fn drop(&mut self) {
        if let Some(target) = self.target.take() {
            if let Err(err) = target.registry.release_weak(target.key) {
                fatal(err);
            }
        }
    }
}

impl<T> Default for WeakObject<T> {
    fn default() -> Self {
        Self { target: None }
    }
}

impl<T> fmt::Debug for WeakObject<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("WeakObject").field(&self.key()).finish()
    }
}

/// Allocator for the registry strategy.
///
/// Owns (a share of) the registry its objects are counted in.
#[derive(Debug, Clone, Default)]
pub struct RegistryAllocator {
    registry: Rc<Registry>,
}

impl RegistryAllocator {
    /// Create an allocator with a fresh, private registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an allocator that counts into an existing registry.
    pub fn with_registry(registry: Rc<Registry>) -> Self {
        Self { registry }
    }

    pub fn from_config(config: &RegistryConfig) -> Self {
        Self::with_registry(Rc::new(Registry::from_config(config)))
    }

    pub fn registry(&self) -> &Rc<Registry> {
        &self.registry
    }
}

impl Allocator for RegistryAllocator {
    type Strong<T> = Object<T>;
    type Weak<T> = WeakObject<T>;

    fn try_allocate_with<T, E, F>(&self, init: F) -> Result<Object<T>, E>
    where
        F: FnOnce() -> Result<T, E>,
    {
        let value = init()?;
        let ptr = NonNull::from(Box::leak(Box::new(value)));
        let key = self.registry.register();
        Ok(Object::from_target(Target {
            ptr,
            key,
            registry: Rc::clone(&self.registry),
        }))
    }
}
