//! # Refcount-GC
//!
//! Deterministic reference counting with two interchangeable bookkeeping
//! placements.
//!
//! ## Strategies
//!
//! - **Embedded control block** ([`EmbeddedAllocator`]): counts and payload
//!   share one heap block.
//! - **Registry** ([`RegistryAllocator`]): payloads are allocated alone and
//!   counted in an explicit [`Registry`] keyed by [`ObjectKey`]s
//!   that are never reissued.
//!
//! Both hand out strong handles (owning, counted) and weak handles
//! (observing, uncounted). A weak handle can be locked back into a strong one
//! only while the payload is alive; the bookkeeping unit outlives the payload
//! until the last weak handle is gone, so locking a released object is
//! always safe and yields an empty handle.
//!
//! Handles are `!Send` and `!Sync`: counting is single-threaded.
//!
//! ## Quick Start
//!
//! ```rust
//! use refcount_gc::{Allocator, EmbeddedAllocator, StrongRef, WeakRef};
//!
//! let strong = EmbeddedAllocator.allocate(String::from("hello"));
//! let weak = strong.downgrade();
//! assert_eq!(weak.lock().as_str(), "hello");
//!
//! drop(strong);
//! assert!(weak.lock().is_empty());
//! ```

mod allocator;
mod config;
mod count;
pub mod embedded;
mod error;
mod key;
pub mod registered;
mod registry;

pub use allocator::{Allocator, StrongRef, WeakRef};
pub use config::{RegistryConfig, REGISTRY_CAPACITY_VAR};
pub use embedded::EmbeddedAllocator;
pub use error::{RefError, RefResult};
pub use key::{Epoch, ObjectKey};
pub use registered::RegistryAllocator;
pub use registry::Registry;
