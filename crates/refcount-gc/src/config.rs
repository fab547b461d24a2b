//! Registry configuration.
//!
//! # Environment Variables
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `REFCOUNT_GC_REGISTRY_CAPACITY` | Slots reserved up front by a new registry | 64 |
//!
//! # Example
//!
//! ```
//! use refcount_gc::{RegistryAllocator, RegistryConfig};
//!
//! let config = RegistryConfig::default().with_initial_capacity(1024);
//! let alloc = RegistryAllocator::from_config(&config);
//! assert!(alloc.registry().capacity() >= 1024);
//! ```

use std::env;

/// Environment variable read by [`RegistryConfig::from_env`].
pub const REGISTRY_CAPACITY_VAR: &str = "REFCOUNT_GC_REGISTRY_CAPACITY";

const DEFAULT_INITIAL_CAPACITY: usize = 64;

/// Settings for a [`Registry`](crate::Registry).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegistryConfig {
    /// Number of slots reserved when the registry is created.
    pub initial_capacity: usize,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            initial_capacity: DEFAULT_INITIAL_CAPACITY,
        }
    }
}

impl RegistryConfig {
    /// Set the number of slots reserved up front.
    pub fn with_initial_capacity(mut self, capacity: usize) -> Self {
        self.initial_capacity = capacity;
        self
    }

    /// Load configuration from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    ///
    /// Unparseable values are logged and replaced by the default.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();
        if let Some(raw) = lookup(REGISTRY_CAPACITY_VAR) {
            match raw.trim().parse::<usize>() {
                Ok(capacity) => config.initial_capacity = capacity,
                Err(err) => tracing::warn!(
                    var = REGISTRY_CAPACITY_VAR,
                    value = %raw,
                    %err,
                    "ignoring invalid registry capacity"
                ),
            }
        }
        config
    }
}
