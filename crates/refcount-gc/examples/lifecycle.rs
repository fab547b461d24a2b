//! Walks both allocators through the same lifecycle scenarios.
//!
//! Run with `RUST_LOG=refcount_gc=trace cargo run --example lifecycle` to see
//! every count transition next to the helper's constructor and destructor.

use refcount_gc::{Allocator, EmbeddedAllocator, RegistryAllocator, RegistryConfig, StrongRef};
use std::any::type_name;
use tracing::info;
use tracing_subscriber::EnvFilter;

struct Helper {
    value: usize,
}

impl Helper {
    fn new(value: usize) -> Self {
        info!(value, "helper constructed");
        Self { value }
    }
}

impl Drop for Helper {
    fn drop(&mut self) {
        info!(value = self.value, "helper destroyed");
    }
}

fn run_scenarios<A: Allocator>(alloc: &A) {
    let allocator = type_name::<A>();
    info!(allocator, "starting scenarios");

    {
        info!("basic allocation and release");
        let x = alloc.allocate_with(|| Helper::new(42));
        info!(address = ?x.as_ptr(), value = x.value, "allocated");
    }

    {
        info!("one instance, four copies");
        let instance = alloc.allocate_with(|| Helper::new(43));
        {
            let mut elements: [A::Strong<Helper>; 4] = Default::default();
            for c in elements.iter_mut() {
                *c = instance.clone();
            }
            for c in &elements {
                info!(value = c.value, strong = c.strong_count(), "copy");
            }
            info!("dropping copies");
        }
        info!(strong = instance.strong_count(), "dropping final reference");
    }

    {
        info!("moving between handles");
        let mut x = alloc.allocate_with(|| Helper::new(44));
        info!(address = ?x.as_ptr(), value = x.value, "before move");
        let y = x.take();
        info!(
            address = ?y.as_ptr(),
            value = y.value,
            source_empty = x.is_empty(),
            "after move"
        );
    }

    info!(allocator, "scenarios finished");
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    run_scenarios(&EmbeddedAllocator);

    let registry_alloc = RegistryAllocator::from_config(&RegistryConfig::from_env());
    run_scenarios(&registry_alloc);
    info!(live = registry_alloc.registry().len(), "registry after scenarios");
}
