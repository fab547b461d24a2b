//! Registry-only scenarios: entry presence, slot reuse, shared registries.
//!

use refcount_gc::*;
use std::cell::Cell;
use std::rc::Rc;

fn key_of<T>(obj: &registered::Object<T>) -> ObjectKey {
    obj.key().unwrap()
}

// =============================================================================
// ENTRY PRESENCE
// =============================================================================

mod presence {
    use super::*;

    #[test]
    fn allocate_creates_single_entry() {
        let alloc = RegistryAllocator::new();
        let obj = alloc.allocate(String::from("x"));
        let key = key_of(&obj);

        assert_eq!(alloc.registry().len(), 1);
        assert_eq!(alloc.registry().strong_count(key), Some(1));
        assert_eq!(alloc.registry().weak_count(key), Some(0));
    }

    #[test]
    fn full_release_removes_entry() {
        let alloc = RegistryAllocator::new();
        let obj = alloc.allocate(1u64);
        let key = key_of(&obj);
        let copies: Vec<_> = (0..3).map(|_| obj.clone()).collect();

        assert_eq!(alloc.registry().strong_count(key), Some(4));
        drop(copies);
        assert_eq!(alloc.registry().strong_count(key), Some(1));
        drop(obj);

        assert!(!alloc.registry().contains(key));
        assert_eq!(alloc.registry().weak_count(key), None);
        assert!(alloc.registry().is_empty());
    }

    #[test]
    fn entry_present_iff_strong_reference_exists() {
        let alloc = RegistryAllocator::new();
        let obj = alloc.allocate(());
        let key = key_of(&obj);
        let weak = obj.downgrade();

        assert!(alloc.registry().contains(key));
        drop(obj);
        assert!(!alloc.registry().contains(key));

        // The weak handle still pins the slot, but not as a live entry
        assert_eq!(alloc.registry().weak_count(key), Some(1));
        assert_eq!(alloc.registry().len(), 0);
        drop(weak);
        assert_eq!(alloc.registry().weak_count(key), None);
    }

    #[test]
    fn failed_constructor_registers_nothing() {
        let alloc = RegistryAllocator::new();
        let result: Result<registered::Object<i32>, String> =
            alloc.try_allocate_with(|| Err("constructor failed".to_string()));

        assert!(result.is_err());
        assert!(alloc.registry().is_empty());
    }

    #[test]
    fn panicking_constructor_registers_nothing() {
        let alloc = RegistryAllocator::new();
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            alloc.allocate_with(|| -> i32 { panic!("constructor panicked") })
        }));

        assert!(result.is_err());
        assert!(alloc.registry().is_empty());
    }
}

// =============================================================================
// SLOT REUSE
// =============================================================================

mod slot_reuse {
    use super::*;

    #[test]
    fn stale_key_never_matches_reused_slot() {
        let alloc = RegistryAllocator::new();
        let first = alloc.allocate("A");
        let old_key = key_of(&first);
        drop(first);

        let second = alloc.allocate("B");
        let new_key = key_of(&second);

        assert_eq!(old_key.slot(), new_key.slot());
        assert!(old_key.precedes(new_key));
        assert!(!alloc.registry().contains(old_key));
        assert_eq!(alloc.registry().strong_count(new_key), Some(1));
    }

    #[test]
    fn weak_to_released_object_ignores_new_occupant() {
        let alloc = RegistryAllocator::new();
        let first = alloc.allocate(1);
        let weak = first.downgrade();
        drop(first);

        // The expired slot is pinned, so the new object lands elsewhere
        let second = alloc.allocate(2);
        assert_ne!(weak.key().map(ObjectKey::slot), second.key().map(ObjectKey::slot));
        assert!(weak.lock().is_empty());
        assert_eq!(*second, 2);
    }

    #[test]
    fn zero_sized_payloads_keep_their_own_entries() {
        let alloc = RegistryAllocator::new();
        let a = alloc.allocate(());
        let b = alloc.allocate(());
        assert_eq!(a.as_ptr(), b.as_ptr());
        assert_ne!(key_of(&a), key_of(&b));
        assert_ne!(a, b);

        let mut c = b.clone();
        c.clone_from(&a);
        assert_eq!(c.key(), a.key());
        assert_eq!(alloc.registry().strong_count(key_of(&a)), Some(2));
        assert_eq!(alloc.registry().strong_count(key_of(&b)), Some(1));
    }

    #[test]
    fn same_key_in_different_registries_is_not_equal() {
        let a = RegistryAllocator::new().allocate(1);
        let b = RegistryAllocator::new().allocate(1);
        assert_eq!(a.key(), b.key());
        assert_ne!(a, b);
    }

    #[test]
    fn many_cycles_keep_registry_small() {
        let alloc = RegistryAllocator::new();
        for i in 0..1000 {
            let obj = alloc.allocate(i);
            let copy = obj.clone();
            assert_eq!(*copy, i);
        }
        assert!(alloc.registry().is_empty());

        let obj = alloc.allocate(0);
        assert_eq!(key_of(&obj).slot(), 0);
    }
}

// =============================================================================
// SHARED AND CONFIGURED REGISTRIES
// =============================================================================

mod injection {
    use super::*;

    #[test]
    fn handles_keep_registry_alive() {
        let obj = {
            let alloc = RegistryAllocator::new();
            alloc.allocate(5)
        };
        assert_eq!(obj.strong_count(), 1);
        assert_eq!(obj.registry().map(|r| r.len()), Some(1));
    }

    #[test]
    fn from_config_reserves_capacity() {
        let config = RegistryConfig::default().with_initial_capacity(256);
        let alloc = RegistryAllocator::from_config(&config);
        assert!(alloc.registry().capacity() >= 256);
    }

    #[test]
    fn drop_order_with_nested_objects() {
        struct Parent {
            _child: registered::Object<Child>,
        }
        struct Child(Rc<Cell<bool>>);
        impl Drop for Child {
            fn drop(&mut self) {
                self.0.set(true);
            }
        }

        let dropped = Rc::new(Cell::new(false));
        let alloc = RegistryAllocator::new();
        let child = alloc.allocate(Child(dropped.clone()));
        let child_weak = child.downgrade();
        let parent = alloc.allocate(Parent { _child: child });

        assert_eq!(alloc.registry().len(), 2);
        drop(parent);
        assert!(dropped.get());
        assert!(child_weak.lock().is_empty());
        assert!(alloc.registry().is_empty());
    }
}
