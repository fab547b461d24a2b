//! Property tests: random copy/drop/downgrade/lock sequences against a model.
//!
//! Invariants checked after every step:
//! - every strong and weak handle reports the number of live strong handles
//! - the payload has been destroyed exactly when that number is zero
//! - the weak count equals the number of weak handles

use proptest::prelude::*;
use refcount_gc::*;
use std::cell::Cell;
use std::rc::Rc;

struct Tracker(Rc<Cell<usize>>);

impl Drop for Tracker {
    fn drop(&mut self) {
        self.0.set(self.0.get() + 1);
    }
}

#[derive(Debug, Clone)]
enum Op {
    CloneStrong(usize),
    DropStrong(usize),
    TakeStrong(usize),
    Downgrade(usize),
    CloneWeak(usize),
    DropWeak(usize),
    Lock(usize),
}

fn arb_op() -> impl Strategy<Value = Op> {
    prop_oneof![
        any::<usize>().prop_map(Op::CloneStrong),
        any::<usize>().prop_map(Op::DropStrong),
        any::<usize>().prop_map(Op::TakeStrong),
        any::<usize>().prop_map(Op::Downgrade),
        any::<usize>().prop_map(Op::CloneWeak),
        any::<usize>().prop_map(Op::DropWeak),
        any::<usize>().prop_map(Op::Lock),
    ]
}

fn run_ops<A: Allocator>(alloc: &A, ops: &[Op]) -> Result<(), TestCaseError> {
    let drops = Rc::new(Cell::new(0));
    let mut strongs: Vec<A::Strong<Tracker>> = vec![alloc.allocate(Tracker(drops.clone()))];
    let mut weaks: Vec<A::Weak<Tracker>> = Vec::new();

    for op in ops {
        match *op {
            Op::CloneStrong(i) if !strongs.is_empty() => {
                let copy = strongs[i % strongs.len()].clone();
                strongs.push(copy);
            }
            Op::DropStrong(i) if !strongs.is_empty() => {
                let idx = i % strongs.len();
                drop(strongs.swap_remove(idx));
            }
            Op::TakeStrong(i) if !strongs.is_empty() => {
                let idx = i % strongs.len();
                let taken = strongs[idx].take();
                prop_assert!(strongs[idx].is_empty());
                strongs[idx] = taken;
            }
            Op::Downgrade(i) if !strongs.is_empty() => {
                let weak = strongs[i % strongs.len()].downgrade();
                weaks.push(weak);
            }
            Op::CloneWeak(i) if !weaks.is_empty() => {
                let copy = weaks[i % weaks.len()].clone();
                weaks.push(copy);
            }
            Op::DropWeak(i) if !weaks.is_empty() => {
                let idx = i % weaks.len();
                drop(weaks.swap_remove(idx));
            }
            Op::Lock(i) if !weaks.is_empty() => {
                let locked = weaks[i % weaks.len()].lock();
                prop_assert_eq!(locked.is_empty(), strongs.is_empty());
                if !locked.is_empty() {
                    strongs.push(locked);
                }
            }
            _ => {}
        }

        let live = strongs.len();
        for strong in &strongs {
            prop_assert_eq!(strong.strong_count(), live);
            prop_assert_eq!(strong.weak_count(), weaks.len());
        }
        for weak in &weaks {
            prop_assert_eq!(weak.strong_count(), live);
        }
        prop_assert_eq!(drops.get(), usize::from(live == 0));
    }

    drop(strongs);
    drop(weaks);
    prop_assert_eq!(drops.get(), 1);
    Ok(())
}

proptest! {
    /// Embedded control blocks follow the counting model
    #[test]
    fn embedded_counts_match_model(ops in prop::collection::vec(arb_op(), 0..64)) {
        run_ops(&EmbeddedAllocator, &ops)?;
    }

    /// Registry entries follow the counting model and are all freed at the end
    #[test]
    fn registry_counts_match_model(ops in prop::collection::vec(arb_op(), 0..64)) {
        let alloc = RegistryAllocator::new();
        run_ops(&alloc, &ops)?;
        prop_assert!(alloc.registry().is_empty());
    }

    /// Embedded handles order by payload address
    #[test]
    fn embedded_ordering_follows_address(values in prop::collection::vec(any::<u16>(), 1..16)) {
        let mut handles: Vec<_> = values.iter().map(|v| EmbeddedAllocator.allocate(*v)).collect();
        handles.sort();
        for pair in handles.windows(2) {
            prop_assert!(pair[0].as_ptr() < pair[1].as_ptr());
        }
    }

    /// Registry handles from one registry order by key, whatever the payload size
    #[test]
    fn registry_ordering_follows_key(count in 1usize..16) {
        let alloc = RegistryAllocator::new();
        let mut handles: Vec<_> = (0..count).map(|_| alloc.allocate(())).collect();
        handles.reverse();
        handles.sort();
        for pair in handles.windows(2) {
            prop_assert!(pair[0].key() < pair[1].key());
        }
    }
}
