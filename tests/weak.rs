use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;

use intrc::{Counted, IntrusivePtr, RefCounted, RefCounter, Weak};

#[cfg(miri)]
const THREAD_COUNT: usize = 2;
#[cfg(not(miri))]
const THREAD_COUNT: usize = 4;

#[cfg(miri)]
const ITERATIONS: usize = 100;
#[cfg(not(miri))]
const ITERATIONS: usize = 10_000;

struct Probe {
    counter: RefCounter,
    released: Arc<AtomicUsize>,
    dropped: Arc<AtomicUsize>,
}

impl Probe {
    fn new() -> (IntrusivePtr<Probe>, Arc<AtomicUsize>, Arc<AtomicUsize>) {
        let released = Arc::new(AtomicUsize::new(0));
        let dropped = Arc::new(AtomicUsize::new(0));
        let probe = IntrusivePtr::new(Probe {
            counter: RefCounter::new(),
            released: released.clone(),
            dropped: dropped.clone(),
        });
        (probe, released, dropped)
    }
}

impl RefCounted for Probe {
    fn ref_counter(&self) -> &RefCounter {
        &self.counter
    }

    fn release_resources(&self) {
        self.released.fetch_add(1, Ordering::SeqCst);
    }
}

impl Drop for Probe {
    fn drop(&mut self) {
        self.dropped.fetch_add(1, Ordering::SeqCst);
    }
}

#[test]
fn upgrade_hits_while_any_strong_lives() {
    let strong = IntrusivePtr::new(Counted::new(5));
    let weak = IntrusivePtr::downgrade(&strong);

    let upgraded = weak.upgrade().unwrap();
    assert!(IntrusivePtr::ptr_eq(&strong, &upgraded));
    assert_eq!(strong.strong_count(), 2);
    assert_eq!(**upgraded, 5);
}

#[test]
fn upgrade_misses_after_last_strong_drop() {
    let strong = IntrusivePtr::new(Counted::new(5));
    let weak = IntrusivePtr::downgrade(&strong);

    drop(strong);
    assert!(weak.upgrade().is_none());
    // a miss is final
    assert!(weak.upgrade().is_none());
    assert_eq!(weak.strong_count(), 0);
}

#[test]
fn downgrade_touches_only_the_weak_count() {
    let strong = IntrusivePtr::new(Counted::new(5));
    assert_eq!(strong.weak_count(), 1);

    let weak = IntrusivePtr::downgrade(&strong);
    assert_eq!(strong.strong_count(), 1);
    assert_eq!(strong.weak_count(), 2);

    let weak2 = weak.clone();
    assert_eq!(strong.weak_count(), 3);
    assert!(Weak::ptr_eq(&weak, &weak2));

    drop(weak);
    drop(weak2);
    assert_eq!(strong.weak_count(), 1);
}

#[test]
fn weak_pointers_pin_the_storage() {
    let (strong, released, dropped) = Probe::new();
    let weak = IntrusivePtr::downgrade(&strong);

    drop(strong);
    // the hook ran, but the target itself is still pinned by the weak ref
    assert_eq!(released.load(Ordering::SeqCst), 1);
    assert_eq!(dropped.load(Ordering::SeqCst), 0);
    assert_eq!(weak.strong_count(), 0);
    assert_eq!(weak.weak_count(), 1);

    drop(weak);
    assert_eq!(released.load(Ordering::SeqCst), 1);
    assert_eq!(dropped.load(Ordering::SeqCst), 1);
}

#[test]
fn dead_weak_count_drops_the_implicit_unit() {
    let strong = IntrusivePtr::new(Counted::new(5));
    let w1 = IntrusivePtr::downgrade(&strong);
    let w2 = w1.clone();
    assert_eq!(strong.weak_count(), 3);

    drop(strong);
    // strong side gone: its implicit unit went with it
    assert_eq!(w1.weak_count(), 2);
    assert_eq!(w2.strong_count(), 0);
}

#[test]
fn upgraded_pointer_keeps_target_alive_on_its_own() {
    let (strong, released, dropped) = Probe::new();
    let weak = IntrusivePtr::downgrade(&strong);
    let upgraded = weak.upgrade().unwrap();

    drop(strong);
    assert_eq!(released.load(Ordering::SeqCst), 0);

    drop(upgraded);
    assert_eq!(released.load(Ordering::SeqCst), 1);
    assert_eq!(dropped.load(Ordering::SeqCst), 0);

    drop(weak);
    assert_eq!(dropped.load(Ordering::SeqCst), 1);
}

#[test]
fn upgrade_races_with_last_strong_drop() {
    let (strong, released, dropped) = Probe::new();

    let upgraders: Vec<_> = (0..THREAD_COUNT)
        .map(|_| {
            let weak = IntrusivePtr::downgrade(&strong);
            thread::spawn(move || {
                let mut hits = 0usize;
                while let Some(p) = weak.upgrade() {
                    hits += 1;
                    drop(p);
                    if hits >= ITERATIONS {
                        break;
                    }
                }
                hits
            })
        })
        .collect();

    drop(strong);
    for handle in upgraders {
        handle.join().unwrap();
    }

    assert_eq!(released.load(Ordering::SeqCst), 1);
    assert_eq!(dropped.load(Ordering::SeqCst), 1);
}

#[test]
fn weak_clone_drop_storm() {
    let strong = IntrusivePtr::new(Counted::new(!0usize));
    let handles: Vec<_> = (0..THREAD_COUNT)
        .map(|_| {
            let weak = IntrusivePtr::downgrade(&strong);
            thread::spawn(move || {
                for _ in 0..ITERATIONS {
                    let w = weak.clone();
                    drop(w);
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }
    assert_eq!(strong.strong_count(), 1);
    assert_eq!(strong.weak_count(), 1);
}

#[test]
fn option_weak_is_pointer_sized() {
    assert_eq!(
        std::mem::size_of::<Option<Weak<Counted<u64>>>>(),
        std::mem::size_of::<*const ()>()
    );
}
