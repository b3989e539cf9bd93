use lazybox::{LazyBox, PoisonError};
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Barrier, Weak};
use std::thread;
use std::time::Duration;

type ReentrantBox = LazyBox<u32, Box<dyn FnOnce() -> u32 + Send>>;

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or_default()
}

fn counting_box(counter: &AtomicUsize) -> LazyBox<i32, impl FnOnce() -> i32 + '_> {
    LazyBox::new(move || {
        counter.fetch_add(1, Ordering::SeqCst);
        5
    })
}

#[test]
fn test_single_computation() {
    let counter = AtomicUsize::new(0);
    let lazy = LazyBox::new(|| {
        let n = counter.fetch_add(1, Ordering::SeqCst) + 1;
        n * 10
    });

    assert_eq!(lazy.value(), 10);
    assert_eq!(lazy.value(), 10);
    assert_eq!(counter.load(Ordering::SeqCst), 1);
}

#[test]
fn test_deferred_execution() {
    let ran = AtomicBool::new(false);
    let lazy = LazyBox::new(|| {
        ran.store(true, Ordering::SeqCst);
        "done"
    });

    assert!(!ran.load(Ordering::SeqCst));
    assert!(!lazy.is_computed());

    assert_eq!(lazy.value(), "done");
    assert!(ran.load(Ordering::SeqCst));
}

#[test]
fn test_concurrent_single_winner() {
    const THREADS: usize = 16;
    let counter = Arc::new(AtomicUsize::new(0));
    let barrier = Arc::new(Barrier::new(THREADS));

    let in_init = counter.clone();
    let lazy = Arc::new(LazyBox::new(move || {
        in_init.fetch_add(1, Ordering::SeqCst);
        // Keep the computation running while the others arrive.
        thread::sleep(Duration::from_millis(20));
        String::from("computed once")
    }));

    let mut handles = Vec::new();
    for _ in 0..THREADS {
        let lazy = lazy.clone();
        let barrier = barrier.clone();
        handles.push(thread::spawn(move || {
            barrier.wait();
            lazy.value()
        }));
    }

    let values: Vec<String> = handles.into_iter().map(|h| h.join().unwrap()).collect();

    assert_eq!(counter.load(Ordering::SeqCst), 1);
    assert_eq!(values.len(), THREADS);
    for v in &values {
        assert_eq!(v, "computed once");
    }
}

#[test]
fn test_concurrent_readers_share_one_allocation() {
    const THREADS: usize = 8;
    let lazy = LazyBox::new(|| vec![0u8; 1024]);

    let addrs: Vec<usize> = thread::scope(|s| {
        let handles: Vec<_> = (0..THREADS)
            .map(|_| s.spawn(|| lazy.force().as_ptr() as usize))
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    assert!(addrs.windows(2).all(|w| w[0] == w[1]));
}

#[test]
fn test_no_recompute_from_fresh_thread() {
    let counter = Arc::new(AtomicUsize::new(0));
    let in_init = counter.clone();
    let lazy = Arc::new(LazyBox::new(move || in_init.fetch_add(1, Ordering::SeqCst) + 100));

    assert_eq!(lazy.value(), 100);
    assert_eq!(counter.load(Ordering::SeqCst), 1);

    let other = lazy.clone();
    let seen = thread::spawn(move || other.value()).join().unwrap();

    assert_eq!(seen, 100);
    assert_eq!(counter.load(Ordering::SeqCst), 1);
}

#[test]
fn test_independent_instances() {
    let counter = AtomicUsize::new(0);
    let first = counting_box(&counter);
    let second = counting_box(&counter);

    assert_eq!(first.value(), 5);
    assert!(first.is_computed());
    assert!(!second.is_computed());
    assert_eq!(second.get(), None);
    assert_eq!(counter.load(Ordering::SeqCst), 1);

    assert_eq!(second.value(), 5);
    assert_eq!(counter.load(Ordering::SeqCst), 2);
}

#[test]
fn test_panic_poisons_box() {
    let calls = AtomicUsize::new(0);
    let lazy = LazyBox::new(|| -> u32 {
        calls.fetch_add(1, Ordering::SeqCst);
        panic!("metadata file missing");
    });

    let first = panic::catch_unwind(AssertUnwindSafe(|| lazy.value()));
    let payload = first.expect_err("initializer panic must propagate");
    assert_eq!(panic_message(&*payload), "metadata file missing");
    assert!(lazy.is_poisoned());

    let second = panic::catch_unwind(AssertUnwindSafe(|| lazy.value()));
    let payload = second.expect_err("poisoned box must panic");
    assert_eq!(panic_message(&*payload), "LazyBox instance has been poisoned");

    assert_eq!(lazy.try_force(), Err(PoisonError));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[test]
fn test_waiters_released_when_initializer_panics() {
    const WAITERS: usize = 4;
    let started = AtomicBool::new(false);
    let lazy = LazyBox::new(|| -> u32 {
        started.store(true, Ordering::SeqCst);
        thread::sleep(Duration::from_millis(50));
        panic!("initializer failed");
    });

    thread::scope(|s| {
        let winner = s.spawn(|| panic::catch_unwind(AssertUnwindSafe(|| lazy.value())).is_err());

        while !started.load(Ordering::SeqCst) {
            thread::yield_now();
        }

        let waiters: Vec<_> = (0..WAITERS).map(|_| s.spawn(|| lazy.try_force().copied())).collect();

        assert!(winner.join().unwrap());
        for waiter in waiters {
            assert_eq!(waiter.join().unwrap(), Err(PoisonError));
        }
    });

    assert!(lazy.is_poisoned());
}

#[test]
fn test_reentrant_read_panics_and_poisons() {
    let lazy: Arc<ReentrantBox> = Arc::new_cyclic(|weak: &Weak<ReentrantBox>| {
        let weak = weak.clone();
        LazyBox::new(Box::new(move || {
            let this = weak.upgrade().expect("box is alive while forced");
            this.value() + 1
        }) as Box<dyn FnOnce() -> u32 + Send>)
    });

    let result = panic::catch_unwind(AssertUnwindSafe(|| lazy.value()));
    let payload = result.expect_err("re-entrant read must not deadlock");
    assert_eq!(panic_message(&*payload), "reentrant initialization of LazyBox");
    assert!(lazy.is_poisoned());
}

#[test]
fn test_static_box_shared_across_threads() {
    static CALLS: AtomicUsize = AtomicUsize::new(0);
    static TABLE: LazyBox<Vec<u64>> = LazyBox::new(|| {
        CALLS.fetch_add(1, Ordering::SeqCst);
        (1..=10).map(|i| i * i).collect()
    });

    let sums: Vec<u64> = (0..4)
        .map(|_| thread::spawn(|| TABLE.iter().sum::<u64>()))
        .collect::<Vec<_>>()
        .into_iter()
        .map(|h| h.join().unwrap())
        .collect();

    assert!(sums.iter().all(|&s| s == 385));
    assert_eq!(CALLS.load(Ordering::SeqCst), 1);
}
