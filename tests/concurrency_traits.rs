use lazybox::{LazyBox, PoisonError};
use std::cell::Cell;
use std::panic::RefUnwindSafe;

fn assert_send<T: Send>() {}
fn assert_sync<T: Sync>() {}
fn assert_ref_unwind_safe<T: RefUnwindSafe>() {}
fn assert_error<T: std::error::Error + Send + Sync + 'static>() {}

#[test]
fn lazy_box_is_send_and_sync() {
    assert_send::<LazyBox<u64>>();
    assert_sync::<LazyBox<u64>>();
    assert_send::<LazyBox<String, Box<dyn FnOnce() -> String + Send>>>();
    assert_sync::<LazyBox<String, Box<dyn FnOnce() -> String + Send>>>();
}

#[test]
fn lazy_box_send_follows_payload_bounds() {
    // `Cell` is Send but not Sync: the box may move between threads but not be shared.
    assert_send::<LazyBox<Cell<u8>>>();
}

#[test]
fn lazy_box_is_ref_unwind_safe() {
    assert_ref_unwind_safe::<LazyBox<u64>>();
}

#[test]
fn poison_error_is_error() {
    assert_error::<PoisonError>();
}
