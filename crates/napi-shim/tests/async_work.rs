//! Async work runs on pool threads and completes on the environment thread

mod common;

use std::ffi::c_void;
use std::ptr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::thread;

use common::{env, run_until};
use napi_shim::async_work::*;
use napi_shim::sdk::*;
use parking_lot::Mutex;

static EXECUTED: Mutex<Vec<(usize, String)>> = Mutex::new(Vec::new());
static COMPLETED: Mutex<Vec<(usize, Status, bool)>> = Mutex::new(Vec::new());
static GATE_OPEN: AtomicBool = AtomicBool::new(false);
static BLOCKED: AtomicUsize = AtomicUsize::new(0);

fn reset() {
    EXECUTED.lock().clear();
    COMPLETED.lock().clear();
    GATE_OPEN.store(false, Ordering::SeqCst);
    BLOCKED.store(0, Ordering::SeqCst);
}

unsafe extern "C" fn execute(_env: napi_env, data: *mut c_void) {
    let name = thread::current().name().unwrap_or_default().to_string();
    EXECUTED.lock().push((data as usize, name));
}

unsafe extern "C" fn execute_gated(_env: napi_env, _data: *mut c_void) {
    BLOCKED.fetch_add(1, Ordering::SeqCst);
    while !GATE_OPEN.load(Ordering::SeqCst) {
        thread::yield_now();
    }
}

unsafe extern "C" fn complete(env: napi_env, status: Status, data: *mut c_void) {
    COMPLETED.lock().push((data as usize, status, env == common::env()));
}

fn create(execute_cb: napi_async_execute_callback, data: usize) -> napi_async_work {
    let mut work = ptr::null_mut();
    let status = unsafe {
        napi_create_async_work(
            env(),
            ptr::null_mut(),
            ptr::null_mut(),
            execute_cb,
            Some(complete),
            data as *mut c_void,
            &mut work,
        )
    };
    assert_eq!(status, Status::OK);
    work
}

#[test]
fn test_execute_on_worker_then_complete_on_env() {
    let _guard = common::setup();
    reset();
    let work = create(Some(execute), 1);
    assert_eq!(napi_queue_async_work(env(), work), Status::OK);
    assert_eq!(napi_queue_async_work(env(), work), Status::GENERIC_FAILURE);

    assert!(run_until(env(), || !COMPLETED.lock().is_empty()));
    let executed = EXECUTED.lock().clone();
    assert_eq!(executed.len(), 1);
    assert!(executed[0].1.starts_with("napi-shim-worker-"), "ran on {:?}", executed[0].1);
    assert_eq!(*COMPLETED.lock(), vec![(1, Status::OK, true)]);

    assert_eq!(napi_cancel_async_work(env(), work), Status::GENERIC_FAILURE);

    // A completed item may be queued again.
    assert_eq!(napi_queue_async_work(env(), work), Status::OK);
    assert!(run_until(env(), || COMPLETED.lock().len() == 2));
    assert_eq!(napi_delete_async_work(env(), work), Status::OK);
    assert_eq!(napi_queue_async_work(env(), work), Status::INVALID_ARG);
}

#[test]
fn test_cancel_before_start_completes_with_cancelled() {
    // Enough gated items to occupy every pool thread.
    const BLOCKERS: usize = 4;

    let _guard = common::setup();
    reset();
    let blockers: Vec<_> = (0..BLOCKERS).map(|i| create(Some(execute_gated), 100 + i)).collect();
    for &blocker in &blockers {
        assert_eq!(napi_queue_async_work(env(), blocker), Status::OK);
    }
    let target = create(Some(execute), 7);
    assert_eq!(napi_queue_async_work(env(), target), Status::OK);
    assert!(run_until(env(), || BLOCKED.load(Ordering::SeqCst) > 0));

    assert_eq!(napi_cancel_async_work(env(), target), Status::OK);
    assert_eq!(napi_cancel_async_work(env(), target), Status::GENERIC_FAILURE);
    GATE_OPEN.store(true, Ordering::SeqCst);

    assert!(run_until(env(), || COMPLETED.lock().len() == BLOCKERS + 1));
    assert!(EXECUTED.lock().is_empty(), "cancelled work must not execute");
    let completed = COMPLETED.lock().clone();
    assert!(completed.contains(&(7, Status::CANCELLED, true)));
    assert_eq!(
        completed.iter().filter(|(_, status, _)| *status == Status::OK).count(),
        BLOCKERS
    );

    for work in blockers.into_iter().chain([target]) {
        assert_eq!(napi_delete_async_work(env(), work), Status::OK);
    }
}

#[test]
fn test_create_validates_arguments() {
    let _guard = common::setup();
    let mut work = ptr::null_mut();
    let status = unsafe {
        napi_create_async_work(
            env(),
            ptr::null_mut(),
            ptr::null_mut(),
            None,
            Some(complete),
            ptr::null_mut(),
            &mut work,
        )
    };
    assert_eq!(status, Status::INVALID_ARG);
    let status = unsafe {
        napi_create_async_work(
            env(),
            ptr::null_mut(),
            ptr::null_mut(),
            Some(execute),
            None,
            ptr::null_mut(),
            ptr::null_mut(),
        )
    };
    assert_eq!(status, Status::INVALID_ARG);
    assert_eq!(napi_delete_async_work(env(), ptr::null_mut()), Status::INVALID_ARG);
}
