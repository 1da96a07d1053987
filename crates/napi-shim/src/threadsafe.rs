//! Threadsafe functions
//!
//! Any thread may enqueue calls; delivery happens only inside
//! [`napi_shim_run_pending`], which the backend calls on the environment's
//! own thread after the `notify_pending` slot tells it work is waiting.
//! Delivery for one function is serialized and FIFO.
//!
//! Handles given to extensions are registry ids. Once a function is
//! finalized its id misses the registry and every call on it reports
//! `napi_invalid_arg`.

use std::ffi::c_void;
use std::ptr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, LazyLock};

use napi_shim_sdk::{
    napi_env, napi_finalize, napi_ref, napi_threadsafe_function,
    napi_threadsafe_function_call_js, napi_value, CallQueue, QueueState, ShimError, Status,
    TsfnCallMode, TsfnReleaseMode,
};
use parking_lot::Mutex;

use crate::env_state::RawPtr;
use crate::last_error;
use crate::registry::{from_handle, to_handle, HandleRegistry};
use crate::table::{self, CapabilityTable};

#[derive(Debug, Clone, Copy)]
enum JsCallback {
    None,
    /// Held through a backend reference.
    Referenced(usize),
    /// Backend has no reference support; the raw handle is kept as given.
    Raw(usize),
}

struct ThreadsafeFunction {
    env: usize,
    js_callback: JsCallback,
    context: RawPtr,
    call_js_cb: napi_threadsafe_function_call_js,
    finalize_cb: napi_finalize,
    finalize_data: RawPtr,
    queue: CallQueue<RawPtr>,
    referenced: AtomicBool,
    /// Held while delivering, so calls of one function never interleave.
    dispatch: Mutex<()>,
}

static FUNCTIONS: LazyLock<HandleRegistry<Arc<ThreadsafeFunction>>> =
    LazyLock::new(HandleRegistry::new);

fn lookup(func: napi_threadsafe_function) -> Option<Arc<ThreadsafeFunction>> {
    FUNCTIONS.cloned(from_handle(func))
}

fn notify(env: usize) {
    if let Some(hook) = table::current().and_then(|table| table.notify_pending) {
        // SAFETY: backend-provided hook, called with the env it registered.
        unsafe { hook(env as napi_env) };
    }
}

fn status_of(result: Result<impl Sized, ShimError>) -> Status {
    match result {
        Ok(_) => Status::OK,
        Err(err) => err.status(),
    }
}

// ============================================================================
// Exported Entry Points
// ============================================================================

/// Create a threadsafe function bound to `env`.
///
/// # Safety
/// `result` must be valid for writes. Pointers are stored and handed back
/// to the extension's callbacks unchanged.
#[no_mangle]
#[allow(clippy::too_many_arguments)]
pub unsafe extern "C" fn napi_create_threadsafe_function(
    env: napi_env,
    func: napi_value,
    _async_resource: napi_value,
    _async_resource_name: napi_value,
    max_queue_size: usize,
    initial_thread_count: usize,
    thread_finalize_data: *mut c_void,
    thread_finalize_cb: napi_finalize,
    context: *mut c_void,
    call_js_cb: napi_threadsafe_function_call_js,
    result: *mut napi_threadsafe_function,
) -> Status {
    if result.is_null() || initial_thread_count == 0 || (func.is_null() && call_js_cb.is_none()) {
        return last_error::record(Status::INVALID_ARG);
    }
    let Some(table) = table::current() else {
        return last_error::record(Status::GENERIC_FAILURE);
    };

    let js_callback = if func.is_null() {
        JsCallback::None
    } else if let Some(create_reference) = table.create_reference {
        let mut reference: napi_ref = ptr::null_mut();
        let status = create_reference(env, func, 1, &mut reference);
        if !status.is_ok() {
            return last_error::record(status);
        }
        JsCallback::Referenced(reference as usize)
    } else {
        tracing::debug!(
            target: "napi_shim",
            "backend has no create_reference; threadsafe function keeps a raw callback handle"
        );
        JsCallback::Raw(func as usize)
    };

    let id = FUNCTIONS.insert(Arc::new(ThreadsafeFunction {
        env: env as usize,
        js_callback,
        context: RawPtr(context),
        call_js_cb,
        finalize_cb: thread_finalize_cb,
        finalize_data: RawPtr(thread_finalize_data),
        queue: CallQueue::new(max_queue_size, initial_thread_count),
        referenced: AtomicBool::new(true),
        dispatch: Mutex::new(()),
    }));
    *result = to_handle(id);
    tracing::trace!(target: "napi_shim", id, max_queue_size, initial_thread_count, "threadsafe function created");
    last_error::record(Status::OK)
}

/// The `context` given at creation.
///
/// # Safety
/// `result` must be valid for writes.
#[no_mangle]
pub unsafe extern "C" fn napi_get_threadsafe_function_context(
    func: napi_threadsafe_function,
    result: *mut *mut c_void,
) -> Status {
    if result.is_null() {
        return last_error::record(Status::INVALID_ARG);
    }
    match lookup(func) {
        Some(tsfn) => {
            *result = tsfn.context.0;
            last_error::record(Status::OK)
        }
        None => last_error::record(Status::INVALID_ARG),
    }
}

/// Enqueue one call carrying `data`.
///
/// Blocking mode waits for queue capacity. Capacity only frees when
/// `napi_shim_run_pending` delivers on the environment thread, so a
/// blocking call made from that thread on a full queue never returns.
#[no_mangle]
pub extern "C" fn napi_call_threadsafe_function(
    func: napi_threadsafe_function,
    data: *mut c_void,
    is_blocking: TsfnCallMode,
) -> Status {
    let Some(tsfn) = lookup(func) else {
        return last_error::record(Status::INVALID_ARG);
    };
    let status = status_of(tsfn.queue.push(RawPtr(data), is_blocking == TsfnCallMode::BLOCKING));
    if status.is_ok() {
        notify(tsfn.env);
    }
    last_error::record(status)
}

/// Register one more thread using `func`.
#[no_mangle]
pub extern "C" fn napi_acquire_threadsafe_function(func: napi_threadsafe_function) -> Status {
    let status = match lookup(func) {
        Some(tsfn) => status_of(tsfn.queue.acquire()),
        None => Status::INVALID_ARG,
    };
    last_error::record(status)
}

/// Drop one thread's claim on `func`. With `napi_tsfn_abort` queued calls
/// are dropped; otherwise they are still delivered once the last thread has
/// released.
#[no_mangle]
pub extern "C" fn napi_release_threadsafe_function(
    func: napi_threadsafe_function,
    mode: TsfnReleaseMode,
) -> Status {
    let Some(tsfn) = lookup(func) else {
        return last_error::record(Status::INVALID_ARG);
    };
    let released = tsfn.queue.release(mode == TsfnReleaseMode::ABORT);
    if let Ok(released) = &released {
        if released.state != QueueState::Open {
            notify(tsfn.env);
        }
    }
    last_error::record(status_of(released))
}

/// Mark `func` as keeping its environment alive.
#[no_mangle]
pub extern "C" fn napi_ref_threadsafe_function(
    _env: napi_env,
    func: napi_threadsafe_function,
) -> Status {
    set_referenced(func, true)
}

/// Mark `func` as not keeping its environment alive.
#[no_mangle]
pub extern "C" fn napi_unref_threadsafe_function(
    _env: napi_env,
    func: napi_threadsafe_function,
) -> Status {
    set_referenced(func, false)
}

fn set_referenced(func: napi_threadsafe_function, referenced: bool) -> Status {
    let status = match lookup(func) {
        Some(tsfn) => {
            tsfn.referenced.store(referenced, Ordering::Release);
            Status::OK
        }
        None => Status::INVALID_ARG,
    };
    last_error::record(status)
}

// ============================================================================
// Delivery
// ============================================================================

/// Whether any live threadsafe function of `env` is still referenced.
pub fn has_referenced(env: napi_env) -> bool {
    !FUNCTIONS
        .ids_where(|tsfn| tsfn.env == env as usize && tsfn.referenced.load(Ordering::Acquire))
        .is_empty()
}

/// Deliver queued calls of every threadsafe function bound to `env` and
/// finalize the ones that are done. Returns the number of calls delivered.
pub fn deliver_pending(env: napi_env) -> usize {
    let mut delivered = 0;
    for id in FUNCTIONS.ids_where(|tsfn| tsfn.env == env as usize) {
        let Some(tsfn) = FUNCTIONS.cloned(id) else {
            continue;
        };
        // Re-entrant run from inside a delivery of the same function.
        let Some(_guard) = tsfn.dispatch.try_lock() else {
            continue;
        };
        while tsfn.queue.state() != QueueState::Aborted {
            let Some(data) = tsfn.queue.pop() else {
                break;
            };
            deliver(&tsfn, env, data.0);
            delivered += 1;
        }
        if tsfn.queue.is_finished() {
            finalize(id, env);
        }
    }
    delivered
}

/// Run everything waiting for `env`: queued threadsafe calls, then
/// completions of finished async work. Must be called on the thread that
/// owns `env`.
#[no_mangle]
pub extern "C" fn napi_shim_run_pending(env: napi_env) -> Status {
    let calls = deliver_pending(env);
    let completions = crate::async_work::run_completions(env);
    if calls + completions > 0 {
        tracing::trace!(target: "napi_shim", calls, completions, "pending work delivered");
    }
    Status::OK
}

/// Abort and finalize every threadsafe function bound to `env`.
pub fn abort_env(env: napi_env) -> usize {
    let ids = FUNCTIONS.ids_where(|tsfn| tsfn.env == env as usize);
    for &id in &ids {
        if let Some(tsfn) = FUNCTIONS.cloned(id) {
            tsfn.queue.abort();
        }
        finalize(id, env);
    }
    ids.len()
}

fn deliver(tsfn: &ThreadsafeFunction, env: napi_env, data: *mut c_void) {
    let table = table::current();
    table::with_handle_scope(env, || {
        let callback = table.map_or(ptr::null_mut(), |table| callback_value(tsfn, table, env));
        match tsfn.call_js_cb {
            // SAFETY: extension callback invoked on the environment thread.
            Some(call_js) => unsafe { call_js(env, callback, tsfn.context.0, data) },
            None => {
                if let Some(table) = table {
                    call_plain(table, env, callback);
                }
            }
        }
    });
}

fn callback_value(tsfn: &ThreadsafeFunction, table: &CapabilityTable, env: napi_env) -> napi_value {
    match tsfn.js_callback {
        JsCallback::None => ptr::null_mut(),
        JsCallback::Raw(value) => value as napi_value,
        JsCallback::Referenced(reference) => {
            let mut value = ptr::null_mut();
            if let Some(get) = table.get_reference_value {
                // SAFETY: backend slot with a valid out-pointer.
                unsafe { get(env, reference as napi_ref, &mut value) };
            }
            value
        }
    }
}

fn call_plain(table: &CapabilityTable, env: napi_env, callback: napi_value) {
    let (Some(get_undefined), Some(call_function)) = (table.get_undefined, table.call_function) else {
        return;
    };
    if callback.is_null() {
        return;
    }
    let mut recv = ptr::null_mut();
    let mut result = ptr::null_mut();
    // SAFETY: backend slots with valid out-pointers; no arguments are passed.
    unsafe {
        if get_undefined(env, &mut recv).is_ok() {
            call_function(env, recv, callback, 0, ptr::null(), &mut result);
        }
    }
}

fn finalize(id: u64, env: napi_env) {
    let Some(tsfn) = FUNCTIONS.remove(id) else {
        return;
    };
    let dropped = tsfn.queue.take_all();
    if let Some(call_js) = tsfn.call_js_cb {
        for data in &dropped {
            // SAFETY: NULL env tells the extension to release `data` only.
            unsafe { call_js(ptr::null_mut(), ptr::null_mut(), tsfn.context.0, data.0) };
        }
    }
    if let Some(finalize_cb) = tsfn.finalize_cb {
        // SAFETY: extension finalizer with the data it supplied.
        unsafe { finalize_cb(env, tsfn.finalize_data.0, tsfn.context.0) };
    }
    if let JsCallback::Referenced(reference) = tsfn.js_callback {
        if let Some(delete) = table::current().and_then(|table| table.delete_reference) {
            // SAFETY: deletes the reference created in napi_create_threadsafe_function.
            unsafe { delete(env, reference as napi_ref) };
        }
    }
    tracing::trace!(target: "napi_shim", id, dropped = dropped.len(), "threadsafe function finalized");
}
