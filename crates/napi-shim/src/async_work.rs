//! Async work items
//!
//! `execute` runs on a shared pool of named worker threads; `complete` runs
//! later on the environment thread, from `napi_shim_run_pending`.
//!
//! ```text
//! Created --queue--> Queued --worker--> Running --> Finished
//!                      |                                |
//!                      +--cancel--> Cancelled           |
//!                                       |               |
//!                   run_pending: complete(status) <-----+  --> Created
//! ```

use std::collections::VecDeque;
use std::ffi::c_void;
use std::sync::{Arc, LazyLock};
use std::thread;

use crossbeam::channel::{self, Sender};
use napi_shim_sdk::{
    napi_async_complete_callback, napi_async_work, napi_env, napi_value, Status,
};
use parking_lot::Mutex;

use crate::env_state::RawPtr;
use crate::last_error;
use crate::registry::{from_handle, to_handle, HandleRegistry};
use crate::table;

/// Upper bound on pool threads.
const MAX_WORKERS: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WorkState {
    Created,
    Queued,
    Running,
    Finished,
    Cancelled,
    Deleted,
}

type ExecuteFn = unsafe extern "C" fn(env: napi_env, data: *mut c_void);

struct AsyncWork {
    env: usize,
    execute: ExecuteFn,
    complete: napi_async_complete_callback,
    data: RawPtr,
    state: Mutex<WorkState>,
}

struct Completion {
    env: usize,
    id: u64,
    status: Status,
}

static WORKS: LazyLock<HandleRegistry<Arc<AsyncWork>>> = LazyLock::new(HandleRegistry::new);
static COMPLETIONS: LazyLock<Mutex<VecDeque<Completion>>> =
    LazyLock::new(|| Mutex::new(VecDeque::new()));
static POOL: LazyLock<WorkerPool> = LazyLock::new(WorkerPool::start);

// ============================================================================
// Worker Pool
// ============================================================================

struct WorkerPool {
    tx: Sender<u64>,
    workers: usize,
}

impl WorkerPool {
    fn start() -> Self {
        let (tx, rx) = channel::unbounded::<u64>();
        let size = thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1)
            .clamp(1, MAX_WORKERS);

        let mut workers = 0;
        for index in 0..size {
            let rx = rx.clone();
            let spawned = thread::Builder::new()
                .name(format!("napi-shim-worker-{}", index))
                .spawn(move || {
                    for id in rx.iter() {
                        run_execute(id);
                    }
                });
            match spawned {
                Ok(_) => workers += 1,
                Err(err) => {
                    tracing::error!(target: "napi_shim", index, %err, "failed to spawn async worker")
                }
            }
        }
        tracing::debug!(target: "napi_shim", workers, "async work pool started");
        Self { tx, workers }
    }
}

fn run_execute(id: u64) {
    let Some(work) = WORKS.cloned(id) else {
        return;
    };
    {
        let mut state = work.state.lock();
        if *state != WorkState::Queued {
            return;
        }
        *state = WorkState::Running;
    }
    // SAFETY: extension callback with the env and data it supplied; env is
    // only passed through, never used on this thread by the bridge.
    unsafe { (work.execute)(work.env as napi_env, work.data.0) };
    *work.state.lock() = WorkState::Finished;
    push_completion(work.env, id, Status::OK);
}

fn push_completion(env: usize, id: u64, status: Status) {
    COMPLETIONS.lock().push_back(Completion { env, id, status });
    if let Some(hook) = table::current().and_then(|table| table.notify_pending) {
        // SAFETY: backend-provided hook, called with the env it registered.
        unsafe { hook(env as napi_env) };
    }
}

// ============================================================================
// Exported Entry Points
// ============================================================================

/// Create an async work item. Fails until a capability table is published.
///
/// # Safety
/// `result` must be valid for writes.
#[no_mangle]
pub unsafe extern "C" fn napi_create_async_work(
    env: napi_env,
    _async_resource: napi_value,
    _async_resource_name: napi_value,
    execute: napi_shim_sdk::napi_async_execute_callback,
    complete: napi_async_complete_callback,
    data: *mut c_void,
    result: *mut napi_async_work,
) -> Status {
    let (Some(execute), false) = (execute, result.is_null()) else {
        return last_error::record(Status::INVALID_ARG);
    };
    if table::current().is_none() {
        return last_error::record(Status::GENERIC_FAILURE);
    }
    let id = WORKS.insert(Arc::new(AsyncWork {
        env: env as usize,
        execute,
        complete,
        data: RawPtr(data),
        state: Mutex::new(WorkState::Created),
    }));
    *result = to_handle(id);
    last_error::record(Status::OK)
}

/// Free an async work item. A running `execute` still finishes, but its
/// completion is discarded.
#[no_mangle]
pub extern "C" fn napi_delete_async_work(_env: napi_env, work: napi_async_work) -> Status {
    let status = match WORKS.remove(from_handle(work)) {
        Some(work) => {
            *work.state.lock() = WorkState::Deleted;
            Status::OK
        }
        None => Status::INVALID_ARG,
    };
    last_error::record(status)
}

/// Schedule `execute` on the worker pool. Fails while no capability table
/// is published; the item stays unqueued.
#[no_mangle]
pub extern "C" fn napi_queue_async_work(_env: napi_env, work: napi_async_work) -> Status {
    if table::current().is_none() {
        return last_error::record(Status::GENERIC_FAILURE);
    }
    let id = from_handle(work);
    let Some(item) = WORKS.cloned(id) else {
        return last_error::record(Status::INVALID_ARG);
    };
    {
        let mut state = item.state.lock();
        if *state != WorkState::Created {
            return last_error::record(Status::GENERIC_FAILURE);
        }
        *state = WorkState::Queued;
    }
    if POOL.workers == 0 || POOL.tx.send(id).is_err() {
        *item.state.lock() = WorkState::Created;
        return last_error::record(Status::GENERIC_FAILURE);
    }
    last_error::record(Status::OK)
}

/// Cancel work that has not started. `complete` then runs with
/// `napi_cancelled`. Started or finished work cannot be cancelled.
#[no_mangle]
pub extern "C" fn napi_cancel_async_work(_env: napi_env, work: napi_async_work) -> Status {
    let id = from_handle(work);
    let Some(item) = WORKS.cloned(id) else {
        return last_error::record(Status::INVALID_ARG);
    };
    {
        let mut state = item.state.lock();
        if *state != WorkState::Queued {
            return last_error::record(Status::GENERIC_FAILURE);
        }
        *state = WorkState::Cancelled;
    }
    push_completion(item.env, id, Status::CANCELLED);
    last_error::record(Status::OK)
}

// ============================================================================
// Environment Side
// ============================================================================

/// Run `complete` for every finished or cancelled item of `env`. Returns the
/// number of completions run.
pub fn run_completions(env: napi_env) -> usize {
    let ready = {
        let mut completions = COMPLETIONS.lock();
        let (ready, rest): (VecDeque<Completion>, VecDeque<Completion>) =
            completions.drain(..).partition(|c| c.env == env as usize);
        *completions = rest;
        ready
    };

    let mut ran = 0;
    for completion in ready {
        let Some(work) = WORKS.cloned(completion.id) else {
            continue;
        };
        {
            let mut state = work.state.lock();
            if !matches!(*state, WorkState::Finished | WorkState::Cancelled) {
                continue;
            }
            *state = WorkState::Created;
        }
        if let Some(complete) = work.complete {
            table::with_handle_scope(env, || {
                // SAFETY: extension callback on the environment thread.
                unsafe { complete(env, completion.status, work.data.0) }
            });
        }
        ran += 1;
    }
    ran
}

/// Drop every work item and pending completion of `env`.
pub fn abandon_env(env: napi_env) -> usize {
    let ids = WORKS.ids_where(|work| work.env == env as usize);
    for &id in &ids {
        if let Some(work) = WORKS.remove(id) {
            *work.state.lock() = WorkState::Deleted;
        }
    }
    COMPLETIONS.lock().retain(|c| c.env != env as usize);
    ids.len()
}
