//! Bridge-side per-environment state
//!
//! Used when the backend leaves the instance-data, cleanup-hook, and
//! external-memory slots empty. Entries are keyed by the `napi_env` address
//! and dropped by [`napi_shim_teardown_env`].

use std::ffi::c_void;
use std::sync::LazyLock;

use dashmap::DashMap;
use napi_shim_sdk::{
    napi_async_cleanup_hook, napi_async_cleanup_hook_handle, napi_cleanup_hook, napi_env,
    napi_finalize, Status,
};

use crate::registry::{from_handle, to_handle, HandleRegistry};
use crate::{async_work, threadsafe};

/// A raw pointer owned by the extension, moved between threads untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct RawPtr(pub *mut c_void);

// SAFETY: the bridge never dereferences these pointers; it only hands them
// back to the extension that supplied them.
unsafe impl Send for RawPtr {}
unsafe impl Sync for RawPtr {}

#[derive(Clone, Copy)]
struct InstanceData {
    data: RawPtr,
    finalize_cb: napi_finalize,
    finalize_hint: RawPtr,
}

type CleanupFn = unsafe extern "C" fn(arg: *mut c_void);
type AsyncCleanupFn = unsafe extern "C" fn(handle: napi_async_cleanup_hook_handle, arg: *mut c_void);

#[derive(Default)]
struct EnvState {
    instance_data: Option<InstanceData>,
    cleanup_hooks: Vec<(CleanupFn, RawPtr)>,
    external_memory: i64,
}

#[derive(Clone, Copy)]
struct AsyncHook {
    env: usize,
    hook: AsyncCleanupFn,
    arg: RawPtr,
}

static ENVS: LazyLock<DashMap<usize, EnvState>> = LazyLock::new(DashMap::new);
static ASYNC_HOOKS: LazyLock<HandleRegistry<AsyncHook>> = LazyLock::new(HandleRegistry::new);

fn key(env: napi_env) -> usize {
    env as usize
}

// ============================================================================
// Instance Data
// ============================================================================

/// Replace the instance data of `env`. A previous value is not finalized.
pub fn set_instance_data(
    env: napi_env,
    data: *mut c_void,
    finalize_cb: napi_finalize,
    finalize_hint: *mut c_void,
) -> Status {
    ENVS.entry(key(env)).or_default().instance_data = Some(InstanceData {
        data: RawPtr(data),
        finalize_cb,
        finalize_hint: RawPtr(finalize_hint),
    });
    Status::OK
}

/// Instance data of `env`, or NULL.
pub fn instance_data(env: napi_env) -> *mut c_void {
    ENVS.get(&key(env))
        .and_then(|state| state.instance_data.map(|data| data.data.0))
        .unwrap_or(std::ptr::null_mut())
}

// ============================================================================
// Cleanup Hooks
// ============================================================================

/// Register `fun(arg)` to run at environment teardown. The pair must be
/// unique.
pub fn add_cleanup_hook(env: napi_env, fun: napi_cleanup_hook, arg: *mut c_void) -> Status {
    let Some(fun) = fun else {
        return Status::INVALID_ARG;
    };
    let mut state = ENVS.entry(key(env)).or_default();
    let entry = (fun, RawPtr(arg));
    if state.cleanup_hooks.iter().any(|hook| hook_eq(hook, &entry)) {
        return Status::INVALID_ARG;
    }
    state.cleanup_hooks.push(entry);
    Status::OK
}

/// Unregister a hook added with [`add_cleanup_hook`]. Unknown pairs are
/// ignored.
pub fn remove_cleanup_hook(env: napi_env, fun: napi_cleanup_hook, arg: *mut c_void) -> Status {
    let Some(fun) = fun else {
        return Status::INVALID_ARG;
    };
    if let Some(mut state) = ENVS.get_mut(&key(env)) {
        let entry = (fun, RawPtr(arg));
        state.cleanup_hooks.retain(|hook| !hook_eq(hook, &entry));
    }
    Status::OK
}

fn hook_eq(a: &(CleanupFn, RawPtr), b: &(CleanupFn, RawPtr)) -> bool {
    std::ptr::fn_addr_eq(a.0, b.0) && a.1 == b.1
}

/// Register an async cleanup hook and hand out its removal handle.
///
/// # Safety
/// `remove_handle` must be NULL or valid for writes.
pub unsafe fn add_async_cleanup_hook(
    env: napi_env,
    hook: napi_async_cleanup_hook,
    arg: *mut c_void,
    remove_handle: *mut napi_async_cleanup_hook_handle,
) -> Status {
    let Some(hook) = hook else {
        return Status::INVALID_ARG;
    };
    let id = ASYNC_HOOKS.insert(AsyncHook { env: key(env), hook, arg: RawPtr(arg) });
    if !remove_handle.is_null() {
        *remove_handle = to_handle(id);
    }
    Status::OK
}

/// Unregister an async cleanup hook.
#[no_mangle]
pub extern "C" fn napi_remove_async_cleanup_hook(
    remove_handle: napi_async_cleanup_hook_handle,
) -> Status {
    let status = match ASYNC_HOOKS.remove(from_handle(remove_handle)) {
        Some(_) => Status::OK,
        None => Status::INVALID_ARG,
    };
    crate::last_error::record(status)
}

// ============================================================================
// External Memory
// ============================================================================

/// Add `change` to the running total of externally allocated memory for
/// `env` and return the new total.
pub fn adjust_external_memory(env: napi_env, change: i64) -> i64 {
    let mut state = ENVS.entry(key(env)).or_default();
    state.external_memory = state.external_memory.saturating_add(change).max(0);
    state.external_memory
}

// ============================================================================
// Teardown
// ============================================================================

/// Run every hook registered for `env` and drop its state.
///
/// Order: cleanup hooks in reverse registration order, async cleanup hooks
/// in reverse registration order, the instance-data finalizer, then every
/// threadsafe function bound to `env` is aborted and pending async work is
/// abandoned.
pub fn teardown(env: napi_env) {
    let state = ENVS.remove(&key(env)).map(|(_, state)| state).unwrap_or_default();
    let hooks = state.cleanup_hooks.len();

    for (fun, arg) in state.cleanup_hooks.into_iter().rev() {
        // SAFETY: registered by the extension for exactly this call.
        unsafe { fun(arg.0) };
    }

    let async_hooks = ASYNC_HOOKS.ids_where(|hook| hook.env == key(env));
    for &id in async_hooks.iter().rev() {
        let Some(entry) = ASYNC_HOOKS.cloned(id) else {
            continue;
        };
        // SAFETY: as above; the hook is expected to remove itself.
        unsafe { (entry.hook)(to_handle(id), entry.arg.0) };
        ASYNC_HOOKS.remove(id);
    }

    if let Some(instance) = state.instance_data {
        if let Some(finalize) = instance.finalize_cb {
            // SAFETY: as above.
            unsafe { finalize(env, instance.data.0, instance.finalize_hint.0) };
        }
    }

    let aborted = threadsafe::abort_env(env);
    let abandoned = async_work::abandon_env(env);
    tracing::debug!(
        target: "napi_shim",
        env = ?env,
        hooks,
        async_hooks = async_hooks.len(),
        aborted,
        abandoned,
        "environment torn down"
    );
}

/// Tear down `env`; see [`teardown`].
#[no_mangle]
pub extern "C" fn napi_shim_teardown_env(env: napi_env) {
    teardown(env);
}
