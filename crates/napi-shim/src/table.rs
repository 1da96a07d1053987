//! Process-wide capability table
//!
//! A backend fills in a [`CapabilityTable`] and publishes it once at load
//! time. Trampolines read the published table with a single atomic load; a
//! republish swaps the pointer, so every call sees one whole snapshot.
//! Retired snapshots are leaked on purpose: a call that loaded the old
//! pointer may still be running against it.

use std::ptr;
use std::sync::atomic::{AtomicPtr, AtomicU64, Ordering};

use napi_shim_sdk::{napi_env, napi_handle_scope, Status};

pub use crate::trampolines::CapabilityTable;

static TABLE: AtomicPtr<CapabilityTable> = AtomicPtr::new(ptr::null_mut());
static GENERATION: AtomicU64 = AtomicU64::new(0);

/// Publish `table` for every subsequent trampoline call.
///
/// Returns the new generation number.
pub fn publish(table: CapabilityTable) -> u64 {
    let populated = table.populated_slots();
    let snapshot = Box::leak(Box::new(table));
    TABLE.swap(snapshot, Ordering::AcqRel);
    let generation = GENERATION.fetch_add(1, Ordering::AcqRel) + 1;
    tracing::info!(
        target: "napi_shim",
        generation,
        populated,
        total = CapabilityTable::SLOT_COUNT,
        "capability table published"
    );
    generation
}

/// Unpublish the table. Trampolines fail with `napi_generic_failure` until
/// the next [`publish`].
pub fn withdraw() {
    let previous = TABLE.swap(ptr::null_mut(), Ordering::AcqRel);
    if !previous.is_null() {
        GENERATION.fetch_add(1, Ordering::AcqRel);
        tracing::info!(target: "napi_shim", "capability table withdrawn");
    }
}

/// The published snapshot, if any.
#[inline]
pub fn current() -> Option<&'static CapabilityTable> {
    let table = TABLE.load(Ordering::Acquire);
    // SAFETY: non-null pointers stored in TABLE come from Box::leak and are
    // never freed.
    unsafe { table.as_ref() }
}

/// Number of publish/withdraw transitions so far.
pub fn generation() -> u64 {
    GENERATION.load(Ordering::Acquire)
}

/// Run `f` inside a backend handle scope when the table supports scopes.
pub(crate) fn with_handle_scope<R>(env: napi_env, f: impl FnOnce() -> R) -> R {
    let slots = current().and_then(|table| Some((table.open_handle_scope?, table.close_handle_scope?)));
    let Some((open, close)) = slots else {
        return f();
    };
    let mut scope: napi_handle_scope = ptr::null_mut();
    // SAFETY: backend slot with a valid out-pointer.
    let opened = unsafe { open(env, &mut scope) }.is_ok();
    let result = f();
    if opened {
        // SAFETY: closes the scope opened above, which is innermost again.
        unsafe { close(env, scope) };
    }
    result
}

// ============================================================================
// C Registration Entry Points
// ============================================================================

/// Publish a copy of `*functions`.
///
/// # Safety
/// `functions` must be NULL or point to a valid `CapabilityTable`. The table
/// is copied; the caller keeps ownership of its memory.
#[no_mangle]
pub unsafe extern "C" fn napi_shim_set_functions(functions: *const CapabilityTable) -> Status {
    match functions.as_ref() {
        Some(table) => {
            publish(*table);
            Status::OK
        }
        None => Status::INVALID_ARG,
    }
}

/// Withdraw the published table.
#[no_mangle]
pub extern "C" fn napi_shim_clear_functions() {
    withdraw();
}
