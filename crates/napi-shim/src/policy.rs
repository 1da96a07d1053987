//! Per-operation fallback policy
//!
//! Each table-backed entry point has exactly one [`Fallback`], declared next
//! to its signature in `trampolines.rs`. [`OPERATIONS`] is generated from the
//! same declaration, so the degraded-mode behaviour can be audited (and
//! tested) as data.

use std::sync::atomic::{AtomicBool, Ordering};

pub use crate::trampolines::OPERATIONS;

/// What a trampoline does when its slot is NULL.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fallback {
    /// Return a failure status, `napi_generic_failure` unless stated.
    Fail,
    /// Report success without any effect; out-values are the "nothing" value.
    Inert,
    /// Report success with a conservative value, possibly by delegating to
    /// another slot.
    Default,
}

/// One row of the policy table.
#[derive(Debug, Clone, Copy)]
pub struct Operation {
    /// Exported symbol, e.g. `napi_get_version`.
    pub export: &'static str,
    /// Field name in the capability table.
    pub slot: &'static str,
    /// Fallback applied when the slot is NULL.
    pub fallback: Fallback,
}

/// Inert fallbacks whose success can hide a lifetime bug in the caller.
pub const RISKY_INERT: &[&str] = &[
    "napi_wrap",
    "napi_unwrap",
    "napi_add_finalizer",
    "napi_reference_ref",
    "napi_reference_unref",
];

/// Look up an operation by export name.
pub fn operation(export: &str) -> Option<&'static Operation> {
    OPERATIONS.iter().find(|op| op.export == export)
}

/// Log the first fallback taken by `export`.
pub(crate) fn note_fallback(seen: &AtomicBool, export: &'static str, fallback: Fallback) {
    if seen.swap(true, Ordering::Relaxed) {
        return;
    }
    if fallback == Fallback::Inert && RISKY_INERT.contains(&export) {
        tracing::warn!(
            target: "napi_shim",
            operation = export,
            "backend does not implement {export}; reporting success without effect, \
             callers relying on it for object lifetime may double-free or leak"
        );
    } else {
        tracing::debug!(target: "napi_shim", operation = export, ?fallback, "fallback applied");
    }
}
