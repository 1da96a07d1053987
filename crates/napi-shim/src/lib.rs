//! Node-API dispatch shim
//!
//! This library exports the Node-API C surface (`napi_*` / `node_api_*`) so
//! that a native extension compiled against Node's headers can be loaded by a
//! host that is not Node. Every exported entry point forwards to a slot of a
//! process-wide [`CapabilityTable`] supplied by the host backend:
//!
//! - A backend fills in the slots it implements and publishes the table with
//!   [`table::publish`] or `napi_shim_set_functions`
//! - An extension calls `napi_*` as usual; the call is forwarded unchanged
//! - A NULL slot selects a per-operation fallback ([`policy`]): fail, report
//!   success without effect, or a conservative default
//!
//! Threadsafe functions, async work, cleanup hooks and instance data are
//! implemented by the bridge itself on top of the backend's slots. The
//! backend drives them by calling `napi_shim_run_pending(env)` on the
//! environment thread whenever the `notify_pending` slot fires, and
//! `napi_shim_teardown_env(env)` when an environment goes away.

pub mod async_work;
pub mod diagnostics;
pub mod env_state;
pub mod last_error;
pub mod logging;
pub mod policy;
mod registry;
pub mod table;
pub mod threadsafe;
pub mod trampolines;

pub use napi_shim_sdk as sdk;
pub use policy::{Fallback, Operation, OPERATIONS};
pub use table::{current, publish, withdraw, CapabilityTable};
pub use threadsafe::napi_shim_run_pending;
