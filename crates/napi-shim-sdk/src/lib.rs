//! napi-shim SDK - ABI surface and lifetime model shared by the shim and its backends
//!
//! This crate has no global state. It provides:
//!
//! - The C-layout types of the Node-API surface ([`types`])
//! - Status-mapped errors ([`error`])
//! - Handle scopes and references a backend uses to honour value lifetimes
//!   ([`handles`])
//! - Single-shot deferred settlement ([`deferred`])
//! - The multi-producer queue behind threadsafe functions ([`call_queue`])
//!
//! # Example
//!
//! ```ignore
//! use napi_shim_sdk::{HandleStore, ReferenceTable};
//!
//! let mut store = HandleStore::new();
//! let mut refs = ReferenceTable::new();
//! let scope = store.open_scope();
//! let handle = store.push(42.0);
//! let reference = refs.create(*store.get(handle)?, 1);
//! store.close_scope(scope)?;
//! assert_eq!(*refs.value(reference)?, 42.0);
//! ```

#![warn(missing_docs)]

pub mod call_queue;
pub mod deferred;
pub mod error;
pub mod handles;
pub mod types;

pub use call_queue::{CallQueue, QueueState, Released};
pub use deferred::{DeferredId, DeferredTable, Settlement};
pub use error::{ShimError, ShimResult};
pub use handles::{Handle, HandleStore, RefId, Reference, ReferenceTable, ScopeId};
pub use types::*;
