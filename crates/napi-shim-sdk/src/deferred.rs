//! Single-shot promise settlement tokens
//!
//! A `napi_deferred` may be resolved or rejected exactly once. The table
//! consumes the entry on first settlement; any later attempt fails with
//! [`ShimError::AlreadySettled`] and the caller must not deliver anything.

use std::collections::HashMap;
use std::num::NonZeroUsize;

use crate::error::{ShimError, ShimResult};
use crate::types::napi_deferred;

/// Identifier of a deferred.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DeferredId(NonZeroUsize);

impl DeferredId {
    /// Numeric id.
    pub fn get(self) -> usize {
        self.0.get()
    }

    /// Raw ABI form.
    pub fn to_raw(self) -> napi_deferred {
        self.0.get() as napi_deferred
    }

    /// Parse the raw ABI form; `None` for NULL.
    pub fn from_raw(raw: napi_deferred) -> Option<DeferredId> {
        NonZeroUsize::new(raw as usize).map(DeferredId)
    }
}

/// How a deferred was settled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Settlement {
    /// `napi_resolve_deferred`
    Resolved,
    /// `napi_reject_deferred`
    Rejected,
}

/// Pending deferreds of one environment. `V` is whatever the backend needs
/// to complete the promise.
pub struct DeferredTable<V> {
    pending: HashMap<DeferredId, V>,
    settled: HashMap<DeferredId, Settlement>,
    next_id: NonZeroUsize,
}

impl<V> DeferredTable<V> {
    /// Create an empty table.
    pub fn new() -> Self {
        Self {
            pending: HashMap::new(),
            settled: HashMap::new(),
            next_id: NonZeroUsize::MIN,
        }
    }

    /// Register a new pending deferred.
    pub fn create(&mut self, resolver: V) -> DeferredId {
        let id = DeferredId(self.next_id);
        self.next_id = self.next_id.saturating_add(1);
        self.pending.insert(id, resolver);
        id
    }

    /// Consume the deferred, handing back its resolver.
    pub fn settle(&mut self, id: DeferredId, how: Settlement) -> ShimResult<V> {
        let resolver = self
            .pending
            .remove(&id)
            .ok_or(ShimError::AlreadySettled(id.get()))?;
        self.settled.insert(id, how);
        Ok(resolver)
    }

    /// Whether the deferred is still waiting for settlement.
    pub fn is_pending(&self, id: DeferredId) -> bool {
        self.pending.contains_key(&id)
    }

    /// How the deferred was settled, if it was.
    pub fn settlement(&self, id: DeferredId) -> Option<Settlement> {
        self.settled.get(&id).copied()
    }

    /// Number of pending deferreds.
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }
}

impl<V> Default for DeferredTable<V> {
    fn default() -> Self {
        Self::new()
    }
}
