//! Handle and reference lifetime model
//!
//! The shim itself never interprets a `napi_value` or `napi_ref`; these types
//! are the bookkeeping a backend needs to honour the lifetime rules every
//! loaded binary relies on:
//!
//! - A value handle created inside a scope is *transient*: it dies when that
//!   scope closes.
//! - Scopes nest strictly. Closing anything but the innermost open scope is
//!   rejected with [`ShimError::HandleScopeMismatch`] and changes nothing.
//! - An escapable scope may hand exactly one value to its parent scope.
//! - A [`Reference`] keeps its value alive independently of scopes until it
//!   is deleted, whatever its count. The count is advisory and only changes
//!   through [`ReferenceTable::increment`] / [`ReferenceTable::decrement`].

use std::collections::HashMap;
use std::num::NonZeroUsize;

use crate::error::{ShimError, ShimResult};
use crate::types::{napi_handle_scope, napi_ref, napi_value, Status};

// ============================================================================
// Value Handles
// ============================================================================

/// One-based slot index of a live value in a [`HandleStore`], so the raw
/// form of a handle is never NULL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Handle(NonZeroUsize);

impl Handle {
    fn from_slot(slot: usize) -> Handle {
        Handle(NonZeroUsize::MIN.saturating_add(slot))
    }

    fn slot(self) -> usize {
        self.0.get() - 1
    }

    /// One-based index.
    pub fn index(self) -> usize {
        self.0.get()
    }

    /// Raw ABI form.
    pub fn to_raw(self) -> napi_value {
        self.0.get() as napi_value
    }

    /// Parse the raw ABI form; `None` for NULL.
    pub fn from_raw(raw: napi_value) -> Option<Handle> {
        NonZeroUsize::new(raw as usize).map(Handle)
    }
}

/// Identifier of an open scope. Ids are never reused, so a stale id is
/// always detected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ScopeId(NonZeroUsize);

impl ScopeId {
    /// Numeric id.
    pub fn get(self) -> usize {
        self.0.get()
    }

    /// Raw ABI form.
    pub fn to_raw(self) -> napi_handle_scope {
        self.0.get() as napi_handle_scope
    }

    /// Parse the raw ABI form; `None` for NULL.
    pub fn from_raw(raw: napi_handle_scope) -> Option<ScopeId> {
        NonZeroUsize::new(raw as usize).map(ScopeId)
    }
}

#[derive(Debug)]
struct ScopeFrame {
    id: ScopeId,
    /// First slot owned by this scope.
    start: usize,
    /// Slot reserved in the parent's range for an escaped value.
    escape_slot: Option<usize>,
    escaped: bool,
}

/// Stack-disciplined storage for scope-bound values.
///
/// Values pushed while no scope is open belong to the root and live until
/// [`HandleStore::clear`].
pub struct HandleStore<V> {
    values: Vec<Option<V>>,
    scopes: Vec<ScopeFrame>,
    next_scope: NonZeroUsize,
}

impl<V> HandleStore<V> {
    /// Create an empty store with no open scope.
    pub fn new() -> Self {
        Self {
            values: Vec::new(),
            scopes: Vec::new(),
            next_scope: NonZeroUsize::MIN,
        }
    }

    /// Store a value in the innermost open scope.
    pub fn push(&mut self, value: V) -> Handle {
        self.values.push(Some(value));
        Handle::from_slot(self.values.len() - 1)
    }

    /// Borrow a live value.
    pub fn get(&self, handle: Handle) -> ShimResult<&V> {
        self.values
            .get(handle.slot())
            .and_then(|slot| slot.as_ref())
            .ok_or(ShimError::InvalidHandle(handle.index()))
    }

    /// Borrow a live value from its raw form.
    pub fn get_raw(&self, raw: napi_value) -> ShimResult<&V> {
        let handle = Handle::from_raw(raw).ok_or(ShimError::Status(Status::INVALID_ARG))?;
        self.get(handle)
    }

    /// Whether the handle refers to a live value.
    pub fn is_live(&self, handle: Handle) -> bool {
        self.get(handle).is_ok()
    }

    /// Open a scope nested inside the current innermost scope.
    pub fn open_scope(&mut self) -> ScopeId {
        self.open_frame(false)
    }

    /// Open a scope that may escape one value to its parent.
    pub fn open_escapable_scope(&mut self) -> ScopeId {
        self.open_frame(true)
    }

    fn open_frame(&mut self, escapable: bool) -> ScopeId {
        let escape_slot = if escapable {
            self.values.push(None);
            Some(self.values.len() - 1)
        } else {
            None
        };
        let id = ScopeId(self.next_scope);
        self.next_scope = self.next_scope.saturating_add(1);
        self.scopes.push(ScopeFrame {
            id,
            start: self.values.len(),
            escape_slot,
            escaped: false,
        });
        id
    }

    /// Close the innermost scope, invalidating every value created in it.
    ///
    /// Closing any other scope is rejected and leaves every scope open.
    pub fn close_scope(&mut self, id: ScopeId) -> ShimResult<()> {
        match self.scopes.last() {
            Some(frame) if frame.id == id => {}
            innermost => {
                return Err(ShimError::HandleScopeMismatch {
                    scope: id.get(),
                    innermost: innermost.map(|frame| frame.id.get()),
                })
            }
        }
        if let Some(frame) = self.scopes.pop() {
            self.values.truncate(frame.start);
        }
        Ok(())
    }

    /// Number of open scopes.
    pub fn depth(&self) -> usize {
        self.scopes.len()
    }

    /// Innermost open scope.
    pub fn current_scope(&self) -> Option<ScopeId> {
        self.scopes.last().map(|frame| frame.id)
    }

    /// Drop every value and scope.
    pub fn clear(&mut self) {
        self.values.clear();
        self.scopes.clear();
    }
}

impl<V: Clone> HandleStore<V> {
    /// Promote `handle` out of the escapable scope `id` into its parent.
    ///
    /// The returned handle stays valid after `id` closes. A second escape
    /// from the same scope fails with [`ShimError::EscapeCalledTwice`].
    pub fn escape(&mut self, id: ScopeId, handle: Handle) -> ShimResult<Handle> {
        let position = self
            .scopes
            .iter()
            .position(|frame| frame.id == id)
            .ok_or(ShimError::HandleScopeMismatch {
                scope: id.get(),
                innermost: self.current_scope().map(ScopeId::get),
            })?;
        let value = self.get(handle)?.clone();
        let frame = &mut self.scopes[position];
        let slot = frame.escape_slot.ok_or(ShimError::Status(Status::INVALID_ARG))?;
        if frame.escaped {
            return Err(ShimError::EscapeCalledTwice(id.get()));
        }
        frame.escaped = true;
        self.values[slot] = Some(value);
        Ok(Handle::from_slot(slot))
    }
}

impl<V> Default for HandleStore<V> {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// References
// ============================================================================

/// Identifier of a reference. Ids are never reused, so any access after
/// [`ReferenceTable::delete`] fails instead of aliasing a newer reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RefId(NonZeroUsize);

impl RefId {
    /// Numeric id.
    pub fn get(self) -> usize {
        self.0.get()
    }

    /// Raw ABI form.
    pub fn to_raw(self) -> napi_ref {
        self.0.get() as napi_ref
    }

    /// Parse the raw ABI form; `None` for NULL.
    pub fn from_raw(raw: napi_ref) -> Option<RefId> {
        NonZeroUsize::new(raw as usize).map(RefId)
    }
}

/// A value held independently of scopes, with an advisory count.
#[derive(Debug)]
pub struct Reference<V> {
    value: V,
    count: u32,
}

impl<V> Reference<V> {
    fn new(value: V, initial: u32) -> Self {
        Self { value, count: initial }
    }

    /// The referenced value.
    pub fn value(&self) -> &V {
        &self.value
    }

    /// Current count.
    pub fn count(&self) -> u32 {
        self.count
    }

    fn increment(&mut self) -> u32 {
        self.count = self.count.saturating_add(1);
        self.count
    }

    fn decrement(&mut self) -> Option<u32> {
        self.count = self.count.checked_sub(1)?;
        Some(self.count)
    }
}

/// Owner of every live [`Reference`] of one environment.
pub struct ReferenceTable<V> {
    entries: HashMap<RefId, Reference<V>>,
    next_id: NonZeroUsize,
}

impl<V> ReferenceTable<V> {
    /// Create an empty table.
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
            next_id: NonZeroUsize::MIN,
        }
    }

    /// Create a reference. A count of zero still keeps `value` reachable
    /// until the reference is deleted.
    pub fn create(&mut self, value: V, initial: u32) -> RefId {
        let id = RefId(self.next_id);
        self.next_id = self.next_id.saturating_add(1);
        self.entries.insert(id, Reference::new(value, initial));
        id
    }

    /// Borrow a live reference.
    pub fn get(&self, id: RefId) -> ShimResult<&Reference<V>> {
        self.entries.get(&id).ok_or(ShimError::InvalidReference(id.get()))
    }

    /// Borrow the referenced value.
    pub fn value(&self, id: RefId) -> ShimResult<&V> {
        self.get(id).map(Reference::value)
    }

    /// Increment the count, returning the new count.
    pub fn increment(&mut self, id: RefId) -> ShimResult<u32> {
        self.entries
            .get_mut(&id)
            .map(Reference::increment)
            .ok_or(ShimError::InvalidReference(id.get()))
    }

    /// Decrement the count, returning the new count. Decrementing a count
    /// that is already zero fails with `napi_generic_failure`.
    pub fn decrement(&mut self, id: RefId) -> ShimResult<u32> {
        let reference = self
            .entries
            .get_mut(&id)
            .ok_or(ShimError::InvalidReference(id.get()))?;
        reference
            .decrement()
            .ok_or(ShimError::Status(Status::GENERIC_FAILURE))
    }

    /// Delete a reference and hand back its value.
    pub fn delete(&mut self, id: RefId) -> ShimResult<V> {
        self.entries
            .remove(&id)
            .map(|reference| reference.value)
            .ok_or(ShimError::InvalidReference(id.get()))
    }

    /// Number of live references.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no reference is live.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<V> Default for ReferenceTable<V> {
    fn default() -> Self {
        Self::new()
    }
}
