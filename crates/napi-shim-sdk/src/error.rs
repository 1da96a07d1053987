//! Error types for the shim SDK
//!
//! Rust-side APIs return [`ShimResult`]; only [`Status`] ever crosses the C
//! boundary, so every error maps back to one status code.

use crate::types::Status;

/// Result type for SDK operations
pub type ShimResult<T> = Result<T, ShimError>;

/// Errors raised by SDK building blocks
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ShimError {
    /// A status reported by a backend or a trampoline
    #[error("{}", .0.message().unwrap_or("Unknown status"))]
    Status(Status),

    /// A scope was closed while an inner scope was still open
    #[error("Handle scope {scope} closed out of order (innermost open scope is {innermost:?})")]
    HandleScopeMismatch {
        /// Scope the caller tried to close
        scope: usize,
        /// Scope that must be closed first
        innermost: Option<usize>,
    },

    /// A second escape from an escapable scope
    #[error("Handle scope {0} already escaped a value")]
    EscapeCalledTwice(usize),

    /// A value handle that is not live
    #[error("Invalid value handle: {0}")]
    InvalidHandle(usize),

    /// A reference id that was deleted or never existed
    #[error("Invalid reference: {0}")]
    InvalidReference(usize),

    /// A deferred that was already resolved or rejected
    #[error("Deferred {0} was already settled")]
    AlreadySettled(usize),

    /// Non-blocking enqueue on a full queue
    #[error("Queue is full")]
    QueueFull,

    /// Enqueue or acquire on a closing queue
    #[error("Queue is closing")]
    Closing,

    /// Configuration value could not be parsed
    #[error("Configuration error: {0}")]
    Config(String),
}

impl ShimError {
    /// The ABI status reported for this error.
    pub fn status(&self) -> Status {
        match self {
            ShimError::Status(status) => *status,
            ShimError::HandleScopeMismatch { .. } => Status::HANDLE_SCOPE_MISMATCH,
            ShimError::EscapeCalledTwice(_) => Status::ESCAPE_CALLED_TWICE,
            ShimError::InvalidHandle(_) | ShimError::InvalidReference(_) => Status::INVALID_ARG,
            ShimError::AlreadySettled(_) => Status::INVALID_ARG,
            ShimError::QueueFull => Status::QUEUE_FULL,
            ShimError::Closing => Status::CLOSING,
            ShimError::Config(_) => Status::INVALID_ARG,
        }
    }
}

impl From<Status> for ShimError {
    fn from(status: Status) -> Self {
        ShimError::Status(status)
    }
}

impl Status {
    /// Historical last-error message for this status; `None` for success.
    pub fn message(self) -> Option<&'static str> {
        self.message_cstr().and_then(|text| text.to_str().ok())
    }

    /// The message as a NUL-terminated string, as handed out through
    /// `napi_get_last_error_info`.
    pub fn message_cstr(self) -> Option<&'static std::ffi::CStr> {
        let bytes: &'static [u8] = match self {
            Status::OK => return None,
            Status::INVALID_ARG => b"Invalid argument\0",
            Status::OBJECT_EXPECTED => b"An object was expected\0",
            Status::STRING_EXPECTED => b"A string was expected\0",
            Status::NAME_EXPECTED => b"A string or symbol was expected\0",
            Status::FUNCTION_EXPECTED => b"A function was expected\0",
            Status::NUMBER_EXPECTED => b"A number was expected\0",
            Status::BOOLEAN_EXPECTED => b"A boolean was expected\0",
            Status::ARRAY_EXPECTED => b"An array was expected\0",
            Status::GENERIC_FAILURE => b"Unknown failure\0",
            Status::PENDING_EXCEPTION => b"An exception is pending\0",
            Status::CANCELLED => b"The async work item was cancelled\0",
            Status::ESCAPE_CALLED_TWICE => b"napi_escape_handle already called on scope\0",
            Status::HANDLE_SCOPE_MISMATCH => b"Invalid handle scope usage\0",
            Status::CALLBACK_SCOPE_MISMATCH => b"Invalid callback scope usage\0",
            Status::QUEUE_FULL => b"Thread-safe function queue is full\0",
            Status::CLOSING => b"Thread-safe function handle is closing\0",
            Status::BIGINT_EXPECTED => b"A bigint was expected\0",
            Status::DATE_EXPECTED => b"A date was expected\0",
            Status::ARRAYBUFFER_EXPECTED => b"An arraybuffer was expected\0",
            Status::DETACHABLE_ARRAYBUFFER_EXPECTED => b"A detachable arraybuffer was expected\0",
            Status::WOULD_DEADLOCK => b"Main thread would deadlock\0",
            Status::NO_EXTERNAL_BUFFERS_ALLOWED => b"External buffers are not allowed\0",
            Status::CANNOT_RUN_JS => b"Cannot run JavaScript\0",
            _ => b"Unknown status\0",
        };
        std::ffi::CStr::from_bytes_with_nul(bytes).ok()
    }

    /// `Ok(())` for [`Status::OK`], the status as an error otherwise.
    pub fn into_result(self) -> ShimResult<()> {
        if self.is_ok() {
            Ok(())
        } else {
            Err(ShimError::Status(self))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_status_mapping() {
        assert_eq!(ShimError::QueueFull.status(), Status::QUEUE_FULL);
        assert_eq!(ShimError::Closing.status(), Status::CLOSING);
        assert_eq!(ShimError::EscapeCalledTwice(3).status(), Status::ESCAPE_CALLED_TWICE);
        assert_eq!(
            ShimError::HandleScopeMismatch { scope: 1, innermost: Some(2) }.status(),
            Status::HANDLE_SCOPE_MISMATCH
        );
        assert_eq!(ShimError::from(Status::CANCELLED).status(), Status::CANCELLED);
    }

    #[test]
    fn test_messages_cover_every_status() {
        assert!(Status::OK.message().is_none());
        assert!(Status::OK.message_cstr().is_none());
        for status in Status::ALL.iter().skip(1) {
            let text = status.message().unwrap();
            let c_text = status.message_cstr().unwrap();
            assert_eq!(c_text.to_str().unwrap(), text);
        }
    }

    #[test]
    fn test_into_result() {
        assert!(Status::OK.into_result().is_ok());
        let err = Status::PENDING_EXCEPTION.into_result().unwrap_err();
        assert_eq!(err.to_string(), "An exception is pending");
    }
}
