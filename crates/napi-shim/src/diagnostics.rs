//! Non-aborting fatal reporting and module registration
//!
//! The shim does not own the host process, so neither `napi_fatal_error` nor
//! `napi_fatal_exception` terminates it: both report through `tracing` and
//! return.

use std::borrow::Cow;
use std::ffi::CStr;
use std::os::raw::c_char;

use napi_shim_sdk::{napi_env, napi_value, ModuleDescriptor};

/// Length value meaning "NUL-terminated".
pub const NAPI_AUTO_LENGTH: usize = usize::MAX;

/// Read a C string argument with an explicit or automatic length.
///
/// # Safety
/// `text` must be NULL, or valid for `len` bytes, or NUL-terminated when
/// `len` is [`NAPI_AUTO_LENGTH`].
pub unsafe fn lossy_str<'a>(text: *const c_char, len: usize) -> Cow<'a, str> {
    if text.is_null() {
        return Cow::Borrowed("");
    }
    if len == NAPI_AUTO_LENGTH {
        CStr::from_ptr(text).to_string_lossy()
    } else {
        String::from_utf8_lossy(std::slice::from_raw_parts(text.cast::<u8>(), len))
    }
}

/// Report an uncaught exception handed to `napi_fatal_exception`.
pub fn fatal_exception(env: napi_env, error: napi_value) {
    tracing::error!(
        target: "napi_shim",
        env = ?env,
        error = ?error,
        "fatal exception reported by extension; continuing"
    );
}

/// Report a fatal error raised by an extension. Returns to the caller
/// instead of aborting.
///
/// # Safety
/// `location` and `message` follow [`lossy_str`]'s contract.
#[no_mangle]
pub unsafe extern "C" fn napi_fatal_error(
    location: *const c_char,
    location_len: usize,
    message: *const c_char,
    message_len: usize,
) {
    let location = lossy_str(location, location_len);
    let message = lossy_str(message, message_len);
    tracing::error!(target: "napi_shim", %location, "FATAL ERROR: {message}");
}

/// Static module registration. Loading is driven by the host, so this only
/// records the module name.
///
/// # Safety
/// `module` must be NULL or point to a valid descriptor.
#[no_mangle]
pub unsafe extern "C" fn napi_module_register(module: *mut ModuleDescriptor) {
    let Some(module) = module.as_ref() else {
        return;
    };
    let name = lossy_str(module.nm_modname, NAPI_AUTO_LENGTH);
    tracing::debug!(
        target: "napi_shim",
        module = %name,
        version = module.nm_version,
        "static module registration ignored"
    );
}
