//! Per-thread last status and `napi_get_last_error_info`

use std::cell::Cell;

use napi_shim_sdk::{napi_env, ExtendedErrorInfo, Status};

thread_local! {
    static LAST_STATUS: Cell<Status> = const { Cell::new(Status::OK) };
    static LAST_INFO: Cell<ExtendedErrorInfo> = Cell::new(ExtendedErrorInfo::default());
}

/// Remember `status` as the calling thread's last status and return it.
#[inline]
pub fn record(status: Status) -> Status {
    LAST_STATUS.with(|last| last.set(status));
    status
}

/// The calling thread's last recorded status.
pub fn last_status() -> Status {
    LAST_STATUS.with(Cell::get)
}

/// Fill the thread's error info from the last status and return a pointer to
/// it, valid until the next call on this thread.
pub fn last_error_info() -> *const ExtendedErrorInfo {
    let status = last_status();
    let info = ExtendedErrorInfo {
        error_message: status.message_cstr().map_or(std::ptr::null(), |text| text.as_ptr()),
        error_code: status,
        ..ExtendedErrorInfo::default()
    };
    LAST_INFO.with(|cell| {
        cell.set(info);
        cell.as_ptr() as *const ExtendedErrorInfo
    })
}

/// Information about the last failed call on this thread. Does not itself
/// change the last status.
///
/// # Safety
/// `result` must be NULL or valid for writes.
#[no_mangle]
pub unsafe extern "C" fn napi_get_last_error_info(
    _env: napi_env,
    result: *mut *const ExtendedErrorInfo,
) -> Status {
    if result.is_null() {
        return Status::INVALID_ARG;
    }
    *result = last_error_info();
    Status::OK
}
