//! Stub backend shared by the integration tests
//!
//! Values live in a `HandleStore`, references in a `ReferenceTable` and
//! promises in a `DeferredTable`, all behind one process-wide lock. The lock
//! is never held while native code runs, so callbacks may re-enter the
//! bridge freely.

#![allow(dead_code)]

use std::collections::HashMap;
use std::ffi::{c_void, CStr};
use std::os::raw::c_char;
use std::ptr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::LazyLock;
use std::time::{Duration, Instant};

use napi_shim::sdk::*;
use napi_shim::CapabilityTable;
use parking_lot::{Mutex, MutexGuard};

pub const NAPI_AUTO_LENGTH: usize = usize::MAX;

#[derive(Debug, Clone, PartialEq)]
pub enum Val {
    Undefined,
    Null,
    Bool(bool),
    Number(f64),
    Str(String),
    Object(usize),
    Function(usize),
    Buffer(usize),
    Promise(usize),
}

#[derive(Debug, Clone, PartialEq)]
pub enum PromiseState {
    Pending,
    Resolved(Val),
    Rejected(Val),
}

pub struct NativeFunction {
    pub name: String,
    pub cb: napi_callback,
    pub data: usize,
}

struct CallInfo {
    this: napi_value,
    args: Vec<napi_value>,
    data: *mut c_void,
}

#[derive(Default)]
pub struct Backend {
    pub store: HandleStore<Val>,
    pub refs: ReferenceTable<Val>,
    pub deferreds: DeferredTable<usize>,
    pub objects: Vec<HashMap<String, Val>>,
    pub functions: Vec<NativeFunction>,
    pub buffers: Vec<Vec<u8>>,
    pub promises: Vec<PromiseState>,
}

pub static BACKEND: LazyLock<Mutex<Backend>> = LazyLock::new(|| Mutex::new(Backend::default()));
pub static NOTIFIED: AtomicUsize = AtomicUsize::new(0);
static SERIAL: Mutex<()> = Mutex::new(());

pub fn backend() -> MutexGuard<'static, Backend> {
    BACKEND.lock()
}

pub fn env() -> napi_env {
    0xE0_0000 as napi_env
}

/// Serialize the test and reset the backend without publishing anything.
pub fn lock() -> MutexGuard<'static, ()> {
    let guard = SERIAL.lock();
    *backend() = Backend::default();
    NOTIFIED.store(0, Ordering::SeqCst);
    guard
}

/// Serialize the test and publish the full stub table.
pub fn setup() -> MutexGuard<'static, ()> {
    setup_with(stub_table())
}

/// Serialize the test and publish `table`.
pub fn setup_with(table: CapabilityTable) -> MutexGuard<'static, ()> {
    let guard = lock();
    napi_shim::publish(table);
    guard
}

/// Call `napi_shim_run_pending` until `done` holds or five seconds pass.
pub fn run_until(env: napi_env, mut done: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_secs(5);
    loop {
        napi_shim::napi_shim_run_pending(env);
        if done() {
            return true;
        }
        if Instant::now() > deadline {
            return false;
        }
        std::thread::sleep(Duration::from_millis(1));
    }
}

// ============================================================================
// Inspection Helpers
// ============================================================================

pub fn value_of(raw: napi_value) -> Option<Val> {
    backend().store.get_raw(raw).ok().cloned()
}

pub fn new_value(val: Val) -> napi_value {
    backend().store.push(val).to_raw()
}

pub fn property(object: napi_value, name: &str) -> Option<Val> {
    let backend = backend();
    match backend.store.get_raw(object) {
        Ok(Val::Object(index)) => backend.objects[*index].get(name).cloned(),
        _ => None,
    }
}

// ============================================================================
// Slot Implementations
// ============================================================================

unsafe fn write<T>(out: *mut T, value: T) -> Status {
    if out.is_null() {
        return Status::INVALID_ARG;
    }
    out.write(value);
    Status::OK
}

macro_rules! tri {
    ($e:expr) => {
        match $e {
            Ok(value) => value,
            Err(status) => return status,
        }
    };
}

fn read(raw: napi_value) -> Result<Val, Status> {
    backend().store.get_raw(raw).cloned().map_err(|err| err.status())
}

fn object_index(raw: napi_value) -> Result<usize, Status> {
    match read(raw)? {
        Val::Object(index) => Ok(index),
        _ => Err(Status::OBJECT_EXPECTED),
    }
}

unsafe fn c_text(text: *const c_char, length: usize) -> Result<String, Status> {
    if text.is_null() {
        return if length == 0 { Ok(String::new()) } else { Err(Status::INVALID_ARG) };
    }
    Ok(if length == NAPI_AUTO_LENGTH {
        CStr::from_ptr(text).to_string_lossy().into_owned()
    } else {
        String::from_utf8_lossy(std::slice::from_raw_parts(text.cast::<u8>(), length)).into_owned()
    })
}

pub unsafe extern "C" fn get_undefined(_env: napi_env, result: *mut napi_value) -> Status {
    write(result, new_value(Val::Undefined))
}

pub unsafe extern "C" fn get_null(_env: napi_env, result: *mut napi_value) -> Status {
    write(result, new_value(Val::Null))
}

pub unsafe extern "C" fn get_boolean(_env: napi_env, value: bool, result: *mut napi_value) -> Status {
    write(result, new_value(Val::Bool(value)))
}

pub unsafe extern "C" fn create_int32(_env: napi_env, value: i32, result: *mut napi_value) -> Status {
    write(result, new_value(Val::Number(value as f64)))
}

pub unsafe extern "C" fn create_uint32(_env: napi_env, value: u32, result: *mut napi_value) -> Status {
    write(result, new_value(Val::Number(value as f64)))
}

pub unsafe extern "C" fn create_int64(_env: napi_env, value: i64, result: *mut napi_value) -> Status {
    write(result, new_value(Val::Number(value as f64)))
}

pub unsafe extern "C" fn create_double(_env: napi_env, value: f64, result: *mut napi_value) -> Status {
    write(result, new_value(Val::Number(value)))
}

pub unsafe extern "C" fn create_string_utf8(
    _env: napi_env,
    string: *const c_char,
    length: usize,
    result: *mut napi_value,
) -> Status {
    let text = tri!(c_text(string, length));
    write(result, new_value(Val::Str(text)))
}

pub unsafe extern "C" fn get_value_bool(_env: napi_env, value: napi_value, result: *mut bool) -> Status {
    match tri!(read(value)) {
        Val::Bool(flag) => write(result, flag),
        _ => Status::BOOLEAN_EXPECTED,
    }
}

pub unsafe extern "C" fn get_value_double(_env: napi_env, value: napi_value, result: *mut f64) -> Status {
    match tri!(read(value)) {
        Val::Number(number) => write(result, number),
        _ => Status::NUMBER_EXPECTED,
    }
}

pub unsafe extern "C" fn get_value_int32(_env: napi_env, value: napi_value, result: *mut i32) -> Status {
    match tri!(read(value)) {
        Val::Number(number) => write(result, number as i32),
        _ => Status::NUMBER_EXPECTED,
    }
}

pub unsafe extern "C" fn get_value_int64(_env: napi_env, value: napi_value, result: *mut i64) -> Status {
    match tri!(read(value)) {
        Val::Number(number) => write(result, number as i64),
        _ => Status::NUMBER_EXPECTED,
    }
}

pub unsafe extern "C" fn get_value_string_utf8(
    _env: napi_env,
    value: napi_value,
    buf: *mut c_char,
    bufsize: usize,
    result: *mut usize,
) -> Status {
    let Val::Str(text) = tri!(read(value)) else {
        return Status::STRING_EXPECTED;
    };
    if buf.is_null() {
        return write(result, text.len());
    }
    if bufsize == 0 {
        return Status::OK;
    }
    let copied = text.len().min(bufsize - 1);
    ptr::copy_nonoverlapping(text.as_ptr(), buf.cast::<u8>(), copied);
    *buf.add(copied) = 0;
    if !result.is_null() {
        *result = copied;
    }
    Status::OK
}

pub unsafe extern "C" fn typeof_(_env: napi_env, value: napi_value, result: *mut ValueType) -> Status {
    let kind = match tri!(read(value)) {
        Val::Undefined => ValueType::UNDEFINED,
        Val::Null => ValueType::NULL,
        Val::Bool(_) => ValueType::BOOLEAN,
        Val::Number(_) => ValueType::NUMBER,
        Val::Str(_) => ValueType::STRING,
        Val::Function(_) => ValueType::FUNCTION,
        Val::Object(_) | Val::Buffer(_) | Val::Promise(_) => ValueType::OBJECT,
    };
    write(result, kind)
}

pub unsafe extern "C" fn create_object(_env: napi_env, result: *mut napi_value) -> Status {
    let raw = {
        let mut backend = backend();
        backend.objects.push(HashMap::new());
        let index = backend.objects.len() - 1;
        backend.store.push(Val::Object(index)).to_raw()
    };
    write(result, raw)
}

pub unsafe extern "C" fn set_named_property(
    _env: napi_env,
    object: napi_value,
    utf8name: *const c_char,
    value: napi_value,
) -> Status {
    let name = tri!(c_text(utf8name, NAPI_AUTO_LENGTH));
    let index = tri!(object_index(object));
    let value = tri!(read(value));
    backend().objects[index].insert(name, value);
    Status::OK
}

pub unsafe extern "C" fn get_named_property(
    _env: napi_env,
    object: napi_value,
    utf8name: *const c_char,
    result: *mut napi_value,
) -> Status {
    let name = tri!(c_text(utf8name, NAPI_AUTO_LENGTH));
    let index = tri!(object_index(object));
    let value = backend().objects[index].get(&name).cloned().unwrap_or(Val::Undefined);
    write(result, new_value(value))
}

pub unsafe extern "C" fn set_property(
    _env: napi_env,
    object: napi_value,
    key: napi_value,
    value: napi_value,
) -> Status {
    let Val::Str(name) = tri!(read(key)) else {
        return Status::NAME_EXPECTED;
    };
    let index = tri!(object_index(object));
    let value = tri!(read(value));
    backend().objects[index].insert(name, value);
    Status::OK
}

pub unsafe extern "C" fn create_function(
    _env: napi_env,
    utf8name: *const c_char,
    length: usize,
    cb: napi_callback,
    data: *mut c_void,
    result: *mut napi_value,
) -> Status {
    if cb.is_none() {
        return Status::INVALID_ARG;
    }
    let name = tri!(c_text(utf8name, length));
    let raw = {
        let mut backend = backend();
        backend.functions.push(NativeFunction { name, cb, data: data as usize });
        let index = backend.functions.len() - 1;
        backend.store.push(Val::Function(index)).to_raw()
    };
    write(result, raw)
}

pub unsafe extern "C" fn call_function(
    env: napi_env,
    recv: napi_value,
    func: napi_value,
    argc: usize,
    argv: *const napi_value,
    result: *mut napi_value,
) -> Status {
    let Val::Function(index) = tri!(read(func)) else {
        return Status::FUNCTION_EXPECTED;
    };
    if argc > 0 && argv.is_null() {
        return Status::INVALID_ARG;
    }
    let (cb, data) = {
        let backend = backend();
        let function = &backend.functions[index];
        (function.cb, function.data)
    };
    let Some(cb) = cb else {
        return Status::GENERIC_FAILURE;
    };
    let args = if argc == 0 { Vec::new() } else { std::slice::from_raw_parts(argv, argc).to_vec() };
    let info = CallInfo { this: recv, args, data: data as *mut c_void };
    let returned = cb(env, &info as *const CallInfo as napi_callback_info);
    let returned = if returned.is_null() { new_value(Val::Undefined) } else { returned };
    if !result.is_null() {
        *result = returned;
    }
    Status::OK
}

pub unsafe extern "C" fn get_cb_info(
    _env: napi_env,
    cbinfo: napi_callback_info,
    argc: *mut usize,
    argv: *mut napi_value,
    this_arg: *mut napi_value,
    data: *mut *mut c_void,
) -> Status {
    let Some(info) = (cbinfo as *const CallInfo).as_ref() else {
        return Status::INVALID_ARG;
    };
    if !argc.is_null() {
        if !argv.is_null() {
            for slot in 0..*argc {
                let value = match info.args.get(slot) {
                    Some(&arg) => arg,
                    None => new_value(Val::Undefined),
                };
                *argv.add(slot) = value;
            }
        }
        *argc = info.args.len();
    }
    if !this_arg.is_null() {
        *this_arg = info.this;
    }
    if !data.is_null() {
        *data = info.data;
    }
    Status::OK
}

pub unsafe extern "C" fn create_reference(
    _env: napi_env,
    value: napi_value,
    initial_refcount: u32,
    result: *mut napi_ref,
) -> Status {
    let value = tri!(read(value));
    let id = backend().refs.create(value, initial_refcount);
    write(result, id.to_raw())
}

pub unsafe extern "C" fn delete_reference(_env: napi_env, reference: napi_ref) -> Status {
    let Some(id) = RefId::from_raw(reference) else {
        return Status::INVALID_ARG;
    };
    match backend().refs.delete(id) {
        Ok(_) => Status::OK,
        Err(err) => err.status(),
    }
}

pub unsafe extern "C" fn reference_ref(_env: napi_env, reference: napi_ref, result: *mut u32) -> Status {
    let Some(id) = RefId::from_raw(reference) else {
        return Status::INVALID_ARG;
    };
    let count = tri!(backend().refs.increment(id).map_err(|err| err.status()));
    if !result.is_null() {
        *result = count;
    }
    Status::OK
}

pub unsafe extern "C" fn reference_unref(_env: napi_env, reference: napi_ref, result: *mut u32) -> Status {
    let Some(id) = RefId::from_raw(reference) else {
        return Status::INVALID_ARG;
    };
    let count = tri!(backend().refs.decrement(id).map_err(|err| err.status()));
    if !result.is_null() {
        *result = count;
    }
    Status::OK
}

pub unsafe extern "C" fn get_reference_value(
    _env: napi_env,
    reference: napi_ref,
    result: *mut napi_value,
) -> Status {
    let Some(id) = RefId::from_raw(reference) else {
        return Status::INVALID_ARG;
    };
    let raw = {
        let mut backend = backend();
        let value = tri!(backend.refs.value(id).cloned().map_err(|err| err.status()));
        backend.store.push(value).to_raw()
    };
    write(result, raw)
}

pub unsafe extern "C" fn open_handle_scope(_env: napi_env, result: *mut napi_handle_scope) -> Status {
    if result.is_null() {
        return Status::INVALID_ARG;
    }
    write(result, backend().store.open_scope().to_raw())
}

pub unsafe extern "C" fn close_handle_scope(_env: napi_env, scope: napi_handle_scope) -> Status {
    let Some(id) = ScopeId::from_raw(scope) else {
        return Status::INVALID_ARG;
    };
    match backend().store.close_scope(id) {
        Ok(()) => Status::OK,
        Err(err) => err.status(),
    }
}

pub unsafe extern "C" fn open_escapable_handle_scope(
    _env: napi_env,
    result: *mut napi_escapable_handle_scope,
) -> Status {
    if result.is_null() {
        return Status::INVALID_ARG;
    }
    write(result, backend().store.open_escapable_scope().to_raw().cast())
}

pub unsafe extern "C" fn close_escapable_handle_scope(
    env: napi_env,
    scope: napi_escapable_handle_scope,
) -> Status {
    close_handle_scope(env, scope.cast())
}

pub unsafe extern "C" fn escape_handle(
    _env: napi_env,
    scope: napi_escapable_handle_scope,
    escapee: napi_value,
    result: *mut napi_value,
) -> Status {
    let (Some(id), Some(handle)) = (ScopeId::from_raw(scope.cast()), Handle::from_raw(escapee)) else {
        return Status::INVALID_ARG;
    };
    let escaped = tri!(backend().store.escape(id, handle).map_err(|err| err.status()));
    write(result, escaped.to_raw())
}

pub unsafe extern "C" fn create_promise(
    _env: napi_env,
    deferred: *mut napi_deferred,
    promise: *mut napi_value,
) -> Status {
    if deferred.is_null() || promise.is_null() {
        return Status::INVALID_ARG;
    }
    let mut backend = backend();
    backend.promises.push(PromiseState::Pending);
    let index = backend.promises.len() - 1;
    *deferred = backend.deferreds.create(index).to_raw();
    *promise = backend.store.push(Val::Promise(index)).to_raw();
    Status::OK
}

unsafe fn settle(deferred: napi_deferred, value: napi_value, how: Settlement) -> Status {
    let Some(id) = DeferredId::from_raw(deferred) else {
        return Status::INVALID_ARG;
    };
    let value = tri!(read(value));
    let mut backend = backend();
    let index = tri!(backend.deferreds.settle(id, how).map_err(|err| err.status()));
    backend.promises[index] = match how {
        Settlement::Resolved => PromiseState::Resolved(value),
        Settlement::Rejected => PromiseState::Rejected(value),
    };
    Status::OK
}

pub unsafe extern "C" fn resolve_deferred(
    _env: napi_env,
    deferred: napi_deferred,
    resolution: napi_value,
) -> Status {
    settle(deferred, resolution, Settlement::Resolved)
}

pub unsafe extern "C" fn reject_deferred(
    _env: napi_env,
    deferred: napi_deferred,
    rejection: napi_value,
) -> Status {
    settle(deferred, rejection, Settlement::Rejected)
}

pub unsafe extern "C" fn create_buffer(
    _env: napi_env,
    length: usize,
    data: *mut *mut c_void,
    result: *mut napi_value,
) -> Status {
    let (bytes, raw) = {
        let mut backend = backend();
        backend.buffers.push(vec![0; length]);
        let index = backend.buffers.len() - 1;
        let bytes = backend.buffers[index].as_mut_ptr().cast::<c_void>();
        (bytes, backend.store.push(Val::Buffer(index)).to_raw())
    };
    if !data.is_null() {
        *data = bytes;
    }
    write(result, raw)
}

pub unsafe extern "C" fn notify_pending(_env: napi_env) {
    NOTIFIED.fetch_add(1, Ordering::SeqCst);
}

/// Every slot the stub implements.
pub fn stub_table() -> CapabilityTable {
    CapabilityTable {
        get_undefined: Some(get_undefined),
        get_null: Some(get_null),
        get_boolean: Some(get_boolean),
        create_int32: Some(create_int32),
        create_uint32: Some(create_uint32),
        create_int64: Some(create_int64),
        create_double: Some(create_double),
        create_string_utf8: Some(create_string_utf8),
        create_string_latin1: Some(create_string_utf8),
        get_value_bool: Some(get_value_bool),
        get_value_double: Some(get_value_double),
        get_value_int32: Some(get_value_int32),
        get_value_int64: Some(get_value_int64),
        get_value_string_utf8: Some(get_value_string_utf8),
        typeof_: Some(typeof_),
        create_object: Some(create_object),
        set_named_property: Some(set_named_property),
        get_named_property: Some(get_named_property),
        set_property: Some(set_property),
        create_function: Some(create_function),
        call_function: Some(call_function),
        get_cb_info: Some(get_cb_info),
        create_reference: Some(create_reference),
        delete_reference: Some(delete_reference),
        reference_ref: Some(reference_ref),
        reference_unref: Some(reference_unref),
        get_reference_value: Some(get_reference_value),
        open_handle_scope: Some(open_handle_scope),
        close_handle_scope: Some(close_handle_scope),
        open_escapable_handle_scope: Some(open_escapable_handle_scope),
        close_escapable_handle_scope: Some(close_escapable_handle_scope),
        escape_handle: Some(escape_handle),
        create_promise: Some(create_promise),
        resolve_deferred: Some(resolve_deferred),
        reject_deferred: Some(reject_deferred),
        create_buffer: Some(create_buffer),
        notify_pending: Some(notify_pending),
        ..CapabilityTable::default()
    }
}
