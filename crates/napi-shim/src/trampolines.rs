//! Exported Node-API entry points backed by the capability table
//!
//! Each line of the [`trampolines!`] invocation below declares one operation:
//!
//! ```text
//! slot => fn export(args..): Policy |table| { fallback };
//! ```
//!
//! and expands to a field of [`CapabilityTable`], a row of [`OPERATIONS`],
//! and a `#[no_mangle]` function that forwards to the slot when it is set.
//! When it is not, the declared [`Fallback`] runs: `Fail` reports
//! `napi_generic_failure`, `Inert` reports `napi_ok`, and a body, when
//! present, decides the result itself. With no table published every entry
//! point reports `napi_generic_failure`.
//!
//! Arguments are forwarded untouched. Nothing here interprets a value handle.

use std::ffi::c_void;
use std::os::raw::{c_char, c_int};
use std::ptr::{self, NonNull};
use std::sync::atomic::AtomicBool;

use napi_shim_sdk::*;

use crate::diagnostics::{self, NAPI_AUTO_LENGTH};
use crate::env_state;
use crate::last_error;
use crate::policy::{note_fallback, Fallback, Operation};
use crate::table;

/// Reported by `napi_get_node_version`.
pub static NODE_VERSION: NodeVersion = NodeVersion {
    major: 18,
    minor: 0,
    patch: 0,
    release: c"node".as_ptr(),
};

/// Reported by `napi_get_version` without a backend slot.
pub const DEFAULT_NAPI_VERSION: u32 = 9;

/// Write `value` through `out` unless `out` is NULL.
#[inline]
unsafe fn put<T>(out: *mut T, value: T) {
    if !out.is_null() {
        out.write(value);
    }
}

/// A non-NULL handle that refers to nothing.
fn sentinel<T>() -> *mut T {
    NonNull::dangling().as_ptr()
}

/// Call another slot of the same table, failing when it is empty.
macro_rules! delegate {
    ($table:ident.$slot:ident($($arg:expr),* $(,)?)) => {
        match $table.$slot {
            Some(forward) => forward($($arg),*),
            None => Status::GENERIC_FAILURE,
        }
    };
}

macro_rules! fallback {
    ($table:expr, $policy:ident, |$tbl:ident| $body:block) => {{
        let $tbl: &CapabilityTable = $table;
        $body
    }};
    ($table:expr, Fail) => {{
        let _ = $table;
        Status::GENERIC_FAILURE
    }};
    ($table:expr, $policy:ident) => {{
        let _ = $table;
        Status::OK
    }};
}

macro_rules! trampolines {
    (
        $(
            $(#[$meta:meta])*
            $slot:ident => fn $export:ident($($arg:ident: $ty:ty),* $(,)?): $policy:ident
                $(|$tbl:ident| $body:block)?;
        )*
    ) => {
        /// Backend capability table. Field order is the C layout; a NULL
        /// slot selects the operation's fallback.
        #[repr(C)]
        #[derive(Clone, Copy, Default)]
        pub struct CapabilityTable {
            $(
                #[doc = concat!("Backs `", stringify!($export), "`.")]
                pub $slot: Option<unsafe extern "C" fn($($ty),*) -> Status>,
            )*
            /// Called whenever a threadsafe call or an async completion is
            /// queued for `env`, from any thread. The backend must then call
            /// `napi_shim_run_pending(env)` on the thread that owns `env`.
            pub notify_pending: Option<unsafe extern "C" fn(env: napi_env)>,
        }

        impl CapabilityTable {
            /// Number of operation slots.
            pub const SLOT_COUNT: usize = [$(stringify!($slot)),*].len();

            /// Number of operation slots that are set.
            pub fn populated_slots(&self) -> usize {
                0 $(+ usize::from(self.$slot.is_some()))*
            }
        }

        /// Every table-backed entry point, in table order.
        pub static OPERATIONS: &[Operation] = &[
            $(
                Operation {
                    export: stringify!($export),
                    slot: stringify!($slot),
                    fallback: Fallback::$policy,
                },
            )*
        ];

        $(
            $(#[$meta])*
            ///
            /// # Safety
            /// Pointer arguments must satisfy the Node-API contract of this
            /// function; they are forwarded to the backend unchanged.
            #[no_mangle]
            #[allow(unused_variables, clippy::too_many_arguments)]
            pub unsafe extern "C" fn $export($($arg: $ty),*) -> Status {
                static FALLBACK_SEEN: AtomicBool = AtomicBool::new(false);
                let Some(table) = table::current() else {
                    return last_error::record(Status::GENERIC_FAILURE);
                };
                let status = match table.$slot {
                    Some(forward) => forward($($arg),*),
                    None => {
                        note_fallback(&FALLBACK_SEEN, stringify!($export), Fallback::$policy);
                        fallback!(table, $policy $(, |$tbl| $body)?)
                    }
                };
                last_error::record(status)
            }
        )*
    };
}

// ============================================================================
// Fallback Helpers
// ============================================================================

/// An external string that was copied: the caller's buffer is released
/// right away through its finalizer.
unsafe fn copied_external(
    status: Status,
    env: napi_env,
    data: *mut c_void,
    finalize_callback: napi_finalize,
    finalize_hint: *mut c_void,
    copied: *mut bool,
) -> Status {
    if status.is_ok() {
        put(copied, true);
        if let Some(finalize) = finalize_callback {
            finalize(env, data, finalize_hint);
        }
    }
    status
}

/// `napi_define_properties` in terms of plain property stores. Accessor
/// descriptors cannot be expressed that way and are skipped.
unsafe fn define_properties_via_setters(
    table: &CapabilityTable,
    env: napi_env,
    object: napi_value,
    property_count: usize,
    properties: *const PropertyDescriptor,
) -> Status {
    if property_count == 0 {
        return Status::OK;
    }
    if properties.is_null() {
        return Status::INVALID_ARG;
    }
    for descriptor in std::slice::from_raw_parts(properties, property_count) {
        if descriptor.is_accessor() {
            tracing::debug!(
                target: "napi_shim",
                name = %diagnostics::lossy_str(descriptor.utf8name, NAPI_AUTO_LENGTH),
                "accessor property skipped"
            );
            continue;
        }
        let value = if descriptor.method.is_some() {
            let mut function = ptr::null_mut();
            let status = delegate!(table.create_function(
                env,
                descriptor.utf8name,
                NAPI_AUTO_LENGTH,
                descriptor.method,
                descriptor.data,
                &mut function,
            ));
            if !status.is_ok() {
                return status;
            }
            function
        } else {
            descriptor.value
        };
        let status = if !descriptor.name.is_null() {
            delegate!(table.set_property(env, object, descriptor.name, value))
        } else if !descriptor.utf8name.is_null() {
            delegate!(table.set_named_property(env, object, descriptor.utf8name, value))
        } else {
            Status::NAME_EXPECTED
        };
        if !status.is_ok() {
            return status;
        }
    }
    Status::OK
}

// ============================================================================
// Entry Points
// ============================================================================

trampolines! {
    // ---- Environment and metadata ----

    /// Highest Node-API version supported.
    get_version => fn napi_get_version(env: napi_env, result: *mut u32): Default |t| {
        put(result, DEFAULT_NAPI_VERSION);
        Status::OK
    };
    get_node_version => fn napi_get_node_version(env: napi_env, version: *mut *const NodeVersion): Default |t| {
        put(version, &NODE_VERSION as *const NodeVersion);
        Status::OK
    };
    /// There is no libuv loop behind this bridge.
    get_uv_event_loop => fn napi_get_uv_event_loop(env: napi_env, event_loop: *mut *mut uv_loop_t): Default |t| {
        put(event_loop, ptr::null_mut());
        Status::OK
    };
    get_module_file_name => fn node_api_get_module_file_name(env: napi_env, result: *mut *const c_char): Default |t| {
        put(result, c"".as_ptr());
        Status::OK
    };
    adjust_external_memory => fn napi_adjust_external_memory(
        env: napi_env,
        change_in_bytes: i64,
        adjusted_value: *mut i64,
    ): Default |t| {
        put(adjusted_value, env_state::adjust_external_memory(env, change_in_bytes));
        Status::OK
    };

    // ---- Singletons and primitives ----

    get_undefined => fn napi_get_undefined(env: napi_env, result: *mut napi_value): Fail;
    get_null => fn napi_get_null(env: napi_env, result: *mut napi_value): Fail;
    get_global => fn napi_get_global(env: napi_env, result: *mut napi_value): Fail;
    get_boolean => fn napi_get_boolean(env: napi_env, value: bool, result: *mut napi_value): Fail;
    create_int32 => fn napi_create_int32(env: napi_env, value: i32, result: *mut napi_value): Fail;
    create_uint32 => fn napi_create_uint32(env: napi_env, value: u32, result: *mut napi_value): Fail;
    create_int64 => fn napi_create_int64(env: napi_env, value: i64, result: *mut napi_value): Fail;
    create_double => fn napi_create_double(env: napi_env, value: f64, result: *mut napi_value): Fail;
    create_string_latin1 => fn napi_create_string_latin1(
        env: napi_env,
        string: *const c_char,
        length: usize,
        result: *mut napi_value,
    ): Fail;
    create_string_utf8 => fn napi_create_string_utf8(
        env: napi_env,
        string: *const c_char,
        length: usize,
        result: *mut napi_value,
    ): Fail;
    create_string_utf16 => fn napi_create_string_utf16(
        env: napi_env,
        string: *const u16,
        length: usize,
        result: *mut napi_value,
    ): Fail;
    /// Falls back to copying the characters, reporting `copied = true`.
    create_external_string_latin1 => fn node_api_create_external_string_latin1(
        env: napi_env,
        string: *mut c_char,
        length: usize,
        finalize_callback: napi_finalize,
        finalize_hint: *mut c_void,
        result: *mut napi_value,
        copied: *mut bool,
    ): Default |t| {
        let status = delegate!(t.create_string_latin1(env, string, length, result));
        copied_external(status, env, string.cast(), finalize_callback, finalize_hint, copied)
    };
    create_external_string_utf16 => fn node_api_create_external_string_utf16(
        env: napi_env,
        string: *mut u16,
        length: usize,
        finalize_callback: napi_finalize,
        finalize_hint: *mut c_void,
        result: *mut napi_value,
        copied: *mut bool,
    ): Default |t| {
        let status = delegate!(t.create_string_utf16(env, string, length, result));
        copied_external(status, env, string.cast(), finalize_callback, finalize_hint, copied)
    };
    create_property_key_latin1 => fn node_api_create_property_key_latin1(
        env: napi_env,
        string: *const c_char,
        length: usize,
        result: *mut napi_value,
    ): Default |t| {
        delegate!(t.create_string_latin1(env, string, length, result))
    };
    create_property_key_utf8 => fn node_api_create_property_key_utf8(
        env: napi_env,
        string: *const c_char,
        length: usize,
        result: *mut napi_value,
    ): Default |t| {
        delegate!(t.create_string_utf8(env, string, length, result))
    };
    create_property_key_utf16 => fn node_api_create_property_key_utf16(
        env: napi_env,
        string: *const u16,
        length: usize,
        result: *mut napi_value,
    ): Default |t| {
        delegate!(t.create_string_utf16(env, string, length, result))
    };
    get_value_bool => fn napi_get_value_bool(env: napi_env, value: napi_value, result: *mut bool): Fail;
    get_value_int32 => fn napi_get_value_int32(env: napi_env, value: napi_value, result: *mut i32): Fail;
    get_value_uint32 => fn napi_get_value_uint32(env: napi_env, value: napi_value, result: *mut u32): Fail;
    get_value_int64 => fn napi_get_value_int64(env: napi_env, value: napi_value, result: *mut i64): Fail;
    get_value_double => fn napi_get_value_double(env: napi_env, value: napi_value, result: *mut f64): Fail;
    get_value_string_latin1 => fn napi_get_value_string_latin1(
        env: napi_env,
        value: napi_value,
        buf: *mut c_char,
        bufsize: usize,
        result: *mut usize,
    ): Fail;
    get_value_string_utf8 => fn napi_get_value_string_utf8(
        env: napi_env,
        value: napi_value,
        buf: *mut c_char,
        bufsize: usize,
        result: *mut usize,
    ): Fail;
    get_value_string_utf16 => fn napi_get_value_string_utf16(
        env: napi_env,
        value: napi_value,
        buf: *mut u16,
        bufsize: usize,
        result: *mut usize,
    ): Fail;
    coerce_to_bool => fn napi_coerce_to_bool(env: napi_env, value: napi_value, result: *mut napi_value): Fail;
    coerce_to_number => fn napi_coerce_to_number(env: napi_env, value: napi_value, result: *mut napi_value): Fail;
    coerce_to_object => fn napi_coerce_to_object(env: napi_env, value: napi_value, result: *mut napi_value): Fail;
    coerce_to_string => fn napi_coerce_to_string(env: napi_env, value: napi_value, result: *mut napi_value): Fail;
    typeof_ => fn napi_typeof(env: napi_env, value: napi_value, result: *mut ValueType): Fail;

    // ---- BigInt, carried as 64-bit two's complement ----

    create_bigint_int64 => fn napi_create_bigint_int64(env: napi_env, value: i64, result: *mut napi_value): Default |t| {
        delegate!(t.create_int64(env, value, result))
    };
    create_bigint_uint64 => fn napi_create_bigint_uint64(env: napi_env, value: u64, result: *mut napi_value): Default |t| {
        delegate!(t.create_int64(env, value as i64, result))
    };
    /// Only the lowest word survives; higher words are dropped.
    create_bigint_words => fn napi_create_bigint_words(
        env: napi_env,
        sign_bit: c_int,
        word_count: usize,
        words: *const u64,
        result: *mut napi_value,
    ): Default |t| {
        if word_count > 0 && words.is_null() {
            Status::INVALID_ARG
        } else {
            let magnitude = if word_count == 0 { 0 } else { *words as i64 };
            let value = if sign_bit != 0 { magnitude.wrapping_neg() } else { magnitude };
            delegate!(t.create_int64(env, value, result))
        }
    };
    get_value_bigint_int64 => fn napi_get_value_bigint_int64(
        env: napi_env,
        value: napi_value,
        result: *mut i64,
        lossless: *mut bool,
    ): Default |t| {
        let status = delegate!(t.get_value_int64(env, value, result));
        if status.is_ok() {
            put(lossless, true);
        }
        status
    };
    get_value_bigint_uint64 => fn napi_get_value_bigint_uint64(
        env: napi_env,
        value: napi_value,
        result: *mut u64,
        lossless: *mut bool,
    ): Default |t| {
        let mut signed = 0i64;
        let status = delegate!(t.get_value_int64(env, value, &mut signed));
        if status.is_ok() {
            put(result, signed as u64);
            put(lossless, signed >= 0);
        }
        status
    };
    /// With `words` NULL only the word count (always 1) is reported.
    get_value_bigint_words => fn napi_get_value_bigint_words(
        env: napi_env,
        value: napi_value,
        sign_bit: *mut c_int,
        word_count: *mut usize,
        words: *mut u64,
    ): Default |t| {
        if word_count.is_null() {
            Status::INVALID_ARG
        } else {
            let mut signed = 0i64;
            let status = delegate!(t.get_value_int64(env, value, &mut signed));
            if status.is_ok() {
                if !words.is_null() && *word_count >= 1 {
                    *words = signed.unsigned_abs();
                    put(sign_bit, c_int::from(signed < 0));
                }
                *word_count = 1;
            }
            status
        }
    };

    // ---- Symbols, degraded to plain objects ----

    create_symbol => fn napi_create_symbol(env: napi_env, description: napi_value, result: *mut napi_value): Default |t| {
        delegate!(t.create_object(env, result))
    };
    symbol_for => fn node_api_symbol_for(
        env: napi_env,
        utf8description: *const c_char,
        length: usize,
        result: *mut napi_value,
    ): Default |t| {
        delegate!(t.create_object(env, result))
    };

    // ---- Dates, degraded to numbers ----

    create_date => fn napi_create_date(env: napi_env, time: f64, result: *mut napi_value): Default |t| {
        delegate!(t.create_double(env, time, result))
    };
    get_date_value => fn napi_get_date_value(env: napi_env, value: napi_value, result: *mut f64): Default |t| {
        delegate!(t.get_value_double(env, value, result))
    };
    is_date => fn napi_is_date(env: napi_env, value: napi_value, is_date: *mut bool): Default |t| {
        put(is_date, false);
        Status::OK
    };

    // ---- Objects and arrays ----

    create_object => fn napi_create_object(env: napi_env, result: *mut napi_value): Fail;
    create_array => fn napi_create_array(env: napi_env, result: *mut napi_value): Fail;
    create_array_with_length => fn napi_create_array_with_length(
        env: napi_env,
        length: usize,
        result: *mut napi_value,
    ): Default |t| {
        delegate!(t.create_array(env, result))
    };
    get_array_length => fn napi_get_array_length(env: napi_env, value: napi_value, result: *mut u32): Fail;
    is_array => fn napi_is_array(env: napi_env, value: napi_value, result: *mut bool): Fail;
    get_prototype => fn napi_get_prototype(env: napi_env, object: napi_value, result: *mut napi_value): Default |t| {
        delegate!(t.get_undefined(env, result))
    };
    object_freeze => fn napi_object_freeze(env: napi_env, object: napi_value): Inert;
    object_seal => fn napi_object_seal(env: napi_env, object: napi_value): Inert;
    type_tag_object => fn napi_type_tag_object(env: napi_env, value: napi_value, type_tag: *const TypeTag): Inert;
    check_object_type_tag => fn napi_check_object_type_tag(
        env: napi_env,
        value: napi_value,
        type_tag: *const TypeTag,
        result: *mut bool,
    ): Default |t| {
        put(result, false);
        Status::OK
    };
    /// Handle identity; distinct handles to one value compare unequal.
    strict_equals => fn napi_strict_equals(
        env: napi_env,
        lhs: napi_value,
        rhs: napi_value,
        result: *mut bool,
    ): Default |t| {
        put(result, lhs == rhs);
        Status::OK
    };

    // ---- Properties ----

    set_property => fn napi_set_property(env: napi_env, object: napi_value, key: napi_value, value: napi_value): Fail;
    get_property => fn napi_get_property(
        env: napi_env,
        object: napi_value,
        key: napi_value,
        result: *mut napi_value,
    ): Fail;
    has_property => fn napi_has_property(env: napi_env, object: napi_value, key: napi_value, result: *mut bool): Default |t| {
        put(result, false);
        Status::OK
    };
    delete_property => fn napi_delete_property(
        env: napi_env,
        object: napi_value,
        key: napi_value,
        result: *mut bool,
    ): Default |t| {
        put(result, true);
        Status::OK
    };
    has_own_property => fn napi_has_own_property(
        env: napi_env,
        object: napi_value,
        key: napi_value,
        result: *mut bool,
    ): Default |t| {
        match t.has_property {
            Some(has_property) => has_property(env, object, key, result),
            None => {
                put(result, false);
                Status::OK
            }
        }
    };
    set_named_property => fn napi_set_named_property(
        env: napi_env,
        object: napi_value,
        utf8name: *const c_char,
        value: napi_value,
    ): Fail;
    get_named_property => fn napi_get_named_property(
        env: napi_env,
        object: napi_value,
        utf8name: *const c_char,
        result: *mut napi_value,
    ): Fail;
    has_named_property => fn napi_has_named_property(
        env: napi_env,
        object: napi_value,
        utf8name: *const c_char,
        result: *mut bool,
    ): Default |t| {
        put(result, false);
        Status::OK
    };
    set_element => fn napi_set_element(env: napi_env, object: napi_value, index: u32, value: napi_value): Fail;
    get_element => fn napi_get_element(env: napi_env, object: napi_value, index: u32, result: *mut napi_value): Fail;
    has_element => fn napi_has_element(env: napi_env, object: napi_value, index: u32, result: *mut bool): Default |t| {
        put(result, false);
        Status::OK
    };
    delete_element => fn napi_delete_element(env: napi_env, object: napi_value, index: u32, result: *mut bool): Default |t| {
        put(result, true);
        Status::OK
    };
    get_all_property_names => fn napi_get_all_property_names(
        env: napi_env,
        object: napi_value,
        key_mode: KeyCollectionMode,
        key_filter: KeyFilter,
        key_conversion: KeyConversion,
        result: *mut napi_value,
    ): Fail;
    /// Enumerable string keys, including inherited ones.
    get_property_names => fn napi_get_property_names(env: napi_env, object: napi_value, result: *mut napi_value): Default |t| {
        delegate!(t.get_all_property_names(
            env,
            object,
            KeyCollectionMode::INCLUDE_PROTOTYPES,
            KeyFilter::ENUMERABLE | KeyFilter::SKIP_SYMBOLS,
            KeyConversion::NUMBERS_TO_STRINGS,
            result,
        ))
    };
    define_properties => fn napi_define_properties(
        env: napi_env,
        object: napi_value,
        property_count: usize,
        properties: *const PropertyDescriptor,
    ): Default |t| {
        define_properties_via_setters(t, env, object, property_count, properties)
    };

    // ---- Functions and classes ----

    create_function => fn napi_create_function(
        env: napi_env,
        utf8name: *const c_char,
        length: usize,
        cb: napi_callback,
        data: *mut c_void,
        result: *mut napi_value,
    ): Fail;
    get_cb_info => fn napi_get_cb_info(
        env: napi_env,
        cbinfo: napi_callback_info,
        argc: *mut usize,
        argv: *mut napi_value,
        this_arg: *mut napi_value,
        data: *mut *mut c_void,
    ): Fail;
    /// Without a backend every call is treated as a plain (non-construct) call.
    get_new_target => fn napi_get_new_target(
        env: napi_env,
        cbinfo: napi_callback_info,
        result: *mut napi_value,
    ): Default |t| {
        put(result, ptr::null_mut());
        Status::OK
    };
    call_function => fn napi_call_function(
        env: napi_env,
        recv: napi_value,
        func: napi_value,
        argc: usize,
        argv: *const napi_value,
        result: *mut napi_value,
    ): Fail;
    new_instance => fn napi_new_instance(
        env: napi_env,
        constructor: napi_value,
        argc: usize,
        argv: *const napi_value,
        result: *mut napi_value,
    ): Fail;
    instanceof => fn napi_instanceof(
        env: napi_env,
        object: napi_value,
        constructor: napi_value,
        result: *mut bool,
    ): Fail;
    define_class => fn napi_define_class(
        env: napi_env,
        utf8name: *const c_char,
        length: usize,
        constructor: napi_callback,
        data: *mut c_void,
        property_count: usize,
        properties: *const PropertyDescriptor,
        result: *mut napi_value,
    ): Fail;
    make_callback => fn napi_make_callback(
        env: napi_env,
        async_context: napi_async_context,
        recv: napi_value,
        func: napi_value,
        argc: usize,
        argv: *const napi_value,
        result: *mut napi_value,
    ): Default |t| {
        delegate!(t.call_function(env, recv, func, argc, argv, result))
    };

    // ---- Wrapping and externals ----

    wrap => fn napi_wrap(
        env: napi_env,
        js_object: napi_value,
        native_object: *mut c_void,
        finalize_cb: napi_finalize,
        finalize_hint: *mut c_void,
        result: *mut napi_ref,
    ): Inert |t| {
        put(result, ptr::null_mut());
        Status::OK
    };
    unwrap => fn napi_unwrap(env: napi_env, js_object: napi_value, result: *mut *mut c_void): Inert |t| {
        put(result, ptr::null_mut());
        Status::OK
    };
    remove_wrap => fn napi_remove_wrap(env: napi_env, js_object: napi_value, result: *mut *mut c_void): Default |t| {
        match t.unwrap {
            Some(unwrap) => unwrap(env, js_object, result),
            None => {
                put(result, ptr::null_mut());
                Status::OK
            }
        }
    };
    add_finalizer => fn napi_add_finalizer(
        env: napi_env,
        js_object: napi_value,
        finalize_data: *mut c_void,
        finalize_cb: napi_finalize,
        finalize_hint: *mut c_void,
        result: *mut napi_ref,
    ): Inert |t| {
        put(result, ptr::null_mut());
        Status::OK
    };
    /// Runs the finalizer immediately.
    post_finalizer => fn node_api_post_finalizer(
        env: napi_env,
        finalize_cb: napi_finalize,
        finalize_data: *mut c_void,
        finalize_hint: *mut c_void,
    ): Default |t| {
        match finalize_cb {
            Some(finalize) => {
                finalize(env, finalize_data, finalize_hint);
                Status::OK
            }
            None => Status::INVALID_ARG,
        }
    };
    create_external => fn napi_create_external(
        env: napi_env,
        data: *mut c_void,
        finalize_cb: napi_finalize,
        finalize_hint: *mut c_void,
        result: *mut napi_value,
    ): Fail;
    get_value_external => fn napi_get_value_external(env: napi_env, value: napi_value, result: *mut *mut c_void): Fail;

    // ---- References and scopes ----

    create_reference => fn napi_create_reference(
        env: napi_env,
        value: napi_value,
        initial_refcount: u32,
        result: *mut napi_ref,
    ): Fail;
    delete_reference => fn napi_delete_reference(env: napi_env, reference: napi_ref): Fail;
    /// Without a backend the count is not tracked and 1 is reported.
    reference_ref => fn napi_reference_ref(env: napi_env, reference: napi_ref, result: *mut u32): Inert |t| {
        put(result, 1);
        Status::OK
    };
    /// Without a backend the count is not tracked and 0 is reported.
    reference_unref => fn napi_reference_unref(env: napi_env, reference: napi_ref, result: *mut u32): Inert |t| {
        put(result, 0);
        Status::OK
    };
    get_reference_value => fn napi_get_reference_value(env: napi_env, reference: napi_ref, result: *mut napi_value): Fail;
    open_handle_scope => fn napi_open_handle_scope(env: napi_env, result: *mut napi_handle_scope): Fail;
    close_handle_scope => fn napi_close_handle_scope(env: napi_env, scope: napi_handle_scope): Fail;
    open_escapable_handle_scope => fn napi_open_escapable_handle_scope(
        env: napi_env,
        result: *mut napi_escapable_handle_scope,
    ): Default |t| {
        delegate!(t.open_handle_scope(env, result.cast()))
    };
    close_escapable_handle_scope => fn napi_close_escapable_handle_scope(
        env: napi_env,
        scope: napi_escapable_handle_scope,
    ): Default |t| {
        delegate!(t.close_handle_scope(env, scope.cast()))
    };
    escape_handle => fn napi_escape_handle(
        env: napi_env,
        scope: napi_escapable_handle_scope,
        escapee: napi_value,
        result: *mut napi_value,
    ): Fail;

    // ---- Errors and exceptions ----

    throw_ => fn napi_throw(env: napi_env, error: napi_value): Fail;
    throw_error => fn napi_throw_error(env: napi_env, code: *const c_char, msg: *const c_char): Fail;
    throw_type_error => fn napi_throw_type_error(env: napi_env, code: *const c_char, msg: *const c_char): Default |t| {
        delegate!(t.throw_error(env, code, msg))
    };
    throw_range_error => fn napi_throw_range_error(env: napi_env, code: *const c_char, msg: *const c_char): Default |t| {
        delegate!(t.throw_error(env, code, msg))
    };
    throw_syntax_error => fn node_api_throw_syntax_error(env: napi_env, code: *const c_char, msg: *const c_char): Default |t| {
        delegate!(t.throw_error(env, code, msg))
    };
    create_error => fn napi_create_error(env: napi_env, code: napi_value, msg: napi_value, result: *mut napi_value): Fail;
    create_type_error => fn napi_create_type_error(
        env: napi_env,
        code: napi_value,
        msg: napi_value,
        result: *mut napi_value,
    ): Default |t| {
        delegate!(t.create_error(env, code, msg, result))
    };
    create_range_error => fn napi_create_range_error(
        env: napi_env,
        code: napi_value,
        msg: napi_value,
        result: *mut napi_value,
    ): Default |t| {
        delegate!(t.create_error(env, code, msg, result))
    };
    create_syntax_error => fn node_api_create_syntax_error(
        env: napi_env,
        code: napi_value,
        msg: napi_value,
        result: *mut napi_value,
    ): Default |t| {
        delegate!(t.create_error(env, code, msg, result))
    };
    is_error => fn napi_is_error(env: napi_env, value: napi_value, result: *mut bool): Fail;
    is_exception_pending => fn napi_is_exception_pending(env: napi_env, result: *mut bool): Default |t| {
        put(result, false);
        Status::OK
    };
    get_and_clear_last_exception => fn napi_get_and_clear_last_exception(env: napi_env, result: *mut napi_value): Default |t| {
        delegate!(t.get_undefined(env, result))
    };
    /// Reported, never fatal.
    fatal_exception => fn napi_fatal_exception(env: napi_env, err: napi_value): Default |t| {
        diagnostics::fatal_exception(env, err);
        Status::OK
    };

    // ---- Array buffers, typed arrays, data views, buffers ----

    create_arraybuffer => fn napi_create_arraybuffer(
        env: napi_env,
        byte_length: usize,
        data: *mut *mut c_void,
        result: *mut napi_value,
    ): Fail;
    create_external_arraybuffer => fn napi_create_external_arraybuffer(
        env: napi_env,
        external_data: *mut c_void,
        byte_length: usize,
        finalize_cb: napi_finalize,
        finalize_hint: *mut c_void,
        result: *mut napi_value,
    ): Fail;
    get_arraybuffer_info => fn napi_get_arraybuffer_info(
        env: napi_env,
        arraybuffer: napi_value,
        data: *mut *mut c_void,
        byte_length: *mut usize,
    ): Fail;
    is_arraybuffer => fn napi_is_arraybuffer(env: napi_env, value: napi_value, result: *mut bool): Fail;
    detach_arraybuffer => fn napi_detach_arraybuffer(env: napi_env, arraybuffer: napi_value): Fail;
    is_detached_arraybuffer => fn napi_is_detached_arraybuffer(env: napi_env, value: napi_value, result: *mut bool): Default |t| {
        put(result, false);
        Status::OK
    };
    create_typedarray => fn napi_create_typedarray(
        env: napi_env,
        kind: TypedArrayType,
        length: usize,
        arraybuffer: napi_value,
        byte_offset: usize,
        result: *mut napi_value,
    ): Fail;
    get_typedarray_info => fn napi_get_typedarray_info(
        env: napi_env,
        typedarray: napi_value,
        kind: *mut TypedArrayType,
        length: *mut usize,
        data: *mut *mut c_void,
        arraybuffer: *mut napi_value,
        byte_offset: *mut usize,
    ): Fail;
    is_typedarray => fn napi_is_typedarray(env: napi_env, value: napi_value, result: *mut bool): Fail;
    create_dataview => fn napi_create_dataview(
        env: napi_env,
        length: usize,
        arraybuffer: napi_value,
        byte_offset: usize,
        result: *mut napi_value,
    ): Fail;
    get_dataview_info => fn napi_get_dataview_info(
        env: napi_env,
        dataview: napi_value,
        byte_length: *mut usize,
        data: *mut *mut c_void,
        arraybuffer: *mut napi_value,
        byte_offset: *mut usize,
    ): Fail;
    is_dataview => fn napi_is_dataview(env: napi_env, value: napi_value, result: *mut bool): Fail;
    create_buffer => fn napi_create_buffer(
        env: napi_env,
        length: usize,
        data: *mut *mut c_void,
        result: *mut napi_value,
    ): Fail;
    /// Memory owned by the extension cannot be handed to the backend.
    create_external_buffer => fn napi_create_external_buffer(
        env: napi_env,
        length: usize,
        data: *mut c_void,
        finalize_cb: napi_finalize,
        finalize_hint: *mut c_void,
        result: *mut napi_value,
    ): Fail |t| {
        Status::NO_EXTERNAL_BUFFERS_ALLOWED
    };
    create_buffer_copy => fn napi_create_buffer_copy(
        env: napi_env,
        length: usize,
        data: *const c_void,
        result_data: *mut *mut c_void,
        result: *mut napi_value,
    ): Default |t| {
        let mut buffer: *mut c_void = ptr::null_mut();
        let status = delegate!(t.create_buffer(env, length, &mut buffer, result));
        if status.is_ok() {
            if length > 0 && !data.is_null() && !buffer.is_null() {
                ptr::copy_nonoverlapping(data.cast::<u8>(), buffer.cast::<u8>(), length);
            }
            put(result_data, buffer);
        }
        status
    };
    get_buffer_info => fn napi_get_buffer_info(
        env: napi_env,
        value: napi_value,
        data: *mut *mut c_void,
        length: *mut usize,
    ): Fail;
    is_buffer => fn napi_is_buffer(env: napi_env, value: napi_value, result: *mut bool): Fail;
    create_buffer_from_arraybuffer => fn node_api_create_buffer_from_arraybuffer(
        env: napi_env,
        arraybuffer: napi_value,
        byte_offset: usize,
        byte_length: usize,
        result: *mut napi_value,
    ): Fail;

    // ---- Promises ----

    create_promise => fn napi_create_promise(env: napi_env, deferred: *mut napi_deferred, promise: *mut napi_value): Fail;
    resolve_deferred => fn napi_resolve_deferred(env: napi_env, deferred: napi_deferred, resolution: napi_value): Fail;
    reject_deferred => fn napi_reject_deferred(env: napi_env, deferred: napi_deferred, rejection: napi_value): Fail;
    is_promise => fn napi_is_promise(env: napi_env, value: napi_value, is_promise: *mut bool): Default |t| {
        put(is_promise, false);
        Status::OK
    };

    // ---- Scripts ----

    run_script => fn napi_run_script(env: napi_env, script: napi_value, result: *mut napi_value): Fail;

    // ---- Async context ----

    async_init => fn napi_async_init(
        env: napi_env,
        async_resource: napi_value,
        async_resource_name: napi_value,
        result: *mut napi_async_context,
    ): Default |t| {
        put(result, sentinel());
        Status::OK
    };
    async_destroy => fn napi_async_destroy(env: napi_env, async_context: napi_async_context): Inert;
    open_callback_scope => fn napi_open_callback_scope(
        env: napi_env,
        resource_object: napi_value,
        context: napi_async_context,
        result: *mut napi_callback_scope,
    ): Default |t| {
        put(result, sentinel());
        Status::OK
    };
    close_callback_scope => fn napi_close_callback_scope(env: napi_env, scope: napi_callback_scope): Inert;

    // ---- Instance data and cleanup hooks ----

    set_instance_data => fn napi_set_instance_data(
        env: napi_env,
        data: *mut c_void,
        finalize_cb: napi_finalize,
        finalize_hint: *mut c_void,
    ): Default |t| {
        env_state::set_instance_data(env, data, finalize_cb, finalize_hint)
    };
    get_instance_data => fn napi_get_instance_data(env: napi_env, data: *mut *mut c_void): Default |t| {
        put(data, env_state::instance_data(env));
        Status::OK
    };
    add_env_cleanup_hook => fn napi_add_env_cleanup_hook(env: napi_env, fun: napi_cleanup_hook, arg: *mut c_void): Default |t| {
        env_state::add_cleanup_hook(env, fun, arg)
    };
    remove_env_cleanup_hook => fn napi_remove_env_cleanup_hook(env: napi_env, fun: napi_cleanup_hook, arg: *mut c_void): Default |t| {
        env_state::remove_cleanup_hook(env, fun, arg)
    };
    add_async_cleanup_hook => fn napi_add_async_cleanup_hook(
        env: napi_env,
        hook: napi_async_cleanup_hook,
        arg: *mut c_void,
        remove_handle: *mut napi_async_cleanup_hook_handle,
    ): Default |t| {
        env_state::add_async_cleanup_hook(env, hook, arg, remove_handle)
    };
}
