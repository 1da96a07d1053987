//! ABI vocabulary shared by the shim and its backends
//!
//! Every type in this module has the exact size, alignment, and numeric values
//! of its historical C counterpart. Enumerations are modelled as transparent
//! integer newtypes rather than Rust enums: a backend or a loaded binary may
//! write any integer through an out-pointer, and an out-of-range discriminant
//! must never become undefined behaviour on the Rust side.

#![allow(non_camel_case_types)]

use std::ffi::c_void;
use std::fmt;
use std::os::raw::{c_char, c_int, c_uint};

// ============================================================================
// Opaque Handles
// ============================================================================

macro_rules! opaque_handles {
    ($($(#[$meta:meta])* $alias:ident => $opaque:ident;)*) => {
        $(
            #[doc = concat!("Opaque target of [`", stringify!($alias), "`]; never dereferenced by the shim.")]
            #[repr(C)]
            pub struct $opaque {
                _private: [u8; 0],
            }

            $(#[$meta])*
            pub type $alias = *mut $opaque;
        )*
    };
}

opaque_handles! {
    /// One logical execution context of the backend.
    napi_env => napi_env__;
    /// One backend-owned value.
    napi_value => napi_value__;
    /// A counted reference to a value.
    napi_ref => napi_ref__;
    /// A plain handle scope.
    napi_handle_scope => napi_handle_scope__;
    /// A handle scope that permits one escape.
    napi_escapable_handle_scope => napi_escapable_handle_scope__;
    /// Per-invocation callback information.
    napi_callback_info => napi_callback_info__;
    /// The resolving half of a promise pair.
    napi_deferred => napi_deferred__;
    /// A unit of work executed off the environment thread.
    napi_async_work => napi_async_work__;
    /// An async resource context.
    napi_async_context => napi_async_context__;
    /// A callback scope opened around a make-callback.
    napi_callback_scope => napi_callback_scope__;
    /// A function callable from any thread.
    napi_threadsafe_function => napi_threadsafe_function__;
    /// A registered async cleanup hook.
    napi_async_cleanup_hook_handle => napi_async_cleanup_hook_handle__;
    /// The host event loop (never exposed by this shim).
    uv_loop_t => uv_loop_s;
}

// ============================================================================
// Callback Signatures
// ============================================================================

/// Native function callback invoked by the backend.
pub type napi_callback =
    Option<unsafe extern "C" fn(env: napi_env, info: napi_callback_info) -> napi_value>;

/// Finalizer for native data attached to a value.
pub type napi_finalize =
    Option<unsafe extern "C" fn(env: napi_env, finalize_data: *mut c_void, finalize_hint: *mut c_void)>;

/// Body of an async work item; runs on a worker thread.
pub type napi_async_execute_callback = Option<unsafe extern "C" fn(env: napi_env, data: *mut c_void)>;

/// Completion of an async work item; runs on the environment thread.
pub type napi_async_complete_callback =
    Option<unsafe extern "C" fn(env: napi_env, status: Status, data: *mut c_void)>;

/// Delivery callback of a threadsafe function.
pub type napi_threadsafe_function_call_js = Option<
    unsafe extern "C" fn(env: napi_env, js_callback: napi_value, context: *mut c_void, data: *mut c_void),
>;

/// Environment cleanup hook.
pub type napi_cleanup_hook = Option<unsafe extern "C" fn(arg: *mut c_void)>;

/// Async environment cleanup hook.
pub type napi_async_cleanup_hook =
    Option<unsafe extern "C" fn(handle: napi_async_cleanup_hook_handle, data: *mut c_void)>;

/// Module registration function exported by an extension.
pub type napi_addon_register_func =
    Option<unsafe extern "C" fn(env: napi_env, exports: napi_value) -> napi_value>;

// ============================================================================
// Integer Enumerations
// ============================================================================

macro_rules! abi_enum {
    (
        $(#[$meta:meta])*
        $name:ident($repr:ty) {
            $($(#[$vmeta:meta])* $konst:ident = $value:expr => $label:literal,)*
        }
    ) => {
        $(#[$meta])*
        #[repr(transparent)]
        #[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
        pub struct $name(pub $repr);

        impl $name {
            $($(#[$vmeta])* pub const $konst: $name = $name($value);)*

            /// Every named value, in numeric order.
            pub const ALL: &'static [$name] = &[$($name::$konst),*];

            /// The historical C identifier, or `None` for an unnamed value.
            pub fn name(self) -> Option<&'static str> {
                match self.0 {
                    $(v if v == $value => Some($label),)*
                    _ => None,
                }
            }

            /// Whether the raw value is one of the named values.
            pub fn is_known(self) -> bool {
                self.name().is_some()
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                match self.name() {
                    Some(name) => f.write_str(name),
                    None => write!(f, "{}({})", stringify!($name), self.0),
                }
            }
        }
    };
}

abi_enum! {
    /// Result code of every entry point.
    Status(c_int) {
        /// Success.
        OK = 0 => "napi_ok",
        /// An argument was invalid.
        INVALID_ARG = 1 => "napi_invalid_arg",
        /// An object was expected.
        OBJECT_EXPECTED = 2 => "napi_object_expected",
        /// A string was expected.
        STRING_EXPECTED = 3 => "napi_string_expected",
        /// A string or symbol was expected.
        NAME_EXPECTED = 4 => "napi_name_expected",
        /// A function was expected.
        FUNCTION_EXPECTED = 5 => "napi_function_expected",
        /// A number was expected.
        NUMBER_EXPECTED = 6 => "napi_number_expected",
        /// A boolean was expected.
        BOOLEAN_EXPECTED = 7 => "napi_boolean_expected",
        /// An array was expected.
        ARRAY_EXPECTED = 8 => "napi_array_expected",
        /// Unspecified failure.
        GENERIC_FAILURE = 9 => "napi_generic_failure",
        /// An exception is pending.
        PENDING_EXCEPTION = 10 => "napi_pending_exception",
        /// The operation was cancelled.
        CANCELLED = 11 => "napi_cancelled",
        /// `escape_handle` was called twice on one scope.
        ESCAPE_CALLED_TWICE = 12 => "napi_escape_called_twice",
        /// A handle scope was closed out of order.
        HANDLE_SCOPE_MISMATCH = 13 => "napi_handle_scope_mismatch",
        /// A callback scope was closed out of order.
        CALLBACK_SCOPE_MISMATCH = 14 => "napi_callback_scope_mismatch",
        /// The threadsafe function queue is full.
        QUEUE_FULL = 15 => "napi_queue_full",
        /// The threadsafe function is closing.
        CLOSING = 16 => "napi_closing",
        /// A BigInt was expected.
        BIGINT_EXPECTED = 17 => "napi_bigint_expected",
        /// A Date was expected.
        DATE_EXPECTED = 18 => "napi_date_expected",
        /// An ArrayBuffer was expected.
        ARRAYBUFFER_EXPECTED = 19 => "napi_arraybuffer_expected",
        /// A detachable ArrayBuffer was expected.
        DETACHABLE_ARRAYBUFFER_EXPECTED = 20 => "napi_detachable_arraybuffer_expected",
        /// The call would deadlock.
        WOULD_DEADLOCK = 21 => "napi_would_deadlock",
        /// External buffers are not allowed.
        NO_EXTERNAL_BUFFERS_ALLOWED = 22 => "napi_no_external_buffers_allowed",
        /// Script execution is not possible right now.
        CANNOT_RUN_JS = 23 => "napi_cannot_run_js",
    }
}

impl Status {
    /// Whether this is [`Status::OK`].
    #[inline]
    pub fn is_ok(self) -> bool {
        self == Status::OK
    }
}

abi_enum! {
    /// Result of `napi_typeof`.
    ValueType(c_int) {
        /// `undefined`
        UNDEFINED = 0 => "napi_undefined",
        /// `null`
        NULL = 1 => "napi_null",
        /// A boolean.
        BOOLEAN = 2 => "napi_boolean",
        /// A number.
        NUMBER = 3 => "napi_number",
        /// A string.
        STRING = 4 => "napi_string",
        /// A symbol.
        SYMBOL = 5 => "napi_symbol",
        /// An object.
        OBJECT = 6 => "napi_object",
        /// A function.
        FUNCTION = 7 => "napi_function",
        /// An external pointer wrapper.
        EXTERNAL = 8 => "napi_external",
        /// A BigInt.
        BIGINT = 9 => "napi_bigint",
    }
}

abi_enum! {
    /// Element type of a typed array.
    TypedArrayType(c_int) {
        /// `Int8Array`
        INT8 = 0 => "napi_int8_array",
        /// `Uint8Array`
        UINT8 = 1 => "napi_uint8_array",
        /// `Uint8ClampedArray`
        UINT8_CLAMPED = 2 => "napi_uint8_clamped_array",
        /// `Int16Array`
        INT16 = 3 => "napi_int16_array",
        /// `Uint16Array`
        UINT16 = 4 => "napi_uint16_array",
        /// `Int32Array`
        INT32 = 5 => "napi_int32_array",
        /// `Uint32Array`
        UINT32 = 6 => "napi_uint32_array",
        /// `Float32Array`
        FLOAT32 = 7 => "napi_float32_array",
        /// `Float64Array`
        FLOAT64 = 8 => "napi_float64_array",
        /// `BigInt64Array`
        BIGINT64 = 9 => "napi_bigint64_array",
        /// `BigUint64Array`
        BIGUINT64 = 10 => "napi_biguint64_array",
    }
}

impl TypedArrayType {
    /// Size in bytes of one element, or `None` for an unknown tag.
    pub fn element_size(self) -> Option<usize> {
        match self {
            TypedArrayType::INT8 | TypedArrayType::UINT8 | TypedArrayType::UINT8_CLAMPED => Some(1),
            TypedArrayType::INT16 | TypedArrayType::UINT16 => Some(2),
            TypedArrayType::INT32 | TypedArrayType::UINT32 | TypedArrayType::FLOAT32 => Some(4),
            TypedArrayType::FLOAT64 | TypedArrayType::BIGINT64 | TypedArrayType::BIGUINT64 => Some(8),
            _ => None,
        }
    }
}

abi_enum! {
    /// How `napi_get_all_property_names` walks the prototype chain.
    KeyCollectionMode(c_int) {
        /// Include inherited keys.
        INCLUDE_PROTOTYPES = 0 => "napi_key_include_prototypes",
        /// Own keys only.
        OWN_ONLY = 1 => "napi_key_own_only",
    }
}

abi_enum! {
    /// Whether numeric keys are converted to strings.
    KeyConversion(c_int) {
        /// Keep numbers as numbers.
        KEEP_NUMBERS = 0 => "napi_key_keep_numbers",
        /// Convert numbers to strings.
        NUMBERS_TO_STRINGS = 1 => "napi_key_numbers_to_strings",
    }
}

abi_enum! {
    /// Call mode of `napi_call_threadsafe_function`.
    TsfnCallMode(c_int) {
        /// Fail with `napi_queue_full` when the queue is full.
        NONBLOCKING = 0 => "napi_tsfn_nonblocking",
        /// Wait for queue capacity.
        BLOCKING = 1 => "napi_tsfn_blocking",
    }
}

abi_enum! {
    /// Release mode of `napi_release_threadsafe_function`.
    TsfnReleaseMode(c_int) {
        /// Drop one thread reference; queued calls are still delivered.
        RELEASE = 0 => "napi_tsfn_release",
        /// Close immediately; queued calls are dropped.
        ABORT = 1 => "napi_tsfn_abort",
    }
}

// ============================================================================
// Bit Flags
// ============================================================================

macro_rules! abi_flags {
    (
        $(#[$meta:meta])*
        $name:ident($repr:ty) {
            $($(#[$vmeta:meta])* $konst:ident = $value:expr,)*
        }
    ) => {
        $(#[$meta])*
        #[repr(transparent)]
        #[derive(Clone, Copy, PartialEq, Eq, Hash, Default, Debug)]
        pub struct $name(pub $repr);

        impl $name {
            $($(#[$vmeta])* pub const $konst: $name = $name($value);)*

            /// Whether every bit of `other` is set.
            #[inline]
            pub fn contains(self, other: $name) -> bool {
                self.0 & other.0 == other.0
            }
        }

        impl std::ops::BitOr for $name {
            type Output = $name;

            fn bitor(self, rhs: $name) -> $name {
                $name(self.0 | rhs.0)
            }
        }
    };
}

abi_flags! {
    /// Attributes of a property descriptor.
    PropertyAttributes(c_int) {
        /// Read-only, non-enumerable, non-configurable.
        DEFAULT = 0,
        /// Writable.
        WRITABLE = 1 << 0,
        /// Enumerable.
        ENUMERABLE = 1 << 1,
        /// Configurable.
        CONFIGURABLE = 1 << 2,
        /// Defined on the class rather than on instances.
        STATIC = 1 << 10,
        /// Default for class methods.
        DEFAULT_METHOD = (1 << 0) | (1 << 2),
        /// Default for object properties.
        DEFAULT_JSPROPERTY = (1 << 0) | (1 << 1) | (1 << 2),
    }
}

abi_flags! {
    /// Filter of `napi_get_all_property_names`.
    KeyFilter(c_int) {
        /// No filtering.
        ALL_PROPERTIES = 0,
        /// Writable keys only.
        WRITABLE = 1,
        /// Enumerable keys only.
        ENUMERABLE = 1 << 1,
        /// Configurable keys only.
        CONFIGURABLE = 1 << 2,
        /// Skip string keys.
        SKIP_STRINGS = 1 << 3,
        /// Skip symbol keys.
        SKIP_SYMBOLS = 1 << 4,
    }
}

// ============================================================================
// Structures
// ============================================================================

/// One entry of a `napi_define_properties` / `napi_define_class` list.
#[repr(C)]
#[derive(Clone, Copy)]
pub struct PropertyDescriptor {
    /// Name as a NUL-terminated UTF-8 string, or NULL when `name` is used.
    pub utf8name: *const c_char,
    /// Name as a value, or NULL when `utf8name` is used.
    pub name: napi_value,
    /// Method implementation.
    pub method: napi_callback,
    /// Getter implementation.
    pub getter: napi_callback,
    /// Setter implementation.
    pub setter: napi_callback,
    /// Plain data value.
    pub value: napi_value,
    /// Attribute flags.
    pub attributes: PropertyAttributes,
    /// Data passed to method/getter/setter.
    pub data: *mut c_void,
}

impl PropertyDescriptor {
    /// Whether the descriptor defines an accessor pair.
    pub fn is_accessor(&self) -> bool {
        self.getter.is_some() || self.setter.is_some()
    }
}

impl Default for PropertyDescriptor {
    fn default() -> Self {
        Self {
            utf8name: std::ptr::null(),
            name: std::ptr::null_mut(),
            method: None,
            getter: None,
            setter: None,
            value: std::ptr::null_mut(),
            attributes: PropertyAttributes::DEFAULT,
            data: std::ptr::null_mut(),
        }
    }
}

/// Returned by `napi_get_last_error_info`.
#[repr(C)]
#[derive(Clone, Copy, Debug)]
pub struct ExtendedErrorInfo {
    /// Human readable message, NULL for success.
    pub error_message: *const c_char,
    /// Engine specific data.
    pub engine_reserved: *mut c_void,
    /// Engine specific code.
    pub engine_error_code: u32,
    /// Status of the last call.
    pub error_code: Status,
}

impl Default for ExtendedErrorInfo {
    fn default() -> Self {
        Self {
            error_message: std::ptr::null(),
            engine_reserved: std::ptr::null_mut(),
            engine_error_code: 0,
            error_code: Status::OK,
        }
    }
}

/// Returned by `napi_get_node_version`.
#[repr(C)]
#[derive(Debug)]
pub struct NodeVersion {
    /// Major version.
    pub major: u32,
    /// Minor version.
    pub minor: u32,
    /// Patch version.
    pub patch: u32,
    /// Release name, NUL-terminated.
    pub release: *const c_char,
}

// SAFETY: `release` only ever points at static string data.
unsafe impl Sync for NodeVersion {}

/// 128-bit tag attached to objects with `napi_type_tag_object`.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub struct TypeTag {
    /// Low half.
    pub lower: u64,
    /// High half.
    pub upper: u64,
}

/// Static module descriptor passed to `napi_module_register`.
#[repr(C)]
pub struct ModuleDescriptor {
    /// Module ABI version.
    pub nm_version: c_int,
    /// Flags.
    pub nm_flags: c_uint,
    /// Source file name.
    pub nm_filename: *const c_char,
    /// Registration callback.
    pub nm_register_func: napi_addon_register_func,
    /// Module name.
    pub nm_modname: *const c_char,
    /// Private data.
    pub nm_priv: *mut c_void,
    /// Reserved.
    pub reserved: [*mut c_void; 4],
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::mem::{align_of, size_of};

    #[test]
    fn test_status_values_match_historical_abi() {
        assert_eq!(Status::OK.0, 0);
        assert_eq!(Status::GENERIC_FAILURE.0, 9);
        assert_eq!(Status::QUEUE_FULL.0, 15);
        assert_eq!(Status::CLOSING.0, 16);
        assert_eq!(Status::CANNOT_RUN_JS.0, 23);
        assert_eq!(Status::ALL.len(), 24);
        for (index, status) in Status::ALL.iter().enumerate() {
            assert_eq!(status.0 as usize, index);
        }
    }

    #[test]
    fn test_unknown_values_are_representable() {
        let bogus = Status(1234);
        assert!(!bogus.is_known());
        assert_eq!(format!("{:?}", bogus), "Status(1234)");
        assert_eq!(format!("{:?}", Status::CANCELLED), "napi_cancelled");
    }

    #[test]
    fn test_value_and_typed_array_tags() {
        assert_eq!(ValueType::BIGINT.0, 9);
        assert_eq!(ValueType::EXTERNAL.name(), Some("napi_external"));
        assert_eq!(TypedArrayType::BIGUINT64.0, 10);
        assert_eq!(TypedArrayType::FLOAT64.element_size(), Some(8));
        assert_eq!(TypedArrayType::UINT8_CLAMPED.element_size(), Some(1));
        assert_eq!(TypedArrayType(42).element_size(), None);
    }

    #[test]
    fn test_property_attribute_flags() {
        assert_eq!(PropertyAttributes::STATIC.0, 1024);
        assert_eq!(
            PropertyAttributes::DEFAULT_JSPROPERTY,
            PropertyAttributes::WRITABLE | PropertyAttributes::ENUMERABLE | PropertyAttributes::CONFIGURABLE
        );
        assert!(PropertyAttributes::DEFAULT_METHOD.contains(PropertyAttributes::CONFIGURABLE));
        assert!(!PropertyAttributes::DEFAULT_METHOD.contains(PropertyAttributes::ENUMERABLE));
        assert_eq!(KeyFilter::SKIP_SYMBOLS.0, 16);
    }

    #[test]
    fn test_layouts_match_c() {
        assert_eq!(size_of::<Status>(), size_of::<c_int>());
        assert_eq!(size_of::<napi_callback>(), size_of::<usize>());
        assert_eq!(size_of::<PropertyDescriptor>(), 8 * size_of::<usize>());
        assert_eq!(align_of::<ExtendedErrorInfo>(), align_of::<usize>());
        assert_eq!(size_of::<TypeTag>(), 16);
    }
}
