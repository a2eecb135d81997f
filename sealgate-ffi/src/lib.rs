//! C ABI exports for Sealgate host integration.
//!
//! Exposes two entry points, `encrypt` and `decrypt`, in the two styles a
//! host may need:
//! - direct: `sealgate_encrypt` / `sealgate_decrypt` return once the work is
//!   done and write a tagged JSON response to an out pointer
//! - deferred: `sealgate_encrypt_async` / `sealgate_decrypt_async` return at
//!   once and invoke a callback exactly once, from a worker thread or, for
//!   requests still outstanding at shutdown, from the shutting-down thread
//!
//! All functions use C-compatible types and report failures via
//! [`SealgateError`] codes. Strings handed out by this library must be
//! released with [`sealgate_free_string`].

pub mod bridge;

pub use bridge::{BridgeResponse, DeferredBridge, DirectBridge, Pending, Rejection};

use sealgate_service::{EncryptionService, ErrorKind, ServiceConfig};
use serde::Serialize;
use std::ffi::{CStr, CString, c_char, c_void};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{error, info};

/// Error codes returned by FFI functions.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SealgateError {
    /// Operation succeeded (or, for async calls, was dispatched).
    Ok = 0,
    /// Null pointer argument.
    NullPointer = 1,
    /// Invalid UTF-8 string.
    InvalidUtf8 = 2,
    /// JSON serialization error.
    JsonError = 3,
    /// `sealgate_init` has not been called.
    NotInitialized = 4,
    /// Required arguments missing.
    InvalidArguments = 5,
    /// Malformed base64 input.
    EncodingError = 6,
    /// Cipher or key-wrap failure.
    CryptoError = 7,
    /// Token never issued or already consumed.
    KeyNotFound = 8,
    /// Configuration missing or invalid.
    ConfigError = 9,
    /// Deferred request rejected.
    Rejected = 10,
    /// Unknown error.
    Unknown = 99,
}

impl From<ErrorKind> for SealgateError {
    fn from(kind: ErrorKind) -> Self {
        match kind {
            ErrorKind::InvalidArguments => SealgateError::InvalidArguments,
            ErrorKind::Encoding => SealgateError::EncodingError,
            ErrorKind::Crypto => SealgateError::CryptoError,
            ErrorKind::KeyNotFound => SealgateError::KeyNotFound,
            ErrorKind::Config => SealgateError::ConfigError,
        }
    }
}

/// Callback for deferred calls.
///
/// `json` is the resolved value on `Ok`, or `{"message": ...}` on
/// `Rejected`. It is only valid for the duration of the call.
pub type SealgateCallback =
    extern "C" fn(user_data: *mut c_void, status: SealgateError, json: *const c_char);

/// Opaque handle to the Sealgate runtime.
struct SealgateHandle {
    direct: DirectBridge,
    deferred: Arc<DeferredBridge>,
}

/// Global handle storage (single instance).
static HANDLE: Mutex<Option<SealgateHandle>> = Mutex::new(None);

fn lock_handle() -> MutexGuard<'static, Option<SealgateHandle>> {
    HANDLE.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Host-provided `user_data`, moved to the worker that runs the callback.
struct UserData(*mut c_void);

// SAFETY: the host guarantees `user_data` may be used from any thread.
unsafe impl Send for UserData {}

impl UserData {
    fn as_ptr(&self) -> *mut c_void {
        self.0
    }
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .try_init();
}

fn init_with_config(config: &ServiceConfig) -> SealgateError {
    let service = match EncryptionService::new(config) {
        Ok(s) => Arc::new(s),
        Err(e) => {
            error!("sealgate init failed: {e}");
            return e.kind().into();
        }
    };
    let deferred = match DeferredBridge::new(Arc::clone(&service), config.worker_threads) {
        Ok(d) => Arc::new(d),
        Err(e) => {
            error!("sealgate init failed: {e}");
            return e.kind().into();
        }
    };

    let previous = lock_handle().replace(SealgateHandle {
        direct: DirectBridge::new(service),
        deferred,
    });
    if let Some(previous) = previous {
        previous.deferred.shutdown();
    }
    info!("sealgate initialized");
    SealgateError::Ok
}

/// Helper: parse a C string pointer to &str.
unsafe fn parse_cstr<'a>(ptr: *const c_char) -> Result<&'a str, SealgateError> {
    if ptr.is_null() {
        return Err(SealgateError::NullPointer);
    }
    unsafe { CStr::from_ptr(ptr).to_str().map_err(|_| SealgateError::InvalidUtf8) }
}

/// Helper: collect leading non-null C string arguments, as a host would
/// pass a variable-length argument list.
unsafe fn collect_args(ptrs: &[*const c_char]) -> Result<Vec<String>, SealgateError> {
    let mut args = Vec::with_capacity(ptrs.len());
    for &ptr in ptrs {
        if ptr.is_null() {
            break;
        }
        args.push(unsafe { parse_cstr(ptr) }?.to_owned());
    }
    Ok(args)
}

fn to_cstring(value: &impl Serialize) -> Result<CString, SealgateError> {
    let json = serde_json::to_string(value).map_err(|_| SealgateError::JsonError)?;
    CString::new(json).map_err(|_| SealgateError::JsonError)
}

/// Helper: write a JSON-serializable value to an out pointer.
unsafe fn write_json_out(out: *mut *mut c_char, value: &impl Serialize) -> SealgateError {
    match to_cstring(value) {
        Ok(c_json) => {
            unsafe { *out = c_json.into_raw() };
            SealgateError::Ok
        }
        Err(e) => e,
    }
}

fn deliver<T: Serialize>(callback: SealgateCallback, user_data: UserData, outcome: Result<T, Rejection>) {
    let (status, json) = match &outcome {
        Ok(value) => (SealgateError::Ok, to_cstring(value)),
        Err(rejection) => (SealgateError::Rejected, to_cstring(rejection)),
    };
    match json {
        Ok(c_json) => callback(user_data.as_ptr(), status, c_json.as_ptr()),
        Err(e) => callback(user_data.as_ptr(), e, std::ptr::null()),
    }
}

fn current_direct() -> Option<DirectBridge> {
    lock_handle().as_ref().map(|h| h.direct.clone())
}

fn current_deferred() -> Option<Arc<DeferredBridge>> {
    lock_handle().as_ref().map(|h| Arc::clone(&h.deferred))
}

fn response_code<T>(response: &BridgeResponse<T>) -> SealgateError {
    response
        .error_kind()
        .map_or(SealgateError::Ok, SealgateError::from)
}

// ============================================================================
// Lifecycle
// ============================================================================

/// Initializes Sealgate from a JSON config.
///
/// Replaces any previous instance; tokens issued by it become unknown and
/// its outstanding deferred callbacks are rejected as abandoned.
///
/// # Safety
/// - `config_json` must be a valid null-terminated UTF-8 string.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn sealgate_init(config_json: *const c_char) -> SealgateError { unsafe {
    init_tracing();

    let json = match parse_cstr(config_json) {
        Ok(s) => s,
        Err(e) => return e,
    };
    match ServiceConfig::from_json(json) {
        Ok(config) => init_with_config(&config),
        Err(e) => {
            error!("sealgate init failed: {e}");
            e.kind().into()
        }
    }
}}

/// Initializes Sealgate from `SEALGATE_*` environment variables.
#[unsafe(no_mangle)]
pub extern "C" fn sealgate_init_from_env() -> SealgateError {
    init_tracing();

    match ServiceConfig::from_env() {
        Ok(config) => init_with_config(&config),
        Err(e) => {
            error!("sealgate init failed: {e}");
            e.kind().into()
        }
    }
}

/// Tears down the instance. Every deferred callback still outstanding is
/// invoked with an abandoned rejection before this returns.
#[unsafe(no_mangle)]
pub extern "C" fn sealgate_shutdown() {
    let Some(handle) = lock_handle().take() else {
        return;
    };
    handle.deferred.shutdown();
    info!("sealgate shut down");
}

/// Frees a string allocated by this library.
///
/// # Safety
/// - `s` must be a string allocated by this library, or null.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn sealgate_free_string(s: *mut c_char) { unsafe {
    if !s.is_null() {
        drop(CString::from_raw(s));
    }
}}

// ============================================================================
// Direct style
// ============================================================================

/// Encrypts `text`. Writes `{"status":"ok","value":{"ciphertext","token"}}`
/// or `{"status":"error",...}` to `out_json`.
///
/// # Safety
/// - `text` must be null or a valid null-terminated UTF-8 string.
/// - `out_json` must be a valid pointer. The result must be freed with `sealgate_free_string`.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn sealgate_encrypt(
    text: *const c_char,
    out_json: *mut *mut c_char,
) -> SealgateError { unsafe {
    if out_json.is_null() {
        return SealgateError::NullPointer;
    }
    let Some(direct) = current_direct() else {
        return SealgateError::NotInitialized;
    };
    let args = match collect_args(&[text]) {
        Ok(a) => a,
        Err(e) => return e,
    };

    let response = direct.encrypt(&args);
    match write_json_out(out_json, &response) {
        SealgateError::Ok => response_code(&response),
        e => e,
    }
}}

/// Decrypts `ciphertext` with `token`. Writes `{"status":"ok","value":"..."}`
/// or `{"status":"error",...}` to `out_json`.
///
/// # Safety
/// - `ciphertext` and `token` must each be null or a valid null-terminated UTF-8 string.
/// - `out_json` must be a valid pointer. The result must be freed with `sealgate_free_string`.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn sealgate_decrypt(
    ciphertext: *const c_char,
    token: *const c_char,
    out_json: *mut *mut c_char,
) -> SealgateError { unsafe {
    if out_json.is_null() {
        return SealgateError::NullPointer;
    }
    let Some(direct) = current_direct() else {
        return SealgateError::NotInitialized;
    };
    let args = match collect_args(&[ciphertext, token]) {
        Ok(a) => a,
        Err(e) => return e,
    };

    let response = direct.decrypt(&args);
    match write_json_out(out_json, &response) {
        SealgateError::Ok => response_code(&response),
        e => e,
    }
}}

// ============================================================================
// Deferred style
// ============================================================================

/// Dispatches an encrypt. On `Ok`, `callback` is invoked exactly once with
/// `{"ciphertext","token"}` or a rejection.
///
/// # Safety
/// - `text` must be null or a valid null-terminated UTF-8 string.
/// - `user_data` must be safe to use from another thread.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn sealgate_encrypt_async(
    text: *const c_char,
    callback: Option<SealgateCallback>,
    user_data: *mut c_void,
) -> SealgateError { unsafe {
    let Some(callback) = callback else {
        return SealgateError::NullPointer;
    };
    let Some(deferred) = current_deferred() else {
        return SealgateError::NotInitialized;
    };
    let args = match collect_args(&[text]) {
        Ok(a) => a,
        Err(e) => return e,
    };

    let user_data = UserData(user_data);
    let pending = deferred.encrypt(&args);
    deferred.on_settled(pending, move |outcome| deliver(callback, user_data, outcome));
    SealgateError::Ok
}}

/// Dispatches a decrypt. On `Ok`, `callback` is invoked exactly once with
/// the plaintext as a JSON string or a rejection.
///
/// # Safety
/// - `ciphertext` and `token` must each be null or a valid null-terminated UTF-8 string.
/// - `user_data` must be safe to use from another thread.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn sealgate_decrypt_async(
    ciphertext: *const c_char,
    token: *const c_char,
    callback: Option<SealgateCallback>,
    user_data: *mut c_void,
) -> SealgateError { unsafe {
    let Some(callback) = callback else {
        return SealgateError::NullPointer;
    };
    let Some(deferred) = current_deferred() else {
        return SealgateError::NotInitialized;
    };
    let args = match collect_args(&[ciphertext, token]) {
        Ok(a) => a,
        Err(e) => return e,
    };

    let user_data = UserData(user_data);
    let pending = deferred.decrypt(&args);
    deferred.on_settled(pending, move |outcome| deliver(callback, user_data, outcome));
    SealgateError::Ok
}}
