//! `#[repr(C)]` types for the FFI boundary.
//!
//! # Design
//! Each type mirrors a core type but uses C-compatible representations:
//! `*mut c_char` instead of `String`, raw pointers instead of `Vec`, and
//! enums with explicit discriminants. Conversion functions live here to keep
//! `lib.rs` focused on the `extern "C"` surface.

use std::ffi::{CStr, CString};
use std::os::raw::c_char;

use gql_core::{ClientError, Completion, HttpMethod, HttpRequest, PendingFetch, RequestLifecycle, RequestSpec};
use serde_json::Value;

/// Opaque handle to a request controller. JSON `data` is kept untyped.
pub struct FfiController {
    pub(crate) inner: RequestLifecycle<Value>,
    pub(crate) trigger: Option<PendingFetch<Value>>,
}

/// Opaque handle to a started fetch cycle.
pub struct FfiPendingFetch {
    pub(crate) inner: PendingFetch<Value>,
}

// ---------------------------------------------------------------------------
// Inputs
// ---------------------------------------------------------------------------

/// Controller inputs for one render. Every pointer may be null.
///
/// `variables_json` is parsed as JSON; a null `operation` mounts a
/// controller whose cycles always fail.
#[repr(C)]
pub struct FfiRequestSpec {
    pub operation: *const c_char,
    pub variables_json: *const c_char,
    pub token: *const c_char,
    pub endpoint: *const c_char,
    pub passive: bool,
}

impl FfiRequestSpec {
    /// Convert into a core `RequestSpec`.
    ///
    /// # Safety
    /// Every non-null pointer must reference a NUL-terminated string.
    pub(crate) unsafe fn to_core(&self) -> Result<RequestSpec, FfiErrorCode> {
        let mut spec = match unsafe { opt_string(self.operation) }? {
            Some(op) => RequestSpec::new(op),
            None => RequestSpec::without_operation(),
        };
        if let Some(raw) = unsafe { opt_string(self.variables_json) }? {
            let variables: Value =
                serde_json::from_str(&raw).map_err(|_| FfiErrorCode::InvalidArgument)?;
            spec = spec.variables(variables);
        }
        if let Some(token) = unsafe { opt_string(self.token) }? {
            spec = spec.token(token);
        }
        if let Some(endpoint) = unsafe { opt_string(self.endpoint) }? {
            spec = spec.endpoint(endpoint);
        }
        Ok(spec.passive(self.passive))
    }
}

/// Read a nullable C string.
///
/// # Safety
/// A non-null `ptr` must reference a NUL-terminated string.
pub(crate) unsafe fn opt_string(ptr: *const c_char) -> Result<Option<String>, FfiErrorCode> {
    if ptr.is_null() {
        return Ok(None);
    }
    unsafe { CStr::from_ptr(ptr) }
        .to_str()
        .map(|s| Some(s.to_string()))
        .map_err(|_| FfiErrorCode::InvalidArgument)
}

/// Move a Rust string to C. Returns null if it contains a NUL byte.
pub(crate) fn c_string(s: String) -> *mut c_char {
    CString::new(s).map(CString::into_raw).unwrap_or(std::ptr::null_mut())
}

// ---------------------------------------------------------------------------
// Request types
// ---------------------------------------------------------------------------

/// HTTP method as a C enum.
#[repr(C)]
pub enum FfiHttpMethod {
    Post = 0,
}

impl From<HttpMethod> for FfiHttpMethod {
    fn from(m: HttpMethod) -> Self {
        match m {
            HttpMethod::Post => FfiHttpMethod::Post,
        }
    }
}

/// A single HTTP header as a key-value pair of C strings.
#[repr(C)]
pub struct FfiHeader {
    pub key: *mut c_char,
    pub value: *mut c_char,
}

/// An HTTP request described as C-compatible plain data.
///
/// Returned by `gql_pending_request`. The C caller performs the request and
/// passes the response to `gql_pending_complete`.
#[repr(C)]
pub struct FfiHttpRequest {
    pub method: FfiHttpMethod,
    pub url: *mut c_char,
    pub headers: *mut FfiHeader,
    pub headers_len: u32,
    pub body: *mut c_char,
}

impl FfiHttpRequest {
    /// Copy a core `HttpRequest` into a heap-allocated `FfiHttpRequest`.
    pub(crate) fn from_core(req: &HttpRequest) -> *mut Self {
        let headers_len = req.headers.len() as u32;
        let headers = if req.headers.is_empty() {
            std::ptr::null_mut()
        } else {
            let ffi_headers: Box<[FfiHeader]> = req
                .headers
                .iter()
                .map(|(k, v)| FfiHeader {
                    key: c_string(k.clone()),
                    value: c_string(v.clone()),
                })
                .collect();
            Box::into_raw(ffi_headers).cast::<FfiHeader>()
        };

        Box::into_raw(Box::new(FfiHttpRequest {
            method: req.method.into(),
            url: c_string(req.url.clone()),
            headers,
            headers_len,
            body: c_string(req.body.clone()),
        }))
    }
}

// ---------------------------------------------------------------------------
// Response input (caller-provided, not heap-allocated by us)
// ---------------------------------------------------------------------------

/// An HTTP response described as C-compatible plain data.
///
/// The C caller constructs this on the stack after performing the request.
/// The FFI layer reads but does not free these fields.
#[repr(C)]
pub struct FfiHttpResponse {
    pub status: u16,
    pub body: *const c_char,
}

// ---------------------------------------------------------------------------
// Result codes
// ---------------------------------------------------------------------------

/// Error codes returned by fallible calls.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FfiErrorCode {
    Ok = 0,
    MissingOperation = 1,
    Transport = 2,
    Decode = 3,
    Serialization = 4,
    Panic = 5,
    NullArg = 6,
    InvalidArgument = 7,
}

impl From<&ClientError> for FfiErrorCode {
    fn from(err: &ClientError) -> Self {
        match err {
            ClientError::MissingOperation => FfiErrorCode::MissingOperation,
            ClientError::Transport(_) => FfiErrorCode::Transport,
            ClientError::Decode(_) => FfiErrorCode::Decode,
            ClientError::Serialization(_) => FfiErrorCode::Serialization,
        }
    }
}

/// What completing a cycle did to the controller state.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FfiCompletion {
    Settled = 0,
    Unchanged = 1,
    Failed = 2,
    Discarded = 3,
    /// Null argument or caught panic; the cycle was not recorded.
    Invalid = 4,
}

impl From<Completion> for FfiCompletion {
    fn from(c: Completion) -> Self {
        match c {
            Completion::Settled => FfiCompletion::Settled,
            Completion::Unchanged => FfiCompletion::Unchanged,
            Completion::Failed => FfiCompletion::Failed,
            Completion::Discarded => FfiCompletion::Discarded,
        }
    }
}
