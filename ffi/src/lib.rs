//! C-ABI wrapper around `gql-core`.
//!
//! # Overview
//! Exposes the request controller through `extern "C"` functions in
//! host-does-IO style: the C host receives fully built requests, performs
//! them with whatever HTTP stack it has, and hands the responses back.
//!
//! # Design
//! - Every `extern "C"` function runs inside `ffi_guard`, so panics never
//!   cross the FFI boundary.
//! - A controller stores its automatic fetch cycle until the host collects
//!   it with `gql_controller_take_trigger`.
//! - `gql_pending_complete` / `gql_pending_fail` consume the pending cycle;
//!   `gql_pending_free` drops one that will never finish.
//! - The C caller owns all returned pointers and must call the matching
//!   `gql_free_*` / `*_free` function to release them.

pub mod types;

use std::ffi::{CStr, CString};
use std::os::raw::c_char;
use std::panic::{catch_unwind, AssertUnwindSafe};

use gql_core::{ClientError, HttpResponse, RequestLifecycle};
use serde_json::Value;

use types::*;

/// Run `f`, turning a panic into `fallback`.
fn ffi_guard<R>(function: &'static str, fallback: R, f: impl FnOnce() -> R) -> R {
    catch_unwind(AssertUnwindSafe(f)).unwrap_or_else(|_| {
        tracing::error!(function, "panic caught at FFI boundary");
        fallback
    })
}

// ---------------------------------------------------------------------------
// Controller lifecycle
// ---------------------------------------------------------------------------

/// Mount a controller from `spec`.
///
/// Returns null if `spec` is null, holds invalid UTF-8, has unparseable
/// `variables_json`, or if an internal panic occurs. Unless `spec->passive`
/// is set, the automatic fetch cycle is waiting in
/// `gql_controller_take_trigger`. Free with `gql_controller_free`.
#[unsafe(no_mangle)]
pub extern "C" fn gql_controller_new(spec: *const FfiRequestSpec) -> *mut FfiController {
    ffi_guard("gql_controller_new", std::ptr::null_mut(), || {
        if spec.is_null() {
            return std::ptr::null_mut();
        }
        let spec = match unsafe { (*spec).to_core() } {
            Ok(spec) => spec,
            Err(_) => return std::ptr::null_mut(),
        };
        match RequestLifecycle::<Value>::mount(&spec) {
            Ok((inner, trigger)) => Box::into_raw(Box::new(FfiController { inner, trigger })),
            Err(_) => std::ptr::null_mut(),
        }
    })
}

/// Tear down and free a controller. Cycles still held by the host complete
/// as `Discarded`. Safe to call with null.
#[unsafe(no_mangle)]
pub extern "C" fn gql_controller_free(controller: *mut FfiController) {
    if !controller.is_null() {
        ffi_guard("gql_controller_free", (), || {
            drop(unsafe { Box::from_raw(controller) });
        });
    }
}

/// Re-render with new inputs. If the fetch inputs changed and `spec` is
/// not passive, a new automatic cycle replaces any uncollected one.
#[unsafe(no_mangle)]
pub extern "C" fn gql_controller_render(
    controller: *mut FfiController,
    spec: *const FfiRequestSpec,
) -> FfiErrorCode {
    ffi_guard("gql_controller_render", FfiErrorCode::Panic, || {
        if controller.is_null() || spec.is_null() {
            return FfiErrorCode::NullArg;
        }
        let controller = unsafe { &mut *controller };
        let spec = match unsafe { (*spec).to_core() } {
            Ok(spec) => spec,
            Err(code) => return code,
        };
        match controller.inner.render(&spec) {
            Ok(Some(pending)) => {
                controller.trigger = Some(pending);
                FfiErrorCode::Ok
            }
            Ok(None) => FfiErrorCode::Ok,
            Err(e) => FfiErrorCode::from(&e),
        }
    })
}

/// Collect the automatic fetch cycle, or null if none is waiting.
#[unsafe(no_mangle)]
pub extern "C" fn gql_controller_take_trigger(controller: *mut FfiController) -> *mut FfiPendingFetch {
    ffi_guard("gql_controller_take_trigger", std::ptr::null_mut(), || {
        if controller.is_null() {
            return std::ptr::null_mut();
        }
        let controller = unsafe { &mut *controller };
        match controller.trigger.take() {
            Some(inner) => Box::into_raw(Box::new(FfiPendingFetch { inner })),
            None => std::ptr::null_mut(),
        }
    })
}

/// Start a fetch cycle now, regardless of passive mode.
#[unsafe(no_mangle)]
pub extern "C" fn gql_controller_execute(controller: *const FfiController) -> *mut FfiPendingFetch {
    ffi_guard("gql_controller_execute", std::ptr::null_mut(), || {
        if controller.is_null() {
            return std::ptr::null_mut();
        }
        let controller = unsafe { &*controller };
        let inner = controller.inner.begin();
        Box::into_raw(Box::new(FfiPendingFetch { inner }))
    })
}

/// Clear the controller state to idle.
#[unsafe(no_mangle)]
pub extern "C" fn gql_controller_reset(controller: *const FfiController) {
    if !controller.is_null() {
        ffi_guard("gql_controller_reset", (), || {
            unsafe { &*controller }.inner.reset();
        });
    }
}

/// True once a response has been stored.
#[unsafe(no_mangle)]
pub extern "C" fn gql_controller_loaded(controller: *const FfiController) -> bool {
    ffi_guard("gql_controller_loaded", false, || {
        !controller.is_null() && unsafe { &*controller }.inner.view().loaded()
    })
}

/// True once a response without GraphQL errors has been stored.
#[unsafe(no_mangle)]
pub extern "C" fn gql_controller_ok(controller: *const FfiController) -> bool {
    ffi_guard("gql_controller_ok", false, || {
        !controller.is_null() && unsafe { &*controller }.inner.view().ok()
    })
}

/// The current view as JSON: `{"loaded":false,"ok":false}` while idle,
/// `{"data":…,"errors":…,"loaded":true,"ok":…}` once settled.
/// Free with `gql_free_string`.
#[unsafe(no_mangle)]
pub extern "C" fn gql_controller_view_json(controller: *const FfiController) -> *mut c_char {
    ffi_guard("gql_controller_view_json", std::ptr::null_mut(), || {
        if controller.is_null() {
            return std::ptr::null_mut();
        }
        let view = unsafe { &*controller }.inner.view();
        match serde_json::to_string(&view) {
            Ok(json) => c_string(json),
            Err(_) => std::ptr::null_mut(),
        }
    })
}

// ---------------------------------------------------------------------------
// Pending cycles
// ---------------------------------------------------------------------------

/// The request to perform for `pending`.
///
/// Returns null when no request could be built (no operation); the host
/// should then call `gql_pending_fail`. Free with `gql_free_request`.
#[unsafe(no_mangle)]
pub extern "C" fn gql_pending_request(pending: *const FfiPendingFetch) -> *mut FfiHttpRequest {
    ffi_guard("gql_pending_request", std::ptr::null_mut(), || {
        if pending.is_null() {
            return std::ptr::null_mut();
        }
        match unsafe { &*pending }.inner.request() {
            Ok(req) => FfiHttpRequest::from_core(req),
            Err(_) => std::ptr::null_mut(),
        }
    })
}

/// Finish `pending` with the response the host received. Consumes
/// `pending`, even when `response` is null.
#[unsafe(no_mangle)]
pub extern "C" fn gql_pending_complete(
    pending: *mut FfiPendingFetch,
    response: *const FfiHttpResponse,
) -> FfiCompletion {
    ffi_guard("gql_pending_complete", FfiCompletion::Invalid, || {
        if pending.is_null() {
            return FfiCompletion::Invalid;
        }
        let pending = unsafe { Box::from_raw(pending) };
        if response.is_null() {
            return FfiCompletion::Invalid;
        }
        let resp = unsafe { &*response };
        pending.inner.complete(Ok(ffi_response_to_core(resp))).into()
    })
}

/// Finish `pending` with a transport failure. Consumes `pending`.
/// `message` may be null.
#[unsafe(no_mangle)]
pub extern "C" fn gql_pending_fail(
    pending: *mut FfiPendingFetch,
    message: *const c_char,
) -> FfiCompletion {
    ffi_guard("gql_pending_fail", FfiCompletion::Invalid, || {
        if pending.is_null() {
            return FfiCompletion::Invalid;
        }
        let pending = unsafe { Box::from_raw(pending) };
        let message = unsafe { opt_string(message) }
            .ok()
            .flatten()
            .unwrap_or_else(|| "transport failed".to_string());
        pending.inner.complete(Err(ClientError::Transport(message))).into()
    })
}

/// Drop a pending cycle without recording anything. Safe to call with null.
#[unsafe(no_mangle)]
pub extern "C" fn gql_pending_free(pending: *mut FfiPendingFetch) {
    if !pending.is_null() {
        ffi_guard("gql_pending_free", (), || {
            drop(unsafe { Box::from_raw(pending) });
        });
    }
}

/// Convert an `FfiHttpResponse` to a core `HttpResponse`. A null body is
/// read as empty.
fn ffi_response_to_core(resp: &FfiHttpResponse) -> HttpResponse {
    let body = if resp.body.is_null() {
        String::new()
    } else {
        unsafe { CStr::from_ptr(resp.body) }
            .to_string_lossy()
            .into_owned()
    };
    HttpResponse {
        status: resp.status,
        headers: Vec::new(),
        body,
    }
}

// ---------------------------------------------------------------------------
// Free functions
// ---------------------------------------------------------------------------

/// Free an `FfiHttpRequest` returned by `gql_pending_request`.
/// Safe to call with null.
#[unsafe(no_mangle)]
pub extern "C" fn gql_free_request(req: *mut FfiHttpRequest) {
    if req.is_null() {
        return;
    }
    ffi_guard("gql_free_request", (), || {
        let req = unsafe { Box::from_raw(req) };
        free_c_string(req.url);
        free_c_string(req.body);
        if !req.headers.is_null() && req.headers_len > 0 {
            let headers = unsafe {
                Box::from_raw(std::ptr::slice_from_raw_parts_mut(
                    req.headers,
                    req.headers_len as usize,
                ))
            };
            for h in headers.iter() {
                free_c_string(h.key);
                free_c_string(h.value);
            }
        }
    });
}

fn free_c_string(s: *mut c_char) {
    if !s.is_null() {
        drop(unsafe { CString::from_raw(s) });
    }
}

/// Free a C string allocated by this library. Safe to call with null.
#[unsafe(no_mangle)]
pub extern "C" fn gql_free_string(s: *mut c_char) {
    if !s.is_null() {
        ffi_guard("gql_free_string", (), || free_c_string(s));
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
