use std::ffi::CStr;
use std::os::raw::c_char;

use npipe_transport::{PipeHandle, Timeout};

use crate::error;
use crate::types::NpHandle;

/// Convert a required C string argument into UTF-8 `&str`.
///
/// # Safety
/// `value` must be null or point to a valid NUL-terminated C string.
pub(crate) unsafe fn required_str_arg<'a>(value: *const c_char, name: &str) -> Option<&'a str> {
    if value.is_null() {
        let _ = error::set_invalid_argument(format!("{name} cannot be null"));
        return None;
    }

    let as_cstr = {
        // SAFETY: The caller guarantees `value` points to a valid NUL-terminated C string.
        unsafe { CStr::from_ptr(value) }
    };

    match as_cstr.to_str() {
        Ok(v) => Some(v),
        Err(_) => {
            let _ = error::set_invalid_argument(format!("{name} must be valid UTF-8"));
            None
        }
    }
}

/// Convert an optional byte pointer + length into a slice.
///
/// # Safety
/// If `len > 0`, `data` must be non-null and readable for `len` bytes.
pub(crate) unsafe fn bytes_arg<'a>(data: *const u8, len: usize, name: &str) -> Option<&'a [u8]> {
    if len == 0 {
        return Some(&[]);
    }
    if data.is_null() {
        let _ = error::set_invalid_argument(format!("{name} cannot be null when len > 0"));
        return None;
    }

    // SAFETY: Pointer and length are validated above and owned by caller for the call duration.
    Some(unsafe { std::slice::from_raw_parts(data, len) })
}

/// Convert a writable byte pointer + length into a mutable slice.
///
/// # Safety
/// If `len > 0`, `data` must be non-null and writable for `len` bytes.
pub(crate) unsafe fn bytes_mut_arg<'a>(data: *mut u8, len: usize, name: &str) -> Option<&'a mut [u8]> {
    if len == 0 {
        return Some(&mut []);
    }
    if data.is_null() {
        let _ = error::set_invalid_argument(format!("{name} cannot be null when len > 0"));
        return None;
    }

    // SAFETY: Pointer and length are validated above and owned by caller for the call duration.
    Some(unsafe { std::slice::from_raw_parts_mut(data, len) })
}

/// Decode a signed-millisecond timeout, recording the error on rejection.
pub(crate) fn timeout_arg(msecs: i64) -> Option<Timeout> {
    match Timeout::from_msecs(msecs) {
        Ok(timeout) => Some(timeout),
        Err(err) => {
            let _ = error::map_pipe_error(&err);
            None
        }
    }
}

/// Borrow the pipe behind `handle`.
///
/// Handles are shared: one thread may block in a read while another calls
/// `np_stop` or `np_write` on the same handle.
pub(crate) fn with_handle<T>(handle: NpHandle, on_error: T, f: impl FnOnce(&PipeHandle) -> T) -> T {
    if handle.is_null() {
        let _ = error::set_invalid_argument("handle cannot be null");
        return on_error;
    }

    let pipe = {
        // SAFETY: Pointer validity is guaranteed by the caller until np_handle_free.
        unsafe { &*(handle as *const PipeHandle) }
    };

    f(pipe)
}

pub(crate) fn into_raw(pipe: PipeHandle) -> NpHandle {
    Box::into_raw(Box::new(pipe)) as NpHandle
}
