use std::os::raw::c_char;

use npipe_transport::{Namespace, PipeHandle, Visibility};

use crate::args::{self, with_handle};
use crate::error;
use crate::types::{NpHandle, NpResult};

/// Resolve `short_name` to its fully-qualified pipe name.
///
/// Writes the NUL-terminated name into `buf`. `out_len`, if non-null, receives
/// the name length excluding the terminator, also when `buf` is too small.
///
/// # Safety
/// `short_name` must be a valid C string. If `buf_len > 0`, `buf` must be writable for
/// `buf_len` bytes. `out_len` must be null or valid for writes.
#[no_mangle]
pub unsafe extern "C" fn np_resolve_name(
    short_name: *const c_char,
    private_pipe: bool,
    buf: *mut c_char,
    buf_len: usize,
    out_len: *mut usize,
) -> NpResult {
    crate::ffi_boundary(NpResult::Generic, || {
        error::clear_error_state();

        // SAFETY: We validate null and UTF-8 in helper.
        let Some(short) = (unsafe { args::required_str_arg(short_name, "short_name") }) else {
            return NpResult::Generic;
        };

        let name = match Namespace::from_env().resolve(short, Visibility::from_private_flag(private_pipe)) {
            Ok(name) => name,
            Err(err) => return error::map_pipe_error(&err),
        };
        let resolved = name.path().as_os_str().as_encoded_bytes();

        if !out_len.is_null() {
            // SAFETY: Caller guarantees `out_len` is valid for writes when non-null.
            unsafe { *out_len = resolved.len() };
        }

        // SAFETY: Pointer/length pairing is validated in helper.
        let Some(dst) = (unsafe { args::bytes_mut_arg(buf.cast::<u8>(), buf_len, "buf") }) else {
            return NpResult::Generic;
        };
        if dst.len() <= resolved.len() {
            return error::set_invalid_argument(format!(
                "buffer too small: need {} bytes",
                resolved.len() + 1
            ));
        }
        dst[..resolved.len()].copy_from_slice(resolved);
        dst[resolved.len()] = 0;
        NpResult::Ok
    })
}

fn endpoint_call(
    short_name: *const c_char,
    private_pipe: bool,
    f: fn(&str, Visibility) -> npipe_transport::Result<PipeHandle>,
) -> NpHandle {
    crate::ffi_boundary(std::ptr::null_mut(), || {
        error::clear_error_state();

        // SAFETY: Callers forward a pointer that is null or a valid C string.
        let Some(short) = (unsafe { args::required_str_arg(short_name, "short_name") }) else {
            return std::ptr::null_mut();
        };

        match f(short, Visibility::from_private_flag(private_pipe)) {
            Ok(pipe) => args::into_raw(pipe),
            Err(err) => {
                let _ = error::map_pipe_error(&err);
                std::ptr::null_mut()
            }
        }
    })
}

/// Create a listening pipe. Returns null on failure.
///
/// # Safety
/// `short_name` must be a non-null pointer to a valid UTF-8, NUL-terminated C string.
#[no_mangle]
pub unsafe extern "C" fn np_create(short_name: *const c_char, private_pipe: bool) -> NpHandle {
    endpoint_call(short_name, private_pipe, PipeHandle::create_named)
}

/// Connect to a listening pipe. Returns null on failure.
///
/// # Safety
/// `short_name` must be a non-null pointer to a valid UTF-8, NUL-terminated C string.
#[no_mangle]
pub unsafe extern "C" fn np_open(short_name: *const c_char, private_pipe: bool) -> NpHandle {
    endpoint_call(short_name, private_pipe, PipeHandle::open_named)
}

/// Wait for a client on a listener. Returns a new connection handle, or null
/// on failure; check `np_last_error_code()` to tell timeout from stop.
///
/// # Safety
/// `listener` must be a handle returned by `np_create` and not yet freed.
#[no_mangle]
pub unsafe extern "C" fn np_accept(listener: NpHandle, timeout_ms: i64) -> NpHandle {
    crate::ffi_boundary(std::ptr::null_mut(), || {
        error::clear_error_state();

        let Some(timeout) = args::timeout_arg(timeout_ms) else {
            return std::ptr::null_mut();
        };

        with_handle(listener, std::ptr::null_mut(), |pipe| match pipe.accept(timeout) {
            Ok(conn) => args::into_raw(conn),
            Err(err) => {
                let _ = error::map_pipe_error(&err);
                std::ptr::null_mut()
            }
        })
    })
}

/// Read up to `len` bytes. Returns the byte count, or 0 on failure.
///
/// # Safety
/// `pipe` must be a live connection handle. If `len > 0`, `buf` must be writable for `len` bytes.
#[no_mangle]
pub unsafe extern "C" fn np_read(pipe: NpHandle, buf: *mut u8, len: usize, timeout_ms: i64) -> usize {
    crate::ffi_boundary(0, || {
        error::clear_error_state();

        let Some(timeout) = args::timeout_arg(timeout_ms) else {
            return 0;
        };
        // SAFETY: Pointer/length pairing is validated in helper.
        let Some(buf) = (unsafe { args::bytes_mut_arg(buf, len, "buf") }) else {
            return 0;
        };

        with_handle(pipe, 0, |pipe| match pipe.read(buf, timeout) {
            Ok(n) => n,
            Err(err) => {
                let _ = error::map_pipe_error(&err);
                0
            }
        })
    })
}

/// Read exactly `exact_len` bytes into `buf`.
///
/// On failure the first bytes of `buf` may hold data already consumed from
/// the pipe.
///
/// # Safety
/// `pipe` must be a live connection handle. If `buf_len > 0`, `buf` must be writable for
/// `buf_len` bytes.
#[no_mangle]
pub unsafe extern "C" fn np_read_exact(
    pipe: NpHandle,
    buf: *mut u8,
    buf_len: usize,
    exact_len: usize,
    timeout_ms: i64,
) -> NpResult {
    crate::ffi_boundary(NpResult::Generic, || {
        error::clear_error_state();

        if exact_len > buf_len {
            return error::set_invalid_argument(format!(
                "exact_len {exact_len} exceeds buffer length {buf_len}"
            ));
        }
        let Some(timeout) = args::timeout_arg(timeout_ms) else {
            return NpResult::Generic;
        };
        // SAFETY: Pointer/length pairing is validated in helper.
        let Some(buf) = (unsafe { args::bytes_mut_arg(buf, buf_len, "buf") }) else {
            return NpResult::Generic;
        };

        with_handle(pipe, NpResult::Generic, |pipe| {
            match pipe.read_exact(&mut buf[..exact_len], timeout) {
                Ok(()) => NpResult::Ok,
                Err(err) => error::map_pipe_error(&err),
            }
        })
    })
}

/// Write all `len` bytes.
///
/// # Safety
/// `pipe` must be a live connection handle. If `len > 0`, `data` must be readable for `len`
/// bytes.
#[no_mangle]
pub unsafe extern "C" fn np_write(pipe: NpHandle, data: *const u8, len: usize) -> NpResult {
    crate::ffi_boundary(NpResult::Generic, || {
        error::clear_error_state();

        // SAFETY: Pointer/length pairing is validated in helper.
        let Some(data) = (unsafe { args::bytes_arg(data, len, "data") }) else {
            return NpResult::Generic;
        };

        with_handle(pipe, NpResult::Generic, |pipe| match pipe.write(data) {
            Ok(()) => NpResult::Ok,
            Err(err) => error::map_pipe_error(&err),
        })
    })
}

/// Cancel blocking calls on `pipe`. Safe to call from any thread.
///
/// # Safety
/// `pipe` must be a handle that has not been freed.
#[no_mangle]
pub unsafe extern "C" fn np_stop(pipe: NpHandle) -> NpResult {
    crate::ffi_boundary(NpResult::Generic, || {
        error::clear_error_state();
        with_handle(pipe, NpResult::Generic, |pipe| match pipe.stop() {
            Ok(()) => NpResult::Ok,
            Err(err) => error::map_pipe_error(&err),
        })
    })
}

/// Release the OS endpoint. Idempotent; the handle itself stays allocated
/// until `np_handle_free`.
///
/// # Safety
/// `pipe` must be a handle that has not been freed.
#[no_mangle]
pub unsafe extern "C" fn np_close(pipe: NpHandle) -> NpResult {
    crate::ffi_boundary(NpResult::Generic, || {
        error::clear_error_state();
        with_handle(pipe, NpResult::Generic, |pipe| match pipe.close() {
            Ok(()) => NpResult::Ok,
            Err(err) => error::map_pipe_error(&err),
        })
    })
}

/// Free a handle, closing it first if needed.
///
/// # Safety
/// `pipe` must be null or a handle returned by this library, with no other
/// thread still using it.
#[no_mangle]
pub unsafe extern "C" fn np_handle_free(pipe: NpHandle) {
    crate::ffi_boundary((), || {
        if pipe.is_null() {
            return;
        }

        // SAFETY: Caller guarantees this handle was allocated by this library.
        unsafe {
            drop(Box::from_raw(pipe as *mut PipeHandle));
        }
    });
}
