use std::ptr;

use npipe_frame::{MessageConfig, MessageExt};

use crate::args::{self, with_handle};
use crate::error;
use crate::types::{NpHandle, NpMessage, NpResult};

/// Read one length-prefixed message into `out`.
///
/// Any payload already held by `out` is released first. An empty message
/// leaves `out->data` null with `out->len == 0`.
///
/// # Safety
/// `pipe` must be a live connection handle. `out` must be valid for writes and, if its `data`
/// is non-null, hold a payload allocated by this library.
#[no_mangle]
pub unsafe extern "C" fn np_read_message(pipe: NpHandle, timeout_ms: i64, out: *mut NpMessage) -> NpResult {
    crate::ffi_boundary(NpResult::Generic, || {
        error::clear_error_state();

        if out.is_null() {
            return error::set_invalid_argument("out cannot be null");
        }
        let Some(timeout) = args::timeout_arg(timeout_ms) else {
            return NpResult::Generic;
        };

        with_handle(pipe, NpResult::Generic, |pipe| match pipe.read_message(timeout) {
            Ok(payload) => {
                let out = {
                    // SAFETY: Pointer validity is guaranteed by the caller.
                    unsafe { &mut *out }
                };
                // SAFETY: Existing payloads were allocated by this library.
                unsafe { release(out) };
                fill(out, &payload);
                NpResult::Ok
            }
            Err(err) => error::map_frame_error(&err),
        })
    })
}

/// Write one length-prefixed message.
///
/// # Safety
/// `pipe` must be a live connection handle. If `len > 0`, `data` must be readable for `len`
/// bytes.
#[no_mangle]
pub unsafe extern "C" fn np_write_message(pipe: NpHandle, data: *const u8, len: usize) -> NpResult {
    crate::ffi_boundary(NpResult::Generic, || {
        error::clear_error_state();

        // SAFETY: Pointer/length pairing is validated in helper.
        let Some(payload) = (unsafe { args::bytes_arg(data, len, "data") }) else {
            return NpResult::Generic;
        };

        with_handle(pipe, NpResult::Generic, |pipe| {
            match npipe_frame::write_message(pipe, payload, &MessageConfig::default()) {
                Ok(()) => NpResult::Ok,
                Err(err) => error::map_frame_error(&err),
            }
        })
    })
}

/// Free payload memory held by an [`NpMessage`] filled by `np_read_message`.
///
/// # Safety
/// `message` must be null or valid; if `message->data` is non-null it must
/// have originated from this library.
#[no_mangle]
pub unsafe extern "C" fn np_message_free(message: *mut NpMessage) {
    crate::ffi_boundary((), || {
        if message.is_null() {
            return;
        }

        // SAFETY: Pointer validity is guaranteed by the caller.
        let message = unsafe { &mut *message };
        // SAFETY: `data` was allocated by `fill`.
        unsafe { release(message) };
    });
}

fn fill(out: &mut NpMessage, payload: &[u8]) {
    let boxed: Box<[u8]> = payload.to_vec().into_boxed_slice();
    out.len = boxed.len();
    out.data = if boxed.is_empty() {
        ptr::null_mut()
    } else {
        Box::into_raw(boxed) as *mut u8
    };
}

/// # Safety
/// A non-null `message.data` must come from [`fill`].
unsafe fn release(message: &mut NpMessage) {
    if !message.data.is_null() {
        let slice_ptr = ptr::slice_from_raw_parts_mut(message.data, message.len);
        // SAFETY: `data`/`len` describe a `Box<[u8]>` leaked by `fill`.
        unsafe { drop(Box::from_raw(slice_ptr)) };
    }
    *message = NpMessage::default();
}
