use std::ffi::c_void;

use npipe_transport::ErrorCode;

/// Result code returned by every fallible `np_*` call.
///
/// The values match `np_last_error_code()`: `Timeout` only for expired waits,
/// `Stopped` only for cancelled waits.
#[repr(i32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NpResult {
    Ok = 0,
    Timeout = 1,
    Stopped = 2,
    Generic = 3,
}

impl From<ErrorCode> for NpResult {
    fn from(code: ErrorCode) -> Self {
        match code {
            ErrorCode::None => NpResult::Ok,
            ErrorCode::Timeout => NpResult::Timeout,
            ErrorCode::Stopped => NpResult::Stopped,
            ErrorCode::Generic => NpResult::Generic,
        }
    }
}

#[allow(dead_code)]
pub const NP_OK: NpResult = NpResult::Ok;
#[allow(dead_code)]
pub const NP_ERR_TIMEOUT: NpResult = NpResult::Timeout;
#[allow(dead_code)]
pub const NP_ERR_STOPPED: NpResult = NpResult::Stopped;
#[allow(dead_code)]
pub const NP_ERR_GENERIC: NpResult = NpResult::Generic;

/// Timeout sentinel for an unbounded wait.
pub const NP_INFINITE: i64 = -1;

/// A received message. Release with `np_message_free`.
#[repr(C)]
#[derive(Debug)]
pub struct NpMessage {
    pub data: *mut u8,
    pub len: usize,
}

impl Default for NpMessage {
    fn default() -> Self {
        Self {
            data: std::ptr::null_mut(),
            len: 0,
        }
    }
}

/// Opaque pipe handle; listener or connection.
pub type NpHandle = *mut c_void;
