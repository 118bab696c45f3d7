use std::cell::RefCell;
use std::ffi::CString;
use std::os::raw::c_char;

use npipe_frame::FrameError;
use npipe_transport::PipeError;

use crate::types::NpResult;

struct ErrorRecord {
    code: NpResult,
    message: CString,
}

impl ErrorRecord {
    fn empty() -> Self {
        Self {
            code: NpResult::Ok,
            message: CString::default(),
        }
    }
}

thread_local! {
    static LAST_ERROR: RefCell<ErrorRecord> = RefCell::new(ErrorRecord::empty());
}

pub(crate) fn clear_error_state() {
    LAST_ERROR.with(|state| *state.borrow_mut() = ErrorRecord::empty());
}

pub(crate) fn set_error(code: NpResult, message: impl Into<String>) -> NpResult {
    let sanitized = message.into().replace('\0', "?");
    let message = CString::new(sanitized).unwrap_or_default();
    LAST_ERROR.with(|state| *state.borrow_mut() = ErrorRecord { code, message });
    code
}

pub(crate) fn set_invalid_argument(message: impl Into<String>) -> NpResult {
    set_error(NpResult::Generic, message)
}

pub(crate) fn set_panic_error() {
    let _ = set_error(NpResult::Generic, "panic across FFI boundary");
}

pub(crate) fn map_pipe_error(err: &PipeError) -> NpResult {
    set_error(err.code().into(), err.to_string())
}

pub(crate) fn map_frame_error(err: &FrameError) -> NpResult {
    set_error(err.code().into(), err.to_string())
}

pub(crate) fn last_error_code() -> NpResult {
    LAST_ERROR.with(|state| state.borrow().code)
}

pub(crate) fn last_error_ptr() -> *const c_char {
    LAST_ERROR.with(|state| state.borrow().message.as_ptr())
}
