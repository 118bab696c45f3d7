//! npipe-ffi: C-ABI exports for npipe channels.
//!
//! Calls follow a split shape: handles come back as pointers (null on
//! failure), reads return byte counts, and the failure detail is fetched
//! afterwards with `np_last_error_code()` / `np_last_error_message()`. The
//! record is per thread and is cleared at the start of every call.

#[cfg(unix)]
mod args;
mod error;
#[cfg(unix)]
mod message;
#[cfg(unix)]
mod pipe;
mod types;

use std::panic::AssertUnwindSafe;

#[cfg(unix)]
pub use message::{np_message_free, np_read_message, np_write_message};
#[cfg(unix)]
pub use pipe::{
    np_accept, np_close, np_create, np_handle_free, np_open, np_read, np_read_exact,
    np_resolve_name, np_stop, np_write,
};
pub use types::{
    NpHandle, NpMessage, NpResult, NP_ERR_GENERIC, NP_ERR_STOPPED, NP_ERR_TIMEOUT, NP_INFINITE,
    NP_OK,
};

fn ffi_boundary<T>(on_panic: T, f: impl FnOnce() -> T) -> T {
    match std::panic::catch_unwind(AssertUnwindSafe(f)) {
        Ok(value) => value,
        Err(_) => {
            error::set_panic_error();
            on_panic
        }
    }
}

/// Code of the calling thread's most recent failure, or `NP_OK`.
#[no_mangle]
pub extern "C" fn np_last_error_code() -> NpResult {
    ffi_boundary(NpResult::Generic, error::last_error_code)
}

/// Message of the calling thread's most recent failure; empty if none.
///
/// The pointer stays valid until the next `np_*` call on the same thread.
#[no_mangle]
pub extern "C" fn np_last_error_message() -> *const std::os::raw::c_char {
    ffi_boundary(std::ptr::null(), error::last_error_ptr)
}

#[cfg(all(test, unix))]
mod tests {
    use std::ffi::{CStr, CString};
    use std::sync::Once;
    use std::thread;
    use std::time::Duration;

    use super::*;

    static RUNTIME_ROOT: Once = Once::new();

    /// Point every test in this binary at one private namespace root.
    fn isolated() {
        RUNTIME_ROOT.call_once(|| {
            let root = format!(
                "/tmp/npffi-{}-{}",
                std::process::id(),
                std::time::SystemTime::now()
                    .duration_since(std::time::UNIX_EPOCH)
                    .expect("time should be after epoch")
                    .subsec_nanos()
            );
            std::env::set_var(npipe_transport::name::RUNTIME_DIR_ENV, root);
        });
    }

    fn last_message() -> String {
        let ptr = np_last_error_message();
        assert!(!ptr.is_null());
        // SAFETY: np_last_error_message returns a pointer to a thread-local CString.
        unsafe { CStr::from_ptr(ptr).to_string_lossy().into_owned() }
    }

    struct Pair {
        listener: NpHandle,
        server: NpHandle,
        client: NpHandle,
    }

    impl Pair {
        fn connect(short: &str) -> Self {
            isolated();
            let name = CString::new(short).unwrap();
            // SAFETY: `name` is a valid C string for the duration of each call.
            unsafe {
                let listener = np_create(name.as_ptr(), true);
                assert!(!listener.is_null(), "create failed: {}", last_message());
                let client = np_open(name.as_ptr(), true);
                assert!(!client.is_null(), "open failed: {}", last_message());
                let server = np_accept(listener, NP_INFINITE);
                assert!(!server.is_null(), "accept failed: {}", last_message());
                Self {
                    listener,
                    server,
                    client,
                }
            }
        }
    }

    impl Drop for Pair {
        fn drop(&mut self) {
            // SAFETY: handles were allocated by this library and are no longer used.
            unsafe {
                np_handle_free(self.client);
                np_handle_free(self.server);
                np_handle_free(self.listener);
            }
        }
    }

    #[test]
    fn last_error_is_empty_after_success() {
        isolated();
        let name = CString::new("ffi-resolve").unwrap();
        let mut buf = [0 as std::os::raw::c_char; 256];
        let mut len = 0usize;
        // SAFETY: all pointers are valid for the sizes given.
        let rc = unsafe { np_resolve_name(name.as_ptr(), true, buf.as_mut_ptr(), buf.len(), &mut len) };
        assert_eq!(rc, NpResult::Ok);
        assert_eq!(np_last_error_code(), NpResult::Ok);
        assert!(last_message().is_empty());

        // SAFETY: np_resolve_name NUL-terminated the buffer.
        let resolved = unsafe { CStr::from_ptr(buf.as_ptr()) }.to_str().unwrap();
        assert_eq!(resolved.len(), len);
        assert!(resolved.ends_with("/ffi-resolve"));
    }

    #[test]
    fn resolve_reports_required_length_when_buffer_small() {
        isolated();
        let name = CString::new("ffi-small").unwrap();
        let mut buf = [0 as std::os::raw::c_char; 4];
        let mut len = 0usize;
        // SAFETY: all pointers are valid for the sizes given.
        let rc = unsafe { np_resolve_name(name.as_ptr(), false, buf.as_mut_ptr(), buf.len(), &mut len) };
        assert_eq!(rc, NpResult::Generic);
        assert!(len > 4);
        assert!(last_message().contains("buffer too small"));
    }

    #[test]
    fn null_arguments_are_rejected() {
        // SAFETY: null is an accepted input for these entry points.
        unsafe {
            assert!(np_create(std::ptr::null(), true).is_null());
            assert_eq!(np_last_error_code(), NpResult::Generic);
            assert!(last_message().contains("short_name cannot be null"));

            assert_eq!(np_stop(std::ptr::null_mut()), NpResult::Generic);
            np_handle_free(std::ptr::null_mut());
            np_message_free(std::ptr::null_mut());
        }
    }

    #[test]
    fn open_without_listener_sets_generic_error() {
        isolated();
        let name = CString::new("ffi-nobody").unwrap();
        // SAFETY: `name` is a valid C string.
        let handle = unsafe { np_open(name.as_ptr(), true) };
        assert!(handle.is_null());
        assert_eq!(np_last_error_code(), NpResult::Generic);
        assert!(last_message().contains("failed to open pipe"));
    }

    #[test]
    fn message_round_trip() {
        let pair = Pair::connect("ffi-chat");
        let mut msg = NpMessage::default();
        // SAFETY: handles are live and `msg` is a valid out-pointer.
        unsafe {
            assert_eq!(np_write_message(pair.client, b"hi".as_ptr(), 2), NpResult::Ok);
            assert_eq!(np_read_message(pair.server, NP_INFINITE, &mut msg), NpResult::Ok);
            assert_eq!(std::slice::from_raw_parts(msg.data, msg.len), b"hi");

            assert_eq!(np_write_message(pair.client, std::ptr::null(), 0), NpResult::Ok);
            assert_eq!(np_read_message(pair.server, NP_INFINITE, &mut msg), NpResult::Ok);
            assert!(msg.data.is_null());
            assert_eq!(msg.len, 0);

            np_message_free(&mut msg);
            assert_eq!(np_close(pair.server), NpResult::Ok);
            assert_eq!(np_close(pair.server), NpResult::Ok);
        }
    }

    #[test]
    fn timeout_and_stop_codes_are_distinct() {
        let pair = Pair::connect("ffi-codes");
        let mut buf = [0u8; 8];
        // SAFETY: handles are live and `buf` is writable for its length.
        unsafe {
            assert_eq!(np_read(pair.server, buf.as_mut_ptr(), buf.len(), 20), 0);
            assert_eq!(np_last_error_code(), NpResult::Timeout);

            assert_eq!(np_stop(pair.server), NpResult::Ok);
            assert_eq!(np_read(pair.server, buf.as_mut_ptr(), buf.len(), NP_INFINITE), 0);
            assert_eq!(np_last_error_code(), NpResult::Stopped);
        }
    }

    #[test]
    fn invalid_timeout_is_rejected() {
        let pair = Pair::connect("ffi-neg");
        let mut buf = [0u8; 1];
        // SAFETY: handles are live and `buf` is writable for its length.
        let n = unsafe { np_read(pair.server, buf.as_mut_ptr(), buf.len(), -2) };
        assert_eq!(n, 0);
        assert_eq!(np_last_error_code(), NpResult::Generic);
        assert!(last_message().contains("invalid timeout -2"));
    }

    #[test]
    fn read_exact_checks_length_against_buffer() {
        let pair = Pair::connect("ffi-exact");
        let mut buf = [0u8; 4];
        // SAFETY: handles are live and `buf` is writable for its length.
        unsafe {
            let rc = np_read_exact(pair.server, buf.as_mut_ptr(), buf.len(), 5, NP_INFINITE);
            assert_eq!(rc, NpResult::Generic);
            assert!(last_message().contains("exceeds buffer length"));

            assert_eq!(np_write(pair.client, b"abc".as_ptr(), 3), NpResult::Ok);
            let rc = np_read_exact(pair.server, buf.as_mut_ptr(), buf.len(), 3, 1000);
            assert_eq!(rc, NpResult::Ok);
            assert_eq!(&buf[..3], b"abc");
        }
    }

    #[test]
    fn stop_from_another_thread_unblocks_accept() {
        isolated();
        let name = CString::new("ffi-stop").unwrap();
        // SAFETY: `name` is a valid C string.
        let listener = unsafe { np_create(name.as_ptr(), true) };
        assert!(!listener.is_null());

        let raw = listener as usize;
        let stopper = thread::spawn(move || {
            thread::sleep(Duration::from_millis(50));
            // SAFETY: the listener outlives this thread; it is joined before free.
            unsafe { np_stop(raw as NpHandle) }
        });

        // SAFETY: the listener is live.
        let conn = unsafe { np_accept(listener, NP_INFINITE) };
        assert!(conn.is_null());
        assert_eq!(np_last_error_code(), NpResult::Stopped);
        assert_eq!(stopper.join().unwrap(), NpResult::Ok);

        // SAFETY: no other thread uses the listener any more.
        unsafe {
            assert_eq!(np_close(listener), NpResult::Ok);
            assert_eq!(np_stop(listener), NpResult::Generic);
            assert!(last_message().contains("closed"));
            np_handle_free(listener);
        }
    }
}
