//! In-memory `PipeIo` for framing tests.

use std::collections::VecDeque;
use std::sync::Mutex;

use npipe_transport::{PipeError, PipeIo, Timeout};

/// Serves reads from a fixed script and records writes.
///
/// A read that the script cannot satisfy times out without consuming input.
#[derive(Default)]
pub(crate) struct ScriptedPipe {
    input: Mutex<VecDeque<u8>>,
    writes: Mutex<Vec<Vec<u8>>>,
    read_timeouts: Mutex<Vec<Timeout>>,
}

impl ScriptedPipe {
    pub(crate) fn with_input(bytes: &[u8]) -> Self {
        Self {
            input: Mutex::new(bytes.iter().copied().collect()),
            ..Self::default()
        }
    }

    pub(crate) fn remaining(&self) -> Vec<u8> {
        self.input.lock().unwrap().iter().copied().collect()
    }

    pub(crate) fn writes(&self) -> Vec<Vec<u8>> {
        self.writes.lock().unwrap().clone()
    }

    pub(crate) fn read_timeouts(&self) -> Vec<Timeout> {
        self.read_timeouts.lock().unwrap().clone()
    }
}

impl PipeIo for ScriptedPipe {
    fn read_exact(&self, buf: &mut [u8], timeout: Timeout) -> npipe_transport::Result<()> {
        self.read_timeouts.lock().unwrap().push(timeout);
        let mut input = self.input.lock().unwrap();
        if input.len() < buf.len() {
            return Err(PipeError::TimedOut(timeout));
        }
        for slot in buf.iter_mut() {
            *slot = input.pop_front().unwrap();
        }
        Ok(())
    }

    fn write(&self, buf: &[u8]) -> npipe_transport::Result<()> {
        self.writes.lock().unwrap().push(buf.to_vec());
        Ok(())
    }
}
