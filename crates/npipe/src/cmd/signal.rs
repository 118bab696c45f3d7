use std::sync::{Arc, Mutex, PoisonError, Weak};

use npipe_transport::{PipeError, PipeHandle};

use crate::exit::{CliError, CliResult, INTERNAL};

/// Stops every watched pipe when the process receives Ctrl-C.
///
/// Blocked accepts and reads then return `Stopped`, so commands unwind
/// through their normal close path instead of being killed mid-wait.
#[derive(Clone, Default)]
pub struct StopOnInterrupt {
    handles: Arc<Mutex<Vec<Weak<PipeHandle>>>>,
}

impl StopOnInterrupt {
    pub fn install() -> CliResult<Self> {
        let this = Self::default();
        let handler = this.clone();
        ctrlc::set_handler(move || handler.stop_all()).map_err(|err| {
            CliError::new(INTERNAL, format!("signal handler setup failed: {err}"))
        })?;
        Ok(this)
    }

    pub fn watch(&self, handle: &Arc<PipeHandle>) {
        let mut handles = self.handles.lock().unwrap_or_else(PoisonError::into_inner);
        handles.retain(|weak| weak.strong_count() > 0);
        handles.push(Arc::downgrade(handle));
    }

    fn stop_all(&self) {
        let handles = self.handles.lock().unwrap_or_else(PoisonError::into_inner);
        for handle in handles.iter().filter_map(Weak::upgrade) {
            tracing::info!(pipe = %handle.name(), "interrupted, stopping pipe");
            match handle.stop() {
                Ok(()) | Err(PipeError::Closed) => {}
                Err(err) => tracing::warn!(error = %err, "failed to stop pipe"),
            }
        }
    }
}
