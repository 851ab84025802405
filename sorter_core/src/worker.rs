//! Named worker threads for the line.
//!
//! Each `Worker` owns exactly one thread. Dropping it requests a line-wide
//! shutdown and joins the thread, so no worker outlives the line. A worker
//! that fails also requests shutdown, stopping its peers.

use std::sync::Arc;
use std::thread::JoinHandle;

use crate::error::{Result, SorterError};
use crate::line::LineState;

pub struct Worker {
    name: &'static str,
    state: Arc<LineState>,
    join_handle: Option<JoinHandle<Result<()>>>,
}

impl Worker {
    pub fn spawn<F>(name: &'static str, state: Arc<LineState>, body: F) -> Result<Self>
    where
        F: FnOnce() -> Result<()> + Send + 'static,
    {
        let on_exit = Arc::clone(&state);
        let join_handle = std::thread::Builder::new()
            .name(name.to_owned())
            .spawn(move || {
                let res = body();
                match &res {
                    Ok(()) => tracing::debug!(worker = name, "worker finished"),
                    Err(e) => {
                        tracing::error!(worker = name, error = %e, "worker failed; stopping line");
                        on_exit.request_shutdown();
                    }
                }
                res
            })
            .map_err(|e| eyre::Report::new(SorterError::Io(e.to_string())))?;
        tracing::debug!(worker = name, "worker started");
        Ok(Self {
            name,
            state,
            join_handle: Some(join_handle),
        })
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn is_finished(&self) -> bool {
        self.join_handle
            .as_ref()
            .is_none_or(JoinHandle::is_finished)
    }

    /// Request shutdown and wait for the thread, returning its result.
    pub fn join(mut self) -> Result<()> {
        self.state.request_shutdown();
        self.take_result()
    }

    fn take_result(&mut self) -> Result<()> {
        match self.join_handle.take() {
            None => Ok(()),
            Some(h) => h.join().map_err(|_| {
                eyre::Report::new(SorterError::State(format!("{} worker panicked", self.name)))
            })?,
        }
    }
}

impl Drop for Worker {
    fn drop(&mut self) {
        self.state.request_shutdown();
        if let Err(e) = self.take_result() {
            tracing::warn!(worker = self.name, error = %e, "worker ended with error during shutdown");
        } else {
            tracing::trace!(worker = self.name, "worker joined");
        }
    }
}
