//! Background worker threads

use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};

use tracing::{Span, debug, warn};

/// Running flag handed to the worker body
#[derive(Debug, Clone)]
pub struct WorkerFlag(Arc<AtomicBool>);

impl WorkerFlag {
    /// Whether the worker should keep looping
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// Owned OS thread with a stop flag
///
/// `stop` (or drop) clears the flag and joins. The body must poll
/// `WorkerFlag::is_running` at least once per blocking wait.
#[derive(Debug)]
pub struct WorkerHandle {
    name: &'static str,
    running: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl WorkerHandle {
    /// Spawn `body` on a named thread that runs inside `span`
    ///
    /// # Errors
    ///
    /// Returns the OS error if the thread cannot be created.
    pub fn spawn<F>(name: &'static str, span: Span, body: F) -> io::Result<Self>
    where
        F: FnOnce(WorkerFlag) + Send + 'static,
    {
        let running = Arc::new(AtomicBool::new(true));
        let flag = WorkerFlag(Arc::clone(&running));

        let thread = thread::Builder::new()
            .name(format!("raop-{name}"))
            .spawn(move || {
                let _enter = span.enter();
                debug!(worker = name, "worker started");
                body(flag);
                debug!(worker = name, "worker exited");
            })?;

        Ok(Self {
            name,
            running,
            thread: Some(thread),
        })
    }

    /// Whether the thread has not been stopped
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire) && self.thread.is_some()
    }

    /// Clear the flag and join
    pub fn stop(&mut self) {
        self.running.store(false, Ordering::Release);
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                warn!(worker = self.name, "worker panicked");
            }
        }
    }
}

impl Drop for WorkerHandle {
    fn drop(&mut self) {
        self.stop();
    }
}
