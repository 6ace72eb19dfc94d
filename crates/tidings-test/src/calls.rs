//! Callback recorders.

use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, ThreadId};

/// One recorded callback invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Call {
    /// Label passed to [`CallLog::record`].
    pub label: String,
    /// Thread the callback ran on.
    pub thread: ThreadId,
    /// Name of that thread, if it has one.
    pub thread_name: Option<String>,
}

/// Thread-safe, cloneable log of callback invocations.
///
/// Clones share the same log, so a clone can be moved into a callback
/// while the test keeps its own handle for assertions.
#[derive(Debug, Clone, Default)]
pub struct CallLog {
    calls: Arc<Mutex<Vec<Call>>>,
}

impl CallLog {
    /// Create an empty log.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an invocation from the calling thread.
    pub fn record(&self, label: impl Into<String>) {
        let current = thread::current();
        let call = Call {
            label: label.into(),
            thread: current.id(),
            thread_name: current.name().map(str::to_owned),
        };
        self.lock().push(call);
    }

    /// All recorded calls in order.
    #[must_use]
    pub fn calls(&self) -> Vec<Call> {
        self.lock().clone()
    }

    /// Recorded labels in order.
    #[must_use]
    pub fn labels(&self) -> Vec<String> {
        self.lock().iter().map(|call| call.label.clone()).collect()
    }

    /// Threads the recorded calls ran on, in order.
    #[must_use]
    pub fn threads(&self) -> Vec<ThreadId> {
        self.lock().iter().map(|call| call.thread).collect()
    }

    /// Thread names of the recorded calls, in order.
    #[must_use]
    pub fn thread_names(&self) -> Vec<Option<String>> {
        self.lock()
            .iter()
            .map(|call| call.thread_name.clone())
            .collect()
    }

    /// Number of recorded calls.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Whether nothing has been recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Forget every recorded call.
    pub fn clear(&self) {
        self.lock().clear();
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<Call>> {
        self.calls.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
