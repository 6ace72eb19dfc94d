//! Shared payloads and helpers for integration tests.

use std::time::Duration;

use tidings_events::{DispatchLoop, EventManager, ManagerOptions};

/// How long to wait for work that runs on another thread.
#[allow(dead_code)]
pub const WAIT: Duration = Duration::from_secs(5);

/// Payload used by most scenarios.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderPlaced {
    /// Order number.
    pub id: u64,
}

/// Second payload type, for per-type isolation checks.
#[derive(Debug, Clone, PartialEq, Eq)]
#[allow(dead_code)]
pub struct StockChanged {
    /// Item the change applies to.
    pub sku: String,
    /// Signed quantity delta.
    pub delta: i64,
}

/// Manager with a small named worker pool.
#[allow(dead_code)]
pub fn manager() -> EventManager {
    tidings_test::init_test_logging();
    EventManager::with_options(
        ManagerOptions::default()
            .with_worker_threads(2)
            .with_worker_thread_name("it-worker"),
    )
}

/// A dispatch loop standing in for an application's owning thread.
#[allow(dead_code)]
pub fn owning_thread(name: &str) -> DispatchLoop {
    DispatchLoop::spawn(name).unwrap()
}
