//! Polling helpers for assertions on work finishing elsewhere.

use std::time::{Duration, Instant};

/// Interval between condition checks.
pub const POLL_INTERVAL: Duration = Duration::from_millis(5);

/// Block until `condition` holds or `timeout` elapses.
///
/// Returns whether the condition was met.
pub fn wait_for(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now().checked_add(timeout);
    loop {
        if condition() {
            return true;
        }
        if deadline.is_some_and(|deadline| Instant::now() >= deadline) {
            return false;
        }
        std::thread::sleep(POLL_INTERVAL);
    }
}

/// Async variant of [`wait_for`] that yields to the runtime between checks.
pub async fn wait_for_async(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now().checked_add(timeout);
    loop {
        if condition() {
            return true;
        }
        if deadline.is_some_and(|deadline| Instant::now() >= deadline) {
            return false;
        }
        tokio::time::sleep(POLL_INTERVAL).await;
    }
}
