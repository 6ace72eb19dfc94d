//! Background worker pool for detached dispatch.

use std::sync::OnceLock;

use futures::future::BoxFuture;
use tokio::runtime::{Builder, Runtime};
use tracing::{debug, error, warn};

use crate::context::{ExecutionContext, Job};

/// Default number of worker threads in the pool.
pub const DEFAULT_WORKER_THREADS: usize = 4;

/// Default name given to pool threads.
pub const DEFAULT_WORKER_THREAD_NAME: &str = "tidings-worker";

/// Worker pool sizing and naming.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolOptions {
    /// Number of async worker threads. Clamped to at least one.
    pub worker_threads: usize,
    /// Name given to every pool thread.
    pub thread_name: String,
}

impl Default for PoolOptions {
    fn default() -> Self {
        Self {
            worker_threads: DEFAULT_WORKER_THREADS,
            thread_name: DEFAULT_WORKER_THREAD_NAME.to_owned(),
        }
    }
}

/// Pool that runs detached subscriber callbacks.
///
/// The backing runtime is built on first use. If it cannot be built, every
/// job falls back to a dedicated OS thread.
pub struct WorkerPool {
    options: PoolOptions,
    runtime: OnceLock<Option<Runtime>>,
}

impl std::fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerPool")
            .field("options", &self.options)
            .field("started", &self.is_started())
            .finish()
    }
}

impl WorkerPool {
    /// Create a pool. No threads are started until the first job arrives.
    #[must_use]
    pub fn new(options: PoolOptions) -> Self {
        Self {
            options,
            runtime: OnceLock::new(),
        }
    }

    /// The options this pool was created with.
    #[must_use]
    pub fn options(&self) -> &PoolOptions {
        &self.options
    }

    /// Whether the backing runtime has been built.
    #[must_use]
    pub fn is_started(&self) -> bool {
        matches!(self.runtime.get(), Some(Some(_)))
    }

    /// Run a synchronous job on the pool.
    pub fn execute(&self, job: Job) {
        match self.runtime() {
            Some(runtime) => drop(runtime.spawn_blocking(job)),
            None => self.spawn_thread(job),
        }
    }

    /// Drive a future on the pool.
    pub fn spawn_future(&self, future: BoxFuture<'static, ()>) {
        match self.runtime() {
            Some(runtime) => drop(runtime.spawn(future)),
            None => self.spawn_thread(Box::new(move || futures::executor::block_on(future))),
        }
    }

    fn runtime(&self) -> Option<&Runtime> {
        self.runtime
            .get_or_init(|| {
                let workers = self.options.worker_threads.max(1);
                match Builder::new_multi_thread()
                    .worker_threads(workers)
                    .thread_name(self.options.thread_name.clone())
                    .enable_all()
                    .build()
                {
                    Ok(runtime) => {
                        debug!(workers, name = %self.options.thread_name, "Worker pool started");
                        Some(runtime)
                    },
                    Err(e) => {
                        error!(error = %e, "Failed to start worker pool, using dedicated threads");
                        None
                    },
                }
            })
            .as_ref()
    }

    fn spawn_thread(&self, job: Job) {
        let spawned = std::thread::Builder::new()
            .name(self.options.thread_name.clone())
            .spawn(job);
        if let Err(e) = spawned {
            warn!(error = %e, "Failed to spawn worker thread, job dropped");
        }
    }
}

impl Default for WorkerPool {
    fn default() -> Self {
        Self::new(PoolOptions::default())
    }
}

impl ExecutionContext for WorkerPool {
    fn post(&self, job: Job) {
        self.execute(job);
    }

    fn spawn(&self, future: BoxFuture<'static, ()>) {
        self.spawn_future(future);
    }

    fn name(&self) -> &str {
        &self.options.thread_name
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        // A plain runtime drop panics when it happens inside async code.
        if let Some(Some(runtime)) = self.runtime.take() {
            runtime.shutdown_background();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_pool_is_lazy() {
        let pool = WorkerPool::default();
        assert!(!pool.is_started());
        assert_eq!(pool.options().worker_threads, DEFAULT_WORKER_THREADS);
    }

    #[test]
    fn test_execute_runs_on_named_thread() {
        let pool = WorkerPool::new(PoolOptions {
            worker_threads: 1,
            thread_name: "pool-test".to_owned(),
        });
        let (tx, rx) = std::sync::mpsc::channel();
        pool.execute(Box::new(move || {
            let name = std::thread::current().name().map(str::to_owned);
            tx.send(name).unwrap();
        }));

        let name = rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert_eq!(name.as_deref(), Some("pool-test"));
        assert!(pool.is_started());
    }

    #[test]
    fn test_spawn_future() {
        let pool = WorkerPool::default();
        let (tx, rx) = std::sync::mpsc::channel();
        pool.spawn_future(Box::pin(async move {
            tokio::task::yield_now().await;
            tx.send(42).unwrap();
        }));
        assert_eq!(rx.recv_timeout(Duration::from_secs(5)).unwrap(), 42);
    }

    #[tokio::test]
    async fn test_drop_inside_async_context() {
        let pool = WorkerPool::default();
        pool.execute(Box::new(|| {}));
        drop(pool);
    }
}
