//! Dedicated single-thread execution context.
//!
//! A [`DispatchLoop`] owns one thread running a current-thread tokio
//! runtime. Jobs posted to it run in order on that thread and futures
//! spawned on it are driven there too, which makes it the owning context
//! for subscribers that want their callbacks serialized on one thread.

use std::sync::Arc;
use std::thread::{JoinHandle, ThreadId};

use futures::future::BoxFuture;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};

use crate::context::{self, ExecutionContext, Job};
use crate::error::{EventError, EventResult};
use crate::panic::panic_message;

enum Work {
    Job(Job),
    Future(BoxFuture<'static, ()>),
    Shutdown,
}

#[derive(Debug)]
struct LoopContext {
    name: String,
    sender: mpsc::UnboundedSender<Work>,
}

impl LoopContext {
    fn send(&self, work: Work) -> bool {
        if self.sender.send(work).is_err() {
            debug!(context = %self.name, "Dispatch loop closed, work dropped");
            return false;
        }
        true
    }
}

impl ExecutionContext for LoopContext {
    fn post(&self, job: Job) {
        self.send(Work::Job(job));
    }

    fn spawn(&self, future: BoxFuture<'static, ()>) {
        self.send(Work::Future(future));
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// A thread that acts as an owning execution context.
///
/// The loop thread has its own context installed, so subscriptions made
/// from code running on it (see [`DispatchLoop::run`]) capture the loop.
/// Dropping the handle stops the loop and joins its thread.
#[derive(Debug)]
pub struct DispatchLoop {
    context: Arc<LoopContext>,
    thread_id: ThreadId,
    thread: Option<JoinHandle<()>>,
}

impl DispatchLoop {
    /// Start a loop on a new thread named `name`.
    ///
    /// # Errors
    ///
    /// Returns [`EventError::LoopStart`] if the runtime or thread cannot be
    /// created.
    pub fn spawn(name: impl Into<String>) -> EventResult<Self> {
        let name = name.into();
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;
        let (sender, mut receiver) = mpsc::unbounded_channel();
        let context = Arc::new(LoopContext {
            name: name.clone(),
            sender,
        });

        let installed: Arc<dyn ExecutionContext> =
            Arc::clone(&context) as Arc<dyn ExecutionContext>;
        let thread = std::thread::Builder::new()
            .name(name.clone())
            .spawn(move || {
                let _entered = context::enter(installed);
                runtime.block_on(async move {
                    while let Some(work) = receiver.recv().await {
                        match work {
                            Work::Job(job) => run_job(job),
                            Work::Future(future) => drop(tokio::spawn(future)),
                            Work::Shutdown => break,
                        }
                    }
                });
            })?;

        debug!(context = %name, "Dispatch loop started");
        Ok(Self {
            context,
            thread_id: thread.thread().id(),
            thread: Some(thread),
        })
    }

    /// The loop as a shareable execution context.
    #[must_use]
    pub fn context(&self) -> Arc<dyn ExecutionContext> {
        Arc::clone(&self.context) as Arc<dyn ExecutionContext>
    }

    /// Name of the loop thread.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.context.name
    }

    /// Id of the loop thread.
    #[must_use]
    pub fn thread_id(&self) -> ThreadId {
        self.thread_id
    }

    /// Whether the caller is running on the loop thread.
    #[must_use]
    pub fn is_loop_thread(&self) -> bool {
        std::thread::current().id() == self.thread_id
    }

    /// Run `f` on the loop thread and block until it returns.
    ///
    /// Runs inline when already called from the loop thread.
    ///
    /// # Errors
    ///
    /// Returns [`EventError::ContextClosed`] if the loop has stopped or `f`
    /// panicked.
    pub fn run<F, R>(&self, f: F) -> EventResult<R>
    where
        F: FnOnce() -> R + Send + 'static,
        R: Send + 'static,
    {
        if self.is_loop_thread() {
            return Ok(f());
        }
        let (tx, rx) = std::sync::mpsc::sync_channel(1);
        self.post_reply(f, move |value| {
            let _ = tx.send(value);
        })?;
        rx.recv().map_err(|_| self.closed())
    }

    /// Run `f` on the loop thread and await its result.
    ///
    /// # Errors
    ///
    /// Returns [`EventError::ContextClosed`] if the loop has stopped or `f`
    /// panicked.
    pub async fn call<F, R>(&self, f: F) -> EventResult<R>
    where
        F: FnOnce() -> R + Send + 'static,
        R: Send + 'static,
    {
        let (tx, rx) = oneshot::channel();
        self.post_reply(f, move |value| {
            let _ = tx.send(value);
        })?;
        rx.await.map_err(|_| self.closed())
    }

    fn post_reply<F, R, S>(&self, f: F, reply: S) -> EventResult<()>
    where
        F: FnOnce() -> R + Send + 'static,
        S: FnOnce(R) + Send + 'static,
    {
        let job: Job = Box::new(move || reply(f()));
        if self.context.send(Work::Job(job)) {
            Ok(())
        } else {
            Err(self.closed())
        }
    }

    fn closed(&self) -> EventError {
        EventError::ContextClosed(self.context.name.clone())
    }
}

impl Drop for DispatchLoop {
    fn drop(&mut self) {
        self.context.send(Work::Shutdown);
        let Some(thread) = self.thread.take() else {
            return;
        };
        if self.is_loop_thread() {
            return;
        }
        if thread.join().is_err() {
            warn!(context = %self.context.name, "Dispatch loop thread panicked");
        } else {
            debug!(context = %self.context.name, "Dispatch loop stopped");
        }
    }
}

fn run_job(job: Job) {
    if let Err(panic) = std::panic::catch_unwind(std::panic::AssertUnwindSafe(job)) {
        warn!(panic = %panic_message(&*panic), "Job panicked on dispatch loop");
    }
}
