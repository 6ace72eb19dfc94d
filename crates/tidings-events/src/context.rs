//! Execution contexts captured by subscriptions.
//!
//! An execution context is anything that can run work "on" some owning
//! thread or runtime. A thread declares the context it belongs to with
//! [`enter`]; subscriptions made on that thread capture it and the
//! [`DispatchPolicy::Current`](crate::DispatchPolicy::Current) policy hands
//! callbacks back to it.

use std::cell::RefCell;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use futures::future::BoxFuture;

/// A unit of synchronous work handed to an execution context.
pub type Job = Box<dyn FnOnce() + Send + 'static>;

/// Something that can run jobs and futures on an owning thread or runtime.
pub trait ExecutionContext: Send + Sync + fmt::Debug {
    /// Queue a job. Returns without waiting for it to run.
    fn post(&self, job: Job);

    /// Drive a future to completion on this context. Returns without
    /// waiting for it to finish.
    fn spawn(&self, future: BoxFuture<'static, ()>);

    /// Optional name for debugging.
    #[allow(clippy::unnecessary_literal_bound)]
    fn name(&self) -> &str {
        "anonymous"
    }
}

thread_local! {
    static CURRENT: RefCell<Option<Arc<dyn ExecutionContext>>> = const { RefCell::new(None) };
}

/// The context installed on the calling thread, if any.
#[must_use]
pub fn current() -> Option<Arc<dyn ExecutionContext>> {
    CURRENT.with(|slot| slot.borrow().clone())
}

/// Install `context` as the calling thread's current context until the
/// returned guard is dropped. Nested calls restore the outer context.
pub fn enter(context: Arc<dyn ExecutionContext>) -> ContextGuard {
    let previous = CURRENT.with(|slot| slot.replace(Some(context)));
    ContextGuard {
        previous,
        _not_send: PhantomData,
    }
}

/// Whether `context` is the one installed on the calling thread.
#[must_use]
pub fn is_entered(context: &Arc<dyn ExecutionContext>) -> bool {
    CURRENT.with(|slot| {
        slot.borrow()
            .as_ref()
            .is_some_and(|installed| Arc::ptr_eq(installed, context))
    })
}

/// Restores the previously installed context on drop.
#[derive(Debug)]
#[must_use = "the context is uninstalled when the guard is dropped"]
pub struct ContextGuard {
    previous: Option<Arc<dyn ExecutionContext>>,
    _not_send: PhantomData<*const ()>,
}

impl Drop for ContextGuard {
    fn drop(&mut self) {
        let previous = self.previous.take();
        CURRENT.with(|slot| *slot.borrow_mut() = previous);
    }
}

/// Execution context backed by a tokio runtime handle.
///
/// Jobs run on the runtime's blocking pool and futures on its workers.
#[derive(Debug, Clone)]
pub struct RuntimeContext {
    handle: tokio::runtime::Handle,
}

impl RuntimeContext {
    /// Wrap an existing runtime handle.
    #[must_use]
    pub fn new(handle: tokio::runtime::Handle) -> Self {
        Self { handle }
    }

    /// Wrap the runtime the caller is running on, if any.
    #[must_use]
    pub fn try_current() -> Option<Self> {
        tokio::runtime::Handle::try_current().ok().map(Self::new)
    }

    /// The wrapped handle.
    #[must_use]
    pub fn handle(&self) -> &tokio::runtime::Handle {
        &self.handle
    }
}

impl ExecutionContext for RuntimeContext {
    fn post(&self, job: Job) {
        drop(self.handle.spawn_blocking(job));
    }

    fn spawn(&self, future: BoxFuture<'static, ()>) {
        drop(self.handle.spawn(future));
    }

    fn name(&self) -> &str {
        "tokio-runtime"
    }
}
