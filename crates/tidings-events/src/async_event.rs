//! Asynchronous event bus.

use std::fmt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use futures::FutureExt;
use futures::future::BoxFuture;
use tokio::sync::oneshot;
use tracing::{Instrument, debug, trace, warn};

use crate::channel::{Channels, Entry};
use crate::error::{EventResult, validate_channel};
use crate::event::{DEFAULT_CHANNEL, Filter};
use crate::panic::panic_message;
use crate::policy::DispatchPolicy;
use crate::pool::WorkerPool;
use crate::subscription::Subscription;

type AsyncCallback<T> = Arc<dyn Fn(Arc<T>) -> BoxFuture<'static, ()> + Send + Sync>;

pub(crate) struct AsyncHandler<T> {
    callback: AsyncCallback<T>,
    filter: Option<Filter<T>>,
}

struct Inner<T> {
    channels: Channels<AsyncHandler<T>>,
    pool: Arc<WorkerPool>,
    default_channel: String,
    failures: Arc<AtomicU64>,
}

/// Publish/subscribe bus for payloads of type `T` whose callbacks return
/// futures.
///
/// `publish` awaits `Current` and `PublishThread` subscribers one after
/// another, newest first, and only spawns `NewThread` subscribers.
pub struct AsyncEvent<T> {
    inner: Arc<Inner<T>>,
}

impl<T> Clone for AsyncEvent<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: Send + Sync + 'static> AsyncEvent<T> {
    /// Create a standalone bus with its own worker pool.
    #[must_use]
    pub fn new() -> Self {
        Self::with_parts(Arc::new(WorkerPool::default()), DEFAULT_CHANNEL.to_owned())
    }

    pub(crate) fn with_parts(pool: Arc<WorkerPool>, default_channel: String) -> Self {
        Self {
            inner: Arc::new(Inner {
                channels: Channels::new(),
                pool,
                default_channel,
                failures: Arc::new(AtomicU64::new(0)),
            }),
        }
    }

    /// Publish to the default channel.
    pub async fn publish(&self, payload: T) {
        self.dispatch(&self.inner.default_channel, payload).await;
    }

    /// Publish to a named channel.
    ///
    /// # Errors
    ///
    /// Returns [`EventError::InvalidChannel`](crate::EventError::InvalidChannel)
    /// if `channel` is empty.
    pub async fn publish_to(&self, channel: &str, payload: T) -> EventResult<()> {
        validate_channel(channel)?;
        self.dispatch(channel, payload).await;
        Ok(())
    }

    /// Subscribe to the default channel.
    pub fn subscribe<F, Fut>(&self, policy: DispatchPolicy, callback: F) -> Subscription
    where
        F: Fn(Arc<T>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.inner.channels.register(
            &self.inner.default_channel,
            policy,
            AsyncHandler::new(callback, None),
        )
    }

    /// Subscribe to a named channel.
    ///
    /// # Errors
    ///
    /// Returns [`EventError::InvalidChannel`](crate::EventError::InvalidChannel)
    /// if `channel` is empty.
    pub fn subscribe_to<F, Fut>(
        &self,
        channel: &str,
        policy: DispatchPolicy,
        callback: F,
    ) -> EventResult<Subscription>
    where
        F: Fn(Arc<T>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        validate_channel(channel)?;
        Ok(self
            .inner
            .channels
            .register(channel, policy, AsyncHandler::new(callback, None)))
    }

    /// Subscribe to a named channel, receiving only payloads `filter`
    /// accepts.
    ///
    /// # Errors
    ///
    /// Returns [`EventError::InvalidChannel`](crate::EventError::InvalidChannel)
    /// if `channel` is empty.
    pub fn subscribe_filtered<P, F, Fut>(
        &self,
        channel: &str,
        policy: DispatchPolicy,
        filter: P,
        callback: F,
    ) -> EventResult<Subscription>
    where
        P: Fn(&T) -> bool + Send + Sync + 'static,
        F: Fn(Arc<T>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        validate_channel(channel)?;
        let filter: Filter<T> = Arc::new(filter);
        Ok(self.inner.channels.register(
            channel,
            policy,
            AsyncHandler::new(callback, Some(filter)),
        ))
    }

    async fn dispatch(&self, channel: &str, payload: T) {
        let list = self.inner.channels.get_or_create(channel);
        trace!(channel, subscribers = list.len(), "Publishing event");

        let payload = Arc::new(payload);
        for entry in list.newest_first() {
            let failures = Arc::clone(&self.inner.failures);
            match entry.policy {
                DispatchPolicy::PublishThread => {
                    run_guarded(entry, Arc::clone(&payload), failures).await;
                },
                DispatchPolicy::Current => match entry.foreign_context().map(Arc::clone) {
                    Some(context) => {
                        let (done_tx, done_rx) = oneshot::channel();
                        let run = run_guarded(entry, Arc::clone(&payload), failures);
                        context.spawn(Box::pin(async move {
                            run.await;
                            let _ = done_tx.send(());
                        }));
                        if done_rx.await.is_err() {
                            debug!(
                                context = context.name(),
                                "Execution context dropped subscriber before it completed"
                            );
                        }
                    },
                    None => run_guarded(entry, Arc::clone(&payload), failures).await,
                },
                DispatchPolicy::NewThread => {
                    let run = run_guarded(entry, Arc::clone(&payload), failures);
                    self.inner.pool.spawn_future(Box::pin(run));
                },
            }
        }
    }

    /// Channel used by [`publish`](Self::publish) and
    /// [`subscribe`](Self::subscribe).
    #[must_use]
    pub fn default_channel(&self) -> &str {
        &self.inner.default_channel
    }

    /// Number of live subscribers on `channel`.
    #[must_use]
    pub fn subscriber_count(&self, channel: &str) -> usize {
        self.inner.channels.subscriber_count(channel)
    }

    /// Total live subscribers across all channels.
    #[must_use]
    pub fn total_subscribers(&self) -> usize {
        self.inner.channels.total()
    }

    /// Names of all channels created so far.
    #[must_use]
    pub fn channels(&self) -> Vec<String> {
        self.inner.channels.names()
    }

    /// Remove every subscriber. Outstanding handles become no-ops.
    pub fn clear(&self) {
        self.inner.channels.clear();
    }

    /// Number of subscriber futures that panicked so far.
    #[must_use]
    pub fn failure_count(&self) -> u64 {
        self.inner.failures.load(Ordering::Relaxed)
    }

    /// Whether both handles refer to the same bus.
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl<T> AsyncHandler<T> {
    fn new<F, Fut>(callback: F, filter: Option<Filter<T>>) -> Self
    where
        F: Fn(Arc<T>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        Self {
            callback: Arc::new(move |payload| callback(payload).boxed()),
            filter,
        }
    }
}

impl<T: Send + Sync + 'static> Default for AsyncEvent<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for AsyncEvent<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AsyncEvent")
            .field("payload", &std::any::type_name::<T>())
            .field("default_channel", &self.inner.default_channel)
            .field("failures", &self.inner.failures.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

/// Run one subscriber future inside its captured span, containing panics
/// raised while building or polling it.
async fn run_guarded<T: Send + Sync + 'static>(
    entry: Arc<Entry<AsyncHandler<T>>>,
    payload: Arc<T>,
    failures: Arc<AtomicU64>,
) {
    let span = entry.span.clone();
    let outcome = AssertUnwindSafe(async {
        let handler = &entry.handler;
        if handler.filter.as_ref().is_none_or(|filter| filter(&*payload)) {
            trace!(subscription_id = %entry.id, policy = %entry.policy, "Delivering event");
            (handler.callback)(Arc::clone(&payload)).await;
        }
    })
    .catch_unwind()
    .instrument(span)
    .await;

    if let Err(panic) = outcome {
        failures.fetch_add(1, Ordering::Relaxed);
        warn!(
            subscription_id = %entry.id,
            channel = %entry.channel,
            policy = %entry.policy,
            panic = %panic_message(&*panic),
            "Subscriber panicked"
        );
    }
}
