//! Synchronous event bus.

use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tracing::{trace, warn};

use crate::channel::{Channels, Entry};
use crate::error::{EventResult, validate_channel};
use crate::panic::panic_message;
use crate::policy::DispatchPolicy;
use crate::pool::WorkerPool;
use crate::subscription::Subscription;

/// Name of the channel used when none is given.
pub const DEFAULT_CHANNEL: &str = "default";

pub(crate) type Filter<T> = Arc<dyn Fn(&T) -> bool + Send + Sync>;
type Callback<T> = Arc<dyn Fn(&T) + Send + Sync>;

pub(crate) struct SyncHandler<T> {
    callback: Callback<T>,
    filter: Option<Filter<T>>,
}

impl<T> SyncHandler<T> {
    fn accepts(&self, payload: &T) -> bool {
        self.filter.as_ref().is_none_or(|filter| filter(payload))
    }
}

struct Inner<T> {
    channels: Channels<SyncHandler<T>>,
    pool: Arc<WorkerPool>,
    default_channel: String,
    failures: Arc<AtomicU64>,
}

/// Publish/subscribe bus for payloads of type `T` with synchronous
/// callbacks.
///
/// Cloning is cheap and clones share the same channels.
///
/// Within one publish, subscribers of the channel are invoked from the
/// most recently registered to the oldest.
pub struct Event<T> {
    inner: Arc<Inner<T>>,
}

impl<T> Clone for Event<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: Send + Sync + 'static> Event<T> {
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
    pub fn publish(&self, payload: T) {
        self.dispatch(&self.inner.default_channel, payload);
    }

    /// Publish to a named channel.
    ///
    /// Publishing to a channel without subscribers does nothing.
    ///
    /// # Errors
    ///
    /// Returns [`EventError::InvalidChannel`](crate::EventError::InvalidChannel)
    /// if `channel` is empty.
    pub fn publish_to(&self, channel: &str, payload: T) -> EventResult<()> {
        validate_channel(channel)?;
        self.dispatch(channel, payload);
        Ok(())
    }

    /// Subscribe to the default channel.
    pub fn subscribe<F>(&self, policy: DispatchPolicy, callback: F) -> Subscription
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        self.inner.channels.register(
            &self.inner.default_channel,
            policy,
            SyncHandler {
                callback: Arc::new(callback),
                filter: None,
            },
        )
    }

    /// Subscribe to a named channel.
    ///
    /// # Errors
    ///
    /// Returns [`EventError::InvalidChannel`](crate::EventError::InvalidChannel)
    /// if `channel` is empty.
    pub fn subscribe_to<F>(
        &self,
        channel: &str,
        policy: DispatchPolicy,
        callback: F,
    ) -> EventResult<Subscription>
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        validate_channel(channel)?;
        Ok(self.inner.channels.register(
            channel,
            policy,
            SyncHandler {
                callback: Arc::new(callback),
                filter: None,
            },
        ))
    }

    /// Subscribe to a named channel, receiving only payloads `filter`
    /// accepts. The filter runs wherever the callback runs.
    ///
    /// # Errors
    ///
    /// Returns [`EventError::InvalidChannel`](crate::EventError::InvalidChannel)
    /// if `channel` is empty.
    pub fn subscribe_filtered<P, F>(
        &self,
        channel: &str,
        policy: DispatchPolicy,
        filter: P,
        callback: F,
    ) -> EventResult<Subscription>
    where
        P: Fn(&T) -> bool + Send + Sync + 'static,
        F: Fn(&T) + Send + Sync + 'static,
    {
        validate_channel(channel)?;
        Ok(self.inner.channels.register(
            channel,
            policy,
            SyncHandler {
                callback: Arc::new(callback),
                filter: Some(Arc::new(filter)),
            },
        ))
    }

    fn dispatch(&self, channel: &str, payload: T) {
        let list = self.inner.channels.get_or_create(channel);
        trace!(channel, subscribers = list.len(), "Publishing event");

        let payload = Arc::new(payload);
        for entry in list.newest_first() {
            self.deliver(entry, &payload);
        }
    }

    fn deliver(&self, entry: Arc<Entry<SyncHandler<T>>>, payload: &Arc<T>) {
        match entry.policy {
            DispatchPolicy::PublishThread => invoke(&entry, payload, &self.inner.failures),
            DispatchPolicy::Current => match entry.foreign_context() {
                Some(context) => {
                    let context = Arc::clone(context);
                    context.post(self.job(entry, payload));
                },
                None => invoke(&entry, payload, &self.inner.failures),
            },
            DispatchPolicy::NewThread => self.inner.pool.execute(self.job(entry, payload)),
        }
    }

    fn job(&self, entry: Arc<Entry<SyncHandler<T>>>, payload: &Arc<T>) -> crate::context::Job {
        let payload = Arc::clone(payload);
        let failures = Arc::clone(&self.inner.failures);
        Box::new(move || invoke(&entry, &payload, &failures))
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

    /// Number of subscriber callbacks that panicked so far.
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

impl<T: Send + Sync + 'static> Default for Event<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for Event<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Event")
            .field("payload", &std::any::type_name::<T>())
            .field("default_channel", &self.inner.default_channel)
            .field("failures", &self.inner.failures.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

/// Run one callback, containing any panic.
fn invoke<T>(entry: &Entry<SyncHandler<T>>, payload: &T, failures: &AtomicU64) {
    let _span = entry.span.enter();
    trace!(subscription_id = %entry.id, policy = %entry.policy, "Delivering event");

    let outcome = catch_unwind(AssertUnwindSafe(|| {
        if entry.handler.accepts(payload) {
            (entry.handler.callback)(payload);
        }
    }));

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
