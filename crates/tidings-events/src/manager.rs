//! Per-type bus registry.

use std::any::{Any, TypeId, type_name};
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

use dashmap::DashMap;
use tracing::{debug, warn};

use crate::async_event::AsyncEvent;
use crate::event::{DEFAULT_CHANNEL, Event};
use crate::pool::{PoolOptions, WorkerPool};

/// Settings shared by every bus a manager creates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManagerOptions {
    /// Channel used when publishing or subscribing without a name.
    pub default_channel: String,
    /// Worker pool settings for detached dispatch.
    pub pool: PoolOptions,
}

impl Default for ManagerOptions {
    fn default() -> Self {
        Self {
            default_channel: DEFAULT_CHANNEL.to_owned(),
            pool: PoolOptions::default(),
        }
    }
}

impl ManagerOptions {
    /// Set the default channel name.
    #[must_use]
    pub fn with_default_channel(mut self, channel: impl Into<String>) -> Self {
        self.default_channel = channel.into();
        self
    }

    /// Set the number of worker threads.
    #[must_use]
    pub fn with_worker_threads(mut self, threads: usize) -> Self {
        self.pool.worker_threads = threads;
        self
    }

    /// Set the worker thread name.
    #[must_use]
    pub fn with_worker_thread_name(mut self, name: impl Into<String>) -> Self {
        self.pool.thread_name = name.into();
        self
    }
}

#[cfg(feature = "config")]
impl From<&tidings_config::BusSection> for ManagerOptions {
    fn from(section: &tidings_config::BusSection) -> Self {
        Self {
            default_channel: section.default_channel.clone(),
            pool: PoolOptions {
                worker_threads: section.worker_threads,
                thread_name: section.worker_thread_name.clone(),
            },
        }
    }
}

type Registry = DashMap<TypeId, Box<dyn Any + Send + Sync>>;

struct Inner {
    events: Registry,
    async_events: Registry,
    /// Serializes bus creation so two racing lookups agree on one instance.
    create_lock: Mutex<()>,
    pool: Arc<WorkerPool>,
    default_channel: String,
}

/// Hands out one [`Event`] and one [`AsyncEvent`] per payload type.
///
/// Every bus created by a manager shares its worker pool. Cloning the
/// manager is cheap and clones share the registry.
#[derive(Clone)]
pub struct EventManager {
    inner: Arc<Inner>,
}

impl EventManager {
    /// Create a manager with default options.
    #[must_use]
    pub fn new() -> Self {
        Self::with_options(ManagerOptions::default())
    }

    /// Create a manager with the given options.
    ///
    /// An empty default channel falls back to [`DEFAULT_CHANNEL`].
    #[must_use]
    pub fn with_options(options: ManagerOptions) -> Self {
        let default_channel = if options.default_channel.is_empty() {
            warn!(fallback = DEFAULT_CHANNEL, "Empty default channel configured");
            DEFAULT_CHANNEL.to_owned()
        } else {
            options.default_channel
        };
        debug!(
            default_channel = %default_channel,
            worker_threads = options.pool.worker_threads,
            "Event manager created"
        );
        Self {
            inner: Arc::new(Inner {
                events: DashMap::new(),
                async_events: DashMap::new(),
                create_lock: Mutex::new(()),
                pool: Arc::new(WorkerPool::new(options.pool)),
                default_channel,
            }),
        }
    }

    /// Build a manager from a loaded configuration.
    #[cfg(feature = "config")]
    #[must_use]
    pub fn from_config(config: &tidings_config::Config) -> Self {
        Self::with_options(ManagerOptions::from(&config.bus))
    }

    /// The synchronous bus for payload type `T`.
    ///
    /// The first call for a type creates the bus; later calls from any
    /// thread return handles to that same instance.
    #[must_use]
    pub fn event<T: Send + Sync + 'static>(&self) -> Event<T> {
        self.lookup_or_create(&self.inner.events, || {
            Event::with_parts(Arc::clone(&self.inner.pool), self.inner.default_channel.clone())
        })
    }

    /// The asynchronous bus for payload type `T`.
    #[must_use]
    pub fn async_event<T: Send + Sync + 'static>(&self) -> AsyncEvent<T> {
        self.lookup_or_create(&self.inner.async_events, || {
            AsyncEvent::with_parts(Arc::clone(&self.inner.pool), self.inner.default_channel.clone())
        })
    }

    fn lookup_or_create<B, F>(&self, registry: &Registry, create: F) -> B
    where
        B: Clone + Send + Sync + 'static,
        F: FnOnce() -> B,
    {
        let key = TypeId::of::<B>();
        if let Some(found) = Self::lookup(registry, key) {
            return found;
        }

        let _creating = self
            .inner
            .create_lock
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if let Some(found) = Self::lookup(registry, key) {
            return found;
        }

        let bus = create();
        registry.insert(key, Box::new(bus.clone()));
        debug!(bus = type_name::<B>(), "Bus created");
        bus
    }

    fn lookup<B: Clone + 'static>(registry: &Registry, key: TypeId) -> Option<B> {
        registry
            .get(&key)
            .and_then(|item| item.value().downcast_ref::<B>().cloned())
    }

    /// Number of synchronous buses created so far.
    #[must_use]
    pub fn event_count(&self) -> usize {
        self.inner.events.len()
    }

    /// Number of asynchronous buses created so far.
    #[must_use]
    pub fn async_event_count(&self) -> usize {
        self.inner.async_events.len()
    }

    /// Pool shared by every bus of this manager.
    #[must_use]
    pub fn worker_pool(&self) -> &Arc<WorkerPool> {
        &self.inner.pool
    }

    /// Channel used by `publish` and `subscribe` on every bus.
    #[must_use]
    pub fn default_channel(&self) -> &str {
        &self.inner.default_channel
    }
}

impl Default for EventManager {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for EventManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventManager")
            .field("default_channel", &self.inner.default_channel)
            .field("events", &self.event_count())
            .field("async_events", &self.async_event_count())
            .field("pool", &self.inner.pool)
            .finish()
    }
}
