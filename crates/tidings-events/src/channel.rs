//! Per-channel subscription storage shared by the sync and async buses.

use std::sync::{Arc, PoisonError, RwLock, Weak};

use dashmap::DashMap;
use tracing::{Span, debug};

use crate::context::{self, ExecutionContext};
use crate::policy::DispatchPolicy;
use crate::subscription::{Subscription, SubscriptionId};

/// One registered subscriber.
pub(crate) struct Entry<H> {
    pub(crate) id: SubscriptionId,
    pub(crate) channel: String,
    pub(crate) policy: DispatchPolicy,
    /// Context installed on the subscribing thread.
    pub(crate) context: Option<Arc<dyn ExecutionContext>>,
    /// Span active when subscribing; callbacks run inside it.
    pub(crate) span: Span,
    pub(crate) handler: H,
}

impl<H> Entry<H> {
    /// Where a `Current` subscriber must be re-entered, if not inline.
    pub(crate) fn foreign_context(&self) -> Option<&Arc<dyn ExecutionContext>> {
        self.context
            .as_ref()
            .filter(|captured| !context::is_entered(captured))
    }
}

/// Removal seam used by [`Subscription`] so the handle needs no payload type.
pub(crate) trait Detach: Send + Sync {
    fn detach(&self, id: SubscriptionId) -> bool;
    fn contains(&self, id: SubscriptionId) -> bool;
}

/// Ordered subscriber list for one channel.
pub(crate) struct ChannelList<H> {
    entries: RwLock<Vec<Arc<Entry<H>>>>,
}

impl<H> ChannelList<H> {
    fn new() -> Self {
        Self {
            entries: RwLock::new(Vec::new()),
        }
    }

    fn push(&self, entry: Arc<Entry<H>>) {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(entry);
    }

    pub(crate) fn get(&self, index: usize) -> Option<Arc<Entry<H>>> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(index)
            .cloned()
    }

    pub(crate) fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    fn clear(&self) {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    /// Walk subscribers from most to least recently added.
    ///
    /// The lock is taken per step and never held while the caller runs a
    /// subscriber, so callbacks may subscribe or unsubscribe re-entrantly.
    /// Slots that vanished since the walk started are skipped, and an
    /// entry shifted down by a removal below it is never yielded twice.
    pub(crate) fn newest_first(&self) -> NewestFirst<'_, H> {
        NewestFirst {
            list: self,
            next: self.len(),
            yielded: Vec::new(),
        }
    }
}

impl<H: Send + Sync> Detach for ChannelList<H> {
    fn detach(&self, id: SubscriptionId) -> bool {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        let Some(position) = entries.iter().position(|entry| entry.id == id) else {
            return false;
        };
        // Dropped outside the lock in case its captures touch this list.
        let removed = entries.remove(position);
        drop(entries);
        drop(removed);
        true
    }

    fn contains(&self, id: SubscriptionId) -> bool {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .any(|entry| entry.id == id)
    }
}

/// Bounds-checked reverse cursor over a [`ChannelList`].
pub(crate) struct NewestFirst<'a, H> {
    list: &'a ChannelList<H>,
    next: usize,
    /// Ids already handed out in this walk.
    yielded: Vec<SubscriptionId>,
}

impl<H> Iterator for NewestFirst<'_, H> {
    type Item = Arc<Entry<H>>;

    fn next(&mut self) -> Option<Self::Item> {
        while let Some(index) = self.next.checked_sub(1) {
            self.next = index;
            match self.list.get(index) {
                Some(entry) if !self.yielded.contains(&entry.id) => {
                    self.yielded.push(entry.id);
                    return Some(entry);
                },
                _ => {},
            }
        }
        None
    }
}

/// Channel name to subscriber list mapping for one bus.
pub(crate) struct Channels<H> {
    map: DashMap<String, Arc<ChannelList<H>>>,
}

impl<H: Send + Sync + 'static> Channels<H> {
    pub(crate) fn new() -> Self {
        Self {
            map: DashMap::new(),
        }
    }

    /// Look up a channel, creating an empty one on first use.
    pub(crate) fn get_or_create(&self, name: &str) -> Arc<ChannelList<H>> {
        if let Some(list) = self.map.get(name) {
            return Arc::clone(list.value());
        }
        let list = self
            .map
            .entry(name.to_owned())
            .or_insert_with(|| Arc::new(ChannelList::new()));
        Arc::clone(list.value())
    }

    /// Append a subscriber to `channel` and hand back its removal handle.
    ///
    /// Captures the calling thread's execution context and tracing span.
    pub(crate) fn register(
        &self,
        channel: &str,
        policy: DispatchPolicy,
        handler: H,
    ) -> Subscription {
        let list = self.get_or_create(channel);
        let entry = Entry {
            id: SubscriptionId::new(),
            channel: channel.to_owned(),
            policy,
            context: context::current(),
            span: Span::current(),
            handler,
        };
        let id = entry.id;
        let captured = entry.context.as_ref().map(|ctx| ctx.name().to_owned());
        list.push(Arc::new(entry));

        debug!(
            subscription_id = %id,
            channel,
            %policy,
            context = captured.as_deref(),
            "Subscription registered"
        );

        let detach: Weak<dyn Detach> = Arc::downgrade(&list) as Weak<dyn Detach>;
        Subscription::new(id, channel.to_owned(), policy, detach)
    }

    /// Number of live subscribers on `channel`.
    pub(crate) fn subscriber_count(&self, channel: &str) -> usize {
        self.map.get(channel).map_or(0, |list| list.len())
    }

    /// Names of every channel created so far.
    pub(crate) fn names(&self) -> Vec<String> {
        self.map.iter().map(|item| item.key().clone()).collect()
    }

    /// Total live subscribers across channels.
    pub(crate) fn total(&self) -> usize {
        self.map.iter().map(|item| item.value().len()).sum()
    }

    /// Drop every subscriber on every channel. Outstanding handles become
    /// no-ops.
    pub(crate) fn clear(&self) {
        let lists: Vec<Arc<ChannelList<H>>> =
            self.map.iter().map(|item| Arc::clone(item.value())).collect();
        for list in lists {
            list.clear();
        }
        debug!("All subscriptions cleared");
    }
}
