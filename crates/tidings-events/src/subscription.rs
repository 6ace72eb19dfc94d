//! Subscription handles.

use std::fmt;
use std::ops::Deref;
use std::sync::Weak;

use tracing::debug;
use uuid::Uuid;

use crate::channel::Detach;
use crate::policy::DispatchPolicy;

/// Unique identifier of one subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(Uuid);

impl SubscriptionId {
    pub(crate) fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// The underlying UUID.
    #[must_use]
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Handle to a registered subscriber.
///
/// Dropping the handle does **not** unsubscribe; call
/// [`Subscription::unsubscribe`] or convert it with
/// [`Subscription::into_guard`] for scope-bound subscriptions. The handle
/// only holds a weak reference to its channel, so it never keeps a bus
/// alive.
pub struct Subscription {
    id: SubscriptionId,
    channel: String,
    policy: DispatchPolicy,
    list: Weak<dyn Detach>,
}

impl Subscription {
    pub(crate) fn new(
        id: SubscriptionId,
        channel: String,
        policy: DispatchPolicy,
        list: Weak<dyn Detach>,
    ) -> Self {
        Self {
            id,
            channel,
            policy,
            list,
        }
    }

    /// Identifier of this subscription.
    #[must_use]
    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    /// Channel the subscription listens on.
    #[must_use]
    pub fn channel(&self) -> &str {
        &self.channel
    }

    /// Dispatch policy chosen at subscribe time.
    #[must_use]
    pub fn policy(&self) -> DispatchPolicy {
        self.policy
    }

    /// Whether the subscriber is still registered.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.list
            .upgrade()
            .is_some_and(|list| list.contains(self.id))
    }

    /// Remove the subscriber from its channel.
    ///
    /// Returns `true` if it was registered. Calling this again, or after the
    /// bus is gone, is a no-op that returns `false`.
    pub fn unsubscribe(&self) -> bool {
        let Some(list) = self.list.upgrade() else {
            return false;
        };
        let removed = list.detach(self.id);
        if removed {
            debug!(subscription_id = %self.id, channel = %self.channel, "Subscription removed");
        }
        removed
    }

    /// Tie the subscription to a guard that unsubscribes on drop.
    #[must_use]
    pub fn into_guard(self) -> SubscriptionGuard {
        SubscriptionGuard { subscription: self }
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("channel", &self.channel)
            .field("policy", &self.policy)
            .field("active", &self.is_active())
            .finish()
    }
}

/// Unsubscribes when dropped.
#[derive(Debug)]
#[must_use = "the subscription is removed as soon as the guard is dropped"]
pub struct SubscriptionGuard {
    subscription: Subscription,
}

impl Deref for SubscriptionGuard {
    type Target = Subscription;

    fn deref(&self) -> &Self::Target {
        &self.subscription
    }
}

impl Drop for SubscriptionGuard {
    fn drop(&mut self) {
        self.subscription.unsubscribe();
    }
}
