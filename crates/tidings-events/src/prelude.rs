//! Prelude module - commonly used types for convenient import.
//!
//! Use `use tidings_events::prelude::*;` to import all essential types.

// Buses
pub use crate::{AsyncEvent, DEFAULT_CHANNEL, Event, EventManager, ManagerOptions};

// Subscriptions
pub use crate::{DispatchPolicy, Subscription, SubscriptionGuard, SubscriptionId};

// Execution contexts
pub use crate::{DispatchLoop, ExecutionContext, RuntimeContext, WorkerPool};

// Errors
pub use crate::{EventError, EventResult};
