//! Tidings Events - typed publish/subscribe buses.
//!
//! This crate provides:
//! - [`Event`], a synchronous bus that invokes callbacks with `&T`
//! - [`AsyncEvent`], a bus whose callbacks return futures
//! - [`EventManager`], a registry handing out one bus per payload type
//! - Execution contexts that decide where a callback runs
//!
//! # Dispatch policies
//!
//! Every subscription picks a [`DispatchPolicy`]:
//!
//! 1. **`Current`**: run on the execution context that was installed on
//!    the subscribing thread (see [`context::enter`] and [`DispatchLoop`]).
//!    Without one, or when publishing from that context, the callback runs
//!    inline.
//! 2. **`PublishThread`**: run inline on the publishing thread.
//! 3. **`NewThread`**: run on the manager's [`WorkerPool`] without waiting.
//!
//! Subscribers on a channel are called newest first. A panicking
//! subscriber is logged and counted and never stops delivery to the rest.
//!
//! # Example
//!
//! ```rust
//! use tidings_events::{DispatchPolicy, EventManager};
//!
//! #[derive(Debug)]
//! struct OrderPlaced {
//!     id: u64,
//! }
//!
//! let manager = EventManager::new();
//! let orders = manager.event::<OrderPlaced>();
//!
//! let subscription = orders.subscribe(DispatchPolicy::PublishThread, |order| {
//!     println!("order {} placed", order.id);
//! });
//!
//! orders.publish(OrderPlaced { id: 7 });
//! assert!(subscription.unsubscribe());
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod context;
pub mod prelude;

mod async_event;
mod channel;
mod dispatch_loop;
mod error;
mod event;
mod manager;
mod panic;
mod policy;
mod pool;
mod subscription;

pub use async_event::AsyncEvent;
pub use context::{ContextGuard, ExecutionContext, Job, RuntimeContext};
pub use dispatch_loop::DispatchLoop;
pub use error::{EventError, EventResult};
pub use event::{DEFAULT_CHANNEL, Event};
pub use manager::{EventManager, ManagerOptions};
pub use policy::DispatchPolicy;
pub use pool::{DEFAULT_WORKER_THREAD_NAME, DEFAULT_WORKER_THREADS, PoolOptions, WorkerPool};
pub use subscription::{Subscription, SubscriptionGuard, SubscriptionId};
