//! Tidings Test - Shared test utilities for the tidings crates.
//!
//! This crate provides recorders and polling helpers for exercising
//! callbacks that may run on other threads. It is meant to be used as a
//! dev-dependency.
//!
//! # Usage
//!
//! ```toml
//! [dev-dependencies]
//! tidings-test.workspace = true
//! ```
//!
//! ```rust
//! use std::time::Duration;
//! use tidings_test::{CallLog, wait_for};
//!
//! let log = CallLog::new();
//! let sink = log.clone();
//! std::thread::spawn(move || sink.record("worker"));
//!
//! assert!(wait_for(Duration::from_secs(5), || log.len() == 1));
//! assert_eq!(log.labels(), vec!["worker"]);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]

pub mod prelude;

pub mod calls;
pub mod logging;
pub mod wait;

pub use calls::*;
pub use logging::*;
pub use wait::*;
