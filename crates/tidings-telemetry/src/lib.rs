//! Tidings Telemetry - Logging setup for applications using tidings.
//!
//! This crate provides:
//! - Configurable logging setup with multiple formats and targets
//! - Rolling file output through `tracing-appender`
//! - Conversion from the `[logging]` config section (`config` feature)
//!
//! The library crates only emit `tracing` events. Installing a subscriber
//! is left to the application, which can use [`setup_logging`] for that.
//!
//! # Example
//!
//! ```rust,no_run
//! use tidings_telemetry::{LogConfig, LogFormat, setup_logging};
//!
//! # fn main() -> Result<(), tidings_telemetry::TelemetryError> {
//! let config = LogConfig::new("info")
//!     .with_format(LogFormat::Compact)
//!     .with_directive("tidings_events=trace");
//!
//! setup_logging(&config)?;
//! tracing::info!("Logging ready");
//! # Ok(())
//! # }
//! ```

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod prelude;

mod error;
mod logging;

pub use error::{TelemetryError, TelemetryResult};
pub use logging::{
    BoxedSubscriber, FileLogConfig, FileRotation, LogConfig, LogFormat, LogTarget,
    build_subscriber, build_subscriber_with_writer, setup_default_logging, setup_logging,
};
