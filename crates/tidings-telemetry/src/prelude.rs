//! Prelude module - commonly used types for convenient import.
//!
//! Use `use tidings_telemetry::prelude::*;` to import all essential types.

// Errors
pub use crate::{TelemetryError, TelemetryResult};

// Logging configuration
pub use crate::{FileRotation, LogConfig, LogFormat, LogTarget};

// Setup functions
pub use crate::{build_subscriber, setup_default_logging, setup_logging};
