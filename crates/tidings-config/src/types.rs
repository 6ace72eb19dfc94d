//! Configuration struct definitions.
//!
//! Every section is `#[serde(default)]`, so a file only needs the keys it
//! wants to change.

use serde::{Deserialize, Serialize};

/// Root configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Event manager and worker pool settings.
    pub bus: BusSection,
    /// Logging and tracing settings.
    pub logging: LoggingSection,
}

// ---------------------------------------------------------------------------
// BusSection
// ---------------------------------------------------------------------------

/// Settings applied to every bus an event manager creates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BusSection {
    /// Channel used when publishing or subscribing without a channel name.
    pub default_channel: String,
    /// Number of worker threads backing `new_thread` subscribers.
    pub worker_threads: usize,
    /// Name given to worker threads.
    pub worker_thread_name: String,
}

impl Default for BusSection {
    fn default() -> Self {
        Self {
            default_channel: "default".to_owned(),
            worker_threads: 4,
            worker_thread_name: "tidings-worker".to_owned(),
        }
    }
}

// ---------------------------------------------------------------------------
// LoggingSection
// ---------------------------------------------------------------------------

/// Logging and tracing configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSection {
    /// Global log level filter (`"trace"`, `"debug"`, `"info"`, `"warn"`,
    /// `"error"`).
    pub level: String,
    /// Output format: `"pretty"`, `"compact"`, `"json"` or `"full"`.
    pub format: String,
    /// Per-crate tracing directives (e.g. `["tidings_events=trace"]`).
    pub directives: Vec<String>,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: "info".to_owned(),
            format: "compact".to_owned(),
            directives: Vec::new(),
        }
    }
}
