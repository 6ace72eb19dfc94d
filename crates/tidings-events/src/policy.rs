//! Dispatch policy selected per subscription.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::EventError;

/// Where a subscriber's callback runs when an event is published.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DispatchPolicy {
    /// Re-enter the execution context captured when the subscription was
    /// made. Runs inline when nothing was captured or when the publisher is
    /// already on that context.
    Current,
    /// Run inline on the thread that called publish.
    #[default]
    PublishThread,
    /// Hand the callback to the background worker pool. Publish does not
    /// wait for it.
    NewThread,
}

impl DispatchPolicy {
    /// Stable lowercase name, as used in configuration and logs.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Current => "current",
            Self::PublishThread => "publish_thread",
            Self::NewThread => "new_thread",
        }
    }

    /// Whether publish returns before the callback has run.
    #[must_use]
    pub fn is_detached(self) -> bool {
        matches!(self, Self::NewThread)
    }
}

impl fmt::Display for DispatchPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DispatchPolicy {
    type Err = EventError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "current" => Ok(Self::Current),
            "publish_thread" => Ok(Self::PublishThread),
            "new_thread" => Ok(Self::NewThread),
            _ => Err(EventError::InvalidPolicy(s.to_owned())),
        }
    }
}
