//! Event bus error types.

use thiserror::Error;

/// Errors that can occur with event bus operations.
#[derive(Debug, Error)]
pub enum EventError {
    /// A channel name was rejected before subscribing or publishing.
    #[error("Invalid channel name {name:?}: {reason}")]
    InvalidChannel {
        /// The rejected channel name.
        name: String,
        /// Why it was rejected.
        reason: &'static str,
    },

    /// A dispatch policy string could not be parsed.
    #[error("Unknown dispatch policy '{0}'; expected one of: current, publish_thread, new_thread")]
    InvalidPolicy(String),

    /// An execution context was shut down before it could run the work.
    #[error("Execution context '{0}' is closed")]
    ContextClosed(String),

    /// A dispatch loop thread or runtime could not be started.
    #[error("Failed to start dispatch loop: {0}")]
    LoopStart(#[from] std::io::Error),
}

/// Result type for event bus operations.
pub type EventResult<T> = Result<T, EventError>;

/// Reject channel names that cannot address a channel.
///
/// The empty name is the only invalid name; it plays the role a missing
/// (null) channel argument would play in a nullable API.
pub(crate) fn validate_channel(name: &str) -> EventResult<()> {
    if name.is_empty() {
        return Err(EventError::InvalidChannel {
            name: name.to_owned(),
            reason: "channel name must not be empty",
        });
    }
    Ok(())
}
