//! Prelude module - commonly used test helpers.
//!
//! Use `use tidings_test::prelude::*;` in test modules.

pub use crate::{Call, CallLog, init_test_logging, wait_for, wait_for_async};
