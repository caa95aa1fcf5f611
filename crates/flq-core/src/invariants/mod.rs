//! Invariant traits for queue executions.
//!
//! Each module defines the properties an execution must satisfy.

pub mod queue;

pub use queue::{QueueHistory, QueueOpType, QueueOperation, QueueProperties, QueuePropertyChecker};
