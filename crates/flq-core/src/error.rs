//! Error types for queue operations.
//!
//! An empty queue is not an error: `pop` reports it as `None` and callers
//! are expected to poll. The only typed failure is the unsupported `peek`.

use thiserror::Error;

/// Returned by `peek` on queues that cannot provide a non-destructive read.
///
/// A successful `pop` transfers ownership of the head value to exactly one
/// caller. Epoch pinning keeps the *node* alive for a concurrent reader,
/// but not the *value*: its new owner may drop it at any time, so reading
/// it from another thread cannot be made safe without value-level
/// synchronization the queue does not have.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("peek is not supported: a concurrent pop owns the head value")]
pub struct PeekUnsupported;
