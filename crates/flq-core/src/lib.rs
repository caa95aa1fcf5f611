//! # flq-core
//!
//! Core traits and invariants for the flag-based lock-free linked queue.
//!
//! This crate holds the pieces shared between the queue implementation,
//! the DST harness, and the tests:
//! - the [`FifoQueue`] operation set
//! - error types ([`PeekUnsupported`])
//! - the property-checking framework ([`PropertyChecker`],
//!   [`QueuePropertyChecker`]) with counterexample capture

pub mod counterexample;
pub mod error;
pub mod fifo;
pub mod invariants;
pub mod property;

pub use counterexample::{Counterexample, StateSnapshot};
pub use error::PeekUnsupported;
pub use fifo::FifoQueue;
pub use invariants::{QueueHistory, QueueProperties, QueuePropertyChecker};
pub use property::{PropertyChecker, PropertyResult, PropertySummary};
