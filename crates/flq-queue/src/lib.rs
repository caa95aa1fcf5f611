//! # flq-queue
//!
//! Flag-based lock-free linked FIFO queue.
//!
//! The implementation:
//! - Implements the [`FifoQueue`](flq_core::FifoQueue) trait from `flq-core`
//! - Has DST tests that verify the queue invariants over seeded workloads
//!   (`tests/dst_invariant_tests.rs`)
//! - Has loom tests for the detach claim protocol (under `#[cfg(loom)]`)

pub mod linked_queue;

pub use linked_queue::LinkedQueue;
