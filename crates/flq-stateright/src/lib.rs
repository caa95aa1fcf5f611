//! # flq-stateright
//!
//! Stateright models of the flag-based linked queue, for bounded
//! exhaustive state space exploration.
//!
//! The model mirrors the implementation's atomic steps one-to-one, so
//! BFS over a small number of threads and values covers every
//! interleaving of the protocol's linearization points.

pub mod linked_queue;

pub use linked_queue::{Link, Node, QueueAction, QueueModel, QueueState, ThreadState};
