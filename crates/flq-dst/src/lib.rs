//! # flq-dst
//!
//! Deterministic Simulation Testing harness for the lock-free linked
//! queue.
//!
//! Inspired by FoundationDB and TigerBeetle: workloads, operation
//! interleavings, and scheduling decisions are all derived from a single
//! seed, so every run is reproducible.
//!
//! ## Usage
//!
//! ```rust
//! use flq_dst::{run_workload, Workload, WorkloadConfig};
//! # use std::collections::VecDeque;
//! # use std::sync::Mutex;
//! # use flq_core::{FifoQueue, PeekUnsupported};
//! # struct Q(Mutex<VecDeque<u64>>);
//! # impl FifoQueue<u64> for Q {
//! #     fn push(&self, v: u64) -> bool { self.0.lock().unwrap().push_back(v); true }
//! #     fn pop(&self) -> Option<u64> { self.0.lock().unwrap().pop_front() }
//! #     fn peek(&self) -> Result<Option<u64>, PeekUnsupported> { Err(PeekUnsupported) }
//! #     fn len(&self) -> u64 { self.0.lock().unwrap().len() as u64 }
//! # }
//!
//! let config = WorkloadConfig {
//!     producers_count: 2,
//!     consumers_count: 2,
//!     values_per_producer: 100,
//! };
//! let workload = Workload::generate(config, 12345).unwrap();
//!
//! # let queue = Q(Mutex::new(VecDeque::new()));
//! let record = run_workload(&queue, &workload);
//! record.verify().unwrap();
//! ```
//!
//! ## Reproducibility
//!
//! To reproduce a failing test:
//! ```bash
//! DST_SEED=12345 cargo test
//! ```

pub mod random;
pub mod runner;
pub mod scheduler;
pub mod workload;

pub use random::DeterministicRng;
pub use runner::{run_workload, RunRecord};
pub use scheduler::InterleaveScheduler;
pub use workload::{SimError, Workload, WorkloadConfig, WorkloadOp};

/// Get DST seed from environment or generate random one.
///
/// Prints the seed for reproduction. Use `DST_SEED=<seed>` to reproduce.
#[must_use]
pub fn get_or_generate_seed() -> u64 {
    match std::env::var("DST_SEED") {
        Ok(s) => {
            let seed: u64 = s.parse().expect("DST_SEED must be a valid u64");
            println!("DST_SEED={} (from environment)", seed);
            seed
        }
        Err(_) => {
            let seed = rand::random::<u64>();
            println!("DST_SEED={} (randomly generated)", seed);
            seed
        }
    }
}
