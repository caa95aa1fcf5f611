//! Workload runner.
//!
//! Drives a queue implementation through a generated workload on one real
//! thread, recording every operation in linearization order. Because the
//! run is single-threaded, the recorded order *is* the linearization
//! order, which makes the history directly checkable against the FIFO
//! invariants.

use std::collections::HashSet;

use flq_core::invariants::queue::QueueHistory;
use flq_core::{FifoQueue, PropertyChecker, PropertyResult, QueueProperties, QueuePropertyChecker};

use crate::workload::{Workload, WorkloadOp};

/// Record of one workload execution against a queue.
#[derive(Debug)]
pub struct RunRecord {
    /// Seed of the workload that produced this record
    pub seed: u64,
    /// Number of pushes performed
    pub pushes_count: u64,
    /// Number of pops that returned a value (including the final drain)
    pub pops_count: u64,
    /// Number of pops that found the queue empty
    pub pops_empty_count: u64,
    pushed: HashSet<u64>,
    popped: HashSet<u64>,
    history: QueueHistory,
}

impl RunRecord {
    /// Verify all queue invariants against this record.
    ///
    /// Returns the first failing property, if any; the failure carries
    /// the workload seed for reproduction.
    pub fn verify(&self) -> Result<(), PropertyResult> {
        QueuePropertyChecker::new(self)
            .with_seed(self.seed)
            .verify_all()
    }
}

impl QueueProperties for RunRecord {
    fn pushed_elements(&self) -> HashSet<u64> {
        self.pushed.clone()
    }

    fn popped_elements(&self) -> HashSet<u64> {
        self.popped.clone()
    }

    fn current_contents(&self) -> Vec<u64> {
        // The runner drains the queue after the schedule, so everything
        // still enqueued at the end was recorded as a drain pop.
        Vec::new()
    }

    fn history(&self) -> &QueueHistory {
        &self.history
    }
}

/// Execute a workload against `queue` and record the outcome.
///
/// After the scheduled operations, the queue is drained so the record
/// accounts for every value; `verify` then checks conservation exactly.
pub fn run_workload<Q: FifoQueue<u64>>(queue: &Q, workload: &Workload) -> RunRecord {
    let mut record = RunRecord {
        seed: workload.seed,
        pushes_count: 0,
        pops_count: 0,
        pops_empty_count: 0,
        pushed: HashSet::new(),
        popped: HashSet::new(),
        history: QueueHistory::new(),
    };

    let mut step = 0u64;
    for op in &workload.ops {
        step += 1;
        match *op {
            WorkloadOp::Push { producer, value } => {
                let pushed = queue.push(value);
                debug_assert!(pushed, "push is unbounded and must succeed");
                record.pushed.insert(value);
                record.history.record_push(producer, value, step);
                record.pushes_count += 1;
            }
            WorkloadOp::Pop { consumer } => {
                let thread_id = workload.config.producers_count + consumer;
                let value = queue.pop();
                record.history.record_pop(thread_id, value, step);
                match value {
                    Some(v) => {
                        record.popped.insert(v);
                        record.pops_count += 1;
                    }
                    None => record.pops_empty_count += 1,
                }
            }
        }
    }

    // Drain whatever the scheduled pops missed.
    let drain_thread = workload.config.producers_count;
    while let Some(value) = queue.pop() {
        step += 1;
        record.history.record_pop(drain_thread, Some(value), step);
        record.popped.insert(value);
        record.pops_count += 1;
    }

    record
}
