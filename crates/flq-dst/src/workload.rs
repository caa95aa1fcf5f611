//! Seeded workload generation.
//!
//! A workload is a fixed interleaving of push and pop operations across a
//! set of simulated producers and consumers. Producers push disjoint value
//! ranges; consumers pop. The interleaving is fully determined by the seed.

use thiserror::Error;

use crate::random::DeterministicRng;
use crate::scheduler::InterleaveScheduler;

/// Errors from workload construction.
#[derive(Debug, Error)]
pub enum SimError {
    /// The workload configuration is outside supported bounds.
    #[error("workload config invalid: {0}")]
    InvalidConfig(String),
}

/// Maximum simulated threads in one workload.
const SIM_THREADS_COUNT_MAX: u64 = 64;

/// Maximum operations in one workload.
const OPS_COUNT_MAX: u64 = 10_000_000;

/// Shape of a simulated workload.
#[derive(Debug, Clone, Copy)]
pub struct WorkloadConfig {
    /// Number of simulated producers
    pub producers_count: u64,
    /// Number of simulated consumers
    pub consumers_count: u64,
    /// Values pushed by each producer
    pub values_per_producer: u64,
}

impl WorkloadConfig {
    /// Total number of values pushed across all producers.
    #[must_use]
    pub fn values_count_total(&self) -> u64 {
        self.producers_count * self.values_per_producer
    }

    fn validate(&self) -> Result<(), SimError> {
        if self.producers_count == 0 || self.consumers_count == 0 {
            return Err(SimError::InvalidConfig(
                "need at least one producer and one consumer".to_string(),
            ));
        }
        if self.producers_count + self.consumers_count > SIM_THREADS_COUNT_MAX {
            return Err(SimError::InvalidConfig(format!(
                "too many simulated threads: {} > {}",
                self.producers_count + self.consumers_count,
                SIM_THREADS_COUNT_MAX
            )));
        }
        if self.values_per_producer == 0 {
            return Err(SimError::InvalidConfig(
                "each producer must push at least one value".to_string(),
            ));
        }
        if self.values_count_total() * 2 > OPS_COUNT_MAX {
            return Err(SimError::InvalidConfig(format!(
                "workload too large: {} ops > {}",
                self.values_count_total() * 2,
                OPS_COUNT_MAX
            )));
        }
        Ok(())
    }
}

/// One operation in a workload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkloadOp {
    /// Producer pushes a value
    Push { producer: u64, value: u64 },
    /// Consumer attempts a pop (may find the queue empty at run time)
    Pop { consumer: u64 },
}

/// A generated workload: a seeded interleaving of operations.
#[derive(Debug)]
pub struct Workload {
    /// Seed the interleaving was generated from
    pub seed: u64,
    /// Configuration the workload was generated for
    pub config: WorkloadConfig,
    /// Operations in schedule order
    pub ops: Vec<WorkloadOp>,
}

impl Workload {
    /// Generate a workload from a config and seed.
    ///
    /// Producer `p` pushes the values
    /// `p * values_per_producer .. (p + 1) * values_per_producer`, so all
    /// producers' ranges are disjoint. Consumers are scheduled exactly
    /// enough pops for every value; pops that land before a matching push
    /// report empty at run time and the runner drains the remainder.
    pub fn generate(config: WorkloadConfig, seed: u64) -> Result<Self, SimError> {
        config.validate()?;
        debug_assert!(seed != 0, "Seed should not be zero");

        let mut master = DeterministicRng::new(seed);
        let mut scheduler = InterleaveScheduler::with_defaults(master.fork());

        let producers = config.producers_count as usize;
        let consumers = config.consumers_count as usize;

        let mut pushes_remaining = vec![config.values_per_producer; producers];
        let mut pops_remaining = vec![0u64; consumers];
        for i in 0..config.values_count_total() {
            pops_remaining[(i % config.consumers_count) as usize] += 1;
        }

        let mut ops = Vec::with_capacity((config.values_count_total() * 2) as usize);
        let mut runnable = Vec::with_capacity(producers + consumers);

        loop {
            runnable.clear();
            for (p, remaining) in pushes_remaining.iter().enumerate() {
                if *remaining > 0 {
                    runnable.push(p);
                }
            }
            for (c, remaining) in pops_remaining.iter().enumerate() {
                if *remaining > 0 {
                    runnable.push(producers + c);
                }
            }
            if runnable.is_empty() {
                break;
            }

            let thread = scheduler.pick(&runnable);
            if thread < producers {
                let index = config.values_per_producer - pushes_remaining[thread];
                ops.push(WorkloadOp::Push {
                    producer: thread as u64,
                    value: thread as u64 * config.values_per_producer + index,
                });
                pushes_remaining[thread] -= 1;
            } else {
                let consumer = thread - producers;
                ops.push(WorkloadOp::Pop {
                    consumer: consumer as u64,
                });
                pops_remaining[consumer] -= 1;
            }
        }

        debug_assert!(ops.len() as u64 == config.values_count_total() * 2);

        Ok(Self { seed, config, ops })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_config() -> WorkloadConfig {
        WorkloadConfig {
            producers_count: 3,
            consumers_count: 2,
            values_per_producer: 10,
        }
    }

    #[test]
    fn test_generation_is_deterministic() {
        let w1 = Workload::generate(small_config(), 42).unwrap();
        let w2 = Workload::generate(small_config(), 42).unwrap();
        assert_eq!(w1.ops, w2.ops);
    }

    #[test]
    fn test_different_seeds_differ() {
        let w1 = Workload::generate(small_config(), 42).unwrap();
        let w2 = Workload::generate(small_config(), 43).unwrap();
        assert_ne!(w1.ops, w2.ops);
    }

    #[test]
    fn test_pushes_cover_disjoint_ranges() {
        let workload = Workload::generate(small_config(), 7).unwrap();

        let mut values: Vec<u64> = workload
            .ops
            .iter()
            .filter_map(|op| match op {
                WorkloadOp::Push { value, .. } => Some(*value),
                WorkloadOp::Pop { .. } => None,
            })
            .collect();
        values.sort_unstable();

        let expected: Vec<u64> = (0..small_config().values_count_total()).collect();
        assert_eq!(values, expected);
    }

    #[test]
    fn test_pops_match_pushes() {
        let workload = Workload::generate(small_config(), 7).unwrap();

        let pops = workload
            .ops
            .iter()
            .filter(|op| matches!(op, WorkloadOp::Pop { .. }))
            .count() as u64;
        assert_eq!(pops, small_config().values_count_total());
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = WorkloadConfig {
            producers_count: 0,
            consumers_count: 1,
            values_per_producer: 1,
        };
        assert!(Workload::generate(config, 1).is_err());

        let config = WorkloadConfig {
            producers_count: 1,
            consumers_count: 1,
            values_per_producer: 0,
        };
        assert!(Workload::generate(config, 1).is_err());
    }
}
