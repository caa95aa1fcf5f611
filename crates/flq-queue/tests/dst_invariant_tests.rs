//! DST invariant tests: seeded workloads driven against the real queue,
//! with every run's history checked against the FIFO invariants.
//!
//! Failures print the seed; reproduce with `DST_SEED=<seed> cargo test`.

use flq_dst::{get_or_generate_seed, run_workload, Workload, WorkloadConfig};
use flq_queue::LinkedQueue;

#[test]
fn test_seeded_workloads_uphold_invariants() {
    let base_seed = get_or_generate_seed();

    for round in 0..32u64 {
        let seed = base_seed.wrapping_add(round.wrapping_mul(7_919)).max(1);
        let config = WorkloadConfig {
            producers_count: 1 + round % 4,
            consumers_count: 1 + round % 3,
            values_per_producer: 200,
        };
        let workload = Workload::generate(config, seed).unwrap();

        let queue = LinkedQueue::new();
        let record = run_workload(&queue, &workload);

        if let Err(failure) = record.verify() {
            panic!("seed {}: {}", seed, failure.format_status());
        }
        assert_eq!(record.pushes_count, config.values_count_total());
        assert_eq!(record.pops_count, config.values_count_total());
        assert!(queue.is_empty());
    }
}

#[test]
fn test_fixed_seed_regression() {
    let config = WorkloadConfig {
        producers_count: 4,
        consumers_count: 2,
        values_per_producer: 500,
    };
    let workload = Workload::generate(config, 12345).unwrap();

    let queue = LinkedQueue::new();
    let record = run_workload(&queue, &workload);

    record.verify().unwrap();
    assert_eq!(record.pops_count, config.values_count_total());
}
