//! Multi-threaded stress tests for the linked queue.
//!
//! These run real producer/consumer threads against one shared queue and
//! check the delivery guarantees: nothing lost, nothing delivered twice,
//! per-producer order preserved, and the queue stays usable after draining.

use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use flq_queue::LinkedQueue;

/// Upper bound on how long consumers poll before declaring elements lost.
const STRESS_TIMEOUT: Duration = Duration::from_secs(120);

#[test]
fn test_concurrent_no_loss_no_duplication() {
    const PRODUCERS_COUNT: u64 = 8;
    const CONSUMERS_COUNT: u64 = 4;
    const VALUES_PER_PRODUCER: u64 = 10_000;
    const VALUES_COUNT_TOTAL: u64 = PRODUCERS_COUNT * VALUES_PER_PRODUCER;

    let queue = Arc::new(LinkedQueue::new());
    let popped_total = Arc::new(AtomicU64::new(0));

    let mut producer_handles = Vec::new();
    for producer in 0..PRODUCERS_COUNT {
        let queue = Arc::clone(&queue);
        producer_handles.push(thread::spawn(move || {
            let base = producer * VALUES_PER_PRODUCER;
            for i in 0..VALUES_PER_PRODUCER {
                assert!(queue.push(base + i));
            }
        }));
    }

    let mut consumer_handles = Vec::new();
    for _ in 0..CONSUMERS_COUNT {
        let queue = Arc::clone(&queue);
        let popped_total = Arc::clone(&popped_total);
        consumer_handles.push(thread::spawn(move || {
            let deadline = Instant::now() + STRESS_TIMEOUT;
            let mut local = Vec::new();
            while popped_total.load(Ordering::Acquire) < VALUES_COUNT_TOTAL {
                match queue.pop() {
                    Some(value) => {
                        popped_total.fetch_add(1, Ordering::AcqRel);
                        local.push(value);
                    }
                    None => {
                        assert!(
                            Instant::now() < deadline,
                            "consumers starved: elements were lost"
                        );
                        thread::yield_now();
                    }
                }
            }
            local
        }));
    }

    for handle in producer_handles {
        handle.join().unwrap();
    }

    let mut seen = HashSet::new();
    for handle in consumer_handles {
        for value in handle.join().unwrap() {
            assert!(seen.insert(value), "value {} delivered twice", value);
        }
    }

    assert_eq!(seen.len() as u64, VALUES_COUNT_TOTAL);
    for value in 0..VALUES_COUNT_TOTAL {
        assert!(seen.contains(&value), "value {} never delivered", value);
    }
    assert_eq!(queue.pop(), None);
    assert_eq!(queue.len(), 0);
}

#[test]
fn test_per_producer_order_with_single_consumer() {
    const PRODUCERS_COUNT: u64 = 4;
    const VALUES_PER_PRODUCER: u64 = 5_000;
    const VALUES_COUNT_TOTAL: u64 = PRODUCERS_COUNT * VALUES_PER_PRODUCER;

    let queue = Arc::new(LinkedQueue::new());

    let mut handles = Vec::new();
    for producer in 0..PRODUCERS_COUNT {
        let queue = Arc::clone(&queue);
        handles.push(thread::spawn(move || {
            let base = producer * VALUES_PER_PRODUCER;
            for i in 0..VALUES_PER_PRODUCER {
                queue.push(base + i);
            }
        }));
    }

    // Single consumer: the order it observes is the queue's total order,
    // so each producer's values must appear as an increasing subsequence.
    let deadline = Instant::now() + STRESS_TIMEOUT;
    let mut observed = Vec::new();
    while (observed.len() as u64) < VALUES_COUNT_TOTAL {
        match queue.pop() {
            Some(value) => observed.push(value),
            None => {
                assert!(Instant::now() < deadline, "elements were lost");
                thread::yield_now();
            }
        }
    }

    for handle in handles {
        handle.join().unwrap();
    }

    for producer in 0..PRODUCERS_COUNT {
        let base = producer * VALUES_PER_PRODUCER;
        let subsequence: Vec<u64> = observed
            .iter()
            .copied()
            .filter(|v| (base..base + VALUES_PER_PRODUCER).contains(v))
            .collect();
        let expected: Vec<u64> = (base..base + VALUES_PER_PRODUCER).collect();
        assert_eq!(subsequence, expected, "producer {} order broken", producer);
    }
}

#[test]
fn test_drain_then_reuse_under_contention() {
    const ROUNDS_COUNT: u64 = 50;
    const PRODUCERS_COUNT: u64 = 4;
    const VALUES_PER_PRODUCER: u64 = 250;
    const VALUES_PER_ROUND: u64 = PRODUCERS_COUNT * VALUES_PER_PRODUCER;

    let queue = Arc::new(LinkedQueue::new());

    // Repeatedly drain the queue to empty and refill it, so the
    // empty-tail races (first push, push after drain) get exercised.
    for round in 0..ROUNDS_COUNT {
        let popped = Arc::new(AtomicU64::new(0));
        let mut handles = Vec::new();

        for producer in 0..PRODUCERS_COUNT {
            let queue = Arc::clone(&queue);
            handles.push(thread::spawn(move || {
                let base = round * VALUES_PER_ROUND + producer * VALUES_PER_PRODUCER;
                for i in 0..VALUES_PER_PRODUCER {
                    queue.push(base + i);
                }
            }));
        }

        for _ in 0..2 {
            let queue = Arc::clone(&queue);
            let popped = Arc::clone(&popped);
            handles.push(thread::spawn(move || {
                let deadline = Instant::now() + STRESS_TIMEOUT;
                while popped.load(Ordering::Acquire) < VALUES_PER_ROUND {
                    if queue.pop().is_some() {
                        popped.fetch_add(1, Ordering::AcqRel);
                    } else {
                        assert!(Instant::now() < deadline, "elements were lost");
                        thread::yield_now();
                    }
                }
            }));
        }

        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(queue.pop(), None, "round {} left elements behind", round);
        assert_eq!(queue.len(), 0);
    }
}

#[test]
fn test_mixed_operations_stress() {
    use rand::Rng;

    const THREADS_COUNT: u64 = 8;
    const OPS_PER_THREAD: u64 = 10_000;

    let queue = Arc::new(LinkedQueue::new());
    let pushes = Arc::new(AtomicU64::new(0));
    let pops = Arc::new(AtomicU64::new(0));

    let mut handles = Vec::new();
    for thread_id in 0..THREADS_COUNT {
        let queue = Arc::clone(&queue);
        let pushes = Arc::clone(&pushes);
        let pops = Arc::clone(&pops);
        handles.push(thread::spawn(move || {
            let mut rng = rand::thread_rng();
            for i in 0..OPS_PER_THREAD {
                if rng.gen_bool(0.5) {
                    queue.push(thread_id * OPS_PER_THREAD + i);
                    pushes.fetch_add(1, Ordering::AcqRel);
                } else if queue.pop().is_some() {
                    pops.fetch_add(1, Ordering::AcqRel);
                }
            }
        }));
    }

    for handle in handles {
        handle.join().unwrap();
    }

    // Drain the remainder; every push must be matched by exactly one pop.
    while queue.pop().is_some() {
        pops.fetch_add(1, Ordering::AcqRel);
    }
    assert_eq!(
        pushes.load(Ordering::Acquire),
        pops.load(Ordering::Acquire)
    );
    assert_eq!(queue.len(), 0);
}
