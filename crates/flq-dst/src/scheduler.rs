//! Deterministic interleave scheduler.
//!
//! Picks which simulated producer or consumer acts next, in a
//! reproducible way. Seeded scheduling is what turns one workload into
//! many distinct operation interleavings.

use crate::random::DeterministicRng;

/// Deterministic scheduler over a set of runnable simulated threads.
///
/// Given the same seed and the same sequence of runnable sets, always
/// produces the same sequence of picks. Tends to keep the last-picked
/// thread running for a while (bursts), controlled by the switch
/// probability.
pub struct InterleaveScheduler {
    rng: DeterministicRng,
    last_pick: Option<usize>,
    /// Probability of switching away from the last-picked thread
    switch_probability: f64,
    decisions_count: u64,
}

/// Maximum decisions before warning.
const DECISIONS_COUNT_WARNING_MAX: u64 = 10_000_000;

impl InterleaveScheduler {
    /// Create a new scheduler.
    ///
    /// # Arguments
    /// - `rng`: Deterministic RNG for scheduling decisions
    /// - `switch_probability`: Probability of switching threads per pick
    pub fn new(rng: DeterministicRng, switch_probability: f64) -> Self {
        debug_assert!(
            (0.0..=1.0).contains(&switch_probability),
            "Switch probability must be in [0.0, 1.0]"
        );

        Self {
            rng,
            last_pick: None,
            switch_probability,
            decisions_count: 0,
        }
    }

    /// Create with default switch probability (50%).
    pub fn with_defaults(rng: DeterministicRng) -> Self {
        Self::new(rng, 0.5)
    }

    /// Pick the next thread to run from the runnable set.
    ///
    /// `runnable` must be non-empty; its entries are simulated thread
    /// indices.
    pub fn pick(&mut self, runnable: &[usize]) -> usize {
        debug_assert!(!runnable.is_empty(), "Must have a runnable thread");
        self.decisions_count += 1;
        debug_assert!(
            self.decisions_count < DECISIONS_COUNT_WARNING_MAX,
            "Very high number of scheduling decisions - possible infinite loop"
        );

        if runnable.len() == 1 {
            self.last_pick = Some(runnable[0]);
            return runnable[0];
        }

        if let Some(last) = self.last_pick {
            if runnable.contains(&last) && !self.rng.gen_bool(self.switch_probability) {
                return last;
            }
        }

        // Switch to a runnable thread other than the last one
        loop {
            let candidate = runnable[self.rng.gen_range(0..runnable.len())];
            if Some(candidate) != self.last_pick {
                self.last_pick = Some(candidate);
                return candidate;
            }
        }
    }

    /// Get number of decisions made.
    #[must_use]
    pub fn decisions_count(&self) -> u64 {
        self.decisions_count
    }
}
