//! Counterexample capture for failed property checks.
//!
//! When an invariant is violated, the checker records the state snapshots
//! that show how the violation arose, plus the DST seed needed to replay
//! the run that produced it.

/// One observed state in a failing execution.
#[derive(Debug, Clone)]
pub struct StateSnapshot {
    /// Step number within the execution (1-based)
    pub step: u64,
    /// What happened at this step
    pub description: String,
    /// Named state variables and their rendered values
    pub variables: Vec<(String, String)>,
}

/// A reproducible witness for a property violation.
#[derive(Debug, Clone, Default)]
pub struct Counterexample {
    /// DST seed that reproduces the failing run, if the run was seeded
    pub seed: Option<u64>,
    /// State snapshots in execution order
    pub states: Vec<StateSnapshot>,
}

/// Maximum snapshots kept per counterexample.
const STATES_COUNT_MAX: usize = 256;

impl Counterexample {
    /// Create an empty counterexample.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a counterexample tagged with the DST seed that produced it.
    #[must_use]
    pub fn with_seed(seed: u64) -> Self {
        debug_assert!(seed != 0, "DST seed should not be zero");
        Self {
            seed: Some(seed),
            states: Vec::new(),
        }
    }

    /// Append a state snapshot.
    ///
    /// Snapshots past the cap are dropped so a runaway checker cannot
    /// produce an unreadable report.
    pub fn add_state(&mut self, state: StateSnapshot) {
        debug_assert!(state.step > 0, "Step must be positive");
        if self.states.len() < STATES_COUNT_MAX {
            self.states.push(state);
        }
    }

    /// Render the counterexample as a step-by-step diagram.
    #[must_use]
    pub fn render_diagram(&self) -> String {
        let mut out = String::new();
        if let Some(seed) = self.seed {
            out.push_str(&format!("reproduce with DST_SEED={}\n", seed));
        }
        for state in &self.states {
            out.push_str(&format!("step {}: {}\n", state.step, state.description));
            for (name, value) in &state.variables {
                out.push_str(&format!("    {} = {}\n", name, value));
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_includes_seed_and_steps() {
        let mut ce = Counterexample::with_seed(12345);
        ce.add_state(StateSnapshot {
            step: 1,
            description: "element 42 lost".to_string(),
            variables: vec![("head".to_string(), "None".to_string())],
        });

        let diagram = ce.render_diagram();
        assert!(diagram.contains("DST_SEED=12345"));
        assert!(diagram.contains("step 1"));
        assert!(diagram.contains("head = None"));
    }

    #[test]
    fn test_empty_counterexample_renders_empty() {
        let ce = Counterexample::new();
        assert!(ce.seed.is_none());
        assert!(ce.render_diagram().is_empty());
    }
}
