//! Stateright model for the flag-based linked queue.
//!
//! Models the protocol at the granularity of its atomic steps: every
//! load, store, and CAS on `head`, `tail`, and the per-node link/flag
//! words is one model action, so bounded BFS explores all interleavings
//! of the real algorithm's linearization points.

use std::collections::{BTreeMap, BTreeSet};

use stateright::Model;

/// Unique identifier for a node.
pub type NodeId = u64;

/// Unique identifier for a thread.
pub type ThreadId = u64;

/// A node's successor word: pointer plus detached tag, as one atom.
///
/// Detaching sets the tag but keeps the successor bits, mirroring the
/// implementation's tagged pointer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Link {
    pub successor: Option<NodeId>,
    pub detached: bool,
}

impl Link {
    /// A live link with no successor yet.
    pub const UNSET: Link = Link {
        successor: None,
        detached: false,
    };

    fn to(node: NodeId) -> Link {
        Link {
            successor: Some(node),
            detached: false,
        }
    }
}

/// A node in the queue.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Node {
    pub value: u64,
    pub next: Link,
    pub deleted: bool,
}

impl Node {
    /// Whether the node is still logically part of the queue.
    fn in_queue(&self) -> bool {
        !self.deleted && !self.next.detached
    }
}

/// Thread-local state for ongoing operations.
///
/// Each variant names the single atomic step the thread performs next.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ThreadState {
    Idle,
    /// Push: node allocated; next step reads `tail`
    PushAllocated { node_id: NodeId, value: u64 },
    /// Push: observed a null tail; next step is the empty-path CAS
    PushCasEmpty { node_id: NodeId, value: u64 },
    /// Push: empty-path CAS succeeded; head store pending
    PushStoreHead { node_id: NodeId },
    /// Push: observed a tail node; next step reads its link word
    PushReadNext {
        node_id: NodeId,
        value: u64,
        observed_tail: NodeId,
    },
    /// Push: observed a detached link; next step resets `tail` to null
    PushResetTail {
        node_id: NodeId,
        value: u64,
        observed_tail: NodeId,
    },
    /// Push: observed a successor; next step helps `tail` forward
    PushHelpTail {
        node_id: NodeId,
        value: u64,
        observed_tail: NodeId,
        successor: NodeId,
    },
    /// Push: observed an unset link; next step is the linking CAS
    PushCasNext {
        node_id: NodeId,
        value: u64,
        observed_tail: NodeId,
    },
    /// Push: linked; tail advance pending
    PushAdvanceTail {
        node_id: NodeId,
        observed_tail: NodeId,
    },
    /// Pop: next step reads `head`
    PopReadHead,
    /// Pop: observed a head node; next step reads its deletion flag
    PopCheckFlag { observed_head: NodeId },
    /// Pop: flag was live; next step is the detaching CAS
    PopDetach { observed_head: NodeId },
    /// Pop: claimed the node; flag store pending
    PopMarkDeleted {
        observed_head: NodeId,
        successor: Option<NodeId>,
    },
    /// Pop: flag stored; tail purge pending
    PopPurgeTail {
        observed_head: NodeId,
        successor: Option<NodeId>,
    },
    /// Pop: tail purged; head advance pending
    PopCasHead {
        observed_head: NodeId,
        successor: Option<NodeId>,
    },
}

/// State of the linked queue model.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QueueState {
    /// Oldest still-queued node, or None if believed empty
    pub head: Option<NodeId>,
    /// Tail hint
    pub tail: Option<NodeId>,
    /// All nodes ever allocated (the model is garbage-collected)
    pub nodes: BTreeMap<NodeId, Node>,
    /// Counter for allocating new node IDs
    pub node_id_next: NodeId,
    /// Values whose linking CAS has succeeded
    pub pushed: BTreeSet<u64>,
    /// Values whose detaching CAS has succeeded
    pub popped: BTreeSet<u64>,
    /// Thread states
    pub threads: BTreeMap<ThreadId, ThreadState>,
}

impl QueueState {
    /// Create initial state with given number of threads.
    pub fn new(threads_count: u64) -> Self {
        debug_assert!(threads_count > 0, "Must have at least one thread");
        debug_assert!(threads_count <= 4, "Model checking with many threads is slow");

        let mut threads = BTreeMap::new();
        for tid in 0..threads_count {
            threads.insert(tid, ThreadState::Idle);
        }

        Self {
            head: None,
            tail: None,
            nodes: BTreeMap::new(),
            node_id_next: 0,
            pushed: BTreeSet::new(),
            popped: BTreeSet::new(),
            threads,
        }
    }

    /// Nodes reachable from any shared root or any thread-held reference.
    ///
    /// Two kinds of nodes are transiently reachable only through the
    /// thread operating on them: a seeded node whose producer has not yet
    /// published `head`, and a detached node's successor held by the
    /// consumer that claimed it. Both count as roots; without them the
    /// loss check would flag benign transients.
    fn reachable_ids(&self) -> BTreeSet<NodeId> {
        let mut stack: Vec<NodeId> = Vec::new();
        if let Some(h) = self.head {
            stack.push(h);
        }
        if let Some(t) = self.tail {
            stack.push(t);
        }
        for state in self.threads.values() {
            match state {
                ThreadState::PushStoreHead { node_id }
                | ThreadState::PushAdvanceTail { node_id, .. } => stack.push(*node_id),
                ThreadState::PopMarkDeleted {
                    successor: Some(s), ..
                }
                | ThreadState::PopPurgeTail {
                    successor: Some(s), ..
                }
                | ThreadState::PopCasHead {
                    successor: Some(s), ..
                } => stack.push(*s),
                _ => {}
            }
        }

        let mut seen = BTreeSet::new();
        while let Some(id) = stack.pop() {
            if seen.insert(id) {
                if let Some(node) = self.nodes.get(&id) {
                    // Successor bits survive detachment, so the chain
                    // stays walkable through claimed nodes.
                    if let Some(n) = node.next.successor {
                        stack.push(n);
                    }
                }
            }
        }
        seen
    }

    /// Values of reachable nodes still logically in the queue.
    fn live_values(&self) -> BTreeSet<u64> {
        self.reachable_ids()
            .iter()
            .filter_map(|id| {
                let node = &self.nodes[id];
                if node.in_queue() {
                    Some(node.value)
                } else {
                    None
                }
            })
            .collect()
    }

    /// Queue contents by walking the chain from head (quiescent states).
    pub fn contents(&self) -> Vec<u64> {
        let mut result = Vec::new();
        let mut current = self.head;

        while let Some(node_id) = current {
            match self.nodes.get(&node_id) {
                Some(node) => {
                    if node.in_queue() {
                        result.push(node.value);
                    }
                    current = node.next.successor;
                }
                None => break,
            }
        }

        result
    }

    // ========== Invariants ==========

    /// NoLostElements: every linked value is still queued, captured by a
    /// consumer, or popped.
    pub fn no_lost_elements(&self) -> bool {
        let live = self.live_values();
        self.pushed
            .iter()
            .all(|value| live.contains(value) || self.popped.contains(value))
    }

    /// NoDoubleDelivery: no value is both popped and still queued.
    pub fn no_double_delivery(&self) -> bool {
        let live = self.live_values();
        live.intersection(&self.popped).next().is_none()
    }

    /// Combined invariant check.
    pub fn invariants_hold(&self) -> bool {
        self.no_lost_elements() && self.no_double_delivery()
    }
}

/// Actions that threads can take.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum QueueAction {
    /// Thread begins a push of `value` by allocating a node
    StartPush { thread: ThreadId, value: u64 },
    /// Thread begins a pop
    StartPop { thread: ThreadId },
    /// Thread performs its pending atomic step
    Step { thread: ThreadId },
}

/// Model for bounded model checking.
pub struct QueueModel {
    pub threads_count: u64,
    pub values: Vec<u64>,
}

impl QueueModel {
    /// Create a new model with given parameters.
    pub fn new(threads_count: u64, values: Vec<u64>) -> Self {
        debug_assert!(threads_count > 0);
        debug_assert!(!values.is_empty());

        Self {
            threads_count,
            values,
        }
    }
}

impl Model for QueueModel {
    type State = QueueState;
    type Action = QueueAction;

    fn init_states(&self) -> Vec<Self::State> {
        vec![QueueState::new(self.threads_count)]
    }

    fn actions(&self, state: &Self::State, actions: &mut Vec<Self::Action>) {
        for (&tid, thread_state) in &state.threads {
            match thread_state {
                ThreadState::Idle => {
                    // Values being pushed by other threads but not yet linked
                    let in_flight: BTreeSet<u64> = state
                        .threads
                        .values()
                        .filter_map(|ts| match ts {
                            ThreadState::PushAllocated { value, .. }
                            | ThreadState::PushCasEmpty { value, .. }
                            | ThreadState::PushReadNext { value, .. }
                            | ThreadState::PushResetTail { value, .. }
                            | ThreadState::PushHelpTail { value, .. }
                            | ThreadState::PushCasNext { value, .. } => Some(*value),
                            _ => None,
                        })
                        .collect();

                    for &value in &self.values {
                        if !state.pushed.contains(&value) && !in_flight.contains(&value) {
                            actions.push(QueueAction::StartPush { thread: tid, value });
                        }
                    }
                    if state.head.is_some() {
                        actions.push(QueueAction::StartPop { thread: tid });
                    }
                }
                _ => {
                    actions.push(QueueAction::Step { thread: tid });
                }
            }
        }
    }

    fn next_state(&self, state: &Self::State, action: Self::Action) -> Option<Self::State> {
        let mut next = state.clone();

        match action {
            QueueAction::StartPush { thread, value } => {
                let node_id = next.node_id_next;
                next.node_id_next += 1;

                next.nodes.insert(
                    node_id,
                    Node {
                        value,
                        next: Link::UNSET,
                        deleted: false,
                    },
                );
                next.threads
                    .insert(thread, ThreadState::PushAllocated { node_id, value });
            }

            QueueAction::StartPop { thread } => {
                next.threads.insert(thread, ThreadState::PopReadHead);
            }

            QueueAction::Step { thread } => {
                let thread_state = next.threads.get(&thread).cloned()?;
                match thread_state {
                    ThreadState::Idle => return None,

                    // ----- push -----
                    ThreadState::PushAllocated { node_id, value } => {
                        let new_state = match next.tail {
                            None => ThreadState::PushCasEmpty { node_id, value },
                            Some(observed_tail) => ThreadState::PushReadNext {
                                node_id,
                                value,
                                observed_tail,
                            },
                        };
                        next.threads.insert(thread, new_state);
                    }

                    ThreadState::PushCasEmpty { node_id, value } => {
                        if next.tail.is_none() {
                            // CAS succeeds: the push is linked
                            next.tail = Some(node_id);
                            next.pushed.insert(value);
                            next.threads
                                .insert(thread, ThreadState::PushStoreHead { node_id });
                        } else {
                            // Lost the empty race: retry against the new tail
                            next.threads
                                .insert(thread, ThreadState::PushAllocated { node_id, value });
                        }
                    }

                    ThreadState::PushStoreHead { node_id } => {
                        // Unconditional store, as in the implementation
                        next.head = Some(node_id);
                        next.threads.insert(thread, ThreadState::Idle);
                    }

                    ThreadState::PushReadNext {
                        node_id,
                        value,
                        observed_tail,
                    } => {
                        let link = next.nodes[&observed_tail].next;
                        let new_state = if let Some(successor) = link.successor {
                            // Successor exists, detached or not: the hint
                            // can be helped forward
                            ThreadState::PushHelpTail {
                                node_id,
                                value,
                                observed_tail,
                                successor,
                            }
                        } else if link.detached {
                            ThreadState::PushResetTail {
                                node_id,
                                value,
                                observed_tail,
                            }
                        } else {
                            ThreadState::PushCasNext {
                                node_id,
                                value,
                                observed_tail,
                            }
                        };
                        next.threads.insert(thread, new_state);
                    }

                    ThreadState::PushResetTail {
                        node_id,
                        value,
                        observed_tail,
                    } => {
                        if next.tail == Some(observed_tail) {
                            next.tail = None;
                        }
                        next.threads
                            .insert(thread, ThreadState::PushAllocated { node_id, value });
                    }

                    ThreadState::PushHelpTail {
                        node_id,
                        value,
                        observed_tail,
                        successor,
                    } => {
                        if next.tail == Some(observed_tail) {
                            next.tail = Some(successor);
                        }
                        next.threads
                            .insert(thread, ThreadState::PushAllocated { node_id, value });
                    }

                    ThreadState::PushCasNext {
                        node_id,
                        value,
                        observed_tail,
                    } => {
                        if next.nodes[&observed_tail].next == Link::UNSET {
                            // CAS succeeds: the push is linked
                            next.nodes.get_mut(&observed_tail)?.next = Link::to(node_id);
                            next.pushed.insert(value);
                            next.threads.insert(
                                thread,
                                ThreadState::PushAdvanceTail {
                                    node_id,
                                    observed_tail,
                                },
                            );
                        } else {
                            next.threads
                                .insert(thread, ThreadState::PushAllocated { node_id, value });
                        }
                    }

                    ThreadState::PushAdvanceTail {
                        node_id,
                        observed_tail,
                    } => {
                        if next.tail == Some(observed_tail) {
                            next.tail = Some(node_id);
                        }
                        next.threads.insert(thread, ThreadState::Idle);
                    }

                    // ----- pop -----
                    ThreadState::PopReadHead => {
                        let new_state = match next.head {
                            None => ThreadState::Idle, // pop-empty completes
                            Some(observed_head) => ThreadState::PopCheckFlag { observed_head },
                        };
                        next.threads.insert(thread, new_state);
                    }

                    ThreadState::PopCheckFlag { observed_head } => {
                        let new_state = if next.nodes[&observed_head].deleted {
                            // Claimed by a concurrent popper: busy-retry
                            ThreadState::PopReadHead
                        } else {
                            ThreadState::PopDetach { observed_head }
                        };
                        next.threads.insert(thread, new_state);
                    }

                    ThreadState::PopDetach { observed_head } => {
                        let node = next.nodes[&observed_head].clone();
                        if node.deleted || node.next.detached {
                            // Lost the claim race
                            next.threads.insert(thread, ThreadState::PopReadHead);
                        } else {
                            // CAS succeeds: the pop is linearized here
                            let successor = node.next.successor;
                            next.nodes.get_mut(&observed_head)?.next = Link {
                                successor,
                                detached: true,
                            };
                            next.popped.insert(node.value);
                            next.threads.insert(
                                thread,
                                ThreadState::PopMarkDeleted {
                                    observed_head,
                                    successor,
                                },
                            );
                        }
                    }

                    ThreadState::PopMarkDeleted {
                        observed_head,
                        successor,
                    } => {
                        next.nodes.get_mut(&observed_head)?.deleted = true;
                        next.threads.insert(
                            thread,
                            ThreadState::PopPurgeTail {
                                observed_head,
                                successor,
                            },
                        );
                    }

                    ThreadState::PopPurgeTail {
                        observed_head,
                        successor,
                    } => {
                        if next.tail == Some(observed_head) {
                            next.tail = successor;
                        }
                        next.threads.insert(
                            thread,
                            ThreadState::PopCasHead {
                                observed_head,
                                successor,
                            },
                        );
                    }

                    ThreadState::PopCasHead {
                        observed_head,
                        successor,
                    } => {
                        if next.head == Some(observed_head) {
                            next.head = successor;
                        }
                        next.threads.insert(thread, ThreadState::Idle);
                    }
                }
            }
        }

        Some(next)
    }

    fn properties(&self) -> Vec<stateright::Property<Self>> {
        vec![
            stateright::Property::always("NoLostElements", |_model: &Self, state: &Self::State| {
                state.no_lost_elements()
            }),
            stateright::Property::always(
                "NoDoubleDelivery",
                |_model: &Self, state: &Self::State| state.no_double_delivery(),
            ),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stateright::Checker;

    #[test]
    fn test_initial_state() {
        let state = QueueState::new(2);
        assert!(state.head.is_none());
        assert!(state.tail.is_none());
        assert!(state.nodes.is_empty());
        assert!(state.invariants_hold());
    }

    #[test]
    fn test_model_checking_small() {
        let model = QueueModel::new(2, vec![1, 2]);

        // Run bounded model checking
        model
            .checker()
            .threads(1)
            .spawn_bfs()
            .join()
            .assert_properties();
    }

    #[test]
    #[ignore] // Slower test, run with --ignored
    fn test_model_checking_medium() {
        let model = QueueModel::new(3, vec![1, 2, 3]);

        model
            .checker()
            .threads(num_cpus::get())
            .spawn_bfs()
            .join()
            .assert_properties();
    }
}
