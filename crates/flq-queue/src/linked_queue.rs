//! Unbounded MPMC FIFO queue over a singly-linked list, synchronized with
//! CAS and per-node state flags. No locks anywhere.
//!
//! ## Protocol
//!
//! Producers append at the tail: CAS the tail node's `next` from unset to
//! the new node, then advance the `tail` hint. Consumers remove at the
//! head: CAS the head node's `next` from its observed value to the
//! detached marker (which claims the node exclusively and captures its
//! successor), mark the node deleted, then advance `head`.
//!
//! `tail` is only a hint: it may lag behind the true last node, or, after
//! the queue drains, keep referencing an already-deleted node until the
//! next producer restores it. It is never authoritative for ownership.
//!
//! ## Detached links
//!
//! A node's `next` uses its pointer tag bit to mark the link as
//! detached, keeping the successor bits in place under the tag. The tag
//! makes the detaching CAS a real transition even when the observed
//! successor is null, so at most one consumer can ever claim a node, and
//! a producer can never link a new element onto a node that has left the
//! chain. Preserving the successor bits lets a producer that finds the
//! tail hint on a detached node still steer the hint to the successor
//! instead of cutting live nodes loose.
//!
//! ## Reclamation
//!
//! Nodes are freed through `crossbeam-epoch`. A consumer purges the node
//! from the `tail` hint before handing it to the collector, and every
//! `tail` update is a compare-exchange from the observed value, so a
//! reclaimed node can never reappear in a shared root. Any thread still
//! pinned from before the detach keeps the node's memory alive.

use std::fmt;
use std::mem::ManuallyDrop;
use std::ptr;
use std::sync::atomic::{AtomicI64, AtomicU32, Ordering};

use crossbeam_epoch::{self as epoch, Atomic, Guard, Owned, Shared};
use crossbeam_utils::{Backoff, CachePadded};

use flq_core::{FifoQueue, PeekUnsupported};

/// Node state: still owned by the chain.
const STATE_LIVE: u32 = 0;
/// Node state: claimed by a consumer; terminal.
const STATE_DELETED: u32 = 1;

/// Tag bit on a node's `next` pointer marking the link as detached.
const TAG_DETACHED: usize = 1;

/// One link in the queue's chain.
struct Node<T> {
    /// Stored element; ownership moves out exactly once, at pop (or at
    /// queue drop for elements never popped).
    value: ManuallyDrop<T>,
    /// Successor link. Untagged: live (null = no successor yet).
    /// Tagged: detached by a consumer, successor bits preserved; no
    /// linking CAS can hit it again.
    next: Atomic<Node<T>>,
    /// `STATE_LIVE` until a consumer claims the node.
    state: AtomicU32,
}

impl<T> Node<T> {
    fn new(value: T) -> Self {
        Self {
            value: ManuallyDrop::new(value),
            next: Atomic::null(),
            state: AtomicU32::new(STATE_LIVE),
        }
    }

    fn is_deleted(&self) -> bool {
        self.state.load(Ordering::Acquire) == STATE_DELETED
    }

    fn mark_deleted(&self) {
        self.state.store(STATE_DELETED, Ordering::Release);
    }

    /// Detach this node's successor link, claiming the node.
    ///
    /// Returns the captured successor on success. Returns `None` if a
    /// concurrent consumer already claimed the node (its state turned
    /// deleted, or the detached tag was observed). The CAS from the
    /// observed untagged value to the same value tagged succeeds at most
    /// once per node, which is what guarantees each element is returned
    /// to exactly one caller.
    fn detach_next<'g>(&self, guard: &'g Guard) -> Option<Shared<'g, Node<T>>> {
        while !self.is_deleted() {
            let next = self.next.load(Ordering::Acquire, guard);
            if next.tag() == TAG_DETACHED {
                return None;
            }
            if self
                .next
                .compare_exchange(
                    next,
                    next.with_tag(TAG_DETACHED),
                    Ordering::AcqRel,
                    Ordering::Acquire,
                    guard,
                )
                .is_ok()
            {
                return Some(next);
            }
        }
        None
    }
}

/// Unbounded lock-free MPMC FIFO queue.
///
/// Any number of threads may call [`push`](LinkedQueue::push) and
/// [`pop`](LinkedQueue::pop) concurrently. Operations never block; under
/// contention they retry in a local spin loop with backoff. FIFO order is
/// preserved between operations that are not concurrent with each other:
/// if one push completes before another begins, the first element is
/// popped first.
///
/// # Example
///
/// ```rust
/// use flq_queue::LinkedQueue;
///
/// let queue = LinkedQueue::new();
/// queue.push(1);
/// queue.push(2);
/// assert_eq!(queue.pop(), Some(1));
/// assert_eq!(queue.pop(), Some(2));
/// assert_eq!(queue.pop(), None);
/// ```
pub struct LinkedQueue<T> {
    /// Oldest still-queued node, or null if empty.
    head: CachePadded<Atomic<Node<T>>>,
    /// Hint to (at or near) the chain's end; null when believed empty.
    tail: CachePadded<Atomic<Node<T>>>,
    /// Approximate element count. Observability only; push and pop never
    /// consult it.
    size: CachePadded<AtomicI64>,
}

unsafe impl<T: Send> Send for LinkedQueue<T> {}
unsafe impl<T: Send> Sync for LinkedQueue<T> {}

impl<T> LinkedQueue<T> {
    /// Create an empty queue.
    #[must_use]
    pub fn new() -> Self {
        Self {
            head: CachePadded::new(Atomic::null()),
            tail: CachePadded::new(Atomic::null()),
            size: CachePadded::new(AtomicI64::new(0)),
        }
    }

    /// Append `value` at the logical tail. Always succeeds.
    ///
    /// Linearizes at the CAS that links the node into the chain.
    pub fn push(&self, value: T) -> bool {
        let guard = &epoch::pin();
        let mut node = Owned::new(Node::new(value));
        let backoff = Backoff::new();

        loop {
            let tail = self.tail.load(Ordering::Acquire, guard);
            let tail_ref = match unsafe { tail.as_ref() } {
                Some(tail_ref) => tail_ref,
                None => {
                    // Queue believed empty: install the node as tail, then
                    // publish it as head.
                    match self.tail.compare_exchange(
                        tail,
                        node,
                        Ordering::AcqRel,
                        Ordering::Acquire,
                        guard,
                    ) {
                        Ok(linked) => {
                            self.head.store(linked, Ordering::Release);
                            self.size.fetch_add(1, Ordering::Relaxed);
                            return true;
                        }
                        Err(err) => {
                            // Another producer won the empty race. Retry
                            // against the now non-null tail; linking
                            // through the stale null would be fatal.
                            node = err.new;
                            backoff.spin();
                            continue;
                        }
                    }
                }
            };

            let next = tail_ref.next.load(Ordering::Acquire, guard);
            if !next.is_null() {
                // Stale hint: a successor exists (the node may even be
                // detached already, with the successor preserved under
                // the tag). Help the hint forward and retry.
                let _ = self.tail.compare_exchange(
                    tail,
                    next.with_tag(0),
                    Ordering::AcqRel,
                    Ordering::Acquire,
                    guard,
                );
                backoff.spin();
                continue;
            }
            if next.tag() == TAG_DETACHED {
                // The hint still references the last node popped before
                // the queue drained. Restore the empty state and retry.
                let _ = self.tail.compare_exchange(
                    tail,
                    Shared::null(),
                    Ordering::AcqRel,
                    Ordering::Acquire,
                    guard,
                );
                continue;
            }

            match tail_ref.next.compare_exchange(
                next,
                node,
                Ordering::AcqRel,
                Ordering::Acquire,
                guard,
            ) {
                Ok(linked) => {
                    // Advance the hint. Failure means someone else already
                    // moved it (or reset it); the hint self-repairs.
                    let _ = self.tail.compare_exchange(
                        tail,
                        linked,
                        Ordering::AcqRel,
                        Ordering::Acquire,
                        guard,
                    );
                    self.size.fetch_add(1, Ordering::Relaxed);
                    return true;
                }
                Err(err) => {
                    node = err.new;
                    backoff.spin();
                }
            }
        }
    }

    /// Remove and return the oldest element, or `None` if the queue is
    /// empty. Non-blocking; may spin briefly under contention.
    ///
    /// Linearizes at the CAS that detaches the head node's link.
    pub fn pop(&self) -> Option<T> {
        let guard = &epoch::pin();
        let backoff = Backoff::new();

        loop {
            let head = self.head.load(Ordering::Acquire, guard);
            let head_ref = unsafe { head.as_ref() }?;

            if head_ref.is_deleted() {
                // Claimed by a concurrent popper that has not advanced
                // head yet; wait for it to finish.
                backoff.snooze();
                continue;
            }

            let next = match head_ref.detach_next(guard) {
                Some(next) => next,
                None => {
                    // Lost the claim race; start over from the new head.
                    backoff.spin();
                    continue;
                }
            };
            debug_assert!(next.tag() != TAG_DETACHED);

            head_ref.mark_deleted();

            // Purge the tail hint before the node reaches the collector:
            // no shared root may reference a reclaimable node.
            loop {
                let tail = self.tail.load(Ordering::Acquire, guard);
                if tail != head {
                    break;
                }
                if self
                    .tail
                    .compare_exchange(tail, next, Ordering::AcqRel, Ordering::Acquire, guard)
                    .is_ok()
                {
                    break;
                }
            }

            // Advance head. Failure means head already moved on (e.g. a
            // producer re-seeded a drained queue); skipping is fine.
            let _ = self
                .head
                .compare_exchange(head, next, Ordering::AcqRel, Ordering::Acquire, guard);
            self.size.fetch_sub(1, Ordering::Relaxed);

            let value = unsafe { ptr::read(&*head_ref.value) };
            unsafe { guard.defer_destroy(head) };
            return Some(value);
        }
    }

    /// Read the oldest element without removing it.
    ///
    /// Not supported: a concurrent [`pop`](LinkedQueue::pop) transfers
    /// ownership of the head value, and epoch pinning keeps the node
    /// alive but not the value, so a non-destructive read cannot be made
    /// safe. Always returns `Err(PeekUnsupported)`.
    pub fn peek(&self) -> Result<Option<T>, PeekUnsupported> {
        Err(PeekUnsupported)
    }

    /// Approximate number of elements currently enqueued.
    ///
    /// Eventually consistent with completed pushes and pops. The counter
    /// can transiently underrun when a pop's decrement lands before the
    /// matching push's increment, so it is clamped at zero.
    #[must_use]
    pub fn len(&self) -> u64 {
        self.size.load(Ordering::Relaxed).max(0) as u64
    }

    /// Whether the queue appears empty. Approximate, like
    /// [`len`](LinkedQueue::len).
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<T> Default for LinkedQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for LinkedQueue<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LinkedQueue").field("len", &self.len()).finish()
    }
}

impl<T: Send> FifoQueue<T> for LinkedQueue<T> {
    fn push(&self, value: T) -> bool {
        LinkedQueue::push(self, value)
    }

    fn pop(&self) -> Option<T> {
        LinkedQueue::pop(self)
    }

    fn peek(&self) -> Result<Option<T>, PeekUnsupported> {
        LinkedQueue::peek(self)
    }

    fn len(&self) -> u64 {
        LinkedQueue::len(self)
    }
}

impl<T> Drop for LinkedQueue<T> {
    fn drop(&mut self) {
        // Exclusive access: walk the chain and free the remaining nodes.
        // Nodes already popped were handed to the epoch collector with
        // their values moved out, so only live nodes remain reachable.
        unsafe {
            let guard = epoch::unprotected();
            let mut current = self.head.load(Ordering::Relaxed, guard);
            while let Some(node) = current.as_ref() {
                debug_assert!(!node.is_deleted());
                let next = node.next.load(Ordering::Relaxed, guard);
                drop(ptr::read(&*node.value));
                drop(current.into_owned());
                current = next;
            }
        }
    }
}
