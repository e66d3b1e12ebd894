//! Deadline-ordered timers driven by an explicit clock.
//!
//! Nothing here reads the wall clock: callers pass `now` into
//! [`Scheduler::pop_due`], which makes a test's virtual clock and a host's
//! real clock interchangeable.

use std::cmp::{Ordering, Reverse};
use std::collections::{BinaryHeap, HashSet};
use std::time::{Duration, Instant};

/// Handle returned by [`Scheduler::schedule`], used to cancel the timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerId(u64);

/// Schedule a task at a deadline and get back a cancellable handle.
pub trait Scheduler<T> {
    /// Register `task` to fire at `at`.
    fn schedule(&mut self, at: Instant, task: T) -> TimerId;

    /// Register `task` to fire `after` the given instant.
    fn schedule_after(&mut self, from: Instant, after: Duration, task: T) -> TimerId {
        self.schedule(from + after, task)
    }

    /// Cancel a pending timer. Returns `false` if it already fired or was
    /// never issued by this scheduler.
    fn cancel(&mut self, id: TimerId) -> bool;

    /// Pop the earliest timer whose deadline is `<= now`.
    fn pop_due(&mut self, now: Instant) -> Option<(Instant, T)>;

    /// Deadline of the earliest live timer.
    fn next_deadline(&self) -> Option<Instant>;

    /// Cancel everything.
    fn clear(&mut self);

    /// Number of live (not fired, not cancelled) timers.
    fn pending(&self) -> usize;
}

struct Entry<T> {
    at: Instant,
    seq: u64,
    task: T,
}

impl<T> PartialEq for Entry<T> {
    fn eq(&self, other: &Self) -> bool {
        self.at == other.at && self.seq == other.seq
    }
}

impl<T> Eq for Entry<T> {}

impl<T> PartialOrd for Entry<T> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<T> Ord for Entry<T> {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.at, self.seq).cmp(&(other.at, other.seq))
    }
}

/// Binary-heap [`Scheduler`]. Equal deadlines fire in scheduling order.
///
/// Cancellation is lazy: cancelled entries stay in the heap until they
/// surface and are then discarded.
pub struct TimerQueue<T> {
    heap: BinaryHeap<Reverse<Entry<T>>>,
    live: HashSet<u64>,
    next_seq: u64,
}

impl<T> Default for TimerQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> TimerQueue<T> {
    /// Empty queue.
    pub fn new() -> Self {
        Self {
            heap: BinaryHeap::new(),
            live: HashSet::new(),
            next_seq: 0,
        }
    }

    /// Drop cancelled entries sitting at the top of the heap.
    fn discard_cancelled(&mut self) {
        while let Some(Reverse(top)) = self.heap.peek() {
            if self.live.contains(&top.seq) {
                break;
            }
            self.heap.pop();
        }
    }
}

impl<T> Scheduler<T> for TimerQueue<T> {
    fn schedule(&mut self, at: Instant, task: T) -> TimerId {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.live.insert(seq);
        self.heap.push(Reverse(Entry { at, seq, task }));
        TimerId(seq)
    }

    fn cancel(&mut self, id: TimerId) -> bool {
        let removed = self.live.remove(&id.0);
        self.discard_cancelled();
        removed
    }

    fn pop_due(&mut self, now: Instant) -> Option<(Instant, T)> {
        self.discard_cancelled();
        match self.heap.peek() {
            Some(Reverse(top)) if top.at <= now => {}
            _ => return None,
        }
        let Reverse(entry) = self.heap.pop()?;
        self.live.remove(&entry.seq);
        Some((entry.at, entry.task))
    }

    fn next_deadline(&self) -> Option<Instant> {
        self.heap
            .iter()
            .filter(|Reverse(e)| self.live.contains(&e.seq))
            .map(|Reverse(e)| e.at)
            .min()
    }

    fn clear(&mut self) {
        self.heap.clear();
        self.live.clear();
    }

    fn pending(&self) -> usize {
        self.live.len()
    }
}
