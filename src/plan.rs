//! A time-ordered queue of pending work ("plans").
//!
//! `Queue<T, P>` keeps payloads of type `T` ordered by `f64` time, then by a
//! priority `P` (the execution phase for `Context`), then by insertion order.
//! Adding and popping are *O*(log(*n*)).
//!
//! `Context` uses it for simulation ticks, meeting-log replay and daily
//! snapshots, which all must fire in strictly ascending time.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

pub struct Queue<T, P: Ord> {
    queue: BinaryHeap<Entry<T, P>>,
    plan_counter: u64,
}

impl<T, P: Ord> Queue<T, P> {
    #[must_use]
    pub fn new() -> Queue<T, P> {
        Queue {
            queue: BinaryHeap::new(),
            plan_counter: 0,
        }
    }

    pub fn add_plan(&mut self, time: f64, data: T, priority: P) {
        self.queue.push(Entry {
            time,
            priority,
            sequence: self.plan_counter,
            data,
        });
        self.plan_counter += 1;
    }

    /// Pop the earliest plan.
    pub fn get_next_plan(&mut self) -> Option<Plan<T>> {
        self.queue.pop().map(|entry| Plan {
            time: entry.time,
            data: entry.data,
        })
    }

    pub fn clear(&mut self) {
        self.queue.clear();
    }
}

impl<T, P: Ord> Default for Queue<T, P> {
    fn default() -> Self {
        Self::new()
    }
}

/// Heap entry. Ordering ignores the payload.
struct Entry<T, P: Ord> {
    time: f64,
    priority: P,
    sequence: u64,
    data: T,
}

impl<T, P: Ord> PartialEq for Entry<T, P> {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl<T, P: Ord> Eq for Entry<T, P> {}

impl<T, P: Ord> PartialOrd for Entry<T, P> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

// `BinaryHeap` is a max-heap, so every comparison is reversed to pop the
// earliest time, then the lowest priority, then the oldest entry.
impl<T, P: Ord> Ord for Entry<T, P> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.time
            .total_cmp(&other.time)
            .then_with(|| self.priority.cmp(&other.priority))
            .then_with(|| self.sequence.cmp(&other.sequence))
            .reverse()
    }
}

/// A payload scheduled for `time`.
pub struct Plan<T> {
    pub time: f64,
    pub data: T,
}
