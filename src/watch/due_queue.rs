use std::cmp::Reverse;
use std::collections::BinaryHeap;

use tokio::time::Instant;

/// A path together with the time it is due to be checked again.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DueEntry {
    pub path: String,
    pub due: Instant,
}

#[derive(Debug, PartialEq, Eq, PartialOrd, Ord)]
struct Slot {
    due: Instant,
    // insertion order, breaks ties between equal due times
    seq: u64,
    path: String,
}

/// Min-queue of `(path, due time)` pairs.
///
/// Entries are never mutated in place: rescheduling a path means popping it
/// and inserting it again. Equal due times come out in insertion order.
///
/// # Performance
/// O(log N) insert and pop, O(1) peek
#[derive(Debug, Default)]
pub struct DueQueue {
    heap: BinaryHeap<Reverse<Slot>>,
    next_seq: u64,
}

impl DueQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(
        &mut self,
        path: impl Into<String>,
        due: Instant,
    ) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.heap.push(Reverse(Slot {
            due,
            seq,
            path: path.into(),
        }));
    }

    /// Removes and returns the entry with the earliest due time.
    pub fn pop_min(&mut self) -> Option<DueEntry> {
        self.heap.pop().map(|Reverse(slot)| DueEntry {
            path: slot.path,
            due: slot.due,
        })
    }

    pub fn peek_due(&self) -> Option<Instant> {
        self.heap.peek().map(|Reverse(slot)| slot.due)
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }
}
