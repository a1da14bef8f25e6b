//! Pending motor activations ordered by playback time.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use crate::motor::MotorId;

/// One character occurrence waiting for the playback clock to reach it.
#[derive(Debug, Clone, Copy)]
pub struct ActivationEvent {
    pub motor: MotorId,
    pub scheduled_time: f64,
    seq: u64,
}

impl PartialEq for ActivationEvent {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}
impl Eq for ActivationEvent {}
impl PartialOrd for ActivationEvent {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for ActivationEvent {
    // Reversed so the max-heap pops the earliest event first.
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .scheduled_time
            .total_cmp(&self.scheduled_time)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

/// Why an event was refused by [`ActivationQueue::push`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejected {
    NonFiniteTime,
    Full,
}

/// Min-ordered queue of activation events with a hard capacity.
#[derive(Debug)]
pub struct ActivationQueue {
    heap: BinaryHeap<ActivationEvent>,
    capacity: usize,
    next_seq: u64,
}

impl ActivationQueue {
    pub fn new(capacity: usize) -> Self {
        Self {
            heap: BinaryHeap::new(),
            capacity,
            next_seq: 0,
        }
    }

    pub fn push(&mut self, motor: MotorId, scheduled_time: f64) -> Result<(), Rejected> {
        if !scheduled_time.is_finite() {
            return Err(Rejected::NonFiniteTime);
        }
        if self.heap.len() >= self.capacity {
            return Err(Rejected::Full);
        }
        let seq = self.next_seq;
        self.next_seq += 1;
        self.heap.push(ActivationEvent {
            motor,
            scheduled_time,
            seq,
        });
        Ok(())
    }

    /// Removes every event scheduled at or before `now`, earliest first.
    pub fn drain_due(&mut self, now: f64) -> Vec<MotorId> {
        let mut due = Vec::new();
        while let Some(event) = self.heap.peek() {
            if event.scheduled_time > now {
                break;
            }
            if let Some(event) = self.heap.pop() {
                due.push(event.motor);
            }
        }
        due
    }

    /// Time of the earliest pending event.
    pub fn next_due(&self) -> Option<f64> {
        self.heap.peek().map(|event| event.scheduled_time)
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn clear(&mut self) {
        self.heap.clear();
    }
}
