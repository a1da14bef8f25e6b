//! Energized motors and their pending deactivations.
//!
//! Two ways of finding expired motors are supported:
//!
//! - [`ExpiryTracking::Scan`] walks every active entry each tick. The duration
//!   policy uses this.
//! - [`ExpiryTracking::DeadlineHeap`] pushes a deactivation deadline into a
//!   min-heap on each activation and pops due deadlines each tick. A deadline is
//!   honoured only if it is still the current one for its motor, so deadlines
//!   superseded by an extension or a cut-off are discarded silently.
//!
//! Either way there is at most one entry per motor.

use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap};

use crate::motor::MotorId;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExpiryTracking {
    Scan,
    DeadlineHeap,
}

/// Result of registering an activation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Activation {
    /// The motor was idle and is now energized.
    Energized,
    /// The motor was already energized; its expiry was kept or pushed later.
    Extended,
}

#[derive(Debug, Clone, Copy)]
struct Entry {
    energized_at: f64,
    expires_at: f64,
    generation: u64,
}

#[derive(Debug, Clone, Copy)]
struct Deadline {
    at: f64,
    motor: MotorId,
    generation: u64,
}

impl PartialEq for Deadline {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}
impl Eq for Deadline {}
impl PartialOrd for Deadline {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for Deadline {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .at
            .total_cmp(&self.at)
            .then_with(|| other.motor.cmp(&self.motor))
            .then_with(|| other.generation.cmp(&self.generation))
    }
}

#[derive(Debug)]
pub struct ActiveSet {
    tracking: ExpiryTracking,
    entries: HashMap<MotorId, Entry>,
    deadlines: BinaryHeap<Deadline>,
    next_generation: u64,
}

impl ActiveSet {
    pub fn new(tracking: ExpiryTracking) -> Self {
        Self {
            tracking,
            entries: HashMap::new(),
            deadlines: BinaryHeap::new(),
            next_generation: 0,
        }
    }

    pub fn tracking(&self) -> ExpiryTracking {
        self.tracking
    }

    /// Marks `motor` energized until `now + hold`.
    ///
    /// An already-active motor keeps a single entry whose expiry only ever
    /// moves later.
    pub fn activate(&mut self, motor: MotorId, now: f64, hold: f64) -> Activation {
        let expires_at = now + hold;
        match self.entries.get(&motor).copied() {
            Some(entry) => {
                if expires_at > entry.expires_at {
                    self.set_expiry(motor, entry.energized_at, expires_at);
                }
                Activation::Extended
            }
            None => {
                self.set_expiry(motor, now, expires_at);
                Activation::Energized
            }
        }
    }

    /// Pulls an active motor's expiry in to `now`. Returns `false` if the
    /// motor is not active.
    pub fn clamp_expiry(&mut self, motor: MotorId, now: f64) -> bool {
        match self.entries.get(&motor).copied() {
            Some(entry) => {
                if entry.expires_at > now {
                    self.set_expiry(motor, entry.energized_at, now);
                }
                true
            }
            None => false,
        }
    }

    /// Removes and returns every motor whose expiry is at or before `now`,
    /// earliest expiry first.
    pub fn drain_expired(&mut self, now: f64) -> Vec<MotorId> {
        match self.tracking {
            ExpiryTracking::Scan => self.drain_by_scan(now),
            ExpiryTracking::DeadlineHeap => self.drain_by_heap(now),
        }
    }

    pub fn is_active(&self, motor: MotorId) -> bool {
        self.entries.contains_key(&motor)
    }

    pub fn expiry(&self, motor: MotorId) -> Option<f64> {
        self.entries.get(&motor).map(|entry| entry.expires_at)
    }

    pub fn energized_at(&self, motor: MotorId) -> Option<f64> {
        self.entries.get(&motor).map(|entry| entry.energized_at)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Active motors in id order.
    pub fn motors(&self) -> Vec<MotorId> {
        let mut motors: Vec<MotorId> = self.entries.keys().copied().collect();
        motors.sort();
        motors
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.deadlines.clear();
    }

    fn set_expiry(&mut self, motor: MotorId, energized_at: f64, expires_at: f64) {
        let generation = self.next_generation;
        self.next_generation += 1;
        self.entries.insert(
            motor,
            Entry {
                energized_at,
                expires_at,
                generation,
            },
        );
        if self.tracking == ExpiryTracking::DeadlineHeap {
            self.deadlines.push(Deadline {
                at: expires_at,
                motor,
                generation,
            });
        }
    }

    fn drain_by_scan(&mut self, now: f64) -> Vec<MotorId> {
        let mut expired: Vec<(f64, MotorId)> = self
            .entries
            .iter()
            .filter(|(_, entry)| entry.expires_at <= now)
            .map(|(motor, entry)| (entry.expires_at, *motor))
            .collect();
        expired.sort_by(|a, b| a.0.total_cmp(&b.0).then_with(|| a.1.cmp(&b.1)));
        for (_, motor) in &expired {
            self.entries.remove(motor);
        }
        expired.into_iter().map(|(_, motor)| motor).collect()
    }

    fn drain_by_heap(&mut self, now: f64) -> Vec<MotorId> {
        let mut expired = Vec::new();
        while let Some(deadline) = self.deadlines.peek() {
            if deadline.at > now {
                break;
            }
            let Some(deadline) = self.deadlines.pop() else {
                break;
            };
            let current = self
                .entries
                .get(&deadline.motor)
                .is_some_and(|entry| entry.generation == deadline.generation);
            if current {
                self.entries.remove(&deadline.motor);
                expired.push(deadline.motor);
            }
        }
        expired
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn motor(index: usize) -> MotorId {
        MotorId::new(index).unwrap()
    }

    fn both() -> [ActiveSet; 2] {
        [
            ActiveSet::new(ExpiryTracking::Scan),
            ActiveSet::new(ExpiryTracking::DeadlineHeap),
        ]
    }

    #[test]
    fn test_expires_at_deadline_not_before() {
        for mut set in both() {
            assert_eq!(set.activate(motor(1), 1.0, 0.25), Activation::Energized);
            assert!(set.drain_expired(1.2).is_empty());
            assert!(set.is_active(motor(1)));
            assert_eq!(set.drain_expired(1.25), vec![motor(1)]);
            assert!(!set.is_active(motor(1)));
            assert!(set.drain_expired(5.0).is_empty());
        }
    }

    #[test]
    fn test_reactivation_extends_single_entry() {
        for mut set in both() {
            set.activate(motor(2), 1.0, 0.1);
            assert_eq!(set.activate(motor(2), 1.05, 0.1), Activation::Extended);
            assert_eq!(set.len(), 1);
            assert_eq!(set.energized_at(motor(2)), Some(1.0));
            // First deadline is superseded, so nothing happens at 1.1.
            assert!(set.drain_expired(1.1).is_empty());
            assert_eq!(set.drain_expired(1.16), vec![motor(2)]);
            assert!(set.drain_expired(2.0).is_empty());
        }
    }

    #[test]
    fn test_reactivation_never_shortens() {
        for mut set in both() {
            set.activate(motor(3), 1.0, 0.3);
            set.activate(motor(3), 1.1, 0.1);
            assert_eq!(set.expiry(motor(3)), Some(1.3));
            assert!(set.drain_expired(1.2).is_empty());
            assert_eq!(set.drain_expired(1.3), vec![motor(3)]);
        }
    }

    #[test]
    fn test_clamp_expiry() {
        for mut set in both() {
            set.activate(motor(4), 1.0, 0.3);
            assert!(set.clamp_expiry(motor(4), 1.1));
            assert_eq!(set.drain_expired(1.1), vec![motor(4)]);
            assert!(!set.clamp_expiry(motor(4), 1.2));
            assert!(set.drain_expired(1.3).is_empty());
        }
    }

    #[test]
    fn test_drain_orders_by_expiry() {
        for mut set in both() {
            set.activate(motor(9), 1.0, 0.3);
            set.activate(motor(5), 1.0, 0.1);
            set.activate(motor(7), 1.0, 0.2);
            assert_eq!(set.drain_expired(2.0), vec![motor(5), motor(7), motor(9)]);
            assert!(set.is_empty());
        }
    }

    #[test]
    fn test_stale_deadline_after_clear() {
        let mut set = ActiveSet::new(ExpiryTracking::DeadlineHeap);
        set.activate(motor(0), 0.0, 0.1);
        set.entries.clear();
        assert!(set.drain_expired(1.0).is_empty());
    }
}
