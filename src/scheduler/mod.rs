// src/scheduler/mod.rs - Time-synchronized motor activation scheduler
//
// One scheduler serves both the software-only and the hardware path. What used
// to differ between them (debounce, how deactivations are tracked) is chosen
// through `SchedulerConfig`; the physical side effect is whatever
// `HardwareSink` is injected.
//
// Time is always passed in. Nothing in here reads a clock.

pub mod active;
pub mod debounce;
pub mod queue;
pub mod time_interface;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::config::{ConfigurationError, DeactivationPolicy, SchedulerConfig};
use crate::hardware::{HardwareError, HardwareSink};
use crate::motor::{CharacterMotorMap, MotorId};

use self::active::{Activation, ActiveSet, ExpiryTracking};
use self::debounce::DebounceGuard;
use self::queue::{ActivationQueue, Rejected};

/// Counters kept over the scheduler's lifetime.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SchedulerStats {
    pub enqueued: u64,
    pub unmapped: u64,
    pub invalid_time: u64,
    pub overflowed: u64,
    pub activations: u64,
    pub extended: u64,
    pub debounced: u64,
    pub deactivations: u64,
    pub hardware_faults: u64,
}

/// What a single [`Scheduler::tick`] did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickReport {
    /// Motors switched on (or re-asserted while already on), in queue order.
    pub energized: Vec<MotorId>,
    /// Motors switched off, earliest expiry first.
    pub de_energized: Vec<MotorId>,
    /// Due activations dropped by the debounce guard.
    pub debounced: Vec<MotorId>,
}

impl TickReport {
    pub fn is_empty(&self) -> bool {
        self.energized.is_empty() && self.de_energized.is_empty() && self.debounced.is_empty()
    }
}

#[derive(Debug, Clone, Copy)]
enum Transition {
    Energize,
    DeEnergize,
}

impl Transition {
    fn verb(self) -> &'static str {
        match self {
            Transition::Energize => "energize",
            Transition::DeEnergize => "de-energize",
        }
    }
}

/// Drives motors from a queue of timed character activations.
///
/// Each motor moves `IDLE -> ENERGIZED -> IDLE`, and both transitions happen
/// inside [`Scheduler::tick`]. Sink failures are logged and counted but the
/// logical transition still happens, so unreachable hardware never stalls the
/// schedule or triggers retries.
pub struct Scheduler<S: HardwareSink> {
    config: SchedulerConfig,
    map: CharacterMotorMap,
    queue: ActivationQueue,
    active: ActiveSet,
    debounce: Option<DebounceGuard>,
    sink: S,
    rng: StdRng,
    stats: SchedulerStats,
    last_tick: Option<f64>,
    sink_healthy: bool,
    queue_full: bool,
}

impl<S: HardwareSink> Scheduler<S> {
    /// Validates `config`, then puts every motor into the off state.
    pub fn new(config: SchedulerConfig, sink: S) -> Result<Self, ConfigurationError> {
        config.validate()?;

        let tracking = match config.deactivation {
            DeactivationPolicy::Duration { .. } => ExpiryTracking::Scan,
            DeactivationPolicy::Deadline { .. } => ExpiryTracking::DeadlineHeap,
        };
        let debounce = config
            .debounce
            .then(|| DebounceGuard::new(config.cooldown_window));
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };

        let mut scheduler = Self {
            map: CharacterMotorMap::new(config.motor_count),
            queue: ActivationQueue::new(config.max_pending),
            active: ActiveSet::new(tracking),
            debounce,
            sink,
            rng,
            stats: SchedulerStats::default(),
            last_tick: None,
            sink_healthy: true,
            queue_full: false,
            config,
        };

        tracing::info!(
            "Motor scheduler ready: {} motors, {:?}, debounce {}",
            scheduler.config.motor_count,
            scheduler.config.deactivation,
            if scheduler.config.debounce {
                format!("{:.3}s", scheduler.config.cooldown_window)
            } else {
                "off".to_string()
            }
        );

        let result = scheduler.sink.deactivate_all();
        scheduler.note_sink_result(result, || "deactivate all motors".to_string());
        Ok(scheduler)
    }

    /// Queues the motor for `ch` at playback time `time`. Returns `false` if
    /// the character has no motor or the event was dropped.
    pub fn enqueue(&mut self, ch: char, time: f64) -> bool {
        match self.map.resolve(ch) {
            Some(motor) => self.enqueue_motor(motor, time),
            None => {
                self.stats.unmapped += 1;
                false
            }
        }
    }

    /// Queues a batch of `(character, time)` pairs in any order. Returns how
    /// many were queued.
    pub fn enqueue_batch<I>(&mut self, events: I) -> usize
    where
        I: IntoIterator<Item = (char, f64)>,
    {
        events
            .into_iter()
            .filter(|&(ch, time)| self.enqueue(ch, time))
            .count()
    }

    /// Queues an activation for a motor directly.
    pub fn enqueue_motor(&mut self, motor: MotorId, time: f64) -> bool {
        if motor.index() >= self.config.motor_count {
            tracing::warn!(
                "Dropping activation for motor {}: only {} motors configured",
                motor,
                self.config.motor_count
            );
            self.stats.unmapped += 1;
            return false;
        }
        match self.queue.push(motor, time) {
            Ok(()) => {
                self.stats.enqueued += 1;
                self.queue_full = false;
                true
            }
            Err(Rejected::NonFiniteTime) => {
                tracing::warn!("Dropping activation for motor {} with time {}", motor, time);
                self.stats.invalid_time += 1;
                false
            }
            Err(Rejected::Full) => {
                if !self.queue_full {
                    tracing::warn!(
                        "Activation queue full ({} pending), dropping new activations",
                        self.queue.capacity()
                    );
                    self.queue_full = true;
                } else {
                    tracing::debug!("Activation queue still full, dropped motor {} at {:.3}", motor, time);
                }
                self.stats.overflowed += 1;
                false
            }
        }
    }

    /// Energizes every due motor, then de-energizes every expired one.
    ///
    /// Never blocks and never fails. Calling it again with the same `now`
    /// does nothing.
    pub fn tick(&mut self, now: f64) -> TickReport {
        let mut report = TickReport::default();
        if !now.is_finite() {
            tracing::warn!("Ignoring tick at non-finite time {}", now);
            return report;
        }
        if let Some(last) = self.last_tick {
            if now < last {
                tracing::debug!("Playback time moved backwards: {:.3} -> {:.3}", last, now);
            }
        }

        for motor in self.queue.drain_due(now) {
            if let Some(guard) = self.debounce.as_mut() {
                if !guard.should_activate(motor, now) {
                    tracing::trace!("Motor {} debounced at {:.3}", motor, now);
                    self.stats.debounced += 1;
                    report.debounced.push(motor);
                    continue;
                }
            }

            let hold = self.hold_time();
            match self.active.activate(motor, now, hold) {
                Activation::Energized => {
                    tracing::debug!("Motor {} on at {:.3} for {:.3}s", motor, now, hold);
                }
                Activation::Extended => {
                    tracing::debug!("Motor {} retriggered at {:.3}", motor, now);
                    self.stats.extended += 1;
                }
            }
            self.stats.activations += 1;
            self.drive(motor, Transition::Energize);
            report.energized.push(motor);
        }

        for motor in self.active.drain_expired(now) {
            tracing::debug!("Motor {} off at {:.3}", motor, now);
            self.stats.deactivations += 1;
            self.drive(motor, Transition::DeEnergize);
            report.de_energized.push(motor);
        }

        self.last_tick = Some(now);
        report
    }

    /// Pulls an energized motor's switch-off forward to `now`; the next tick
    /// at or after `now` de-energizes it. Returns `false` if it was not on.
    pub fn cut_off(&mut self, motor: MotorId, now: f64) -> bool {
        self.active.clamp_expiry(motor, now)
    }

    /// Drops everything pending and switches every motor off.
    pub fn shutdown(&mut self) {
        tracing::info!(
            "Shutting down motor scheduler ({} pending, {} active)",
            self.queue.len(),
            self.active.len()
        );
        self.queue.clear();
        self.active.clear();
        if let Some(guard) = self.debounce.as_mut() {
            guard.reset();
        }
        let result = self.sink.deactivate_all();
        self.note_sink_result(result, || "deactivate all motors".to_string());
    }

    pub fn is_active(&self, motor: MotorId) -> bool {
        self.active.is_active(motor)
    }

    pub fn active_motors(&self) -> Vec<MotorId> {
        self.active.motors()
    }

    pub fn active_count(&self) -> usize {
        self.active.len()
    }

    /// Scheduled switch-off time of an energized motor.
    pub fn expiry(&self, motor: MotorId) -> Option<f64> {
        self.active.expiry(motor)
    }

    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    pub fn next_due(&self) -> Option<f64> {
        self.queue.next_due()
    }

    pub fn stats(&self) -> SchedulerStats {
        self.stats
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    pub fn motor_map(&self) -> &CharacterMotorMap {
        &self.map
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn sink_mut(&mut self) -> &mut S {
        &mut self.sink
    }

    fn hold_time(&mut self) -> f64 {
        match self.config.deactivation {
            DeactivationPolicy::Duration { min, max } if max > min => {
                self.rng.random_range(min..=max)
            }
            DeactivationPolicy::Duration { min, .. } => min,
            DeactivationPolicy::Deadline { delay } => delay,
        }
    }

    fn drive(&mut self, motor: MotorId, transition: Transition) {
        let result = match transition {
            Transition::Energize => self.sink.energize(motor),
            Transition::DeEnergize => self.sink.de_energize(motor),
        };
        self.note_sink_result(result, || format!("{} motor {}", transition.verb(), motor));
    }

    // The first fault after a healthy stretch is a warning; repeats are debug
    // until a call succeeds again.
    fn note_sink_result<F>(&mut self, result: Result<(), HardwareError>, action: F)
    where
        F: FnOnce() -> String,
    {
        match result {
            Ok(()) => {
                if !self.sink_healthy {
                    tracing::info!("Motor hardware responding again ({})", action());
                    self.sink_healthy = true;
                }
            }
            Err(e) => {
                self.stats.hardware_faults += 1;
                if self.sink_healthy {
                    tracing::warn!("Failed to {}: {}", action(), e);
                    self.sink_healthy = false;
                } else {
                    tracing::debug!("Failed to {}: {}", action(), e);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hardware::{RecordingSink, SinkCall};

    fn motor(index: usize) -> MotorId {
        MotorId::new(index).unwrap()
    }

    fn fixed_hold(hold: f64) -> SchedulerConfig {
        SchedulerConfig {
            deactivation: DeactivationPolicy::Duration {
                min: hold,
                max: hold,
            },
            ..SchedulerConfig::default()
        }
    }

    #[test]
    fn test_construction_clears_hardware() {
        let scheduler = Scheduler::new(SchedulerConfig::default(), RecordingSink::new()).unwrap();
        assert_eq!(scheduler.sink().calls(), &[SinkCall::DeactivateAll]);
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let config = SchedulerConfig {
            motor_count: 0,
            ..SchedulerConfig::default()
        };
        assert!(Scheduler::new(config, RecordingSink::new()).is_err());
    }

    #[test]
    fn test_unmapped_characters_are_ignored() {
        let mut scheduler = Scheduler::new(SchedulerConfig::default(), RecordingSink::new()).unwrap();
        assert!(!scheduler.enqueue(' ', 1.0));
        assert!(!scheduler.enqueue('?', 1.0));
        assert_eq!(scheduler.pending(), 0);
        assert_eq!(scheduler.stats().unmapped, 2);
    }

    #[test]
    fn test_enqueue_batch_counts_queued() {
        let mut scheduler = Scheduler::new(SchedulerConfig::default(), RecordingSink::new()).unwrap();
        let queued = scheduler.enqueue_batch(vec![('h', 0.3), ('i', 0.1), (' ', 0.4), ('!', 0.5)]);
        assert_eq!(queued, 2);
        assert_eq!(scheduler.next_due(), Some(0.1));
    }

    #[test]
    fn test_motor_beyond_count_is_dropped() {
        let config = SchedulerConfig {
            motor_count: 4,
            ..SchedulerConfig::default()
        };
        let mut scheduler = Scheduler::new(config, RecordingSink::new()).unwrap();
        assert!(!scheduler.enqueue_motor(motor(4), 1.0));
        assert!(scheduler.enqueue_motor(motor(3), 1.0));
        // 'e' wraps onto motor 0 with four motors.
        assert!(scheduler.enqueue('e', 1.0));
        let report = scheduler.tick(1.0);
        assert_eq!(report.energized, vec![motor(3), motor(0)]);
    }

    #[test]
    fn test_non_finite_inputs() {
        let mut scheduler = Scheduler::new(SchedulerConfig::default(), RecordingSink::new()).unwrap();
        assert!(!scheduler.enqueue('a', f64::NAN));
        assert_eq!(scheduler.stats().invalid_time, 1);
        assert!(scheduler.tick(f64::NAN).is_empty());
    }

    #[test]
    fn test_queue_overflow_drops_new_events() {
        let config = SchedulerConfig {
            max_pending: 3,
            ..SchedulerConfig::default()
        };
        let mut scheduler = Scheduler::new(config, RecordingSink::new()).unwrap();
        let queued = scheduler.enqueue_batch("abcde".chars().map(|ch| (ch, 1.0)));
        assert_eq!(queued, 3);
        assert_eq!(scheduler.stats().overflowed, 2);
        scheduler.tick(1.0);
        assert!(scheduler.enqueue('f', 2.0));
    }

    #[test]
    fn test_random_hold_within_range() {
        let config = SchedulerConfig {
            seed: Some(42),
            ..SchedulerConfig::default()
        };
        let mut scheduler = Scheduler::new(config, RecordingSink::new()).unwrap();
        scheduler.enqueue_batch("abcdefghij".chars().map(|ch| (ch, 1.0)));
        scheduler.tick(1.0);
        for m in scheduler.active_motors() {
            let hold = scheduler.expiry(m).unwrap() - 1.0;
            assert!((0.1 - 1e-9..=0.3 + 1e-9).contains(&hold), "hold {} out of range", hold);
        }
        assert_eq!(scheduler.tick(1.0 + 0.3 + 1e-9).de_energized.len(), 10);
    }

    #[test]
    fn test_retrigger_without_debounce_keeps_one_entry() {
        let mut scheduler = Scheduler::new(fixed_hold(0.1), RecordingSink::new()).unwrap();
        scheduler.enqueue('a', 1.0);
        scheduler.enqueue('a', 1.05);
        scheduler.tick(1.0);
        let report = scheduler.tick(1.05);
        assert_eq!(report.energized, vec![motor(0)]);
        assert_eq!(scheduler.active_count(), 1);
        assert_eq!(scheduler.stats().extended, 1);
        assert!(scheduler.tick(1.1).de_energized.is_empty());
        assert_eq!(scheduler.tick(1.16).de_energized, vec![motor(0)]);
        assert_eq!(scheduler.sink().de_energized(), vec![motor(0)]);
    }

    #[test]
    fn test_cut_off() {
        let mut scheduler = Scheduler::new(fixed_hold(0.3), RecordingSink::new()).unwrap();
        scheduler.enqueue('c', 1.0);
        scheduler.tick(1.0);
        assert!(scheduler.cut_off(motor(2), 1.1));
        assert_eq!(scheduler.tick(1.1).de_energized, vec![motor(2)]);
        assert!(!scheduler.cut_off(motor(2), 1.2));
        assert!(scheduler.tick(1.3).is_empty());
    }

    #[test]
    fn test_shutdown_clears_everything() {
        let mut scheduler = Scheduler::new(fixed_hold(0.3), RecordingSink::new()).unwrap();
        scheduler.enqueue_batch(vec![('a', 1.0), ('b', 5.0)]);
        scheduler.tick(1.0);
        scheduler.sink_mut().clear();
        scheduler.shutdown();
        assert_eq!(scheduler.pending(), 0);
        assert_eq!(scheduler.active_count(), 0);
        assert_eq!(scheduler.sink().calls(), &[SinkCall::DeactivateAll]);
        assert!(scheduler.tick(10.0).is_empty());
    }
}
