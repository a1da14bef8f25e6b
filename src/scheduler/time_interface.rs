// src/scheduler/time_interface.rs - Playback clocks
//
// The scheduler itself never reads a clock. Only the playback runner does, and
// it goes through this trait so tests can drive time by hand.

use std::time::{Duration, Instant};

pub trait PlaybackClock: Send + Sync {
    /// Seconds since playback started.
    fn now(&self) -> f64;
}

/// Wall-clock playback time measured from construction.
#[derive(Debug, Clone, Copy)]
pub struct MonotonicClock {
    start: Instant,
}

impl MonotonicClock {
    pub fn start() -> Self {
        Self {
            start: Instant::now(),
        }
    }
}

impl PlaybackClock for MonotonicClock {
    fn now(&self) -> f64 {
        self.start.elapsed().as_secs_f64()
    }
}

/// Manually advanced clock for tests and dry runs.
#[derive(Debug, Clone, Copy, Default)]
pub struct VirtualClock {
    current_time: f64,
}

impl VirtualClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn advance(&mut self, dt: Duration) {
        self.current_time += dt.as_secs_f64();
    }

    pub fn set(&mut self, seconds: f64) {
        self.current_time = seconds;
    }
}

impl PlaybackClock for VirtualClock {
    fn now(&self) -> f64 {
        self.current_time
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_virtual_clock_advances() {
        let mut clock = VirtualClock::new();
        assert_eq!(clock.now(), 0.0);
        clock.advance(Duration::from_millis(250));
        clock.advance(Duration::from_millis(250));
        assert!((clock.now() - 0.5).abs() < 1e-9);
        clock.set(12.0);
        assert_eq!(clock.now(), 12.0);
    }

    #[test]
    fn test_monotonic_clock_moves_forward() {
        let clock = MonotonicClock::start();
        let first = clock.now();
        std::thread::sleep(Duration::from_millis(5));
        let second = clock.now();
        assert!(first >= 0.0);
        assert!(second > first);
    }
}
