// src/scheduler/debounce.rs - Per-motor retrigger suppression
use std::collections::HashMap;

use crate::motor::MotorId;

/// Suppresses re-activation of a motor within `cooldown` seconds of its last
/// accepted activation.
#[derive(Debug, Clone)]
pub struct DebounceGuard {
    cooldown: f64,
    last_activation: HashMap<MotorId, f64>,
}

impl DebounceGuard {
    pub fn new(cooldown: f64) -> Self {
        Self {
            cooldown,
            last_activation: HashMap::new(),
        }
    }

    pub fn cooldown(&self) -> f64 {
        self.cooldown
    }

    /// Records `now` and returns `true` if the motor is outside its cooldown.
    /// A rejected call leaves the record untouched.
    pub fn should_activate(&mut self, motor: MotorId, now: f64) -> bool {
        if let Some(last) = self.last_activation.get(&motor) {
            if now - last < self.cooldown {
                return false;
            }
        }
        self.last_activation.insert(motor, now);
        true
    }

    pub fn last_activation(&self, motor: MotorId) -> Option<f64> {
        self.last_activation.get(&motor).copied()
    }

    pub fn reset(&mut self) {
        self.last_activation.clear();
    }
}
