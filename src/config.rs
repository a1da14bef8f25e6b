//! # Typewriter configuration
//!
//! Everything the host needs before playback starts is read from a single TOML
//! file. Every field has a default, so an empty file (or no file at all) gives
//! the software profile: no debounce, random 0.1-0.3 s holds, 32 motors.
//!
//! ## Example: TOML Configuration
//!
//! ```toml
//! [scheduler]
//! motor_count = 32
//! debounce = true
//! cooldown_window = 0.2
//! max_pending = 4096
//!
//! [scheduler.deactivation]
//! type = "deadline"
//! delay = 0.1
//!
//! [playback]
//! tick_hz = 15.0
//! tail = 5.0
//! idle_duration = 60.0
//!
//! [hardware]
//! boards = 8
//! base_address = 96
//! ```
//!
//! `[scheduler.deactivation]` is either `type = "duration"` with `min`/`max`
//! seconds, or `type = "deadline"` with a fixed `delay`.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

use crate::hardware::{
    BoardLayout, CHANNELS_PER_BOARD, DEFAULT_BASE_ADDRESS, DEFAULT_BOARDS, MAX_I2C_ADDRESS,
};
use crate::motor::MAX_MOTORS;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Invalid configuration: {0}")]
    Invalid(#[from] ConfigurationError),
}

/// A configuration value the scheduler cannot run with.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigurationError {
    #[error("motor_count must be between 1 and {max}, got {got}")]
    MotorCount { got: usize, max: usize },
    #[error("activation duration range {min}..={max} must be finite, positive and ordered")]
    DurationRange { min: f64, max: f64 },
    #[error("deactivation delay must be finite and positive, got {0}")]
    DeactivationDelay(f64),
    #[error("cooldown_window must be finite and non-negative, got {0}")]
    Cooldown(f64),
    #[error("max_pending must be at least 1")]
    QueueCapacity,
    #[error("tick_granularity must be finite and positive, got {0}")]
    TickGranularity(f64),
    #[error("tick_hz must be finite, positive and at most {max}, got {got}")]
    TickRate { got: f64, max: f64 },
    #[error("playback {field} must be finite and non-negative, got {value}")]
    PlaybackTime { field: &'static str, value: f64 },
    #[error("{boards} boards drive {capacity} motors, fewer than motor_count {motor_count}")]
    BoardLayout {
        boards: usize,
        capacity: usize,
        motor_count: usize,
    },
    #[error("{boards} boards from base address {base_address:#04x} run past I2C address {max:#04x}")]
    BoardAddress {
        boards: usize,
        base_address: u16,
        max: u16,
    },
}

/// How an energized motor is switched off again.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DeactivationPolicy {
    /// Hold for a duration drawn uniformly from `[min, max]` seconds and find
    /// expired motors by scanning the active set.
    Duration { min: f64, max: f64 },
    /// Hold for a fixed `delay` and track the switch-off as a deadline event.
    Deadline { delay: f64 },
}

impl DeactivationPolicy {
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        match *self {
            DeactivationPolicy::Duration { min, max } => {
                if min.is_finite() && max.is_finite() && min > 0.0 && min <= max {
                    Ok(())
                } else {
                    Err(ConfigurationError::DurationRange { min, max })
                }
            }
            DeactivationPolicy::Deadline { delay } => {
                if delay.is_finite() && delay > 0.0 {
                    Ok(())
                } else {
                    Err(ConfigurationError::DeactivationDelay(delay))
                }
            }
        }
    }
}

impl Default for DeactivationPolicy {
    fn default() -> Self {
        DeactivationPolicy::Duration {
            min: default_min_duration(),
            max: default_max_duration(),
        }
    }
}

/// Construction parameters for [`crate::scheduler::Scheduler`].
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct SchedulerConfig {
    #[serde(default = "default_motor_count")]
    pub motor_count: usize,
    #[serde(default)]
    pub debounce: bool,
    #[serde(default = "default_cooldown_window")]
    pub cooldown_window: f64,
    #[serde(default)]
    pub deactivation: DeactivationPolicy,
    #[serde(default = "default_max_pending")]
    pub max_pending: usize,
    /// Intended tick spacing in seconds. Informational; `tick` accepts any time.
    #[serde(default = "default_tick_granularity")]
    pub tick_granularity: f64,
    /// Seed for hold-time draws. `None` seeds from the OS.
    #[serde(default)]
    pub seed: Option<u64>,
}

impl SchedulerConfig {
    /// Profile for the pure-software path: no debounce, random 0.1-0.3 s holds.
    pub fn software() -> Self {
        Self::default()
    }

    /// Profile for physical motors: 0.2 s debounce and a fixed 0.1 s pulse.
    pub fn hardware() -> Self {
        Self {
            debounce: true,
            deactivation: DeactivationPolicy::Deadline {
                delay: default_pulse_delay(),
            },
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if self.motor_count == 0 || self.motor_count > MAX_MOTORS {
            return Err(ConfigurationError::MotorCount {
                got: self.motor_count,
                max: MAX_MOTORS,
            });
        }
        if !self.cooldown_window.is_finite() || self.cooldown_window < 0.0 {
            return Err(ConfigurationError::Cooldown(self.cooldown_window));
        }
        if self.max_pending == 0 {
            return Err(ConfigurationError::QueueCapacity);
        }
        if !self.tick_granularity.is_finite() || self.tick_granularity <= 0.0 {
            return Err(ConfigurationError::TickGranularity(self.tick_granularity));
        }
        self.deactivation.validate()
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            motor_count: default_motor_count(),
            debounce: false,
            cooldown_window: default_cooldown_window(),
            deactivation: DeactivationPolicy::default(),
            max_pending: default_max_pending(),
            tick_granularity: default_tick_granularity(),
            seed: None,
        }
    }
}

/// Playback loop settings.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct PlaybackConfig {
    #[serde(default = "default_tick_hz")]
    pub tick_hz: f64,
    /// Seconds to keep running after the last character.
    #[serde(default = "default_tail")]
    pub tail: f64,
    /// Run length when there are no characters at all.
    #[serde(default = "default_idle_duration")]
    pub idle_duration: f64,
    /// Fixed run length in seconds, overriding last character + tail.
    #[serde(default)]
    pub duration: Option<f64>,
}

impl PlaybackConfig {
    /// Highest accepted playback loop rate.
    pub const MAX_TICK_HZ: f64 = 1000.0;

    /// Interval between playback loop ticks.
    pub fn tick_period(&self) -> Result<Duration, ConfigurationError> {
        let invalid = ConfigurationError::TickRate {
            got: self.tick_hz,
            max: Self::MAX_TICK_HZ,
        };
        if !self.tick_hz.is_finite() || self.tick_hz <= 0.0 || self.tick_hz > Self::MAX_TICK_HZ {
            return Err(invalid);
        }
        match Duration::try_from_secs_f64(1.0 / self.tick_hz) {
            Ok(period) if !period.is_zero() => Ok(period),
            _ => Err(invalid),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigurationError> {
        self.tick_period()?;
        if !self.tail.is_finite() || self.tail < 0.0 {
            return Err(ConfigurationError::PlaybackTime {
                field: "tail",
                value: self.tail,
            });
        }
        if !self.idle_duration.is_finite() || self.idle_duration < 0.0 {
            return Err(ConfigurationError::PlaybackTime {
                field: "idle_duration",
                value: self.idle_duration,
            });
        }
        if let Some(duration) = self.duration {
            if !duration.is_finite() || duration < 0.0 {
                return Err(ConfigurationError::PlaybackTime {
                    field: "duration",
                    value: duration,
                });
            }
        }
        Ok(())
    }
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            tick_hz: default_tick_hz(),
            tail: default_tail(),
            idle_duration: default_idle_duration(),
            duration: None,
        }
    }
}

/// Motor driver boards.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct HardwareConfig {
    #[serde(default = "default_boards")]
    pub boards: usize,
    #[serde(default = "default_base_address")]
    pub base_address: u16,
}

impl HardwareConfig {
    pub fn layout(&self) -> BoardLayout {
        BoardLayout::new(self.boards, self.base_address)
    }

    /// Every board must sit at a 7-bit I2C address.
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        let out_of_range = ConfigurationError::BoardAddress {
            boards: self.boards,
            base_address: self.base_address,
            max: MAX_I2C_ADDRESS,
        };
        if self.boards.checked_mul(CHANNELS_PER_BOARD).is_none() {
            return Err(out_of_range);
        }
        match self.layout().last_address() {
            Some(last) if last <= MAX_I2C_ADDRESS => Ok(()),
            _ => Err(out_of_range),
        }
    }
}

impl Default for HardwareConfig {
    fn default() -> Self {
        Self {
            boards: default_boards(),
            base_address: default_base_address(),
        }
    }
}

/// Top-level configuration file.
#[derive(Debug, Clone, PartialEq, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    #[serde(default)]
    pub playback: PlaybackConfig,
    #[serde(default)]
    pub hardware: HardwareConfig,
}

impl Config {
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        self.scheduler.validate()?;
        self.playback.validate()?;
        self.hardware.validate()?;
        let layout = self.hardware.layout();
        if layout.motor_capacity() < self.scheduler.motor_count {
            return Err(ConfigurationError::BoardLayout {
                boards: layout.boards,
                capacity: layout.motor_capacity(),
                motor_count: self.scheduler.motor_count,
            });
        }
        Ok(())
    }
}

/// Reads, parses and validates a configuration file.
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config, ConfigError> {
    let contents = std::fs::read_to_string(path)?;
    let config: Config = toml::from_str(&contents)?;
    config.validate()?;
    Ok(config)
}

fn default_motor_count() -> usize {
    MAX_MOTORS
}
fn default_cooldown_window() -> f64 {
    0.2
}
fn default_min_duration() -> f64 {
    0.1
}
fn default_max_duration() -> f64 {
    0.3
}
fn default_pulse_delay() -> f64 {
    0.1
}
fn default_max_pending() -> usize {
    4096
}
fn default_tick_granularity() -> f64 {
    0.01
}
fn default_tick_hz() -> f64 {
    15.0
}
fn default_tail() -> f64 {
    5.0
}
fn default_idle_duration() -> f64 {
    60.0
}
fn default_boards() -> usize {
    DEFAULT_BOARDS
}
fn default_base_address() -> u16 {
    DEFAULT_BASE_ADDRESS
}
