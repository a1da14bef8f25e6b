// kinetype: motor scheduling for the kinetic typewriter installation

pub mod config;
pub mod hardware;
pub mod motor;
pub mod playback;
pub mod scheduler;
pub mod timings;

pub use crate::config::{
    Config, ConfigError, ConfigurationError, DeactivationPolicy, HardwareConfig, PlaybackConfig,
    SchedulerConfig, load_config,
};
pub use crate::hardware::{
    BoardLayout, HardwareError, HardwareSink, LoggingSink, NullSink, RecordingSink, SinkCall,
};
pub use crate::motor::{CharacterMotorMap, MAX_MOTORS, MotorId};
pub use crate::playback::{CharacterFeed, Playback, RunSummary, StepReport};
pub use crate::scheduler::time_interface::{MonotonicClock, PlaybackClock, VirtualClock};
pub use crate::scheduler::{Scheduler, SchedulerStats, TickReport};
pub use crate::timings::{TimedChar, TimingsError, load_timings, parse_timings};
