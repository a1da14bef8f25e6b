// src/hardware/mod.rs - Motor sink capability and the built-in sinks
//
// The scheduler never talks to a bus directly. Anything that can switch a motor
// on and off implements `HardwareSink`; faults are reported as `HardwareError`
// and the scheduler decides what to do with them.

use std::collections::BTreeSet;
use std::fmt;

use thiserror::Error;

use crate::motor::MotorId;

/// Motor channels on one driver board.
pub const CHANNELS_PER_BOARD: usize = 4;
/// I2C address of the first driver board.
pub const DEFAULT_BASE_ADDRESS: u16 = 0x60;
/// Driver boards fitted to the installation.
pub const DEFAULT_BOARDS: usize = 8;
/// Highest usable 7-bit I2C address.
pub const MAX_I2C_ADDRESS: u16 = 0x77;

#[derive(Debug, Error)]
pub enum HardwareError {
    #[error("Motor board disconnected")]
    Disconnected,
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Motor {0} is not wired to any board")]
    InvalidMotor(MotorId),
    #[error("Bus error: {0}")]
    Bus(String),
}

/// Capability to switch motors. Implementations must not block for long:
/// calls happen inside the scheduler tick.
pub trait HardwareSink: Send {
    fn energize(&mut self, motor: MotorId) -> Result<(), HardwareError>;
    fn de_energize(&mut self, motor: MotorId) -> Result<(), HardwareError>;
    /// Puts every motor into the off state; used at startup and shutdown.
    fn deactivate_all(&mut self) -> Result<(), HardwareError>;
}

impl<T: HardwareSink + ?Sized> HardwareSink for Box<T> {
    fn energize(&mut self, motor: MotorId) -> Result<(), HardwareError> {
        (**self).energize(motor)
    }

    fn de_energize(&mut self, motor: MotorId) -> Result<(), HardwareError> {
        (**self).de_energize(motor)
    }

    fn deactivate_all(&mut self) -> Result<(), HardwareError> {
        (**self).deactivate_all()
    }
}

/// Where a motor lives on the driver boards.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MotorAddress {
    pub board: usize,
    pub channel: usize,
    pub i2c_address: u16,
}

impl fmt::Display for MotorAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "board {} @ {:#04x}, channel {}",
            self.board, self.i2c_address, self.channel
        )
    }
}

/// Consecutive driver boards, four channels each.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoardLayout {
    pub boards: usize,
    pub base_address: u16,
}

impl BoardLayout {
    pub fn new(boards: usize, base_address: u16) -> Self {
        Self {
            boards,
            base_address,
        }
    }

    pub fn motor_capacity(&self) -> usize {
        self.boards.saturating_mul(CHANNELS_PER_BOARD)
    }

    /// Address of the last board, or `None` if it does not fit in a `u16`.
    pub fn last_address(&self) -> Option<u16> {
        self.address_of(self.boards.saturating_sub(1))
    }

    fn address_of(&self, board: usize) -> Option<u16> {
        u16::try_from(board)
            .ok()
            .and_then(|board| self.base_address.checked_add(board))
    }

    pub fn locate(&self, motor: MotorId) -> Option<MotorAddress> {
        let board = motor.index() / CHANNELS_PER_BOARD;
        if board >= self.boards {
            return None;
        }
        Some(MotorAddress {
            board,
            channel: motor.index() % CHANNELS_PER_BOARD,
            i2c_address: self.address_of(board)?,
        })
    }
}

impl Default for BoardLayout {
    fn default() -> Self {
        Self::new(DEFAULT_BOARDS, DEFAULT_BASE_ADDRESS)
    }
}

/// Sink with no physical effect. Used when no motors are attached.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl HardwareSink for NullSink {
    fn energize(&mut self, _motor: MotorId) -> Result<(), HardwareError> {
        Ok(())
    }

    fn de_energize(&mut self, _motor: MotorId) -> Result<(), HardwareError> {
        Ok(())
    }

    fn deactivate_all(&mut self) -> Result<(), HardwareError> {
        Ok(())
    }
}

/// Sink that resolves each motor to its board and channel and logs the
/// transition instead of driving a bus.
#[derive(Debug, Default)]
pub struct LoggingSink {
    layout: BoardLayout,
    energized: BTreeSet<MotorId>,
}

impl LoggingSink {
    pub fn new(layout: BoardLayout) -> Self {
        tracing::info!(
            "Motor boards: {} at {:#04x}..{:#04x} ({} motors)",
            layout.boards,
            layout.base_address,
            layout.last_address().unwrap_or(u16::MAX),
            layout.motor_capacity()
        );
        Self {
            layout,
            energized: BTreeSet::new(),
        }
    }

    pub fn layout(&self) -> BoardLayout {
        self.layout
    }

    /// Motors this sink currently believes are on.
    pub fn energized(&self) -> impl Iterator<Item = MotorId> + '_ {
        self.energized.iter().copied()
    }
}

impl HardwareSink for LoggingSink {
    fn energize(&mut self, motor: MotorId) -> Result<(), HardwareError> {
        let address = self
            .layout
            .locate(motor)
            .ok_or(HardwareError::InvalidMotor(motor))?;
        tracing::debug!("Activated motor {} ({})", motor, address);
        self.energized.insert(motor);
        Ok(())
    }

    fn de_energize(&mut self, motor: MotorId) -> Result<(), HardwareError> {
        let address = self
            .layout
            .locate(motor)
            .ok_or(HardwareError::InvalidMotor(motor))?;
        tracing::debug!("Deactivated motor {} ({})", motor, address);
        self.energized.remove(&motor);
        Ok(())
    }

    fn deactivate_all(&mut self) -> Result<(), HardwareError> {
        self.energized.clear();
        tracing::info!("All motors deactivated");
        Ok(())
    }
}

/// One call made against a [`RecordingSink`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SinkCall {
    Energize(MotorId),
    DeEnergize(MotorId),
    DeactivateAll,
}

/// Sink that records every call, and can be told to fail them all to stand
/// in for unplugged hardware.
#[derive(Debug, Default, Clone)]
pub struct RecordingSink {
    calls: Vec<SinkCall>,
    failures: usize,
    disconnected: bool,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// A sink whose every call fails with [`HardwareError::Disconnected`].
    pub fn disconnected() -> Self {
        Self {
            disconnected: true,
            ..Self::default()
        }
    }

    pub fn set_disconnected(&mut self, disconnected: bool) {
        self.disconnected = disconnected;
    }

    pub fn calls(&self) -> &[SinkCall] {
        &self.calls
    }

    pub fn failures(&self) -> usize {
        self.failures
    }

    pub fn energized(&self) -> Vec<MotorId> {
        self.calls
            .iter()
            .filter_map(|call| match call {
                SinkCall::Energize(motor) => Some(*motor),
                _ => None,
            })
            .collect()
    }

    pub fn de_energized(&self) -> Vec<MotorId> {
        self.calls
            .iter()
            .filter_map(|call| match call {
                SinkCall::DeEnergize(motor) => Some(*motor),
                _ => None,
            })
            .collect()
    }

    pub fn clear(&mut self) {
        self.calls.clear();
        self.failures = 0;
    }

    fn record(&mut self, call: SinkCall) -> Result<(), HardwareError> {
        self.calls.push(call);
        if self.disconnected {
            self.failures += 1;
            return Err(HardwareError::Disconnected);
        }
        Ok(())
    }
}

impl HardwareSink for RecordingSink {
    fn energize(&mut self, motor: MotorId) -> Result<(), HardwareError> {
        self.record(SinkCall::Energize(motor))
    }

    fn de_energize(&mut self, motor: MotorId) -> Result<(), HardwareError> {
        self.record(SinkCall::DeEnergize(motor))
    }

    fn deactivate_all(&mut self) -> Result<(), HardwareError> {
        self.record(SinkCall::DeactivateAll)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn motor(index: usize) -> MotorId {
        MotorId::new(index).unwrap()
    }

    #[test]
    fn test_layout_locates_board_and_channel() {
        let layout = BoardLayout::default();
        assert_eq!(layout.motor_capacity(), 32);
        let address = layout.locate(motor(13)).unwrap();
        assert_eq!(address.board, 3);
        assert_eq!(address.channel, 1);
        assert_eq!(address.i2c_address, 0x63);
        assert_eq!(layout.locate(motor(31)).unwrap().i2c_address, 0x67);
    }

    #[test]
    fn test_layout_rejects_missing_board() {
        let layout = BoardLayout::new(2, DEFAULT_BASE_ADDRESS);
        assert!(layout.locate(motor(7)).is_some());
        assert!(layout.locate(motor(8)).is_none());
    }

    #[test]
    fn test_layout_address_overflow() {
        let layout = BoardLayout::new(8, u16::MAX);
        assert_eq!(layout.last_address(), None);
        assert_eq!(layout.locate(motor(0)).unwrap().i2c_address, u16::MAX);
        assert!(layout.locate(motor(31)).is_none());

        let mut sink = LoggingSink::new(layout);
        assert!(matches!(sink.energize(motor(31)), Err(HardwareError::InvalidMotor(_))));
    }

    #[test]
    fn test_logging_sink_tracks_energized() {
        let mut sink = LoggingSink::new(BoardLayout::default());
        sink.energize(motor(1)).unwrap();
        sink.energize(motor(4)).unwrap();
        sink.de_energize(motor(1)).unwrap();
        assert_eq!(sink.energized().collect::<Vec<_>>(), vec![motor(4)]);
        sink.deactivate_all().unwrap();
        assert_eq!(sink.energized().count(), 0);
    }

    #[test]
    fn test_logging_sink_unwired_motor() {
        let mut sink = LoggingSink::new(BoardLayout::new(1, DEFAULT_BASE_ADDRESS));
        let err = sink.energize(motor(5)).unwrap_err();
        assert!(matches!(err, HardwareError::InvalidMotor(m) if m == motor(5)));
    }

    #[test]
    fn test_recording_sink_disconnected() {
        let mut sink = RecordingSink::disconnected();
        assert!(matches!(sink.energize(motor(0)), Err(HardwareError::Disconnected)));
        assert_eq!(sink.calls(), &[SinkCall::Energize(motor(0))]);
        assert_eq!(sink.failures(), 1);
    }

    #[test]
    fn test_boxed_sink_forwards() {
        let mut sink: Box<dyn HardwareSink> = Box::new(NullSink);
        assert!(sink.energize(motor(0)).is_ok());
        assert!(sink.deactivate_all().is_ok());
    }
}
