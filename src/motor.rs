// src/motor.rs - Motor identifiers and the character-to-motor mapping
use std::fmt;

/// Largest number of addressable motors (8 boards x 4 channels).
pub const MAX_MOTORS: usize = 32;

/// Characters that drive a motor, in mapping order.
pub const MOTOR_ALPHABET: &str = "abcdefghijklmnopqrstuvwxyz0123456789";

/// Identifies one addressable motor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MotorId(u8);

impl MotorId {
    /// Returns `None` when `index` is outside `[0, MAX_MOTORS)`.
    pub fn new(index: usize) -> Option<Self> {
        if index < MAX_MOTORS {
            Some(Self(index as u8))
        } else {
            None
        }
    }

    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for MotorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Fixed mapping from lowercase alphanumerics to motors.
///
/// Character `i` of [`MOTOR_ALPHABET`] drives motor `i % motor_count`.
/// Whitespace, punctuation and anything outside the alphabet have no motor.
#[derive(Debug, Clone)]
pub struct CharacterMotorMap {
    motor_count: usize,
}

impl CharacterMotorMap {
    /// `motor_count` is clamped into `[1, MAX_MOTORS]`; the scheduler
    /// validates it before it gets here.
    pub fn new(motor_count: usize) -> Self {
        Self {
            motor_count: motor_count.clamp(1, MAX_MOTORS),
        }
    }

    pub fn motor_count(&self) -> usize {
        self.motor_count
    }

    pub fn resolve(&self, ch: char) -> Option<MotorId> {
        let lower = ch.to_ascii_lowercase();
        let index = match lower {
            'a'..='z' => lower as usize - 'a' as usize,
            '0'..='9' => 26 + (lower as usize - '0' as usize),
            _ => return None,
        };
        MotorId::new(index % self.motor_count)
    }
}

impl Default for CharacterMotorMap {
    fn default() -> Self {
        Self::new(MAX_MOTORS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_letters_map_in_alphabet_order() {
        let map = CharacterMotorMap::default();
        assert_eq!(map.resolve('a'), MotorId::new(0));
        assert_eq!(map.resolve('z'), MotorId::new(25));
        assert_eq!(map.resolve('0'), MotorId::new(26));
        assert_eq!(map.resolve('5'), MotorId::new(31));
    }

    #[test]
    fn test_digits_wrap_around() {
        let map = CharacterMotorMap::default();
        assert_eq!(map.resolve('6'), MotorId::new(0));
        assert_eq!(map.resolve('9'), MotorId::new(3));
    }

    #[test]
    fn test_uppercase_is_folded() {
        let map = CharacterMotorMap::default();
        assert_eq!(map.resolve('Q'), map.resolve('q'));
    }

    #[test]
    fn test_unmapped_characters() {
        let map = CharacterMotorMap::default();
        for ch in [' ', '\n', '.', ',', '!', '\'', 'é', '-'] {
            assert_eq!(map.resolve(ch), None, "{:?} should have no motor", ch);
        }
    }

    #[test]
    fn test_mapping_is_total_over_alphabet() {
        let map = CharacterMotorMap::new(8);
        for (i, ch) in MOTOR_ALPHABET.chars().enumerate() {
            assert_eq!(map.resolve(ch), MotorId::new(i % 8));
        }
    }

    #[test]
    fn test_motor_id_bounds() {
        assert!(MotorId::new(31).is_some());
        assert!(MotorId::new(32).is_none());
    }
}
