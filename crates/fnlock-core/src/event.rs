// Fnlock Key Events
// Key actions and the events delivered by hook drivers

use std::fmt;

use crate::Key;

/// Represents the action state of a key event.
///
/// Values follow evdev:
///   0 == 'released'
///   1 == 'pressed'
///   2 == 'repeated'
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum_macros::Display)]
#[strum(serialize_all = "lowercase")]
#[repr(i32)]
pub enum Action {
    Release = 0,
    Press = 1,
    Repeat = 2,
}

impl Action {
    /// Returns true for key-down events (press or auto-repeat)
    pub fn is_down(self) -> bool {
        matches!(self, Action::Press | Action::Repeat)
    }

    /// Returns true if this is a RELEASE event
    pub fn is_released(self) -> bool {
        matches!(self, Action::Release)
    }

    /// Create Action from i32 value (from evdev)
    pub fn from_i32(value: i32) -> Option<Self> {
        match value {
            0 => Some(Action::Release),
            1 => Some(Action::Press),
            2 => Some(Action::Repeat),
            _ => None,
        }
    }

    /// Convert Action to its i32 representation
    pub fn to_i32(self) -> i32 {
        self as i32
    }
}

/// A key event as observed by a hook driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyEvent {
    /// Key the driver reported
    pub key: Key,
    /// Press, release or repeat
    pub action: Action,
    /// Set on events the driver injected itself
    pub synthetic: bool,
    /// Per-driver sequence number. Every hook observing the same physical
    /// event sees the same serial.
    pub serial: u64,
}

impl KeyEvent {
    /// Event produced by the user
    pub fn physical(key: Key, action: Action, serial: u64) -> Self {
        Self {
            key,
            action,
            synthetic: false,
            serial,
        }
    }

    /// Event injected by a driver's `send_key`
    pub fn synthetic(key: Key, action: Action, serial: u64) -> Self {
        Self {
            key,
            action,
            synthetic: true,
            serial,
        }
    }

    /// Returns true for key-down events
    pub fn is_down(&self) -> bool {
        self.action.is_down()
    }
}

impl fmt::Display for KeyEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} #{}", self.key, self.action, self.serial)?;
        if self.synthetic {
            write!(f, " (synthetic)")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_action_from_i32() {
        assert_eq!(Action::from_i32(0), Some(Action::Release));
        assert_eq!(Action::from_i32(1), Some(Action::Press));
        assert_eq!(Action::from_i32(2), Some(Action::Repeat));
        assert_eq!(Action::from_i32(3), None);
        assert_eq!(Action::Repeat.to_i32(), 2);
    }

    #[test]
    fn test_repeat_counts_as_key_down() {
        assert!(Action::Press.is_down());
        assert!(Action::Repeat.is_down());
        assert!(!Action::Release.is_down());
        assert!(Action::Release.is_released());
    }

    #[test]
    fn test_action_display() {
        assert_eq!(Action::Release.to_string(), "release");
        assert_eq!(Action::Press.to_string(), "press");
        assert_eq!(Action::Repeat.to_string(), "repeat");
    }

    #[test]
    fn test_event_display() {
        let key = Key::parse("w").unwrap();
        assert_eq!(KeyEvent::physical(key, Action::Press, 7).to_string(), "w press #7");
        assert_eq!(
            KeyEvent::synthetic(key, Action::Release, 8).to_string(),
            "w release #8 (synthetic)"
        );
    }
}
