//! Logging mode state machine.

use std::fmt;

/// Lifecycle of one logging configuration.
///
/// Modes only move forward, in declaration order; a fresh run starts over
/// from [`LoggingMode::Invalid`] with a new frontend logger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum LoggingMode {
    /// No frontend logger has started.
    #[default]
    Invalid,
    /// Log destination is being opened; records are not accepted yet.
    Standby,
    /// The log is being replayed into storage.
    Recovery,
    /// Records are accepted and flushed.
    Logging,
    /// Final drain in progress.
    Terminate,
    /// The frontend logger has finished.
    Sleep,
}

impl LoggingMode {
    /// Upper-case name used in traces.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Invalid => "INVALID",
            Self::Standby => "STANDBY",
            Self::Recovery => "RECOVERY",
            Self::Logging => "LOGGING",
            Self::Terminate => "TERMINATE",
            Self::Sleep => "SLEEP",
        }
    }

    /// Whether a move from `self` to `next` is a legal single step.
    #[must_use]
    pub fn can_advance_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Invalid, Self::Standby)
                | (Self::Standby, Self::Recovery)
                | (Self::Recovery, Self::Logging)
                | (Self::Logging, Self::Terminate)
                | (Self::Terminate, Self::Sleep)
        )
    }
}

impl fmt::Display for LoggingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn modes_are_ordered_by_lifecycle() {
        assert!(LoggingMode::Invalid < LoggingMode::Standby);
        assert!(LoggingMode::Recovery < LoggingMode::Logging);
        assert!(LoggingMode::Terminate < LoggingMode::Sleep);
        assert_eq!(LoggingMode::default(), LoggingMode::Invalid);
    }

    #[test]
    fn only_single_forward_steps_are_legal() {
        assert!(LoggingMode::Invalid.can_advance_to(LoggingMode::Standby));
        assert!(LoggingMode::Logging.can_advance_to(LoggingMode::Terminate));
        assert!(!LoggingMode::Standby.can_advance_to(LoggingMode::Logging));
        assert!(!LoggingMode::Logging.can_advance_to(LoggingMode::Recovery));
        assert!(!LoggingMode::Sleep.can_advance_to(LoggingMode::Invalid));
    }
}
