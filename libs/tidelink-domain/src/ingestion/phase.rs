//! Invocation state machine
//!
//! `Fetching -> Parsing -> Validating -> Writing -> Completed`, with an exit to
//! `Failed` from any non-terminal phase for invocation-fatal conditions.

use std::fmt;

use tracing::{debug, error};

use super::IngestionError;

/// Phase of a single invocation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    Fetching,
    Parsing,
    Validating,
    Writing,
    Completed,
    Failed,
}

impl Phase {
    /// Whether the machine may move from `self` to `next`
    pub fn can_advance_to(self, next: Phase) -> bool {
        matches!(
            (self, next),
            (Self::Fetching, Self::Parsing)
                | (Self::Parsing, Self::Validating)
                | (Self::Validating, Self::Writing)
                | (Self::Writing, Self::Completed)
        ) || (next == Self::Failed && !self.is_terminal())
    }

    /// Whether no further transition is possible
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Fetching => "fetching",
            Self::Parsing => "parsing",
            Self::Validating => "validating",
            Self::Writing => "writing",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Tracks the current phase of one invocation and logs transitions
#[derive(Debug)]
pub(crate) struct PhaseTracker {
    current: Phase,
}

impl PhaseTracker {
    pub(crate) fn new() -> Self {
        debug!(phase = %Phase::Fetching, "Invocation started");
        Self {
            current: Phase::Fetching,
        }
    }

    pub(crate) fn current(&self) -> Phase {
        self.current
    }

    pub(crate) fn advance(&mut self, next: Phase) {
        debug_assert!(
            self.current.can_advance_to(next),
            "illegal transition {} -> {}",
            self.current,
            next
        );
        debug!(from = %self.current, to = %next, "Phase transition");
        self.current = next;
    }

    /// Move to `Failed` and hand the error back for propagation
    pub(crate) fn fail(&mut self, err: IngestionError) -> IngestionError {
        error!(phase = %self.current, error = %err, "Invocation failed");
        self.current = Phase::Failed;
        err
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [Phase; 6] = [
        Phase::Fetching,
        Phase::Parsing,
        Phase::Validating,
        Phase::Writing,
        Phase::Completed,
        Phase::Failed,
    ];

    #[test]
    fn test_happy_path_is_linear() {
        assert!(Phase::Fetching.can_advance_to(Phase::Parsing));
        assert!(Phase::Parsing.can_advance_to(Phase::Validating));
        assert!(Phase::Validating.can_advance_to(Phase::Writing));
        assert!(Phase::Writing.can_advance_to(Phase::Completed));

        assert!(!Phase::Fetching.can_advance_to(Phase::Writing));
        assert!(!Phase::Validating.can_advance_to(Phase::Completed));
        assert!(!Phase::Writing.can_advance_to(Phase::Parsing));
    }

    #[test]
    fn test_any_running_phase_can_fail() {
        for phase in ALL.into_iter().filter(|p| !p.is_terminal()) {
            assert!(phase.can_advance_to(Phase::Failed), "{} -> failed", phase);
        }
    }

    #[test]
    fn test_terminal_phases_have_no_exit() {
        for next in ALL {
            assert!(!Phase::Completed.can_advance_to(next));
            assert!(!Phase::Failed.can_advance_to(next));
        }
    }

    #[test]
    fn test_tracker_fail_returns_error() {
        let mut tracker = PhaseTracker::new();
        tracker.advance(Phase::Parsing);

        let err = tracker.fail(IngestionError::malformed_batch("bad"));

        assert_eq!(tracker.current(), Phase::Failed);
        assert!(matches!(err, IngestionError::MalformedBatch { .. }));
    }
}
