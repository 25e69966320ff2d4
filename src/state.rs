//! Runner lifecycle state.

use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};

/// Lifecycle state of a [`Runner`](crate::Runner).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum State {
    /// State could not be determined.
    #[default]
    Unknown = 0,
    /// The server has not been started.
    NotStarted = 1,
    /// The server is running without incident.
    Running = 2,
    /// The server failed, or the run was cancelled, before shutdown was triggered.
    Failed = 3,
    /// A shutdown trigger was received and lame-duck mode is in progress.
    Stopping = 4,
    /// The server has been stopped.
    Stopped = 5,
}

impl From<u8> for State {
    fn from(value: u8) -> Self {
        match value {
            1 => State::NotStarted,
            2 => State::Running,
            3 => State::Failed,
            4 => State::Stopping,
            5 => State::Stopped,
            _ => State::Unknown,
        }
    }
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            State::NotStarted => "NOT_STARTED",
            State::Running => "RUNNING",
            State::Failed => "FAILED",
            State::Stopping => "STOPPING",
            State::Stopped => "STOPPED",
            State::Unknown => "UNKNOWN",
        };
        f.write_str(s)
    }
}

/// Atomically updated [`State`] cell shared by both control paths.
#[derive(Debug)]
pub(crate) struct AtomicState(AtomicU8);

impl AtomicState {
    pub(crate) fn new(state: State) -> Self {
        Self(AtomicU8::new(state as u8))
    }

    pub(crate) fn load(&self) -> State {
        State::from(self.0.load(Ordering::Acquire))
    }

    pub(crate) fn store(&self, state: State) {
        self.0.store(state as u8, Ordering::Release);
    }

    /// Moves from `current` to `new`; returns false if the state was not `current`.
    pub(crate) fn transition(&self, current: State, new: State) -> bool {
        self.0
            .compare_exchange(
                current as u8,
                new as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        assert_eq!(State::NotStarted.to_string(), "NOT_STARTED");
        assert_eq!(State::Stopping.to_string(), "STOPPING");
        assert_eq!(State::default().to_string(), "UNKNOWN");
    }

    #[test]
    fn test_unknown_fallback() {
        assert_eq!(State::from(42), State::Unknown);
        assert_eq!(State::from(State::Stopped as u8), State::Stopped);
    }

    #[test]
    fn test_transition_requires_current_state() {
        let state = AtomicState::new(State::NotStarted);
        assert!(!state.transition(State::Running, State::Stopping));
        assert!(state.transition(State::NotStarted, State::Running));
        assert_eq!(state.load(), State::Running);
    }
}
