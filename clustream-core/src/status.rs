//! Algorithm lifecycle states.

use crate::Error;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Lifecycle state of an algorithm controller.
///
/// `Created -> Initializing -> Ready -> Running <-> Idle`, then
/// `Finished` on stop or `Failed` on error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum State {
    /// Constructed, never initialized.
    Created,
    /// Computing the initial centroids.
    Initializing,
    /// Initialized, no run thread iterating.
    Ready,
    /// The run thread is iterating.
    Running,
    /// The run thread is paused.
    Idle,
    /// Stopped by the caller.
    Finished,
    /// Stopped by an error.
    Failed,
}

impl State {
    /// Returns true if the controller holds a usable computation.
    #[must_use]
    pub fn is_alive(self) -> bool {
        matches!(
            self,
            State::Initializing | State::Ready | State::Running | State::Idle
        )
    }

    /// Returns true for `Finished` and `Failed`.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, State::Finished | State::Failed)
    }

    /// Returns true while a run thread exists.
    #[must_use]
    pub fn is_running(self) -> bool {
        matches!(self, State::Running | State::Idle)
    }
}

/// Snapshot of the controller status: a state and an optional error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Status {
    /// Current lifecycle state.
    pub state: State,
    /// Error which caused the last failure, if any.
    pub error: Option<Error>,
}

impl Status {
    /// Creates a status without error.
    #[must_use]
    pub fn new(state: State) -> Self {
        Self { state, error: None }
    }

    /// Creates a status carrying an error.
    #[must_use]
    pub fn with_error(state: State, error: Option<Error>) -> Self {
        Self { state, error }
    }
}

impl Default for Status {
    fn default() -> Self {
        Self::new(State::Created)
    }
}
