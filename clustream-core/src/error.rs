//! Error types for clustream-core.

use thiserror::Error;

/// Result type alias for clustream operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error types for clustream operations.
///
/// Errors are cloneable so that the one carried by a failed run can be
/// handed out to every caller reading the status.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// `init` called on an algorithm that was already initialized.
    #[error("algorithm already created")]
    AlreadyCreated,

    /// Operation requires an algorithm that was started at least once.
    #[error("algorithm not started")]
    NotStarted,

    /// Operation requires a running algorithm.
    #[error("algorithm not running")]
    NotRunning,

    /// Operation requires the run thread to be out of its iteration loop.
    #[error("algorithm not idle")]
    NotIdle,

    /// `play` called on an algorithm that is already running.
    #[error("algorithm already running")]
    Running,

    /// A wait was requested without any condition able to end it.
    #[error("algorithm never finishes: no iteration limit, finishing predicate or timeout")]
    NeverFinish,

    /// The timeout fired before the algorithm finished.
    #[error("timeout")]
    Timeout,

    /// The asynchronous buffer queue is saturated.
    #[error("buffer full")]
    BufferFull,

    /// Not enough data to perform the computation.
    #[error("not enough data: {required} required, {available} available")]
    NotEnoughData { required: usize, available: usize },

    /// No centroids have been computed yet.
    #[error("no centroids available")]
    NoCentroids,

    /// Computation reported a failure.
    #[error("computation error: {0}")]
    Computation(String),

    /// Computation panicked in the run thread.
    #[error("computation panicked: {0}")]
    Panic(String),

    /// Configuration error.
    #[error("configuration error: {0}")]
    ConfigError(String),

    /// A worker thread could not be spawned.
    #[error("thread error: {0}")]
    Thread(String),
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Self::Thread(err.to_string())
    }
}

/// Renders a caught panic payload as a message.
pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_string()
    }
}
