//! Controller configuration.

use crate::finishing::{And, Finishing, IterationsFinishing};
use crate::{Error, Result, Status};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Callback invoked on every status transition.
pub type Notifier = Arc<dyn Fn(&Status) + Send + Sync>;

/// Control parameters of an [`crate::Algo`].
///
/// A configuration is read when a run starts and when it resumes from
/// `Idle`; replacing it while running has no effect on the current run.
#[derive(Clone, Default)]
pub struct Conf {
    /// Iterations to run after each `play` before the run may stop
    /// (0 = no limit).
    pub iter: usize,
    /// Maximum iterations per second (0 = no cap).
    pub iter_freq: f64,
    /// Interrupts the run with `Error::Timeout` after this duration
    /// (zero = none).
    pub timeout: Duration,
    /// Pushed elements needed to restart a `Ready` controller
    /// automatically (0 = never).
    pub data_per_iter: usize,
    /// Status transition callback.
    pub notifier: Option<Notifier>,
    /// Additional stopping condition.
    pub finishing: Option<Arc<dyn Finishing>>,
}

impl Conf {
    /// Creates a configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the iteration count.
    #[must_use]
    pub fn with_iter(mut self, iter: usize) -> Self {
        self.iter = iter;
        self
    }

    /// Sets the iteration frequency cap.
    #[must_use]
    pub fn with_iter_freq(mut self, iter_freq: f64) -> Self {
        self.iter_freq = iter_freq;
        self
    }

    /// Sets the timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Sets the pushed-data threshold for automatic restart.
    #[must_use]
    pub fn with_data_per_iter(mut self, data_per_iter: usize) -> Self {
        self.data_per_iter = data_per_iter;
        self
    }

    /// Sets the status notifier.
    #[must_use]
    pub fn with_notifier<F>(mut self, notifier: F) -> Self
    where
        F: Fn(&Status) + Send + Sync + 'static,
    {
        self.notifier = Some(Arc::new(notifier));
        self
    }

    /// Sets the finishing predicate.
    #[must_use]
    pub fn with_finishing<F>(mut self, finishing: F) -> Self
    where
        F: Finishing + 'static,
    {
        self.finishing = Some(Arc::new(finishing));
        self
    }

    /// Checks parameter ranges.
    ///
    /// # Errors
    /// Returns `ConfigError` for a negative or non-finite frequency, or a
    /// positive one whose period does not fit a `Duration`.
    pub fn validate(&self) -> Result<()> {
        if !self.iter_freq.is_finite() || self.iter_freq < 0.0 {
            return Err(Error::ConfigError(format!(
                "iteration frequency must be a non-negative number, got {}",
                self.iter_freq
            )));
        }
        if self.iter_freq > 0.0 && Duration::try_from_secs_f64(1.0 / self.iter_freq).is_err() {
            return Err(Error::ConfigError(format!(
                "iteration frequency {} is too low",
                self.iter_freq
            )));
        }
        Ok(())
    }

    /// Minimum duration of one iteration, derived from `iter_freq`.
    ///
    /// `None` when the frequency is unlimited or out of range.
    #[must_use]
    pub fn iter_period(&self) -> Option<Duration> {
        if self.iter_freq > 0.0 {
            Duration::try_from_secs_f64(1.0 / self.iter_freq).ok()
        } else {
            None
        }
    }

    /// Stopping condition of a run: `iter` iterations, and then the
    /// finishing predicate if one is set. `None` if the run only stops on
    /// request.
    #[must_use]
    pub fn run_finishing(&self) -> Option<Box<dyn Finishing>> {
        let iterations =
            (self.iter > 0).then(|| Box::new(IterationsFinishing::new(self.iter)) as Box<dyn Finishing>);
        let custom = self
            .finishing
            .clone()
            .map(|finishing| Box::new(finishing) as Box<dyn Finishing>);
        match (iterations, custom) {
            (Some(iterations), Some(custom)) => Some(Box::new(And(vec![iterations, custom]))),
            (iterations, None) => iterations,
            (None, custom) => custom,
        }
    }

    /// Returns true if a run can end without an explicit stop.
    #[must_use]
    pub fn can_finish(&self) -> bool {
        self.iter > 0 || self.finishing.is_some() || !self.timeout.is_zero()
    }
}

impl fmt::Debug for Conf {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Conf")
            .field("iter", &self.iter)
            .field("iter_freq", &self.iter_freq)
            .field("timeout", &self.timeout)
            .field("data_per_iter", &self.data_per_iter)
            .field("notifier", &self.notifier.is_some())
            .field("finishing", &self.finishing.is_some())
            .finish()
    }
}
