//! Named numeric metrics describing run progress.

use std::collections::BTreeMap;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Total iterations since the last initialization.
pub const ITERATIONS: &str = "iterations";
/// Iterations since the last `play`.
pub const PLAY_ITERATIONS: &str = "play_iterations";
/// Cumulative run duration in seconds.
pub const DURATION: &str = "duration";
/// Total elements pushed through the controller.
pub const PUSHED_DATA: &str = "pushed_data";
/// Elements pushed since the last `play`.
pub const NEW_DATA: &str = "new_data";
/// Time of the last push, in seconds since the Unix epoch.
pub const LAST_DATA_TIME: &str = "last_data_time";

/// Figures maintained by the controller itself. They are carried over when
/// a computation publishes a fresh set of figures.
pub const CONTROLLER_FIGURES: [&str; 6] = [
    ITERATIONS,
    PLAY_ITERATIONS,
    DURATION,
    PUSHED_DATA,
    NEW_DATA,
    LAST_DATA_TIME,
];

/// Mapping from metric name to value.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct RuntimeFigures {
    values: BTreeMap<String, f64>,
}

impl RuntimeFigures {
    /// Creates an empty set of figures.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the value of a figure, if present.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<f64> {
        self.values.get(name).copied()
    }

    /// Returns the value of a figure, or zero.
    #[must_use]
    pub fn value(&self, name: &str) -> f64 {
        self.get(name).unwrap_or(0.0)
    }

    /// Sets a figure.
    pub fn set(&mut self, name: impl Into<String>, value: f64) {
        self.values.insert(name.into(), value);
    }

    /// Sets a figure, builder style.
    #[must_use]
    pub fn with(mut self, name: impl Into<String>, value: f64) -> Self {
        self.set(name, value);
        self
    }

    /// Adds `delta` to a figure, starting from zero.
    pub fn add(&mut self, name: &str, delta: f64) {
        *self.values.entry(name.to_string()).or_insert(0.0) += delta;
    }

    /// Removes a figure.
    pub fn remove(&mut self, name: &str) -> Option<f64> {
        self.values.remove(name)
    }

    /// Returns the number of figures.
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Returns true if no figure is set.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Iterates over figures in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.values.iter().map(|(name, value)| (name.as_str(), *value))
    }

    /// Copies the controller-owned figures of `previous` into `self`.
    pub(crate) fn carry_over(&mut self, previous: &RuntimeFigures) {
        for name in CONTROLLER_FIGURES {
            match previous.get(name) {
                Some(value) => self.set(name, value),
                None => {
                    self.remove(name);
                }
            }
        }
    }
}

impl FromIterator<(String, f64)> for RuntimeFigures {
    fn from_iter<I: IntoIterator<Item = (String, f64)>>(iter: I) -> Self {
        Self {
            values: iter.into_iter().collect(),
        }
    }
}
