//! Convergence predicates deciding when a run stops.

use crate::error::panic_message;
use crate::figures::PLAY_ITERATIONS;
use crate::{RuntimeFigures, Status};
use log::warn;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

/// Predicate over the observable state of a controller.
pub trait Finishing: Send + Sync {
    /// Returns true when the run should stop.
    fn is_finished(&self, status: &Status, figures: &RuntimeFigures) -> bool;
}

impl<F: Finishing + ?Sized> Finishing for Box<F> {
    fn is_finished(&self, status: &Status, figures: &RuntimeFigures) -> bool {
        (**self).is_finished(status, figures)
    }
}

impl<F: Finishing + ?Sized> Finishing for Arc<F> {
    fn is_finished(&self, status: &Status, figures: &RuntimeFigures) -> bool {
        (**self).is_finished(status, figures)
    }
}

/// Finished once `max_iter` iterations ran since the last `play`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IterationsFinishing {
    /// Number of iterations to run.
    pub max_iter: usize,
}

impl IterationsFinishing {
    /// Creates the predicate.
    #[must_use]
    pub fn new(max_iter: usize) -> Self {
        Self { max_iter }
    }
}

impl Finishing for IterationsFinishing {
    #[allow(clippy::cast_precision_loss)]
    fn is_finished(&self, _status: &Status, figures: &RuntimeFigures) -> bool {
        figures.value(PLAY_ITERATIONS) >= self.max_iter as f64
    }
}

/// Finished when every inner predicate is. Stops at the first unfinished one.
pub struct And(pub Vec<Box<dyn Finishing>>);

impl Finishing for And {
    fn is_finished(&self, status: &Status, figures: &RuntimeFigures) -> bool {
        self.0.iter().all(|f| f.is_finished(status, figures))
    }
}

/// Finished when any inner predicate is. Stops at the first finished one.
pub struct Or(pub Vec<Box<dyn Finishing>>);

impl Finishing for Or {
    fn is_finished(&self, status: &Status, figures: &RuntimeFigures) -> bool {
        self.0.iter().any(|f| f.is_finished(status, figures))
    }
}

/// Predicate backed by a closure.
pub struct FnFinishing<F>(F);

impl<F> Finishing for FnFinishing<F>
where
    F: Fn(&Status, &RuntimeFigures) -> bool + Send + Sync,
{
    fn is_finished(&self, status: &Status, figures: &RuntimeFigures) -> bool {
        (self.0)(status, figures)
    }
}

/// Wraps a closure into a [`Finishing`] predicate.
pub fn from_fn<F>(f: F) -> FnFinishing<F>
where
    F: Fn(&Status, &RuntimeFigures) -> bool + Send + Sync,
{
    FnFinishing(f)
}

/// Evaluates `finishing`, treating a panic as "not finished".
pub fn is_finished(finishing: &dyn Finishing, status: &Status, figures: &RuntimeFigures) -> bool {
    catch_unwind(AssertUnwindSafe(|| finishing.is_finished(status, figures))).unwrap_or_else(
        |payload| {
            warn!(
                "finishing predicate panicked: {}",
                panic_message(payload.as_ref())
            );
            false
        },
    )
}
