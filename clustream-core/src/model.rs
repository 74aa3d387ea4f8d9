//! Computation contract driven by the controller.

use crate::{Clust, Conf, Elemt, Result, RuntimeFigures, Space, Status};
use std::sync::Arc;

/// Read-only view of a controller handed to its computation.
pub struct Model<'a, E> {
    conf: &'a Conf,
    space: &'a dyn Space<E>,
    status: Status,
    figures: RuntimeFigures,
    centroids: Option<Arc<Clust<E>>>,
}

impl<'a, E: Elemt> Model<'a, E> {
    pub(crate) fn new(
        conf: &'a Conf,
        space: &'a dyn Space<E>,
        status: Status,
        figures: RuntimeFigures,
        centroids: Option<Arc<Clust<E>>>,
    ) -> Self {
        Self {
            conf,
            space,
            status,
            figures,
            centroids,
        }
    }

    /// Controller configuration.
    #[must_use]
    pub fn conf(&self) -> &Conf {
        self.conf
    }

    /// Space used to measure and merge points.
    #[must_use]
    pub fn space(&self) -> &dyn Space<E> {
        self.space
    }

    /// Controller status when the view was taken.
    #[must_use]
    pub fn status(&self) -> &Status {
        &self.status
    }

    /// Runtime figures when the view was taken.
    #[must_use]
    pub fn runtime_figures(&self) -> &RuntimeFigures {
        &self.figures
    }

    /// Last published centroids, if any.
    #[must_use]
    pub fn centroids(&self) -> Option<&Clust<E>> {
        self.centroids.as_deref()
    }
}

/// Outcome of one unit of work.
#[derive(Debug, Clone)]
pub struct Iteration<E> {
    /// New centroids, replacing the previous ones.
    pub centroids: Clust<E>,
    /// Computation-specific figures. Controller-owned figures are carried
    /// over by the controller.
    pub figures: RuntimeFigures,
}

impl<E> Iteration<E> {
    /// Creates an iteration result.
    #[must_use]
    pub fn new(centroids: Clust<E>, figures: RuntimeFigures) -> Self {
        Self { centroids, figures }
    }
}

/// Algorithm plugged into an [`crate::Algo`].
///
/// All methods take `&self`: `push` is called from caller threads while
/// `iterate` runs on the run thread, so implementations synchronize their
/// own state (typically through a [`crate::Buffer`]).
pub trait Impl<E: Elemt>: Send + Sync {
    /// Computes the initial centroids from the data available so far.
    ///
    /// # Errors
    /// Typically `NotEnoughData` when the buffer is too small.
    fn init(&self, model: &Model<'_, E>) -> Result<Clust<E>>;

    /// Performs one unit of work.
    ///
    /// `Ok(None)` means nothing was done, for instance for lack of new data;
    /// no iteration is counted.
    ///
    /// # Errors
    /// Any error fails the run.
    fn iterate(&self, model: &Model<'_, E>) -> Result<Option<Iteration<E>>>;

    /// Stages a pushed element. `running` tells whether the run thread is
    /// currently iterating.
    ///
    /// # Errors
    /// Errors are returned to the pushing caller.
    fn push(&self, elemt: E, running: bool) -> Result<()>;

    /// Creates an independent copy for a reconfigured controller.
    ///
    /// # Errors
    /// Implementation specific.
    fn copy(&self, model: &Model<'_, E>) -> Result<Box<dyn Impl<E>>>;
}
