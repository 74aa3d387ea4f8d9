//! Space contract consumed by the core.

/// Data point type handled by the core.
///
/// Points are opaque: the core only clones them and hands them to a
/// [`Space`].
pub trait Elemt: Clone + Send + Sync + 'static {}

impl<T: Clone + Send + Sync + 'static> Elemt for T {}

/// Metric space able to measure and merge points.
///
/// Implementations are called concurrently from worker threads and must
/// not mutate shared state.
pub trait Space<E>: Send + Sync {
    /// Distance between two points.
    fn distance(&self, a: &E, b: &E) -> f64;

    /// Weighted merge of two points.
    fn combine(&self, a: &E, weight_a: f64, b: &E, weight_b: f64) -> E;

    /// Independent copy of a point.
    fn copy(&self, elemt: &E) -> E
    where
        E: Clone,
    {
        elemt.clone()
    }
}
