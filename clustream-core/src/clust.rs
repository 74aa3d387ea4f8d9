//! Centroid sets and the reductions computed against them.
//!
//! Every reduction comes in a sequential and a parallel flavour. The
//! parallel one splits the data with [`crate::par::par`] and folds the
//! per-partition partial results in rank order, so both agree up to
//! floating-point accumulation order.

use crate::par::par;
use crate::{Elemt, Space};
use std::ops::Index;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Ordered sequence of centroids. The position of a centroid is its label.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Clust<E> {
    centroids: Vec<E>,
}

/// Per-centroid running weighted merge.
type Partial<E> = Vec<Option<(E, f64)>>;

/// Per-centroid sum of `distance^norm` and cardinality.
type LossPartial = Vec<(f64, usize)>;

impl<E> Clust<E> {
    /// Creates a centroid set.
    #[must_use]
    pub fn new(centroids: Vec<E>) -> Self {
        Self { centroids }
    }

    /// Returns the number of centroids.
    #[must_use]
    pub fn len(&self) -> usize {
        self.centroids.len()
    }

    /// Returns true if there is no centroid.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.centroids.is_empty()
    }

    /// Returns the centroid with the given label.
    #[must_use]
    pub fn get(&self, label: usize) -> Option<&E> {
        self.centroids.get(label)
    }

    /// Returns an iterator over the centroids.
    pub fn iter(&self) -> impl Iterator<Item = &E> {
        self.centroids.iter()
    }

    /// Returns the centroids as a slice.
    #[must_use]
    pub fn as_slice(&self) -> &[E] {
        &self.centroids
    }

    /// Consumes the set, returning the centroids.
    #[must_use]
    pub fn into_inner(self) -> Vec<E> {
        self.centroids
    }
}

impl<E: Elemt> Clust<E> {
    /// Label and distance of the centroid nearest to `elemt`.
    ///
    /// Ties go to the lowest label. Returns `None` for an empty set.
    pub fn nearest(&self, elemt: &E, space: &dyn Space<E>) -> Option<(usize, f64)> {
        let mut best: Option<(usize, f64)> = None;
        for (label, centroid) in self.centroids.iter().enumerate() {
            let dist = space.distance(elemt, centroid);
            match best {
                Some((_, best_dist)) if dist >= best_dist => {}
                _ => best = Some((label, dist)),
            }
        }
        best
    }

    /// Nearest-centroid labels and distances for every element.
    ///
    /// # Panics
    /// Panics if the set is empty and `data` is not.
    pub fn assign_all(&self, data: &[E], space: &dyn Space<E>) -> (Vec<usize>, Vec<f64>) {
        self.assign_range(data, space)
    }

    /// Parallel version of [`Clust::assign_all`].
    ///
    /// # Panics
    /// Panics if the set is empty and `data` is not.
    pub fn par_assign_all(
        &self,
        data: &[E],
        space: &dyn Space<E>,
        degree: usize,
    ) -> (Vec<usize>, Vec<f64>) {
        let parts = par(data.len(), degree, |range, _| {
            self.assign_range(&data[range], space)
        });
        let mut labels = Vec::with_capacity(data.len());
        let mut dists = Vec::with_capacity(data.len());
        for (part_labels, part_dists) in parts {
            labels.extend(part_labels);
            dists.extend(part_dists);
        }
        (labels, dists)
    }

    /// Recomputes every centroid as the weighted average of the elements
    /// assigned to it. Centroids without any element keep their value.
    #[must_use]
    pub fn dba(&self, data: &[E], space: &dyn Space<E>) -> Clust<E> {
        let partial = self.dba_range(data, space);
        self.finish_dba(partial)
    }

    /// Parallel version of [`Clust::dba`].
    #[must_use]
    pub fn par_dba(&self, data: &[E], space: &dyn Space<E>, degree: usize) -> Clust<E> {
        let parts = par(data.len(), degree, |range, _| {
            self.dba_range(&data[range], space)
        });
        let mut merged: Partial<E> = vec![None; self.len()];
        for part in parts {
            for (acc, other) in merged.iter_mut().zip(part) {
                *acc = merge(space, acc.take(), other);
            }
        }
        self.finish_dba(merged)
    }

    /// Mean of `distance^norm` over `data`. Zero for empty data.
    pub fn loss(&self, data: &[E], space: &dyn Space<E>, norm: f64) -> f64 {
        total_loss(&self.loss_range(data, space, norm))
    }

    /// Parallel version of [`Clust::loss`].
    pub fn par_loss(&self, data: &[E], space: &dyn Space<E>, norm: f64, degree: usize) -> f64 {
        let parts = par(data.len(), degree, |range, _| {
            self.loss_range(&data[range], space, norm)
        });
        let mut merged: LossPartial = vec![(0.0, 0); self.len()];
        for part in parts {
            for ((sum, card), (part_sum, part_card)) in merged.iter_mut().zip(part) {
                *sum += part_sum;
                *card += part_card;
            }
        }
        total_loss(&merged)
    }

    fn assign_range(&self, data: &[E], space: &dyn Space<E>) -> (Vec<usize>, Vec<f64>) {
        data.iter()
            .map(|elemt| {
                self.nearest(elemt, space)
                    .unwrap_or_else(|| panic!("cannot assign elements to an empty centroid set"))
            })
            .unzip()
    }

    fn dba_range(&self, data: &[E], space: &dyn Space<E>) -> Partial<E> {
        let mut partial: Partial<E> = vec![None; self.len()];
        for elemt in data {
            let Some((label, _)) = self.nearest(elemt, space) else {
                break;
            };
            let acc = partial[label].take();
            partial[label] = merge(space, acc, Some((space.copy(elemt), 1.0)));
        }
        partial
    }

    fn loss_range(&self, data: &[E], space: &dyn Space<E>, norm: f64) -> LossPartial {
        let mut partial: LossPartial = vec![(0.0, 0); self.len()];
        for elemt in data {
            if let Some((label, dist)) = self.nearest(elemt, space) {
                partial[label].0 += dist.powf(norm);
                partial[label].1 += 1;
            }
        }
        partial
    }

    fn finish_dba(&self, partial: Partial<E>) -> Clust<E> {
        partial
            .into_iter()
            .zip(&self.centroids)
            .map(|(acc, previous)| acc.map_or_else(|| previous.clone(), |(mean, _)| mean))
            .collect()
    }
}

fn merge<E: Elemt>(
    space: &dyn Space<E>,
    acc: Option<(E, f64)>,
    other: Option<(E, f64)>,
) -> Option<(E, f64)> {
    match (acc, other) {
        (Some((a, wa)), Some((b, wb))) => Some((space.combine(&a, wa, &b, wb), wa + wb)),
        (acc, None) => acc,
        (None, other) => other,
    }
}

#[allow(clippy::cast_precision_loss)]
fn total_loss(partial: &LossPartial) -> f64 {
    let (sum, card) = partial
        .iter()
        .fold((0.0, 0), |(sum, card), (s, c)| (sum + s, card + c));
    if card == 0 {
        0.0
    } else {
        sum / card as f64
    }
}

impl<E> FromIterator<E> for Clust<E> {
    fn from_iter<I: IntoIterator<Item = E>>(iter: I) -> Self {
        Self {
            centroids: iter.into_iter().collect(),
        }
    }
}

impl<E> From<Vec<E>> for Clust<E> {
    fn from(centroids: Vec<E>) -> Self {
        Self { centroids }
    }
}

impl<E> Index<usize> for Clust<E> {
    type Output = E;

    fn index(&self, label: usize) -> &E {
        &self.centroids[label]
    }
}
