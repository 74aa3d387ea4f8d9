//! Full-buffer weighted-mean refinement.

use crate::Initializer;
use clustream_core::{
    Buffer, Clust, Elemt, Error, Impl, Iteration, Model, Result, RuntimeFigures,
};
use log::debug;
use parking_lot::Mutex;
use rand::{RngCore, SeedableRng};
use rand_chacha::ChaCha8Rng;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Loss figure published by the refinement variants.
pub const LOSS: &str = "loss";

/// Parameters of [`Lloyd`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct LloydConf {
    /// Number of centroids.
    pub k: usize,
    /// Parallel degree of assignment and reduction.
    pub degree: usize,
}

impl Default for LloydConf {
    fn default() -> Self {
        Self { k: 3, degree: 1 }
    }
}

/// Lloyd refinement: each iteration moves every centroid to the mean of
/// the buffered elements nearest to it.
pub struct Lloyd<E> {
    conf: LloydConf,
    initializer: Initializer<E>,
    buffer: Buffer<E>,
    rng: Mutex<ChaCha8Rng>,
}

impl<E: Elemt> Lloyd<E> {
    /// Creates the variant over `buffer`, seeding its generator with `seed`.
    #[must_use]
    pub fn new(conf: LloydConf, initializer: Initializer<E>, buffer: Buffer<E>, seed: u64) -> Self {
        Self::with_rng(conf, initializer, buffer, ChaCha8Rng::seed_from_u64(seed))
    }

    fn with_rng(
        conf: LloydConf,
        initializer: Initializer<E>,
        buffer: Buffer<E>,
        rng: ChaCha8Rng,
    ) -> Self {
        Self {
            conf,
            initializer,
            buffer,
            rng: Mutex::new(rng),
        }
    }

    /// Parameters of the variant.
    #[must_use]
    pub fn conf(&self) -> LloydConf {
        self.conf
    }

    /// Buffer holding the elements to cluster.
    #[must_use]
    pub fn buffer(&self) -> &Buffer<E> {
        &self.buffer
    }
}

impl<E: Elemt> Impl<E> for Lloyd<E> {
    fn init(&self, _model: &Model<'_, E>) -> Result<Clust<E>> {
        self.buffer.apply();
        let data = self.buffer.data();
        let centroids = self
            .initializer
            .init(self.conf.k, &data, &mut *self.rng.lock())?;
        debug!("lloyd initialized {} centroids", centroids.len());
        Ok(centroids)
    }

    fn iterate(&self, model: &Model<'_, E>) -> Result<Option<Iteration<E>>> {
        self.buffer.apply();
        let data = self.buffer.data();
        if data.is_empty() {
            return Ok(None);
        }
        let centroids = model.centroids().ok_or(Error::NoCentroids)?;
        let space = model.space();

        let next = centroids.par_dba(&data, space, self.conf.degree);
        let loss = next.par_loss(&data, space, 2.0, self.conf.degree);
        Ok(Some(Iteration::new(
            next,
            RuntimeFigures::new().with(LOSS, loss),
        )))
    }

    fn push(&self, elemt: E, _running: bool) -> Result<()> {
        self.buffer.push(elemt)
    }

    fn copy(&self, _model: &Model<'_, E>) -> Result<Box<dyn Impl<E>>> {
        Ok(Box::new(Self::with_rng(
            self.conf,
            self.initializer.clone(),
            copy_buffer(&self.buffer),
            fork(&mut self.rng.lock()),
        )))
    }
}

/// Copies the elements and the asynchronous mode of `buffer`. Queued
/// elements are applied first so the copy holds them too.
pub(crate) fn copy_buffer<E: Elemt>(buffer: &Buffer<E>) -> Buffer<E> {
    buffer.apply();
    let copy = buffer.clone();
    if let Some(queue_size) = buffer.queue_size() {
        copy.set_async(queue_size);
    }
    copy
}

/// New generator seeded from the stream of `rng`.
pub(crate) fn fork(rng: &mut ChaCha8Rng) -> ChaCha8Rng {
    ChaCha8Rng::seed_from_u64(rng.next_u64())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_copy_buffer_keeps_queued_elements() {
        let buffer = Buffer::bounded(vec![1, 2], 4).unwrap();
        buffer.set_async(8);
        buffer.push(3).unwrap();
        buffer.push(4).unwrap();

        let copy = copy_buffer(&buffer);
        assert_eq!(copy.data().as_slice(), &[1, 2, 3, 4]);
        assert_eq!(copy.queue_size(), Some(8));
        assert_eq!(copy.capacity(), Some(4));

        // the copy is independent of the source queue
        buffer.push(5).unwrap();
        buffer.apply();
        assert_eq!(buffer.data().as_slice(), &[5, 2, 3, 4]);
        assert_eq!(copy.data().as_slice(), &[1, 2, 3, 4]);
    }
}
