//! Sampled incremental refinement.

use crate::lloyd::{copy_buffer, fork, LOSS};
use crate::Initializer;
use clustream_core::{
    Buffer, Clust, Elemt, Error, Impl, Iteration, Model, Result, RuntimeFigures,
};
use log::debug;
use parking_lot::Mutex;
use rand::seq::index::sample;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Size of the batch drawn by the last iteration.
pub const BATCH_SIZE: &str = "batch_size";

/// Parameters of [`MiniBatch`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct MiniBatchConf {
    /// Number of centroids.
    pub k: usize,
    /// Elements drawn per iteration.
    pub batch_size: usize,
}

impl Default for MiniBatchConf {
    fn default() -> Self {
        Self {
            k: 3,
            batch_size: 100,
        }
    }
}

struct Progress {
    rng: ChaCha8Rng,
    /// Elements merged into each centroid since initialization.
    counts: Vec<f64>,
}

/// Mini-batch refinement: each iteration draws a batch of buffered
/// elements and moves their nearest centroids towards them with a step
/// decreasing as the centroid absorbs more elements.
pub struct MiniBatch<E> {
    conf: MiniBatchConf,
    initializer: Initializer<E>,
    buffer: Buffer<E>,
    progress: Mutex<Progress>,
}

impl<E: Elemt> MiniBatch<E> {
    /// Creates the variant over `buffer`, seeding its generator with `seed`.
    #[must_use]
    pub fn new(
        conf: MiniBatchConf,
        initializer: Initializer<E>,
        buffer: Buffer<E>,
        seed: u64,
    ) -> Self {
        Self {
            conf,
            initializer,
            buffer,
            progress: Mutex::new(Progress {
                rng: ChaCha8Rng::seed_from_u64(seed),
                counts: Vec::new(),
            }),
        }
    }

    /// Parameters of the variant.
    #[must_use]
    pub fn conf(&self) -> MiniBatchConf {
        self.conf
    }

    /// Buffer holding the elements to cluster.
    #[must_use]
    pub fn buffer(&self) -> &Buffer<E> {
        &self.buffer
    }
}

impl<E: Elemt> Impl<E> for MiniBatch<E> {
    fn init(&self, _model: &Model<'_, E>) -> Result<Clust<E>> {
        self.buffer.apply();
        let data = self.buffer.data();
        let mut progress = self.progress.lock();
        let centroids = self.initializer.init(self.conf.k, &data, &mut progress.rng)?;
        progress.counts = vec![0.0; centroids.len()];
        debug!("mini-batch initialized {} centroids", centroids.len());
        Ok(centroids)
    }

    fn iterate(&self, model: &Model<'_, E>) -> Result<Option<Iteration<E>>> {
        self.buffer.apply();
        let data = self.buffer.data();
        if data.is_empty() {
            return Ok(None);
        }
        let space = model.space();
        let mut centroids = model
            .centroids()
            .ok_or(Error::NoCentroids)?
            .as_slice()
            .to_vec();
        let current = Clust::new(centroids.clone());

        let mut progress = self.progress.lock();
        progress.counts.resize(centroids.len(), 0.0);
        let amount = self.conf.batch_size.clamp(1, data.len());
        let batch = sample(&mut progress.rng, data.len(), amount);

        let mut loss = 0.0;
        for index in batch {
            let elemt = &data[index];
            let Some((label, dist)) = current.nearest(elemt, space) else {
                return Err(Error::NoCentroids);
            };
            loss += dist * dist;
            let absorbed = progress.counts[label];
            centroids[label] = space.combine(&centroids[label], absorbed, elemt, 1.0);
            progress.counts[label] = absorbed + 1.0;
        }

        #[allow(clippy::cast_precision_loss)]
        let figures = RuntimeFigures::new()
            .with(LOSS, loss / amount as f64)
            .with(BATCH_SIZE, amount as f64);
        Ok(Some(Iteration::new(Clust::new(centroids), figures)))
    }

    fn push(&self, elemt: E, _running: bool) -> Result<()> {
        self.buffer.push(elemt)
    }

    fn copy(&self, _model: &Model<'_, E>) -> Result<Box<dyn Impl<E>>> {
        let mut progress = self.progress.lock();
        Ok(Box::new(MiniBatch {
            conf: self.conf,
            initializer: self.initializer.clone(),
            buffer: copy_buffer(&self.buffer),
            progress: Mutex::new(Progress {
                rng: fork(&mut progress.rng),
                counts: progress.counts.clone(),
            }),
        }))
    }
}
