//! Variant registry: build a computation by algorithm name.

use crate::{Initializer, Lloyd, LloydConf, MiniBatch, MiniBatchConf};
use clustream_core::{Buffer, Elemt, Error, Impl, Result};
use std::fmt;
use std::str::FromStr;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Refinement variants known to [`build_impl`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Algorithm {
    /// [`Lloyd`] full-buffer refinement.
    Lloyd,
    /// [`MiniBatch`] sampled refinement.
    MiniBatch,
}

impl Algorithm {
    /// Every known variant.
    pub const ALL: [Algorithm; 2] = [Algorithm::Lloyd, Algorithm::MiniBatch];

    /// Registry name of the variant.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Algorithm::Lloyd => "lloyd",
            Algorithm::MiniBatch => "minibatch",
        }
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Algorithm {
    type Err = Error;

    fn from_str(name: &str) -> Result<Self> {
        match name.to_ascii_lowercase().as_str() {
            "lloyd" | "kmeans" => Ok(Algorithm::Lloyd),
            "minibatch" | "mini-batch" | "mbkmeans" => Ok(Algorithm::MiniBatch),
            _ => Err(Error::ConfigError(format!("unknown algorithm: {name}"))),
        }
    }
}

/// Parameters shared by the registry variants.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct AlgorithmParams {
    /// Number of centroids.
    pub k: usize,
    /// Parallel degree (Lloyd).
    pub degree: usize,
    /// Elements drawn per iteration (mini-batch).
    pub batch_size: usize,
    /// Random generator seed.
    pub seed: u64,
    /// Circular buffer capacity, unbounded if `None`.
    pub capacity: Option<usize>,
    /// Asynchronous queue size, synchronous buffer if `None`.
    pub queue_size: Option<usize>,
}

impl Default for AlgorithmParams {
    fn default() -> Self {
        Self {
            k: 3,
            degree: std::thread::available_parallelism().map_or(1, usize::from),
            batch_size: 100,
            seed: 0,
            capacity: None,
            queue_size: None,
        }
    }
}

impl AlgorithmParams {
    /// Creates the buffer described by `capacity` and `queue_size`, seeded
    /// with `data`.
    ///
    /// # Errors
    /// Returns `ConfigError` for a zero capacity.
    pub fn buffer<E: Elemt>(&self, data: Vec<E>) -> Result<Buffer<E>> {
        let buffer = match self.capacity {
            Some(capacity) => Buffer::bounded(data, capacity)?,
            None => Buffer::unbounded(data),
        };
        if let Some(queue_size) = self.queue_size {
            buffer.set_async(queue_size);
        }
        Ok(buffer)
    }
}

/// Builds the computation of `algorithm` over `data`.
///
/// # Errors
/// Returns `ConfigError` for invalid parameters.
pub fn build_impl<E: Elemt>(
    algorithm: Algorithm,
    params: &AlgorithmParams,
    initializer: Initializer<E>,
    data: Vec<E>,
) -> Result<Box<dyn Impl<E>>> {
    if params.k == 0 && !matches!(initializer, Initializer::Given(_)) {
        return Err(Error::ConfigError(
            "number of centroids must be positive".to_string(),
        ));
    }
    let buffer = params.buffer(data)?;
    Ok(match algorithm {
        Algorithm::Lloyd => Box::new(Lloyd::new(
            LloydConf {
                k: params.k,
                degree: params.degree,
            },
            initializer,
            buffer,
            params.seed,
        )),
        Algorithm::MiniBatch => Box::new(MiniBatch::new(
            MiniBatchConf {
                k: params.k,
                batch_size: params.batch_size,
            },
            initializer,
            buffer,
            params.seed,
        )),
    })
}
