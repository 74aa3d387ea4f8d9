//! Initial centroid selection.

use clustream_core::{Clust, Elemt, Error, Result};
use log::debug;
use rand::seq::index::sample;
use rand::RngCore;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Strategy producing the first centroids of a run.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Initializer<E> {
    /// Fixed centroids supplied by the caller.
    Given(Clust<E>),
    /// `k` distinct elements drawn uniformly from the data.
    RandomSample,
}

impl<E: Elemt> Initializer<E> {
    /// Computes `k` initial centroids from `data`.
    ///
    /// `Given` ignores `data` and returns its centroids whatever `k`.
    ///
    /// # Errors
    /// `NoCentroids` for an empty given set, `NotEnoughData` when sampling
    /// from fewer than `k` elements.
    pub fn init(&self, k: usize, data: &[E], rng: &mut dyn RngCore) -> Result<Clust<E>> {
        match self {
            Initializer::Given(centroids) => {
                if centroids.is_empty() {
                    return Err(Error::NoCentroids);
                }
                Ok(centroids.clone())
            }
            Initializer::RandomSample => {
                if k == 0 {
                    return Err(Error::ConfigError(
                        "number of centroids must be positive".to_string(),
                    ));
                }
                if data.len() < k {
                    return Err(Error::NotEnoughData {
                        required: k,
                        available: data.len(),
                    });
                }
                debug!("sampling {k} centroids from {} elements", data.len());
                Ok(sample(rng, data.len(), k)
                    .into_iter()
                    .map(|index| data[index].clone())
                    .collect())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn test_given() {
        let mut rng = ChaCha8Rng::seed_from_u64(0);
        let given = Initializer::Given(Clust::new(vec![1.0, 2.0]));
        assert_eq!(given.init(5, &[], &mut rng), Ok(Clust::new(vec![1.0, 2.0])));

        let empty = Initializer::<f64>::Given(Clust::default());
        assert_eq!(empty.init(1, &[1.0], &mut rng), Err(Error::NoCentroids));
    }

    #[test]
    fn test_random_sample_is_distinct_and_seeded() {
        let data: Vec<u32> = (0..50).collect();
        let draw = |seed| {
            let mut rng = ChaCha8Rng::seed_from_u64(seed);
            Initializer::RandomSample.init(10, &data, &mut rng).unwrap()
        };

        let first = draw(7);
        assert_eq!(first, draw(7));

        let mut values = first.into_inner();
        values.sort_unstable();
        values.dedup();
        assert_eq!(values.len(), 10);
    }

    #[test]
    fn test_random_sample_not_enough_data() {
        let mut rng = ChaCha8Rng::seed_from_u64(0);
        assert_eq!(
            Initializer::RandomSample.init(3, &[1.0, 2.0], &mut rng),
            Err(Error::NotEnoughData {
                required: 3,
                available: 2
            })
        );
        assert!(matches!(
            Initializer::RandomSample.init(0, &[1.0], &mut rng),
            Err(Error::ConfigError(_))
        ));
    }
}
