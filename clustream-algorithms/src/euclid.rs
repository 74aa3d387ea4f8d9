//! Euclidean space over dense coordinate vectors.

use clustream_core::Space;

/// Euclidean distance and coordinate-wise weighted mean.
///
/// Points of different dimensions are compared and merged on their common
/// leading coordinates.
#[derive(Debug, Clone, Copy, Default)]
pub struct Euclid;

impl Space<Vec<f64>> for Euclid {
    fn distance(&self, a: &Vec<f64>, b: &Vec<f64>) -> f64 {
        a.iter()
            .zip(b)
            .map(|(x, y)| {
                let diff = x - y;
                diff * diff
            })
            .sum::<f64>()
            .sqrt()
    }

    fn combine(&self, a: &Vec<f64>, weight_a: f64, b: &Vec<f64>, weight_b: f64) -> Vec<f64> {
        let total = weight_a + weight_b;
        if total <= 0.0 {
            return a.clone();
        }
        a.iter()
            .zip(b)
            .map(|(x, y)| (x * weight_a + y * weight_b) / total)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_distance() {
        assert_relative_eq!(Euclid.distance(&vec![0.0, 0.0], &vec![3.0, 4.0]), 5.0);
        assert_relative_eq!(Euclid.distance(&vec![1.5], &vec![1.5]), 0.0);
    }

    #[test]
    fn test_combine_weighted() {
        let merged = Euclid.combine(&vec![0.0, 10.0], 3.0, &vec![4.0, 2.0], 1.0);
        assert_relative_eq!(merged[0], 1.0);
        assert_relative_eq!(merged[1], 8.0);
    }

    #[test]
    fn test_combine_zero_weights() {
        let merged = Euclid.combine(&vec![1.0, 2.0], 0.0, &vec![5.0, 6.0], 0.0);
        assert_eq!(merged, vec![1.0, 2.0]);
    }
}
