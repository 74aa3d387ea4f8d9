//! Parallel map-reduce over index ranges.
//!
//! `[0, size)` is split into `degree` contiguous partitions whose sizes
//! differ by at most one, the remainder going to the trailing partitions.
//! Each partition is processed by its own worker and results come back
//! ordered by rank, so any reduction folded in rank order sees elements in
//! input order whatever the degree.

use rayon::prelude::*;
use std::ops::Range;

/// Index range of partition `rank` among `degree` partitions of `[0, size)`.
///
/// A `degree` of zero is treated as one.
#[must_use]
pub fn partition(size: usize, degree: usize, rank: usize) -> Range<usize> {
    let degree = degree.max(1);
    let base = size / degree;
    let lead = degree - size % degree;
    let start = rank * base + rank.saturating_sub(lead);
    let len = base + usize::from(rank >= lead);
    start..start + len
}

/// Runs `process(range, rank)` on every partition and blocks until all
/// complete. Results are returned in rank order.
pub fn par<R, F>(size: usize, degree: usize, process: F) -> Vec<R>
where
    R: Send,
    F: Fn(Range<usize>, usize) -> R + Send + Sync,
{
    let degree = degree.max(1);
    if degree == 1 {
        return vec![process(0..size, 0)];
    }
    (0..degree)
        .into_par_iter()
        .map(|rank| process(partition(size, degree, rank), rank))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partition_sizes() {
        let ranges: Vec<_> = (0..3).map(|rank| partition(10, 3, rank)).collect();
        assert_eq!(ranges, vec![0..3, 3..6, 6..10]);

        let ranges: Vec<_> = (0..3).map(|rank| partition(11, 3, rank)).collect();
        assert_eq!(ranges, vec![0..3, 3..7, 7..11]);
    }

    #[test]
    fn test_partition_covers_range() {
        for size in 0..40 {
            for degree in 1..12 {
                let mut next = 0;
                let mut lens = Vec::new();
                for rank in 0..degree {
                    let range = partition(size, degree, rank);
                    assert_eq!(range.start, next);
                    next = range.end;
                    lens.push(range.len());
                }
                assert_eq!(next, size);
                let min = lens.iter().min().copied().unwrap_or(0);
                let max = lens.iter().max().copied().unwrap_or(0);
                assert!(max - min <= 1, "size {size} degree {degree}: {lens:?}");
            }
        }
    }

    #[test]
    fn test_zero_degree() {
        assert_eq!(partition(5, 0, 0), 0..5);
        let sums = par(5, 0, |range, _| range.sum::<usize>());
        assert_eq!(sums, vec![10]);
    }

    #[test]
    fn test_par_results_in_rank_order() {
        let data: Vec<u64> = (0..1000).collect();
        let chunks = par(data.len(), 7, |range, rank| (rank, data[range].to_vec()));

        for (expected, (rank, _)) in chunks.iter().enumerate() {
            assert_eq!(*rank, expected);
        }
        let flat: Vec<u64> = chunks.into_iter().flat_map(|(_, chunk)| chunk).collect();
        assert_eq!(flat, data);
    }

    #[test]
    fn test_more_workers_than_elements() {
        let counts = par(3, 8, |range, _| range.len());
        assert_eq!(counts.len(), 8);
        assert_eq!(counts.iter().sum::<usize>(), 3);
    }
}
