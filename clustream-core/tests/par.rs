mod common;

use approx::assert_relative_eq;
use clustream_core::par::{par, partition};
use clustream_core::Clust;
use common::Line;

fn scattered(n: u32) -> Vec<f64> {
    (0..n)
        .map(|i| f64::from((i * 7919 + 13) % 1000) / 10.0)
        .collect()
}

#[test]
fn test_partitions_cover_input() {
    for size in [0, 1, 7, 100, 1001] {
        for degree in 1..=100 {
            let mut next = 0;
            for rank in 0..degree {
                let range = partition(size, degree, rank);
                assert_eq!(range.start, next);
                next = range.end;
            }
            assert_eq!(next, size);
        }
    }
}

#[test]
fn test_par_results_in_rank_order() {
    let ranks = par(50, 9, |_, rank| rank);
    assert_eq!(ranks, (0..9).collect::<Vec<_>>());

    let sums: usize = par(1000, 13, |range, _| range.sum::<usize>()).into_iter().sum();
    assert_eq!(sums, (0..1000).sum::<usize>());
}

#[test]
fn test_reductions_independent_of_degree() {
    let data = scattered(997);
    let clust = Clust::new(vec![5.0, 30.0, 55.0, 80.0]);

    let (labels, dists) = clust.assign_all(&data, &Line);
    let dba = clust.dba(&data, &Line);
    let loss = clust.loss(&data, &Line, 2.0);

    for degree in 1..=100 {
        let (par_labels, par_dists) = clust.par_assign_all(&data, &Line, degree);
        assert_eq!(par_labels, labels, "labels differ at degree {degree}");
        assert_eq!(par_dists, dists, "distances differ at degree {degree}");

        let par_dba = clust.par_dba(&data, &Line, degree);
        for (a, b) in par_dba.iter().zip(dba.iter()) {
            assert_relative_eq!(*a, *b, epsilon = 1e-6);
        }
        assert_relative_eq!(clust.par_loss(&data, &Line, 2.0, degree), loss, epsilon = 1e-6);
    }
}
