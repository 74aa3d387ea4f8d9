use approx::assert_relative_eq;
use clustream_algorithms::{Euclid, Initializer, Lloyd, LloydConf};
use clustream_core::figures::ITERATIONS;
use clustream_core::{Algo, Buffer, Clust, Conf, Error, State};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

fn points() -> Vec<Vec<f64>> {
    vec![
        vec![0.0, 0.0],
        vec![0.0, 1.0],
        vec![1.0, 0.0],
        vec![10.0, 10.0],
        vec![10.0, 11.0],
        vec![11.0, 10.0],
        vec![20.0, 0.0],
        vec![21.0, 1.0],
    ]
}

fn given() -> Clust<Vec<f64>> {
    Clust::new(vec![vec![1.0, 1.0], vec![9.0, 9.0], vec![19.0, 1.0]])
}

#[test]
fn test_batch_matches_sequential_reference() {
    let _ = env_logger::builder().is_test(true).try_init();

    let lloyd = Lloyd::new(
        LloydConf { k: 3, degree: 4 },
        Initializer::Given(given()),
        Buffer::unbounded(Vec::new()),
        42,
    );
    let algo = Algo::new(Conf::new().with_iter(20), Arc::new(Euclid), Box::new(lloyd)).unwrap();
    for point in points() {
        algo.push(point).unwrap();
    }

    algo.batch(None, Duration::ZERO).unwrap();
    assert_eq!(algo.status().state, State::Finished);
    assert_eq!(algo.status().error, None);
    assert_eq!(algo.runtime_figures().get(ITERATIONS), Some(20.0));

    let data = points();
    let mut reference = given();
    for _ in 0..20 {
        reference = reference.dba(&data, &Euclid);
    }
    let centroids = algo.centroids().unwrap();
    let (labels, _) = centroids.assign_all(&data, &Euclid);
    let (expected, _) = reference.assign_all(&data, &Euclid);
    assert_eq!(labels, expected);
    assert_eq!(labels, vec![0, 0, 0, 1, 1, 1, 2, 2]);

    for (centroid, reference) in centroids.iter().zip(reference.iter()) {
        for (a, b) in centroid.iter().zip(reference) {
            assert_relative_eq!(*a, *b, epsilon = 1e-9);
        }
    }
}

#[test]
fn test_async_buffer_feeds_run() {
    let buffer = Buffer::unbounded(Vec::new());
    buffer.set_async(2);
    let lloyd = Lloyd::new(
        LloydConf { k: 3, degree: 2 },
        Initializer::Given(given()),
        buffer,
        0,
    );
    let algo = Algo::new(Conf::new().with_iter(5), Arc::new(Euclid), Box::new(lloyd)).unwrap();

    // more elements than the queue holds
    for point in points() {
        algo.push(point).unwrap();
    }
    algo.batch(None, Duration::ZERO).unwrap();

    let prediction = algo.predict(&vec![20.5, 0.5]).unwrap();
    assert_eq!(prediction.label, 2);
    assert_relative_eq!(prediction.distance, 0.0, epsilon = 1e-9);
}

#[test]
fn test_full_queue_push_returns_after_run() {
    let buffer = Buffer::unbounded(points());
    buffer.set_async(1);
    let lloyd = Lloyd::new(
        LloydConf { k: 3, degree: 1 },
        Initializer::Given(given()),
        buffer,
        0,
    );
    let conf = Conf::new().with_iter(1).with_iter_freq(1.0);
    let algo = Arc::new(Algo::new(conf, Arc::new(Euclid), Box::new(lloyd)).unwrap());
    algo.play().unwrap();
    algo.push(vec![0.5, 0.5]).unwrap();

    // the queue is full and the run stops after one iteration
    let producer = {
        let algo = Arc::clone(&algo);
        thread::spawn(move || -> Result<(), Error> {
            algo.push(vec![10.5, 10.5])?;
            algo.push(vec![20.5, 0.5])
        })
    };
    let deadline = Instant::now() + Duration::from_secs(5);
    while !producer.is_finished() && Instant::now() < deadline {
        thread::sleep(Duration::from_millis(10));
    }
    assert!(producer.is_finished(), "push blocked on a full queue");
    producer.join().unwrap().unwrap();

    algo.wait(None, Duration::from_secs(10)).unwrap();
    assert_eq!(algo.runtime_figures().get(ITERATIONS), Some(1.0));
}

#[test]
fn test_auto_play_sees_queued_elements() {
    let _ = env_logger::builder().is_test(true).try_init();

    let buffer = Buffer::unbounded(Vec::new());
    buffer.set_async(2);
    let lloyd = Lloyd::new(
        LloydConf { k: 3, degree: 2 },
        Initializer::Given(given()),
        buffer,
        0,
    );
    let conf = Conf::new().with_iter(1).with_data_per_iter(points().len());
    let algo = Algo::new(conf, Arc::new(Euclid), Box::new(lloyd)).unwrap();
    algo.init().unwrap();

    for point in points() {
        algo.push(point).unwrap();
    }
    let deadline = Instant::now() + Duration::from_secs(10);
    while algo.runtime_figures().value(ITERATIONS) < 1.0 && Instant::now() < deadline {
        thread::sleep(Duration::from_millis(5));
    }

    // one refinement over all eight points, the queued tail included
    let data = points();
    let expected = given().dba(&data, &Euclid);
    let centroids = algo.centroids().unwrap();
    for (centroid, reference) in centroids.iter().zip(expected.iter()) {
        for (a, b) in centroid.iter().zip(reference) {
            assert_relative_eq!(*a, *b, epsilon = 1e-9);
        }
    }
    assert_relative_eq!(centroids[2][0], 20.5, epsilon = 1e-9);
}
