#![allow(dead_code)]

use clustream_core::{
    Buffer, Clust, Elemt, Error, Impl, Iteration, Model, Result, RuntimeFigures, Space,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

pub fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Real line.
pub struct Line;

impl Space<f64> for Line {
    fn distance(&self, a: &f64, b: &f64) -> f64 {
        (a - b).abs()
    }

    fn combine(&self, a: &f64, weight_a: f64, b: &f64, weight_b: f64) -> f64 {
        (a * weight_a + b * weight_b) / (weight_a + weight_b)
    }
}

/// What an iteration of [`MeanImpl`] does once `after` iterations ran.
#[derive(Clone, Copy, Debug)]
pub enum Fault {
    None,
    Fail(usize),
    Panic(usize),
}

/// Minimal k-means: initial centroids are the first `k` buffered elements,
/// every iteration is a full mean update.
pub struct MeanImpl {
    pub k: usize,
    pub buffer: Buffer<f64>,
    pub delay: Duration,
    pub fault: Fault,
    pub iterations: AtomicUsize,
}

impl MeanImpl {
    pub fn new(k: usize, data: Vec<f64>) -> Self {
        Self {
            k,
            buffer: Buffer::unbounded(data),
            delay: Duration::ZERO,
            fault: Fault::None,
            iterations: AtomicUsize::new(0),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn with_fault(mut self, fault: Fault) -> Self {
        self.fault = fault;
        self
    }

    pub fn with_queue(self, queue_size: usize) -> Self {
        self.buffer.set_async(queue_size);
        self
    }
}

impl Impl<f64> for MeanImpl {
    fn init(&self, _model: &Model<'_, f64>) -> Result<Clust<f64>> {
        self.buffer.apply();
        let data = self.buffer.data();
        if data.len() < self.k {
            return Err(Error::NotEnoughData {
                required: self.k,
                available: data.len(),
            });
        }
        Ok(data[..self.k].iter().copied().collect())
    }

    fn iterate(&self, model: &Model<'_, f64>) -> Result<Option<Iteration<f64>>> {
        let done = self.iterations.fetch_add(1, Ordering::SeqCst);
        match self.fault {
            Fault::Fail(after) if done >= after => {
                return Err(Error::Computation("diverged".to_string()))
            }
            Fault::Panic(after) if done >= after => panic!("iteration {done} exploded"),
            _ => {}
        }
        if !self.delay.is_zero() {
            std::thread::sleep(self.delay);
        }
        let centroids = model.centroids().ok_or(Error::NoCentroids)?;
        self.buffer.apply();
        let data = self.buffer.data();
        let next = centroids.dba(&data, model.space());
        let loss = next.loss(&data, model.space(), 2.0);
        Ok(Some(Iteration::new(
            next,
            RuntimeFigures::new().with("loss", loss),
        )))
    }

    fn push(&self, elemt: f64, _running: bool) -> Result<()> {
        self.buffer.push(elemt)
    }

    fn copy(&self, _model: &Model<'_, f64>) -> Result<Box<dyn Impl<f64>>> {
        Ok(Box::new(MeanImpl {
            k: self.k,
            buffer: self.buffer.clone(),
            delay: self.delay,
            fault: self.fault,
            iterations: AtomicUsize::new(0),
        }))
    }
}

/// Two well separated groups on the line.
pub fn two_groups() -> Vec<f64> {
    vec![0.0, 10.0, 1.0, 11.0, 2.0, 12.0]
}

pub fn elemts<E: Elemt>(clust: &Clust<E>) -> Vec<E> {
    clust.iter().cloned().collect()
}
