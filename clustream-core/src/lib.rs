//! clustream-core: Engine for online, iterative and interruptible algorithms.
//!
//! This crate provides the controller that drives a pluggable computation
//! in a background thread, the ingestion buffer feeding it, the finishing
//! predicates and timeout deciding when it stops, and the parallel
//! map-reduce primitive used to scale per-element work.
//!

pub mod buffer;
pub mod clust;
pub mod conf;
pub mod controller;
pub mod error;
pub mod figures;
pub mod finishing;
pub mod model;
pub mod par;
pub mod space;
pub mod status;
pub mod timeout;

pub use buffer::Buffer;
pub use clust::Clust;
pub use conf::{Conf, Notifier};
pub use controller::{Algo, Prediction};
pub use error::{Error, Result};
pub use figures::RuntimeFigures;
pub use finishing::{And, Finishing, IterationsFinishing, Or};
pub use model::{Impl, Iteration, Model};
pub use space::{Elemt, Space};
pub use status::{State, Status};
pub use timeout::{wait_timeout, InterruptionTimeout};
