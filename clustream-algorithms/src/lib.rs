//! clustream-algorithms: Spaces, initializers and refinement variants.
//!
//! This crate provides the collaborators plugged into a
//! [`clustream_core::Algo`]:
//! - **Euclid** - Euclidean space over coordinate vectors
//! - **Initializer** - given centroids or seeded random sampling
//! - **Lloyd** - full-buffer weighted-mean refinement
//! - **MiniBatch** - sampled incremental refinement
//!
#![warn(missing_docs)]

mod euclid;
mod initializer;
mod lloyd;
mod minibatch;
mod processing;

pub use euclid::Euclid;
pub use initializer::Initializer;
pub use lloyd::{Lloyd, LloydConf, LOSS};
pub use minibatch::{MiniBatch, MiniBatchConf, BATCH_SIZE};
pub use processing::{build_impl, Algorithm, AlgorithmParams};
