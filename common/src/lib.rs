//! This crate provides common functionality shared by the reservoir crates

#![deny(unused_imports, unused_crate_dependencies)]
#![warn(missing_docs)]

mod activation;

pub use activation::Activation;

use nalgebra::{Const, Dyn, Matrix, VecStorage};

/// A dynamically sized column vector, used for reservoir biases and
/// single-subdomain states
pub type StateMatrix = Matrix<f64, Dyn, Const<1>, VecStorage<f64, Dyn, Const<1>>>;
