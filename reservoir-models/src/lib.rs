//! Reservoir-computing surrogate models for gridded atmospheric fields.
//!
//! A [`Reservoir`] advances a fixed random nonlinear recurrent state one
//! timestep at a time; a [`RankDivider`] tiles the rank's spatial grid into
//! subdomains so one reservoir applies identically across the domain; a
//! trained [`ReservoirComputingReadout`] maps state back to physical
//! tendencies. [`ReservoirComputingModel`] wires these into the online
//! protocol a prognostic run loop drives: `reset_state`, zero or more
//! `synchronize` warmups, then `increment_state`/`predict` once per
//! timestep. The hybrid variant feeds extra covariates to the readout
//! without letting them touch the recurrent state.

#![deny(unused_imports, unused_crate_dependencies)]
#![warn(missing_docs)]

#[macro_use]
extern crate log;

mod adapters;
mod domain;
mod error;
pub mod io;
mod model;
mod readout;
mod reservoir;
mod transformers;
mod utils;

pub use adapters::{
    Dataset, DatasetAdapter, HybridReservoirDatasetAdapter, LabeledArray,
    ReservoirDatasetAdapter, VariableSpec,
};
pub use domain::RankDivider;
pub use error::{Error, Result};
pub use model::{HybridReservoirComputingModel, ReservoirComputingModel};
pub use readout::ReservoirComputingReadout;
pub use reservoir::{Reservoir, ReservoirHyperparameters};
pub use transformers::{LinearTransformer, Transformer};
pub use utils::{flatten_columns_contiguous, square_even_terms};
