use std::fs::{self, File};
use std::path::Path;

use common::{Activation, StateMatrix};
use nalgebra::{DMatrix, Normed};
use nanorand::{Rng, WyRand};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

const HYPERPARAMETERS_NAME: &str = "hyperparameters.json";
const WEIGHTS_NAME: &str = "weights.bin";

/// Hyperparameters fixing the random reservoir weights at construction time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReservoirHyperparameters {
    /// Number of nodes in the reservoir state vector
    pub state_size: usize,
    /// Fraction of zeroed connections in the reservoir adjacency matrix
    pub adjacency_matrix_sparsity: f64,
    /// Largest eigenvalue modulus the adjacency matrix is rescaled to.
    /// Determines how fast the influence of an input dies out in the
    /// reservoir with time; tasks requiring longer memory of the input
    /// need a larger radius.
    pub spectral_radius: f64,
    /// Fraction of zeroed entries in the input coupling matrix
    pub input_coupling_sparsity: f64,
    /// Scales the nonzero input coupling weights
    pub input_coupling_scaling: f64,
    /// Scales the randomly generated node biases
    pub bias_scaling: f64,
    /// Nonlinearity applied to the state update
    pub activation: Activation,
    /// Seed for the weight-generating Rng; same seed, same weights
    pub seed: u64,
}

#[derive(Serialize, Deserialize)]
struct ReservoirWeights {
    input_size: usize,
    w_in: DMatrix<f64>,
    w_res: DMatrix<f64>,
    bias: StateMatrix,
}

/// A fixed, untrained, high-dimensional nonlinear recurrent map.
///
/// The weight matrices are generated once from the seeded Rng and never
/// retrained; the only mutable piece is the per-subdomain state, advanced in
/// place by [`Reservoir::increment_state`].
#[derive(Debug, Clone)]
pub struct Reservoir {
    hyperparameters: ReservoirHyperparameters,
    input_size: usize,
    w_in: DMatrix<f64>,
    w_res: DMatrix<f64>,
    bias: StateMatrix,
    state: Option<DMatrix<f64>>,
}

impl Reservoir {
    /// Generate a reservoir with random weights fixed by the seed in the
    /// hyperparameters. `input_size` is the flattened per-subdomain feature
    /// count (halo included) the reservoir will be driven with.
    pub fn new(hyperparameters: ReservoirHyperparameters, input_size: usize) -> Self {
        let mut rng = WyRand::new_seed(hyperparameters.seed);
        let n = hyperparameters.state_size;

        let mut w_res = DMatrix::from_fn(n, n, |_, _| {
            if rng.generate::<f64>() < hyperparameters.adjacency_matrix_sparsity {
                0.0
            } else {
                rng.generate::<f64>() * 2.0 - 1.0
            }
        });
        let spec_rad = w_res
            .complex_eigenvalues()
            .iter()
            .map(|e| e.norm())
            .fold(0.0, f64::max);
        if spec_rad > 0.0 {
            w_res *= hyperparameters.spectral_radius / spec_rad;
        }

        let w_in = DMatrix::from_fn(n, input_size, |_, _| {
            if rng.generate::<f64>() < hyperparameters.input_coupling_sparsity {
                0.0
            } else {
                (rng.generate::<f64>() * 2.0 - 1.0) * hyperparameters.input_coupling_scaling
            }
        });
        let bias = StateMatrix::from_fn(n, |_, _| {
            (rng.generate::<f64>() * 2.0 - 1.0) * hyperparameters.bias_scaling
        });
        trace!("w_in: {}\nw_res: {}", w_in, w_res);

        Self {
            hyperparameters,
            input_size,
            w_in,
            w_res,
            bias,
            state: None,
        }
    }

    /// The hyperparameters the weights were generated from
    #[inline(always)]
    pub fn hyperparameters(&self) -> &ReservoirHyperparameters {
        &self.hyperparameters
    }

    /// Flattened per-subdomain input feature count
    #[inline(always)]
    pub fn input_size(&self) -> usize {
        self.input_size
    }

    /// Current state, one column per subdomain; `None` before `reset_state`
    #[inline(always)]
    pub fn state(&self) -> Option<&DMatrix<f64>> {
        self.state.as_ref()
    }

    /// Allocate a zeroed state of `(state_size, n_subdomains)`. Must be
    /// called before any increment or prediction; calling it again discards
    /// the previous state, which is how every independent rollout starts.
    pub fn reset_state(&mut self, shape: (usize, usize)) -> Result<()> {
        if shape.0 != self.hyperparameters.state_size {
            return Err(Error::InvalidConfig(format!(
                "state rows {} do not match configured state size {}",
                shape.0, self.hyperparameters.state_size
            )));
        }
        self.state = Some(DMatrix::zeros(shape.0, shape.1));
        Ok(())
    }

    /// Advance the state one step:
    /// `state = activation(w_res * state + w_in * input + bias)`,
    /// columnwise over subdomains, mutating the state in place.
    pub fn increment_state(&mut self, input: &DMatrix<f64>) -> Result<()> {
        let state = self.state.as_ref().ok_or(Error::StateNotInitialized)?;
        if input.nrows() != self.input_size {
            return Err(Error::ShapeMismatch {
                expected: format!("{} input features", self.input_size),
                actual: format!("{} input features", input.nrows()),
            });
        }
        if input.ncols() != state.ncols() {
            return Err(Error::ShapeMismatch {
                expected: format!("{} subdomain columns", state.ncols()),
                actual: format!("{} subdomain columns", input.ncols()),
            });
        }

        let mut new_state = &self.w_res * state + &self.w_in * input;
        for mut col in new_state.column_iter_mut() {
            col += &self.bias;
        }
        self.hyperparameters
            .activation
            .activate(new_state.as_mut_slice());

        self.state = Some(new_state);
        Ok(())
    }

    /// Run the reservoir forward through a known trajectory, keeping only
    /// the final state. Used to erase dependence on the arbitrary zero
    /// initial state before any prediction is trusted.
    pub fn synchronize(&mut self, series: &[DMatrix<f64>]) -> Result<()> {
        for input in series {
            self.increment_state(input)?;
        }
        Ok(())
    }

    /// Persist hyperparameters and the fixed weight matrices.
    ///
    /// The transient state is deliberately excluded; a loaded reservoir is
    /// uninitialized until the owning model calls `reset_state`.
    pub fn dump(&self, path: &Path) -> Result<()> {
        fs::create_dir_all(path)?;
        let file = File::create(path.join(HYPERPARAMETERS_NAME))?;
        serde_json::to_writer_pretty(file, &self.hyperparameters)?;

        let weights = ReservoirWeights {
            input_size: self.input_size,
            w_in: self.w_in.clone(),
            w_res: self.w_res.clone(),
            bias: self.bias.clone(),
        };
        let file = File::create(path.join(WEIGHTS_NAME))?;
        bincode::serialize_into(file, &weights)?;
        Ok(())
    }

    /// Load a reservoir written by [`Reservoir::dump`]. Weights round-trip
    /// bit-exactly since they are never retrained.
    pub fn load(path: &Path) -> Result<Self> {
        let file = File::open(path.join(HYPERPARAMETERS_NAME))?;
        let hyperparameters: ReservoirHyperparameters = serde_json::from_reader(file)?;

        let file = File::open(path.join(WEIGHTS_NAME))?;
        let weights: ReservoirWeights = bincode::deserialize_from(file)?;
        if weights.w_res.nrows() != hyperparameters.state_size {
            return Err(Error::InvalidConfig(format!(
                "persisted adjacency matrix has {} rows but hyperparameters specify state size {}",
                weights.w_res.nrows(),
                hyperparameters.state_size
            )));
        }

        Ok(Self {
            hyperparameters,
            input_size: weights.input_size,
            w_in: weights.w_in,
            w_res: weights.w_res,
            bias: weights.bias,
            state: None,
        })
    }
}
