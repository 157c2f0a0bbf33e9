use std::fs::{self, File};
use std::path::Path;
use std::sync::Arc;

use nalgebra::{DMatrix, DVector};
use ndarray::ArrayD;
use serde::{Deserialize, Serialize};

use crate::domain::RankDivider;
use crate::error::{Error, Result};
use crate::readout::ReservoirComputingReadout;
use crate::reservoir::Reservoir;
use crate::transformers::LinearTransformer;
use crate::utils::{flatten_columns_contiguous, square_even_terms};

const RESERVOIR_SUBDIR: &str = "reservoir";
const READOUT_SUBDIR: &str = "readout";
const AUTOENCODER_SUBDIR: &str = "autoencoder";
const RANK_DIVIDER_NAME: &str = "rank_divider.json";
const METADATA_NAME: &str = "metadata.json";
const HYBRID_VARIABLES_NAME: &str = "hybrid_variables.json";

#[derive(Serialize, Deserialize)]
struct Metadata {
    square_half_hidden_state: bool,
    input_variables: Vec<String>,
    output_variables: Vec<String>,
}

#[derive(Serialize, Deserialize)]
struct HybridVariables {
    hybrid_variables: Vec<String>,
}

/// Orchestrates a [`Reservoir`], [`RankDivider`] and
/// [`ReservoirComputingReadout`] into the online predict/increment/
/// synchronize protocol driven one timestep at a time by an external
/// simulation loop.
///
/// The model exclusively owns its reservoir (the only mutable piece);
/// divider, readout and autoencoder are shared immutable resources.
#[derive(Debug, Clone)]
pub struct ReservoirComputingModel {
    input_variables: Vec<String>,
    output_variables: Vec<String>,
    reservoir: Reservoir,
    readout: Arc<ReservoirComputingReadout>,
    rank_divider: Arc<RankDivider>,
    square_half_hidden_state: bool,
    autoencoder: Option<Arc<LinearTransformer>>,
}

impl ReservoirComputingModel {
    /// Assemble a model from its trained parts
    pub fn new(
        input_variables: Vec<String>,
        output_variables: Vec<String>,
        reservoir: Reservoir,
        readout: Arc<ReservoirComputingReadout>,
        rank_divider: Arc<RankDivider>,
        square_half_hidden_state: bool,
        autoencoder: Option<Arc<LinearTransformer>>,
    ) -> Self {
        Self {
            input_variables,
            output_variables,
            reservoir,
            readout,
            rank_divider,
            square_half_hidden_state,
            autoencoder,
        }
    }

    /// Names of the variables driving the reservoir
    pub fn input_variables(&self) -> &[String] {
        &self.input_variables
    }

    /// Names of the predicted variables
    pub fn output_variables(&self) -> &[String] {
        &self.output_variables
    }

    /// The owned reservoir
    pub fn reservoir(&self) -> &Reservoir {
        &self.reservoir
    }

    /// The shared domain divider
    pub fn rank_divider(&self) -> &Arc<RankDivider> {
        &self.rank_divider
    }

    /// The shared trained readout
    pub fn readout(&self) -> &Arc<ReservoirComputingReadout> {
        &self.readout
    }

    /// The optional frozen autoencoder transform
    pub fn autoencoder(&self) -> Option<&Arc<LinearTransformer>> {
        self.autoencoder.as_ref()
    }

    /// Whether even state rows are squared before readout
    pub fn square_half_hidden_state(&self) -> bool {
        self.square_half_hidden_state
    }

    /// Zero the reservoir state, one column per subdomain. Starts every
    /// independent rollout.
    pub fn reset_state(&mut self) -> Result<()> {
        let shape = (
            self.reservoir.hyperparameters().state_size,
            self.rank_divider.n_subdomains(),
        );
        self.reservoir.reset_state(shape)
    }

    /// Advance the reservoir with an input already flattened to subdomain
    /// columns, halo included. Supplying halo-padded fields is the caller's
    /// contract, matching the divider's overlap.
    pub fn increment_state(&mut self, input_with_overlap: &DMatrix<f64>) -> Result<()> {
        self.reservoir.increment_state(input_with_overlap)
    }

    /// Warm the reservoir state up from a known trajectory
    pub fn synchronize(&mut self, time_series: &[DMatrix<f64>]) -> Result<()> {
        self.reservoir.synchronize(time_series)
    }

    /// Readout input assembled from the current reservoir state: even rows
    /// squared when configured, one column per subdomain.
    fn state_readout_input(&self) -> Result<DMatrix<f64>> {
        let state = self.reservoir.state().ok_or(Error::StateNotInitialized)?;
        if self.square_half_hidden_state {
            Ok(square_even_terms(state))
        } else {
            Ok(state.clone())
        }
    }

    /// Predict output features from the current reservoir state, flattened
    /// with subdomain blocks contiguous in divider column order. The caller
    /// reshapes and merges through the divider.
    pub fn predict(&self) -> Result<DVector<f64>> {
        let readout_input = self.state_readout_input()?;
        let prediction = self.readout.predict(&readout_input)?;
        Ok(flatten_columns_contiguous(&prediction))
    }

    /// Write the model as named sub-resources under one directory
    pub fn dump(&self, path: &Path) -> Result<()> {
        fs::create_dir_all(path)?;
        self.reservoir.dump(&path.join(RESERVOIR_SUBDIR))?;
        self.readout.dump(&path.join(READOUT_SUBDIR))?;
        self.rank_divider.dump(&path.join(RANK_DIVIDER_NAME))?;

        let metadata = Metadata {
            square_half_hidden_state: self.square_half_hidden_state,
            input_variables: self.input_variables.clone(),
            output_variables: self.output_variables.clone(),
        };
        let file = File::create(path.join(METADATA_NAME))?;
        serde_json::to_writer_pretty(file, &metadata)?;

        if let Some(autoencoder) = &self.autoencoder {
            autoencoder.dump(&path.join(AUTOENCODER_SUBDIR))?;
        }
        info!("dumped reservoir model to {}", path.display());
        Ok(())
    }

    /// Load a model written by [`ReservoirComputingModel::dump`] and reset
    /// its state, so a freshly loaded model always starts from zero state,
    /// never a stale one.
    pub fn load(path: &Path) -> Result<Self> {
        let reservoir = Reservoir::load(&path.join(RESERVOIR_SUBDIR))?;
        let readout = ReservoirComputingReadout::load(&path.join(READOUT_SUBDIR))?;
        let rank_divider = RankDivider::load(&path.join(RANK_DIVIDER_NAME))?;

        let file = File::open(path.join(METADATA_NAME))?;
        let metadata: Metadata = serde_json::from_reader(file)?;

        // an absent autoencoder directory is the documented signal that no
        // transform is in use
        let autoencoder_path = path.join(AUTOENCODER_SUBDIR);
        let autoencoder = if autoencoder_path.exists() {
            Some(Arc::new(LinearTransformer::load(&autoencoder_path)?))
        } else {
            None
        };

        let mut model = Self::new(
            metadata.input_variables,
            metadata.output_variables,
            reservoir,
            Arc::new(readout),
            Arc::new(rank_divider),
            metadata.square_half_hidden_state,
            autoencoder,
        );
        model.reset_state()?;
        Ok(model)
    }
}

/// Wraps a [`ReservoirComputingModel`] with an extra "hybrid" readout input
/// channel.
///
/// Hybrid variables are flattened through the same divider (without overlap)
/// and concatenated below the reservoir state before readout; they inform
/// the correction but are never remembered by the recurrent state.
#[derive(Debug, Clone)]
pub struct HybridReservoirComputingModel {
    reservoir_model: ReservoirComputingModel,
    hybrid_variables: Vec<String>,
}

impl HybridReservoirComputingModel {
    /// Wrap a pure reservoir model with hybrid readout variables
    pub fn new(reservoir_model: ReservoirComputingModel, hybrid_variables: Vec<String>) -> Self {
        Self {
            reservoir_model,
            hybrid_variables,
        }
    }

    /// Names of the readout-only input variables
    pub fn hybrid_variables(&self) -> &[String] {
        &self.hybrid_variables
    }

    /// The wrapped pure model
    pub fn reservoir_model(&self) -> &ReservoirComputingModel {
        &self.reservoir_model
    }

    /// Names of the variables driving the reservoir
    pub fn input_variables(&self) -> &[String] {
        self.reservoir_model.input_variables()
    }

    /// Names of the predicted variables
    pub fn output_variables(&self) -> &[String] {
        self.reservoir_model.output_variables()
    }

    /// The shared domain divider
    pub fn rank_divider(&self) -> &Arc<RankDivider> {
        self.reservoir_model.rank_divider()
    }

    /// The optional frozen autoencoder transform
    pub fn autoencoder(&self) -> Option<&Arc<LinearTransformer>> {
        self.reservoir_model.autoencoder()
    }

    /// See [`ReservoirComputingModel::reset_state`]
    pub fn reset_state(&mut self) -> Result<()> {
        self.reservoir_model.reset_state()
    }

    /// See [`ReservoirComputingModel::increment_state`]. Only the non-hybrid
    /// input variables ever advance the reservoir.
    pub fn increment_state(&mut self, input_with_overlap: &DMatrix<f64>) -> Result<()> {
        self.reservoir_model.increment_state(input_with_overlap)
    }

    /// See [`ReservoirComputingModel::synchronize`]
    pub fn synchronize(&mut self, time_series: &[DMatrix<f64>]) -> Result<()> {
        self.reservoir_model.synchronize(time_series)
    }

    /// Predict with the hybrid input concatenated below the (optionally
    /// squared) reservoir state per subdomain column. The hybrid array is in
    /// spatial layout without overlap; it goes through the same divider as
    /// everything else so subdomain order lines up.
    pub fn predict(&self, hybrid_input: &ArrayD<f64>) -> Result<DVector<f64>> {
        let hidden = self.reservoir_model.state_readout_input()?;
        let hybrid_columns = self
            .reservoir_model
            .rank_divider
            .flatten_subdomains_to_columns(hybrid_input, false)?;

        let n_cols = hidden.ncols();
        let mut readout_input =
            DMatrix::zeros(hidden.nrows() + hybrid_columns.nrows(), n_cols);
        readout_input
            .view_mut((0, 0), (hidden.nrows(), n_cols))
            .copy_from(&hidden);
        readout_input
            .view_mut((hidden.nrows(), 0), (hybrid_columns.nrows(), n_cols))
            .copy_from(&hybrid_columns);

        let prediction = self.reservoir_model.readout.predict(&readout_input)?;
        Ok(flatten_columns_contiguous(&prediction))
    }

    /// Dump the wrapped model plus the hybrid variable record
    pub fn dump(&self, path: &Path) -> Result<()> {
        self.reservoir_model.dump(path)?;
        let record = HybridVariables {
            hybrid_variables: self.hybrid_variables.clone(),
        };
        let file = File::create(path.join(HYBRID_VARIABLES_NAME))?;
        serde_json::to_writer_pretty(file, &record)?;
        Ok(())
    }

    /// Load a model written by [`HybridReservoirComputingModel::dump`]
    pub fn load(path: &Path) -> Result<Self> {
        let reservoir_model = ReservoirComputingModel::load(path)?;
        let file = File::open(path.join(HYBRID_VARIABLES_NAME))?;
        let record: HybridVariables = serde_json::from_reader(file)?;
        Ok(Self::new(reservoir_model, record.hybrid_variables))
    }
}
