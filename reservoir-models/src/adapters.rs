use std::collections::BTreeMap;
use std::fs::{self, File};
use std::path::Path;

use nalgebra::DMatrix;
use ndarray::{concatenate, ArrayD, Axis, IxDyn, Slice};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::model::{HybridReservoirComputingModel, ReservoirComputingModel};
use crate::transformers::{LinearTransformer, Transformer};

const VARIABLES_NAME: &str = "variables.json";

/// One named variable at the dataset boundary, with its per-grid-cell
/// feature count (1 for purely two-dimensional fields).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VariableSpec {
    /// Variable name as it appears in datasets
    pub name: String,
    /// Features per grid cell, e.g. vertical levels
    pub n_features: usize,
}

impl VariableSpec {
    /// Convenience constructor
    pub fn new(name: &str, n_features: usize) -> Self {
        Self {
            name: name.to_string(),
            n_features,
        }
    }
}

/// A plain numeric array with named dimensions, the crate's stand-in for a
/// labeled dataset variable.
#[derive(Debug, Clone, PartialEq)]
pub struct LabeledArray {
    /// Dimension names, one per axis
    pub dims: Vec<String>,
    /// The data, axes matching `dims`
    pub data: ArrayD<f64>,
}

/// A labeled dataset: variable name to labeled array
pub type Dataset = BTreeMap<String, LabeledArray>;

#[derive(Serialize, Deserialize)]
struct AdapterVariables {
    input_variables: Vec<VariableSpec>,
    output_variables: Vec<VariableSpec>,
    #[serde(skip_serializing_if = "Option::is_none")]
    hybrid_variables: Option<Vec<VariableSpec>>,
}

/// Converts between labeled datasets and the plain `(feature, x, y)` arrays
/// the numerical core operates on.
///
/// The variable list, expected feature counts and the label-to-axis mapping
/// are fixed at construction, so nothing label-shaped leaks into the core.
#[derive(Debug, Clone)]
pub struct DatasetAdapter {
    input_variables: Vec<VariableSpec>,
    output_variables: Vec<VariableSpec>,
    rank_dims: [String; 2],
}

impl DatasetAdapter {
    /// Configure an adapter for the given variable lists and spatial
    /// dimension names (in the divider's tiling order)
    pub fn new(
        input_variables: Vec<VariableSpec>,
        output_variables: Vec<VariableSpec>,
        rank_dims: [String; 2],
    ) -> Self {
        Self {
            input_variables,
            output_variables,
            rank_dims,
        }
    }

    /// The configured input variables
    pub fn input_variables(&self) -> &[VariableSpec] {
        &self.input_variables
    }

    /// The configured output variables
    pub fn output_variables(&self) -> &[VariableSpec] {
        &self.output_variables
    }

    /// Bring one variable into `(feature, x, y)` layout with the spatial
    /// axes in `rank_dims` order, inserting a singleton feature axis for
    /// two-dimensional fields.
    fn feature_leading(&self, variable: &LabeledArray, spec: &VariableSpec) -> Result<ArrayD<f64>> {
        let dims = &variable.dims;
        let arr = match dims.len() {
            2 => {
                let transposed = if dims[0] == self.rank_dims[0] && dims[1] == self.rank_dims[1] {
                    variable.data.clone()
                } else if dims[0] == self.rank_dims[1] && dims[1] == self.rank_dims[0] {
                    variable.data.clone().permuted_axes(IxDyn(&[1, 0]))
                } else {
                    return Err(Error::InvalidConfig(format!(
                        "variable '{}' has dims {:?}, expected a permutation of {:?}",
                        spec.name, dims, self.rank_dims
                    )));
                };
                transposed.insert_axis(Axis(0))
            }
            3 => {
                let x_axis = dims.iter().position(|d| *d == self.rank_dims[0]);
                let y_axis = dims.iter().position(|d| *d == self.rank_dims[1]);
                let (x_axis, y_axis) = match (x_axis, y_axis) {
                    (Some(x), Some(y)) => (x, y),
                    _ => {
                        return Err(Error::InvalidConfig(format!(
                            "variable '{}' has dims {:?}, expected both of {:?}",
                            spec.name, dims, self.rank_dims
                        )))
                    }
                };
                let feature_axis = 3 - x_axis - y_axis;
                variable
                    .data
                    .clone()
                    .permuted_axes(IxDyn(&[feature_axis, x_axis, y_axis]))
            }
            n => {
                return Err(Error::ShapeMismatch {
                    expected: format!("2 or 3 dimensions for variable '{}'", spec.name),
                    actual: format!("{} dimensions", n),
                })
            }
        };
        if arr.shape()[0] != spec.n_features {
            return Err(Error::ShapeMismatch {
                expected: format!("{} features for variable '{}'", spec.n_features, spec.name),
                actual: format!("{} features", arr.shape()[0]),
            });
        }
        Ok(arr)
    }

    /// Stack the listed variables into one `(feature, x, y)` array, features
    /// concatenated in list order
    pub fn dataset_to_array(
        &self,
        dataset: &Dataset,
        variables: &[VariableSpec],
    ) -> Result<ArrayD<f64>> {
        let mut parts = Vec::with_capacity(variables.len());
        for spec in variables {
            let variable = dataset
                .get(&spec.name)
                .ok_or_else(|| Error::MissingVariable(spec.name.clone()))?;
            parts.push(self.feature_leading(variable, spec)?);
        }
        let views: Vec<_> = parts.iter().map(|p| p.view()).collect();
        concatenate(Axis(0), &views).map_err(|e| Error::ShapeMismatch {
            expected: "input variables with matching spatial extents".to_string(),
            actual: e.to_string(),
        })
    }

    /// Split a merged `(feature, x, y)` prediction back into labeled output
    /// variables, reattaching the dimension names the driver expects:
    /// `(x, y)` for single-feature fields, `(x, y, z)` otherwise.
    pub fn prediction_to_dataset(&self, merged: &ArrayD<f64>) -> Result<Dataset> {
        let n_features: usize = self.output_variables.iter().map(|v| v.n_features).sum();
        if merged.ndim() != 3 || merged.shape()[0] != n_features {
            return Err(Error::ShapeMismatch {
                expected: format!("(feature, x, y) array with {} features", n_features),
                actual: format!("shape {:?}", merged.shape()),
            });
        }

        let mut dataset = Dataset::new();
        let mut offset = 0;
        for spec in &self.output_variables {
            let block = merged
                .slice_axis(Axis(0), Slice::from(offset..offset + spec.n_features))
                .to_owned();
            let labeled = if spec.n_features == 1 {
                LabeledArray {
                    dims: self.rank_dims.to_vec(),
                    data: block.index_axis(Axis(0), 0).to_owned().into_dyn(),
                }
            } else {
                let mut dims = self.rank_dims.to_vec();
                dims.push("z".to_string());
                LabeledArray {
                    dims,
                    data: block.permuted_axes(IxDyn(&[1, 2, 0])),
                }
            };
            dataset.insert(spec.name.clone(), labeled);
            offset += spec.n_features;
        }
        Ok(dataset)
    }
}

/// Encode each grid cell's feature vector through the transformer, keeping
/// the spatial layout
fn encode_spatial(transformer: &LinearTransformer, arr: &ArrayD<f64>) -> Result<ArrayD<f64>> {
    let shape = arr.shape();
    let (n_features, nx, ny) = (shape[0], shape[1], shape[2]);
    let mut samples = DMatrix::zeros(nx * ny, n_features);
    for xi in 0..nx {
        for yi in 0..ny {
            for fi in 0..n_features {
                samples[(xi * ny + yi, fi)] = arr[[fi, xi, yi]];
            }
        }
    }
    let latent = transformer.encode(&samples)?;
    let mut encoded = ArrayD::zeros(IxDyn(&[latent.ncols(), nx, ny]));
    for xi in 0..nx {
        for yi in 0..ny {
            for li in 0..latent.ncols() {
                encoded[[li, xi, yi]] = latent[(xi * ny + yi, li)];
            }
        }
    }
    Ok(encoded)
}

/// Decode a merged `(latent, x, y)` prediction into labeled per-variable
/// arrays
fn decode_spatial(
    transformer: &LinearTransformer,
    merged: &ArrayD<f64>,
    output_variables: &[VariableSpec],
    rank_dims: &[String; 2],
) -> Result<Dataset> {
    let shape = merged.shape();
    let (n_latent, nx, ny) = (shape[0], shape[1], shape[2]);
    let mut samples = DMatrix::zeros(nx * ny, n_latent);
    for xi in 0..nx {
        for yi in 0..ny {
            for li in 0..n_latent {
                samples[(xi * ny + yi, li)] = merged[[li, xi, yi]];
            }
        }
    }
    let decoded = transformer.decode(&samples)?;
    if decoded.len() != output_variables.len() {
        return Err(Error::ShapeMismatch {
            expected: format!("{} decoded variables", output_variables.len()),
            actual: format!("{} decoded variables", decoded.len()),
        });
    }

    let mut dataset = Dataset::new();
    for (spec, block) in output_variables.iter().zip(decoded) {
        if block.ncols() != spec.n_features {
            return Err(Error::ShapeMismatch {
                expected: format!("{} features for variable '{}'", spec.n_features, spec.name),
                actual: format!("{} features", block.ncols()),
            });
        }
        let labeled = if spec.n_features == 1 {
            let mut data = ArrayD::zeros(IxDyn(&[nx, ny]));
            for xi in 0..nx {
                for yi in 0..ny {
                    data[[xi, yi]] = block[(xi * ny + yi, 0)];
                }
            }
            LabeledArray {
                dims: rank_dims.to_vec(),
                data,
            }
        } else {
            let mut dims = rank_dims.to_vec();
            dims.push("z".to_string());
            let mut data = ArrayD::zeros(IxDyn(&[nx, ny, spec.n_features]));
            for xi in 0..nx {
                for yi in 0..ny {
                    for fi in 0..spec.n_features {
                        data[[xi, yi, fi]] = block[(xi * ny + yi, fi)];
                    }
                }
            }
            LabeledArray { dims, data }
        };
        dataset.insert(spec.name.clone(), labeled);
    }
    Ok(dataset)
}

fn check_variable_names(specs: &[VariableSpec], names: &[String], role: &str) -> Result<()> {
    let spec_names: Vec<&str> = specs.iter().map(|s| s.name.as_str()).collect();
    let model_names: Vec<&str> = names.iter().map(|s| s.as_str()).collect();
    if spec_names != model_names {
        return Err(Error::InvalidConfig(format!(
            "{} variable specs {:?} do not match model variables {:?}",
            role, spec_names, model_names
        )));
    }
    Ok(())
}

/// Wraps a [`ReservoirComputingModel`] to take in and return labeled
/// datasets, the interface the prognostic run driver speaks.
#[derive(Debug, Clone)]
pub struct ReservoirDatasetAdapter {
    model: ReservoirComputingModel,
    adapter: DatasetAdapter,
}

impl ReservoirDatasetAdapter {
    /// Subdirectory holding the wrapped model's sub-resources
    pub const MODEL_DIR: &'static str = "reservoir_model";

    /// Wrap a model; variable specs must name the model's variables in
    /// order, adding the per-variable feature counts
    pub fn new(
        model: ReservoirComputingModel,
        input_variables: Vec<VariableSpec>,
        output_variables: Vec<VariableSpec>,
    ) -> Result<Self> {
        check_variable_names(&input_variables, model.input_variables(), "input")?;
        check_variable_names(&output_variables, model.output_variables(), "output")?;
        let rank_dims = model.rank_divider().rank_dims().clone();
        Ok(Self {
            model,
            adapter: DatasetAdapter::new(input_variables, output_variables, rank_dims),
        })
    }

    /// Number of halo cells expected around increment inputs
    pub fn input_overlap(&self) -> usize {
        self.model.rank_divider().overlap()
    }

    /// Whether the wrapped model consumes hybrid readout inputs
    pub fn is_hybrid(&self) -> bool {
        false
    }

    /// The wrapped model
    pub fn model(&self) -> &ReservoirComputingModel {
        &self.model
    }

    /// See [`ReservoirComputingModel::reset_state`]
    pub fn reset_state(&mut self) -> Result<()> {
        self.model.reset_state()
    }

    /// Advance the reservoir from a halo-padded labeled dataset
    pub fn increment_state(&mut self, inputs: &Dataset) -> Result<()> {
        let arr = self
            .adapter
            .dataset_to_array(inputs, &self.adapter.input_variables)?;
        let arr = match self.model.autoencoder() {
            Some(transformer) => encode_spatial(transformer, &arr)?,
            None => arr,
        };
        let columns = self
            .model
            .rank_divider()
            .flatten_subdomains_to_columns(&arr, true)?;
        self.model.increment_state(&columns)
    }

    /// Predict and reassemble a labeled dataset matching the configured
    /// output variables
    pub fn predict(&self) -> Result<Dataset> {
        let flat = self.model.predict()?;
        let divider = self.model.rank_divider();
        let n_subdomains = divider.n_subdomains();
        let n_rows = flat.len() / n_subdomains;
        let columns = DMatrix::from_column_slice(n_rows, n_subdomains, flat.as_slice());
        let merged = divider.merge_subdomains(&columns)?;
        match self.model.autoencoder() {
            Some(transformer) => decode_spatial(
                transformer,
                &merged,
                &self.adapter.output_variables,
                &self.adapter.rank_dims,
            ),
            None => self.adapter.prediction_to_dataset(&merged),
        }
    }

    /// Dump the wrapped model and the adapter's variable record
    pub fn dump(&self, path: &Path) -> Result<()> {
        fs::create_dir_all(path)?;
        self.model.dump(&path.join(Self::MODEL_DIR))?;
        let record = AdapterVariables {
            input_variables: self.adapter.input_variables.clone(),
            output_variables: self.adapter.output_variables.clone(),
            hybrid_variables: None,
        };
        let file = File::create(path.join(VARIABLES_NAME))?;
        serde_json::to_writer_pretty(file, &record)?;
        Ok(())
    }

    /// Load an adapter written by [`ReservoirDatasetAdapter::dump`]; the
    /// wrapped model comes back freshly reset
    pub fn load(path: &Path) -> Result<Self> {
        let model = ReservoirComputingModel::load(&path.join(Self::MODEL_DIR))?;
        let file = File::open(path.join(VARIABLES_NAME))?;
        let record: AdapterVariables = serde_json::from_reader(file)?;
        Self::new(model, record.input_variables, record.output_variables)
    }
}

/// Wraps a [`HybridReservoirComputingModel`] to take in and return labeled
/// datasets. Hybrid variables are pulled from the same input dataset handed
/// to `predict`.
#[derive(Debug, Clone)]
pub struct HybridReservoirDatasetAdapter {
    model: HybridReservoirComputingModel,
    adapter: DatasetAdapter,
    hybrid_variables: Vec<VariableSpec>,
}

impl HybridReservoirDatasetAdapter {
    /// Subdirectory holding the wrapped model's sub-resources
    pub const MODEL_DIR: &'static str = "hybrid_reservoir_model";

    /// Wrap a hybrid model with variable specs matching its variable lists
    pub fn new(
        model: HybridReservoirComputingModel,
        input_variables: Vec<VariableSpec>,
        output_variables: Vec<VariableSpec>,
        hybrid_variables: Vec<VariableSpec>,
    ) -> Result<Self> {
        check_variable_names(&input_variables, model.input_variables(), "input")?;
        check_variable_names(&output_variables, model.output_variables(), "output")?;
        check_variable_names(&hybrid_variables, model.hybrid_variables(), "hybrid")?;
        let rank_dims = model.rank_divider().rank_dims().clone();
        Ok(Self {
            model,
            adapter: DatasetAdapter::new(input_variables, output_variables, rank_dims),
            hybrid_variables,
        })
    }

    /// Number of halo cells expected around increment inputs
    pub fn input_overlap(&self) -> usize {
        self.model.rank_divider().overlap()
    }

    /// Whether the wrapped model consumes hybrid readout inputs
    pub fn is_hybrid(&self) -> bool {
        true
    }

    /// The wrapped model
    pub fn model(&self) -> &HybridReservoirComputingModel {
        &self.model
    }

    /// See [`ReservoirComputingModel::reset_state`]
    pub fn reset_state(&mut self) -> Result<()> {
        self.model.reset_state()
    }

    /// Advance the reservoir from a halo-padded labeled dataset; hybrid
    /// variables in the dataset are ignored here
    pub fn increment_state(&mut self, inputs: &Dataset) -> Result<()> {
        let arr = self
            .adapter
            .dataset_to_array(inputs, &self.adapter.input_variables)?;
        let arr = match self.model.autoencoder() {
            Some(transformer) => encode_spatial(transformer, &arr)?,
            None => arr,
        };
        let columns = self
            .model
            .rank_divider()
            .flatten_subdomains_to_columns(&arr, true)?;
        self.model.increment_state(&columns)
    }

    /// Predict from the current state plus the hybrid variables in `inputs`
    /// (without halo), returning a labeled dataset
    pub fn predict(&self, inputs: &Dataset) -> Result<Dataset> {
        let hybrid = self
            .adapter
            .dataset_to_array(inputs, &self.hybrid_variables)?;
        let flat = self.model.predict(&hybrid)?;
        let divider = self.model.rank_divider();
        let n_subdomains = divider.n_subdomains();
        let n_rows = flat.len() / n_subdomains;
        let columns = DMatrix::from_column_slice(n_rows, n_subdomains, flat.as_slice());
        let merged = divider.merge_subdomains(&columns)?;
        match self.model.autoencoder() {
            Some(transformer) => decode_spatial(
                transformer,
                &merged,
                &self.adapter.output_variables,
                &self.adapter.rank_dims,
            ),
            None => self.adapter.prediction_to_dataset(&merged),
        }
    }

    /// Dump the wrapped model and the adapter's variable record
    pub fn dump(&self, path: &Path) -> Result<()> {
        fs::create_dir_all(path)?;
        self.model.dump(&path.join(Self::MODEL_DIR))?;
        let record = AdapterVariables {
            input_variables: self.adapter.input_variables.clone(),
            output_variables: self.adapter.output_variables.clone(),
            hybrid_variables: Some(self.hybrid_variables.clone()),
        };
        let file = File::create(path.join(VARIABLES_NAME))?;
        serde_json::to_writer_pretty(file, &record)?;
        Ok(())
    }

    /// Load an adapter written by [`HybridReservoirDatasetAdapter::dump`]
    pub fn load(path: &Path) -> Result<Self> {
        let model = HybridReservoirComputingModel::load(&path.join(Self::MODEL_DIR))?;
        let file = File::open(path.join(VARIABLES_NAME))?;
        let record: AdapterVariables = serde_json::from_reader(file)?;
        let hybrid_variables = record.hybrid_variables.ok_or_else(|| {
            Error::Serialization("hybrid adapter record is missing hybrid_variables".to_string())
        })?;
        Self::new(
            model,
            record.input_variables,
            record.output_variables,
            hybrid_variables,
        )
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use common::Activation;
    use nalgebra::DVector;
    use ndarray::Array;

    use super::*;
    use crate::domain::RankDivider;
    use crate::readout::ReservoirComputingReadout;
    use crate::reservoir::{Reservoir, ReservoirHyperparameters};

    fn adapter() -> DatasetAdapter {
        DatasetAdapter::new(
            vec![VariableSpec::new("air_temperature", 2)],
            vec![VariableSpec::new("air_temperature", 2)],
            ["x".to_string(), "y".to_string()],
        )
    }

    fn labeled(dims: &[&str], shape: &[usize]) -> LabeledArray {
        let mut counter = 0.0;
        LabeledArray {
            dims: dims.iter().map(|d| d.to_string()).collect(),
            data: Array::from_shape_fn(IxDyn(shape), |_| {
                counter += 1.0;
                counter
            }),
        }
    }

    #[test]
    fn missing_variable_is_an_error() {
        let adapter = adapter();
        let dataset = Dataset::new();
        let res = adapter.dataset_to_array(&dataset, adapter.input_variables());
        assert!(matches!(res, Err(Error::MissingVariable(_))));
    }

    #[test]
    fn transposes_labeled_dims_into_rank_order() {
        let adapter = adapter();
        let mut dataset = Dataset::new();
        // dims come in as (z, y, x) and must land as (feature, x, y)
        dataset.insert(
            "air_temperature".to_string(),
            labeled(&["z", "y", "x"], &[2, 4, 3]),
        );
        let arr = adapter
            .dataset_to_array(&dataset, adapter.input_variables())
            .unwrap();
        assert_eq!(arr.shape(), &[2, 3, 4]);

        let original = &dataset["air_temperature"].data;
        assert_eq!(arr[[1, 2, 3]], original[[1, 3, 2]]);
    }

    #[test]
    fn two_dimensional_variables_get_a_singleton_feature_axis() {
        let adapter = DatasetAdapter::new(
            vec![VariableSpec::new("land_sea_mask", 1)],
            vec![],
            ["x".to_string(), "y".to_string()],
        );
        let mut dataset = Dataset::new();
        dataset.insert(
            "land_sea_mask".to_string(),
            labeled(&["y", "x"], &[4, 3]),
        );
        let arr = adapter
            .dataset_to_array(&dataset, adapter.input_variables())
            .unwrap();
        assert_eq!(arr.shape(), &[1, 3, 4]);
    }

    #[test]
    fn feature_count_mismatch_is_rejected() {
        let adapter = adapter();
        let mut dataset = Dataset::new();
        dataset.insert(
            "air_temperature".to_string(),
            labeled(&["x", "y", "z"], &[3, 4, 5]),
        );
        let res = adapter.dataset_to_array(&dataset, adapter.input_variables());
        assert!(matches!(res, Err(Error::ShapeMismatch { .. })));
    }

    #[test]
    fn prediction_roundtrips_through_labels() {
        let adapter = adapter();
        let merged = Array::from_shape_fn(IxDyn(&[2, 3, 4]), |ix| {
            (100 * ix[0] + 10 * ix[1] + ix[2]) as f64
        });
        let dataset = adapter.prediction_to_dataset(&merged).unwrap();
        let variable = &dataset["air_temperature"];
        assert_eq!(variable.dims, vec!["x", "y", "z"]);
        assert_eq!(variable.data.shape(), &[3, 4, 2]);
        assert_eq!(variable.data[[2, 3, 1]], merged[[1, 2, 3]]);

        // and back through the input path
        let arr = adapter
            .dataset_to_array(&dataset, adapter.output_variables())
            .unwrap();
        assert_eq!(arr, merged);
    }

    fn hyperparameters(state_size: usize) -> ReservoirHyperparameters {
        ReservoirHyperparameters {
            state_size,
            adjacency_matrix_sparsity: 0.5,
            spectral_radius: 0.9,
            input_coupling_sparsity: 0.0,
            input_coupling_scaling: 0.1,
            bias_scaling: 0.0,
            activation: Activation::Tanh,
            seed: 42,
        }
    }

    /// 4x4 grid in 2x2 subdomains, one single-feature variable, no halo
    fn dataset_adapter_model() -> ReservoirDatasetAdapter {
        let divider = RankDivider::new(
            [2, 2],
            ["x".to_string(), "y".to_string()],
            [4, 4],
            0,
        )
        .unwrap();
        let state_size = 8;
        // subdomain columns carry 4 cells of 1 feature
        let reservoir = Reservoir::new(hyperparameters(state_size), 4);
        let readout = ReservoirComputingReadout::new(
            DMatrix::from_element(4, state_size, 1.0 / state_size as f64),
            DVector::zeros(4),
        )
        .unwrap();
        let model = ReservoirComputingModel::new(
            vec!["air_temperature".to_string()],
            vec!["air_temperature".to_string()],
            reservoir,
            Arc::new(readout),
            Arc::new(divider),
            false,
            None,
        );
        ReservoirDatasetAdapter::new(
            model,
            vec![VariableSpec::new("air_temperature", 1)],
            vec![VariableSpec::new("air_temperature", 1)],
        )
        .unwrap()
    }

    #[test]
    fn variable_name_mismatch_is_rejected() {
        let base = dataset_adapter_model();
        let res = ReservoirDatasetAdapter::new(
            base.model().clone(),
            vec![VariableSpec::new("specific_humidity", 1)],
            vec![VariableSpec::new("air_temperature", 1)],
        );
        assert!(matches!(res, Err(Error::InvalidConfig(_))));
    }

    #[test]
    fn increment_and_predict_through_labels() {
        let mut adapter = dataset_adapter_model();
        adapter.reset_state().unwrap();
        assert_eq!(adapter.input_overlap(), 0);
        assert!(!adapter.is_hybrid());

        let mut inputs = Dataset::new();
        inputs.insert(
            "air_temperature".to_string(),
            labeled(&["x", "y"], &[4, 4]),
        );
        adapter.increment_state(&inputs).unwrap();

        let prediction = adapter.predict().unwrap();
        let variable = &prediction["air_temperature"];
        assert_eq!(variable.dims, vec!["x", "y"]);
        assert_eq!(variable.data.shape(), &[4, 4]);
        // the mean readout of a perturbed tanh state is nonzero
        assert!(variable.data.iter().any(|v| *v != 0.0));
    }

    #[test]
    fn adapter_dump_load_reproduces_predictions() {
        let dir = tempfile::tempdir().unwrap();
        let mut adapter = dataset_adapter_model();
        adapter.reset_state().unwrap();

        let mut inputs = Dataset::new();
        inputs.insert(
            "air_temperature".to_string(),
            labeled(&["x", "y"], &[4, 4]),
        );
        adapter.increment_state(&inputs).unwrap();
        let prediction = adapter.predict().unwrap();

        adapter.dump(dir.path()).unwrap();
        let mut loaded = ReservoirDatasetAdapter::load(dir.path()).unwrap();
        loaded.increment_state(&inputs).unwrap();
        assert_eq!(loaded.predict().unwrap(), prediction);
    }
}
