use std::collections::HashMap;
use std::fs;
use std::path::Path;

use once_cell::sync::Lazy;

use crate::adapters::{HybridReservoirDatasetAdapter, ReservoirDatasetAdapter};
use crate::error::{Error, Result};
use crate::model::{HybridReservoirComputingModel, ReservoirComputingModel};

const MODEL_TYPE_NAME: &str = "model_type";

/// The closed set of persistable model types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModelTag {
    /// A bare [`ReservoirComputingModel`]
    PureReservoir,
    /// A bare [`HybridReservoirComputingModel`]
    HybridReservoir,
    /// A [`ReservoirDatasetAdapter`]
    ReservoirAdapter,
    /// A [`HybridReservoirDatasetAdapter`]
    HybridReservoirAdapter,
}

impl ModelTag {
    /// The stable string written to the `model_type` sub-resource
    pub fn as_str(&self) -> &'static str {
        match self {
            ModelTag::PureReservoir => "pure-reservoir",
            ModelTag::HybridReservoir => "hybrid-reservoir",
            ModelTag::ReservoirAdapter => "reservoir-adapter",
            ModelTag::HybridReservoirAdapter => "hybrid-reservoir-adapter",
        }
    }
}

/// Any model that can be dumped and polymorphically reloaded
#[derive(Debug, Clone)]
pub enum Model {
    /// A bare reservoir model
    Reservoir(ReservoirComputingModel),
    /// A bare hybrid reservoir model
    HybridReservoir(HybridReservoirComputingModel),
    /// A dataset-facing reservoir adapter
    ReservoirAdapter(ReservoirDatasetAdapter),
    /// A dataset-facing hybrid reservoir adapter
    HybridReservoirAdapter(HybridReservoirDatasetAdapter),
}

impl Model {
    /// The tag identifying this model type in persisted form
    pub fn tag(&self) -> ModelTag {
        match self {
            Model::Reservoir(_) => ModelTag::PureReservoir,
            Model::HybridReservoir(_) => ModelTag::HybridReservoir,
            Model::ReservoirAdapter(_) => ModelTag::ReservoirAdapter,
            Model::HybridReservoirAdapter(_) => ModelTag::HybridReservoirAdapter,
        }
    }

    fn dump_payload(&self, path: &Path) -> Result<()> {
        match self {
            Model::Reservoir(m) => m.dump(path),
            Model::HybridReservoir(m) => m.dump(path),
            Model::ReservoirAdapter(m) => m.dump(path),
            Model::HybridReservoirAdapter(m) => m.dump(path),
        }
    }
}

type Loader = fn(&Path) -> Result<Model>;

/// Tag-to-loader table, built deterministically once per process. A
/// duplicate tag is a programming error and panics immediately rather than
/// silently shadowing a loader.
static LOADERS: Lazy<HashMap<&'static str, Loader>> = Lazy::new(|| {
    let entries: [(ModelTag, Loader); 4] = [
        (ModelTag::PureReservoir, |path| {
            Ok(Model::Reservoir(ReservoirComputingModel::load(path)?))
        }),
        (ModelTag::HybridReservoir, |path| {
            Ok(Model::HybridReservoir(HybridReservoirComputingModel::load(
                path,
            )?))
        }),
        (ModelTag::ReservoirAdapter, |path| {
            Ok(Model::ReservoirAdapter(ReservoirDatasetAdapter::load(path)?))
        }),
        (ModelTag::HybridReservoirAdapter, |path| {
            Ok(Model::HybridReservoirAdapter(
                HybridReservoirDatasetAdapter::load(path)?,
            ))
        }),
    ];
    let mut table = HashMap::with_capacity(entries.len());
    for (tag, loader) in entries {
        if table.insert(tag.as_str(), loader).is_some() {
            panic!("duplicate model tag '{}'", tag.as_str());
        }
    }
    table
});

/// Dump any model under one directory, recording its type tag alongside the
/// payload so [`load`] can dispatch
pub fn dump(model: &Model, path: &Path) -> Result<()> {
    model.dump_payload(path)?;
    fs::write(path.join(MODEL_TYPE_NAME), model.tag().as_str())?;
    Ok(())
}

/// Load a model dumped by [`dump`], dispatching on its recorded type tag.
/// An unrecognized tag is surfaced as an error, never guessed at.
pub fn load(path: &Path) -> Result<Model> {
    let tag = fs::read_to_string(path.join(MODEL_TYPE_NAME))?;
    let tag = tag.trim();
    let loader = LOADERS
        .get(tag)
        .ok_or_else(|| Error::UnknownModelTag(tag.to_string()))?;
    info!("loading '{}' model from {}", tag, path.display());
    loader(path)
}
