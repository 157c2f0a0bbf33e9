use std::fs::{self, File};
use std::path::Path;

use nalgebra::DMatrix;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

const TRANSFORMER_NAME: &str = "transformer.bin";

/// A frozen, externally trained encode/decode transform applied at the model
/// boundary: inputs are encoded to a latent feature space before flattening,
/// and predictions are decoded back into per-variable feature arrays.
///
/// The core never trains a transformer; it only applies and persists one.
pub trait Transformer {
    /// Latent feature count produced by [`Transformer::encode`]
    fn n_latent(&self) -> usize;

    /// Map `(sample, feature)` rows into `(sample, latent)` rows
    fn encode(&self, data: &DMatrix<f64>) -> Result<DMatrix<f64>>;

    /// Map `(sample, latent)` rows back into one `(sample, feature)` array
    /// per output variable
    fn decode(&self, latent: &DMatrix<f64>) -> Result<Vec<DMatrix<f64>>>;
}

/// A linear autoencoder: paired projection matrices with per-variable output
/// splits, trained offline and loaded as a frozen resource.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinearTransformer {
    /// `(n_features, n_latent)` projection
    encoder: DMatrix<f64>,
    /// `(n_latent, n_features)` reconstruction
    decoder: DMatrix<f64>,
    /// Feature count per output variable; sums to the decoder width
    output_splits: Vec<usize>,
}

impl LinearTransformer {
    /// Wrap externally trained projection matrices
    pub fn new(
        encoder: DMatrix<f64>,
        decoder: DMatrix<f64>,
        output_splits: Vec<usize>,
    ) -> Result<Self> {
        if encoder.ncols() != decoder.nrows() {
            return Err(Error::ShapeMismatch {
                expected: format!("decoder with {} latent rows", encoder.ncols()),
                actual: format!("decoder with {} latent rows", decoder.nrows()),
            });
        }
        let split_sum: usize = output_splits.iter().sum();
        if split_sum != decoder.ncols() {
            return Err(Error::ShapeMismatch {
                expected: format!("output splits summing to {}", decoder.ncols()),
                actual: format!("output splits summing to {}", split_sum),
            });
        }
        Ok(Self {
            encoder,
            decoder,
            output_splits,
        })
    }

    /// Persist the projection matrices
    pub fn dump(&self, path: &Path) -> Result<()> {
        fs::create_dir_all(path)?;
        let file = File::create(path.join(TRANSFORMER_NAME))?;
        bincode::serialize_into(file, self)?;
        Ok(())
    }

    /// Load a transformer written by [`LinearTransformer::dump`]
    pub fn load(path: &Path) -> Result<Self> {
        let file = File::open(path.join(TRANSFORMER_NAME))?;
        let transformer: Self = bincode::deserialize_from(file)?;
        Ok(transformer)
    }
}

impl Transformer for LinearTransformer {
    #[inline(always)]
    fn n_latent(&self) -> usize {
        self.encoder.ncols()
    }

    fn encode(&self, data: &DMatrix<f64>) -> Result<DMatrix<f64>> {
        if data.ncols() != self.encoder.nrows() {
            return Err(Error::ShapeMismatch {
                expected: format!("{} features per sample", self.encoder.nrows()),
                actual: format!("{} features per sample", data.ncols()),
            });
        }
        Ok(data * &self.encoder)
    }

    fn decode(&self, latent: &DMatrix<f64>) -> Result<Vec<DMatrix<f64>>> {
        if latent.ncols() != self.decoder.nrows() {
            return Err(Error::ShapeMismatch {
                expected: format!("{} latent features per sample", self.decoder.nrows()),
                actual: format!("{} latent features per sample", latent.ncols()),
            });
        }
        let decoded = latent * &self.decoder;
        let mut outputs = Vec::with_capacity(self.output_splits.len());
        let mut offset = 0;
        for &split in &self.output_splits {
            outputs.push(decoded.columns(offset, split).clone_owned());
            offset += split;
        }
        Ok(outputs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity_transformer() -> LinearTransformer {
        LinearTransformer::new(
            DMatrix::identity(3, 3),
            DMatrix::identity(3, 3),
            vec![2, 1],
        )
        .unwrap()
    }

    #[test]
    fn encode_projects_samples() {
        let transformer = LinearTransformer::new(
            DMatrix::from_row_slice(2, 1, &[1.0, 1.0]),
            DMatrix::from_row_slice(1, 2, &[0.5, 0.5]),
            vec![2],
        )
        .unwrap();
        let data = DMatrix::from_row_slice(2, 2, &[1.0, 3.0, 2.0, 4.0]);
        let latent = transformer.encode(&data).unwrap();
        assert_eq!(latent, DMatrix::from_column_slice(2, 1, &[4.0, 6.0]));
    }

    #[test]
    fn decode_splits_variables() {
        let transformer = identity_transformer();
        let latent = DMatrix::from_row_slice(2, 3, &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
        let decoded = transformer.decode(&latent).unwrap();
        assert_eq!(decoded.len(), 2);
        assert_eq!(decoded[0], DMatrix::from_row_slice(2, 2, &[1.0, 2.0, 4.0, 5.0]));
        assert_eq!(decoded[1], DMatrix::from_row_slice(2, 1, &[3.0, 6.0]));
    }

    #[test]
    fn mismatched_splits_are_rejected() {
        let res = LinearTransformer::new(
            DMatrix::identity(3, 3),
            DMatrix::identity(3, 3),
            vec![1, 1],
        );
        assert!(matches!(res, Err(Error::ShapeMismatch { .. })));
    }

    #[test]
    fn dump_load_roundtrips_exactly() {
        let dir = tempfile::tempdir().unwrap();
        let transformer = identity_transformer();
        transformer.dump(dir.path()).unwrap();
        let loaded = LinearTransformer::load(dir.path()).unwrap();
        assert_eq!(loaded, transformer);
    }
}
