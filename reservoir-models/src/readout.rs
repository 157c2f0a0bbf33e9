use std::fs::{self, File};
use std::path::Path;

use lin_reg::LinReg;
use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

const WEIGHTS_NAME: &str = "weights.bin";

/// The offline-trained affine map from (optionally squared) reservoir state
/// to predicted output features.
///
/// Stateless at inference: once fitted the coefficients are never mutated,
/// so one readout can be shared read-only across models.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReservoirComputingReadout {
    coefficients: DMatrix<f64>,
    intercepts: DVector<f64>,
}

impl ReservoirComputingReadout {
    /// Build a readout from externally trained weights. `coefficients` has
    /// one row per output feature and one column per readout input feature.
    pub fn new(coefficients: DMatrix<f64>, intercepts: DVector<f64>) -> Result<Self> {
        if coefficients.nrows() != intercepts.len() {
            return Err(Error::ShapeMismatch {
                expected: format!("{} intercepts", coefficients.nrows()),
                actual: format!("{} intercepts", intercepts.len()),
            });
        }
        Ok(Self {
            coefficients,
            intercepts,
        })
    }

    /// Fit the readout offline with the given regression method.
    ///
    /// `design` rows are samples of the readout input (reservoir state,
    /// plus hybrid features where applicable); `targets` rows are the
    /// matching output samples.
    pub fn fit<R: LinReg>(
        regressor: &R,
        design: &DMatrix<f64>,
        targets: &DMatrix<f64>,
    ) -> Result<Self> {
        let fit = regressor.fit_readout(
            &design.columns(0, design.ncols()),
            &targets.columns(0, targets.ncols()),
        )?;
        debug!(
            "fitted readout: ({}, {}) coefficients",
            fit.coefficients.nrows(),
            fit.coefficients.ncols()
        );
        Self::new(fit.coefficients, fit.intercepts)
    }

    /// Readout input feature count
    #[inline(always)]
    pub fn n_inputs(&self) -> usize {
        self.coefficients.ncols()
    }

    /// Output feature count per subdomain
    #[inline(always)]
    pub fn n_outputs(&self) -> usize {
        self.coefficients.nrows()
    }

    /// Apply the affine map to every subdomain column of `readout_input`,
    /// producing one output column per subdomain in the same order.
    pub fn predict(&self, readout_input: &DMatrix<f64>) -> Result<DMatrix<f64>> {
        if readout_input.nrows() != self.n_inputs() {
            return Err(Error::ShapeMismatch {
                expected: format!("{} readout input features", self.n_inputs()),
                actual: format!("{} readout input features", readout_input.nrows()),
            });
        }
        let mut prediction = &self.coefficients * readout_input;
        for mut col in prediction.column_iter_mut() {
            col += &self.intercepts;
        }
        Ok(prediction)
    }

    /// Persist the trained weights
    pub fn dump(&self, path: &Path) -> Result<()> {
        fs::create_dir_all(path)?;
        let file = File::create(path.join(WEIGHTS_NAME))?;
        bincode::serialize_into(file, self)?;
        Ok(())
    }

    /// Load weights written by [`ReservoirComputingReadout::dump`]
    pub fn load(path: &Path) -> Result<Self> {
        let file = File::open(path.join(WEIGHTS_NAME))?;
        let readout: Self = bincode::deserialize_from(file)?;
        Ok(readout)
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;
    use lin_reg::TikhonovRegularization;

    use super::*;

    #[test]
    fn predict_applies_affine_map_per_column() {
        let coefficients = DMatrix::from_row_slice(1, 2, &[1.0, -1.0]);
        let intercepts = DVector::from_vec(vec![0.5]);
        let readout = ReservoirComputingReadout::new(coefficients, intercepts).unwrap();

        // two subdomain columns
        let input = DMatrix::from_column_slice(2, 2, &[3.0, 1.0, 0.0, 2.0]);
        let prediction = readout.predict(&input).unwrap();
        assert_eq!(prediction, DMatrix::from_column_slice(1, 2, &[2.5, -1.5]));
    }

    #[test]
    fn predict_rejects_wrong_input_width() {
        let readout = ReservoirComputingReadout::new(
            DMatrix::from_row_slice(1, 2, &[1.0, -1.0]),
            DVector::from_vec(vec![0.0]),
        )
        .unwrap();
        let input = DMatrix::zeros(3, 1);
        assert!(matches!(
            readout.predict(&input),
            Err(Error::ShapeMismatch { .. })
        ));
    }

    #[test]
    fn mismatched_intercepts_are_rejected() {
        let res = ReservoirComputingReadout::new(
            DMatrix::zeros(2, 4),
            DVector::from_vec(vec![0.0]),
        );
        assert!(matches!(res, Err(Error::ShapeMismatch { .. })));
    }

    #[test]
    fn fit_recovers_known_affine_map() {
        // y = 2 * x0 - x1 + 1, sampled without noise
        let design = DMatrix::from_row_slice(
            4,
            2,
            &[0.0, 0.0, 1.0, 0.0, 0.0, 1.0, 1.0, 1.0],
        );
        let targets = DMatrix::from_row_slice(4, 1, &[1.0, 3.0, 0.0, 2.0]);
        let regressor = TikhonovRegularization {
            regularization_coeff: 0.0,
        };
        let readout = ReservoirComputingReadout::fit(&regressor, &design, &targets).unwrap();

        let input = DMatrix::from_column_slice(2, 1, &[2.0, 3.0]);
        let prediction = readout.predict(&input).unwrap();
        assert_relative_eq!(prediction[(0, 0)], 2.0, epsilon = 1e-9);
    }

    #[test]
    fn dump_load_roundtrips_exactly() {
        let dir = tempfile::tempdir().unwrap();
        let readout = ReservoirComputingReadout::new(
            DMatrix::from_fn(3, 5, |i, j| (i * 5 + j) as f64 * 0.25),
            DVector::from_fn(3, |i, _| i as f64 - 1.0),
        )
        .unwrap();
        readout.dump(dir.path()).unwrap();
        let loaded = ReservoirComputingReadout::load(dir.path()).unwrap();
        assert_eq!(loaded, readout);
    }
}
