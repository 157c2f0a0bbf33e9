//! Linear regression methods for fitting readout layers

#![deny(unused_imports, unused_crate_dependencies)]
#![warn(missing_docs)]

use nalgebra::{Const, DMatrix, DVector, Dyn, MatrixView};

mod tikhonov_regularization;

pub use tikhonov_regularization::TikhonovRegularization;

/// Errors occurring while fitting a readout
#[derive(Debug, thiserror::Error)]
pub enum LinRegError {
    /// The normal equations could not be inverted
    #[error("design matrix is singular, cannot solve for readout coefficients")]
    SingularDesign,

    /// Design and target row counts disagree
    #[error("design has {design_rows} sample rows but targets have {target_rows}")]
    SampleCountMismatch {
        /// Rows of the design matrix
        design_rows: usize,
        /// Rows of the target matrix
        target_rows: usize,
    },
}

/// A fitted affine readout map, split into its linear and constant parts
#[derive(Debug, Clone, PartialEq)]
pub struct ReadoutFit {
    /// Coefficient matrix of shape `(n_outputs, n_features)`
    pub coefficients: DMatrix<f64>,
    /// Intercept vector of length `n_outputs`
    pub intercepts: DVector<f64>,
}

/// Generic way of performing linear regression and fitting a readout map
pub trait LinReg: Clone {
    /// Fit an affine readout mapping design rows to target rows
    ///
    /// # Parameters
    /// design: Sample data with one row per observation and one column per
    ///         feature. No column of ones is expected; the intercept is
    ///         handled internally.
    /// targets: Target data with one row per observation and one column per
    ///          output dimension.
    fn fit_readout<'a>(
        &self,
        design: &'a MatrixView<'a, f64, Dyn, Dyn, Const<1>, Dyn>,
        targets: &'a MatrixView<'a, f64, Dyn, Dyn, Const<1>, Dyn>,
    ) -> Result<ReadoutFit, LinRegError>;
}
