use nalgebra::{Const, DMatrix, DVector, Dim, Dyn, Matrix, MatrixView};

use super::{LinReg, LinRegError, ReadoutFit};

/// Tikhonov regularization aka ridge regression
/// It is particularly useful to mitigate the problem of multicollinearity in
/// linear regression
#[derive(Debug, Clone)]
pub struct TikhonovRegularization {
    /// Ridge parameter
    pub regularization_coeff: f64,
}

impl LinReg for TikhonovRegularization {
    fn fit_readout<'a>(
        &self,
        design: &'a MatrixView<'a, f64, Dyn, Dyn, Const<1>, Dyn>,
        targets: &'a MatrixView<'a, f64, Dyn, Dyn, Const<1>, Dyn>,
    ) -> Result<ReadoutFit, LinRegError> {
        if design.nrows() != targets.nrows() {
            return Err(LinRegError::SampleCountMismatch {
                design_rows: design.nrows(),
                target_rows: targets.nrows(),
            });
        }
        let n_features = design.ncols();

        // augment the design with a trailing column of ones for the intercept
        let x: DMatrix<f64> = Matrix::from_fn_generic(
            Dyn::from_usize(design.nrows()),
            Dyn::from_usize(n_features + 1),
            |i, j| {
                if j == n_features {
                    1.0
                } else {
                    design[(i, j)]
                }
            },
        );

        let reg_m: DMatrix<f64> = Matrix::from_diagonal_element_generic(
            Dyn::from_usize(x.ncols()),
            Dyn::from_usize(x.ncols()),
            self.regularization_coeff,
        );

        let p0 = x.transpose() * &x;
        let p1 = (p0 + reg_m)
            .try_inverse()
            .ok_or(LinRegError::SingularDesign)?;
        let p2 = x.transpose() * targets;

        // (n_features + 1, n_outputs), last row holding the intercepts
        let beta = p1 * p2;

        let coefficients = beta.rows(0, n_features).transpose();
        let intercepts =
            DVector::from_iterator(targets.ncols(), beta.row(n_features).iter().cloned());

        Ok(ReadoutFit {
            coefficients,
            intercepts,
        })
    }
}

#[cfg(test)]
mod tests {
    use log::info;
    use round::round;

    use super::*;

    #[test]
    fn tikhonov_regularization() {
        if let Err(_) = pretty_env_logger::try_init() {}

        let design: DMatrix<f64> = Matrix::from_vec_generic(
            Dyn::from_usize(4),
            Dyn::from_usize(2),
            vec![0.0, 1.0, 2.0, 3.0, 0.0, 0.0, 1.0, 2.0],
        );
        let targets: DMatrix<f64> = Matrix::from_vec_generic(
            Dyn::from_usize(4),
            Dyn::from_usize(1),
            vec![1.0, 2.0, 3.0, 4.0],
        );
        info!("design: {}, targets: {}", design, targets);

        let regressor = TikhonovRegularization {
            regularization_coeff: 0.0,
        };
        let mut fit = regressor
            .fit_readout(
                &design.columns(0, design.ncols()),
                &targets.columns(0, targets.ncols()),
            )
            .unwrap();
        info!("coefficients: {}, intercepts: {}", fit.coefficients, fit.intercepts);

        // targets are 1 + x0 + 0 * x1
        fit.coefficients.iter_mut().for_each(|v| *v = round(*v, 1));
        fit.intercepts.iter_mut().for_each(|v| *v = round(*v, 1));

        assert_eq!(
            fit.coefficients,
            Matrix::from_vec_generic(Dyn::from_usize(1), Dyn::from_usize(2), vec![1.0, 0.0]),
        );
        assert_eq!(fit.intercepts, DVector::from_vec(vec![1.0]));
    }

    #[test]
    fn tikhonov_regularization_multi_output() {
        if let Err(_) = pretty_env_logger::try_init() {}

        let design: DMatrix<f64> = Matrix::from_vec_generic(
            Dyn::from_usize(4),
            Dyn::from_usize(2),
            vec![0.0, 1.0, 2.0, 3.0, 0.0, 0.0, 1.0, 2.0],
        );
        // first output tracks x0, second output tracks -2 * x1
        let targets: DMatrix<f64> = Matrix::from_vec_generic(
            Dyn::from_usize(4),
            Dyn::from_usize(2),
            vec![0.0, 1.0, 2.0, 3.0, 0.0, 0.0, -2.0, -4.0],
        );

        let regressor = TikhonovRegularization {
            regularization_coeff: 0.0,
        };
        let mut fit = regressor
            .fit_readout(
                &design.columns(0, design.ncols()),
                &targets.columns(0, targets.ncols()),
            )
            .unwrap();
        info!("coefficients: {}, intercepts: {}", fit.coefficients, fit.intercepts);

        fit.coefficients.iter_mut().for_each(|v| *v = round(*v, 1));
        fit.intercepts.iter_mut().for_each(|v| *v = round(*v, 1));

        assert_eq!(
            fit.coefficients,
            Matrix::from_vec_generic(
                Dyn::from_usize(2),
                Dyn::from_usize(2),
                vec![1.0, 0.0, 0.0, -2.0]
            ),
        );
        assert_eq!(fit.intercepts, DVector::from_vec(vec![0.0, 0.0]));
    }

    #[test]
    fn sample_count_mismatch_errors() {
        let design: DMatrix<f64> = DMatrix::zeros(4, 2);
        let targets: DMatrix<f64> = DMatrix::zeros(3, 1);

        let regressor = TikhonovRegularization {
            regularization_coeff: 0.1,
        };
        let res = regressor.fit_readout(
            &design.columns(0, design.ncols()),
            &targets.columns(0, targets.ncols()),
        );
        assert!(matches!(res, Err(LinRegError::SampleCountMismatch { .. })));
    }
}
