use nalgebra::{DMatrix, DVector};

/// Square the entries in rows at even 0-indexed positions, leaving odd rows
/// untouched.
///
/// Feeding the readout a state vector whose alternating entries are squared
/// was found to be important for forecast skill in Wikner+2020
/// (https://doi.org/10.1063/5.0005541), so the even/odd split must be kept
/// exact.
pub fn square_even_terms(m: &DMatrix<f64>) -> DMatrix<f64> {
    let mut out = m.clone();
    for i in (0..out.nrows()).step_by(2) {
        for j in 0..out.ncols() {
            let v = out[(i, j)];
            out[(i, j)] = v * v;
        }
    }
    out
}

/// Flatten a 2D matrix into a vector with the columns laid end to end, so
/// per-subdomain blocks stay contiguous and in subdomain order.
pub fn flatten_columns_contiguous(m: &DMatrix<f64>) -> DVector<f64> {
    // nalgebra stores matrices column-major, so the raw slice already has
    // the required layout
    DVector::from_column_slice(m.as_slice())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn square_even_terms_squares_even_positions_only() {
        let m = DMatrix::from_column_slice(4, 1, &[2.0, 3.0, -4.0, 5.0]);
        let squared = square_even_terms(&m);
        assert_eq!(
            squared,
            DMatrix::from_column_slice(4, 1, &[4.0, 3.0, 16.0, 5.0])
        );
    }

    #[test]
    fn square_even_terms_applies_per_column() {
        let m = DMatrix::from_column_slice(2, 2, &[2.0, 3.0, -3.0, 7.0]);
        let squared = square_even_terms(&m);
        assert_eq!(squared, DMatrix::from_column_slice(2, 2, &[4.0, 3.0, 9.0, 7.0]));
    }

    #[test]
    fn flatten_keeps_columns_contiguous() {
        let m = DMatrix::from_column_slice(2, 2, &[1.0, 2.0, 3.0, 4.0]);
        let flat = flatten_columns_contiguous(&m);
        assert_eq!(flat.as_slice(), &[1.0, 2.0, 3.0, 4.0]);
    }
}
