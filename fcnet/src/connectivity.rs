//! Shape checks and the small NaN-aware reductions shared by every metric.
//!
//! Connectivity tensors are plain `ndarray` arrays, indexed
//! `[node, node, task, subject]` (or a prefix of that). NaN marks a missing
//! edge and is skipped by every reduction here, the way `numpy.nanmean` and
//! `numpy.nansum` skip it.

use ndarray::{Array2, ArrayView2, ArrayViewMut2, Axis, Zip};
use thiserror::Error;

use crate::partition::PartitionError;

/// Errors raised when connectivity input does not fit the partition.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConnectivityError {
    #[error("Connectivity matrix is not square ({rows} x {cols}).")]
    NotSquare { rows: usize, cols: usize },
    #[error("Connectivity has {found} nodes but the partition has {expected}.")]
    NodeMismatch { expected: usize, found: usize },
    #[error("Connectivity has an empty {axis} axis.")]
    EmptyAxis { axis: &'static str },
    #[error(transparent)]
    Partition(#[from] PartitionError),
}

/// Check the first two axes are the same length and match `nodes`.
pub(crate) fn check_square(
    rows: usize,
    cols: usize,
    nodes: usize,
) -> Result<(), ConnectivityError> {
    if rows != cols {
        return Err(ConnectivityError::NotSquare { rows, cols });
    }
    if rows != nodes {
        return Err(ConnectivityError::NodeMismatch {
            expected: nodes,
            found: rows,
        });
    }
    Ok(())
}

pub(crate) fn check_axis(len: usize, axis: &'static str) -> Result<(), ConnectivityError> {
    if len == 0 {
        Err(ConnectivityError::EmptyAxis { axis })
    } else {
        Ok(())
    }
}

/// Overwrite the diagonal (self-connectivity) in place.
pub fn mask_diagonal(mut matrix: ArrayViewMut2<f64>, value: f64) {
    matrix.diag_mut().fill(value);
}

/// A private copy of `matrix` with the diagonal replaced by `value`.
pub fn without_diagonal(matrix: &ArrayView2<f64>, value: f64) -> Array2<f64> {
    let mut owned = matrix.to_owned();
    mask_diagonal(owned.view_mut(), value);
    owned
}

/// Mean of the non-NaN values; NaN if there are none.
pub fn nanmean<'a, I>(values: I) -> f64
where
    I: IntoIterator<Item = &'a f64>,
{
    let (sum, n) = values
        .into_iter()
        .filter(|v| !v.is_nan())
        .fold((0.0, 0usize), |(s, n), v| (s + v, n + 1));
    if n == 0 {
        f64::NAN
    } else {
        sum / n as f64
    }
}

/// Sum of the non-NaN values; zero if there are none.
pub fn nansum<'a, I>(values: I) -> f64
where
    I: IntoIterator<Item = &'a f64>,
{
    values.into_iter().filter(|v| !v.is_nan()).sum()
}

/// Population standard deviation (`ddof = 0`) of the non-NaN values;
/// NaN if there are none.
pub fn nanstd<'a, I>(values: I) -> f64
where
    I: IntoIterator<Item = &'a f64>,
{
    let present: Vec<f64> = values.into_iter().copied().filter(|v| !v.is_nan()).collect();
    if present.is_empty() {
        return f64::NAN;
    }
    let mean = present.iter().sum::<f64>() / present.len() as f64;
    let var = present.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / present.len() as f64;
    var.sqrt()
}

/// NaN-ignoring row sums of a matrix (node strength).
pub fn strength(matrix: &ArrayView2<f64>) -> ndarray::Array1<f64> {
    matrix.map_axis(Axis(1), |row| nansum(row.iter()))
}

/// Scores that come out NaN or infinite (zero degree, empty modules) are
/// reported as 0.
pub(crate) fn finite_or_zero(x: f64) -> f64 {
    if x.is_finite() {
        x
    } else {
        0.0
    }
}

/// Which half of a signed matrix to keep.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sign {
    /// Positive weights as-is; negative weights become 0.
    Positive,
    /// Magnitudes of negative weights; positive weights become 0.
    Negative,
}

/// Split a signed matrix so coefficients can be computed on positive and
/// negative weights separately. NaN is kept.
pub fn signed(matrix: &ArrayView2<f64>, sign: Sign) -> Array2<f64> {
    let mut out = Array2::zeros(matrix.raw_dim());
    Zip::from(&mut out).and(matrix).for_each(|o, &w| {
        *o = match sign {
            _ if w.is_nan() => w,
            Sign::Positive => w.max(0.0),
            Sign::Negative => (-w).max(0.0),
        }
    });
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_nan_reductions() {
        let v = [1.0, f64::NAN, 3.0];
        assert_eq!(nanmean(v.iter()), 2.0);
        assert_eq!(nansum(v.iter()), 4.0);
        assert_eq!(nanstd(v.iter()), 1.0);

        let all_nan = [f64::NAN, f64::NAN];
        assert!(nanmean(all_nan.iter()).is_nan());
        assert_eq!(nansum(all_nan.iter()), 0.0);
        assert!(nanstd(all_nan.iter()).is_nan());
    }

    #[test]
    fn test_without_diagonal_leaves_input_alone() {
        let m = array![[5.0, 1.0], [2.0, 5.0]];
        let masked = without_diagonal(&m.view(), f64::NAN);
        assert!(masked[[0, 0]].is_nan() && masked[[1, 1]].is_nan());
        assert_eq!(masked[[0, 1]], 1.0);
        assert_eq!(m[[0, 0]], 5.0);
    }

    #[test]
    fn test_signed_split() {
        let m = array![[0.0, -0.5], [0.25, f64::NAN]];
        let pos = signed(&m.view(), Sign::Positive);
        let neg = signed(&m.view(), Sign::Negative);
        assert_eq!(pos[[0, 1]], 0.0);
        assert_eq!(pos[[1, 0]], 0.25);
        assert_eq!(neg[[0, 1]], 0.5);
        assert_eq!(neg[[1, 0]], 0.0);
        assert!(pos[[1, 1]].is_nan());
    }

    #[test]
    fn test_check_square() {
        assert!(check_square(3, 3, 3).is_ok());
        assert_eq!(
            check_square(3, 2, 3),
            Err(ConnectivityError::NotSquare { rows: 3, cols: 2 })
        );
        assert_eq!(
            check_square(4, 4, 3),
            Err(ConnectivityError::NodeMismatch {
                expected: 3,
                found: 4
            })
        );
    }
}
