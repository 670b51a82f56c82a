//! Participation coefficient (Guimera & Amaral, 2005).
//!
//! How evenly a node's connection strength is spread over the modules of
//! the partition. 0 means every edge stays inside one module.
//!
//! Signed matrices should be split first with
//! [`signed`](crate::connectivity::signed) and each half scored separately.

use ndarray::{Array1, Array2, ArrayView2, Axis};

use crate::connectivity::{
    check_square, finite_or_zero, strength, without_diagonal, ConnectivityError,
};
use crate::partition::NetworkAffiliation;

/// node x module strength: the NaN-ignoring sum of each node's weights to
/// the nodes of every module.
pub fn module_strength(matrix: &ArrayView2<f64>, affiliation: &NetworkAffiliation) -> Array2<f64> {
    let mut k = Array2::zeros((matrix.nrows(), affiliation.num_nets()));
    for (node, row) in matrix.axis_iter(Axis(0)).enumerate() {
        for (&module, &w) in affiliation.ids().iter().zip(row.iter()) {
            if !w.is_nan() {
                k[[node, module]] += w;
            }
        }
    }
    k
}

/// Participation coefficient of each node.
///
/// `matrix` is node x node, sorted to match `affiliation`. The diagonal is
/// ignored. Nodes with zero strength score 0.
pub fn participation_coefficient(
    matrix: &ArrayView2<f64>,
    affiliation: &NetworkAffiliation,
) -> Result<Array1<f64>, ConnectivityError> {
    check_square(matrix.nrows(), matrix.ncols(), affiliation.len())?;
    let matrix = without_diagonal(matrix, 0.0);

    let degree = strength(&matrix.view());
    let k = module_strength(&matrix.view(), affiliation);
    let spread = k.mapv(|x| x * x).sum_axis(Axis(1));

    Ok(Array1::from_shape_fn(degree.len(), |i| {
        if degree[i] == 0.0 {
            0.0
        } else {
            finite_or_zero(1.0 - spread[i] / (degree[i] * degree[i]))
        }
    }))
}
