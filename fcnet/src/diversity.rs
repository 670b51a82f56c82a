//! Shannon diversity coefficient (Rubinov & Sporns, 2011).
//!
//! The entropy of a node's strength distribution over modules, normalised
//! by `ln(modules)` so it runs from 0 (all strength in one module) to 1
//! (spread evenly over every module).

use ndarray::{Array1, ArrayView2, Axis};

use crate::connectivity::{
    check_square, finite_or_zero, strength, without_diagonal, ConnectivityError,
};
use crate::participation::module_strength;
use crate::partition::NetworkAffiliation;

/// Diversity coefficient of each node.
///
/// `matrix` is node x node, sorted to match `affiliation`; use it on one sign
/// of weights at a time. The diagonal is ignored.
pub fn diversity_coefficient(
    matrix: &ArrayView2<f64>,
    affiliation: &NetworkAffiliation,
) -> Result<Array1<f64>, ConnectivityError> {
    check_square(matrix.nrows(), matrix.ncols(), affiliation.len())?;
    let matrix = without_diagonal(matrix, 0.0);
    let modules = affiliation.num_nets() as f64;

    let degree = strength(&matrix.view());
    let k = module_strength(&matrix.view(), affiliation);

    let entropy = k
        .axis_iter(Axis(0))
        .zip(degree.iter())
        .map(|(row, &d)| {
            row.iter()
                .map(|&km| {
                    let p = km / d;
                    // empty modules contribute nothing: ln(1) = 0
                    let p = if p.is_nan() || p == 0.0 { 1.0 } else { p };
                    p * p.ln()
                })
                .sum::<f64>()
        });

    Ok(entropy
        .map(|h| finite_or_zero(-h / modules.ln()))
        .collect())
}
