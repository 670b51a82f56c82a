//! Gateway coefficient (Vargas & Wahl, 2014).
//!
//! Like the participation coefficient, but each module's share of a node's
//! strength is down-weighted by how much of the connectivity into that
//! module the node carries, and by how central the node's neighbours in
//! that module are. A node that is the only route from its module to
//! another scores highly.

use ndarray::{Array1, Array2, ArrayView2, Axis};

use crate::centrality::Centrality;
use crate::connectivity::{
    check_square, finite_or_zero, nansum, strength, without_diagonal, ConnectivityError,
};
use crate::participation::module_strength;
use crate::partition::NetworkAffiliation;

/// Gateway coefficient of each node, weighting by `centrality`
/// ([`NodeStrength`](crate::centrality::NodeStrength) in the usual
/// formulation).
///
/// `matrix` is node x node, sorted to match `affiliation`; use it on one sign
/// of weights at a time. The diagonal is ignored. Any division by zero
/// along the way counts as 0, and nodes with zero strength score 0.
pub fn gateway_coefficient<C: Centrality + ?Sized>(
    matrix: &ArrayView2<f64>,
    affiliation: &NetworkAffiliation,
    centrality: &C,
) -> Result<Array1<f64>, ConnectivityError> {
    check_square(matrix.nrows(), matrix.ncols(), affiliation.len())?;
    let matrix = without_diagonal(matrix, 0.0);
    let nodes = matrix.nrows();
    let modules = affiliation.num_nets();

    let degree = strength(&matrix.view());
    let k = module_strength(&matrix.view(), affiliation);
    let cent = centrality.centrality(&matrix.view());

    let members: Vec<Vec<usize>> = (0..modules)
        .map(|m| affiliation.members(m).collect())
        .collect();

    let max_summed = members
        .iter()
        .map(|ms| nansum(ms.iter().map(|&j| &cent[j])))
        .fold(0.0, f64::max);

    // strength of each module towards every module; the own-module total
    // counts each edge twice
    let mut k_module = Array2::<f64>::zeros((nodes, modules));
    for (m, nodes_in) in members.iter().enumerate() {
        if nodes_in.len() < 2 {
            continue;
        }
        let total = k.select(Axis(0), nodes_in).sum_axis(Axis(0));
        for &i in nodes_in {
            k_module.row_mut(i).assign(&total);
            k_module[[i, m]] /= 2.0;
        }
    }

    // summed centrality of each node's positive neighbours, per module
    let mut c = Array2::<f64>::zeros((nodes, modules));
    for i in 0..nodes {
        if degree[i] <= 0.0 {
            continue;
        }
        for (j, &w) in matrix.column(i).iter().enumerate() {
            if w > 0.0 && !cent[j].is_nan() {
                c[[i, affiliation.ids()[j]]] += cent[j];
            }
        }
    }

    Ok(Array1::from_shape_fn(nodes, |i| {
        if degree[i] == 0.0 {
            return 0.0;
        }
        let weighted: f64 = (0..modules)
            .map(|m| {
                let kappa = finite_or_zero(k[[i, m]] / k_module[[i, m]]);
                let c_norm = finite_or_zero(c[[i, m]] / max_summed);
                let share = k[[i, m]] / degree[i];
                share * share * (1.0 - kappa * c_norm).powi(2)
            })
            .filter(|x| !x.is_nan())
            .sum();
        finite_or_zero(1.0 - weighted)
    }))
}
