//! Which network does each node connect to most strongly?

use ndarray::{Array1, ArrayView1, ArrayView2, Axis};

/// The network with the largest clustered connectivity for one node, and
/// that connectivity.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Preference {
    pub network: usize,
    pub value: f64,
}

/// Scan left to right keeping the first strict maximum, so ties go to the
/// lowest network index. NaN is skipped.
///
/// `own` is the network the node is assigned to. If the node's window onto
/// its own network is NaN (a singleton network once the diagonal is
/// masked), there is nothing to compare against and the node keeps its own
/// network, with a NaN value.
pub fn preferred_network(row: &ArrayView1<f64>, own: usize) -> Preference {
    if row[own].is_nan() {
        return Preference {
            network: own,
            value: f64::NAN,
        };
    }
    row.iter().enumerate().fold(
        Preference {
            network: own,
            value: f64::NAN,
        },
        |best, (network, &value)| {
            if !value.is_nan() && (best.value.is_nan() || value > best.value) {
                Preference { network, value }
            } else {
                best
            }
        },
    )
}

/// Preferences for every row of a node x network matrix, as
/// `(values, networks)`. `own` holds the network of each row's node.
pub fn preferences(clustered: &ArrayView2<f64>, own: &[usize]) -> (Array1<f64>, Array1<usize>) {
    let prefs: Vec<Preference> = clustered
        .axis_iter(Axis(0))
        .zip(own)
        .map(|(row, &network)| preferred_network(&row, network))
        .collect();
    (
        prefs.iter().map(|p| p.value).collect(),
        prefs.iter().map(|p| p.network).collect(),
    )
}
