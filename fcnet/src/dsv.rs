//! Read connectivity matrices and network affiliations from delimited text.
//!
//! Matrices are headerless, one row per line. Affiliation files hold one
//! network id per line, one-indexed, in acquisition order.

use std::path::Path;

use csv::ReaderBuilder;
use ndarray::{Array2, Array4, Axis};
use serde_derive::Deserialize;
use thiserror::Error;

use crate::partition::{NetworkAffiliation, PartitionError};

#[derive(Error, Debug)]
pub enum ReadDsvError {
    #[error("Problem reading from path.")]
    FromPath { source: csv::Error },
    #[error("Problem with StringRecord: {source}")]
    StringRecordParseError { source: csv::Error },
    #[error("Matrix file holds no rows.")]
    Empty,
    #[error("Matrix is not square ({rows} x {cols}).")]
    NotSquare { rows: usize, cols: usize },
    #[error("Expected matrices of {expected} nodes, found {found}.")]
    Mismatched { expected: usize, found: usize },
    #[error("{matrices} matrices cannot be split into {tasks} task conditions per subject.")]
    TaskCount { matrices: usize, tasks: usize },
    #[error(transparent)]
    Partition(#[from] PartitionError),
}

/// One line of an affiliation file.
#[derive(Debug, Deserialize, PartialEq)]
pub struct AffiliationRow {
    /// One-indexed network id.
    pub network: usize,
}

fn reader(path: &Path, delimiter: u8) -> Result<csv::Reader<std::fs::File>, ReadDsvError> {
    ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(false)
        .trim(csv::Trim::All)
        .from_path(path)
        .map_err(|s| ReadDsvError::FromPath { source: s })
}

/// Read a square node x node matrix. `nan` and `NaN` cells parse as NaN;
/// rows of unequal length are a record error.
pub fn read_matrix(path: &Path, delimiter: u8) -> Result<Array2<f64>, ReadDsvError> {
    let mut rdr = reader(path, delimiter)?;

    let mut values = Vec::new();
    let mut rows = 0;
    for result in rdr.deserialize() {
        let record: Vec<f64> =
            result.map_err(|s| ReadDsvError::StringRecordParseError { source: s })?;
        values.extend(record);
        rows += 1;
    }
    if rows == 0 {
        return Err(ReadDsvError::Empty);
    }
    let cols = values.len() / rows;
    if rows != cols {
        return Err(ReadDsvError::NotSquare { rows, cols });
    }
    tracing::debug!(path = %path.display(), nodes = rows, "read matrix");

    Array2::from_shape_vec((rows, cols), values)
        .map_err(|_| ReadDsvError::NotSquare { rows, cols })
}

/// Read a one-indexed network affiliation vector.
pub fn read_affiliation(path: &Path, delimiter: u8) -> Result<NetworkAffiliation, ReadDsvError> {
    let mut rdr = reader(path, delimiter)?;

    let mut ids = Vec::new();
    for result in rdr.deserialize() {
        let record: AffiliationRow =
            result.map_err(|s| ReadDsvError::StringRecordParseError { source: s })?;
        ids.push(record.network);
    }
    let affiliation = NetworkAffiliation::from_one_indexed(&ids)?;
    tracing::debug!(
        path = %path.display(),
        nodes = affiliation.len(),
        networks = affiliation.num_nets(),
        "read affiliation"
    );
    Ok(affiliation)
}

/// Stack matrices into a node x node x task x subject tensor.
///
/// `matrices` are subject-major: every task condition of the first subject,
/// then every task condition of the second, and so on.
pub fn stack_tensor(matrices: &[Array2<f64>], tasks: usize) -> Result<Array4<f64>, ReadDsvError> {
    if tasks == 0 || matrices.is_empty() || matrices.len() % tasks != 0 {
        return Err(ReadDsvError::TaskCount {
            matrices: matrices.len(),
            tasks,
        });
    }
    let nodes = matrices[0].nrows();
    let subjects = matrices.len() / tasks;

    let mut tensor = Array4::zeros((nodes, nodes, tasks, subjects));
    for (i, matrix) in matrices.iter().enumerate() {
        if matrix.dim() != (nodes, nodes) {
            return Err(ReadDsvError::Mismatched {
                expected: nodes,
                found: matrix.nrows(),
            });
        }
        tensor
            .index_axis_mut(Axis(3), i / tasks)
            .index_axis_mut(Axis(2), i % tasks)
            .assign(matrix);
    }
    Ok(tensor)
}
