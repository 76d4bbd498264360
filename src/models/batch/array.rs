//! Homogeneous array batches backed by `ndarray`.
//!
//! Axis 0 is the row axis. One-dimensional arrays and `(N, 1)` arrays hold a
//! single unnamed column exposed as [`TENSOR_COLUMN_NAME`]; `(N, K)` arrays
//! expose columns named by their index.

use super::{Batch, BatchAdapter};
use crate::models::{PredictorError, Record, Result, Value};
use ndarray::{ArrayD, Axis, IxDyn, Slice};
use std::collections::BTreeSet;

/// Column name used for the single column of a 1-D or `(N, 1)` array.
pub const TENSOR_COLUMN_NAME: &str = "__value__";

/// Shape of an array batch once its rank has been checked.
enum ArrayShape {
    /// One value per row
    Single(usize),
    /// `rows x cols` with `cols > 1`
    Wide(usize, usize),
}

fn shape_of(array: &ArrayD<Value>) -> Result<ArrayShape> {
    match array.shape() {
        [rows] => Ok(ArrayShape::Single(*rows)),
        [rows, 1] => Ok(ArrayShape::Single(*rows)),
        [rows, cols] => Ok(ArrayShape::Wide(*rows, *cols)),
        shape => Err(PredictorError::prediction(format!(
            "array batch must be 1-D or 2-D, got shape {shape:?}; row count is ambiguous"
        ))),
    }
}

impl BatchAdapter for ArrayD<Value> {
    fn num_rows(&self) -> Result<usize> {
        match shape_of(self)? {
            ArrayShape::Single(rows) | ArrayShape::Wide(rows, _) => Ok(rows),
        }
    }

    fn column_names(&self) -> Vec<String> {
        match shape_of(self) {
            Ok(ArrayShape::Single(_)) => vec![TENSOR_COLUMN_NAME.to_string()],
            Ok(ArrayShape::Wide(_, cols)) => (0..cols).map(|c| c.to_string()).collect(),
            Err(_) => Vec::new(),
        }
    }

    fn records(&self) -> Result<Vec<Record>> {
        let names = self.column_names();
        let rows = self.num_rows()?;
        let mut records = Vec::with_capacity(rows);
        for row in self.axis_iter(Axis(0)) {
            let record = names.iter().cloned().zip(row.iter().cloned()).collect();
            records.push(record);
        }
        Ok(records)
    }

    fn column_values(&self, name: &str) -> Result<Option<Vec<Value>>> {
        let index = match shape_of(self)? {
            ArrayShape::Single(_) if name == TENSOR_COLUMN_NAME => 0,
            ArrayShape::Wide(_, cols) => match name.parse::<usize>() {
                Ok(idx) if idx < cols => idx,
                _ => return Ok(None),
            },
            ArrayShape::Single(_) => return Ok(None),
        };
        let values = if self.ndim() == 1 {
            self.iter().cloned().collect()
        } else {
            self.index_axis(Axis(1), index).iter().cloned().collect()
        };
        Ok(Some(values))
    }

    fn slice_rows(&self, offset: usize, len: usize) -> Batch {
        let rows = self.len_of(Axis(0));
        let end = (offset + len).min(rows);
        let start = offset.min(end);
        Batch::Array(self.slice_axis(Axis(0), Slice::from(start..end)).to_owned())
    }
}

/// Build an output array from pipeline records.
///
/// A single output key yields a 1-D array; several keys yield a `(N, K)`
/// array with keys in sorted order and nulls for missing entries.
pub(super) fn from_records(records: &[Record]) -> Result<ArrayD<Value>> {
    let keys: BTreeSet<&String> = records.iter().flat_map(|r| r.keys()).collect();
    let shape_error = |e: ndarray::ShapeError| {
        PredictorError::Internal(format!("assembling array predictions: {e}"))
    };

    if keys.len() == 1 {
        let values: Vec<Value> = records
            .iter()
            .map(|r| r.values().next().cloned().unwrap_or_default())
            .collect();
        return ArrayD::from_shape_vec(IxDyn(&[values.len()]), values).map_err(shape_error);
    }

    let mut values = Vec::with_capacity(records.len() * keys.len());
    for record in records {
        values.extend(keys.iter().map(|k| record.get(*k).cloned().unwrap_or_default()));
    }
    ArrayD::from_shape_vec(IxDyn(&[records.len(), keys.len()]), values).map_err(shape_error)
}

/// Stack arrays along the row axis.
pub(super) fn concat(arrays: &[&ArrayD<Value>]) -> Result<ArrayD<Value>> {
    let views: Vec<_> = arrays.iter().map(|a| a.view()).collect();
    ndarray::concatenate(Axis(0), &views).map_err(|e| {
        PredictorError::prediction(format!("cannot concatenate array batches: {e}"))
    })
}
