//! Tabular frame with named, equally sized columns.

use super::{Batch, BatchAdapter};
use crate::models::{PredictorError, Record, Result, Value};
use std::collections::BTreeSet;

/// Column-major table with named columns.
///
/// K_i: Every column has exactly `num_rows` values.
/// K_i: Column names are unique.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DataFrame {
    names: Vec<String>,
    columns: Vec<Vec<Value>>,
    num_rows: usize,
}

impl DataFrame {
    /// Build a frame from `(name, values)` pairs.
    ///
    /// B_i(columns are equally sized and uniquely named) → Result
    pub fn new(columns: Vec<(String, Vec<Value>)>) -> Result<Self> {
        let num_rows = columns.first().map_or(0, |(_, values)| values.len());
        let mut frame = Self {
            names: Vec::with_capacity(columns.len()),
            columns: Vec::with_capacity(columns.len()),
            num_rows,
        };
        for (name, values) in columns {
            frame.push_column(name, values)?;
        }
        Ok(frame)
    }

    /// Build a single-column frame.
    pub fn from_column<I, V>(name: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        let values: Vec<Value> = values.into_iter().map(Into::into).collect();
        Self {
            num_rows: values.len(),
            names: vec![name.into()],
            columns: vec![values],
        }
    }

    /// Build an empty frame that still carries a row count.
    pub fn with_num_rows(num_rows: usize) -> Self {
        Self {
            names: Vec::new(),
            columns: Vec::new(),
            num_rows,
        }
    }

    pub fn num_rows(&self) -> usize {
        self.num_rows
    }

    pub fn num_columns(&self) -> usize {
        self.names.len()
    }

    pub fn column_names(&self) -> &[String] {
        &self.names
    }

    /// Look up a column by name.
    pub fn column(&self, name: &str) -> Option<&[Value]> {
        self.names
            .iter()
            .position(|n| n == name)
            .map(|idx| self.columns[idx].as_slice())
    }

    /// Iterate `(name, values)` pairs in column order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[Value])> {
        self.names
            .iter()
            .map(String::as_str)
            .zip(self.columns.iter().map(Vec::as_slice))
    }

    /// Append a column, checking length and name uniqueness.
    pub fn push_column(&mut self, name: impl Into<String>, values: Vec<Value>) -> Result<()> {
        let name = name.into();
        if self.names.contains(&name) {
            return Err(PredictorError::prediction(format!(
                "duplicate column '{name}' in frame"
            )));
        }
        if values.len() != self.num_rows {
            return Err(PredictorError::prediction(format!(
                "column '{name}' has {} rows, expected {}",
                values.len(),
                self.num_rows
            )));
        }
        self.names.push(name);
        self.columns.push(values);
        Ok(())
    }

    /// Copy rows `offset..offset + len`.
    pub fn slice(&self, offset: usize, len: usize) -> Self {
        let end = (offset + len).min(self.num_rows);
        let start = offset.min(end);
        Self {
            names: self.names.clone(),
            columns: self
                .columns
                .iter()
                .map(|values| values[start..end].to_vec())
                .collect(),
            num_rows: end - start,
        }
    }

    /// Stack frames with identical column names vertically.
    pub fn concat(frames: &[DataFrame]) -> Result<Self> {
        let Some(first) = frames.first() else {
            return Ok(Self::default());
        };
        let mut out = Self {
            names: first.names.clone(),
            columns: vec![Vec::new(); first.names.len()],
            num_rows: 0,
        };
        for frame in frames {
            if frame.names != out.names {
                return Err(PredictorError::prediction(format!(
                    "cannot concatenate frames with columns {:?} and {:?}",
                    out.names, frame.names
                )));
            }
            for (dst, src) in out.columns.iter_mut().zip(&frame.columns) {
                dst.extend_from_slice(src);
            }
            out.num_rows += frame.num_rows;
        }
        Ok(out)
    }

    /// Build a frame from output records; columns are the sorted union of keys.
    pub fn from_records(records: &[Record]) -> Self {
        let keys: BTreeSet<&String> = records.iter().flat_map(|r| r.keys()).collect();
        let mut frame = Self::with_num_rows(records.len());
        for key in keys {
            let values = records
                .iter()
                .map(|r| r.get(key).cloned().unwrap_or_default())
                .collect();
            frame.names.push(key.clone());
            frame.columns.push(values);
        }
        frame
    }
}

impl BatchAdapter for DataFrame {
    fn num_rows(&self) -> Result<usize> {
        Ok(self.num_rows)
    }

    fn column_names(&self) -> Vec<String> {
        self.names.clone()
    }

    fn records(&self) -> Result<Vec<Record>> {
        Ok((0..self.num_rows)
            .map(|row| {
                self.iter()
                    .map(|(name, values)| (name.to_string(), values[row].clone()))
                    .collect()
            })
            .collect())
    }

    fn column_values(&self, name: &str) -> Result<Option<Vec<Value>>> {
        Ok(self.column(name).map(<[Value]>::to_vec))
    }

    fn slice_rows(&self, offset: usize, len: usize) -> Batch {
        Batch::Frame(self.slice(offset, len))
    }
}
