//! Mapping-of-columns batches.

use super::{Batch, BatchAdapter};
use crate::models::{PredictorError, Record, Result, Value};
use std::collections::{BTreeMap, BTreeSet};

/// Column name → column values.
pub type Columns = BTreeMap<String, Vec<Value>>;

impl BatchAdapter for Columns {
    /// Row count shared by every column; an empty mapping has zero rows.
    fn num_rows(&self) -> Result<usize> {
        let mut lengths = self.iter().map(|(name, values)| (name, values.len()));
        let Some((_, expected)) = lengths.next() else {
            return Ok(0);
        };
        for (name, len) in lengths {
            if len != expected {
                return Err(PredictorError::prediction(format!(
                    "column '{name}' has {len} rows but other columns have {expected}; \
                     row count is ambiguous"
                )));
            }
        }
        Ok(expected)
    }

    fn column_names(&self) -> Vec<String> {
        self.keys().cloned().collect()
    }

    fn records(&self) -> Result<Vec<Record>> {
        let rows = self.num_rows()?;
        Ok((0..rows)
            .map(|row| {
                self.iter()
                    .map(|(name, values)| (name.clone(), values[row].clone()))
                    .collect()
            })
            .collect())
    }

    fn column_values(&self, name: &str) -> Result<Option<Vec<Value>>> {
        Ok(self.get(name).cloned())
    }

    fn slice_rows(&self, offset: usize, len: usize) -> Batch {
        let sliced = self
            .iter()
            .map(|(name, values)| {
                let end = (offset + len).min(values.len());
                let start = offset.min(end);
                (name.clone(), values[start..end].to_vec())
            })
            .collect();
        Batch::Columns(sliced)
    }
}

pub(super) fn from_records(records: &[Record]) -> Columns {
    let keys: BTreeSet<&String> = records.iter().flat_map(|r| r.keys()).collect();
    keys.into_iter()
        .map(|key| {
            let values = records
                .iter()
                .map(|r| r.get(key).cloned().unwrap_or_default())
                .collect();
            (key.clone(), values)
        })
        .collect()
}

pub(super) fn concat(parts: &[&Columns]) -> Result<Columns> {
    let Some(first) = parts.first() else {
        return Ok(Columns::new());
    };
    let names: Vec<&String> = first.keys().collect();
    let mut out: Columns = first.keys().map(|k| (k.clone(), Vec::new())).collect();
    for part in parts {
        if part.keys().collect::<Vec<_>>() != names {
            return Err(PredictorError::prediction(
                "cannot concatenate column mappings with different keys",
            ));
        }
        for (name, values) in part.iter() {
            if let Some(dst) = out.get_mut(name) {
                dst.extend_from_slice(values);
            }
        }
    }
    Ok(out)
}
