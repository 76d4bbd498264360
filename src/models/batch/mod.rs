//! Batch representations accepted by predictors.
//!
//! A batch is one of a closed set of structural families. Each family has an
//! adapter that normalizes it into canonical row records; predictors only
//! ever see records, and build their output back into the input's family.
//!
//! - K_i: A batch has a well-defined row count or is rejected
//! - B_i: Row count may be ambiguous (ragged columns, rank > 2) → Result

mod array;
mod columns;
mod frame;
mod table;

pub use array::TENSOR_COLUMN_NAME;
pub use columns::Columns;
pub use frame::DataFrame;
pub use table::table_from_columns;

use crate::models::{PredictorError, Record, Result, Value};
use arrow::record_batch::RecordBatch;
use ndarray::{Array1, ArrayD};

/// Structural family of a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BatchFormat {
    /// Homogeneous `ndarray` array, rows on axis 0
    Array,
    /// Named-column [`DataFrame`]
    Frame,
    /// Mapping from column name to column values
    Columns,
    /// Arrow record batch
    Table,
}

impl std::fmt::Display for BatchFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Array => "array",
            Self::Frame => "frame",
            Self::Columns => "columns",
            Self::Table => "table",
        };
        f.write_str(name)
    }
}

/// Normalizes one batch family into canonical rows.
///
/// Adding a representation means adding one implementation of this trait and
/// one arm in [`Batch::adapter`].
pub(crate) trait BatchAdapter {
    /// Number of rows, or an error if it cannot be determined unambiguously.
    fn num_rows(&self) -> Result<usize>;

    /// Column names in the adapter's natural order.
    fn column_names(&self) -> Vec<String>;

    /// Row-major records, one per row.
    fn records(&self) -> Result<Vec<Record>>;

    /// Values of a single column, `None` if absent.
    fn column_values(&self, name: &str) -> Result<Option<Vec<Value>>>;

    /// Copy of rows `offset..offset + len`, clamped to the batch.
    fn slice_rows(&self, offset: usize, len: usize) -> Batch;
}

/// A batch of input rows in one of several interchangeable representations.
#[derive(Debug, Clone, PartialEq)]
pub enum Batch {
    Array(ArrayD<Value>),
    Frame(DataFrame),
    Columns(Columns),
    Table(RecordBatch),
}

impl Batch {
    /// One-dimensional array batch from values.
    pub fn array<I, V>(values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        let values: Array1<Value> = values.into_iter().map(Into::into).collect();
        Self::Array(values.into_dyn())
    }

    /// Single-column mapping batch.
    pub fn column<I, V>(name: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        let mut columns = Columns::new();
        columns.insert(name.into(), values.into_iter().map(Into::into).collect());
        Self::Columns(columns)
    }

    pub fn format(&self) -> BatchFormat {
        match self {
            Self::Array(_) => BatchFormat::Array,
            Self::Frame(_) => BatchFormat::Frame,
            Self::Columns(_) => BatchFormat::Columns,
            Self::Table(_) => BatchFormat::Table,
        }
    }

    pub(crate) fn adapter(&self) -> &dyn BatchAdapter {
        match self {
            Self::Array(a) => a,
            Self::Frame(f) => f,
            Self::Columns(c) => c,
            Self::Table(t) => t,
        }
    }

    /// Number of rows in the batch.
    ///
    /// B_i(row count is unambiguous) → Result
    pub fn num_rows(&self) -> Result<usize> {
        self.adapter().num_rows()
    }

    pub fn column_names(&self) -> Vec<String> {
        self.adapter().column_names()
    }

    /// Canonical row-major view of the batch.
    pub fn to_records(&self) -> Result<Vec<Record>> {
        let records = self.adapter().records()?;
        let expected = self.num_rows()?;
        if records.len() != expected {
            return Err(PredictorError::Internal(format!(
                "{} adapter produced {} records for {expected} rows",
                self.format(),
                records.len()
            )));
        }
        Ok(records)
    }

    /// Values of one column, `None` if the batch has no such column.
    pub fn column_values(&self, name: &str) -> Result<Option<Vec<Value>>> {
        self.adapter().column_values(name)
    }

    /// Copy of rows `offset..offset + len`, clamped to the batch.
    pub fn slice(&self, offset: usize, len: usize) -> Batch {
        self.adapter().slice_rows(offset, len)
    }

    /// Build a batch of the given family from output records.
    pub fn from_records(format: BatchFormat, records: &[Record]) -> Result<Batch> {
        Ok(match format {
            BatchFormat::Array => Batch::Array(array::from_records(records)?),
            BatchFormat::Frame => Batch::Frame(DataFrame::from_records(records)),
            BatchFormat::Columns => Batch::Columns(columns::from_records(records)),
            BatchFormat::Table => Batch::Table(table::from_records(records)?),
        })
    }

    /// Stack batches of one family vertically, preserving order.
    ///
    /// Zero-row parts carry no rows and may carry no columns either (an empty
    /// partition predicts to an empty output), so they are skipped whenever
    /// some part has rows.
    pub fn concat(batches: &[Batch]) -> Result<Batch> {
        let Some(first) = batches.first() else {
            return Err(PredictorError::prediction("cannot concatenate zero batches"));
        };
        let format = first.format();
        if let Some(other) = batches.iter().find(|b| b.format() != format) {
            return Err(PredictorError::prediction(format!(
                "cannot concatenate {format} batch with {} batch",
                other.format()
            )));
        }

        let mut parts = Vec::with_capacity(batches.len());
        for batch in batches {
            if batch.num_rows()? > 0 {
                parts.push(batch);
            }
        }
        if parts.is_empty() {
            return Ok(first.clone());
        }

        Ok(match format {
            BatchFormat::Array => {
                let arrays: Vec<_> = parts
                    .iter()
                    .filter_map(|b| match b {
                        Batch::Array(a) => Some(a),
                        _ => None,
                    })
                    .collect();
                Batch::Array(array::concat(&arrays)?)
            }
            BatchFormat::Frame => {
                let frames: Vec<DataFrame> = parts
                    .iter()
                    .filter_map(|b| match b {
                        Batch::Frame(f) => Some(f.clone()),
                        _ => None,
                    })
                    .collect();
                Batch::Frame(DataFrame::concat(&frames)?)
            }
            BatchFormat::Columns => {
                let maps: Vec<_> = parts
                    .iter()
                    .filter_map(|b| match b {
                        Batch::Columns(c) => Some(c),
                        _ => None,
                    })
                    .collect();
                Batch::Columns(columns::concat(&maps)?)
            }
            BatchFormat::Table => {
                let tables: Vec<_> = parts
                    .iter()
                    .filter_map(|b| match b {
                        Batch::Table(t) => Some(t),
                        _ => None,
                    })
                    .collect();
                Batch::Table(table::concat(&tables)?)
            }
        })
    }

    /// Append named columns (e.g. passthrough inputs) to a batch.
    ///
    /// Array batches have no named columns and reject this.
    pub fn with_columns(self, extra: Vec<(String, Vec<Value>)>) -> Result<Batch> {
        if extra.is_empty() {
            return Ok(self);
        }
        match self {
            Batch::Array(_) => Err(PredictorError::prediction(
                "cannot attach named columns to an array batch",
            )),
            Batch::Frame(mut frame) => {
                for (name, values) in extra {
                    frame.push_column(name, values)?;
                }
                Ok(Batch::Frame(frame))
            }
            Batch::Columns(mut columns) => {
                for (name, values) in extra {
                    if columns.contains_key(&name) {
                        return Err(PredictorError::prediction(format!(
                            "column '{name}' already exists in predictions"
                        )));
                    }
                    columns.insert(name, values);
                }
                Ok(Batch::Columns(columns))
            }
            Batch::Table(t) => Ok(Batch::Table(table::with_columns(&t, extra)?)),
        }
    }
}

impl From<ArrayD<Value>> for Batch {
    fn from(array: ArrayD<Value>) -> Self {
        Self::Array(array)
    }
}

impl From<DataFrame> for Batch {
    fn from(frame: DataFrame) -> Self {
        Self::Frame(frame)
    }
}

impl From<Columns> for Batch {
    fn from(columns: Columns) -> Self {
        Self::Columns(columns)
    }
}

impl From<RecordBatch> for Batch {
    fn from(table: RecordBatch) -> Self {
        Self::Table(table)
    }
}
