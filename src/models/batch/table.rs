//! Arrow `RecordBatch` tables.
//!
//! Supported column types: Utf8, LargeUtf8, Int32, Int64, Float32, Float64,
//! Boolean and Null. Anything else is rejected as a prediction error.

use super::{Batch, BatchAdapter};
use crate::models::{PredictorError, Record, Result, Value};
use arrow::array::{
    Array, ArrayRef, BooleanArray, Float32Array, Float64Array, Int32Array, Int64Array,
    LargeStringArray, NullArray, StringArray,
};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::{RecordBatch, RecordBatchOptions};
use std::collections::BTreeSet;
use std::sync::Arc;

/// Convert one Arrow column into cell values.
fn column_to_values(name: &str, column: &ArrayRef) -> Result<Vec<Value>> {
    let any = column.as_any();
    let len = column.len();
    let mut values = Vec::with_capacity(len);

    macro_rules! collect {
        ($ty:ty, $map:expr) => {{
            let arr = any
                .downcast_ref::<$ty>()
                .ok_or_else(|| PredictorError::Internal(format!("column '{name}' downcast")))?;
            for i in 0..len {
                values.push(if arr.is_null(i) {
                    Value::Null
                } else {
                    $map(arr.value(i))
                });
            }
        }};
    }

    match column.data_type() {
        DataType::Utf8 => collect!(StringArray, |v: &str| Value::Str(v.to_string())),
        DataType::LargeUtf8 => collect!(LargeStringArray, |v: &str| Value::Str(v.to_string())),
        DataType::Int32 => collect!(Int32Array, |v: i32| Value::Int(i64::from(v))),
        DataType::Int64 => collect!(Int64Array, Value::Int),
        DataType::Float32 => collect!(Float32Array, |v: f32| Value::Float(f64::from(v))),
        DataType::Float64 => collect!(Float64Array, Value::Float),
        DataType::Boolean => collect!(BooleanArray, Value::Bool),
        DataType::Null => values.resize(len, Value::Null),
        other => {
            return Err(PredictorError::prediction(format!(
                "unsupported column type {other:?} for column '{name}'"
            )))
        }
    }
    Ok(values)
}

/// Convert cell values into the narrowest Arrow array that holds them.
///
/// Mixed columns fall back to their string rendering.
fn values_to_array(values: &[Value]) -> ArrayRef {
    let non_null: Vec<&Value> = values.iter().filter(|v| !v.is_null()).collect();

    if non_null.is_empty() {
        return Arc::new(NullArray::new(values.len()));
    }
    if non_null.iter().all(|v| matches!(v, Value::Int(_))) {
        let ints: Vec<Option<i64>> = values
            .iter()
            .map(|v| match v {
                Value::Int(i) => Some(*i),
                _ => None,
            })
            .collect();
        return Arc::new(Int64Array::from(ints));
    }
    if non_null.iter().all(|v| matches!(v, Value::Int(_) | Value::Float(_))) {
        let floats: Vec<Option<f64>> = values.iter().map(Value::as_f64).collect();
        return Arc::new(Float64Array::from(floats));
    }
    if non_null.iter().all(|v| matches!(v, Value::Bool(_))) {
        let bools: Vec<Option<bool>> = values
            .iter()
            .map(|v| match v {
                Value::Bool(b) => Some(*b),
                _ => None,
            })
            .collect();
        return Arc::new(BooleanArray::from(bools));
    }
    let strings: Vec<Option<String>> = values
        .iter()
        .map(|v| (!v.is_null()).then(|| v.to_string()))
        .collect();
    Arc::new(StringArray::from(strings))
}

/// Build a record batch from named columns, keeping the row count even when
/// there are no columns.
pub fn table_from_columns(columns: Vec<(String, Vec<Value>)>, num_rows: usize) -> Result<RecordBatch> {
    let mut fields = Vec::with_capacity(columns.len());
    let mut arrays = Vec::with_capacity(columns.len());
    for (name, values) in columns {
        let array = values_to_array(&values);
        fields.push(Field::new(name, array.data_type().clone(), true));
        arrays.push(array);
    }
    let options = RecordBatchOptions::new().with_row_count(Some(num_rows));
    RecordBatch::try_new_with_options(Arc::new(Schema::new(fields)), arrays, &options)
        .map_err(|e| PredictorError::prediction(format!("building record batch: {e}")))
}

impl BatchAdapter for RecordBatch {
    fn num_rows(&self) -> Result<usize> {
        Ok(RecordBatch::num_rows(self))
    }

    fn column_names(&self) -> Vec<String> {
        self.schema()
            .fields()
            .iter()
            .map(|f| f.name().clone())
            .collect()
    }

    fn records(&self) -> Result<Vec<Record>> {
        let names = BatchAdapter::column_names(self);
        let columns = names
            .iter()
            .zip(self.columns())
            .map(|(name, column)| column_to_values(name, column))
            .collect::<Result<Vec<_>>>()?;

        Ok((0..RecordBatch::num_rows(self))
            .map(|row| {
                names
                    .iter()
                    .zip(&columns)
                    .map(|(name, values)| (name.clone(), values[row].clone()))
                    .collect()
            })
            .collect())
    }

    fn column_values(&self, name: &str) -> Result<Option<Vec<Value>>> {
        self.column_by_name(name)
            .map(|column| column_to_values(name, column))
            .transpose()
    }

    fn slice_rows(&self, offset: usize, len: usize) -> Batch {
        let rows = RecordBatch::num_rows(self);
        let start = offset.min(rows);
        let len = len.min(rows - start);
        Batch::Table(self.slice(start, len))
    }
}

pub(super) fn from_records(records: &[Record]) -> Result<RecordBatch> {
    let keys: BTreeSet<&String> = records.iter().flat_map(|r| r.keys()).collect();
    let columns = keys
        .into_iter()
        .map(|key| {
            let values = records
                .iter()
                .map(|r| r.get(key).cloned().unwrap_or_default())
                .collect();
            (key.clone(), values)
        })
        .collect();
    table_from_columns(columns, records.len())
}

/// Common type of one column seen with two types in different parts.
///
/// Null columns take the other side's type, integers widen to floats, and
/// anything else falls back to strings.
fn widen(a: &DataType, b: &DataType) -> DataType {
    match (a, b) {
        (a, b) if a == b => a.clone(),
        (DataType::Null, other) | (other, DataType::Null) => other.clone(),
        (DataType::Int32 | DataType::Int64, DataType::Float32 | DataType::Float64)
        | (DataType::Float32 | DataType::Float64, DataType::Int32 | DataType::Int64)
        | (DataType::Float32, DataType::Float64)
        | (DataType::Float64, DataType::Float32) => DataType::Float64,
        (DataType::Int32, DataType::Int64) | (DataType::Int64, DataType::Int32) => DataType::Int64,
        _ => DataType::Utf8,
    }
}

/// Schema every part can be cast into: same column names in the same order,
/// each typed with the widest type seen for it.
fn unified_schema(tables: &[&RecordBatch]) -> Result<Arc<Schema>> {
    let first = tables[0].schema();
    let mut fields: Vec<Field> = first.fields().iter().map(|f| (**f).clone()).collect();
    for table in &tables[1..] {
        let schema = table.schema();
        let names: Vec<&String> = schema.fields().iter().map(|f| f.name()).collect();
        if names.len() != fields.len() || names.iter().zip(&fields).any(|(n, f)| *n != f.name()) {
            return Err(PredictorError::prediction(format!(
                "cannot concatenate tables with columns {:?} and {names:?}",
                fields.iter().map(|f| f.name()).collect::<Vec<_>>()
            )));
        }
        for (field, other) in fields.iter_mut().zip(schema.fields()) {
            let data_type = widen(field.data_type(), other.data_type());
            let nullable = field.is_nullable() || other.is_nullable() || data_type != *other.data_type();
            *field = field.clone().with_data_type(data_type).with_nullable(nullable);
        }
    }
    Ok(Arc::new(Schema::new(fields)))
}

pub(super) fn concat(tables: &[&RecordBatch]) -> Result<RecordBatch> {
    if tables.is_empty() {
        return table_from_columns(Vec::new(), 0);
    }
    let schema = unified_schema(tables)?;

    let mut aligned = Vec::with_capacity(tables.len());
    for table in tables {
        let columns = table
            .columns()
            .iter()
            .zip(schema.fields())
            .map(|(column, field)| {
                if column.data_type() == field.data_type() {
                    return Ok(Arc::clone(column));
                }
                arrow::compute::cast(column, field.data_type()).map_err(|e| {
                    PredictorError::prediction(format!(
                        "cannot cast column '{}' to {:?}: {e}",
                        field.name(),
                        field.data_type()
                    ))
                })
            })
            .collect::<Result<Vec<ArrayRef>>>()?;
        let options = RecordBatchOptions::new().with_row_count(Some(table.num_rows()));
        let batch = RecordBatch::try_new_with_options(Arc::clone(&schema), columns, &options)
            .map_err(|e| PredictorError::prediction(format!("building record batch: {e}")))?;
        aligned.push(batch);
    }

    arrow::compute::concat_batches(&schema, &aligned)
        .map_err(|e| PredictorError::prediction(format!("cannot concatenate tables: {e}")))
}

/// Append named columns to a table.
pub(super) fn with_columns(table: &RecordBatch, extra: Vec<(String, Vec<Value>)>) -> Result<RecordBatch> {
    let schema = table.schema();
    let mut fields: Vec<Field> = schema.fields().iter().map(|f| (**f).clone()).collect();
    let mut arrays: Vec<ArrayRef> = table.columns().to_vec();
    for (name, values) in extra {
        if fields.iter().any(|f| f.name() == &name) {
            return Err(PredictorError::prediction(format!(
                "column '{name}' already exists in predictions"
            )));
        }
        let array = values_to_array(&values);
        fields.push(Field::new(name, array.data_type().clone(), true));
        arrays.push(array);
    }
    let options = RecordBatchOptions::new().with_row_count(Some(table.num_rows()));
    RecordBatch::try_new_with_options(Arc::new(Schema::new(fields)), arrays, &options)
        .map_err(|e| PredictorError::prediction(format!("building record batch: {e}")))
}
