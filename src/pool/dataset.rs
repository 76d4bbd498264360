//! Lazy partitioned dataset.
//!
//! A dataset is a list of input partitions plus a chain of per-partition
//! stages. Stages only run when the dataset is materialized, one pool job
//! per partition.

use super::worker::{PartitionPool, DEFAULT_CONCURRENCY};
use crate::models::{Batch, Columns, DataFrame, PredictorError, Result, Value};
use arrow::record_batch::RecordBatch;
use ndarray::ArrayD;
use std::sync::Arc;
use tracing::info;

/// Per-partition transformation.
pub type Stage = Arc<dyn Fn(Batch) -> Result<Batch> + Send + Sync>;

/// Partitioned, lazily transformed collection of batches.
#[derive(Clone)]
pub struct Dataset {
    partitions: Arc<Vec<Batch>>,
    stages: Vec<Stage>,
    concurrency: usize,
}

impl Dataset {
    /// Dataset over explicit partitions, all of one batch family.
    ///
    /// B_i(at least one partition, one family, unambiguous row counts) → Result
    pub fn from_partitions(partitions: Vec<Batch>) -> Result<Self> {
        let Some(first) = partitions.first() else {
            return Err(PredictorError::configuration(
                "a dataset needs at least one partition",
            ));
        };
        let format = first.format();
        for (index, partition) in partitions.iter().enumerate() {
            if partition.format() != format {
                return Err(PredictorError::prediction(format!(
                    "partition {index} is a {} batch, expected {format}",
                    partition.format()
                )));
            }
            partition.num_rows()?;
        }
        Ok(Self {
            partitions: Arc::new(partitions),
            stages: Vec::new(),
            concurrency: DEFAULT_CONCURRENCY,
        })
    }

    /// Split one batch into up to `num_partitions` contiguous partitions.
    pub fn from_batch(batch: Batch, num_partitions: usize) -> Result<Self> {
        let rows = batch.num_rows()?;
        if rows == 0 {
            return Self::from_partitions(vec![batch]);
        }
        let chunk = rows.div_ceil(num_partitions.max(1));
        let partitions = (0..rows)
            .step_by(chunk)
            .map(|offset| batch.slice(offset, chunk))
            .collect();
        Self::from_partitions(partitions)
    }

    pub fn from_array(array: ArrayD<Value>, num_partitions: usize) -> Result<Self> {
        Self::from_batch(Batch::Array(array), num_partitions)
    }

    pub fn from_frame(frame: DataFrame, num_partitions: usize) -> Result<Self> {
        Self::from_batch(Batch::Frame(frame), num_partitions)
    }

    pub fn from_columns(columns: Columns, num_partitions: usize) -> Result<Self> {
        Self::from_batch(Batch::Columns(columns), num_partitions)
    }

    /// One partition per record batch.
    pub fn from_arrow(tables: Vec<RecordBatch>) -> Result<Self> {
        Self::from_partitions(tables.into_iter().map(Batch::Table).collect())
    }

    /// Maximum number of partitions processed at once.
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub fn num_partitions(&self) -> usize {
        self.partitions.len()
    }

    /// Input partitions, before any stage runs.
    pub fn partitions(&self) -> &[Batch] {
        &self.partitions
    }

    /// Append a lazy per-partition stage.
    pub fn map_batches<F>(&self, stage: F) -> Dataset
    where
        F: Fn(Batch) -> Result<Batch> + Send + Sync + 'static,
    {
        let mut next = self.clone();
        next.stages.push(Arc::new(stage));
        next
    }

    /// Run every stage over every partition.
    ///
    /// Partitions come back in input order. Any failing partition fails the
    /// whole run.
    pub async fn materialize(&self) -> Result<Vec<Batch>> {
        if self.stages.is_empty() {
            return Ok(self.partitions.to_vec());
        }

        info!(
            partitions = self.partitions.len(),
            stages = self.stages.len(),
            concurrency = self.concurrency,
            "Executing dataset"
        );
        let pool = PartitionPool::new(self.concurrency);
        let jobs: Vec<_> = self
            .partitions
            .iter()
            .cloned()
            .map(|partition| {
                let stages = self.stages.clone();
                move || stages.iter().try_fold(partition, |batch, stage| stage(batch))
            })
            .collect();
        pool.run(jobs).await
    }

    /// Total rows after all stages.
    pub async fn count(&self) -> Result<usize> {
        self.materialize()
            .await?
            .iter()
            .map(Batch::num_rows)
            .sum()
    }

    /// All rows as one batch, in input order.
    pub async fn take_all(&self) -> Result<Batch> {
        Batch::concat(&self.materialize().await?)
    }
}

impl std::fmt::Debug for Dataset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dataset")
            .field("num_partitions", &self.partitions.len())
            .field("stages", &self.stages.len())
            .field("concurrency", &self.concurrency)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn values(n: usize) -> Vec<Value> {
        (0..n).map(|i| Value::Int(i as i64)).collect()
    }

    #[test]
    fn test_split_into_partitions() {
        let ds = Dataset::from_batch(Batch::array(values(10)), 4).unwrap();
        assert_eq!(ds.num_partitions(), 4);
        let sizes: Vec<usize> = ds.partitions().iter().map(|p| p.num_rows().unwrap()).collect();
        assert_eq!(sizes, vec![3, 3, 3, 1]);
    }

    #[test]
    fn test_fewer_rows_than_partitions() {
        let ds = Dataset::from_batch(Batch::array(values(2)), 8).unwrap();
        assert_eq!(ds.num_partitions(), 2);
    }

    #[test]
    fn test_empty_batch_keeps_one_partition() {
        let ds = Dataset::from_batch(Batch::column("x", values(0)), 3).unwrap();
        assert_eq!(ds.num_partitions(), 1);
    }

    #[test]
    fn test_mixed_partitions_are_rejected() {
        let err = Dataset::from_partitions(vec![Batch::array(["a"]), Batch::column("x", ["b"])])
            .unwrap_err();
        assert!(err.is_data_error());
        assert!(Dataset::from_partitions(Vec::new()).is_err());
    }

    #[tokio::test]
    async fn test_stages_are_lazy_and_ordered() {
        let ds = Dataset::from_batch(Batch::array(values(7)), 3).unwrap();
        let doubled = ds.map_batches(|batch| {
            let records = batch.to_records()?;
            let out: Vec<Value> = records
                .iter()
                .flat_map(|r| r.values())
                .map(|v| match v {
                    Value::Int(i) => Value::Int(i * 2),
                    other => other.clone(),
                })
                .collect();
            Ok(Batch::array(out))
        });
        assert_eq!(ds.count().await.unwrap(), 7);
        assert_eq!(doubled.count().await.unwrap(), 7);

        let all = doubled.take_all().await.unwrap();
        let expected: Vec<Value> = (0..7).map(|i| Value::Int(i * 2)).collect();
        assert_eq!(all, Batch::array(expected));
    }

    #[tokio::test]
    async fn test_stage_failure_fails_materialize() {
        let ds = Dataset::from_batch(Batch::array(values(4)), 2)
            .unwrap()
            .map_batches(|_| Err(PredictorError::prediction("bad")));
        assert!(ds.materialize().await.is_err());
    }
}
