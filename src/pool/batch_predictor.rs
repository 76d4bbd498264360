//! Distributed prediction over a partitioned dataset.
//!
//! Epistemic foundation:
//! - K_i: Only the checkpoint and options are shared between partitions;
//!   every partition builds its own predictor
//! - K_i: Output row count equals input row count, partition by partition
//! - B_i: Any partition may fail → the whole dataset fails

use super::dataset::Dataset;
use crate::models::{Batch, BatchConfig, PredictorError, Result, Value};
use crate::predictor::{CheckpointPredictor, PredictOptions};
use std::marker::PhantomData;
use std::sync::Arc;
use tracing::debug;

/// Options for [`BatchPredictor::predict`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchPredictOptions {
    /// Rows per predict call inside a partition (whole partition if unset)
    pub batch_size: Option<usize>,
    /// Only these columns are fed to the predictor
    pub feature_columns: Option<Vec<String>>,
    /// Input columns copied next to the predictions
    pub keep_columns: Option<Vec<String>>,
}

impl BatchPredictOptions {
    pub fn from_config(config: &BatchConfig) -> Self {
        Self {
            batch_size: config.batch_size,
            ..Self::default()
        }
    }

    pub fn batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = Some(batch_size);
        self
    }

    pub fn feature_columns<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.feature_columns = Some(columns.into_iter().map(Into::into).collect());
        self
    }

    pub fn keep_columns<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.keep_columns = Some(columns.into_iter().map(Into::into).collect());
        self
    }
}

/// Applies a checkpoint-built predictor to every partition of a dataset.
pub struct BatchPredictor<P: CheckpointPredictor> {
    checkpoint: Arc<P::Checkpoint>,
    options: P::Options,
    _predictor: PhantomData<fn() -> P>,
}

impl<P: CheckpointPredictor + 'static> BatchPredictor<P> {
    /// Hold a checkpoint and the options each partition's predictor is
    /// built with. Nothing is loaded here.
    pub fn from_checkpoint(checkpoint: impl Into<Arc<P::Checkpoint>>, options: P::Options) -> Self {
        Self {
            checkpoint: checkpoint.into(),
            options,
            _predictor: PhantomData,
        }
    }

    pub fn checkpoint(&self) -> &P::Checkpoint {
        &self.checkpoint
    }

    /// Lazily predict every partition of `dataset`.
    pub fn predict(&self, dataset: &Dataset, options: &BatchPredictOptions) -> Dataset {
        let checkpoint = Arc::clone(&self.checkpoint);
        let predictor_options = self.options.clone();
        let options = options.clone();
        dataset.map_batches(move |partition| {
            predict_partition::<P>(&checkpoint, &predictor_options, &options, partition)
        })
    }
}

impl<P: CheckpointPredictor> std::fmt::Debug for BatchPredictor<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BatchPredictor")
            .field("predictor", &std::any::type_name::<P>())
            .finish()
    }
}

fn predict_partition<P: CheckpointPredictor>(
    checkpoint: &P::Checkpoint,
    predictor_options: &P::Options,
    options: &BatchPredictOptions,
    partition: Batch,
) -> Result<Batch> {
    let predictor = P::from_checkpoint(checkpoint, predictor_options)?;
    let predict_options = PredictOptions {
        feature_columns: options.feature_columns.clone(),
    };

    let rows = partition.num_rows()?;
    let chunk = options.batch_size.unwrap_or(rows).max(1);
    let outputs = if rows == 0 {
        vec![predictor.predict_batch(&partition, &predict_options)?]
    } else {
        (0..rows)
            .step_by(chunk)
            .map(|offset| predictor.predict_batch(&partition.slice(offset, chunk), &predict_options))
            .collect::<Result<Vec<_>>>()?
    };
    let mut predictions = Batch::concat(&outputs)?;

    if let Some(keep) = &options.keep_columns {
        let extra = keep
            .iter()
            .map(|name| {
                let values: Vec<Value> = partition.column_values(name)?.ok_or_else(|| {
                    PredictorError::prediction(format!("keep column '{name}' not in input"))
                })?;
                Ok((name.clone(), values))
            })
            .collect::<Result<Vec<_>>>()?;
        predictions = predictions.with_columns(extra)?;
    }

    debug!(rows, chunks = outputs.len(), "Partition predicted");
    Ok(predictions)
}
