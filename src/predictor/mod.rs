//! Predictors: checkpoint-built inference over batches.
//!
//! Lifecycle:
//! UNINITIALIZED (default) → READY (direct `new` or `from_checkpoint`).
//! `predict` never changes the predictor's own state.

mod repr;
mod transformers;

pub use repr::MAX_REPR_LENGTH;
pub use transformers::*;

use crate::models::{Batch, Result};

/// Per-call prediction options.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PredictOptions {
    /// Only these columns are fed to the pipeline
    pub feature_columns: Option<Vec<String>>,
}

impl PredictOptions {
    pub fn feature_columns<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.feature_columns = Some(columns.into_iter().map(Into::into).collect());
        self
    }
}

/// A predictor that can be rebuilt from a shared checkpoint.
///
/// The batch predictor never ships a live predictor between workers; it
/// ships the checkpoint and options and calls `from_checkpoint` per
/// partition.
pub trait CheckpointPredictor: Sized {
    type Checkpoint: Send + Sync + 'static;
    type Options: Clone + Send + Sync + 'static;

    /// B_i(checkpoint and options resolve to a runnable predictor) → Result
    fn from_checkpoint(checkpoint: &Self::Checkpoint, options: &Self::Options) -> Result<Self>;

    /// Predict one batch, returning a batch of the same family and row count.
    fn predict_batch(&self, batch: &Batch, options: &PredictOptions) -> Result<Batch>;
}
