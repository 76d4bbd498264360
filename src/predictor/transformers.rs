//! Predictor wrapping a text-generation pipeline.
//!
//! Epistemic foundation:
//! - K_i: `predict` returns exactly one output row per input row, in the
//!   input's batch family
//! - K_i: An attached preprocessor sees every batch exactly once
//! - B_i: Batches may be malformed → PredictionError
//! - I^R: Task, model class and default task are resolved through an explicit
//!   [`BuildPlan`], never hidden state

use super::repr;
use super::{CheckpointPredictor, PredictOptions};
use crate::checkpoint::TransformersCheckpoint;
use crate::models::{Batch, Config, PredictorError, Record, Result};
use crate::pipeline::{
    BuildPlan, DefaultPipelineFactory, Pipeline, PipelineFactory, PipelineInput, PipelineOptions,
    PipelineParts, Task,
};
use crate::preprocess::{Preprocessor, PreprocessorSpec};
use crate::transformers::ModelClass;
use std::sync::Arc;
use tracing::{debug, info};

/// How [`TransformersPredictor::from_checkpoint`] builds its pipeline.
#[derive(Clone, Default)]
pub struct FromCheckpointOptions {
    /// Task to build a pipeline for
    pub task: Option<Task>,
    /// Class to load the checkpoint's model as
    pub model_class: Option<ModelClass>,
    /// Custom pipeline constructor (built-in pipelines if unset)
    pub pipeline_factory: Option<Arc<dyn PipelineFactory>>,
    /// Options bound into the pipeline
    pub pipeline_options: PipelineOptions,
    /// Task used when neither `task` nor `model_class` is given
    pub default_task: Option<Task>,
    /// Preprocessor overriding the checkpoint's
    pub preprocessor: Option<PreprocessorSpec>,
}

impl FromCheckpointOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Options seeded from configuration: the configured task becomes the
    /// default task, the configured model class is applied directly.
    pub fn from_config(config: &Config) -> Self {
        Self {
            model_class: config.predictor.model_class,
            default_task: config.predictor.task,
            pipeline_options: config.generation.clone(),
            ..Self::default()
        }
    }

    pub fn task(mut self, task: Task) -> Self {
        self.task = Some(task);
        self
    }

    pub fn model_class(mut self, model_class: ModelClass) -> Self {
        self.model_class = Some(model_class);
        self
    }

    pub fn pipeline_factory(mut self, factory: impl PipelineFactory + 'static) -> Self {
        self.pipeline_factory = Some(Arc::new(factory));
        self
    }

    pub fn pipeline_options(mut self, options: PipelineOptions) -> Self {
        self.pipeline_options = options;
        self
    }

    pub fn default_task(mut self, task: Task) -> Self {
        self.default_task = Some(task);
        self
    }

    pub fn preprocessor(mut self, spec: PreprocessorSpec) -> Self {
        self.preprocessor = Some(spec);
        self
    }
}

impl std::fmt::Debug for FromCheckpointOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FromCheckpointOptions")
            .field("task", &self.task)
            .field("model_class", &self.model_class)
            .field("pipeline_factory", &self.pipeline_factory.as_ref().map(|_| "custom"))
            .field("pipeline_options", &self.pipeline_options)
            .field("default_task", &self.default_task)
            .field("preprocessor", &self.preprocessor)
            .finish()
    }
}

/// Predictor for a pretrained causal LM.
#[derive(Default)]
pub struct TransformersPredictor {
    pipeline: Option<Box<dyn Pipeline>>,
    preprocessor: Option<Arc<dyn Preprocessor>>,
}

impl TransformersPredictor {
    /// Compose a ready predictor from a built pipeline. No I/O.
    pub fn new(pipeline: Box<dyn Pipeline>, preprocessor: Option<Arc<dyn Preprocessor>>) -> Self {
        Self {
            pipeline: Some(pipeline),
            preprocessor,
        }
    }

    /// Build a predictor from a checkpoint.
    ///
    /// B_i(options determine a pipeline) → Result (ConfigurationError)
    /// B_i(checkpoint state is loadable) → Result (CheckpointLoadError)
    pub fn from_checkpoint(
        checkpoint: &TransformersCheckpoint,
        options: &FromCheckpointOptions,
    ) -> Result<Self> {
        let plan = BuildPlan::resolve(options.task, options.model_class, options.default_task)?;
        let (model, tokenizer) = checkpoint.get_model_and_tokenizer()?;
        plan.model_class().narrow(&model)?;

        let parts = PipelineParts {
            model,
            tokenizer,
            plan,
            options: options.pipeline_options.clone(),
        };
        let pipeline = match &options.pipeline_factory {
            Some(factory) => factory.build(parts)?,
            None => DefaultPipelineFactory.build(parts)?,
        };

        let preprocessor = options
            .preprocessor
            .as_ref()
            .or_else(|| checkpoint.preprocessor())
            .map(PreprocessorSpec::build)
            .transpose()?;

        info!(
            task = %plan.task(),
            model_class = %plan.model_class(),
            pipeline = %pipeline.name(),
            preprocessor = preprocessor.is_some(),
            "Built predictor from checkpoint"
        );
        Ok(Self {
            pipeline: Some(pipeline),
            preprocessor,
        })
    }

    pub fn pipeline(&self) -> Option<&dyn Pipeline> {
        self.pipeline.as_deref()
    }

    pub fn preprocessor(&self) -> Option<&Arc<dyn Preprocessor>> {
        self.preprocessor.as_ref()
    }

    /// Replace the preprocessor.
    pub fn with_preprocessor(mut self, preprocessor: Arc<dyn Preprocessor>) -> Self {
        self.preprocessor = Some(preprocessor);
        self
    }

    /// Predict a batch with default options.
    pub fn predict(&self, batch: &Batch) -> Result<Batch> {
        self.predict_with(batch, &PredictOptions::default())
    }

    /// Predict a batch.
    ///
    /// The caller's batch is never mutated. Output has the input's family and
    /// row count.
    pub fn predict_with(&self, batch: &Batch, options: &PredictOptions) -> Result<Batch> {
        let pipeline = self.pipeline.as_deref().ok_or_else(|| {
            PredictorError::prediction(
                "predictor has no pipeline; build it with new or from_checkpoint",
            )
        })?;

        let num_rows = batch.num_rows()?;
        let batch = match &self.preprocessor {
            Some(preprocessor) => {
                let out = preprocessor.transform_batch(batch.clone())?;
                let rows = out.num_rows()?;
                if rows != num_rows {
                    return Err(PredictorError::prediction(format!(
                        "preprocessor {} changed row count from {num_rows} to {rows}",
                        preprocessor.name()
                    )));
                }
                out
            }
            None => batch.clone(),
        };

        let inputs = pipeline_inputs(&batch, options.feature_columns.as_deref())?;
        let outputs = if inputs.is_empty() {
            Vec::new()
        } else {
            pipeline.run(&inputs)?
        };
        if outputs.len() != num_rows {
            return Err(PredictorError::prediction(format!(
                "pipeline {} returned {} outputs for {num_rows} rows",
                pipeline.name(),
                outputs.len()
            )));
        }

        debug!(rows = num_rows, format = %batch.format(), "Predicted batch");
        Batch::from_records(batch.format(), &outputs)
    }

    /// Representation bounded by [`super::MAX_REPR_LENGTH`].
    pub fn repr(&self) -> String {
        let pipeline = self.pipeline.as_ref().map_or_else(|| "None".to_string(), |p| p.name());
        let preprocessor = self
            .preprocessor
            .as_ref()
            .map_or_else(|| "None".to_string(), |p| p.name());
        repr::bounded(
            "TransformersPredictor",
            &format!("pipeline={pipeline}, preprocessor={preprocessor}"),
        )
    }
}

/// Canonical rows → pipeline inputs, optionally projected onto feature columns.
///
/// Single-column rows become scalars.
fn pipeline_inputs(batch: &Batch, feature_columns: Option<&[String]>) -> Result<Vec<PipelineInput>> {
    if let Some(columns) = feature_columns {
        let available = batch.column_names();
        if let Some(missing) = columns.iter().find(|c| !available.contains(c)) {
            return Err(PredictorError::prediction(format!(
                "feature column '{missing}' not in batch (columns: {available:?})"
            )));
        }
    }

    Ok(batch
        .to_records()?
        .into_iter()
        .map(|record| {
            let record: Record = match feature_columns {
                Some(columns) => record
                    .into_iter()
                    .filter(|(name, _)| columns.contains(name))
                    .collect(),
                None => record,
            };
            if record.len() == 1 {
                let value = record.into_values().next().unwrap_or_default();
                PipelineInput::Value(value)
            } else {
                PipelineInput::Record(record)
            }
        })
        .collect())
}

impl std::fmt::Debug for TransformersPredictor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.repr())
    }
}

impl CheckpointPredictor for TransformersPredictor {
    type Checkpoint = TransformersCheckpoint;
    type Options = FromCheckpointOptions;

    fn from_checkpoint(checkpoint: &Self::Checkpoint, options: &Self::Options) -> Result<Self> {
        TransformersPredictor::from_checkpoint(checkpoint, options)
    }

    fn predict_batch(&self, batch: &Batch, options: &PredictOptions) -> Result<Batch> {
        self.predict_with(batch, options)
    }
}
