//! Pipeline module - composed inference callables.
//!
//! A pipeline binds a model, a tokenizer and generation options into a
//! callable over rows. Pipelines are built from an explicit [`BuildPlan`]
//! through a [`PipelineFactory`], so callers can substitute their own
//! pipeline type without changing how the model is resolved.

mod plan;
mod text_generation;

pub use plan::*;
pub use text_generation::*;

use crate::models::{PredictorError, Record, Result, Value};
use crate::transformers::{CausalLm, ModelClass, Tokenizer};
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::str::FromStr;
use std::sync::Arc;

/// Inference task a pipeline performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Task {
    /// Causal text continuation
    TextGeneration,
}

impl Task {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::TextGeneration => "text-generation",
        }
    }

    /// Model class used when a task is named without an explicit class.
    pub fn auto_class(&self) -> ModelClass {
        match self {
            Self::TextGeneration => ModelClass::AutoModelForCausalLm,
        }
    }
}

impl std::fmt::Display for Task {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Task {
    type Err = PredictorError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "text-generation" => Ok(Self::TextGeneration),
            other => Err(PredictorError::configuration(format!(
                "unknown task '{other}'"
            ))),
        }
    }
}

/// One pipeline input: a scalar for single-column rows, a record otherwise.
#[derive(Debug, Clone, PartialEq)]
pub enum PipelineInput {
    Value(Value),
    Record(Record),
}

/// Generation options bound into a pipeline at build time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineOptions {
    /// Maximum number of tokens generated per input
    #[serde(default = "default_max_new_tokens")]
    pub max_new_tokens: usize,

    /// Prefix the prompt to the generated continuation
    #[serde(default = "default_return_full_text")]
    pub return_full_text: bool,
}

fn default_max_new_tokens() -> usize {
    8
}

fn default_return_full_text() -> bool {
    true
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            max_new_tokens: default_max_new_tokens(),
            return_full_text: default_return_full_text(),
        }
    }
}

/// A runnable inference pipeline.
///
/// K_i: `run` returns exactly one record per input, in input order.
pub trait Pipeline: Send + Sync + std::fmt::Debug {
    /// Task this pipeline performs.
    fn task(&self) -> Task;

    /// Display name, used in predictor representations.
    fn name(&self) -> String;

    /// Run inference over a batch of inputs.
    ///
    /// B_i(inputs are well-formed for the task) → Result
    fn run(&self, inputs: &[PipelineInput]) -> Result<Vec<Record>>;

    /// Concrete pipeline, for callers that need their own type back.
    fn as_any(&self) -> &dyn Any;
}

/// Everything a factory needs to build a pipeline.
#[derive(Debug, Clone)]
pub struct PipelineParts {
    pub model: Arc<CausalLm>,
    pub tokenizer: Arc<Tokenizer>,
    pub plan: BuildPlan,
    pub options: PipelineOptions,
}

/// Builds a pipeline from loaded parts.
pub trait PipelineFactory: Send + Sync {
    fn build(&self, parts: PipelineParts) -> Result<Box<dyn Pipeline>>;
}

impl<F> PipelineFactory for F
where
    F: Fn(PipelineParts) -> Result<Box<dyn Pipeline>> + Send + Sync,
{
    fn build(&self, parts: PipelineParts) -> Result<Box<dyn Pipeline>> {
        self(parts)
    }
}

/// Builds the built-in pipeline for the plan's task.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultPipelineFactory;

impl PipelineFactory for DefaultPipelineFactory {
    fn build(&self, parts: PipelineParts) -> Result<Box<dyn Pipeline>> {
        match parts.plan.task() {
            Task::TextGeneration => Ok(Box::new(TextGenerationPipeline::new(
                parts.model,
                parts.tokenizer,
                parts.plan.model_class(),
                parts.options,
            )?)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_task_parses_by_name() {
        assert_eq!("text-generation".parse::<Task>().unwrap(), Task::TextGeneration);
        let err = "summarization".parse::<Task>().unwrap_err();
        assert!(matches!(err, PredictorError::Configuration(_)));
    }

    #[test]
    fn test_task_serde_name() {
        let json = serde_json::to_string(&Task::TextGeneration).unwrap();
        assert_eq!(json, "\"text-generation\"");
    }

    #[test]
    fn test_default_options() {
        let options: PipelineOptions = serde_json::from_str("{}").unwrap();
        assert_eq!(options, PipelineOptions::default());
        assert_eq!(options.max_new_tokens, 8);
        assert!(options.return_full_text);
    }
}
