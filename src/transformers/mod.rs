//! Model and tokenizer capabilities.
//!
//! Provides:
//! - `CausalLm` / `ModelConfig`: a tiny seeded causal language model
//! - `Tokenizer`: a word-level tokenizer
//! - `ModelClass`: concrete classes a loaded model can be narrowed to

mod model;
mod tokenizer;

pub use model::*;
pub use tokenizer::*;

use crate::models::{PredictorError, Result};
use crate::pipeline::Task;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Model class a checkpoint's weights are loaded as.
///
/// K_i: Each class serves exactly one task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ModelClass {
    /// Any causal LM architecture
    #[serde(rename = "AutoModelForCausalLM")]
    AutoModelForCausalLm,
    /// GPT-2 with a language modelling head
    #[serde(rename = "GPT2LMHeadModel")]
    Gpt2LmHeadModel,
}

impl ModelClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AutoModelForCausalLm => "AutoModelForCausalLM",
            Self::Gpt2LmHeadModel => "GPT2LMHeadModel",
        }
    }

    /// Task this class's models serve.
    pub fn task(&self) -> Task {
        match self {
            Self::AutoModelForCausalLm | Self::Gpt2LmHeadModel => Task::TextGeneration,
        }
    }

    /// Whether a model with this config can be loaded as this class.
    pub fn accepts(&self, config: &ModelConfig) -> bool {
        match self {
            Self::AutoModelForCausalLm => true,
            Self::Gpt2LmHeadModel => {
                config.model_type == "gpt2"
                    || config.architectures.iter().any(|a| a == self.as_str())
            }
        }
    }

    /// Narrow a loaded model to this class.
    ///
    /// B_i(architecture is compatible) → Result
    pub fn narrow(&self, model: &CausalLm) -> Result<()> {
        if self.accepts(model.config()) {
            Ok(())
        } else {
            Err(PredictorError::configuration(format!(
                "model of type '{}' (architectures {:?}) cannot be loaded as {self}",
                model.config().model_type,
                model.config().architectures
            )))
        }
    }
}

impl std::fmt::Display for ModelClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ModelClass {
    type Err = PredictorError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "AutoModelForCausalLM" => Ok(Self::AutoModelForCausalLm),
            "GPT2LMHeadModel" => Ok(Self::Gpt2LmHeadModel),
            other => Err(PredictorError::configuration(format!(
                "unknown model class '{other}'"
            ))),
        }
    }
}
