//! Text-generation pipeline.
//!
//! Flow per input: text → token ids → greedy continuation → text.
//! Output records carry a single `generated_text` column.

use super::{Pipeline, PipelineInput, PipelineOptions, Task};
use crate::models::{PredictorError, Record, Result, Value};
use crate::transformers::{CausalLm, ModelClass, Tokenizer};
use std::any::Any;
use std::sync::Arc;

/// Output column written by text generation.
pub const GENERATED_TEXT_COLUMN: &str = "generated_text";

/// Built-in pipeline for [`Task::TextGeneration`].
#[derive(Debug, Clone)]
pub struct TextGenerationPipeline {
    model: Arc<CausalLm>,
    tokenizer: Arc<Tokenizer>,
    model_class: ModelClass,
    options: PipelineOptions,
}

impl TextGenerationPipeline {
    /// Bind a model and tokenizer.
    ///
    /// B_i(model and tokenizer share a vocabulary) → Result
    pub fn new(
        model: Arc<CausalLm>,
        tokenizer: Arc<Tokenizer>,
        model_class: ModelClass,
        options: PipelineOptions,
    ) -> Result<Self> {
        if model.config().vocab_size != tokenizer.vocab_size() {
            return Err(PredictorError::configuration(format!(
                "model vocab_size {} does not match tokenizer vocabulary of {}",
                model.config().vocab_size,
                tokenizer.vocab_size()
            )));
        }
        Ok(Self {
            model,
            tokenizer,
            model_class,
            options,
        })
    }

    pub fn model_class(&self) -> ModelClass {
        self.model_class
    }

    pub fn options(&self) -> &PipelineOptions {
        &self.options
    }

    fn prompt<'a>(&self, index: usize, input: &'a PipelineInput) -> Result<&'a str> {
        match input {
            PipelineInput::Value(Value::Str(text)) => Ok(text.as_str()),
            PipelineInput::Value(other) => Err(PredictorError::prediction(format!(
                "row {index}: text-generation expects a string prompt, got {}",
                other.type_name()
            ))),
            PipelineInput::Record(record) => Err(PredictorError::prediction(format!(
                "row {index}: text-generation expects a single text column, got columns {:?}",
                record.keys().collect::<Vec<_>>()
            ))),
        }
    }

    /// Generate a continuation for one prompt.
    pub fn generate(&self, prompt: &str) -> String {
        let ids = self.tokenizer.encode(prompt);
        let generated = self.model.generate(&ids, self.options.max_new_tokens);
        let continuation = self.tokenizer.decode(&generated);

        if !self.options.return_full_text {
            continuation
        } else if continuation.is_empty() {
            prompt.to_string()
        } else {
            format!("{prompt} {continuation}")
        }
    }
}

impl Pipeline for TextGenerationPipeline {
    fn task(&self) -> Task {
        Task::TextGeneration
    }

    fn name(&self) -> String {
        "TextGenerationPipeline".to_string()
    }

    fn run(&self, inputs: &[PipelineInput]) -> Result<Vec<Record>> {
        inputs
            .iter()
            .enumerate()
            .map(|(index, input)| {
                let text = self.generate(self.prompt(index, input)?);
                let mut record = Record::new();
                record.insert(GENERATED_TEXT_COLUMN.to_string(), Value::Str(text));
                Ok(record)
            })
            .collect()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transformers::ModelConfig;

    fn pipeline(options: PipelineOptions) -> TextGenerationPipeline {
        let tokenizer = Tokenizer::word_level(["complete", "me", "and", "please"], true).unwrap();
        let config = ModelConfig::tiny_gpt2(tokenizer.vocab_size(), tokenizer.eos_id());
        let model = CausalLm::from_config(config).unwrap();
        TextGenerationPipeline::new(
            Arc::new(model),
            Arc::new(tokenizer),
            ModelClass::AutoModelForCausalLm,
            options,
        )
        .unwrap()
    }

    #[test]
    fn test_one_output_per_input() {
        let p = pipeline(PipelineOptions::default());
        let inputs: Vec<_> = ["Complete me", "And me", "Please complete"]
            .into_iter()
            .map(|s| PipelineInput::Value(Value::from(s)))
            .collect();
        let outputs = p.run(&inputs).unwrap();
        assert_eq!(outputs.len(), 3);
        for (out, prompt) in outputs.iter().zip(["Complete me", "And me", "Please complete"]) {
            let text = out[GENERATED_TEXT_COLUMN].as_str().unwrap();
            assert!(text.starts_with(prompt));
        }
    }

    #[test]
    fn test_zero_new_tokens_returns_prompt() {
        let p = pipeline(PipelineOptions {
            max_new_tokens: 0,
            return_full_text: true,
        });
        assert_eq!(p.generate("and me"), "and me");
    }

    #[test]
    fn test_non_text_input_is_prediction_error() {
        let p = pipeline(PipelineOptions::default());
        let err = p.run(&[PipelineInput::Value(Value::Int(3))]).unwrap_err();
        assert!(err.is_data_error());
    }

    #[test]
    fn test_vocab_mismatch_is_configuration_error() {
        let tokenizer = Tokenizer::word_level(["a"], false).unwrap();
        let model = CausalLm::from_config(ModelConfig::tiny_gpt2(10, 1)).unwrap();
        let err = TextGenerationPipeline::new(
            Arc::new(model),
            Arc::new(tokenizer),
            ModelClass::AutoModelForCausalLm,
            PipelineOptions::default(),
        )
        .unwrap_err();
        assert!(matches!(err, PredictorError::Configuration(_)));
    }
}
