//! Shared fixtures for integration tests.

#![allow(dead_code)]

use transformers_predictor::models::{table_from_columns, DataFrame, TENSOR_COLUMN_NAME};
use transformers_predictor::{
    Batch, BatchFormat, CausalLm, ModelConfig, PreprocessorSpec, Tokenizer,
    TransformersCheckpoint, Value,
};
use std::path::Path;

/// The three prompts used throughout.
pub const PROMPTS: [&str; 3] = ["Complete me", "And me", "Please complete"];

/// Input column name used for tabular batches.
pub const PROMPT_COLUMN: &str = "sentences";

pub fn tokenizer() -> Tokenizer {
    Tokenizer::word_level(
        ["complete", "me", "and", "please", "prompt", "the", "a", "of"],
        true,
    )
    .unwrap()
}

pub fn model(tokenizer: &Tokenizer) -> CausalLm {
    let config = ModelConfig::tiny_gpt2(tokenizer.vocab_size(), tokenizer.eos_id()).with_seed(42);
    CausalLm::from_config(config).unwrap()
}

/// Tiny checkpoint, optionally persisted under `path`.
pub fn checkpoint(path: Option<&Path>, preprocessor: Option<PreprocessorSpec>) -> TransformersCheckpoint {
    let tokenizer = tokenizer();
    let model = model(&tokenizer);
    let preprocessor = preprocessor.map(|spec| spec.build().unwrap());
    TransformersCheckpoint::from_model(&model, &tokenizer, path, preprocessor.as_deref()).unwrap()
}

/// Checkpoint that outlives the directory it was written to.
pub fn detached_checkpoint() -> TransformersCheckpoint {
    let dir = tempfile::TempDir::new().unwrap();
    let ckpt = checkpoint(Some(dir.path()), None);
    TransformersCheckpoint::from_dict(ckpt.to_dict().unwrap()).unwrap()
}

/// `n` distinct prompts.
pub fn prompts(n: usize) -> Vec<String> {
    (0..n)
        .map(|i| PROMPTS[i % PROMPTS.len()].to_string() + &format!(" prompt {i}"))
        .collect()
}

/// Prompts as a batch of the given family.
pub fn batch_of(format: BatchFormat, prompts: &[String]) -> Batch {
    let values: Vec<Value> = prompts.iter().map(|p| Value::from(p.as_str())).collect();
    match format {
        BatchFormat::Array => Batch::array(values),
        BatchFormat::Frame => Batch::Frame(DataFrame::from_column(PROMPT_COLUMN, values)),
        BatchFormat::Columns => Batch::column(PROMPT_COLUMN, values),
        BatchFormat::Table => {
            let n = values.len();
            Batch::Table(table_from_columns(vec![(PROMPT_COLUMN.to_string(), values)], n).unwrap())
        }
    }
}

/// Generated texts in row order. Array outputs carry them in their single
/// unnamed column.
pub fn generated_texts(batch: &Batch) -> Vec<String> {
    let column = match batch.format() {
        BatchFormat::Array => TENSOR_COLUMN_NAME,
        _ => "generated_text",
    };
    batch
        .column_values(column)
        .unwrap()
        .expect("generated text column")
        .into_iter()
        .map(|v| v.as_str().unwrap().to_string())
        .collect()
}
