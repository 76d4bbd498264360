//! Tiny causal language model.
//!
//! A next-token score table over the vocabulary, randomly initialised from a
//! seed (like building a model from its config without pretrained weights)
//! and decoded greedily. Deterministic for a given config and prompt.
//!
//! Persisted as two artifacts: `config.json` and `model.json`.

use crate::models::{PredictorError, Result};
use rand::prelude::*;
use rand::SeedableRng;
use rand_xoshiro::Xoshiro256PlusPlus;
use serde::{Deserialize, Serialize};

/// Weight of the token before the last one when scoring the next token.
const PREVIOUS_TOKEN_WEIGHT: f32 = 0.5;

/// Model configuration (`config.json`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Concrete model classes able to load these weights
    pub architectures: Vec<String>,

    /// Model family (e.g. "gpt2")
    pub model_type: String,

    /// Vocabulary size; must match the tokenizer
    pub vocab_size: usize,

    /// Maximum context length in tokens
    #[serde(default = "default_n_positions")]
    pub n_positions: usize,

    /// Seed for random weight initialisation
    #[serde(default)]
    pub initializer_seed: u64,

    /// Half-width of the uniform initialisation range
    #[serde(default = "default_initializer_range")]
    pub initializer_range: f32,

    /// End-of-sequence token id
    pub eos_token_id: u32,
}

fn default_n_positions() -> usize {
    64
}

fn default_initializer_range() -> f32 {
    1.0
}

impl ModelConfig {
    /// Config for a tiny randomly initialised GPT-2 style model.
    pub fn tiny_gpt2(vocab_size: usize, eos_token_id: u32) -> Self {
        Self {
            architectures: vec!["GPT2LMHeadModel".to_string()],
            model_type: "gpt2".to_string(),
            vocab_size,
            n_positions: default_n_positions(),
            initializer_seed: 0,
            initializer_range: default_initializer_range(),
            eos_token_id,
        }
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.initializer_seed = seed;
        self
    }
}

/// Serialized weights (`model.json`).
#[derive(Debug, Serialize, Deserialize)]
struct WeightsFile {
    /// `[vocab_size, vocab_size]`
    shape: [usize; 2],
    /// Row-major next-token scores
    data: Vec<f32>,
}

/// Causal language model handle.
#[derive(Debug, Clone, PartialEq)]
pub struct CausalLm {
    config: ModelConfig,
    weights: Vec<f32>,
}

impl CausalLm {
    /// Build a model with random weights from its config.
    pub fn from_config(config: ModelConfig) -> Result<Self> {
        if config.vocab_size == 0 {
            return Err(PredictorError::configuration("model vocab_size must be positive"));
        }
        if config.eos_token_id as usize >= config.vocab_size {
            return Err(PredictorError::configuration(format!(
                "eos_token_id {} outside vocabulary of {}",
                config.eos_token_id, config.vocab_size
            )));
        }
        let range = config.initializer_range.abs().max(f32::EPSILON);
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(config.initializer_seed);
        let weights = (0..config.vocab_size * config.vocab_size)
            .map(|_| rng.gen_range(-range..range))
            .collect();
        Ok(Self { config, weights })
    }

    /// Build a model from explicit weights.
    ///
    /// Weights are not checked for finiteness here; snapshotting rejects them.
    pub fn from_weights(config: ModelConfig, weights: Vec<f32>) -> Result<Self> {
        let expected = config.vocab_size * config.vocab_size;
        if weights.len() != expected {
            return Err(PredictorError::configuration(format!(
                "expected {expected} weights for vocab_size {}, got {}",
                config.vocab_size,
                weights.len()
            )));
        }
        Ok(Self { config, weights })
    }

    pub fn config(&self) -> &ModelConfig {
        &self.config
    }

    /// Next-token scores given a non-empty context.
    fn next_token(&self, context: &[u32]) -> u32 {
        let vocab = self.config.vocab_size;
        let row = |id: u32| {
            let start = (id as usize).min(vocab - 1) * vocab;
            &self.weights[start..start + vocab]
        };

        let last = row(context[context.len() - 1]);
        let previous = context.len().checked_sub(2).map(|i| row(context[i]));

        let mut best = 0u32;
        let mut best_score = f32::NEG_INFINITY;
        for (j, &score) in last.iter().enumerate() {
            let score = score + previous.map_or(0.0, |p| PREVIOUS_TOKEN_WEIGHT * p[j]);
            if score > best_score {
                best_score = score;
                best = j as u32;
            }
        }
        best
    }

    /// Greedily generate up to `max_new_tokens` tokens after `prompt`.
    ///
    /// Returns only the new tokens. Stops at end-of-sequence or when the
    /// context window is full.
    pub fn generate(&self, prompt: &[u32], max_new_tokens: usize) -> Vec<u32> {
        let mut context: Vec<u32> = if prompt.is_empty() {
            vec![self.config.eos_token_id]
        } else {
            let keep = prompt.len().min(self.config.n_positions.max(1));
            prompt[prompt.len() - keep..].to_vec()
        };

        let mut generated = Vec::with_capacity(max_new_tokens);
        while generated.len() < max_new_tokens && context.len() < self.config.n_positions {
            let next = self.next_token(&context);
            if next == self.config.eos_token_id {
                break;
            }
            generated.push(next);
            context.push(next);
        }
        generated
    }

    /// Serialize into `(config.json, model.json)` bytes.
    ///
    /// B_i(weights are finite) → Result
    pub fn to_artifacts(&self) -> Result<(Vec<u8>, Vec<u8>)> {
        if let Some(pos) = self.weights.iter().position(|w| !w.is_finite()) {
            return Err(PredictorError::serialization(format!(
                "model weight {pos} is not finite"
            )));
        }
        let config = serde_json::to_vec_pretty(&self.config)
            .map_err(|e| PredictorError::serialization(format!("config.json: {e}")))?;
        let weights = serde_json::to_vec(&WeightsFile {
            shape: [self.config.vocab_size, self.config.vocab_size],
            data: self.weights.clone(),
        })
        .map_err(|e| PredictorError::serialization(format!("model.json: {e}")))?;
        Ok((config, weights))
    }

    /// Load from `(config.json, model.json)` bytes.
    ///
    /// B_i(artifacts are intact and consistent) → Result
    pub fn from_artifacts(config: &[u8], weights: &[u8]) -> Result<Self> {
        let config: ModelConfig = serde_json::from_slice(config)
            .map_err(|e| PredictorError::checkpoint_load(format!("config.json: {e}")))?;
        let file: WeightsFile = serde_json::from_slice(weights)
            .map_err(|e| PredictorError::checkpoint_load(format!("model.json: {e}")))?;

        let [rows, cols] = file.shape;
        if rows != config.vocab_size || cols != config.vocab_size {
            return Err(PredictorError::checkpoint_load(format!(
                "model.json shape {rows}x{cols} does not match vocab_size {}",
                config.vocab_size
            )));
        }
        if file.data.len() != rows * cols {
            return Err(PredictorError::checkpoint_load(format!(
                "model.json holds {} weights, expected {}",
                file.data.len(),
                rows * cols
            )));
        }
        if config.eos_token_id as usize >= config.vocab_size {
            return Err(PredictorError::checkpoint_load(format!(
                "config.json eos_token_id {} outside vocabulary",
                config.eos_token_id
            )));
        }
        Ok(Self {
            config,
            weights: file.data,
        })
    }
}
