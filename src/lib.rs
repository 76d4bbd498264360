//! transformers-predictor - Checkpoint-to-predictor lifecycle for causal text generation.
//!
//! ## Architecture
//!
//! - **Checkpoint**: Immutable bundle of model, tokenizer and optional
//!   preprocessor; persisted as a directory or held as an in-memory dict
//! - **Predictor**: Builds a pipeline from a checkpoint through an explicit
//!   build plan and predicts batches of any supported family
//! - **BatchPredictor**: Rebuilds the predictor per partition of a lazy
//!   dataset and runs partitions on a bounded pool
//!
//! ## Batch families
//!
//! - `ndarray` arrays, named-column frames, column mappings, Arrow record batches
//!
//! ## Epistemic Design
//!
//! - K_i (Knowledge): Compile-time enforced invariants (types, enums)
//! - B_i (Beliefs): Runtime fallible operations (Result, Option)
//! - I^R (Resolvable): Task, model class and batch settings from config
//! - I^B (Bounded): Persisted state and worker tasks may fail

pub mod checkpoint;
pub mod models;
pub mod pipeline;
pub mod pool;
pub mod predictor;
pub mod preprocess;
pub mod transformers;

// Re-exports for convenience
pub use checkpoint::{CheckpointDict, TransformersCheckpoint};
pub use models::{Batch, BatchFormat, Config, PredictorError, Result, Stage, Value};
pub use pipeline::{BuildPlan, Pipeline, PipelineFactory, Task};
pub use pool::{BatchPredictOptions, BatchPredictor, Dataset};
pub use predictor::{FromCheckpointOptions, PredictOptions, TransformersPredictor};
pub use preprocess::{Preprocessor, PreprocessorSpec};
pub use transformers::{CausalLm, ModelClass, ModelConfig, Tokenizer};
