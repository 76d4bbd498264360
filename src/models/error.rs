//! Error types for transformers-predictor.
//!
//! Epistemic taxonomy:
//! - B_i falsified: Expected failures (bad checkpoint, bad batch, bad config)
//! - I^B materialized: Infrastructure failures (filesystem, worker tasks)
//! - K_i violated: Internal invariant violations (bugs)

use thiserror::Error;

/// Lifecycle stage at which an error was raised.
///
/// Lets callers tell configuration bugs (load/build) apart from data bugs
/// (predict) without string matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    /// Snapshotting a model/tokenizer into a checkpoint
    Serialize,
    /// Materializing persisted or embedded checkpoint state
    Load,
    /// Resolving and building the inference pipeline
    Build,
    /// Running a batch through a predictor
    Predict,
    /// Executing partitions on the worker pool
    Execute,
    /// Reading configuration or input files
    Setup,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Serialize => "serialize",
            Self::Load => "load",
            Self::Build => "build",
            Self::Predict => "predict",
            Self::Execute => "execute",
            Self::Setup => "setup",
        };
        f.write_str(name)
    }
}

/// Top-level error type for transformers-predictor.
#[derive(Debug, Error)]
pub enum PredictorError {
    // ═══════════════════════════════════════════════════════════════════
    // B_i FALSIFIED: Belief proven wrong (expected failures)
    // ═══════════════════════════════════════════════════════════════════

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Checkpoint load error: {0}")]
    CheckpointLoad(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Prediction error: {0}")]
    Prediction(String),

    #[error("Config file error: {0}")]
    Config(#[from] super::ConfigError),

    // ═══════════════════════════════════════════════════════════════════
    // I^B MATERIALIZED: Bounded ignorance became known-bad
    // ═══════════════════════════════════════════════════════════════════

    #[error("IO error: {context}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Execution error: {0}")]
    Execution(String),

    // ═══════════════════════════════════════════════════════════════════
    // K_i VIOLATED: Invariant broken (bug, should not happen)
    // ═══════════════════════════════════════════════════════════════════

    #[error("Internal error: {0}")]
    Internal(String),
}

impl PredictorError {
    /// Create an IO error with context.
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// Create a prediction error.
    pub fn prediction(message: impl Into<String>) -> Self {
        Self::Prediction(message.into())
    }

    /// Create a configuration error.
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    /// Create a checkpoint load error.
    pub fn checkpoint_load(message: impl Into<String>) -> Self {
        Self::CheckpointLoad(message.into())
    }

    /// Create a serialization error.
    pub fn serialization(message: impl Into<String>) -> Self {
        Self::Serialization(message.into())
    }

    /// Stage of the lifecycle that produced this error.
    pub fn stage(&self) -> Stage {
        match self {
            Self::Serialization(_) => Stage::Serialize,
            Self::CheckpointLoad(_) => Stage::Load,
            Self::Configuration(_) => Stage::Build,
            Self::Prediction(_) => Stage::Predict,
            Self::Execution(_) | Self::Internal(_) => Stage::Execute,
            Self::Config(_) | Self::Io { .. } => Stage::Setup,
        }
    }

    /// Check if this error was caused by the input data rather than setup.
    ///
    /// Data errors are safe to retry with a corrected batch.
    pub fn is_data_error(&self) -> bool {
        matches!(self, Self::Prediction(_))
    }
}

/// Result type alias for transformers-predictor.
pub type Result<T> = std::result::Result<T, PredictorError>;
