//! Configuration models for transformers-predictor.
//!
//! All I^R (resolvable ignorance) is parameterized here.
//! The user resolves these unknowns at runtime via config file.

use crate::pipeline::{PipelineOptions, Task};
use crate::transformers::ModelClass;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Top-level configuration.
///
/// I^R resolved: All configurable parameters are explicit.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Pipeline resolution settings
    #[serde(default)]
    pub predictor: PredictorConfig,

    /// Generation settings passed to the pipeline
    #[serde(default)]
    pub generation: PipelineOptions,

    /// Partitioned batch prediction settings
    #[serde(default)]
    pub batch: BatchConfig,

    /// Checkpoint location
    #[serde(default)]
    pub checkpoint: CheckpointConfig,
}

/// How a predictor resolves its pipeline when built from a checkpoint.
///
/// K_i: There is no implicit global default. A task only applies if it is
/// written down here (or passed explicitly by the caller).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PredictorConfig {
    /// Default task used when the caller names neither a task nor a model class
    #[serde(default)]
    pub task: Option<Task>,

    /// Model class used to narrow the loaded model
    #[serde(default)]
    pub model_class: Option<ModelClass>,
}

/// Batch prediction configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchConfig {
    /// Number of partitions the input dataset is split into
    #[serde(default = "default_num_partitions")]
    pub num_partitions: usize,

    /// Maximum number of partitions predicted concurrently
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// Rows per predict call inside a partition (whole partition if unset)
    #[serde(default)]
    pub batch_size: Option<usize>,
}

fn default_num_partitions() -> usize {
    4
}

fn default_concurrency() -> usize {
    4
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            num_partitions: default_num_partitions(),
            concurrency: default_concurrency(),
            batch_size: None,
        }
    }
}

/// Checkpoint location configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CheckpointConfig {
    /// Checkpoint directory (supports ${ENV_VAR} expansion)
    #[serde(default)]
    pub path: Option<String>,
}

impl CheckpointConfig {
    /// Resolve the checkpoint directory, expanding environment variables.
    pub fn resolve_path(&self) -> Option<PathBuf> {
        self.path.as_deref().map(|p| PathBuf::from(expand_env_vars(p)))
    }
}

impl Config {
    /// Load configuration from a TOML file.
    ///
    /// B_i(file exists) → Result
    /// B_i(file is valid TOML) → Result
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::FileRead {
            path: path.to_owned(),
            source: e,
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::Parse {
            path: path.to_owned(),
            source: e,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Validate value ranges that serde cannot express.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.batch.num_partitions == 0 {
            return Err(ConfigError::Invalid(
                "batch.num_partitions must be at least 1".to_string(),
            ));
        }
        if self.batch.concurrency == 0 {
            return Err(ConfigError::Invalid(
                "batch.concurrency must be at least 1".to_string(),
            ));
        }
        if self.batch.batch_size == Some(0) {
            return Err(ConfigError::Invalid(
                "batch.batch_size must be at least 1 when set".to_string(),
            ));
        }
        if let (Some(task), Some(class)) = (self.predictor.task, self.predictor.model_class) {
            if class.task() != task {
                return Err(ConfigError::Invalid(format!(
                    "predictor.model_class {class} serves task '{}', not '{task}'",
                    class.task()
                )));
            }
        }
        Ok(())
    }
}

/// Expand environment variables in a string.
///
/// Supports ${VAR_NAME} syntax.
/// If the variable is not set, the placeholder is left unchanged.
pub fn expand_env_vars(s: &str) -> String {
    let re = regex::Regex::new(r"\$\{([^}]+)\}").expect("static regex is valid");

    re.replace_all(s, |cap: &regex::Captures<'_>| {
        std::env::var(&cap[1]).unwrap_or_else(|_| cap[0].to_string())
    })
    .into_owned()
}

/// Configuration errors.
///
/// Epistemic origin:
/// - B_i falsified: File not found, parse error
/// - I^B materialized: Out-of-range values
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    FileRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_parse_full_config() {
        let config: Config = toml::from_str(
            r#"
[predictor]
task = "text-generation"
model_class = "GPT2LMHeadModel"

[generation]
max_new_tokens = 3
return_full_text = false

[batch]
num_partitions = 2
concurrency = 1
batch_size = 16

[checkpoint]
path = "checkpoints/tiny"
"#,
        )
        .unwrap();

        assert_eq!(config.predictor.task, Some(Task::TextGeneration));
        assert_eq!(config.predictor.model_class, Some(ModelClass::Gpt2LmHeadModel));
        assert_eq!(config.generation.max_new_tokens, 3);
        assert!(!config.generation.return_full_text);
        assert_eq!(config.batch.num_partitions, 2);
        assert_eq!(config.batch.batch_size, Some(16));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_empty_config_has_no_default_task() {
        let config: Config = toml::from_str("").unwrap();
        assert!(config.predictor.task.is_none());
        assert!(config.predictor.model_class.is_none());
        assert_eq!(config.batch.num_partitions, 4);
    }

    #[test]
    fn test_validate_rejects_zero_partitions() {
        let mut config = Config::default();
        config.batch.num_partitions = 0;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_from_file_reports_parse_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[batch]\nnum_partitions = \"many\"").unwrap();
        let err = Config::from_file(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn test_expand_env_vars() {
        std::env::set_var("TFPREDICT_TEST_ROOT", "/data");
        assert_eq!(expand_env_vars("${TFPREDICT_TEST_ROOT}/ckpt"), "/data/ckpt");
        assert_eq!(
            expand_env_vars("${TFPREDICT_TEST_UNSET_VAR}/ckpt"),
            "${TFPREDICT_TEST_UNSET_VAR}/ckpt"
        );
    }
}
