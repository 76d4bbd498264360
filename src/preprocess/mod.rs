//! Preprocessors applied to batches before inference.
//!
//! Epistemic foundation:
//! - K_i: A preprocessor reports whether it has transformed at least one batch
//! - K_i: Persisted checkpoints carry a [`PreprocessorSpec`], never live state,
//!   so every predictor gets its own instance
//! - B_i: A transform may reject a batch → Result

mod chain;
mod template;

pub use chain::*;
pub use template::*;

use crate::models::{Batch, PredictorError, Result};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// A stateful batch transform.
pub trait Preprocessor: Send + Sync + std::fmt::Debug {
    /// Display name, used in predictor representations.
    fn name(&self) -> String;

    /// Learn any state the transform needs from a batch.
    ///
    /// Stateless preprocessors have nothing to learn.
    fn fit(&self, _batch: &Batch) -> Result<()> {
        Ok(())
    }

    /// Transform one batch, keeping its family and row count.
    fn transform_batch(&self, batch: Batch) -> Result<Batch>;

    /// Whether `transform_batch` has completed at least once.
    fn has_preprocessed(&self) -> bool;

    /// Serializable description, if this preprocessor can be persisted.
    fn spec(&self) -> Option<PreprocessorSpec>;

    /// Transform several batches in order.
    fn transform(&self, batches: Vec<Batch>) -> Result<Vec<Batch>> {
        batches
            .into_iter()
            .map(|batch| self.transform_batch(batch))
            .collect()
    }
}

/// Persisted description of a preprocessor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PreprocessorSpec {
    /// Pass batches through unchanged
    Identity,
    /// Render string cells through a template
    PromptTemplate {
        template: String,
        #[serde(default)]
        column: Option<String>,
    },
    /// Apply several preprocessors in order
    Chain { steps: Vec<PreprocessorSpec> },
}

impl PreprocessorSpec {
    /// Build a fresh preprocessor instance.
    ///
    /// B_i(spec is valid) → Result
    pub fn build(&self) -> Result<Arc<dyn Preprocessor>> {
        Ok(match self {
            Self::Identity => Arc::new(IdentityPreprocessor::new()),
            Self::PromptTemplate { template, column } => {
                Arc::new(PromptTemplate::new(template.clone(), column.clone())?)
            }
            Self::Chain { steps } => {
                let steps = steps
                    .iter()
                    .map(PreprocessorSpec::build)
                    .collect::<Result<Vec<_>>>()?;
                Arc::new(Chain::new(steps))
            }
        })
    }

    /// Serialize to `preprocessor.json` bytes.
    pub fn to_json(&self) -> Result<Vec<u8>> {
        serde_json::to_vec_pretty(self)
            .map_err(|e| PredictorError::serialization(format!("preprocessor: {e}")))
    }
}

/// Passes batches through unchanged, counting calls.
#[derive(Debug, Default)]
pub struct IdentityPreprocessor {
    calls: AtomicUsize,
}

impl IdentityPreprocessor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of batches transformed so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Preprocessor for IdentityPreprocessor {
    fn name(&self) -> String {
        "IdentityPreprocessor".to_string()
    }

    fn transform_batch(&self, batch: Batch) -> Result<Batch> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(batch)
    }

    fn has_preprocessed(&self) -> bool {
        self.calls() > 0
    }

    fn spec(&self) -> Option<PreprocessorSpec> {
        Some(PreprocessorSpec::Identity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_flags_after_transform() {
        let p = IdentityPreprocessor::new();
        assert!(!p.has_preprocessed());
        let out = p.transform(vec![Batch::array(["a"]), Batch::array(["b"])]).unwrap();
        assert_eq!(out.len(), 2);
        assert_eq!(p.calls(), 2);
        assert!(p.has_preprocessed());
    }

    #[test]
    fn test_default_fit_leaves_preprocessor_unapplied() {
        let p = IdentityPreprocessor::new();
        p.fit(&Batch::array(["a"])).unwrap();
        assert_eq!(p.calls(), 0);
        assert!(!p.has_preprocessed());
    }

    #[test]
    fn test_spec_json_shape() {
        let spec = PreprocessorSpec::PromptTemplate {
            template: "Q: {text}".into(),
            column: None,
        };
        let json: serde_json::Value = serde_json::from_slice(&spec.to_json().unwrap()).unwrap();
        assert_eq!(json["type"], "prompt_template");
        let back: PreprocessorSpec = serde_json::from_value(json).unwrap();
        assert_eq!(back, spec);
    }

    #[test]
    fn test_build_gives_fresh_instances() {
        let spec = PreprocessorSpec::Identity;
        let a = spec.build().unwrap();
        let b = spec.build().unwrap();
        a.transform_batch(Batch::array(["x"])).unwrap();
        assert!(a.has_preprocessed());
        assert!(!b.has_preprocessed());
    }
}
