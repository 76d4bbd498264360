//! Sequential composition of preprocessors.

use super::{Preprocessor, PreprocessorSpec};
use crate::models::{Batch, Result};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Applies its steps in order.
#[derive(Debug)]
pub struct Chain {
    steps: Vec<Arc<dyn Preprocessor>>,
    applied: AtomicBool,
}

impl Chain {
    pub fn new(steps: Vec<Arc<dyn Preprocessor>>) -> Self {
        Self {
            steps,
            applied: AtomicBool::new(false),
        }
    }

    pub fn steps(&self) -> &[Arc<dyn Preprocessor>] {
        &self.steps
    }
}

impl Preprocessor for Chain {
    fn name(&self) -> String {
        let names: Vec<String> = self.steps.iter().map(|s| s.name()).collect();
        format!("Chain({})", names.join(", "))
    }

    /// Fits each step on the output of the steps before it.
    fn fit(&self, batch: &Batch) -> Result<()> {
        let Some((last, leading)) = self.steps.split_last() else {
            return Ok(());
        };
        let mut batch = batch.clone();
        for step in leading {
            step.fit(&batch)?;
            batch = step.transform_batch(batch)?;
        }
        last.fit(&batch)
    }

    fn transform_batch(&self, batch: Batch) -> Result<Batch> {
        let out = self
            .steps
            .iter()
            .try_fold(batch, |batch, step| step.transform_batch(batch))?;
        self.applied.store(true, Ordering::SeqCst);
        Ok(out)
    }

    fn has_preprocessed(&self) -> bool {
        self.applied.load(Ordering::SeqCst)
    }

    /// `None` if any step cannot be persisted.
    fn spec(&self) -> Option<PreprocessorSpec> {
        let steps = self
            .steps
            .iter()
            .map(|s| s.spec())
            .collect::<Option<Vec<_>>>()?;
        Some(PreprocessorSpec::Chain { steps })
    }
}
