//! Explicit resolution of which model class and task a pipeline is built for.
//!
//! Resolution order:
//! 1. An explicit model class wins; a named task must agree with it.
//! 2. Otherwise an explicit task, loaded through the task's auto class.
//! 3. Otherwise the caller-supplied default task.
//! 4. Otherwise the request is ambiguous and rejected.

use crate::models::{PredictorError, Result};
use crate::pipeline::Task;
use crate::transformers::ModelClass;

/// Resolved build plan, computed once before any pipeline is built.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildPlan {
    /// Load through the task's auto class
    FromTask { task: Task },
    /// Narrow the model to an explicit class
    FromModelClass { model_class: ModelClass },
}

impl BuildPlan {
    /// Resolve the plan from caller options.
    ///
    /// B_i(options determine exactly one task) → Result
    pub fn resolve(
        task: Option<Task>,
        model_class: Option<ModelClass>,
        default_task: Option<Task>,
    ) -> Result<Self> {
        match (task, model_class) {
            (Some(task), Some(class)) if class.task() != task => {
                Err(PredictorError::configuration(format!(
                    "model class {class} serves task '{}' but task '{task}' was requested",
                    class.task()
                )))
            }
            (_, Some(model_class)) => Ok(Self::FromModelClass { model_class }),
            (Some(task), None) => Ok(Self::FromTask { task }),
            (None, None) => match default_task {
                Some(task) => Ok(Self::FromTask { task }),
                None => Err(PredictorError::configuration(
                    "cannot determine pipeline: pass a task, a model class, or a default task",
                )),
            },
        }
    }

    pub fn task(&self) -> Task {
        match self {
            Self::FromTask { task } => *task,
            Self::FromModelClass { model_class } => model_class.task(),
        }
    }

    /// Class the checkpoint's model is loaded as.
    pub fn model_class(&self) -> ModelClass {
        match self {
            Self::FromTask { task } => task.auto_class(),
            Self::FromModelClass { model_class } => *model_class,
        }
    }
}
