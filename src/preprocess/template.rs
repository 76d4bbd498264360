//! Prompt templating.

use super::{Preprocessor, PreprocessorSpec};
use crate::models::{Batch, PredictorError, Result, Value};
use std::sync::atomic::{AtomicBool, Ordering};

/// Placeholder replaced by the cell text.
pub const TEMPLATE_PLACEHOLDER: &str = "{text}";

/// Renders string cells through a template such as `"Q: {text} A:"`.
///
/// With a `column`, only that column is rendered; otherwise every string
/// cell is. Non-string cells pass through.
#[derive(Debug)]
pub struct PromptTemplate {
    template: String,
    column: Option<String>,
    applied: AtomicBool,
}

impl PromptTemplate {
    /// B_i(template contains the placeholder) → Result
    pub fn new(template: impl Into<String>, column: Option<String>) -> Result<Self> {
        let template = template.into();
        if !template.contains(TEMPLATE_PLACEHOLDER) {
            return Err(PredictorError::configuration(format!(
                "prompt template '{template}' has no {TEMPLATE_PLACEHOLDER} placeholder"
            )));
        }
        Ok(Self {
            template,
            column,
            applied: AtomicBool::new(false),
        })
    }

    pub fn render(&self, text: &str) -> String {
        self.template.replace(TEMPLATE_PLACEHOLDER, text)
    }

    fn render_value(&self, value: Value) -> Value {
        match value {
            Value::Str(text) => Value::Str(self.render(&text)),
            other => other,
        }
    }
}

impl Preprocessor for PromptTemplate {
    fn name(&self) -> String {
        "PromptTemplate".to_string()
    }

    fn transform_batch(&self, batch: Batch) -> Result<Batch> {
        let out = match batch {
            Batch::Array(array) if self.column.is_none() => {
                Batch::Array(array.mapv(|v| self.render_value(v)))
            }
            other => {
                if let Some(column) = &self.column {
                    if !other.column_names().contains(column) {
                        return Err(PredictorError::prediction(format!(
                            "prompt template column '{column}' not in batch"
                        )));
                    }
                }
                let records = other
                    .to_records()?
                    .into_iter()
                    .map(|record| {
                        record
                            .into_iter()
                            .map(|(name, value)| {
                                let render = self.column.as_deref().map_or(true, |c| c == name);
                                let value = if render { self.render_value(value) } else { value };
                                (name, value)
                            })
                            .collect()
                    })
                    .collect::<Vec<_>>();
                if records.is_empty() {
                    other
                } else {
                    Batch::from_records(other.format(), &records)?
                }
            }
        };
        self.applied.store(true, Ordering::SeqCst);
        Ok(out)
    }

    fn has_preprocessed(&self) -> bool {
        self.applied.load(Ordering::SeqCst)
    }

    fn spec(&self) -> Option<PreprocessorSpec> {
        Some(PreprocessorSpec::PromptTemplate {
            template: self.template.clone(),
            column: self.column.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::DataFrame;

    #[test]
    fn test_missing_placeholder_is_rejected() {
        assert!(PromptTemplate::new("no placeholder", None).is_err());
    }

    #[test]
    fn test_renders_array_cells() {
        let p = PromptTemplate::new("Q: {text}", None).unwrap();
        let out = p.transform_batch(Batch::array(["a", "b"])).unwrap();
        let records = out.to_records().unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(out, Batch::array(["Q: a", "Q: b"]));
        assert!(p.has_preprocessed());
    }

    #[test]
    fn test_renders_only_named_column() {
        let frame = DataFrame::new(vec![
            ("prompt".into(), vec![Value::from("hi")]),
            ("id".into(), vec![Value::from("x1")]),
        ])
        .unwrap();
        let p = PromptTemplate::new("<{text}>", Some("prompt".into())).unwrap();
        let out = p.transform_batch(Batch::Frame(frame)).unwrap();
        let record = &out.to_records().unwrap()[0];
        assert_eq!(record["prompt"], Value::from("<hi>"));
        assert_eq!(record["id"], Value::from("x1"));
    }

    #[test]
    fn test_unknown_column_is_prediction_error() {
        let p = PromptTemplate::new("{text}", Some("missing".into())).unwrap();
        let err = p.transform_batch(Batch::column("prompt", ["a"])).unwrap_err();
        assert!(err.is_data_error());
        assert!(!p.has_preprocessed());
    }
}
