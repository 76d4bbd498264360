//! Predictor behaviour across batch families, checkpoints and pipelines.

mod common;

use common::{batch_of, checkpoint, detached_checkpoint, generated_texts, prompts, PROMPTS};
use regex::Regex;
use rstest::rstest;
use std::any::Any;
use std::sync::Arc;
use tempfile::TempDir;
use transformers_predictor::models::Record;
use transformers_predictor::pipeline::{
    DefaultPipelineFactory, PipelineInput, PipelineOptions, PipelineParts,
};
use transformers_predictor::predictor::MAX_REPR_LENGTH;
use transformers_predictor::preprocess::IdentityPreprocessor;
use transformers_predictor::{
    Batch, BatchFormat, BuildPlan, CausalLm, FromCheckpointOptions, ModelClass, ModelConfig,
    Pipeline, PipelineFactory, Preprocessor, PreprocessorSpec, PredictorError, Result, Stage, Task,
    TransformersCheckpoint, TransformersPredictor, Value,
};

/// Pipeline substituted through a factory.
#[derive(Debug)]
struct CustomPipeline {
    plan_class: ModelClass,
}

impl Pipeline for CustomPipeline {
    fn task(&self) -> Task {
        Task::TextGeneration
    }

    fn name(&self) -> String {
        "CustomPipeline".into()
    }

    fn run(&self, inputs: &[PipelineInput]) -> Result<Vec<Record>> {
        Ok(inputs.iter().map(|_| Record::new()).collect())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

fn custom_factory(parts: PipelineParts) -> Result<Box<dyn Pipeline>> {
    Ok(Box::new(CustomPipeline {
        plan_class: parts.plan.model_class(),
    }))
}

/// Pipeline and preprocessor with arbitrarily long names.
#[derive(Debug)]
struct LongName(String);

impl Pipeline for LongName {
    fn task(&self) -> Task {
        Task::TextGeneration
    }

    fn name(&self) -> String {
        self.0.clone()
    }

    fn run(&self, inputs: &[PipelineInput]) -> Result<Vec<Record>> {
        Ok(inputs.iter().map(|_| Record::new()).collect())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl Preprocessor for LongName {
    fn name(&self) -> String {
        self.0.clone()
    }

    fn transform_batch(&self, batch: Batch) -> Result<Batch> {
        Ok(batch)
    }

    fn has_preprocessed(&self) -> bool {
        false
    }

    fn spec(&self) -> Option<PreprocessorSpec> {
        None
    }
}

fn text_generation() -> FromCheckpointOptions {
    FromCheckpointOptions::new().task(Task::TextGeneration)
}

#[rstest]
#[case(BatchFormat::Array, 1)]
#[case(BatchFormat::Array, 3)]
#[case(BatchFormat::Array, 100)]
#[case(BatchFormat::Frame, 1)]
#[case(BatchFormat::Frame, 3)]
#[case(BatchFormat::Frame, 100)]
#[case(BatchFormat::Columns, 1)]
#[case(BatchFormat::Columns, 3)]
#[case(BatchFormat::Columns, 100)]
#[case(BatchFormat::Table, 1)]
#[case(BatchFormat::Table, 3)]
#[case(BatchFormat::Table, 100)]
fn predictions_match_input_rows(#[case] format: BatchFormat, #[case] n: usize) {
    let predictor = TransformersPredictor::from_checkpoint(&checkpoint(None, None), &text_generation())
        .unwrap();
    let input = batch_of(format, &prompts(n));
    let before = input.clone();

    let output = predictor.predict(&input).unwrap();

    assert_eq!(output.format(), format);
    assert_eq!(output.num_rows().unwrap(), n);
    assert_eq!(input, before);
}

#[rstest]
#[case(BatchFormat::Array)]
#[case(BatchFormat::Frame)]
#[case(BatchFormat::Columns)]
#[case(BatchFormat::Table)]
fn preprocessor_is_applied(#[case] format: BatchFormat) {
    let prompts: Vec<String> = PROMPTS.iter().map(|p| p.to_string()).collect();
    let input = batch_of(format, &prompts);
    let ckpt = checkpoint(None, None);
    let (model, tokenizer) = ckpt.get_model_and_tokenizer().unwrap();
    let parts = || PipelineParts {
        model: Arc::clone(&model),
        tokenizer: Arc::clone(&tokenizer),
        plan: BuildPlan::FromTask {
            task: Task::TextGeneration,
        },
        options: PipelineOptions::default(),
    };

    let preprocessor = Arc::new(IdentityPreprocessor::new());
    let with = TransformersPredictor::new(
        DefaultPipelineFactory.build(parts()).unwrap(),
        Some(preprocessor.clone() as Arc<dyn Preprocessor>),
    );
    let output = with.predict(&input).unwrap();
    assert_eq!(output.format(), format);
    assert_eq!(output.num_rows().unwrap(), 3);
    assert!(with.preprocessor().unwrap().has_preprocessed());
    assert_eq!(preprocessor.calls(), 1);

    let without = TransformersPredictor::new(
        DefaultPipelineFactory.build(parts()).unwrap(),
        None,
    );
    assert_eq!(without.predict(&input).unwrap().num_rows().unwrap(), 3);
    assert!(without.preprocessor().is_none());
}

#[test]
fn predict_from_persisted_checkpoint() {
    let dir = TempDir::new().unwrap();
    let ckpt = checkpoint(Some(dir.path()), None);
    let predictor = TransformersPredictor::from_checkpoint(&ckpt, &text_generation()).unwrap();

    let input = batch_of(BatchFormat::Frame, &prompts(3));
    let texts = generated_texts(&predictor.predict(&input).unwrap());

    assert_eq!(texts.len(), 3);
    for (text, prompt) in texts.iter().zip(prompts(3)) {
        assert!(text.starts_with(&prompt), "{text:?} should continue {prompt:?}");
    }
}

#[test]
fn round_tripped_checkpoint_predicts_identically() {
    let dir = TempDir::new().unwrap();
    let original = checkpoint(Some(dir.path()), None);
    let dict = original.to_dict().unwrap();
    drop(dir);

    let restored = TransformersCheckpoint::from_dict(dict).unwrap();
    let input = batch_of(BatchFormat::Columns, &prompts(5));

    let a = TransformersPredictor::from_checkpoint(&original, &text_generation())
        .unwrap()
        .predict(&input)
        .unwrap();
    let b = TransformersPredictor::from_checkpoint(&restored, &text_generation())
        .unwrap()
        .predict(&input)
        .unwrap();
    assert_eq!(a, b);

    let c = TransformersPredictor::from_checkpoint(&detached_checkpoint(), &text_generation())
        .unwrap()
        .predict(&input)
        .unwrap();
    assert_eq!(a, c);
}

#[test]
fn repr_of_default_predictor() {
    let repr = format!("{:?}", TransformersPredictor::default());
    let pattern = Regex::new(r"^TransformersPredictor\((.*)\)$").unwrap();
    assert!(repr.len() < MAX_REPR_LENGTH);
    assert!(pattern.is_match(&repr));
}

#[rstest]
#[case(10)]
#[case(200)]
#[case(5000)]
fn repr_is_bounded(#[case] len: usize) {
    let name = format!("Pipeline({})", "x".repeat(len));
    let predictor = TransformersPredictor::new(
        Box::new(LongName(name.clone())),
        Some(Arc::new(LongName(name))),
    );
    let repr = predictor.repr();
    let pattern = Regex::new(r"^TransformersPredictor\((.*)\)$").unwrap();

    assert!(repr.chars().count() < MAX_REPR_LENGTH);
    assert!(pattern.is_match(&repr));
    assert_eq!(repr.matches('(').count(), repr.matches(')').count());
}

#[rstest]
#[case(Some(ModelClass::Gpt2LmHeadModel), None)]
#[case(None, Some(Task::TextGeneration))]
fn custom_pipeline_replaces_builtin(#[case] model_class: Option<ModelClass>, #[case] task: Option<Task>) {
    let mut options = FromCheckpointOptions::new().pipeline_factory(custom_factory);
    options.model_class = model_class;
    options.task = task;

    let predictor = TransformersPredictor::from_checkpoint(&checkpoint(None, None), &options).unwrap();
    let custom = predictor
        .pipeline()
        .unwrap()
        .as_any()
        .downcast_ref::<CustomPipeline>()
        .expect("custom pipeline");

    let expected = model_class.unwrap_or(ModelClass::AutoModelForCausalLm);
    assert_eq!(custom.plan_class, expected);
}

#[test]
fn checkpoint_preprocessor_is_built_per_predictor() {
    let spec = PreprocessorSpec::PromptTemplate {
        template: "Please {text}".into(),
        column: None,
    };
    let ckpt = checkpoint(None, Some(spec));
    let a = TransformersPredictor::from_checkpoint(&ckpt, &text_generation()).unwrap();
    let b = TransformersPredictor::from_checkpoint(&ckpt, &text_generation()).unwrap();

    let out = a.predict(&Batch::array(["complete me"])).unwrap();
    assert!(generated_texts(&out)[0].starts_with("Please complete me"));
    assert!(a.preprocessor().unwrap().has_preprocessed());
    assert!(!b.preprocessor().unwrap().has_preprocessed());
}

#[test]
fn explicit_preprocessor_overrides_checkpoint() {
    let ckpt = checkpoint(None, Some(PreprocessorSpec::Identity));
    let options = text_generation().preprocessor(PreprocessorSpec::PromptTemplate {
        template: "[{text}]".into(),
        column: None,
    });
    let predictor = TransformersPredictor::from_checkpoint(&ckpt, &options).unwrap();
    assert_eq!(predictor.preprocessor().unwrap().name(), "PromptTemplate");
}

#[test]
fn unresolvable_pipeline_is_configuration_error() {
    let err = TransformersPredictor::from_checkpoint(&checkpoint(None, None), &FromCheckpointOptions::new())
        .unwrap_err();
    assert!(matches!(err, PredictorError::Configuration(_)));
    assert_eq!(err.stage(), Stage::Build);
    assert!(!err.is_data_error());

    let err = "fill-mask".parse::<Task>().unwrap_err();
    assert!(matches!(err, PredictorError::Configuration(_)));
}

#[test]
fn incompatible_model_class_is_configuration_error() {
    let tokenizer = common::tokenizer();
    let mut config = ModelConfig::tiny_gpt2(tokenizer.vocab_size(), tokenizer.eos_id());
    config.model_type = "llama".into();
    config.architectures = vec!["LlamaForCausalLM".into()];
    let model = CausalLm::from_config(config).unwrap();
    let ckpt = TransformersCheckpoint::from_model(&model, &tokenizer, None, None).unwrap();

    let options = FromCheckpointOptions::new().model_class(ModelClass::Gpt2LmHeadModel);
    let err = TransformersPredictor::from_checkpoint(&ckpt, &options).unwrap_err();
    assert!(matches!(err, PredictorError::Configuration(_)));

    let auto = FromCheckpointOptions::new().model_class(ModelClass::AutoModelForCausalLm);
    assert!(TransformersPredictor::from_checkpoint(&ckpt, &auto).is_ok());
}

#[test]
fn corrupt_checkpoint_is_load_error() {
    let dir = TempDir::new().unwrap();
    checkpoint(Some(dir.path()), None);
    std::fs::write(dir.path().join("tokenizer.json"), b"{ truncated").unwrap();

    let ckpt = TransformersCheckpoint::from_directory(dir.path()).unwrap();
    let err = TransformersPredictor::from_checkpoint(&ckpt, &text_generation()).unwrap_err();
    assert!(matches!(err, PredictorError::CheckpointLoad(_)));
    assert_eq!(err.stage(), Stage::Load);
}

#[rstest]
#[case(BatchFormat::Columns)]
#[case(BatchFormat::Frame)]
fn malformed_batches_are_prediction_errors(#[case] format: BatchFormat) {
    let predictor = TransformersPredictor::from_checkpoint(&checkpoint(None, None), &text_generation())
        .unwrap();

    let ragged = match format {
        BatchFormat::Columns => {
            let mut columns = transformers_predictor::models::Columns::new();
            columns.insert("a".into(), vec![Value::from("x"), Value::from("y")]);
            columns.insert("b".into(), vec![Value::from("z")]);
            Batch::Columns(columns)
        }
        _ => {
            let frame = transformers_predictor::models::DataFrame::new(vec![
                ("a".into(), vec![Value::Int(1)]),
                ("b".into(), vec![Value::Int(2)]),
            ])
            .unwrap();
            Batch::Frame(frame)
        }
    };
    let err = predictor.predict(&ragged).unwrap_err();
    assert!(err.is_data_error());
    assert_eq!(err.stage(), Stage::Predict);

    // The predictor stays usable after a failed call.
    let ok = predictor.predict(&batch_of(format, &prompts(2))).unwrap();
    assert_eq!(ok.num_rows().unwrap(), 2);
}

#[test]
fn ambiguous_array_rank_is_rejected() {
    let predictor = TransformersPredictor::from_checkpoint(&checkpoint(None, None), &text_generation())
        .unwrap();
    let cube = ndarray::ArrayD::from_elem(ndarray::IxDyn(&[2, 2, 2]), Value::from("x"));
    let err = predictor.predict(&Batch::Array(cube)).unwrap_err();
    assert!(err.to_string().contains("ambiguous"));
}
