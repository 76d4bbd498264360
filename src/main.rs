//! tfpredict CLI - Build checkpoints and run batch text generation over them.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::{debug, info, Level};
use tracing_subscriber::FmtSubscriber;
use transformers_predictor::{
    Batch, BatchPredictOptions, BatchPredictor, CausalLm, Config, Dataset, FromCheckpointOptions,
    ModelConfig, Preprocessor, Task, Tokenizer, TransformersCheckpoint, TransformersPredictor,
};
use transformers_predictor::preprocess::PromptTemplate;

#[derive(Parser)]
#[command(name = "tfpredict")]
#[command(version)]
#[command(about = "Checkpoint-backed batch prediction for causal text generation")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to configuration file
    #[arg(short, long, global = true, default_value = "config.toml")]
    config: PathBuf,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a tiny randomly initialised checkpoint
    Init {
        /// Checkpoint directory to create
        #[arg(short, long)]
        output: PathBuf,

        /// Text file whose whitespace-separated words form the vocabulary
        #[arg(long)]
        vocab: PathBuf,

        /// Weight initialisation seed
        #[arg(long, default_value = "0")]
        seed: u64,

        /// Prompt template stored as the checkpoint's preprocessor
        #[arg(long)]
        template: Option<String>,
    },

    /// Generate text for every prompt in a file
    Predict {
        /// Text file with one prompt per line
        #[arg(short, long)]
        prompts: PathBuf,

        /// Path to output JSONL file
        #[arg(short, long)]
        output: PathBuf,

        /// Checkpoint directory (overrides config)
        #[arg(long)]
        checkpoint: Option<PathBuf>,

        /// Task to build the pipeline for (overrides config)
        #[arg(long)]
        task: Option<Task>,
    },

    /// Show a checkpoint's manifest
    Inspect {
        /// Checkpoint directory
        checkpoint: PathBuf,
    },

    /// Validate configuration file
    Validate,

    /// Show example configuration
    Example,
}

fn setup_logging(verbose: bool) {
    let level = if verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_thread_ids(false)
        .compact()
        .finish();
    tracing::subscriber::set_global_default(subscriber).expect("Failed to set subscriber");
}

fn print_example_config() {
    let example = r#"# tfpredict configuration file

[predictor]
# Task used when none is passed on the command line
task = "text-generation"
# model_class = "GPT2LMHeadModel"

[generation]
max_new_tokens = 8
return_full_text = true

[batch]
num_partitions = 4
concurrency = 4
# batch_size = 32

[checkpoint]
path = "${HOME}/checkpoints/tiny-gpt2"
"#;
    println!("{example}");
}

/// Load the config file, falling back to defaults when it does not exist.
fn load_config(path: &Path) -> Result<Config> {
    if !path.exists() {
        debug!(path = %path.display(), "No config file, using defaults");
        return Ok(Config::default());
    }
    Config::from_file(path).with_context(|| format!("Failed to load config from {path:?}"))
}

fn read_prompts(path: &Path) -> Result<Vec<String>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read prompts from {path:?}"))?;
    let prompts: Vec<String> = content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(String::from)
        .collect();
    info!(count = prompts.len(), "Loaded prompts");
    Ok(prompts)
}

fn init_checkpoint(output: &Path, vocab: &Path, seed: u64, template: Option<String>) -> Result<()> {
    let text = std::fs::read_to_string(vocab)
        .with_context(|| format!("Failed to read vocabulary from {vocab:?}"))?;
    let tokenizer = Tokenizer::word_level(text.split_whitespace(), true)?;
    let config = ModelConfig::tiny_gpt2(tokenizer.vocab_size(), tokenizer.eos_id()).with_seed(seed);
    let model = CausalLm::from_config(config)?;
    let preprocessor = template
        .map(|template| PromptTemplate::new(template, None))
        .transpose()
        .context("Invalid prompt template")?;

    let checkpoint = TransformersCheckpoint::from_model(
        &model,
        &tokenizer,
        Some(output),
        preprocessor.as_ref().map(|p| p as &dyn Preprocessor),
    )
    .context("Failed to create checkpoint")?;

    println!("Checkpoint:  {}", checkpoint.manifest().id);
    println!("Vocabulary:  {}", tokenizer.vocab_size());
    println!("Output:      {output:?}");
    Ok(())
}

async fn run_predict(
    config: Config,
    prompts: &Path,
    output: &Path,
    checkpoint: Option<PathBuf>,
    task: Option<Task>,
) -> Result<()> {
    let start = Instant::now();
    let checkpoint_dir = checkpoint
        .or_else(|| config.checkpoint.resolve_path())
        .context("No checkpoint given: pass --checkpoint or set [checkpoint].path")?;
    let checkpoint = TransformersCheckpoint::from_directory(&checkpoint_dir)
        .with_context(|| format!("Failed to open checkpoint {checkpoint_dir:?}"))?;

    let mut options = FromCheckpointOptions::from_config(&config);
    options.task = task;

    let prompts = read_prompts(prompts)?;
    let total = prompts.len();
    let dataset = Dataset::from_batch(Batch::column("prompt", prompts), config.batch.num_partitions)?
        .with_concurrency(config.batch.concurrency);

    let predictor = BatchPredictor::<TransformersPredictor>::from_checkpoint(checkpoint, options);
    let predict_options = BatchPredictOptions::from_config(&config.batch).keep_columns(["prompt"]);
    let predictions = predictor.predict(&dataset, &predict_options);

    let spinner = ProgressBar::new_spinner();
    spinner.set_style(ProgressStyle::default_spinner().template("{spinner} [{elapsed_precise}] {msg}")?);
    spinner.set_message(format!(
        "Predicting {total} prompts over {} partitions",
        dataset.num_partitions()
    ));
    spinner.enable_steady_tick(Duration::from_millis(100));
    let result = predictions.take_all().await;
    spinner.finish_and_clear();
    let batch = result.context("Batch prediction failed")?;

    let file = File::create(output).with_context(|| format!("Failed to create {output:?}"))?;
    let mut writer = BufWriter::new(file);
    let records = batch.to_records()?;
    for record in &records {
        serde_json::to_writer(&mut writer, record)?;
        writeln!(writer)?;
    }
    writer.flush()?;

    println!("\n=== Prediction Complete ===");
    println!("Prompts:     {total}");
    println!("Outputs:     {}", records.len());
    println!("Partitions:  {}", dataset.num_partitions());
    println!("Runtime:     {:.1}s", start.elapsed().as_secs_f64());
    println!("Output:      {output:?}");
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_logging(cli.verbose);

    match cli.command {
        Commands::Example => {
            print_example_config();
        }

        Commands::Validate => {
            let config = Config::from_file(&cli.config)
                .with_context(|| format!("Failed to load config from {:?}", cli.config))?;

            info!("Configuration is valid");
            match config.predictor.task {
                Some(task) => info!("  Default task: {task}"),
                None => info!("  Default task: none (must be passed per run)"),
            }
            if let Some(class) = config.predictor.model_class {
                info!("  Model class: {class}");
            }
            info!(
                "  Partitions: {} ({} concurrent)",
                config.batch.num_partitions, config.batch.concurrency
            );
            if let Some(path) = config.checkpoint.resolve_path() {
                info!("  Checkpoint: {}", path.display());
            }
        }

        Commands::Init {
            output,
            vocab,
            seed,
            template,
        } => {
            init_checkpoint(&output, &vocab, seed, template)?;
        }

        Commands::Predict {
            prompts,
            output,
            checkpoint,
            task,
        } => {
            let config = load_config(&cli.config)?;
            run_predict(config, &prompts, &output, checkpoint, task).await?;
        }

        Commands::Inspect { checkpoint } => {
            let opened = TransformersCheckpoint::from_directory(&checkpoint)
                .with_context(|| format!("Failed to open checkpoint {checkpoint:?}"))?;
            let manifest = opened.manifest();
            println!("Checkpoint:    {}", manifest.id);
            println!("Format:        v{}", manifest.format_version);
            println!("Created:       {}", manifest.created_at);
            println!("Model type:    {}", manifest.model_type);
            println!("Architectures: {}", manifest.architectures.join(", "));
            println!("Files:         {}", manifest.files.join(", "));
            if let Some(spec) = opened.preprocessor() {
                println!("Preprocessor:  {}", serde_json::to_string(spec)?);
            }
        }
    }

    Ok(())
}
