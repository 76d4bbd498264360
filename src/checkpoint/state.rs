//! Transformers checkpoint: model, tokenizer and optional preprocessor.
//!
//! Epistemic foundation:
//! - K_i: A checkpoint is immutable once constructed
//! - K_i: `from_dict(to_dict(c))` behaves like `c` and holds no path
//! - B_i: Persisted state may be missing or corrupt → Result on first access
//! - I^B: Directory-backed checkpoints read artifacts lazily from disk

use super::dict::{
    check_artifact_name, CheckpointDict, Manifest, CONFIG_FILE, MANIFEST_FILE, PREPROCESSOR_FILE,
    TOKENIZER_FILE, WEIGHTS_FILE,
};
use super::store;
use crate::models::{PredictorError, Result};
use crate::preprocess::{Preprocessor, PreprocessorSpec};
use crate::transformers::{CausalLm, Tokenizer};
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};
use tracing::{debug, info};

/// Where a checkpoint's artifacts live.
#[derive(Debug, Clone)]
enum Source {
    Dict(CheckpointDict),
    Directory(PathBuf),
}

/// Serializable bundle of a causal LM, its tokenizer and an optional
/// preprocessor.
#[derive(Debug, Clone)]
pub struct TransformersCheckpoint {
    source: Source,
    manifest: Manifest,
    preprocessor: Option<PreprocessorSpec>,
    loaded: OnceLock<(Arc<CausalLm>, Arc<Tokenizer>)>,
}

/// Parse and check a persisted preprocessor spec.
fn parse_preprocessor(bytes: &[u8]) -> Result<PreprocessorSpec> {
    let spec: PreprocessorSpec = serde_json::from_slice(bytes)
        .map_err(|e| PredictorError::checkpoint_load(format!("{PREPROCESSOR_FILE}: {e}")))?;
    spec.build()
        .map_err(|e| PredictorError::checkpoint_load(format!("{PREPROCESSOR_FILE}: {e}")))?;
    Ok(spec)
}

impl TransformersCheckpoint {
    /// Snapshot an in-memory model and tokenizer.
    ///
    /// With a `path`, the checkpoint is also written there and becomes
    /// directory-backed. A preprocessor is persisted through its
    /// [`Preprocessor::spec`]; its live state is not kept.
    ///
    /// B_i(model and tokenizer can be serialized) → Result
    /// B_i(preprocessor has a persistable spec) → Result
    /// B_i(path is writable) → Result
    pub fn from_model(
        model: &CausalLm,
        tokenizer: &Tokenizer,
        path: Option<&Path>,
        preprocessor: Option<&dyn Preprocessor>,
    ) -> Result<Self> {
        let preprocessor = preprocessor
            .map(|p| {
                p.spec().ok_or_else(|| {
                    PredictorError::serialization(format!(
                        "preprocessor {} cannot be persisted",
                        p.name()
                    ))
                })
            })
            .transpose()?;
        let (config_bytes, weight_bytes) = model.to_artifacts()?;
        let tokenizer_bytes = tokenizer.to_json()?;

        let mut dict = CheckpointDict::new();
        dict.insert(CONFIG_FILE, config_bytes);
        dict.insert(WEIGHTS_FILE, weight_bytes);
        dict.insert(TOKENIZER_FILE, tokenizer_bytes);
        if let Some(spec) = &preprocessor {
            dict.insert(PREPROCESSOR_FILE, spec.to_json()?);
        }

        let manifest = Manifest::new(model.config(), dict.names().map(String::from).collect());
        dict.insert(MANIFEST_FILE, manifest.to_json()?);

        let source = match path {
            Some(dir) => {
                store::write_dir(dir, &dict)?;
                Source::Directory(dir.to_path_buf())
            }
            None => Source::Dict(dict),
        };

        let loaded = OnceLock::new();
        let _ = loaded.set((Arc::new(model.clone()), Arc::new(tokenizer.clone())));

        info!(
            checkpoint_id = %manifest.id,
            persisted = path.is_some(),
            "Created checkpoint from model"
        );
        Ok(Self {
            source,
            manifest,
            preprocessor,
            loaded,
        })
    }

    /// Rebuild a checkpoint from its in-memory representation. No I/O.
    ///
    /// The manifest and preprocessor are checked eagerly; model and tokenizer
    /// bytes are decoded on first use.
    ///
    /// B_i(dict holds a compatible manifest and every listed artifact) → Result
    /// B_i(every entry is a plain file name) → Result
    pub fn from_dict(dict: CheckpointDict) -> Result<Self> {
        for name in dict.names() {
            check_artifact_name(name)?;
        }
        let manifest = Manifest::from_json(dict.require(MANIFEST_FILE)?)?;
        for name in &manifest.files {
            dict.require(name)?;
        }
        let preprocessor = if manifest.has_file(PREPROCESSOR_FILE) {
            Some(parse_preprocessor(dict.require(PREPROCESSOR_FILE)?)?)
        } else {
            None
        };

        debug!(checkpoint_id = %manifest.id, "Checkpoint restored from dict");
        Ok(Self {
            source: Source::Dict(dict),
            manifest,
            preprocessor,
            loaded: OnceLock::new(),
        })
    }

    /// Open a checkpoint directory.
    ///
    /// Reads the manifest and preprocessor now; model and tokenizer are read
    /// on first use.
    pub fn from_directory(path: &Path) -> Result<Self> {
        let manifest = Manifest::from_json(&store::read_file(path, MANIFEST_FILE)?)?;
        let preprocessor = if manifest.has_file(PREPROCESSOR_FILE) {
            Some(parse_preprocessor(&store::read_file(path, PREPROCESSOR_FILE)?)?)
        } else {
            None
        };

        debug!(checkpoint_id = %manifest.id, path = %path.display(), "Checkpoint opened");
        Ok(Self {
            source: Source::Directory(path.to_path_buf()),
            manifest,
            preprocessor,
            loaded: OnceLock::new(),
        })
    }

    /// Fully self-contained representation, holding no filesystem reference.
    ///
    /// Directory-backed checkpoints are read eagerly.
    pub fn to_dict(&self) -> Result<CheckpointDict> {
        match &self.source {
            Source::Dict(dict) => Ok(dict.clone()),
            Source::Directory(dir) => {
                let names = std::iter::once(MANIFEST_FILE)
                    .chain(self.manifest.files.iter().map(String::as_str));
                store::read_dir(dir, names)
            }
        }
    }

    /// Persist this checkpoint into a directory.
    pub fn to_directory(&self, path: &Path) -> Result<()> {
        store::write_dir(path, &self.to_dict()?)
    }

    /// Model and tokenizer, loaded on first call and cached.
    ///
    /// B_i(artifacts are present and intact) → Result
    pub fn get_model_and_tokenizer(&self) -> Result<(Arc<CausalLm>, Arc<Tokenizer>)> {
        if let Some((model, tokenizer)) = self.loaded.get() {
            return Ok((Arc::clone(model), Arc::clone(tokenizer)));
        }

        let loaded = self.load()?;
        let (model, tokenizer) = self.loaded.get_or_init(|| loaded);
        Ok((Arc::clone(model), Arc::clone(tokenizer)))
    }

    fn load(&self) -> Result<(Arc<CausalLm>, Arc<Tokenizer>)> {
        let (model, tokenizer) = match &self.source {
            Source::Dict(dict) => (
                CausalLm::from_artifacts(dict.require(CONFIG_FILE)?, dict.require(WEIGHTS_FILE)?)?,
                Tokenizer::from_json(dict.require(TOKENIZER_FILE)?)?,
            ),
            Source::Directory(dir) => (
                CausalLm::from_artifacts(
                    &store::read_file(dir, CONFIG_FILE)?,
                    &store::read_file(dir, WEIGHTS_FILE)?,
                )?,
                Tokenizer::from_json(&store::read_file(dir, TOKENIZER_FILE)?)?,
            ),
        };

        if model.config().vocab_size != tokenizer.vocab_size() {
            return Err(PredictorError::checkpoint_load(format!(
                "model vocab_size {} does not match tokenizer vocabulary of {}",
                model.config().vocab_size,
                tokenizer.vocab_size()
            )));
        }

        info!(
            checkpoint_id = %self.manifest.id,
            vocab_size = tokenizer.vocab_size(),
            "Loaded model and tokenizer"
        );
        Ok((Arc::new(model), Arc::new(tokenizer)))
    }

    /// Directory this checkpoint reads from, if any.
    pub fn path(&self) -> Option<&Path> {
        match &self.source {
            Source::Directory(dir) => Some(dir),
            Source::Dict(_) => None,
        }
    }

    pub fn preprocessor(&self) -> Option<&PreprocessorSpec> {
        self.preprocessor.as_ref()
    }

    pub fn manifest(&self) -> &Manifest {
        &self.manifest
    }
}
