//! Self-contained checkpoint representation and its manifest.

use crate::models::{PredictorError, Result};
use crate::transformers::ModelConfig;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Component, Path};
use uuid::Uuid;

/// Checkpoint layout version written by this crate.
pub const FORMAT_VERSION: u32 = 1;

/// Manifest artifact.
pub const MANIFEST_FILE: &str = "checkpoint.json";
/// Model config artifact.
pub const CONFIG_FILE: &str = "config.json";
/// Model weights artifact.
pub const WEIGHTS_FILE: &str = "model.json";
/// Tokenizer artifact.
pub const TOKENIZER_FILE: &str = "tokenizer.json";
/// Optional preprocessor artifact.
pub const PREPROCESSOR_FILE: &str = "preprocessor.json";

/// Artifacts every checkpoint must carry besides the manifest.
pub const REQUIRED_FILES: [&str; 3] = [CONFIG_FILE, WEIGHTS_FILE, TOKENIZER_FILE];

/// Whether `name` is a bare file name: exactly one normal path component,
/// so joining it onto a checkpoint directory stays inside that directory.
pub fn is_artifact_name(name: &str) -> bool {
    let mut components = Path::new(name).components();
    matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    ) && !name.ends_with(['/', '\\'])
}

/// B_i(artifact name stays inside the checkpoint directory) → Result
pub(crate) fn check_artifact_name(name: &str) -> Result<()> {
    if is_artifact_name(name) {
        Ok(())
    } else {
        Err(PredictorError::checkpoint_load(format!(
            "invalid artifact name {name:?}: must be a plain file name"
        )))
    }
}

/// Describes a checkpoint (`checkpoint.json`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    /// Layout version
    pub format_version: u32,
    /// Unique checkpoint ID
    pub id: String,
    /// When the checkpoint was snapshotted
    pub created_at: DateTime<Utc>,
    /// Model family
    pub model_type: String,
    /// Concrete model classes able to load the weights
    pub architectures: Vec<String>,
    /// Artifact names, excluding the manifest
    pub files: Vec<String>,
}

impl Manifest {
    pub(crate) fn new(config: &ModelConfig, files: Vec<String>) -> Self {
        Self {
            format_version: FORMAT_VERSION,
            id: Uuid::new_v4().to_string(),
            created_at: Utc::now(),
            model_type: config.model_type.clone(),
            architectures: config.architectures.clone(),
            files,
        }
    }

    /// Parse and check a manifest.
    ///
    /// B_i(manifest is valid JSON) → Result
    /// B_i(format version is supported) → Result
    /// B_i(every listed artifact is a plain file name) → Result
    pub fn from_json(bytes: &[u8]) -> Result<Self> {
        let manifest: Self = serde_json::from_slice(bytes)
            .map_err(|e| PredictorError::checkpoint_load(format!("{MANIFEST_FILE}: {e}")))?;
        if manifest.format_version != FORMAT_VERSION {
            return Err(PredictorError::checkpoint_load(format!(
                "checkpoint format version {} is not supported (expected {FORMAT_VERSION})",
                manifest.format_version
            )));
        }
        for name in &manifest.files {
            check_artifact_name(name)?;
        }
        for required in REQUIRED_FILES {
            if !manifest.files.iter().any(|f| f == required) {
                return Err(PredictorError::checkpoint_load(format!(
                    "manifest does not list required artifact {required}"
                )));
            }
        }
        Ok(manifest)
    }

    pub fn to_json(&self) -> Result<Vec<u8>> {
        serde_json::to_vec_pretty(self)
            .map_err(|e| PredictorError::serialization(format!("{MANIFEST_FILE}: {e}")))
    }

    pub fn has_file(&self, name: &str) -> bool {
        self.files.iter().any(|f| f == name)
    }
}

/// In-memory checkpoint: artifact name → bytes.
///
/// K_i: Holds no filesystem reference; survives deletion of any directory
/// it was read from.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckpointDict {
    entries: BTreeMap<String, Vec<u8>>,
}

impl CheckpointDict {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, bytes: Vec<u8>) {
        self.entries.insert(name.into(), bytes);
    }

    pub fn get(&self, name: &str) -> Option<&[u8]> {
        self.entries.get(name).map(Vec::as_slice)
    }

    pub fn remove(&mut self, name: &str) -> Option<Vec<u8>> {
        self.entries.remove(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[u8])> {
        self.entries
            .iter()
            .map(|(name, bytes)| (name.as_str(), bytes.as_slice()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Fetch a required artifact.
    pub(crate) fn require(&self, name: &str) -> Result<&[u8]> {
        self.get(name).ok_or_else(|| {
            PredictorError::checkpoint_load(format!("checkpoint is missing artifact {name}"))
        })
    }
}

impl From<BTreeMap<String, Vec<u8>>> for CheckpointDict {
    fn from(entries: BTreeMap<String, Vec<u8>>) -> Self {
        Self { entries }
    }
}

impl From<CheckpointDict> for BTreeMap<String, Vec<u8>> {
    fn from(dict: CheckpointDict) -> Self {
        dict.entries
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manifest() -> Manifest {
        let files = REQUIRED_FILES.iter().map(|f| f.to_string()).collect();
        Manifest::new(&ModelConfig::tiny_gpt2(4, 1), files)
    }

    #[test]
    fn test_manifest_round_trip() {
        let m = manifest();
        assert_eq!(Manifest::from_json(&m.to_json().unwrap()).unwrap(), m);
        assert!(m.has_file(TOKENIZER_FILE));
        assert!(!m.has_file(PREPROCESSOR_FILE));
    }

    #[test]
    fn test_future_version_is_rejected() {
        let mut m = manifest();
        m.format_version = FORMAT_VERSION + 1;
        let err = Manifest::from_json(&m.to_json().unwrap()).unwrap_err();
        assert!(err.to_string().contains("not supported"));
    }

    #[test]
    fn test_manifest_must_list_required_files() {
        let mut m = manifest();
        m.files.retain(|f| f != WEIGHTS_FILE);
        assert!(matches!(
            Manifest::from_json(&m.to_json().unwrap()),
            Err(PredictorError::CheckpointLoad(_))
        ));
    }

    #[test]
    fn test_artifact_names_are_plain_file_names() {
        for name in ["model.json", "checkpoint.json", "weights.v2.bin"] {
            assert!(is_artifact_name(name), "{name}");
        }
        for name in ["", ".", "..", "../model.json", "a/b.json", "/etc/passwd", "dir/"] {
            assert!(!is_artifact_name(name), "{name}");
        }
    }

    #[test]
    fn test_manifest_with_escaping_file_is_rejected() {
        let mut m = manifest();
        m.files.push("../outside.json".into());
        let err = Manifest::from_json(&m.to_json().unwrap()).unwrap_err();
        assert!(matches!(err, PredictorError::CheckpointLoad(_)));
        assert!(err.to_string().contains("invalid artifact name"));
    }

    #[test]
    fn test_require_missing_artifact() {
        let dict = CheckpointDict::new();
        assert!(matches!(
            dict.require(CONFIG_FILE),
            Err(PredictorError::CheckpointLoad(_))
        ));
    }
}
