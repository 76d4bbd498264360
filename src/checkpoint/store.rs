//! Directory persistence for checkpoints.
//!
//! Epistemic foundation:
//! - K_i: Every artifact is written atomically (write-then-rename)
//! - K_i: The manifest is written last, so a directory with a manifest is complete
//! - K_i: Only plain file names are joined onto the directory
//! - B_i: Directory may be missing or unreadable → Result

use super::dict::{is_artifact_name, CheckpointDict, MANIFEST_FILE};
use crate::models::{PredictorError, Result};
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::Path;
use tracing::{debug, info};

/// Write one artifact atomically.
fn write_atomic(dir: &Path, name: &str, bytes: &[u8]) -> std::io::Result<()> {
    let temp_path = dir.join(format!("{name}.tmp"));
    let file = File::create(&temp_path)?;
    let mut writer = BufWriter::new(file);
    writer.write_all(bytes)?;
    writer.flush()?;
    drop(writer);
    fs::rename(&temp_path, dir.join(name))
}

/// Persist every artifact of `dict` into `dir`, manifest last.
///
/// Failures are serialization errors: the checkpoint could not be snapshotted.
pub(crate) fn write_dir(dir: &Path, dict: &CheckpointDict) -> Result<()> {
    fs::create_dir_all(dir).map_err(|e| {
        PredictorError::serialization(format!("creating {}: {e}", dir.display()))
    })?;

    let manifest = dict.require(MANIFEST_FILE)?;
    if let Some(name) = dict.names().find(|name| !is_artifact_name(name)) {
        return Err(PredictorError::serialization(format!(
            "invalid artifact name {name:?}: must be a plain file name"
        )));
    }
    for (name, bytes) in dict.iter().filter(|(name, _)| *name != MANIFEST_FILE) {
        write_atomic(dir, name, bytes)
            .map_err(|e| PredictorError::serialization(format!("writing {name}: {e}")))?;
        debug!(file = name, bytes = bytes.len(), "Artifact written");
    }
    write_atomic(dir, MANIFEST_FILE, manifest)
        .map_err(|e| PredictorError::serialization(format!("writing {MANIFEST_FILE}: {e}")))?;

    info!(path = %dir.display(), files = dict.len(), "Checkpoint saved");
    Ok(())
}

/// Read one artifact.
pub(crate) fn read_file(dir: &Path, name: &str) -> Result<Vec<u8>> {
    fs::read(dir.join(name)).map_err(|e| {
        PredictorError::checkpoint_load(format!("reading {name} from {}: {e}", dir.display()))
    })
}

/// Read the named artifacts of a checkpoint directory into memory.
pub(crate) fn read_dir<'a>(
    dir: &Path,
    names: impl IntoIterator<Item = &'a str>,
) -> Result<CheckpointDict> {
    let mut dict = CheckpointDict::new();
    for name in names {
        dict.insert(name, read_file(dir, name)?);
    }
    debug!(path = %dir.display(), files = dict.len(), "Checkpoint read");
    Ok(dict)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_write_then_read() {
        let dir = TempDir::new().unwrap();
        let mut dict = CheckpointDict::new();
        dict.insert(MANIFEST_FILE, b"{}".to_vec());
        dict.insert("a.json", b"[1]".to_vec());

        write_dir(dir.path(), &dict).unwrap();
        assert!(!dir.path().join("a.json.tmp").exists());

        let read = read_dir(dir.path(), [MANIFEST_FILE, "a.json"]).unwrap();
        assert_eq!(read, dict);
    }

    #[test]
    fn test_missing_file_is_load_error() {
        let dir = TempDir::new().unwrap();
        assert!(matches!(
            read_file(dir.path(), "nope.json"),
            Err(PredictorError::CheckpointLoad(_))
        ));
    }

    #[test]
    fn test_write_refuses_names_outside_directory() {
        let root = TempDir::new().unwrap();
        let dir = root.path().join("ckpt");
        let mut dict = CheckpointDict::new();
        dict.insert(MANIFEST_FILE, b"{}".to_vec());
        dict.insert("../escaped.json", b"[1]".to_vec());

        let err = write_dir(&dir, &dict).unwrap_err();
        assert!(matches!(err, PredictorError::Serialization(_)));
        assert!(!root.path().join("escaped.json").exists());
        assert!(!dir.join(MANIFEST_FILE).exists());
    }

    #[test]
    fn test_write_requires_manifest() {
        let dir = TempDir::new().unwrap();
        assert!(write_dir(dir.path(), &CheckpointDict::new()).is_err());
    }
}
