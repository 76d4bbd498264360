//! Checkpoint module - serializable model + tokenizer bundles.
//!
//! Provides:
//! - `TransformersCheckpoint`: Immutable bundle with lazy, cached loading
//! - `CheckpointDict`: Self-contained in-memory representation
//! - `Manifest`: Versioned description written as `checkpoint.json`

mod dict;
mod state;
mod store;

pub use dict::*;
pub use state::*;
