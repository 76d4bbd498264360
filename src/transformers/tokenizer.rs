//! Word-level tokenizer.
//!
//! Splits on whitespace and maps each word to a vocabulary id. Unknown words
//! map to the unknown token. Persisted as `tokenizer.json`.

use crate::models::{PredictorError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Default unknown token.
pub const UNK_TOKEN: &str = "<unk>";

/// Default end-of-sequence token.
pub const EOS_TOKEN: &str = "<eos>";

/// Serialized form of a tokenizer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct TokenizerFile {
    /// Vocabulary, id = position
    vocab: Vec<String>,
    /// Unknown token (must be in vocab)
    unk_token: String,
    /// End-of-sequence token (must be in vocab)
    eos_token: String,
    /// Lowercase input before lookup
    #[serde(default)]
    lowercase: bool,
}

/// Whitespace word-level tokenizer.
#[derive(Debug, Clone)]
pub struct Tokenizer {
    file: TokenizerFile,
    index: HashMap<String, u32>,
    unk_id: u32,
    eos_id: u32,
}

impl Tokenizer {
    /// Build a tokenizer over `words`, adding `<unk>` and `<eos>` first.
    ///
    /// Duplicate words keep their first id.
    pub fn word_level<I, S>(words: I, lowercase: bool) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut vocab = vec![UNK_TOKEN.to_string(), EOS_TOKEN.to_string()];
        for word in words {
            let word = word.into();
            let word = if lowercase { word.to_lowercase() } else { word };
            if !word.trim().is_empty() && !vocab.contains(&word) {
                vocab.push(word);
            }
        }
        Self::from_file(TokenizerFile {
            vocab,
            unk_token: UNK_TOKEN.to_string(),
            eos_token: EOS_TOKEN.to_string(),
            lowercase,
        })
        .map_err(|e| PredictorError::serialization(e.to_string()))
    }

    fn from_file(file: TokenizerFile) -> std::result::Result<Self, String> {
        if file.vocab.len() > u32::MAX as usize {
            return Err(format!("vocabulary of {} entries is too large", file.vocab.len()));
        }
        let mut index = HashMap::with_capacity(file.vocab.len());
        for (id, token) in file.vocab.iter().enumerate() {
            if index.insert(token.clone(), id as u32).is_some() {
                return Err(format!("duplicate vocabulary entry '{token}'"));
            }
        }
        let unk_id = *index
            .get(&file.unk_token)
            .ok_or_else(|| format!("unknown token '{}' not in vocabulary", file.unk_token))?;
        let eos_id = *index
            .get(&file.eos_token)
            .ok_or_else(|| format!("eos token '{}' not in vocabulary", file.eos_token))?;
        Ok(Self {
            file,
            index,
            unk_id,
            eos_id,
        })
    }

    pub fn vocab_size(&self) -> usize {
        self.file.vocab.len()
    }

    pub fn eos_id(&self) -> u32 {
        self.eos_id
    }

    pub fn unk_id(&self) -> u32 {
        self.unk_id
    }

    /// Encode text into token ids.
    pub fn encode(&self, text: &str) -> Vec<u32> {
        text.split_whitespace()
            .map(|word| {
                let key = if self.file.lowercase {
                    word.to_lowercase()
                } else {
                    word.to_string()
                };
                self.index.get(&key).copied().unwrap_or(self.unk_id)
            })
            .collect()
    }

    /// Decode token ids into text, skipping end-of-sequence tokens.
    pub fn decode(&self, ids: &[u32]) -> String {
        ids.iter()
            .filter(|&&id| id != self.eos_id)
            .map(|&id| {
                self.file
                    .vocab
                    .get(id as usize)
                    .map_or(self.file.unk_token.as_str(), String::as_str)
            })
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Serialize to `tokenizer.json` bytes.
    pub fn to_json(&self) -> Result<Vec<u8>> {
        serde_json::to_vec_pretty(&self.file)
            .map_err(|e| PredictorError::serialization(format!("tokenizer: {e}")))
    }

    /// Load from `tokenizer.json` bytes.
    ///
    /// B_i(bytes are a valid tokenizer) → Result
    pub fn from_json(bytes: &[u8]) -> Result<Self> {
        let file: TokenizerFile = serde_json::from_slice(bytes)
            .map_err(|e| PredictorError::checkpoint_load(format!("tokenizer.json: {e}")))?;
        Self::from_file(file)
            .map_err(|e| PredictorError::checkpoint_load(format!("tokenizer.json: {e}")))
    }
}

impl PartialEq for Tokenizer {
    fn eq(&self, other: &Self) -> bool {
        self.file == other.file
    }
}
