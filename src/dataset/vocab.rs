use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum VocabError {
    #[error("Failed to write label vocabulary {path}: {source}")]
    Write { path: PathBuf, source: io::Error },
    #[error("Failed to read label vocabulary {path}: {source}")]
    Read { path: PathBuf, source: io::Error },
    #[error("Malformed label vocabulary {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
}

/// Frozen category-name list. Index positions are the label indices used by
/// the model, so the order must never change after collection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelVocabulary {
    names: Vec<String>,
}

impl LabelVocabulary {
    /// Build from names in their final order, dropping duplicates while
    /// keeping first occurrence.
    pub fn from_names(names: Vec<String>) -> Self {
        let mut seen = Vec::with_capacity(names.len());
        for name in names {
            if !seen.contains(&name) {
                seen.push(name);
            }
        }
        Self { names: seen }
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn name(&self, index: usize) -> Option<&str> {
        self.names.get(index).map(String::as_str)
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.names.iter().position(|n| n == name)
    }

    /// One-hot target vector for `index`, width `len()`.
    pub fn one_hot(&self, index: usize) -> Vec<f32> {
        let mut target = vec![0.0; self.names.len()];
        if let Some(slot) = target.get_mut(index) {
            *slot = 1.0;
        }
        target
    }

    /// Persist as a plain JSON array of names.
    pub fn save(&self, path: &Path) -> Result<(), VocabError> {
        let json = serde_json::to_string_pretty(&self.names).map_err(|source| {
            VocabError::Parse {
                path: path.to_path_buf(),
                source,
            }
        })?;
        std::fs::write(path, json).map_err(|source| VocabError::Write {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn load(path: &Path) -> Result<Self, VocabError> {
        let raw = std::fs::read_to_string(path).map_err(|source| VocabError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let names: Vec<String> =
            serde_json::from_str(&raw).map_err(|source| VocabError::Parse {
                path: path.to_path_buf(),
                source,
            })?;
        Ok(Self { names })
    }
}
