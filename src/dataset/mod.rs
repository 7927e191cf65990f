//! Directory-tree scanning and labeled example collection.

mod builder;
mod vocab;

use std::io;
use std::path::PathBuf;

use ndarray::Array2;
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use thiserror::Error;

use crate::audio::DecodeError;

pub use builder::{DatasetBuilder, ScanStats};
pub use vocab::{LabelVocabulary, VocabError};

/// Errors raised while building a labeled dataset from a directory tree.
#[derive(Debug, Error)]
pub enum DatasetError {
    #[error("Failed to read dataset directory {path}: {source}")]
    ReadDir { path: PathBuf, source: io::Error },
    #[error("Dataset root {path} contains no category directories")]
    NoCategories { path: PathBuf },
    #[error(transparent)]
    Decode(#[from] DecodeError),
    #[error(transparent)]
    Vocabulary(#[from] VocabError),
}

/// One labeled training example.
#[derive(Debug)]
pub struct Example {
    /// Log-mel tensor of shape `(n_mels, frames)`.
    pub features: Array2<f32>,
    /// One-hot target, width equal to the vocabulary size.
    pub one_hot: Vec<f32>,
    /// Index into the vocabulary.
    pub label: usize,
}

/// All collected examples plus the vocabulary their labels index into.
#[derive(Debug)]
pub struct LabeledDataset {
    pub examples: Vec<Example>,
    pub vocabulary: LabelVocabulary,
}

impl LabeledDataset {
    pub fn len(&self) -> usize {
        self.examples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.examples.is_empty()
    }

    /// Deterministic train/validation index split by seeded shuffle. With at
    /// least two examples both sides are non-empty.
    pub fn split_indices(&self, validation_fraction: f32, seed: u64) -> (Vec<usize>, Vec<usize>) {
        let n = self.examples.len();
        if n < 2 {
            return ((0..n).collect(), Vec::new());
        }
        let mut indices: Vec<usize> = (0..n).collect();
        let mut rng = StdRng::seed_from_u64(seed);
        indices.shuffle(&mut rng);
        let fraction = validation_fraction.clamp(0.0, 1.0);
        let val_len = ((n as f32 * fraction).round() as usize).clamp(1, n - 1);
        let validation = indices.split_off(n - val_len);
        (indices, validation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dataset_with(n: usize) -> LabeledDataset {
        let vocabulary = LabelVocabulary::from_names(vec!["a".into(), "b".into()]);
        let examples = (0..n)
            .map(|i| Example {
                features: Array2::zeros((2, 3)),
                one_hot: vocabulary.one_hot(i % 2),
                label: i % 2,
            })
            .collect();
        LabeledDataset {
            examples,
            vocabulary,
        }
    }

    #[test]
    fn split_is_deterministic_and_disjoint() {
        let dataset = dataset_with(10);
        let (train_a, val_a) = dataset.split_indices(0.2, 42);
        let (train_b, val_b) = dataset.split_indices(0.2, 42);
        assert_eq!(train_a, train_b);
        assert_eq!(val_a, val_b);
        assert_eq!(train_a.len(), 8);
        assert_eq!(val_a.len(), 2);
        for idx in &val_a {
            assert!(!train_a.contains(idx));
        }
    }

    #[test]
    fn split_keeps_both_sides_non_empty() {
        let dataset = dataset_with(2);
        let (train, val) = dataset.split_indices(0.0, 1);
        assert_eq!(train.len(), 1);
        assert_eq!(val.len(), 1);
    }

    #[test]
    fn split_of_single_example_has_empty_validation() {
        let dataset = dataset_with(1);
        let (train, val) = dataset.split_indices(0.2, 1);
        assert_eq!(train, vec![0]);
        assert!(val.is_empty());
    }
}
