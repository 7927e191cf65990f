use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::features::{FeatureConfig, FeatureExtractor};

use super::{DatasetError, Example, LabelVocabulary, LabeledDataset};

const AUDIO_EXTENSIONS: [&str; 7] = ["wav", "flac", "mp3", "ogg", "oga", "aiff", "aif"];

/// Counts gathered while scanning and extracting.
#[derive(Debug, Default, Clone, Copy)]
pub struct ScanStats {
    pub categories: usize,
    pub files_seen: usize,
    pub examples: usize,
    pub skipped: usize,
}

/// Walks `<root>/<category>/**` and turns every audio file into a labeled
/// example. Categories are the immediate subdirectories of the root, sorted
/// by name so repeat scans assign identical label indices.
pub struct DatasetBuilder {
    feature_config: FeatureConfig,
    skip_corrupt: bool,
    vocabulary_output: Option<PathBuf>,
}

impl DatasetBuilder {
    pub fn new(feature_config: FeatureConfig) -> Self {
        Self {
            feature_config,
            skip_corrupt: false,
            vocabulary_output: None,
        }
    }

    /// Skip unreadable files with a warning instead of aborting the build.
    pub fn skip_corrupt(mut self, skip: bool) -> Self {
        self.skip_corrupt = skip;
        self
    }

    /// Persist the vocabulary to `path` as soon as the scan completes,
    /// before any feature extraction runs.
    pub fn persist_vocabulary(mut self, path: PathBuf) -> Self {
        self.vocabulary_output = Some(path);
        self
    }

    pub fn build(&self, root: &Path) -> Result<(LabeledDataset, ScanStats), DatasetError> {
        let categories = scan_categories(root)?;
        if categories.is_empty() {
            return Err(DatasetError::NoCategories {
                path: root.to_path_buf(),
            });
        }
        let vocabulary =
            LabelVocabulary::from_names(categories.iter().map(|c| c.name.clone()).collect());
        if let Some(path) = &self.vocabulary_output {
            vocabulary.save(path)?;
            info!(path = %path.display(), classes = vocabulary.len(), "wrote label vocabulary");
        }

        let mut stats = ScanStats {
            categories: categories.len(),
            ..ScanStats::default()
        };
        let mut extractor = FeatureExtractor::new(self.feature_config.clone());
        let mut examples = Vec::new();
        for (label, category) in categories.iter().enumerate() {
            debug!(
                category = %category.name,
                files = category.files.len(),
                "extracting category"
            );
            for file in &category.files {
                stats.files_seen += 1;
                let features = match extractor.extract(file) {
                    Ok(features) => features,
                    Err(err) if self.skip_corrupt => {
                        warn!(path = %file.display(), error = %err, "skipping unreadable file");
                        stats.skipped += 1;
                        continue;
                    }
                    Err(err) => return Err(err.into()),
                };
                examples.push(Example {
                    features,
                    one_hot: vocabulary.one_hot(label),
                    label,
                });
            }
        }
        stats.examples = examples.len();
        info!(
            categories = stats.categories,
            examples = stats.examples,
            skipped = stats.skipped,
            "dataset build complete"
        );
        Ok((
            LabeledDataset {
                examples,
                vocabulary,
            },
            stats,
        ))
    }
}

struct Category {
    name: String,
    files: Vec<PathBuf>,
}

fn scan_categories(root: &Path) -> Result<Vec<Category>, DatasetError> {
    let read_dir = |path: &Path| {
        std::fs::read_dir(path).map_err(|source| DatasetError::ReadDir {
            path: path.to_path_buf(),
            source,
        })
    };

    let mut categories = Vec::new();
    for entry in read_dir(root)? {
        let entry = entry.map_err(|source| DatasetError::ReadDir {
            path: root.to_path_buf(),
            source,
        })?;
        let path = entry.path();
        if !path.is_dir() {
            continue;
        }
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        let files = collect_audio_files(&path, &read_dir)?;
        categories.push(Category {
            name: name.to_string(),
            files,
        });
    }
    categories.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(categories)
}

fn collect_audio_files<F>(category_dir: &Path, read_dir: &F) -> Result<Vec<PathBuf>, DatasetError>
where
    F: Fn(&Path) -> Result<std::fs::ReadDir, DatasetError>,
{
    let mut files = Vec::new();
    let mut pending = vec![category_dir.to_path_buf()];
    while let Some(dir) = pending.pop() {
        for entry in read_dir(&dir)? {
            let entry = entry.map_err(|source| DatasetError::ReadDir {
                path: dir.clone(),
                source,
            })?;
            let path = entry.path();
            if path.is_dir() {
                pending.push(path);
            } else if has_audio_extension(&path) {
                files.push(path);
            }
        }
    }
    files.sort();
    Ok(files)
}

fn has_audio_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            let ext = ext.to_ascii_lowercase();
            AUDIO_EXTENSIONS.iter().any(|known| *known == ext)
        })
        .unwrap_or(false)
}
