use std::path::{Path, PathBuf};

use burn::module::Module;
use burn::record::{BinFileRecorder, FullPrecisionSettings};
use burn::tensor::backend::Backend;
use time::OffsetDateTime;
use time::format_description::FormatItem;
use time::macros::format_description;
use tracing::info;

use super::TrainError;

const STAMP_FORMAT: &[FormatItem<'_>] =
    format_description!("[year][month][day]-[hour][minute][second]");

/// Writes one weight snapshot per improving epoch, named
/// `model-<run stamp>-epoch<NNN>` plus the recorder extension. Old
/// snapshots are never pruned.
#[derive(Debug)]
pub struct CheckpointWriter {
    dir: PathBuf,
    run_stamp: String,
}

impl CheckpointWriter {
    pub fn new(dir: &Path) -> Result<Self, TrainError> {
        std::fs::create_dir_all(dir).map_err(|source| TrainError::Checkpoint {
            path: dir.to_path_buf(),
            reason: source.to_string(),
        })?;
        let run_stamp = OffsetDateTime::now_utc()
            .format(STAMP_FORMAT)
            .map_err(|source| TrainError::Checkpoint {
                path: dir.to_path_buf(),
                reason: format!("timestamp format failed: {source}"),
            })?;
        Ok(Self {
            dir: dir.to_path_buf(),
            run_stamp,
        })
    }

    pub fn write<B, M>(&self, model: M, epoch: usize) -> Result<PathBuf, TrainError>
    where
        B: Backend,
        M: Module<B>,
    {
        let path = self
            .dir
            .join(format!("model-{}-epoch{:03}", self.run_stamp, epoch));
        let recorder = BinFileRecorder::<FullPrecisionSettings>::new();
        model
            .save_file(path.clone(), &recorder)
            .map_err(|source| TrainError::Checkpoint {
                path: path.clone(),
                reason: source.to_string(),
            })?;
        info!(path = %path.display(), epoch, "wrote checkpoint");
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{CpuBackend, CpuDevice, SpectralClassifierConfig};
    use tempfile::TempDir;

    #[test]
    fn write_creates_epoch_named_snapshot() {
        let dir = TempDir::new().unwrap();
        let writer = CheckpointWriter::new(dir.path()).unwrap();
        let device = CpuDevice::default();
        let model = SpectralClassifierConfig::new(2).init::<CpuBackend>(&device);
        let path = writer.write(model, 7).unwrap();
        let name = path.file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with("model-"));
        assert!(name.ends_with("-epoch007"));
        // The recorder appends its own extension to the written file.
        let written: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(written.len(), 1);
        assert!(written[0].starts_with(&name));
    }

    #[test]
    fn new_fails_on_unwritable_directory() {
        let dir = TempDir::new().unwrap();
        let blocker = dir.path().join("occupied");
        std::fs::write(&blocker, b"file, not dir").unwrap();
        let err = CheckpointWriter::new(&blocker).unwrap_err();
        assert!(matches!(err, TrainError::Checkpoint { .. }));
    }
}
