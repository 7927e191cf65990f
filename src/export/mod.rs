//! Post-training quantization into a compact inference artifact.

use std::io;
use std::path::{Path, PathBuf};

use burn::module::{Module, ModuleVisitor, ParamId};
use burn::tensor::backend::Backend;
use burn::tensor::{Bool, Int, Tensor};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use crate::dataset::{LabelVocabulary, VocabError};

/// First bytes of every artifact.
pub const ARTIFACT_MAGIC: [u8; 4] = *b"RQM1";
/// The label vocabulary is always written next to the artifact under this
/// name, from the same in-memory object the model was trained against.
pub const LABELS_FILE: &str = "raga_names.json";

#[derive(Debug, Error)]
pub enum ConversionError {
    #[error("Model exposes no float parameters to export")]
    NoParameters,
    #[error("Parameter {param} contains non-finite weights")]
    NonFiniteWeights { param: String },
    #[error("Parameter {param} could not be read: {reason}")]
    UnreadableParameter { param: String, reason: String },
    #[error("Failed to write {path}: {source}")]
    Io { path: PathBuf, source: io::Error },
    #[error(transparent)]
    Labels(#[from] VocabError),
}

/// JSON header embedded after the magic bytes.
#[derive(Debug, Serialize, Deserialize)]
pub struct ArtifactHeader {
    pub version: u32,
    pub classes: usize,
    pub tensor_count: usize,
}

/// Accounting for a completed export.
#[derive(Debug)]
pub struct ExportReport {
    pub artifact_path: PathBuf,
    pub labels_path: PathBuf,
    pub tensor_count: usize,
    pub raw_weight_bytes: usize,
    pub artifact_bytes: usize,
}

/// Quantize every float parameter of `model` to symmetric per-tensor i8 and
/// write the artifact plus the label vocabulary. The model is not mutated;
/// the artifact is strictly smaller than the raw f32 weights.
pub fn export_quantized<B, M>(
    model: &M,
    vocabulary: &LabelVocabulary,
    artifact_path: &Path,
) -> Result<ExportReport, ConversionError>
where
    B: Backend,
    M: Module<B>,
{
    let mut collector = WeightCollector::default();
    model.visit(&mut collector);
    if let Some(failure) = collector.failure {
        return Err(failure);
    }
    if collector.tensors.is_empty() {
        return Err(ConversionError::NoParameters);
    }

    let raw_weight_bytes: usize = collector
        .tensors
        .iter()
        .map(|(_, values)| values.len() * std::mem::size_of::<f32>())
        .sum();

    let header = ArtifactHeader {
        version: 1,
        classes: vocabulary.len(),
        tensor_count: collector.tensors.len(),
    };
    let header_json =
        serde_json::to_vec(&header).map_err(|source| ConversionError::UnreadableParameter {
            param: "header".to_string(),
            reason: source.to_string(),
        })?;

    let mut buffer = Vec::with_capacity(raw_weight_bytes / 3);
    buffer.extend_from_slice(&ARTIFACT_MAGIC);
    buffer.extend_from_slice(&(header_json.len() as u32).to_le_bytes());
    buffer.extend_from_slice(&header_json);
    for (dims, values) in &collector.tensors {
        let (scale, quantized) = quantize_symmetric(values);
        buffer.push(dims.len() as u8);
        for &dim in dims {
            buffer.extend_from_slice(&(dim as u32).to_le_bytes());
        }
        buffer.extend_from_slice(&scale.to_le_bytes());
        buffer.extend_from_slice(&(quantized.len() as u32).to_le_bytes());
        buffer.extend(quantized.iter().map(|&q| q as u8));
    }

    std::fs::write(artifact_path, &buffer).map_err(|source| ConversionError::Io {
        path: artifact_path.to_path_buf(),
        source,
    })?;

    let labels_path = artifact_path
        .parent()
        .unwrap_or_else(|| Path::new("."))
        .join(LABELS_FILE);
    vocabulary.save(&labels_path)?;

    let report = ExportReport {
        artifact_path: artifact_path.to_path_buf(),
        labels_path,
        tensor_count: header.tensor_count,
        raw_weight_bytes,
        artifact_bytes: buffer.len(),
    };
    info!(
        artifact = %report.artifact_path.display(),
        tensors = report.tensor_count,
        raw_bytes = report.raw_weight_bytes,
        artifact_bytes = report.artifact_bytes,
        "export complete"
    );
    Ok(report)
}

#[derive(Default)]
struct WeightCollector {
    tensors: Vec<(Vec<usize>, Vec<f32>)>,
    failure: Option<ConversionError>,
}

impl<B: Backend> ModuleVisitor<B> for WeightCollector {
    fn visit_float<const D: usize>(&mut self, id: ParamId, tensor: &Tensor<B, D>) {
        if self.failure.is_some() {
            return;
        }
        let dims = tensor.dims().to_vec();
        match tensor.to_data().to_vec::<f32>() {
            Ok(values) => {
                if values.iter().any(|value| !value.is_finite()) {
                    self.failure = Some(ConversionError::NonFiniteWeights {
                        param: format!("{id:?}"),
                    });
                    return;
                }
                self.tensors.push((dims, values));
            }
            Err(err) => {
                self.failure = Some(ConversionError::UnreadableParameter {
                    param: format!("{id:?}"),
                    reason: format!("{err:?}"),
                });
            }
        }
    }

    // Int and bool parameters carry no trained weights.
    fn visit_int<const D: usize>(&mut self, _id: ParamId, _tensor: &Tensor<B, D, Int>) {}

    fn visit_bool<const D: usize>(&mut self, _id: ParamId, _tensor: &Tensor<B, D, Bool>) {}
}

/// Symmetric per-tensor quantization: `scale = max(|w|) / 127`, values
/// rounded into `[-127, 127]`. All-zero tensors use scale 1 so dequantizing
/// still reproduces them exactly.
fn quantize_symmetric(values: &[f32]) -> (f32, Vec<i8>) {
    let max_abs = values.iter().fold(0.0_f32, |max, v| max.max(v.abs()));
    let scale = if max_abs > 0.0 { max_abs / 127.0 } else { 1.0 };
    let quantized = values
        .iter()
        .map(|&v| (v / scale).round().clamp(-127.0, 127.0) as i8)
        .collect();
    (scale, quantized)
}
