//! Classifier architectures built on burn with the ndarray backend.

mod spectral;
mod vector;

use burn::backend::ndarray::NdArrayDevice;
use burn::backend::{Autodiff, NdArray};
use burn::module::Module;
use burn::tensor::Tensor;
use burn::tensor::activation::softmax;
use burn::tensor::backend::Backend;

pub use spectral::{SpectralClassifier, SpectralClassifierConfig};
pub use vector::{VECTOR_INPUT_DIM, VectorClassifier, VectorClassifierConfig};

/// Inference backend.
pub type CpuBackend = NdArray<f32>;
pub type CpuDevice = NdArrayDevice;
/// Backend used during training.
pub type TrainingBackend = Autodiff<CpuBackend>;

/// A batched classifier producing logits `[batch, num_classes]`. The
/// training loop is written once against this trait.
pub trait Classifier<B: Backend>: Module<B> {
    type Input;

    fn forward(&self, input: Self::Input) -> Tensor<B, 2>;

    fn num_classes(&self) -> usize;

    fn probabilities(&self, input: Self::Input) -> Tensor<B, 2> {
        softmax(self.forward(input), 1)
    }
}
