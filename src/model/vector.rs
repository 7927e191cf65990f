use burn::config::Config;
use burn::module::Module;
use burn::nn::{Dropout, DropoutConfig, Linear, LinearConfig, Relu};
use burn::tensor::Tensor;
use burn::tensor::backend::Backend;

use super::Classifier;

/// Fixed width of the summary feature vectors this head consumes.
pub const VECTOR_INPUT_DIM: usize = 128;

const HIDDEN_ONE: usize = 256;
const HIDDEN_TWO: usize = 128;
const VECTOR_DROPOUT: f64 = 0.3;

#[derive(Config, Debug)]
pub struct VectorClassifierConfig {
    pub num_classes: usize,
}

impl VectorClassifierConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> VectorClassifier<B> {
        VectorClassifier {
            hidden_one: LinearConfig::new(VECTOR_INPUT_DIM, HIDDEN_ONE).init(device),
            dropout_one: DropoutConfig::new(VECTOR_DROPOUT).init(),
            hidden_two: LinearConfig::new(HIDDEN_ONE, HIDDEN_TWO).init(device),
            dropout_two: DropoutConfig::new(VECTOR_DROPOUT).init(),
            output: LinearConfig::new(HIDDEN_TWO, self.num_classes).init(device),
            activation: Relu::new(),
            num_classes: self.num_classes,
        }
    }
}

/// Dense classifier over precomputed 128-dimensional feature vectors. No
/// batcher is wired up for it; it exists for experiments that bypass the
/// spectrogram path.
#[derive(Module, Debug)]
pub struct VectorClassifier<B: Backend> {
    hidden_one: Linear<B>,
    dropout_one: Dropout,
    hidden_two: Linear<B>,
    dropout_two: Dropout,
    output: Linear<B>,
    activation: Relu,
    num_classes: usize,
}

impl<B: Backend> Classifier<B> for VectorClassifier<B> {
    type Input = Tensor<B, 2>;

    fn forward(&self, input: Tensor<B, 2>) -> Tensor<B, 2> {
        let x = self.hidden_one.forward(input);
        let x = self.activation.forward(x);
        let x = self.dropout_one.forward(x);
        let x = self.hidden_two.forward(x);
        let x = self.activation.forward(x);
        let x = self.dropout_two.forward(x);
        self.output.forward(x)
    }

    fn num_classes(&self) -> usize {
        self.num_classes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{CpuBackend, CpuDevice};

    #[test]
    fn forward_maps_vectors_to_class_logits() {
        let device = CpuDevice::default();
        let model = VectorClassifierConfig::new(4).init::<CpuBackend>(&device);
        let input = Tensor::<CpuBackend, 2>::zeros([3, VECTOR_INPUT_DIM], &device);
        let logits = model.forward(input);
        assert_eq!(logits.dims(), [3, 4]);
    }

    #[test]
    fn probabilities_are_a_distribution() {
        let device = CpuDevice::default();
        let model = VectorClassifierConfig::new(2).init::<CpuBackend>(&device);
        let input = Tensor::<CpuBackend, 2>::ones([1, VECTOR_INPUT_DIM], &device);
        let probs = model.probabilities(input);
        let sum: f32 = probs.sum().into_scalar();
        assert!((sum - 1.0).abs() < 1e-4);
    }
}
