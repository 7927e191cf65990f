use burn::config::Config;
use burn::module::Module;
use burn::nn::conv::{Conv2d, Conv2dConfig};
use burn::nn::pool::{
    AdaptiveAvgPool2d, AdaptiveAvgPool2dConfig, MaxPool2d, MaxPool2dConfig,
};
use burn::nn::{
    BatchNorm, BatchNormConfig, Dropout, DropoutConfig, Linear, LinearConfig, PaddingConfig2d,
    Relu,
};
use burn::tensor::Tensor;
use burn::tensor::backend::Backend;

use super::Classifier;

const BLOCK_CHANNELS: [usize; 3] = [32, 64, 128];
const BLOCK_DROPOUT: f64 = 0.25;
const DENSE_DROPOUT: f64 = 0.5;

/// One convolutional stage: 3x3 same-padded conv, ReLU, batch norm,
/// 2x2 max pool, dropout.
#[derive(Module, Debug)]
struct ConvBlock<B: Backend> {
    conv: Conv2d<B>,
    norm: BatchNorm<B, 2>,
    pool: MaxPool2d,
    dropout: Dropout,
    activation: Relu,
}

impl<B: Backend> ConvBlock<B> {
    fn new(in_channels: usize, out_channels: usize, device: &B::Device) -> Self {
        Self {
            conv: Conv2dConfig::new([in_channels, out_channels], [3, 3])
                .with_padding(PaddingConfig2d::Same)
                .init(device),
            norm: BatchNormConfig::new(out_channels).init(device),
            pool: MaxPool2dConfig::new([2, 2]).with_strides([2, 2]).init(),
            dropout: DropoutConfig::new(BLOCK_DROPOUT).init(),
            activation: Relu::new(),
        }
    }

    fn forward(&self, input: Tensor<B, 4>) -> Tensor<B, 4> {
        let x = self.conv.forward(input);
        let x = self.activation.forward(x);
        let x = self.norm.forward(x);
        let x = self.pool.forward(x);
        self.dropout.forward(x)
    }
}

#[derive(Config, Debug)]
pub struct SpectralClassifierConfig {
    pub num_classes: usize,
    #[config(default = 256)]
    pub hidden_units: usize,
}

impl SpectralClassifierConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> SpectralClassifier<B> {
        let mut blocks = Vec::with_capacity(BLOCK_CHANNELS.len());
        let mut in_channels = 1;
        for out_channels in BLOCK_CHANNELS {
            blocks.push(ConvBlock::new(in_channels, out_channels, device));
            in_channels = out_channels;
        }
        SpectralClassifier {
            blocks,
            global_pool: AdaptiveAvgPool2dConfig::new([1, 1]).init(),
            hidden: LinearConfig::new(in_channels, self.hidden_units).init(device),
            hidden_dropout: DropoutConfig::new(DENSE_DROPOUT).init(),
            output: LinearConfig::new(self.hidden_units, self.num_classes).init(device),
            activation: Relu::new(),
            num_classes: self.num_classes,
        }
    }
}

/// Convolutional classifier over log-mel tensors `[batch, 1, mels, frames]`.
/// Global average pooling makes the dense head independent of the exact
/// spectrogram size.
#[derive(Module, Debug)]
pub struct SpectralClassifier<B: Backend> {
    blocks: Vec<ConvBlock<B>>,
    global_pool: AdaptiveAvgPool2d,
    hidden: Linear<B>,
    hidden_dropout: Dropout,
    output: Linear<B>,
    activation: Relu,
    num_classes: usize,
}

impl<B: Backend> Classifier<B> for SpectralClassifier<B> {
    type Input = Tensor<B, 4>;

    fn forward(&self, input: Tensor<B, 4>) -> Tensor<B, 2> {
        let mut x = input;
        for block in &self.blocks {
            x = block.forward(x);
        }
        let x = self.global_pool.forward(x);
        let x = x.flatten::<2>(1, 3);
        let x = self.hidden.forward(x);
        let x = self.activation.forward(x);
        let x = self.hidden_dropout.forward(x);
        self.output.forward(x)
    }

    fn num_classes(&self) -> usize {
        self.num_classes
    }
}
