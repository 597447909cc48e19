use crate::config::ImgConvNetsConfig;
use crate::layers::{ConvStack, ConvStackConfig, dense};
use burn::nn::{Dropout, DropoutConfig, Linear};
use burn::prelude::*;
use burn::tensor::activation::relu;

/// Kernels of each conv stack: a 3x3 followed by a factorized 1x3 / 3x1 pair and another 3x3.
const FACTORIZED_KERNELS: [[usize; 2]; 4] = [[3, 3], [1, 3], [3, 1], [3, 3]];

/// Factorized conv stacks, two hidden dense layers with dropout, and a readout.
#[derive(Module, Debug)]
pub struct DeepCnn<B: Backend> {
    pub conv1: ConvStack<B>,
    pub conv2: ConvStack<B>,
    pub fc1: Linear<B>,
    pub fc2: Linear<B>,
    pub dropout: Dropout,
    pub readout: Linear<B>,
    pub img_height: usize,
    pub img_width: usize,
}

#[derive(Config, Debug)]
pub struct DeepCnnConfig {
    pub img_height: usize,
    pub img_width: usize,
    pub class_count: usize,
    #[config(default = 0.5)]
    pub drop_prob: f64,
    #[config(default = 1024)]
    pub d_hidden: usize,
}

impl DeepCnnConfig {
    pub fn from_shape(config: &ImgConvNetsConfig) -> Self {
        Self::new(config.img_height, config.img_width, config.class_count)
            .with_drop_prob(config.drop_prob())
    }

    /// Returns the initialized model.
    pub fn init<B: Backend>(&self, device: &B::Device) -> DeepCnn<B> {
        let pooled = (self.img_height / 4) * (self.img_width / 4) * 64;
        DeepCnn {
            conv1: ConvStackConfig::new(1, 32, FACTORIZED_KERNELS.to_vec()).init(device),
            conv2: ConvStackConfig::new(32, 64, FACTORIZED_KERNELS.to_vec()).init(device),
            fc1: dense(pooled, self.d_hidden, device),
            fc2: dense(self.d_hidden, self.d_hidden, device),
            dropout: DropoutConfig::new(self.drop_prob).init(),
            readout: dense(self.d_hidden, self.class_count, device),
            img_height: self.img_height,
            img_width: self.img_width,
        }
    }
}

impl<B: Backend> DeepCnn<B> {
    /// # Shapes
    /// - input: `[batch, img_height * img_width]`
    /// - output: `[batch, class_count]`
    pub fn forward(&self, images: Tensor<B, 2>) -> Tensor<B, 2> {
        let [batch, _features] = images.dims();
        let x = images.reshape([batch, 1, self.img_height, self.img_width]);
        let x = self.conv1.forward(x);
        let x = self.conv2.forward(x);
        let [_batch, channels, height, width] = x.dims();
        let x = x.reshape([batch, channels * height * width]);
        let x = relu(self.fc1.forward(x));
        let x = relu(self.fc2.forward(x));
        let x = self.dropout.forward(x);
        self.readout.forward(x)
    }
}
