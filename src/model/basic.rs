use crate::config::ImgConvNetsConfig;
use crate::layers::{ConvStack, ConvStackConfig, dense};
use burn::nn::{Dropout, DropoutConfig, Linear};
use burn::prelude::*;
use burn::tensor::activation::relu;

/// Two conv stacks, one hidden dense layer with dropout, and a readout.
#[derive(Module, Debug)]
pub struct BasicCnn<B: Backend> {
    /// 3x3 1→32, 3x3 32→32, pool.
    pub conv1: ConvStack<B>,
    /// 3x3 32→64, 3x3 64→64, pool.
    pub conv2: ConvStack<B>,
    /// Input channel: `(img_height / 4) * (img_width / 4) * 64`.
    /// Output channel: 1024.
    pub fc1: Linear<B>,
    pub dropout: Dropout,
    /// Input channel: 1024.
    /// Output channel: `class_count`.
    pub readout: Linear<B>,
    pub img_height: usize,
    pub img_width: usize,
}

#[derive(Config, Debug)]
pub struct BasicCnnConfig {
    pub img_height: usize,
    pub img_width: usize,
    pub class_count: usize,
    #[config(default = 0.5)]
    pub drop_prob: f64,
    #[config(default = 1024)]
    pub d_hidden: usize,
}

impl BasicCnnConfig {
    pub fn from_shape(config: &ImgConvNetsConfig) -> Self {
        Self::new(config.img_height, config.img_width, config.class_count)
            .with_drop_prob(config.drop_prob())
    }

    /// Returns the initialized model.
    pub fn init<B: Backend>(&self, device: &B::Device) -> BasicCnn<B> {
        let pooled = (self.img_height / 4) * (self.img_width / 4) * 64;
        BasicCnn {
            conv1: ConvStackConfig::new(1, 32, vec![[3, 3], [3, 3]]).init(device),
            conv2: ConvStackConfig::new(32, 64, vec![[3, 3], [3, 3]]).init(device),
            fc1: dense(pooled, self.d_hidden, device),
            dropout: DropoutConfig::new(self.drop_prob).init(),
            readout: dense(self.d_hidden, self.class_count, device),
            img_height: self.img_height,
            img_width: self.img_width,
        }
    }
}

impl<B: Backend> BasicCnn<B> {
    /// # Shapes
    /// - input: `[batch, img_height * img_width]`
    /// - output: `[batch, class_count]`
    pub fn forward(&self, images: Tensor<B, 2>) -> Tensor<B, 2> {
        let [batch, _features] = images.dims();
        let images = images.reshape([batch, 1, self.img_height, self.img_width]);
        self.forward_images(images)
    }

    /// # Shapes
    /// - input: `[batch, 1, img_height, img_width]`
    /// - output: `[batch, class_count]`
    pub fn forward_images(&self, images: Tensor<B, 4>) -> Tensor<B, 2> {
        let [batch, _channels, _height, _width] = images.dims();
        let x = self.conv1.forward(images);
        let x = self.conv2.forward(x);
        let [_batch, channels, height, width] = x.dims();
        let x = x.reshape([batch, channels * height * width]);
        let x = relu(self.fc1.forward(x));
        let x = self.dropout.forward(x);
        self.readout.forward(x)
    }
}
