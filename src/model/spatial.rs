use crate::config::ImgConvNetsConfig;
use crate::model::basic::{BasicCnn, BasicCnnConfig};
use crate::transformer::affine_transform;
use burn::module::Param;
use burn::nn::{Dropout, DropoutConfig, Initializer, Linear, LinearConfig};
use burn::prelude::*;

/// Row-major identity of a 2x3 affine transform.
pub const IDENTITY_AFFINE: [f32; 6] = [1.0, 0.0, 0.0, 0.0, 1.0, 0.0];

/// A learned spatial transformer in front of a [`BasicCnn`].
///
/// The localisation network reads the raw image and predicts one affine
/// transform per image. Its dense weights start at zero, so the initial
/// transform only depends on the biases.
#[derive(Module, Debug)]
pub struct SpatialCnn<B: Backend> {
    /// Input channel: `img_height * img_width`.
    /// Output channel: [`SpatialCnnConfig::d_localisation`].
    pub loc1: Linear<B>,
    pub loc_dropout: Dropout,
    /// Input channel: [`SpatialCnnConfig::d_localisation`].
    /// Output channel: 6.
    pub loc2: Linear<B>,
    pub trunk: BasicCnn<B>,
}

#[derive(Config, Debug)]
pub struct SpatialCnnConfig {
    pub trunk: BasicCnnConfig,
    #[config(default = 64)]
    pub d_localisation: usize,
    /// Standard deviation of the first localisation bias.
    #[config(default = 0.01)]
    pub loc_bias_std: f64,
}

impl SpatialCnnConfig {
    pub fn from_shape(config: &ImgConvNetsConfig) -> Self {
        Self::new(BasicCnnConfig::from_shape(config))
    }

    /// Returns the initialized model.
    pub fn init<B: Backend>(&self, device: &B::Device) -> SpatialCnn<B> {
        let features = self.trunk.img_height * self.trunk.img_width;

        let mut loc1 = LinearConfig::new(features, self.d_localisation)
            .with_initializer(Initializer::Zeros)
            .init(device);
        loc1.bias = Some(
            Initializer::Normal {
                mean: 0.0,
                std: self.loc_bias_std,
            }
            .init([self.d_localisation], device),
        );

        let mut loc2 = LinearConfig::new(self.d_localisation, 6)
            .with_initializer(Initializer::Zeros)
            .init(device);
        loc2.bias = Some(Param::from_tensor(Tensor::from_floats(
            IDENTITY_AFFINE,
            device,
        )));

        SpatialCnn {
            loc1,
            loc_dropout: DropoutConfig::new(self.trunk.drop_prob).init(),
            loc2,
            trunk: self.trunk.init(device),
        }
    }
}

impl<B: Backend> SpatialCnn<B> {
    /// Affine transform predicted for each image.
    ///
    /// # Shapes
    /// - input: `[batch, img_height * img_width]`
    /// - output: `[batch, 6]`
    pub fn localise(&self, images: Tensor<B, 2>) -> Tensor<B, 2> {
        let h = self.loc1.forward(images).tanh();
        let h = self.loc_dropout.forward(h);
        self.loc2.forward(h).tanh()
    }

    /// # Shapes
    /// - input: `[batch, img_height * img_width]`
    /// - output: `[batch, class_count]`
    pub fn forward(&self, images: Tensor<B, 2>) -> Tensor<B, 2> {
        let [batch, _features] = images.dims();
        let (height, width) = (self.trunk.img_height, self.trunk.img_width);
        let theta = self.localise(images.clone());
        let shaped = images.reshape([batch, 1, height, width]);
        let transformed = affine_transform(shaped, theta, [height, width]);
        self.trunk.forward_images(transformed)
    }
}
