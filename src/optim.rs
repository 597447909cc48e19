use crate::model::ImgConvNet;
use burn::optim::{Adam, AdamConfig, adaptor::OptimizerAdaptor};
use burn::tensor::backend::AutodiffBackend;

/// Epsilon of the Adam denominator.
pub const ADAM_EPSILON: f32 = 1e-8;

/// Adam over every parameter of an [ImgConvNet].
pub type ImgConvNetOptim<AutoB> = OptimizerAdaptor<Adam, ImgConvNet<AutoB>, AutoB>;

/// Plain Adam, with no weight decay nor gradient clipping.
pub fn optimizer_config() -> AdamConfig {
    AdamConfig::new().with_epsilon(ADAM_EPSILON)
}

/// A fresh optimizer, with no first nor second moments yet.
pub fn init_optim<AutoB: AutodiffBackend>(config: &AdamConfig) -> ImgConvNetOptim<AutoB> {
    config.init::<AutoB, ImgConvNet<AutoB>>()
}
