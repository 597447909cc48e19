use burn::module::Param;
use burn::nn::conv::{Conv2d, Conv2dConfig};
use burn::nn::pool::{MaxPool2d, MaxPool2dConfig};
use burn::nn::{Initializer, Linear, LinearConfig, PaddingConfig2d};
use burn::prelude::*;
use burn::tensor::Distribution;
use burn::tensor::activation::relu;

/// Standard deviation of every truncated-normal weight.
pub const WEIGHT_STD: f64 = 0.1;
/// Initial value of every conv and dense bias.
pub const BIAS_INIT: f64 = 0.1;

const RESAMPLE_ROUNDS: usize = 4;

/// Normal samples with every value beyond two standard deviations redrawn.
///
/// Values still out of range after a few redraws are clamped to the bound.
pub fn truncated_normal<B: Backend, const D: usize>(
    shape: [usize; D],
    std: f64,
    device: &B::Device,
) -> Param<Tensor<B, D>> {
    let bound = 2.0 * std;
    let distribution = Distribution::Normal(0.0, std);
    let mut values = Tensor::<B, D>::random(shape, distribution, device);
    for _ in 0..RESAMPLE_ROUNDS {
        let outside = values.clone().abs().greater_elem(bound);
        let redrawn = Tensor::<B, D>::random(shape, distribution, device);
        values = values.mask_where(outside, redrawn);
    }
    Param::from_tensor(values.clamp(-bound, bound))
}

fn constant_bias<B: Backend>(size: usize, device: &B::Device) -> Param<Tensor<B, 1>> {
    Initializer::Constant { value: BIAS_INIT }.init([size], device)
}

/// A stride-1 2-D convolution with SAME padding.
///
/// # Shapes
/// - weight: `[channels_out, channels_in, kernel_h, kernel_w]`
pub fn conv_same<B: Backend>(
    channels: [usize; 2],
    kernel_size: [usize; 2],
    device: &B::Device,
) -> Conv2d<B> {
    let [channels_in, channels_out] = channels;
    let [kernel_h, kernel_w] = kernel_size;
    let mut conv = Conv2dConfig::new(channels, kernel_size)
        .with_padding(PaddingConfig2d::Same)
        .with_bias(true)
        .init(device);
    let shape = [channels_out, channels_in, kernel_h, kernel_w];
    conv.weight = truncated_normal(shape, WEIGHT_STD, device);
    conv.bias = Some(constant_bias(channels_out, device));
    conv
}

/// A fully connected layer.
///
/// # Shapes
/// - weight: `[d_input, d_output]`
pub fn dense<B: Backend>(d_input: usize, d_output: usize, device: &B::Device) -> Linear<B> {
    let mut linear = LinearConfig::new(d_input, d_output)
        .with_bias(true)
        .init(device);
    linear.weight = truncated_normal([d_input, d_output], WEIGHT_STD, device);
    linear.bias = Some(constant_bias(d_output, device));
    linear
}

/// 2x2 max pooling with stride 2.
///
/// Input sides are always even here, so no padding is needed to halve them.
pub fn max_pool_2x2() -> MaxPool2d {
    MaxPool2dConfig::new([2, 2])
        .with_strides([2, 2])
        .with_padding(PaddingConfig2d::Valid)
        .init()
}

/// Conv layers (each followed by a ReLU) and a closing 2x2 max pool.
#[derive(Module, Debug)]
pub struct ConvStack<B: Backend> {
    pub convs: Vec<Conv2d<B>>,
    pub pool: MaxPool2d,
}

/// Configuration to create a [ConvStack](ConvStack).
#[derive(Config, Debug)]
pub struct ConvStackConfig {
    pub channels_in: usize,
    pub channels_out: usize,
    /// Kernel of each conv layer, in order.
    ///
    /// The first layer maps `channels_in -> channels_out`, the others keep `channels_out`.
    pub kernels: Vec<[usize; 2]>,
}

impl ConvStackConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> ConvStack<B> {
        let convs = self
            .kernels
            .iter()
            .enumerate()
            .map(|(i, kernel)| {
                let channels_in = if i == 0 {
                    self.channels_in
                } else {
                    self.channels_out
                };
                conv_same([channels_in, self.channels_out], *kernel, device)
            })
            .collect();
        ConvStack {
            convs,
            pool: max_pool_2x2(),
        }
    }
}

impl<B: Backend> ConvStack<B> {
    /// # Shapes
    /// - input: `[batch, channels_in, height, width]`
    /// - output: `[batch, channels_out, height / 2, width / 2]`
    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        let x = self
            .convs
            .iter()
            .fold(x, |x, conv| relu(conv.forward(x)));
        self.pool.forward(x)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    type TestBackend = NdArray<f32>;

    #[test]
    fn truncated_normal_stays_within_two_std() {
        let device = Default::default();
        let values = truncated_normal::<TestBackend, 2>([64, 64], 0.1, &device).val();
        let max = values.abs().max().into_scalar();
        assert!(max <= 0.2 + 1e-6, "max magnitude {max}");
    }

    #[test]
    fn conv_same_keeps_spatial_size_and_bias() {
        let device = Default::default();
        let conv = conv_same::<TestBackend>([1, 4], [1, 3], &device);
        assert_eq!(conv.weight.dims(), [4, 1, 1, 3]);
        let bias = conv.bias.as_ref().unwrap().val().into_data().to_vec::<f32>().unwrap();
        assert!(bias.iter().all(|b| (*b - 0.1).abs() < 1e-6));

        let x = Tensor::<TestBackend, 4>::ones([2, 1, 8, 12], &device);
        assert_eq!(conv.forward(x).dims(), [2, 4, 8, 12]);
    }

    #[test]
    fn conv_stack_halves_the_image() {
        let device = Default::default();
        let stack = ConvStackConfig::new(1, 8, vec![[3, 3], [1, 3], [3, 1], [3, 3]])
            .init::<TestBackend>(&device);
        assert_eq!(stack.convs.len(), 4);
        assert_eq!(stack.convs[1].weight.dims(), [8, 8, 1, 3]);

        let x = Tensor::<TestBackend, 4>::random([3, 1, 8, 4], Distribution::Default, &device);
        let y = stack.forward(x);
        assert_eq!(y.dims(), [3, 8, 4, 2]);
        // relu then max pool
        assert!(y.min().into_scalar() >= 0.0);
    }
}
