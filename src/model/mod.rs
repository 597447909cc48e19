mod basic;
mod deep;
mod spatial;

pub use basic::{BasicCnn, BasicCnnConfig};
pub use deep::{DeepCnn, DeepCnnConfig};
pub use spatial::{IDENTITY_AFFINE, SpatialCnn, SpatialCnnConfig};

use crate::config::ModelKind;
use burn::nn::loss::CrossEntropyLossConfig;
use burn::prelude::*;
use burn::tensor::activation::softmax;
use burn::train::ClassificationOutput;

/// Any of the three classifier architectures.
#[derive(Module, Debug)]
pub enum ImgConvNet<B: Backend> {
    Basic(BasicCnn<B>),
    Dcnn(DeepCnn<B>),
    Stcnn(SpatialCnn<B>),
}

impl<B: Backend> ImgConvNet<B> {
    pub fn kind(&self) -> ModelKind {
        match self {
            ImgConvNet::Basic(_) => ModelKind::Basic,
            ImgConvNet::Dcnn(_) => ModelKind::Dcnn,
            ImgConvNet::Stcnn(_) => ModelKind::Stcnn,
        }
    }

    /// Logits for a batch of flat images.
    ///
    /// # Shapes
    /// - input: `[batch, img_height * img_width]`
    /// - output: `[batch, class_count]`
    pub fn forward(&self, images: Tensor<B, 2>) -> Tensor<B, 2> {
        match self {
            ImgConvNet::Basic(model) => model.forward(images),
            ImgConvNet::Dcnn(model) => model.forward(images),
            ImgConvNet::Stcnn(model) => model.forward(images),
        }
    }

    /// Class probabilities for a batch of flat images.
    pub fn probabilities(&self, images: Tensor<B, 2>) -> Tensor<B, 2> {
        softmax(self.forward(images), 1)
    }

    /// Logits with the mean sparse softmax cross-entropy against `targets`.
    ///
    /// # Shapes
    /// - images: `[batch, img_height * img_width]`
    /// - targets: `[batch]`
    pub fn forward_classification(
        &self,
        images: Tensor<B, 2>,
        targets: Tensor<B, 1, Int>,
    ) -> ClassificationOutput<B> {
        let [batch_size, _features] = images.dims();
        assert_eq!([batch_size], targets.dims());

        let output = self.forward(images);
        let loss = CrossEntropyLossConfig::new()
            .init(&output.device())
            .forward(output.clone(), targets.clone());

        ClassificationOutput::new(loss, output, targets)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ImgConvNetsConfig, ModelKind};
    use burn::backend::{Autodiff, NdArray};
    use burn::tensor::Distribution;

    type TestBackend = NdArray<f32>;
    type TestAutodiffBackend = Autodiff<TestBackend>;

    fn config(model: ModelKind) -> ImgConvNetsConfig {
        ImgConvNetsConfig::new(model, "test".into(), 8, 12, 3)
    }

    #[test]
    fn every_architecture_maps_images_to_logits() {
        let device = Default::default();
        for kind in [ModelKind::Basic, ModelKind::Dcnn, ModelKind::Stcnn] {
            let model = config(kind).init::<TestBackend>(&device).unwrap();
            assert_eq!(model.kind(), kind);
            let images = Tensor::<TestBackend, 2>::random([5, 96], Distribution::Default, &device);
            assert_eq!(model.forward(images).dims(), [5, 3], "{kind}");
        }
    }

    #[test]
    fn deep_network_uses_factorized_kernels() {
        let device = Default::default();
        let ImgConvNet::Dcnn(model) = config(ModelKind::Dcnn).init::<TestBackend>(&device).unwrap()
        else {
            panic!("expected DCNN");
        };
        let kernels: Vec<_> = model
            .conv2
            .convs
            .iter()
            .map(|conv| {
                let [_, _, kh, kw] = conv.weight.dims();
                [kh, kw]
            })
            .collect();
        assert_eq!(kernels, vec![[3, 3], [1, 3], [3, 1], [3, 3]]);
        assert_eq!(model.fc1.weight.dims(), [2 * 3 * 64, 1024]);
        assert_eq!(model.fc2.weight.dims(), [1024, 1024]);
    }

    #[test]
    fn spatial_transformer_starts_near_identity() {
        let device = Default::default();
        let ImgConvNet::Stcnn(model) =
            config(ModelKind::Stcnn).init::<TestBackend>(&device).unwrap()
        else {
            panic!("expected STCNN");
        };
        let images = Tensor::<TestBackend, 2>::random([2, 96], Distribution::Default, &device);
        // zero weights: the transform is tanh of the identity bias, whatever the image
        let theta = model.localise(images);
        assert_eq!(theta.dims(), [2, 6]);
        let theta = theta.into_data().to_vec::<f32>().unwrap();
        for (i, value) in theta.iter().enumerate() {
            let expected = IDENTITY_AFFINE[i % 6].tanh();
            assert!((value - expected).abs() < 1e-5, "theta[{i}] = {value}");
        }
    }

    #[test]
    fn probabilities_sum_to_one() {
        let device = Default::default();
        let model = config(ModelKind::Basic).init::<TestBackend>(&device).unwrap();
        let images = Tensor::<TestBackend, 2>::random([4, 96], Distribution::Default, &device);
        let sums = model
            .probabilities(images)
            .sum_dim(1)
            .into_data()
            .to_vec::<f32>()
            .unwrap();
        assert!(sums.iter().all(|s| (s - 1.0).abs() < 1e-4), "{sums:?}");
    }

    #[test]
    fn classification_loss_backpropagates() {
        let device = Default::default();
        let model = config(ModelKind::Dcnn)
            .init::<TestAutodiffBackend>(&device)
            .unwrap();
        let images =
            Tensor::<TestAutodiffBackend, 2>::random([4, 96], Distribution::Default, &device);
        let targets = Tensor::<TestAutodiffBackend, 1, Int>::from_ints([0, 1, 2, 1], &device);
        let output = model.forward_classification(images, targets);
        let loss = output.loss.clone().into_scalar();
        assert!(loss.is_finite() && loss > 0.0);

        let ImgConvNet::Dcnn(inner) = &model else {
            panic!("expected DCNN");
        };
        let grads = output.loss.backward();
        assert!(inner.readout.weight.grad(&grads).is_some());
    }
}
