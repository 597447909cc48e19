//! The backend the `imgconvnets` binary trains and predicts on.
//!
//! Exactly one `dev-*` feature picks it; `dev-f16` switches the float element.

use burn::prelude::*;

#[cfg(feature = "dev-f16")]
pub type Element = burn::tensor::f16;
#[cfg(not(feature = "dev-f16"))]
pub type Element = f32;

/// Backend of evaluation and prediction, where dropout is disabled.
#[cfg(feature = "dev-ndarray")]
pub type InferBackend = burn::backend::NdArray<Element, i32>;
#[cfg(any(feature = "dev-tch-cpu", feature = "dev-tch-gpu"))]
pub type InferBackend = burn::backend::libtorch::LibTorch<Element, i32>;
#[cfg(feature = "dev-wgpu")]
pub type InferBackend = burn::backend::wgpu::Wgpu<Element, i32>;
#[cfg(feature = "dev-cuda")]
pub type InferBackend = burn::backend::Cuda<Element, i32>;

/// Backend of training, with gradients over [InferBackend].
pub type TrainBackend = burn::backend::Autodiff<InferBackend>;

#[cfg(feature = "dev-ndarray")]
pub const BACKEND_NAME: &str = "ndarray";
#[cfg(feature = "dev-tch-cpu")]
pub const BACKEND_NAME: &str = "libtorch-cpu";
#[cfg(feature = "dev-tch-gpu")]
pub const BACKEND_NAME: &str = "libtorch-gpu";
#[cfg(feature = "dev-wgpu")]
pub const BACKEND_NAME: &str = "wgpu";
#[cfg(feature = "dev-cuda")]
pub const BACKEND_NAME: &str = "cuda";

/// The device both training and inference run on.
///
/// Training uses the same device through [TrainBackend], whose device type is
/// the one of [InferBackend].
pub fn device() -> <InferBackend as Backend>::Device {
    #[cfg(all(feature = "dev-tch-gpu", not(target_os = "macos")))]
    return burn::backend::libtorch::LibTorchDevice::Cuda(0);
    #[cfg(all(feature = "dev-tch-gpu", target_os = "macos"))]
    return burn::backend::libtorch::LibTorchDevice::Mps;
    #[cfg(not(feature = "dev-tch-gpu"))]
    Default::default()
}

#[cfg(not(feature = "_dev-has-backend"))]
mod err {
    use super::Element;
    std::compile_error!(
        "No dev backend selected. Enable one of the `dev-*` features of img-convnets."
    );

    // fall back to ndarray so the rest of the crate still type-checks
    pub type InferBackend = burn::backend::NdArray<Element, i32>;
    pub const BACKEND_NAME: &str = "none";
}
#[cfg(not(feature = "_dev-has-backend"))]
pub use err::*;
