//! Convolutional classifiers of grayscale images, built on burn.
//!
//! Three architectures share one training loop and one checkpoint layout:
//! a basic two-layer CNN, a deeper CNN with factorized kernels, and a CNN
//! behind a spatial transformer.

pub mod backend;
pub mod checkpoint;
pub mod config;
pub mod data;
pub mod error;
pub mod idx;
pub mod layers;
pub mod model;
pub mod optim;
pub mod predict;
pub mod schedule;
pub mod training;
pub mod transformer;

pub mod prelude {
    pub use crate::checkpoint::{CheckpointIndex, Checkpointer};
    pub use crate::config::{ImgConvNetsConfig, ModelKind};
    pub use crate::data::{ImageBatch, ImageBatcher, ImageDataset, ImageItem, WrappingBatches};
    pub use crate::error::{Error, Result};
    pub use crate::model::{BasicCnn, DeepCnn, ImgConvNet, SpatialCnn};
    pub use crate::predict::{TopK, predict};
    pub use crate::schedule::LearningRateSchedule;
    pub use crate::training::{EpochStats, Evaluation, ImgConvNets, TrainingConfig, TrainingReport};
}
