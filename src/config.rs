use crate::error::Error;
use crate::model::{BasicCnnConfig, DeepCnnConfig, ImgConvNet, SpatialCnnConfig};
use burn::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// One of the three fixed architectures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ModelKind {
    /// Two conv stacks followed by one hidden dense layer.
    #[serde(rename = "BASIC")]
    Basic,
    /// Factorized (1x3 / 3x1) conv stacks followed by two hidden dense layers.
    #[serde(rename = "DCNN")]
    Dcnn,
    /// The basic network preceded by a learned spatial transformer.
    #[serde(rename = "STCNN")]
    Stcnn,
}

impl ModelKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ModelKind::Basic => "BASIC",
            ModelKind::Dcnn => "DCNN",
            ModelKind::Stcnn => "STCNN",
        }
    }
}

impl fmt::Display for ModelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ModelKind {
    type Err = Error;

    fn from_str(s: &str) -> crate::error::Result<Self> {
        match s {
            "BASIC" => Ok(ModelKind::Basic),
            "DCNN" => Ok(ModelKind::Dcnn),
            "STCNN" => Ok(ModelKind::Stcnn),
            other => Err(Error::InvalidConfig(format!(
                "unknown model {other:?}, expected BASIC, DCNN or STCNN"
            ))),
        }
    }
}

/// Architecture and shape of a classifier.
///
/// This is also the metadata stored next to each checkpoint, so that a
/// checkpoint can be restored without knowing how it was trained.
#[derive(Config, Debug)]
pub struct ImgConvNetsConfig {
    pub model: ModelKind,
    /// Namespace the checkpoints are tagged with.
    ///
    /// Prediction must ask for the same scope the model was trained under.
    pub model_scope: String,
    /// Pixel rows of an input image. Must be a multiple of 4.
    pub img_height: usize,
    /// Pixel columns of an input image. Must be a multiple of 4.
    pub img_width: usize,
    pub class_count: usize,
    /// Probability that a unit is kept by dropout during training.
    #[config(default = 0.5)]
    pub keep_prob: f64,
}

impl ImgConvNetsConfig {
    pub fn validate(&self) -> crate::error::Result<()> {
        let (height, width) = (self.img_height, self.img_width);
        if height == 0 || width == 0 || height % 4 != 0 || width % 4 != 0 {
            return Err(Error::InvalidImageSize { height, width });
        }
        if self.class_count == 0 {
            return Err(Error::InvalidConfig("class_count must be at least 1".into()));
        }
        if !(self.keep_prob > 0.0 && self.keep_prob <= 1.0) {
            return Err(Error::InvalidConfig(format!(
                "keep_prob {} is outside of (0, 1]",
                self.keep_prob
            )));
        }
        Ok(())
    }

    /// Number of pixel features per image row.
    pub fn feature_count(&self) -> usize {
        self.img_height * self.img_width
    }

    /// Flattened size after the two 2x2 poolings with 64 channels.
    pub fn pooled_features(&self) -> usize {
        (self.img_height / 4) * (self.img_width / 4) * 64
    }

    /// Dropout probability of dropping a unit.
    pub fn drop_prob(&self) -> f64 {
        1.0 - self.keep_prob
    }

    /// Returns the initialized model.
    pub fn init<B: Backend>(&self, device: &B::Device) -> crate::error::Result<ImgConvNet<B>> {
        self.validate()?;
        let model = match self.model {
            ModelKind::Basic => ImgConvNet::Basic(BasicCnnConfig::from_shape(self).init(device)),
            ModelKind::Dcnn => ImgConvNet::Dcnn(DeepCnnConfig::from_shape(self).init(device)),
            ModelKind::Stcnn => {
                ImgConvNet::Stcnn(SpatialCnnConfig::from_shape(self).init(device))
            }
        };
        Ok(model)
    }
}
