use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while configuring, training or querying a classifier.
#[derive(Error, Debug)]
pub enum Error {
    /// Image height and width must both be non-zero multiples of 4.
    #[error("image size {height}x{width} is not a multiple of 4 in both dimensions")]
    InvalidImageSize { height: usize, width: usize },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("image feature dimension {found} does not match the image size ({expected} pixels)")]
    FeatureMismatch { expected: usize, found: usize },

    #[error("{features} feature rows were given with {labels} labels")]
    LabelCountMismatch { features: usize, labels: usize },

    #[error("label {label} at row {row} is outside of [0, {class_count})")]
    LabelOutOfRange {
        row: usize,
        label: usize,
        class_count: usize,
    },

    #[error("the training set is empty")]
    EmptyDataset,

    #[error("top-k of {k} requested from {class_count} classes")]
    InvalidTopK { k: usize, class_count: usize },

    #[error("checkpoint was trained under scope {found:?}, not {expected:?}")]
    ScopeMismatch { expected: String, found: String },

    #[error("checkpoint {0:?} was not found")]
    CheckpointNotFound(PathBuf),

    #[error("malformed IDX file {path:?}: {reason}")]
    MalformedIdx { path: PathBuf, reason: String },

    #[error("config error: {0}")]
    Config(#[from] burn::config::ConfigError),

    #[error("recorder error: {0}")]
    Recorder(#[from] burn::record::RecorderError),

    #[error("tensor data error: {0}")]
    TensorData(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
