use crate::checkpoint;
use crate::error::{Error, Result};
use burn::prelude::*;
use std::path::Path;

/// The `k` most probable classes of each image, most probable first.
#[derive(Debug, Clone, PartialEq)]
pub struct TopK {
    /// Softmax probabilities, one row per image.
    pub values: Vec<Vec<f32>>,
    /// Class indices matching `values`.
    pub indices: Vec<Vec<usize>>,
}

/// Restores the `result_file` checkpoint from `result_dir` and classifies `features`.
///
/// The checkpoint must have been trained under `model_scope`. Each row of
/// `features` is one flattened image, and `k` must be within `1..=class_count`.
pub fn predict<B: Backend>(
    model_scope: &str,
    result_dir: &Path,
    result_file: &str,
    features: &[Vec<f32>],
    k: usize,
    device: &B::Device,
) -> Result<TopK> {
    let config = checkpoint::load_config(result_dir, result_file)?;
    if config.model_scope != model_scope {
        return Err(Error::ScopeMismatch {
            expected: model_scope.to_string(),
            found: config.model_scope,
        });
    }
    if k == 0 || k > config.class_count {
        return Err(Error::InvalidTopK {
            k,
            class_count: config.class_count,
        });
    }
    let feature_count = config.feature_count();
    if let Some(row) = features.iter().find(|row| row.len() != feature_count) {
        return Err(Error::FeatureMismatch {
            expected: feature_count,
            found: row.len(),
        });
    }
    if features.is_empty() {
        return Ok(TopK {
            values: vec![],
            indices: vec![],
        });
    }

    let model = checkpoint::load_model::<B>(result_dir, result_file, &config, device)?;
    tracing::debug!(model = %config.model, images = features.len(), k, "predicting");

    let rows = features.len();
    let flat: Vec<f32> = features.iter().flatten().copied().collect();
    let images = TensorData::new(flat, [rows, feature_count]).convert::<B::FloatElem>();
    let images = Tensor::<B, 2>::from_data(images, device);
    let probabilities = model.probabilities(images);
    let (values, indices) = probabilities.topk_with_indices(k, 1);

    let values = values
        .into_data()
        .convert::<f32>()
        .to_vec::<f32>()
        .map_err(|e| Error::TensorData(format!("{e:?}")))?;
    let indices = indices
        .into_data()
        .convert::<i64>()
        .to_vec::<i64>()
        .map_err(|e| Error::TensorData(format!("{e:?}")))?;

    Ok(TopK {
        values: values.chunks(k).map(<[f32]>::to_vec).collect(),
        indices: indices
            .chunks(k)
            .map(|row| row.iter().map(|&i| i as usize).collect())
            .collect(),
    })
}
