use crate::error::{Error, Result};
use burn::data::dataloader::batcher::Batcher;
use burn::data::dataset::transform::ShuffledDataset;
use burn::data::dataset::{Dataset, InMemDataset};
use burn::prelude::*;
use serde::{Deserialize, Serialize};

/// One grayscale image and its class.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct ImageItem {
    /// Image as a flat row-major array of pixel features.
    ///
    /// # Shape
    /// [img_height * img_width]
    pub pixels: Vec<f32>,

    /// Class index of the image.
    pub label: usize,
}

/// In-memory set of images that all have the same number of features.
pub struct ImageDataset {
    dataset: InMemDataset<ImageItem>,
    feature_count: usize,
}

impl Dataset<ImageItem> for ImageDataset {
    fn get(&self, index: usize) -> Option<ImageItem> {
        self.dataset.get(index)
    }

    fn len(&self) -> usize {
        self.dataset.len()
    }
}

impl ImageDataset {
    /// Pairs each feature row with its label.
    ///
    /// Every row must hold the same number of features, and there must be one
    /// label per row.
    pub fn from_rows(features: Vec<Vec<f32>>, labels: Vec<usize>) -> Result<Self> {
        if features.len() != labels.len() {
            return Err(Error::LabelCountMismatch {
                features: features.len(),
                labels: labels.len(),
            });
        }
        let feature_count = features.first().map(Vec::len).ok_or(Error::EmptyDataset)?;
        if let Some(row) = features.iter().find(|row| row.len() != feature_count) {
            return Err(Error::FeatureMismatch {
                expected: feature_count,
                found: row.len(),
            });
        }

        let items = features
            .into_iter()
            .zip(labels)
            .map(|(pixels, label)| ImageItem { pixels, label })
            .collect();
        Ok(Self {
            dataset: InMemDataset::new(items),
            feature_count,
        })
    }

    /// Number of pixel features of each image.
    pub fn feature_count(&self) -> usize {
        self.feature_count
    }

    /// Checks that every label is a valid class index.
    pub fn check_labels(&self, class_count: usize) -> Result<()> {
        for (row, item) in self.dataset.iter().enumerate() {
            if item.label >= class_count {
                return Err(Error::LabelOutOfRange {
                    row,
                    label: item.label,
                    class_count,
                });
            }
        }
        Ok(())
    }

    /// A single fixed permutation of the items.
    pub fn permuted(self, seed: u64) -> ShuffledDataset<Self, ImageItem> {
        ShuffledDataset::with_seed(self, seed)
    }
}

#[derive(Clone, Debug)]
pub struct ImageBatch<B: Backend> {
    /// # Shape
    /// [batch_size, img_height * img_width]
    pub images: Tensor<B, 2>,
    /// # Shape
    /// [batch_size]
    pub targets: Tensor<B, 1, Int>,
}

#[derive(Clone, Default)]
pub struct ImageBatcher {}

impl<B: Backend> Batcher<B, ImageItem, ImageBatch<B>> for ImageBatcher {
    fn batch(&self, items: Vec<ImageItem>, device: &B::Device) -> ImageBatch<B> {
        let batch_size = items.len();
        let feature_count = items.first().map_or(0, |item| item.pixels.len());

        let (pixels, labels): (Vec<_>, Vec<_>) = items
            .into_iter()
            .map(|item| (item.pixels, item.label as i64))
            .unzip();
        let pixels: Vec<f32> = pixels.into_iter().flatten().collect();

        let images = TensorData::new(pixels, [batch_size, feature_count]).convert::<B::FloatElem>();
        let targets = TensorData::new(labels, [batch_size]).convert::<B::IntElem>();

        ImageBatch {
            images: Tensor::from_data(images, device),
            targets: Tensor::from_data(targets, device),
        }
    }
}

/// Fixed-size batches that wrap around the end of the dataset.
///
/// An epoch has `ceil(len / batch_size)` steps. Step `s` starts at item
/// `(s * batch_size) % len` and always takes `batch_size` items, continuing
/// from the start of the dataset when it runs past the end.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WrappingBatches {
    pub len: usize,
    pub batch_size: usize,
}

impl WrappingBatches {
    pub fn new(len: usize, batch_size: usize) -> Self {
        Self { len, batch_size }
    }

    pub fn steps_per_epoch(&self) -> usize {
        self.len.div_ceil(self.batch_size)
    }

    /// Item indices of the batch at `step`.
    pub fn indices(&self, step: usize) -> Vec<usize> {
        if self.len == 0 {
            return Vec::new();
        }
        let start = (step * self.batch_size) % self.len;
        (0..self.batch_size)
            .map(|offset| (start + offset) % self.len)
            .collect()
    }

    /// Collects and batches the items of `step`.
    pub fn batch<B, D, T>(
        &self,
        dataset: &D,
        batcher: &T,
        step: usize,
        device: &B::Device,
    ) -> ImageBatch<B>
    where
        B: Backend,
        D: Dataset<ImageItem>,
        T: Batcher<B, ImageItem, ImageBatch<B>>,
    {
        let items = self
            .indices(step)
            .into_iter()
            .filter_map(|i| dataset.get(i))
            .collect();
        batcher.batch(items, device)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    type TestBackend = NdArray<f32>;

    fn dataset(rows: usize) -> ImageDataset {
        let features = (0..rows).map(|i| vec![i as f32; 4]).collect();
        let labels = (0..rows).map(|i| i % 2).collect();
        ImageDataset::from_rows(features, labels).unwrap()
    }

    #[test]
    fn rows_and_labels_must_agree() {
        let err = ImageDataset::from_rows(vec![vec![0.0; 4]; 3], vec![0, 1]).err();
        assert!(matches!(
            err,
            Some(Error::LabelCountMismatch {
                features: 3,
                labels: 2
            })
        ));

        let err = ImageDataset::from_rows(vec![vec![0.0; 4], vec![0.0; 5]], vec![0, 1]).err();
        assert!(matches!(
            err,
            Some(Error::FeatureMismatch {
                expected: 4,
                found: 5
            })
        ));

        let err = ImageDataset::from_rows(vec![], vec![]).err();
        assert!(matches!(err, Some(Error::EmptyDataset)));
    }

    #[test]
    fn labels_are_checked_against_class_count() {
        let data = dataset(5);
        data.check_labels(2).unwrap();
        assert!(matches!(
            data.check_labels(1),
            Err(Error::LabelOutOfRange {
                row: 1,
                label: 1,
                class_count: 1
            })
        ));
    }

    #[test]
    fn last_batch_wraps_to_the_start() {
        let batches = WrappingBatches::new(10, 4);
        assert_eq!(batches.steps_per_epoch(), 3);
        assert_eq!(batches.indices(0), vec![0, 1, 2, 3]);
        assert_eq!(batches.indices(1), vec![4, 5, 6, 7]);
        assert_eq!(batches.indices(2), vec![8, 9, 0, 1]);
    }

    #[test]
    fn batches_larger_than_the_dataset_repeat_items() {
        let batches = WrappingBatches::new(3, 5);
        assert_eq!(batches.steps_per_epoch(), 1);
        assert_eq!(batches.indices(0), vec![0, 1, 2, 0, 1]);
        // later steps keep cycling from where the start index lands
        assert_eq!(batches.indices(1), vec![2, 0, 1, 2, 0]);
    }

    #[test]
    fn permutation_is_seeded() {
        let a: Vec<_> = dataset(16).permuted(7).iter().map(|item| item.pixels[0]).collect();
        let b: Vec<_> = dataset(16).permuted(7).iter().map(|item| item.pixels[0]).collect();
        assert_eq!(a, b);
        let mut sorted = a.clone();
        sorted.sort_by(f32::total_cmp);
        assert_eq!(sorted, (0..16).map(|i| i as f32).collect::<Vec<_>>());
    }

    #[test]
    fn batcher_builds_image_and_target_tensors() {
        let device = Default::default();
        let data = dataset(6);
        let batch: ImageBatch<TestBackend> =
            WrappingBatches::new(6, 4).batch(&data, &ImageBatcher::default(), 1, &device);
        assert_eq!(batch.images.dims(), [4, 4]);
        let firsts = batch
            .images
            .narrow(1, 0, 1)
            .into_data()
            .to_vec::<f32>()
            .unwrap();
        assert_eq!(firsts, vec![4.0, 5.0, 0.0, 1.0]);
        let targets = batch.targets.into_data().to_vec::<i64>().unwrap();
        assert_eq!(targets, vec![0, 1, 0, 1]);
    }
}
