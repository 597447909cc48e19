//! Training is a function of its configs and data once the seed is fixed.
//!
//! Kept in its own test binary: the ndarray backend seeds a process-wide
//! generator, which concurrent tests in the same process would draw from.

use burn::backend::{Autodiff, NdArray};
use img_convnets::prelude::*;
use temp_dir::TempDir;

type TestAutodiffBackend = Autodiff<NdArray<f32>>;

/// Two classes: bright top half or bright bottom half.
fn halves(rows: usize) -> ImageDataset {
    let (features, labels) = (0..rows)
        .map(|i| {
            let label = i % 2;
            let pixels = (0..16)
                .map(|p| if (p < 8) == (label == 0) { 1.0 } else { 0.0 })
                .collect::<Vec<f32>>();
            (pixels, label)
        })
        .unzip();
    ImageDataset::from_rows(features, labels).unwrap()
}

fn train(model: ModelKind, seed: u64) -> Vec<EpochStats> {
    let tmp = TempDir::new().unwrap();
    let device = Default::default();
    let convnets = ImgConvNets::new(
        ImgConvNetsConfig::new(model, "halves".into(), 4, 4, 2),
        TrainingConfig::default()
            .with_num_epochs(2)
            .with_batch_size(4)
            .with_seed(seed)
            .with_checkpoint_accuracy(101.0)
            .with_stop_accuracy(101.0),
    );
    let report = convnets
        .train::<TestAutodiffBackend>(halves(8), tmp.path(), "halves", &device)
        .unwrap();
    assert_eq!(report.epochs.len(), 2);
    report.epochs
}

#[test]
fn same_seed_gives_the_same_epochs() {
    for model in [ModelKind::Basic, ModelKind::Stcnn] {
        let first = train(model, 7);
        let second = train(model, 7);
        assert_eq!(first, second, "{model} training is not reproducible");
    }
}
