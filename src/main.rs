use burn::backend::Autodiff;
use burn::prelude::*;
use img_convnets::backend::{self, BACKEND_NAME, InferBackend};
use img_convnets::prelude::*;
use img_convnets::{checkpoint, idx};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

mod cli;

use cli::AppArgs;

/// Trains on `Autodiff<B>`, then evaluates and predicts on `B`, all on `device`.
pub fn launch<B: Backend>(app_args: &AppArgs, device: &B::Device) -> Result<()> {
    let artifacts_dir = app_args.artifacts_dir()?;

    let training_config = app_args.load_training_config(&artifacts_dir)?;
    let images = match &app_args.images {
        Some(path) => Some(idx::read_images(path)?),
        None => None,
    };
    let shape = images
        .as_ref()
        .map_or([0, 0], |images| [images.height, images.width]);
    let model_config = app_args.load_model_config(&artifacts_dir, shape)?;
    let convnets = ImgConvNets::new(model_config, training_config);

    if app_args.training {
        let images = images
            .as_ref()
            .ok_or_else(|| Error::InvalidConfig("--images is required".into()))?;
        let labels: Vec<usize> = idx::read_labels(app_args.labels()?)?
            .into_iter()
            .map(usize::from)
            .collect();

        let dataset = ImageDataset::from_rows(images.features(), labels.clone())?;
        let report = convnets.train::<Autodiff<B>>(
            dataset,
            &artifacts_dir,
            &app_args.result_file,
            device,
        )?;
        if let Some(last) = report.epochs.last() {
            tracing::info!(
                epochs = report.epochs.len(),
                stopped_early = report.stopped_early,
                mean_accuracy = last.mean_accuracy,
                checkpoint = ?report.checkpoint,
                "training done"
            );
        }

        let dataset = ImageDataset::from_rows(images.features(), labels)?;
        let model = checkpoint::load_model::<B>(
            &artifacts_dir,
            &app_args.result_file,
            &convnets.model,
            device,
        )?;
        let evaluation = convnets.evaluate(&model, &dataset, device)?;
        tracing::info!(
            loss = evaluation.loss,
            accuracy = evaluation.accuracy,
            "evaluation on the training set"
        );
    }

    if app_args.inference {
        let images = images
            .as_ref()
            .ok_or_else(|| Error::InvalidConfig("--images is required".into()))?;
        let top = predict::<B>(
            app_args.inference_scope(&convnets.model),
            &artifacts_dir,
            &app_args.result_file,
            &images.features(),
            app_args.k,
            device,
        )?;
        for (values, indices) in top.values.iter().zip(&top.indices) {
            let line: Vec<String> = indices
                .iter()
                .zip(values)
                .map(|(class, probability)| format!("{class}:{probability:.4}"))
                .collect();
            println!("{}", line.join(" "));
        }
    }

    Ok(())
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let app_args = match AppArgs::parse() {
        Ok(app_args) => app_args,
        Err(err) => {
            eprintln!("error: {err}\n\n{}", cli::HELP);
            return ExitCode::FAILURE;
        }
    };

    let device = backend::device();
    tracing::info!(backend = BACKEND_NAME, ?device, "selected backend");
    match launch::<InferBackend>(&app_args, &device) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!("{err}");
            ExitCode::FAILURE
        }
    }
}
