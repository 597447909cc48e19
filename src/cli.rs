use img_convnets::prelude::*;
use std::path::{Path, PathBuf};

pub const HELP: &str = "\
imgconvnets

Trains convolutional classifiers of grayscale images and predicts with them.
Images and labels are read from IDX files (the MNIST file format).

USAGE:
    imgconvnets [OPTIONS]

When neither --training nor --inference is given, the program exits after handling
the configs.

BEHAVIOR OVERVIEW
- The program manages two configurations: training config and model config.
- If --training-config or --model-config is given, that config is loaded from the file
  and saved to the artifacts directory.
- Otherwise the config is loaded from the artifacts directory if present, or else built
  from the options below.
- Training writes `<result-file>` checkpoints (model, optimizer and model config) into
  the artifacts directory. Epochs that improve past the checkpoint accuracy are also
  saved as `<result-file>-<epoch>`.
- Inference restores `<result-file>` and prints the top-k classes of every image, one
  line per image.
- If both --training and --inference are given, training runs first.

FLAGS:
    -h, --help                  Show this help message and exit

OPTIONS:
    -t, --training              Train on --images and --labels
    -i, --inference             Predict the classes of --images
        --images <PATH>         IDX image file
        --labels <PATH>         IDX label file (required for training)
        --model <NAME>          BASIC, DCNN or STCNN [default: BASIC]
        --scope <NAME>          Namespace of new models, and the one inference asks for
                                [default: the stored model's scope, else imgconvnets]
        --classes <N>           Number of classes [default: 10]
        --result-file <NAME>    Checkpoint name [default: model]
    -k <K>                      Number of classes reported per image [default: 1]
    -c, --training-config <PATH>
                                Load training configuration from this file
    -m, --model-config <PATH>   Load model configuration from this file
    -a, --artifacts-path <PATH>
                                Directory where configurations and checkpoints are saved
                                and loaded. Defaults to a newly created temporary
                                directory (path will be logged).

The log level is read from RUST_LOG (default: info).
";

#[derive(Debug)]
pub struct AppArgs {
    pub training: bool,
    pub inference: bool,
    pub images: Option<PathBuf>,
    pub labels: Option<PathBuf>,
    pub model: ModelKind,
    /// `None` when `--scope` was not given.
    pub scope: Option<String>,
    pub classes: usize,
    pub result_file: String,
    pub k: usize,
    pub training_config: Option<PathBuf>,
    pub model_config: Option<PathBuf>,
    pub artifacts_path: Option<PathBuf>,
}

impl AppArgs {
    pub fn parse() -> std::result::Result<Self, pico_args::Error> {
        let mut pargs = pico_args::Arguments::from_env();

        // Help has a higher priority and should be handled separately.
        if pargs.contains(["-h", "--help"]) {
            println!("{HELP}");
            std::process::exit(0);
        }

        let args = AppArgs {
            images: pargs.opt_value_from_os_str("--images", parse_path)?,
            labels: pargs.opt_value_from_os_str("--labels", parse_path)?,
            model: pargs
                .opt_value_from_str("--model")?
                .unwrap_or(ModelKind::Basic),
            scope: pargs.opt_value_from_str("--scope")?,
            classes: pargs.opt_value_from_str("--classes")?.unwrap_or(10),
            result_file: pargs
                .opt_value_from_str("--result-file")?
                .unwrap_or_else(|| "model".to_string()),
            k: pargs.opt_value_from_str("-k")?.unwrap_or(1),
            training_config: pargs
                .opt_value_from_os_str(["-c", "--training-config"], parse_path)?,
            model_config: pargs.opt_value_from_os_str(["-m", "--model-config"], parse_path)?,
            artifacts_path: pargs
                .opt_value_from_os_str(["-a", "--artifacts-path"], parse_path)?,
            // must parse flags after values
            training: pargs.contains(["-t", "--training"]),
            inference: pargs.contains(["-i", "--inference"]),
        };

        let remaining = pargs.finish();
        if !remaining.is_empty() {
            return Err(pico_args::Error::ArgumentParsingFailed {
                cause: format!("unused arguments: {remaining:?}"),
            });
        }

        Ok(args)
    }

    /// The artifacts directory, creating a temporary one when none was given.
    pub fn artifacts_dir(&self) -> Result<PathBuf> {
        if let Some(path) = &self.artifacts_path {
            std::fs::create_dir_all(path)?;
            return Ok(path.clone());
        }
        // e.g. /tmp/img-convnets-imgconvnets-abcd-0
        let name = format!(
            "{}-{}-",
            std::env!("CARGO_PKG_NAME"),
            std::env!("CARGO_BIN_NAME")
        );
        let tmp = temp_dir::TempDir::with_prefix(name)?.dont_delete_on_drop();
        let path = tmp.path().to_path_buf();
        tracing::info!(?path, "new artifacts directory");
        Ok(path)
    }

    pub fn labels(&self) -> Result<&Path> {
        self.labels
            .as_deref()
            .ok_or_else(|| Error::InvalidConfig("--labels is required for training".into()))
    }

    /// The training config from `--training-config`, the artifacts directory, or the defaults.
    pub fn load_training_config(&self, artifacts_dir: &Path) -> Result<TrainingConfig> {
        let stored = artifacts_dir.join(TRAINING_CONFIG_NAME);
        let config = match &self.training_config {
            Some(path) => load_config(path)?,
            None if std::fs::exists(&stored)? => load_config(&stored)?,
            None => TrainingConfig::default(),
        };
        save_config(&stored, &config)?;
        Ok(config)
    }

    /// The model config from `--model-config`, the artifacts directory, or the options.
    pub fn load_model_config(
        &self,
        artifacts_dir: &Path,
        [img_height, img_width]: [usize; 2],
    ) -> Result<ImgConvNetsConfig> {
        let stored = artifacts_dir.join(MODEL_CONFIG_NAME);
        let config = match &self.model_config {
            Some(path) => load_config(path)?,
            None if std::fs::exists(&stored)? => load_config(&stored)?,
            None => ImgConvNetsConfig::new(
                self.model,
                self.scope.clone().unwrap_or_else(|| DEFAULT_SCOPE.to_string()),
                img_height,
                img_width,
                self.classes,
            ),
        };
        // without images there is no shape to store yet
        if config.validate().is_ok() {
            save_config(&stored, &config)?;
        }
        Ok(config)
    }

    /// The scope predictions are asked for: `--scope` when given, else the model's own.
    pub fn inference_scope<'a>(&'a self, config: &'a ImgConvNetsConfig) -> &'a str {
        self.scope.as_deref().unwrap_or(&config.model_scope)
    }
}

fn parse_path(s: &std::ffi::OsStr) -> std::result::Result<PathBuf, &'static str> {
    Ok(s.into())
}

pub const DEFAULT_SCOPE: &str = "imgconvnets";
pub const TRAINING_CONFIG_NAME: &str = "training_config.json";
pub const MODEL_CONFIG_NAME: &str = "model_config.json";

fn save_config(path: &Path, config: &impl burn::config::Config) -> Result<()> {
    tracing::info!(?path, "saving config");
    config.save(path)?;
    Ok(())
}

fn load_config<C: burn::config::Config>(path: &Path) -> Result<C> {
    tracing::info!(?path, "loading config");
    Ok(C::load(path)?)
}
