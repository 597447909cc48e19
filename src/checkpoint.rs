//! Checkpoint files of a trained classifier.
//!
//! A checkpoint named `name` inside a directory is made of:
//! - `name.mpk`: the model weights;
//! - `name-optim.mpk`: the optimizer state;
//! - `name.json`: the [`ImgConvNetsConfig`] the model was built from.
//!
//! The directory also holds a `checkpoint` index listing the retained
//! checkpoints, oldest first.

use crate::config::ImgConvNetsConfig;
use crate::error::{Error, Result};
use crate::model::ImgConvNet;
use crate::optim::{ImgConvNetOptim, init_optim};
use burn::optim::{AdamConfig, Optimizer};
use burn::prelude::*;
use burn::record::{FileRecorder, FullPrecisionSettings, NamedMpkFileRecorder, Recorder};
use burn::tensor::backend::AutodiffBackend;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub type RecorderTy = NamedMpkFileRecorder<FullPrecisionSettings>;

pub const INDEX_NAME: &str = "checkpoint";
pub const OPTIM_SUFFIX: &str = "-optim";

/// The retained checkpoints of a directory.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct CheckpointIndex {
    /// Most recently written checkpoint.
    pub latest: Option<String>,
    /// Retained checkpoint names, oldest first.
    pub retained: Vec<String>,
}

/// Writes the checkpoints of one training run, keeping at most `max_to_keep`.
///
/// A `max_to_keep` of 0 keeps every checkpoint.
#[derive(Debug)]
pub struct Checkpointer {
    dir: PathBuf,
    result_file: String,
    max_to_keep: usize,
    index: CheckpointIndex,
}

impl Checkpointer {
    pub fn new(
        dir: impl Into<PathBuf>,
        result_file: impl Into<String>,
        max_to_keep: usize,
    ) -> Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        // a resumed run keeps pruning what earlier runs retained
        let index = read_index(&dir)?;
        Ok(Self {
            dir,
            result_file: result_file.into(),
            max_to_keep,
            index,
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn index(&self) -> &CheckpointIndex {
        &self.index
    }

    /// `result_file`, suffixed by `-{step}` when a step is given.
    pub fn checkpoint_name(&self, step: Option<usize>) -> String {
        match step {
            Some(step) => format!("{}-{step}", self.result_file),
            None => self.result_file.clone(),
        }
    }

    /// Saves the model, its optimizer and its config, then prunes old checkpoints.
    ///
    /// Returns the path of the model file.
    pub fn save<AutoB: AutodiffBackend>(
        &mut self,
        model: &ImgConvNet<AutoB>,
        optim: &ImgConvNetOptim<AutoB>,
        config: &ImgConvNetsConfig,
        step: Option<usize>,
    ) -> Result<PathBuf> {
        let name = self.checkpoint_name(step);
        save_config(&self.dir, &name, config)?;
        save_optim::<AutoB>(&self.dir, &name, optim)?;
        let path = save_model(&self.dir, &name, model)?;

        self.index.retained.retain(|retained| retained != &name);
        self.index.retained.push(name.clone());
        self.index.latest = Some(name);
        if self.max_to_keep > 0 {
            while self.index.retained.len() > self.max_to_keep {
                let oldest = self.index.retained.remove(0);
                tracing::debug!(checkpoint = %oldest, "removing old checkpoint");
                remove_checkpoint::<AutoB>(&self.dir, &oldest)?;
            }
        }
        write_index(&self.dir, &self.index)?;

        Ok(path)
    }
}

fn model_path<B: Backend>(dir: &Path, name: &str) -> PathBuf {
    let file_ext = <RecorderTy as FileRecorder<B>>::file_extension();
    dir.join(format!("{name}.{file_ext}"))
}

fn optim_name(name: &str) -> String {
    format!("{name}{OPTIM_SUFFIX}")
}

fn config_path(dir: &Path, name: &str) -> PathBuf {
    dir.join(format!("{name}.json"))
}

/// Whether the model file of checkpoint `name` exists.
pub fn exists<B: Backend>(dir: &Path, name: &str) -> Result<bool> {
    Ok(std::fs::exists(model_path::<B>(dir, name))?)
}

pub fn save_config(dir: &Path, name: &str, config: &ImgConvNetsConfig) -> Result<()> {
    let path = config_path(dir, name);
    tracing::debug!(?path, "saving model config");
    config.save(&path)?;
    Ok(())
}

pub fn load_config(dir: &Path, name: &str) -> Result<ImgConvNetsConfig> {
    let path = config_path(dir, name);
    if !std::fs::exists(&path)? {
        return Err(Error::CheckpointNotFound(path));
    }
    tracing::debug!(?path, "loading model config");
    Ok(ImgConvNetsConfig::load(&path)?)
}

pub fn save_model<B: Backend>(dir: &Path, name: &str, model: &ImgConvNet<B>) -> Result<PathBuf> {
    let path_ext = model_path::<B>(dir, name);
    tracing::debug!(path = ?path_ext, "saving model");
    model
        .clone()
        .save_file(dir.join(name), &RecorderTy::new())?; // ext added automatically
    Ok(path_ext)
}

pub fn load_model<B: Backend>(
    dir: &Path,
    name: &str,
    config: &ImgConvNetsConfig,
    device: &B::Device,
) -> Result<ImgConvNet<B>> {
    let path_ext = model_path::<B>(dir, name);
    if !std::fs::exists(&path_ext)? {
        return Err(Error::CheckpointNotFound(path_ext));
    }
    tracing::debug!(path = ?path_ext, "loading model");
    let model_init = config.init::<B>(device)?;
    // ext added automatically
    let model = model_init.load_file(dir.join(name), &RecorderTy::new(), device)?;
    Ok(model)
}

pub fn save_optim<AutoB: AutodiffBackend>(
    dir: &Path,
    name: &str,
    optim: &ImgConvNetOptim<AutoB>,
) -> Result<()> {
    let name = optim_name(name);
    tracing::debug!(path = ?model_path::<AutoB>(dir, &name), "saving optim");
    let record = optim.to_record();
    RecorderTy::new().record(record, dir.join(name))?; // ext added automatically
    Ok(())
}

pub fn load_optim<AutoB: AutodiffBackend>(
    dir: &Path,
    name: &str,
    optim_config: &AdamConfig,
    device: &AutoB::Device,
) -> Result<ImgConvNetOptim<AutoB>> {
    let name = optim_name(name);
    let path_ext = model_path::<AutoB>(dir, &name);
    if !std::fs::exists(&path_ext)? {
        return Err(Error::CheckpointNotFound(path_ext));
    }
    tracing::debug!(path = ?path_ext, "loading optim");
    let optim_init = init_optim::<AutoB>(optim_config);
    let record = RecorderTy::new().load(dir.join(name), device)?; // ext added automatically
    Ok(optim_init.load_record(record))
}

pub fn read_index(dir: &Path) -> Result<CheckpointIndex> {
    let path = dir.join(INDEX_NAME);
    if !std::fs::exists(&path)? {
        return Ok(CheckpointIndex::default());
    }
    let file = std::fs::File::open(path)?;
    Ok(serde_json::from_reader(file)?)
}

fn write_index(dir: &Path, index: &CheckpointIndex) -> Result<()> {
    let file = std::fs::File::create(dir.join(INDEX_NAME))?;
    serde_json::to_writer_pretty(file, index)?;
    Ok(())
}

/// Deletes every file of checkpoint `name`, tolerating files that are already gone.
pub fn remove_checkpoint<B: Backend>(dir: &Path, name: &str) -> Result<()> {
    let paths = [
        model_path::<B>(dir, name),
        model_path::<B>(dir, &optim_name(name)),
        config_path(dir, name),
    ];
    for path in paths {
        match std::fs::remove_file(&path) {
            Ok(()) => {}
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
            Err(err) => return Err(err.into()),
        }
    }
    Ok(())
}
