//! Configuration of behavior cloning.
use crate::opt::OptimizerConfig;
use anyhow::Result;
use log::info;
use serde::{Deserialize, Serialize};
use std::{
    fs::File,
    io::{BufReader, Write},
    path::Path,
};

/// Constructs [`CloneTrainer`](super::CloneTrainer).
#[derive(Debug, Deserialize, Serialize, PartialEq, Clone)]
pub struct CloneConfig {
    /// Number of recordings per mini-batch.
    pub batch_size: usize,

    /// Coefficient of the L2 penalty on the parameters.
    pub l2_reg: f32,

    /// Optimizer of the policy.
    pub optimizer: OptimizerConfig,

    /// Iterations between two validation costs.
    pub val_interval: usize,

    /// Stops after this many iterations.
    pub max_iters: Option<usize>,

    /// Seed of the shuffling of the samples.
    pub seed: u64,
}

impl Default for CloneConfig {
    fn default() -> Self {
        Self {
            batch_size: 16,
            l2_reg: 0.0,
            optimizer: OptimizerConfig::adam(1e-3),
            val_interval: 4,
            max_iters: None,
            seed: 42,
        }
    }
}

impl CloneConfig {
    /// Sets the mini-batch size.
    pub fn batch_size(mut self, v: usize) -> Self {
        self.batch_size = v;
        self
    }

    /// Sets the L2 coefficient.
    pub fn l2_reg(mut self, v: f32) -> Self {
        self.l2_reg = v;
        self
    }

    /// Sets the optimizer.
    pub fn optimizer(mut self, v: OptimizerConfig) -> Self {
        self.optimizer = v;
        self
    }

    /// Sets the maximum number of iterations.
    pub fn max_iters(mut self, v: Option<usize>) -> Self {
        self.max_iters = v;
        self
    }

    /// Loads [`CloneConfig`] from YAML.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path_ = path.as_ref().to_owned();
        let rdr = BufReader::new(File::open(path)?);
        let b = serde_yaml::from_reader(rdr)?;
        info!("Load config of behavior cloning from {:?}", path_);
        Ok(b)
    }

    /// Saves [`CloneConfig`] as YAML.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path_ = path.as_ref().to_owned();
        let mut file = File::create(path)?;
        file.write_all(serde_yaml::to_string(&self)?.as_bytes())?;
        info!("Save config of behavior cloning into {:?}", path_);
        Ok(())
    }
}
