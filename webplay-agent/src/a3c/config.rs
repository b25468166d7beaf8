//! Configuration of A3C.
use crate::opt::OptimizerConfig;
use anyhow::Result;
use log::info;
use serde::{Deserialize, Serialize};
use std::{
    fs::File,
    io::{BufReader, Write},
    path::Path,
    time::Duration,
};

/// Constructs [`A3c`](super::A3c) and its training loop.
#[derive(Debug, Deserialize, Serialize, PartialEq, Clone)]
pub struct A3cConfig {
    /// Coefficient of the entropy bonus.
    pub reg_coeff: f32,

    /// Maximum number of steps of a segment.
    pub interval: usize,

    /// Optimizer of the shared parameters.
    pub optimizer: OptimizerConfig,

    /// Time between two checkpoints.
    pub save_interval: Duration,

    /// Minimum time between two log lines of update statistics.
    pub update_log_interval: Duration,

    /// Minimum time between two log lines of the regularizer.
    pub reg_log_interval: Duration,
}

impl Default for A3cConfig {
    fn default() -> Self {
        Self {
            reg_coeff: 0.01,
            interval: 20,
            optimizer: OptimizerConfig::rms_prop(1e-5, 0.99),
            save_interval: Duration::from_secs(5 * 60),
            update_log_interval: Duration::from_secs(60),
            reg_log_interval: Duration::from_secs(120),
        }
    }
}

impl A3cConfig {
    /// Sets the entropy coefficient.
    pub fn reg_coeff(mut self, v: f32) -> Self {
        self.reg_coeff = v;
        self
    }

    /// Sets the segment length.
    pub fn interval(mut self, v: usize) -> Self {
        self.interval = v;
        self
    }

    /// Sets the optimizer.
    pub fn optimizer(mut self, v: OptimizerConfig) -> Self {
        self.optimizer = v;
        self
    }

    /// Sets the checkpoint interval.
    pub fn save_interval(mut self, v: Duration) -> Self {
        self.save_interval = v;
        self
    }

    /// Sets both log intervals.
    pub fn log_intervals(mut self, update: Duration, reg: Duration) -> Self {
        self.update_log_interval = update;
        self.reg_log_interval = reg;
        self
    }

    /// Loads [`A3cConfig`] from YAML.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path_ = path.as_ref().to_owned();
        let rdr = BufReader::new(File::open(path)?);
        let b = serde_yaml::from_reader(rdr)?;
        info!("Load config of A3C from {:?}", path_);
        Ok(b)
    }

    /// Saves [`A3cConfig`] as YAML.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path_ = path.as_ref().to_owned();
        let mut file = File::create(path)?;
        file.write_all(serde_yaml::to_string(&self)?.as_bytes())?;
        info!("Save config of A3C into {:?}", path_);
        Ok(())
    }
}
