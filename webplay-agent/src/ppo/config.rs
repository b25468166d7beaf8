//! Configuration of PPO.
use crate::opt::OptimizerConfig;
use anyhow::Result;
use log::info;
use serde::{Deserialize, Serialize};
use std::{
    fs::File,
    io::{BufReader, Write},
    path::Path,
};

/// Constructs [`Ppo`](super::Ppo).
#[derive(Debug, Deserialize, Serialize, PartialEq, Clone)]
pub struct PpoConfig {
    /// GAE decay.
    pub lambda: f32,

    /// Clipping range of the likelihood ratio.
    pub epsilon: f32,

    /// Coefficient of the regularizer.
    pub reg_coeff: f32,

    /// Penalizes the KL divergence from the zero-parameter distribution
    /// instead of rewarding entropy.
    pub kl_reg: bool,

    /// Weight of the value regression loss.
    pub critic_weight: f32,

    /// Full-batch steps per batch.
    pub epochs: usize,

    /// Minimum number of environment steps per batch.
    pub batch_steps: usize,

    /// Optimizer of the whole agent.
    pub optimizer: OptimizerConfig,
}

impl Default for PpoConfig {
    fn default() -> Self {
        Self {
            lambda: 0.95,
            epsilon: 0.1,
            reg_coeff: 0.01,
            kl_reg: false,
            critic_weight: 1.0,
            epochs: 10,
            batch_steps: 2048,
            optimizer: OptimizerConfig::adam(3e-4),
        }
    }
}

impl PpoConfig {
    /// Sets the GAE decay.
    pub fn lambda(mut self, v: f32) -> Self {
        self.lambda = v;
        self
    }

    /// Sets the clipping range.
    pub fn epsilon(mut self, v: f32) -> Self {
        self.epsilon = v;
        self
    }

    /// Sets the regularization coefficient.
    pub fn reg_coeff(mut self, v: f32) -> Self {
        self.reg_coeff = v;
        self
    }

    /// Selects the KL regularizer.
    pub fn kl_reg(mut self, v: bool) -> Self {
        self.kl_reg = v;
        self
    }

    /// Sets the number of epochs.
    pub fn epochs(mut self, v: usize) -> Self {
        self.epochs = v;
        self
    }

    /// Sets the number of environment steps per batch.
    pub fn batch_steps(mut self, v: usize) -> Self {
        self.batch_steps = v;
        self
    }

    /// Sets the optimizer.
    pub fn optimizer(mut self, v: OptimizerConfig) -> Self {
        self.optimizer = v;
        self
    }

    /// Loads [`PpoConfig`] from YAML.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path_ = path.as_ref().to_owned();
        let rdr = BufReader::new(File::open(path)?);
        let b = serde_yaml::from_reader(rdr)?;
        info!("Load config of PPO from {:?}", path_);
        Ok(b)
    }

    /// Saves [`PpoConfig`] as YAML.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path_ = path.as_ref().to_owned();
        let mut file = File::create(path)?;
        file.write_all(serde_yaml::to_string(&self)?.as_bytes())?;
        info!("Save config of PPO into {:?}", path_);
        Ok(())
    }
}
