//! Configuration of TRPO.
use anyhow::Result;
use log::info;
use serde::{Deserialize, Serialize};
use std::{
    fs::File,
    io::{BufReader, Write},
    path::Path,
};

/// Constructs [`Trpo`](super::Trpo).
#[derive(Debug, Deserialize, Serialize, PartialEq, Clone)]
pub struct TrpoConfig {
    /// Largest mean KL divergence between the policies before and after an
    /// update.
    pub max_kl: f32,

    /// Fraction of the trajectories used to estimate the Fisher matrix.
    pub fisher_frac: f32,

    /// Iterations of the conjugate gradient solver.
    pub cg_iters: usize,

    /// Multiple of the identity added to the Fisher matrix.
    pub cg_damping: f32,

    /// Number of step sizes tried by the line search.
    pub max_backtracks: usize,

    /// Step shrink factor of the line search.
    pub backtrack_ratio: f32,

    /// Normalizes the returns of a batch before using them as advantages.
    pub normalize_advantages: bool,

    /// Seed of the Fisher subsampling.
    pub seed: u64,
}

impl Default for TrpoConfig {
    fn default() -> Self {
        Self {
            max_kl: 0.01,
            fisher_frac: 0.1,
            cg_iters: 10,
            cg_damping: 1e-3,
            max_backtracks: 10,
            backtrack_ratio: 0.5,
            normalize_advantages: true,
            seed: 42,
        }
    }
}

impl TrpoConfig {
    /// Sets the KL bound.
    pub fn max_kl(mut self, v: f32) -> Self {
        self.max_kl = v;
        self
    }

    /// Sets the fraction of trajectories used for the Fisher matrix.
    pub fn fisher_frac(mut self, v: f32) -> Self {
        self.fisher_frac = v;
        self
    }

    /// Sets the number of step sizes of the line search.
    pub fn max_backtracks(mut self, v: usize) -> Self {
        self.max_backtracks = v;
        self
    }

    /// Sets the seed.
    pub fn seed(mut self, v: u64) -> Self {
        self.seed = v;
        self
    }

    /// Loads [`TrpoConfig`] from YAML.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path_ = path.as_ref().to_owned();
        let rdr = BufReader::new(File::open(path)?);
        let b = serde_yaml::from_reader(rdr)?;
        info!("Load config of TRPO from {:?}", path_);
        Ok(b)
    }

    /// Saves [`TrpoConfig`] as YAML.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path_ = path.as_ref().to_owned();
        let mut file = File::create(path)?;
        file.write_all(serde_yaml::to_string(&self)?.as_bytes())?;
        info!("Save config of TRPO into {:?}", path_);
        Ok(())
    }
}
