use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::{
    fs::File,
    io::{BufReader, Write},
    path::Path,
};

/// Configuration of [`RolloutCollector`](super::RolloutCollector).
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct CollectorConfig {
    /// Number of worker threads, each driving one environment.
    pub n_workers: usize,

    /// Hard cap on the length of an episode.
    pub max_steps: usize,

    /// In episode-count mode, the running mean reward is logged this many
    /// times per batch.
    pub log_chunks: usize,

    /// Seed of the action sampling. Worker `i` uses `seed + i`.
    pub seed: u64,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            n_workers: 8,
            max_steps: 600,
            log_chunks: 32,
            seed: 42,
        }
    }
}

impl CollectorConfig {
    /// Sets the number of workers.
    pub fn n_workers(mut self, v: usize) -> Self {
        self.n_workers = v;
        self
    }

    /// Sets the episode length cap.
    pub fn max_steps(mut self, v: usize) -> Self {
        self.max_steps = v;
        self
    }

    /// Sets the number of log lines per batch.
    pub fn log_chunks(mut self, v: usize) -> Self {
        self.log_chunks = v;
        self
    }

    /// Sets the seed.
    pub fn seed(mut self, v: u64) -> Self {
        self.seed = v;
        self
    }

    /// Constructs [`CollectorConfig`] from YAML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path)?;
        let rdr = BufReader::new(file);
        let b = serde_yaml::from_reader(rdr)?;
        Ok(b)
    }

    /// Saves [`CollectorConfig`].
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let mut file = File::create(path)?;
        file.write_all(serde_yaml::to_string(&self)?.as_bytes())?;
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use tempdir::TempDir;

    #[test]
    fn test_serde_collector_config() -> Result<()> {
        let config = CollectorConfig::default().n_workers(3).seed(7);
        let dir = TempDir::new("collector_config")?;
        let path = dir.path().join("collector_config.yaml");
        config.save(&path)?;
        assert_eq!(CollectorConfig::load(&path)?, config);
        Ok(())
    }
}
