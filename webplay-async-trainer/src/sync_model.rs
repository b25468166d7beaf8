use anyhow::Result;
use webplay_agent::{Agent, Mlp};
use webplay_core::DiffFn;

/// Synchronizes a local copy of a model with a shared one in asynchronous
/// training.
pub trait SyncModel {
    /// Information needed to bring another copy up to date.
    type ModelInfo: Clone;

    /// Gets `ModelInfo`.
    fn model_info(&self) -> Self::ModelInfo;

    /// Overwrites the model with `model_info`.
    fn sync_model(&mut self, model_info: &Self::ModelInfo) -> Result<()>;
}

impl SyncModel for Agent {
    type ModelInfo = Vec<f32>;

    fn model_info(&self) -> Vec<f32> {
        self.params()
    }

    fn sync_model(&mut self, model_info: &Vec<f32>) -> Result<()> {
        self.set_params(model_info)
    }
}

impl SyncModel for Mlp {
    type ModelInfo = Vec<f32>;

    fn model_info(&self) -> Vec<f32> {
        self.params()
    }

    fn sync_model(&mut self, model_info: &Vec<f32>) -> Result<()> {
        self.set_params(model_info)
    }
}
