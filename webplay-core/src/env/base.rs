//! Environment.
use crate::space::ActionSpace;
use anyhow::Result;

/// Outcome of [`Env::step`].
#[derive(Debug, Clone, PartialEq)]
pub struct Step {
    /// Observation after the step.
    pub obs: Vec<f32>,
    /// Reward of the step.
    pub reward: f32,
    /// Whether the episode terminated.
    pub done: bool,
}

/// Represents an environment, typically an MDP.
pub trait Env: Send {
    /// Length of the observation vectors.
    fn obs_len(&self) -> usize;

    /// Distribution over the actions accepted by [`Env::step`].
    fn action_space(&self) -> ActionSpace;

    /// Starts a new episode and returns its first observation.
    fn reset(&mut self) -> Result<Vec<f32>>;

    /// Performs an environment step.
    fn step(&mut self, action: &[f32]) -> Result<Step>;

    /// Releases the underlying resources. Further calls are no-ops.
    fn close(&mut self) -> Result<()>;
}
