//! Trajectories and batches of trajectories.
mod tape;
use crate::{env::Env, error::WebplayError, model::DiffFn};
use anyhow::Result;
use rand::Rng;
pub use tape::{ObsTape, TapeReader};

/// One episode: observations, action-distribution parameters, sampled actions
/// and rewards, in causal order.
///
/// Observations are kept on a compressed [`ObsTape`].
#[derive(Debug)]
pub struct Trajectory {
    /// Observations fed to the policy.
    pub obs: ObsTape,
    /// Parameters output by the policy at each step.
    pub params: Vec<Vec<f32>>,
    /// Actions sampled at each step.
    pub actions: Vec<Vec<f32>>,
    /// Rewards of each step.
    pub rewards: Vec<f32>,
}

impl Trajectory {
    /// An empty trajectory for observations of length `obs_len`.
    pub fn new(obs_len: usize) -> Self {
        Self {
            obs: ObsTape::new(obs_len),
            params: vec![],
            actions: vec![],
            rewards: vec![],
        }
    }

    /// Appends a step.
    pub fn push(&mut self, obs: &[f32], params: Vec<f32>, action: Vec<f32>, reward: f32) -> Result<()> {
        self.obs.push(obs)?;
        self.params.push(params);
        self.actions.push(action);
        self.rewards.push(reward);
        Ok(())
    }

    /// Seals the observation tape. No step may be pushed afterwards.
    pub fn finish(&mut self) -> Result<()> {
        self.obs.seal()
    }

    /// Number of steps.
    pub fn len(&self) -> usize {
        self.rewards.len()
    }

    /// Returns `true` if the trajectory has no step.
    pub fn is_empty(&self) -> bool {
        self.rewards.is_empty()
    }

    /// Sum of the rewards.
    pub fn total_reward(&self) -> f32 {
        self.rewards.iter().sum()
    }
}

/// Runs one episode of `env` with actions sampled from `policy`.
pub fn run_episode<R: Rng + ?Sized>(
    env: &mut dyn Env,
    policy: &dyn DiffFn,
    rng: &mut R,
) -> Result<Trajectory> {
    let space = env.action_space();
    if policy.out_len() != space.param_len() {
        return Err(WebplayError::ParamLen {
            expected: space.param_len(),
            actual: policy.out_len(),
        }
        .into());
    }

    let mut traj = Trajectory::new(env.obs_len());
    let mut obs = env.reset()?;
    loop {
        let params = policy.forward(&obs);
        let action = space.sample(&params, rng);
        let step = env.step(&action)?;
        traj.push(&obs, params, action, step.reward)?;
        if step.done {
            break;
        }
        obs = step.obs;
    }
    traj.finish()?;
    Ok(traj)
}

/// An unordered batch of trajectories of possibly different lengths.
///
/// Trajectories are aligned at their first step. At time `t` a trajectory is
/// present iff `t` is below its length, so absence only ever follows the end
/// of an episode.
#[derive(Debug, Default)]
pub struct RolloutSet {
    trajectories: Vec<Trajectory>,
}

impl RolloutSet {
    /// Packs trajectories into a batch.
    pub fn new(trajectories: Vec<Trajectory>) -> Self {
        Self { trajectories }
    }

    /// Number of trajectories.
    pub fn len(&self) -> usize {
        self.trajectories.len()
    }

    /// Returns `true` if the batch has no trajectory.
    pub fn is_empty(&self) -> bool {
        self.trajectories.is_empty()
    }

    /// Iterates over the trajectories.
    pub fn iter(&self) -> std::slice::Iter<Trajectory> {
        self.trajectories.iter()
    }

    /// Total number of steps.
    pub fn total_steps(&self) -> usize {
        self.trajectories.iter().map(|t| t.len()).sum()
    }

    /// Length of the longest trajectory.
    pub fn max_len(&self) -> usize {
        self.trajectories.iter().map(|t| t.len()).max().unwrap_or(0)
    }

    /// Presence mask at time `t`, one entry per trajectory.
    pub fn present(&self, t: usize) -> Vec<bool> {
        self.trajectories.iter().map(|traj| t < traj.len()).collect()
    }

    /// Total reward of each trajectory.
    pub fn total_rewards(&self) -> Vec<f32> {
        self.trajectories.iter().map(|t| t.total_reward()).collect()
    }

    /// Mean total reward.
    pub fn mean_reward(&self) -> f32 {
        mean(&self.total_rewards())
    }

    /// Population variance of the total rewards.
    pub fn reward_variance(&self) -> f32 {
        let rewards = self.total_rewards();
        let m = mean(&rewards);
        mean(&rewards.iter().map(|r| (r - m).powi(2)).collect::<Vec<_>>())
    }
}

impl IntoIterator for RolloutSet {
    type Item = Trajectory;
    type IntoIter = std::vec::IntoIter<Trajectory>;

    fn into_iter(self) -> Self::IntoIter {
        self.trajectories.into_iter()
    }
}

fn mean(xs: &[f32]) -> f32 {
    if xs.is_empty() {
        0.0
    } else {
        xs.iter().sum::<f32>() / xs.len() as f32
    }
}
