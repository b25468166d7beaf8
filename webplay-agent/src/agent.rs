//! Actor-critic agent sharing a trunk between its policy and value heads.
use crate::mlp::{Mlp, MlpConfig};
use anyhow::Result;
use rand::Rng;
use serde::{Deserialize, Serialize};
use webplay_core::{error::WebplayError, ActionSpace, DiffFn};

/// Shape of freshly created policies and critics.
#[derive(Debug, Deserialize, Serialize, PartialEq, Clone)]
pub struct AgentConfig {
    /// Hidden units of the policy network.
    pub units: Vec<usize>,

    /// Scale applied to pixel intensities.
    pub input_scale: f32,

    /// Centers the first-layer weights so solid colors are ignored.
    pub center_inputs: bool,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            units: vec![256, 256],
            input_scale: 0.01,
            center_inputs: true,
        }
    }
}

impl AgentConfig {
    /// Sets the hidden units.
    pub fn units(mut self, v: Vec<usize>) -> Self {
        self.units = v;
        self
    }

    /// Network configuration of a policy for the given observation length and
    /// action space.
    ///
    /// The output layer starts at zero, so a fresh policy outputs the
    /// all-zero distribution parameters.
    pub fn policy_config(&self, obs_len: usize, space: &ActionSpace) -> MlpConfig {
        MlpConfig::new(obs_len, self.units.clone(), space.param_len())
            .input_scale(self.input_scale)
            .center_inputs(self.center_inputs)
            .zero_init_last(true)
    }

    /// Creates a policy.
    pub fn new_policy<R: Rng + ?Sized>(
        &self,
        obs_len: usize,
        space: &ActionSpace,
        rng: &mut R,
    ) -> Result<Mlp> {
        if self.units.is_empty() {
            return Err(WebplayError::InvalidConfig("policy needs a hidden layer".into()).into());
        }
        self.policy_config(obs_len, space).build(rng)
    }

    /// Creates a linear critic over the last hidden layer of the policy.
    pub fn new_critic<R: Rng + ?Sized>(&self, rng: &mut R) -> Result<Mlp> {
        let features = self.units.last().copied().unwrap_or(0);
        MlpConfig::new(features, vec![], 1)
            .zero_init_last(true)
            .build(rng)
    }
}

/// A policy split into a shared trunk and an actor head, plus a critic head
/// over the same trunk features.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct Agent {
    /// Shared trunk.
    pub base: Mlp,

    /// Maps trunk features to action distribution parameters.
    pub actor: Mlp,

    /// Maps trunk features to a value estimate.
    pub critic: Mlp,

    /// Action space of the actor head.
    pub space: ActionSpace,
}

impl Agent {
    /// Splits `policy` into trunk and actor head and attaches `critic`.
    pub fn from_parts(policy: &Mlp, critic: Mlp, space: ActionSpace) -> Result<Self> {
        if policy.out_len() != space.param_len() {
            return Err(WebplayError::ParamLen {
                expected: space.param_len(),
                actual: policy.out_len(),
            }
            .into());
        }
        let (base, actor) = policy.split_last()?;
        if critic.in_len() != base.out_len() || critic.out_len() != 1 {
            return Err(WebplayError::LayerMismatch {
                expected: vec![base.out_len(), 1],
                actual: vec![critic.in_len(), critic.out_len()],
            }
            .into());
        }
        Ok(Self {
            base,
            actor,
            critic,
            space,
        })
    }

    /// Rejoins the policy and returns it along with the critic.
    pub fn decompose(&self) -> Result<(Mlp, Mlp)> {
        Ok((Mlp::join(&self.base, &self.actor)?, self.critic.clone()))
    }

    fn lens(&self) -> (usize, usize, usize) {
        (
            self.base.num_params(),
            self.actor.num_params(),
            self.critic.num_params(),
        )
    }

    /// Trunk features of an observation.
    pub fn features(&self, obs: &[f32]) -> Vec<f32> {
        self.base.forward(obs)
    }

    /// Value estimate of an observation.
    pub fn value(&self, obs: &[f32]) -> f32 {
        self.critic.forward(&self.features(obs))[0]
    }

    /// Action distribution parameters and value estimate of an observation.
    pub fn evaluate(&self, obs: &[f32]) -> (Vec<f32>, f32) {
        let features = self.features(obs);
        (self.actor.forward(&features), self.critic.forward(&features)[0])
    }

    /// Back-propagates gradients of both heads at once into `grad`, laid out
    /// like [`DiffFn::params`].
    pub fn backward_both(&self, obs: &[f32], param_grad: &[f32], value_grad: f32, grad: &mut [f32]) {
        let (n_base, n_actor, _) = self.lens();
        let features = self.features(obs);
        let (g_base, rest) = grad.split_at_mut(n_base);
        let (g_actor, g_critic) = rest.split_at_mut(n_actor);

        let mut feature_grad = self.actor.backward(&features, param_grad, g_actor);
        if value_grad != 0.0 {
            let from_critic = self.critic.backward(&features, &[value_grad], g_critic);
            feature_grad
                .iter_mut()
                .zip(&from_critic)
                .for_each(|(a, b)| *a += b);
        }
        self.base.backward(obs, &feature_grad, g_base);
    }
}

/// The agent seen as its policy; critic parameters receive no gradient.
impl DiffFn for Agent {
    fn in_len(&self) -> usize {
        self.base.in_len()
    }

    fn out_len(&self) -> usize {
        self.actor.out_len()
    }

    fn num_params(&self) -> usize {
        let (a, b, c) = self.lens();
        a + b + c
    }

    fn params(&self) -> Vec<f32> {
        let mut params = self.base.params();
        params.extend(self.actor.params());
        params.extend(self.critic.params());
        params
    }

    fn set_params(&mut self, params: &[f32]) -> Result<()> {
        if params.len() != self.num_params() {
            return Err(WebplayError::ParamLen {
                expected: self.num_params(),
                actual: params.len(),
            }
            .into());
        }
        let (n_base, n_actor, _) = self.lens();
        self.base.set_params(&params[..n_base])?;
        self.actor.set_params(&params[n_base..n_base + n_actor])?;
        self.critic.set_params(&params[n_base + n_actor..])
    }

    fn forward(&self, input: &[f32]) -> Vec<f32> {
        self.actor.forward(&self.features(input))
    }

    fn backward(&self, input: &[f32], out_grad: &[f32], grad: &mut [f32]) -> Vec<f32> {
        let (n_base, n_actor, _) = self.lens();
        let features = self.features(input);
        let (g_base, rest) = grad.split_at_mut(n_base);
        let feature_grad = self.actor.backward(&features, out_grad, &mut rest[..n_actor]);
        self.base.backward(input, &feature_grad, g_base)
    }

    fn jvp(&self, input: &[f32], tangent: &[f32]) -> Vec<f32> {
        let (n_base, n_actor, _) = self.lens();
        let features = self.features(input);
        let d_features = self.base.jvp(input, &tangent[..n_base]);
        self.actor
            .jvp_with_input(&features, &d_features, &tangent[n_base..n_base + n_actor])
    }
}
