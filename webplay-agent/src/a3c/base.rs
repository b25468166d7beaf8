//! A3C segments and gradients.
use super::A3cConfig;
use crate::{agent::Agent, util::discounted_returns_from};
use anyhow::Result;
use rand::Rng;
use webplay_core::{env::Env, error::WebplayError, DiffFn};

/// A few consecutive steps of one episode.
#[derive(Debug, Clone, Default)]
pub struct Segment {
    /// Observations.
    pub obs: Vec<Vec<f32>>,
    /// Distribution parameters output by the actor.
    pub params: Vec<Vec<f32>>,
    /// Sampled actions.
    pub actions: Vec<Vec<f32>>,
    /// Rewards.
    pub rewards: Vec<f32>,
    /// Observation following the last step, absent when the episode ended.
    pub next_obs: Option<Vec<f32>>,
}

impl Segment {
    /// Number of steps.
    pub fn len(&self) -> usize {
        self.rewards.len()
    }

    /// Returns `true` if the segment has no step.
    pub fn is_empty(&self) -> bool {
        self.rewards.is_empty()
    }

    /// Returns `true` if the episode ended with this segment.
    pub fn is_terminal(&self) -> bool {
        self.next_obs.is_none()
    }
}

/// Statistics of one gradient computation.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct A3cTerms {
    /// Mean advantage.
    pub advantage: f32,
    /// Mean squared error of the critic.
    pub critic: f32,
    /// Mean entropy of the action distributions.
    pub entropy: f32,
}

/// Asynchronous advantage actor-critic, the part each worker runs locally.
pub struct A3c {
    config: A3cConfig,
    discount: f32,
}

impl A3c {
    /// Constructs A3C with the given discount factor.
    pub fn build(config: A3cConfig, discount: f32) -> Self {
        Self { config, discount }
    }

    /// Configuration.
    pub fn config(&self) -> &A3cConfig {
        &self.config
    }

    /// Runs `env` for at most `interval` steps with actions sampled from
    /// `agent`.
    ///
    /// `obs` carries the observation between segments; it is `None` when a
    /// new episode must start and is reset to `None` when the episode ends.
    pub fn run_segment<R: Rng + ?Sized>(
        &self,
        agent: &Agent,
        env: &mut dyn Env,
        obs: &mut Option<Vec<f32>>,
        rng: &mut R,
    ) -> Result<Segment> {
        let mut current = match obs.take() {
            Some(o) => o,
            None => env.reset()?,
        };
        let mut segment = Segment::default();
        for _ in 0..self.config.interval.max(1) {
            let params = agent.forward(&current);
            let action = agent.space.sample(&params, rng);
            let step = env.step(&action)?;
            segment.obs.push(current);
            segment.params.push(params);
            segment.actions.push(action);
            segment.rewards.push(step.reward);
            if step.done {
                return Ok(segment);
            }
            current = step.obs;
        }
        segment.next_obs = Some(current.clone());
        *obs = Some(current);
        Ok(segment)
    }

    /// Gradient of the A3C loss on `segment` with respect to the agent's
    /// parameters.
    ///
    /// The loss is the negated advantage-weighted log-likelihood, minus the
    /// entropy bonus, plus half the squared error of the critic against the
    /// bootstrapped n-step returns, averaged over the segment.
    pub fn gradient(&self, agent: &Agent, segment: &Segment) -> Result<(Vec<f32>, A3cTerms)> {
        if segment.is_empty() {
            return Err(WebplayError::EmptyBatch.into());
        }
        let n = segment.len() as f32;
        let bootstrap = segment
            .next_obs
            .as_ref()
            .map(|o| agent.value(o))
            .unwrap_or(0.0);
        let returns = discounted_returns_from(&segment.rewards, self.discount, bootstrap);

        let space = &agent.space;
        let mut grad = vec![0.0; agent.num_params()];
        let mut terms = A3cTerms::default();
        for (t, obs) in segment.obs.iter().enumerate() {
            let (out, value) = agent.evaluate(obs);
            let adv = returns[t] - value;
            let log_grad = space.log_prob_grad(&out, &segment.actions[t]);
            let ent_grad = space.entropy_grad(&out);
            let out_grad = log_grad
                .iter()
                .zip(&ent_grad)
                .map(|(l, e)| (-adv * l - self.config.reg_coeff * e) / n)
                .collect::<Vec<_>>();
            agent.backward_both(obs, &out_grad, -adv / n, &mut grad);

            terms.advantage += adv / n;
            terms.critic += adv * adv / n;
            terms.entropy += space.entropy(&out) / n;
        }
        Ok((grad, terms))
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{agent::AgentConfig, opt::OptimizerConfig};
    use rand::{rngs::SmallRng, SeedableRng};
    use test_log::test;
    use webplay_core::{
        dummy::{DummyCatalog, DummyConfig, DummyFactory},
        env::EnvRegistry,
        ActionSpace,
    };

    fn agent(obs_len: usize, space: ActionSpace) -> Agent {
        let config = AgentConfig::default().units(vec![8]);
        let mut rng = SmallRng::seed_from_u64(4);
        let policy = config.new_policy(obs_len, &space, &mut rng).unwrap();
        let critic = config.new_critic(&mut rng).unwrap();
        Agent::from_parts(&policy, critic, space).unwrap()
    }

    #[test]
    fn test_segments_follow_episodes() -> Result<()> {
        let registry = EnvRegistry::standard(&DummyCatalog::new(32, 32));
        let spec = registry.get("Knightower-v0")?;
        let factory = DummyFactory::new(DummyConfig::default().episode_len(7));
        let mut env = spec.make_env(&factory, 600)?;
        let agent = agent(env.obs_len(), env.action_space());
        let a3c = A3c::build(A3cConfig::default().interval(3), 0.9);

        let mut rng = SmallRng::seed_from_u64(0);
        let mut obs = None;
        let lens = (0..4)
            .map(|_| {
                let s = a3c.run_segment(&agent, &mut env, &mut obs, &mut rng).unwrap();
                (s.len(), s.is_terminal())
            })
            .collect::<Vec<_>>();
        assert_eq!(lens, vec![(3, false), (3, false), (1, true), (3, false)]);
        env.close()
    }

    #[test]
    fn test_gradient_fits_critic() -> Result<()> {
        let space = ActionSpace::Bernoulli { dim: 1 };
        let mut agent = agent(2, space);
        let segment = Segment {
            obs: vec![vec![100.0, 20.0], vec![50.0, 70.0]],
            params: vec![vec![0.0], vec![0.0]],
            actions: vec![vec![1.0], vec![0.0]],
            rewards: vec![1.0, 1.0],
            next_obs: None,
        };
        let a3c = A3c::build(A3cConfig::default(), 0.5);
        let mut opt = OptimizerConfig::adam(1e-2).build(agent.num_params());
        let (_, first) = a3c.gradient(&agent, &segment)?;
        for _ in 0..50 {
            let (grad, _) = a3c.gradient(&agent, &segment)?;
            let mut params = agent.params();
            opt.step(&mut params, &grad)?;
            agent.set_params(&params)?;
        }
        let (_, last) = a3c.gradient(&agent, &segment)?;
        assert!(last.critic < first.critic);
        assert!(a3c.gradient(&agent, &Segment::default()).is_err());
        Ok(())
    }
}
