//! PPO update.
use super::PpoConfig;
use crate::{
    agent::Agent,
    opt::Optimizer,
    util::{axpy, gae, mean_std},
};
use anyhow::Result;
use log::info;
use webplay_core::{
    error::WebplayError,
    record::{Record, RecordValue},
    rollout::RolloutSet,
    DiffFn,
};

/// `min(ratio * advantage, clip(ratio, 1 - epsilon, 1 + epsilon) * advantage)`
pub fn clipped_surrogate(ratio: f32, advantage: f32, epsilon: f32) -> f32 {
    let clipped = ratio.clamp(1.0 - epsilon, 1.0 + epsilon);
    (ratio * advantage).min(clipped * advantage)
}

/// Proximal policy optimization of an [`Agent`].
///
/// Each batch is used for a fixed number of full-batch optimizer steps on
/// the clipped surrogate, the value regression loss and a regularizer.
pub struct Ppo {
    config: PpoConfig,
    discount: f32,
    opt: Optimizer,
}

impl Ppo {
    /// Constructs PPO for an agent with `num_params` parameters.
    pub fn build(config: PpoConfig, discount: f32, num_params: usize) -> Self {
        let opt = config.optimizer.build(num_params);
        Self {
            config,
            discount,
            opt,
        }
    }

    /// Minimum number of environment steps per batch.
    pub fn batch_steps(&self) -> usize {
        self.config.batch_steps
    }

    /// Trains `agent` on a batch of trajectories.
    pub fn update(&mut self, agent: &mut Agent, batch: &RolloutSet) -> Result<Record> {
        let n_steps = batch.total_steps();
        if n_steps == 0 {
            return Err(WebplayError::EmptyBatch.into());
        }
        let n = n_steps as f32;
        let trajs = batch.iter().collect::<Vec<_>>();
        let space = agent.space.clone();
        let cfg = &self.config;

        // Advantages and value targets are fixed for the whole batch.
        let mut advs = Vec::with_capacity(trajs.len());
        let mut targets = Vec::with_capacity(trajs.len());
        for traj in &trajs {
            let values = traj
                .obs
                .frames()?
                .map(|obs| obs.map(|obs| agent.value(&obs)))
                .collect::<Result<Vec<_>>>()?;
            let adv = gae(&traj.rewards, &values, self.discount, cfg.lambda);
            targets.push(adv.iter().zip(&values).map(|(a, v)| a + v).collect::<Vec<_>>());
            advs.push(adv);
        }

        let zero = vec![0.0; space.param_len()];
        let mut record = Record::empty();
        for epoch in 0..cfg.epochs {
            let mut grad = vec![0.0; agent.num_params()];
            let (mut actor, mut critic, mut reg) = (0.0, 0.0, 0.0);
            for ((traj, adv), target) in trajs.iter().zip(&advs).zip(&targets) {
                for (t, obs) in traj.obs.frames()?.enumerate() {
                    let obs = obs?;
                    let (out, value) = agent.evaluate(&obs);
                    let action = &traj.actions[t];
                    let ratio = (space.log_prob(&out, action)
                        - space.log_prob(&traj.params[t], action))
                    .exp();
                    let a = adv[t];
                    let surrogate = clipped_surrogate(ratio, a, cfg.epsilon);
                    actor += surrogate / n;

                    // Gradient of the loss with respect to the actor output.
                    let mut out_grad = vec![0.0; out.len()];
                    if ratio * a <= surrogate {
                        axpy(-a * ratio / n, &space.log_prob_grad(&out, action), &mut out_grad);
                    }
                    if cfg.kl_reg {
                        reg += space.kl(&zero, &out) / n;
                        axpy(cfg.reg_coeff / n, &space.kl_grad(&zero, &out), &mut out_grad);
                    } else {
                        reg += space.entropy(&out) / n;
                        axpy(-cfg.reg_coeff / n, &space.entropy_grad(&out), &mut out_grad);
                    }

                    let err = value - target[t];
                    critic += err * err / n;
                    let value_grad = cfg.critic_weight * 2.0 * err / n;
                    agent.backward_both(&obs, &out_grad, value_grad, &mut grad);
                }
            }
            info!(
                "iteration {}: actor={} critic={} reg={}",
                epoch, actor, critic, reg
            );
            record = Record::from_slice(&[
                ("actor", RecordValue::Scalar(actor)),
                ("critic", RecordValue::Scalar(critic)),
                ("reg", RecordValue::Scalar(reg)),
            ]);

            let mut params = agent.params();
            self.opt.step(&mut params, &grad)?;
            agent.set_params(&params)?;
        }

        let all_advs = advs.concat();
        record.insert("mean_advantage", RecordValue::Scalar(mean_std(&all_advs).0));
        Ok(record)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{agent::AgentConfig, opt::OptimizerConfig};
    use rand::{rngs::SmallRng, SeedableRng};
    use test_log::test;
    use webplay_core::{rollout::Trajectory, ActionSpace};

    #[test]
    fn test_clipped_surrogate() {
        assert!((clipped_surrogate(2.0, 1.0, 0.1) - 1.1).abs() < 1e-6);
        assert!((clipped_surrogate(1.05, 1.0, 0.1) - 1.05).abs() < 1e-6);
        // Negative advantages are bounded from above by the clipped value.
        assert!((clipped_surrogate(0.5, -1.0, 0.1) - -0.9).abs() < 1e-6);
        assert!((clipped_surrogate(2.0, -1.0, 0.1) - -2.0).abs() < 1e-6);
    }

    fn agent() -> Agent {
        let space = ActionSpace::Bernoulli { dim: 1 };
        let config = AgentConfig::default().units(vec![8]);
        let mut rng = SmallRng::seed_from_u64(11);
        let policy = config.new_policy(2, &space, &mut rng).unwrap();
        let critic = config.new_critic(&mut rng).unwrap();
        Agent::from_parts(&policy, critic, space).unwrap()
    }

    /// Pressing earns a reward of one.
    fn batch(agent: &Agent) -> RolloutSet {
        let mut rng = SmallRng::seed_from_u64(2);
        let trajs = (0..16)
            .map(|i| {
                let mut traj = Trajectory::new(2);
                for t in 0..6 {
                    let obs = [30.0 * t as f32, 10.0 * (i % 4) as f32 + 100.0];
                    let params = agent.forward(&obs);
                    let action = agent.space.sample(&params, &mut rng);
                    let reward = action[0];
                    traj.push(&obs, params, action, reward).unwrap();
                }
                traj.finish().unwrap();
                traj
            })
            .collect();
        RolloutSet::new(trajs)
    }

    fn press_prob(agent: &Agent) -> f32 {
        let logit = agent.forward(&[60.0, 110.0])[0];
        1.0 / (1.0 + (-logit).exp())
    }

    #[test]
    fn test_update_improves_policy_and_critic() -> Result<()> {
        let mut agent = agent();
        let batch = batch(&agent);
        let before = press_prob(&agent);

        let config = PpoConfig::default()
            .epochs(5)
            .optimizer(OptimizerConfig::adam(1e-2));
        let mut ppo = Ppo::build(config, 0.0, agent.num_params());
        let first = ppo.update(&mut agent, &batch)?;
        let second = ppo.update(&mut agent, &batch)?;

        assert!(press_prob(&agent) > before);
        assert!(second.get_scalar("critic")? < first.get_scalar("critic")?);
        Ok(())
    }

    #[test]
    fn test_kl_regularizer_starts_at_zero() -> Result<()> {
        let mut agent = agent();
        let batch = batch(&agent);
        let config = PpoConfig::default().kl_reg(true).epochs(1);
        let mut ppo = Ppo::build(config, 0.9, agent.num_params());
        let record = ppo.update(&mut agent, &batch)?;
        // A fresh policy outputs the zero parameters.
        assert!(record.get_scalar("reg")?.abs() < 1e-6);
        Ok(())
    }

    #[test]
    fn test_empty_batch() {
        let mut agent = agent();
        let mut ppo = Ppo::build(PpoConfig::default(), 0.9, agent.num_params());
        assert!(ppo.update(&mut agent, &RolloutSet::new(vec![])).is_err());
    }
}
