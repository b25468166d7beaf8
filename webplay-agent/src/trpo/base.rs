//! TRPO update.
use super::TrpoConfig;
use crate::{
    cg::{conjugate_gradient, line_search, LineSearch},
    util::{axpy, discounted_returns, dot, normalize, scale},
};
use anyhow::Result;
use log::debug;
use rand::{rngs::SmallRng, seq::index, SeedableRng};
use webplay_core::{
    error::WebplayError,
    record::{Record, RecordValue},
    rollout::{RolloutSet, Trajectory},
    ActionSpace, DiffFn,
};

/// Trust region policy optimization.
///
/// Advantages are the discounted returns of each step. The natural gradient
/// direction is found by conjugate gradient over Fisher-vector products
/// estimated on a random subset of the trajectories; the step is then scaled
/// to the trust region and shrunk by a backtracking line search.
pub struct Trpo {
    config: TrpoConfig,
    space: ActionSpace,
    discount: f32,
    rng: SmallRng,
}

impl Trpo {
    /// Constructs a TRPO optimizer for policies over `space`.
    pub fn build(config: TrpoConfig, space: ActionSpace, discount: f32) -> Self {
        let rng = SmallRng::seed_from_u64(config.seed);
        Self {
            config,
            space,
            discount,
            rng,
        }
    }

    /// Likelihood ratio of `action` under `params` against the parameters the
    /// action was sampled with.
    fn ratio(&self, params: &[f32], behavior: &[f32], action: &[f32]) -> f32 {
        (self.space.log_prob(params, action) - self.space.log_prob(behavior, action)).exp()
    }

    /// Mean KL divergence from `outs0` and mean surrogate objective of the
    /// current parameters of `policy`.
    fn objective<P: DiffFn>(
        &self,
        policy: &P,
        trajs: &[&Trajectory],
        advs: &[Vec<f32>],
        outs0: &[Vec<Vec<f32>>],
    ) -> Result<(f32, f32)> {
        let (mut kl, mut surr, mut n) = (0.0, 0.0, 0);
        for ((traj, adv), outs) in trajs.iter().zip(advs).zip(outs0) {
            for (t, obs) in traj.obs.frames()?.enumerate() {
                let out = policy.forward(&obs?);
                kl += self.space.kl(&outs[t], &out);
                surr += adv[t] * self.ratio(&out, &traj.params[t], &traj.actions[t]);
                n += 1;
            }
        }
        Ok((kl / n as f32, surr / n as f32))
    }

    /// Updates `policy` on a batch of trajectories.
    ///
    /// A failed line search is not an error: the policy is left untouched
    /// and `step_accepted` is recorded as `0`.
    pub fn update<P: DiffFn>(&mut self, policy: &mut P, batch: &RolloutSet) -> Result<Record> {
        let total_steps = batch.total_steps();
        if total_steps == 0 {
            return Err(WebplayError::EmptyBatch.into());
        }
        self.space.check_params(&vec![0.0; policy.out_len()])?;
        let n = total_steps as f32;
        let trajs = batch.iter().collect::<Vec<_>>();

        let mut advs = trajs
            .iter()
            .map(|t| discounted_returns(&t.rewards, self.discount))
            .collect::<Vec<_>>();
        if self.config.normalize_advantages {
            normalize(&mut advs);
        }

        // Policy gradient, outputs and surrogate value at the current parameters.
        let theta0 = policy.params();
        let mut grad = vec![0.0; theta0.len()];
        let mut outs0 = Vec::with_capacity(trajs.len());
        let (mut surr0, mut entropy) = (0.0, 0.0);
        for (traj, adv) in trajs.iter().zip(&advs) {
            let mut outs = Vec::with_capacity(traj.len());
            for (t, obs) in traj.obs.frames()?.enumerate() {
                let obs = obs?;
                let out = policy.forward(&obs);
                let action = &traj.actions[t];
                let ratio = self.ratio(&out, &traj.params[t], action);
                let mut g = self.space.log_prob_grad(&out, action);
                scale(adv[t] * ratio / n, &mut g);
                policy.backward(&obs, &g, &mut grad);
                surr0 += adv[t] * ratio / n;
                entropy += self.space.entropy(&out) / n;
                outs.push(out);
            }
            outs0.push(outs);
        }

        // Fisher-vector products on a subset of the trajectories.
        let n_fisher = ((trajs.len() as f32 * self.config.fisher_frac).ceil() as usize)
            .clamp(1, trajs.len());
        let mut samples = vec![];
        for i in index::sample(&mut self.rng, trajs.len(), n_fisher) {
            for (t, obs) in trajs[i].obs.frames()?.enumerate() {
                samples.push((obs?, outs0[i][t].clone()));
            }
        }
        debug!("fisher estimate over {} steps", samples.len());

        let damping = self.config.cg_damping;
        let fisher_product = |v: &[f32]| -> Result<Vec<f32>> {
            let mut out = vec![0.0; v.len()];
            for (obs, params) in &samples {
                let jv = policy.jvp(obs, v);
                let fjv = self.space.fisher_product(params, &jv);
                policy.backward(obs, &fjv, &mut out);
            }
            scale(1.0 / samples.len() as f32, &mut out);
            axpy(damping, v, &mut out);
            Ok(out)
        };

        let step_dir = conjugate_gradient(&fisher_product, &grad, self.config.cg_iters, 1e-10)?;
        let shs = dot(&step_dir, &fisher_product(&step_dir)?);
        let mut record = Record::from_slice(&[
            ("entropy", RecordValue::Scalar(entropy)),
            ("grad_norm", RecordValue::Scalar(dot(&grad, &grad).sqrt())),
        ]);
        if !(shs > 0.0 && shs.is_finite()) {
            record.insert("step_accepted", RecordValue::Scalar(0.0));
            return Ok(record);
        }
        let mut full_step = step_dir;
        scale((2.0 * self.config.max_kl / shs).sqrt(), &mut full_step);

        let search = LineSearch {
            max_kl: self.config.max_kl,
            max_backtracks: self.config.max_backtracks,
            backtrack_ratio: self.config.backtrack_ratio,
        };
        let mut params = theta0;
        let mut last = (0.0, 0.0);
        let accepted = line_search(&mut params, &full_step, &search, |candidate| {
            policy.set_params(candidate)?;
            let (kl, surr) = self.objective(&*policy, &trajs, &advs, &outs0)?;
            last = (kl, surr - surr0);
            Ok(last)
        })?;
        policy.set_params(&params)?;

        record.insert("kl", RecordValue::Scalar(last.0));
        record.insert("improvement", RecordValue::Scalar(last.1));
        record.insert(
            "step_accepted",
            RecordValue::Scalar(if accepted { 1.0 } else { 0.0 }),
        );
        Ok(record)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{agent::AgentConfig, mlp::Mlp};
    use rand::Rng;
    use test_log::test;

    fn space() -> ActionSpace {
        ActionSpace::Bernoulli { dim: 1 }
    }

    fn policy() -> Mlp {
        AgentConfig::default()
            .units(vec![4])
            .new_policy(2, &space(), &mut SmallRng::seed_from_u64(0))
            .unwrap()
    }

    /// Pressing earns a reward of one.
    fn batch(policy: &Mlp, n: usize) -> RolloutSet {
        let mut rng = SmallRng::seed_from_u64(5);
        let trajs = (0..n)
            .map(|_| {
                let mut traj = Trajectory::new(2);
                for t in 0..5 {
                    let obs = [40.0 * t as f32, rng.gen_range(0.0..255.0)];
                    let params = policy.forward(&obs);
                    let action = space().sample(&params, &mut rng);
                    let reward = action[0];
                    traj.push(&obs, params, action, reward).unwrap();
                }
                traj.finish().unwrap();
                traj
            })
            .collect();
        RolloutSet::new(trajs)
    }

    fn press_prob(policy: &Mlp) -> f32 {
        let logit = policy.forward(&[80.0, 100.0])[0];
        1.0 / (1.0 + (-logit).exp())
    }

    #[test]
    fn test_update_favors_rewarded_actions() -> Result<()> {
        let mut policy = policy();
        let batch = batch(&policy, 20);
        let before = press_prob(&policy);

        let mut trpo = Trpo::build(TrpoConfig::default(), space(), 0.0);
        let record = trpo.update(&mut policy, &batch)?;
        assert_eq!(record.get_scalar("step_accepted")?, 1.0);
        assert!(record.get_scalar("kl")? <= 0.01);
        assert!(record.get_scalar("improvement")? >= 0.0);
        assert!(press_prob(&policy) > before);
        Ok(())
    }

    #[test]
    fn test_rejected_step_keeps_parameters() -> Result<()> {
        let mut policy = policy();
        let batch = batch(&policy, 10);
        let before = policy.params();

        let config = TrpoConfig::default().max_backtracks(0);
        let mut trpo = Trpo::build(config, space(), 0.0);
        let record = trpo.update(&mut policy, &batch)?;
        assert_eq!(record.get_scalar("step_accepted")?, 0.0);
        let bits = |p: &[f32]| p.iter().map(|x| x.to_bits()).collect::<Vec<_>>();
        assert_eq!(bits(&policy.params()), bits(&before));
        Ok(())
    }

    /// Linear logit that jumps by a fixed amount as soon as its parameters
    /// leave their initial values, so every candidate step breaks the trust
    /// region.
    struct Jumpy {
        w: Vec<f32>,
        origin: Vec<f32>,
        loads: usize,
    }

    impl DiffFn for Jumpy {
        fn in_len(&self) -> usize {
            2
        }

        fn out_len(&self) -> usize {
            1
        }

        fn num_params(&self) -> usize {
            2
        }

        fn params(&self) -> Vec<f32> {
            self.w.clone()
        }

        fn set_params(&mut self, params: &[f32]) -> Result<()> {
            self.w = params.to_vec();
            self.loads += 1;
            Ok(())
        }

        fn forward(&self, input: &[f32]) -> Vec<f32> {
            let jump = if self.w == self.origin { 0.0 } else { 5.0 };
            vec![0.01 * dot(&self.w, input) + jump]
        }

        fn backward(&self, input: &[f32], out_grad: &[f32], grad: &mut [f32]) -> Vec<f32> {
            for (g, x) in grad.iter_mut().zip(input) {
                *g += 0.01 * out_grad[0] * x;
            }
            self.w.iter().map(|w| 0.01 * out_grad[0] * w).collect()
        }

        fn jvp(&self, input: &[f32], tangent: &[f32]) -> Vec<f32> {
            vec![0.01 * dot(tangent, input)]
        }
    }

    #[test]
    fn test_candidates_outside_trust_region_are_rolled_back() -> Result<()> {
        let batch = batch(&policy(), 10);
        let mut policy = Jumpy {
            w: vec![0.0, 0.0],
            origin: vec![0.0, 0.0],
            loads: 0,
        };
        let before = policy.params();

        let config = TrpoConfig::default().max_backtracks(3);
        let mut trpo = Trpo::build(config, space(), 0.0);
        let record = trpo.update(&mut policy, &batch)?;
        assert_eq!(record.get_scalar("step_accepted")?, 0.0);
        assert!(record.get_scalar("kl")? > 0.01);
        // Three candidates, then the restore.
        assert_eq!(policy.loads, 4);
        let bits = |p: &[f32]| p.iter().map(|x| x.to_bits()).collect::<Vec<_>>();
        assert_eq!(bits(&policy.params()), bits(&before));
        Ok(())
    }

    #[test]
    fn test_empty_batch() {
        let mut policy = policy();
        let mut trpo = Trpo::build(TrpoConfig::default(), space(), 0.9);
        let err = trpo.update(&mut policy, &RolloutSet::new(vec![])).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<WebplayError>(),
            Some(WebplayError::EmptyBatch)
        ));
    }
}
