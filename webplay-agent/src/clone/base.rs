use super::{CloneConfig, Recording};
use crate::{opt::Optimizer, util::axpy};
use anyhow::{Context, Result};
use log::info;
use rand::{rngs::SmallRng, seq::SliceRandom, SeedableRng};
use std::path::PathBuf;
use webplay_core::{
    env::EnvSpec,
    error::WebplayError,
    observer::{FrameHistoryJoiner, Observer},
    record::{Record, RecordValue, Recorder},
    rollout::ObsTape,
    DiffFn,
};

/// Demonstrations turned into policy inputs and target actions.
#[derive(Debug)]
pub struct CloneBatch {
    demos: Vec<(ObsTape, Vec<Vec<f32>>)>,
}

impl CloneBatch {
    /// Number of demonstrations.
    pub fn len(&self) -> usize {
        self.demos.len()
    }

    /// Returns `true` if the batch has no demonstration.
    pub fn is_empty(&self) -> bool {
        self.demos.is_empty()
    }

    /// Total number of steps.
    pub fn total_steps(&self) -> usize {
        self.demos.iter().map(|(_, a)| a.len()).sum()
    }
}

/// Fits a policy to demonstrations by maximum likelihood.
pub struct CloneTrainer {
    config: CloneConfig,
    spec: EnvSpec,
    opt: Optimizer,
    rng: SmallRng,
    iter: usize,
}

impl CloneTrainer {
    /// Constructs a trainer of policies with `num_params` parameters for
    /// games of `spec`.
    pub fn build(config: CloneConfig, spec: EnvSpec, num_params: usize) -> Self {
        let opt = config.optimizer.build(num_params);
        let rng = SmallRng::seed_from_u64(config.seed);
        Self {
            config,
            spec,
            opt,
            rng,
            iter: 0,
        }
    }

    /// Sets the number of iterations of each call to [`CloneTrainer::train`].
    pub fn set_max_iters(&mut self, v: Option<usize>) {
        self.config.max_iters = v;
    }

    /// Number of iterations done so far.
    pub fn iterations(&self) -> usize {
        self.iter
    }

    /// Reads recordings and converts them with the observer, frame joiner
    /// and actor of the spec.
    pub fn fetch(&self, samples: &[PathBuf]) -> Result<CloneBatch> {
        if samples.is_empty() {
            return Err(WebplayError::EmptyBatch.into());
        }
        let recordings = samples
            .iter()
            .map(Recording::load)
            .collect::<Result<Vec<_>>>()
            .context("fetch batch")?;
        self.fetch_recordings(&recordings)
    }

    /// Converts recordings already in memory; see [`CloneTrainer::fetch`].
    pub fn fetch_recordings(&self, recordings: &[Recording]) -> Result<CloneBatch> {
        if recordings.is_empty() {
            return Err(WebplayError::EmptyBatch.into());
        }
        let observer = &self.spec.observer;
        let mut demos = Vec::with_capacity(recordings.len());
        for recording in recordings {
            let mut actor = self.spec.make_actor();
            actor.reset();
            let mut joiner = FrameHistoryJoiner::new(self.spec.history_size);
            let mut tape = ObsTape::new(joiner.joined_len(observer.obs_len()));
            let mut actions = Vec::with_capacity(recording.num_steps());
            for i in 0..recording.num_steps() {
                let frame = observer
                    .obs_vec(&recording.frames[i])
                    .context("fetch batch")?;
                if i == 0 {
                    joiner.reset(&frame);
                }
                tape.push(&joiner.step(&frame))?;
                actions.push(actor.vectorize(&recording.steps[i]));
            }
            tape.seal()?;
            demos.push((tape, actions));
        }
        Ok(CloneBatch { demos })
    }

    /// Mean negative log-likelihood of the demonstrated actions.
    pub fn total_cost<P: DiffFn>(&self, policy: &P, batch: &CloneBatch) -> Result<f32> {
        let space = self.spec.action_space();
        let (mut cost, mut n) = (0.0, 0);
        for (tape, actions) in &batch.demos {
            for (obs, action) in tape.frames()?.zip(actions) {
                cost -= space.log_prob(&policy.forward(&obs?), action);
                n += 1;
            }
        }
        Ok(if n > 0 { cost / n as f32 } else { 0.0 })
    }

    /// Gradient of the mean negative log-likelihood plus the L2 penalty,
    /// returned with the cost.
    pub fn gradient<P: DiffFn>(&self, policy: &P, batch: &CloneBatch) -> Result<(Vec<f32>, f32)> {
        let n = batch.total_steps();
        if n == 0 {
            return Err(WebplayError::EmptyBatch.into());
        }
        let space = self.spec.action_space();
        let mut grad = vec![0.0; policy.num_params()];
        let mut cost = 0.0;
        for (tape, actions) in &batch.demos {
            for (obs, action) in tape.frames()?.zip(actions) {
                let obs = obs?;
                let out = policy.forward(&obs);
                cost -= space.log_prob(&out, action) / n as f32;
                let mut g = space.log_prob_grad(&out, action);
                g.iter_mut().for_each(|x| *x *= -1.0 / n as f32);
                policy.backward(&obs, &g, &mut grad);
            }
        }
        if self.config.l2_reg != 0.0 {
            axpy(self.config.l2_reg, &policy.params(), &mut grad);
        }
        Ok((grad, cost))
    }

    /// Runs mini-batch training over `samples` until `stop` returns `true` or
    /// the iteration budget is spent. Returns the number of iterations done.
    pub fn train<P: DiffFn>(
        &mut self,
        policy: &mut P,
        samples: &[PathBuf],
        validation: &[PathBuf],
        recorder: &mut dyn Recorder,
        stop: &dyn Fn() -> bool,
    ) -> Result<usize> {
        if samples.is_empty() {
            return Err(WebplayError::EmptyBatch.into());
        }
        let batch_size = self.config.batch_size.max(1);
        let mut order = samples.to_vec();
        let mut val = validation.to_vec();
        let start = self.iter;
        loop {
            order.shuffle(&mut self.rng);
            for chunk in order.chunks(batch_size) {
                let budget_spent = self
                    .config
                    .max_iters
                    .map(|m| self.iter - start >= m)
                    .unwrap_or(false);
                if budget_spent || stop() {
                    return Ok(self.iter - start);
                }

                let batch = self.fetch(chunk)?;
                let (grad, cost) = self.gradient(&*policy, &batch)?;
                let mut params = policy.params();
                self.opt.step(&mut params, &grad)?;
                policy.set_params(&params)?;
                info!("iteration {}: cost={}", self.iter, cost);
                let mut record = Record::from_scalar("cost", cost);

                if self.iter % self.config.val_interval.max(1) == 0 && !val.is_empty() {
                    val.shuffle(&mut self.rng);
                    let n = val.len().min(batch_size);
                    let vbatch = self.fetch(&val[..n])?;
                    let val_cost = self.total_cost(&*policy, &vbatch)?;
                    info!("iteration {}: val_cost={}", self.iter, val_cost);
                    record.insert("val_cost", RecordValue::Scalar(val_cost));
                }
                recorder.write(record);
                self.iter += 1;
            }
        }
    }
}
