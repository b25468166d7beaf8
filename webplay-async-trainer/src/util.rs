//! Training drivers.
use crate::{
    collector_stats_fmt, A3cRunner, A3cStat, CollectorConfig, ParamServer, Quota,
    RolloutCollector, Saver, ShutdownSignal,
};
use anyhow::{Context, Result};
use log::info;
use rand::{rngs::SmallRng, SeedableRng};
use std::{
    path::{Path, PathBuf},
    sync::{Arc, Mutex},
    time::Duration,
};
use webplay_agent::{
    checkpoint::{self, load_or_make_agent, load_or_make_policy, save_agent},
    clone::read_sample_list,
    A3c, A3cConfig, AgentConfig, CloneConfig, CloneTrainer, Ppo, PpoConfig, Trpo, TrpoConfig,
};
use webplay_core::{
    env::{Env, EnvSpec, RawEnvFactory},
    record::{RecordValue, Recorder},
    DiffFn,
};

/// Iterations of behavior cloning run between two releases of the policy lock.
const CLONE_CHUNK: usize = 16;

/// Options shared by all training drivers.
#[derive(Clone, Debug)]
pub struct TrainOptions {
    /// Checkpoint of the policy.
    pub policy_path: PathBuf,

    /// Checkpoint of the critic, used by PPO and A3C.
    pub critic_path: PathBuf,

    /// Networks created when no checkpoint exists.
    pub agent: AgentConfig,

    /// Stops after this many batches (A3C: updates, cloning: iterations).
    /// Otherwise runs until shutdown.
    pub max_batches: Option<usize>,

    /// Interval of the background saver of TRPO, PPO and cloning. A3C uses
    /// [`A3cConfig::save_interval`].
    pub save_interval: Duration,
}

impl Default for TrainOptions {
    fn default() -> Self {
        Self {
            policy_path: PathBuf::from("trained_policy"),
            critic_path: PathBuf::from("trained_critic"),
            agent: AgentConfig::default(),
            max_batches: None,
            save_interval: Duration::from_secs(300),
        }
    }
}

impl TrainOptions {
    /// Sets the policy checkpoint.
    pub fn policy_path(mut self, v: impl Into<PathBuf>) -> Self {
        self.policy_path = v.into();
        self
    }

    /// Sets the critic checkpoint.
    pub fn critic_path(mut self, v: impl Into<PathBuf>) -> Self {
        self.critic_path = v.into();
        self
    }

    /// Sets the configuration of new networks.
    pub fn agent(mut self, v: AgentConfig) -> Self {
        self.agent = v;
        self
    }

    /// Sets the batch budget.
    pub fn max_batches(mut self, v: Option<usize>) -> Self {
        self.max_batches = v;
        self
    }

    /// Sets the save interval.
    pub fn save_interval(mut self, v: Duration) -> Self {
        self.save_interval = v;
        self
    }

    fn done(&self, batches: usize, shutdown: &ShutdownSignal) -> bool {
        shutdown.is_set() || self.max_batches.map(|m| batches >= m).unwrap_or(false)
    }
}

/// Trains a policy with TRPO on batches of `spec.batch_size` episodes.
///
/// Returns the number of batches trained on. The policy is saved in the
/// background and once more before returning.
pub fn train_trpo(
    spec: &EnvSpec,
    factory: &dyn RawEnvFactory,
    collector_config: CollectorConfig,
    trpo_config: TrpoConfig,
    opts: &TrainOptions,
    shutdown: &ShutdownSignal,
    recorder: &mut dyn Recorder,
) -> Result<usize> {
    let space = spec.action_space();
    let mut rng = SmallRng::seed_from_u64(collector_config.seed);
    let policy = load_or_make_policy(&opts.policy_path, &opts.agent, spec.obs_len(), &space, &mut rng)?;
    let policy = Arc::new(Mutex::new(policy));
    let mut collector = RolloutCollector::build(collector_config, spec, factory, shutdown.clone())?;
    let mut saver = {
        let (policy, path) = (policy.clone(), opts.policy_path.clone());
        Saver::spawn(opts.save_interval, move || {
            let policy = policy.lock().unwrap();
            checkpoint::save(&path, &*policy).context("save policy")
        })
    };
    let mut trpo = Trpo::build(trpo_config, space, spec.discount);

    let mut batch_idx = 0;
    while !opts.done(batch_idx, shutdown) {
        saver.poll()?;
        info!("Gathering batch of experience...");
        let snapshot = policy.lock().unwrap().clone();
        let batch = collector.gather(&snapshot, Quota::Episodes(spec.batch_size))?;
        if shutdown.is_set() {
            break;
        }
        info!(
            "batch {}: mean={} stddev={}",
            batch_idx,
            batch.mean_reward(),
            batch.reward_variance().sqrt()
        );

        info!("Training on batch...");
        let mut record = {
            let mut policy = policy.lock().unwrap();
            trpo.update(&mut *policy, &batch)?
        };
        record.insert("mean_reward", RecordValue::Scalar(batch.mean_reward()));
        recorder.write(record);
        batch_idx += 1;
    }

    info!("Stats of rollout collection");
    info!("{}", collector_stats_fmt(collector.stats()));
    collector.close()?;
    saver.finish()?;
    Ok(batch_idx)
}

/// Trains a policy and a critic with PPO on batches of at least
/// `ppo_config.batch_steps` steps.
///
/// Returns the number of batches trained on.
pub fn train_ppo(
    spec: &EnvSpec,
    factory: &dyn RawEnvFactory,
    collector_config: CollectorConfig,
    ppo_config: PpoConfig,
    opts: &TrainOptions,
    shutdown: &ShutdownSignal,
    recorder: &mut dyn Recorder,
) -> Result<usize> {
    let space = spec.action_space();
    let mut rng = SmallRng::seed_from_u64(collector_config.seed);
    let agent = load_or_make_agent(
        &opts.policy_path,
        &opts.critic_path,
        &opts.agent,
        spec.obs_len(),
        &space,
        &mut rng,
    )?;
    let mut ppo = Ppo::build(ppo_config, spec.discount, agent.num_params());
    let agent = Arc::new(Mutex::new(agent));
    let mut collector = RolloutCollector::build(collector_config, spec, factory, shutdown.clone())?;
    let mut saver = {
        let agent = agent.clone();
        let (policy_path, critic_path) = (opts.policy_path.clone(), opts.critic_path.clone());
        Saver::spawn(opts.save_interval, move || {
            let agent = agent.lock().unwrap();
            save_agent(&agent, &policy_path, &critic_path)
        })
    };

    let mut batch_idx = 0;
    while !opts.done(batch_idx, shutdown) {
        saver.poll()?;
        info!("Gathering batch of experience...");
        let snapshot = agent.lock().unwrap().clone();
        let batch = collector.gather(&snapshot, Quota::Steps(ppo.batch_steps()))?;
        if shutdown.is_set() {
            break;
        }
        let n = batch.len() as f32;
        info!(
            "batch {}: mean={} count={} error_margin={}",
            batch_idx,
            batch.mean_reward(),
            batch.len(),
            (batch.reward_variance() / n).sqrt()
        );

        info!("Training on batch...");
        let mut record = {
            let mut agent = agent.lock().unwrap();
            ppo.update(&mut agent, &batch)?
        };
        record.insert("mean_reward", RecordValue::Scalar(batch.mean_reward()));
        recorder.write(record);
        batch_idx += 1;
    }

    info!("Stats of rollout collection");
    info!("{}", collector_stats_fmt(collector.stats()));
    collector.close()?;
    saver.finish()?;
    Ok(batch_idx)
}

/// Trains a policy and a critic with A3C, one actor-learner thread per
/// environment.
///
/// `collector_config` gives the number of environments, their episode cap
/// and the seed. `opts.max_batches` bounds the number of updates.
pub fn train_a3c(
    spec: &EnvSpec,
    factory: &dyn RawEnvFactory,
    collector_config: CollectorConfig,
    a3c_config: A3cConfig,
    opts: &TrainOptions,
    shutdown: &ShutdownSignal,
) -> Result<A3cStat> {
    let space = spec.action_space();
    let mut rng = SmallRng::seed_from_u64(collector_config.seed);
    let agent = load_or_make_agent(
        &opts.policy_path,
        &opts.critic_path,
        &opts.agent,
        spec.obs_len(),
        &space,
        &mut rng,
    )?;

    info!("Initializing environments...");
    let mut envs = (0..collector_config.n_workers)
        .map(|_| {
            spec.make_env(factory, collector_config.max_steps)
                .map(|env| Box::new(env) as Box<dyn Env>)
        })
        .collect::<Result<Vec<_>>>()?;

    let server = Arc::new(ParamServer::new(agent, &a3c_config.optimizer));
    let saver = {
        let server = server.clone();
        let (policy_path, critic_path) = (opts.policy_path.clone(), opts.critic_path.clone());
        Saver::spawn(a3c_config.save_interval, move || {
            let (_, agent) = server.snapshot();
            save_agent(&agent, &policy_path, &critic_path)
        })
    };

    let runner = A3cRunner::new(A3c::build(a3c_config, spec.discount), shutdown.clone())
        .max_updates(opts.max_batches)
        .seed(collector_config.seed);
    let stat = runner.run(&server, &mut envs)?;
    info!(
        "A3C: updates={} episodes={} steps={} duration={:?}",
        stat.updates, stat.episodes, stat.env_steps, stat.duration
    );
    saver.finish()?;
    for env in envs.iter_mut() {
        env.close()?;
    }
    Ok(stat)
}

/// Fits the policy to the recordings in `dir` by behavior cloning.
///
/// Recordings in `validation_dir`, if given, are only used for the validation
/// cost. Returns the number of iterations run.
pub fn train_clone(
    spec: &EnvSpec,
    clone_config: CloneConfig,
    dir: impl AsRef<Path>,
    validation_dir: Option<&Path>,
    opts: &TrainOptions,
    shutdown: &ShutdownSignal,
    recorder: &mut dyn Recorder,
) -> Result<usize> {
    let samples = read_sample_list(dir)?;
    let validation = match validation_dir {
        Some(dir) => read_sample_list(dir)?,
        None => vec![],
    };
    info!(
        "Found {} recordings and {} validation recordings",
        samples.len(),
        validation.len()
    );

    let space = spec.action_space();
    let mut rng = SmallRng::seed_from_u64(clone_config.seed);
    let policy = load_or_make_policy(&opts.policy_path, &opts.agent, spec.obs_len(), &space, &mut rng)?;
    let num_params = policy.num_params();
    let policy = Arc::new(Mutex::new(policy));
    let mut saver = {
        let (policy, path) = (policy.clone(), opts.policy_path.clone());
        Saver::spawn(opts.save_interval, move || {
            let policy = policy.lock().unwrap();
            checkpoint::save(&path, &*policy).context("save policy")
        })
    };

    let mut trainer = CloneTrainer::build(clone_config, spec.clone(), num_params);
    let mut iters = 0;
    while !opts.done(iters, shutdown) {
        saver.poll()?;
        let chunk = opts
            .max_batches
            .map(|m| (m - iters).min(CLONE_CHUNK))
            .unwrap_or(CLONE_CHUNK);
        trainer.set_max_iters(Some(chunk));
        let mut policy = policy.lock().unwrap();
        iters += trainer.train(&mut *policy, &samples, &validation, recorder, &|| {
            shutdown.is_set()
        })?;
    }

    saver.finish()?;
    Ok(iters)
}
