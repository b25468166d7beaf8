use super::{CollectorConfig, CollectorStat, Quota, TokenSource};
use crate::ShutdownSignal;
use anyhow::Result;
use crossbeam_channel::bounded;
use log::{info, warn};
use rand::{rngs::SmallRng, SeedableRng};
use std::time::Instant;
use webplay_core::{
    env::{Env, EnvSpec, RawEnvFactory},
    error::WebplayError,
    rollout::{run_episode, RolloutSet, Trajectory},
    DiffFn,
};

/// Runs episodes on a fixed pool of environments in parallel.
///
/// Worker `i` owns environment `i` for the lifetime of the collector and is
/// the only thread that ever touches it. Each [`gather`](Self::gather) spawns
/// one scoped thread per worker; the workers pull tokens from a shared
/// [`TokenSource`] and send finished trajectories to the calling thread.
pub struct RolloutCollector {
    config: CollectorConfig,
    envs: Vec<Box<dyn Env>>,
    rngs: Vec<SmallRng>,
    shutdown: ShutdownSignal,
    stats: Vec<CollectorStat>,
}

impl RolloutCollector {
    /// Launches `config.n_workers` environments of `spec`.
    pub fn build(
        config: CollectorConfig,
        spec: &EnvSpec,
        factory: &dyn RawEnvFactory,
        shutdown: ShutdownSignal,
    ) -> Result<Self> {
        if config.n_workers == 0 {
            return Err(WebplayError::InvalidConfig("at least one worker is needed".into()).into());
        }
        info!("Initializing environments...");
        let envs = (0..config.n_workers)
            .map(|_| {
                spec.make_env(factory, config.max_steps)
                    .map(|env| Box::new(env) as Box<dyn Env>)
            })
            .collect::<Result<Vec<_>>>()?;
        Self::from_envs(config, envs, shutdown)
    }

    /// Uses already opened environments, one per worker. `config.n_workers`
    /// is ignored.
    pub fn from_envs(
        config: CollectorConfig,
        envs: Vec<Box<dyn Env>>,
        shutdown: ShutdownSignal,
    ) -> Result<Self> {
        let first = envs
            .first()
            .ok_or_else(|| WebplayError::InvalidConfig("no environment".into()))?;
        let (obs_len, space) = (first.obs_len(), first.action_space());
        if envs
            .iter()
            .any(|e| e.obs_len() != obs_len || e.action_space() != space)
        {
            return Err(WebplayError::InvalidConfig("environments differ".into()).into());
        }
        let rngs = (0..envs.len())
            .map(|i| SmallRng::seed_from_u64(config.seed + i as u64))
            .collect();
        Ok(Self {
            config,
            envs,
            rngs,
            shutdown,
            stats: vec![],
        })
    }

    /// Number of workers.
    pub fn n_workers(&self) -> usize {
        self.envs.len()
    }

    /// Stats of the gathers done so far.
    pub fn stats(&self) -> &[CollectorStat] {
        &self.stats
    }

    /// Collects whole episodes with actions sampled from `policy` until
    /// `quota` is met.
    ///
    /// In episode mode exactly the requested number of trajectories is
    /// returned. In step mode every worker finishes the episode it is running
    /// when the threshold is crossed, so the batch usually overshoots.
    /// A shutdown request stops the issuing of tokens and the batch is
    /// returned short. The first environment failure aborts the gather.
    pub fn gather<P: DiffFn>(&mut self, policy: &P, quota: Quota) -> Result<RolloutSet> {
        let start = Instant::now();
        let tokens = TokenSource::new(quota);
        let log_every = match quota {
            Quota::Episodes(n) => Some((n / self.config.log_chunks.max(1)).max(1)),
            Quota::Steps(_) => None,
        };
        let (sender, receiver) = bounded::<Trajectory>(self.envs.len());
        let shutdown = &self.shutdown;
        let envs = &mut self.envs;
        let rngs = &mut self.rngs;

        let (trajs, results) = std::thread::scope(|s| {
            let handles = envs
                .iter_mut()
                .zip(rngs.iter_mut())
                .enumerate()
                .map(|(id, (env, rng))| {
                    let sender = sender.clone();
                    let tokens = &tokens;
                    s.spawn(move || -> Result<()> {
                        while !shutdown.is_set() && tokens.take() {
                            let traj = match run_episode(env.as_mut(), policy, rng) {
                                Ok(traj) => traj,
                                Err(e) => {
                                    tokens.close();
                                    return Err(e.context(format!("rollout on worker {}", id)));
                                }
                            };
                            tokens.add_steps(traj.len());
                            if sender.send(traj).is_err() {
                                tokens.close();
                                return Err(WebplayError::ChannelClosed.into());
                            }
                        }
                        Ok(())
                    })
                })
                .collect::<Vec<_>>();
            drop(sender);

            let mut trajs = vec![];
            let (mut sub_sum, mut sub_n) = (0.0, 0);
            for traj in receiver.iter() {
                sub_sum += traj.total_reward();
                sub_n += 1;
                trajs.push(traj);
                if let (Some(every), Quota::Episodes(n)) = (log_every, quota) {
                    if sub_n == every || trajs.len() == n {
                        info!("sub_mean={}", sub_sum / sub_n as f32);
                        sub_sum = 0.0;
                        sub_n = 0;
                    }
                }
            }

            let results = handles
                .into_iter()
                .enumerate()
                .map(|(id, h)| {
                    h.join()
                        .unwrap_or_else(|_| Err(WebplayError::WorkerPanicked(id).into()))
                })
                .collect::<Vec<_>>();
            (trajs, results)
        });
        for result in results {
            result?;
        }

        let stat = CollectorStat {
            episodes: trajs.len(),
            env_steps: tokens.steps(),
            duration: start.elapsed(),
        };
        self.stats.push(stat);
        Ok(RolloutSet::new(trajs))
    }

    /// Closes all environments, returning the first failure.
    pub fn close(&mut self) -> Result<()> {
        let mut result = Ok(());
        for env in self.envs.iter_mut() {
            if let Err(e) = env.close() {
                if result.is_ok() {
                    result = Err(e);
                }
            }
        }
        result
    }
}

impl Drop for RolloutCollector {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            warn!("failed to close environments: {:?}", e);
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use test_log::test;
    use webplay_agent::{AgentConfig, Mlp};
    use webplay_core::{
        dummy::{DummyCatalog, DummyConfig, DummyFactory},
        env::EnvRegistry,
    };

    fn spec() -> EnvSpec {
        EnvRegistry::standard(&DummyCatalog::new(32, 32))
            .get("Knightower-v0")
            .unwrap()
            .clone()
    }

    fn policy(spec: &EnvSpec) -> Mlp {
        AgentConfig::default()
            .units(vec![4])
            .new_policy(spec.obs_len(), &spec.action_space(), &mut SmallRng::seed_from_u64(0))
            .unwrap()
    }

    fn collector(dummy: DummyConfig, n_workers: usize) -> (RolloutCollector, DummyFactory) {
        let factory = DummyFactory::new(dummy);
        let config = CollectorConfig::default().n_workers(n_workers);
        let collector =
            RolloutCollector::build(config, &spec(), &factory, ShutdownSignal::new()).unwrap();
        (collector, factory)
    }

    #[test]
    fn test_episode_quota_is_exact() -> Result<()> {
        for n_workers in [1, 3, 8] {
            let dummy = DummyConfig::default().episode_len(4).len_jitter(3);
            let (mut collector, _) = collector(dummy, n_workers);
            let batch = collector.gather(&policy(&spec()), Quota::Episodes(13))?;
            assert_eq!(batch.len(), 13);
            for t in 0..batch.max_len() {
                let present = batch.present(t);
                for (traj, p) in batch.iter().zip(present) {
                    assert_eq!(p, t < traj.len());
                }
            }
            assert_eq!(collector.stats()[0].episodes, 13);
            assert_eq!(collector.stats()[0].env_steps, batch.total_steps());
        }
        Ok(())
    }

    #[test]
    fn test_step_quota() -> Result<()> {
        let dummy = DummyConfig::default().episode_len(7);
        let (mut collector, _) = collector(dummy, 8);
        let policy = policy(&spec());
        for _ in 0..5 {
            let batch = collector.gather(&policy, Quota::Steps(50))?;
            assert!(batch.total_steps() >= 50);
            assert!(batch.iter().all(|t| t.len() == 7));
            // At most one extra episode per worker.
            assert!(batch.len() <= 50 / 7 + 1 + 8);
        }
        Ok(())
    }

    #[test]
    fn test_env_failure_is_fatal_and_envs_are_closed() {
        let dummy = DummyConfig::default().episode_len(5).fail_at_step(Some(3));
        let (mut collector, factory) = collector(dummy, 4);
        let err = collector
            .gather(&policy(&spec()), Quota::Episodes(8))
            .unwrap_err();
        assert!(format!("{:?}", err).contains("step"));
        drop(collector);
        assert_eq!(factory.opened(), 4);
        assert_eq!(factory.closed(), 4);
    }

    #[test]
    fn test_shutdown_stops_issuing_tokens() -> Result<()> {
        let (mut collector, _) = collector(DummyConfig::default(), 2);
        collector.shutdown.trigger();
        let batch = collector.gather(&policy(&spec()), Quota::Episodes(4))?;
        assert!(batch.is_empty());
        Ok(())
    }

    #[test]
    fn test_no_workers_is_a_config_error() {
        let factory = DummyFactory::new(DummyConfig::default());
        let config = CollectorConfig::default().n_workers(0);
        let err = RolloutCollector::build(config, &spec(), &factory, ShutdownSignal::new())
            .err()
            .unwrap();
        assert!(matches!(
            err.downcast_ref::<WebplayError>(),
            Some(WebplayError::InvalidConfig(_))
        ));
    }
}
