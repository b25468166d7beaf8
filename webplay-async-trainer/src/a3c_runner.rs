//! Actor-learner threads of A3C.
use crate::{ParamServer, ShutdownSignal};
use anyhow::Result;
use log::info;
use rand::{rngs::SmallRng, SeedableRng};
use std::{
    sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        Mutex,
    },
    time::{Duration, Instant},
};
use webplay_agent::{A3c, Agent};
use webplay_core::{env::Env, error::WebplayError};

/// Averages values reported from many threads and releases the average at
/// most once per interval.
pub struct AvgLog {
    interval: Duration,
    state: Mutex<(Instant, Vec<f32>, usize)>,
}

impl AvgLog {
    /// Creates a log whose first average is released after `interval`.
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            state: Mutex::new((Instant::now(), vec![], 0)),
        }
    }

    /// Adds one sample. Returns the averages since the last release once the
    /// interval has elapsed.
    pub fn add(&self, values: &[f32]) -> Option<Vec<f32>> {
        let mut state = self.state.lock().unwrap();
        let (last, sums, count) = &mut *state;
        if sums.len() != values.len() {
            *sums = vec![0.0; values.len()];
            *count = 0;
        }
        sums.iter_mut().zip(values).for_each(|(s, v)| *s += v);
        *count += 1;
        if last.elapsed() < self.interval {
            return None;
        }
        let avg = sums.iter().map(|s| s / *count as f32).collect();
        *last = Instant::now();
        sums.iter_mut().for_each(|s| *s = 0.0);
        *count = 0;
        Some(avg)
    }
}

/// Stats of [`A3cRunner::run`].
#[derive(Clone, Debug, Default, PartialEq)]
pub struct A3cStat {
    /// Number of gradients submitted by the workers.
    pub updates: usize,

    /// Number of finished episodes.
    pub episodes: usize,

    /// Number of environment steps.
    pub env_steps: usize,

    /// Wall-clock duration.
    pub duration: Duration,
}

/// Runs one actor-learner thread per environment against a shared
/// [`ParamServer`] until shutdown, an error, or the update budget.
pub struct A3cRunner {
    a3c: A3c,
    shutdown: ShutdownSignal,
    max_updates: Option<usize>,
    seed: u64,
}

impl A3cRunner {
    /// Creates a runner.
    pub fn new(a3c: A3c, shutdown: ShutdownSignal) -> Self {
        Self {
            a3c,
            shutdown,
            max_updates: None,
            seed: 42,
        }
    }

    /// Stops once the server reached this many updates.
    pub fn max_updates(mut self, v: Option<usize>) -> Self {
        self.max_updates = v;
        self
    }

    /// Sets the seed. Worker `i` uses `seed + i`.
    pub fn seed(mut self, v: u64) -> Self {
        self.seed = v;
        self
    }

    /// Runs the workers. The first worker failure stops the others and is
    /// returned.
    pub fn run(&self, server: &ParamServer<Agent>, envs: &mut [Box<dyn Env>]) -> Result<A3cStat> {
        let start = Instant::now();
        let config = self.a3c.config();
        let update_log = AvgLog::new(config.update_log_interval);
        let reg_log = AvgLog::new(config.reg_log_interval);
        let stop = AtomicBool::new(false);
        let updates = AtomicUsize::new(0);
        let episodes = AtomicUsize::new(0);
        let env_steps = AtomicUsize::new(0);

        info!("Running A3C...");
        let results = std::thread::scope(|s| {
            let handles = envs
                .iter_mut()
                .enumerate()
                .map(|(id, env)| {
                    let (stop, updates, episodes, env_steps) = (&stop, &updates, &episodes, &env_steps);
                    let (update_log, reg_log) = (&update_log, &reg_log);
                    s.spawn(move || -> Result<()> {
                        let (_, mut local) = server.snapshot();
                        let mut rng = SmallRng::seed_from_u64(self.seed + id as u64);
                        let mut obs = None;
                        let mut reward = 0.0;
                        let result = (|| -> Result<()> {
                            while !stop.load(Ordering::SeqCst) && !self.shutdown.is_set() {
                                if let Some(max) = self.max_updates {
                                    if server.version() >= max {
                                        break;
                                    }
                                }
                                server.sync(&mut local)?;
                                let segment =
                                    self.a3c
                                        .run_segment(&local, env.as_mut(), &mut obs, &mut rng)?;
                                env_steps.fetch_add(segment.len(), Ordering::SeqCst);
                                reward += segment.rewards.iter().sum::<f32>();
                                if segment.is_terminal() {
                                    let n = episodes.fetch_add(1, Ordering::SeqCst) + 1;
                                    info!("episode {}: worker={} reward={}", n, id, reward);
                                    reward = 0.0;
                                }

                                let (grad, terms) = self.a3c.gradient(&local, &segment)?;
                                let version = server.apply(&grad)?;
                                updates.fetch_add(1, Ordering::SeqCst);
                                if let Some(avg) = update_log.add(&[terms.advantage, terms.critic]) {
                                    info!(
                                        "update {}: advantage={} critic={}",
                                        version, avg[0], avg[1]
                                    );
                                }
                                if let Some(avg) = reg_log.add(&[terms.entropy]) {
                                    info!("update {}: entropy={}", version, avg[0]);
                                }
                            }
                            Ok(())
                        })();
                        if result.is_err() {
                            stop.store(true, Ordering::SeqCst);
                        }
                        result.map_err(|e| e.context(format!("A3C worker {}", id)))
                    })
                })
                .collect::<Vec<_>>();
            handles
                .into_iter()
                .enumerate()
                .map(|(id, h)| {
                    h.join().unwrap_or_else(|_| {
                        stop.store(true, Ordering::SeqCst);
                        Err(WebplayError::WorkerPanicked(id).into())
                    })
                })
                .collect::<Vec<_>>()
        });
        for result in results {
            result?;
        }

        Ok(A3cStat {
            updates: updates.into_inner(),
            episodes: episodes.into_inner(),
            env_steps: env_steps.into_inner(),
            duration: start.elapsed(),
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use test_log::test;
    use webplay_agent::{A3cConfig, AgentConfig};
    use webplay_core::{
        dummy::{DummyCatalog, DummyConfig, DummyFactory},
        env::{EnvRegistry, EnvSpec},
        DiffFn,
    };

    fn spec() -> EnvSpec {
        EnvRegistry::standard(&DummyCatalog::new(32, 32))
            .get("Knightower-v0")
            .unwrap()
            .clone()
    }

    fn setup(dummy: DummyConfig, n: usize) -> (Vec<Box<dyn Env>>, ParamServer<Agent>, A3c) {
        let spec = spec();
        let factory = DummyFactory::new(dummy);
        let envs = (0..n)
            .map(|_| Box::new(spec.make_env(&factory, 600).unwrap()) as Box<dyn Env>)
            .collect();
        let config = AgentConfig::default().units(vec![4]);
        let mut rng = SmallRng::seed_from_u64(0);
        let policy = config
            .new_policy(spec.obs_len(), &spec.action_space(), &mut rng)
            .unwrap();
        let critic = config.new_critic(&mut rng).unwrap();
        let agent = Agent::from_parts(&policy, critic, spec.action_space()).unwrap();
        let a3c_config = A3cConfig::default().interval(5);
        let server = ParamServer::new(agent, &a3c_config.optimizer);
        (envs, server, A3c::build(a3c_config, spec.discount))
    }

    #[test]
    fn test_runs_until_update_budget() -> Result<()> {
        let (mut envs, server, a3c) = setup(DummyConfig::default().episode_len(12), 3);
        let initial = server.snapshot().1.params();
        let runner = A3cRunner::new(a3c, ShutdownSignal::new()).max_updates(Some(30));
        let stat = runner.run(&server, &mut envs)?;

        assert!(stat.updates >= 30);
        assert_eq!(server.version(), stat.updates);
        assert!(stat.episodes > 0);
        assert!(stat.env_steps >= stat.updates);
        assert_ne!(server.snapshot().1.params(), initial);
        Ok(())
    }

    #[test]
    fn test_worker_failure_stops_run() {
        let dummy = DummyConfig::default().episode_len(12).fail_at_step(Some(8));
        let (mut envs, server, a3c) = setup(dummy, 2);
        let runner = A3cRunner::new(a3c, ShutdownSignal::new());
        let err = runner.run(&server, &mut envs).unwrap_err();
        assert!(format!("{:?}", err).contains("A3C worker"));
    }

    #[test]
    fn test_shutdown_before_start() -> Result<()> {
        let (mut envs, server, a3c) = setup(DummyConfig::default(), 2);
        let shutdown = ShutdownSignal::new();
        shutdown.trigger();
        let stat = A3cRunner::new(a3c, shutdown).run(&server, &mut envs)?;
        assert_eq!(stat.updates, 0);
        Ok(())
    }

    #[test]
    fn test_avg_log_releases_after_interval() {
        let log = AvgLog::new(Duration::from_millis(20));
        assert!(log.add(&[1.0]).is_none());
        std::thread::sleep(Duration::from_millis(30));
        assert_eq!(log.add(&[3.0]), Some(vec![2.0]));
        assert!(log.add(&[5.0]).is_none());
    }
}
