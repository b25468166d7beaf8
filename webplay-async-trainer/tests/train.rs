use anyhow::Result;
use std::time::Duration;
use tempdir::TempDir;
use test_log::test;
use webplay_agent::{
    checkpoint, A3cConfig, AgentConfig, CloneConfig, Mlp, PpoConfig, Recording, TrpoConfig,
};
use webplay_async_trainer::{
    train_a3c, train_clone, train_ppo, train_trpo, CollectorConfig, ShutdownSignal, TrainOptions,
};
use webplay_core::{
    dummy::{DummyCatalog, DummyConfig, DummyFactory},
    env::{EnvRegistry, EnvSpec, RawObs},
    record::{BufferedRecorder, NullRecorder},
    recording::{read_sample_list, RecordingFactory},
    DiffFn,
};

const GAME: &str = "DontCrash-v0";
const SCREEN: u32 = 32;
const N_WORKERS: usize = 3;
const EPISODE_LEN: usize = 6;
const BATCH_SIZE: usize = 8;
const MAX_BATCHES: usize = 2;

fn spec() -> EnvSpec {
    let mut spec = EnvRegistry::standard(&DummyCatalog::new(SCREEN, SCREEN))
        .get(GAME)
        .unwrap()
        .clone();
    spec.batch_size = BATCH_SIZE;
    spec
}

fn factory() -> DummyFactory {
    DummyFactory::new(DummyConfig::default().episode_len(EPISODE_LEN))
}

fn collector_config() -> CollectorConfig {
    CollectorConfig::default().n_workers(N_WORKERS).max_steps(100)
}

fn options(dir: &TempDir) -> TrainOptions {
    TrainOptions::default()
        .policy_path(dir.path().join("trained_policy"))
        .critic_path(dir.path().join("trained_critic"))
        .agent(AgentConfig::default().units(vec![8]))
        .max_batches(Some(MAX_BATCHES))
}

#[test]
fn test_train_trpo() -> Result<()> {
    let dir = TempDir::new("train_trpo")?;
    let opts = options(&dir);
    let factory = factory();
    let mut recorder = BufferedRecorder::new();
    let batches = train_trpo(
        &spec(),
        &factory,
        collector_config(),
        TrpoConfig::default(),
        &opts,
        &ShutdownSignal::new(),
        &mut recorder,
    )?;

    assert_eq!(batches, MAX_BATCHES);
    assert_eq!(recorder.len(), MAX_BATCHES);
    assert_eq!(factory.opened(), N_WORKERS);
    assert_eq!(factory.closed(), N_WORKERS);
    let policy: Mlp = checkpoint::load(&opts.policy_path)?;
    assert_eq!(policy.in_len(), spec().obs_len());
    Ok(())
}

#[test]
fn test_train_ppo_resumes_from_checkpoint() -> Result<()> {
    let dir = TempDir::new("train_ppo")?;
    let opts = options(&dir);
    let config = PpoConfig::default().epochs(2).batch_steps(20);
    let shutdown = ShutdownSignal::new();
    let mut recorder = BufferedRecorder::new();

    train_ppo(&spec(), &factory(), collector_config(), config.clone(), &opts, &shutdown, &mut recorder)?;
    let first: Mlp = checkpoint::load(&opts.policy_path)?;
    assert!(opts.critic_path.exists());

    train_ppo(&spec(), &factory(), collector_config(), config, &opts, &shutdown, &mut recorder)?;
    let second: Mlp = checkpoint::load(&opts.policy_path)?;
    assert_eq!(recorder.len(), 2 * MAX_BATCHES);
    assert_ne!(first.params(), second.params());
    Ok(())
}

#[test]
fn test_train_a3c() -> Result<()> {
    let dir = TempDir::new("train_a3c")?;
    let opts = options(&dir).max_batches(Some(20));
    let config = A3cConfig::default()
        .interval(4)
        .save_interval(Duration::from_secs(3600));
    let stat = train_a3c(&spec(), &factory(), collector_config(), config, &opts, &ShutdownSignal::new())?;
    assert!(stat.updates >= 20);
    assert!(opts.policy_path.exists());
    assert!(opts.critic_path.exists());
    Ok(())
}

#[test]
fn test_shutdown_saves_untrained_policy() -> Result<()> {
    let dir = TempDir::new("shutdown")?;
    let opts = options(&dir).max_batches(None);
    let shutdown = ShutdownSignal::new();
    shutdown.trigger();
    let batches = train_trpo(
        &spec(),
        &factory(),
        collector_config(),
        TrpoConfig::default(),
        &opts,
        &shutdown,
        &mut NullRecorder::new(),
    )?;
    assert_eq!(batches, 0);
    assert!(opts.policy_path.exists());
    Ok(())
}

#[test]
fn test_recorded_episodes_feed_cloning() -> Result<()> {
    let dir = TempDir::new("record")?;
    let demos = dir.path().join("demos");
    let factory = RecordingFactory::new(factory(), &demos)?;
    train_trpo(
        &spec(),
        &factory,
        collector_config(),
        TrpoConfig::default(),
        &options(&dir),
        &ShutdownSignal::new(),
        &mut NullRecorder::new(),
    )?;

    let samples = read_sample_list(&demos)?;
    assert_eq!(samples.len(), MAX_BATCHES * BATCH_SIZE);
    assert_eq!(Recording::load(&samples[0])?.num_steps(), EPISODE_LEN);

    let clone_dir = TempDir::new("record_clone")?;
    let iters = train_clone(
        &spec(),
        CloneConfig::default().batch_size(4),
        &demos,
        None,
        &options(&clone_dir).max_batches(Some(3)),
        &ShutdownSignal::new(),
        &mut NullRecorder::new(),
    )?;
    assert_eq!(iters, 3);
    Ok(())
}

#[test]
fn test_train_clone() -> Result<()> {
    let dir = TempDir::new("train_clone")?;
    let demos = TempDir::new("demos")?;
    let spec = spec();
    for i in 0..3 {
        let mut actor = spec.make_actor();
        actor.reset();
        let mut recording = Recording::default();
        for t in 0..5 {
            let level = (40 * (t + i)) as u8;
            let events = actor.events(&[1.0]);
            recording.push(RawObs::filled(SCREEN as usize, SCREEN as usize, [level; 3]), events);
        }
        recording.save(demos.path().join(format!("recording_{}", i)))?;
    }

    let opts = options(&dir).max_batches(Some(20));
    let config = CloneConfig::default()
        .batch_size(2)
        .optimizer(webplay_agent::OptimizerConfig::adam(1e-2));
    let mut recorder = BufferedRecorder::new();
    let iters = train_clone(
        &spec,
        config,
        demos.path(),
        Some(demos.path()),
        &opts,
        &ShutdownSignal::new(),
        &mut recorder,
    )?;
    assert_eq!(iters, 20);
    assert_eq!(recorder.len(), 20);

    let costs = recorder
        .iter()
        .map(|r| r.get_scalar("cost"))
        .collect::<Result<Vec<_>>>()?;
    assert!(costs[19] < costs[0]);
    Ok(())
}

#[test]
fn test_clone_without_recordings_fails() -> Result<()> {
    let dir = TempDir::new("clone_empty")?;
    let result = train_clone(
        &spec(),
        CloneConfig::default(),
        dir.path(),
        None,
        &options(&dir),
        &ShutdownSignal::new(),
        &mut NullRecorder::new(),
    );
    assert!(result.is_err());
    Ok(())
}
