use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use log::info;
use std::{path::PathBuf, time::Duration};
use webplay::{
    agent::{A3cConfig, CloneConfig, PpoConfig, TrpoConfig},
    async_trainer::{
        train_a3c, train_clone, train_ppo, train_trpo, CollectorConfig, ShutdownSignal,
        TrainOptions,
    },
    core::{
        dummy::{DummyCatalog, DummyConfig, DummyFactory},
        env::{EnvRegistry, EnvSpec, RawEnvFactory},
        record::LogRecorder,
        recording::RecordingFactory,
    },
};

/// Screen size of the games of the scripted harness.
const SCREEN: (u32, u32) = (320, 480);

/// Train agents to play browser games
#[derive(Parser, Debug)]
#[command(version, about)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Train a policy with trust region policy optimization
    Trpo(TrainArgs),

    /// Train a policy and a critic with proximal policy optimization
    Ppo(TrainArgs),

    /// Train a policy and a critic with asynchronous advantage actor-critic
    A3c(TrainArgs),

    /// Fit a policy to recorded demonstrations
    Clone(CloneArgs),

    /// List the supported games
    ListEnvs,
}

#[derive(Args, Debug)]
struct TrainArgs {
    /// Name of the game
    #[arg(long)]
    env: String,

    /// Number of environments run in parallel
    #[arg(long, default_value_t = 8)]
    numparallel: usize,

    /// Maximum number of steps of an episode
    #[arg(long, default_value_t = 600)]
    maxsteps: usize,

    /// Policy checkpoint
    #[arg(long, default_value = "trained_policy")]
    policy: PathBuf,

    /// Critic checkpoint
    #[arg(long, default_value = "trained_critic")]
    critic: PathBuf,

    /// YAML configuration of the algorithm
    #[arg(long)]
    config: Option<PathBuf>,

    /// Stop after this many batches, otherwise run until Ctrl+C
    #[arg(long)]
    max_batches: Option<usize>,

    /// Seconds between two background saves
    #[arg(long, default_value_t = 300)]
    save: u64,

    /// Directory where every played episode is stored as a recording
    #[arg(long)]
    record: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct CloneArgs {
    #[command(flatten)]
    train: TrainArgs,

    /// Directory of the recordings
    #[arg(long, default_value = "recordings")]
    dir: PathBuf,

    /// Directory of the validation recordings
    #[arg(long)]
    validation: Option<PathBuf>,
}

impl TrainArgs {
    fn spec(&self, registry: &EnvRegistry) -> Result<EnvSpec> {
        Ok(registry.get(&self.env)?.clone())
    }

    fn collector_config(&self) -> CollectorConfig {
        CollectorConfig::default()
            .n_workers(self.numparallel)
            .max_steps(self.maxsteps)
    }

    fn factory(&self) -> Result<Box<dyn RawEnvFactory>> {
        let factory = DummyFactory::new(DummyConfig::default());
        let factory: Box<dyn RawEnvFactory> = match &self.record {
            Some(dir) => {
                info!("Recording episodes to {:?}", dir);
                Box::new(RecordingFactory::new(factory, dir)?)
            }
            None => Box::new(factory),
        };
        Ok(factory)
    }

    fn options(&self) -> TrainOptions {
        TrainOptions::default()
            .policy_path(&self.policy)
            .critic_path(&self.critic)
            .max_batches(self.max_batches)
            .save_interval(Duration::from_secs(self.save))
    }
}

fn shutdown_on_ctrlc() -> Result<ShutdownSignal> {
    let shutdown = ShutdownSignal::new();
    let handler = shutdown.clone();
    ctrlc::set_handler(move || {
        info!("Stopping...");
        handler.trigger();
    })?;
    info!("Running. Press Ctrl+C to stop.");
    Ok(shutdown)
}

fn run(cli: Cli) -> Result<()> {
    let registry = EnvRegistry::standard(&DummyCatalog::new(SCREEN.0, SCREEN.1));
    let mut recorder = LogRecorder::new("train");

    match cli.command {
        Command::ListEnvs => {
            for spec in registry.iter() {
                println!("{}", spec.name());
            }
        }
        Command::Trpo(args) => {
            let spec = args.spec(&registry)?;
            let config = match &args.config {
                Some(path) => TrpoConfig::load(path)?,
                None => TrpoConfig::default(),
            };
            let factory = args.factory()?;
            let shutdown = shutdown_on_ctrlc()?;
            train_trpo(
                &spec,
                &*factory,
                args.collector_config(),
                config,
                &args.options(),
                &shutdown,
                &mut recorder,
            )?;
        }
        Command::Ppo(args) => {
            let spec = args.spec(&registry)?;
            let config = match &args.config {
                Some(path) => PpoConfig::load(path)?,
                None => PpoConfig::default(),
            };
            let factory = args.factory()?;
            let shutdown = shutdown_on_ctrlc()?;
            train_ppo(
                &spec,
                &*factory,
                args.collector_config(),
                config,
                &args.options(),
                &shutdown,
                &mut recorder,
            )?;
        }
        Command::A3c(args) => {
            let spec = args.spec(&registry)?;
            let config = match &args.config {
                Some(path) => A3cConfig::load(path)?,
                None => A3cConfig::default().save_interval(Duration::from_secs(args.save)),
            };
            let factory = args.factory()?;
            let shutdown = shutdown_on_ctrlc()?;
            train_a3c(
                &spec,
                &*factory,
                args.collector_config(),
                config,
                &args.options(),
                &shutdown,
            )?;
        }
        Command::Clone(args) => {
            let spec = args.train.spec(&registry)?;
            let config = match &args.train.config {
                Some(path) => CloneConfig::load(path)?,
                None => CloneConfig::default(),
            };
            let shutdown = shutdown_on_ctrlc()?;
            train_clone(
                &spec,
                config,
                &args.dir,
                args.validation.as_deref(),
                &args.train.options(),
                &shutdown,
                &mut recorder,
            )?;
        }
    }
    Ok(())
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    run(Cli::parse())
}

#[cfg(test)]
mod test {
    use super::*;
    use webplay::core::error::WebplayError;

    #[test]
    fn test_defaults() {
        let cli = Cli::try_parse_from(["webplay", "ppo", "--env", "Knightower-v0"]).unwrap();
        match cli.command {
            Command::Ppo(args) => {
                assert_eq!(args.numparallel, 8);
                assert_eq!(args.maxsteps, 600);
                assert_eq!(args.policy, PathBuf::from("trained_policy"));
                assert_eq!(args.critic, PathBuf::from("trained_critic"));
                assert_eq!(args.max_batches, None);
                assert_eq!(args.record, None);
            }
            _ => panic!("expected ppo"),
        }
    }

    #[test]
    fn test_env_is_required() {
        assert!(Cli::try_parse_from(["webplay", "trpo"]).is_err());
    }

    #[test]
    fn test_unknown_env_fails_before_training() {
        let cli = Cli::try_parse_from(["webplay", "trpo", "--env", "NoSuchGame-v0"]).unwrap();
        let err = run(cli).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<WebplayError>(),
            Some(WebplayError::UnknownEnv(_))
        ));
    }
}
