use super::{CursorEnv, GameEnv, GameInfo, RawEnvFactory};
use crate::{
    actor::{Actor, ActorConfig, MouseMotion},
    observer::{DownsampleObserver, Observer, ObserverConfig},
    space::ActionSpace,
};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{
    fs::File,
    io::{BufReader, Write},
    path::Path,
    time::Duration,
};

/// Wrappers applied to every raw environment of a spec when it is created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EnvWrapper {
    /// Draw the mouse cursor, starting at the screen center. See [`CursorEnv`].
    Cursor,
}

/// How to build and train on one game.
///
/// Specs are immutable once registered; every environment built from a spec
/// gets a fresh actor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnvSpec {
    /// The game as described by the harness.
    pub game: GameInfo,

    /// Encoding of the screenshots.
    pub observer: ObserverConfig,

    /// Mapping from actions to input events.
    pub actor: ActorConfig,

    /// Reward discount factor.
    pub discount: f32,

    /// Game time per step.
    pub frame_time: Duration,

    /// Number of episodes per batch for batch algorithms.
    pub batch_size: usize,

    /// If set, rewards are multiplied by this value to bring them close to `[0, 1]`.
    pub reward_scale: Option<f32>,

    /// Number of previous frames fed to the policy besides the current one.
    pub history_size: usize,

    /// Wrapper around the raw environment.
    pub wrap: Option<EnvWrapper>,
}

impl EnvSpec {
    /// A keyboard game observed in grayscale with stride 4.
    pub fn standard_key(
        game: GameInfo,
        no_hold: bool,
        discount: f32,
        frame_time: Duration,
        batch_size: usize,
    ) -> Self {
        let observer = ObserverConfig::Downsample(DownsampleObserver::new(
            4,
            game.width as usize,
            game.height as usize,
        ));
        let actor = ActorConfig::Key {
            keys: game.key_whitelist.clone(),
            no_hold,
        };
        Self {
            game,
            observer,
            actor,
            discount,
            frame_time,
            batch_size,
            reward_scale: None,
            history_size: 1,
            wrap: None,
        }
    }

    /// Like [`EnvSpec::standard_key`] but tapping the center of the screen.
    pub fn standard_tap(
        game: GameInfo,
        no_hold: bool,
        discount: f32,
        frame_time: Duration,
        batch_size: usize,
    ) -> Self {
        let mut spec = Self::standard_key(game, no_hold, discount, frame_time, batch_size);
        spec.actor = ActorConfig::Tap {
            width: spec.game.width,
            height: spec.game.height,
            no_hold,
        };
        spec
    }

    /// Like [`EnvSpec::standard_key`] but moving the mouse through the discrete
    /// motion menu, with the cursor drawn into the observations.
    pub fn standard_mouse(
        game: GameInfo,
        no_hold: bool,
        discount: f32,
        frame_time: Duration,
        batch_size: usize,
    ) -> Self {
        let mut spec = Self::standard_key(game, no_hold, discount, frame_time, batch_size);
        spec.actor = ActorConfig::Mouse {
            width: spec.game.width,
            height: spec.game.height,
            no_hold,
            motion: MouseMotion::Discrete,
        };
        spec.wrap = Some(EnvWrapper::Cursor);
        spec
    }

    /// Observes in color.
    pub fn colorize(mut self) -> Self {
        self.observer.colorize();
        self
    }

    /// Sets the reward scale.
    pub fn with_reward_scale(mut self, scale: f32) -> Self {
        self.reward_scale = Some(scale);
        self
    }

    /// Sets the number of previous frames fed to the policy.
    pub fn with_history_size(mut self, size: usize) -> Self {
        self.history_size = size;
        self
    }

    /// Name of the game.
    pub fn name(&self) -> &str {
        &self.game.name
    }

    /// Action space of the environments.
    pub fn action_space(&self) -> ActionSpace {
        self.actor.action_space()
    }

    /// Length of the observations fed to the policy.
    pub fn obs_len(&self) -> usize {
        self.observer.obs_len() * (self.history_size + 1)
    }

    /// Builds a fresh actor.
    pub fn make_actor(&self) -> Box<dyn Actor> {
        self.actor.build()
    }

    /// Constructs [`EnvSpec`] from YAML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path)?;
        let rdr = BufReader::new(file);
        let b: Self = serde_yaml::from_reader(rdr)?;
        b.observer.check()?;
        Ok(b)
    }

    /// Saves [`EnvSpec`].
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let mut file = File::create(path)?;
        file.write_all(serde_yaml::to_string(&self)?.as_bytes())?;
        Ok(())
    }

    /// Launches a game instance and composes an environment around it.
    pub fn make_env(&self, factory: &dyn RawEnvFactory, max_steps: usize) -> Result<GameEnv> {
        self.observer.check()?;
        let mut raw = factory
            .make(&self.game)
            .with_context(|| format!("create environment {}", self.game.name))?;
        if let Some(EnvWrapper::Cursor) = self.wrap {
            let (x, y) = ((self.game.width / 2) as i32, (self.game.height / 2) as i32);
            raw = Box::new(CursorEnv::new(raw, x, y));
        }
        Ok(GameEnv::new(
            raw,
            self.make_actor(),
            self.observer.clone(),
            self.history_size,
            self.frame_time,
            max_steps,
        )
        .reward_scale(self.reward_scale))
    }
}
