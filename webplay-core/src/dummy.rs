//! Scripted game harness used for tests and dry runs.
//!
//! [`DummyEnv`] renders a deterministic moving bar, rewards every press event
//! and ends episodes after a configurable number of steps. Failures and slow
//! steps can be injected to exercise error propagation and concurrency.
use crate::{
    env::{GameCatalog, GameInfo, RawEnv, RawEnvFactory, RawObs},
    events::{InputEvent, KeyEventKind, MouseEventKind},
};
use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use std::{
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
    time::Duration,
};

/// Configuration of [`DummyEnv`].
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct DummyConfig {
    /// Screen width.
    pub width: usize,

    /// Screen height.
    pub height: usize,

    /// Number of steps of the first episode.
    pub episode_len: usize,

    /// Episode `i` (from zero) lasts `episode_len + i % (len_jitter + 1)` steps.
    pub len_jitter: usize,

    /// Reward for each key-down or mouse-press event.
    pub reward_per_press: f32,

    /// Reset always fails.
    pub fail_reset: bool,

    /// Step number (from one, counted over the lifetime of the env) that fails.
    pub fail_at_step: Option<usize>,

    /// Wall-clock time each step blocks for.
    pub step_delay: Option<Duration>,
}

impl Default for DummyConfig {
    fn default() -> Self {
        Self {
            width: 32,
            height: 32,
            episode_len: 10,
            len_jitter: 0,
            reward_per_press: 1.0,
            fail_reset: false,
            fail_at_step: None,
            step_delay: None,
        }
    }
}

impl DummyConfig {
    /// Sets the screen size.
    pub fn size(mut self, width: usize, height: usize) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    /// Sets the episode length.
    pub fn episode_len(mut self, v: usize) -> Self {
        self.episode_len = v;
        self
    }

    /// Sets the jitter of episode lengths.
    pub fn len_jitter(mut self, v: usize) -> Self {
        self.len_jitter = v;
        self
    }

    /// Sets the reward per press.
    pub fn reward_per_press(mut self, v: f32) -> Self {
        self.reward_per_press = v;
        self
    }

    /// Makes reset fail.
    pub fn fail_reset(mut self, v: bool) -> Self {
        self.fail_reset = v;
        self
    }

    /// Makes the given step fail.
    pub fn fail_at_step(mut self, v: Option<usize>) -> Self {
        self.fail_at_step = v;
        self
    }

    /// Makes every step block.
    pub fn step_delay(mut self, v: Option<Duration>) -> Self {
        self.step_delay = v;
        self
    }
}

/// Scripted game.
pub struct DummyEnv {
    config: DummyConfig,
    episodes: usize,
    current_len: usize,
    t: usize,
    total_steps: usize,
    closed: Option<Arc<AtomicUsize>>,
}

impl DummyEnv {
    /// Creates a game.
    pub fn new(config: DummyConfig) -> Self {
        Self {
            current_len: config.episode_len,
            config,
            episodes: 0,
            t: 0,
            total_steps: 0,
            closed: None,
        }
    }
}

impl RawEnv for DummyEnv {
    fn reset(&mut self) -> Result<()> {
        if self.config.fail_reset {
            bail!("dummy reset failure");
        }
        self.current_len =
            self.config.episode_len + self.episodes % (self.config.len_jitter + 1);
        self.episodes += 1;
        self.t = 0;
        Ok(())
    }

    fn observe(&mut self) -> Result<RawObs> {
        let (w, h) = (self.config.width, self.config.height);
        let background = 40 + (self.t * 8 % 160) as u8;
        let mut obs = RawObs::filled(w, h, [background, background / 2, 255 - background]);
        let bar = self.t % w.max(1);
        for y in 0..h {
            let idx = (y * w + bar) * 3;
            obs.rgb[idx..idx + 3].copy_from_slice(&[250, 250, 250]);
        }
        Ok(obs)
    }

    fn step(&mut self, _frame_time: Duration, events: &[InputEvent]) -> Result<(f32, bool)> {
        self.t += 1;
        self.total_steps += 1;
        if self.config.fail_at_step == Some(self.total_steps) {
            bail!("dummy step failure at step {}", self.total_steps);
        }
        if let Some(delay) = self.config.step_delay {
            std::thread::sleep(delay);
        }
        let presses = events
            .iter()
            .filter(|e| match e {
                InputEvent::Key { kind, .. } => *kind == KeyEventKind::Down,
                InputEvent::Mouse(m) => m.kind == MouseEventKind::Pressed,
            })
            .count();
        let reward = presses as f32 * self.config.reward_per_press;
        Ok((reward, self.t >= self.current_len))
    }

    fn close(&mut self) -> Result<()> {
        if let Some(closed) = self.closed.take() {
            closed.fetch_add(1, Ordering::SeqCst);
        }
        Ok(())
    }
}

/// Launches [`DummyEnv`]s and counts them.
#[derive(Clone)]
pub struct DummyFactory {
    config: DummyConfig,
    opened: Arc<AtomicUsize>,
    closed: Arc<AtomicUsize>,
}

impl DummyFactory {
    /// Creates a factory. Screen sizes are taken from the game descriptions.
    pub fn new(config: DummyConfig) -> Self {
        Self {
            config,
            opened: Arc::new(AtomicUsize::new(0)),
            closed: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Number of games launched so far.
    pub fn opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }

    /// Number of games closed so far.
    pub fn closed(&self) -> usize {
        self.closed.load(Ordering::SeqCst)
    }
}

impl RawEnvFactory for DummyFactory {
    fn make(&self, game: &GameInfo) -> Result<Box<dyn RawEnv>> {
        self.opened.fetch_add(1, Ordering::SeqCst);
        let config = self
            .config
            .clone()
            .size(game.width as usize, game.height as usize);
        let mut env = DummyEnv::new(config);
        env.closed = Some(self.closed.clone());
        Ok(Box::new(env))
    }
}

/// Catalog that knows every game, all with the same screen size and keys.
pub struct DummyCatalog {
    width: u32,
    height: u32,
    only: Option<Vec<String>>,
}

impl DummyCatalog {
    /// Creates a catalog of games of the given screen size.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            only: None,
        }
    }

    /// Restricts the catalog to the given games.
    pub fn only(mut self, names: &[&str]) -> Self {
        self.only = Some(names.iter().map(|s| s.to_string()).collect());
        self
    }
}

impl GameCatalog for DummyCatalog {
    fn game(&self, name: &str) -> Option<GameInfo> {
        if let Some(only) = &self.only {
            if !only.iter().any(|n| n == name) {
                return None;
            }
        }
        Some(GameInfo {
            name: name.to_string(),
            width: self.width,
            height: self.height,
            key_whitelist: vec!["ArrowLeft".to_string(), "ArrowRight".to_string()],
        })
    }
}
