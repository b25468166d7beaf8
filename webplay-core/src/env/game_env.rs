use super::{Env, RawEnv, Step};
use crate::{
    actor::Actor,
    observer::{FrameHistoryJoiner, Observer, ObserverConfig},
    space::ActionSpace,
};
use anyhow::{Context, Result};
use log::warn;
use std::time::Duration;

/// A game driven through an [`Actor`] and seen through an [`Observer`].
///
/// Every step lasts `frame_time` of game time. Episodes are cut after
/// `max_steps` steps regardless of the game's own termination signal. The raw
/// environment is closed by [`Env::close`] or, at the latest, when the
/// `GameEnv` is dropped.
pub struct GameEnv {
    raw: Box<dyn RawEnv>,
    actor: Box<dyn Actor>,
    observer: ObserverConfig,
    joiner: FrameHistoryJoiner,
    space: ActionSpace,
    frame_time: Duration,
    max_steps: usize,
    reward_scale: Option<f32>,
    timestep: usize,
    closed: bool,
}

impl GameEnv {
    /// Composes an environment.
    pub fn new(
        raw: Box<dyn RawEnv>,
        actor: Box<dyn Actor>,
        observer: ObserverConfig,
        history_size: usize,
        frame_time: Duration,
        max_steps: usize,
    ) -> Self {
        let space = actor.action_space();
        Self {
            raw,
            actor,
            observer,
            joiner: FrameHistoryJoiner::new(history_size),
            space,
            frame_time,
            max_steps,
            reward_scale: None,
            timestep: 0,
            closed: false,
        }
    }

    /// Multiplies every reward by `scale`.
    pub fn reward_scale(mut self, scale: Option<f32>) -> Self {
        self.reward_scale = scale;
        self
    }

    /// Number of steps taken in the current episode.
    pub fn timestep(&self) -> usize {
        self.timestep
    }

    fn observe(&mut self) -> Result<Vec<f32>> {
        let raw = self.raw.observe()?;
        self.observer.obs_vec(&raw)
    }

    fn reset_inner(&mut self) -> Result<Vec<f32>> {
        self.actor.reset();
        self.timestep = 0;
        self.raw.reset()?;
        let frame = self.observe()?;
        self.joiner.reset(&frame);
        Ok(self.joiner.step(&frame))
    }

    fn step_inner(&mut self, action: &[f32]) -> Result<Step> {
        self.space.check_sample(action)?;
        let events = self.actor.events(action);
        let (reward, mut done) = self.raw.step(self.frame_time, &events)?;
        let frame = self.observe()?;
        let obs = self.joiner.step(&frame);

        self.timestep += 1;
        if self.timestep >= self.max_steps {
            done = true;
        }
        let reward = match self.reward_scale {
            Some(scale) => reward * scale,
            None => reward,
        };
        Ok(Step { obs, reward, done })
    }
}

impl Env for GameEnv {
    fn obs_len(&self) -> usize {
        self.joiner.joined_len(self.observer.obs_len())
    }

    fn action_space(&self) -> ActionSpace {
        self.space.clone()
    }

    fn reset(&mut self) -> Result<Vec<f32>> {
        self.reset_inner().context("reset")
    }

    fn step(&mut self, action: &[f32]) -> Result<Step> {
        self.step_inner(action).context("step")
    }

    fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        self.raw.close().context("close")
    }
}

impl Drop for GameEnv {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            warn!("failed to close environment: {:?}", e);
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{
        actor::ActorConfig,
        dummy::{DummyConfig, DummyEnv},
        observer::DownsampleObserver,
    };

    fn make_env(config: DummyConfig, max_steps: usize) -> GameEnv {
        let observer = ObserverConfig::Downsample(DownsampleObserver::new(4, 64, 64));
        let actor = ActorConfig::Key {
            keys: vec!["Left".to_string(), "Right".to_string()],
            no_hold: true,
        };
        GameEnv::new(
            Box::new(DummyEnv::new(config.size(64, 64))),
            actor.build(),
            observer,
            1,
            Duration::from_millis(100),
            max_steps,
        )
    }

    #[test]
    fn test_sizes() -> Result<()> {
        let mut env = make_env(DummyConfig::default(), 10);
        assert_eq!(env.observer.obs_size(), (16, 16, 1));
        assert_eq!(env.obs_len(), 16 * 16 * 2);
        assert_eq!(env.reset()?.len(), env.obs_len());
        assert_eq!(env.step(&[1.0, 0.0])?.obs.len(), env.obs_len());
        Ok(())
    }

    #[test]
    fn test_max_steps_forces_done() -> Result<()> {
        let mut env = make_env(DummyConfig::default().episode_len(100), 3);
        env.reset()?;
        assert!(!env.step(&[0.0, 0.0])?.done);
        assert!(!env.step(&[0.0, 0.0])?.done);
        assert!(env.step(&[0.0, 0.0])?.done);

        // The counter restarts with the episode.
        env.reset()?;
        assert_eq!(env.timestep(), 0);
        assert!(!env.step(&[0.0, 0.0])?.done);
        Ok(())
    }

    #[test]
    fn test_reward_scale() -> Result<()> {
        let mut env = make_env(DummyConfig::default().reward_per_press(2.0), 10).reward_scale(Some(0.5));
        env.reset()?;
        assert_eq!(env.step(&[1.0, 0.0])?.reward, 1.0);
        Ok(())
    }

    #[test]
    fn test_errors_carry_operation() {
        let mut env = make_env(DummyConfig::default().fail_reset(true), 10);
        let err = env.reset().unwrap_err();
        assert_eq!(err.to_string(), "reset");

        let mut env = make_env(DummyConfig::default().fail_at_step(Some(1)), 10);
        env.reset().unwrap();
        let err = env.step(&[0.0, 0.0]).unwrap_err();
        assert_eq!(err.to_string(), "step");

        let err = env.step(&[0.0]).unwrap_err();
        assert!(format!("{:?}", err).contains("parameter length mismatch"));
    }
}
