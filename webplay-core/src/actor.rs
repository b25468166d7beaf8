//! Conversion between action vectors and input events.
//!
//! An [`Actor`] turns a sampled action vector into the input events applied
//! to the game during one step and, for imitation learning, maps recorded
//! events back to an action vector. Actors are stateful within an episode
//! (held keys, cursor position); [`Actor::reset`] clears that state and must
//! be called at the start of every episode. An actor is owned by exactly one
//! environment and is never shared between threads.
mod key;
mod mouse;
mod tap;
use crate::{events::InputEvent, space::ActionSpace};
pub use key::KeyActor;
pub use mouse::{MouseActor, MouseMotion, MOVE_FRACTION};
use serde::{Deserialize, Serialize};
pub use tap::TapActor;

/// Threshold above which a Bernoulli sample counts as a press.
pub const PRESS_THRESHOLD: f32 = 0.5;

/// Maps action vectors to input events and back.
pub trait Actor: Send {
    /// Distribution used to sample actions for this actor.
    fn action_space(&self) -> ActionSpace;

    /// Length of the parameter vectors of [`Actor::action_space`].
    fn param_len(&self) -> usize {
        self.action_space().param_len()
    }

    /// Clears the per-episode state.
    fn reset(&mut self);

    /// Converts a sampled action vector to the events of one step.
    fn events(&mut self, action: &[f32]) -> Vec<InputEvent>;

    /// Pseudo-inverse of [`Actor::events`].
    ///
    /// Reconstructs an action vector that would produce the given events of one
    /// step, or at least some of them when no vector reproduces all.
    fn vectorize(&mut self, events: &[InputEvent]) -> Vec<f32>;
}

/// Configuration from which fresh actors are built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ActorConfig {
    /// See [`KeyActor`].
    Key {
        /// Names of the controllable keys.
        keys: Vec<String>,
        /// Presses are instantaneous taps.
        no_hold: bool,
    },

    /// See [`TapActor`].
    Tap {
        /// Screen width in pixels.
        width: u32,
        /// Screen height in pixels.
        height: u32,
        /// Clicks are instantaneous.
        no_hold: bool,
    },

    /// See [`MouseActor`].
    Mouse {
        /// Screen width in pixels.
        width: u32,
        /// Screen height in pixels.
        height: u32,
        /// Clicks are instantaneous.
        no_hold: bool,
        /// How cursor motion is parameterized.
        motion: MouseMotion,
    },
}

impl ActorConfig {
    /// Builds a new actor with cleared state.
    pub fn build(&self) -> Box<dyn Actor> {
        let mut actor: Box<dyn Actor> = match self {
            Self::Key { keys, no_hold } => Box::new(KeyActor::new(keys.clone(), *no_hold)),
            Self::Tap {
                width,
                height,
                no_hold,
            } => Box::new(TapActor::new(*width, *height, *no_hold)),
            Self::Mouse {
                width,
                height,
                no_hold,
                motion,
            } => Box::new(MouseActor::new(*width, *height, *no_hold, *motion)),
        };
        actor.reset();
        actor
    }

    /// Action space of the actors built from this configuration.
    pub fn action_space(&self) -> ActionSpace {
        match self {
            Self::Key { keys, .. } => ActionSpace::Bernoulli { dim: keys.len() },
            Self::Tap { .. } => ActionSpace::Bernoulli { dim: 1 },
            Self::Mouse { motion, .. } => motion.action_space(),
        }
    }
}

/// Press decision for a Bernoulli sample.
fn pressed(x: f32) -> bool {
    x > PRESS_THRESHOLD
}
