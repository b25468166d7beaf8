#![warn(missing_docs)]
//! Core of webplay: training game-playing agents in simulated browsers.
//!
//! This crate defines everything between the game harness and a learning
//! algorithm:
//!
//! * [`ActionSpace`] - parametric action distributions with their derivatives.
//! * [`Actor`](actor::Actor)s - mapping between action vectors and input events.
//! * [`Observer`](observer::Observer)s and the
//!   [`FrameHistoryJoiner`](observer::FrameHistoryJoiner) - screenshot encoding.
//! * [`GameEnv`](env::GameEnv) - the composition of the above around a
//!   [`RawEnv`](env::RawEnv), and the [`EnvRegistry`](env::EnvRegistry) of
//!   supported games.
//! * [`Trajectory`](rollout::Trajectory) and [`RolloutSet`](rollout::RolloutSet) -
//!   collected experience, with observations on a compressed tape.
//! * [`Recording`](recording::Recording)s - demonstrations written by a
//!   [`RecordingFactory`](recording::RecordingFactory) for behavior cloning.
//! * [`DiffFn`] - the boundary to differentiable policies and critics.
pub mod actor;
pub mod dummy;
pub mod env;
pub mod error;
pub mod events;
pub mod observer;
pub mod record;
pub mod recording;
pub mod rollout;

mod model;
mod space;
pub use model::DiffFn;
pub use space::ActionSpace;
