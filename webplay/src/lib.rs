//! Reinforcement learning for browser games.
//!
//! Webplay consists of the following crates:
//!
//! * [`core`] (`webplay-core`) defines action spaces and the actors that turn
//!   actions into input events, observers, the environment composition and
//!   the registry of supported games, trajectories, and the boundary to
//!   differentiable policies.
//! * [`agent`] (`webplay-agent`) has the policy networks and the TRPO, PPO,
//!   A3C and behavior cloning optimizers.
//! * [`async_trainer`] (`webplay-async-trainer`) runs environments in
//!   parallel, shares parameters between A3C workers, saves checkpoints in
//!   the background, and provides the training drivers used by the `webplay`
//!   binary.
pub use webplay_agent as agent;
pub use webplay_async_trainer as async_trainer;
pub use webplay_core as core;
