//! Policies and policy-gradient optimizers for webplay.
//!
//! Networks are plain [`Mlp`]s on `ndarray`, trained through the
//! [`DiffFn`](webplay_core::DiffFn) boundary:
//!
//! * [`Trpo`] - natural gradient steps inside a KL trust region.
//! * [`Ppo`] - clipped surrogate with a value head sharing the policy trunk.
//! * [`A3c`] - n-step actor-critic gradients for asynchronous workers.
//! * [`CloneTrainer`] - behavior cloning from recorded demonstrations.
pub mod a3c;
pub mod agent;
pub mod cg;
pub mod checkpoint;
pub mod clone;
pub mod mlp;
pub mod opt;
pub mod ppo;
pub mod trpo;
pub mod util;
pub use a3c::{A3c, A3cConfig, A3cTerms, Segment};
pub use agent::{Agent, AgentConfig};
pub use clone::{CloneConfig, CloneTrainer, Recording};
pub use mlp::{Mlp, MlpConfig};
pub use opt::{Optimizer, OptimizerConfig};
pub use ppo::{Ppo, PpoConfig};
pub use trpo::{Trpo, TrpoConfig};
