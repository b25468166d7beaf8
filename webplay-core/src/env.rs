//! Environments.
//!
//! The game harness is consumed through the narrow [`RawEnv`] boundary. A
//! [`GameEnv`] composes a raw environment with an [`Actor`](crate::actor::Actor),
//! an [`Observer`](crate::observer::Observer) and a
//! [`FrameHistoryJoiner`](crate::observer::FrameHistoryJoiner) into the
//! [`Env`] contract used by every training algorithm. [`EnvSpec`]s describe how
//! to build a `GameEnv` for a named game and live in an immutable
//! [`EnvRegistry`].
mod base;
mod cursor;
mod game_env;
mod raw;
mod registry;
mod spec;
pub use base::{Env, Step};
pub use cursor::CursorEnv;
pub use game_env::GameEnv;
pub use raw::{GameCatalog, GameInfo, RawEnv, RawEnvFactory, RawObs};
pub use registry::EnvRegistry;
pub use spec::{EnvSpec, EnvWrapper};
