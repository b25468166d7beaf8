//! Parallel rollout collection and asynchronous training for webplay.
//!
//! * [`RolloutCollector`] runs a fixed pool of environments on worker threads
//!   and gathers batches of whole episodes, either an exact number of them or
//!   enough to cross a step threshold.
//! * [`ParamServer`] holds the parameters shared by the actor-learner threads
//!   of [`A3cRunner`].
//! * [`Saver`] checkpoints a model in the background, under the lock that
//!   guards it.
//! * [`train_trpo`], [`train_ppo`], [`train_a3c`] and [`train_clone`] tie
//!   these together and stop cooperatively on a [`ShutdownSignal`].
mod a3c_runner;
mod collector;
mod param_server;
mod saver;
mod shutdown;
mod sync_model;
mod util;
pub use a3c_runner::{A3cRunner, A3cStat, AvgLog};
pub use collector::{
    collector_stats_fmt, CollectorConfig, CollectorStat, Quota, RolloutCollector, TokenSource,
};
pub use param_server::ParamServer;
pub use saver::Saver;
pub use shutdown::ShutdownSignal;
pub use sync_model::SyncModel;
pub use util::{train_a3c, train_clone, train_ppo, train_trpo, TrainOptions};
