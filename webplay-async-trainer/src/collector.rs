//! Parallel collection of rollouts.
mod base;
mod config;
mod stat;
mod tokens;
pub use base::RolloutCollector;
pub use config::CollectorConfig;
pub use stat::{collector_stats_fmt, CollectorStat};
pub use tokens::{Quota, TokenSource};
