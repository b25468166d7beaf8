//! Asynchronous advantage actor-critic.
mod base;
mod config;
pub use base::{A3c, A3cTerms, Segment};
pub use config::A3cConfig;
