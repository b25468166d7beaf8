//! Proximal policy optimization.
mod base;
mod config;
pub use base::{clipped_surrogate, Ppo};
pub use config::PpoConfig;
