//! Trust region policy optimization.
mod base;
mod config;
pub use base::Trpo;
pub use config::TrpoConfig;
