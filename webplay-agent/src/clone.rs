//! Behavior cloning from recorded demonstrations.
mod base;
mod config;
pub use base::{CloneBatch, CloneTrainer};
pub use config::CloneConfig;
pub use webplay_core::recording::{read_sample_list, Recording};
