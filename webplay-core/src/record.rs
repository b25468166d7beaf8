//! Records of training metrics.
//!
//! Optimizers and rollout collectors summarize their work as [`Record`]s, small
//! maps from metric names to [`RecordValue`]s, and hand them to a [`Recorder`].
//!
//! ```rust
//! use webplay_core::record::{Record, RecordValue};
//!
//! let mut record = Record::from_scalar("kl", 0.004);
//! record.insert("improvement", RecordValue::Scalar(0.13));
//! assert_eq!(record.get_scalar("kl").unwrap(), 0.004);
//! ```
mod base;
mod buffered_recorder;
mod log_recorder;
mod null_recorder;
mod recorder;

pub use base::{Record, RecordValue};
pub use buffered_recorder::BufferedRecorder;
pub use log_recorder::LogRecorder;
pub use null_recorder::NullRecorder;
pub use recorder::Recorder;
