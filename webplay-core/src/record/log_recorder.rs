use super::{Record, Recorder};
use log::info;

/// A recorder that prints each record as a single log line.
pub struct LogRecorder {
    prefix: String,
}

impl LogRecorder {
    /// Constructs the recorder. Every line starts with `prefix`.
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }
}

impl Recorder for LogRecorder {
    fn write(&mut self, record: Record) {
        if !record.is_empty() {
            info!("{}: {}", self.prefix, record.fmt_line());
        }
    }
}
