//! Errors in the library.
use thiserror::Error;

/// Domain errors that callers may want to match on.
///
/// Failures of the underlying game harness are not listed here; they travel as
/// [`anyhow::Error`] with the name of the failing operation attached as context.
#[derive(Debug, Error)]
pub enum WebplayError {
    /// No environment with the given name is registered.
    #[error("unsupported environment: {0}")]
    UnknownEnv(String),

    /// A batch was requested from zero samples.
    #[error("empty batch")]
    EmptyBatch,

    /// A configuration value is out of its valid range.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// A parameter or sample vector has the wrong length for an action space.
    #[error("parameter length mismatch: expected {expected}, got {actual}")]
    ParamLen {
        /// Length required by the action space or model.
        expected: usize,
        /// Length that was given.
        actual: usize,
    },

    /// An observation does not match the configured image size.
    #[error("observation size mismatch: expected {expected} bytes, got {actual}")]
    ShapeMismatch {
        /// Expected number of bytes.
        expected: usize,
        /// Actual number of bytes.
        actual: usize,
    },

    /// Layer widths of networks that are combined do not line up.
    #[error("layer size mismatch: expected {expected:?}, got {actual:?}")]
    LayerMismatch {
        /// Widths required by the other network.
        expected: Vec<usize>,
        /// Widths that were given.
        actual: Vec<usize>,
    },

    /// A worker thread panicked.
    #[error("worker {0} panicked")]
    WorkerPanicked(usize),

    /// A channel was closed while a message was being sent.
    #[error("channel closed")]
    ChannelClosed,
}
