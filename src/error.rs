//! Error types for the rebalance execution engine.

use thiserror::Error;

/// Result type alias for engine operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the rebalance execution engine.
#[derive(Error, Debug)]
pub enum Error {
    /// An execution is already in flight on this executor.
    #[error("cannot execute new proposals while there is an ongoing execution")]
    Busy,

    /// A required argument or dependency was missing or invalid.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The control plane already reports reassignments that this executor
    /// did not submit.
    #[error("there are {partitions} ongoing partition reassignments")]
    ConcurrentReassignment { partitions: usize },

    /// Control plane request failed.
    #[error("control plane error: {0}")]
    ControlPlane(String),

    /// Cluster metadata could not be refreshed.
    #[error("metadata error: {0}")]
    Metadata(String),

    /// The load monitor is not ready to pause metric sampling.
    #[error("load monitor not ready")]
    MonitorNotReady,

    /// Generic internal error.
    #[error("internal error: {0}")]
    Internal(String),
}
