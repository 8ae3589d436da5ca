//! Error types for xraypix-core.

use thiserror::Error;

/// Result type alias for xraypix operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error types for xraypix operations.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    /// An event claims more hit pixels than a readout record can hold.
    #[error("event has {hits} hit pixels, capacity is {max}")]
    CapacityExceeded { hits: usize, max: usize },

    /// Invalid histogram or run configuration.
    #[error("configuration error: {0}")]
    ConfigError(String),
}
