//! Error types for ordered map operations
//!
//! Structural violations (bad positions, bad orders) are reported as
//! `OrderedMapError`. Absence of a key or index is not an error and is
//! reported through `Option` by the accessors instead.

use thiserror::Error;

/// Ordered map error types with enough context to correct the call
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OrderedMapError {
    /// Insert position outside `[0, len]`
    #[error("position {position} out of range for map of length {len}")]
    Range {
        /// The requested position
        position: usize,
        /// Number of entries at the time of the call
        len: usize,
    },

    /// Replacement order is not a permutation of the current keys
    #[error("invalid order: {reason}")]
    InvalidOrder {
        /// Which part of the permutation check failed
        reason: String,
    },

    /// Configuration rejected by `Config::validate`
    #[error("invalid config: {0}")]
    InvalidConfig(String),

    /// The traversal producer thread could not be started
    #[error("failed to spawn traversal producer: {message}")]
    Spawn {
        /// Description of the OS error
        message: String,
    },
}

/// Result type alias for ordered map operations
pub type OmResult<T> = Result<T, OrderedMapError>;
