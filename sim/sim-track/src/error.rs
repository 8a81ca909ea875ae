//! Error types for track assembly.

use thiserror::Error;

/// Errors that can occur while assembling or driving a track.
///
/// Running short of track shoes is not an error: the chain is laid out open
/// and reported through [`crate::ClosureOutcome::Open`].
#[derive(Debug, Error, Clone, PartialEq)]
pub enum TrackError {
    /// Invalid assembly configuration.
    #[error("invalid track configuration: {0}")]
    InvalidConfig(String),

    /// The track has no road wheels to wrap around.
    #[error("track assembly requires at least one road wheel")]
    NoRoadWheels,

    /// Number of mount locations does not match the number of suspensions.
    #[error("expected {expected} suspension mount locations, got {actual}")]
    MountCountMismatch {
        /// Number of suspensions owned by the assembly.
        expected: usize,
        /// Number of mount locations supplied.
        actual: usize,
    },

    /// Wheel layout for which the chain geometry is undefined.
    #[error("degenerate wheel layout: {0}")]
    DegenerateLayout(String),

    /// Track shoe index out of bounds.
    #[error("track shoe index {index} out of bounds (count {count})")]
    ShoeIndexOutOfBounds {
        /// The invalid index.
        index: usize,
        /// Number of track shoes.
        count: usize,
    },

    /// Number of per-shoe forces does not match the number of shoes.
    #[error("expected {expected} track shoe forces, got {actual}")]
    ForceCountMismatch {
        /// Number of track shoes.
        expected: usize,
        /// Number of forces supplied.
        actual: usize,
    },

    /// Operation requires an initialized assembly.
    #[error("track assembly has not been initialized")]
    NotInitialized,
}

impl TrackError {
    /// Create an invalid configuration error.
    #[must_use]
    pub fn invalid_config(msg: impl Into<String>) -> Self {
        Self::InvalidConfig(msg.into())
    }

    /// Create a degenerate layout error.
    #[must_use]
    pub fn degenerate_layout(msg: impl Into<String>) -> Self {
        Self::DegenerateLayout(msg.into())
    }

    /// Create a shoe index out of bounds error.
    #[must_use]
    pub fn shoe_out_of_bounds(index: usize, count: usize) -> Self {
        Self::ShoeIndexOutOfBounds { index, count }
    }

    /// Check if this is a configuration or layout error.
    #[must_use]
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidConfig(_)
                | Self::NoRoadWheels
                | Self::MountCountMismatch { .. }
                | Self::DegenerateLayout(_)
        )
    }
}

/// Result type for track operations.
pub type Result<T> = std::result::Result<T, TrackError>;
