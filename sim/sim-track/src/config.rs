//! Configuration for track assembly.
//!
//! The assembly wraps the chain around circles slightly larger than the
//! physical idler and road wheels so that the shoes clear the wheel bodies.
//! The inflation is expressed as a multiple of the track shoe height.

use crate::{Result, TrackError};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Configuration for laying out a track chain.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct AssemblyConfig {
    /// Idler wrap radius inflation, as a multiple of shoe height.
    pub idler_clearance: f64,
    /// Road wheel wrap radius inflation, as a multiple of shoe height.
    pub wheel_clearance: f64,
    /// Minimum forward (x) separation between sprocket and idler centres.
    ///
    /// Closer layouts have no defined wrap direction and are rejected.
    pub min_wheel_separation: f64,
    /// Distance below which two pin anchors are considered coincident.
    pub connection_tolerance: f64,
}

impl Default for AssemblyConfig {
    fn default() -> Self {
        Self {
            idler_clearance: 1.0,
            wheel_clearance: 0.9,
            min_wheel_separation: 1e-9,
            connection_tolerance: 1e-6,
        }
    }
}

impl AssemblyConfig {
    /// Create a configuration with no clearance inflation.
    ///
    /// The chain wraps the nominal wheel radii exactly.
    #[must_use]
    pub fn tight() -> Self {
        Self {
            idler_clearance: 0.0,
            wheel_clearance: 0.0,
            ..Default::default()
        }
    }

    /// Set the idler clearance factor.
    #[must_use]
    pub fn with_idler_clearance(mut self, factor: f64) -> Self {
        self.idler_clearance = factor;
        self
    }

    /// Set the road wheel clearance factor.
    #[must_use]
    pub fn with_wheel_clearance(mut self, factor: f64) -> Self {
        self.wheel_clearance = factor;
        self
    }

    /// Set the connection tolerance.
    #[must_use]
    pub fn with_connection_tolerance(mut self, tolerance: f64) -> Self {
        self.connection_tolerance = tolerance;
        self
    }

    /// Effective idler wrap radius for the given shoe height.
    #[must_use]
    pub fn idler_wrap_radius(&self, wheel_radius: f64, shoe_height: f64) -> f64 {
        wheel_radius + self.idler_clearance * shoe_height
    }

    /// Effective road wheel wrap radius for the given shoe height.
    #[must_use]
    pub fn wheel_wrap_radius(&self, wheel_radius: f64, shoe_height: f64) -> f64 {
        wheel_radius + self.wheel_clearance * shoe_height
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        if !self.idler_clearance.is_finite() || self.idler_clearance < 0.0 {
            return Err(TrackError::invalid_config(
                "idler clearance must be finite and non-negative",
            ));
        }

        if !self.wheel_clearance.is_finite() || self.wheel_clearance < 0.0 {
            return Err(TrackError::invalid_config(
                "wheel clearance must be finite and non-negative",
            ));
        }

        if !self.min_wheel_separation.is_finite() || self.min_wheel_separation < 0.0 {
            return Err(TrackError::invalid_config(
                "minimum wheel separation must be finite and non-negative",
            ));
        }

        if !self.connection_tolerance.is_finite() || self.connection_tolerance <= 0.0 {
            return Err(TrackError::invalid_config(
                "connection tolerance must be positive",
            ));
        }

        Ok(())
    }
}
