//! Running-gear layout in the chassis frame.
//!
//! Resolves where the chain has to go: sprocket and idler circles, the
//! extremal road wheels, and the wrap direction.

use std::fmt;

use nalgebra::Point3;

use crate::{Result, TrackError};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Direction in which the chain wraps from the sprocket over to the idler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum WrapDirection {
    /// Sprocket in front of the idler.
    CounterClockwise,
    /// Sprocket behind the idler.
    Clockwise,
}

impl WrapDirection {
    /// Wrap sign used by the link stepping formulas: -1 for CCW, +1 for CW.
    #[must_use]
    pub fn sign(self) -> f64 {
        match self {
            Self::CounterClockwise => -1.0,
            Self::Clockwise => 1.0,
        }
    }

    /// Check for counter-clockwise wrapping.
    #[must_use]
    pub fn is_ccw(self) -> bool {
        matches!(self, Self::CounterClockwise)
    }
}

impl fmt::Display for WrapDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CounterClockwise => write!(f, "CCW"),
            Self::Clockwise => write!(f, "CW"),
        }
    }
}

/// A wheel as seen by the chain: centre and effective wrap radius.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct WheelCircle {
    /// Wheel centre in the chassis frame.
    pub center: Point3<f64>,
    /// Effective wrap radius.
    pub radius: f64,
}

impl WheelCircle {
    /// Create a wheel circle.
    #[must_use]
    pub const fn new(center: Point3<f64>, radius: f64) -> Self {
        Self { center, radius }
    }

    /// Topmost point of the circle.
    #[must_use]
    pub fn top(&self) -> Point3<f64> {
        Point3::new(self.center.x, self.center.y, self.center.z + self.radius)
    }

    /// Lowest point of the circle.
    #[must_use]
    pub fn bottom(&self) -> Point3<f64> {
        Point3::new(self.center.x, self.center.y, self.center.z - self.radius)
    }

    fn is_valid(&self) -> bool {
        self.center.coords.iter().all(|c| c.is_finite())
            && self.radius.is_finite()
            && self.radius > 0.0
    }
}

/// Resolved running-gear layout in the chassis frame.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct WheelLayout {
    /// Sprocket pitch circle.
    pub sprocket: WheelCircle,
    /// Idler wrap circle.
    pub idler: WheelCircle,
    /// Road wheel with the largest forward coordinate.
    pub front_wheel: Point3<f64>,
    /// Road wheel with the smallest forward coordinate.
    pub rear_wheel: Point3<f64>,
    /// Road wheel wrap radius.
    pub wheel_radius: f64,
    /// Wrap direction.
    pub direction: WrapDirection,
}

impl WheelLayout {
    /// Resolve the layout from wheel circles and road wheel centres.
    ///
    /// The chain wraps counter-clockwise when the sprocket is in front of the
    /// idler and clockwise when it is behind.
    ///
    /// # Errors
    ///
    /// - [`TrackError::NoRoadWheels`] if `road_wheels` is empty
    /// - [`TrackError::DegenerateLayout`] for non-finite positions,
    ///   non-positive radii, or sprocket and idler closer than
    ///   `min_separation` along the forward axis
    pub fn resolve(
        sprocket: WheelCircle,
        idler: WheelCircle,
        road_wheels: &[Point3<f64>],
        wheel_radius: f64,
        min_separation: f64,
    ) -> Result<Self> {
        let (first, rest) = road_wheels.split_first().ok_or(TrackError::NoRoadWheels)?;

        if !sprocket.is_valid() {
            return Err(TrackError::degenerate_layout(
                "sprocket position and radius must be finite, radius positive",
            ));
        }
        if !idler.is_valid() {
            return Err(TrackError::degenerate_layout(
                "idler position and radius must be finite, radius positive",
            ));
        }
        if !wheel_radius.is_finite() || wheel_radius <= 0.0 {
            return Err(TrackError::degenerate_layout(
                "road wheel radius must be finite and positive",
            ));
        }
        if road_wheels
            .iter()
            .any(|p| !p.coords.iter().all(|c| c.is_finite()))
        {
            return Err(TrackError::degenerate_layout(
                "road wheel positions must be finite",
            ));
        }

        let separation = sprocket.center.x - idler.center.x;
        if separation.abs() <= min_separation {
            return Err(TrackError::degenerate_layout(format!(
                "sprocket and idler share forward coordinate {:.6}; wrap direction undefined",
                sprocket.center.x
            )));
        }

        let mut front_wheel = *first;
        let mut rear_wheel = *first;
        for wheel in rest {
            if wheel.x > front_wheel.x {
                front_wheel = *wheel;
            }
            if wheel.x < rear_wheel.x {
                rear_wheel = *wheel;
            }
        }

        let direction = if separation > 0.0 {
            WrapDirection::CounterClockwise
        } else {
            WrapDirection::Clockwise
        };

        Ok(Self {
            sprocket,
            idler,
            front_wheel,
            rear_wheel,
            wheel_radius,
            direction,
        })
    }

    /// Road wheel closest to the sprocket end of the track.
    #[must_use]
    pub fn wheel_on_sprocket_side(&self) -> Point3<f64> {
        if self.direction.is_ccw() {
            self.front_wheel
        } else {
            self.rear_wheel
        }
    }

    /// Road wheel closest to the idler end of the track.
    #[must_use]
    pub fn wheel_on_idler_side(&self) -> Point3<f64> {
        if self.direction.is_ccw() {
            self.rear_wheel
        } else {
            self.front_wheel
        }
    }
}
