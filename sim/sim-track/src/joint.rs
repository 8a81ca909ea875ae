//! Revolute mounts of running-gear wheels on the chassis.

use nalgebra::{Isometry3, Point3, Vector3};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Residual of a bilateral joint constraint.
///
/// A satisfied constraint has both residuals equal to zero.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ConstraintViolation {
    /// Offset between the two anchor points, in world coordinates.
    pub translational: Vector3<f64>,
    /// Misalignment of the joint axes (cross product of the world axes).
    pub rotational: Vector3<f64>,
}

impl Default for ConstraintViolation {
    fn default() -> Self {
        Self::zero()
    }
}

impl ConstraintViolation {
    /// A satisfied constraint.
    #[must_use]
    pub fn zero() -> Self {
        Self {
            translational: Vector3::zeros(),
            rotational: Vector3::zeros(),
        }
    }

    /// Largest absolute residual component.
    #[must_use]
    pub fn max_abs(&self) -> f64 {
        self.translational
            .iter()
            .chain(self.rotational.iter())
            .fold(0.0_f64, |acc, v| acc.max(v.abs()))
    }

    /// Check whether every residual is within `tolerance`.
    #[must_use]
    pub fn is_satisfied(&self, tolerance: f64) -> bool {
        self.max_abs() <= tolerance
    }
}

/// A revolute joint holding a wheel body on the chassis.
///
/// The joint anchor is fixed in the chassis frame at the mount location and
/// the wheel spins about the chassis lateral (Y) axis.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct RevoluteJoint {
    /// Chassis frame at the time the joint was created.
    chassis: Isometry3<f64>,
    /// Anchor in the chassis frame.
    anchor: Point3<f64>,
    /// Rotation axis in the chassis frame (unit vector).
    axis: Vector3<f64>,
}

impl RevoluteJoint {
    /// Create a joint anchored at `anchor` (chassis frame), spinning about
    /// the chassis lateral axis.
    #[must_use]
    pub fn lateral(chassis: Isometry3<f64>, anchor: Point3<f64>) -> Self {
        Self {
            chassis,
            anchor,
            axis: Vector3::y(),
        }
    }

    /// Anchor point in the chassis frame.
    #[must_use]
    pub fn anchor(&self) -> Point3<f64> {
        self.anchor
    }

    /// Anchor point in world coordinates.
    #[must_use]
    pub fn world_anchor(&self) -> Point3<f64> {
        self.chassis.transform_point(&self.anchor)
    }

    /// Rotation axis in world coordinates.
    #[must_use]
    pub fn world_axis(&self) -> Vector3<f64> {
        self.chassis.transform_vector(&self.axis)
    }

    /// Constraint residual for a wheel body at `body` (world pose).
    ///
    /// The wheel origin must sit on the anchor and the wheel's own lateral
    /// axis must stay parallel to the joint axis.
    #[must_use]
    pub fn violation(&self, body: &Isometry3<f64>) -> ConstraintViolation {
        let body_origin = Point3::from(body.translation.vector);
        let body_axis = body.transform_vector(&self.axis);
        ConstraintViolation {
            translational: body_origin - self.world_anchor(),
            rotational: self.world_axis().cross(&body_axis),
        }
    }
}
