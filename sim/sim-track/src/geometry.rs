//! Planar geometry in the chassis (x, z) plane.
//!
//! The chassis frame follows the vehicle convention: X forward, Y to the
//! left, Z up. All running-gear wheels are assumed to lie in a plane of
//! constant Y, so the chain is laid out in (x, z) and every shoe rotates
//! about the lateral Y axis.

use nalgebra::{Point3, UnitQuaternion, Vector3};

/// Displacement of one track link with pitch angle `angle`.
///
/// `sign` is the wrap sign: -1 for counter-clockwise, +1 for clockwise
/// wrapping. The same angle describes mirrored links in the two directions.
#[must_use]
pub fn link_step(angle: f64, sign: f64, pitch: f64) -> Vector3<f64> {
    Vector3::new(-sign * angle.cos(), 0.0, sign * angle.sin()) * pitch
}

/// Rotation about the lateral (Y) axis.
#[must_use]
pub fn lateral_rotation(angle: f64) -> UnitQuaternion<f64> {
    UnitQuaternion::from_axis_angle(&Vector3::y_axis(), angle)
}

/// Midpoint of two points.
#[must_use]
pub fn midpoint(a: &Point3<f64>, b: &Point3<f64>) -> Point3<f64> {
    Point3::from((a.coords + b.coords) * 0.5)
}

/// Angle in the (x, z) plane of the segment `from -> to`, measured in the
/// wrap frame.
///
/// For counter-clockwise wrapping this is `atan2(dz, dx)`; clockwise wrapping
/// mirrors the forward axis.
#[must_use]
pub fn planar_angle(from: &Point3<f64>, to: &Point3<f64>, sign: f64) -> f64 {
    (to.z - from.z).atan2(-sign * (to.x - from.x))
}

/// Half-angle subtended by a chord of length `pitch` on a circle of `radius`.
///
/// Returns `None` if the chord does not fit in the circle.
#[must_use]
pub fn chord_half_angle(pitch: f64, radius: f64) -> Option<f64> {
    let ratio = pitch / (2.0 * radius);
    (radius > 0.0 && ratio <= 1.0).then(|| ratio.asin())
}
