//! Running-gear wheel subsystems: sprocket, idler and road-wheel suspensions.
//!
//! Each subsystem owns one wheel body held on the chassis by a
//! [`RevoluteJoint`]. The track assembly only reads wheel positions and
//! radii from them; their dynamics belong to the multibody solver.

use nalgebra::{Isometry3, Point3, Translation3, Vector3};

use crate::joint::{ConstraintViolation, RevoluteJoint};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Common interface of wheel subsystems wrapped by the track.
pub trait TrackWheel {
    /// Subsystem name, used in diagnostics.
    fn name(&self) -> &str;

    /// Mount the wheel on the chassis at `location` (chassis frame).
    fn initialize(&mut self, chassis: &Isometry3<f64>, location: &Point3<f64>);

    /// Wheel body pose in world coordinates.
    fn wheel_pose(&self) -> Isometry3<f64>;

    /// Wheel body position in world coordinates.
    fn wheel_position(&self) -> Point3<f64> {
        Point3::from(self.wheel_pose().translation.vector)
    }

    /// Physical wheel radius.
    fn wheel_radius(&self) -> f64;

    /// The wheel's revolute joint, once initialized.
    fn revolute(&self) -> Option<&RevoluteJoint>;

    /// Residual of the wheel's revolute joint.
    ///
    /// An uninitialized wheel reports no violation.
    fn constraint_violation(&self) -> ConstraintViolation {
        self.revolute()
            .map(|joint| joint.violation(&self.wheel_pose()))
            .unwrap_or_default()
    }
}

/// A wheel body and its chassis mount.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct WheelBody {
    /// World pose of the wheel.
    pose: Isometry3<f64>,
    /// Mount joint, set by `mount`.
    joint: Option<RevoluteJoint>,
}

impl Default for WheelBody {
    fn default() -> Self {
        Self {
            pose: Isometry3::identity(),
            joint: None,
        }
    }
}

impl WheelBody {
    /// Place the wheel at `chassis_point` (chassis frame) and create its mount.
    pub fn mount(&mut self, chassis: &Isometry3<f64>, chassis_point: &Point3<f64>) {
        self.pose = Isometry3::from_parts(
            Translation3::from(chassis.transform_point(chassis_point).coords),
            chassis.rotation,
        );
        self.joint = Some(RevoluteJoint::lateral(*chassis, *chassis_point));
    }

    /// World pose of the wheel.
    #[must_use]
    pub fn pose(&self) -> Isometry3<f64> {
        self.pose
    }

    /// Overwrite the wheel pose (e.g. from a solver step).
    pub fn set_pose(&mut self, pose: Isometry3<f64>) {
        self.pose = pose;
    }

    /// Mount joint.
    #[must_use]
    pub fn joint(&self) -> Option<&RevoluteJoint> {
        self.joint.as_ref()
    }
}

// ============================================================================
// Sprocket
// ============================================================================

/// Drive sprocket.
///
/// The chain wraps the sprocket on its pitch circle, the assembly radius,
/// rather than on the outer gear radius.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Sprocket {
    name: String,
    num_teeth: usize,
    gear_radius: f64,
    assembly_radius: f64,
    gear: WheelBody,
}

impl Sprocket {
    /// Create a sprocket.
    ///
    /// # Arguments
    ///
    /// * `name` - Subsystem name
    /// * `num_teeth` - Number of gear teeth
    /// * `gear_radius` - Outer gear radius
    /// * `assembly_radius` - Pitch-circle radius the chain wraps around
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        num_teeth: usize,
        gear_radius: f64,
        assembly_radius: f64,
    ) -> Self {
        Self {
            name: name.into(),
            num_teeth,
            gear_radius,
            assembly_radius,
            gear: WheelBody::default(),
        }
    }

    /// Number of gear teeth.
    #[must_use]
    pub fn num_teeth(&self) -> usize {
        self.num_teeth
    }

    /// Pitch-circle radius used to lay out the chain.
    #[must_use]
    pub fn assembly_radius(&self) -> f64 {
        self.assembly_radius
    }

    /// The gear body.
    #[must_use]
    pub fn gear_body(&self) -> &WheelBody {
        &self.gear
    }

    /// Mutable access to the gear body.
    pub fn gear_body_mut(&mut self) -> &mut WheelBody {
        &mut self.gear
    }
}

impl TrackWheel for Sprocket {
    fn name(&self) -> &str {
        &self.name
    }

    fn initialize(&mut self, chassis: &Isometry3<f64>, location: &Point3<f64>) {
        self.gear.mount(chassis, location);
    }

    fn wheel_pose(&self) -> Isometry3<f64> {
        self.gear.pose()
    }

    fn wheel_radius(&self) -> f64 {
        self.gear_radius
    }

    fn revolute(&self) -> Option<&RevoluteJoint> {
        self.gear.joint()
    }
}

// ============================================================================
// Idler
// ============================================================================

/// Idler wheel at the opposite end of the track from the sprocket.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Idler {
    name: String,
    wheel_radius: f64,
    wheel: WheelBody,
}

impl Idler {
    /// Create an idler with the given wheel radius.
    #[must_use]
    pub fn new(name: impl Into<String>, wheel_radius: f64) -> Self {
        Self {
            name: name.into(),
            wheel_radius,
            wheel: WheelBody::default(),
        }
    }

    /// The idler wheel body.
    #[must_use]
    pub fn wheel_body(&self) -> &WheelBody {
        &self.wheel
    }

    /// Mutable access to the idler wheel body.
    pub fn wheel_body_mut(&mut self) -> &mut WheelBody {
        &mut self.wheel
    }
}

impl TrackWheel for Idler {
    fn name(&self) -> &str {
        &self.name
    }

    fn initialize(&mut self, chassis: &Isometry3<f64>, location: &Point3<f64>) {
        self.wheel.mount(chassis, location);
    }

    fn wheel_pose(&self) -> Isometry3<f64> {
        self.wheel.pose()
    }

    fn wheel_radius(&self) -> f64 {
        self.wheel_radius
    }

    fn revolute(&self) -> Option<&RevoluteJoint> {
        self.wheel.joint()
    }
}

// ============================================================================
// Suspension
// ============================================================================

/// Road-wheel suspension.
///
/// The road wheel sits at a fixed offset from the suspension mount point,
/// e.g. below it at the end of a trailing arm in its static position.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Suspension {
    name: String,
    wheel_radius: f64,
    wheel_offset: Vector3<f64>,
    wheel: WheelBody,
}

impl Suspension {
    /// Create a suspension whose wheel sits on the mount point.
    #[must_use]
    pub fn new(name: impl Into<String>, wheel_radius: f64) -> Self {
        Self {
            name: name.into(),
            wheel_radius,
            wheel_offset: Vector3::zeros(),
            wheel: WheelBody::default(),
        }
    }

    /// Set the wheel offset from the mount point (chassis frame).
    #[must_use]
    pub fn with_wheel_offset(mut self, offset: Vector3<f64>) -> Self {
        self.wheel_offset = offset;
        self
    }

    /// Wheel offset from the mount point.
    #[must_use]
    pub fn wheel_offset(&self) -> Vector3<f64> {
        self.wheel_offset
    }

    /// The road wheel body.
    #[must_use]
    pub fn wheel_body(&self) -> &WheelBody {
        &self.wheel
    }

    /// Mutable access to the road wheel body.
    pub fn wheel_body_mut(&mut self) -> &mut WheelBody {
        &mut self.wheel
    }
}

impl TrackWheel for Suspension {
    fn name(&self) -> &str {
        &self.name
    }

    fn initialize(&mut self, chassis: &Isometry3<f64>, location: &Point3<f64>) {
        self.wheel.mount(chassis, &(location + self.wheel_offset));
    }

    fn wheel_pose(&self) -> Isometry3<f64> {
        self.wheel.pose()
    }

    fn wheel_radius(&self) -> f64 {
        self.wheel_radius
    }

    fn revolute(&self) -> Option<&RevoluteJoint> {
        self.wheel.joint()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use nalgebra::UnitQuaternion;

    fn spun(chassis_rotation: &UnitQuaternion<f64>, angle: f64) -> UnitQuaternion<f64> {
        chassis_rotation * UnitQuaternion::from_axis_angle(&Vector3::y_axis(), angle)
    }

    fn chassis() -> Isometry3<f64> {
        Isometry3::from_parts(
            Translation3::new(10.0, 0.0, 1.0),
            UnitQuaternion::from_euler_angles(0.0, 0.0, 0.5),
        )
    }

    #[test]
    fn test_sprocket_initialize() {
        let mut sprocket = Sprocket::new("sprocket", 10, 0.3, 0.25);
        assert!(sprocket.revolute().is_none());

        sprocket.initialize(&chassis(), &Point3::new(2.0, 0.5, 0.0));

        let expected = chassis().transform_point(&Point3::new(2.0, 0.5, 0.0));
        assert_relative_eq!(sprocket.wheel_position(), expected, epsilon = 1e-12);
        assert_relative_eq!(sprocket.assembly_radius(), 0.25, epsilon = 1e-12);
        assert_relative_eq!(sprocket.wheel_radius(), 0.3, epsilon = 1e-12);
        assert_eq!(sprocket.num_teeth(), 10);
        assert_eq!(sprocket.gear_body().pose(), sprocket.wheel_pose());
        assert!(sprocket.constraint_violation().is_satisfied(1e-12));
    }

    #[test]
    fn test_suspension_wheel_offset() {
        let mut suspension =
            Suspension::new("wheel", 0.25).with_wheel_offset(Vector3::new(0.0, 0.0, -0.3));
        suspension.initialize(&Isometry3::identity(), &Point3::new(1.0, 0.5, 0.0));
        assert_relative_eq!(suspension.wheel_offset().z, -0.3);

        assert_relative_eq!(
            suspension.wheel_position(),
            Point3::new(1.0, 0.5, -0.3),
            epsilon = 1e-12
        );
        assert!(suspension.constraint_violation().is_satisfied(1e-12));
    }

    #[test]
    fn test_spinning_wheel_keeps_constraint() {
        let mut idler = Idler::new("idler", 0.3);
        idler.initialize(&chassis(), &Point3::new(-2.0, 0.5, 0.0));

        let pose = idler.wheel_pose();
        idler
            .wheel_body_mut()
            .set_pose(Isometry3::from_parts(pose.translation, spun(&pose.rotation, 0.8)));
        assert!(idler.constraint_violation().is_satisfied(1e-12));
    }

    #[test]
    fn test_displaced_wheel_violates_constraint() {
        let mut idler = Idler::new("idler", 0.3);
        idler.initialize(&Isometry3::identity(), &Point3::new(-2.0, 0.5, 0.0));

        let mut pose = idler.wheel_pose();
        pose.translation.vector.z += 0.02;
        idler.wheel_body_mut().set_pose(pose);

        let violation = idler.constraint_violation();
        assert_relative_eq!(violation.translational.z, 0.02, epsilon = 1e-12);
    }
}
