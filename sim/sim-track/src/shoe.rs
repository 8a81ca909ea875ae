//! Track shoes: the rigid links of the track chain.

use nalgebra::{Isometry3, Point3, Translation3, UnitQuaternion, Vector3};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Complete kinematic state of a body.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct BodyState {
    /// Position in world coordinates.
    pub position: Point3<f64>,
    /// Orientation in world coordinates.
    pub rotation: UnitQuaternion<f64>,
    /// Linear velocity in world coordinates (m/s).
    pub linear_velocity: Vector3<f64>,
    /// Angular velocity in world coordinates (rad/s).
    pub angular_velocity: Vector3<f64>,
}

impl Default for BodyState {
    fn default() -> Self {
        Self {
            position: Point3::origin(),
            rotation: UnitQuaternion::identity(),
            linear_velocity: Vector3::zeros(),
            angular_velocity: Vector3::zeros(),
        }
    }
}

/// External load on one track shoe for one step.
///
/// Produced by terrain/contact modelling outside this crate.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ShoeForce {
    /// Force in world coordinates (N).
    pub force: Vector3<f64>,
    /// Point of application in world coordinates.
    pub point: Point3<f64>,
    /// Pure moment in world coordinates (Nm).
    pub moment: Vector3<f64>,
}

impl ShoeForce {
    /// Create a shoe load.
    #[must_use]
    pub const fn new(force: Vector3<f64>, point: Point3<f64>, moment: Vector3<f64>) -> Self {
        Self {
            force,
            point,
            moment,
        }
    }

    /// No load.
    #[must_use]
    pub fn zero() -> Self {
        Self {
            force: Vector3::zeros(),
            point: Point3::origin(),
            moment: Vector3::zeros(),
        }
    }
}

impl Default for ShoeForce {
    fn default() -> Self {
        Self::zero()
    }
}

/// Force and torque accumulators of a shoe body.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ForceAccumulator {
    /// Sum of applied forces.
    pub force: Vector3<f64>,
    /// Sum of applied pure torques.
    pub torque: Vector3<f64>,
    /// Sum of the moments of applied forces about the body origin.
    pub force_torque: Vector3<f64>,
}

impl Default for ForceAccumulator {
    fn default() -> Self {
        Self {
            force: Vector3::zeros(),
            torque: Vector3::zeros(),
            force_torque: Vector3::zeros(),
        }
    }
}

impl ForceAccumulator {
    /// Total torque about the body origin.
    #[must_use]
    pub fn total_torque(&self) -> Vector3<f64> {
        self.torque + self.force_torque
    }
}

/// Pin connecting a shoe to its successor in the loop.
///
/// The pin joins this shoe's leading connector, half a pitch along its local
/// +X axis, to the successor's trailing connector, half a pitch along -X.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ShoePin {
    /// Index of the connected shoe.
    pub next: usize,
    /// Anchor on this shoe, local frame.
    pub anchor: Point3<f64>,
    /// Anchor on the connected shoe, local frame.
    pub next_anchor: Point3<f64>,
}

impl ShoePin {
    /// Distance between the two anchors in world coordinates.
    #[must_use]
    pub fn separation(&self, pose: &Isometry3<f64>, next_pose: &Isometry3<f64>) -> f64 {
        (pose.transform_point(&self.anchor) - next_pose.transform_point(&self.next_anchor)).norm()
    }
}

/// A rigid track shoe.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct TrackShoe {
    name: String,
    pitch: f64,
    height: f64,
    index: usize,
    pose: Isometry3<f64>,
    linear_velocity: Vector3<f64>,
    angular_velocity: Vector3<f64>,
    accumulator: ForceAccumulator,
    pin: Option<ShoePin>,
    initialized: bool,
}

impl TrackShoe {
    /// Create a shoe with the given pitch (connector spacing) and height.
    #[must_use]
    pub fn new(name: impl Into<String>, pitch: f64, height: f64) -> Self {
        Self {
            name: name.into(),
            pitch,
            height,
            index: 0,
            pose: Isometry3::identity(),
            linear_velocity: Vector3::zeros(),
            angular_velocity: Vector3::zeros(),
            accumulator: ForceAccumulator::default(),
            pin: None,
            initialized: false,
        }
    }

    /// Create `count` identical shoes named `{prefix}_{i}`.
    #[must_use]
    pub fn uniform(prefix: &str, count: usize, pitch: f64, height: f64) -> Vec<Self> {
        (0..count)
            .map(|i| Self::new(format!("{prefix}_{i}"), pitch, height))
            .collect()
    }

    /// Place the shoe relative to the chassis and record its index.
    ///
    /// Clears any previous connection; the shoe starts at rest.
    pub fn initialize(
        &mut self,
        chassis: &Isometry3<f64>,
        location: &Point3<f64>,
        rotation: &UnitQuaternion<f64>,
        index: usize,
    ) {
        let local = Isometry3::from_parts(Translation3::from(location.coords), *rotation);
        self.pose = chassis * local;
        self.index = index;
        self.linear_velocity = Vector3::zeros();
        self.angular_velocity = Vector3::zeros();
        self.accumulator = ForceAccumulator::default();
        self.pin = None;
        self.initialized = true;
    }

    /// Connect this shoe to its successor in the loop.
    pub fn connect(&mut self, next: usize) {
        let half = 0.5 * self.pitch;
        self.pin = Some(ShoePin {
            next,
            anchor: Point3::new(half, 0.0, 0.0),
            next_anchor: Point3::new(-half, 0.0, 0.0),
        });
    }

    /// Shoe name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Connector spacing.
    #[must_use]
    pub fn pitch(&self) -> f64 {
        self.pitch
    }

    /// Cross-section height.
    #[must_use]
    pub fn height(&self) -> f64 {
        self.height
    }

    /// Index assigned at initialization.
    #[must_use]
    pub fn index(&self) -> usize {
        self.index
    }

    /// Whether the shoe has been given a pose.
    #[must_use]
    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// World pose.
    #[must_use]
    pub fn pose(&self) -> Isometry3<f64> {
        self.pose
    }

    /// World position.
    #[must_use]
    pub fn position(&self) -> Point3<f64> {
        Point3::from(self.pose.translation.vector)
    }

    /// World orientation.
    #[must_use]
    pub fn rotation(&self) -> UnitQuaternion<f64> {
        self.pose.rotation
    }

    /// Linear velocity.
    #[must_use]
    pub fn linear_velocity(&self) -> Vector3<f64> {
        self.linear_velocity
    }

    /// Angular velocity.
    #[must_use]
    pub fn angular_velocity(&self) -> Vector3<f64> {
        self.angular_velocity
    }

    /// Overwrite the kinematic state (e.g. from a solver step).
    pub fn set_state(&mut self, state: &BodyState) {
        self.pose = Isometry3::from_parts(Translation3::from(state.position.coords), state.rotation);
        self.linear_velocity = state.linear_velocity;
        self.angular_velocity = state.angular_velocity;
    }

    /// Pin to the successor shoe, once connected.
    #[must_use]
    pub fn pin(&self) -> Option<&ShoePin> {
        self.pin.as_ref()
    }

    /// Force and torque accumulators.
    #[must_use]
    pub fn accumulator(&self) -> &ForceAccumulator {
        &self.accumulator
    }

    /// Reset the force and torque accumulators.
    pub fn empty_accumulators(&mut self) {
        self.accumulator = ForceAccumulator::default();
    }

    /// Accumulate a world-frame force applied at a world-frame point.
    ///
    /// The force's moment about the shoe origin is accumulated separately
    /// from pure torques.
    pub fn accumulate_force(&mut self, force: &Vector3<f64>, point: &Point3<f64>) {
        let arm = point - self.position();
        self.accumulator.force += force;
        self.accumulator.force_torque += arm.cross(force);
    }

    /// Accumulate a world-frame pure torque.
    pub fn accumulate_torque(&mut self, torque: &Vector3<f64>) {
        self.accumulator.torque += torque;
    }
}
