//! Track brake acting on the sprocket axle.

use crate::joint::RevoluteJoint;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// A simple brake that applies a torque proportional to the driver input.
///
/// The brake resists rotation of the joint it is attached to. The braking
/// input (modulation) is clamped to `[0, 1]`; full modulation produces
/// `max_torque`.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Brake {
    /// Maximum braking torque (Nm).
    max_torque: f64,
    /// Current modulation in `[0, 1]`.
    modulation: f64,
    /// Joint the brake acts on.
    joint: Option<RevoluteJoint>,
}

impl Brake {
    /// Create a brake with the given maximum torque.
    #[must_use]
    pub fn new(max_torque: f64) -> Self {
        Self {
            max_torque: max_torque.abs(),
            modulation: 0.0,
            joint: None,
        }
    }

    /// Attach the brake to a revolute joint.
    pub fn initialize(&mut self, joint: &RevoluteJoint) {
        self.joint = Some(joint.clone());
        self.modulation = 0.0;
    }

    /// Set the braking input for the current step.
    pub fn update(&mut self, modulation: f64) {
        self.modulation = if modulation.is_finite() {
            modulation.clamp(0.0, 1.0)
        } else {
            0.0
        };
    }

    /// Current modulation.
    #[must_use]
    pub fn modulation(&self) -> f64 {
        self.modulation
    }

    /// Maximum braking torque.
    #[must_use]
    pub fn max_torque(&self) -> f64 {
        self.max_torque
    }

    /// Magnitude of the braking torque for the current modulation.
    ///
    /// Zero until the brake is attached to a joint.
    #[must_use]
    pub fn braking_torque(&self) -> f64 {
        if self.joint.is_some() {
            self.modulation * self.max_torque
        } else {
            0.0
        }
    }

    /// Joint the brake acts on.
    #[must_use]
    pub fn joint(&self) -> Option<&RevoluteJoint> {
        self.joint.as_ref()
    }
}
