//! Track chain layout around the running gear.
//!
//! Shoes are laid one at a time, each link starting at the previous link's
//! trailing connector point `p1` and ending at `p2 = p1 + pitch * step(θ)`.
//! The shoe sits at the link midpoint, rotated by `θ` about the lateral axis.
//! The walk visits five regions in order:
//!
//! 1. around the sprocket, starting directly below it
//! 2. straight from the sprocket top over to the idler top
//! 3. around the idler
//! 4. straight from the idler bottom down to the nearest road wheel
//! 5. horizontally under the road wheels back towards the sprocket
//!
//! The shoes that remain close the loop as an isosceles triangle whose two
//! legs end exactly on the first connector point, so the fixed link count
//! and pitch are reconciled with the true loop perimeter at the seam.
//!
//! Both wrap directions use the same formulas, parameterized by the wrap
//! sign; a clockwise layout is laid out as the mirror image of the
//! corresponding counter-clockwise one.

use std::f64::consts::{PI, TAU};

use nalgebra::{Point3, UnitQuaternion};
use tracing::{debug, info, warn};

use crate::geometry::{chord_half_angle, lateral_rotation, link_step, midpoint, planar_angle};
use crate::layout::{WheelLayout, WrapDirection};
use crate::{Result, TrackError};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Pose assigned to one track shoe, in the chassis frame.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ShoePlacement {
    /// Shoe index in traversal order.
    pub index: usize,
    /// Shoe centre (midpoint of its two connector points).
    pub position: Point3<f64>,
    /// Pitch angle about the lateral axis.
    pub angle: f64,
}

impl ShoePlacement {
    /// Shoe orientation.
    #[must_use]
    pub fn rotation(&self) -> UnitQuaternion<f64> {
        lateral_rotation(self.angle)
    }
}

/// How the chain ended at the closure seam.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum ClosureOutcome {
    /// The loop closed with the two-leg triangle fit.
    Closed {
        /// Angle from the last placed connector point to the first one.
        alpha: f64,
        /// Half opening of the triangle at the seam.
        beta: f64,
    },
    /// Not enough shoes to reach the first connector point.
    Open {
        /// Distance the remaining shoes fall short by.
        missing_distance: f64,
    },
}

impl ClosureOutcome {
    /// Check whether the loop closed.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        matches!(self, Self::Closed { .. })
    }
}

/// Result of laying out a track chain.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ChainPlacement {
    /// Wrap direction used.
    pub direction: WrapDirection,
    /// One placement per shoe, in index order.
    pub placements: Vec<ShoePlacement>,
    /// First connector point, directly below the sprocket.
    pub start: Point3<f64>,
    /// Trailing connector point of the last shoe.
    pub end: Point3<f64>,
    /// Closure result.
    pub outcome: ClosureOutcome,
}

impl ChainPlacement {
    /// Distance between the last and first connector points.
    #[must_use]
    pub fn closure_gap(&self) -> f64 {
        (self.end - self.start).norm()
    }

    /// Number of placed shoes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.placements.len()
    }

    /// Check whether no shoe was placed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.placements.is_empty()
    }
}

/// Lay out `num_shoes` links of the given pitch around `layout`.
///
/// # Errors
///
/// Returns [`TrackError::InvalidConfig`] for a non-positive pitch and
/// [`TrackError::DegenerateLayout`] if a link does not fit on the sprocket
/// or idler wrap circle. Running short of shoes is not an error; it yields
/// [`ClosureOutcome::Open`].
pub fn assemble_chain(
    layout: &WheelLayout,
    pitch: f64,
    num_shoes: usize,
) -> Result<ChainPlacement> {
    if !pitch.is_finite() || pitch <= 0.0 {
        return Err(TrackError::invalid_config(
            "track shoe pitch must be finite and positive",
        ));
    }
    let sprocket_half = chord_half_angle(pitch, layout.sprocket.radius).ok_or_else(|| {
        TrackError::degenerate_layout("track shoe pitch exceeds sprocket diameter")
    })?;
    let idler_half = chord_half_angle(pitch, layout.idler.radius).ok_or_else(|| {
        TrackError::degenerate_layout("track shoe pitch exceeds idler diameter")
    })?;

    let mut chain = ChainBuilder::new(layout.direction, pitch, num_shoes, layout.sprocket.bottom());

    chain.wrap_sprocket(sprocket_half);
    debug!(placed = chain.index(), "shoes around sprocket");

    chain.run_to_idler(layout);
    debug!(placed = chain.index(), "shoes up to idler");

    chain.wrap_idler(idler_half);
    debug!(placed = chain.index(), "shoes around idler");

    chain.run_to_road_wheels(layout);
    debug!(placed = chain.index(), "shoes down to road wheels");

    chain.run_under_road_wheels(layout);
    debug!(placed = chain.index(), "shoes under road wheels");

    chain.fix_parity();
    let outcome = chain.close_loop();

    Ok(chain.finish(outcome))
}

/// Sequential chain layout state.
///
/// Tracks the running shoe index, the first and last connector points, the
/// current pitch angle and the placements made so far.
#[derive(Debug, Clone)]
pub struct ChainBuilder {
    direction: WrapDirection,
    sign: f64,
    pitch: f64,
    num_shoes: usize,
    index: usize,
    /// First connector point.
    p0: Point3<f64>,
    /// Trailing connector point of the last placed shoe.
    p1: Point3<f64>,
    /// Candidate next connector point.
    p2: Point3<f64>,
    angle: f64,
    placements: Vec<ShoePlacement>,
}

impl ChainBuilder {
    /// Start a chain of `num_shoes` links at `start`.
    #[must_use]
    pub fn new(direction: WrapDirection, pitch: f64, num_shoes: usize, start: Point3<f64>) -> Self {
        Self {
            direction,
            sign: direction.sign(),
            pitch,
            num_shoes,
            index: 0,
            p0: start,
            p1: start,
            p2: start,
            angle: 0.0,
            placements: Vec::with_capacity(num_shoes),
        }
    }

    /// Number of shoes placed so far.
    #[must_use]
    pub fn index(&self) -> usize {
        self.index
    }

    /// Number of shoes still to place.
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.num_shoes - self.index
    }

    /// Current pitch angle.
    #[must_use]
    pub fn angle(&self) -> f64 {
        self.angle
    }

    /// Trailing connector point of the last placed shoe.
    #[must_use]
    pub fn last_point(&self) -> Point3<f64> {
        self.p1
    }

    /// Placements made so far.
    #[must_use]
    pub fn placements(&self) -> &[ShoePlacement] {
        &self.placements
    }

    /// Place the next shoe at the current angle.
    ///
    /// Returns `false` once every shoe has been placed.
    pub fn place(&mut self) -> bool {
        if self.index >= self.num_shoes {
            return false;
        }
        self.p2 = self.p1 + link_step(self.angle, self.sign, self.pitch);
        self.placements.push(ShoePlacement {
            index: self.index,
            position: midpoint(&self.p1, &self.p2),
            angle: self.angle,
        });
        self.p1 = self.p2;
        self.index += 1;
        true
    }

    /// Set the angle and place the next shoe.
    pub fn place_at(&mut self, angle: f64) -> bool {
        self.angle = angle;
        self.place()
    }

    /// Inscribe links in the sprocket pitch circle until the chain runs
    /// horizontally over the top (|θ| reaches π).
    fn wrap_sprocket(&mut self, half_angle: f64) {
        let delta = self.sign * half_angle;
        self.angle = delta;
        while self.angle.abs() < PI && self.place() {
            self.angle += 2.0 * delta;
        }
    }

    /// Straight run parallel to the line joining the sprocket and idler tops.
    /// Stops half a pitch short of the idler centre.
    fn run_to_idler(&mut self, layout: &WheelLayout) {
        let dz = layout.sprocket.top().z - layout.idler.top().z;
        let dx = layout.sprocket.center.x - layout.idler.center.x;
        self.angle = self.sign * (PI + dz.atan2(-self.sign * dx));

        let idler_x = layout.idler.center.x;
        while self.sign * (idler_x - self.p2.x) > 0.5 * self.pitch && self.place() {}
    }

    /// Inscribe links in the idler circle until the chain runs horizontally
    /// under it (|θ| reaches 2π).
    fn wrap_idler(&mut self, half_angle: f64) {
        let delta = self.sign * half_angle;
        while self.angle.abs() < TAU && self.place() {
            self.angle += 2.0 * delta;
        }
    }

    /// Straight run parallel to the line joining the idler bottom and the
    /// bottom of the nearest road wheel. Stops once past that wheel.
    fn run_to_road_wheels(&mut self, layout: &WheelLayout) {
        let wheel = layout.wheel_on_idler_side();
        let dz = layout.idler.bottom().z - (wheel.z - layout.wheel_radius);
        let dx = layout.idler.center.x - wheel.x;
        self.angle = self.sign * (TAU - dz.atan2(self.sign * dx));

        while self.sign * (self.p2.x - wheel.x) > 0.0 && self.place() {}
    }

    /// Horizontal run under the road wheels. Stops once past the road wheel
    /// on the sprocket side.
    fn run_under_road_wheels(&mut self, layout: &WheelLayout) {
        let wheel = layout.wheel_on_sprocket_side();
        self.angle = if self.direction.is_ccw() { 0.0 } else { TAU };

        while self.sign * (self.p2.x - wheel.x) > 0.0 && self.place() {}
    }

    /// Add one shoe at the current angle if an odd number remain, so the
    /// closure triangle gets two legs of equal length.
    fn fix_parity(&mut self) {
        if self.remaining() % 2 == 1 {
            self.place();
        }
    }

    /// Close the loop with the remaining shoes.
    ///
    /// If the remaining links cannot span the gap back to the first
    /// connector point they are laid out straight at the current angle and
    /// the chain stays open. Otherwise the first half of them is placed at
    /// `sign * (α - β)` and the second half at `sign * (α + β)`, which ends
    /// exactly on the first connector point.
    pub fn close_loop(&mut self) -> ClosureOutcome {
        let num_left = self.remaining();
        let gap = (self.p0 - self.p1).norm();
        let reach = num_left as f64 * self.pitch;

        if reach < gap {
            let missing_distance = gap - reach;
            warn!(
                missing_distance,
                remaining = num_left,
                "Insufficient number of track shoes for this configuration"
            );
            while self.place() {}
            return ClosureOutcome::Open { missing_distance };
        }

        let alpha = planar_angle(&self.p1, &self.p0, self.sign);
        let beta = if num_left == 0 { 0.0 } else { (gap / reach).acos() };

        let half = num_left / 2;
        let (first, second) = (self.sign * (alpha - beta), self.sign * (alpha + beta));
        for i in 0..num_left {
            self.place_at(if i < half { first } else { second });
        }

        info!(
            num_shoes = self.index,
            direction = %self.direction,
            "Track assembly done"
        );
        ClosureOutcome::Closed { alpha, beta }
    }

    /// Consume the builder.
    #[must_use]
    pub fn finish(self, outcome: ClosureOutcome) -> ChainPlacement {
        ChainPlacement {
            direction: self.direction,
            placements: self.placements,
            start: self.p0,
            end: self.p1,
            outcome,
        }
    }
}
