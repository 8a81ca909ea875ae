//! Track assembly: sprocket, idler, suspensions, brake and the shoe chain.
//!
//! The assembly owns every subsystem of one track. It mounts the wheels on
//! the chassis, lays the shoes around them, connects the shoes into a ring,
//! and then forwards per-step shoe loads and braking input.
//!
//! Chassis frame convention: X forward, Y left, Z up. Sprocket, idler and
//! road wheels are assumed to lie in one vertical (x, z) plane of the
//! chassis frame.

use nalgebra::{Isometry3, Point3, UnitQuaternion, Vector3};
use tracing::info;

use crate::brake::Brake;
use crate::chain::{assemble_chain, ChainPlacement, ClosureOutcome};
use crate::config::AssemblyConfig;
use crate::joint::ConstraintViolation;
use crate::layout::{WheelCircle, WheelLayout, WrapDirection};
use crate::shoe::{BodyState, ShoeForce, TrackShoe};
use crate::wheel::{Idler, Sprocket, Suspension, TrackWheel};
use crate::{Result, TrackError};

/// Pin residual between a shoe and its successor.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConnectionViolation {
    /// Shoe index.
    pub shoe: usize,
    /// Successor index.
    pub next: usize,
    /// World distance between the two pin anchors.
    pub separation: f64,
}

/// One track of a tracked vehicle.
#[derive(Debug, Clone)]
pub struct TrackAssembly {
    name: String,
    config: AssemblyConfig,
    sprocket: Sprocket,
    idler: Idler,
    suspensions: Vec<Suspension>,
    brake: Brake,
    shoes: Vec<TrackShoe>,
    chassis: Option<Isometry3<f64>>,
    chain: Option<ChainPlacement>,
}

impl TrackAssembly {
    /// Create a track assembly from its subsystems.
    ///
    /// The shoes must be registered up front; their count is fixed.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        sprocket: Sprocket,
        idler: Idler,
        suspensions: Vec<Suspension>,
        brake: Brake,
        shoes: Vec<TrackShoe>,
    ) -> Self {
        Self {
            name: name.into(),
            config: AssemblyConfig::default(),
            sprocket,
            idler,
            suspensions,
            brake,
            shoes,
            chassis: None,
            chain: None,
        }
    }

    /// Set the assembly configuration.
    #[must_use]
    pub fn with_config(mut self, config: AssemblyConfig) -> Self {
        self.config = config;
        self
    }

    /// Initialize the track on the chassis.
    ///
    /// Mounts the sprocket, idler and suspensions at their chassis-frame
    /// locations, attaches the brake to the sprocket axle, lays out the
    /// shoes and connects each shoe to its successor: the next shoe for
    /// counter-clockwise wrapping, the previous one for clockwise wrapping.
    ///
    /// The layout is computed before anything is committed. On error the
    /// assembly keeps its previous wheels, shoes and chain.
    ///
    /// Too few shoes to close the loop is reported through
    /// [`TrackAssembly::closure`], not as an error.
    ///
    /// # Errors
    ///
    /// Configuration errors, a mount count that does not match the
    /// suspensions, or a degenerate wheel layout.
    pub fn initialize(
        &mut self,
        chassis: &Isometry3<f64>,
        sprocket_location: &Point3<f64>,
        idler_location: &Point3<f64>,
        suspension_locations: &[Point3<f64>],
    ) -> Result<WrapDirection> {
        self.config.validate()?;
        let (pitch, height) = self.check_shoes()?;
        if suspension_locations.len() != self.suspensions.len() {
            return Err(TrackError::MountCountMismatch {
                expected: self.suspensions.len(),
                actual: suspension_locations.len(),
            });
        }

        let mut sprocket = self.sprocket.clone();
        sprocket.initialize(chassis, sprocket_location);
        let mut idler = self.idler.clone();
        idler.initialize(chassis, idler_location);
        let mut suspensions = self.suspensions.clone();
        for (suspension, location) in suspensions.iter_mut().zip(suspension_locations) {
            suspension.initialize(chassis, location);
        }

        let layout = wheel_layout(&self.config, &sprocket, &idler, &suspensions, chassis, height)?;
        let chain = assemble_chain(&layout, pitch, self.shoes.len())?;

        self.sprocket = sprocket;
        self.idler = idler;
        self.suspensions = suspensions;
        if let Some(joint) = self.sprocket.revolute() {
            self.brake.initialize(joint);
        }

        Ok(self.lay_chain(chassis, chain).direction)
    }

    /// Re-run the chain layout around the wheels as currently mounted.
    ///
    /// Assigns every shoe its pose relative to `chassis`, reconnects the
    /// ring and records the new chain. On error nothing is changed.
    ///
    /// # Errors
    ///
    /// Returns an error for an empty or non-uniform shoe set or a degenerate
    /// wheel layout.
    pub fn assemble(&mut self, chassis: &Isometry3<f64>) -> Result<&ChainPlacement> {
        let (pitch, height) = self.check_shoes()?;
        let layout = self.resolve_layout(chassis, height)?;
        let chain = assemble_chain(&layout, pitch, self.shoes.len())?;
        Ok(self.lay_chain(chassis, chain))
    }

    /// Resolve the wheel layout in the chassis frame.
    ///
    /// # Errors
    ///
    /// See [`WheelLayout::resolve`].
    pub fn resolve_layout(&self, chassis: &Isometry3<f64>, shoe_height: f64) -> Result<WheelLayout> {
        wheel_layout(
            &self.config,
            &self.sprocket,
            &self.idler,
            &self.suspensions,
            chassis,
            shoe_height,
        )
    }

    /// Pose the shoes from a computed chain, connect the ring and record
    /// the chain and chassis.
    fn lay_chain(&mut self, chassis: &Isometry3<f64>, chain: ChainPlacement) -> &ChainPlacement {
        for (shoe, placement) in self.shoes.iter_mut().zip(&chain.placements) {
            shoe.initialize(
                chassis,
                &placement.position,
                &placement.rotation(),
                placement.index,
            );
        }

        let num_shoes = self.shoes.len();
        for (i, shoe) in self.shoes.iter_mut().enumerate() {
            let next = match chain.direction {
                WrapDirection::CounterClockwise => (i + 1) % num_shoes,
                WrapDirection::Clockwise => (i + num_shoes - 1) % num_shoes,
            };
            shoe.connect(next);
        }

        self.chassis = Some(*chassis);
        self.chain.insert(chain)
    }

    /// Apply this step's shoe loads and braking input.
    ///
    /// Each shoe's accumulators are cleared before its load is applied.
    ///
    /// # Errors
    ///
    /// Returns [`TrackError::ForceCountMismatch`] unless exactly one load
    /// per shoe is supplied.
    pub fn update(&mut self, _time: f64, braking: f64, shoe_forces: &[ShoeForce]) -> Result<()> {
        if shoe_forces.len() != self.shoes.len() {
            return Err(TrackError::ForceCountMismatch {
                expected: self.shoes.len(),
                actual: shoe_forces.len(),
            });
        }

        for (shoe, load) in self.shoes.iter_mut().zip(shoe_forces) {
            shoe.empty_accumulators();
            shoe.accumulate_force(&load.force, &load.point);
            shoe.accumulate_torque(&load.moment);
        }

        self.brake.update(braking);
        Ok(())
    }

    /// Complete state of the given shoe.
    ///
    /// # Errors
    ///
    /// Returns [`TrackError::ShoeIndexOutOfBounds`] for an invalid index.
    pub fn track_shoe_state(&self, id: usize) -> Result<BodyState> {
        Ok(BodyState {
            position: self.track_shoe_pos(id)?,
            rotation: self.track_shoe_rot(id)?,
            linear_velocity: self.track_shoe_lin_vel(id)?,
            angular_velocity: self.track_shoe_ang_vel(id)?,
        })
    }

    /// World position of the given shoe.
    pub fn track_shoe_pos(&self, id: usize) -> Result<Point3<f64>> {
        self.track_shoe(id).map(TrackShoe::position)
    }

    /// World orientation of the given shoe.
    pub fn track_shoe_rot(&self, id: usize) -> Result<UnitQuaternion<f64>> {
        self.track_shoe(id).map(TrackShoe::rotation)
    }

    /// Linear velocity of the given shoe.
    pub fn track_shoe_lin_vel(&self, id: usize) -> Result<Vector3<f64>> {
        self.track_shoe(id).map(TrackShoe::linear_velocity)
    }

    /// Angular velocity of the given shoe.
    pub fn track_shoe_ang_vel(&self, id: usize) -> Result<Vector3<f64>> {
        self.track_shoe(id).map(TrackShoe::angular_velocity)
    }

    /// Joint residuals of the sprocket, idler and each suspension, in that
    /// order.
    #[must_use]
    pub fn constraint_violations(&self) -> Vec<(String, ConstraintViolation)> {
        self.wheels()
            .map(|wheel| (wheel.name().to_string(), wheel.constraint_violation()))
            .collect()
    }

    /// Log the joint residuals of every wheel subsystem.
    pub fn log_constraint_violations(&self) {
        let report = |label: &str, wheel: &dyn TrackWheel| {
            let violation = wheel.constraint_violation();
            info!(
                track = %self.name,
                subsystem = label,
                name = wheel.name(),
                translational = ?violation.translational,
                rotational = ?violation.rotational,
                "constraint violations"
            );
        };

        report("SPROCKET", &self.sprocket);
        report("IDLER", &self.idler);
        for (i, suspension) in self.suspensions.iter().enumerate() {
            report(&format!("SUSPENSION #{i}"), suspension);
        }
    }

    /// Pin residual between each shoe and its successor.
    ///
    /// # Errors
    ///
    /// Returns [`TrackError::NotInitialized`] before the shoes are connected.
    pub fn connection_violations(&self) -> Result<Vec<ConnectionViolation>> {
        self.shoes
            .iter()
            .enumerate()
            .map(|(i, shoe)| {
                let pin = shoe.pin().ok_or(TrackError::NotInitialized)?;
                let next = self.track_shoe(pin.next)?;
                Ok(ConnectionViolation {
                    shoe: i,
                    next: pin.next,
                    separation: pin.separation(&shoe.pose(), &next.pose()),
                })
            })
            .collect()
    }

    /// Check whether every pin joins coincident connector points, within
    /// the configured tolerance.
    ///
    /// # Errors
    ///
    /// Returns [`TrackError::NotInitialized`] before the shoes are connected.
    pub fn is_loop_closed(&self) -> Result<bool> {
        let tolerance = self.config.connection_tolerance;
        Ok(self
            .connection_violations()?
            .iter()
            .all(|c| c.separation <= tolerance))
    }

    /// Track name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Assembly configuration.
    #[must_use]
    pub fn config(&self) -> &AssemblyConfig {
        &self.config
    }

    /// Number of track shoes.
    #[must_use]
    pub fn num_track_shoes(&self) -> usize {
        self.shoes.len()
    }

    /// The given track shoe.
    ///
    /// # Errors
    ///
    /// Returns [`TrackError::ShoeIndexOutOfBounds`] for an invalid index.
    pub fn track_shoe(&self, id: usize) -> Result<&TrackShoe> {
        self.shoes
            .get(id)
            .ok_or_else(|| TrackError::shoe_out_of_bounds(id, self.shoes.len()))
    }

    /// All track shoes, in index order.
    #[must_use]
    pub fn track_shoes(&self) -> &[TrackShoe] {
        &self.shoes
    }

    /// The sprocket.
    #[must_use]
    pub fn sprocket(&self) -> &Sprocket {
        &self.sprocket
    }

    /// The idler.
    #[must_use]
    pub fn idler(&self) -> &Idler {
        &self.idler
    }

    /// Number of road-wheel suspensions.
    #[must_use]
    pub fn num_suspensions(&self) -> usize {
        self.suspensions.len()
    }

    /// The given suspension.
    #[must_use]
    pub fn suspension(&self, id: usize) -> Option<&Suspension> {
        self.suspensions.get(id)
    }

    /// The brake.
    #[must_use]
    pub fn brake(&self) -> &Brake {
        &self.brake
    }

    /// Chassis frame used at initialization.
    #[must_use]
    pub fn chassis(&self) -> Option<&Isometry3<f64>> {
        self.chassis.as_ref()
    }

    /// Chain layout from the last initialization.
    #[must_use]
    pub fn chain(&self) -> Option<&ChainPlacement> {
        self.chain.as_ref()
    }

    /// Wrap direction from the last initialization.
    #[must_use]
    pub fn direction(&self) -> Option<WrapDirection> {
        self.chain.as_ref().map(|c| c.direction)
    }

    /// Closure result from the last initialization.
    #[must_use]
    pub fn closure(&self) -> Option<ClosureOutcome> {
        self.chain.as_ref().map(|c| c.outcome)
    }

    fn wheels(&self) -> impl Iterator<Item = &dyn TrackWheel> {
        std::iter::once(&self.sprocket as &dyn TrackWheel)
            .chain(std::iter::once(&self.idler as &dyn TrackWheel))
            .chain(self.suspensions.iter().map(|s| s as &dyn TrackWheel))
    }

    /// Shared pitch and height of the registered shoes.
    fn check_shoes(&self) -> Result<(f64, f64)> {
        let first = self
            .shoes
            .first()
            .ok_or_else(|| TrackError::invalid_config("track assembly has no track shoes"))?;
        let (pitch, height) = (first.pitch(), first.height());

        if !height.is_finite() || height < 0.0 {
            return Err(TrackError::invalid_config(
                "track shoe height must be finite and non-negative",
            ));
        }
        if self
            .shoes
            .iter()
            .any(|s| s.pitch() != pitch || s.height() != height)
        {
            return Err(TrackError::invalid_config(
                "all track shoes must share the same pitch and height",
            ));
        }

        Ok((pitch, height))
    }
}

/// Wheel layout in the chassis frame from mounted wheel subsystems.
fn wheel_layout(
    config: &AssemblyConfig,
    sprocket: &Sprocket,
    idler: &Idler,
    suspensions: &[Suspension],
    chassis: &Isometry3<f64>,
    shoe_height: f64,
) -> Result<WheelLayout> {
    let to_local = |p: Point3<f64>| chassis.inverse_transform_point(&p);

    let sprocket_circle = WheelCircle::new(
        to_local(sprocket.wheel_position()),
        sprocket.assembly_radius(),
    );
    let idler_circle = WheelCircle::new(
        to_local(idler.wheel_position()),
        config.idler_wrap_radius(idler.wheel_radius(), shoe_height),
    );
    let road_wheels: Vec<Point3<f64>> = suspensions
        .iter()
        .map(|s| to_local(s.wheel_position()))
        .collect();
    let wheel_radius = suspensions.first().map_or(0.0, |s| s.wheel_radius());

    WheelLayout::resolve(
        sprocket_circle,
        idler_circle,
        &road_wheels,
        config.wheel_wrap_radius(wheel_radius, shoe_height),
        config.min_wheel_separation,
    )
}
