//! Tracked-vehicle running gear: sprocket, idler, road wheels and track chain.
//!
//! This crate lays a closed chain of rigid track shoes around the running
//! gear of one vehicle track and provides the per-step glue that feeds
//! shoe loads and braking input into it.
//!
//! - [`TrackAssembly`] - Owns the subsystems, initializes and drives the track
//! - [`Sprocket`], [`Idler`], [`Suspension`] - Wheel subsystems on revolute mounts
//! - [`Brake`] - Brake acting on the sprocket axle
//! - [`TrackShoe`] - Rigid chain link with pitch and height
//! - [`WheelLayout`] - Running-gear layout and wrap direction
//! - [`assemble_chain`] - The chain layout procedure
//!
//! # Chain Assembly
//!
//! Given a fixed number of shoes of fixed pitch, the assembly walks around
//! the sprocket, over to the idler, around the idler, down to the road
//! wheels and back under them, placing one shoe per step. The shoes that
//! are left close the loop as two equal legs of an isosceles triangle, so
//! the chain ends exactly where it started. If too few shoes remain, the
//! chain is laid out open and a warning is emitted.
//!
//! # Coordinate System
//!
//! Vehicle convention in the chassis frame:
//!
//! - X: forward
//! - Y: left
//! - Z: up
//!
//! All wheels of one track lie in a plane of constant Y; shoes rotate about
//! the lateral Y axis.
//!
//! # Example
//!
//! ```
//! use sim_track::{Brake, Idler, Sprocket, Suspension, TrackAssembly, TrackShoe};
//! use nalgebra::{Isometry3, Point3};
//!
//! let suspensions = (0..4)
//!     .map(|i| Suspension::new(format!("wheel_{i}"), 0.25))
//!     .collect();
//!
//! let mut track = TrackAssembly::new(
//!     "left",
//!     Sprocket::new("sprocket", 10, 0.27, 0.25),
//!     Idler::new("idler", 0.25),
//!     suspensions,
//!     Brake::new(5000.0),
//!     TrackShoe::uniform("shoe", 110, 0.1, 0.05),
//! );
//!
//! let direction = track
//!     .initialize(
//!         &Isometry3::identity(),
//!         &Point3::new(2.0, 0.5, 0.0),
//!         &Point3::new(-2.2, 0.5, 0.0),
//!         &[
//!             Point3::new(1.2, 0.5, -0.4),
//!             Point3::new(0.3, 0.5, -0.4),
//!             Point3::new(-0.6, 0.5, -0.4),
//!             Point3::new(-1.5, 0.5, -0.4),
//!         ],
//!     )
//!     .unwrap();
//!
//! assert!(direction.is_ccw());
//! assert!(track.closure().is_some_and(|c| c.is_closed()));
//! ```

#![doc(html_root_url = "https://docs.rs/sim-track/0.1.0")]
#![deny(clippy::unwrap_used, clippy::expect_used)]
#![warn(missing_docs)]
#![allow(
    clippy::missing_const_for_fn,
    clippy::cast_precision_loss,      // usize shoe counts to f64 lengths
    clippy::missing_errors_doc,
)]

mod assembly;
mod brake;
mod chain;
mod config;
mod error;
pub mod geometry;
mod joint;
mod layout;
mod shoe;
mod wheel;

pub use assembly::{ConnectionViolation, TrackAssembly};
pub use brake::Brake;
pub use chain::{assemble_chain, ChainBuilder, ChainPlacement, ClosureOutcome, ShoePlacement};
pub use config::AssemblyConfig;
pub use error::{Result, TrackError};
pub use joint::{ConstraintViolation, RevoluteJoint};
pub use layout::{WheelCircle, WheelLayout, WrapDirection};
pub use shoe::{BodyState, ForceAccumulator, ShoeForce, ShoePin, TrackShoe};
pub use wheel::{Idler, Sprocket, Suspension, TrackWheel, WheelBody};
