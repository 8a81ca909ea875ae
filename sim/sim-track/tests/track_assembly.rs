//! Integration tests for track assembly: chain closure, shoe bookkeeping,
//! ring connection and per-step load application.

use std::fmt;
use std::sync::{Arc, Mutex};

use approx::assert_relative_eq;
use nalgebra::{Isometry3, Point3, Translation3, UnitQuaternion, Vector3};
use sim_track::{
    AssemblyConfig, Brake, ClosureOutcome, Idler, ShoeForce, Sprocket, Suspension,
    TrackAssembly, TrackError, TrackShoe, TrackWheel, WrapDirection,
};
use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::layer::{Context, SubscriberExt};
use tracing_subscriber::Layer;

// ============================================================================
// Fixtures
// ============================================================================

const PITCH: f64 = 0.1;
const HEIGHT: f64 = 0.05;

/// Chassis-frame mount points of a track with the sprocket at the front.
struct Mounts {
    sprocket: Point3<f64>,
    idler: Point3<f64>,
    wheels: Vec<Point3<f64>>,
}

fn front_drive() -> Mounts {
    Mounts {
        sprocket: Point3::new(2.0, 0.5, 0.0),
        idler: Point3::new(-2.2, 0.5, 0.0),
        wheels: vec![
            Point3::new(1.2, 0.5, -0.4),
            Point3::new(0.3, 0.5, -0.4),
            Point3::new(-0.6, 0.5, -0.4),
            Point3::new(-1.5, 0.5, -0.4),
        ],
    }
}

/// The same running gear reflected front to back.
fn rear_drive() -> Mounts {
    let flip = |p: &Point3<f64>| Point3::new(-p.x, p.y, p.z);
    let front = front_drive();
    Mounts {
        sprocket: flip(&front.sprocket),
        idler: flip(&front.idler),
        wheels: front.wheels.iter().map(flip).collect(),
    }
}

fn track(num_shoes: usize, num_wheels: usize) -> TrackAssembly {
    let suspensions = (0..num_wheels)
        .map(|i| Suspension::new(format!("wheel_{i}"), 0.25))
        .collect();
    TrackAssembly::new(
        "left",
        Sprocket::new("sprocket", 10, 0.27, 0.25),
        Idler::new("idler", 0.25),
        suspensions,
        Brake::new(5000.0),
        TrackShoe::uniform("shoe", num_shoes, PITCH, HEIGHT),
    )
}

fn tilted_chassis() -> Isometry3<f64> {
    Isometry3::from_parts(
        Translation3::new(12.0, -3.0, 0.8),
        UnitQuaternion::from_euler_angles(0.02, -0.05, 0.7),
    )
}

fn initialized(num_shoes: usize, mounts: &Mounts, chassis: &Isometry3<f64>) -> TrackAssembly {
    let mut track = track(num_shoes, mounts.wheels.len());
    track
        .initialize(chassis, &mounts.sprocket, &mounts.idler, &mounts.wheels)
        .unwrap();
    track
}

/// Layer recording the level and message of every event.
#[derive(Clone, Default)]
struct EventLog(Arc<Mutex<Vec<(Level, String)>>>);

struct MessageVisitor(String);

impl Visit for MessageVisitor {
    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        if field.name() == "message" {
            self.0 = format!("{value:?}");
        }
    }
}

impl<S: Subscriber> Layer<S> for EventLog {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let mut visitor = MessageVisitor(String::new());
        event.record(&mut visitor);
        self.0
            .lock()
            .unwrap()
            .push((*event.metadata().level(), visitor.0));
    }
}

/// Run `f` with an event-recording subscriber installed on this thread.
fn with_event_log<T>(f: impl FnOnce() -> T) -> (T, Vec<(Level, String)>) {
    let log = EventLog::default();
    let subscriber = tracing_subscriber::registry().with(log.clone());
    let result = tracing::subscriber::with_default(subscriber, f);
    let events = log.0.lock().unwrap().clone();
    (result, events)
}

// ============================================================================
// Chain closure
// ============================================================================

#[test]
fn test_ccw_chain_closes() {
    let track = initialized(110, &front_drive(), &Isometry3::identity());

    assert_eq!(track.direction(), Some(WrapDirection::CounterClockwise));
    let chain = track.chain().unwrap();
    assert!(chain.outcome.is_closed());
    assert!(chain.closure_gap() < 1e-9);
    assert!(track.is_loop_closed().unwrap());
}

#[test]
fn test_cw_chain_closes() {
    let track = initialized(110, &rear_drive(), &Isometry3::identity());

    assert_eq!(track.direction(), Some(WrapDirection::Clockwise));
    let chain = track.chain().unwrap();
    assert!(chain.outcome.is_closed());
    assert!(chain.closure_gap() < 1e-9);
    assert!(track.is_loop_closed().unwrap());
}

#[test]
fn test_closure_on_moved_chassis() {
    for mounts in [front_drive(), rear_drive()] {
        for num_shoes in [110, 111, 125, 140] {
            let track = initialized(num_shoes, &mounts, &tilted_chassis());
            let chain = track.chain().unwrap();

            assert!(chain.outcome.is_closed(), "{num_shoes} shoes should close");
            assert!(chain.closure_gap() < 1e-9);

            let worst = track
                .connection_violations()
                .unwrap()
                .iter()
                .map(|c| c.separation)
                .fold(0.0_f64, f64::max);
            assert!(worst < 1e-9, "pin separation {worst} with {num_shoes} shoes");
        }
    }
}

#[test]
fn test_chain_wraps_wheels() {
    let mounts = front_drive();
    let track = initialized(110, &mounts, &Isometry3::identity());

    // Every shoe lies in the wheel plane.
    for shoe in track.track_shoes() {
        assert_relative_eq!(shoe.position().y, 0.5, epsilon = 1e-12);
    }

    // Shoes reach above the sprocket top and below the road wheel bottoms.
    let top = track
        .track_shoes()
        .iter()
        .map(|s| s.position().z)
        .fold(f64::MIN, f64::max);
    let bottom = track
        .track_shoes()
        .iter()
        .map(|s| s.position().z)
        .fold(f64::MAX, f64::min);
    assert!(top > 0.24);
    assert!(bottom < -0.4 - 0.25);
}

#[test]
fn test_closure_halves_are_symmetric() {
    let track = initialized(125, &front_drive(), &Isometry3::identity());
    let chain = track.chain().unwrap();

    let ClosureOutcome::Closed { alpha, beta } = chain.outcome else {
        panic!("chain should close");
    };
    let sign = chain.direction.sign();
    let first_leg = sign * (alpha - beta);
    let second_leg = sign * (alpha + beta);

    let count = |angle: f64| chain.placements.iter().filter(|p| p.angle == angle).count();
    let (n1, n2) = (count(first_leg), count(second_leg));
    assert!(n1 > 0);
    assert_eq!(n1, n2);

    // The closure shoes are the last ones, first leg then second leg.
    let tail = &chain.placements[chain.len() - n1 - n2..];
    assert!(tail[..n1].iter().all(|p| p.angle == first_leg));
    assert!(tail[n1..].iter().all(|p| p.angle == second_leg));
}

#[test]
fn test_parity_correction_adds_horizontal_shoe() {
    // 110 shoes leave an even remainder for the closure, 111 an odd one.
    let even = initialized(110, &front_drive(), &Isometry3::identity());
    let odd = initialized(111, &front_drive(), &Isometry3::identity());

    let horizontal = |track: &TrackAssembly| {
        track
            .chain()
            .unwrap()
            .placements
            .iter()
            .filter(|p| p.angle == 0.0)
            .count()
    };
    let closure_shoes = |track: &TrackAssembly| {
        let chain = track.chain().unwrap();
        let ClosureOutcome::Closed { alpha, beta } = chain.outcome else {
            panic!("chain should close");
        };
        let sign = chain.direction.sign();
        chain
            .placements
            .iter()
            .filter(|p| p.angle == sign * (alpha - beta) || p.angle == sign * (alpha + beta))
            .count()
    };

    assert_eq!(closure_shoes(&even) % 2, 0);
    assert_eq!(closure_shoes(&odd), closure_shoes(&even));
    assert_eq!(horizontal(&odd), horizontal(&even) + 1);
}

#[test]
fn test_mirrored_layouts_mirror_shoes() {
    let ccw = initialized(118, &front_drive(), &Isometry3::identity());
    let cw = initialized(118, &rear_drive(), &Isometry3::identity());

    assert_eq!(ccw.direction(), Some(WrapDirection::CounterClockwise));
    assert_eq!(cw.direction(), Some(WrapDirection::Clockwise));

    let a = &ccw.chain().unwrap().placements;
    let b = &cw.chain().unwrap().placements;
    assert_eq!(a.len(), b.len());
    for (p, q) in a.iter().zip(b) {
        assert_eq!(p.index, q.index);
        assert_relative_eq!(p.position.x, -q.position.x, epsilon = 1e-9);
        assert_relative_eq!(p.position.z, q.position.z, epsilon = 1e-9);
        assert_relative_eq!(p.angle.cos(), q.angle.cos(), epsilon = 1e-9);
        assert_relative_eq!(p.angle.sin(), -q.angle.sin(), epsilon = 1e-9);
    }
}

#[test]
fn test_insufficient_shoes_leave_open_chain() {
    let track = initialized(90, &front_drive(), &Isometry3::identity());

    let Some(ClosureOutcome::Open { missing_distance }) = track.closure() else {
        panic!("chain should stay open");
    };
    assert!(missing_distance > 0.0);

    // Still every shoe placed and connected; the seam pin is stretched.
    assert!(track.track_shoes().iter().all(TrackShoe::is_initialized));
    assert!(!track.is_loop_closed().unwrap());
}

#[test]
fn test_insufficient_shoes_emit_warning() {
    let (track, events) =
        with_event_log(|| initialized(90, &front_drive(), &Isometry3::identity()));

    assert!(!track.closure().unwrap().is_closed());
    assert!(events.iter().any(|(level, message)| *level == Level::WARN
        && message.contains("Insufficient number of track shoes")));
    assert!(!events.iter().any(|(_, message)| message.contains("Track assembly done")));
}

#[test]
fn test_closed_chain_reports_completion() {
    let (track, events) =
        with_event_log(|| initialized(110, &front_drive(), &Isometry3::identity()));

    assert!(track.closure().unwrap().is_closed());
    assert!(events
        .iter()
        .any(|(level, message)| *level == Level::INFO && message.contains("Track assembly done")));
    assert!(events.iter().all(|(level, _)| *level != Level::WARN));
}

// ============================================================================
// Shoe bookkeeping and connection
// ============================================================================

#[test]
fn test_every_shoe_placed_once() {
    for num_shoes in [1, 5, 30, 90, 110, 111] {
        let track = initialized(num_shoes, &front_drive(), &Isometry3::identity());
        let chain = track.chain().unwrap();

        assert_eq!(chain.len(), num_shoes);
        for (i, (placement, shoe)) in chain.placements.iter().zip(track.track_shoes()).enumerate() {
            assert_eq!(placement.index, i);
            assert_eq!(shoe.index(), i);
            assert!(shoe.is_initialized());
        }
    }
}

#[test]
fn test_neighbor_connections() {
    for (mounts, direction) in [
        (front_drive(), WrapDirection::CounterClockwise),
        (rear_drive(), WrapDirection::Clockwise),
    ] {
        let track = initialized(110, &mounts, &Isometry3::identity());
        let n = track.num_track_shoes();

        for (i, shoe) in track.track_shoes().iter().enumerate() {
            let pin = shoe.pin().unwrap();
            let expected = match direction {
                WrapDirection::CounterClockwise => (i + 1) % n,
                WrapDirection::Clockwise => (i + n - 1) % n,
            };
            assert_eq!(pin.next, expected);
        }

        // Every shoe is the successor of exactly one other shoe.
        let mut targets: Vec<usize> = track
            .track_shoes()
            .iter()
            .map(|s| s.pin().unwrap().next)
            .collect();
        targets.sort_unstable();
        assert_eq!(targets, (0..n).collect::<Vec<_>>());
    }
}

#[test]
fn test_reinitialize_is_repeatable() {
    let mounts = front_drive();
    let mut track = initialized(110, &mounts, &Isometry3::identity());
    let first: Vec<Point3<f64>> = track.track_shoes().iter().map(TrackShoe::position).collect();

    track
        .initialize(
            &Isometry3::identity(),
            &mounts.sprocket,
            &mounts.idler,
            &mounts.wheels,
        )
        .unwrap();
    for (shoe, p) in track.track_shoes().iter().zip(&first) {
        assert_relative_eq!(shoe.position(), *p, epsilon = 1e-12);
    }
}

#[test]
fn test_failed_reinitialize_keeps_previous_state() {
    let mounts = front_drive();
    let mut track = initialized(110, &mounts, &Isometry3::identity());
    let sprocket_before = track.sprocket().wheel_position();
    let idler_before = track.idler().wheel_position();
    let shoes_before: Vec<Point3<f64>> =
        track.track_shoes().iter().map(TrackShoe::position).collect();

    let shifted = Isometry3::translation(1.0, 0.0, 0.0);
    let result = track.initialize(
        &shifted,
        &Point3::new(0.0, 0.5, 0.0),
        &Point3::new(0.0, 0.5, 0.3),
        &mounts.wheels,
    );
    assert!(matches!(result, Err(TrackError::DegenerateLayout(_))));

    assert_eq!(track.sprocket().wheel_position(), sprocket_before);
    assert_eq!(track.idler().wheel_position(), idler_before);
    assert_eq!(track.chassis(), Some(&Isometry3::identity()));
    assert_eq!(track.direction(), Some(WrapDirection::CounterClockwise));
    assert!(track.closure().unwrap().is_closed());
    assert!(track.is_loop_closed().unwrap());
    for (shoe, p) in track.track_shoes().iter().zip(&shoes_before) {
        assert_eq!(shoe.position(), *p);
    }
}

#[test]
fn test_reassemble_keeps_ring_connected() {
    for mounts in [front_drive(), rear_drive()] {
        let mut track = initialized(110, &mounts, &Isometry3::identity());
        let before: Vec<Point3<f64>> =
            track.track_shoes().iter().map(TrackShoe::position).collect();

        // Same wheels seen from a translated chassis frame.
        let shifted = Isometry3::translation(0.5, 0.0, -0.2);
        let chain = track.assemble(&shifted).unwrap();
        assert!(chain.outcome.is_closed());
        let outcome = chain.outcome;

        assert_eq!(track.closure(), Some(outcome));
        assert_eq!(track.chassis(), Some(&shifted));
        assert!(track.is_loop_closed().unwrap());
        for (shoe, p) in track.track_shoes().iter().zip(&before) {
            assert_relative_eq!(shoe.position(), *p, epsilon = 1e-9);
        }
    }
}

#[test]
fn test_failed_reassemble_changes_nothing() {
    let mut track = initialized(110, &front_drive(), &Isometry3::identity());
    let outcome = track.closure();

    // Yawed 90 degrees, sprocket and idler share a forward coordinate.
    let yawed = Isometry3::rotation(Vector3::new(0.0, 0.0, std::f64::consts::FRAC_PI_2));
    assert!(matches!(
        track.assemble(&yawed),
        Err(TrackError::DegenerateLayout(_))
    ));

    assert_eq!(track.closure(), outcome);
    assert_eq!(track.chassis(), Some(&Isometry3::identity()));
    assert!(track.is_loop_closed().unwrap());
}

// ============================================================================
// Subsystems
// ============================================================================

#[test]
fn test_subsystems_mounted() {
    let mounts = front_drive();
    let chassis = tilted_chassis();
    let track = initialized(110, &mounts, &chassis);

    assert_relative_eq!(
        track.sprocket().wheel_position(),
        chassis.transform_point(&mounts.sprocket),
        epsilon = 1e-12
    );
    assert_relative_eq!(
        track.idler().wheel_position(),
        chassis.transform_point(&mounts.idler),
        epsilon = 1e-12
    );
    assert_eq!(track.num_suspensions(), 4);
    for (i, mount) in mounts.wheels.iter().enumerate() {
        let suspension = track.suspension(i).unwrap();
        assert_relative_eq!(
            suspension.wheel_position(),
            chassis.transform_point(mount),
            epsilon = 1e-12
        );
    }

    let violations = track.constraint_violations();
    assert_eq!(violations.len(), 6);
    assert_eq!(violations[0].0, "sprocket");
    assert_eq!(violations[1].0, "idler");
    assert!(violations.iter().all(|(_, v)| v.is_satisfied(1e-12)));

    track.log_constraint_violations();
    assert!(track.brake().joint().is_some());
}

#[test]
fn test_single_road_wheel() {
    let mounts = Mounts {
        sprocket: Point3::new(1.0, 0.0, 0.0),
        idler: Point3::new(-1.0, 0.0, 0.0),
        wheels: vec![Point3::new(0.0, 0.0, -0.4)],
    };
    let track = initialized(70, &mounts, &Isometry3::identity());
    assert_eq!(track.chain().unwrap().len(), 70);
    assert!(track.closure().unwrap().is_closed());
    assert!(track.is_loop_closed().unwrap());
}

// ============================================================================
// Update and state queries
// ============================================================================

#[test]
fn test_update_applies_shoe_forces() {
    let mut track = initialized(110, &front_drive(), &tilted_chassis());
    let n = track.num_track_shoes();

    let forces: Vec<ShoeForce> = (0..n)
        .map(|i| {
            let k = i as f64;
            ShoeForce::new(
                Vector3::new(k, -2.0 * k, 100.0 + k),
                track.track_shoe_pos(i).unwrap(),
                Vector3::new(0.5 * k, 1.0, -k),
            )
        })
        .collect();

    // Apply twice: accumulators are cleared between steps.
    track.update(0.0, 0.0, &forces).unwrap();
    track.update(0.01, 0.0, &forces).unwrap();

    for (shoe, load) in track.track_shoes().iter().zip(&forces) {
        let acc = shoe.accumulator();
        assert_eq!(acc.force, load.force);
        assert_eq!(acc.torque, load.moment);
        assert_relative_eq!(acc.force_torque, Vector3::zeros(), epsilon = 1e-9);
    }
}

#[test]
fn test_update_offset_force_produces_torque() {
    let mut track = initialized(110, &front_drive(), &Isometry3::identity());
    let n = track.num_track_shoes();

    let shoe_pos = track.track_shoe_pos(3).unwrap();
    let mut forces = vec![ShoeForce::zero(); n];
    forces[3] = ShoeForce::new(
        Vector3::new(0.0, 0.0, 10.0),
        shoe_pos + Vector3::new(0.05, 0.0, 0.0),
        Vector3::zeros(),
    );
    track.update(0.0, 0.0, &forces).unwrap();

    let acc = track.track_shoe(3).unwrap().accumulator();
    assert_relative_eq!(acc.total_torque(), Vector3::new(0.0, -0.5, 0.0), epsilon = 1e-9);
}

#[test]
fn test_update_forwards_braking() {
    let mut track = initialized(110, &front_drive(), &Isometry3::identity());
    let forces = vec![ShoeForce::zero(); track.num_track_shoes()];

    track.update(0.0, 0.4, &forces).unwrap();
    assert_relative_eq!(track.brake().modulation(), 0.4);
    assert_relative_eq!(track.brake().braking_torque(), 2000.0, epsilon = 1e-9);

    track.update(0.01, 1.5, &forces).unwrap();
    assert_relative_eq!(track.brake().modulation(), 1.0);
}

#[test]
fn test_update_rejects_wrong_force_count() {
    let mut track = initialized(110, &front_drive(), &Isometry3::identity());
    let forces = vec![ShoeForce::zero(); 3];
    assert_eq!(
        track.update(0.0, 0.0, &forces),
        Err(TrackError::ForceCountMismatch {
            expected: 110,
            actual: 3
        })
    );
}

#[test]
fn test_track_shoe_state() {
    let chassis = tilted_chassis();
    let track = initialized(110, &front_drive(), &chassis);

    let state = track.track_shoe_state(17).unwrap();
    let shoe = track.track_shoe(17).unwrap();
    assert_eq!(state.position, shoe.position());
    assert_eq!(state.rotation, shoe.rotation());
    assert_eq!(state.linear_velocity, Vector3::zeros());
    assert_eq!(state.angular_velocity, Vector3::zeros());

    // Shoe orientation: chassis rotation followed by the pitch angle.
    let angle = track.chain().unwrap().placements[17].angle;
    let expected = chassis.rotation * UnitQuaternion::from_axis_angle(&Vector3::y_axis(), angle);
    assert_relative_eq!(state.rotation, expected, epsilon = 1e-12);

    assert_eq!(
        track.track_shoe_state(110),
        Err(TrackError::ShoeIndexOutOfBounds {
            index: 110,
            count: 110
        })
    );
}

// ============================================================================
// Configuration errors
// ============================================================================

#[test]
fn test_mount_count_mismatch() {
    let mounts = front_drive();
    let mut track = track(110, 4);
    let result = track.initialize(
        &Isometry3::identity(),
        &mounts.sprocket,
        &mounts.idler,
        &mounts.wheels[..3],
    );
    assert_eq!(
        result,
        Err(TrackError::MountCountMismatch {
            expected: 4,
            actual: 3
        })
    );
}

#[test]
fn test_coincident_sprocket_and_idler_rejected() {
    let mounts = Mounts {
        sprocket: Point3::new(0.0, 0.5, 0.0),
        idler: Point3::new(0.0, 0.5, 0.2),
        wheels: vec![Point3::new(0.0, 0.5, -0.4)],
    };
    let mut track = track(50, 1);
    let result = track.initialize(
        &Isometry3::identity(),
        &mounts.sprocket,
        &mounts.idler,
        &mounts.wheels,
    );
    assert!(matches!(result, Err(TrackError::DegenerateLayout(_))));
}

#[test]
fn test_no_road_wheels_rejected() {
    let mounts = front_drive();
    let mut track = track(110, 0);
    let result = track.initialize(&Isometry3::identity(), &mounts.sprocket, &mounts.idler, &[]);
    assert_eq!(result, Err(TrackError::NoRoadWheels));
}

#[test]
fn test_mixed_shoes_rejected() {
    let mounts = front_drive();
    let mut shoes = TrackShoe::uniform("shoe", 109, PITCH, HEIGHT);
    shoes.push(TrackShoe::new("odd", 0.12, HEIGHT));

    let mut track = TrackAssembly::new(
        "left",
        Sprocket::new("sprocket", 10, 0.27, 0.25),
        Idler::new("idler", 0.25),
        vec![Suspension::new("wheel", 0.25)],
        Brake::new(5000.0),
        shoes,
    );
    let result = track.initialize(
        &Isometry3::identity(),
        &mounts.sprocket,
        &mounts.idler,
        &mounts.wheels[..1],
    );
    assert!(matches!(result, Err(TrackError::InvalidConfig(_))));
}

#[test]
fn test_invalid_config_rejected() {
    let mounts = front_drive();
    let mut track =
        track(110, 4).with_config(AssemblyConfig::default().with_idler_clearance(-1.0));
    let result = track.initialize(
        &Isometry3::identity(),
        &mounts.sprocket,
        &mounts.idler,
        &mounts.wheels,
    );
    assert!(result.is_err_and(|e| e.is_config_error()));
}

#[test]
fn test_connection_query_before_initialize() {
    let track = track(10, 1);
    assert_eq!(track.connection_violations(), Err(TrackError::NotInitialized));
    assert!(track.closure().is_none());
}
