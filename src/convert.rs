//! Game ↔ engine unit and axis conversions.
//!
//! The game side measures distances in inches, angles in degrees and uses a
//! Z-up right-handed frame. The engine side uses meters, radians and a Y-up
//! right-handed frame. The axis remap is the proper rotation
//! `engine = (x, z, -y)` (a -90° turn about X), so handedness is preserved and
//! orientations can be conjugated by it without mirroring.
//!
//! Every value crossing the boundary between the object API and Rapier goes
//! through one of these functions.

use crate::math::{AngularImpulse, GameTransform, GameVector, Isometry, Point, QAngle, Real, Rotation, Vector};
use na::{Translation3, UnitQuaternion};
use num_traits::Float;

/// Meters in one game unit (inch).
pub const METERS_PER_INCH: Real = 0.0254;
/// Game units (inches) in one meter.
pub const INCHES_PER_METER: Real = 1.0 / METERS_PER_INCH;
/// Scale applied to forces and impulses (`kg·in/s` → `kg·m/s`).
///
/// Masses are kilograms on both sides, so only the length part of the unit
/// changes.
pub const FORCE_TO_ENGINE: Real = METERS_PER_INCH;
/// Scale applied to energies (`kg·in²/s²` → `J`).
pub const ENERGY_TO_ENGINE: Real = METERS_PER_INCH * METERS_PER_INCH;
/// Scale applied to volumes (cubic inches → cubic meters).
pub const VOLUME_TO_ENGINE: Real = METERS_PER_INCH * METERS_PER_INCH * METERS_PER_INCH;

/// Divides `num` by `den`, yielding zero instead of an infinity or NaN when
/// `den` is zero.
#[inline]
pub fn safe_div<N: Float>(num: N, den: N) -> N {
    if den == N::zero() {
        N::zero()
    } else {
        num / den
    }
}

/// Componentwise [`safe_div`] of one by `v`.
///
/// Used to move between a diagonal inertia and its inverse: applying it twice
/// gives back the input, with zero components staying zero.
#[inline]
pub fn invert_diagonal(v: &Vector<Real>) -> Vector<Real> {
    v.map(|x| safe_div(1.0, x))
}

#[inline]
fn axes_to_engine(v: &GameVector) -> Vector<Real> {
    Vector::new(v.x, v.z, -v.y)
}

#[inline]
fn axes_to_game(v: &Vector<Real>) -> GameVector {
    GameVector::new(v.x, -v.z, v.y)
}

/// Rotation taking game-axis coordinates to engine-axis coordinates.
fn axis_remap() -> UnitQuaternion<Real> {
    UnitQuaternion::from_axis_angle(&Vector::x_axis(), -std::f32::consts::FRAC_PI_2 as Real)
}

/// Converts a scalar distance (or speed) from inches to meters.
#[inline]
pub fn distance_to_engine(d: Real) -> Real {
    d * METERS_PER_INCH
}

/// Converts a scalar distance (or speed) from meters to inches.
#[inline]
pub fn distance_to_game(d: Real) -> Real {
    d * INCHES_PER_METER
}

/// Converts a game position, displacement or linear velocity to engine space.
#[inline]
pub fn pos_to_engine(v: &GameVector) -> Vector<Real> {
    axes_to_engine(v) * METERS_PER_INCH
}

/// Converts an engine position, displacement or linear velocity to game space.
#[inline]
pub fn pos_to_game(v: &Vector<Real>) -> GameVector {
    axes_to_game(v) * INCHES_PER_METER
}

/// Converts a game position to an engine point.
#[inline]
pub fn point_to_engine(v: &GameVector) -> Point<Real> {
    Point::from(pos_to_engine(v))
}

/// Converts an engine point to a game position.
#[inline]
pub fn point_to_game(p: &Point<Real>) -> GameVector {
    pos_to_game(&p.coords)
}

/// Converts a direction (unit-free) from game axes to engine axes.
#[inline]
pub fn direction_to_engine(v: &GameVector) -> Vector<Real> {
    axes_to_engine(v)
}

/// Converts a direction (unit-free) from engine axes to game axes.
#[inline]
pub fn direction_to_game(v: &Vector<Real>) -> GameVector {
    axes_to_game(v)
}

/// Converts a force or linear impulse to engine units.
#[inline]
pub fn force_to_engine(v: &GameVector) -> Vector<Real> {
    axes_to_engine(v) * FORCE_TO_ENGINE
}

/// Converts a force or linear impulse to game units.
#[inline]
pub fn force_to_game(v: &Vector<Real>) -> GameVector {
    axes_to_game(v) / FORCE_TO_ENGINE
}

/// Converts an angular velocity, torque or angular impulse from degrees about
/// the game axes to radians about the engine axes.
#[inline]
pub fn angular_to_engine(v: &AngularImpulse) -> Vector<Real> {
    axes_to_engine(&v.map(|x| x.to_radians()))
}

/// Converts an angular velocity, torque or angular impulse from radians about
/// the engine axes to degrees about the game axes.
#[inline]
pub fn angular_to_game(v: &Vector<Real>) -> AngularImpulse {
    axes_to_game(v).map(|x| x.to_degrees())
}

/// Converts an energy from game units to Joules.
#[inline]
pub fn energy_to_engine(e: Real) -> Real {
    e * ENERGY_TO_ENGINE
}

/// Converts an energy from Joules to game units.
#[inline]
pub fn energy_to_game(e: Real) -> Real {
    e / ENERGY_TO_ENGINE
}

/// Converts a volume from cubic inches to cubic meters.
#[inline]
pub fn volume_to_engine(v: Real) -> Real {
    v * VOLUME_TO_ENGINE
}

/// Converts a volume from cubic meters to cubic inches.
#[inline]
pub fn volume_to_game(v: Real) -> Real {
    v / VOLUME_TO_ENGINE
}

/// Converts game Euler angles to an engine orientation.
pub fn rotation_to_engine(angles: &QAngle) -> Rotation<Real> {
    let game = UnitQuaternion::from_euler_angles(
        angles.roll.to_radians(),
        angles.pitch.to_radians(),
        angles.yaw.to_radians(),
    );
    let remap = axis_remap();
    remap * game * remap.inverse()
}

/// Converts an engine orientation to game Euler angles.
pub fn rotation_to_game(rot: &Rotation<Real>) -> QAngle {
    let remap = axis_remap();
    let game = remap.inverse() * rot * remap;
    let (roll, pitch, yaw) = game.euler_angles();
    QAngle::new(pitch.to_degrees(), yaw.to_degrees(), roll.to_degrees())
}

/// Builds an engine transform from a game position and game angles.
pub fn transform_to_engine(position: &GameVector, angles: &QAngle) -> Isometry<Real> {
    Isometry::from_parts(
        Translation3::from(pos_to_engine(position)),
        rotation_to_engine(angles),
    )
}

/// Splits an engine transform into a game position and game angles.
pub fn transform_to_game(pose: &Isometry<Real>) -> (GameVector, QAngle) {
    (
        pos_to_game(&pose.translation.vector),
        rotation_to_game(&pose.rotation),
    )
}

/// Converts a game-space rigid transform (position matrix) to engine space.
pub fn matrix_to_engine(matrix: &GameTransform) -> Isometry<Real> {
    let remap = axis_remap();
    Isometry::from_parts(
        Translation3::from(pos_to_engine(&matrix.translation.vector)),
        remap * matrix.rotation * remap.inverse(),
    )
}

/// Converts an engine rigid transform to a game-space position matrix.
pub fn matrix_to_game(pose: &Isometry<Real>) -> GameTransform {
    let remap = axis_remap();
    GameTransform::from_parts(
        Translation3::from(pos_to_game(&pose.translation.vector)),
        remap.inverse() * pose.rotation * remap,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn game_up_is_engine_up() {
        let up = direction_to_engine(&GameVector::z());
        assert_relative_eq!(up, Vector::y());
        let forward = direction_to_engine(&GameVector::x());
        assert_relative_eq!(forward, Vector::x());
    }

    #[test]
    fn positions_scale_by_inches() {
        let p = pos_to_engine(&GameVector::new(100.0, 0.0, 0.0));
        assert_relative_eq!(p.x, 2.54, epsilon = 1.0e-6);
        let back = pos_to_game(&p);
        assert_relative_eq!(back, GameVector::new(100.0, 0.0, 0.0), max_relative = 1.0e-4);
    }

    #[test]
    fn vector_quantities_round_trip() {
        let samples = [
            GameVector::new(1.0, -2.0, 3.5),
            GameVector::new(-120.0, 48.0, 0.25),
            GameVector::new(0.0, 1000.0, -7.0),
        ];

        for v in samples {
            assert_relative_eq!(pos_to_game(&pos_to_engine(&v)), v, max_relative = 1.0e-4);
            assert_relative_eq!(
                direction_to_game(&direction_to_engine(&v)),
                v,
                max_relative = 1.0e-4
            );
            assert_relative_eq!(force_to_game(&force_to_engine(&v)), v, max_relative = 1.0e-4);
            assert_relative_eq!(
                angular_to_game(&angular_to_engine(&v)),
                v,
                max_relative = 1.0e-4
            );
        }
    }

    #[test]
    fn angular_quantities_use_radians() {
        let w = angular_to_engine(&AngularImpulse::new(0.0, 0.0, 180.0));
        assert_relative_eq!(w.y, std::f32::consts::PI as Real, epsilon = 1.0e-5);
    }

    #[test]
    fn energy_scales_by_distance_squared() {
        let e = 1234.5;
        assert_relative_eq!(energy_to_game(energy_to_engine(e)), e, max_relative = 1.0e-4);
        assert_relative_eq!(
            energy_to_game(1.0),
            INCHES_PER_METER * INCHES_PER_METER,
            max_relative = 1.0e-4
        );
    }

    #[test]
    fn rotations_round_trip() {
        let samples = [
            QAngle::new(0.0, 0.0, 0.0),
            QAngle::new(30.0, 45.0, 10.0),
            QAngle::new(-60.0, 170.0, -35.0),
            QAngle::new(10.0, -90.0, 120.0),
        ];

        for angles in samples {
            let back = rotation_to_game(&rotation_to_engine(&angles));
            assert_relative_eq!(back.pitch, angles.pitch, epsilon = 1.0e-3);
            assert_relative_eq!(back.yaw, angles.yaw, epsilon = 1.0e-3);
            assert_relative_eq!(back.roll, angles.roll, epsilon = 1.0e-3);
        }
    }

    #[test]
    fn yaw_turns_about_engine_up() {
        let rot = rotation_to_engine(&QAngle::new(0.0, 90.0, 0.0));
        // Game +X yawed by 90° is game +Y, which is engine -Z.
        let turned = rot * Vector::x();
        assert_relative_eq!(turned, Vector::new(0.0, 0.0, -1.0), epsilon = 1.0e-5);
    }

    #[test]
    fn matrices_round_trip() {
        let matrix = GameTransform::new(
            GameVector::new(10.0, 20.0, -5.0),
            GameVector::new(0.3, -0.2, 1.1),
        );
        let back = matrix_to_game(&matrix_to_engine(&matrix));
        assert_relative_eq!(back, matrix, epsilon = 1.0e-3);
    }

    #[test]
    fn inverse_inertia_round_trips_with_safe_divide() {
        let inertia = Vector::new(2.0, 0.5, 0.0);
        let inv = invert_diagonal(&inertia);
        assert_eq!(inv.z, 0.0);
        assert!(inv.iter().all(|x| x.is_finite()));
        assert_relative_eq!(invert_diagonal(&inv), inertia);
        assert_eq!(safe_div(3.0_f32, 0.0), 0.0);
    }
}
