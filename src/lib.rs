//! Hedgehog Physics - Sonic-style terrain locomotion
//!
//! Core modules:
//! - `sim`: Deterministic character simulation (sensors, terrain queries, controller tick)
//! - `settings`: Data-driven tuning constants
//! - `error`: Error taxonomy for programmer and configuration errors
//!
//! Angles exposed by the controller are in degrees and always normalized to
//! [0, 360). Terrain hits carry radians, matching the raw cast math.

pub mod error;
pub mod settings;
pub mod sim;

pub use error::{ControllerError, SettingsError};
pub use settings::PhysicsSettings;

use glam::Vec2;

/// Simulation constants
pub mod consts {
    /// Fixed simulation timestep (60 Hz)
    pub const SIM_DT: f32 = 1.0 / 60.0;
    /// Maximum fixed steps per rendered frame to prevent spiral of death
    pub const MAX_STEPS_PER_FRAME: u32 = 8;
    /// Upper bound on anti-tunneling sub-steps inside a single tick
    pub const MAX_ANTI_TUNNELING_STEPS: u32 = 100;

    /// Fractions at or below this count as "already inside" the surface
    pub const ZERO_FRACTION_EPSILON: f32 = 1e-5;
    /// Height differences below this are treated as equal ground
    pub const HEIGHT_TIE_EPSILON: f32 = 1e-4;

    /// Relative surface angles strictly inside this band are wall-steep
    pub const WALL_STEEP_MIN: f32 = 89.9;
    pub const WALL_STEEP_MAX: f32 = 270.1;
}

/// Normalize an angle in degrees to [0, 360)
#[inline]
pub fn normalize_angle(degrees: f32) -> f32 {
    let wrapped = degrees.rem_euclid(360.0);
    // rem_euclid can round up to exactly 360 for tiny negative inputs
    if wrapped >= 360.0 { 0.0 } else { wrapped }
}

/// Signed minimal rotation from `from` to `to`, in (-180, 180]
#[inline]
pub fn shortest_arc(from: f32, to: f32) -> f32 {
    let delta = normalize_angle(to - from);
    if delta > 180.0 { delta - 360.0 } else { delta }
}

/// Express an absolute angle relative to gravity, so a flat floor is 0°
/// regardless of which way gravity points.
#[inline]
pub fn relative_angle(absolute: f32, gravity_direction: f32) -> f32 {
    normalize_angle(absolute - gravity_direction + 270.0)
}

/// Inverse of [`relative_angle`]
#[inline]
pub fn absolute_angle(relative: f32, gravity_direction: f32) -> f32 {
    normalize_angle(relative + gravity_direction - 270.0)
}

/// Whether `angle` lies in the arc that starts at `min` and sweeps
/// counter-clockwise to `max` (inclusive, all in degrees)
pub fn angle_in_range(angle: f32, min: f32, max: f32) -> bool {
    let angle = normalize_angle(angle);
    let min = normalize_angle(min);
    let max = normalize_angle(max);

    if min <= max {
        angle >= min && angle <= max
    } else {
        // Wraparound case (e.g., min=300°, max=60°)
        angle >= min || angle <= max
    }
}

/// Rotate a vector counter-clockwise by `radians`
#[inline]
pub fn rotate(vector: Vec2, radians: f32) -> Vec2 {
    Vec2::from_angle(radians).rotate(vector)
}

/// Unit vector pointing at `radians`
#[inline]
pub fn unit_vector(radians: f32) -> Vec2 {
    Vec2::from_angle(radians)
}

/// Signed length of `vector` along the direction `onto_radians`.
///
/// Negative means the vector points backwards along that direction.
#[inline]
pub fn scalar_projection(vector: Vec2, onto_radians: f32) -> f32 {
    vector.dot(unit_vector(onto_radians))
}

/// Direction of a vector in degrees, normalized to [0, 360)
#[inline]
pub fn vector_angle(vector: Vec2) -> f32 {
    normalize_angle(vector.y.atan2(vector.x).to_degrees())
}
