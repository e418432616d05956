//! Landing / reacquisition speed resolution
//!
//! Decides whether an airborne body that touches a surface attaches to it,
//! and with what ground speed. All angles here are relative to gravity.

use glam::Vec2;

use super::terrain::TerrainHit;
use crate::consts::{WALL_STEEP_MAX, WALL_STEEP_MIN};
use crate::{angle_in_range, relative_angle, vector_angle};

/// Slack on the heading check so exact grazing angles still count
const HEADING_EPSILON: f32 = 1e-3;

/// Outcome of an impact
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Impact {
    pub should_attach: bool,
    pub ground_speed: f32,
}

impl Impact {
    pub const REJECT: Impact = Impact {
        should_attach: false,
        ground_speed: 0.0,
    };

    fn attach(ground_speed: f32) -> Self {
        Self {
            should_attach: true,
            ground_speed,
        }
    }
}

/// Tunables the table depends on
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ImpactRules {
    pub detach_speed: f32,
    pub disable_wall_detach: bool,
}

/// Whether a relative surface angle is steep enough to count as wall
#[inline]
pub fn is_wall_steep(relative_surface_angle: f32) -> bool {
    relative_surface_angle > WALL_STEEP_MIN && relative_surface_angle < WALL_STEEP_MAX
}

/// Resolve an impact against a terrain hit
pub fn resolve_impact(
    hit: &TerrainHit,
    relative_velocity: Vec2,
    gravity_direction: f32,
    rules: &ImpactRules,
) -> Impact {
    let surface = relative_angle(hit.surface_degrees(), gravity_direction);
    resolve_landing(surface, relative_velocity, rules)
}

/// The reacquisition table, on a gravity-relative surface angle in [0, 360)
pub fn resolve_landing(relative_surface_angle: f32, relative_velocity: Vec2, rules: &ImpactRules) -> Impact {
    let surface = relative_surface_angle;
    let v = relative_velocity;

    // Travel direction must be within 90° of heading into the surface:
    // the reversed travel direction has to lie within ±90° of the normal.
    let travel = vector_angle(v);
    let normal = surface + 90.0;
    if !angle_in_range(
        travel + 180.0,
        normal - 90.0 - HEADING_EPSILON,
        normal + 90.0 + HEADING_EPSILON,
    ) {
        return Impact::REJECT;
    }

    let horizontal_dominates = v.x.abs() > v.y.abs();
    let ground_speed = if v.y <= 0.0 {
        // Falling (or level) relative to gravity
        if !(22.5..=337.5).contains(&surface) {
            v.x
        } else if surface < 45.0 {
            if horizontal_dominates { v.x } else { v.y * 0.5 }
        } else if surface > 315.0 {
            if horizontal_dominates { v.x } else { -v.y * 0.5 }
        } else if surface < 90.0 {
            if horizontal_dominates { v.x } else { v.y }
        } else if surface > 265.0 {
            if horizontal_dominates { v.x } else { -v.y }
        } else {
            // Facing the body head-on: bounce off, don't stick
            return Impact::REJECT;
        }
    } else if (90.0..=135.0).contains(&surface) {
        v.y
    } else if (220.0..=275.0).contains(&surface) {
        -v.y
    } else {
        return Impact::REJECT;
    };

    if !rules.disable_wall_detach && is_wall_steep(surface) && ground_speed.abs() < rules.detach_speed {
        return Impact::REJECT;
    }

    Impact::attach(ground_speed)
}
