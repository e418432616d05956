//! Seeded test course generation
//!
//! Builds a rolling ground line out of flats, ramps and bumps, closed off
//! by a quarter-pipe at each end. The same seed always gives the same
//! course.

use glam::Vec2;
use rand::{Rng, SeedableRng};
use rand_pcg::Pcg32;

use super::terrain::{CollisionLayers, Terrain};

/// Length of the flat run every course starts with
pub const START_RUN: f32 = 6.0;
/// Radius of the end quarter-pipes
pub const PIPE_RADIUS: f32 = 2.5;
/// The ground line stays within this height of the start
const MAX_HEIGHT: f32 = 3.0;

/// Kinds of ground section
#[derive(Debug, Clone, Copy, PartialEq)]
enum Section {
    Flat { length: f32 },
    Ramp { angle: f32, length: f32 },
    Bump { angle: f32, run: f32, top: f32 },
}

impl Section {
    fn random(rng: &mut Pcg32) -> Self {
        match rng.random_range(0..3) {
            0 => Section::Flat {
                length: rng.random_range(2.0..6.0),
            },
            1 => {
                let angle = rng.random_range(10.0f32..35.0);
                let sign = if rng.random_bool(0.5) { 1.0 } else { -1.0 };
                Section::Ramp {
                    angle: angle * sign,
                    length: rng.random_range(1.0..3.0),
                }
            }
            _ => Section::Bump {
                angle: rng.random_range(8.0..25.0),
                run: rng.random_range(0.5..1.5),
                top: rng.random_range(0.5..2.0),
            },
        }
    }

    /// Append this section's points after `from`
    fn extend(self, from: Vec2, points: &mut Vec<Vec2>) {
        let mut cursor = from;
        let mut step = |angle_deg: f32, length: f32| {
            cursor += crate::unit_vector(angle_deg.to_radians()) * length;
            points.push(cursor);
        };
        match self {
            Section::Flat { length } => step(0.0, length),
            Section::Ramp { angle, length } => {
                step(angle, length);
                // Level out so the next section starts flat
                step(0.0, 1.0);
            }
            Section::Bump { angle, run, top } => {
                step(angle, run);
                step(0.0, top);
                step(-angle, run);
                step(0.0, 1.0);
            }
        }
    }
}

/// Generate a course with `sections` random sections after the start run
pub fn generate_course(seed: u64, sections: u32) -> Terrain {
    let mut rng = Pcg32::seed_from_u64(seed);
    let mut points = vec![Vec2::ZERO, Vec2::new(START_RUN, 0.0)];

    for _ in 0..sections {
        let from = points.last().copied().unwrap_or(Vec2::ZERO);
        let mut section = Section::random(&mut rng);
        // Ramps turn around instead of leaving the height band
        if let Section::Ramp { angle, length } = section {
            let rise = angle.to_radians().sin() * length;
            if (from.y + rise).abs() > MAX_HEIGHT {
                section = Section::Ramp { angle: -angle, length };
            }
        }
        section.extend(from, &mut points);
    }

    let start = points.first().copied().unwrap_or(Vec2::ZERO);
    let end = points.last().copied().unwrap_or(Vec2::ZERO);

    let mut terrain = Terrain::new();
    terrain.add_polyline(&points, CollisionLayers::TERRAIN);
    // Left pipe curls up from the start, right pipe from the end
    terrain.add_arc(
        start + Vec2::new(0.0, PIPE_RADIUS),
        PIPE_RADIUS,
        270.0,
        180.0,
        12,
        CollisionLayers::TERRAIN,
    );
    terrain.add_arc(
        end + Vec2::new(0.0, PIPE_RADIUS),
        PIPE_RADIUS,
        270.0,
        360.0,
        12,
        CollisionLayers::TERRAIN,
    );

    log::debug!(
        "Generated course seed={} sections={} segments={} span={:.1}",
        seed,
        sections,
        terrain.len(),
        end.x - start.x
    );
    terrain
}
