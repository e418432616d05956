//! Terrain geometry and line casts
//!
//! Terrain is a set of two-sided line segments grouped by owning surface
//! object. Sensors cast short segments against it; the nearest admitted
//! crossing becomes a [`TerrainHit`].

use std::f32::consts::{FRAC_PI_2, TAU};

use bitflags::bitflags;
use glam::Vec2;
use serde::{Deserialize, Serialize};

use super::platform::PlatformRegistry;
use super::sensors::Side;
use super::state::BodyId;
use crate::consts::ZERO_FRACTION_EPSILON;

bitflags! {
    /// Collision layers a surface belongs to / a body collides with
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct CollisionLayers: u32 {
        /// Static level geometry
        const TERRAIN = 1 << 0;
        /// Platforms driven by external logic (moving, one-way, breakable)
        const PLATFORM = 1 << 1;
        /// Solid objects that also block ledge climbing
        const OBJECT = 1 << 2;
    }
}

impl Default for CollisionLayers {
    fn default() -> Self {
        CollisionLayers::TERRAIN
    }
}

/// Identity of a surface object (several segments may share one)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SurfaceId(pub u32);

/// One solid line segment
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Surface {
    pub id: SurfaceId,
    pub start: Vec2,
    pub end: Vec2,
    pub layers: CollisionLayers,
}

/// Axis-aligned bounding box
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Aabb {
    pub min: Vec2,
    pub max: Vec2,
}

impl Aabb {
    pub fn from_points(a: Vec2, b: Vec2) -> Self {
        Self {
            min: a.min(b),
            max: a.max(b),
        }
    }

    /// Smallest box around all points (empty input gives a zero box)
    pub fn enclosing(points: impl IntoIterator<Item = Vec2>) -> Self {
        let mut points = points.into_iter();
        let Some(first) = points.next() else {
            return Self::default();
        };
        points.fold(Self::from_points(first, first), |acc, p| Self {
            min: acc.min.min(p),
            max: acc.max.max(p),
        })
    }

    #[inline]
    pub fn overlaps(&self, other: &Aabb) -> bool {
        self.min.x <= other.max.x
            && self.max.x >= other.min.x
            && self.min.y <= other.max.y
            && self.max.y >= other.min.y
    }

    #[inline]
    pub fn contains(&self, p: Vec2) -> bool {
        p.x >= self.min.x && p.x <= self.max.x && p.y >= self.min.y && p.y <= self.max.y
    }
}

/// Result of a successful cast. Immutable snapshot, created fresh per cast.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TerrainHit {
    /// World-space crossing point
    pub point: Vec2,
    /// Unit normal facing the cast origin
    pub normal: Vec2,
    /// Surface tangent direction (radians, [0, 2π)), normal rotated -90°
    pub surface_angle: f32,
    /// Cast start
    pub start: Vec2,
    /// Cast end
    pub end: Vec2,
    /// Distance along the cast in [0, 1]
    pub fraction: f32,
    /// Owning surface object
    pub surface: SurfaceId,
    /// Layers of the segment that was hit
    pub layers: CollisionLayers,
    /// Body whose sensor produced this hit
    pub body: BodyId,
    /// Which side of the body the sensor sits on
    pub side: Side,
}

impl TerrainHit {
    /// Surface angle in degrees, [0, 360)
    #[inline]
    pub fn surface_degrees(&self) -> f32 {
        crate::normalize_angle(self.surface_angle.to_degrees())
    }

    /// Cast length in world units
    #[inline]
    pub fn cast_length(&self) -> f32 {
        (self.end - self.start).length()
    }

    /// Whether the cast started at (or past) the surface
    #[inline]
    pub fn is_zero_fraction(&self) -> bool {
        self.fraction <= ZERO_FRACTION_EPSILON
    }
}

/// How a cast treats hits at its very start
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ZeroFraction {
    /// Already-inside hits count (air, wall and ceiling sensors)
    Accept,
    /// Already-inside hits are ignored (ledge sensors)
    Reject,
}

/// A single line cast request
#[derive(Debug, Clone, Copy)]
pub struct CastQuery {
    pub start: Vec2,
    pub end: Vec2,
    pub side: Side,
    pub mask: CollisionLayers,
    pub zero_fraction: ZeroFraction,
    /// Only surfaces whose platform blocks ledge climbing are eligible
    pub ledge_blockers_only: bool,
    pub body: BodyId,
}

/// Crossing of segment `p..p+r` with `q..q+s`: returns (t along r, u along s)
pub fn segment_intersection(p: Vec2, r: Vec2, q: Vec2, s: Vec2) -> Option<(f32, f32)> {
    let denom = r.perp_dot(s);
    if denom.abs() < 1e-9 {
        // Parallel or degenerate; collinear overlap is not a crossing
        return None;
    }
    let qp = q - p;
    let t = qp.perp_dot(s) / denom;
    let u = qp.perp_dot(r) / denom;
    if (0.0..=1.0).contains(&t) && (0.0..=1.0).contains(&u) {
        Some((t, u))
    } else {
        None
    }
}

/// Normal of a segment facing against `cast_dir`, plus its surface angle
fn facing_normal(segment: Vec2, cast_dir: Vec2) -> (Vec2, f32) {
    let mut normal = segment.perp().normalize_or_zero();
    if normal.dot(cast_dir) > 0.0 {
        normal = -normal;
    }
    let angle = (normal.y.atan2(normal.x) - FRAC_PI_2).rem_euclid(TAU);
    let angle = if angle >= TAU { 0.0 } else { angle };
    (normal, angle)
}

/// Static collision geometry
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Terrain {
    surfaces: Vec<Surface>,
    next_id: u32,
}

impl Terrain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate a fresh surface object identity
    pub fn allocate_id(&mut self) -> SurfaceId {
        let id = SurfaceId(self.next_id);
        self.next_id += 1;
        id
    }

    /// Add one segment belonging to an existing surface object
    pub fn push_segment(&mut self, id: SurfaceId, start: Vec2, end: Vec2, layers: CollisionLayers) {
        if id.0 >= self.next_id {
            self.next_id = id.0 + 1;
        }
        self.surfaces.push(Surface {
            id,
            start,
            end,
            layers,
        });
    }

    /// Add a single segment as its own surface object
    pub fn add_segment(&mut self, start: Vec2, end: Vec2, layers: CollisionLayers) -> SurfaceId {
        let id = self.allocate_id();
        self.push_segment(id, start, end, layers);
        id
    }

    /// Add a connected chain of segments as one surface object
    pub fn add_polyline(&mut self, points: &[Vec2], layers: CollisionLayers) -> SurfaceId {
        let id = self.allocate_id();
        for pair in points.windows(2) {
            self.push_segment(id, pair[0], pair[1], layers);
        }
        id
    }

    /// Add a circular arc (degrees, counter-clockwise from `start_deg`)
    pub fn add_arc(
        &mut self,
        center: Vec2,
        radius: f32,
        start_deg: f32,
        end_deg: f32,
        segments: u32,
        layers: CollisionLayers,
    ) -> SurfaceId {
        let segments = segments.max(1);
        let span = end_deg - start_deg;
        let points: Vec<Vec2> = (0..=segments)
            .map(|i| {
                let t = i as f32 / segments as f32;
                let theta = (start_deg + span * t).to_radians();
                center + Vec2::new(theta.cos(), theta.sin()) * radius
            })
            .collect();
        self.add_polyline(&points, layers)
    }

    /// Remove every segment of a surface object
    pub fn remove(&mut self, id: SurfaceId) -> bool {
        let before = self.surfaces.len();
        self.surfaces.retain(|s| s.id != id);
        self.surfaces.len() != before
    }

    pub fn surfaces(&self) -> &[Surface] {
        &self.surfaces
    }

    pub fn len(&self) -> usize {
        self.surfaces.len()
    }

    pub fn is_empty(&self) -> bool {
        self.surfaces.is_empty()
    }

    /// Bounds of all geometry
    pub fn bounds(&self) -> Aabb {
        Aabb::enclosing(self.surfaces.iter().flat_map(|s| [s.start, s.end]))
    }

    /// Cast a segment and return the nearest admitted hit.
    ///
    /// Platform solidity predicates are consulted in order of distance and
    /// only get shared access, so they cannot disturb the caller's state.
    pub fn cast(&self, platforms: &PlatformRegistry, query: &CastQuery) -> Option<TerrainHit> {
        let dir = query.end - query.start;
        if dir.length_squared() < 1e-12 {
            return None;
        }
        let cast_box = Aabb::from_points(query.start, query.end);

        let mut candidates: Vec<TerrainHit> = self
            .surfaces
            .iter()
            .filter(|s| s.layers.intersects(query.mask))
            .filter(|s| Aabb::from_points(s.start, s.end).overlaps(&cast_box))
            .filter_map(|s| {
                let seg = s.end - s.start;
                let (t, _) = segment_intersection(query.start, dir, s.start, seg)?;
                let (normal, surface_angle) = facing_normal(seg, dir);
                Some(TerrainHit {
                    point: query.start + dir * t,
                    normal,
                    surface_angle,
                    start: query.start,
                    end: query.end,
                    fraction: t,
                    surface: s.id,
                    layers: s.layers,
                    body: query.body,
                    side: query.side,
                })
            })
            .filter(|hit| query.zero_fraction == ZeroFraction::Accept || !hit.is_zero_fraction())
            .collect();

        // Stable: equal fractions keep insertion order
        candidates.sort_by(|a, b| a.fraction.total_cmp(&b.fraction));

        candidates.into_iter().find(|hit| {
            if query.ledge_blockers_only && !platforms.prevents_ledge_climb(hit.surface) {
                return false;
            }
            platforms.is_solid(hit)
        })
    }
}

/// Terrain plus the platform behaviours attached to its surfaces
#[derive(Default)]
pub struct World {
    pub terrain: Terrain,
    pub platforms: PlatformRegistry,
}

impl World {
    pub fn new(terrain: Terrain) -> Self {
        Self {
            terrain,
            platforms: PlatformRegistry::default(),
        }
    }

    /// Convenience wrapper over [`Terrain::cast`]
    pub fn cast(&self, query: &CastQuery) -> Option<TerrainHit> {
        self.terrain.cast(&self.platforms, query)
    }
}
