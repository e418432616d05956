//! Sensor rig: named probes fixed to the body's local frame
//!
//! Every probe is a short segment in body space (+Y is "up" for the body).
//! The whole rig rotates as one piece, following gravity while airborne
//! and the wall mode while grounded.

use glam::Vec2;
use serde::{Deserialize, Serialize};

use super::terrain::Aabb;

/// Which side of the body a sensor (or the primary surface) belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Side {
    #[default]
    None,
    Left,
    Right,
    Both,
}

impl Side {
    /// -1 for left, +1 for right, 0 otherwise
    pub fn sign(self) -> f32 {
        match self {
            Side::Left => -1.0,
            Side::Right => 1.0,
            Side::None | Side::Both => 0.0,
        }
    }
}

/// Categories of checks a rig can support
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SensorGroup {
    Ceiling,
    Ground,
    Walls,
    SolidObjects,
}

/// Every named probe on the rig
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SensorId {
    CeilingLeft,
    CeilingRight,
    /// Airborne landing probes
    GroundLeft,
    GroundRight,
    /// Grounded probes from ledge-climb height down to ledge-drop depth
    LedgeLeft,
    LedgeRight,
    WallLeft,
    WallRight,
    SolidLeft,
    SolidRight,
}

impl SensorId {
    pub const ALL: [SensorId; 10] = [
        SensorId::CeilingLeft,
        SensorId::CeilingRight,
        SensorId::GroundLeft,
        SensorId::GroundRight,
        SensorId::LedgeLeft,
        SensorId::LedgeRight,
        SensorId::WallLeft,
        SensorId::WallRight,
        SensorId::SolidLeft,
        SensorId::SolidRight,
    ];

    pub fn side(self) -> Side {
        match self {
            SensorId::CeilingLeft
            | SensorId::GroundLeft
            | SensorId::LedgeLeft
            | SensorId::WallLeft
            | SensorId::SolidLeft => Side::Left,
            _ => Side::Right,
        }
    }

    pub fn group(self) -> SensorGroup {
        match self {
            SensorId::CeilingLeft | SensorId::CeilingRight => SensorGroup::Ceiling,
            SensorId::GroundLeft | SensorId::GroundRight | SensorId::LedgeLeft | SensorId::LedgeRight => {
                SensorGroup::Ground
            }
            SensorId::WallLeft | SensorId::WallRight => SensorGroup::Walls,
            SensorId::SolidLeft | SensorId::SolidRight => SensorGroup::SolidObjects,
        }
    }
}

/// A left/right pair of probes running along the body's up axis
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VerticalProbes {
    /// Horizontal distance of each probe from the centre line
    pub offset_x: f32,
    /// Length from the body origin to the probe tip
    pub reach: f32,
}

/// A left/right pair of probes running sideways from the centre line
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HorizontalProbes {
    /// Height of the probes relative to the body origin
    pub offset_y: f32,
    /// Length from the centre line to the probe tip
    pub reach: f32,
}

/// Sensor placement. A missing group disables the matching checks.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SensorLayout {
    pub ceiling: Option<VerticalProbes>,
    pub ground: Option<VerticalProbes>,
    pub walls: Option<HorizontalProbes>,
    pub solid_objects: Option<HorizontalProbes>,
}

impl Default for SensorLayout {
    fn default() -> Self {
        Self {
            ceiling: Some(VerticalProbes {
                offset_x: 0.09,
                reach: 0.19,
            }),
            ground: Some(VerticalProbes {
                offset_x: 0.09,
                reach: 0.19,
            }),
            walls: Some(HorizontalProbes {
                offset_y: 0.0,
                reach: 0.10,
            }),
            solid_objects: Some(HorizontalProbes {
                offset_y: -0.12,
                reach: 0.10,
            }),
        }
    }
}

impl SensorLayout {
    pub fn has(&self, group: SensorGroup) -> bool {
        match group {
            SensorGroup::Ceiling => self.ceiling.is_some(),
            SensorGroup::Ground => self.ground.is_some(),
            SensorGroup::Walls => self.walls.is_some(),
            SensorGroup::SolidObjects => self.solid_objects.is_some(),
        }
    }
}

/// The rotating collection of probes
#[derive(Debug, Clone)]
pub struct SensorRig {
    layout: SensorLayout,
    ledge_climb_height: f32,
    ledge_drop_height: f32,
    rotation_degrees: f32,
    rotation: Vec2,
    bounds: Aabb,
}

impl SensorRig {
    pub fn new(layout: SensorLayout, ledge_climb_height: f32, ledge_drop_height: f32) -> Self {
        Self {
            layout,
            ledge_climb_height,
            ledge_drop_height,
            rotation_degrees: 0.0,
            rotation: Vec2::X,
            bounds: Aabb::default(),
        }
    }

    pub fn layout(&self) -> &SensorLayout {
        &self.layout
    }

    /// Set the rig rotation. Called once per tick before any query.
    pub fn orient(&mut self, degrees: f32) {
        self.rotation_degrees = crate::normalize_angle(degrees);
        self.rotation = crate::unit_vector(self.rotation_degrees.to_radians());
    }

    pub fn rotation_degrees(&self) -> f32 {
        self.rotation_degrees
    }

    /// Body "up" in world space
    #[inline]
    pub fn up(&self) -> Vec2 {
        self.rotation.rotate(Vec2::Y)
    }

    /// Body "right" in world space
    #[inline]
    pub fn right(&self) -> Vec2 {
        self.rotation.rotate(Vec2::X)
    }

    /// Body-space point to world space
    #[inline]
    pub fn to_world(&self, origin: Vec2, local: Vec2) -> Vec2 {
        origin + self.rotation.rotate(local)
    }

    /// Probe endpoints in body space
    pub fn local_segment(&self, sensor: SensorId) -> Option<(Vec2, Vec2)> {
        let sign = sensor.side().sign();
        match sensor.group() {
            SensorGroup::Ceiling => {
                let probes = self.layout.ceiling?;
                let x = probes.offset_x * sign;
                Some((Vec2::new(x, 0.0), Vec2::new(x, probes.reach)))
            }
            SensorGroup::Ground => {
                let probes = self.layout.ground?;
                let x = probes.offset_x * sign;
                match sensor {
                    SensorId::LedgeLeft | SensorId::LedgeRight => Some((
                        Vec2::new(x, -probes.reach + self.ledge_climb_height),
                        Vec2::new(x, -probes.reach - self.ledge_drop_height),
                    )),
                    _ => Some((Vec2::new(x, 0.0), Vec2::new(x, -probes.reach))),
                }
            }
            SensorGroup::Walls => {
                let probes = self.layout.walls?;
                Some((
                    Vec2::new(0.0, probes.offset_y),
                    Vec2::new(probes.reach * sign, probes.offset_y),
                ))
            }
            SensorGroup::SolidObjects => {
                let probes = self.layout.solid_objects?;
                Some((
                    Vec2::new(0.0, probes.offset_y),
                    Vec2::new(probes.reach * sign, probes.offset_y),
                ))
            }
        }
    }

    /// Probe endpoints in world space for a body at `origin`
    pub fn segment(&self, sensor: SensorId, origin: Vec2) -> Option<(Vec2, Vec2)> {
        let (start, end) = self.local_segment(sensor)?;
        Some((self.to_world(origin, start), self.to_world(origin, end)))
    }

    /// Nominal foot point (bottom of the ground probe) for one side
    pub fn foot(&self, side: Side, origin: Vec2) -> Option<Vec2> {
        let probes = self.layout.ground?;
        Some(self.to_world(origin, Vec2::new(probes.offset_x * side.sign(), -probes.reach)))
    }

    /// Distance between the two feet
    pub fn foot_span(&self) -> f32 {
        self.layout.ground.map_or(0.0, |g| g.offset_x * 2.0)
    }

    /// Total length of a ledge probe
    pub fn ledge_length(&self) -> f32 {
        self.ledge_climb_height + self.ledge_drop_height
    }

    /// Fraction along a ledge probe where the foot sits
    pub fn ledge_ratio(&self) -> f32 {
        let total = self.ledge_length();
        if total > 0.0 { self.ledge_climb_height / total } else { 0.0 }
    }

    /// Recompute the world bounds spanned by every probe
    pub fn refresh_bounds(&mut self, origin: Vec2) -> Aabb {
        let points: Vec<Vec2> = SensorId::ALL
            .iter()
            .filter_map(|&sensor| self.segment(sensor, origin))
            .flat_map(|(a, b)| [a, b])
            .collect();
        self.bounds = Aabb::enclosing(points);
        self.bounds
    }

    pub fn bounds(&self) -> Aabb {
        self.bounds
    }
}
