//! Platform behaviours attached to surface objects
//!
//! The core only needs a small capability interface: solidity and
//! on-surface predicates plus lifecycle notifications. Effects live in
//! whatever implements [`Platform`].

use std::collections::BTreeMap;

use super::contact::{Contact, ContactPhase};
use super::terrain::{SurfaceId, TerrainHit};

/// Answer to a pre-collision query
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CollisionVerdict {
    #[default]
    Proceed,
    /// Cancel this specific collision before it is applied
    Ignore,
}

/// Behaviour of an external surface object
pub trait Platform {
    /// Whether a candidate hit should count as solid. Must not assume it
    /// is only called once per tick.
    fn is_solid(&self, _hit: &TerrainHit) -> bool {
        true
    }

    /// Whether a body may keep standing on this surface
    fn is_on_surface(&self, _contact: &Contact) -> bool {
        true
    }

    /// Solid objects that stop the body instead of being stepped onto
    fn prevents_ledge_climb(&self) -> bool {
        false
    }

    /// Called before a collision is applied; may cancel it
    fn on_pre_collision(&mut self, _contact: &Contact) -> CollisionVerdict {
        CollisionVerdict::Proceed
    }

    /// Called after the physical response has been applied
    fn on_collision(&mut self, _contact: &Contact) {}

    /// Touching the platform with any sensor
    fn on_platform_contact(&mut self, _phase: ContactPhase, _contact: &Contact) {}

    /// Standing on top of the platform
    fn on_surface_contact(&mut self, _phase: ContactPhase, _contact: &Contact) {}
}

/// Platforms keyed by the surface object they drive
#[derive(Default)]
pub struct PlatformRegistry {
    platforms: BTreeMap<SurfaceId, Box<dyn Platform>>,
}

impl PlatformRegistry {
    pub fn insert(&mut self, surface: SurfaceId, platform: Box<dyn Platform>) -> Option<Box<dyn Platform>> {
        self.platforms.insert(surface, platform)
    }

    pub fn remove(&mut self, surface: SurfaceId) -> Option<Box<dyn Platform>> {
        self.platforms.remove(&surface)
    }

    pub fn get(&self, surface: SurfaceId) -> Option<&dyn Platform> {
        self.platforms.get(&surface).map(|p| p.as_ref())
    }

    pub fn get_mut(&mut self, surface: SurfaceId) -> Option<&mut (dyn Platform + 'static)> {
        self.platforms.get_mut(&surface).map(|p| p.as_mut())
    }

    pub fn len(&self) -> usize {
        self.platforms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.platforms.is_empty()
    }

    /// Plain terrain (no platform) is always solid
    pub fn is_solid(&self, hit: &TerrainHit) -> bool {
        self.get(hit.surface).is_none_or(|p| p.is_solid(hit))
    }

    pub fn is_on_surface(&self, contact: &Contact) -> bool {
        self.get(contact.hit.surface).is_none_or(|p| p.is_on_surface(contact))
    }

    pub fn prevents_ledge_climb(&self, surface: SurfaceId) -> bool {
        self.get(surface).is_some_and(|p| p.prevents_ledge_climb())
    }
}

/// Solid only for bodies coming down onto its top face.
///
/// The top face is the side the normal `up` points to; hits from below or
/// from the side pass through.
#[derive(Debug, Clone, Copy)]
pub struct OneWayPlatform {
    pub up: glam::Vec2,
}

impl Default for OneWayPlatform {
    fn default() -> Self {
        Self { up: glam::Vec2::Y }
    }
}

impl Platform for OneWayPlatform {
    fn is_solid(&self, hit: &TerrainHit) -> bool {
        // Normal faces the cast origin, so a cast from above sees it pointing up
        hit.normal.dot(self.up) > 0.5
    }
}
