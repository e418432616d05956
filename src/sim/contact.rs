//! Contact snapshots and per-tick contact bookkeeping

use std::collections::BTreeMap;

use glam::Vec2;
use serde::{Deserialize, Serialize};

use super::events::ControllerEvent;
use super::platform::PlatformRegistry;
use super::sensors::{SensorGroup, SensorId, Side};
use super::terrain::{SurfaceId, TerrainHit};

/// One sensor touching one surface, with the body's motion at that moment
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Contact {
    pub sensor: SensorId,
    pub hit: TerrainHit,
    pub velocity: Vec2,
    pub ground_velocity: f32,
    /// Surface angle the body had (degrees)
    pub surface_angle: f32,
    pub grounded: bool,
}

impl Contact {
    #[inline]
    pub fn surface(&self) -> SurfaceId {
        self.hit.surface
    }

    #[inline]
    pub fn side(&self) -> Side {
        self.sensor.side()
    }
}

/// All contacts collected during one tick, in the order they happened
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Collision {
    contacts: Vec<Contact>,
}

impl Collision {
    pub fn push(&mut self, contact: Contact) {
        self.contacts.push(contact);
    }

    pub fn clear(&mut self) {
        self.contacts.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.contacts.is_empty()
    }

    pub fn len(&self) -> usize {
        self.contacts.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Contact> {
        self.contacts.iter()
    }

    /// Most recent contact
    pub fn latest(&self) -> Option<&Contact> {
        self.contacts.last()
    }

    /// Most recent contact from one sensor
    pub fn by_sensor(&self, sensor: SensorId) -> Option<&Contact> {
        self.contacts.iter().rev().find(|c| c.sensor == sensor)
    }

    /// Every contact from one sensor group
    pub fn by_group(&self, group: SensorGroup) -> impl Iterator<Item = &Contact> {
        self.contacts.iter().filter(move |c| c.sensor.group() == group)
    }

    /// Whether any contact touched this surface object
    pub fn touched(&self, surface: SurfaceId) -> bool {
        self.contacts.iter().any(|c| c.surface() == surface)
    }
}

/// Stage of a contact across ticks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ContactPhase {
    Enter,
    Stay,
    Exit,
}

/// Pending vs current contact sets, reconciled once per tick
#[derive(Debug, Clone, Default)]
pub struct ContactTracker {
    pending_platform: BTreeMap<SurfaceId, Contact>,
    current_platform: BTreeMap<SurfaceId, Contact>,
    pending_surface: BTreeMap<SurfaceId, Contact>,
    current_surface: BTreeMap<SurfaceId, Contact>,
}

impl ContactTracker {
    /// Record that a sensor touched a platform this tick
    pub fn touch(&mut self, contact: Contact) {
        self.pending_platform.insert(contact.surface(), contact);
    }

    /// Record that the body stood on a surface this tick
    pub fn stand_on(&mut self, contact: Contact) {
        self.pending_surface.insert(contact.surface(), contact);
    }

    pub fn is_touching(&self, surface: SurfaceId) -> bool {
        self.current_platform.contains_key(&surface)
    }

    pub fn is_standing_on(&self, surface: SurfaceId) -> bool {
        self.current_surface.contains_key(&surface)
    }

    /// Forget everything without emitting exits
    pub fn clear(&mut self) {
        self.pending_platform.clear();
        self.current_platform.clear();
        self.pending_surface.clear();
        self.current_surface.clear();
    }

    /// Turn this tick's contacts into enter/stay/exit notifications
    pub fn reconcile(&mut self, platforms: &mut PlatformRegistry, events: &mut Vec<ControllerEvent>) {
        let pending = std::mem::take(&mut self.pending_platform);
        for (phase, contact) in diff(&pending, &self.current_platform) {
            if let Some(platform) = platforms.get_mut(contact.surface()) {
                platform.on_platform_contact(phase, &contact);
            }
            events.push(ControllerEvent::Platform { phase, contact });
        }
        self.current_platform = pending;

        // Platforms may withdraw standing status before it is promoted
        let mut pending = std::mem::take(&mut self.pending_surface);
        pending.retain(|_, contact| platforms.is_on_surface(contact));
        for (phase, contact) in diff(&pending, &self.current_surface) {
            if let Some(platform) = platforms.get_mut(contact.surface()) {
                platform.on_surface_contact(phase, &contact);
            }
            events.push(ControllerEvent::Surface { phase, contact });
        }
        self.current_surface = pending;
    }
}

/// Enter/stay for everything pending, exit for current entries that vanished
fn diff(
    pending: &BTreeMap<SurfaceId, Contact>,
    current: &BTreeMap<SurfaceId, Contact>,
) -> Vec<(ContactPhase, Contact)> {
    let mut out: Vec<(ContactPhase, Contact)> = pending
        .iter()
        .map(|(id, contact)| {
            let phase = if current.contains_key(id) {
                ContactPhase::Stay
            } else {
                ContactPhase::Enter
            };
            (phase, *contact)
        })
        .collect();
    out.extend(
        current
            .iter()
            .filter(|(id, _)| !pending.contains_key(id))
            .map(|(_, contact)| (ContactPhase::Exit, *contact)),
    );
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::platform::Platform;
    use crate::sim::state::BodyId;
    use crate::sim::terrain::CollisionLayers;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn contact(surface: u32, sensor: SensorId) -> Contact {
        Contact {
            sensor,
            hit: TerrainHit {
                point: Vec2::ZERO,
                normal: Vec2::Y,
                surface_angle: 0.0,
                start: Vec2::Y,
                end: -Vec2::Y,
                fraction: 0.5,
                surface: SurfaceId(surface),
                layers: CollisionLayers::TERRAIN,
                body: BodyId(1),
                side: sensor.side(),
            },
            velocity: Vec2::ZERO,
            ground_velocity: 0.0,
            surface_angle: 0.0,
            grounded: true,
        }
    }

    fn phases(events: &[ControllerEvent]) -> Vec<(bool, ContactPhase, SurfaceId)> {
        events
            .iter()
            .filter_map(|e| match e {
                ControllerEvent::Platform { phase, contact } => Some((false, *phase, contact.surface())),
                ControllerEvent::Surface { phase, contact } => Some((true, *phase, contact.surface())),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_collision_accessors() {
        let mut collision = Collision::default();
        collision.push(contact(1, SensorId::LedgeLeft));
        collision.push(contact(2, SensorId::LedgeRight));
        collision.push(contact(3, SensorId::LedgeLeft));

        assert_eq!(collision.len(), 3);
        assert_eq!(collision.latest().unwrap().surface(), SurfaceId(3));
        assert_eq!(collision.by_sensor(SensorId::LedgeLeft).unwrap().surface(), SurfaceId(3));
        assert!(collision.by_sensor(SensorId::WallLeft).is_none());
        assert_eq!(collision.by_group(SensorGroup::Ground).count(), 3);
        assert!(collision.touched(SurfaceId(2)));
    }

    #[test]
    fn test_enter_stay_exit() {
        let mut tracker = ContactTracker::default();
        let mut platforms = PlatformRegistry::default();
        let mut events = Vec::new();

        tracker.touch(contact(7, SensorId::WallRight));
        tracker.reconcile(&mut platforms, &mut events);
        assert_eq!(phases(&events), vec![(false, ContactPhase::Enter, SurfaceId(7))]);
        assert!(tracker.is_touching(SurfaceId(7)));

        events.clear();
        tracker.touch(contact(7, SensorId::WallRight));
        tracker.reconcile(&mut platforms, &mut events);
        assert_eq!(phases(&events), vec![(false, ContactPhase::Stay, SurfaceId(7))]);

        events.clear();
        tracker.reconcile(&mut platforms, &mut events);
        assert_eq!(phases(&events), vec![(false, ContactPhase::Exit, SurfaceId(7))]);
        assert!(!tracker.is_touching(SurfaceId(7)));
    }

    struct Crumbling {
        solid: Rc<RefCell<bool>>,
        log: Rc<RefCell<Vec<ContactPhase>>>,
    }

    impl Platform for Crumbling {
        fn is_on_surface(&self, _contact: &Contact) -> bool {
            *self.solid.borrow()
        }

        fn on_surface_contact(&mut self, phase: ContactPhase, _contact: &Contact) {
            self.log.borrow_mut().push(phase);
        }
    }

    #[test]
    fn test_surface_revalidated_before_promotion() {
        let solid = Rc::new(RefCell::new(true));
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut platforms = PlatformRegistry::default();
        platforms.insert(
            SurfaceId(4),
            Box::new(Crumbling {
                solid: solid.clone(),
                log: log.clone(),
            }),
        );
        let mut tracker = ContactTracker::default();
        let mut events = Vec::new();

        tracker.stand_on(contact(4, SensorId::LedgeLeft));
        tracker.reconcile(&mut platforms, &mut events);
        assert!(tracker.is_standing_on(SurfaceId(4)));

        // Platform withdraws standing status: one exit, no re-enter
        *solid.borrow_mut() = false;
        tracker.stand_on(contact(4, SensorId::LedgeLeft));
        tracker.reconcile(&mut platforms, &mut events);
        tracker.stand_on(contact(4, SensorId::LedgeLeft));
        tracker.reconcile(&mut platforms, &mut events);

        assert_eq!(*log.borrow(), vec![ContactPhase::Enter, ContactPhase::Exit]);
        assert!(!tracker.is_standing_on(SurfaceId(4)));
    }

    #[test]
    fn test_platform_and_surface_tracked_independently() {
        let mut tracker = ContactTracker::default();
        let mut platforms = PlatformRegistry::default();
        let mut events = Vec::new();

        let standing = contact(2, SensorId::LedgeLeft);
        tracker.touch(standing);
        tracker.stand_on(standing);
        tracker.reconcile(&mut platforms, &mut events);

        events.clear();
        // Still touching, no longer standing
        tracker.touch(standing);
        tracker.reconcile(&mut platforms, &mut events);
        assert_eq!(
            phases(&events),
            vec![
                (false, ContactPhase::Stay, SurfaceId(2)),
                (true, ContactPhase::Exit, SurfaceId(2)),
            ]
        );
    }
}
