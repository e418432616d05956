//! Collision passes run after every movement sub-step
//!
//! Airborne bodies stop against walls, bump or catch ceilings and land on
//! ground. Grounded bodies stop against (or climb onto) walls and then
//! reconcile what the two feet are standing on.

use log::trace;

use super::contact::Contact;
use super::hooks::HookPoint;
use super::impact::{ImpactRules, resolve_impact};
use super::sensors::{SensorGroup, SensorId, Side};
use super::state::Controller;
use super::terrain::World;
use crate::consts::HEIGHT_TIE_EPSILON;
use crate::shortest_arc;

impl Controller {
    /// Run the pass matching the current state, wrapped in its hooks
    pub(super) fn collision_pass(&mut self, world: &mut World) {
        self.run_hooks(HookPoint::BeforeCollisions);
        if self.grounded {
            self.grounded_pass(world);
        } else {
            self.airborne_pass(world);
        }
        self.sync_velocity();
        self.run_hooks(HookPoint::AfterCollisions);
    }

    fn impact_rules(&self) -> ImpactRules {
        ImpactRules {
            detach_speed: self.settings.detach_speed,
            disable_wall_detach: self.settings.disable_wall_detach,
        }
    }

    /// Cast a sensor and run the pre-collision query on its hit
    fn sense(&mut self, world: &mut World, sensor: SensorId) -> Option<Contact> {
        let hit = self.cast_sensor(world, sensor)?;
        let contact = self.contact(sensor, hit);
        self.query_pre_collision(world, &contact).then_some(contact)
    }

    /// Sense a left/right pair
    fn sense_pair(&mut self, world: &mut World, left: SensorId, right: SensorId) -> (Option<Contact>, Option<Contact>) {
        let left = self.sense(world, left);
        let right = self.sense(world, right);
        (left, right)
    }

    /// How far a hit sits inside the sensor's reach
    fn penetration(contact: &Contact) -> f32 {
        (1.0 - contact.hit.fraction) * contact.hit.cast_length()
    }

    /// Pick one of two hits by height along `up`. `prefer_higher` keeps the
    /// higher one (ground), otherwise the lower one (ceiling). Equal heights
    /// go to the side the body is moving towards.
    fn pick_by_height(
        &self,
        left: Option<Contact>,
        right: Option<Contact>,
        prefer_higher: bool,
        travel: f32,
    ) -> Option<(Contact, Option<Contact>)> {
        match (left, right) {
            (None, None) => None,
            (Some(only), None) | (None, Some(only)) => Some((only, None)),
            (Some(l), Some(r)) => {
                let up = self.rig.up();
                let diff = l.hit.point.dot(up) - r.hit.point.dot(up);
                let left_wins = if diff.abs() < HEIGHT_TIE_EPSILON {
                    travel < 0.0
                } else {
                    (diff > 0.0) == prefer_higher
                };
                Some(if left_wins { (l, Some(r)) } else { (r, Some(l)) })
            }
        }
    }

    // === Airborne ===

    fn airborne_pass(&mut self, world: &mut World) {
        if self.checks_enabled(SensorGroup::Walls) {
            for sensor in [SensorId::WallLeft, SensorId::WallRight] {
                if let Some(contact) = self.sense(world, sensor) {
                    self.airborne_wall(world, contact);
                }
            }
        }

        if self.checks_enabled(SensorGroup::Ceiling) {
            let (left, right) = self.sense_pair(world, SensorId::CeilingLeft, SensorId::CeilingRight);
            let travel = self.relative_velocity().x;
            if let Some((contact, _)) = self.pick_by_height(left, right, false, travel) {
                self.airborne_ceiling(world, contact);
                if self.grounded {
                    return;
                }
            }
        }

        if self.checks_enabled(SensorGroup::Ground) {
            let (left, right) = self.sense_pair(world, SensorId::GroundLeft, SensorId::GroundRight);
            let travel = self.relative_velocity().x;
            if let Some((contact, _)) = self.pick_by_height(left, right, true, travel) {
                self.airborne_ground(world, contact);
            }
        }
    }

    /// Stop sideways motion into a wall without attaching
    fn airborne_wall(&mut self, world: &mut World, contact: Contact) {
        let sign = contact.side().sign();
        let mut relative = self.relative_velocity();
        if relative.x * sign > 0.0 {
            relative.x = 0.0;
            self.set_relative_velocity(relative);
        }
        self.position -= self.rig.right() * sign * Self::penetration(&contact);
        trace!("Body {:?} airborne wall hit on {:?}", self.id, contact.side());
        self.notify_collision(world, contact);
    }

    /// Catch a ceiling corner, or bump against it
    fn airborne_ceiling(&mut self, world: &mut World, contact: Contact) {
        let up = self.rig.up();
        let impact = resolve_impact(
            &contact.hit,
            self.relative_velocity(),
            self.gravity_direction,
            &self.impact_rules(),
        );
        self.position -= up * Self::penetration(&contact);

        if impact.should_attach {
            self.side = contact.side();
            self.primary_hit = Some(contact.hit);
            self.secondary_hit = None;
            self.attach(impact.ground_speed, contact.hit.surface_angle);
        } else {
            let mut relative = self.relative_velocity();
            if relative.y > 0.0 {
                relative.y = 0.0;
                self.set_relative_velocity(relative);
            }
        }
        self.notify_collision(world, contact);
    }

    /// Land on ground when the impact table allows it
    fn airborne_ground(&mut self, world: &mut World, contact: Contact) {
        let impact = resolve_impact(
            &contact.hit,
            self.relative_velocity(),
            self.gravity_direction,
            &self.impact_rules(),
        );
        if !impact.should_attach {
            trace!(
                "Body {:?} bounced off {:.1}° surface",
                self.id,
                contact.hit.surface_degrees()
            );
            return;
        }

        self.position += self.rig.up() * Self::penetration(&contact);
        self.side = contact.side();
        self.primary_hit = Some(contact.hit);
        self.secondary_hit = None;
        self.attach(impact.ground_speed, contact.hit.surface_angle);
        self.record_standing(world, contact);
        self.notify_collision(world, contact);
    }

    // === Grounded ===

    fn grounded_pass(&mut self, world: &mut World) {
        if self.checks_enabled(SensorGroup::Walls) {
            for sensor in [SensorId::WallLeft, SensorId::WallRight] {
                if let Some(contact) = self.sense(world, sensor) {
                    self.grounded_wall(world, contact);
                }
            }
        }

        if self.checks_enabled(SensorGroup::SolidObjects) {
            for sensor in [SensorId::SolidLeft, SensorId::SolidRight] {
                if let Some(contact) = self.sense(world, sensor) {
                    self.grounded_wall(world, contact);
                }
            }
        }

        if self.checks_enabled(SensorGroup::Ceiling) {
            for sensor in [SensorId::CeilingLeft, SensorId::CeilingRight] {
                if let Some(contact) = self.sense(world, sensor) {
                    self.notify_collision(world, contact);
                }
            }
        }

        if self.checks_enabled(SensorGroup::Ground) {
            self.reconcile_ground(world);
        }
    }

    /// Climb onto a gentle enough wall, otherwise stop against it
    fn grounded_wall(&mut self, world: &mut World, contact: Contact) {
        let sign = contact.side().sign();
        let toward = self.ground_velocity * sign > 0.0;
        let wall_angle = contact.hit.surface_degrees();
        let climbable = shortest_arc(self.surface_angle, wall_angle).abs() <= self.settings.max_climb_angle;

        if climbable && toward {
            trace!(
                "Body {:?} climbing from {:.1}° onto {:.1}°",
                self.id, self.surface_angle, wall_angle
            );
            self.surface_angle = wall_angle;
            self.update_wall_mode();
        } else {
            if toward {
                self.ground_velocity = 0.0;
            }
            self.position -= self.rig.right() * sign * Self::penetration(&contact);
        }
        self.notify_collision(world, contact);
    }

    /// Decide which surface the feet stand on and snap to it
    fn reconcile_ground(&mut self, world: &mut World) {
        let current = self.surface_angle;
        let max_climb = self.settings.max_climb_angle;
        let within = |contact: Option<Contact>| {
            contact.filter(|c| shortest_arc(current, c.hit.surface_degrees()).abs() <= max_climb)
        };

        let (left, right) = self.sense_pair(world, SensorId::LedgeLeft, SensorId::LedgeRight);
        let (primary, secondary) = match (within(left), within(right)) {
            (None, None) => {
                trace!("Body {:?} ran out of ground", self.id);
                self.detach();
                return;
            }
            (Some(only), None) | (None, Some(only)) => (only, None),
            (Some(l), Some(r)) => self.choose_foot(l, r),
        };

        let up = self.rig.up();
        if let Some(foot) = self.rig.foot(primary.side(), self.position) {
            self.position += up * (primary.hit.point - foot).dot(up);
        }
        self.surface_angle = primary.hit.surface_degrees();
        self.side = if secondary.is_some() { Side::Both } else { primary.side() };
        self.primary_hit = Some(primary.hit);
        self.secondary_hit = secondary.map(|c| c.hit);

        self.record_standing(world, primary);
        self.notify_collision(world, primary);
        if let Some(secondary) = secondary {
            self.record_standing(world, secondary);
            self.notify_collision(world, secondary);
        }
        self.update_wall_mode();
    }

    /// Both feet found ground: pick the primary and maybe keep the other
    fn choose_foot(&self, left: Contact, right: Contact) -> (Contact, Option<Contact>) {
        let current = self.surface_angle;
        let left_angle = left.hit.surface_degrees();
        let right_angle = right.hit.surface_degrees();

        if shortest_arc(left_angle, right_angle).abs() > self.settings.max_climb_angle {
            let left_delta = shortest_arc(current, left_angle).abs();
            let right_delta = shortest_arc(current, right_angle).abs();
            let (closer, delta) = if left_delta <= right_delta {
                (left, left_delta)
            } else {
                (right, right_delta)
            };
            if delta <= self.settings.strict_climb_angle {
                return (closer, None);
            }
        }

        let (primary, secondary) = self
            .pick_by_height(Some(left), Some(right), true, self.ground_velocity)
            .unwrap_or((left, None));
        let secondary = secondary.filter(|s| {
            (primary.hit.fraction - s.hit.fraction).abs() <= self.rig.ledge_ratio()
        });
        (primary, secondary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::PhysicsSettings;
    use crate::sim::events::ControllerEvent;
    use crate::sim::platform::{CollisionVerdict, Platform};
    use crate::sim::state::{BodyId, WallMode};
    use crate::sim::terrain::{CollisionLayers, SurfaceId, Terrain};
    use glam::Vec2;
    use proptest::prelude::*;
    use std::cell::Cell;
    use std::rc::Rc;

    const FOOT_DROP: f32 = 0.19;

    fn flat_world() -> (World, SurfaceId) {
        let mut terrain = Terrain::new();
        let floor = terrain.add_segment(Vec2::new(-10.0, 0.0), Vec2::new(10.0, 0.0), CollisionLayers::TERRAIN);
        (World::new(terrain), floor)
    }

    fn standing_body(x: f32) -> Controller {
        let mut body = Controller::new(BodyId(1), PhysicsSettings::default(), Vec2::new(x, FOOT_DROP));
        body.attach(0.0, 0.0);
        body.drain_events();
        body
    }

    #[test]
    fn test_lands_on_flat_floor() {
        let (mut world, floor) = flat_world();
        let mut body = Controller::new(BodyId(1), PhysicsSettings::default(), Vec2::new(0.0, 0.15));
        body.set_velocity(Vec2::new(2.0, -3.0));
        body.collision_pass(&mut world);

        assert!(body.is_grounded());
        assert!((body.ground_velocity() - 2.0).abs() < 1e-5);
        assert!((body.position().y - FOOT_DROP).abs() < 1e-4);
        assert_eq!(body.primary_surface(), Some(floor));
        assert!(body.just_attached());
        let events = body.drain_events();
        assert!(matches!(events[0], ControllerEvent::Attached { .. }));
    }

    #[test]
    fn test_airborne_wall_stops_horizontal_motion() {
        let mut terrain = Terrain::new();
        terrain.add_segment(Vec2::new(0.5, -5.0), Vec2::new(0.5, 5.0), CollisionLayers::TERRAIN);
        let mut world = World::new(terrain);
        let mut body = Controller::new(BodyId(1), PhysicsSettings::default(), Vec2::new(0.45, 2.0));
        body.set_velocity(Vec2::new(3.0, 1.0));
        body.collision_pass(&mut world);

        assert!(!body.is_grounded());
        assert_eq!(body.velocity().x, 0.0);
        assert_eq!(body.velocity().y, 1.0);
        assert!((body.position().x - 0.4).abs() < 1e-4);
        assert_eq!(body.collisions().len(), 1);
    }

    #[test]
    fn test_ceiling_bump_zeroes_upward_speed() {
        let mut terrain = Terrain::new();
        terrain.add_segment(Vec2::new(-5.0, 1.0), Vec2::new(5.0, 1.0), CollisionLayers::TERRAIN);
        let mut world = World::new(terrain);
        let mut body = Controller::new(BodyId(1), PhysicsSettings::default(), Vec2::new(0.0, 0.9));
        body.set_velocity(Vec2::new(1.0, 4.0));
        body.collision_pass(&mut world);

        assert!(!body.is_grounded());
        assert_eq!(body.velocity(), Vec2::new(1.0, 0.0));
        assert!((body.position().y - 0.81).abs() < 1e-4);
    }

    /// A steep overhang crossing one ceiling sensor halfway up its reach
    fn overhang_world(surface_degrees: f32, sensor_x: f32) -> (World, SurfaceId) {
        let tangent = Vec2::from_angle(surface_degrees.to_radians());
        let through = Vec2::new(sensor_x, 0.1);
        let mut terrain = Terrain::new();
        let id = terrain.add_segment(through - tangent * 2.0, through + tangent * 2.0, CollisionLayers::TERRAIN);
        (World::new(terrain), id)
    }

    #[test]
    fn test_rising_body_catches_left_overhang() {
        let (mut world, overhang) = overhang_world(250.0, -0.09);
        let mut body = Controller::new(BodyId(1), PhysicsSettings::default(), Vec2::ZERO);
        body.set_velocity(Vec2::new(0.0, 5.0));
        body.collision_pass(&mut world);

        assert!(body.is_grounded());
        assert!(body.just_attached());
        assert_eq!(body.wall_mode(), WallMode::Left);
        assert_eq!(body.primary_surface(), Some(overhang));
        assert!((body.surface_angle() - 250.0).abs() < 1e-2);
        assert!((body.ground_velocity() + 5.0).abs() < 1e-4);
        // Grounded invariant holds straight after the catch
        let expected = Vec2::from_angle(250.0_f32.to_radians()) * -5.0;
        assert!((body.velocity() - expected).length() < 1e-3);
    }

    #[test]
    fn test_rising_body_catches_right_overhang() {
        let (mut world, _) = overhang_world(110.0, 0.09);
        let mut body = Controller::new(BodyId(1), PhysicsSettings::default(), Vec2::ZERO);
        body.set_velocity(Vec2::new(0.0, 5.0));
        body.collision_pass(&mut world);

        assert!(body.is_grounded());
        assert_eq!(body.wall_mode(), WallMode::Right);
        assert!((body.ground_velocity() - 5.0).abs() < 1e-4);
    }

    #[test]
    fn test_reconcile_keeps_both_feet_on_shallow_seam() {
        // Flat on the left, 3° rise on the right, meeting under the body
        let mut terrain = Terrain::new();
        let left = terrain.add_segment(Vec2::new(-5.0, 0.0), Vec2::new(0.0, 0.0), CollisionLayers::TERRAIN);
        let rise = 3.0_f32.to_radians();
        let right = terrain.add_segment(
            Vec2::ZERO,
            Vec2::new(5.0 * rise.cos(), 5.0 * rise.sin()),
            CollisionLayers::TERRAIN,
        );
        let mut world = World::new(terrain);
        let mut body = standing_body(0.0);
        body.collision_pass(&mut world);

        assert!(body.is_grounded());
        assert_eq!(body.side(), Side::Both);
        // Right foot stands higher and drives the angle
        assert_eq!(body.primary_surface(), Some(right));
        assert_eq!(body.secondary_surface(), Some(left));
        assert!((body.surface_angle() - 3.0).abs() < 1e-3);
        assert!(body.collisions().touched(left));
        assert!(body.collisions().touched(right));
    }

    #[test]
    fn test_runs_off_ledge() {
        let mut terrain = Terrain::new();
        terrain.add_segment(Vec2::new(-5.0, 0.0), Vec2::new(0.0, 0.0), CollisionLayers::TERRAIN);
        let mut world = World::new(terrain);
        let mut body = standing_body(1.0);
        body.set_ground_velocity(4.0);
        body.collision_pass(&mut world);

        assert!(!body.is_grounded());
        assert!(body.just_detached());
        assert_eq!(body.velocity(), Vec2::new(4.0, 0.0));
    }

    #[test]
    fn test_conflicting_feet_prefer_strictly_closer() {
        // Flat on the left, a 60° wall on the right
        let mut terrain = Terrain::new();
        let flat = terrain.add_segment(Vec2::new(-5.0, 0.0), Vec2::new(0.0, 0.0), CollisionLayers::TERRAIN);
        let steep = 60.0_f32.to_radians();
        terrain.add_segment(
            Vec2::new(0.0, 0.0),
            Vec2::new(2.0 * steep.cos(), 2.0 * steep.sin()),
            CollisionLayers::TERRAIN,
        );
        let mut world = World::new(terrain);
        let mut body = standing_body(0.0);
        // Current angle 20°: both feet are within the climb limit of it
        body.surface_angle = 20.0;
        body.collision_pass(&mut world);

        assert_eq!(body.primary_surface(), Some(flat));
        assert_ne!(body.side(), Side::Both);
        assert!(body.surface_angle() < 1e-3 || body.surface_angle() > 359.999);
    }

    #[test]
    fn test_grounded_wall_blocks_ground_speed() {
        let (mut world, _) = flat_world();
        let wall = world
            .terrain
            .add_segment(Vec2::new(0.08, 0.0), Vec2::new(0.08, 3.0), CollisionLayers::TERRAIN);
        let mut body = standing_body(0.0);
        body.set_ground_velocity(3.0);
        body.collision_pass(&mut world);

        assert!(body.is_grounded());
        assert_eq!(body.ground_velocity(), 0.0);
        assert!((body.position().x + 0.02).abs() < 1e-4);
        assert!(body.collisions().touched(wall));
    }

    struct Breakable {
        broken: Rc<Cell<bool>>,
    }

    impl Platform for Breakable {
        fn on_pre_collision(&mut self, _contact: &Contact) -> CollisionVerdict {
            if self.broken.get() {
                CollisionVerdict::Ignore
            } else {
                CollisionVerdict::Proceed
            }
        }
    }

    #[test]
    fn test_platform_veto_skips_landing() {
        let (mut world, floor) = flat_world();
        let broken = Rc::new(Cell::new(true));
        world.platforms.insert(floor, Box::new(Breakable { broken: broken.clone() }));

        let mut body = Controller::new(BodyId(1), PhysicsSettings::default(), Vec2::new(0.0, 0.15));
        body.set_velocity(Vec2::new(0.0, -3.0));
        body.collision_pass(&mut world);
        assert!(!body.is_grounded());
        assert!(body.collisions().is_empty());

        broken.set(false);
        body.collision_pass(&mut world);
        assert!(body.is_grounded());
    }

    #[test]
    fn test_listener_veto_is_consumed_per_query() {
        let (mut world, _) = flat_world();
        let mut body = Controller::new(BodyId(1), PhysicsSettings::default(), Vec2::new(0.0, 0.15));
        body.set_velocity(Vec2::new(0.0, -3.0));

        // Veto only the left foot; the right foot still lands
        body.add_pre_collision_listener(|controller, contact| {
            if contact.sensor == SensorId::GroundLeft {
                assert!(controller.ignore_this_collision().is_ok());
            }
        });
        body.collision_pass(&mut world);

        assert!(body.is_grounded());
        assert_eq!(body.side(), Side::Right);
        assert!(body.ignore_this_collision().is_err());
    }

    proptest! {
        #[test]
        fn prop_level_tie_follows_travel(gv in -8.0f32..8.0) {
            prop_assume!(gv.abs() > 1e-3);
            let (mut world, _) = flat_world();
            let mut body = standing_body(0.0);
            body.set_ground_velocity(gv);
            body.collision_pass(&mut world);

            let primary = body.primary_hit().copied();
            prop_assert!(primary.is_some());
            let expected = if gv < 0.0 { Side::Left } else { Side::Right };
            prop_assert_eq!(primary.map(|h| h.side), Some(expected));
            prop_assert_eq!(body.side(), Side::Both);
        }

        #[test]
        fn prop_higher_foot_is_primary(step in 0.01f32..0.12) {
            // Raised block under the right foot only
            let mut terrain = Terrain::new();
            terrain.add_segment(Vec2::new(-5.0, 0.0), Vec2::new(0.0, 0.0), CollisionLayers::TERRAIN);
            terrain.add_segment(Vec2::new(0.0, step), Vec2::new(5.0, step), CollisionLayers::TERRAIN);
            let mut world = World::new(terrain);
            let mut body = standing_body(0.0);
            body.set_ground_velocity(-1.0);
            body.collision_pass(&mut world);

            let primary = body.primary_hit().copied();
            prop_assert_eq!(primary.map(|h| h.side), Some(Side::Right));
            let up = body.rig().up();
            let foot_height = body.position().dot(up) - FOOT_DROP;
            prop_assert!((foot_height - step).abs() < 1e-3);
        }
    }
}
