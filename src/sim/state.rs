//! Controller state (deterministic, serializable snapshot)
//!
//! A [`Controller`] owns one body's kinematic state, its sensor rig and the
//! observers wired into it. The per-tick update lives in `tick.rs` and the
//! collision passes in `collision.rs`; both are further `impl` blocks on
//! the same type.

use std::rc::Rc;

use glam::Vec2;
use log::{debug, error, trace, warn};
use serde::{Deserialize, Serialize};

use super::contact::{Collision, Contact, ContactTracker};
use super::events::ControllerEvent;
use super::hooks::{HookId, HookPoint, Hooks};
use super::platform::CollisionVerdict;
use super::sensors::{SensorGroup, SensorId, SensorRig, Side};
use super::solver::SurfaceSolver;
use super::terrain::{Aabb, CastQuery, SurfaceId, TerrainHit, World, ZeroFraction};
use crate::error::ControllerError;
use crate::settings::PhysicsSettings;
use crate::{absolute_angle, normalize_angle, relative_angle, rotate, scalar_projection, shortest_arc, unit_vector};

/// Identity of a simulated body
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct BodyId(pub u32);

/// Cardinal orientation of the sensor rig while grounded
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum WallMode {
    /// Airborne
    #[default]
    None,
    Floor,
    Right,
    Ceiling,
    Left,
}

impl WallMode {
    /// Relative angle the mode is centred on (degrees)
    pub fn center(self) -> f32 {
        match self {
            WallMode::None | WallMode::Floor => 0.0,
            WallMode::Right => 90.0,
            WallMode::Ceiling => 180.0,
            WallMode::Left => 270.0,
        }
    }

    /// Band lookup used when landing
    pub fn from_attach_angle(relative: f32) -> Self {
        let angle = normalize_angle(relative);
        if angle >= 310.0 || angle <= 50.0 {
            WallMode::Floor
        } else if angle <= 130.0 {
            WallMode::Right
        } else if angle <= 220.0 {
            WallMode::Ceiling
        } else {
            WallMode::Left
        }
    }

    /// Nearest quadrant, no hysteresis
    fn nearest(relative: f32) -> Self {
        match ((normalize_angle(relative) / 90.0).round() as i32).rem_euclid(4) {
            0 => WallMode::Floor,
            1 => WallMode::Right,
            2 => WallMode::Ceiling,
            _ => WallMode::Left,
        }
    }

    /// Mode for a new relative angle. Only leaves the current mode once the
    /// angle is more than `tolerance` past the 45° boundary.
    pub fn next(self, relative: f32, tolerance: f32) -> Self {
        if self == WallMode::None {
            return WallMode::from_attach_angle(relative);
        }
        if shortest_arc(self.center(), relative).abs() <= 45.0 + tolerance {
            self
        } else {
            WallMode::nearest(relative)
        }
    }
}

/// The mode a body just left, protected for a short time
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RevertBuffer {
    pub mode: WallMode,
    /// Seconds remaining
    pub timer: f32,
}

/// Handle for a registered pre-collision listener
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ListenerId(u64);

/// Called before a collision is applied; may call
/// [`Controller::ignore_this_collision`] to cancel it
pub type PreCollisionListener = Rc<dyn Fn(&mut Controller, &Contact)>;

/// Serializable view of a body for traces and UI binding
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BodySnapshot {
    pub id: BodyId,
    pub tick: u64,
    pub position: Vec2,
    pub velocity: Vec2,
    pub ground_velocity: f32,
    pub surface_angle: f32,
    pub gravity_direction: f32,
    pub grounded: bool,
    pub wall_mode: WallMode,
    pub side: Side,
    pub surface: Option<SurfaceId>,
    pub interrupted: bool,
}

/// One body's physics controller
pub struct Controller {
    pub(super) id: BodyId,
    pub(super) settings: PhysicsSettings,

    // === Kinematics ===
    pub(super) position: Vec2,
    pub(super) velocity: Vec2,
    pub(super) ground_velocity: f32,
    pub(super) gravity_direction: f32,

    // === Ground state ===
    pub(super) grounded: bool,
    /// Absolute surface angle (degrees)
    pub(super) surface_angle: f32,
    pub(super) wall_mode: WallMode,
    pub(super) side: Side,
    pub(super) primary_hit: Option<TerrainHit>,
    pub(super) secondary_hit: Option<TerrainHit>,
    pub(super) just_attached: bool,
    pub(super) just_detached: bool,
    pub(super) revert_buffer: Option<RevertBuffer>,

    /// Never leave the ground while set (forced-path sections)
    pub disable_detach: bool,

    pub(super) solver: Option<Box<dyn SurfaceSolver>>,
    /// Seconds left; infinite until resumed
    pub(super) interrupt_timer: Option<f32>,

    pub(super) rig: SensorRig,
    pub(super) hooks: Hooks,
    pre_collision: Vec<(ListenerId, PreCollisionListener)>,
    next_listener: u64,
    pre_collision_depth: u32,
    ignore_collision: bool,

    pub(super) contacts: ContactTracker,
    pub(super) events: Vec<ControllerEvent>,
    pub(super) collisions: Collision,
    pub(super) last_substeps: u32,
    pub(super) time_ticks: u64,
}

impl std::fmt::Debug for Controller {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Controller")
            .field("id", &self.id)
            .field("position", &self.position)
            .field("velocity", &self.velocity)
            .field("ground_velocity", &self.ground_velocity)
            .field("surface_angle", &self.surface_angle)
            .field("grounded", &self.grounded)
            .field("wall_mode", &self.wall_mode)
            .field("solver", &self.solver.is_some())
            .finish_non_exhaustive()
    }
}

impl Controller {
    /// Create an airborne body at `position`
    pub fn new(id: BodyId, settings: PhysicsSettings, position: Vec2) -> Self {
        let rig = SensorRig::new(settings.sensors, settings.ledge_climb_height, settings.ledge_drop_height);
        report_missing_sensors(id, &rig);
        let mut controller = Self {
            id,
            gravity_direction: normalize_angle(settings.gravity_direction),
            settings,
            position,
            velocity: Vec2::ZERO,
            ground_velocity: 0.0,
            grounded: false,
            surface_angle: 0.0,
            wall_mode: WallMode::None,
            side: Side::None,
            primary_hit: None,
            secondary_hit: None,
            just_attached: false,
            just_detached: false,
            revert_buffer: None,
            disable_detach: false,
            solver: None,
            interrupt_timer: None,
            rig,
            hooks: Hooks::default(),
            pre_collision: Vec::new(),
            next_listener: 0,
            pre_collision_depth: 0,
            ignore_collision: false,
            contacts: ContactTracker::default(),
            events: Vec::new(),
            collisions: Collision::default(),
            last_substeps: 0,
            time_ticks: 0,
        };
        controller.orient_rig();
        controller.rig.refresh_bounds(position);
        controller
    }

    // === Readable state ===

    pub fn id(&self) -> BodyId {
        self.id
    }

    pub fn settings(&self) -> &PhysicsSettings {
        &self.settings
    }

    pub fn position(&self) -> Vec2 {
        self.position
    }

    pub fn velocity(&self) -> Vec2 {
        self.velocity
    }

    pub fn ground_velocity(&self) -> f32 {
        self.ground_velocity
    }

    /// Absolute surface angle in degrees, [0, 360)
    pub fn surface_angle(&self) -> f32 {
        self.surface_angle
    }

    pub fn relative_surface_angle(&self) -> f32 {
        relative_angle(self.surface_angle, self.gravity_direction)
    }

    pub fn gravity_direction(&self) -> f32 {
        self.gravity_direction
    }

    pub fn is_grounded(&self) -> bool {
        self.grounded
    }

    pub fn wall_mode(&self) -> WallMode {
        self.wall_mode
    }

    pub fn side(&self) -> Side {
        self.side
    }

    pub fn primary_surface(&self) -> Option<SurfaceId> {
        self.primary_hit.map(|hit| hit.surface)
    }

    pub fn secondary_surface(&self) -> Option<SurfaceId> {
        self.secondary_hit.map(|hit| hit.surface)
    }

    pub fn primary_hit(&self) -> Option<&TerrainHit> {
        self.primary_hit.as_ref()
    }

    pub fn just_attached(&self) -> bool {
        self.just_attached
    }

    pub fn just_detached(&self) -> bool {
        self.just_detached
    }

    pub fn revert_buffer(&self) -> Option<RevertBuffer> {
        self.revert_buffer
    }

    pub fn is_interrupted(&self) -> bool {
        self.interrupt_timer.is_some()
    }

    pub fn has_surface_solver(&self) -> bool {
        self.solver.is_some()
    }

    pub fn rig(&self) -> &SensorRig {
        &self.rig
    }

    /// Sensor bounds as of the last tick
    pub fn bounds(&self) -> Aabb {
        self.rig.bounds()
    }

    /// Contacts collected during the last tick
    pub fn collisions(&self) -> &Collision {
        &self.collisions
    }

    /// Movement sub-steps taken during the last tick
    pub fn last_substep_count(&self) -> u32 {
        self.last_substeps
    }

    pub fn time_ticks(&self) -> u64 {
        self.time_ticks
    }

    pub fn is_touching(&self, surface: SurfaceId) -> bool {
        self.contacts.is_touching(surface)
    }

    pub fn is_standing_on(&self, surface: SurfaceId) -> bool {
        self.contacts.is_standing_on(surface)
    }

    /// Take every event queued since the last call
    pub fn drain_events(&mut self) -> Vec<ControllerEvent> {
        std::mem::take(&mut self.events)
    }

    pub fn snapshot(&self) -> BodySnapshot {
        BodySnapshot {
            id: self.id,
            tick: self.time_ticks,
            position: self.position,
            velocity: self.velocity,
            ground_velocity: self.ground_velocity,
            surface_angle: self.surface_angle,
            gravity_direction: self.gravity_direction,
            grounded: self.grounded,
            wall_mode: self.wall_mode,
            side: self.side,
            surface: self.primary_surface(),
            interrupted: self.is_interrupted(),
        }
    }

    // === Commands ===

    /// Swap in new settings. The rig is rebuilt; kinematic state is kept.
    pub fn set_settings(&mut self, settings: PhysicsSettings) {
        self.rig = SensorRig::new(settings.sensors, settings.ledge_climb_height, settings.ledge_drop_height);
        report_missing_sensors(self.id, &self.rig);
        self.settings = settings;
        self.orient_rig();
        self.rig.refresh_bounds(self.position);
    }

    pub fn set_position(&mut self, position: Vec2) {
        self.position = position;
    }

    /// Set world velocity. While grounded only the part along the surface
    /// is kept.
    pub fn set_velocity(&mut self, velocity: Vec2) {
        if self.grounded {
            self.ground_velocity = scalar_projection(velocity, self.surface_angle.to_radians());
            self.sync_velocity();
        } else {
            self.velocity = velocity;
        }
    }

    pub fn set_ground_velocity(&mut self, ground_velocity: f32) {
        self.ground_velocity = ground_velocity;
        self.sync_velocity();
    }

    /// Add an impulse; while grounded it is projected onto the surface
    pub fn push_on_ground(&mut self, impulse: Vec2) {
        if self.grounded {
            self.ground_velocity += scalar_projection(impulse, self.surface_angle.to_radians());
            self.sync_velocity();
        } else {
            self.velocity += impulse;
        }
    }

    /// Velocity in the gravity frame (+Y is "up" against gravity)
    pub fn relative_velocity(&self) -> Vec2 {
        rotate(self.velocity, (270.0 - self.gravity_direction).to_radians())
    }

    pub fn set_relative_velocity(&mut self, relative: Vec2) {
        self.set_velocity(rotate(relative, (self.gravity_direction - 270.0).to_radians()));
    }

    pub fn set_gravity_direction(&mut self, degrees: f32) {
        self.gravity_direction = normalize_angle(degrees);
        if self.grounded {
            let mode = WallMode::from_attach_angle(self.relative_surface_angle());
            self.set_wall_mode(mode);
            self.revert_buffer = None;
        }
    }

    /// Land on a surface with `ground_speed` along it. Re-landing while
    /// already grounded only updates the surface.
    pub fn attach(&mut self, ground_speed: f32, surface_angle_radians: f32) {
        let was_grounded = self.grounded;
        self.grounded = true;
        self.surface_angle = normalize_angle(surface_angle_radians.to_degrees());
        self.ground_velocity = ground_speed;

        if was_grounded {
            self.update_wall_mode();
        } else {
            self.wall_mode = WallMode::from_attach_angle(self.relative_surface_angle());
            self.revert_buffer = None;
            self.just_attached = true;
            debug!(
                "Body {:?} attached at {:.1}° ({:?}), ground speed {:.3}",
                self.id, self.surface_angle, self.wall_mode, ground_speed
            );
            self.events.push(ControllerEvent::Attached {
                ground_speed,
                surface_angle: self.surface_angle,
            });
        }
        self.sync_velocity();
    }

    /// Leave the ground. Fires at most one detach per grounded stretch.
    pub fn detach(&mut self) {
        if self.disable_detach {
            trace!("Body {:?} detach suppressed", self.id);
            return;
        }
        let was_grounded = self.grounded;
        self.grounded = false;
        self.wall_mode = WallMode::None;
        self.side = Side::None;
        self.primary_hit = None;
        self.secondary_hit = None;
        self.revert_buffer = None;
        self.unplug_solver();

        if was_grounded {
            self.just_detached = true;
            debug!("Body {:?} detached at {:?}", self.id, self.position);
            self.events.push(ControllerEvent::Detached);
        }
    }

    /// Fall off a wall or ceiling for moving too slowly
    pub(super) fn detach_steep(&mut self) {
        if !self.grounded || self.disable_detach {
            return;
        }
        self.detach();
        debug!("Body {:?} too slow for a {:.1}° surface", self.id, self.relative_surface_angle());
        self.events.push(ControllerEvent::SteepDetached);
    }

    /// Suspend simulation for `seconds` (infinity waits for [`Self::resume`])
    pub fn interrupt(&mut self, seconds: f32) {
        let duration = if seconds.is_nan() { 0.0 } else { seconds.max(0.0) };
        self.interrupt_timer = Some(duration);
        debug!("Body {:?} interrupted for {duration}s", self.id);
        self.events.push(ControllerEvent::Interrupted { duration });
    }

    pub fn resume(&mut self) {
        if self.interrupt_timer.take().is_some() {
            debug!("Body {:?} resumed", self.id);
            self.events.push(ControllerEvent::Resumed);
        }
    }

    /// Plug in (or with `None`, remove) a custom surface solver.
    /// The old solver hears about its removal first.
    pub fn set_surface_solver(&mut self, solver: Option<Box<dyn SurfaceSolver>>) {
        self.unplug_solver();
        if let Some(mut solver) = solver {
            solver.on_plugged(self.id);
            self.solver = Some(solver);
            debug!("Body {:?} surface solver plugged", self.id);
            self.events.push(ControllerEvent::SolverPlugged);
        }
    }

    pub(super) fn unplug_solver(&mut self) {
        if let Some(mut old) = self.solver.take() {
            old.on_unplugged(self.id);
            debug!("Body {:?} surface solver unplugged", self.id);
            self.events.push(ControllerEvent::SolverUnplugged);
        }
    }

    // === Hooks and listeners ===

    pub fn add_hook(&mut self, point: HookPoint, hook: impl Fn(&mut Controller) + 'static) -> HookId {
        self.hooks.add(point, Rc::new(hook))
    }

    pub fn remove_hook(&mut self, id: HookId) -> bool {
        self.hooks.remove(id)
    }

    pub(super) fn run_hooks(&mut self, point: HookPoint) {
        for hook in self.hooks.snapshot(point) {
            hook(self);
        }
    }

    pub fn add_pre_collision_listener(
        &mut self,
        listener: impl Fn(&mut Controller, &Contact) + 'static,
    ) -> ListenerId {
        let id = ListenerId(self.next_listener);
        self.next_listener += 1;
        let listener: PreCollisionListener = Rc::new(listener);
        self.pre_collision.push((id, listener));
        id
    }

    pub fn remove_pre_collision_listener(&mut self, id: ListenerId) -> bool {
        let before = self.pre_collision.len();
        self.pre_collision.retain(|(listener_id, _)| *listener_id != id);
        self.pre_collision.len() != before
    }

    /// Cancel the collision currently being queried. Only legal from inside
    /// a pre-collision listener.
    pub fn ignore_this_collision(&mut self) -> Result<(), ControllerError> {
        if self.pre_collision_depth == 0 {
            let err = ControllerError::IgnoreOutsidePreCollision;
            error!("Body {:?}: {err}", self.id);
            return Err(err);
        }
        self.ignore_collision = true;
        Ok(())
    }

    /// Ask the platform and every listener whether this collision may
    /// happen. Returns false if any of them vetoed it.
    pub(super) fn query_pre_collision(&mut self, world: &mut World, contact: &Contact) -> bool {
        let outer_flag = std::mem::replace(&mut self.ignore_collision, false);
        self.pre_collision_depth += 1;

        let mut vetoed = world
            .platforms
            .get_mut(contact.surface())
            .is_some_and(|platform| platform.on_pre_collision(contact) == CollisionVerdict::Ignore);

        let listeners: Vec<PreCollisionListener> = self.pre_collision.iter().map(|(_, l)| l.clone()).collect();
        for listener in listeners {
            listener(self, contact);
        }
        vetoed |= self.ignore_collision;

        self.pre_collision_depth -= 1;
        self.ignore_collision = outer_flag;

        if vetoed {
            trace!("Body {:?} collision with {:?} ignored", self.id, contact.surface());
        }
        !vetoed
    }

    /// Report a collision whose response has been applied
    pub(super) fn notify_collision(&mut self, world: &mut World, contact: Contact) {
        if let Some(platform) = world.platforms.get_mut(contact.surface()) {
            platform.on_collision(&contact);
            self.contacts.touch(contact);
        }
        self.collisions.push(contact);
        self.events.push(ControllerEvent::Collision(contact));
    }

    /// Record that the body stands on this contact's surface
    pub(super) fn record_standing(&mut self, world: &World, contact: Contact) {
        if world.platforms.get(contact.surface()).is_some() {
            self.contacts.stand_on(contact);
        }
    }

    // === Sensors ===

    /// Whether the rig has the probes a check category depends on
    pub fn checks_enabled(&self, group: SensorGroup) -> bool {
        self.rig.layout().has(group)
    }

    /// Cast one sensor against the world from the current pose
    pub fn probe(&self, world: &World, sensor: SensorId) -> Result<Option<TerrainHit>, ControllerError> {
        if !self.checks_enabled(sensor.group()) {
            return Err(ControllerError::SensorGroupMissing(sensor.group()));
        }
        Ok(self.cast_sensor(world, sensor))
    }

    pub(super) fn cast_sensor(&self, world: &World, sensor: SensorId) -> Option<TerrainHit> {
        let (start, end) = self.rig.segment(sensor, self.position)?;
        let zero_fraction = match sensor {
            SensorId::LedgeLeft | SensorId::LedgeRight => ZeroFraction::Reject,
            _ => ZeroFraction::Accept,
        };
        world.cast(&CastQuery {
            start,
            end,
            side: sensor.side(),
            mask: self.settings.collision_mask,
            zero_fraction,
            ledge_blockers_only: sensor.group() == SensorGroup::SolidObjects,
            body: self.id,
        })
    }

    /// Snapshot of the body touching `hit` right now
    pub(super) fn contact(&self, sensor: SensorId, hit: TerrainHit) -> Contact {
        Contact {
            sensor,
            hit,
            velocity: self.velocity,
            ground_velocity: self.ground_velocity,
            surface_angle: self.surface_angle,
            grounded: self.grounded,
        }
    }

    // === Derived state ===

    /// Rig rotation: gravity while airborne, wall mode while grounded
    pub(super) fn orient_rig(&mut self) {
        let relative = if self.grounded { self.wall_mode.center() } else { 0.0 };
        self.rig.orient(absolute_angle(relative, self.gravity_direction));
    }

    /// Grounded bodies move exactly along the surface
    pub(super) fn sync_velocity(&mut self) {
        if self.grounded {
            self.velocity = unit_vector(self.surface_angle.to_radians()) * self.ground_velocity;
        }
    }

    fn set_wall_mode(&mut self, mode: WallMode) {
        if mode == self.wall_mode {
            return;
        }
        let from = self.wall_mode;
        self.wall_mode = mode;
        debug!("Body {:?} wall mode {:?} -> {:?}", self.id, from, mode);
        self.events.push(ControllerEvent::WallModeChanged { from, to: mode });
    }

    /// Follow the surface angle with hysteresis and the revert buffer
    pub(super) fn update_wall_mode(&mut self) {
        if !self.grounded {
            return;
        }
        let candidate = self
            .wall_mode
            .next(self.relative_surface_angle(), self.settings.wall_mode_switch_tolerance);
        if candidate == self.wall_mode {
            return;
        }
        if let Some(buffer) = self.revert_buffer {
            if buffer.mode == candidate && self.ground_velocity.abs() <= self.settings.wall_mode_revert_max_speed {
                trace!("Body {:?} revert to {:?} held back", self.id, candidate);
                return;
            }
        }
        let from = self.wall_mode;
        self.set_wall_mode(candidate);
        self.revert_buffer = Some(RevertBuffer {
            mode: from,
            timer: self.settings.wall_mode_revert_buffer,
        });
    }
}

fn report_missing_sensors(id: BodyId, rig: &SensorRig) {
    for group in [
        SensorGroup::Ceiling,
        SensorGroup::Ground,
        SensorGroup::Walls,
        SensorGroup::SolidObjects,
    ] {
        if !rig.layout().has(group) {
            warn!("Body {:?}: {}; those checks are disabled", id, ControllerError::SensorGroupMissing(group));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::solver::{SolverRequest, SolverResponse};
    use std::cell::{Cell, RefCell};

    fn body() -> Controller {
        Controller::new(BodyId(1), PhysicsSettings::default(), Vec2::ZERO)
    }

    fn count(events: &[ControllerEvent], name: &str) -> usize {
        events.iter().filter(|e| e.name() == name).count()
    }

    #[test]
    fn test_wall_mode_attach_bands() {
        assert_eq!(WallMode::from_attach_angle(0.0), WallMode::Floor);
        assert_eq!(WallMode::from_attach_angle(50.0), WallMode::Floor);
        assert_eq!(WallMode::from_attach_angle(310.0), WallMode::Floor);
        assert_eq!(WallMode::from_attach_angle(50.5), WallMode::Right);
        assert_eq!(WallMode::from_attach_angle(130.0), WallMode::Right);
        assert_eq!(WallMode::from_attach_angle(131.0), WallMode::Ceiling);
        assert_eq!(WallMode::from_attach_angle(220.0), WallMode::Ceiling);
        assert_eq!(WallMode::from_attach_angle(221.0), WallMode::Left);
        assert_eq!(WallMode::from_attach_angle(309.0), WallMode::Left);
    }

    #[test]
    fn test_wall_mode_hysteresis() {
        assert_eq!(WallMode::Floor.next(40.0, 5.0), WallMode::Floor);
        assert_eq!(WallMode::Floor.next(46.0, 5.0), WallMode::Floor);
        assert_eq!(WallMode::Floor.next(51.0, 5.0), WallMode::Right);
        assert_eq!(WallMode::Floor.next(311.0, 5.0), WallMode::Floor);
        assert_eq!(WallMode::Floor.next(309.0, 5.0), WallMode::Left);
        // Coming back down a wall needs the same margin
        assert_eq!(WallMode::Right.next(44.0, 5.0), WallMode::Right);
        assert_eq!(WallMode::Right.next(39.0, 5.0), WallMode::Floor);
    }

    #[test]
    fn test_floor_to_right_through_controller() {
        let mut body = body();
        body.attach(5.0, 40.0_f32.to_radians());
        assert_eq!(body.wall_mode(), WallMode::Floor);

        body.surface_angle = 46.0;
        body.update_wall_mode();
        assert_eq!(body.wall_mode(), WallMode::Floor);

        body.surface_angle = 51.0;
        body.update_wall_mode();
        assert_eq!(body.wall_mode(), WallMode::Right);
        assert_eq!(body.revert_buffer().map(|b| b.mode), Some(WallMode::Floor));
    }

    #[test]
    fn test_revert_buffer_blocks_slow_flip_back() {
        let mut body = body();
        body.attach(1.0, 0.0);
        body.surface_angle = 60.0;
        body.update_wall_mode();
        assert_eq!(body.wall_mode(), WallMode::Right);

        // Slow: the old mode is protected
        body.surface_angle = 30.0;
        body.update_wall_mode();
        assert_eq!(body.wall_mode(), WallMode::Right);

        // Fast enough to break through
        body.ground_velocity = 4.0;
        body.update_wall_mode();
        assert_eq!(body.wall_mode(), WallMode::Floor);
    }

    #[test]
    fn test_grounded_velocity_follows_surface() {
        let mut body = body();
        body.attach(2.0, 30.0_f32.to_radians());
        let expected = unit_vector(30.0_f32.to_radians()) * 2.0;
        assert!((body.velocity() - expected).length() < 1e-5);

        body.set_velocity(Vec2::new(4.0, 0.0));
        let gv = 4.0 * 30.0_f32.to_radians().cos();
        assert!((body.ground_velocity() - gv).abs() < 1e-5);
        assert!((body.velocity() - unit_vector(30.0_f32.to_radians()) * gv).length() < 1e-5);

        body.push_on_ground(Vec2::new(0.0, -10.0));
        assert!(body.ground_velocity() < gv);
    }

    #[test]
    fn test_attach_twice_fires_once() {
        let mut body = body();
        body.attach(1.0, 0.0);
        body.attach(2.0, 0.1);
        let events = body.drain_events();
        assert_eq!(count(&events, "attached"), 1);
        assert_eq!(body.ground_velocity(), 2.0);
        assert!(body.just_attached());
    }

    #[test]
    fn test_detach_idempotent() {
        let mut body = body();
        body.attach(1.0, 0.0);
        body.detach();
        body.detach();
        let events = body.drain_events();
        assert_eq!(count(&events, "detached"), 1);
        assert!(!body.is_grounded());
        assert_eq!(body.wall_mode(), WallMode::None);
        assert_eq!(body.side(), Side::None);
    }

    #[test]
    fn test_detach_can_be_disabled() {
        let mut body = body();
        body.attach(1.0, 0.0);
        body.disable_detach = true;
        body.detach();
        assert!(body.is_grounded());
    }

    #[test]
    fn test_relative_velocity_under_sideways_gravity() {
        let mut body = body();
        body.set_gravity_direction(0.0);
        body.set_velocity(Vec2::new(3.0, 0.0));
        let relative = body.relative_velocity();
        // Moving along gravity reads as falling
        assert!(relative.x.abs() < 1e-5);
        assert!((relative.y + 3.0).abs() < 1e-5);

        body.set_relative_velocity(Vec2::new(0.0, 2.0));
        assert!((body.velocity() - Vec2::new(-2.0, 0.0)).length() < 1e-5);
    }

    #[test]
    fn test_gravity_change_rederives_wall_mode() {
        let mut body = body();
        body.attach(3.0, 90.0_f32.to_radians());
        assert_eq!(body.wall_mode(), WallMode::Right);

        // Gravity now pulls right: the wall underfoot reads as floor
        body.set_gravity_direction(0.0);
        assert_eq!(body.wall_mode(), WallMode::Floor);
        assert!((body.relative_surface_angle() - 0.0).abs() < 1e-3);
    }

    #[test]
    fn test_ignore_outside_callback_is_error() {
        let mut body = body();
        assert_eq!(body.ignore_this_collision(), Err(ControllerError::IgnoreOutsidePreCollision));
    }

    #[test]
    fn test_interrupt_and_resume_events() {
        let mut body = body();
        body.interrupt(f32::INFINITY);
        assert!(body.is_interrupted());
        body.resume();
        body.resume();
        let events = body.drain_events();
        assert_eq!(count(&events, "interrupted"), 1);
        assert_eq!(count(&events, "resumed"), 1);
    }

    struct Recorder {
        log: Rc<RefCell<Vec<&'static str>>>,
        name: &'static str,
    }

    impl SurfaceSolver for Recorder {
        fn on_plugged(&mut self, _body: BodyId) {
            self.log.borrow_mut().push(self.name);
        }

        fn on_unplugged(&mut self, _body: BodyId) {
            self.log.borrow_mut().push("unplugged");
        }

        fn solve(&mut self, _request: &SolverRequest) -> SolverResponse {
            SolverResponse::detach()
        }
    }

    #[test]
    fn test_solver_swap_order() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut body = body();
        body.set_surface_solver(Some(Box::new(Recorder {
            log: log.clone(),
            name: "first",
        })));
        body.set_surface_solver(Some(Box::new(Recorder {
            log: log.clone(),
            name: "second",
        })));
        assert_eq!(*log.borrow(), vec!["first", "unplugged", "second"]);

        body.attach(1.0, 0.0);
        body.detach();
        assert!(!body.has_surface_solver());
        assert_eq!(log.borrow().last(), Some(&"unplugged"));
    }

    #[test]
    fn test_listener_removal() {
        let mut body = body();
        let calls = Rc::new(Cell::new(0));
        let seen = calls.clone();
        let id = body.add_pre_collision_listener(move |_, _| seen.set(seen.get() + 1));
        assert!(body.remove_pre_collision_listener(id));
        assert!(!body.remove_pre_collision_listener(id));
        assert_eq!(calls.get(), 0);
    }

    #[test]
    fn test_missing_sensor_group_probe_errors() {
        let settings = PhysicsSettings {
            sensors: crate::sim::sensors::SensorLayout {
                ceiling: None,
                ..Default::default()
            },
            ..Default::default()
        };
        let body = Controller::new(BodyId(2), settings, Vec2::ZERO);
        let world = World::default();
        assert!(!body.checks_enabled(SensorGroup::Ceiling));
        assert_eq!(
            body.probe(&world, SensorId::CeilingLeft),
            Err(ControllerError::SensorGroupMissing(SensorGroup::Ceiling))
        );
        assert_eq!(body.probe(&world, SensorId::GroundLeft), Ok(None));
    }
}
