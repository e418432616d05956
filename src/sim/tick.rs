//! Fixed timestep simulation tick
//!
//! Advances each body deterministically: forces, sub-stepped movement with
//! a collision pass after every sub-step, then contact reconciliation.

use glam::Vec2;
use log::{error, trace};

use super::hooks::HookPoint;
use super::impact::is_wall_steep;
use super::solver::{SolverOutcome, SolverRequest};
use super::state::{BodyId, Controller};
use super::terrain::World;
use crate::consts::{MAX_ANTI_TUNNELING_STEPS, MAX_STEPS_PER_FRAME, SIM_DT};
use crate::settings::PhysicsSettings;
use crate::{normalize_angle, scalar_projection, shortest_arc, unit_vector};

impl Controller {
    /// Advance this body by one fixed timestep
    pub fn tick(&mut self, world: &mut World, dt: f32) {
        // One-tick flags live until the start of the next tick
        self.just_attached = false;
        self.just_detached = false;

        if let Some(remaining) = self.interrupt_timer {
            let remaining = remaining - dt;
            if remaining > 0.0 {
                self.interrupt_timer = Some(remaining);
                return;
            }
            self.resume();
        }

        self.collisions.clear();
        self.last_substeps = 0;
        self.tick_revert_buffer(dt);

        // Rig rotation is fixed for the rest of the tick
        self.orient_rig();
        self.sync_velocity();

        self.run_hooks(HookPoint::BeforeForces);
        self.apply_forces(dt);
        self.sync_velocity();
        self.run_hooks(HookPoint::AfterForces);

        self.run_hooks(HookPoint::BeforeMovement);
        self.move_body(world, dt);
        self.run_hooks(HookPoint::AfterMovement);
        self.sync_velocity();

        self.contacts.reconcile(&mut world.platforms, &mut self.events);
        self.rig.refresh_bounds(self.position);
        self.time_ticks += 1;
    }

    fn tick_revert_buffer(&mut self, dt: f32) {
        let expired = match self.revert_buffer.as_mut() {
            Some(buffer) => {
                buffer.timer -= dt;
                buffer.timer <= 0.0
            }
            None => false,
        };
        if expired {
            self.revert_buffer = None;
        }
    }

    fn apply_forces(&mut self, dt: f32) {
        if self.grounded {
            self.apply_ground_forces(dt);
        } else {
            self.apply_air_forces(dt);
        }
    }

    fn apply_ground_forces(&mut self, dt: f32) {
        let s = &self.settings;
        let relative = self.relative_surface_angle();
        let before = self.ground_velocity;
        let mut gv = before;

        // Slope gravity outside the flat deadband
        if shortest_arc(0.0, relative).abs() > s.slope_gravity_begin_angle {
            gv -= s.slope_gravity * relative.to_radians().sin() * dt;
        }

        // Friction toward zero, never past it
        let friction = s.ground_friction * dt;
        gv = if gv.abs() <= friction {
            0.0
        } else {
            gv - friction * gv.signum()
        };

        gv = gv.clamp(-s.max_speed, s.max_speed);
        let too_slow = !s.disable_wall_detach && gv.abs() < s.detach_speed && is_wall_steep(relative);
        self.ground_velocity = gv;

        if before != 0.0 && gv != 0.0 && before.signum() != gv.signum() {
            trace!("Body {:?} reversed, revert buffer cleared", self.id);
            self.revert_buffer = None;
        }

        if too_slow {
            self.detach_steep();
        }
    }

    fn apply_air_forces(&mut self, dt: f32) {
        let s = &self.settings;
        let gravity = unit_vector(self.gravity_direction.to_radians()) * s.air_gravity * dt;
        self.velocity += gravity;

        let mut relative = self.relative_velocity();
        if relative.y > 0.0
            && relative.y < s.air_drag_vertical_band
            && relative.x.abs() > s.air_drag_horizontal_threshold
        {
            relative.x -= relative.x * s.air_drag * dt;
            self.set_relative_velocity(relative);
        }
    }

    /// Move by this tick's velocity, sub-stepping fast bodies
    fn move_body(&mut self, world: &mut World, dt: f32) {
        if self.solver.is_some() {
            // The solver replaces the collision pass, not its hooks
            self.run_hooks(HookPoint::BeforeCollisions);
            self.move_with_solver(dt);
            self.sync_velocity();
            self.run_hooks(HookPoint::AfterCollisions);
            return;
        }

        let distance = self.velocity.length() * dt;
        let threshold = self.settings.anti_tunneling_speed;
        if self.velocity.length() <= threshold || distance <= 0.0 {
            self.position += self.velocity * dt;
            self.last_substeps = 1;
            self.collision_pass(world);
            return;
        }

        let nominal = threshold * dt;
        let steps = ((distance / nominal).ceil() as u32).clamp(1, MAX_ANTI_TUNNELING_STEPS);
        let step_dt = dt / steps as f32;
        for _ in 0..steps {
            // Each slice uses whatever velocity the last pass left behind
            if self.velocity == Vec2::ZERO {
                break;
            }
            self.position += self.velocity * step_dt;
            self.last_substeps += 1;
            self.collision_pass(world);
        }
        trace!("Body {:?} moved {:.3} in {} sub-steps", self.id, distance, self.last_substeps);
    }

    /// Let the plugged solver place the body
    fn move_with_solver(&mut self, dt: f32) {
        let request = SolverRequest {
            body: self.id,
            position: self.position,
            translation: self.velocity * dt,
            ground_velocity: self.ground_velocity,
            surface_angle: self.surface_angle,
            gravity_direction: self.gravity_direction,
            dt,
        };
        let Some(solver) = self.solver.as_mut() else {
            return;
        };
        let response = solver.solve(&request);
        self.last_substeps = 1;

        match response.resolve() {
            Err(err) => {
                error!("Body {:?}: {err}; movement skipped this tick", self.id);
            }
            Ok(SolverOutcome::Detach) => {
                self.unplug_solver();
                self.detach();
            }
            Ok(SolverOutcome::Moved {
                position,
                surface,
                surface_angle,
            }) => {
                self.position = position;
                if self.grounded {
                    self.surface_angle = normalize_angle(surface_angle);
                    self.update_wall_mode();
                } else {
                    let radians = surface_angle.to_radians();
                    self.attach(scalar_projection(self.velocity, radians), radians);
                }
                trace!("Body {:?} placed by solver on {:?}", self.id, surface);
            }
        }
    }
}

/// Every body plus the world they move through
pub struct Simulation {
    pub world: World,
    bodies: Vec<Controller>,
    next_body: u32,
    time_ticks: u64,
    accumulator: f32,
}

impl Simulation {
    pub fn new(world: World) -> Self {
        Self {
            world,
            bodies: Vec::new(),
            next_body: 1,
            time_ticks: 0,
            accumulator: 0.0,
        }
    }

    /// Add an airborne body
    pub fn spawn(&mut self, settings: PhysicsSettings, position: Vec2) -> BodyId {
        let id = BodyId(self.next_body);
        self.next_body += 1;
        self.bodies.push(Controller::new(id, settings, position));
        id
    }

    pub fn despawn(&mut self, id: BodyId) -> Option<Controller> {
        let index = self.bodies.iter().position(|b| b.id() == id)?;
        Some(self.bodies.remove(index))
    }

    pub fn body(&self, id: BodyId) -> Option<&Controller> {
        self.bodies.iter().find(|b| b.id() == id)
    }

    pub fn body_mut(&mut self, id: BodyId) -> Option<&mut Controller> {
        self.bodies.iter_mut().find(|b| b.id() == id)
    }

    /// Bodies in spawn order
    pub fn bodies(&self) -> &[Controller] {
        &self.bodies
    }

    pub fn time_ticks(&self) -> u64 {
        self.time_ticks
    }

    /// One fixed step for every body, in spawn order
    pub fn step(&mut self) {
        for body in &mut self.bodies {
            body.tick(&mut self.world, SIM_DT);
        }
        self.time_ticks += 1;
    }

    /// Consume a variable frame time in fixed steps. Returns steps taken.
    pub fn advance(&mut self, frame_dt: f32) -> u32 {
        self.accumulator += frame_dt.clamp(0.0, 0.1);
        let mut steps = 0;
        while self.accumulator >= SIM_DT && steps < MAX_STEPS_PER_FRAME {
            self.step();
            self.accumulator -= SIM_DT;
            steps += 1;
        }
        steps
    }
}
