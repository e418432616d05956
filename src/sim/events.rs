//! Controller notifications
//!
//! The controller queues events as things happen during a tick; callers
//! drain them afterwards (see [`super::state::Controller::drain_events`]).

use serde::{Deserialize, Serialize};

use super::contact::{Contact, ContactPhase};
use super::state::WallMode;

/// Something observable that happened to a body
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ControllerEvent {
    /// Became grounded
    Attached { ground_speed: f32, surface_angle: f32 },
    /// Left the ground (any reason)
    Detached,
    /// Fell off a wall or ceiling for moving too slowly; follows `Detached`
    SteepDetached,
    WallModeChanged { from: WallMode, to: WallMode },
    /// A physical response was applied for this contact
    Collision(Contact),
    /// Touching a surface object with any sensor
    Platform { phase: ContactPhase, contact: Contact },
    /// Standing on a surface object
    Surface { phase: ContactPhase, contact: Contact },
    /// Simulation suspended for `duration` seconds (infinite allowed)
    Interrupted { duration: f32 },
    Resumed,
    SolverPlugged,
    SolverUnplugged,
}

impl ControllerEvent {
    /// Short name for logs and traces
    pub fn name(&self) -> &'static str {
        match self {
            ControllerEvent::Attached { .. } => "attached",
            ControllerEvent::Detached => "detached",
            ControllerEvent::SteepDetached => "steep_detached",
            ControllerEvent::WallModeChanged { .. } => "wall_mode_changed",
            ControllerEvent::Collision(_) => "collision",
            ControllerEvent::Platform { .. } => "platform",
            ControllerEvent::Surface { .. } => "surface",
            ControllerEvent::Interrupted { .. } => "interrupted",
            ControllerEvent::Resumed => "resumed",
            ControllerEvent::SolverPlugged => "solver_plugged",
            ControllerEvent::SolverUnplugged => "solver_unplugged",
        }
    }
}
