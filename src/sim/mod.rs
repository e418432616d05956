//! Deterministic simulation module
//!
//! All physics logic lives here. This module must be pure and deterministic:
//! - Fixed timestep only
//! - Seeded RNG only (course generation)
//! - Stable iteration order (bodies in spawn order, platforms by surface ID)
//! - No rendering or platform dependencies

pub mod collision;
pub mod contact;
pub mod course;
pub mod events;
pub mod hooks;
pub mod impact;
pub mod platform;
pub mod sensors;
pub mod solver;
pub mod state;
pub mod terrain;
pub mod tick;

pub use contact::{Collision, Contact, ContactPhase, ContactTracker};
pub use course::generate_course;
pub use events::ControllerEvent;
pub use hooks::{HookId, HookPoint};
pub use impact::{Impact, ImpactRules, is_wall_steep, resolve_impact, resolve_landing};
pub use platform::{CollisionVerdict, OneWayPlatform, Platform, PlatformRegistry};
pub use sensors::{SensorGroup, SensorId, SensorLayout, SensorRig, Side};
pub use solver::{SolverOutcome, SolverRequest, SolverResponse, SurfaceSolver};
pub use state::{BodyId, BodySnapshot, Controller, ListenerId, WallMode};
pub use terrain::{CollisionLayers, SurfaceId, Terrain, TerrainHit, World};
pub use tick::Simulation;
