//! Custom surface solver slot
//!
//! A solver takes over terrain following for one body: the controller
//! proposes a translation and the solver answers with where the body ended
//! up, or tells it to let go. Loops, rails and forced paths plug in here.

use glam::Vec2;

use super::state::BodyId;
use super::terrain::SurfaceId;
use crate::error::ControllerError;

/// What the controller proposes for this tick
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SolverRequest {
    pub body: BodyId,
    pub position: Vec2,
    /// Translation the body would make this tick without a solver
    pub translation: Vec2,
    pub ground_velocity: f32,
    /// Current surface angle (degrees)
    pub surface_angle: f32,
    pub gravity_direction: f32,
    pub dt: f32,
}

/// What the solver answers. Every field is required unless `detach` is set.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SolverResponse {
    pub position: Option<Vec2>,
    pub surface: Option<SurfaceId>,
    /// New surface angle (degrees)
    pub surface_angle: Option<f32>,
    pub detach: bool,
}

impl SolverResponse {
    pub fn moved(position: Vec2, surface: SurfaceId, surface_angle: f32) -> Self {
        Self {
            position: Some(position),
            surface: Some(surface),
            surface_angle: Some(surface_angle),
            detach: false,
        }
    }

    pub fn detach() -> Self {
        Self {
            detach: true,
            ..Default::default()
        }
    }

    /// Check the response is complete
    pub fn resolve(&self) -> Result<SolverOutcome, ControllerError> {
        if self.detach {
            return Ok(SolverOutcome::Detach);
        }
        let position = self
            .position
            .ok_or(ControllerError::IncompleteSolverResponse { missing: "position" })?;
        let surface = self
            .surface
            .ok_or(ControllerError::IncompleteSolverResponse { missing: "surface" })?;
        let surface_angle = self
            .surface_angle
            .ok_or(ControllerError::IncompleteSolverResponse {
                missing: "surface_angle",
            })?;
        Ok(SolverOutcome::Moved {
            position,
            surface,
            surface_angle,
        })
    }
}

/// A validated solver answer
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SolverOutcome {
    Detach,
    Moved {
        position: Vec2,
        surface: SurfaceId,
        surface_angle: f32,
    },
}

/// Strategy that overrides normal terrain following for one body
pub trait SurfaceSolver {
    /// Now driving `body`
    fn on_plugged(&mut self, _body: BodyId) {}

    /// No longer driving `body`
    fn on_unplugged(&mut self, _body: BodyId) {}

    fn solve(&mut self, request: &SolverRequest) -> SolverResponse;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_complete_response_resolves() {
        let response = SolverResponse::moved(Vec2::new(1.0, 2.0), SurfaceId(5), 90.0);
        assert_eq!(
            response.resolve(),
            Ok(SolverOutcome::Moved {
                position: Vec2::new(1.0, 2.0),
                surface: SurfaceId(5),
                surface_angle: 90.0,
            })
        );
        assert_eq!(SolverResponse::detach().resolve(), Ok(SolverOutcome::Detach));
    }

    #[test]
    fn test_incomplete_response_names_missing_field() {
        let response = SolverResponse {
            position: Some(Vec2::ZERO),
            surface: None,
            surface_angle: Some(0.0),
            detach: false,
        };
        assert_eq!(
            response.resolve(),
            Err(ControllerError::IncompleteSolverResponse { missing: "surface" })
        );
        assert!(SolverResponse::default().resolve().is_err());
    }
}
