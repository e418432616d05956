//! Error taxonomy
//!
//! Programmer errors are reported loudly (logged and returned) while the
//! affected step is skipped. Expected edge cases (no hit, rejected impact)
//! are not errors and never show up here.

use thiserror::Error;

use crate::sim::sensors::SensorGroup;

/// Errors raised by controller operations
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ControllerError {
    /// `ignore_this_collision` was called while no pre-collision query was running
    #[error("ignore_this_collision called outside of a pre-collision callback")]
    IgnoreOutsidePreCollision,

    /// A custom surface solver answered without one of the required fields
    #[error("surface solver response is missing `{missing}`")]
    IncompleteSolverResponse { missing: &'static str },

    /// A sensor group the operation depends on is not part of the rig
    #[error("sensor group {0:?} is not configured")]
    SensorGroupMissing(SensorGroup),
}

/// Errors raised while loading or validating settings
#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("failed to parse settings: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("failed to read settings: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid setting `{field}`: {reason}")]
    Invalid {
        field: &'static str,
        reason: &'static str,
    },
}
