//! Physics tuning settings
//!
//! All values are externally settable. Defaults reproduce the classic feel:
//! world units are 100 px and speeds are per second at 60 Hz.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::SettingsError;
use crate::sim::sensors::SensorLayout;
use crate::sim::terrain::CollisionLayers;

/// Tuning constants for one controller
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PhysicsSettings {
    // === Ground ===
    /// Deceleration applied to ground velocity (units/s²)
    pub ground_friction: f32,
    /// Hard cap on ground speed (units/s)
    pub max_speed: f32,
    /// Slope gravity (units/s²) pulling ground velocity downhill
    pub slope_gravity: f32,
    /// Slope gravity only applies beyond this many degrees from flat
    pub slope_gravity_begin_angle: f32,
    /// Below this ground speed the body falls off walls and ceilings
    pub detach_speed: f32,
    /// Never fall off walls for being too slow
    pub disable_wall_detach: bool,
    /// Largest angle change between surfaces the body follows (degrees)
    pub max_climb_angle: f32,
    /// When feet disagree, the closer foot wins outright inside this angle
    pub strict_climb_angle: f32,

    // === Air ===
    /// Gravity acceleration (units/s²)
    pub air_gravity: f32,
    /// Direction gravity pulls in (degrees, 270 = down)
    pub gravity_direction: f32,
    /// Fraction of horizontal speed removed per second by drag
    pub air_drag: f32,
    /// Drag only applies while rising slower than this
    pub air_drag_vertical_band: f32,
    /// Drag only applies while moving sideways faster than this
    pub air_drag_horizontal_threshold: f32,

    // === Wall modes ===
    /// Degrees past a band boundary before the wall mode switches
    pub wall_mode_switch_tolerance: f32,
    /// Seconds the previous wall mode stays protected after a switch
    pub wall_mode_revert_buffer: f32,
    /// Ground speed above which the revert buffer is ignored
    pub wall_mode_revert_max_speed: f32,

    // === Sensors ===
    /// How far above the feet the ground probes start
    pub ledge_climb_height: f32,
    /// How far below the feet the ground probes reach
    pub ledge_drop_height: f32,
    /// Speeds above this are sub-stepped to prevent tunneling (units/s)
    pub anti_tunneling_speed: f32,
    /// Terrain layers this body collides with
    pub collision_mask: CollisionLayers,
    /// Sensor placement relative to the body origin
    pub sensors: SensorLayout,
}

impl Default for PhysicsSettings {
    fn default() -> Self {
        Self {
            ground_friction: 1.6875,
            max_speed: 9.6,
            slope_gravity: 4.5,
            slope_gravity_begin_angle: 10.0,
            detach_speed: 1.5,
            disable_wall_detach: false,
            max_climb_angle: 45.0,
            strict_climb_angle: 22.5,

            air_gravity: 7.875,
            gravity_direction: 270.0,
            air_drag: 1.875,
            air_drag_vertical_band: 2.4,
            air_drag_horizontal_threshold: 0.075,

            wall_mode_switch_tolerance: 5.0,
            wall_mode_revert_buffer: 0.15,
            wall_mode_revert_max_speed: 3.0,

            ledge_climb_height: 0.16,
            ledge_drop_height: 0.16,
            anti_tunneling_speed: 5.0,
            collision_mask: CollisionLayers::all(),
            sensors: SensorLayout::default(),
        }
    }
}

impl PhysicsSettings {
    /// Parse settings from JSON. Missing fields keep their defaults.
    pub fn from_json(json: &str) -> Result<Self, SettingsError> {
        let settings: Self = serde_json::from_str(json)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Load settings from a JSON file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, SettingsError> {
        let json = std::fs::read_to_string(path.as_ref())?;
        let settings = Self::from_json(&json)?;
        log::info!("Loaded physics settings from {}", path.as_ref().display());
        Ok(settings)
    }

    /// Serialize to pretty JSON
    pub fn to_json(&self) -> Result<String, SettingsError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Fraction along a ledge probe where the nominal foot level sits
    pub fn ledge_ratio(&self) -> f32 {
        let total = self.ledge_climb_height + self.ledge_drop_height;
        if total > 0.0 {
            self.ledge_climb_height / total
        } else {
            0.0
        }
    }

    /// Reject values that would make the tick misbehave
    pub fn validate(&self) -> Result<(), SettingsError> {
        let non_negative = [
            ("ground_friction", self.ground_friction),
            ("slope_gravity", self.slope_gravity),
            ("slope_gravity_begin_angle", self.slope_gravity_begin_angle),
            ("detach_speed", self.detach_speed),
            ("air_gravity", self.air_gravity),
            ("air_drag", self.air_drag),
            ("air_drag_vertical_band", self.air_drag_vertical_band),
            ("air_drag_horizontal_threshold", self.air_drag_horizontal_threshold),
            ("wall_mode_switch_tolerance", self.wall_mode_switch_tolerance),
            ("wall_mode_revert_buffer", self.wall_mode_revert_buffer),
            ("wall_mode_revert_max_speed", self.wall_mode_revert_max_speed),
            ("ledge_climb_height", self.ledge_climb_height),
            ("ledge_drop_height", self.ledge_drop_height),
        ];
        for (field, value) in non_negative {
            if !value.is_finite() {
                return Err(SettingsError::Invalid { field, reason: "must be finite" });
            }
            if value < 0.0 {
                return Err(SettingsError::Invalid { field, reason: "must not be negative" });
            }
        }

        let positive = [
            ("max_speed", self.max_speed),
            ("anti_tunneling_speed", self.anti_tunneling_speed),
        ];
        for (field, value) in positive {
            if !value.is_finite() || value <= 0.0 {
                return Err(SettingsError::Invalid { field, reason: "must be positive" });
            }
        }

        if !(0.0..=180.0).contains(&self.max_climb_angle) {
            return Err(SettingsError::Invalid {
                field: "max_climb_angle",
                reason: "must be within 0..=180 degrees",
            });
        }
        if self.strict_climb_angle > self.max_climb_angle {
            return Err(SettingsError::Invalid {
                field: "strict_climb_angle",
                reason: "must not exceed max_climb_angle",
            });
        }
        if self.ledge_climb_height + self.ledge_drop_height <= 0.0 {
            return Err(SettingsError::Invalid {
                field: "ledge_drop_height",
                reason: "ledge probes need a non-zero length",
            });
        }
        if !self.gravity_direction.is_finite() {
            return Err(SettingsError::Invalid {
                field: "gravity_direction",
                reason: "must be finite",
            });
        }
        Ok(())
    }
}
