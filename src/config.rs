//! Immutable flight configuration.
//!
//! All gains, limits and thresholds live here and are handed to the
//! components at construction. Every field has a default, so a TOML file
//! only needs to name the values it overrides:
//!
//! ```toml
//! [mission]
//! cruise_altitude = 1.5
//! turn_angle_deg = 45.0
//!
//! [stabilizer]
//! pitch_trim = 0.0
//! ```

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Top-level configuration for the flight core.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FlightConfig {
    pub tick: TickConfig,
    pub stabilizer: StabilizerConfig,
    pub mixer: MixerConfig,
    pub mission: MissionConfig,
    pub decision: DecisionConfig,
}

/// Fixed control-loop period.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TickConfig {
    /// Seconds between two ticks of the control loop.
    pub period_secs: f64,
}

impl Default for TickConfig {
    fn default() -> Self {
        Self { period_secs: 0.008 }
    }
}

/// Gains and limits of the attitude/altitude stabilizer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StabilizerConfig {
    pub kp_roll: f64,
    pub ki_roll: f64,
    pub kp_pitch: f64,
    pub ki_pitch: f64,
    pub kp_yaw: f64,
    pub kp_vertical: f64,
    pub kd_vertical: f64,
    /// Constant added to the altitude error before clamping.
    pub vertical_offset: f64,
    /// Symmetric bound on the roll and pitch integrators.
    pub integral_limit: f64,
    /// Symmetric bound on the yaw command.
    pub max_yaw_disturbance: f64,
    /// Forward-pitch bias applied while not moving forward.
    pub pitch_trim: f64,
    pub roll_trim: f64,
}

impl Default for StabilizerConfig {
    fn default() -> Self {
        Self {
            kp_roll: 50.0,
            ki_roll: 0.01,
            kp_pitch: 30.0,
            ki_pitch: 0.01,
            kp_yaw: 2.0,
            kp_vertical: 3.0,
            kd_vertical: 2.0,
            vertical_offset: 0.6,
            integral_limit: 1.0,
            max_yaw_disturbance: 0.8,
            pitch_trim: 0.1,
            roll_trim: 0.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MixerConfig {
    /// Rotor velocity that roughly balances gravity (rad/s).
    pub base_thrust: f64,
}

impl Default for MixerConfig {
    fn default() -> Self {
        Self { base_thrust: 68.5 }
    }
}

/// Thresholds and timings of the hover/think/act cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MissionConfig {
    /// Altitude targeted during takeoff and hover (m).
    pub cruise_altitude: f64,
    /// Takeoff completes once altitude is above `cruise_altitude - takeoff_tolerance`.
    pub takeoff_tolerance: f64,
    /// ... and |vz| is below this (m/s).
    pub takeoff_vz_threshold: f64,
    /// Horizontal speed under which the vehicle is considered still (m/s).
    pub stable_threshold: f64,
    /// Length of a forward maneuver (s).
    pub move_duration_secs: f64,
    /// Pitch offset subtracted from the trim while moving forward.
    pub move_speed: f64,
    pub turn_angle_deg: f64,
    /// A turn completes when |yaw error| drops below this (rad).
    pub turn_tolerance: f64,
    /// Descent rate of the altitude setpoint while landing (m/s).
    pub landing_rate: f64,
    /// Lowest value the altitude setpoint may reach while landing (m).
    pub landing_floor: f64,
    /// Altitude under which the vehicle counts as landed (m).
    pub ground_threshold: f64,
    /// Longest time allowed in THINKING before a synthetic error (s).
    pub thinking_watchdog_secs: f64,
}

impl Default for MissionConfig {
    fn default() -> Self {
        Self {
            cruise_altitude: 1.0,
            takeoff_tolerance: 0.05,
            takeoff_vz_threshold: 0.1,
            stable_threshold: 0.05,
            move_duration_secs: 1.0,
            move_speed: 0.5,
            turn_angle_deg: 30.0,
            turn_tolerance: 0.05,
            landing_rate: 0.2,
            landing_floor: -0.5,
            ground_threshold: 0.1,
            thinking_watchdog_secs: 45.0,
        }
    }
}

impl MissionConfig {
    pub fn turn_angle(&self) -> f64 {
        self.turn_angle_deg.to_radians()
    }
}

/// How a decision label outside the known vocabulary is interpreted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnrecognizedLabelPolicy {
    /// Treat it as `safe`, the decision service's own default.
    #[default]
    Safe,
    /// Treat it as a failed request.
    Error,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DecisionConfig {
    /// Upper bound handed to the decision service for one request (s).
    pub timeout_secs: f64,
    pub unrecognized_label: UnrecognizedLabelPolicy,
    /// JPEG quality of the frame sent to the service, 1 to 100.
    pub jpeg_quality: u8,
}

impl Default for DecisionConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 30.0,
            unrecognized_label: UnrecognizedLabelPolicy::Safe,
            jpeg_quality: 95,
        }
    }
}

impl DecisionConfig {
    /// Request timeout; fails unless `timeout_secs` is finite and positive.
    pub fn timeout(&self) -> Result<Duration, ConfigError> {
        Duration::try_from_secs_f64(self.timeout_secs)
            .ok()
            .filter(|timeout| !timeout.is_zero())
            .ok_or_else(|| {
                ConfigError::Invalid(format!(
                    "decision.timeout_secs must be positive, got {}",
                    self.timeout_secs
                ))
            })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.timeout()?;
        if !(1..=100).contains(&self.jpeg_quality) {
            return Err(ConfigError::Invalid(format!(
                "decision.jpeg_quality must lie in 1..=100, got {}",
                self.jpeg_quality
            )));
        }
        Ok(())
    }
}

impl FlightConfig {
    /// Parses and validates a TOML document.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: FlightConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    pub fn dt(&self) -> f64 {
        self.tick.period_secs
    }

    /// Checks the cross-field constraints the control loop relies on.
    pub fn validate(&self) -> Result<(), ConfigError> {
        fn positive(name: &str, value: f64) -> Result<(), ConfigError> {
            if value.is_finite() && value > 0.0 {
                Ok(())
            } else {
                Err(ConfigError::Invalid(format!("{name} must be positive, got {value}")))
            }
        }

        positive("tick.period_secs", self.tick.period_secs)?;
        positive("stabilizer.integral_limit", self.stabilizer.integral_limit)?;
        positive("stabilizer.max_yaw_disturbance", self.stabilizer.max_yaw_disturbance)?;
        positive("mission.stable_threshold", self.mission.stable_threshold)?;
        positive("mission.move_duration_secs", self.mission.move_duration_secs)?;
        positive("mission.turn_tolerance", self.mission.turn_tolerance)?;
        positive("mission.landing_rate", self.mission.landing_rate)?;
        self.decision.validate()?;

        let turn = self.mission.turn_angle_deg;
        if !(turn > 0.0 && turn < 180.0) {
            return Err(ConfigError::Invalid(format!(
                "mission.turn_angle_deg must lie in (0, 180), got {turn}"
            )));
        }
        if self.mission.landing_floor >= self.mission.ground_threshold {
            return Err(ConfigError::Invalid(format!(
                "mission.landing_floor ({}) must be below mission.ground_threshold ({})",
                self.mission.landing_floor, self.mission.ground_threshold
            )));
        }
        if self.mission.thinking_watchdog_secs <= self.decision.timeout_secs {
            return Err(ConfigError::Invalid(format!(
                "mission.thinking_watchdog_secs ({}) must exceed decision.timeout_secs ({})",
                self.mission.thinking_watchdog_secs, self.decision.timeout_secs
            )));
        }
        Ok(())
    }
}
