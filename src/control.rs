use crate::config::{MixerConfig, StabilizerConfig};
use crate::types::{AngularRates, AttitudeSample, Maneuver, MotorCommand, Setpoint};
use nalgebra::{Matrix4, Vector4};
use std::f64::consts::{PI, TAU};

/// Wraps an angle into (-π, π].
///
/// For a difference of two headings this is the signed shortest rotation
/// from the second to the first.
///
/// # Example
///
/// let err = wrap_angle(3.0 - (-3.0)); // 6.0 rad the long way round
/// assert!((err - (6.0 - TAU)).abs() < 1e-12);
pub fn wrap_angle(angle: f64) -> f64 {
    let wrapped = (angle + PI).rem_euclid(TAU) - PI;
    if wrapped <= -PI {
        wrapped + TAU
    } else {
        wrapped
    }
}

/// Accumulated roll and pitch error.
///
/// After every [`AttitudeStabilizer::update`] both terms satisfy
/// `|integral| <= integral_limit`.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct IntegratorState {
    pub roll_integral: f64,
    pub pitch_integral: f64,
}

/// Per-axis corrections produced by the stabilizer, before mixing.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct AxisCommands {
    pub roll: f64,
    /// Includes the forward-pitch trim.
    pub pitch: f64,
    pub yaw: f64,
    pub vertical: f64,
}

/// PID stabilizer for a hovering quadrotor.
///
/// The controller is stateless apart from its gains: the integrators are
/// owned by the caller and passed in by reference each tick.
///
/// # Control Laws
///
/// roll     = Kp_roll·φ + Ki_roll·∫φ + p                         (+ roll trim)
/// pitch    = Kp_pitch·θ + Ki_pitch·∫θ + q + trim(maneuver)
/// yaw      = clamp(Kp_yaw·wrap(ψ_cmd − ψ), ±max_yaw_disturbance)
/// vertical = Kp_z·clamp(z_cmd − z + offset, ±1) − Kd_z·vz
///
#[derive(Clone, Debug)]
pub struct AttitudeStabilizer {
    config: StabilizerConfig,
    move_speed: f64,
}

impl AttitudeStabilizer {
    /// Creates a stabilizer.
    ///
    /// # Arguments
    ///
    /// * `config` - Gains, limits and trims
    /// * `move_speed` - Pitch offset subtracted from the trim during a forward maneuver
    pub fn new(config: StabilizerConfig, move_speed: f64) -> Self {
        Self { config, move_speed }
    }

    /// Forward-pitch bias for the active maneuver.
    ///
    /// The hover trim applies at all times except while moving forward,
    /// where `move_speed` is subtracted to tip the nose down.
    pub fn pitch_trim(&self, maneuver: Option<Maneuver>) -> f64 {
        match maneuver {
            Some(Maneuver::Forward) => self.config.pitch_trim - self.move_speed,
            _ => self.config.pitch_trim,
        }
    }

    /// Clamped yaw command for the given heading error.
    ///
    /// # Arguments
    ///
    /// * `target_yaw` - Desired heading in radians
    /// * `yaw` - Current heading in radians
    ///
    /// # Returns
    ///
    /// `Kp_yaw · wrap(target_yaw − yaw)` limited to `±max_yaw_disturbance`
    pub fn yaw_control(&self, target_yaw: f64, yaw: f64) -> f64 {
        let limit = self.config.max_yaw_disturbance;
        (self.config.kp_yaw * wrap_angle(target_yaw - yaw)).clamp(-limit, limit)
    }

    /// Altitude hold: clamped proportional term on position, damping on vz.
    ///
    /// There is no integral term; the constant `vertical_offset` biases the
    /// error instead.
    pub fn altitude_control(&self, target_altitude: f64, altitude: f64, vz: f64) -> f64 {
        let error = target_altitude - altitude + self.config.vertical_offset;
        self.config.kp_vertical * error.clamp(-1.0, 1.0) - self.config.kd_vertical * vz
    }

    /// Runs one step of the stabilizer.
    ///
    /// # Arguments
    ///
    /// * `integrators` - Roll/pitch integrators, updated and clamped in place
    /// * `attitude` - Current roll, pitch, yaw (rad)
    /// * `rates` - Current body rates (rad/s)
    /// * `altitude` - Current altitude (m)
    /// * `vz` - Estimated vertical velocity (m/s)
    /// * `setpoint` - Target heading and altitude
    /// * `maneuver` - Active maneuver, selects the pitch trim
    /// * `dt` - Tick period (s)
    ///
    /// # Returns
    ///
    /// Per-axis commands ready for [`MotorMixer::mix`]
    #[allow(clippy::too_many_arguments)]
    pub fn update(
        &self,
        integrators: &mut IntegratorState,
        attitude: &AttitudeSample,
        rates: &AngularRates,
        altitude: f64,
        vz: f64,
        setpoint: &Setpoint,
        maneuver: Option<Maneuver>,
        dt: f64,
    ) -> AxisCommands {
        let c = &self.config;
        let limit = c.integral_limit;

        integrators.roll_integral =
            (integrators.roll_integral + attitude.roll * dt).clamp(-limit, limit);
        integrators.pitch_integral =
            (integrators.pitch_integral + attitude.pitch * dt).clamp(-limit, limit);

        let roll_level =
            c.kp_roll * attitude.roll + c.ki_roll * integrators.roll_integral + rates.roll_rate;
        let pitch_level = c.kp_pitch * attitude.pitch
            + c.ki_pitch * integrators.pitch_integral
            + rates.pitch_rate;

        AxisCommands {
            roll: roll_level + c.roll_trim,
            pitch: pitch_level + self.pitch_trim(maneuver),
            yaw: self.yaw_control(setpoint.target_yaw, attitude.yaw),
            vertical: self.altitude_control(setpoint.target_altitude, altitude, vz),
        }
    }
}

/// Spin direction of each rotor: front-left and rear-right turn one way,
/// front-right and rear-left the other.
pub const SPIN_DIRECTIONS: [f64; 4] = [1.0, -1.0, -1.0, 1.0];

/// Cross-configuration motor mixer.
///
/// # Motor Configuration
///
/// ```text
///   FL (+)      FR (−)
///       \  +X  /
///        \    /
///    +Y   \  /
///          \/
///          /\
///         /  \
///        /    \
///   RL (−)      RR (+)
/// ```
///
/// # Mixing Table
///
/// | rotor | vertical | yaw | pitch | roll |
/// |-------|----------|-----|-------|------|
/// | FL    |    +     |  −  |   +   |  −   |
/// | FR    |    +     |  +  |   +   |  +   |
/// | RL    |    +     |  +  |   −   |  −   |
/// | RR    |    +     |  −  |   −   |  +   |
///
/// Each rotor speed is `base_thrust + row · [vertical, yaw, pitch, roll]`;
/// the written command then carries the rotor's spin sign.
#[derive(Clone, Debug)]
pub struct MotorMixer {
    base_thrust: f64,
    matrix: Matrix4<f64>,
}

impl MotorMixer {
    pub fn new(config: &MixerConfig) -> Self {
        #[rustfmt::skip]
        let matrix = Matrix4::new(
            1.0, -1.0,  1.0, -1.0, // front left
            1.0,  1.0,  1.0,  1.0, // front right
            1.0,  1.0, -1.0, -1.0, // rear left
            1.0, -1.0, -1.0,  1.0, // rear right
        );
        Self {
            base_thrust: config.base_thrust,
            matrix,
        }
    }

    /// Unsigned rotor speeds in FL, FR, RL, RR order.
    pub fn rotor_speeds(&self, commands: &AxisCommands) -> Vector4<f64> {
        let axes = Vector4::new(commands.vertical, commands.yaw, commands.pitch, commands.roll);
        Vector4::repeat(self.base_thrust) + self.matrix * axes
    }

    /// Rotor speeds with the spin direction applied, ready for the actuators.
    pub fn mix(&self, commands: &AxisCommands) -> MotorCommand {
        let speeds = self.rotor_speeds(commands);
        MotorCommand(speeds.component_mul(&Vector4::from(SPIN_DIRECTIONS)))
    }
}
