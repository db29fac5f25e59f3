//! Plain data carried through one tick of the control loop.

use nalgebra::{Vector3, Vector4};
use std::fmt;

/// Vehicle attitude in radians.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct AttitudeSample {
    pub roll: f64,
    pub pitch: f64,
    pub yaw: f64,
}

/// Vehicle position in meters, z up.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct PositionSample {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl PositionSample {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    pub fn to_vector(&self) -> Vector3<f64> {
        Vector3::new(self.x, self.y, self.z)
    }
}

/// Body angular rates in rad/s.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct AngularRates {
    pub roll_rate: f64,
    pub pitch_rate: f64,
    pub yaw_rate: f64,
}

/// Linear velocity derived from two consecutive position samples.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct VelocityEstimate {
    pub vx: f64,
    pub vy: f64,
    pub vz: f64,
    pub horizontal_speed: f64,
}

impl VelocityEstimate {
    pub fn from_vector(v: Vector3<f64>) -> Self {
        Self {
            vx: v.x,
            vy: v.y,
            vz: v.z,
            horizontal_speed: v.xy().norm(),
        }
    }
}

/// What the stabilizer is asked to hold.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Setpoint {
    /// Heading in (-π, π].
    pub target_yaw: f64,
    /// Altitude in meters.
    pub target_altitude: f64,
}

/// The five phases of a hover-and-think flight.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FlightState {
    Takeoff,
    Hover,
    Thinking,
    Action,
    Land,
}

impl fmt::Display for FlightState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FlightState::Takeoff => "TAKEOFF",
            FlightState::Hover => "HOVER",
            FlightState::Thinking => "THINKING",
            FlightState::Action => "ACTION",
            FlightState::Land => "LAND",
        };
        f.write_str(name)
    }
}

/// A bounded motion executed from the ACTION state.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Maneuver {
    Forward,
    TurnLeft,
    TurnRight,
}

impl Maneuver {
    pub fn is_turn(&self) -> bool {
        matches!(self, Maneuver::TurnLeft | Maneuver::TurnRight)
    }
}

/// The maneuver in progress and the controller tick on which it began.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PendingManeuver {
    pub kind: Maneuver,
    pub start_tick: u64,
}

/// Rotor angular velocities in the order front-left, front-right,
/// rear-left, rear-right. Signs are the ones written to the motors, so the
/// front-right/rear-left pair carries negative values in normal flight.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MotorCommand(pub Vector4<f64>);

impl MotorCommand {
    pub fn zero() -> Self {
        MotorCommand(Vector4::zeros())
    }

    pub fn front_left(&self) -> f64 {
        self.0[0]
    }

    pub fn front_right(&self) -> f64 {
        self.0[1]
    }

    pub fn rear_left(&self) -> f64 {
        self.0[2]
    }

    pub fn rear_right(&self) -> f64 {
        self.0[3]
    }

    pub fn as_array(&self) -> [f64; 4] {
        [self.0[0], self.0[1], self.0[2], self.0[3]]
    }
}
