//! Simulated quadrotor for demos and closed-loop tests.
//!
//! Each motor write holds the command for one tick period and integrates the
//! rigid-body plant over it, so a controller that writes once per tick
//! advances simulated time in lockstep with its own clock.

use crate::config::FlightConfig;
use crate::control::wrap_angle;
use crate::dynamics::{integrate, Airframe, RigidBodyState, Wrench};
use crate::ports::{ActuatorPort, ImageFrame, SensorPort};
use crate::types::{AngularRates, AttitudeSample, MotorCommand, PositionSample};
use nalgebra::{Vector3, Vector4};

/// Propeller model: thrust `k_f·ω²`, reaction torque `-k_m·ω|ω|`.
///
/// Rotors sit on an X frame, each `arm` metres from the centre along both
/// body axes.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RotorModel {
    pub thrust_coefficient: f64,
    pub drag_coefficient: f64,
    pub arm: f64,
}

impl Default for RotorModel {
    /// Hovers the default [`Airframe`] at roughly 70.3 rad/s per rotor.
    fn default() -> Self {
        Self {
            thrust_coefficient: 1.985e-4,
            drag_coefficient: 5.0e-6,
            arm: 0.1,
        }
    }
}

impl RotorModel {
    /// Rotor speed at which the four rotors together carry the airframe.
    pub fn hover_speed(&self, airframe: &Airframe) -> f64 {
        (airframe.mass * airframe.gravity / (4.0 * self.thrust_coefficient)).sqrt()
    }

    /// Body torque produced per unit of roll (or pitch) mixer command at
    /// rotor speed `omega`. Opposite in sign to the command.
    pub fn torque_per_command(&self, omega: f64) -> f64 {
        8.0 * self.arm * self.thrust_coefficient * omega
    }

    /// Body wrench for signed rotor velocities (FL, FR, RL, RR).
    pub fn wrench(&self, command: &MotorCommand) -> Wrench {
        let omega = command.0;
        let thrust: Vector4<f64> = omega.map(|w| self.thrust_coefficient * w * w);
        let [fl, fr, rl, rr] = [thrust[0], thrust[1], thrust[2], thrust[3]];

        let reaction: f64 = omega.iter().map(|w| w * w.abs()).sum();

        Wrench {
            force: Vector3::new(0.0, 0.0, thrust.sum()),
            torque: Vector3::new(
                self.arm * (fl + rl - fr - rr),
                self.arm * (rl + rr - fl - fr),
                -self.drag_coefficient * reaction,
            ),
        }
    }
}

/// Camera resolution of the simulated vehicle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CameraModel {
    pub width: u32,
    pub height: u32,
}

impl Default for CameraModel {
    fn default() -> Self {
        Self {
            width: 64,
            height: 48,
        }
    }
}

/// A quadrotor flying over flat ground at z = 0.
#[derive(Clone, Debug)]
pub struct SimulatedQuadrotor {
    airframe: Airframe,
    rotors: RotorModel,
    /// Constant body torque from an off-centre payload.
    imbalance: Vector3<f64>,
    camera: Option<CameraModel>,
    period: f64,
    tolerance: f64,

    state: RigidBodyState,
    time: f64,
    last_command: MotorCommand,
    frames_captured: u64,
}

impl SimulatedQuadrotor {
    /// Vehicle resting on the ground at the origin.
    pub fn new(airframe: Airframe, rotors: RotorModel, period: f64) -> Self {
        Self {
            airframe,
            rotors,
            imbalance: Vector3::zeros(),
            camera: Some(CameraModel::default()),
            period,
            tolerance: 1e-6,
            state: RigidBodyState::default(),
            time: 0.0,
            last_command: MotorCommand::zero(),
            frames_captured: 0,
        }
    }

    /// Default airframe whose payload imbalance is exactly cancelled by the
    /// configured roll and pitch trims at hover.
    pub fn for_config(config: &FlightConfig) -> Self {
        let airframe = Airframe::default();
        let rotors = RotorModel::default();
        let k = rotors.torque_per_command(rotors.hover_speed(&airframe));
        let trims = &config.stabilizer;

        Self::new(airframe, rotors, config.dt())
            .with_imbalance(Vector3::new(k * trims.roll_trim, k * trims.pitch_trim, 0.0))
    }

    pub fn with_imbalance(mut self, torque: Vector3<f64>) -> Self {
        self.imbalance = torque;
        self
    }

    pub fn with_camera(mut self, camera: Option<CameraModel>) -> Self {
        self.camera = camera;
        self
    }

    pub fn with_state(mut self, state: RigidBodyState) -> Self {
        self.state = state;
        self
    }

    pub fn state(&self) -> &RigidBodyState {
        &self.state
    }

    pub fn airframe(&self) -> &Airframe {
        &self.airframe
    }

    pub fn rotors(&self) -> &RotorModel {
        &self.rotors
    }

    /// Simulated seconds elapsed.
    pub fn time(&self) -> f64 {
        self.time
    }

    pub fn last_command(&self) -> MotorCommand {
        self.last_command
    }

    pub fn frames_captured(&self) -> u64 {
        self.frames_captured
    }

    pub fn on_ground(&self) -> bool {
        self.state.position.z <= 0.0
    }

    fn step(&mut self, command: MotorCommand) {
        let mut wrench = self.rotors.wrench(&command);
        wrench.torque += self.imbalance;

        let span = (self.time, self.time + self.period);
        match integrate(&self.state, self.airframe, wrench, span, self.tolerance) {
            Ok(next) => self.state = next,
            Err(e) => tracing::error!(error = %e, "plant integration failed, holding state"),
        }
        self.time = span.1;

        // Ground contact: no sinking, and a vehicle pushed into the ground
        // comes to rest level.
        if self.state.position.z <= 0.0 {
            self.state.position.z = 0.0;
            if self.state.velocity.z <= 0.0 {
                let yaw = self.state.attitude.z;
                self.state = RigidBodyState::at_rest(self.state.position, yaw);
            }
        }
    }

    /// Grey frame whose brightness follows the heading, so successive frames
    /// differ as the vehicle turns.
    fn render(&self, camera: CameraModel) -> ImageFrame {
        let heading = (wrap_angle(self.state.attitude.z) + std::f64::consts::PI)
            / std::f64::consts::TAU;
        let base = (heading * 255.0) as u8;
        let pixels = (camera.width * camera.height) as usize;

        let payload: Vec<u8> = (0..pixels)
            .flat_map(|i| {
                let column = (i % camera.width as usize) as u8;
                let v = base.wrapping_add(column);
                [v, v, v]
            })
            .collect();
        ImageFrame::new(camera.width, camera.height, 3, payload)
    }
}

impl SensorPort for SimulatedQuadrotor {
    fn attitude(&self) -> AttitudeSample {
        let a = self.state.attitude;
        AttitudeSample {
            roll: a.x,
            pitch: a.y,
            yaw: wrap_angle(a.z),
        }
    }

    fn position(&self) -> PositionSample {
        let p = self.state.position;
        PositionSample::new(p.x, p.y, p.z)
    }

    fn angular_rates(&self) -> AngularRates {
        let r = self.state.body_rates;
        AngularRates {
            roll_rate: r.x,
            pitch_rate: r.y,
            yaw_rate: r.z,
        }
    }

    fn capture_frame(&mut self) -> Option<ImageFrame> {
        let camera = self.camera?;
        self.frames_captured += 1;
        Some(self.render(camera))
    }
}

impl ActuatorPort for SimulatedQuadrotor {
    fn set_motor_velocities(&mut self, command: MotorCommand) {
        self.last_command = command;
        self.step(command);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::control::SPIN_DIRECTIONS;

    const DT: f64 = 0.008;

    fn spinning(speeds: [f64; 4]) -> MotorCommand {
        MotorCommand(Vector4::from(speeds).component_mul(&Vector4::from(SPIN_DIRECTIONS)))
    }

    fn airborne(z: f64) -> SimulatedQuadrotor {
        SimulatedQuadrotor::new(Airframe::default(), RotorModel::default(), DT)
            .with_state(RigidBodyState::at_rest(Vector3::new(0.0, 0.0, z), 0.0))
    }

    #[test]
    fn test_hover_speed_balances_weight() {
        let airframe = Airframe::default();
        let rotors = RotorModel::default();
        let w = rotors.hover_speed(&airframe);
        assert!((w - 70.3).abs() < 0.1);

        let wrench = rotors.wrench(&spinning([w; 4]));
        assert!((wrench.force.z - airframe.mass * airframe.gravity).abs() < 1e-9);
        assert!(wrench.torque.norm() < 1e-12);
    }

    #[test]
    fn test_open_loop_hover() {
        let mut sim = airborne(1.0);
        let w = sim.rotors().hover_speed(sim.airframe());

        for _ in 0..125 {
            sim.set_motor_velocities(spinning([w; 4]));
        }

        assert!((sim.time() - 1.0).abs() < 1e-9);
        assert!((sim.position().z - 1.0).abs() < 1e-3);
        let att = sim.attitude();
        assert!(att.roll.abs() < 1e-9 && att.pitch.abs() < 1e-9 && att.yaw.abs() < 1e-9);
    }

    #[test]
    fn test_faster_right_rotors_roll_negative() {
        let mut sim = airborne(2.0);
        let w = sim.rotors().hover_speed(sim.airframe());

        for _ in 0..10 {
            sim.set_motor_velocities(spinning([w, w + 1.0, w, w + 1.0]));
        }

        assert!(sim.attitude().roll < 0.0);
        assert!(sim.angular_rates().roll_rate < 0.0);
        assert!(sim.attitude().pitch.abs() < 1e-9);
    }

    #[test]
    fn test_faster_front_rotors_pitch_nose_up() {
        let mut sim = airborne(2.0);
        let w = sim.rotors().hover_speed(sim.airframe());

        for _ in 0..10 {
            sim.set_motor_velocities(spinning([w + 1.0, w + 1.0, w, w]));
        }

        assert!(sim.attitude().pitch < 0.0);
    }

    #[test]
    fn test_diagonal_pair_yaws_positive() {
        let mut sim = airborne(2.0);
        let w = sim.rotors().hover_speed(sim.airframe());

        // Front-right and rear-left spin negative; speeding them up yaws left.
        for _ in 0..10 {
            sim.set_motor_velocities(spinning([w - 1.0, w + 1.0, w + 1.0, w - 1.0]));
        }

        assert!(sim.attitude().yaw > 0.0);
        assert!(sim.attitude().roll.abs() < 1e-9);
    }

    #[test]
    fn test_ground_stops_fall() {
        let mut sim = airborne(0.05);
        for _ in 0..100 {
            sim.set_motor_velocities(MotorCommand::zero());
        }

        assert!(sim.on_ground());
        assert_eq!(sim.position().z, 0.0);
        assert_eq!(sim.state().velocity, Vector3::zeros());
    }

    #[test]
    fn test_imbalance_cancelled_by_trim() {
        let config = FlightConfig::default();
        let mut sim = SimulatedQuadrotor::for_config(&config)
            .with_state(RigidBodyState::at_rest(Vector3::new(0.0, 0.0, 1.0), 0.0));
        let w = sim.rotors().hover_speed(sim.airframe());
        let trim = config.stabilizer.pitch_trim;

        for _ in 0..50 {
            sim.set_motor_velocities(spinning([w + trim, w + trim, w - trim, w - trim]));
        }

        assert!(sim.attitude().pitch.abs() < 1e-9);
        assert!(sim.angular_rates().pitch_rate.abs() < 1e-9);
    }

    #[test]
    fn test_capture_frame() {
        let mut sim = airborne(1.0);
        let frame = sim.capture_frame().unwrap();
        assert_eq!((frame.width, frame.height, frame.channels), (64, 48, 3));
        assert_eq!(frame.payload.len(), 64 * 48 * 3);
        assert_eq!(sim.frames_captured(), 1);

        let mut blind = airborne(1.0).with_camera(None);
        assert!(blind.capture_frame().is_none());
    }
}
