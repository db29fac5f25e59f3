//! Hover-and-think flight state machine.
//!
//! One call to [`FlightController::tick`] per physics step:
//!
//! ```text
//! sensors ─► velocity estimate ─► state transitions ─► emergency override
//!                                       │ ▲
//!                               submit  │ │ poll
//!                                       ▼ │
//!                                 decision hand-off
//!
//!        ─► stabilizer ─► mixer ─► actuators
//! ```
//!
//! | State    | Leaves when                                         | Next            |
//! |----------|-----------------------------------------------------|-----------------|
//! | TAKEOFF  | altitude within tolerance and vertical speed small  | HOVER           |
//! | HOVER    | horizontal speed small, frame captured and accepted | THINKING        |
//! | THINKING | a decision arrives (or the watchdog fires)          | ACTION / HOVER  |
//! | ACTION   | forward time elapsed, or turn heading reached       | HOVER           |
//! | LAND     | altitude below the ground threshold                 | motors off      |

use crate::broker::DecisionHandoff;
use crate::config::FlightConfig;
use crate::control::{wrap_angle, AttitudeStabilizer, IntegratorState, MotorMixer};
use crate::decision::InferenceResult;
use crate::error::{ConfigError, SubmitError};
use crate::estimator::VelocityEstimator;
use crate::ports::{ActuatorPort, EmergencySwitch, SensorPort};
use crate::types::{
    AttitudeSample, FlightState, Maneuver, MotorCommand, PendingManeuver, Setpoint,
    VelocityEstimate,
};

/// What the caller should do after a tick.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TickOutcome {
    Continue,
    /// Touched down; motors have been commanded to zero.
    Landed,
}

/// The flight core: owns setpoints, integrators and the flight state, and
/// drives the decision hand-off.
pub struct FlightController<D: DecisionHandoff> {
    config: FlightConfig,
    stabilizer: AttitudeStabilizer,
    mixer: MotorMixer,
    estimator: VelocityEstimator,
    decisions: D,

    state: FlightState,
    setpoint: Setpoint,
    integrators: IntegratorState,
    maneuver: Option<PendingManeuver>,
    landed: bool,

    /// Ticks run so far; flight time is `ticks · dt`.
    ticks: u64,
    thinking_since: u64,
    watchdog_ticks: u64,
    move_ticks: u64,
}

/// Whole ticks closest to `secs`.
fn ticks_for(secs: f64, dt: f64) -> u64 {
    (secs / dt).round() as u64
}

impl<D: DecisionHandoff> FlightController<D> {
    /// Validates `config` and calibrates against the vehicle's current pose.
    ///
    /// The current heading becomes the yaw setpoint and the current position
    /// seeds the velocity estimator. The controller starts in TAKEOFF
    /// targeting the cruise altitude.
    pub fn new<S: SensorPort>(
        config: FlightConfig,
        sensors: &S,
        decisions: D,
    ) -> Result<Self, ConfigError> {
        config.validate()?;

        let attitude = sensors.attitude();
        let position = sensors.position();
        tracing::info!(
            yaw_deg = attitude.yaw.to_degrees(),
            x = position.x,
            y = position.y,
            z = position.z,
            "calibrated"
        );

        let dt = config.dt();
        Ok(Self {
            stabilizer: AttitudeStabilizer::new(
                config.stabilizer.clone(),
                config.mission.move_speed,
            ),
            mixer: MotorMixer::new(&config.mixer),
            estimator: VelocityEstimator::new(position),
            decisions,
            state: FlightState::Takeoff,
            setpoint: Setpoint {
                target_yaw: wrap_angle(attitude.yaw),
                target_altitude: config.mission.cruise_altitude,
            },
            integrators: IntegratorState::default(),
            maneuver: None,
            landed: false,
            ticks: 0,
            thinking_since: 0,
            watchdog_ticks: ticks_for(config.mission.thinking_watchdog_secs, dt),
            move_ticks: ticks_for(config.mission.move_duration_secs, dt),
            config,
        })
    }

    pub fn state(&self) -> FlightState {
        self.state
    }

    pub fn setpoint(&self) -> Setpoint {
        self.setpoint
    }

    pub fn integrators(&self) -> IntegratorState {
        self.integrators
    }

    pub fn maneuver(&self) -> Option<PendingManeuver> {
        self.maneuver
    }

    pub fn flight_time(&self) -> f64 {
        self.ticks as f64 * self.config.dt()
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    pub fn is_landed(&self) -> bool {
        self.landed
    }

    pub fn config(&self) -> &FlightConfig {
        &self.config
    }

    pub fn decisions(&self) -> &D {
        &self.decisions
    }

    /// Runs one control step: read sensors, update the flight state, write
    /// the motors. Never blocks and never fails; decision-path problems
    /// leave the vehicle hovering.
    pub fn tick<V, E>(&mut self, vehicle: &mut V, emergency: &mut E) -> TickOutcome
    where
        V: SensorPort + ActuatorPort,
        E: EmergencySwitch,
    {
        if self.landed {
            vehicle.set_motor_velocities(MotorCommand::zero());
            return TickOutcome::Landed;
        }

        let dt = self.config.dt();
        self.ticks += 1;
        let entered = self.state;

        let attitude = vehicle.attitude();
        let position = vehicle.position();
        let rates = vehicle.angular_rates();
        let velocity = self.estimator.update(position, dt);

        match self.state {
            FlightState::Takeoff => self.on_takeoff(position.z, &velocity),
            FlightState::Hover => self.on_hover(vehicle, &velocity),
            FlightState::Thinking => self.on_thinking(),
            FlightState::Action => self.on_action(&attitude),
            FlightState::Land => {
                if self.on_land(position.z, dt) {
                    vehicle.set_motor_velocities(MotorCommand::zero());
                    return TickOutcome::Landed;
                }
            },
        }

        // Read every tick, even while already landing.
        let land_requested = emergency.land_requested();
        if land_requested && self.state != FlightState::Land {
            tracing::warn!(from = %self.state, "emergency landing requested");
            self.enter_land();
        }
        if self.state == FlightState::Action && entered != FlightState::Action {
            self.begin_maneuver();
        }

        let commands = self.stabilizer.update(
            &mut self.integrators,
            &attitude,
            &rates,
            position.z,
            velocity.vz,
            &self.setpoint,
            self.maneuver.map(|m| m.kind),
            dt,
        );
        vehicle.set_motor_velocities(self.mixer.mix(&commands));
        TickOutcome::Continue
    }

    /// Ticks until the vehicle lands or `max_ticks` have run.
    pub fn run<V, E>(&mut self, vehicle: &mut V, emergency: &mut E, max_ticks: u64) -> TickOutcome
    where
        V: SensorPort + ActuatorPort,
        E: EmergencySwitch,
    {
        for _ in 0..max_ticks {
            if self.tick(vehicle, emergency) == TickOutcome::Landed {
                return TickOutcome::Landed;
            }
        }
        TickOutcome::Continue
    }

    fn transition(&mut self, next: FlightState) {
        if self.state != next {
            tracing::info!(
                from = %self.state,
                to = %next,
                t = self.flight_time(),
                "flight state change"
            );
            self.state = next;
        }
    }

    fn on_takeoff(&mut self, altitude: f64, velocity: &VelocityEstimate) {
        let mission = &self.config.mission;
        if altitude > self.setpoint.target_altitude - mission.takeoff_tolerance
            && velocity.vz.abs() < mission.takeoff_vz_threshold
        {
            self.transition(FlightState::Hover);
        }
    }

    fn on_hover<S: SensorPort>(&mut self, sensors: &mut S, velocity: &VelocityEstimate) {
        if velocity.horizontal_speed >= self.config.mission.stable_threshold
            || self.decisions.is_pending()
        {
            return;
        }

        let Some(frame) = sensors.capture_frame() else {
            tracing::warn!("stable but no camera frame, retrying next tick");
            return;
        };

        match self.decisions.submit(frame) {
            Ok(()) => {
                self.thinking_since = self.ticks;
                self.transition(FlightState::Thinking);
            },
            Err(SubmitError::AlreadyPending) => {
                tracing::debug!("decision request still pending, staying in hover");
            },
            Err(e) => {
                tracing::warn!(error = %e, "decision request not submitted");
            },
        }
    }

    fn on_thinking(&mut self) {
        if let Some(result) = self.decisions.poll() {
            self.apply_decision(result);
            return;
        }

        let waited = self.ticks - self.thinking_since;
        if waited > self.watchdog_ticks {
            tracing::warn!(
                waited_secs = waited as f64 * self.config.dt(),
                "no decision before watchdog, returning to hover"
            );
            self.decisions.discard();
            self.apply_decision(InferenceResult::Error);
        }
    }

    fn apply_decision(&mut self, result: InferenceResult) {
        match result.maneuver() {
            Some(kind) => self.enter_action(kind),
            None => {
                tracing::info!(?result, "no maneuver for decision");
                self.transition(FlightState::Hover);
            },
        }
    }

    /// Setpoint changes wait for [`Self::begin_maneuver`], which only runs
    /// once the emergency check has let ACTION stand for this tick.
    fn enter_action(&mut self, kind: Maneuver) {
        self.maneuver = Some(PendingManeuver {
            kind,
            start_tick: self.ticks,
        });
        self.transition(FlightState::Action);
    }

    fn begin_maneuver(&mut self) {
        let Some(maneuver) = self.maneuver else {
            return;
        };
        let turn = self.config.mission.turn_angle();
        match maneuver.kind {
            Maneuver::TurnLeft => {
                self.setpoint.target_yaw = wrap_angle(self.setpoint.target_yaw + turn);
            },
            Maneuver::TurnRight => {
                self.setpoint.target_yaw = wrap_angle(self.setpoint.target_yaw - turn);
            },
            Maneuver::Forward => {},
        }

        tracing::info!(
            kind = ?maneuver.kind,
            target_yaw_deg = self.setpoint.target_yaw.to_degrees(),
            "maneuver started"
        );
    }

    fn on_action(&mut self, attitude: &AttitudeSample) {
        let Some(maneuver) = self.maneuver else {
            self.transition(FlightState::Hover);
            return;
        };

        let complete = if maneuver.kind.is_turn() {
            wrap_angle(self.setpoint.target_yaw - attitude.yaw).abs()
                < self.config.mission.turn_tolerance
        } else {
            self.ticks - maneuver.start_tick > self.move_ticks
        };

        if complete {
            tracing::info!(kind = ?maneuver.kind, "maneuver complete");
            self.maneuver = None;
            self.transition(FlightState::Hover);
        }
    }

    fn enter_land(&mut self) {
        self.maneuver = None;
        self.decisions.discard();
        self.transition(FlightState::Land);
    }

    /// Lowers the altitude setpoint; returns true once on the ground.
    fn on_land(&mut self, altitude: f64, dt: f64) -> bool {
        let mission = &self.config.mission;
        self.setpoint.target_altitude =
            (self.setpoint.target_altitude - mission.landing_rate * dt).max(mission.landing_floor);

        if altitude < mission.ground_threshold {
            tracing::info!(t = self.flight_time(), "landed, motors off");
            self.landed = true;
        }
        self.landed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::{EmergencyLatch, ImageFrame, NoEmergency};
    use crate::types::{AngularRates, PositionSample};
    use approx::assert_relative_eq;
    use std::cell::{Cell, RefCell};

    const DT: f64 = 0.008;

    /// Hand-off double: results are released by the test.
    #[derive(Default)]
    struct ScriptedHandoff {
        submitted: RefCell<Vec<ImageFrame>>,
        ready: Cell<Option<InferenceResult>>,
        pending: Cell<bool>,
        discards: Cell<u32>,
    }

    impl ScriptedHandoff {
        fn answer(&self, result: InferenceResult) {
            self.ready.set(Some(result));
        }
    }

    impl DecisionHandoff for ScriptedHandoff {
        fn submit(&self, frame: ImageFrame) -> Result<(), SubmitError> {
            if self.pending.get() {
                return Err(SubmitError::AlreadyPending);
            }
            self.submitted.borrow_mut().push(frame);
            self.pending.set(true);
            Ok(())
        }

        fn poll(&self) -> Option<InferenceResult> {
            let result = self.ready.take();
            if result.is_some() {
                self.pending.set(false);
            }
            result
        }

        fn is_pending(&self) -> bool {
            self.pending.get()
        }

        fn discard(&self) {
            self.discards.set(self.discards.get() + 1);
            self.ready.set(None);
            self.pending.set(false);
        }
    }

    #[derive(Clone)]
    struct TestVehicle {
        attitude: AttitudeSample,
        position: PositionSample,
        frame: Option<ImageFrame>,
        motors: Option<MotorCommand>,
    }

    impl TestVehicle {
        fn at(z: f64) -> Self {
            Self {
                attitude: AttitudeSample::default(),
                position: PositionSample::new(0.0, 0.0, z),
                frame: Some(ImageFrame::new(4, 4, 4, vec![7u8; 64])),
                motors: None,
            }
        }

        /// Moves so the next tick sees the given velocity.
        fn step(&mut self, vx: f64, vy: f64, vz: f64) {
            self.position.x += vx * DT;
            self.position.y += vy * DT;
            self.position.z += vz * DT;
        }
    }

    impl SensorPort for TestVehicle {
        fn attitude(&self) -> AttitudeSample {
            self.attitude
        }

        fn position(&self) -> PositionSample {
            self.position
        }

        fn angular_rates(&self) -> AngularRates {
            AngularRates::default()
        }

        fn capture_frame(&mut self) -> Option<ImageFrame> {
            self.frame.clone()
        }
    }

    impl ActuatorPort for TestVehicle {
        fn set_motor_velocities(&mut self, command: MotorCommand) {
            self.motors = Some(command);
        }
    }

    fn controller(vehicle: &TestVehicle) -> FlightController<ScriptedHandoff> {
        FlightController::new(FlightConfig::default(), vehicle, ScriptedHandoff::default()).unwrap()
    }

    /// Controller already in HOVER at cruise altitude.
    fn hovering() -> (FlightController<ScriptedHandoff>, TestVehicle) {
        let mut vehicle = TestVehicle::at(1.0);
        let mut fc = controller(&vehicle);
        fc.tick(&mut vehicle, &mut NoEmergency);
        assert_eq!(fc.state(), FlightState::Hover);
        (fc, vehicle)
    }

    fn thinking() -> (FlightController<ScriptedHandoff>, TestVehicle) {
        let (mut fc, mut vehicle) = hovering();
        fc.tick(&mut vehicle, &mut NoEmergency);
        assert_eq!(fc.state(), FlightState::Thinking);
        (fc, vehicle)
    }

    #[test]
    fn test_calibration_captures_heading() {
        let mut vehicle = TestVehicle::at(0.0);
        vehicle.attitude.yaw = 1.2;
        let fc = controller(&vehicle);
        assert_eq!(fc.state(), FlightState::Takeoff);
        assert_relative_eq!(fc.setpoint().target_yaw, 1.2, epsilon = 1e-12);
        assert_eq!(fc.setpoint().target_altitude, 1.0);
    }

    #[test]
    fn test_rejects_invalid_config() {
        let mut config = FlightConfig::default();
        config.tick.period_secs = 0.0;
        let vehicle = TestVehicle::at(0.0);
        assert!(FlightController::new(config, &vehicle, ScriptedHandoff::default()).is_err());
    }

    #[test]
    fn test_takeoff_waits_for_altitude() {
        let mut vehicle = TestVehicle::at(0.2 - 0.2 * DT);
        let mut fc = controller(&vehicle);
        vehicle.step(0.0, 0.0, 0.2);
        fc.tick(&mut vehicle, &mut NoEmergency);
        assert_eq!(fc.state(), FlightState::Takeoff);
        assert!(vehicle.motors.is_some());
    }

    #[test]
    fn test_takeoff_waits_for_vertical_speed() {
        let mut vehicle = TestVehicle::at(0.97 - 0.2 * DT);
        let mut fc = controller(&vehicle);
        vehicle.step(0.0, 0.0, 0.2);
        fc.tick(&mut vehicle, &mut NoEmergency);
        assert_eq!(fc.state(), FlightState::Takeoff);
    }

    #[test]
    fn test_takeoff_reaches_hover() {
        let mut vehicle = TestVehicle::at(0.97 - 0.05 * DT);
        let mut fc = controller(&vehicle);
        vehicle.step(0.0, 0.0, 0.05);
        fc.tick(&mut vehicle, &mut NoEmergency);
        assert_eq!(fc.state(), FlightState::Hover);
        // The transition tick does not also submit.
        assert!(fc.decisions().submitted.borrow().is_empty());
    }

    #[test]
    fn test_hover_submits_when_still() {
        let (mut fc, mut vehicle) = hovering();
        vehicle.step(0.6, 0.8, 0.0); // drifting at 1 m/s
        fc.tick(&mut vehicle, &mut NoEmergency);
        assert_eq!(fc.state(), FlightState::Hover);

        vehicle.step(0.01, 0.0, 0.0);
        fc.tick(&mut vehicle, &mut NoEmergency);
        assert_eq!(fc.state(), FlightState::Thinking);
        assert_eq!(fc.decisions().submitted.borrow().len(), 1);
        assert!(fc.decisions().is_pending());
    }

    #[test]
    fn test_hover_without_frame_retries() {
        let (mut fc, mut vehicle) = hovering();
        vehicle.frame = None;
        fc.tick(&mut vehicle, &mut NoEmergency);
        fc.tick(&mut vehicle, &mut NoEmergency);
        assert_eq!(fc.state(), FlightState::Hover);

        vehicle.frame = Some(ImageFrame::new(1, 1, 1, vec![1u8]));
        fc.tick(&mut vehicle, &mut NoEmergency);
        assert_eq!(fc.state(), FlightState::Thinking);
    }

    #[test]
    fn test_hover_stays_while_request_pending() {
        let (mut fc, mut vehicle) = hovering();
        fc.decisions().pending.set(true);
        fc.tick(&mut vehicle, &mut NoEmergency);
        assert_eq!(fc.state(), FlightState::Hover);
        assert!(fc.decisions().submitted.borrow().is_empty());
    }

    #[test]
    fn test_thinking_hovers_until_result() {
        let (mut fc, mut vehicle) = thinking();
        for _ in 0..100 {
            fc.tick(&mut vehicle, &mut NoEmergency);
        }
        assert_eq!(fc.state(), FlightState::Thinking);
        assert_eq!(fc.decisions().submitted.borrow().len(), 1);
    }

    fn decide(result: InferenceResult) -> FlightController<ScriptedHandoff> {
        let (mut fc, mut vehicle) = thinking();
        fc.decisions().answer(result);
        fc.tick(&mut vehicle, &mut NoEmergency);
        fc
    }

    #[test]
    fn test_decision_mapping() {
        let turn = 30f64.to_radians();

        let fc = decide(InferenceResult::Safe);
        assert_eq!(fc.state(), FlightState::Action);
        assert_eq!(fc.maneuver().unwrap().kind, Maneuver::Forward);
        assert_eq!(fc.setpoint().target_yaw, 0.0);

        let fc = decide(InferenceResult::TurnLeft);
        assert_eq!(fc.maneuver().unwrap().kind, Maneuver::TurnLeft);
        assert_relative_eq!(fc.setpoint().target_yaw, turn, epsilon = 1e-12);

        let fc = decide(InferenceResult::TurnRight);
        assert_eq!(fc.maneuver().unwrap().kind, Maneuver::TurnRight);
        assert_relative_eq!(fc.setpoint().target_yaw, -turn, epsilon = 1e-12);

        let fc = decide(InferenceResult::UnsafeForward);
        assert_eq!(fc.maneuver().unwrap().kind, Maneuver::TurnRight);
        assert_relative_eq!(fc.setpoint().target_yaw, -turn, epsilon = 1e-12);

        let fc = decide(InferenceResult::Error);
        assert_eq!(fc.state(), FlightState::Hover);
        assert!(fc.maneuver().is_none());
        assert_eq!(fc.setpoint().target_yaw, 0.0);
    }

    #[test]
    fn test_turn_wraps_across_pi() {
        let mut vehicle = TestVehicle::at(1.0);
        vehicle.attitude.yaw = 3.0;
        let mut fc = controller(&vehicle);
        fc.state = FlightState::Thinking;
        fc.decisions().pending.set(true);
        fc.decisions().answer(InferenceResult::TurnLeft);
        fc.tick(&mut vehicle, &mut NoEmergency);

        let expected = 3.0 + 30f64.to_radians() - std::f64::consts::TAU;
        assert_relative_eq!(fc.setpoint().target_yaw, expected, epsilon = 1e-12);
    }

    #[test]
    fn test_forward_maneuver_times_out() {
        let mut fc = decide(InferenceResult::Safe);
        let mut vehicle = TestVehicle::at(1.0);
        let start = fc.maneuver().unwrap().start_tick;
        assert_eq!(start, fc.ticks());

        let mut ticks = 0;
        while fc.state() == FlightState::Action {
            fc.tick(&mut vehicle, &mut NoEmergency);
            ticks += 1;
            assert!(ticks < 1_000);
        }
        assert_eq!(fc.state(), FlightState::Hover);
        assert!(fc.maneuver().is_none());
        // 1 s is exactly 125 ticks; completion needs strictly more.
        assert_eq!(ticks, 126);
        assert_eq!(fc.ticks() - start, 126);
    }

    #[test]
    fn test_forward_maneuver_tips_nose_down() {
        let (mut fc, mut vehicle) = thinking();
        fc.tick(&mut vehicle, &mut NoEmergency);
        let hover = vehicle.motors.unwrap();

        fc.decisions().answer(InferenceResult::Safe);
        fc.tick(&mut vehicle, &mut NoEmergency);
        let forward = vehicle.motors.unwrap();

        // Front rotors slow down, rear rotors speed up.
        assert!(forward.front_left() < hover.front_left());
        assert!(forward.rear_right() > hover.rear_right());
    }

    #[test]
    fn test_turn_completes_on_heading() {
        let mut fc = decide(InferenceResult::TurnLeft);
        let mut vehicle = TestVehicle::at(1.0);

        vehicle.attitude.yaw = 0.2;
        fc.tick(&mut vehicle, &mut NoEmergency);
        assert_eq!(fc.state(), FlightState::Action);

        vehicle.attitude.yaw = 30f64.to_radians() - 0.01;
        fc.tick(&mut vehicle, &mut NoEmergency);
        assert_eq!(fc.state(), FlightState::Hover);
        assert!(fc.maneuver().is_none());
    }

    #[test]
    fn test_thinking_watchdog() {
        let (mut fc, mut vehicle) = thinking();
        let mut ticks = 0u32;
        while fc.state() == FlightState::Thinking {
            fc.tick(&mut vehicle, &mut NoEmergency);
            ticks += 1;
            assert!(ticks < 10_000);
        }
        // 45 s is exactly 5625 ticks; the watchdog needs strictly more.
        assert_eq!(ticks, 5626);
        let waited = f64::from(ticks) * DT;
        assert!(waited > 45.0 && waited < 45.0 + 2.0 * DT);
        assert_eq!(fc.state(), FlightState::Hover);
        assert_eq!(fc.decisions().discards.get(), 1);
        assert!(!fc.decisions().is_pending());
    }

    #[test]
    fn test_emergency_overrides_any_state() {
        let (mut fc, mut vehicle) = thinking();
        let latch = EmergencyLatch::new();
        let mut switch = latch.clone();

        fc.tick(&mut vehicle, &mut switch);
        assert_eq!(fc.state(), FlightState::Thinking);

        latch.trip();
        // A ready decision is evaluated first, then pre-empted.
        fc.decisions().answer(InferenceResult::TurnLeft);
        fc.tick(&mut vehicle, &mut switch);
        assert_eq!(fc.state(), FlightState::Land);
        assert!(fc.maneuver().is_none());
        assert!(fc.decisions().discards.get() >= 1);
    }

    #[test]
    fn test_preempted_turn_leaves_heading_alone() {
        for result in [InferenceResult::TurnLeft, InferenceResult::TurnRight] {
            let (mut fc, mut vehicle) = thinking();
            let mut switch = EmergencyLatch::new();
            switch.trip();

            fc.decisions().answer(result);
            fc.tick(&mut vehicle, &mut switch);

            assert_eq!(fc.state(), FlightState::Land);
            assert_eq!(fc.setpoint().target_yaw, 0.0);
            assert!(fc.maneuver().is_none());
        }
    }

    #[test]
    fn test_flight_time_counts_whole_ticks() {
        let (mut fc, mut vehicle) = hovering();
        for _ in 0..9_999 {
            fc.tick(&mut vehicle, &mut NoEmergency);
        }
        assert_eq!(fc.ticks(), 10_000);
        assert_eq!(fc.flight_time(), 80.0);
    }

    #[test]
    fn test_landing_setpoint_monotonic_and_floored() {
        let (mut fc, mut vehicle) = hovering();
        let latch = EmergencyLatch::new();
        latch.trip();
        let mut switch = latch.clone();

        fc.tick(&mut vehicle, &mut switch);
        assert_eq!(fc.state(), FlightState::Land);

        let mut previous = fc.setpoint().target_altitude;
        for _ in 0..2_000 {
            assert_eq!(fc.tick(&mut vehicle, &mut switch), TickOutcome::Continue);
            let target = fc.setpoint().target_altitude;
            assert!(target <= previous);
            assert!(target >= -0.5);
            previous = target;
        }
        assert_eq!(previous, -0.5);
    }

    #[test]
    fn test_touchdown_stops_motors() {
        let (mut fc, mut vehicle) = hovering();
        let mut switch = EmergencyLatch::new();
        switch.trip();
        fc.tick(&mut vehicle, &mut switch);
        assert_eq!(fc.state(), FlightState::Land);

        vehicle.position.z = 0.05;
        assert_eq!(fc.tick(&mut vehicle, &mut switch), TickOutcome::Landed);
        assert_eq!(vehicle.motors, Some(MotorCommand::zero()));
        assert!(fc.is_landed());

        vehicle.motors = None;
        assert_eq!(fc.tick(&mut vehicle, &mut switch), TickOutcome::Landed);
        assert_eq!(vehicle.motors, Some(MotorCommand::zero()));
    }

    #[test]
    fn test_run_stops_on_landing() {
        let (mut fc, mut vehicle) = hovering();
        let mut switch = EmergencyLatch::new();
        switch.trip();
        vehicle.position.z = 0.0;
        assert_eq!(fc.run(&mut vehicle, &mut switch, 10), TickOutcome::Landed);
    }

    #[test]
    fn test_deterministic_transition_sequence() {
        fn script() -> Vec<FlightState> {
            let mut vehicle = TestVehicle::at(0.0);
            let mut fc = controller(&vehicle);
            let mut states = Vec::new();

            // Climb at 0.5 m/s, then hold.
            for _ in 0..300 {
                let vz = if vehicle.position.z < 0.97 { 0.5 } else { 0.0 };
                vehicle.step(0.0, 0.0, vz);
                fc.tick(&mut vehicle, &mut NoEmergency);
                states.push(fc.state());
            }
            fc.decisions().answer(InferenceResult::TurnRight);
            vehicle.attitude.yaw = -30f64.to_radians();
            for _ in 0..3 {
                fc.tick(&mut vehicle, &mut NoEmergency);
                states.push(fc.state());
            }
            states
        }

        let first = script();
        assert_eq!(first, script());

        let mut distinct = first.clone();
        distinct.dedup();
        assert_eq!(
            distinct,
            vec![
                FlightState::Takeoff,
                FlightState::Hover,
                FlightState::Thinking,
                FlightState::Action,
                FlightState::Hover,
                FlightState::Thinking,
            ]
        );
    }
}
