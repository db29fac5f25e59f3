//! Hover-and-think flight core for a camera quadrotor.
//!
//! The vehicle takes off, holds a hover, and while hovering asks an external
//! decision service what to do next based on one camera frame. The service
//! call never blocks the control loop: frames are handed through a
//! single-slot [`DecisionBroker`] to a background worker that encodes them as
//! JPEG and calls the service, and the answer is polled on later ticks.
//!
//! # Layout
//!
//! - [`flight`]: the TAKEOFF / HOVER / THINKING / ACTION / LAND state machine
//! - [`control`]: attitude and altitude stabilizer, motor mixer
//! - [`estimator`]: finite-difference velocity estimate
//! - [`broker`], [`decision`]: the asynchronous decision path
//! - [`ports`]: sensor, actuator and emergency-switch seams
//! - [`sim`], [`dynamics`]: a rigid-body simulated vehicle
//!
//! # Example
//!
//! ```no_run
//! use hoverthink::decision::InferenceRequest;
//! use hoverthink::{
//!     DecisionBroker, DecisionError, DecisionReply, FlightConfig, FlightController,
//!     NoEmergency, SimulatedQuadrotor,
//! };
//! use std::time::Duration;
//!
//! let config = FlightConfig::default();
//! let service = |_: &InferenceRequest, _: Duration| {
//!     Ok::<_, DecisionError>(DecisionReply::new("turn_left"))
//! };
//! let broker = DecisionBroker::spawn(service, &config.decision)?;
//! let mut vehicle = SimulatedQuadrotor::for_config(&config);
//! let mut controller = FlightController::new(config, &vehicle, broker)?;
//! controller.run(&mut vehicle, &mut NoEmergency, 10_000);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod broker;
pub mod config;
pub mod control;
pub mod decision;
pub mod dynamics;
pub mod error;
pub mod estimator;
pub mod flight;
pub mod ports;
pub mod sim;
pub mod types;

pub use broker::{DecisionBroker, DecisionHandoff};
pub use config::{FlightConfig, UnrecognizedLabelPolicy};
pub use control::{AttitudeStabilizer, MotorMixer};
pub use decision::{DecisionReply, DecisionService, InferenceResult};
pub use error::{
    BrokerError, ConfigError, DecisionError, DynamicsError, FrameError, SubmitError,
};
pub use estimator::VelocityEstimator;
pub use flight::{FlightController, TickOutcome};
pub use ports::{
    ActuatorPort, EmergencyLatch, EmergencySwitch, ImageFrame, NoEmergency, SensorPort,
};
pub use sim::SimulatedQuadrotor;
pub use types::{FlightState, Maneuver, MotorCommand};
