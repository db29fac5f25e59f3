//! Rigid-body plant used by the simulator.
//!
//! Twelve states: position and velocity in the world frame (z up), Z-Y-X
//! Euler angles, and body rates. Thrust and torques are given in the body
//! frame and held constant over one integration step.

use crate::error::DynamicsError;
use nalgebra::{Rotation3, Vector3};

/// Number of scalar states integrated by [`RigidBodyOde`].
pub const STATE_DIM: usize = 12;

/// Kinematic state of the airframe.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct RigidBodyState {
    /// World position (m).
    pub position: Vector3<f64>,
    /// World velocity (m/s).
    pub velocity: Vector3<f64>,
    /// Roll, pitch, yaw (rad).
    pub attitude: Vector3<f64>,
    /// Body rates p, q, r (rad/s).
    pub body_rates: Vector3<f64>,
}

impl RigidBodyState {
    pub fn at_rest(position: Vector3<f64>, yaw: f64) -> Self {
        Self {
            position,
            attitude: Vector3::new(0.0, 0.0, yaw),
            ..Self::default()
        }
    }

    /// Packs the state in integrator order: position, velocity, attitude, rates.
    pub fn to_array(&self) -> [f64; STATE_DIM] {
        let mut out = [0.0; STATE_DIM];
        out[0..3].copy_from_slice(self.position.as_slice());
        out[3..6].copy_from_slice(self.velocity.as_slice());
        out[6..9].copy_from_slice(self.attitude.as_slice());
        out[9..12].copy_from_slice(self.body_rates.as_slice());
        out
    }

    pub fn from_array(arr: &[f64; STATE_DIM]) -> Self {
        Self {
            position: Vector3::new(arr[0], arr[1], arr[2]),
            velocity: Vector3::new(arr[3], arr[4], arr[5]),
            attitude: Vector3::new(arr[6], arr[7], arr[8]),
            body_rates: Vector3::new(arr[9], arr[10], arr[11]),
        }
    }

    /// Body-to-world rotation `Rz(ψ)·Ry(θ)·Rx(φ)`.
    pub fn rotation(&self) -> Rotation3<f64> {
        Rotation3::from_euler_angles(self.attitude.x, self.attitude.y, self.attitude.z)
    }
}

/// Mass properties and aerodynamic damping of the airframe.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Airframe {
    /// Gravitational acceleration (m/s²).
    pub gravity: f64,
    /// Total mass (kg).
    pub mass: f64,
    /// Principal moments of inertia Ixx, Iyy, Izz (kg·m²).
    pub inertia: Vector3<f64>,
    /// Translational drag, force per unit world velocity (N·s/m).
    pub linear_drag: f64,
    /// Rotational drag per body axis (N·m·s/rad).
    pub angular_drag: Vector3<f64>,
}

impl Default for Airframe {
    /// A small camera quadrotor, roughly 400 g.
    fn default() -> Self {
        Self {
            gravity: 9.81,
            mass: 0.4,
            inertia: Vector3::new(2.0e-3, 2.5e-3, 4.0e-3),
            linear_drag: 0.2,
            angular_drag: Vector3::new(1.0e-3, 1.0e-3, 4.5e-3),
        }
    }
}

/// Body-frame force and torque acting on the airframe.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Wrench {
    pub force: Vector3<f64>,
    pub torque: Vector3<f64>,
}

/// Equations of motion for the fast_ode integrator.
pub struct RigidBodyOde {
    pub airframe: Airframe,
    pub wrench: Wrench,
}

impl fast_ode::DifferentialEquation<STATE_DIM> for RigidBodyOde {
    fn ode_dot_y(
        &self,
        _t: f64,
        y: &fast_ode::Coord<STATE_DIM>,
    ) -> (fast_ode::Coord<STATE_DIM>, bool) {
        let state = RigidBodyState::from_array(&y.0);
        let af = &self.airframe;

        let (phi, theta) = (state.attitude.x, state.attitude.y);
        let (p, q, r) = (state.body_rates.x, state.body_rates.y, state.body_rates.z);

        // Newton in the world frame.
        let force = state.rotation() * self.wrench.force - af.linear_drag * state.velocity;
        let accel = force / af.mass - Vector3::new(0.0, 0.0, af.gravity);

        // Euler angle kinematics; yaw rate is undefined at θ = ±π/2.
        let (sin_phi, cos_phi) = phi.sin_cos();
        let cos_theta = theta.cos();
        let tan_theta = theta.tan();
        let phi_dot = p + q * sin_phi * tan_theta + r * cos_phi * tan_theta;
        let theta_dot = q * cos_phi - r * sin_phi;
        let psi_dot = if cos_theta.abs() > 1e-6 {
            (q * sin_phi + r * cos_phi) / cos_theta
        } else {
            0.0
        };

        // Euler's rotation equations with gyroscopic coupling.
        let i = af.inertia;
        let torque = self.wrench.torque - af.angular_drag.component_mul(&state.body_rates);
        let rates_dot = Vector3::new(
            (torque.x + (i.y - i.z) * q * r) / i.x,
            (torque.y + (i.z - i.x) * r * p) / i.y,
            (torque.z + (i.x - i.y) * p * q) / i.z,
        );

        let derivative = RigidBodyState {
            position: state.velocity,
            velocity: accel,
            attitude: Vector3::new(phi_dot, theta_dot, psi_dot),
            body_rates: rates_dot,
        };
        (fast_ode::Coord(derivative.to_array()), true)
    }
}

/// Integrates the airframe over `time_span` under a constant body wrench.
pub fn integrate(
    initial: &RigidBodyState,
    airframe: Airframe,
    wrench: Wrench,
    time_span: (f64, f64),
    tolerance: f64,
) -> Result<RigidBodyState, DynamicsError> {
    let ode = RigidBodyOde { airframe, wrench };

    match fast_ode::solve_ivp(
        &ode,
        time_span,
        fast_ode::Coord(initial.to_array()),
        |_, _| true,
        tolerance,
        tolerance * 10.0,
    ) {
        fast_ode::IvpResult::FinalTimeReached(coord) => Ok(RigidBodyState::from_array(&coord.0)),
        _ => Err(DynamicsError { end: time_span.1 }),
    }
}
