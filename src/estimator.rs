use crate::types::{PositionSample, VelocityEstimate};
use nalgebra::Vector3;

/// Finite-difference velocity estimator.
///
/// Holds the previous position sample between ticks. [`update`](Self::update)
/// must be called exactly once per tick; it always advances the stored sample.
#[derive(Clone, Debug)]
pub struct VelocityEstimator {
    previous: Vector3<f64>,
}

impl VelocityEstimator {
    /// Seeds the estimator so the first update reports motion since `initial`.
    pub fn new(initial: PositionSample) -> Self {
        Self {
            previous: initial.to_vector(),
        }
    }

    /// Computes `(current - previous) / dt` and stores `current`.
    ///
    /// `dt` comes from the fixed tick scheduler and is never zero.
    pub fn update(&mut self, current: PositionSample, dt: f64) -> VelocityEstimate {
        let current = current.to_vector();
        let velocity = (current - self.previous) / dt;
        self.previous = current;
        VelocityEstimate::from_vector(velocity)
    }

    pub fn previous(&self) -> PositionSample {
        PositionSample::new(self.previous.x, self.previous.y, self.previous.z)
    }
}
