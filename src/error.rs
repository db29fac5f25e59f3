//! Error types shared by the flight core.
//!
//! None of these escape [`FlightController::tick`](crate::flight::FlightController::tick):
//! every failure on the decision path degrades to a hover in place.

use std::path::PathBuf;
use thiserror::Error;

/// Failure while loading or validating a [`FlightConfig`](crate::config::FlightConfig).
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Rejection returned by [`DecisionBroker::submit`](crate::broker::DecisionBroker::submit).
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitError {
    /// A request is already outstanding; the new frame was not stored.
    #[error("a decision request is already pending")]
    AlreadyPending,

    /// The worker has been shut down.
    #[error("decision broker is shut down")]
    Shutdown,
}

/// Failure reported by a [`DecisionService`](crate::decision::DecisionService).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecisionError {
    #[error("decision request timed out")]
    Timeout,

    #[error("transport failure: {0}")]
    Transport(String),

    #[error("decision service returned status {0}")]
    Status(u16),

    #[error("malformed decision reply: {0}")]
    Protocol(String),

    /// The frame could not be turned into a request body.
    #[error("frame encoding failed: {0}")]
    Encoding(String),
}

/// A camera frame that cannot be JPEG-encoded.
#[derive(Error, Debug)]
pub enum FrameError {
    #[error("frame payload holds {actual} bytes, expected {expected}")]
    Size { expected: usize, actual: usize },

    #[error("unsupported channel count {0}")]
    Channels(u8),

    #[error(transparent)]
    Encode(#[from] image::ImageError),
}

impl From<FrameError> for DecisionError {
    fn from(e: FrameError) -> Self {
        DecisionError::Encoding(e.to_string())
    }
}

/// The plant integrator did not reach the end of the step.
#[derive(Error, Debug, Clone, Copy, PartialEq)]
#[error("rigid-body integration stopped before t = {end}")]
pub struct DynamicsError {
    pub end: f64,
}

/// Failure constructing a [`DecisionBroker`](crate::broker::DecisionBroker).
#[derive(Error, Debug)]
pub enum BrokerError {
    #[error("failed to spawn decision worker: {0}")]
    Spawn(#[from] std::io::Error),

    #[error(transparent)]
    Config(#[from] ConfigError),
}
