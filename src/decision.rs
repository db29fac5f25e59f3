//! Request/response contract with the external decision service.
//!
//! The service receives one JPEG-encoded camera frame and answers with a
//! label drawn from a small vocabulary:
//!
//! ```json
//! { "caption": "a clear corridor", "decision": "safe" }
//! ```
//!
//! Transport, model and prompt are the service's business; the flight core
//! only sees [`DecisionService::evaluate`].

use crate::config::UnrecognizedLabelPolicy;
use crate::error::DecisionError;
use crate::ports::ImageFrame;
use crate::types::Maneuver;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// One encoded frame handed to the decision service.
#[derive(Clone, Debug, PartialEq)]
pub struct InferenceRequest {
    pub width: u32,
    pub height: u32,
    /// JPEG body, sent to the service as-is.
    pub jpeg: Bytes,
}

impl InferenceRequest {
    pub fn encode(frame: &ImageFrame, quality: u8) -> Result<Self, DecisionError> {
        Ok(Self {
            width: frame.width,
            height: frame.height,
            jpeg: frame.to_jpeg(quality)?,
        })
    }
}

/// Outcome of one decision request.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InferenceResult {
    Safe,
    TurnLeft,
    TurnRight,
    UnsafeForward,
    /// Transport or protocol failure, or an explicit `"error"` label.
    Error,
}

impl InferenceResult {
    /// Maneuver to fly for this result, `None` meaning "back to hover".
    ///
    /// An unsafe path ahead is avoided by turning right.
    pub fn maneuver(&self) -> Option<Maneuver> {
        match self {
            InferenceResult::Safe => Some(Maneuver::Forward),
            InferenceResult::TurnLeft => Some(Maneuver::TurnLeft),
            InferenceResult::TurnRight | InferenceResult::UnsafeForward => {
                Some(Maneuver::TurnRight)
            },
            InferenceResult::Error => None,
        }
    }

    /// Interprets a label from the service.
    ///
    /// Labels are compared after trimming and lowercasing. Text outside the
    /// vocabulary follows `policy`.
    pub fn from_label(label: &str, policy: UnrecognizedLabelPolicy) -> Self {
        match label.trim().to_ascii_lowercase().as_str() {
            "safe" => InferenceResult::Safe,
            "turn_left" => InferenceResult::TurnLeft,
            "turn_right" => InferenceResult::TurnRight,
            "unsafe_forward" => InferenceResult::UnsafeForward,
            "error" => InferenceResult::Error,
            other => {
                tracing::warn!(label = other, ?policy, "unrecognized decision label");
                match policy {
                    UnrecognizedLabelPolicy::Safe => InferenceResult::Safe,
                    UnrecognizedLabelPolicy::Error => InferenceResult::Error,
                }
            },
        }
    }
}

fn default_decision() -> String {
    "safe".to_string()
}

/// Structured reply of the decision service.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecisionReply {
    /// Free-text scene description, informational only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub caption: Option<String>,

    /// Decision label; the service's own default is `"safe"`.
    #[serde(default = "default_decision")]
    pub decision: String,
}

impl DecisionReply {
    pub fn new(decision: impl Into<String>) -> Self {
        Self {
            caption: None,
            decision: decision.into(),
        }
    }

    pub fn with_caption(mut self, caption: impl Into<String>) -> Self {
        self.caption = Some(caption.into());
        self
    }

    /// Decodes a JSON response body.
    pub fn from_json(body: &[u8]) -> Result<Self, DecisionError> {
        serde_json::from_slice(body).map_err(|e| DecisionError::Protocol(e.to_string()))
    }

    pub fn to_result(&self, policy: UnrecognizedLabelPolicy) -> InferenceResult {
        InferenceResult::from_label(&self.decision, policy)
    }
}

/// Client side of the decision service.
///
/// Implementations own the transport and must give up after `timeout`,
/// returning [`DecisionError::Timeout`]. They run on the broker's worker
/// thread and may block.
pub trait DecisionService: Send + 'static {
    fn evaluate(
        &mut self,
        request: &InferenceRequest,
        timeout: Duration,
    ) -> Result<DecisionReply, DecisionError>;
}

impl<F> DecisionService for F
where
    F: FnMut(&InferenceRequest, Duration) -> Result<DecisionReply, DecisionError> + Send + 'static,
{
    fn evaluate(
        &mut self,
        request: &InferenceRequest,
        timeout: Duration,
    ) -> Result<DecisionReply, DecisionError> {
        self(request, timeout)
    }
}

/// Maps a service outcome to the result seen by the flight core.
pub fn resolve(
    outcome: Result<DecisionReply, DecisionError>,
    policy: UnrecognizedLabelPolicy,
) -> InferenceResult {
    match outcome {
        Ok(reply) => {
            let result = reply.to_result(policy);
            tracing::info!(
                caption = reply.caption.as_deref().unwrap_or(""),
                decision = %reply.decision,
                ?result,
                "decision received"
            );
            result
        },
        Err(e) => {
            tracing::warn!(error = %e, "decision request failed");
            InferenceResult::Error
        },
    }
}
