//! Seams between the flight core and whatever drives the vehicle.
//!
//! The controller only talks to hardware (or a simulator) through these
//! traits, so tests can substitute scripted implementations.

use crate::error::FrameError;
use crate::types::{AngularRates, AttitudeSample, MotorCommand, PositionSample};
use bytes::Bytes;
use image::codecs::jpeg::JpegEncoder;
use image::ExtendedColorType;
use std::borrow::Cow;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// A single raw camera frame, rows top to bottom.
///
/// Pixel layout follows `channels`: 1 is grey, 3 is RGB, 4 is BGRA as
/// delivered by the camera.
#[derive(Clone, Debug, PartialEq)]
pub struct ImageFrame {
    pub width: u32,
    pub height: u32,
    pub channels: u8,
    pub payload: Bytes,
}

impl ImageFrame {
    pub fn new(width: u32, height: u32, channels: u8, payload: impl Into<Bytes>) -> Self {
        Self {
            width,
            height,
            channels,
            payload: payload.into(),
        }
    }

    /// Encodes the frame as a baseline JPEG. Alpha is dropped.
    pub fn to_jpeg(&self, quality: u8) -> Result<Bytes, FrameError> {
        let expected = self.width as usize * self.height as usize * usize::from(self.channels);
        if self.payload.len() != expected {
            return Err(FrameError::Size {
                expected,
                actual: self.payload.len(),
            });
        }

        let (pixels, color): (Cow<'_, [u8]>, _) = match self.channels {
            1 => (Cow::Borrowed(&self.payload[..]), ExtendedColorType::L8),
            3 => (Cow::Borrowed(&self.payload[..]), ExtendedColorType::Rgb8),
            4 => {
                let rgb = self
                    .payload
                    .chunks_exact(4)
                    .flat_map(|bgra| [bgra[2], bgra[1], bgra[0]])
                    .collect();
                (Cow::Owned(rgb), ExtendedColorType::Rgb8)
            },
            n => return Err(FrameError::Channels(n)),
        };

        let mut out = Vec::new();
        JpegEncoder::new_with_quality(&mut out, quality).encode(
            &pixels,
            self.width,
            self.height,
            color,
        )?;
        Ok(Bytes::from(out))
    }
}

/// Read side of the vehicle, sampled once per tick.
pub trait SensorPort {
    fn attitude(&self) -> AttitudeSample;

    fn position(&self) -> PositionSample;

    fn angular_rates(&self) -> AngularRates;

    /// Returns `None` when no frame is available this tick.
    fn capture_frame(&mut self) -> Option<ImageFrame>;
}

/// Write side of the vehicle.
pub trait ActuatorPort {
    fn set_motor_velocities(&mut self, command: MotorCommand);
}

/// The manual "land now" input.
pub trait EmergencySwitch {
    fn land_requested(&mut self) -> bool;
}

/// Emergency switch backed by a shared flag.
///
/// Clones share the flag, so one copy can be moved into a signal handler
/// while the control loop polls another.
#[derive(Clone, Debug, Default)]
pub struct EmergencyLatch {
    tripped: Arc<AtomicBool>,
}

impl EmergencyLatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn trip(&self) {
        self.tripped.store(true, Ordering::Release);
    }

    pub fn is_tripped(&self) -> bool {
        self.tripped.load(Ordering::Acquire)
    }
}

impl EmergencySwitch for EmergencyLatch {
    fn land_requested(&mut self) -> bool {
        self.is_tripped()
    }
}

/// A switch that is never pressed.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoEmergency;

impl EmergencySwitch for NoEmergency {
    fn land_requested(&mut self) -> bool {
        false
    }
}
