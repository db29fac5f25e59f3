//! Single-slot hand-off between the control loop and the decision service.
//!
//! The control loop never blocks here: [`DecisionBroker::submit`] and
//! [`DecisionBroker::poll`] only take a short lock over a handful of fields.
//! JPEG encoding, the blocking call to the service and result mapping all
//! run on a dedicated worker thread without holding that lock.
//!
//! ```text
//!  control loop                     decision-broker thread
//!  ────────────                     ──────────────────────
//!  submit(frame) ──► [ frame   ] ──► encode ─► evaluate(request, timeout)
//!                    [ pending ]                       │
//!  poll() ◄───────── [ result  ] ◄──── resolve ◄───────┘
//! ```
//!
//! At most one request is outstanding: `pending` is raised by `submit` and
//! only lowered once `poll` has handed the result over (or a discarded
//! request has finished). A second `submit` in between is rejected, never
//! queued.

use crate::config::{DecisionConfig, UnrecognizedLabelPolicy};
use crate::decision::{
    resolve, DecisionReply, DecisionService, InferenceRequest, InferenceResult,
};
use crate::error::{BrokerError, DecisionError, SubmitError};
use crate::ports::ImageFrame;
use parking_lot::{Condvar, Mutex, MutexGuard};
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

#[derive(Debug, Default)]
struct Slot {
    /// Raw frame waiting for the worker.
    frame: Option<ImageFrame>,
    result: Option<InferenceResult>,
    /// Raised by `submit`, lowered when the result is consumed.
    pending: bool,
    /// The worker has taken the frame and not yet stored its result.
    in_flight: bool,
    /// The in-flight request was discarded; drop its result.
    stale: bool,
    shutdown: bool,
}

#[derive(Debug, Default)]
struct Shared {
    slot: Mutex<Slot>,
    wake: Condvar,
}

/// The control loop's view of the decision hand-off.
///
/// All methods return immediately.
pub trait DecisionHandoff {
    /// Stores a frame for evaluation, or rejects it if a request is outstanding.
    fn submit(&self, frame: ImageFrame) -> Result<(), SubmitError>;

    /// Takes the result of the outstanding request, if it has arrived.
    fn poll(&self) -> Option<InferenceResult>;

    fn is_pending(&self) -> bool;

    /// Abandons the outstanding request; its result will never be polled.
    fn discard(&self);
}

/// Owner of the decision worker thread and its request/result slot.
#[derive(Debug)]
pub struct DecisionBroker {
    shared: Arc<Shared>,
    worker: Option<JoinHandle<()>>,
}

impl DecisionBroker {
    /// Starts the worker thread around `service`.
    pub fn spawn<S: DecisionService>(
        service: S,
        config: &DecisionConfig,
    ) -> Result<Self, BrokerError> {
        let shared = Arc::new(Shared::default());
        let worker_shared = Arc::clone(&shared);
        config.validate()?;
        let timeout = config.timeout()?;
        let quality = config.jpeg_quality;
        let policy = config.unrecognized_label;

        let worker = thread::Builder::new()
            .name("decision-broker".into())
            .spawn(move || worker_loop(worker_shared, service, timeout, quality, policy))?;

        tracing::debug!(?timeout, quality, ?policy, "decision broker started");
        Ok(Self {
            shared,
            worker: Some(worker),
        })
    }

    /// Hands a frame to the worker without waiting for it.
    ///
    /// Fails with [`SubmitError::AlreadyPending`] if an earlier request has
    /// not been consumed yet; the earlier request is left untouched.
    pub fn submit(&self, frame: ImageFrame) -> Result<(), SubmitError> {
        let mut slot = self.shared.slot.lock();
        if slot.shutdown {
            return Err(SubmitError::Shutdown);
        }
        if slot.pending {
            return Err(SubmitError::AlreadyPending);
        }
        slot.frame = Some(frame);
        slot.pending = true;
        drop(slot);

        self.shared.wake.notify_one();
        Ok(())
    }

    /// Takes the result if one is ready, freeing the slot for the next request.
    pub fn poll(&self) -> Option<InferenceResult> {
        let mut slot = self.shared.slot.lock();
        let result = slot.result.take();
        if result.is_some() {
            slot.pending = false;
        }
        result
    }

    /// Whether a request is outstanding (queued, in flight, or with an
    /// unconsumed result).
    pub fn is_pending(&self) -> bool {
        self.shared.slot.lock().pending
    }

    pub fn is_in_flight(&self) -> bool {
        self.shared.slot.lock().in_flight
    }

    /// Gives up on the outstanding request.
    ///
    /// A queued request or an unconsumed result is dropped immediately. A
    /// request already in flight cannot be cancelled: it is marked stale and
    /// the slot stays pending until the service returns, at which point the
    /// result is dropped.
    pub fn discard(&self) {
        let mut slot = self.shared.slot.lock();
        if !slot.pending {
            return;
        }
        if slot.in_flight {
            slot.stale = true;
            tracing::debug!("in-flight decision request marked stale");
        } else {
            slot.frame = None;
            slot.result = None;
            slot.pending = false;
            tracing::debug!("decision request discarded");
        }
    }

    /// Stops the worker.
    ///
    /// Waits for the thread unless a service call is still running, in
    /// which case the thread is detached and exits once the call returns.
    pub fn shutdown(&mut self) {
        let in_flight = {
            let mut slot = self.shared.slot.lock();
            slot.shutdown = true;
            slot.in_flight
        };
        self.shared.wake.notify_all();

        if let Some(handle) = self.worker.take() {
            if in_flight {
                tracing::debug!("detaching decision worker with a call in flight");
            } else if handle.join().is_err() {
                tracing::warn!("decision worker panicked");
            }
        }
    }
}

impl DecisionHandoff for DecisionBroker {
    fn submit(&self, frame: ImageFrame) -> Result<(), SubmitError> {
        DecisionBroker::submit(self, frame)
    }

    fn poll(&self) -> Option<InferenceResult> {
        DecisionBroker::poll(self)
    }

    fn is_pending(&self) -> bool {
        DecisionBroker::is_pending(self)
    }

    fn discard(&self) {
        DecisionBroker::discard(self)
    }
}

impl Drop for DecisionBroker {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn worker_loop<S: DecisionService>(
    shared: Arc<Shared>,
    mut service: S,
    timeout: Duration,
    quality: u8,
    policy: UnrecognizedLabelPolicy,
) {
    let mut slot = shared.slot.lock();
    loop {
        while slot.frame.is_none() && !slot.shutdown {
            shared.wake.wait(&mut slot);
        }
        if slot.shutdown {
            break;
        }
        let Some(frame) = slot.frame.take() else {
            continue;
        };

        slot.in_flight = true;
        let result = MutexGuard::unlocked(&mut slot, || {
            let outcome = InferenceRequest::encode(&frame, quality)
                .and_then(|request| call_service(&mut service, &request, timeout));
            resolve(outcome, policy)
        });

        slot.in_flight = false;
        if slot.stale {
            slot.stale = false;
            slot.pending = false;
            tracing::debug!(?result, "dropping result of discarded request");
        } else {
            slot.result = Some(result);
        }
    }
    tracing::debug!("decision broker stopped");
}

fn call_service<S: DecisionService>(
    service: &mut S,
    request: &InferenceRequest,
    timeout: Duration,
) -> Result<DecisionReply, DecisionError> {
    panic::catch_unwind(AssertUnwindSafe(|| service.evaluate(request, timeout)))
        .unwrap_or_else(|_| Err(DecisionError::Transport("decision service panicked".into())))
}
