//! Capture/clock workflow controller.
//!
//! Drives one kiosk interaction: pick clock-in or clock-out, acquire the
//! camera, load the face model, snapshot a frame, extract a descriptor, ask
//! the server who it is, then commit the clock action on confirmation.
//!
//! All state lives behind one mutex that is never held across an await.
//! Every async step records the generation it started in and drops its
//! result if a cancel (or any move to a terminal state) bumped it meanwhile.

use crate::api::{
    AddAppearanceRequest, AppearanceReceipt, ClockReceipt, ClockRequest, RecognizeRequest,
    Recognition, RegisterReceipt, RegisterRequest, TimeclockApi,
};
use crate::camera::{CameraError, CameraGate, CameraLease, CameraSource, MediaStream, StreamConstraints};
use crate::capture::extract_capture;
use crate::model::{FaceModel, ModelLoader};
use crate::time;
use crate::types::{Capture, ClockAction, Role, Session};
use chrono::TimeZone;
use serde::Serialize;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::broadcast;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum WorkflowError {
    #[error("camera access failed: {0}")]
    CameraAccessDenied(String),
    #[error("face model failed to load: {0}")]
    ModelLoadFailure(String),
    #[error("no face detected; center your face in good light and retake")]
    NoFaceDetected,
    #[error("face detection failed: {0}")]
    Detection(String),
    #[error("could not encode photo: {0}")]
    Photo(String),
    /// Recognition or clock call failed; the text is the API's own message.
    #[error("{0}")]
    Network(String),
    #[error("{0}")]
    Validation(String),
    #[error("cannot {op} while {stage}")]
    InvalidTransition { op: &'static str, stage: Stage },
    #[error("another request is still in progress")]
    Busy,
    #[error("clocking requires a store session (current role: {0:?})")]
    Unauthorized(Role),
    #[error("cancelled")]
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Idle,
    AwaitingCamera,
    ModelLoading,
    LiveCapture,
    Recognizing,
    AwaitingConfirmation,
    Submitting,
    Succeeded,
    Failed,
}

impl Stage {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed)
    }

    /// Stages during which the controller may own an open camera stream.
    fn holds_camera(self) -> bool {
        matches!(self, Self::ModelLoading | Self::LiveCapture | Self::Recognizing)
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Idle => "idle",
            Self::AwaitingCamera => "awaiting camera",
            Self::ModelLoading => "loading the face model",
            Self::LiveCapture => "capturing",
            Self::Recognizing => "recognizing",
            Self::AwaitingConfirmation => "awaiting confirmation",
            Self::Submitting => "submitting",
            Self::Succeeded => "showing a result",
            Self::Failed => "showing an error",
        })
    }
}

/// Status colour: neutral, in progress (blue), success (green), failure (red).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Tone {
    Neutral,
    Info,
    Success,
    Error,
}

impl fmt::Display for Tone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Neutral => "neutral",
            Self::Info => "info",
            Self::Success => "success",
            Self::Error => "error",
        })
    }
}

/// Notifications for whatever renders the kiosk.
#[derive(Debug, Clone, PartialEq)]
pub enum WorkflowEvent {
    /// `generation` identifies this particular entry into `stage`.
    StageChanged { stage: Stage, generation: u64 },
    /// Replaces the inline status line.
    Status { tone: Tone, text: String },
    /// Transient notification for terminal outcomes.
    Toast { tone: Tone, text: String },
}

#[derive(Debug, Clone, Copy)]
pub struct WorkflowOptions {
    pub constraints: StreamConstraints,
    pub jpeg_quality: u8,
}

impl Default for WorkflowOptions {
    fn default() -> Self {
        Self {
            constraints: StreamConstraints::default(),
            jpeg_quality: 80,
        }
    }
}

/// Read-only snapshot of the workflow for display.
#[derive(Debug, Clone, Serialize)]
pub struct WorkflowView {
    pub stage: Stage,
    pub action: Option<ClockAction>,
    pub employee_name: Option<String>,
    pub confidence: Option<f64>,
    pub not_recognized: bool,
    pub has_photo: bool,
    pub tone: Tone,
    pub status: String,
}

enum State {
    Idle,
    AwaitingCamera(ClockAction),
    ModelLoading(ClockAction),
    LiveCapture(ClockAction),
    /// `capture` is filled once a descriptor was extracted and recognition is in flight.
    Recognizing {
        action: ClockAction,
        capture: Option<Capture>,
    },
    AwaitingConfirmation {
        action: ClockAction,
        capture: Capture,
        recognition: Recognition,
    },
    Submitting(ClockAction),
    Succeeded(ClockReceipt),
    Failed {
        action: Option<ClockAction>,
        reason: WorkflowError,
    },
}

impl State {
    fn stage(&self) -> Stage {
        match self {
            Self::Idle => Stage::Idle,
            Self::AwaitingCamera(_) => Stage::AwaitingCamera,
            Self::ModelLoading(_) => Stage::ModelLoading,
            Self::LiveCapture(_) => Stage::LiveCapture,
            Self::Recognizing { .. } => Stage::Recognizing,
            Self::AwaitingConfirmation { .. } => Stage::AwaitingConfirmation,
            Self::Submitting(_) => Stage::Submitting,
            Self::Succeeded(_) => Stage::Succeeded,
            Self::Failed { .. } => Stage::Failed,
        }
    }

    fn action(&self) -> Option<ClockAction> {
        match self {
            Self::Idle | Self::Succeeded(_) => None,
            Self::AwaitingCamera(a)
            | Self::ModelLoading(a)
            | Self::LiveCapture(a)
            | Self::Submitting(a) => Some(*a),
            Self::Recognizing { action, .. } | Self::AwaitingConfirmation { action, .. } => Some(*action),
            Self::Failed { action, .. } => *action,
        }
    }
}

struct Inner<S: MediaStream> {
    state: State,
    generation: u64,
    stream: Option<CameraLease<S>>,
    /// Set while add-appearance or registration is in flight. Cleared by any
    /// move to `Idle` or a terminal stage.
    busy: bool,
    tone: Tone,
    status: String,
}

/// Finite-state controller for the face-assisted clock-in/out workflow.
pub struct WorkflowController<C: CameraSource, M: FaceModel, A: TimeclockApi> {
    camera: C,
    gate: CameraGate,
    loader: Arc<ModelLoader<M>>,
    api: A,
    session: Session,
    options: WorkflowOptions,
    inner: Mutex<Inner<C::Stream>>,
    events: broadcast::Sender<WorkflowEvent>,
}

impl<C: CameraSource, M: FaceModel, A: TimeclockApi> WorkflowController<C, M, A> {
    pub fn new(
        camera: C,
        loader: Arc<ModelLoader<M>>,
        api: A,
        session: Session,
        options: WorkflowOptions,
    ) -> Self {
        let (events, _) = broadcast::channel(64);
        let (tone, status) = status_for(&State::Idle);
        Self {
            camera,
            gate: CameraGate::default(),
            loader,
            api,
            session,
            options,
            inner: Mutex::new(Inner {
                state: State::Idle,
                generation: 0,
                stream: None,
                busy: false,
                tone,
                status,
            }),
            events,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<WorkflowEvent> {
        self.events.subscribe()
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn loader(&self) -> &Arc<ModelLoader<M>> {
        &self.loader
    }

    pub fn stage(&self) -> Stage {
        self.lock().state.stage()
    }

    pub fn view(&self) -> WorkflowView {
        let inner = self.lock();
        let (employee_name, confidence, not_recognized, has_photo) = match &inner.state {
            State::AwaitingConfirmation { recognition, .. } => match recognition {
                Recognition::Matched {
                    employee_name,
                    confidence,
                    ..
                } => (Some(employee_name.clone()), Some(*confidence), false, true),
                Recognition::NotRecognized { .. } => (None, None, true, true),
            },
            State::Submitting(_) => (None, None, false, true),
            State::Succeeded(receipt) => (Some(receipt.employee_name().to_string()), None, false, false),
            _ => (None, None, false, false),
        };
        WorkflowView {
            stage: inner.state.stage(),
            action: inner.state.action(),
            employee_name,
            confidence,
            not_recognized,
            has_photo,
            tone: inner.tone,
            status: inner.status.clone(),
        }
    }

    /// Start a clock-in or clock-out. Only accepted from `Idle`.
    ///
    /// Resolves once the workflow reached `LiveCapture` or failed.
    pub async fn begin_clock_action(&self, action: ClockAction) -> Result<(), WorkflowError> {
        let generation = {
            let mut inner = self.lock();
            if inner.busy {
                return Err(WorkflowError::Busy);
            }
            if !matches!(inner.state, State::Idle) {
                return Err(self.reject(&inner, "start a clock action"));
            }
            if self.session.store_id().is_none() {
                tracing::warn!(role = ?self.session.role, "clock action refused for non-store session");
                return Err(WorkflowError::Unauthorized(self.session.role));
            }
            self.transition(&mut inner, State::AwaitingCamera(action));
            inner.generation
        };
        self.acquire(action, generation).await
    }

    /// Snapshot the live feed, extract a descriptor and ask the server who it is.
    ///
    /// The frame is grabbed off the async workers and the stream is stopped
    /// as soon as it has been read.
    pub async fn capture_and_recognize(&self) -> Result<Recognition, WorkflowError> {
        let (action, generation, lease) = {
            let mut inner = self.lock();
            let State::LiveCapture(action) = inner.state else {
                return Err(self.reject(&inner, "capture"));
            };
            let Some(lease) = inner.stream.take() else {
                let reason = WorkflowError::CameraAccessDenied(CameraError::StreamStopped.to_string());
                return Err(self.fail(&mut inner, Some(action), reason));
            };
            self.transition(
                &mut inner,
                State::Recognizing {
                    action,
                    capture: None,
                },
            );
            (action, inner.generation, lease)
        };

        let snapshot = lease.take_frame().await;
        tracing::info!("camera stream stopped after capture");

        let frame = {
            let mut inner = self.lock();
            if inner.generation != generation {
                tracing::debug!("discarding snapshot for a cancelled attempt");
                return Err(WorkflowError::Cancelled);
            }
            match snapshot {
                Ok(frame) => frame,
                Err(e) => {
                    let reason = WorkflowError::CameraAccessDenied(e.to_string());
                    return Err(self.fail(&mut inner, Some(action), reason));
                }
            }
        };

        let extracted = extract_capture(&self.loader, frame, self.options.jpeg_quality).await;

        let request = {
            let mut inner = self.lock();
            if inner.generation != generation {
                tracing::debug!("discarding detection result for a cancelled attempt");
                return Err(WorkflowError::Cancelled);
            }
            let capture = match extracted {
                Ok(capture) => capture,
                Err(reason) => return Err(self.fail(&mut inner, Some(action), reason)),
            };
            let request = RecognizeRequest {
                face_descriptor: capture.descriptor.clone(),
                store_id: self.store_id().to_string(),
            };
            inner.state = State::Recognizing {
                action,
                capture: Some(capture),
            };
            let (tone, text) = status_for(&inner.state);
            self.set_status(&mut inner, tone, text);
            request
        };

        let recognized = self.api.recognize(&request).await;

        let mut inner = self.lock();
        if inner.generation != generation {
            tracing::debug!("discarding recognition result for a cancelled attempt");
            return Err(WorkflowError::Cancelled);
        }
        let capture = match &inner.state {
            State::Recognizing {
                capture: Some(capture),
                ..
            } => capture.clone(),
            _ => return Err(WorkflowError::Cancelled),
        };
        match recognized {
            Ok(recognition) => {
                match &recognition {
                    Recognition::Matched {
                        employee_name,
                        confidence,
                        ..
                    } => tracing::info!(employee = %employee_name, confidence, "face recognized"),
                    Recognition::NotRecognized { .. } => tracing::info!("face not recognized"),
                }
                self.transition(
                    &mut inner,
                    State::AwaitingConfirmation {
                        action,
                        capture,
                        recognition: recognition.clone(),
                    },
                );
                Ok(recognition)
            }
            Err(e) => {
                tracing::warn!(error = %e, "recognition call failed");
                Err(self.fail(&mut inner, Some(action), WorkflowError::Network(e.to_string())))
            }
        }
    }

    /// Commit the recorded action with the capture held for confirmation.
    pub async fn confirm_and_submit(&self) -> Result<ClockReceipt, WorkflowError> {
        let (action, generation, request) = {
            let mut inner = self.lock();
            if inner.busy {
                return Err(WorkflowError::Busy);
            }
            let (action, capture) = match &inner.state {
                State::AwaitingConfirmation {
                    action,
                    capture,
                    recognition: Recognition::Matched { .. },
                } => (*action, capture.clone()),
                State::AwaitingConfirmation { .. } => {
                    return Err(WorkflowError::Validation(
                        "face was not recognized; add this appearance or retake".into(),
                    ))
                }
                _ => return Err(self.reject(&inner, "confirm")),
            };
            let request = ClockRequest::from_capture(&capture, self.store_id());
            self.transition(&mut inner, State::Submitting(action));
            (action, inner.generation, request)
        };

        let result = match action {
            ClockAction::ClockIn => self.api.clock_in(&request).await,
            ClockAction::ClockOut => self.api.clock_out(&request).await,
        };

        let mut inner = self.lock();
        if inner.generation != generation {
            tracing::debug!("discarding clock result for a cancelled attempt");
            return Err(WorkflowError::Cancelled);
        }
        match result {
            Ok(receipt) => {
                tracing::info!(employee = receipt.employee_name(), %action, "clock action committed");
                self.transition(&mut inner, State::Succeeded(receipt.clone()));
                Ok(receipt)
            }
            Err(e) => {
                tracing::warn!(error = %e, %action, "clock call failed");
                Err(self.fail(&mut inner, Some(action), WorkflowError::Network(e.to_string())))
            }
        }
    }

    /// Drop the held capture and re-acquire the camera for the same action.
    pub async fn retake(&self) -> Result<(), WorkflowError> {
        let (action, generation) = {
            let mut inner = self.lock();
            if inner.busy {
                return Err(WorkflowError::Busy);
            }
            let action = match &inner.state {
                State::AwaitingConfirmation { action, .. } => *action,
                State::Failed {
                    action: Some(action),
                    ..
                } => *action,
                _ => return Err(self.reject(&inner, "retake")),
            };
            self.transition(&mut inner, State::AwaitingCamera(action));
            (action, inner.generation)
        };
        self.acquire(action, generation).await
    }

    /// Stop the camera, discard held data and return to `Idle`.
    pub fn cancel(&self) {
        let mut inner = self.lock();
        if matches!(inner.state, State::Idle) && !inner.busy && inner.stream.is_none() {
            return;
        }
        self.transition(&mut inner, State::Idle);
    }

    /// Acknowledge a result or error.
    pub fn dismiss(&self) -> Result<(), WorkflowError> {
        let mut inner = self.lock();
        if !inner.state.stage().is_terminal() {
            return Err(self.reject(&inner, "dismiss"));
        }
        self.transition(&mut inner, State::Idle);
        Ok(())
    }

    /// Dismiss the terminal state entered at `generation` after `after`.
    ///
    /// Does nothing if the workflow has left that state by then, including
    /// when it has since entered a newer terminal state.
    pub fn schedule_dismiss(self: &Arc<Self>, generation: u64, after: Duration)
    where
        C: 'static,
        M: 'static,
        A: 'static,
    {
        let controller = Arc::clone(self);
        tokio::spawn(async move {
            tokio::time::sleep(after).await;
            let mut inner = controller.lock();
            if inner.generation == generation && inner.state.stage().is_terminal() {
                tracing::debug!("auto-dismissing result");
                controller.transition(&mut inner, State::Idle);
            }
        });
    }

    /// Register the held capture as an extra appearance for `employee_name`.
    ///
    /// Only offered after a non-match. On success the workflow returns to
    /// `Idle` so the original action can be retried.
    pub async fn add_appearance(&self, employee_name: &str) -> Result<AppearanceReceipt, WorkflowError> {
        let employee_name = employee_name.trim();
        let (action, generation, request) = {
            let mut inner = self.lock();
            if inner.busy {
                return Err(WorkflowError::Busy);
            }
            let (action, request) = match &inner.state {
                State::AwaitingConfirmation {
                    action,
                    capture,
                    recognition: Recognition::NotRecognized { .. },
                } => (
                    *action,
                    AddAppearanceRequest {
                        employee_name: employee_name.to_string(),
                        face_descriptor: capture.descriptor.clone(),
                        face_image: Some(capture.frame.data_url.clone()),
                    },
                ),
                _ => return Err(self.reject(&inner, "add an appearance")),
            };
            if employee_name.is_empty() {
                let err = WorkflowError::Validation("enter your name to add this appearance".into());
                self.set_status(&mut inner, Tone::Error, err.to_string());
                return Err(err);
            }
            inner.busy = true;
            self.set_status(
                &mut inner,
                Tone::Info,
                format!("Adding new appearance for {employee_name}..."),
            );
            (action, inner.generation, request)
        };

        let result = self.api.add_appearance(&request).await;

        let mut inner = self.lock();
        if inner.generation != generation {
            tracing::debug!("discarding add-appearance result for a cancelled attempt");
            return Err(WorkflowError::Cancelled);
        }
        match result {
            Ok(receipt) => {
                tracing::info!(
                    employee = %receipt.employee_name,
                    total = ?receipt.total_registrations,
                    "appearance added"
                );
                let text = format!("{} Please {} again.", receipt.message, action.verb());
                inner.busy = false;
                self.transition(&mut inner, State::Idle);
                self.emit(WorkflowEvent::Toast {
                    tone: Tone::Success,
                    text: text.clone(),
                });
                self.set_status(&mut inner, Tone::Success, text);
                Ok(receipt)
            }
            Err(e) => {
                tracing::warn!(error = %e, "add-appearance call failed");
                Err(self.fail(&mut inner, Some(action), WorkflowError::Network(e.to_string())))
            }
        }
    }

    /// Capture one face and register it as the initial appearance of
    /// `employee_id`. Only accepted from `Idle`.
    ///
    /// The stream is owned by the controller like any other, so `cancel`
    /// stops it.
    pub async fn register_face(&self, employee_id: &str) -> Result<RegisterReceipt, WorkflowError> {
        let employee_id = employee_id.trim();
        let generation = {
            let mut inner = self.lock();
            if inner.busy {
                return Err(WorkflowError::Busy);
            }
            if !matches!(inner.state, State::Idle) {
                return Err(self.reject(&inner, "register a face"));
            }
            if employee_id.is_empty() {
                return Err(WorkflowError::Validation("employee id is required".into()));
            }
            inner.busy = true;
            self.set_status(&mut inner, Tone::Info, "Capturing face for registration...".into());
            inner.generation
        };

        let opened = self.gate.open(&self.camera, &self.options.constraints).await;
        {
            let mut inner = self.lock();
            if inner.generation != generation {
                tracing::debug!("discarding registration stream after cancel");
                return Err(WorkflowError::Cancelled);
            }
            match opened {
                Ok(lease) => inner.stream = Some(lease),
                Err(e) => {
                    tracing::warn!(error = %e, "camera acquisition failed");
                    let reason = WorkflowError::CameraAccessDenied(e.to_string());
                    return Err(self.fail(&mut inner, None, reason));
                }
            }
        }

        let loaded = self.loader.ensure_loaded().await;

        let lease = {
            let mut inner = self.lock();
            if inner.generation != generation {
                return Err(WorkflowError::Cancelled);
            }
            if let Err(e) = loaded {
                tracing::warn!(error = %e, "face model load failed");
                return Err(self.fail(&mut inner, None, WorkflowError::ModelLoadFailure(e.to_string())));
            }
            match inner.stream.take() {
                Some(lease) => lease,
                None => {
                    let reason = WorkflowError::CameraAccessDenied(CameraError::StreamStopped.to_string());
                    return Err(self.fail(&mut inner, None, reason));
                }
            }
        };

        let snapshot = lease.take_frame().await;
        let frame = {
            let mut inner = self.lock();
            if inner.generation != generation {
                return Err(WorkflowError::Cancelled);
            }
            match snapshot {
                Ok(frame) => frame,
                Err(e) => {
                    let reason = WorkflowError::CameraAccessDenied(e.to_string());
                    return Err(self.fail(&mut inner, None, reason));
                }
            }
        };

        let extracted = extract_capture(&self.loader, frame, self.options.jpeg_quality).await;

        let request = {
            let mut inner = self.lock();
            if inner.generation != generation {
                return Err(WorkflowError::Cancelled);
            }
            match extracted {
                Ok(capture) => RegisterRequest {
                    employee_id: employee_id.to_string(),
                    face_descriptor: capture.descriptor,
                    face_image: Some(capture.frame.data_url),
                },
                Err(reason) => return Err(self.fail(&mut inner, None, reason)),
            }
        };

        let result = self.api.register(&request).await;

        let mut inner = self.lock();
        if inner.generation != generation {
            return Err(WorkflowError::Cancelled);
        }
        inner.busy = false;
        match result {
            Ok(receipt) => {
                tracing::info!(employee = %receipt.employee_name, "face registered");
                let text = format!("{} ({})", receipt.message, receipt.employee_name);
                self.emit(WorkflowEvent::Toast {
                    tone: Tone::Success,
                    text: text.clone(),
                });
                self.set_status(&mut inner, Tone::Success, text);
                Ok(receipt)
            }
            Err(e) => {
                tracing::warn!(error = %e, "face registration failed");
                Err(self.fail(&mut inner, None, WorkflowError::Network(e.to_string())))
            }
        }
    }

    async fn acquire(&self, action: ClockAction, generation: u64) -> Result<(), WorkflowError> {
        let opened = self.gate.open(&self.camera, &self.options.constraints).await;

        {
            let mut inner = self.lock();
            if inner.generation != generation {
                // `opened` drops here and stops the late stream.
                tracing::debug!("discarding camera stream opened for a cancelled attempt");
                return Err(WorkflowError::Cancelled);
            }
            match opened {
                Ok(stream) => {
                    tracing::info!(
                        width = self.options.constraints.width,
                        height = self.options.constraints.height,
                        "camera stream acquired"
                    );
                    inner.stream = Some(stream);
                    self.transition(&mut inner, State::ModelLoading(action));
                }
                Err(e) => {
                    tracing::warn!(error = %e, "camera acquisition failed");
                    let reason = WorkflowError::CameraAccessDenied(e.to_string());
                    return Err(self.fail(&mut inner, Some(action), reason));
                }
            }
        }

        let loaded = self.loader.ensure_loaded().await;

        let mut inner = self.lock();
        if inner.generation != generation {
            tracing::debug!("model load finished after cancel");
            return Err(WorkflowError::Cancelled);
        }
        match loaded {
            Ok(()) => {
                self.transition(&mut inner, State::LiveCapture(action));
                Ok(())
            }
            Err(e) => {
                tracing::warn!(error = %e, "face model load failed");
                let reason = WorkflowError::ModelLoadFailure(e.to_string());
                Err(self.fail(&mut inner, Some(action), reason))
            }
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner<C::Stream>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn store_id(&self) -> &str {
        self.session.store_id().unwrap_or_default()
    }

    fn transition(&self, inner: &mut Inner<C::Stream>, next: State) {
        let from = inner.state.stage();
        let to = next.stage();
        if !to.holds_camera() {
            Self::release_camera(inner);
        }
        if to.is_terminal() || to == Stage::Idle {
            inner.generation += 1;
            inner.busy = false;
        }
        inner.state = next;
        tracing::info!(%from, %to, "workflow transition");

        let (tone, text) = status_for(&inner.state);
        self.emit(WorkflowEvent::StageChanged {
            stage: to,
            generation: inner.generation,
        });
        if to.is_terminal() {
            self.emit(WorkflowEvent::Toast {
                tone,
                text: text.clone(),
            });
        }
        self.set_status(inner, tone, text);
    }

    fn fail(
        &self,
        inner: &mut Inner<C::Stream>,
        action: Option<ClockAction>,
        reason: WorkflowError,
    ) -> WorkflowError {
        self.transition(
            inner,
            State::Failed {
                action,
                reason: reason.clone(),
            },
        );
        reason
    }

    fn reject(&self, inner: &Inner<C::Stream>, op: &'static str) -> WorkflowError {
        let stage = inner.state.stage();
        tracing::warn!(op, %stage, "rejected operation in current stage");
        WorkflowError::InvalidTransition { op, stage }
    }

    fn release_camera(inner: &mut Inner<C::Stream>) {
        // Dropping the lease stops the stream.
        if inner.stream.take().is_some() {
            tracing::info!("camera stream stopped");
        }
    }

    fn set_status(&self, inner: &mut Inner<C::Stream>, tone: Tone, text: String) {
        self.emit(WorkflowEvent::Status {
            tone,
            text: text.clone(),
        });
        inner.tone = tone;
        inner.status = text;
    }

    fn emit(&self, event: WorkflowEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }
}

fn status_for(state: &State) -> (Tone, String) {
    match state {
        State::Idle => (Tone::Neutral, "Choose clock in or clock out".into()),
        State::AwaitingCamera(_) => (Tone::Info, "Requesting camera access...".into()),
        State::ModelLoading(_) => (Tone::Info, "Loading face recognition...".into()),
        State::LiveCapture(action) => (
            Tone::Info,
            format!("Look at the camera and press Capture to {}", action.verb()),
        ),
        State::Recognizing { capture: None, .. } => (Tone::Info, "Detecting face...".into()),
        State::Recognizing { capture: Some(_), .. } => (Tone::Info, "Recognizing...".into()),
        State::AwaitingConfirmation {
            action,
            recognition,
            ..
        } => match recognition {
            Recognition::Matched {
                employee_name,
                confidence,
                ..
            } => (
                Tone::Info,
                format!(
                    "Recognized {employee_name} ({:.0}% match). Confirm to {}.",
                    confidence * 100.0,
                    action.verb()
                ),
            ),
            Recognition::NotRecognized { message } => (
                Tone::Info,
                format!("{message} Add this appearance under your name, or retake."),
            ),
        },
        State::Submitting(action) => (
            Tone::Info,
            match action {
                ClockAction::ClockIn => "Clocking in...".into(),
                ClockAction::ClockOut => "Clocking out...".into(),
            },
        ),
        State::Succeeded(receipt) => (Tone::Success, describe_receipt(receipt, &chrono::Local)),
        State::Failed { reason, .. } => (Tone::Error, reason.to_string()),
    }
}

/// Success text for a committed clock action, with times shown in `tz`.
///
/// Hours worked are printed exactly as the server reported them.
pub fn describe_receipt<Tz: TimeZone>(receipt: &ClockReceipt, tz: &Tz) -> String
where
    Tz::Offset: fmt::Display,
{
    match receipt {
        ClockReceipt::In {
            employee_name,
            clock_in,
            ..
        } => format!("{employee_name} clocked in at {}", time::format_in(clock_in, tz)),
        ClockReceipt::Out {
            employee_name,
            clock_out,
            hours_worked,
            ..
        } => format!(
            "{employee_name} clocked out at {}. Hours worked: {hours_worked}",
            time::format_in(clock_out, tz)
        ),
    }
}


#[cfg(test)]
mod tests {
    use super::testing::*;
    use super::*;
    use crate::api::ApiError;
    use crate::model::testing::{descriptor, ScriptedModel};
    use chrono::Utc;
    use std::sync::atomic::Ordering;

    async fn reach_confirmation(c: &TestController, seed: f32) -> Recognition {
        c.model().push_detection(Some(descriptor(seed)));
        c.capture_and_recognize().await.unwrap()
    }

    /// Generation of the most recent terminal stage seen on `events`.
    fn last_terminal_generation(events: &mut broadcast::Receiver<WorkflowEvent>) -> Option<u64> {
        let mut found = None;
        while let Ok(event) = events.try_recv() {
            if let WorkflowEvent::StageChanged { stage, generation } = event {
                if stage.is_terminal() {
                    found = Some(generation);
                }
            }
        }
        found
    }

    #[tokio::test]
    async fn test_clock_in_happy_path() {
        let c = controller();
        let mut events = c.subscribe();

        c.begin_clock_action(ClockAction::ClockIn).await.unwrap();
        assert_eq!(c.stage(), Stage::LiveCapture);
        assert_eq!(c.open_streams(), 1);

        let recognition = reach_confirmation(&c, 1.0).await;
        assert_eq!(recognition, matched("Dana"));
        assert_eq!(c.stage(), Stage::AwaitingConfirmation);
        // Camera is released right after capture.
        assert_eq!(c.open_streams(), 0);

        let view = c.view();
        assert_eq!(view.employee_name.as_deref(), Some("Dana"));
        assert!(view.has_photo);
        assert!(view.status.contains("91% match"), "{}", view.status);

        let receipt = c.confirm_and_submit().await.unwrap();
        assert_eq!(receipt.employee_name(), "Dana");
        assert_eq!(c.stage(), Stage::Succeeded);
        assert_eq!(c.view().tone, Tone::Success);
        assert_eq!(c.max_streams(), 1);

        let calls = c.api().clock_in_calls.lock().unwrap().clone();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].store_id, "Lawrence");
        assert_eq!(calls[0].face_descriptor, descriptor(1.0));
        assert!(calls[0].face_image.starts_with("data:image/jpeg;base64,"));
        assert!(c.api().clock_out_calls.lock().unwrap().is_empty());

        let mut saw_toast = false;
        while let Ok(event) = events.try_recv() {
            if let WorkflowEvent::Toast { tone, .. } = event {
                assert_eq!(tone, Tone::Success);
                saw_toast = true;
            }
        }
        assert!(saw_toast);

        c.dismiss().unwrap();
        assert_eq!(c.stage(), Stage::Idle);
    }

    #[tokio::test]
    async fn test_retake_submits_only_latest_capture() {
        let c = controller();
        c.begin_clock_action(ClockAction::ClockIn).await.unwrap();
        reach_confirmation(&c, 1.0).await;

        c.retake().await.unwrap();
        assert_eq!(c.stage(), Stage::LiveCapture);
        assert_eq!(c.open_streams(), 1);

        reach_confirmation(&c, 2.0).await;
        c.confirm_and_submit().await.unwrap();

        let recognized = c.api().recognize_calls.lock().unwrap().clone();
        assert_eq!(recognized.len(), 2);
        assert_eq!(recognized[0].face_descriptor, descriptor(1.0));
        assert_eq!(recognized[1].face_descriptor, descriptor(2.0));

        let clocked = c.api().clock_in_calls.lock().unwrap().clone();
        assert_eq!(clocked.len(), 1);
        assert_eq!(clocked[0].face_descriptor, descriptor(2.0));
        assert_eq!(c.max_streams(), 1);
        assert_eq!(c.open_streams(), 0);
    }

    #[tokio::test]
    async fn test_begin_rejected_unless_idle() {
        let c = controller();
        c.begin_clock_action(ClockAction::ClockIn).await.unwrap();

        let err = c.begin_clock_action(ClockAction::ClockOut).await.unwrap_err();
        assert_eq!(
            err,
            WorkflowError::InvalidTransition {
                op: "start a clock action",
                stage: Stage::LiveCapture
            }
        );
        assert_eq!(c.stage(), Stage::LiveCapture);
        assert_eq!(c.view().action, Some(ClockAction::ClockIn));
        assert_eq!(c.camera_opens(), 1);
    }

    #[tokio::test]
    async fn test_operations_rejected_in_wrong_stage() {
        let c = controller();
        assert!(matches!(
            c.capture_and_recognize().await,
            Err(WorkflowError::InvalidTransition { stage: Stage::Idle, .. })
        ));
        assert!(matches!(
            c.confirm_and_submit().await,
            Err(WorkflowError::InvalidTransition { .. })
        ));
        assert!(matches!(c.retake().await, Err(WorkflowError::InvalidTransition { .. })));
        assert!(matches!(c.dismiss(), Err(WorkflowError::InvalidTransition { .. })));
        assert_eq!(c.stage(), Stage::Idle);
        assert_eq!(c.camera_opens(), 0);
    }

    #[tokio::test]
    async fn test_model_loaded_once_across_attempts() {
        let c = controller();
        for _ in 0..3 {
            c.begin_clock_action(ClockAction::ClockIn).await.unwrap();
            c.cancel();
            assert_eq!(c.stage(), Stage::Idle);
        }
        assert_eq!(c.model().loads.load(Ordering::SeqCst), 1);
        assert_eq!(c.camera_opens(), 3);
        assert_eq!(c.open_streams(), 0);
    }

    #[tokio::test]
    async fn test_camera_denied_fails_without_model_load() {
        let c = controller();
        c.deny_camera(Some(CameraError::PermissionDenied(
            "/dev/video0: Permission denied (os error 13)".into(),
        )));

        let err = c.begin_clock_action(ClockAction::ClockIn).await.unwrap_err();
        assert!(matches!(err, WorkflowError::CameraAccessDenied(_)));
        assert_eq!(c.stage(), Stage::Failed);
        let view = c.view();
        assert_eq!(view.tone, Tone::Error);
        assert!(view.status.contains("Permission denied (os error 13)"), "{}", view.status);
        assert_eq!(c.model().loads.load(Ordering::SeqCst), 0);
        assert_eq!(c.open_streams(), 0);
    }

    #[tokio::test]
    async fn test_no_face_fails_then_retry_gets_fresh_stream() {
        let c = controller();
        c.begin_clock_action(ClockAction::ClockOut).await.unwrap();
        c.model().push_detection(None);

        let err = c.capture_and_recognize().await.unwrap_err();
        assert_eq!(err, WorkflowError::NoFaceDetected);
        assert_eq!(c.stage(), Stage::Failed);
        assert!(c.view().status.contains("no face detected"));
        assert_eq!(c.open_streams(), 0);
        assert!(c.api().recognize_calls.lock().unwrap().is_empty());

        c.retake().await.unwrap();
        assert_eq!(c.stage(), Stage::LiveCapture);
        assert_eq!(c.view().action, Some(ClockAction::ClockOut));
        assert_eq!(c.camera_opens(), 2);
        assert_eq!(c.open_streams(), 1);
    }

    #[tokio::test]
    async fn test_model_load_failure_releases_camera() {
        let model = ScriptedModel::default();
        model.fail_load.store(true, Ordering::SeqCst);
        let c = controller_with(FakeCamera::default(), model, FakeApi::default());

        let err = c.begin_clock_action(ClockAction::ClockIn).await.unwrap_err();
        assert!(matches!(err, WorkflowError::ModelLoadFailure(_)));
        assert_eq!(c.stage(), Stage::Failed);
        assert_eq!(c.open_streams(), 0);
        assert_eq!(c.max_streams(), 1);
    }

    #[tokio::test]
    async fn test_not_recognized_offers_add_appearance() {
        let c = controller();
        c.api().recognitions.lock().unwrap().push_back(Ok(Recognition::NotRecognized {
            message: "Face not recognized. Please contact your manager.".into(),
        }));
        c.begin_clock_action(ClockAction::ClockIn).await.unwrap();
        reach_confirmation(&c, 3.0).await;

        let view = c.view();
        assert_eq!(view.stage, Stage::AwaitingConfirmation);
        assert!(view.not_recognized);
        assert!(view.has_photo);

        // Normal confirmation is not offered on this branch.
        assert!(matches!(c.confirm_and_submit().await, Err(WorkflowError::Validation(_))));

        let err = c.add_appearance("   ").await.unwrap_err();
        assert!(matches!(err, WorkflowError::Validation(_)));
        assert_eq!(c.stage(), Stage::AwaitingConfirmation);
        assert!(c.api().appearance_calls.lock().unwrap().is_empty());

        let receipt = c.add_appearance(" Dana Scully ").await.unwrap();
        assert_eq!(receipt.total_registrations, Some(2));
        assert_eq!(c.stage(), Stage::Idle);
        assert_eq!(c.view().tone, Tone::Success);

        let calls = c.api().appearance_calls.lock().unwrap().clone();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].employee_name, "Dana Scully");
        assert_eq!(calls[0].face_descriptor, descriptor(3.0));
        assert!(c.api().clock_in_calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_add_appearance_only_after_non_match() {
        let c = controller();
        c.begin_clock_action(ClockAction::ClockIn).await.unwrap();
        reach_confirmation(&c, 1.0).await;
        assert!(matches!(
            c.add_appearance("Dana").await,
            Err(WorkflowError::InvalidTransition { .. })
        ));
    }

    #[tokio::test]
    async fn test_clock_out_hours_shown_verbatim() {
        let c = controller();
        let hours: serde_json::Number = serde_json::from_str("7.5").unwrap();
        c.api().clock_results.lock().unwrap().push_back(Ok(ClockReceipt::Out {
            employee_name: "Dana".into(),
            clock_in: Utc::now(),
            clock_out: Utc::now(),
            hours_worked: hours,
            confidence: Some(0.88),
        }));

        c.begin_clock_action(ClockAction::ClockOut).await.unwrap();
        reach_confirmation(&c, 1.0).await;
        c.confirm_and_submit().await.unwrap();

        assert_eq!(c.api().clock_out_calls.lock().unwrap().len(), 1);
        let view = c.view();
        assert_eq!(view.stage, Stage::Succeeded);
        assert!(view.status.contains("Hours worked: 7.5"), "{}", view.status);
    }

    #[tokio::test]
    async fn test_clock_failure_message_is_verbatim() {
        let c = controller();
        c.api().clock_results.lock().unwrap().push_back(Err(ApiError::Status {
            status: 400,
            message: "Dana is already clocked in today.".into(),
        }));
        c.begin_clock_action(ClockAction::ClockIn).await.unwrap();
        reach_confirmation(&c, 1.0).await;

        let err = c.confirm_and_submit().await.unwrap_err();
        assert_eq!(err, WorkflowError::Network("Dana is already clocked in today.".into()));
        let view = c.view();
        assert_eq!(view.stage, Stage::Failed);
        assert_eq!(view.status, "Dana is already clocked in today.");
    }

    #[tokio::test]
    async fn test_cancel_during_recognition_discards_result() {
        let api = FakeApi {
            delay_ms: 50,
            ..Default::default()
        };
        let c = controller_with(FakeCamera::default(), ScriptedModel::default(), api);
        c.begin_clock_action(ClockAction::ClockIn).await.unwrap();
        c.model().push_detection(Some(descriptor(1.0)));

        let (result, _) = tokio::join!(c.capture_and_recognize(), async {
            tokio::time::sleep(Duration::from_millis(10)).await;
            c.cancel();
        });

        assert_eq!(result.unwrap_err(), WorkflowError::Cancelled);
        assert_eq!(c.stage(), Stage::Idle);
        assert_eq!(c.open_streams(), 0);
    }

    #[tokio::test]
    async fn test_cancel_while_camera_opening_stops_late_stream() {
        let c = controller_with(FakeCamera::with_open_delay(40), ScriptedModel::default(), FakeApi::default());

        let (result, _) = tokio::join!(c.begin_clock_action(ClockAction::ClockIn), async {
            tokio::time::sleep(Duration::from_millis(10)).await;
            c.cancel();
        });

        assert_eq!(result.unwrap_err(), WorkflowError::Cancelled);
        assert_eq!(c.stage(), Stage::Idle);
        assert_eq!(c.open_streams(), 0);
        assert_eq!(c.model().loads.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_cancel_from_live_capture_stops_stream() {
        let c = controller();
        c.begin_clock_action(ClockAction::ClockIn).await.unwrap();
        assert_eq!(c.open_streams(), 1);
        c.cancel();
        c.cancel();
        assert_eq!(c.open_streams(), 0);
        assert_eq!(c.stage(), Stage::Idle);
    }

    #[tokio::test]
    async fn test_non_store_session_unauthorized() {
        let c = WorkflowController::new(
            FakeCamera::default(),
            Arc::new(ModelLoader::new(ScriptedModel::default())),
            FakeApi::default(),
            Session {
                role: Role::Manager,
                identity: "mgr".into(),
                token: "t".into(),
            },
            WorkflowOptions::default(),
        );
        let err = c.begin_clock_action(ClockAction::ClockIn).await.unwrap_err();
        assert_eq!(err, WorkflowError::Unauthorized(Role::Manager));
        assert_eq!(c.stage(), Stage::Idle);
        assert_eq!(c.camera.opens.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_schedule_dismiss_resets_terminal_state() {
        let c = Arc::new(controller());
        let mut events = c.subscribe();
        c.deny_camera(Some(CameraError::DeviceBusy));
        assert!(c.begin_clock_action(ClockAction::ClockIn).await.is_err());
        assert_eq!(c.stage(), Stage::Failed);

        let generation = last_terminal_generation(&mut events).unwrap();
        c.schedule_dismiss(generation, Duration::from_millis(10));
        tokio::time::sleep(Duration::from_millis(60)).await;
        assert_eq!(c.stage(), Stage::Idle);
    }

    #[tokio::test]
    async fn test_schedule_dismiss_ignored_after_user_moved_on() {
        let c = Arc::new(controller());
        let mut events = c.subscribe();
        c.deny_camera(Some(CameraError::DeviceBusy));
        assert!(c.begin_clock_action(ClockAction::ClockIn).await.is_err());
        let generation = last_terminal_generation(&mut events).unwrap();
        c.schedule_dismiss(generation, Duration::from_millis(30));

        c.deny_camera(None);
        c.retake().await.unwrap();
        tokio::time::sleep(Duration::from_millis(60)).await;
        assert_eq!(c.stage(), Stage::LiveCapture);
    }

    #[tokio::test]
    async fn test_stale_dismiss_leaves_newer_result() {
        let c = Arc::new(controller());
        let mut events = c.subscribe();
        c.deny_camera(Some(CameraError::DeviceBusy));
        assert!(c.begin_clock_action(ClockAction::ClockIn).await.is_err());
        let first = last_terminal_generation(&mut events).unwrap();

        // Retake fails again: a newer Failed state replaces the first one.
        assert!(c.retake().await.is_err());
        let second = last_terminal_generation(&mut events).unwrap();
        assert_ne!(first, second);

        c.schedule_dismiss(first, Duration::from_millis(10));
        tokio::time::sleep(Duration::from_millis(40)).await;
        assert_eq!(c.stage(), Stage::Failed);

        c.schedule_dismiss(second, Duration::from_millis(10));
        tokio::time::sleep(Duration::from_millis(40)).await;
        assert_eq!(c.stage(), Stage::Idle);
    }

    #[tokio::test]
    async fn test_recognition_network_failure_is_verbatim() {
        let c = controller();
        c.api().recognitions.lock().unwrap().push_back(Err(ApiError::Status {
            status: 500,
            message: "Face recognition service unavailable".into(),
        }));
        c.begin_clock_action(ClockAction::ClockIn).await.unwrap();
        c.model().push_detection(Some(descriptor(1.0)));

        let err = c.capture_and_recognize().await.unwrap_err();
        assert_eq!(err, WorkflowError::Network("Face recognition service unavailable".into()));
        let view = c.view();
        assert_eq!(view.stage, Stage::Failed);
        assert_eq!(view.tone, Tone::Error);
        assert_eq!(view.status, "Face recognition service unavailable");
        assert_eq!(c.open_streams(), 0);

        c.retake().await.unwrap();
        assert_eq!(c.stage(), Stage::LiveCapture);
        assert_eq!(c.max_streams(), 1);
    }

    #[tokio::test]
    async fn test_add_appearance_failure() {
        let c = controller();
        c.api().recognitions.lock().unwrap().push_back(Ok(Recognition::NotRecognized {
            message: "Face not recognized.".into(),
        }));
        c.api().appearance_results.lock().unwrap().push_back(Err(ApiError::Status {
            status: 404,
            message: "Employee 'Dana' not found".into(),
        }));
        c.begin_clock_action(ClockAction::ClockOut).await.unwrap();
        reach_confirmation(&c, 2.0).await;

        let err = c.add_appearance("Dana").await.unwrap_err();
        assert_eq!(err, WorkflowError::Network("Employee 'Dana' not found".into()));
        let view = c.view();
        assert_eq!(view.stage, Stage::Failed);
        assert_eq!(view.status, "Employee 'Dana' not found");
        assert_eq!(view.action, Some(ClockAction::ClockOut));

        // Not left busy: the user can retake.
        c.retake().await.unwrap();
        assert_eq!(c.stage(), Stage::LiveCapture);
    }

    #[tokio::test]
    async fn test_snapshot_does_not_block_controller() {
        let c = controller_with(
            FakeCamera::with_snapshot_delay(60),
            ScriptedModel::default(),
            FakeApi::default(),
        );
        c.begin_clock_action(ClockAction::ClockIn).await.unwrap();
        c.model().push_detection(Some(descriptor(1.0)));

        let (result, restarted) = tokio::join!(c.capture_and_recognize(), async {
            tokio::time::sleep(Duration::from_millis(10)).await;
            assert_eq!(c.stage(), Stage::Recognizing);
            c.cancel();
            assert_eq!(c.stage(), Stage::Idle);
            c.begin_clock_action(ClockAction::ClockIn).await
        });

        assert_eq!(result.unwrap_err(), WorkflowError::Cancelled);
        restarted.unwrap();
        assert_eq!(c.stage(), Stage::LiveCapture);
        // The new stream waited for the old one to stop.
        assert_eq!(c.max_streams(), 1);
        assert_eq!(c.open_streams(), 1);
    }

    #[tokio::test]
    async fn test_cancel_registration_stops_its_stream() {
        let model = ScriptedModel {
            load_delay_ms: 60,
            ..Default::default()
        };
        let c = controller_with(FakeCamera::default(), model, FakeApi::default());

        let (registered, begun) = tokio::join!(c.register_face("42"), async {
            tokio::time::sleep(Duration::from_millis(10)).await;
            assert_eq!(c.open_streams(), 1);
            c.cancel();
            assert_eq!(c.open_streams(), 0);
            c.begin_clock_action(ClockAction::ClockIn).await
        });

        assert_eq!(registered.unwrap_err(), WorkflowError::Cancelled);
        begun.unwrap();
        assert_eq!(c.stage(), Stage::LiveCapture);
        assert_eq!(c.max_streams(), 1);
        assert_eq!(c.open_streams(), 1);
        assert!(c.api().register_calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_register_face_from_idle() {
        let c = controller();
        c.model().push_detection(Some(descriptor(5.0)));

        let receipt = c.register_face(" 42 ").await.unwrap();
        assert_eq!(receipt.employee_id, "42");
        assert_eq!(c.stage(), Stage::Idle);
        assert_eq!(c.open_streams(), 0);

        let calls = c.api().register_calls.lock().unwrap().clone();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].face_descriptor, descriptor(5.0));
        assert!(calls[0].face_image.is_some());
    }

    #[tokio::test]
    async fn test_register_face_without_face_fails() {
        let c = controller();
        c.model().push_detection(None);
        assert_eq!(c.register_face("42").await.unwrap_err(), WorkflowError::NoFaceDetected);
        assert_eq!(c.stage(), Stage::Failed);
        assert_eq!(c.open_streams(), 0);
        assert!(c.api().register_calls.lock().unwrap().is_empty());
        // No action recorded, so only dismiss applies.
        assert!(matches!(c.retake().await, Err(WorkflowError::InvalidTransition { .. })));
    }

    #[test]
    fn test_describe_receipt() {
        let clock_in = crate::time::parse_server_time("2025-03-04T08:00:00Z").unwrap();
        let clock_out = crate::time::parse_server_time("2025-03-04T16:30:00Z").unwrap();
        let receipt = ClockReceipt::Out {
            employee_name: "Dana".into(),
            clock_in,
            clock_out,
            hours_worked: serde_json::from_str("8.5").unwrap(),
            confidence: None,
        };
        assert_eq!(
            describe_receipt(&receipt, &Utc),
            "Dana clocked out at 4:30 PM. Hours worked: 8.5"
        );

        let receipt = ClockReceipt::In {
            employee_name: "Dana".into(),
            clock_in,
            confidence: None,
        };
        assert_eq!(describe_receipt(&receipt, &Utc), "Dana clocked in at 8:00 AM");
    }
}
