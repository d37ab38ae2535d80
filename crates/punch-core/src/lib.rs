//! punch-core — Face-assisted time clock workflow.
//!
//! Owns the capture/clock state machine and the capability seams it drives:
//! a camera, a face model producing 128-d descriptors, and the remote
//! timeclock API. Concrete camera and HTTP backends live in `punch-hw` and
//! `punch-api`; an ONNX face model ships in [`onnx`].

pub mod api;
pub mod camera;
pub mod capture;
pub mod config;
pub mod frame;
pub mod model;
pub mod onnx;
pub mod time;
pub mod types;
pub mod workflow;

pub use api::{
    AddAppearanceRequest, ApiError, AppearanceReceipt, ClockReceipt, ClockRequest, RecognizeRequest,
    Recognition, RegisterReceipt, RegisterRequest, TimeclockApi,
};
pub use camera::{
    CameraError, CameraGate, CameraLease, CameraSource, MediaStream, StreamConstraints, StreamGuard,
};
pub use config::{Config, ConfigError};
pub use frame::Frame;
pub use model::{FaceModel, ModelError, ModelLoader};
pub use onnx::OnnxFaceModel;
pub use types::{Capture, CapturedFrame, ClockAction, FaceDescriptor, Role, Session, SessionError};
pub use workflow::{
    describe_receipt, Stage, Tone, WorkflowController, WorkflowError, WorkflowEvent, WorkflowOptions,
    WorkflowView,
};
