use punch_api::HttpApi;
use punch_core::{ClockAction, OnnxFaceModel, WorkflowController, WorkflowError};
use punch_hw::V4lCamera;
use std::sync::Arc;
use zbus::interface;
use zbus::object_server::SignalEmitter;

pub const BUS_NAME: &str = "org.punchclock.Kiosk1";
pub const OBJECT_PATH: &str = "/org/punchclock/Kiosk1";

pub type Kiosk = WorkflowController<V4lCamera, OnnxFaceModel, HttpApi>;

/// D-Bus interface for the kiosk workflow.
///
/// Bus name: org.punchclock.Kiosk1
/// Object path: /org/punchclock/Kiosk1
///
/// Every method returns the workflow view as JSON after the call.
pub struct KioskService {
    controller: Arc<Kiosk>,
}

impl KioskService {
    pub fn new(controller: Arc<Kiosk>) -> Self {
        Self { controller }
    }

    fn view_json(&self) -> zbus::fdo::Result<String> {
        serde_json::to_string(&self.controller.view()).map_err(|e| zbus::fdo::Error::Failed(e.to_string()))
    }
}

fn to_fdo(err: WorkflowError) -> zbus::fdo::Error {
    let text = err.to_string();
    match err {
        WorkflowError::Validation(_) => zbus::fdo::Error::InvalidArgs(text),
        WorkflowError::Unauthorized(_) => zbus::fdo::Error::AccessDenied(text),
        _ => zbus::fdo::Error::Failed(text),
    }
}

#[interface(name = "org.punchclock.Kiosk1")]
impl KioskService {
    /// Start a clock action ("clock-in" or "clock-out") and open the camera.
    async fn begin_clock_action(&self, action: &str) -> zbus::fdo::Result<String> {
        let action: ClockAction = action.parse().map_err(zbus::fdo::Error::InvalidArgs)?;
        tracing::info!(%action, "begin requested");
        self.controller.begin_clock_action(action).await.map_err(to_fdo)?;
        self.view_json()
    }

    /// Snapshot the camera and run recognition.
    async fn capture(&self) -> zbus::fdo::Result<String> {
        self.controller.capture_and_recognize().await.map_err(to_fdo)?;
        self.view_json()
    }

    /// Commit the recognized clock action.
    async fn confirm(&self) -> zbus::fdo::Result<String> {
        self.controller.confirm_and_submit().await.map_err(to_fdo)?;
        self.view_json()
    }

    async fn retake(&self) -> zbus::fdo::Result<String> {
        self.controller.retake().await.map_err(to_fdo)?;
        self.view_json()
    }

    async fn cancel(&self) -> zbus::fdo::Result<String> {
        self.controller.cancel();
        self.view_json()
    }

    async fn dismiss(&self) -> zbus::fdo::Result<String> {
        self.controller.dismiss().map_err(to_fdo)?;
        self.view_json()
    }

    /// Register the unrecognized capture under an existing employee name.
    async fn add_appearance(&self, employee_name: &str) -> zbus::fdo::Result<String> {
        self.controller.add_appearance(employee_name).await.map_err(to_fdo)?;
        self.view_json()
    }

    /// Capture a face and register it as the employee's first appearance.
    async fn register_face(&self, employee_id: &str) -> zbus::fdo::Result<String> {
        tracing::info!(employee_id, "face registration requested");
        let receipt = self.controller.register_face(employee_id).await.map_err(to_fdo)?;
        Ok(serde_json::json!({
            "message": receipt.message,
            "employee_id": receipt.employee_id,
            "employee_name": receipt.employee_name,
        })
        .to_string())
    }

    /// Current workflow view.
    async fn state(&self) -> zbus::fdo::Result<String> {
        self.view_json()
    }

    /// Daemon status information.
    async fn status(&self) -> zbus::fdo::Result<String> {
        let session = self.controller.session();
        Ok(serde_json::json!({
            "version": env!("CARGO_PKG_VERSION"),
            "stage": self.controller.stage(),
            "model_loaded": self.controller.loader().is_loaded(),
            "store_id": session.store_id(),
        })
        .to_string())
    }

    #[zbus(signal)]
    async fn stage_changed(emitter: &SignalEmitter<'_>, stage: &str) -> zbus::Result<()>;

    /// Inline status line update.
    #[zbus(signal)]
    async fn status_changed(emitter: &SignalEmitter<'_>, tone: &str, text: &str) -> zbus::Result<()>;

    /// Transient notification for a finished workflow.
    #[zbus(signal)]
    async fn toast(emitter: &SignalEmitter<'_>, tone: &str, text: &str) -> zbus::Result<()>;
}
