use anyhow::{Context, Result};
use punch_api::HttpApi;
use punch_core::{Config, ModelLoader, OnnxFaceModel, Session, WorkflowController, WorkflowEvent};
use punch_hw::V4lCamera;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast::{self, error::RecvError};
use tracing_subscriber::EnvFilter;
use zbus::object_server::SignalEmitter;

mod dbus_interface;

use dbus_interface::{Kiosk, KioskService, BUS_NAME, OBJECT_PATH};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    tracing::info!("punchd starting");

    let config = Config::load()?;
    tracing::info!(
        api = %config.api_base_url,
        camera = %config.camera_device,
        models = %config.model_dir.display(),
        "configuration loaded"
    );

    let session = Session::load(&config.session_path)
        .with_context(|| format!("cannot start without a session ({})", config.session_path.display()))?;
    match session.store_id() {
        Some(store) => tracing::info!(store, "store session loaded"),
        None => tracing::warn!(role = ?session.role, "not a store session; clock actions will be refused"),
    }

    let api = HttpApi::new(&config.api_base_url, &session, config.request_timeout())?;
    let camera = V4lCamera::new(config.camera_device.clone());
    let loader = Arc::new(ModelLoader::new(OnnxFaceModel::new(&config.model_dir)));
    let controller = Arc::new(WorkflowController::new(
        camera,
        loader,
        api,
        session,
        config.workflow_options(),
    ));

    let events = controller.subscribe();
    let conn = zbus::connection::Builder::session()?
        .name(BUS_NAME)?
        .serve_at(OBJECT_PATH, KioskService::new(Arc::clone(&controller)))?
        .build()
        .await
        .context("failed to register on the D-Bus session bus")?;

    let forwarder = tokio::spawn(forward_events(
        conn.clone(),
        Arc::clone(&controller),
        events,
        config.result_display(),
    ));

    tracing::info!(bus = BUS_NAME, path = OBJECT_PATH, "punchd ready");

    tokio::signal::ctrl_c().await?;
    tracing::info!("punchd shutting down");
    controller.cancel();
    forwarder.abort();

    Ok(())
}

/// Relay workflow events as D-Bus signals and arm auto-dismiss on results.
async fn forward_events(
    conn: zbus::Connection,
    controller: Arc<Kiosk>,
    mut events: broadcast::Receiver<WorkflowEvent>,
    display: Duration,
) {
    let emitter = match SignalEmitter::new(&conn, OBJECT_PATH) {
        Ok(emitter) => emitter,
        Err(e) => {
            tracing::warn!(error = %e, "cannot emit signals");
            return;
        }
    };

    loop {
        let sent = match events.recv().await {
            Ok(WorkflowEvent::StageChanged { stage, generation }) => {
                if stage.is_terminal() && !display.is_zero() {
                    controller.schedule_dismiss(generation, display);
                }
                KioskService::stage_changed(&emitter, &stage.to_string()).await
            }
            Ok(WorkflowEvent::Status { tone, text }) => {
                KioskService::status_changed(&emitter, &tone.to_string(), &text).await
            }
            Ok(WorkflowEvent::Toast { tone, text }) => {
                tracing::info!(%tone, %text, "toast");
                KioskService::toast(&emitter, &tone.to_string(), &text).await
            }
            Err(RecvError::Lagged(skipped)) => {
                tracing::warn!(skipped, "event forwarder lagged");
                continue;
            }
            Err(RecvError::Closed) => break,
        };
        if let Err(e) = sent {
            tracing::warn!(error = %e, "failed to emit signal");
        }
    }
}
