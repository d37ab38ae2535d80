use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use punch_api::{HttpApi, TodayEntries};
use punch_core::time::format_local;
use punch_core::{Config, Session};
use serde_json::Value;
use std::io::{BufRead, Write};

#[derive(Parser)]
#[command(name = "punch", about = "Punchclock kiosk CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Clock in: open the camera, recognize, then ask for confirmation
    ClockIn {
        /// Stop once the camera is live instead of capturing right away
        #[arg(long)]
        no_capture: bool,
    },
    /// Clock out: open the camera, recognize, then ask for confirmation
    ClockOut {
        #[arg(long)]
        no_capture: bool,
    },
    /// Snapshot the live camera and run recognition
    Capture,
    /// Confirm the recognized employee and commit the clock action
    Confirm,
    /// Discard the current capture and reopen the camera
    Retake,
    /// Abort the current workflow
    Cancel,
    /// Acknowledge a result or error
    Dismiss,
    /// Add the unrecognized capture as a new appearance of an employee
    AddAppearance {
        /// Employee name as registered by the manager
        #[arg(short, long)]
        name: String,
    },
    /// Capture and register a face for an employee
    Register {
        #[arg(short, long)]
        employee_id: String,
    },
    /// Show the kiosk workflow state
    State,
    /// Show daemon status
    Status,
    /// Show an employee's face registration status (queries the API directly)
    FaceStatus { employee_id: String },
    /// List today's time entries for this store (queries the API directly)
    Today,
}

#[zbus::proxy(
    interface = "org.punchclock.Kiosk1",
    default_service = "org.punchclock.Kiosk1",
    default_path = "/org/punchclock/Kiosk1"
)]
trait Kiosk {
    async fn begin_clock_action(&self, action: &str) -> zbus::Result<String>;
    async fn capture(&self) -> zbus::Result<String>;
    async fn confirm(&self) -> zbus::Result<String>;
    async fn retake(&self) -> zbus::Result<String>;
    async fn cancel(&self) -> zbus::Result<String>;
    async fn dismiss(&self) -> zbus::Result<String>;
    async fn add_appearance(&self, employee_name: &str) -> zbus::Result<String>;
    async fn register_face(&self, employee_id: &str) -> zbus::Result<String>;
    async fn state(&self) -> zbus::Result<String>;
    async fn status(&self) -> zbus::Result<String>;
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    let view = match cli.command {
        Commands::ClockIn { no_capture } => run_action(&kiosk().await?, "clock-in", no_capture).await?,
        Commands::ClockOut { no_capture } => run_action(&kiosk().await?, "clock-out", no_capture).await?,
        Commands::Capture => kiosk().await?.capture().await?,
        Commands::Confirm => kiosk().await?.confirm().await?,
        Commands::Retake => kiosk().await?.retake().await?,
        Commands::Cancel => kiosk().await?.cancel().await?,
        Commands::Dismiss => kiosk().await?.dismiss().await?,
        Commands::AddAppearance { name } => kiosk().await?.add_appearance(&name).await?,
        Commands::State => kiosk().await?.state().await?,
        Commands::Register { employee_id } => {
            let receipt: Value = serde_json::from_str(&kiosk().await?.register_face(&employee_id).await?)?;
            println!(
                "{} ({})",
                receipt["message"].as_str().unwrap_or_default(),
                receipt["employee_name"].as_str().unwrap_or_default()
            );
            return Ok(());
        }
        Commands::Status => {
            let status: Value = serde_json::from_str(&kiosk().await?.status().await?)?;
            println!("{}", serde_json::to_string_pretty(&status)?);
            return Ok(());
        }
        Commands::FaceStatus { employee_id } => {
            let (api, _) = direct_api()?;
            let status = api.face_status(&employee_id).await?;
            println!("{} (id {})", status.employee_name, status.employee_id);
            println!("  registered:    {}", status.face_registered);
            println!("  appearances:   {}", status.face_registrations_count);
            println!("  photo on file: {}", status.has_face_image);
            return Ok(());
        }
        Commands::Today => {
            let (api, session) = direct_api()?;
            let Some(store) = session.store_id() else {
                bail!("today's entries need a store session (logged in as {:?})", session.role);
            };
            print!("{}", render_today(&api.today(store).await?));
            return Ok(());
        }
    };

    println!("{}", render_view(&serde_json::from_str(&view)?));
    Ok(())
}

async fn kiosk() -> Result<KioskProxy<'static>> {
    let conn = zbus::Connection::session()
        .await
        .context("failed to connect to the D-Bus session bus")?;
    KioskProxy::new(&conn)
        .await
        .context("punchd is not reachable on the session bus")
}

/// Begin an action, capture, and confirm interactively on a match.
async fn run_action(kiosk: &KioskProxy<'_>, action: &str, no_capture: bool) -> Result<String> {
    let view = kiosk.begin_clock_action(action).await?;
    if no_capture {
        return Ok(view);
    }
    let view: Value = serde_json::from_str(&kiosk.capture().await?)?;
    println!("{}", render_view(&view));
    if view["employee_name"].is_null() {
        // Not recognized: leave the capture for add-appearance or retake.
        return Ok(view.to_string());
    }

    print!("Confirm? [y/N] ");
    std::io::stdout().flush()?;
    let mut answer = String::new();
    std::io::stdin().lock().read_line(&mut answer)?;
    if answer.trim().eq_ignore_ascii_case("y") {
        Ok(kiosk.confirm().await?)
    } else {
        Ok(kiosk.cancel().await?)
    }
}

fn render_view(view: &Value) -> String {
    let stage = view["stage"].as_str().unwrap_or("unknown");
    let status = view["status"].as_str().unwrap_or_default();
    let mut out = format!("[{stage}] {status}");
    if view["not_recognized"].as_bool() == Some(true) {
        out.push_str("\n  punch add-appearance --name <your name>   or   punch retake");
    }
    out
}

fn render_today(today: &TodayEntries) -> String {
    let mut out = format!("{} at {}: {} entries\n", today.date, today.store_id, today.entries.len());
    for entry in &today.entries {
        let clock_in = entry.clock_in.as_ref().map(format_local).unwrap_or_else(|| "-".into());
        let clock_out = entry.clock_out.as_ref().map(format_local).unwrap_or_else(|| "-".into());
        let hours = entry
            .hours_worked
            .as_ref()
            .map(|h| format!("{h}h"))
            .unwrap_or_default();
        out.push_str(&format!(
            "  {:<20} in {:>8}  out {:>8}  {hours}\n",
            entry.employee_name, clock_in, clock_out
        ));
    }
    out
}

/// API client for commands that bypass the daemon, configured the same way
/// as `punchd`.
fn direct_api() -> Result<(HttpApi, Session)> {
    let config = Config::load()?;
    tracing::debug!(
        base_url = %config.api_base_url,
        session = %config.session_path.display(),
        "direct API access"
    );
    let session = Session::load(&config.session_path)
        .with_context(|| format!("no session at {}", config.session_path.display()))?;
    let api = HttpApi::new(&config.api_base_url, &session, config.request_timeout())?;
    Ok((api, session))
}
