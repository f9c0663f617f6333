//! Kiosk session - main entry point
//!
//! Loads configuration, opens the settings database, connects to the
//! check-in service, binds the badge scanner (or falls back to manual entry
//! on stdin), and drives the session until interrupted.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use kiosk_common::config::KioskConfig;
use kiosk_common::db::init_database;
use kiosk_common::EventBus;
use kiosk_session::ports::{PortManager, SerialPortManager};
use kiosk_session::service::HttpRegistrantService;
use kiosk_session::{Error, Session, SessionDriver};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const EVENT_BUS_CAPACITY: usize = 256;
const OFFICE_LOAD_ATTEMPTS: u32 = 3;
const OFFICE_RETRY_DELAY: Duration = Duration::from_secs(2);

/// Command-line arguments for kiosk-session
#[derive(Parser, Debug)]
#[command(name = "kiosk-session")]
#[command(about = "Check-in and voting kiosk session")]
#[command(version)]
struct Args {
    /// Path to the TOML config file
    #[arg(short, long, env = "KIOSK_CONFIG")]
    config: Option<PathBuf>,

    /// Base URL of the check-in service
    #[arg(long, env = "KIOSK_SERVICE_URL")]
    service_url: Option<String>,

    /// Idle window in milliseconds
    #[arg(long, env = "KIOSK_TIMEOUT_MS")]
    timeout_ms: Option<u64>,

    /// Settings database path
    #[arg(long, env = "KIOSK_DATABASE")]
    database: Option<PathBuf>,

    /// Scanner device to bind (and remember), e.g. ttyACM0
    #[arg(short, long)]
    port: Option<String>,

    /// List candidate scanner ports and exit
    #[arg(long)]
    list_ports: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = KioskConfig::load(args.config.as_deref(), "KIOSK_CONFIG")
        .context("Failed to load configuration")?;
    if let Some(url) = args.service_url {
        config.service_url = url;
    }
    if let Some(timeout_ms) = args.timeout_ms {
        config.timeout_ms = timeout_ms;
    }
    if let Some(database) = args.database {
        config.database_path = Some(database);
    }
    config.validate().context("Invalid configuration")?;

    // Initialize tracing
    let default_filter = format!(
        "kiosk_session={},kiosk_common=info",
        config.logging.level
    );
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let ports = Arc::new(SerialPortManager::default());
    if args.list_ports {
        for port in ports.list_devices().await? {
            println!("{}\t{}", port.device_id, port.display_name);
        }
        return Ok(());
    }

    info!("Starting kiosk session (service: {})", config.service_url);

    let db_path = config.database_path();
    let db = init_database(&db_path)
        .await
        .with_context(|| format!("Failed to open settings database {}", db_path.display()))?;

    let service = Arc::new(
        HttpRegistrantService::new(&config.service_url).context("Invalid service URL")?,
    );
    let event_bus = EventBus::new(EVENT_BUS_CAPACITY);
    spawn_event_logger(&event_bus);

    let session = Session::new(config, service, event_bus);
    load_offices(&session).await;

    let driver = Arc::new(SessionDriver::new(Arc::clone(&session), ports, Some(db)));
    let scanner_bound = match args.port {
        Some(device_id) => {
            driver
                .select_port(&device_id)
                .await
                .with_context(|| format!("Failed to bind scanner {}", device_id))?;
            true
        }
        None => driver.connect_scanner().await?,
    };

    if !scanner_bound {
        info!("Manual entry: type a registrant id and press Enter");
        spawn_manual_entry(Arc::clone(&driver));
    }
    session.await_badge().await?;

    let shutdown = CancellationToken::new();
    let runner = {
        let driver = Arc::clone(&driver);
        let shutdown = shutdown.clone();
        tokio::spawn(async move { driver.run(shutdown).await })
    };

    shutdown_signal().await;
    shutdown.cancel();
    runner.await.context("Session driver panicked")??;

    session.dispose().await;
    info!("Kiosk session shutdown complete");
    Ok(())
}

/// Load the office catalogue, retrying while the service is briefly unreachable
async fn load_offices(session: &Session) {
    for attempt in 1..=OFFICE_LOAD_ATTEMPTS {
        match session.fetch_offices().await {
            Ok(offices) => {
                info!("{} offices available", offices.len());
                return;
            }
            Err(Error::TransientService(e)) if e.is_transient() && attempt < OFFICE_LOAD_ATTEMPTS => {
                warn!("Office catalogue unavailable (attempt {}): {}", attempt, e);
                tokio::time::sleep(OFFICE_RETRY_DELAY).await;
            }
            Err(e) => {
                warn!("Office catalogue unavailable: {}", e);
                return;
            }
        }
    }
}

/// Log every session event at debug level
fn spawn_event_logger(event_bus: &EventBus) {
    let mut rx = event_bus.subscribe();
    tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(event) => debug!("Event {}: {:?}", event.event_type(), event),
                Err(tokio::sync::broadcast::error::RecvError::Lagged(n)) => {
                    warn!("Event logger lagged by {} events", n);
                }
                Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
            }
        }
    });
}

/// Read typed registrant ids from stdin
fn spawn_manual_entry(driver: Arc<SessionDriver>) {
    tokio::spawn(async move {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            match driver.submit_manual_id(&line).await {
                Ok(Some(registrant)) => info!("Registrant {} checked in", registrant.badge_id()),
                Ok(None) => debug!("Entry ignored"),
                Err(e) => warn!("Check-in failed: {}", e),
            }
        }
    });
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!("Failed to install signal handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
