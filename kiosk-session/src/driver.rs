//! Session driver
//!
//! Wires the kiosk's inputs to the [`Session`]: frames from the bound scanner,
//! idle/active reports from the [`IdleMonitor`], and the persisted scanner
//! port selection. One driver runs per kiosk.

use crate::db::settings;
use crate::error::{Error, Result};
use crate::idle::{IdleEvent, IdleMonitor};
use crate::ports::{BadgeFrames, PortBinding, PortManager};
use crate::service::Registrant;
use crate::session::{IdleOutcome, Session};
use kiosk_common::events::SessionEvent;
use kiosk_common::time;
use sqlx::SqlitePool;
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Frames of one binding, tagged with its sequence number
type Binding = (u64, BadgeFrames);

pub struct SessionDriver {
    session: Arc<Session>,
    ports: Arc<dyn PortManager>,
    db: Option<SqlitePool>,
    idle: IdleMonitor,
    idle_events: Mutex<Option<mpsc::Receiver<IdleEvent>>>,
    /// Sequence number of the latest binding; held across a bind
    binding: Mutex<u64>,
    bindings: mpsc::UnboundedSender<Binding>,
    binding_rx: Mutex<Option<mpsc::UnboundedReceiver<Binding>>>,
}

impl SessionDriver {
    /// Create the driver and start its idle monitor
    pub fn new(session: Arc<Session>, ports: Arc<dyn PortManager>, db: Option<SqlitePool>) -> Self {
        let window = time::millis_to_duration(session.config().timeout_ms);
        let (idle, idle_events) = IdleMonitor::start(window);
        let (bindings, binding_rx) = mpsc::unbounded_channel();
        Self {
            session,
            ports,
            db,
            idle,
            idle_events: Mutex::new(Some(idle_events)),
            binding: Mutex::new(0),
            bindings,
            binding_rx: Mutex::new(Some(binding_rx)),
        }
    }

    pub fn session(&self) -> &Arc<Session> {
        &self.session
    }

    pub async fn list_ports(&self) -> Result<Vec<PortBinding>> {
        self.ports.list_devices().await
    }

    /// Rebind the stored scanner port; true when a scanner is bound
    ///
    /// Falls back to manual entry when no scanner is attached, none was
    /// selected before, or the stored one cannot be opened.
    pub async fn connect_scanner(&self) -> Result<bool> {
        let devices = match self.ports.list_devices().await {
            Ok(devices) => devices,
            Err(e) => {
                warn!("Scanner enumeration failed: {}", e);
                Vec::new()
            }
        };

        if devices.is_empty() {
            info!("No scanner attached; using manual entry");
            self.session.set_manual_entry_fallback(true).await;
            return Ok(false);
        }

        let stored = match &self.db {
            Some(db) => settings::load_scanner_port(db).await?,
            None => None,
        };
        let Some(device_id) = stored else {
            info!(
                "No scanner selected; available: {}",
                devices
                    .iter()
                    .map(|d| d.display_name.as_str())
                    .collect::<Vec<_>>()
                    .join(", ")
            );
            self.session.set_manual_entry_fallback(true).await;
            return Ok(false);
        };

        if !devices.iter().any(|d| d.device_id == device_id) {
            warn!(device_id = %device_id, "Stored scanner not present; using manual entry");
            self.session.set_manual_entry_fallback(true).await;
            return Ok(false);
        }

        match self.bind(&device_id).await {
            Ok(()) => Ok(true),
            Err(e) => {
                warn!("{}; using manual entry", e);
                Ok(false)
            }
        }
    }

    /// Bind `device_id` and remember it for the next start
    ///
    /// Replaces any current binding; a running driver switches to the new
    /// scanner's frames.
    pub async fn select_port(&self, device_id: &str) -> Result<()> {
        self.bind(device_id).await?;
        if let Some(db) = &self.db {
            settings::save_scanner_port(db, device_id).await?;
        }
        Ok(())
    }

    async fn bind(&self, device_id: &str) -> Result<()> {
        let mut sequence = self.binding.lock().await;
        let frames = match self.ports.bind(device_id).await {
            Ok(frames) => frames,
            Err(e) => {
                if self.ports.bound_device().await.is_none() {
                    self.session.set_manual_entry_fallback(true).await;
                }
                return Err(e);
            }
        };
        *sequence += 1;
        if self.bindings.send((*sequence, frames)).is_err() {
            debug!("Session driver gone; binding not delivered");
        }
        drop(sequence);

        self.session.set_manual_entry_fallback(false).await;
        self.session.event_bus().emit_lossy(SessionEvent::ScannerBound {
            device_id: device_id.to_string(),
            timestamp: time::now(),
        });
        Ok(())
    }

    /// Release the scanner, forget the stored selection and switch to manual entry
    pub async fn release_port(&self) -> Result<()> {
        let _sequence = self.binding.lock().await;
        if let Some(device_id) = self.ports.bound_device().await {
            self.ports.release().await;
            self.scanner_released(device_id).await;
        }
        if let Some(db) = &self.db {
            settings::clear_scanner_port(db).await?;
        }
        Ok(())
    }

    async fn scanner_released(&self, device_id: String) {
        self.session.set_manual_entry_fallback(true).await;
        self.session.event_bus().emit_lossy(SessionEvent::ScannerReleased {
            device_id,
            timestamp: time::now(),
        });
    }

    /// A frame stream ended; only the current binding's end means a disconnect
    async fn frames_closed(&self, sequence: u64) {
        let current = self.binding.lock().await;
        if *current != sequence {
            debug!(sequence, "Superseded scanner binding closed");
            return;
        }
        if let Some(device_id) = self.ports.bound_device().await {
            warn!(device_id = %device_id, "Scanner disconnected; switching to manual entry");
            self.ports.release().await;
            self.scanner_released(device_id).await;
        } else {
            self.session.set_manual_entry_fallback(true).await;
        }
    }

    /// User activity at the kiosk
    pub fn touch(&self) {
        self.idle.touch();
    }

    /// Typed registrant id (manual entry)
    pub async fn submit_manual_id(&self, registrant_id: &str) -> Result<Option<Registrant>> {
        self.idle.touch();
        self.session.submit_manual_id(registrant_id).await
    }

    /// "More time" from the timeout dialog
    pub async fn more_time(&self) -> Result<()> {
        self.session.more_time().await?;
        self.idle.reset();
        Ok(())
    }

    pub async fn set_exclude_from_idle(&self, excluded: bool) {
        self.session.set_exclude_from_idle(excluded).await;
        self.idle.set_suppressed(excluded);
    }

    /// Drive the session until `shutdown` fires
    pub async fn run(&self, shutdown: CancellationToken) -> Result<()> {
        let (mut idle_events, mut bindings) = {
            let mut idle_events = self.idle_events.lock().await;
            let mut bindings = self.binding_rx.lock().await;
            match (idle_events.take(), bindings.take()) {
                (Some(idle_events), Some(bindings)) => (idle_events, bindings),
                _ => {
                    return Err(Error::InvalidState(
                        "session driver already running".to_string(),
                    ))
                }
            }
        };
        let mut frames: Option<Binding> = None;

        info!("Session driver running");
        loop {
            tokio::select! {
                biased;

                _ = shutdown.cancelled() => break,

                Some(binding) = bindings.recv() => {
                    debug!(sequence = binding.0, "Scanner binding attached");
                    frames = Some(binding);
                }

                frame = next_frame(&mut frames) => match frame {
                    Some(raw) => {
                        self.idle.touch();
                        let session = Arc::clone(&self.session);
                        tokio::spawn(async move {
                            match session.ingest_frame(&raw).await {
                                Ok(_) => {}
                                Err(e @ Error::StaleResponse(_)) => debug!("{}", e),
                                Err(e) => warn!("Badge scan failed: {}", e),
                            }
                        });
                    }
                    None => {
                        if let Some((sequence, _)) = frames.take() {
                            self.frames_closed(sequence).await;
                        }
                    }
                },

                event = idle_events.recv() => match event {
                    Some(IdleEvent::Idle) => match self.session.on_idle().await {
                        IdleOutcome::Suppressed | IdleOutcome::Reset => self.idle.reset(),
                        IdleOutcome::TimedOut | IdleOutcome::Ignored => {}
                    },
                    Some(IdleEvent::Active) => self.session.on_active().await,
                    None => {
                        warn!("Idle monitor stopped");
                        break;
                    }
                },
            }
        }

        self.idle.stop();
        self.ports.release().await;
        info!("Session driver stopped");
        Ok(())
    }
}

/// Next frame from the current binding; pends forever when none is attached
async fn next_frame(frames: &mut Option<Binding>) -> Option<String> {
    match frames {
        Some((_, rx)) => rx.recv().await,
        None => std::future::pending().await,
    }
}
