//! Inactivity monitor
//!
//! Runs as a background task fed by [`IdleCommand`]s. After `window` with no
//! activity it reports [`IdleEvent::Idle`] once; the next activity reports
//! [`IdleEvent::Active`] and re-arms the window. While suppressed the window
//! never expires.

use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

const EVENT_CHANNEL_CAPACITY: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdleEvent {
    /// No activity for the whole window
    Idle,
    /// First activity after an Idle report
    ///
    /// Sent once per Idle, not on every input; further activity only
    /// re-arms the window.
    Active,
}

#[derive(Debug)]
enum IdleCommand {
    Activity,
    Reset,
    SetSuppressed(bool),
}

/// Handle to the idle monitor task
#[derive(Clone)]
pub struct IdleMonitor {
    commands: mpsc::UnboundedSender<IdleCommand>,
    cancel: CancellationToken,
}

impl IdleMonitor {
    /// Spawn the monitor; events arrive on the returned receiver
    pub fn start(window: Duration) -> (Self, mpsc::Receiver<IdleEvent>) {
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (event_tx, event_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        let cancel = CancellationToken::new();

        tokio::spawn(run_monitor(window, command_rx, event_tx, cancel.clone()));

        (
            Self {
                commands: command_tx,
                cancel,
            },
            event_rx,
        )
    }

    /// User or scanner activity
    pub fn touch(&self) {
        self.send(IdleCommand::Activity);
    }

    /// Restart the window without reporting Active
    pub fn reset(&self) {
        self.send(IdleCommand::Reset);
    }

    pub fn set_suppressed(&self, suppressed: bool) {
        self.send(IdleCommand::SetSuppressed(suppressed));
    }

    pub fn stop(&self) {
        self.cancel.cancel();
    }

    fn send(&self, command: IdleCommand) {
        if self.commands.send(command).is_err() {
            trace!("Idle monitor already stopped");
        }
    }
}

async fn run_monitor(
    window: Duration,
    mut commands: mpsc::UnboundedReceiver<IdleCommand>,
    events: mpsc::Sender<IdleEvent>,
    cancel: CancellationToken,
) {
    let mut deadline = Instant::now() + window;
    let mut idle = false;
    let mut suppressed = false;

    debug!("Idle monitor started ({:?} window)", window);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,

            command = commands.recv() => {
                let Some(command) = command else { break };
                deadline = Instant::now() + window;
                match command {
                    IdleCommand::Activity => {
                        if idle {
                            idle = false;
                            if events.send(IdleEvent::Active).await.is_err() {
                                break;
                            }
                        }
                    }
                    IdleCommand::Reset => idle = false,
                    IdleCommand::SetSuppressed(value) => suppressed = value,
                }
            }

            _ = tokio::time::sleep_until(deadline), if !idle && !suppressed => {
                idle = true;
                debug!("Idle window elapsed");
                if events.send(IdleEvent::Idle).await.is_err() {
                    break;
                }
            }
        }
    }

    debug!("Idle monitor stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::timeout;

    const WINDOW: Duration = Duration::from_secs(60);

    #[tokio::test(start_paused = true)]
    async fn test_reports_idle_after_window() {
        let (_monitor, mut events) = IdleMonitor::start(WINDOW);
        let started = Instant::now();

        assert_eq!(events.recv().await, Some(IdleEvent::Idle));
        assert!(started.elapsed() >= WINDOW);
    }

    #[tokio::test(start_paused = true)]
    async fn test_idle_reported_once_until_activity() {
        let (monitor, mut events) = IdleMonitor::start(WINDOW);
        assert_eq!(events.recv().await, Some(IdleEvent::Idle));

        assert!(timeout(WINDOW * 5, events.recv()).await.is_err());

        monitor.touch();
        assert_eq!(events.recv().await, Some(IdleEvent::Active));
        assert_eq!(events.recv().await, Some(IdleEvent::Idle));
    }

    #[tokio::test(start_paused = true)]
    async fn test_activity_before_window_is_silent() {
        let (monitor, mut events) = IdleMonitor::start(WINDOW);
        tokio::time::sleep(Duration::from_secs(30)).await;
        monitor.touch();

        // Window restarts from the touch, no Active is reported
        assert!(timeout(Duration::from_secs(45), events.recv()).await.is_err());
        assert_eq!(events.recv().await, Some(IdleEvent::Idle));
    }

    #[tokio::test(start_paused = true)]
    async fn test_suppressed_never_expires() {
        let (monitor, mut events) = IdleMonitor::start(WINDOW);
        monitor.set_suppressed(true);

        assert!(timeout(WINDOW * 10, events.recv()).await.is_err());

        monitor.set_suppressed(false);
        assert_eq!(events.recv().await, Some(IdleEvent::Idle));
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_closes_events() {
        let (monitor, mut events) = IdleMonitor::start(WINDOW);
        monitor.stop();
        assert_eq!(events.recv().await, None);
    }
}
