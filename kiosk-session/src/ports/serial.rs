//! tty-backed scanner ports
//!
//! Candidate devices are discovered through sysfs: every entry under
//! `/sys/class/tty` whose `device` link resolves to hardware reporting a
//! `manufacturer` (USB-CDC and USB-serial adapters do) is offered. Virtual
//! terminals and on-board UARTs have no manufacturer and are skipped.
//!
//! The scanner is expected to present as a USB-CDC device with line settings
//! already in place, so a bound port is read as a plain line-oriented file.

use super::{BadgeFrames, PortBinding, PortManager, FRAME_CHANNEL_CAPACITY};
use crate::error::{Error, Result};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::{mpsc, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

const DEFAULT_SYSFS_ROOT: &str = "/sys/class/tty";
const DEFAULT_DEV_ROOT: &str = "/dev";

/// How far above the tty's device node to look for a `manufacturer` file
const MANUFACTURER_SEARCH_DEPTH: usize = 3;

struct ActivePort {
    device_id: String,
    cancel: CancellationToken,
}

/// Scanner ports backed by `/dev` tty nodes
///
/// No line settings are applied on bind: baud rate, canonical mode and echo
/// stay as the kernel left them. This suits USB-CDC scanners; an RS-232
/// scanner behind a USB-serial adapter must be configured beforehand (e.g.
/// with `stty`).
pub struct SerialPortManager {
    sysfs_root: PathBuf,
    dev_root: PathBuf,
    active: Mutex<Option<ActivePort>>,
}

impl Default for SerialPortManager {
    fn default() -> Self {
        Self::new(DEFAULT_SYSFS_ROOT, DEFAULT_DEV_ROOT)
    }
}

impl SerialPortManager {
    pub fn new(sysfs_root: impl Into<PathBuf>, dev_root: impl Into<PathBuf>) -> Self {
        Self {
            sysfs_root: sysfs_root.into(),
            dev_root: dev_root.into(),
            active: Mutex::new(None),
        }
    }

    /// Manufacturer of the hardware behind a sysfs tty entry
    async fn manufacturer(entry: &Path) -> Option<String> {
        let device = tokio::fs::canonicalize(entry.join("device")).await.ok()?;

        for dir in device.ancestors().take(MANUFACTURER_SEARCH_DEPTH) {
            if let Ok(name) = tokio::fs::read_to_string(dir.join("manufacturer")).await {
                let name = name.trim();
                if !name.is_empty() {
                    return Some(name.to_string());
                }
            }
        }
        None
    }
}

/// Device ids are bare names under the dev root
fn valid_device_id(device_id: &str) -> bool {
    !device_id.is_empty()
        && device_id != "."
        && device_id != ".."
        && !device_id.contains('/')
        && !device_id.contains('\\')
}

async fn read_frames(
    device_id: String,
    file: tokio::fs::File,
    frames: mpsc::Sender<String>,
    cancel: CancellationToken,
) {
    let mut lines = BufReader::new(file).lines();
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            line = lines.next_line() => match line {
                Ok(Some(line)) => {
                    debug!(device_id = %device_id, "Scanner frame ({} bytes)", line.len());
                    if frames.send(line).await.is_err() {
                        break;
                    }
                }
                Ok(None) => {
                    info!(device_id = %device_id, "Scanner closed");
                    break;
                }
                Err(e) => {
                    warn!(device_id = %device_id, "Scanner read failed: {}", e);
                    break;
                }
            }
        }
    }
}

#[async_trait]
impl PortManager for SerialPortManager {
    async fn list_devices(&self) -> Result<Vec<PortBinding>> {
        let mut entries = match tokio::fs::read_dir(&self.sysfs_root).await {
            Ok(entries) => entries,
            Err(e) => {
                warn!("Cannot enumerate {}: {}", self.sysfs_root.display(), e);
                return Ok(Vec::new());
            }
        };

        let mut ports = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let device_id = entry.file_name().to_string_lossy().into_owned();
            if let Some(manufacturer) = Self::manufacturer(&entry.path()).await {
                ports.push(PortBinding {
                    display_name: format!("{} ({})", manufacturer, device_id),
                    device_id,
                });
            }
        }
        ports.sort_by(|a, b| a.device_id.cmp(&b.device_id));

        debug!("Found {} candidate scanner ports", ports.len());
        Ok(ports)
    }

    async fn bind(&self, device_id: &str) -> Result<BadgeFrames> {
        if !valid_device_id(device_id) {
            return Err(Error::DeviceUnavailable(format!("invalid device id: {:?}", device_id)));
        }
        self.release().await;

        let path = self.dev_root.join(device_id);
        let file = tokio::fs::File::open(&path)
            .await
            .map_err(|e| Error::DeviceUnavailable(format!("{}: {}", path.display(), e)))?;

        let (tx, rx) = mpsc::channel(FRAME_CHANNEL_CAPACITY);
        let cancel = CancellationToken::new();
        tokio::spawn(read_frames(device_id.to_string(), file, tx, cancel.clone()));

        *self.active.lock().await = Some(ActivePort {
            device_id: device_id.to_string(),
            cancel,
        });
        info!("Scanner bound: {}", path.display());
        Ok(rx)
    }

    async fn release(&self) {
        if let Some(port) = self.active.lock().await.take() {
            port.cancel.cancel();
            info!(device_id = %port.device_id, "Scanner released");
        }
    }

    async fn bound_device(&self) -> Option<String> {
        self.active
            .lock()
            .await
            .as_ref()
            .map(|port| port.device_id.clone())
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::fs;
    use std::os::unix::fs::symlink;
    use tempfile::TempDir;

    /// sysfs tree with one USB scanner, one on-board UART and one virtual tty
    fn fake_sysfs(root: &Path) -> PathBuf {
        let usb = root.join("devices/usb1/1-1");
        let usb_iface = usb.join("1-1:1.0");
        fs::create_dir_all(&usb_iface).unwrap();
        fs::write(usb.join("manufacturer"), "Honeywell\n").unwrap();

        let uart = root.join("devices/platform/serial8250");
        fs::create_dir_all(&uart).unwrap();

        let tty = root.join("class/tty");
        for name in ["ttyACM0", "ttyS0", "tty1"] {
            fs::create_dir_all(tty.join(name)).unwrap();
        }
        symlink(&usb_iface, tty.join("ttyACM0/device")).unwrap();
        symlink(&uart, tty.join("ttyS0/device")).unwrap();
        tty
    }

    #[tokio::test]
    async fn test_lists_only_devices_with_manufacturer() {
        let dir = TempDir::new().unwrap();
        let sysfs = fake_sysfs(dir.path());
        let ports = SerialPortManager::new(sysfs, dir.path().join("dev"));

        let devices = ports.list_devices().await.unwrap();
        assert_eq!(
            devices,
            vec![PortBinding {
                device_id: "ttyACM0".to_string(),
                display_name: "Honeywell (ttyACM0)".to_string(),
            }]
        );
    }

    #[tokio::test]
    async fn test_missing_sysfs_is_empty() {
        let dir = TempDir::new().unwrap();
        let ports = SerialPortManager::new(dir.path().join("nope"), dir.path());
        assert!(ports.list_devices().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_bind_reads_lines() {
        let dir = TempDir::new().unwrap();
        let dev = dir.path().join("dev");
        fs::create_dir_all(&dev).unwrap();
        fs::write(dev.join("ttyACM0"), "A12345|extra\r\nB77\n").unwrap();

        let ports = SerialPortManager::new(dir.path(), &dev);
        let mut frames = ports.bind("ttyACM0").await.unwrap();
        assert_eq!(ports.bound_device().await.as_deref(), Some("ttyACM0"));

        // lines() strips the terminator, including a trailing \r
        assert_eq!(frames.recv().await.as_deref(), Some("A12345|extra"));
        assert_eq!(frames.recv().await.as_deref(), Some("B77"));
        assert_eq!(frames.recv().await, None);

        ports.release().await;
        assert_eq!(ports.bound_device().await, None);
    }

    #[tokio::test]
    async fn test_bind_failures() {
        let dir = TempDir::new().unwrap();
        let ports = SerialPortManager::new(dir.path(), dir.path());

        assert!(matches!(ports.bind("ttyACM9").await, Err(Error::DeviceUnavailable(_))));
        assert!(matches!(ports.bind("../etc/passwd").await, Err(Error::DeviceUnavailable(_))));
        assert!(matches!(ports.bind("").await, Err(Error::DeviceUnavailable(_))));
        assert_eq!(ports.bound_device().await, None);
    }
}
