//! Badge scanner ports
//!
//! A [`PortManager`] enumerates candidate scanner devices and binds one at a
//! time. A bound port delivers raw frames (one per scan, line terminator
//! stripped) on a channel until it is released.

mod memory;
mod serial;

pub use memory::MemoryPortManager;
pub use serial::SerialPortManager;

use crate::error::Result;
use async_trait::async_trait;
use serde::Serialize;
use tokio::sync::mpsc;

/// Frame channel capacity for a bound scanner
pub const FRAME_CHANNEL_CAPACITY: usize = 32;

/// Raw frames from the bound scanner
pub type BadgeFrames = mpsc::Receiver<String>;

/// A scanner device offered for selection
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PortBinding {
    /// Stable id used to bind and persist the selection (e.g. `ttyACM0`)
    pub device_id: String,
    /// Human-readable label
    pub display_name: String,
}

#[async_trait]
pub trait PortManager: Send + Sync {
    /// Devices that look like badge scanners; empty when none are attached
    async fn list_devices(&self) -> Result<Vec<PortBinding>>;

    /// Bind `device_id`, releasing any previous binding
    async fn bind(&self, device_id: &str) -> Result<BadgeFrames>;

    /// Stop reading from the bound device, if any
    async fn release(&self);

    async fn bound_device(&self) -> Option<String>;
}
