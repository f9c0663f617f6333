//! In-process scanner ports
//!
//! Frames are injected with [`MemoryPortManager::push_frame`]. Used by tests
//! and by kiosks driven entirely through manual entry.

use super::{BadgeFrames, PortBinding, PortManager, FRAME_CHANNEL_CAPACITY};
use crate::error::{Error, Result};
use async_trait::async_trait;
use tokio::sync::{mpsc, Mutex};

pub struct MemoryPortManager {
    devices: Vec<PortBinding>,
    bound: Mutex<Option<(String, mpsc::Sender<String>)>>,
}

impl MemoryPortManager {
    pub fn new(devices: Vec<PortBinding>) -> Self {
        Self {
            devices,
            bound: Mutex::new(None),
        }
    }

    /// A kiosk with no scanner attached
    pub fn empty() -> Self {
        Self::new(Vec::new())
    }

    /// Deliver a frame on the bound port; false if nothing is bound
    pub async fn push_frame(&self, frame: &str) -> bool {
        let sender = match self.bound.lock().await.as_ref() {
            Some((_, sender)) => sender.clone(),
            None => return false,
        };
        sender.send(frame.to_string()).await.is_ok()
    }
}

#[async_trait]
impl PortManager for MemoryPortManager {
    async fn list_devices(&self) -> Result<Vec<PortBinding>> {
        Ok(self.devices.clone())
    }

    async fn bind(&self, device_id: &str) -> Result<BadgeFrames> {
        if !self.devices.iter().any(|d| d.device_id == device_id) {
            return Err(Error::DeviceUnavailable(format!("no such device: {}", device_id)));
        }
        let (tx, rx) = mpsc::channel(FRAME_CHANNEL_CAPACITY);
        *self.bound.lock().await = Some((device_id.to_string(), tx));
        Ok(rx)
    }

    async fn release(&self) {
        self.bound.lock().await.take();
    }

    async fn bound_device(&self) -> Option<String> {
        self.bound.lock().await.as_ref().map(|(id, _)| id.clone())
    }
}
