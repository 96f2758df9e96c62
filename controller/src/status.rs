use std::time::Duration;

use thiserror::Error;
use tokio::{sync::Mutex, time::timeout};

use thermostat_core::{ControlConfig, StationStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("status snapshot busy")]
pub struct SnapshotBusy;

/// Latest consolidated status, guarded with bounded waits on both sides so
/// neither the tick loop nor an HTTP reader can stall on the other.
#[derive(Debug)]
pub struct StatusBoard {
    latest: Mutex<StationStatus>,
    publish_wait: Duration,
    read_wait: Duration,
}

impl StatusBoard {
    pub fn new(initial: StationStatus, config: &ControlConfig) -> Self {
        Self {
            latest: Mutex::new(initial),
            publish_wait: Duration::from_millis(config.snapshot_publish_wait_ms),
            read_wait: Duration::from_millis(config.snapshot_read_wait_ms),
        }
    }

    pub async fn publish(&self, status: StationStatus) -> Result<(), SnapshotBusy> {
        let mut latest = timeout(self.publish_wait, self.latest.lock())
            .await
            .map_err(|_| SnapshotBusy)?;
        *latest = status;
        Ok(())
    }

    pub async fn read(&self) -> Result<StationStatus, SnapshotBusy> {
        let latest = timeout(self.read_wait, self.latest.lock())
            .await
            .map_err(|_| SnapshotBusy)?;
        Ok(latest.clone())
    }

    #[cfg(test)]
    pub(crate) async fn hold(&self) -> tokio::sync::MutexGuard<'_, StationStatus> {
        self.latest.lock().await
    }
}
