//! Polling coordinator for one Sonic device
//!
//! Fetches the device details and telemetry records on a fixed interval and
//! caches them for the entity proxies. A failed or timed-out refresh marks
//! the snapshot as not updated, which flips entity availability; the next
//! successful refresh recovers it.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{broadcast, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use sonic_cloud::{CloudApi, CloudResult};
use sonic_core::{DeviceInfo, Telemetry};

/// How often a device is polled
pub const UPDATE_INTERVAL: Duration = Duration::from_secs(60);

/// Upper bound on one refresh round trip
const REFRESH_TIMEOUT: Duration = Duration::from_secs(10);

/// Capacity of the update notification channel
const UPDATE_CHANNEL_CAPACITY: usize = 16;

/// The polled state of one device
#[derive(Debug, Clone, Default)]
pub struct DeviceSnapshot {
    /// Device details record
    pub info: DeviceInfo,
    /// Telemetry record
    pub telemetry: Telemetry,
    /// Whether the most recent refresh succeeded
    pub last_update_success: bool,
}

impl DeviceSnapshot {
    /// A device is available when the last refresh succeeded and the radio
    /// link to its hub is up.
    pub fn available(&self) -> bool {
        self.last_update_success
            && self
                .info
                .radio_connection
                .is_some_and(|radio| radio.is_connected())
    }

    /// User-assigned device name, falling back to the model name
    pub fn device_name(&self) -> String {
        self.info.name.clone().unwrap_or_else(|| "Sonic".to_string())
    }
}

/// Read access to a device snapshot, the capability entities depend on
#[async_trait]
pub trait SensorSource: Send + Sync {
    /// Id of the device this source reads
    fn device_id(&self) -> &str;

    /// The current snapshot
    async fn snapshot(&self) -> DeviceSnapshot;
}

/// Polls one Sonic device and caches its snapshot
pub struct DeviceCoordinator {
    client: Arc<dyn CloudApi>,
    device_id: String,
    snapshot: RwLock<DeviceSnapshot>,
    updates: broadcast::Sender<()>,
}

impl DeviceCoordinator {
    pub fn new(client: Arc<dyn CloudApi>, device_id: impl Into<String>) -> Self {
        let (updates, _) = broadcast::channel(UPDATE_CHANNEL_CAPACITY);
        Self {
            client,
            device_id: device_id.into(),
            snapshot: RwLock::new(DeviceSnapshot::default()),
            updates,
        }
    }

    /// The cloud client this coordinator polls through
    pub fn client(&self) -> Arc<dyn CloudApi> {
        self.client.clone()
    }

    /// Subscribe to refresh notifications.
    ///
    /// A message is sent after every refresh, successful or not, so
    /// listeners can pick up availability changes too.
    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        self.updates.subscribe()
    }

    /// Refresh the snapshot from the cloud
    pub async fn refresh(&self) {
        let result = tokio::time::timeout(REFRESH_TIMEOUT, self.fetch()).await;

        {
            let mut snapshot = self.snapshot.write().await;
            match result {
                Ok(Ok((info, telemetry))) => {
                    debug!("Sonic device data: {:?}", info);
                    debug!("Sonic telemetry data: {:?}", telemetry);
                    snapshot.info = info;
                    snapshot.telemetry = telemetry;
                    snapshot.last_update_success = true;
                }
                Ok(Err(error)) => {
                    warn!("Update failed for device {}: {}", self.device_id, error);
                    snapshot.last_update_success = false;
                }
                Err(_) => {
                    warn!("Update timed out for device {}", self.device_id);
                    snapshot.last_update_success = false;
                }
            }
        }

        // No receivers is fine; entities may not be listening yet
        let _ = self.updates.send(());
    }

    async fn fetch(&self) -> CloudResult<(DeviceInfo, Telemetry)> {
        let info = self.client.device_details(&self.device_id).await?;
        let telemetry = self.client.device_telemetry(&self.device_id).await?;
        Ok((info, telemetry))
    }

    /// Start the background polling task
    pub fn spawn_polling(self: &Arc<Self>, period: Duration) -> JoinHandle<()> {
        let coordinator = self.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            // The first tick completes immediately; the initial refresh
            // already happened during setup.
            interval.tick().await;
            loop {
                interval.tick().await;
                coordinator.refresh().await;
            }
        })
    }
}

#[async_trait]
impl SensorSource for DeviceCoordinator {
    fn device_id(&self) -> &str {
        &self.device_id
    }

    async fn snapshot(&self) -> DeviceSnapshot {
        self.snapshot.read().await.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sonic_cloud::{CloudError, MockCloud};
    use sonic_core::RadioConnection;

    async fn cloud_with_device() -> Arc<MockCloud> {
        let cloud = Arc::new(MockCloud::new());
        let info = DeviceInfo {
            name: Some("Kitchen Sonic".to_string()),
            serial_no: Some("S123".to_string()),
            radio_connection: Some(RadioConnection::Connected),
            ..Default::default()
        };
        let telemetry = Telemetry {
            water_flow: Some(12.34),
            pressure: Some(2000.0),
            water_temp: Some(18.25),
            probed_at: Some(1_700_000_000),
        };
        cloud.add_device("dev-1", info, telemetry).await;
        cloud
    }

    #[tokio::test]
    async fn test_refresh_populates_snapshot() {
        let cloud = cloud_with_device().await;
        let coordinator = DeviceCoordinator::new(cloud, "dev-1");

        assert!(!coordinator.snapshot().await.last_update_success);

        coordinator.refresh().await;

        let snapshot = coordinator.snapshot().await;
        assert!(snapshot.last_update_success);
        assert!(snapshot.available());
        assert_eq!(snapshot.device_name(), "Kitchen Sonic");
        assert_eq!(snapshot.telemetry.pressure, Some(2000.0));
    }

    #[tokio::test]
    async fn test_failed_refresh_marks_unavailable() {
        let cloud = cloud_with_device().await;
        let coordinator = DeviceCoordinator::new(cloud.clone(), "dev-1");

        coordinator.refresh().await;
        assert!(coordinator.snapshot().await.available());

        cloud.fail_polling(CloudError::ServiceUnavailable).await;
        coordinator.refresh().await;

        let snapshot = coordinator.snapshot().await;
        assert!(!snapshot.last_update_success);
        assert!(!snapshot.available());
        // Stale data is kept for the next recovery
        assert_eq!(snapshot.info.serial_no.as_deref(), Some("S123"));

        cloud.restore_polling().await;
        coordinator.refresh().await;
        assert!(coordinator.snapshot().await.available());
    }

    #[tokio::test]
    async fn test_disconnected_radio_is_unavailable() {
        let cloud = Arc::new(MockCloud::new());
        let info = DeviceInfo {
            radio_connection: Some(RadioConnection::Disconnected),
            ..Default::default()
        };
        cloud.add_device("dev-1", info, Telemetry::default()).await;

        let coordinator = DeviceCoordinator::new(cloud, "dev-1");
        coordinator.refresh().await;

        let snapshot = coordinator.snapshot().await;
        assert!(snapshot.last_update_success);
        assert!(!snapshot.available());
    }

    #[tokio::test]
    async fn test_listeners_notified_after_refresh() {
        let cloud = cloud_with_device().await;
        let coordinator = DeviceCoordinator::new(cloud, "dev-1");

        let mut updates = coordinator.subscribe();
        coordinator.refresh().await;

        updates.recv().await.unwrap();
    }

    #[tokio::test]
    async fn test_device_name_falls_back_to_model() {
        let snapshot = DeviceSnapshot::default();
        assert_eq!(snapshot.device_name(), "Sonic");
    }
}
