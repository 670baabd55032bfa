//! Switch representing the Sonic shut-off valve

use std::sync::Arc;

use tokio::sync::RwLock;

use sonic_cloud::CloudResult;

use crate::coordinator::{DeviceCoordinator, SensorSource};
use crate::entity::SonicEntity;

const ICON_VALVE_OPEN: &str = "mdi:valve-open";
const ICON_VALVE_CLOSED: &str = "mdi:valve-closed";

/// Switch entity for the shut-off valve.
///
/// Commands are written optimistically; the cached state is reconciled with
/// the polled valve state whenever [`ValveSwitch::update_state`] runs (wired
/// to the coordinator's refresh notifications).
pub struct ValveSwitch {
    entity: SonicEntity,
    device: Arc<DeviceCoordinator>,
    state: RwLock<bool>,
}

impl ValveSwitch {
    pub async fn new(device: Arc<DeviceCoordinator>) -> Self {
        let snapshot = device.snapshot().await;
        let entity = SonicEntity::new(
            "shutoff_valve",
            "Shutoff Valve",
            snapshot.info.serial_no.as_deref(),
            device.clone() as Arc<dyn SensorSource>,
        );
        let state = snapshot
            .info
            .valve_state
            .map(|valve| valve.is_open())
            .unwrap_or(false);
        Self {
            entity,
            device,
            state: RwLock::new(state),
        }
    }

    pub fn entity(&self) -> &SonicEntity {
        &self.entity
    }

    /// True if the valve is open
    pub async fn is_on(&self) -> bool {
        *self.state.read().await
    }

    pub async fn icon(&self) -> &'static str {
        if self.is_on().await {
            ICON_VALVE_OPEN
        } else {
            ICON_VALVE_CLOSED
        }
    }

    /// Open the valve
    pub async fn turn_on(&self) -> CloudResult<()> {
        self.device
            .client()
            .open_valve(self.device.device_id())
            .await?;
        *self.state.write().await = true;
        Ok(())
    }

    /// Close the valve
    pub async fn turn_off(&self) -> CloudResult<()> {
        self.device
            .client()
            .close_valve(self.device.device_id())
            .await?;
        *self.state.write().await = false;
        Ok(())
    }

    /// Reconcile the cached state with the latest polled valve state
    pub async fn update_state(&self) {
        let snapshot = self.device.snapshot().await;
        *self.state.write().await = snapshot
            .info
            .valve_state
            .map(|valve| valve.is_open())
            .unwrap_or(false);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sonic_cloud::{CloudApi, CloudError, MockCloud};
    use sonic_core::{DeviceInfo, Telemetry, ValveState};

    async fn switch_with_valve(initial: ValveState) -> (Arc<MockCloud>, ValveSwitch) {
        let cloud = Arc::new(MockCloud::new());
        let info = DeviceInfo {
            serial_no: Some("S123".to_string()),
            valve_state: Some(initial),
            ..Default::default()
        };
        cloud.add_device("dev-1", info, Telemetry::default()).await;

        let device = Arc::new(DeviceCoordinator::new(cloud.clone(), "dev-1"));
        device.refresh().await;
        let switch = ValveSwitch::new(device).await;
        (cloud, switch)
    }

    #[tokio::test]
    async fn test_initial_state_from_snapshot() {
        let (_cloud, switch) = switch_with_valve(ValveState::Open).await;
        assert!(switch.is_on().await);
        assert_eq!(switch.icon().await, ICON_VALVE_OPEN);
        assert_eq!(switch.entity().unique_id(), "S123_shutoff_valve");
    }

    #[tokio::test]
    async fn test_turn_off_closes_valve() {
        let (cloud, switch) = switch_with_valve(ValveState::Open).await;

        switch.turn_off().await.unwrap();
        assert!(!switch.is_on().await);
        assert_eq!(switch.icon().await, ICON_VALVE_CLOSED);
        assert_eq!(cloud.valve_state("dev-1").await, Some(ValveState::Closed));
    }

    #[tokio::test]
    async fn test_turn_on_opens_valve() {
        let (cloud, switch) = switch_with_valve(ValveState::Closed).await;

        switch.turn_on().await.unwrap();
        assert!(switch.is_on().await);
        assert_eq!(cloud.valve_state("dev-1").await, Some(ValveState::Open));
    }

    #[tokio::test]
    async fn test_failed_command_keeps_state() {
        let (cloud, switch) = switch_with_valve(ValveState::Closed).await;
        cloud.fail_valve(CloudError::ServiceUnavailable).await;

        let result = switch.turn_on().await;
        assert_eq!(result, Err(CloudError::ServiceUnavailable));
        assert!(!switch.is_on().await);
    }

    #[tokio::test]
    async fn test_update_state_reconciles_with_poll() {
        let (cloud, switch) = switch_with_valve(ValveState::Open).await;

        // Valve closed out of band, picked up by the next poll
        cloud.close_valve("dev-1").await.unwrap();
        switch.device.refresh().await;
        switch.update_state().await;

        assert!(!switch.is_on().await);
    }
}
