//! Scriptable in-memory cloud, used by tests across the workspace

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use tokio::sync::Mutex;

use sonic_core::{DeviceInfo, Telemetry, ValveState};

use crate::{CloudApi, CloudError, CloudResult, PropertyInfo};

#[derive(Debug, Default)]
struct MockState {
    devices: BTreeMap<String, (DeviceInfo, Telemetry)>,
    property: Option<PropertyInfo>,
    login_error: Option<CloudError>,
    poll_error: Option<CloudError>,
    valve_error: Option<CloudError>,
}

/// In-memory [`CloudApi`] implementation with scriptable failures
///
/// Devices are keyed by id in insertion order. Injected errors apply to every
/// subsequent call of the matching kind until cleared.
#[derive(Debug, Default)]
pub struct MockCloud {
    state: Mutex<MockState>,
    login_calls: AtomicUsize,
    poll_calls: AtomicUsize,
}

impl MockCloud {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a device with its details and telemetry payloads
    pub async fn add_device(&self, id: impl Into<String>, info: DeviceInfo, telemetry: Telemetry) {
        self.state
            .lock()
            .await
            .devices
            .insert(id.into(), (info, telemetry));
    }

    /// Set the account's property
    pub async fn set_property(&self, id: impl Into<String>, name: impl Into<String>) {
        self.state.lock().await.property = Some(PropertyInfo {
            id: id.into(),
            name: name.into(),
        });
    }

    /// Make every subsequent login fail with the given error
    pub async fn fail_login(&self, error: CloudError) {
        self.state.lock().await.login_error = Some(error);
    }

    /// Clear an injected login failure
    pub async fn restore_login(&self) {
        self.state.lock().await.login_error = None;
    }

    /// Make every subsequent details/telemetry fetch fail
    pub async fn fail_polling(&self, error: CloudError) {
        self.state.lock().await.poll_error = Some(error);
    }

    /// Clear an injected polling failure
    pub async fn restore_polling(&self) {
        self.state.lock().await.poll_error = None;
    }

    /// Make every subsequent valve command fail
    pub async fn fail_valve(&self, error: CloudError) {
        self.state.lock().await.valve_error = Some(error);
    }

    /// Number of login attempts observed
    pub fn login_calls(&self) -> usize {
        self.login_calls.load(Ordering::SeqCst)
    }

    /// Number of details/telemetry fetches observed
    pub fn poll_calls(&self) -> usize {
        self.poll_calls.load(Ordering::SeqCst)
    }

    /// Current valve state of a device, as the mock cloud sees it
    pub async fn valve_state(&self, device_id: &str) -> Option<ValveState> {
        self.state
            .lock()
            .await
            .devices
            .get(device_id)
            .and_then(|(info, _)| info.valve_state)
    }

    async fn set_valve(&self, device_id: &str, state: ValveState) -> CloudResult<()> {
        let mut guard = self.state.lock().await;
        if let Some(error) = guard.valve_error.clone() {
            return Err(error);
        }
        let (info, _) = guard
            .devices
            .get_mut(device_id)
            .ok_or_else(|| CloudError::Request(format!("unknown device {device_id}")))?;
        info.valve_state = Some(state);
        Ok(())
    }
}

#[async_trait]
impl CloudApi for MockCloud {
    async fn login(&self, _username: &str, _password: &str) -> CloudResult<()> {
        self.login_calls.fetch_add(1, Ordering::SeqCst);
        match self.state.lock().await.login_error.clone() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    async fn list_devices(&self) -> CloudResult<Vec<String>> {
        Ok(self.state.lock().await.devices.keys().cloned().collect())
    }

    async fn device_details(&self, device_id: &str) -> CloudResult<DeviceInfo> {
        self.poll_calls.fetch_add(1, Ordering::SeqCst);
        let guard = self.state.lock().await;
        if let Some(error) = guard.poll_error.clone() {
            return Err(error);
        }
        guard
            .devices
            .get(device_id)
            .map(|(info, _)| info.clone())
            .ok_or_else(|| CloudError::Request(format!("unknown device {device_id}")))
    }

    async fn device_telemetry(&self, device_id: &str) -> CloudResult<Telemetry> {
        self.poll_calls.fetch_add(1, Ordering::SeqCst);
        let guard = self.state.lock().await;
        if let Some(error) = guard.poll_error.clone() {
            return Err(error);
        }
        guard
            .devices
            .get(device_id)
            .map(|(_, telemetry)| telemetry.clone())
            .ok_or_else(|| CloudError::Request(format!("unknown device {device_id}")))
    }

    async fn open_valve(&self, device_id: &str) -> CloudResult<()> {
        self.set_valve(device_id, ValveState::Open).await
    }

    async fn close_valve(&self, device_id: &str) -> CloudResult<()> {
        self.set_valve(device_id, ValveState::Closed).await
    }

    async fn property_details(&self) -> CloudResult<PropertyInfo> {
        self.state
            .lock()
            .await
            .property
            .clone()
            .ok_or_else(|| CloudError::Request("account has no property".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_login_failure_injection() {
        let cloud = MockCloud::new();
        assert_eq!(cloud.login("a", "b").await, Ok(()));

        cloud.fail_login(CloudError::InvalidCredentials).await;
        assert_eq!(
            cloud.login("a", "b").await,
            Err(CloudError::InvalidCredentials)
        );

        cloud.restore_login().await;
        assert_eq!(cloud.login("a", "b").await, Ok(()));
        assert_eq!(cloud.login_calls(), 3);
    }

    #[tokio::test]
    async fn test_valve_commands_update_state() {
        let cloud = MockCloud::new();
        let info = DeviceInfo {
            valve_state: Some(ValveState::Closed),
            ..Default::default()
        };
        cloud.add_device("dev-1", info, Telemetry::default()).await;

        cloud.open_valve("dev-1").await.unwrap();
        assert_eq!(cloud.valve_state("dev-1").await, Some(ValveState::Open));

        cloud.close_valve("dev-1").await.unwrap();
        assert_eq!(cloud.valve_state("dev-1").await, Some(ValveState::Closed));
    }

    #[tokio::test]
    async fn test_unknown_device_is_request_error() {
        let cloud = MockCloud::new();
        assert!(matches!(
            cloud.device_details("nope").await,
            Err(CloudError::Request(_))
        ));
    }

    #[tokio::test]
    async fn test_property_requires_scripting() {
        let cloud = MockCloud::new();
        assert!(cloud.property_details().await.is_err());

        cloud.set_property("prop-1", "Home").await;
        let property = cloud.property_details().await.unwrap();
        assert_eq!(property.name, "Home");
    }
}
