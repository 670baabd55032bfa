//! Binary sensor proxies

use std::sync::Arc;

use async_trait::async_trait;

use crate::coordinator::SensorSource;
use crate::entity::{BinarySensorDeviceClass, SonicEntity};

const NAME_AUTO_SHUT_OFF_ENABLED: &str = "Auto Shut Off Enabled Status";

/// An on/off sensor entity
#[async_trait]
pub trait BinarySensor: Send + Sync {
    fn entity(&self) -> &SonicEntity;

    fn device_class(&self) -> Option<BinarySensorDeviceClass> {
        None
    }

    /// Current state; `None` when the field has not been reported
    async fn is_on(&self) -> Option<bool>;
}

/// Build all binary sensor entities for one device
pub async fn build_binary_sensors(source: Arc<dyn SensorSource>) -> Vec<Box<dyn BinarySensor>> {
    let serial = source.snapshot().await.info.serial_no;
    vec![Box::new(AutoShutOffEnabledBinarySensor::new(
        serial.as_deref(),
        source,
    ))]
}

/// Reports if the auto shut off feature is enabled
pub struct AutoShutOffEnabledBinarySensor {
    entity: SonicEntity,
}

impl AutoShutOffEnabledBinarySensor {
    pub fn new(serial: Option<&str>, source: Arc<dyn SensorSource>) -> Self {
        Self {
            entity: SonicEntity::new(
                "auto_shut_off_enabled",
                NAME_AUTO_SHUT_OFF_ENABLED,
                serial,
                source,
            ),
        }
    }
}

#[async_trait]
impl BinarySensor for AutoShutOffEnabledBinarySensor {
    fn entity(&self) -> &SonicEntity {
        &self.entity
    }

    fn device_class(&self) -> Option<BinarySensorDeviceClass> {
        Some(BinarySensorDeviceClass::Running)
    }

    async fn is_on(&self) -> Option<bool> {
        self.entity.snapshot().await.info.auto_shut_off_enabled
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coordinator::DeviceSnapshot;
    use sonic_core::DeviceInfo;

    struct FixedSource {
        snapshot: DeviceSnapshot,
    }

    #[async_trait]
    impl SensorSource for FixedSource {
        fn device_id(&self) -> &str {
            "dev-1"
        }

        async fn snapshot(&self) -> DeviceSnapshot {
            self.snapshot.clone()
        }
    }

    fn source(auto_shut_off_enabled: Option<bool>) -> Arc<dyn SensorSource> {
        Arc::new(FixedSource {
            snapshot: DeviceSnapshot {
                info: DeviceInfo {
                    serial_no: Some("S123".to_string()),
                    auto_shut_off_enabled,
                    ..Default::default()
                },
                ..Default::default()
            },
        })
    }

    #[tokio::test]
    async fn test_reports_feature_state() {
        let sensor = AutoShutOffEnabledBinarySensor::new(Some("S123"), source(Some(true)));
        assert_eq!(sensor.is_on().await, Some(true));
        assert_eq!(
            sensor.device_class(),
            Some(BinarySensorDeviceClass::Running)
        );
        assert_eq!(sensor.entity().unique_id(), "S123_auto_shut_off_enabled");
    }

    #[tokio::test]
    async fn test_absent_field_is_none() {
        let sensor = AutoShutOffEnabledBinarySensor::new(Some("S123"), source(None));
        assert_eq!(sensor.is_on().await, None);
    }

    #[tokio::test]
    async fn test_build_binary_sensors() {
        let sensors = build_binary_sensors(source(Some(false))).await;
        assert_eq!(sensors.len(), 1);
        assert_eq!(sensors[0].is_on().await, Some(false));
    }
}
