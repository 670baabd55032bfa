//! Shared identity and availability for Sonic entities

use std::sync::Arc;

use crate::coordinator::{DeviceSnapshot, SensorSource};

/// Sensor device class, for host-side presentation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorDeviceClass {
    Temperature,
    Pressure,
}

impl SensorDeviceClass {
    pub fn as_str(self) -> &'static str {
        match self {
            SensorDeviceClass::Temperature => "temperature",
            SensorDeviceClass::Pressure => "pressure",
        }
    }
}

/// Binary sensor device class
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinarySensorDeviceClass {
    Running,
}

impl BinarySensorDeviceClass {
    pub fn as_str(self) -> &'static str {
        match self {
            BinarySensorDeviceClass::Running => "running",
        }
    }
}

/// State class of a sensor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateClass {
    Measurement,
}

impl StateClass {
    pub fn as_str(self) -> &'static str {
        match self {
            StateClass::Measurement => "measurement",
        }
    }
}

/// Device description for the host's device registry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceIdent {
    pub identifier: String,
    pub manufacturer: String,
    pub model: String,
    pub name: String,
}

/// A base for Sonic entities: stable unique id, display name, and
/// availability read through the snapshot source.
pub struct SonicEntity {
    name: String,
    unique_id: String,
    source: Arc<dyn SensorSource>,
}

impl SonicEntity {
    /// Create an entity of the given kind.
    ///
    /// The unique id is `{serial}_{kind}`; a device that has not reported a
    /// serial number yet falls back to its device id.
    pub fn new(
        kind: &str,
        name: &str,
        serial: Option<&str>,
        source: Arc<dyn SensorSource>,
    ) -> Self {
        let stable = serial.unwrap_or_else(|| source.device_id());
        let unique_id = format!("{stable}_{kind}");
        Self {
            name: name.to_string(),
            unique_id,
            source,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn unique_id(&self) -> &str {
        &self.unique_id
    }

    /// The snapshot source this entity reads from
    pub fn source(&self) -> &Arc<dyn SensorSource> {
        &self.source
    }

    /// Current snapshot of the backing device
    pub async fn snapshot(&self) -> DeviceSnapshot {
        self.source.snapshot().await
    }

    /// Entity availability follows the device
    pub async fn available(&self) -> bool {
        self.source.snapshot().await.available()
    }

    /// Device description for the host's device registry
    pub async fn device_ident(&self) -> DeviceIdent {
        let snapshot = self.source.snapshot().await;
        DeviceIdent {
            identifier: self.source.device_id().to_string(),
            manufacturer: "Hero Labs".to_string(),
            model: "Sonic".to_string(),
            name: format!("Sonic Device: {}", snapshot.device_name()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use sonic_core::{DeviceInfo, RadioConnection};

    struct FixedSource {
        device_id: String,
        snapshot: DeviceSnapshot,
    }

    #[async_trait]
    impl SensorSource for FixedSource {
        fn device_id(&self) -> &str {
            &self.device_id
        }

        async fn snapshot(&self) -> DeviceSnapshot {
            self.snapshot.clone()
        }
    }

    fn source(snapshot: DeviceSnapshot) -> Arc<dyn SensorSource> {
        Arc::new(FixedSource {
            device_id: "dev-1".to_string(),
            snapshot,
        })
    }

    #[tokio::test]
    async fn test_unique_id_from_serial() {
        let entity = SonicEntity::new(
            "temperature",
            "Water Temperature",
            Some("S123"),
            source(DeviceSnapshot::default()),
        );
        assert_eq!(entity.unique_id(), "S123_temperature");
        assert_eq!(entity.name(), "Water Temperature");
    }

    #[tokio::test]
    async fn test_unique_id_falls_back_to_device_id() {
        let entity = SonicEntity::new(
            "battery",
            "Battery",
            None,
            source(DeviceSnapshot::default()),
        );
        assert_eq!(entity.unique_id(), "dev-1_battery");
    }

    #[tokio::test]
    async fn test_device_ident() {
        let snapshot = DeviceSnapshot {
            info: DeviceInfo {
                name: Some("Kitchen Sonic".to_string()),
                radio_connection: Some(RadioConnection::Connected),
                ..Default::default()
            },
            last_update_success: true,
            ..Default::default()
        };
        let entity = SonicEntity::new("battery", "Battery", Some("S123"), source(snapshot));

        let ident = entity.device_ident().await;
        assert_eq!(ident.manufacturer, "Hero Labs");
        assert_eq!(ident.model, "Sonic");
        assert_eq!(ident.name, "Sonic Device: Kitchen Sonic");
        assert!(entity.available().await);
    }
}
