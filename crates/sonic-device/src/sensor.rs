//! Sensor proxies over the polled device snapshot
//!
//! Each sensor reads exactly one field. Two apply unit rounding (flow rate,
//! temperature) and one converts millibar to bar. An absent field reports
//! "unknown" rather than an error.

use std::sync::Arc;

use async_trait::async_trait;

use sonic_core::{round1, SensorValue, UNIT_BAR, UNIT_CELSIUS, UNIT_FLOW_ML_MIN};

use crate::coordinator::SensorSource;
use crate::entity::{SensorDeviceClass, SonicEntity, StateClass};

const GAUGE_ICON: &str = "mdi:gauge";

const NAME_FLOW_RATE: &str = "Water Flow Rate";
const NAME_WATER_TEMPERATURE: &str = "Water Temperature";
const NAME_WATER_PRESSURE: &str = "Water Pressure";
const NAME_BATTERY: &str = "Battery";
const NAME_VALVE_STATE: &str = "Current Valve State";
const NAME_DEVICE_STATUS: &str = "Sonic Status Message";
const NAME_AUTO_SHUT_OFF_ENABLED: &str = "Auto Shut Off Enabled Status";

/// A read-only sensor entity
#[async_trait]
pub trait Sensor: Send + Sync {
    /// Entity identity and availability
    fn entity(&self) -> &SonicEntity;

    /// Unit of measurement, if any
    fn unit_of_measurement(&self) -> Option<&'static str> {
        None
    }

    /// Device class, if any
    fn device_class(&self) -> Option<SensorDeviceClass> {
        None
    }

    /// State class, if any
    fn state_class(&self) -> Option<StateClass> {
        None
    }

    /// Icon override, if any
    fn icon(&self) -> Option<&'static str> {
        None
    }

    /// The current reading; `None` when the field has not been reported
    async fn native_value(&self) -> Option<SensorValue>;

    /// The reading rendered as a state string, `None` -> "unknown"
    async fn state(&self) -> String {
        SensorValue::render(self.native_value().await)
    }
}

/// Build all sensor entities for one device
pub async fn build_sensors(source: Arc<dyn SensorSource>) -> Vec<Box<dyn Sensor>> {
    let serial = source.snapshot().await.info.serial_no;
    let serial = serial.as_deref();
    vec![
        Box::new(CurrentFlowRateSensor::new(serial, source.clone())),
        Box::new(TemperatureSensor::new(serial, source.clone())),
        Box::new(PressureSensor::new(serial, source.clone())),
        Box::new(BatterySensor::new(serial, source.clone())),
        Box::new(ValveStateSensor::new(serial, source.clone())),
        Box::new(DeviceStatusSensor::new(serial, source.clone())),
        Box::new(AutoShutOffEnabledSensor::new(serial, source)),
    ]
}

/// Monitors the current water flow rate
pub struct CurrentFlowRateSensor {
    entity: SonicEntity,
}

impl CurrentFlowRateSensor {
    pub fn new(serial: Option<&str>, source: Arc<dyn SensorSource>) -> Self {
        Self {
            entity: SonicEntity::new("current_flow_rate", NAME_FLOW_RATE, serial, source),
        }
    }
}

#[async_trait]
impl Sensor for CurrentFlowRateSensor {
    fn entity(&self) -> &SonicEntity {
        &self.entity
    }

    fn unit_of_measurement(&self) -> Option<&'static str> {
        Some(UNIT_FLOW_ML_MIN)
    }

    fn state_class(&self) -> Option<StateClass> {
        Some(StateClass::Measurement)
    }

    fn icon(&self) -> Option<&'static str> {
        Some(GAUGE_ICON)
    }

    async fn native_value(&self) -> Option<SensorValue> {
        let snapshot = self.entity.snapshot().await;
        snapshot.telemetry.water_flow.map(|flow| round1(flow).into())
    }
}

/// Monitors the water temperature
pub struct TemperatureSensor {
    entity: SonicEntity,
}

impl TemperatureSensor {
    pub fn new(serial: Option<&str>, source: Arc<dyn SensorSource>) -> Self {
        Self {
            entity: SonicEntity::new("temperature", NAME_WATER_TEMPERATURE, serial, source),
        }
    }
}

#[async_trait]
impl Sensor for TemperatureSensor {
    fn entity(&self) -> &SonicEntity {
        &self.entity
    }

    fn unit_of_measurement(&self) -> Option<&'static str> {
        Some(UNIT_CELSIUS)
    }

    fn device_class(&self) -> Option<SensorDeviceClass> {
        Some(SensorDeviceClass::Temperature)
    }

    fn state_class(&self) -> Option<StateClass> {
        Some(StateClass::Measurement)
    }

    async fn native_value(&self) -> Option<SensorValue> {
        let snapshot = self.entity.snapshot().await;
        snapshot.telemetry.water_temp.map(|temp| round1(temp).into())
    }
}

/// Monitors the water pressure.
///
/// The cloud reports millibar; the value is converted to bar before
/// reporting, and bar is the declared unit.
pub struct PressureSensor {
    entity: SonicEntity,
}

impl PressureSensor {
    pub fn new(serial: Option<&str>, source: Arc<dyn SensorSource>) -> Self {
        Self {
            entity: SonicEntity::new("water_pressure", NAME_WATER_PRESSURE, serial, source),
        }
    }
}

#[async_trait]
impl Sensor for PressureSensor {
    fn entity(&self) -> &SonicEntity {
        &self.entity
    }

    fn unit_of_measurement(&self) -> Option<&'static str> {
        Some(UNIT_BAR)
    }

    fn device_class(&self) -> Option<SensorDeviceClass> {
        Some(SensorDeviceClass::Pressure)
    }

    fn state_class(&self) -> Option<StateClass> {
        Some(StateClass::Measurement)
    }

    async fn native_value(&self) -> Option<SensorValue> {
        let snapshot = self.entity.snapshot().await;
        snapshot
            .telemetry
            .pressure
            .map(|mbar| round1(mbar / 1000.0).into())
    }
}

/// Reports the battery state, or external power supply
pub struct BatterySensor {
    entity: SonicEntity,
}

impl BatterySensor {
    pub fn new(serial: Option<&str>, source: Arc<dyn SensorSource>) -> Self {
        Self {
            entity: SonicEntity::new("battery", NAME_BATTERY, serial, source),
        }
    }
}

#[async_trait]
impl Sensor for BatterySensor {
    fn entity(&self) -> &SonicEntity {
        &self.entity
    }

    async fn native_value(&self) -> Option<SensorValue> {
        let snapshot = self.entity.snapshot().await;
        snapshot.info.battery.map(|battery| battery.as_str().into())
    }
}

/// Reports the last known valve state
pub struct ValveStateSensor {
    entity: SonicEntity,
}

impl ValveStateSensor {
    pub fn new(serial: Option<&str>, source: Arc<dyn SensorSource>) -> Self {
        Self {
            entity: SonicEntity::new("valve_state", NAME_VALVE_STATE, serial, source),
        }
    }
}

#[async_trait]
impl Sensor for ValveStateSensor {
    fn entity(&self) -> &SonicEntity {
        &self.entity
    }

    async fn native_value(&self) -> Option<SensorValue> {
        let snapshot = self.entity.snapshot().await;
        snapshot.info.valve_state.map(|state| state.as_str().into())
    }
}

/// Reports the device status message
pub struct DeviceStatusSensor {
    entity: SonicEntity,
}

impl DeviceStatusSensor {
    pub fn new(serial: Option<&str>, source: Arc<dyn SensorSource>) -> Self {
        Self {
            entity: SonicEntity::new("device_status", NAME_DEVICE_STATUS, serial, source),
        }
    }
}

#[async_trait]
impl Sensor for DeviceStatusSensor {
    fn entity(&self) -> &SonicEntity {
        &self.entity
    }

    async fn native_value(&self) -> Option<SensorValue> {
        let snapshot = self.entity.snapshot().await;
        snapshot.info.status.map(SensorValue::Text)
    }
}

/// Reports whether the auto shut off feature is enabled
pub struct AutoShutOffEnabledSensor {
    entity: SonicEntity,
}

impl AutoShutOffEnabledSensor {
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
impl Sensor for AutoShutOffEnabledSensor {
    fn entity(&self) -> &SonicEntity {
        &self.entity
    }

    async fn native_value(&self) -> Option<SensorValue> {
        let snapshot = self.entity.snapshot().await;
        snapshot.info.auto_shut_off_enabled.map(SensorValue::Flag)
    }
}
