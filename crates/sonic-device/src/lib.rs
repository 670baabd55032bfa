//! Device coordinator and entity proxies for the Sonic integration
//!
//! The [`DeviceCoordinator`] polls the cloud for one device's details and
//! telemetry and caches them as a [`DeviceSnapshot`]. The entity proxies are
//! stateless readers over that snapshot: seven sensors, one binary sensor,
//! and the shut-off valve switch.

pub mod binary_sensor;
pub mod coordinator;
pub mod entity;
pub mod sensor;
pub mod switch;

pub use binary_sensor::{build_binary_sensors, AutoShutOffEnabledBinarySensor, BinarySensor};
pub use coordinator::{DeviceCoordinator, DeviceSnapshot, SensorSource, UPDATE_INTERVAL};
pub use entity::{
    BinarySensorDeviceClass, DeviceIdent, SensorDeviceClass, SonicEntity, StateClass,
};
pub use sensor::{build_sensors, Sensor};
pub use switch::ValveSwitch;
