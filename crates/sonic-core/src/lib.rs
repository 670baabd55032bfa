//! Core types for the Sonic water shut-off valve integration
//!
//! This crate provides the fundamental value types shared by the rest of the
//! workspace: the polled device snapshot ([`DeviceInfo`], [`Telemetry`]),
//! the wire enums ([`ValveState`], [`BatteryState`], [`RadioConnection`]),
//! and the sensor value rendering type ([`SensorValue`]).

mod snapshot;
mod value;

pub use snapshot::{BatteryState, DeviceInfo, RadioConnection, Telemetry, ValveState};
pub use value::{round1, SensorValue};

/// State value reported when a polled field is absent
pub const STATE_UNKNOWN: &str = "unknown";

/// Unit of measurement for the water flow rate sensor
pub const UNIT_FLOW_ML_MIN: &str = "millilitres per min";

/// Unit of measurement for the water temperature sensor
pub const UNIT_CELSIUS: &str = "°C";

/// Unit of measurement for the water pressure sensor.
///
/// The cloud reports pressure in millibar; the sensor converts to bar
/// before reporting, so bar is the declared unit.
pub const UNIT_BAR: &str = "bar";
