//! Snapshot types for the polled device state
//!
//! The cloud exposes two payloads per device: the device details record and
//! the telemetry record. Both are refreshed by the polling coordinator and
//! read by the entity proxies. Every field is optional; the cloud omits
//! fields it has no reading for, and downstream consumers must surface those
//! as "unknown" rather than failing.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Position of the shut-off valve as last reported by the device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValveState {
    Open,
    Closed,
    Opening,
    Closing,
    Faulty,
    PressureTest,
    RequestedOpen,
    RequestedClosed,
}

impl ValveState {
    /// Whether the valve is letting water through
    pub fn is_open(self) -> bool {
        self == ValveState::Open
    }

    /// The wire string for this state
    pub fn as_str(self) -> &'static str {
        match self {
            ValveState::Open => "open",
            ValveState::Closed => "closed",
            ValveState::Opening => "opening",
            ValveState::Closing => "closing",
            ValveState::Faulty => "faulty",
            ValveState::PressureTest => "pressure_test",
            ValveState::RequestedOpen => "requested_open",
            ValveState::RequestedClosed => "requested_closed",
        }
    }
}

impl fmt::Display for ValveState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Battery level for battery-powered devices, or external supply
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatteryState {
    High,
    Mid,
    Low,
    ExternalPowerSupply,
}

impl BatteryState {
    pub fn as_str(self) -> &'static str {
        match self {
            BatteryState::High => "high",
            BatteryState::Mid => "mid",
            BatteryState::Low => "low",
            BatteryState::ExternalPowerSupply => "external_power_supply",
        }
    }
}

impl fmt::Display for BatteryState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Radio link between the device and its Signal hub
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RadioConnection {
    Connected,
    Disconnected,
}

impl RadioConnection {
    pub fn is_connected(self) -> bool {
        self == RadioConnection::Connected
    }
}

/// Device details record
///
/// One per device, refreshed on every coordinator poll. Field names follow
/// the cloud payload.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeviceInfo {
    /// User-assigned device name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Serial number, used to build stable entity unique ids
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub serial_no: Option<String>,

    /// Received signal strength of the radio link
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub radio_rssi: Option<f64>,

    /// Radio link state to the Signal hub
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub radio_connection: Option<RadioConnection>,

    /// Battery level, or external power supply
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub battery: Option<BatteryState>,

    /// Whether the offline auto shut off feature is enabled
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auto_shut_off_enabled: Option<bool>,

    /// Offline auto shut off usage time limit in seconds; 0 disables the check
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auto_shut_off_time_limit: Option<u64>,

    /// Offline auto shut off volume limit in millilitres; 0 disables the check
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auto_shut_off_volume_limit: Option<u64>,

    /// Id of the associated Signal hub
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signal_id: Option<String>,

    /// Free-form status message from the cloud
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,

    /// Last known valve position
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub valve_state: Option<ValveState>,
}

/// Telemetry record
///
/// Measurements taken by the device, refreshed alongside [`DeviceInfo`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Telemetry {
    /// Current water flow in millilitres per minute
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub water_flow: Option<f64>,

    /// Current pipe pressure in millibar
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pressure: Option<f64>,

    /// Current water temperature in degrees Celsius
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub water_temp: Option<f64>,

    /// Unix timestamp in seconds of when the measurements were taken
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub probed_at: Option<i64>,
}

impl Telemetry {
    /// Measurement timestamp as UTC, if the cloud reported one
    pub fn probed_at_utc(&self) -> Option<DateTime<Utc>> {
        self.probed_at.and_then(|ts| DateTime::from_timestamp(ts, 0))
    }
}
