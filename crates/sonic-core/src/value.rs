//! Sensor value rendering
//!
//! Entities report an optional native value; `None` renders as the
//! "unknown" state rather than an error or a default.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::STATE_UNKNOWN;

/// A typed sensor reading
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SensorValue {
    /// Numeric measurement
    Measurement(f64),
    /// Free-form text state
    Text(String),
    /// Boolean state
    Flag(bool),
}

impl SensorValue {
    /// Render an optional reading as a state string, `None` -> "unknown"
    pub fn render(value: Option<SensorValue>) -> String {
        match value {
            Some(v) => v.to_string(),
            None => STATE_UNKNOWN.to_string(),
        }
    }
}

impl fmt::Display for SensorValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SensorValue::Measurement(v) => write!(f, "{v}"),
            SensorValue::Text(s) => f.write_str(s),
            SensorValue::Flag(b) => write!(f, "{b}"),
        }
    }
}

impl From<f64> for SensorValue {
    fn from(v: f64) -> Self {
        SensorValue::Measurement(v)
    }
}

impl From<String> for SensorValue {
    fn from(s: String) -> Self {
        SensorValue::Text(s)
    }
}

impl From<&str> for SensorValue {
    fn from(s: &str) -> Self {
        SensorValue::Text(s.to_string())
    }
}

impl From<bool> for SensorValue {
    fn from(b: bool) -> Self {
        SensorValue::Flag(b)
    }
}

/// Round to one decimal place, the precision every measurement sensor reports
pub fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}
