//! The `CloudApi` capability interface

use async_trait::async_trait;

use sonic_core::{DeviceInfo, Telemetry};

use crate::CloudResult;

/// A property (household) the account has access to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropertyInfo {
    pub id: String,
    pub name: String,
}

/// Capability interface for the vendor cloud
///
/// One instance per configured account, sharing whatever HTTP session the
/// implementor manages. All calls are single network round trips; retries and
/// backoff are the caller's concern.
#[async_trait]
pub trait CloudApi: Send + Sync {
    /// Authenticate the session with the given credentials.
    ///
    /// Must be called before any other operation. Subsequent calls
    /// re-authenticate, which is how re-auth with a changed password works.
    async fn login(&self, username: &str, password: &str) -> CloudResult<()>;

    /// Ids of all Sonic devices visible to the account
    async fn list_devices(&self) -> CloudResult<Vec<String>>;

    /// Device details record for one device
    async fn device_details(&self, device_id: &str) -> CloudResult<DeviceInfo>;

    /// Telemetry record for one device
    async fn device_telemetry(&self, device_id: &str) -> CloudResult<Telemetry>;

    /// Command the shut-off valve open
    async fn open_valve(&self, device_id: &str) -> CloudResult<()>;

    /// Command the shut-off valve closed
    async fn close_valve(&self, device_id: &str) -> CloudResult<()>;

    /// Details of the account's first property
    async fn property_details(&self) -> CloudResult<PropertyInfo>;
}
