//! Per-entry runtime construction and teardown

use std::sync::Arc;

use dashmap::DashMap;
use futures::future::join_all;
use futures::FutureExt;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use sonic_cloud::{CloudApi, CloudError};
use sonic_config_entries::{ConfigEntries, ConfigEntry, SetupFailure};
use sonic_device::{
    build_binary_sensors, build_sensors, BinarySensor, DeviceCoordinator, Sensor, SensorSource,
    ValveSwitch, UPDATE_INTERVAL,
};

/// Everything built for one loaded config entry
pub struct EntryRuntime {
    devices: Vec<Arc<DeviceCoordinator>>,
    sensors: Vec<Box<dyn Sensor>>,
    binary_sensors: Vec<Box<dyn BinarySensor>>,
    switches: Vec<Arc<ValveSwitch>>,
    tasks: Vec<JoinHandle<()>>,
}

impl EntryRuntime {
    pub fn devices(&self) -> &[Arc<DeviceCoordinator>] {
        &self.devices
    }

    pub fn sensors(&self) -> &[Box<dyn Sensor>] {
        &self.sensors
    }

    pub fn binary_sensors(&self) -> &[Box<dyn BinarySensor>] {
        &self.binary_sensors
    }

    pub fn switches(&self) -> &[Arc<ValveSwitch>] {
        &self.switches
    }
}

impl Drop for EntryRuntime {
    fn drop(&mut self) {
        for task in &self.tasks {
            task.abort();
        }
    }
}

/// Runtime for all configured accounts
///
/// Holds one [`EntryRuntime`] per loaded entry, keyed by entry id.
pub struct SonicRuntime {
    client: Arc<dyn CloudApi>,
    data: DashMap<String, Arc<EntryRuntime>>,
}

impl SonicRuntime {
    pub fn new(client: Arc<dyn CloudApi>) -> Self {
        Self {
            client,
            data: DashMap::new(),
        }
    }

    /// Runtime of a loaded entry, if any
    pub fn get(&self, entry_id: &str) -> Option<Arc<EntryRuntime>> {
        self.data.get(entry_id).map(|r| r.value().clone())
    }

    /// Number of loaded entries
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Register this runtime as the manager's setup/unload handlers
    pub async fn register(self: &Arc<Self>, entries: &ConfigEntries) {
        let runtime = self.clone();
        entries
            .register_setup_handler(Arc::new(move |entry| {
                let runtime = runtime.clone();
                async move { runtime.setup_entry(&entry).await }.boxed()
            }))
            .await;

        let runtime = self.clone();
        entries
            .register_unload_handler(Arc::new(move |entry| {
                let runtime = runtime.clone();
                async move { runtime.unload_entry(&entry.entry_id).await }.boxed()
            }))
            .await;
    }

    /// Set up one config entry: authenticate, discover devices, build the
    /// coordinators and entity platforms, start polling.
    pub async fn setup_entry(&self, entry: &ConfigEntry) -> Result<(), SetupFailure> {
        if let Err(error) = self
            .client
            .login(&entry.data.username, &entry.data.password)
            .await
        {
            return Err(match error {
                // Credentials may be mid-rotation; let the manager retry
                CloudError::InvalidCredentials => SetupFailure::NotReady(error.to_string()),
                other => SetupFailure::Failed(other.to_string()),
            });
        }

        let device_ids = self
            .client
            .list_devices()
            .await
            .map_err(|error| SetupFailure::Failed(error.to_string()))?;
        debug!(
            "Account {} has {} devices",
            entry.unique_id,
            device_ids.len()
        );

        let devices: Vec<Arc<DeviceCoordinator>> = device_ids
            .into_iter()
            .map(|id| Arc::new(DeviceCoordinator::new(self.client.clone(), id)))
            .collect();

        join_all(devices.iter().map(|device| device.refresh())).await;

        let mut sensors = Vec::new();
        let mut binary_sensors = Vec::new();
        let mut switches = Vec::new();
        let mut tasks = Vec::new();

        for device in &devices {
            let source = device.clone() as Arc<dyn SensorSource>;
            sensors.extend(build_sensors(source.clone()).await);
            binary_sensors.extend(build_binary_sensors(source).await);

            let switch = Arc::new(ValveSwitch::new(device.clone()).await);
            tasks.push(spawn_switch_listener(device, switch.clone()));
            switches.push(switch);

            tasks.push(device.spawn_polling(UPDATE_INTERVAL));
        }

        let runtime = EntryRuntime {
            devices,
            sensors,
            binary_sensors,
            switches,
            tasks,
        };

        info!(
            "Set up entry {} with {} devices",
            entry.entry_id,
            runtime.devices.len()
        );
        self.data.insert(entry.entry_id.clone(), Arc::new(runtime));
        Ok(())
    }

    /// Tear down the runtime of one entry
    pub async fn unload_entry(&self, entry_id: &str) -> Result<(), String> {
        match self.data.remove(entry_id) {
            Some((_, runtime)) => {
                // Dropping the runtime aborts the polling and listener tasks
                drop(runtime);
                info!("Unloaded entry {}", entry_id);
                Ok(())
            }
            None => {
                warn!("Unload requested for unknown entry {}", entry_id);
                Ok(())
            }
        }
    }
}

/// Keep a valve switch reconciled with its coordinator's refreshes
fn spawn_switch_listener(
    device: &Arc<DeviceCoordinator>,
    switch: Arc<ValveSwitch>,
) -> JoinHandle<()> {
    let mut updates = device.subscribe();
    tokio::spawn(async move {
        loop {
            match updates.recv().await {
                Ok(()) => switch.update_state().await,
                Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    })
}
