//! Config entries manager
//!
//! Owns every configured account: indexing by entry id and account identity,
//! persistence, and the setup/unload/reload lifecycle driven through
//! registered handlers.

use std::sync::Arc;

use chrono::Utc;
use dashmap::DashMap;
use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::entry::{ConfigEntry, ConfigEntryState, ConfigEntryUpdate, Credentials};
use crate::state_machine::{calculate_retry_delay, InvalidTransition};
use crate::storage::{Storage, StorageFile, StorageResult};

/// Storage key for config entries
pub const STORAGE_KEY: &str = "sonic.config_entries";
/// Current storage version
pub const STORAGE_VERSION: u32 = 1;
/// Current minor version
pub const STORAGE_MINOR_VERSION: u32 = 1;

/// Config entries errors
#[derive(Debug, Error)]
pub enum ConfigEntriesError {
    #[error("Entry not found: {0}")]
    NotFound(String),

    #[error("Entry already exists for account {unique_id}")]
    AlreadyExists { unique_id: String },

    #[error("Cannot unload entry in state {0:?}")]
    CannotUnload(ConfigEntryState),

    #[error("Setup failed: {0}")]
    SetupFailed(String),

    #[error("Setup deferred ({reason}), retrying in {retry_in:.0}s")]
    SetupDeferred { reason: String, retry_in: f64 },

    #[error("Unload failed: {0}")]
    UnloadFailed(String),

    #[error(transparent)]
    InvalidState(#[from] InvalidTransition),

    #[error("Storage error: {0}")]
    Storage(#[from] crate::storage::StorageError),
}

pub type ConfigEntriesResult<T> = Result<T, ConfigEntriesError>;

/// Config entries data for storage
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConfigEntriesData {
    /// All config entries
    pub entries: Vec<ConfigEntry>,
}

/// Why a setup attempt did not produce a loaded entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SetupFailure {
    /// Transient condition (cloud unreachable, credentials being rotated);
    /// the entry parks in SetupRetry with a backoff delay.
    NotReady(String),
    /// Permanent failure; the entry parks in SetupError.
    Failed(String),
}

/// Setup handler: performs the integration's setup for one entry
pub type SetupHandler =
    Arc<dyn Fn(ConfigEntry) -> BoxFuture<'static, Result<(), SetupFailure>> + Send + Sync>;

/// Unload handler: tears down the integration's runtime for one entry
pub type UnloadHandler =
    Arc<dyn Fn(ConfigEntry) -> BoxFuture<'static, Result<(), String>> + Send + Sync>;

/// Config entries manager
///
/// All state transitions go through the entry FSM; an out-of-order
/// setup/unload surfaces as [`ConfigEntriesError::InvalidState`] instead of
/// silently corrupting the lifecycle.
pub struct ConfigEntries {
    /// Storage backend
    storage: Arc<Storage>,

    /// Primary index: entry_id -> ConfigEntry
    entries: DashMap<String, ConfigEntry>,

    /// Index: unique_id (lower-cased username) -> entry_id
    by_unique_id: DashMap<String, String>,

    /// Setup lock to prevent concurrent setup/unload
    setup_lock: Mutex<()>,

    setup_handler: Mutex<Option<SetupHandler>>,
    unload_handler: Mutex<Option<UnloadHandler>>,
}

impl ConfigEntries {
    /// Create a new config entries manager
    pub fn new(storage: Arc<Storage>) -> Self {
        Self {
            storage,
            entries: DashMap::new(),
            by_unique_id: DashMap::new(),
            setup_lock: Mutex::new(()),
            setup_handler: Mutex::new(None),
            unload_handler: Mutex::new(None),
        }
    }

    /// Load entries from storage
    pub async fn load(&self) -> StorageResult<()> {
        if let Some(storage_file) = self.storage.load::<ConfigEntriesData>(STORAGE_KEY).await? {
            info!(
                "Loading {} config entries from storage (v{}.{})",
                storage_file.data.entries.len(),
                storage_file.version,
                storage_file.minor_version
            );

            for entry in storage_file.data.entries {
                self.index_entry(&entry);
            }
        }
        Ok(())
    }

    /// Save entries to storage
    pub async fn save(&self) -> StorageResult<()> {
        let data = ConfigEntriesData {
            entries: self.entries.iter().map(|r| r.value().clone()).collect(),
        };

        let storage_file =
            StorageFile::new(STORAGE_KEY, data, STORAGE_VERSION, STORAGE_MINOR_VERSION);

        self.storage.save(&storage_file).await?;
        debug!("Saved {} config entries to storage", self.entries.len());
        Ok(())
    }

    fn index_entry(&self, entry: &ConfigEntry) {
        self.entries.insert(entry.entry_id.clone(), entry.clone());
        self.by_unique_id
            .insert(entry.unique_id.clone(), entry.entry_id.clone());
    }

    fn unindex_entry(&self, entry: &ConfigEntry) {
        self.by_unique_id.remove(&entry.unique_id);
        self.entries.remove(&entry.entry_id);
    }

    /// Get an entry by ID
    pub fn get(&self, entry_id: &str) -> Option<ConfigEntry> {
        self.entries.get(entry_id).map(|r| r.value().clone())
    }

    /// Get an entry by account identity (lower-cased username)
    pub fn get_by_unique_id(&self, unique_id: &str) -> Option<ConfigEntry> {
        self.by_unique_id
            .get(unique_id)
            .and_then(|entry_id| self.get(&entry_id))
    }

    /// Add a new config entry
    pub async fn add(&self, entry: ConfigEntry) -> ConfigEntriesResult<ConfigEntry> {
        if self.get_by_unique_id(&entry.unique_id).is_some() {
            return Err(ConfigEntriesError::AlreadyExists {
                unique_id: entry.unique_id.clone(),
            });
        }

        self.index_entry(&entry);
        self.save().await?;

        info!("Added config entry: {} [{}]", entry.title, entry.entry_id);

        Ok(entry)
    }

    /// Update an existing entry
    pub async fn update(
        &self,
        entry_id: &str,
        update: ConfigEntryUpdate,
    ) -> ConfigEntriesResult<ConfigEntry> {
        let entry = self
            .get(entry_id)
            .ok_or_else(|| ConfigEntriesError::NotFound(entry_id.to_string()))?;

        self.unindex_entry(&entry);

        let mut updated = entry;
        if let Some(title) = update.title {
            updated.title = title;
        }
        if let Some(data) = update.data {
            // Identity follows the stored credentials
            updated.unique_id = data.account_id();
            updated.data = data;
        }
        if let Some(source) = update.source {
            updated.source = source;
        }
        updated.modified_at = Utc::now();

        self.index_entry(&updated);
        self.save().await?;

        debug!("Updated config entry: {}", entry_id);
        Ok(updated)
    }

    /// Create or update the entry for an account.
    ///
    /// Account identity is the lower-cased username: a second login with the
    /// same username updates the stored entry instead of duplicating it.
    /// Returns the entry and whether an existing one was updated (callers
    /// trigger a reload in that case).
    pub async fn upsert(
        &self,
        credentials: Credentials,
    ) -> ConfigEntriesResult<(ConfigEntry, bool)> {
        match self.get_by_unique_id(&credentials.account_id()) {
            Some(existing) => {
                let updated = self
                    .update(
                        &existing.entry_id,
                        ConfigEntryUpdate::new().data(credentials),
                    )
                    .await?;
                Ok((updated, true))
            }
            None => {
                let entry = self.add(ConfigEntry::new(credentials)).await?;
                Ok((entry, false))
            }
        }
    }

    /// Remove an entry
    pub async fn remove(&self, entry_id: &str) -> ConfigEntriesResult<ConfigEntry> {
        let entry = self
            .get(entry_id)
            .ok_or_else(|| ConfigEntriesError::NotFound(entry_id.to_string()))?;

        self.unindex_entry(&entry);
        self.save().await?;

        info!("Removed config entry: {} [{}]", entry.title, entry_id);

        Ok(entry)
    }

    fn apply_state(
        &self,
        entry_id: &str,
        state: ConfigEntryState,
        reason: Option<String>,
    ) -> ConfigEntriesResult<()> {
        let mut entry = self
            .entries
            .get_mut(entry_id)
            .ok_or_else(|| ConfigEntriesError::NotFound(entry_id.to_string()))?;
        entry.try_set_state(state, reason)?;
        debug!("Entry {} state changed to {:?}", entry_id, state);
        Ok(())
    }

    /// Register the setup handler
    pub async fn register_setup_handler(&self, handler: SetupHandler) {
        *self.setup_handler.lock().await = Some(handler);
        debug!("Registered setup handler");
    }

    /// Register the unload handler
    pub async fn register_unload_handler(&self, handler: UnloadHandler) {
        *self.unload_handler.lock().await = Some(handler);
        debug!("Registered unload handler");
    }

    /// Set up an entry through the registered handler
    pub async fn setup(&self, entry_id: &str) -> ConfigEntriesResult<()> {
        let _lock = self.setup_lock.lock().await;

        let entry = self
            .get(entry_id)
            .ok_or_else(|| ConfigEntriesError::NotFound(entry_id.to_string()))?;

        self.apply_state(entry_id, ConfigEntryState::SetupInProgress, None)?;

        let handler = self.setup_handler.lock().await.clone();
        let Some(handler) = handler else {
            // No handler, mark as loaded
            self.apply_state(entry_id, ConfigEntryState::Loaded, None)?;
            debug!("No setup handler registered, marking {} as loaded", entry_id);
            return Ok(());
        };

        match handler(entry.clone()).await {
            Ok(()) => {
                self.apply_state(entry_id, ConfigEntryState::Loaded, None)?;
                info!("Setup completed for entry: {} ({})", entry.title, entry_id);
                Ok(())
            }
            Err(SetupFailure::NotReady(reason)) => {
                let tries = self
                    .entries
                    .get_mut(entry_id)
                    .map(|mut e| e.increment_tries())
                    .unwrap_or(1);
                self.apply_state(entry_id, ConfigEntryState::SetupRetry, Some(reason.clone()))?;
                let retry_in = calculate_retry_delay(tries);
                warn!(
                    "Entry {} not ready ({}), retry {} in {:.0}s",
                    entry_id, reason, tries, retry_in
                );
                Err(ConfigEntriesError::SetupDeferred { reason, retry_in })
            }
            Err(SetupFailure::Failed(reason)) => {
                warn!("Setup failed for entry {}: {}", entry_id, reason);
                self.apply_state(entry_id, ConfigEntryState::SetupError, Some(reason.clone()))?;
                Err(ConfigEntriesError::SetupFailed(reason))
            }
        }
    }

    /// Unload an entry through the registered handler
    pub async fn unload(&self, entry_id: &str) -> ConfigEntriesResult<()> {
        let _lock = self.setup_lock.lock().await;

        let entry = self
            .get(entry_id)
            .ok_or_else(|| ConfigEntriesError::NotFound(entry_id.to_string()))?;

        if entry.state == ConfigEntryState::NotLoaded {
            return Ok(());
        }
        if !entry.state.is_recoverable() {
            return Err(ConfigEntriesError::CannotUnload(entry.state));
        }

        self.apply_state(entry_id, ConfigEntryState::UnloadInProgress, None)?;

        let handler = self.unload_handler.lock().await.clone();
        if let Some(handler) = handler {
            if let Err(reason) = handler(entry.clone()).await {
                warn!("Unload failed for entry {}: {}", entry_id, reason);
                self.apply_state(entry_id, ConfigEntryState::FailedUnload, Some(reason.clone()))?;
                return Err(ConfigEntriesError::UnloadFailed(reason));
            }
        }

        self.apply_state(entry_id, ConfigEntryState::NotLoaded, None)?;
        info!("Unloaded entry: {} ({})", entry.title, entry_id);
        Ok(())
    }

    /// Reload an entry (unload + setup)
    pub async fn reload(&self, entry_id: &str) -> ConfigEntriesResult<()> {
        self.unload(entry_id).await?;
        self.setup(entry_id).await
    }

    /// Get all entry IDs
    pub fn entry_ids(&self) -> Vec<String> {
        self.entries.iter().map(|r| r.key().clone()).collect()
    }

    /// Get count of entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate over all entries
    pub fn iter(&self) -> impl Iterator<Item = ConfigEntry> + '_ {
        self.entries.iter().map(|r| r.value().clone())
    }

    /// Set up all entries, e.g. at startup after [`ConfigEntries::load`]
    pub async fn setup_all(&self) -> Vec<ConfigEntriesResult<()>> {
        let entry_ids: Vec<_> = self.entry_ids();
        let mut results = Vec::new();

        for entry_id in entry_ids {
            results.push(self.setup(&entry_id).await);
        }

        results
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::FutureExt;
    use tempfile::TempDir;

    fn create_test_manager() -> (TempDir, ConfigEntries) {
        let temp_dir = TempDir::new().unwrap();
        let storage = Arc::new(Storage::new(temp_dir.path()));
        let manager = ConfigEntries::new(storage);
        (temp_dir, manager)
    }

    fn creds(username: &str) -> Credentials {
        Credentials::new(username, "secret")
    }

    #[tokio::test]
    async fn test_add_entry() {
        let (_dir, manager) = create_test_manager();

        let added = manager
            .add(ConfigEntry::new(creds("User@Example.com")))
            .await
            .unwrap();
        assert_eq!(added.unique_id, "user@example.com");
        assert_eq!(manager.len(), 1);
    }

    #[tokio::test]
    async fn test_duplicate_account_rejected() {
        let (_dir, manager) = create_test_manager();

        manager
            .add(ConfigEntry::new(creds("user@example.com")))
            .await
            .unwrap();
        let result = manager.add(ConfigEntry::new(creds("USER@example.com"))).await;

        assert!(matches!(
            result,
            Err(ConfigEntriesError::AlreadyExists { .. })
        ));
    }

    #[tokio::test]
    async fn test_upsert_updates_instead_of_duplicating() {
        let (_dir, manager) = create_test_manager();

        let (first, updated) = manager.upsert(creds("user@example.com")).await.unwrap();
        assert!(!updated);

        let (second, updated) = manager
            .upsert(Credentials::new("USER@example.com", "new-password"))
            .await
            .unwrap();
        assert!(updated);
        assert_eq!(manager.len(), 1);
        assert_eq!(second.entry_id, first.entry_id);
        assert_eq!(
            manager.get(&first.entry_id).unwrap().data.password,
            "new-password"
        );
    }

    #[tokio::test]
    async fn test_update_entry() {
        let (_dir, manager) = create_test_manager();

        let entry = manager
            .add(ConfigEntry::new(creds("user@example.com")))
            .await
            .unwrap();

        let updated = manager
            .update(&entry.entry_id, ConfigEntryUpdate::new().title("Renamed"))
            .await
            .unwrap();

        assert_eq!(updated.title, "Renamed");
    }

    #[tokio::test]
    async fn test_remove_entry() {
        let (_dir, manager) = create_test_manager();

        let entry = manager
            .add(ConfigEntry::new(creds("user@example.com")))
            .await
            .unwrap();
        assert_eq!(manager.len(), 1);

        manager.remove(&entry.entry_id).await.unwrap();
        assert_eq!(manager.len(), 0);
        assert!(manager.get_by_unique_id("user@example.com").is_none());
    }

    #[tokio::test]
    async fn test_setup_and_unload() {
        let (_dir, manager) = create_test_manager();

        let entry = manager
            .add(ConfigEntry::new(creds("user@example.com")))
            .await
            .unwrap();
        assert_eq!(
            manager.get(&entry.entry_id).unwrap().state,
            ConfigEntryState::NotLoaded
        );

        manager.setup(&entry.entry_id).await.unwrap();
        assert_eq!(
            manager.get(&entry.entry_id).unwrap().state,
            ConfigEntryState::Loaded
        );

        manager.unload(&entry.entry_id).await.unwrap();
        assert_eq!(
            manager.get(&entry.entry_id).unwrap().state,
            ConfigEntryState::NotLoaded
        );
    }

    #[tokio::test]
    async fn test_setup_handler_success() {
        let (_dir, manager) = create_test_manager();

        manager
            .register_setup_handler(Arc::new(|_entry| async { Ok(()) }.boxed()))
            .await;

        let entry = manager
            .add(ConfigEntry::new(creds("user@example.com")))
            .await
            .unwrap();
        manager.setup(&entry.entry_id).await.unwrap();

        assert!(manager.get(&entry.entry_id).unwrap().is_loaded());
    }

    #[tokio::test]
    async fn test_setup_handler_failure() {
        let (_dir, manager) = create_test_manager();

        manager
            .register_setup_handler(Arc::new(|_entry| {
                async { Err(SetupFailure::Failed("Connection failed".to_string())) }.boxed()
            }))
            .await;

        let entry = manager
            .add(ConfigEntry::new(creds("user@example.com")))
            .await
            .unwrap();
        let result = manager.setup(&entry.entry_id).await;

        assert!(matches!(result, Err(ConfigEntriesError::SetupFailed(_))));
        assert_eq!(
            manager.get(&entry.entry_id).unwrap().state,
            ConfigEntryState::SetupError
        );
    }

    #[tokio::test]
    async fn test_setup_handler_not_ready_parks_in_retry() {
        let (_dir, manager) = create_test_manager();

        manager
            .register_setup_handler(Arc::new(|_entry| {
                async { Err(SetupFailure::NotReady("cloud offline".to_string())) }.boxed()
            }))
            .await;

        let entry = manager
            .add(ConfigEntry::new(creds("user@example.com")))
            .await
            .unwrap();
        let result = manager.setup(&entry.entry_id).await;

        assert!(matches!(
            result,
            Err(ConfigEntriesError::SetupDeferred { .. })
        ));
        let stored = manager.get(&entry.entry_id).unwrap();
        assert_eq!(stored.state, ConfigEntryState::SetupRetry);
        assert_eq!(stored.tries, 1);
    }

    #[tokio::test]
    async fn test_reload_after_load() {
        let (_dir, manager) = create_test_manager();

        manager
            .register_setup_handler(Arc::new(|_entry| async { Ok(()) }.boxed()))
            .await;

        let entry = manager
            .add(ConfigEntry::new(creds("user@example.com")))
            .await
            .unwrap();
        manager.setup(&entry.entry_id).await.unwrap();
        manager.reload(&entry.entry_id).await.unwrap();

        assert!(manager.get(&entry.entry_id).unwrap().is_loaded());
    }

    #[tokio::test]
    async fn test_save_and_load() {
        let temp_dir = TempDir::new().unwrap();
        let storage = Arc::new(Storage::new(temp_dir.path()));

        // Create and populate
        {
            let manager = ConfigEntries::new(storage.clone());
            manager
                .add(ConfigEntry::new(creds("User@Example.com")))
                .await
                .unwrap();
        }

        // Load into new manager
        {
            let manager = ConfigEntries::new(storage);
            manager.load().await.unwrap();

            assert_eq!(manager.len(), 1);
            let entry = manager.get_by_unique_id("user@example.com").unwrap();
            assert_eq!(entry.title, "user@example.com");
            assert_eq!(entry.data.username, "User@Example.com");
        }
    }
}
