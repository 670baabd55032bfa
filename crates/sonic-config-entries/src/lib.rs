//! Config entries for the Sonic integration
//!
//! A config entry is one configured cloud account: the credentials collected
//! by the setup wizard, keyed by the lower-cased username. This crate owns
//! the entry record, its lifecycle state machine, JSON persistence under
//! `.storage/`, and the manager that drives setup/unload/reload through
//! registered handlers.
//!
//! # Key Types
//!
//! - [`Credentials`] - username/password pair with its account identity
//! - [`ConfigEntry`] - a single configured account
//! - [`ConfigEntryState`] - lifecycle state of an entry
//! - [`ConfigEntries`] - manager for all entries

pub mod entry;
pub mod manager;
pub mod state_machine;
pub mod storage;

pub use entry::{ConfigEntry, ConfigEntrySource, ConfigEntryState, ConfigEntryUpdate, Credentials};

pub use manager::{
    ConfigEntries, ConfigEntriesData, ConfigEntriesError, ConfigEntriesResult, SetupFailure,
    SetupHandler, UnloadHandler, STORAGE_KEY, STORAGE_MINOR_VERSION, STORAGE_VERSION,
};

pub use state_machine::{calculate_retry_delay, InvalidTransition};

pub use storage::{Storage, StorageError, StorageFile, StorageResult};
