//! Entry lifecycle wiring for the Sonic integration
//!
//! Owns the per-entry runtime: logging in with the stored credentials,
//! building one polling coordinator per device, constructing the entity
//! platforms, and tearing everything down on unload. Registers itself as the
//! setup/unload handlers of the config entries manager so that flow-triggered
//! reloads reach it.

mod runtime;

pub use runtime::{EntryRuntime, SonicRuntime};
