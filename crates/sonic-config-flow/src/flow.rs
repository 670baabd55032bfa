//! The setup flow steps

use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, warn};

use sonic_cloud::CloudError;
use sonic_config_entries::{
    ConfigEntriesResult, ConfigEntry, ConfigEntrySource, ConfigEntryUpdate, Credentials,
};

use crate::validate::LoginValidator;

/// Step id of the initial credentials form
pub const STEP_USER: &str = "user";
/// Step id of the re-authentication form
pub const STEP_REAUTH_CONFIRM: &str = "reauth_confirm";

/// Error code shown when the cloud rejects the credentials
pub const ERROR_INVALID_AUTH: &str = "invalid_auth";
/// Error code shown when the cloud is unreachable or overloaded
pub const ERROR_SERVICE_UNAVAILABLE: &str = "service_unavailable_error";
/// Error code shown for any other failure
pub const ERROR_UNKNOWN: &str = "unknown_auth_error";

/// Abort reason when a second login for a known account updated the entry
pub const ABORT_ALREADY_CONFIGURED: &str = "already_configured";
/// Abort reason when a re-authentication succeeded
pub const ABORT_REAUTH_SUCCESSFUL: &str = "reauth_successful";

/// Form field schema
#[derive(Debug, Clone, Serialize)]
pub struct FormField {
    pub name: String,
    #[serde(rename = "type")]
    pub field_type: String,
    pub required: bool,
}

impl FormField {
    fn text(name: &str) -> Self {
        Self {
            name: name.to_string(),
            field_type: "string".to_string(),
            required: true,
        }
    }

    fn password(name: &str) -> Self {
        Self {
            name: name.to_string(),
            field_type: "password".to_string(),
            required: true,
        }
    }
}

/// Result of a flow step
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FlowResult {
    /// Show (or re-show) a form
    Form {
        step_id: String,
        data_schema: Vec<FormField>,
        errors: HashMap<String, String>,
    },
    /// A config entry was created
    CreateEntry { title: String, entry_id: String },
    /// The flow finished without creating an entry
    Abort { reason: String },
}

impl FlowResult {
    /// The error code under the "base" key, if this is a form with errors
    pub fn base_error(&self) -> Option<&str> {
        match self {
            FlowResult::Form { errors, .. } => errors.get("base").map(String::as_str),
            _ => None,
        }
    }
}

/// Credentials submitted through the user form
#[derive(Debug, Clone)]
pub struct UserInput {
    pub username: String,
    pub password: String,
}

/// Map a validation failure to its user-facing error code.
///
/// Anything the client cannot classify further collapses to the unknown
/// code; validation failures are surfaced on the form, never re-raised.
fn error_code(error: &CloudError) -> &'static str {
    match error {
        CloudError::InvalidCredentials => ERROR_INVALID_AUTH,
        CloudError::ServiceUnavailable | CloudError::TooManyRequests => ERROR_SERVICE_UNAVAILABLE,
        CloudError::Request(_) => ERROR_UNKNOWN,
    }
}

fn base_error(code: &str) -> HashMap<String, String> {
    HashMap::from([("base".to_string(), code.to_string())])
}

/// Handles the setup and re-authentication flow
pub struct SetupFlow {
    validator: Arc<dyn LoginValidator>,
    entries: Arc<sonic_config_entries::ConfigEntries>,
    reauth_entry: Option<ConfigEntry>,
}

impl SetupFlow {
    /// Start a user-initiated setup flow
    pub fn new(
        validator: Arc<dyn LoginValidator>,
        entries: Arc<sonic_config_entries::ConfigEntries>,
    ) -> Self {
        Self {
            validator,
            entries,
            reauth_entry: None,
        }
    }

    /// Start a re-authentication flow for an existing entry
    pub fn reauth(
        validator: Arc<dyn LoginValidator>,
        entries: Arc<sonic_config_entries::ConfigEntries>,
        entry_id: &str,
    ) -> ConfigEntriesResult<Self> {
        let entry = entries.get(entry_id).ok_or_else(|| {
            sonic_config_entries::ConfigEntriesError::NotFound(entry_id.to_string())
        })?;
        Ok(Self {
            validator,
            entries,
            reauth_entry: Some(entry),
        })
    }

    fn user_form(&self, errors: HashMap<String, String>) -> FlowResult {
        FlowResult::Form {
            step_id: STEP_USER.to_string(),
            data_schema: vec![FormField::text("username"), FormField::password("password")],
            errors,
        }
    }

    fn reauth_form(&self, errors: HashMap<String, String>) -> FlowResult {
        FlowResult::Form {
            step_id: STEP_REAUTH_CONFIRM.to_string(),
            data_schema: vec![FormField::password("password")],
            errors,
        }
    }

    /// Handle the initial step.
    ///
    /// Without input, shows the credentials form. With input, validates and
    /// persists: a new account creates an entry, a known account (same
    /// lower-cased username) updates the stored entry and reloads it.
    pub async fn step_user(&self, input: Option<UserInput>) -> FlowResult {
        let Some(input) = input else {
            return self.user_form(HashMap::new());
        };

        let account = match self
            .validator
            .validate(&input.username, &input.password)
            .await
        {
            Ok(account) => account,
            Err(error) => return self.user_form(base_error(error_code(&error))),
        };
        debug!(
            "Credentials validated, account property: {}",
            account.property_name
        );

        let credentials = Credentials::new(input.username, input.password);
        match self.entries.upsert(credentials).await {
            Ok((entry, true)) => {
                if let Err(error) = self.entries.reload(&entry.entry_id).await {
                    warn!(
                        "Reload after credential update failed for {}: {}",
                        entry.entry_id, error
                    );
                }
                FlowResult::Abort {
                    reason: ABORT_ALREADY_CONFIGURED.to_string(),
                }
            }
            Ok((entry, false)) => FlowResult::CreateEntry {
                title: entry.title.clone(),
                entry_id: entry.entry_id,
            },
            Err(error) => {
                warn!("Could not persist config entry: {}", error);
                self.user_form(base_error(ERROR_UNKNOWN))
            }
        }
    }

    /// Show the re-authentication form (password only)
    pub fn step_reauth(&self) -> FlowResult {
        match &self.reauth_entry {
            Some(_) => self.reauth_form(HashMap::new()),
            None => FlowResult::Abort {
                reason: "unknown_entry".to_string(),
            },
        }
    }

    /// Handle the re-authentication submission.
    ///
    /// The username is taken from the existing entry; only the password is
    /// collected again.
    pub async fn step_reauth_confirm(&self, password: Option<String>) -> FlowResult {
        let Some(entry) = &self.reauth_entry else {
            return FlowResult::Abort {
                reason: "unknown_entry".to_string(),
            };
        };
        let Some(password) = password else {
            return self.reauth_form(HashMap::new());
        };

        if let Err(error) = self
            .validator
            .validate(&entry.data.username, &password)
            .await
        {
            return self.reauth_form(base_error(error_code(&error)));
        }

        let credentials = Credentials::new(entry.data.username.clone(), password);
        let update = ConfigEntryUpdate::new()
            .data(credentials)
            .source(ConfigEntrySource::Reauth);
        match self.entries.update(&entry.entry_id, update).await {
            Ok(updated) => {
                if let Err(error) = self.entries.reload(&updated.entry_id).await {
                    warn!(
                        "Reload after re-authentication failed for {}: {}",
                        updated.entry_id, error
                    );
                }
                FlowResult::Abort {
                    reason: ABORT_REAUTH_SUCCESSFUL.to_string(),
                }
            }
            Err(error) => {
                warn!("Could not persist re-authenticated entry: {}", error);
                self.reauth_form(base_error(ERROR_UNKNOWN))
            }
        }
    }
}
