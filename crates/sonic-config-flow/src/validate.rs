//! Credential validation against the cloud

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, error};

use sonic_cloud::{CloudApi, CloudError, CloudResult};

/// What a successful validation learned about the account
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedAccount {
    /// Name of the account's first property
    pub property_name: String,
}

/// Capability interface for validating a credential pair
#[async_trait]
pub trait LoginValidator: Send + Sync {
    async fn validate(&self, username: &str, password: &str) -> CloudResult<ValidatedAccount>;
}

/// Validates credentials by logging in and looking up the account's property
pub struct CloudLoginValidator {
    client: Arc<dyn CloudApi>,
}

impl CloudLoginValidator {
    pub fn new(client: Arc<dyn CloudApi>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl LoginValidator for CloudLoginValidator {
    async fn validate(&self, username: &str, password: &str) -> CloudResult<ValidatedAccount> {
        if let Err(err) = self.client.login(username, password).await {
            error!("Error connecting to the Sonic API: {}", err);
            return Err(err);
        }

        // Confirms the account actually has a property to read devices from
        let property = self.client.property_details().await?;
        debug!("Validated account with access to property {}", property.name);

        Ok(ValidatedAccount {
            property_name: property.name,
        })
    }
}

// Convenience for tests that only need a canned outcome
#[cfg(test)]
pub(crate) struct StaticValidator(pub(crate) CloudResult<ValidatedAccount>);

#[cfg(test)]
#[async_trait]
impl LoginValidator for StaticValidator {
    async fn validate(&self, _username: &str, _password: &str) -> CloudResult<ValidatedAccount> {
        self.0.clone()
    }
}
