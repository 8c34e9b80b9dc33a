//! AWS Systems Manager Parameter Store client.
//!
//! Credentials and region come from the standard `aws-config` provider
//! chain, which inside Lambda resolves to the function's execution role.

use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_ssm::Client;
use aws_sdk_ssm::error::DisplayErrorContext;
use tracing::debug;

use super::ParameterStore;
use crate::{ExtensionError, Result};

/// [`ParameterStore`] backed by SSM `GetParameter`.
#[derive(Clone)]
pub struct SsmParameterStore {
    client: Client,
    with_decryption: bool,
}

impl SsmParameterStore {
    /// Build a client from the environment's default AWS configuration.
    pub async fn from_env() -> Self {
        let sdk_config = aws_config::defaults(BehaviorVersion::latest()).load().await;
        Self::new(Client::new(&sdk_config))
    }

    /// Wrap an existing SSM client.
    pub fn new(client: Client) -> Self {
        Self {
            client,
            with_decryption: false,
        }
    }

    /// Request decryption of `SecureString` parameters.
    pub fn with_decryption(mut self, enabled: bool) -> Self {
        self.with_decryption = enabled;
        self
    }
}

#[async_trait]
impl ParameterStore for SsmParameterStore {
    fn name(&self) -> &str {
        "ssm"
    }

    async fn get_parameter(&self, name: &str) -> Result<String> {
        debug!(parameter = name, "calling ssm GetParameter");
        let output = self
            .client
            .get_parameter()
            .name(name)
            .with_decryption(self.with_decryption)
            .send()
            .await
            .map_err(|e| ExtensionError::RemoteFetch(DisplayErrorContext(&e).to_string()))?;

        output
            .parameter()
            .and_then(|p| p.value())
            .map(str::to_string)
            .ok_or_else(|| ExtensionError::RemoteFetch(format!("parameter {name} has no value")))
    }
}
