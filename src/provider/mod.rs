//! Provider root
//!
//! Owns the provider options, the shared client handle and the registry of
//! resources, data sources and ephemeral resources. The registry is built
//! up front so schemas and plan-time validation work before `configure`;
//! every handler reads the client from the shared [`ClientSlot`] filled in
//! by [`CephProvider::configure`].

pub mod data_sources;
pub mod ephemeral;
pub mod resources;

use crate::client::{CephClient, ClientConfig};
use crate::context::OpContext;
use crate::domain::{
    DataSourceAdapter, DataSourceHandler, DataSourceRef, EphemeralAdapter, EphemeralHandler, EphemeralResourceRef,
    ResourceAdapter, ResourceHandler, ResourceRef, Schema,
};
use crate::error::{ConfigError, Error, Result};
use parking_lot::RwLock;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Host-facing provider name; resource type names are prefixed with it
pub const PROVIDER_NAME: &str = "ceph";

// =============================================================================
// Configuration
// =============================================================================

/// Provider options
#[derive(Clone, Default, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct ProviderConfig {
    /// Single manager endpoint, e.g. `https://mgr-a:8443`
    #[serde(default)]
    pub endpoint: Option<String>,
    /// Additional endpoints, tried in order after `endpoint`
    #[serde(default)]
    pub endpoints: Vec<String>,
    /// Pre-issued bearer token
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    /// Accept self-signed dashboard certificates
    #[serde(default)]
    pub insecure_skip_verify: bool,
    /// Per-request timeout in seconds
    #[serde(default)]
    pub request_timeout_secs: Option<u64>,
    /// Task poll interval in milliseconds
    #[serde(default)]
    pub task_poll_interval_ms: Option<u64>,
}

impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("endpoints", &self.all_endpoints())
            .field("username", &self.username)
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("insecure_skip_verify", &self.insecure_skip_verify)
            .finish()
    }
}

impl ProviderConfig {
    pub fn from_yaml_str(text: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(text)?)
    }

    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&text)
    }

    /// `endpoint ++ endpoints`, blanks dropped
    pub fn all_endpoints(&self) -> Vec<String> {
        self.endpoint
            .iter()
            .chain(self.endpoints.iter())
            .map(|e| e.trim())
            .filter(|e| !e.is_empty())
            .map(str::to_string)
            .collect()
    }

    /// Translate into client options, checking the endpoint list
    pub fn client_config(&self) -> std::result::Result<ClientConfig, ConfigError> {
        let endpoints = self.all_endpoints();
        if endpoints.is_empty() {
            return Err(ConfigError::MissingEndpoint);
        }

        let mut config = ClientConfig {
            endpoints,
            username: self.username.clone(),
            password: self.password.clone(),
            token: self.token.clone(),
            insecure_skip_verify: self.insecure_skip_verify,
            ..Default::default()
        };
        if let Some(secs) = self.request_timeout_secs {
            config.request_timeout = Duration::from_secs(secs);
        }
        if let Some(ms) = self.task_poll_interval_ms {
            config.task_poll_interval = Duration::from_millis(ms);
        }
        Ok(config)
    }
}

// =============================================================================
// Client Injection
// =============================================================================

/// Client handle shared by every handler; empty until configured
#[derive(Clone, Default)]
pub struct ClientSlot(Arc<RwLock<Option<CephClient>>>);

impl ClientSlot {
    pub fn set(&self, client: CephClient) {
        *self.0.write() = Some(client);
    }

    pub fn get(&self) -> Result<CephClient> {
        self.0
            .read()
            .clone()
            .ok_or_else(|| ConfigError::NotConfigured.into())
    }

    pub fn is_configured(&self) -> bool {
        self.0.read().is_some()
    }
}

impl From<CephClient> for ClientSlot {
    fn from(client: CephClient) -> Self {
        let slot = ClientSlot::default();
        slot.set(client);
        slot
    }
}

// =============================================================================
// Provider
// =============================================================================

/// Schemas of everything the provider exposes
#[derive(Debug, Clone, Serialize)]
pub struct ProviderSchema {
    pub provider: Value,
    pub resources: BTreeMap<&'static str, Schema>,
    pub data_sources: BTreeMap<&'static str, Schema>,
    pub ephemeral_resources: BTreeMap<&'static str, Schema>,
}

/// The Ceph provider
pub struct CephProvider {
    client: ClientSlot,
    resources: BTreeMap<&'static str, ResourceRef>,
    data_sources: BTreeMap<&'static str, DataSourceRef>,
    ephemeral_resources: BTreeMap<&'static str, EphemeralResourceRef>,
}

impl Default for CephProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl CephProvider {
    pub fn new() -> Self {
        let client = ClientSlot::default();
        let mut provider = Self {
            client: client.clone(),
            resources: BTreeMap::new(),
            data_sources: BTreeMap::new(),
            ephemeral_resources: BTreeMap::new(),
        };

        provider.register_resource(resources::auth::AuthResource::new(client.clone()));
        provider.register_resource(resources::rgw_user::RgwUserResource::new(client.clone()));
        provider.register_resource(resources::rgw_subuser::RgwSubuserResource::new(client.clone()));
        provider.register_resource(resources::rgw_key::RgwS3KeyResource::new(client.clone()));
        provider.register_resource(resources::rgw_key::RgwSwiftKeyResource::new(client.clone()));
        provider.register_resource(resources::pool::PoolResource::new(client.clone()));
        provider.register_resource(resources::crush_rule::CrushRuleResource::new(client.clone()));
        provider.register_resource(resources::erasure_code_profile::ErasureCodeProfileResource::new(
            client.clone(),
        ));
        provider.register_resource(resources::mgr_module_config::MgrModuleConfigResource::new(
            client.clone(),
        ));
        provider.register_resource(resources::config_value::ConfigValueResource::new(client.clone()));

        provider.register_data_source(data_sources::AuthDataSource::new(client.clone()));
        provider.register_data_source(data_sources::RgwUserDataSource::new(client.clone()));
        provider.register_data_source(data_sources::PoolDataSource::new(client.clone()));
        provider.register_data_source(data_sources::CrushRuleDataSource::new(client.clone()));
        provider.register_data_source(data_sources::ErasureCodeProfileDataSource::new(client.clone()));
        provider.register_data_source(data_sources::MgrModuleConfigDataSource::new(client.clone()));
        provider.register_data_source(data_sources::ConfigValueDataSource::new(client.clone()));

        provider.register_ephemeral(ephemeral::AuthEphemeral::new(client));

        provider
    }

    fn register_resource<H: ResourceHandler>(&mut self, handler: H) {
        self.resources
            .insert(H::TYPE_NAME, Arc::new(ResourceAdapter(handler)));
    }

    fn register_data_source<H: DataSourceHandler>(&mut self, handler: H) {
        self.data_sources
            .insert(H::TYPE_NAME, Arc::new(DataSourceAdapter(handler)));
    }

    fn register_ephemeral<H: EphemeralHandler>(&mut self, handler: H) {
        self.ephemeral_resources
            .insert(H::TYPE_NAME, Arc::new(EphemeralAdapter(handler)));
    }

    /// Validate options, log in, and hand the client to every handler
    pub async fn configure(&self, ctx: &OpContext, config: ProviderConfig) -> Result<()> {
        let client_config = config.client_config()?;
        let client = CephClient::connect(ctx, client_config).await?;
        info!("Ceph provider configured against {}", client.endpoint());
        self.client.set(client);
        Ok(())
    }

    /// The configured client
    pub fn client(&self) -> Result<CephClient> {
        self.client.get()
    }

    pub fn resource(&self, type_name: &str) -> Result<ResourceRef> {
        self.resources
            .get(type_name)
            .cloned()
            .ok_or_else(|| unknown_type("resource", type_name))
    }

    pub fn data_source(&self, type_name: &str) -> Result<DataSourceRef> {
        self.data_sources
            .get(type_name)
            .cloned()
            .ok_or_else(|| unknown_type("data source", type_name))
    }

    pub fn ephemeral_resource(&self, type_name: &str) -> Result<EphemeralResourceRef> {
        self.ephemeral_resources
            .get(type_name)
            .cloned()
            .ok_or_else(|| unknown_type("ephemeral resource", type_name))
    }

    pub fn resource_types(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.resources.keys().copied()
    }

    pub fn data_source_types(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.data_sources.keys().copied()
    }

    pub fn ephemeral_resource_types(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.ephemeral_resources.keys().copied()
    }

    pub fn schema(&self) -> ProviderSchema {
        ProviderSchema {
            provider: serde_json::to_value(schemars::schema_for!(ProviderConfig)).unwrap_or(Value::Null),
            resources: self.resources.iter().map(|(k, r)| (*k, r.schema())).collect(),
            data_sources: self.data_sources.iter().map(|(k, d)| (*k, d.schema())).collect(),
            ephemeral_resources: self
                .ephemeral_resources
                .iter()
                .map(|(k, e)| (*k, e.schema()))
                .collect(),
        }
    }
}

fn unknown_type(kind: &str, name: &str) -> Error {
    ConfigError::UnknownType {
        kind: kind.to_string(),
        name: name.to_string(),
    }
    .into()
}
