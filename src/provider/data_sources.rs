//! Read-only lookups
//!
//! Each data source takes the natural key of an object and returns the same
//! projection the matching resource stores in state. Missing objects are
//! errors here, not empty results.

use crate::context::OpContext;
use crate::domain::{Attribute, AttributeType, DataSourceHandler, Schema};
use crate::error::Result;
use crate::provider::resources::auth::{self, AuthModel};
use crate::provider::resources::config_value::{self, ConfigValueModel};
use crate::provider::resources::crush_rule::{self, CrushRuleModel};
use crate::provider::resources::erasure_code_profile::{self, ErasureCodeProfileModel};
use crate::provider::resources::mgr_module_config::MgrModuleConfigModel;
use crate::provider::resources::pool::{self, PoolModel};
use crate::provider::resources::require_non_empty;
use crate::provider::resources::rgw_user::{self, RgwUserModel};
use crate::provider::ClientSlot;
use async_trait::async_trait;
use schemars::JsonSchema;
use serde::Deserialize;

/// Schema of a lookup: the key attributes are required, the rest computed
fn lookup_schema<M: JsonSchema>(
    description: &'static str,
    keys: &[&'static str],
    computed: &[(&'static str, AttributeType)],
) -> Schema {
    let schema = keys.iter().fold(Schema::for_model::<M>(description), |schema, &key| {
        schema.attribute(Attribute::required(key, AttributeType::String))
    });
    computed.iter().fold(schema, |schema, &(name, ty)| {
        schema.attribute(Attribute::computed(name, ty))
    })
}

/// Lookup by `name`
#[derive(Debug, Clone, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct NameLookup {
    pub name: String,
}

// =============================================================================
// ceph_auth
// =============================================================================

#[derive(Debug, Clone, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct AuthLookup {
    pub entity: String,
}

pub struct AuthDataSource {
    client: ClientSlot,
}

impl AuthDataSource {
    pub fn new(client: ClientSlot) -> Self {
        Self { client }
    }
}

#[async_trait]
impl DataSourceHandler for AuthDataSource {
    type Config = AuthLookup;
    type Model = AuthModel;

    const TYPE_NAME: &'static str = "ceph_auth";

    fn schema() -> Schema {
        Schema::for_model::<AuthModel>("Look up a cephx auth principal")
            .attribute(Attribute::required("entity", AttributeType::String))
            .attribute(Attribute::computed("caps", AttributeType::StringMap))
            .attribute(Attribute::computed("key", AttributeType::String).sensitive())
            .attribute(Attribute::computed("keyring", AttributeType::String).sensitive())
    }

    fn validate(config: &AuthLookup) -> Result<()> {
        auth::validate_entity(&config.entity)
    }

    async fn read(&self, ctx: &OpContext, config: AuthLookup) -> Result<AuthModel> {
        let (entry, keyring) = self.client.get()?.cluster_users().get(ctx, &config.entity).await?;
        Ok(auth::project(entry, keyring))
    }
}

// =============================================================================
// ceph_rgw_user
// =============================================================================

#[derive(Debug, Clone, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct RgwUserLookup {
    pub uid: String,
}

pub struct RgwUserDataSource {
    client: ClientSlot,
}

impl RgwUserDataSource {
    pub fn new(client: ClientSlot) -> Self {
        Self { client }
    }
}

#[async_trait]
impl DataSourceHandler for RgwUserDataSource {
    type Config = RgwUserLookup;
    type Model = RgwUserModel;

    const TYPE_NAME: &'static str = "ceph_rgw_user";

    fn schema() -> Schema {
        lookup_schema::<RgwUserModel>(
            "Look up a RADOS Gateway user",
            &["uid"],
            &[
                ("user_id", AttributeType::String),
                ("display_name", AttributeType::String),
                ("email", AttributeType::String),
                ("max_buckets", AttributeType::Int),
                ("system", AttributeType::Bool),
                ("suspended", AttributeType::Bool),
                ("tenant", AttributeType::String),
                ("admin", AttributeType::Bool),
            ],
        )
    }

    fn validate(config: &RgwUserLookup) -> Result<()> {
        rgw_user::validate_uid(&config.uid)
    }

    async fn read(&self, ctx: &OpContext, config: RgwUserLookup) -> Result<RgwUserModel> {
        let user = self.client.get()?.rgw_users().get(ctx, &config.uid).await?;
        Ok(rgw_user::project(user))
    }
}

// =============================================================================
// ceph_pool
// =============================================================================

pub struct PoolDataSource {
    client: ClientSlot,
}

impl PoolDataSource {
    pub fn new(client: ClientSlot) -> Self {
        Self { client }
    }
}

#[async_trait]
impl DataSourceHandler for PoolDataSource {
    type Config = NameLookup;
    type Model = PoolModel;

    const TYPE_NAME: &'static str = "ceph_pool";

    fn schema() -> Schema {
        lookup_schema::<PoolModel>(
            "Look up a RADOS pool",
            &["name"],
            &[
                ("pool_type", AttributeType::String),
                ("size", AttributeType::Int),
                ("min_size", AttributeType::Int),
                ("pg_num", AttributeType::Int),
                ("crush_rule", AttributeType::String),
                ("primary_affinity", AttributeType::Float),
                ("application_metadata", AttributeType::StringList),
                ("erasure_code_profile", AttributeType::String),
                ("autoscale_mode", AttributeType::String),
                ("quota_max_objects", AttributeType::Int),
                ("quota_max_bytes", AttributeType::Int),
                ("compression", AttributeType::Object),
            ],
        )
    }

    fn validate(config: &NameLookup) -> Result<()> {
        require_non_empty("name", &config.name)
    }

    async fn read(&self, ctx: &OpContext, config: NameLookup) -> Result<PoolModel> {
        let info = self.client.get()?.pools().get(ctx, &config.name).await?;
        Ok(pool::project(info))
    }
}

// =============================================================================
// ceph_crush_rule
// =============================================================================

pub struct CrushRuleDataSource {
    client: ClientSlot,
}

impl CrushRuleDataSource {
    pub fn new(client: ClientSlot) -> Self {
        Self { client }
    }
}

#[async_trait]
impl DataSourceHandler for CrushRuleDataSource {
    type Config = NameLookup;
    type Model = CrushRuleModel;

    const TYPE_NAME: &'static str = "ceph_crush_rule";

    fn schema() -> Schema {
        lookup_schema::<CrushRuleModel>(
            "Look up a CRUSH rule",
            &["name"],
            &[
                ("root", AttributeType::String),
                ("failure_domain", AttributeType::String),
                ("device_class", AttributeType::String),
                ("rule_id", AttributeType::Int),
                ("type", AttributeType::Int),
                ("steps", AttributeType::ObjectList),
            ],
        )
    }

    fn validate(config: &NameLookup) -> Result<()> {
        require_non_empty("name", &config.name)
    }

    async fn read(&self, ctx: &OpContext, config: NameLookup) -> Result<CrushRuleModel> {
        crush_rule::project(self.client.get()?.crush_rules().get(ctx, &config.name).await?)
    }
}

// =============================================================================
// ceph_erasure_code_profile
// =============================================================================

pub struct ErasureCodeProfileDataSource {
    client: ClientSlot,
}

impl ErasureCodeProfileDataSource {
    pub fn new(client: ClientSlot) -> Self {
        Self { client }
    }
}

#[async_trait]
impl DataSourceHandler for ErasureCodeProfileDataSource {
    type Config = NameLookup;
    type Model = ErasureCodeProfileModel;

    const TYPE_NAME: &'static str = "ceph_erasure_code_profile";

    fn schema() -> Schema {
        lookup_schema::<ErasureCodeProfileModel>(
            "Look up an erasure-code profile",
            &["name"],
            &[
                ("k", AttributeType::Int),
                ("m", AttributeType::Int),
                ("plugin", AttributeType::String),
                ("crush_failure_domain", AttributeType::String),
                ("crush_min_failure_domain", AttributeType::String),
                ("crush_osds_per_failure_domain", AttributeType::Int),
                ("packet_size", AttributeType::Int),
                ("technique", AttributeType::String),
                ("crush_root", AttributeType::String),
                ("crush_device_class", AttributeType::String),
                ("directory", AttributeType::String),
            ],
        )
    }

    fn validate(config: &NameLookup) -> Result<()> {
        require_non_empty("name", &config.name)
    }

    async fn read(&self, ctx: &OpContext, config: NameLookup) -> Result<ErasureCodeProfileModel> {
        let info = self
            .client
            .get()?
            .erasure_code_profiles()
            .get(ctx, &config.name)
            .await?;
        Ok(erasure_code_profile::project(info))
    }
}

// =============================================================================
// ceph_mgr_module_config
// =============================================================================

#[derive(Debug, Clone, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct MgrModuleLookup {
    pub module_name: String,
}

/// Effective configuration of a module, defaults included
pub struct MgrModuleConfigDataSource {
    client: ClientSlot,
}

impl MgrModuleConfigDataSource {
    pub fn new(client: ClientSlot) -> Self {
        Self { client }
    }
}

#[async_trait]
impl DataSourceHandler for MgrModuleConfigDataSource {
    type Config = MgrModuleLookup;
    type Model = MgrModuleConfigModel;

    const TYPE_NAME: &'static str = "ceph_mgr_module_config";

    fn schema() -> Schema {
        lookup_schema::<MgrModuleConfigModel>(
            "Read every option of a manager module as strings",
            &["module_name"],
            &[("configs", AttributeType::StringMap)],
        )
    }

    fn validate(config: &MgrModuleLookup) -> Result<()> {
        require_non_empty("module_name", &config.module_name)
    }

    async fn read(&self, ctx: &OpContext, config: MgrModuleLookup) -> Result<MgrModuleConfigModel> {
        let configs = self
            .client
            .get()?
            .mgr_modules()
            .config(ctx, &config.module_name)
            .await?;
        Ok(MgrModuleConfigModel {
            module_name: config.module_name,
            configs,
        })
    }
}

// =============================================================================
// ceph_config_value
// =============================================================================

#[derive(Debug, Clone, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct ConfigValueLookup {
    pub section: String,
    pub name: String,
}

pub struct ConfigValueDataSource {
    client: ClientSlot,
}

impl ConfigValueDataSource {
    pub fn new(client: ClientSlot) -> Self {
        Self { client }
    }
}

#[async_trait]
impl DataSourceHandler for ConfigValueDataSource {
    type Config = ConfigValueLookup;
    type Model = ConfigValueModel;

    const TYPE_NAME: &'static str = "ceph_config_value";

    fn schema() -> Schema {
        lookup_schema::<ConfigValueModel>(
            "Read one configuration value",
            &["section", "name"],
            &[("value", AttributeType::String)],
        )
    }

    fn validate(config: &ConfigValueLookup) -> Result<()> {
        config_value::validate_target(&config.section, &config.name)
    }

    async fn read(&self, ctx: &OpContext, config: ConfigValueLookup) -> Result<ConfigValueModel> {
        let value = self
            .client
            .get()?
            .cluster_config()
            .value(ctx, &config.section, &config.name)
            .await?;
        Ok(ConfigValueModel {
            section: config.section,
            name: config.name,
            value,
        })
    }
}
