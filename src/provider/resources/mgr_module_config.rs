//! `ceph_mgr_module_config`: options of one manager module
//!
//! All values are strings. Reads come from the cluster configuration dump
//! (`mgr/<module>/<option>` in section `mgr`) so only explicitly set options
//! are seen, and only the options this resource manages are reported back.

use crate::ceph::cluster_conf::{module_option_name, MGR_SECTION};
use crate::client::CephClient;
use crate::context::OpContext;
use crate::domain::{keep_numeric_spelling, Attribute, AttributeType, DriftCheck, ResourceHandler, Schema};
use crate::error::{Error, Result};
use crate::provider::resources::require_non_empty;
use crate::provider::ClientSlot;
use async_trait::async_trait;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct MgrModuleConfigModel {
    pub module_name: String,
    /// Option name to value, e.g. `jwt_token_ttl = "31556952"`
    pub configs: BTreeMap<String, String>,
}

pub struct MgrModuleConfigResource {
    client: ClientSlot,
}

impl MgrModuleConfigResource {
    pub fn new(client: ClientSlot) -> Self {
        Self { client }
    }
}

/// Remove one option; an option that is already gone is fine
async fn remove_option(client: &CephClient, ctx: &OpContext, module: &str, option: &str) -> Result<()> {
    let name = module_option_name(module, option);
    match client.cluster_config().delete(ctx, MGR_SECTION, &name).await {
        Err(e) if e.is_not_found() => {
            debug!("{} already unset", name);
            Ok(())
        }
        other => other,
    }
}

#[async_trait]
impl ResourceHandler for MgrModuleConfigResource {
    type Model = MgrModuleConfigModel;

    const TYPE_NAME: &'static str = "ceph_mgr_module_config";

    fn schema() -> Schema {
        Schema::for_model::<MgrModuleConfigModel>("Configuration options of a manager module")
            .attribute(Attribute::required("module_name", AttributeType::String).requires_replace())
            .attribute(
                Attribute::required("configs", AttributeType::StringMap)
                    .describe("Option values as strings; the manager coerces them to each option's type"),
            )
    }

    fn id(model: &MgrModuleConfigModel) -> String {
        model.module_name.clone()
    }

    fn validate(model: &MgrModuleConfigModel) -> Result<()> {
        require_non_empty("module_name", &model.module_name)?;
        if model.module_name.contains('/') {
            return Err(Error::InvalidId {
                id: model.module_name.clone(),
                reason: "module name must not contain '/'".into(),
            });
        }
        if model.configs.is_empty() {
            return Err(Error::InvalidAttribute {
                attribute: "configs".into(),
                reason: "at least one option must be set".into(),
            });
        }
        for option in model.configs.keys() {
            require_non_empty("configs", option)?;
        }
        Ok(())
    }

    async fn create(&self, ctx: &OpContext, plan: MgrModuleConfigModel) -> Result<MgrModuleConfigModel> {
        self.client
            .get()?
            .mgr_modules()
            .set_config(ctx, &plan.module_name, &plan.configs)
            .await?;
        Ok(plan)
    }

    async fn read(&self, ctx: &OpContext, state: MgrModuleConfigModel) -> Result<Option<MgrModuleConfigModel>> {
        let mut set = self
            .client
            .get()?
            .cluster_config()
            .module_options(ctx, &state.module_name)
            .await?;
        set.retain(|option, _| state.configs.contains_key(option));
        if set.is_empty() {
            return Ok(None);
        }
        let observed = MgrModuleConfigModel {
            module_name: state.module_name.clone(),
            configs: set,
        };
        Ok(Some(Self::finalize(&state, observed)))
    }

    async fn update(
        &self,
        ctx: &OpContext,
        prior: MgrModuleConfigModel,
        plan: MgrModuleConfigModel,
    ) -> Result<MgrModuleConfigModel> {
        let client = self.client.get()?;
        client
            .mgr_modules()
            .set_config(ctx, &plan.module_name, &plan.configs)
            .await?;
        for option in prior.configs.keys().filter(|k| !plan.configs.contains_key(*k)) {
            remove_option(&client, ctx, &plan.module_name, option).await?;
        }
        Ok(plan)
    }

    async fn delete(&self, ctx: &OpContext, state: MgrModuleConfigModel) -> Result<()> {
        let client = self.client.get()?;
        for option in state.configs.keys() {
            remove_option(&client, ctx, &state.module_name, option).await?;
        }
        Ok(())
    }

    async fn import(&self, ctx: &OpContext, id: &str) -> Result<MgrModuleConfigModel> {
        let configs = self.client.get()?.cluster_config().module_options(ctx, id).await?;
        if configs.is_empty() {
            return Err(Error::not_found("mgr module config", id));
        }
        Ok(MgrModuleConfigModel {
            module_name: id.to_string(),
            configs,
        })
    }

    fn verify(plan: &MgrModuleConfigModel, observed: &MgrModuleConfigModel) -> Result<()> {
        let mut check = DriftCheck::new(Self::TYPE_NAME, &plan.module_name);
        for (option, want) in &plan.configs {
            let got = observed.configs.get(option).map(String::as_str).unwrap_or_default();
            check.numeric_str(&format!("configs.{}", option), want, got);
        }
        check.finish()
    }

    /// Keep the declared spelling of numerically equal values
    fn finalize(plan: &MgrModuleConfigModel, mut observed: MgrModuleConfigModel) -> MgrModuleConfigModel {
        for (option, value) in observed.configs.iter_mut() {
            if let Some(want) = plan.configs.get(option) {
                keep_numeric_spelling(want, value);
            }
        }
        observed
    }
}
