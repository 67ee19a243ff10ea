//! `ceph_config_value`: one option value in one configuration section
//!
//! Sections are Ceph scopes (`global`, `mon`, `osd.0`, `osd/class:ssd`).
//! The `mgr/` namespace belongs to `ceph_mgr_module_config` and is refused
//! here. Imported as `<section>/<name>`.

use crate::context::OpContext;
use crate::domain::{keep_numeric_spelling, Attribute, AttributeType, DriftCheck, ResourceHandler, Schema};
use crate::error::{Error, Result};
use crate::provider::resources::{found, require_non_empty};
use crate::provider::ClientSlot;
use async_trait::async_trait;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

const MGR_NAMESPACE: &str = "mgr/";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ConfigValueModel {
    pub section: String,
    pub name: String,
    pub value: String,
}

/// Reject `mgr/` scoped sections and option names
pub(crate) fn validate_target(section: &str, name: &str) -> Result<()> {
    require_non_empty("section", section)?;
    require_non_empty("name", name)?;
    for (attribute, value) in [("section", section), ("name", name)] {
        if value.starts_with(MGR_NAMESPACE) {
            return Err(Error::InvalidAttribute {
                attribute: attribute.into(),
                reason: format!(
                    "{:?} is in the manager module namespace; use ceph_mgr_module_config",
                    value
                ),
            });
        }
    }
    Ok(())
}

/// Split `<section>/<name>`; sections may themselves contain `/`
pub(crate) fn parse_import_id(id: &str) -> Result<(String, String)> {
    match id.rsplit_once('/') {
        Some((section, name)) if !section.is_empty() && !name.is_empty() => {
            Ok((section.to_string(), name.to_string()))
        }
        _ => Err(Error::InvalidId {
            id: id.to_string(),
            reason: "expected <section>/<name>".into(),
        }),
    }
}

pub struct ConfigValueResource {
    client: ClientSlot,
}

impl ConfigValueResource {
    pub fn new(client: ClientSlot) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ResourceHandler for ConfigValueResource {
    type Model = ConfigValueModel;

    const TYPE_NAME: &'static str = "ceph_config_value";

    fn schema() -> Schema {
        Schema::for_model::<ConfigValueModel>("A cluster configuration value in one section")
            .attribute(Attribute::required("section", AttributeType::String).requires_replace())
            .attribute(Attribute::required("name", AttributeType::String).requires_replace())
            .attribute(Attribute::required("value", AttributeType::String))
    }

    fn id(model: &ConfigValueModel) -> String {
        format!("{}/{}", model.section, model.name)
    }

    fn validate(model: &ConfigValueModel) -> Result<()> {
        validate_target(&model.section, &model.name)
    }

    async fn create(&self, ctx: &OpContext, plan: ConfigValueModel) -> Result<ConfigValueModel> {
        self.client
            .get()?
            .cluster_config()
            .set(ctx, &plan.section, &plan.name, &plan.value)
            .await?;
        Ok(plan)
    }

    async fn read(&self, ctx: &OpContext, state: ConfigValueModel) -> Result<Option<ConfigValueModel>> {
        let value = found(
            self.client
                .get()?
                .cluster_config()
                .value(ctx, &state.section, &state.name)
                .await,
        )?;
        Ok(value.map(|value| {
            let observed = ConfigValueModel { value, ..state.clone() };
            Self::finalize(&state, observed)
        }))
    }

    async fn update(&self, ctx: &OpContext, _prior: ConfigValueModel, plan: ConfigValueModel) -> Result<ConfigValueModel> {
        self.create(ctx, plan).await
    }

    async fn delete(&self, ctx: &OpContext, state: ConfigValueModel) -> Result<()> {
        self.client
            .get()?
            .cluster_config()
            .delete(ctx, &state.section, &state.name)
            .await
    }

    async fn import(&self, ctx: &OpContext, id: &str) -> Result<ConfigValueModel> {
        let (section, name) = parse_import_id(id)?;
        validate_target(&section, &name)?;
        let value = self.client.get()?.cluster_config().value(ctx, &section, &name).await?;
        Ok(ConfigValueModel { section, name, value })
    }

    fn verify(plan: &ConfigValueModel, observed: &ConfigValueModel) -> Result<()> {
        DriftCheck::new(Self::TYPE_NAME, Self::id(plan))
            .numeric_str("value", &plan.value, &observed.value)
            .finish()
    }

    fn finalize(plan: &ConfigValueModel, mut observed: ConfigValueModel) -> ConfigValueModel {
        keep_numeric_spelling(&plan.value, &mut observed.value);
        observed
    }
}
