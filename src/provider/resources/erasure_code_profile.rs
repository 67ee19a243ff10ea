//! `ceph_erasure_code_profile`: erasure-code profiles
//!
//! Profiles are immutable in Ceph once a pool uses them, and the dashboard
//! has no edit endpoint, so every attribute requires replacement.

use crate::ceph::ErasureCodeProfileInfo;
use crate::context::OpContext;
use crate::domain::{Attribute, AttributeType, DriftCheck, Nullable, ResourceHandler, Schema};
use crate::error::{Error, Result};
use crate::provider::resources::{found, require_non_empty};
use crate::provider::ClientSlot;
use async_trait::async_trait;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ErasureCodeProfileModel {
    pub name: String,
    /// Data chunks
    #[serde(default, skip_serializing_if = "Nullable::is_unset")]
    pub k: Nullable<u64>,
    /// Coding chunks
    #[serde(default, skip_serializing_if = "Nullable::is_unset")]
    pub m: Nullable<u64>,
    #[serde(default, skip_serializing_if = "Nullable::is_unset")]
    pub plugin: Nullable<String>,
    #[serde(default, skip_serializing_if = "Nullable::is_unset")]
    pub crush_failure_domain: Nullable<String>,
    #[serde(default, skip_serializing_if = "Nullable::is_unset")]
    pub crush_min_failure_domain: Nullable<String>,
    #[serde(default, skip_serializing_if = "Nullable::is_unset")]
    pub crush_osds_per_failure_domain: Nullable<u64>,
    #[serde(default, skip_serializing_if = "Nullable::is_unset")]
    pub packet_size: Nullable<u64>,
    #[serde(default, skip_serializing_if = "Nullable::is_unset")]
    pub technique: Nullable<String>,
    #[serde(default, skip_serializing_if = "Nullable::is_unset")]
    pub crush_root: Nullable<String>,
    #[serde(default, skip_serializing_if = "Nullable::is_unset")]
    pub crush_device_class: Nullable<String>,
    #[serde(default, skip_serializing_if = "Nullable::is_unset")]
    pub directory: Nullable<String>,
}

pub(crate) fn project(info: ErasureCodeProfileInfo) -> ErasureCodeProfileModel {
    ErasureCodeProfileModel {
        name: info.name,
        k: info.k.into(),
        m: info.m.into(),
        plugin: info.plugin.into(),
        crush_failure_domain: info.crush_failure_domain.into(),
        crush_min_failure_domain: info.crush_min_failure_domain.into(),
        crush_osds_per_failure_domain: info.crush_osds_per_failure_domain.into(),
        packet_size: info.packet_size.into(),
        technique: info.technique.into(),
        crush_root: info.crush_root.into(),
        crush_device_class: info.crush_device_class.into(),
        directory: info.directory.into(),
    }
}

fn to_wire(plan: &ErasureCodeProfileModel) -> ErasureCodeProfileInfo {
    ErasureCodeProfileInfo {
        name: plan.name.clone(),
        k: plan.k.cloned_option(),
        m: plan.m.cloned_option(),
        plugin: plan.plugin.cloned_option(),
        crush_failure_domain: plan.crush_failure_domain.cloned_option(),
        crush_min_failure_domain: plan.crush_min_failure_domain.cloned_option(),
        crush_osds_per_failure_domain: plan.crush_osds_per_failure_domain.cloned_option(),
        packet_size: plan.packet_size.cloned_option(),
        technique: plan.technique.cloned_option(),
        crush_root: plan.crush_root.cloned_option(),
        crush_device_class: plan.crush_device_class.cloned_option(),
        directory: plan.directory.cloned_option(),
    }
}

pub(crate) fn erasure_code_profile_attributes(schema: Schema) -> Schema {
    let replace = |name, ty| Attribute::optional_computed(name, ty).requires_replace();
    schema
        .attribute(Attribute::required("name", AttributeType::String).requires_replace())
        .attribute(replace("k", AttributeType::Int))
        .attribute(replace("m", AttributeType::Int))
        .attribute(replace("plugin", AttributeType::String))
        .attribute(replace("crush_failure_domain", AttributeType::String))
        .attribute(replace("crush_min_failure_domain", AttributeType::String))
        .attribute(replace("crush_osds_per_failure_domain", AttributeType::Int))
        .attribute(replace("packet_size", AttributeType::Int))
        .attribute(replace("technique", AttributeType::String))
        .attribute(replace("crush_root", AttributeType::String))
        .attribute(replace("crush_device_class", AttributeType::String))
        .attribute(replace("directory", AttributeType::String))
}

pub struct ErasureCodeProfileResource {
    client: ClientSlot,
}

impl ErasureCodeProfileResource {
    pub fn new(client: ClientSlot) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ResourceHandler for ErasureCodeProfileResource {
    type Model = ErasureCodeProfileModel;

    const TYPE_NAME: &'static str = "ceph_erasure_code_profile";

    fn schema() -> Schema {
        erasure_code_profile_attributes(Schema::for_model::<ErasureCodeProfileModel>("An erasure-code profile"))
    }

    fn id(model: &ErasureCodeProfileModel) -> String {
        model.name.clone()
    }

    fn validate(model: &ErasureCodeProfileModel) -> Result<()> {
        require_non_empty("name", &model.name)?;
        for (attribute, value) in [("k", &model.k), ("m", &model.m)] {
            if value.value() == Some(&0) {
                return Err(Error::InvalidAttribute {
                    attribute: attribute.into(),
                    reason: "must be at least 1".into(),
                });
            }
        }
        Ok(())
    }

    async fn create(&self, ctx: &OpContext, plan: ErasureCodeProfileModel) -> Result<ErasureCodeProfileModel> {
        self.client
            .get()?
            .erasure_code_profiles()
            .create(ctx, &to_wire(&plan))
            .await?;
        Ok(plan)
    }

    async fn read(&self, ctx: &OpContext, state: ErasureCodeProfileModel) -> Result<Option<ErasureCodeProfileModel>> {
        let info = found(self.client.get()?.erasure_code_profiles().get(ctx, &state.name).await)?;
        Ok(info.map(project))
    }

    /// Every attribute requires replacement; nothing to send
    async fn update(
        &self,
        _ctx: &OpContext,
        _prior: ErasureCodeProfileModel,
        plan: ErasureCodeProfileModel,
    ) -> Result<ErasureCodeProfileModel> {
        Ok(plan)
    }

    async fn delete(&self, ctx: &OpContext, state: ErasureCodeProfileModel) -> Result<()> {
        self.client
            .get()?
            .erasure_code_profiles()
            .delete(ctx, &state.name)
            .await
    }

    async fn import(&self, ctx: &OpContext, id: &str) -> Result<ErasureCodeProfileModel> {
        Ok(project(self.client.get()?.erasure_code_profiles().get(ctx, id).await?))
    }

    fn verify(plan: &ErasureCodeProfileModel, observed: &ErasureCodeProfileModel) -> Result<()> {
        DriftCheck::new(Self::TYPE_NAME, &plan.name)
            .nullable("k", &plan.k, &observed.k)
            .nullable("m", &plan.m, &observed.m)
            .nullable("plugin", &plan.plugin, &observed.plugin)
            .nullable("crush_failure_domain", &plan.crush_failure_domain, &observed.crush_failure_domain)
            .nullable(
                "crush_min_failure_domain",
                &plan.crush_min_failure_domain,
                &observed.crush_min_failure_domain,
            )
            .nullable(
                "crush_osds_per_failure_domain",
                &plan.crush_osds_per_failure_domain,
                &observed.crush_osds_per_failure_domain,
            )
            .nullable("packet_size", &plan.packet_size, &observed.packet_size)
            .nullable("technique", &plan.technique, &observed.technique)
            .nullable("crush_root", &plan.crush_root, &observed.crush_root)
            .nullable("crush_device_class", &plan.crush_device_class, &observed.crush_device_class)
            .nullable("directory", &plan.directory, &observed.directory)
            .finish()
    }
}
