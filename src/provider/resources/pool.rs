//! `ceph_pool`: RADOS pools
//!
//! Pool type and erasure-code profile are fixed at creation. While the
//! autoscaler is on it owns `pg_num`: writes do not verify it and refreshes
//! keep the value from state. A quota set to null is removed (Ceph stores
//! "no quota" as `0`).

use crate::ceph::{PoolInfo, PoolSpec};
use crate::context::OpContext;
use crate::domain::{Attribute, AttributeType, DriftCheck, Nullable, ResourceHandler, Schema};
use crate::error::{Error, Result};
use crate::provider::resources::{found, one_of, require_non_empty};
use crate::provider::ClientSlot;
use async_trait::async_trait;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

const POOL_TYPES: &[&str] = &["replicated", "erasure"];
const AUTOSCALE_MODES: &[&str] = &["on", "off", "warn"];
const COMPRESSION_MODES: &[&str] = &["none", "passive", "aggressive", "force"];
const COMPRESSION_ALGORITHMS: &[&str] = &["snappy", "zlib", "zstd", "lz4"];

// =============================================================================
// Model
// =============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct PoolModel {
    pub name: String,
    /// `replicated` or `erasure`
    #[serde(default, skip_serializing_if = "Nullable::is_unset")]
    pub pool_type: Nullable<String>,
    #[serde(default, skip_serializing_if = "Nullable::is_unset")]
    pub size: Nullable<u32>,
    #[serde(default, skip_serializing_if = "Nullable::is_unset")]
    pub min_size: Nullable<u32>,
    #[serde(default, skip_serializing_if = "Nullable::is_unset")]
    pub pg_num: Nullable<u32>,
    #[serde(default, skip_serializing_if = "Nullable::is_unset")]
    pub crush_rule: Nullable<String>,
    #[serde(default, skip_serializing_if = "Nullable::is_unset")]
    pub primary_affinity: Nullable<f64>,
    /// Enabled applications (`rbd`, `rgw`, `cephfs`, ...)
    #[serde(default, skip_serializing_if = "Nullable::is_unset")]
    pub application_metadata: Nullable<Vec<String>>,
    #[serde(default, skip_serializing_if = "Nullable::is_unset")]
    pub erasure_code_profile: Nullable<String>,
    /// `on`, `off` or `warn`
    #[serde(default, skip_serializing_if = "Nullable::is_unset")]
    pub autoscale_mode: Nullable<String>,
    #[serde(default, skip_serializing_if = "Nullable::is_unset")]
    pub quota_max_objects: Nullable<u64>,
    #[serde(default, skip_serializing_if = "Nullable::is_unset")]
    pub quota_max_bytes: Nullable<u64>,
    #[serde(default, skip_serializing_if = "Nullable::is_unset")]
    pub compression: Nullable<PoolCompressionModel>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct PoolCompressionModel {
    #[serde(default, skip_serializing_if = "Nullable::is_unset")]
    pub mode: Nullable<String>,
    #[serde(default, skip_serializing_if = "Nullable::is_unset")]
    pub algorithm: Nullable<String>,
    #[serde(default, skip_serializing_if = "Nullable::is_unset")]
    pub required_ratio: Nullable<f64>,
    #[serde(default, skip_serializing_if = "Nullable::is_unset")]
    pub min_blob_size: Nullable<u64>,
    #[serde(default, skip_serializing_if = "Nullable::is_unset")]
    pub max_blob_size: Nullable<u64>,
}

fn narrow(value: Option<u64>) -> Nullable<u32> {
    value.and_then(|v| u32::try_from(v).ok()).into()
}

const NO_QUOTA: u64 = 0;

fn sorted(mut apps: Vec<String>) -> Vec<String> {
    apps.sort();
    apps.dedup();
    apps
}

pub(crate) fn project(info: PoolInfo) -> PoolModel {
    let compression = info.compression();
    let compression = if compression == Default::default() {
        Nullable::Null
    } else {
        Nullable::Value(PoolCompressionModel {
            mode: compression.mode.into(),
            algorithm: compression.algorithm.into(),
            required_ratio: compression.required_ratio.into(),
            min_blob_size: compression.min_blob_size.into(),
            max_blob_size: compression.max_blob_size.into(),
        })
    };

    PoolModel {
        name: info.pool_name,
        pool_type: info.pool_type.into(),
        size: narrow(info.size),
        min_size: narrow(info.min_size),
        pg_num: narrow(info.pg_num),
        crush_rule: info.crush_rule.into(),
        primary_affinity: info.primary_affinity.into(),
        application_metadata: Nullable::Value(sorted(info.application_metadata)),
        erasure_code_profile: info.erasure_code_profile.filter(|p| !p.is_empty()).into(),
        autoscale_mode: info.pg_autoscale_mode.into(),
        quota_max_objects: info.quota_max_objects.into(),
        quota_max_bytes: info.quota_max_bytes.into(),
        compression,
    }
}

/// Build the create / edit body; immutable fields are only sent on create
fn to_spec(plan: &PoolModel, include_immutable: bool) -> PoolSpec {
    let compression = plan.compression.value().cloned().unwrap_or_default();
    let mut spec = PoolSpec {
        pool: plan.name.clone(),
        pg_num: plan.pg_num.cloned_option().map(u64::from),
        size: plan.size.cloned_option().map(u64::from),
        min_size: plan.min_size.cloned_option().map(u64::from),
        rule_name: plan.crush_rule.cloned_option(),
        pg_autoscale_mode: plan.autoscale_mode.cloned_option(),
        primary_affinity: plan.primary_affinity.cloned_option(),
        application_metadata: plan.application_metadata.cloned_option(),
        quota_max_bytes: plan.quota_max_bytes.cloned_or_clear(NO_QUOTA),
        quota_max_objects: plan.quota_max_objects.cloned_or_clear(NO_QUOTA),
        compression_mode: compression.mode.cloned_option(),
        compression_algorithm: compression.algorithm.cloned_option(),
        compression_required_ratio: compression.required_ratio.cloned_option(),
        compression_min_blob_size: compression.min_blob_size.cloned_option(),
        compression_max_blob_size: compression.max_blob_size.cloned_option(),
        ..Default::default()
    };
    if include_immutable {
        spec.pool_type = Some(
            plan.pool_type
                .cloned_option()
                .unwrap_or_else(|| "replicated".to_string()),
        );
        spec.erasure_code_profile = plan.erasure_code_profile.cloned_option();
    }
    spec
}

/// Quota with null spelled as [`NO_QUOTA`], for comparison
fn quota(declared: &Nullable<u64>) -> Nullable<u64> {
    match declared {
        Nullable::Null => Nullable::Value(NO_QUOTA),
        other => *other,
    }
}

pub(crate) fn pool_attributes(schema: Schema) -> Schema {
    schema
        .attribute(Attribute::required("name", AttributeType::String).requires_replace())
        .attribute(
            Attribute::optional_computed("pool_type", AttributeType::String)
                .one_of(POOL_TYPES)
                .requires_replace(),
        )
        .attribute(Attribute::optional_computed("size", AttributeType::Int))
        .attribute(Attribute::optional_computed("min_size", AttributeType::Int))
        .attribute(Attribute::optional_computed("pg_num", AttributeType::Int))
        .attribute(Attribute::optional_computed("crush_rule", AttributeType::String))
        .attribute(Attribute::optional_computed("primary_affinity", AttributeType::Float))
        .attribute(Attribute::optional_computed("application_metadata", AttributeType::StringList))
        .attribute(
            Attribute::optional_computed("erasure_code_profile", AttributeType::String).requires_replace(),
        )
        .attribute(Attribute::optional_computed("autoscale_mode", AttributeType::String).one_of(AUTOSCALE_MODES))
        .attribute(Attribute::optional_computed("quota_max_objects", AttributeType::Int))
        .attribute(Attribute::optional_computed("quota_max_bytes", AttributeType::Int))
        .attribute(
            Attribute::optional_computed("compression", AttributeType::Object)
                .describe("mode, algorithm, required_ratio, min_blob_size, max_blob_size"),
        )
}

// =============================================================================
// Handler
// =============================================================================

pub struct PoolResource {
    client: ClientSlot,
}

impl PoolResource {
    pub fn new(client: ClientSlot) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ResourceHandler for PoolResource {
    type Model = PoolModel;

    const TYPE_NAME: &'static str = "ceph_pool";

    fn schema() -> Schema {
        pool_attributes(Schema::for_model::<PoolModel>("A RADOS pool"))
    }

    fn id(model: &PoolModel) -> String {
        model.name.clone()
    }

    fn validate(model: &PoolModel) -> Result<()> {
        require_non_empty("name", &model.name)?;
        one_of("pool_type", &model.pool_type, POOL_TYPES)?;
        one_of("autoscale_mode", &model.autoscale_mode, AUTOSCALE_MODES)?;

        let erasure = model.pool_type.value().map(String::as_str) == Some("erasure");
        if erasure && !model.erasure_code_profile.is_value() {
            return Err(Error::InvalidAttribute {
                attribute: "erasure_code_profile".into(),
                reason: "required for erasure pools".into(),
            });
        }
        if !erasure && model.erasure_code_profile.is_value() {
            return Err(Error::InvalidAttribute {
                attribute: "erasure_code_profile".into(),
                reason: "only valid with pool_type = \"erasure\"".into(),
            });
        }

        if let (Some(size), Some(min)) = (model.size.value(), model.min_size.value()) {
            if min > size {
                return Err(Error::InvalidAttribute {
                    attribute: "min_size".into(),
                    reason: format!("{} exceeds size {}", min, size),
                });
            }
        }
        if let Some(affinity) = model.primary_affinity.value() {
            if !(0.0..=1.0).contains(affinity) {
                return Err(Error::InvalidAttribute {
                    attribute: "primary_affinity".into(),
                    reason: "must be between 0 and 1".into(),
                });
            }
        }

        if let Some(compression) = model.compression.value() {
            one_of("compression.mode", &compression.mode, COMPRESSION_MODES)?;
            one_of("compression.algorithm", &compression.algorithm, COMPRESSION_ALGORITHMS)?;
            if let Some(ratio) = compression.required_ratio.value() {
                if !(*ratio > 0.0 && *ratio <= 1.0) {
                    return Err(Error::InvalidAttribute {
                        attribute: "compression.required_ratio".into(),
                        reason: "must be in (0, 1]".into(),
                    });
                }
            }
        }
        Ok(())
    }

    async fn create(&self, ctx: &OpContext, plan: PoolModel) -> Result<PoolModel> {
        self.client
            .get()?
            .pools()
            .create(ctx, &to_spec(&plan, true))
            .await?;
        Ok(plan)
    }

    async fn read(&self, ctx: &OpContext, state: PoolModel) -> Result<Option<PoolModel>> {
        let info = found(self.client.get()?.pools().get(ctx, &state.name).await)?;
        Ok(info.map(|info| Self::finalize(&state, project(info))))
    }

    async fn update(&self, ctx: &OpContext, _prior: PoolModel, plan: PoolModel) -> Result<PoolModel> {
        self.client
            .get()?
            .pools()
            .update(ctx, &plan.name, &to_spec(&plan, false))
            .await?;
        Ok(plan)
    }

    async fn delete(&self, ctx: &OpContext, state: PoolModel) -> Result<()> {
        self.client.get()?.pools().delete(ctx, &state.name).await
    }

    async fn import(&self, ctx: &OpContext, id: &str) -> Result<PoolModel> {
        let info = self.client.get()?.pools().get(ctx, id).await?;
        Ok(project(info))
    }

    fn verify(plan: &PoolModel, observed: &PoolModel) -> Result<()> {
        let mut check = DriftCheck::new(Self::TYPE_NAME, &plan.name);
        check
            .nullable("pool_type", &plan.pool_type, &observed.pool_type)
            .nullable("size", &plan.size, &observed.size)
            .nullable("min_size", &plan.min_size, &observed.min_size)
            .nullable("crush_rule", &plan.crush_rule, &observed.crush_rule)
            .float("primary_affinity", &plan.primary_affinity, &observed.primary_affinity)
            .nullable(
                "application_metadata",
                &plan.application_metadata.clone().map(sorted),
                &observed.application_metadata.clone().map(sorted),
            )
            .nullable("erasure_code_profile", &plan.erasure_code_profile, &observed.erasure_code_profile)
            .nullable("autoscale_mode", &plan.autoscale_mode, &observed.autoscale_mode)
            .nullable("quota_max_objects", &quota(&plan.quota_max_objects), &quota(&observed.quota_max_objects))
            .nullable("quota_max_bytes", &quota(&plan.quota_max_bytes), &quota(&observed.quota_max_bytes));

        let autoscaled = observed.autoscale_mode.value().map(String::as_str) == Some("on");
        if !autoscaled {
            check.nullable("pg_num", &plan.pg_num, &observed.pg_num);
        }

        if let Some(want) = plan.compression.value() {
            let got = observed.compression.value().cloned().unwrap_or_default();
            check
                .nullable("compression.mode", &want.mode, &got.mode)
                .nullable("compression.algorithm", &want.algorithm, &got.algorithm)
                .float("compression.required_ratio", &want.required_ratio, &got.required_ratio)
                .nullable("compression.min_blob_size", &want.min_blob_size, &got.min_blob_size)
                .nullable("compression.max_blob_size", &want.max_blob_size, &got.max_blob_size);
        }

        check.finish()
    }

    /// Keep the declared ordering of applications, the declared `pg_num`
    /// under the autoscaler and removed quotas as null
    fn finalize(plan: &PoolModel, mut observed: PoolModel) -> PoolModel {
        if let Nullable::Value(apps) = &plan.application_metadata {
            if observed.application_metadata.value() == Some(&sorted(apps.clone())) {
                observed.application_metadata = Nullable::Value(apps.clone());
            }
        }
        if plan.pg_num.is_value() && observed.autoscale_mode.value().map(String::as_str) == Some("on") {
            observed.pg_num = plan.pg_num;
        }
        for (declared, seen) in [
            (&plan.quota_max_objects, &mut observed.quota_max_objects),
            (&plan.quota_max_bytes, &mut observed.quota_max_bytes),
        ] {
            if declared.is_null() && *seen == Nullable::Value(NO_QUOTA) {
                *seen = Nullable::Null;
            }
        }
        observed
    }
}
