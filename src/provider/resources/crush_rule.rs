//! `ceph_crush_rule`: replicated CRUSH rules
//!
//! The dashboard only creates simple replicated rules (`take root[~class]`,
//! `chooseleaf_firstn 0 type <domain>`, `emit`), so those three inputs are
//! the managed attributes and the resulting steps are observed. Rules cannot
//! be edited: every input requires replacement.

use crate::ceph::{CreateCrushRule, CrushOp, CrushRuleInfo, CrushStepInfo};
use crate::context::OpContext;
use crate::domain::{Attribute, AttributeType, DriftCheck, Nullable, ResourceHandler, Schema};
use crate::error::Result;
use crate::provider::resources::{found, require_non_empty};
use crate::provider::ClientSlot;
use async_trait::async_trait;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

const DEFAULT_ROOT: &str = "default";
const DEFAULT_FAILURE_DOMAIN: &str = "host";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct CrushRuleModel {
    pub name: String,
    /// Root bucket; `default` when unset
    #[serde(default, skip_serializing_if = "Nullable::is_unset")]
    pub root: Nullable<String>,
    /// Bucket type replicas are spread across; `host` when unset
    #[serde(default, skip_serializing_if = "Nullable::is_unset")]
    pub failure_domain: Nullable<String>,
    #[serde(default, skip_serializing_if = "Nullable::is_unset")]
    pub device_class: Nullable<String>,
    #[serde(default, skip_serializing_if = "Nullable::is_unset")]
    pub rule_id: Nullable<i64>,
    /// 1 for replicated, 3 for erasure
    #[serde(rename = "type", default, skip_serializing_if = "Nullable::is_unset")]
    pub rule_type: Nullable<i64>,
    #[serde(default, skip_serializing_if = "Nullable::is_unset")]
    pub steps: Nullable<Vec<CrushStepModel>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct CrushStepModel {
    pub op: String,
    #[serde(default, skip_serializing_if = "Nullable::is_unset")]
    pub item: Nullable<i64>,
    #[serde(default, skip_serializing_if = "Nullable::is_unset")]
    pub item_name: Nullable<String>,
    #[serde(default, skip_serializing_if = "Nullable::is_unset")]
    pub num: Nullable<i64>,
    #[serde(rename = "type", default, skip_serializing_if = "Nullable::is_unset")]
    pub bucket_type: Nullable<String>,
}

fn project_step(step: CrushStepInfo) -> Result<CrushStepModel> {
    let op: CrushOp = step.op.parse()?;
    Ok(CrushStepModel {
        op: op.as_str().to_string(),
        item: step.item.into(),
        item_name: step.item_name.into(),
        num: step.num.into(),
        bucket_type: step.bucket_type.into(),
    })
}

/// Project a rule; fails on step operations outside the known set
pub(crate) fn project(info: CrushRuleInfo) -> Result<CrushRuleModel> {
    let (root, class) = match info.root_and_class() {
        Some((root, class)) => (Nullable::Value(root), Nullable::from(class)),
        None => (Nullable::Null, Nullable::Null),
    };
    let failure_domain = info.failure_domain().into();
    let steps = info.steps.into_iter().map(project_step).collect::<Result<Vec<_>>>()?;

    Ok(CrushRuleModel {
        name: info.rule_name,
        root,
        failure_domain,
        device_class: class,
        rule_id: Nullable::Value(info.rule_id),
        rule_type: Nullable::Value(info.rule_type),
        steps: Nullable::Value(steps),
    })
}

pub(crate) fn crush_rule_attributes(schema: Schema) -> Schema {
    schema
        .attribute(Attribute::required("name", AttributeType::String).requires_replace())
        .attribute(Attribute::optional_computed("root", AttributeType::String).requires_replace())
        .attribute(Attribute::optional_computed("failure_domain", AttributeType::String).requires_replace())
        .attribute(Attribute::optional_computed("device_class", AttributeType::String).requires_replace())
        .attribute(Attribute::computed("rule_id", AttributeType::Int).use_state_for_unknown())
        .attribute(Attribute::computed("type", AttributeType::Int).use_state_for_unknown())
        .attribute(
            Attribute::computed("steps", AttributeType::ObjectList)
                .describe("Ordered steps: take, chooseleaf_firstn, choose_indep, set_chooseleaf_tries, set_choose_tries, emit"),
        )
}

pub struct CrushRuleResource {
    client: ClientSlot,
}

impl CrushRuleResource {
    pub fn new(client: ClientSlot) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ResourceHandler for CrushRuleResource {
    type Model = CrushRuleModel;

    const TYPE_NAME: &'static str = "ceph_crush_rule";

    fn schema() -> Schema {
        crush_rule_attributes(Schema::for_model::<CrushRuleModel>("A replicated CRUSH rule"))
    }

    fn id(model: &CrushRuleModel) -> String {
        model.name.clone()
    }

    fn validate(model: &CrushRuleModel) -> Result<()> {
        require_non_empty("name", &model.name)?;
        if let Some(root) = model.root.value() {
            require_non_empty("root", root)?;
        }
        if let Some(domain) = model.failure_domain.value() {
            require_non_empty("failure_domain", domain)?;
        }
        Ok(())
    }

    async fn create(&self, ctx: &OpContext, mut plan: CrushRuleModel) -> Result<CrushRuleModel> {
        let root = plan.root.cloned_option().unwrap_or_else(|| DEFAULT_ROOT.to_string());
        let failure_domain = plan
            .failure_domain
            .cloned_option()
            .unwrap_or_else(|| DEFAULT_FAILURE_DOMAIN.to_string());

        let request = CreateCrushRule {
            name: plan.name.clone(),
            root: root.clone(),
            failure_domain: failure_domain.clone(),
            device_class: plan.device_class.cloned_option(),
        };
        self.client.get()?.crush_rules().create(ctx, &request).await?;

        plan.root = Nullable::Value(root);
        plan.failure_domain = Nullable::Value(failure_domain);
        Ok(plan)
    }

    async fn read(&self, ctx: &OpContext, state: CrushRuleModel) -> Result<Option<CrushRuleModel>> {
        match found(self.client.get()?.crush_rules().get(ctx, &state.name).await)? {
            Some(info) => project(info).map(Some),
            None => Ok(None),
        }
    }

    /// Only computed attributes can reach here; nothing to send
    async fn update(&self, _ctx: &OpContext, _prior: CrushRuleModel, plan: CrushRuleModel) -> Result<CrushRuleModel> {
        Ok(plan)
    }

    async fn delete(&self, ctx: &OpContext, state: CrushRuleModel) -> Result<()> {
        self.client.get()?.crush_rules().delete(ctx, &state.name).await
    }

    async fn import(&self, ctx: &OpContext, id: &str) -> Result<CrushRuleModel> {
        project(self.client.get()?.crush_rules().get(ctx, id).await?)
    }

    fn verify(plan: &CrushRuleModel, observed: &CrushRuleModel) -> Result<()> {
        DriftCheck::new(Self::TYPE_NAME, &plan.name)
            .nullable("root", &plan.root, &observed.root)
            .nullable("failure_domain", &plan.failure_domain, &observed.failure_domain)
            .nullable("device_class", &plan.device_class, &observed.device_class)
            .finish()
    }
}
