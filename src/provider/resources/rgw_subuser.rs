//! `ceph_rgw_subuser`: subusers of an RGW user, imported as `uid:subuser`

use crate::ceph::{SubuserId, SubuserPermission};
use crate::context::OpContext;
use crate::domain::{Attribute, AttributeType, DriftCheck, Nullable, ResourceHandler, Schema};
use crate::error::{Error, Result};
use crate::provider::resources::found;
use crate::provider::ClientSlot;
use async_trait::async_trait;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct RgwSubuserModel {
    /// Parent user
    pub user_id: String,
    /// Subuser name without the parent prefix
    pub subuser: String,
    /// One of `read`, `write`, `readwrite`, `full-control`
    pub permissions: String,
    /// `uid:subuser`
    #[serde(default, skip_serializing_if = "Nullable::is_unset")]
    pub id: Nullable<String>,
}

impl RgwSubuserModel {
    fn subuser_id(&self) -> Result<SubuserId> {
        SubuserId::try_new(&self.user_id, &self.subuser)
    }
}

pub struct RgwSubuserResource {
    client: ClientSlot,
}

impl RgwSubuserResource {
    pub fn new(client: ClientSlot) -> Self {
        Self { client }
    }

    async fn fetch(&self, ctx: &OpContext, id: &SubuserId) -> Result<Option<RgwSubuserModel>> {
        let Some(user) = found(self.client.get()?.rgw_users().get(ctx, &id.uid).await)? else {
            return Ok(None);
        };
        let Some(info) = user.subuser(id) else {
            return Ok(None);
        };
        let permission = SubuserPermission::from_wire(&info.permissions)?;
        Ok(Some(RgwSubuserModel {
            user_id: id.uid.clone(),
            subuser: id.name.clone(),
            permissions: permission.as_model().to_string(),
            id: Nullable::Value(id.to_string()),
        }))
    }
}

#[async_trait]
impl ResourceHandler for RgwSubuserResource {
    type Model = RgwSubuserModel;

    const TYPE_NAME: &'static str = "ceph_rgw_subuser";

    fn schema() -> Schema {
        Schema::for_model::<RgwSubuserModel>("A subuser of a RADOS Gateway user")
            .attribute(Attribute::required("user_id", AttributeType::String).requires_replace())
            .attribute(Attribute::required("subuser", AttributeType::String).requires_replace())
            .attribute(
                Attribute::required("permissions", AttributeType::String).one_of(SubuserPermission::MODEL_VALUES),
            )
            .attribute(Attribute::computed("id", AttributeType::String).use_state_for_unknown())
    }

    fn id(model: &RgwSubuserModel) -> String {
        format!("{}:{}", model.user_id, model.subuser)
    }

    fn validate(model: &RgwSubuserModel) -> Result<()> {
        model.subuser_id()?;
        SubuserPermission::from_model(&model.permissions)?;
        Ok(())
    }

    async fn create(&self, ctx: &OpContext, plan: RgwSubuserModel) -> Result<RgwSubuserModel> {
        let id = plan.subuser_id()?;
        let permission = SubuserPermission::from_model(&plan.permissions)?;
        self.client
            .get()?
            .rgw_users()
            .create_subuser(ctx, &id, permission)
            .await?;
        Ok(plan)
    }

    async fn read(&self, ctx: &OpContext, state: RgwSubuserModel) -> Result<Option<RgwSubuserModel>> {
        self.fetch(ctx, &state.subuser_id()?).await
    }

    async fn update(&self, ctx: &OpContext, _prior: RgwSubuserModel, plan: RgwSubuserModel) -> Result<RgwSubuserModel> {
        let id = plan.subuser_id()?;
        let permission = SubuserPermission::from_model(&plan.permissions)?;
        self.client
            .get()?
            .rgw_users()
            .update_subuser(ctx, &id, permission)
            .await?;
        Ok(plan)
    }

    async fn delete(&self, ctx: &OpContext, state: RgwSubuserModel) -> Result<()> {
        let id = state.subuser_id()?;
        self.client.get()?.rgw_users().delete_subuser(ctx, &id).await
    }

    async fn import(&self, ctx: &OpContext, id: &str) -> Result<RgwSubuserModel> {
        let id: SubuserId = id.parse()?;
        self.fetch(ctx, &id)
            .await?
            .ok_or_else(|| Error::not_found("rgw subuser", id.to_string()))
    }

    fn verify(plan: &RgwSubuserModel, observed: &RgwSubuserModel) -> Result<()> {
        DriftCheck::new(Self::TYPE_NAME, Self::id(plan))
            .exact("permissions", &plan.permissions, &observed.permissions)
            .finish()
    }
}
