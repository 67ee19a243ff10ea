//! `ceph_rgw_user`: RADOS Gateway users
//!
//! `admin` and `tenant` are observed only; they are never sent on create or
//! update. Suspension travels as `0/1` and is written once per update. A
//! null email on update clears the address.

use crate::ceph::rgw::suspended_to_wire;
use crate::ceph::{CreateRgwUser, RgwUser, UpdateRgwUser};
use crate::context::OpContext;
use crate::domain::{Attribute, AttributeType, DriftCheck, Nullable, ResourceHandler, Schema};
use crate::error::{Error, Result};
use crate::provider::resources::{found, non_empty, require_non_empty};
use crate::provider::ClientSlot;
use async_trait::async_trait;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct RgwUserModel {
    pub uid: String,
    /// Canonical id reported by RGW
    #[serde(default, skip_serializing_if = "Nullable::is_unset")]
    pub user_id: Nullable<String>,
    pub display_name: String,
    #[serde(default, skip_serializing_if = "Nullable::is_unset")]
    pub email: Nullable<String>,
    #[serde(default, skip_serializing_if = "Nullable::is_unset")]
    pub max_buckets: Nullable<i64>,
    #[serde(default, skip_serializing_if = "Nullable::is_unset")]
    pub system: Nullable<bool>,
    #[serde(default, skip_serializing_if = "Nullable::is_unset")]
    pub suspended: Nullable<bool>,
    #[serde(default, skip_serializing_if = "Nullable::is_unset")]
    pub tenant: Nullable<String>,
    #[serde(default, skip_serializing_if = "Nullable::is_unset")]
    pub admin: Nullable<bool>,
}

pub(crate) fn validate_uid(uid: &str) -> Result<()> {
    if uid.is_empty() || uid.contains(':') || uid.contains('/') {
        return Err(Error::InvalidId {
            id: uid.to_string(),
            reason: "uid must be non-empty and must not contain ':' or '/'".into(),
        });
    }
    Ok(())
}

pub(crate) fn project(user: RgwUser) -> RgwUserModel {
    let uid = if user.uid.is_empty() {
        user.id().to_string()
    } else {
        user.uid.clone()
    };
    RgwUserModel {
        user_id: non_empty(user.id()),
        uid,
        display_name: user.display_name,
        email: non_empty(user.email),
        max_buckets: Nullable::Value(user.max_buckets),
        system: Nullable::Value(user.system),
        suspended: Nullable::Value(user.suspended),
        tenant: non_empty(user.tenant),
        admin: Nullable::Value(user.admin),
    }
}

pub(crate) fn rgw_user_attributes(schema: Schema) -> Schema {
    schema
        .attribute(Attribute::required("uid", AttributeType::String).requires_replace())
        .attribute(Attribute::computed("user_id", AttributeType::String).use_state_for_unknown())
        .attribute(Attribute::required("display_name", AttributeType::String))
        .attribute(Attribute::optional_computed("email", AttributeType::String))
        .attribute(Attribute::optional_computed("max_buckets", AttributeType::Int))
        .attribute(Attribute::optional_computed("system", AttributeType::Bool))
        .attribute(Attribute::optional_computed("suspended", AttributeType::Bool))
        .attribute(
            Attribute::computed("tenant", AttributeType::String)
                .describe("Tenant of the user; observed only"),
        )
        .attribute(
            Attribute::computed("admin", AttributeType::Bool)
                .describe("Admin flag; can only be set out of band"),
        )
}

pub struct RgwUserResource {
    client: ClientSlot,
}

impl RgwUserResource {
    pub fn new(client: ClientSlot) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ResourceHandler for RgwUserResource {
    type Model = RgwUserModel;

    const TYPE_NAME: &'static str = "ceph_rgw_user";

    fn schema() -> Schema {
        rgw_user_attributes(Schema::for_model::<RgwUserModel>("A RADOS Gateway user"))
    }

    fn id(model: &RgwUserModel) -> String {
        model.uid.clone()
    }

    fn validate(model: &RgwUserModel) -> Result<()> {
        validate_uid(&model.uid)?;
        require_non_empty("display_name", &model.display_name)?;
        if let Some(email) = model.email.value() {
            require_non_empty("email", email)?;
        }
        Ok(())
    }

    async fn create(&self, ctx: &OpContext, plan: RgwUserModel) -> Result<RgwUserModel> {
        let request = CreateRgwUser {
            uid: plan.uid.clone(),
            display_name: plan.display_name.clone(),
            email: plan.email.cloned_option(),
            max_buckets: plan.max_buckets.cloned_option(),
            system: plan.system.cloned_option(),
            suspended: suspended_to_wire(plan.suspended.cloned_option().unwrap_or(false)),
            generate_key: false,
        };
        self.client.get()?.rgw_users().create(ctx, &request).await?;
        Ok(plan)
    }

    async fn read(&self, ctx: &OpContext, state: RgwUserModel) -> Result<Option<RgwUserModel>> {
        let user = found(self.client.get()?.rgw_users().get(ctx, &state.uid).await)?;
        Ok(user.map(project))
    }

    async fn update(&self, ctx: &OpContext, prior: RgwUserModel, plan: RgwUserModel) -> Result<RgwUserModel> {
        let suspended = plan
            .suspended
            .cloned_option()
            .or_else(|| prior.suspended.cloned_option())
            .unwrap_or(false);
        let request = UpdateRgwUser {
            display_name: plan.display_name.clone(),
            email: plan.email.cloned_or_clear(String::new()),
            max_buckets: plan.max_buckets.cloned_option(),
            system: plan.system.cloned_option(),
            suspended: suspended_to_wire(suspended),
        };
        self.client
            .get()?
            .rgw_users()
            .update(ctx, &plan.uid, &request)
            .await?;
        Ok(plan)
    }

    async fn delete(&self, ctx: &OpContext, state: RgwUserModel) -> Result<()> {
        self.client.get()?.rgw_users().delete(ctx, &state.uid).await
    }

    async fn import(&self, ctx: &OpContext, id: &str) -> Result<RgwUserModel> {
        validate_uid(id)?;
        let user = self.client.get()?.rgw_users().get(ctx, id).await?;
        Ok(project(user))
    }

    fn verify(plan: &RgwUserModel, observed: &RgwUserModel) -> Result<()> {
        let mut check = DriftCheck::new(Self::TYPE_NAME, &plan.uid);
        check
            .exact("display_name", &plan.display_name, &observed.display_name)
            .nullable("email", &plan.email, &observed.email)
            .nullable("max_buckets", &plan.max_buckets, &observed.max_buckets)
            .nullable("system", &plan.system, &observed.system)
            .nullable("suspended", &plan.suspended, &observed.suspended);
        if plan.email.is_null() {
            check.exact("email", &Nullable::Null, &observed.email);
        }
        check.finish()
    }
}
