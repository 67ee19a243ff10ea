//! `ceph_rgw_s3_key` and `ceph_rgw_swift_key`
//!
//! Keys are immutable: every attribute forces replacement, so `update`
//! never issues a call. Secrets survive no-op plans via
//! `use_state_for_unknown`.

use crate::ceph::{RgwS3KeyInfo, RgwSwiftKeyInfo, SubuserId};
use crate::context::OpContext;
use crate::domain::{Attribute, AttributeType, DriftCheck, Nullable, ResourceHandler, Schema};
use crate::error::{Error, Result};
use crate::provider::resources::found;
use crate::provider::resources::rgw_user::validate_uid;
use crate::provider::ClientSlot;
use async_trait::async_trait;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

// =============================================================================
// S3 Keys
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct RgwS3KeyModel {
    /// Owning user
    pub user_id: String,
    /// Owning subuser (name without the parent prefix); the key belongs to
    /// the user itself when unset
    #[serde(default, skip_serializing_if = "Nullable::is_unset")]
    pub subuser: Nullable<String>,
    #[serde(default, skip_serializing_if = "Nullable::is_unset")]
    pub access_key: Nullable<String>,
    #[serde(default, skip_serializing_if = "Nullable::is_unset")]
    pub secret_key: Nullable<String>,
    #[serde(default, skip_serializing_if = "Nullable::is_unset")]
    pub active: Nullable<bool>,
    /// `user[:subuser]:access_key`
    #[serde(default, skip_serializing_if = "Nullable::is_unset")]
    pub id: Nullable<String>,
}

impl RgwS3KeyModel {
    /// `user` or `user:subuser`
    fn owner(&self) -> String {
        match self.subuser.value() {
            Some(sub) => format!("{}:{}", self.user_id, sub),
            None => self.user_id.clone(),
        }
    }

    fn from_info(user_id: &str, info: RgwS3KeyInfo) -> Self {
        let subuser = match info.user.split_once(':') {
            Some((_, sub)) => Nullable::Value(sub.to_string()),
            None => Nullable::Null,
        };
        Self {
            id: Nullable::Value(format!("{}:{}", info.user, info.access_key)),
            user_id: user_id.to_string(),
            subuser,
            access_key: Nullable::Value(info.access_key),
            secret_key: Nullable::Value(info.secret_key),
            active: Nullable::Value(info.active),
        }
    }
}

/// Split `user[:subuser]:ACCESSKEY`
fn parse_s3_import_id(id: &str) -> Result<(String, Option<String>, String)> {
    let invalid = || Error::InvalidId {
        id: id.to_string(),
        reason: "expected <uid>:<access_key> or <uid>:<subuser>:<access_key>".into(),
    };
    let (owner, access_key) = id.rsplit_once(':').ok_or_else(invalid)?;
    if access_key.is_empty() {
        return Err(invalid());
    }
    match owner.split_once(':') {
        Some(_) => {
            let sub: SubuserId = owner.parse().map_err(|_| invalid())?;
            Ok((sub.uid, Some(sub.name), access_key.to_string()))
        }
        None if !owner.is_empty() => Ok((owner.to_string(), None, access_key.to_string())),
        None => Err(invalid()),
    }
}

pub struct RgwS3KeyResource {
    client: ClientSlot,
}

impl RgwS3KeyResource {
    pub fn new(client: ClientSlot) -> Self {
        Self { client }
    }

    async fn fetch(&self, ctx: &OpContext, user_id: &str, owner: &str, access_key: &str) -> Result<Option<RgwS3KeyModel>> {
        let Some(user) = found(self.client.get()?.rgw_users().get(ctx, user_id).await)? else {
            return Ok(None);
        };
        Ok(user
            .s3_key(access_key)
            .filter(|k| k.user == owner)
            .cloned()
            .map(|k| RgwS3KeyModel::from_info(user_id, k)))
    }
}

#[async_trait]
impl ResourceHandler for RgwS3KeyResource {
    type Model = RgwS3KeyModel;

    const TYPE_NAME: &'static str = "ceph_rgw_s3_key";

    fn schema() -> Schema {
        Schema::for_model::<RgwS3KeyModel>("An S3 access key of an RGW user or subuser")
            .attribute(Attribute::required("user_id", AttributeType::String).requires_replace())
            .attribute(Attribute::optional("subuser", AttributeType::String).requires_replace())
            .attribute(
                Attribute::optional_computed("access_key", AttributeType::String)
                    .requires_replace()
                    .use_state_for_unknown(),
            )
            .attribute(
                Attribute::optional_computed("secret_key", AttributeType::String)
                    .sensitive()
                    .requires_replace()
                    .use_state_for_unknown(),
            )
            .attribute(Attribute::computed("active", AttributeType::Bool).use_state_for_unknown())
            .attribute(Attribute::computed("id", AttributeType::String).use_state_for_unknown())
    }

    fn id(model: &RgwS3KeyModel) -> String {
        match model.access_key.value() {
            Some(access) => format!("{}:{}", model.owner(), access),
            None => model.owner(),
        }
    }

    fn validate(model: &RgwS3KeyModel) -> Result<()> {
        validate_uid(&model.user_id)?;
        if let Some(sub) = model.subuser.value() {
            SubuserId::try_new(&model.user_id, sub)?;
        }
        if model.access_key.is_value() != model.secret_key.is_value() {
            return Err(Error::InvalidAttribute {
                attribute: "access_key".into(),
                reason: "access_key and secret_key must be set together".into(),
            });
        }
        Ok(())
    }

    async fn create(&self, ctx: &OpContext, plan: RgwS3KeyModel) -> Result<RgwS3KeyModel> {
        let created = self
            .client
            .get()?
            .rgw_users()
            .create_s3_key(
                ctx,
                &plan.user_id,
                plan.subuser.value().map(String::as_str),
                plan.access_key.value().map(String::as_str),
                plan.secret_key.value().map(String::as_str),
            )
            .await?;
        Ok(RgwS3KeyModel::from_info(&plan.user_id, created))
    }

    async fn read(&self, ctx: &OpContext, state: RgwS3KeyModel) -> Result<Option<RgwS3KeyModel>> {
        let Some(access_key) = state.access_key.value() else {
            return Ok(None);
        };
        self.fetch(ctx, &state.user_id, &state.owner(), access_key).await
    }

    async fn update(&self, _ctx: &OpContext, _prior: RgwS3KeyModel, plan: RgwS3KeyModel) -> Result<RgwS3KeyModel> {
        Ok(plan)
    }

    async fn delete(&self, ctx: &OpContext, state: RgwS3KeyModel) -> Result<()> {
        let access_key = state
            .access_key
            .value()
            .ok_or_else(|| Error::not_found("rgw s3 key", state.owner()))?;
        self.client
            .get()?
            .rgw_users()
            .delete_s3_key(ctx, &state.user_id, state.subuser.value().map(String::as_str), access_key)
            .await
    }

    async fn import(&self, ctx: &OpContext, id: &str) -> Result<RgwS3KeyModel> {
        let (user_id, subuser, access_key) = parse_s3_import_id(id)?;
        let owner = match &subuser {
            Some(sub) => format!("{}:{}", user_id, sub),
            None => user_id.clone(),
        };
        self.fetch(ctx, &user_id, &owner, &access_key)
            .await?
            .ok_or_else(|| Error::not_found("rgw s3 key", id))
    }

    fn verify(plan: &RgwS3KeyModel, observed: &RgwS3KeyModel) -> Result<()> {
        DriftCheck::new(Self::TYPE_NAME, plan.owner())
            .exact("user_id", &plan.user_id, &observed.user_id)
            .nullable("subuser", &plan.subuser, &observed.subuser)
            .nullable("access_key", &plan.access_key, &observed.access_key)
            .nullable("secret_key", &plan.secret_key, &observed.secret_key)
            .finish()
    }
}

// =============================================================================
// Swift Keys
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct RgwSwiftKeyModel {
    pub user_id: String,
    pub subuser: String,
    #[serde(default, skip_serializing_if = "Nullable::is_unset")]
    pub secret_key: Nullable<String>,
    #[serde(default, skip_serializing_if = "Nullable::is_unset")]
    pub active: Nullable<bool>,
    /// `uid:subuser`
    #[serde(default, skip_serializing_if = "Nullable::is_unset")]
    pub id: Nullable<String>,
}

impl RgwSwiftKeyModel {
    fn subuser_id(&self) -> Result<SubuserId> {
        SubuserId::try_new(&self.user_id, &self.subuser)
    }

    fn from_info(id: &SubuserId, info: RgwSwiftKeyInfo) -> Self {
        Self {
            user_id: id.uid.clone(),
            subuser: id.name.clone(),
            secret_key: Nullable::Value(info.secret_key),
            active: Nullable::Value(info.active),
            id: Nullable::Value(id.to_string()),
        }
    }
}

pub struct RgwSwiftKeyResource {
    client: ClientSlot,
}

impl RgwSwiftKeyResource {
    pub fn new(client: ClientSlot) -> Self {
        Self { client }
    }

    async fn fetch(&self, ctx: &OpContext, id: &SubuserId) -> Result<Option<RgwSwiftKeyModel>> {
        let Some(user) = found(self.client.get()?.rgw_users().get(ctx, &id.uid).await)? else {
            return Ok(None);
        };
        Ok(user
            .swift_key(id)
            .cloned()
            .map(|k| RgwSwiftKeyModel::from_info(id, k)))
    }
}

#[async_trait]
impl ResourceHandler for RgwSwiftKeyResource {
    type Model = RgwSwiftKeyModel;

    const TYPE_NAME: &'static str = "ceph_rgw_swift_key";

    fn schema() -> Schema {
        Schema::for_model::<RgwSwiftKeyModel>("The Swift secret of an RGW subuser")
            .attribute(Attribute::required("user_id", AttributeType::String).requires_replace())
            .attribute(Attribute::required("subuser", AttributeType::String).requires_replace())
            .attribute(
                Attribute::optional_computed("secret_key", AttributeType::String)
                    .sensitive()
                    .requires_replace()
                    .use_state_for_unknown(),
            )
            .attribute(Attribute::computed("active", AttributeType::Bool).use_state_for_unknown())
            .attribute(Attribute::computed("id", AttributeType::String).use_state_for_unknown())
    }

    fn id(model: &RgwSwiftKeyModel) -> String {
        format!("{}:{}", model.user_id, model.subuser)
    }

    fn validate(model: &RgwSwiftKeyModel) -> Result<()> {
        model.subuser_id().map(|_| ())
    }

    async fn create(&self, ctx: &OpContext, plan: RgwSwiftKeyModel) -> Result<RgwSwiftKeyModel> {
        let id = plan.subuser_id()?;
        let created = self
            .client
            .get()?
            .rgw_users()
            .create_swift_key(ctx, &id, plan.secret_key.value().map(String::as_str))
            .await?;
        Ok(RgwSwiftKeyModel::from_info(&id, created))
    }

    async fn read(&self, ctx: &OpContext, state: RgwSwiftKeyModel) -> Result<Option<RgwSwiftKeyModel>> {
        self.fetch(ctx, &state.subuser_id()?).await
    }

    async fn update(&self, _ctx: &OpContext, _prior: RgwSwiftKeyModel, plan: RgwSwiftKeyModel) -> Result<RgwSwiftKeyModel> {
        Ok(plan)
    }

    async fn delete(&self, ctx: &OpContext, state: RgwSwiftKeyModel) -> Result<()> {
        let id = state.subuser_id()?;
        self.client.get()?.rgw_users().delete_swift_key(ctx, &id).await
    }

    async fn import(&self, ctx: &OpContext, id: &str) -> Result<RgwSwiftKeyModel> {
        let id: SubuserId = id.parse()?;
        self.fetch(ctx, &id)
            .await?
            .ok_or_else(|| Error::not_found("rgw swift key", id.to_string()))
    }

    fn verify(plan: &RgwSwiftKeyModel, observed: &RgwSwiftKeyModel) -> Result<()> {
        DriftCheck::new(Self::TYPE_NAME, Self::id(plan))
            .nullable("secret_key", &plan.secret_key, &observed.secret_key)
            .finish()
    }
}
