//! `ceph_auth`: cephx auth principals

use crate::ceph::{export_missing, Capabilities};
use crate::context::OpContext;
use crate::domain::{Attribute, AttributeType, DriftCheck, Nullable, ResourceHandler, Schema};
use crate::error::{Error, Result};
use crate::keyring::KeyringEntry;
use crate::provider::ClientSlot;
use async_trait::async_trait;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// State of one auth principal
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct AuthModel {
    /// e.g. `client.admin`
    pub entity: String,
    /// Capability type to grant string
    pub caps: BTreeMap<String, String>,
    /// cephx secret (base64)
    #[serde(default, skip_serializing_if = "Nullable::is_unset")]
    pub key: Nullable<String>,
    /// Keyring text holding this entity only
    #[serde(default, skip_serializing_if = "Nullable::is_unset")]
    pub keyring: Nullable<String>,
}

/// `<type>.<id>`, e.g. `client.rbd` or `mgr.a`
pub(crate) fn validate_entity(entity: &str) -> Result<()> {
    match entity.split_once('.') {
        Some((kind, id)) if !kind.is_empty() && !id.is_empty() && !entity.contains(char::is_whitespace) => Ok(()),
        _ => Err(Error::InvalidId {
            id: entity.to_string(),
            reason: "expected <type>.<id>, e.g. client.admin".into(),
        }),
    }
}

/// Project an exported keyring entry into state
pub(crate) fn project(entry: KeyringEntry, keyring: String) -> AuthModel {
    AuthModel {
        entity: entry.entity,
        caps: entry.caps.into_iter().collect(),
        key: entry.key.into(),
        keyring: Nullable::Value(keyring),
    }
}

pub(crate) fn auth_attributes(schema: Schema) -> Schema {
    schema
        .attribute(
            Attribute::required("entity", AttributeType::String)
                .describe("Entity name, e.g. client.admin")
                .requires_replace(),
        )
        .attribute(
            Attribute::required("caps", AttributeType::StringMap)
                .describe("Capabilities keyed by mon, mgr, osd, mds or mds-caps"),
        )
        .attribute(
            Attribute::optional_computed("key", AttributeType::String)
                .describe("cephx secret; generated by the cluster when omitted")
                .sensitive()
                .requires_replace()
                .use_state_for_unknown(),
        )
        .attribute(
            Attribute::computed("keyring", AttributeType::String)
                .describe("Keyring text for this entity")
                .sensitive()
                .use_state_for_unknown(),
        )
}

pub struct AuthResource {
    client: ClientSlot,
}

impl AuthResource {
    pub fn new(client: ClientSlot) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ResourceHandler for AuthResource {
    type Model = AuthModel;

    const TYPE_NAME: &'static str = "ceph_auth";

    fn schema() -> Schema {
        auth_attributes(Schema::for_model::<AuthModel>("A cephx auth principal and its capabilities"))
    }

    fn id(model: &AuthModel) -> String {
        model.entity.clone()
    }

    fn validate(model: &AuthModel) -> Result<()> {
        validate_entity(&model.entity)?;
        Capabilities::from_map(&model.caps)?;
        Ok(())
    }

    async fn create(&self, ctx: &OpContext, plan: AuthModel) -> Result<AuthModel> {
        let caps = Capabilities::from_map(&plan.caps)?;
        self.client
            .get()?
            .cluster_users()
            .create(ctx, &plan.entity, &caps, plan.key.value().map(String::as_str))
            .await?;
        Ok(plan)
    }

    async fn read(&self, ctx: &OpContext, state: AuthModel) -> Result<Option<AuthModel>> {
        match self.client.get()?.cluster_users().get(ctx, &state.entity).await {
            Ok((entry, keyring)) => Ok(Some(project(entry, keyring))),
            Err(e) if export_missing(&e) => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn update(&self, ctx: &OpContext, _prior: AuthModel, plan: AuthModel) -> Result<AuthModel> {
        let caps = Capabilities::from_map(&plan.caps)?;
        self.client
            .get()?
            .cluster_users()
            .update_caps(ctx, &plan.entity, &caps)
            .await?;
        Ok(plan)
    }

    async fn delete(&self, ctx: &OpContext, state: AuthModel) -> Result<()> {
        self.client.get()?.cluster_users().delete(ctx, &state.entity).await
    }

    async fn import(&self, ctx: &OpContext, id: &str) -> Result<AuthModel> {
        validate_entity(id)?;
        let (entry, keyring) = self.client.get()?.cluster_users().get(ctx, id).await?;
        Ok(project(entry, keyring))
    }

    fn verify(plan: &AuthModel, observed: &AuthModel) -> Result<()> {
        DriftCheck::new(Self::TYPE_NAME, &plan.entity)
            .exact("entity", &plan.entity, &observed.entity)
            .exact("caps", &plan.caps, &observed.caps)
            .nullable("key", &plan.key, &observed.key)
            .finish()
    }
}
