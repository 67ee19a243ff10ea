//! Ephemeral `ceph_auth`: a short-lived cephx principal
//!
//! Open creates the principal and returns its key; close deletes it
//! unconditionally. The entity name travels through the host's private
//! state, so close works in a fresh process.

use crate::ceph::Capabilities;
use crate::context::OpContext;
use crate::domain::{Attribute, AttributeType, EphemeralHandler, PrivateState, Schema};
use crate::error::Result;
use crate::provider::resources::auth::{self, AuthModel};
use crate::provider::ClientSlot;
use async_trait::async_trait;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct AuthEphemeralConfig {
    pub entity: String,
    pub caps: BTreeMap<String, String>,
}

#[derive(Debug, Serialize, Deserialize)]
struct AuthPrivate {
    entity: String,
}

impl AuthPrivate {
    fn encode(&self) -> Result<PrivateState> {
        Ok(PrivateState(serde_json::to_vec(self)?))
    }

    fn decode(private: &PrivateState) -> Result<Self> {
        Ok(serde_json::from_slice(&private.0)?)
    }
}

pub struct AuthEphemeral {
    client: ClientSlot,
}

impl AuthEphemeral {
    pub fn new(client: ClientSlot) -> Self {
        Self { client }
    }
}

#[async_trait]
impl EphemeralHandler for AuthEphemeral {
    type Config = AuthEphemeralConfig;
    type Model = AuthModel;

    const TYPE_NAME: &'static str = "ceph_auth";

    fn schema() -> Schema {
        Schema::for_model::<AuthModel>("A cephx principal that exists for one plan step")
            .attribute(Attribute::required("entity", AttributeType::String))
            .attribute(Attribute::required("caps", AttributeType::StringMap))
            .attribute(Attribute::computed("key", AttributeType::String).sensitive())
            .attribute(Attribute::computed("keyring", AttributeType::String).sensitive())
    }

    fn validate(config: &AuthEphemeralConfig) -> Result<()> {
        auth::validate_entity(&config.entity)?;
        Capabilities::from_map(&config.caps)?;
        Ok(())
    }

    async fn open(&self, ctx: &OpContext, config: AuthEphemeralConfig) -> Result<(AuthModel, PrivateState)> {
        let caps = Capabilities::from_map(&config.caps)?;
        let client = self.client.get()?;
        let users = client.cluster_users();

        info!("Opening ephemeral principal {}", config.entity);
        users.create(ctx, &config.entity, &caps, None).await?;

        let private = AuthPrivate {
            entity: config.entity.clone(),
        };
        match users.get(ctx, &config.entity).await {
            Ok((entry, keyring)) => Ok((auth::project(entry, keyring), private.encode()?)),
            Err(e) => {
                warn!("Reading {} after create failed, removing it: {}", config.entity, e);
                if let Err(cleanup) = users.delete(ctx, &config.entity).await {
                    warn!("Failed to remove {}: {}", config.entity, cleanup);
                }
                Err(e)
            }
        }
    }

    async fn close(&self, ctx: &OpContext, private: PrivateState) -> Result<()> {
        let AuthPrivate { entity } = AuthPrivate::decode(&private)?;
        info!("Closing ephemeral principal {}", entity);
        match self.client.get()?.cluster_users().delete(ctx, &entity).await {
            Err(e) if e.is_not_found() => {
                debug!("{} already gone", entity);
                Ok(())
            }
            other => other,
        }
    }
}
