//! Domain Ports - adapter contracts between the host and the provider
//!
//! The host drives typed handlers through three ports:
//!
//! - [`ResourceHandler`]: create / read / update / delete / import of one
//!   managed entity kind
//! - [`DataSourceHandler`]: read-only lookups
//! - [`EphemeralHandler`]: objects that live for one plan step (open / close)
//!
//! Handlers work on typed models. [`ResourceAdapter`], [`DataSourceAdapter`]
//! and [`EphemeralAdapter`] erase them to JSON documents for the host and
//! enforce the reconciliation invariants shared by every resource:
//! validation before any HTTP call, a verification read after every write,
//! and a confirming read after every delete.

use crate::context::OpContext;
use crate::domain::schema::{PlannedChange, Schema};
use crate::error::{Error, Result};
use async_trait::async_trait;
use schemars::JsonSchema;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info};

// =============================================================================
// Typed Ports
// =============================================================================

/// Typed lifecycle hooks of one managed resource kind
#[async_trait]
pub trait ResourceHandler: Send + Sync + 'static {
    /// State / plan document
    type Model: Serialize + DeserializeOwned + JsonSchema + Clone + Send + Sync + 'static;

    /// Host-facing type name, e.g. `ceph_auth`
    const TYPE_NAME: &'static str;

    fn schema() -> Schema;

    /// Natural identifier, as accepted by `import`
    fn id(model: &Self::Model) -> String;

    /// Plan-time checks that need no cluster round trip
    fn validate(_model: &Self::Model) -> Result<()> {
        Ok(())
    }

    /// Issue the create call. The returned model must carry the identity
    /// needed to read the object back.
    async fn create(&self, ctx: &OpContext, plan: Self::Model) -> Result<Self::Model>;

    /// Refresh from the cluster; `None` when the object no longer exists
    async fn read(&self, ctx: &OpContext, state: Self::Model) -> Result<Option<Self::Model>>;

    /// Issue the update call for in-place changes
    async fn update(&self, ctx: &OpContext, prior: Self::Model, plan: Self::Model) -> Result<Self::Model>;

    async fn delete(&self, ctx: &OpContext, state: Self::Model) -> Result<()>;

    /// Hydrate state from scratch given the natural identifier
    async fn import(&self, ctx: &OpContext, id: &str) -> Result<Self::Model>;

    /// Compare intended against observed state after a write
    fn verify(plan: &Self::Model, observed: &Self::Model) -> Result<()>;

    /// Merge plan-only values (never returned by the cluster) and declared
    /// spellings of normalized values into observed state. Handlers whose
    /// reads normalize the same way call it against prior state on refresh.
    fn finalize(_plan: &Self::Model, observed: Self::Model) -> Self::Model {
        observed
    }
}

/// Typed read-only lookup
#[async_trait]
pub trait DataSourceHandler: Send + Sync + 'static {
    type Config: DeserializeOwned + JsonSchema + Send + Sync + 'static;
    type Model: Serialize + JsonSchema + Send + Sync + 'static;

    const TYPE_NAME: &'static str;

    fn schema() -> Schema;

    fn validate(_config: &Self::Config) -> Result<()> {
        Ok(())
    }

    async fn read(&self, ctx: &OpContext, config: Self::Config) -> Result<Self::Model>;
}

/// Opaque bytes the host keeps between `open` and `close`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrivateState(pub Vec<u8>);

/// Typed ephemeral resource: created on open, destroyed on close
#[async_trait]
pub trait EphemeralHandler: Send + Sync + 'static {
    type Config: DeserializeOwned + JsonSchema + Send + Sync + 'static;
    type Model: Serialize + JsonSchema + Send + Sync + 'static;

    const TYPE_NAME: &'static str;

    fn schema() -> Schema;

    fn validate(_config: &Self::Config) -> Result<()> {
        Ok(())
    }

    async fn open(&self, ctx: &OpContext, config: Self::Config) -> Result<(Self::Model, PrivateState)>;

    /// Must not depend on in-process memory: everything needed comes from `private`
    async fn close(&self, ctx: &OpContext, private: PrivateState) -> Result<()>;
}

// =============================================================================
// Host-facing (type-erased) Ports
// =============================================================================

/// Resource as seen by the host: JSON in, JSON out
#[async_trait]
pub trait Resource: Send + Sync {
    fn type_name(&self) -> &'static str;
    fn schema(&self) -> Schema;
    fn validate_config(&self, config: &Value) -> Result<()>;
    fn plan(&self, prior: Option<&Value>, proposed: Value) -> Result<PlannedChange>;
    async fn create(&self, ctx: &OpContext, planned: Value) -> Result<Value>;
    async fn read(&self, ctx: &OpContext, state: Value) -> Result<Option<Value>>;
    async fn update(&self, ctx: &OpContext, prior: Value, planned: Value) -> Result<Value>;
    async fn delete(&self, ctx: &OpContext, state: Value) -> Result<()>;
    async fn import(&self, ctx: &OpContext, id: &str) -> Result<Value>;
}

/// Data source as seen by the host
#[async_trait]
pub trait DataSource: Send + Sync {
    fn type_name(&self) -> &'static str;
    fn schema(&self) -> Schema;
    fn validate_config(&self, config: &Value) -> Result<()>;
    async fn read(&self, ctx: &OpContext, config: Value) -> Result<Value>;
}

/// Result of opening an ephemeral resource
#[derive(Debug, Clone)]
pub struct OpenedEphemeral {
    pub result: Value,
    pub private: PrivateState,
}

/// Ephemeral resource as seen by the host
#[async_trait]
pub trait EphemeralResource: Send + Sync {
    fn type_name(&self) -> &'static str;
    fn schema(&self) -> Schema;
    fn validate_config(&self, config: &Value) -> Result<()>;
    async fn open(&self, ctx: &OpContext, config: Value) -> Result<OpenedEphemeral>;
    async fn close(&self, ctx: &OpContext, private: PrivateState) -> Result<()>;
}

pub type ResourceRef = Arc<dyn Resource>;
pub type DataSourceRef = Arc<dyn DataSource>;
pub type EphemeralResourceRef = Arc<dyn EphemeralResource>;

// =============================================================================
// Reconciliation Engine
// =============================================================================

/// Wraps a [`ResourceHandler`] with the reconciliation state machine
pub struct ResourceAdapter<H>(pub H);

impl<H: ResourceHandler> ResourceAdapter<H> {
    fn decode(doc: Value) -> Result<H::Model> {
        Ok(serde_json::from_value(doc)?)
    }

    fn encode(model: &H::Model) -> Result<Value> {
        Ok(serde_json::to_value(model)?)
    }

    /// Authoritative read after a write; a vanished object is drift too
    async fn verify_write(&self, ctx: &OpContext, plan: &H::Model, written: H::Model) -> Result<H::Model> {
        let id = H::id(&written);
        let observed = self.0.read(ctx, written).await?.ok_or_else(|| Error::PostWriteDrift {
            resource: H::TYPE_NAME.to_string(),
            id: id.clone(),
            attribute: "existence".into(),
            expected: "present".into(),
            observed: "absent".into(),
        })?;
        H::verify(plan, &observed)?;
        Ok(H::finalize(plan, observed))
    }
}

#[async_trait]
impl<H: ResourceHandler> Resource for ResourceAdapter<H> {
    fn type_name(&self) -> &'static str {
        H::TYPE_NAME
    }

    fn schema(&self) -> Schema {
        H::schema()
    }

    fn validate_config(&self, config: &Value) -> Result<()> {
        let model = Self::decode(config.clone())?;
        H::validate(&model)
    }

    fn plan(&self, prior: Option<&Value>, proposed: Value) -> Result<PlannedChange> {
        let change = H::schema().modify_plan(prior, proposed);
        H::validate(&Self::decode(change.planned_state.clone())?)?;
        Ok(change)
    }

    async fn create(&self, ctx: &OpContext, planned: Value) -> Result<Value> {
        let plan = Self::decode(planned)?;
        H::validate(&plan)?;

        info!("Creating {} {}", H::TYPE_NAME, H::id(&plan));
        let written = self.0.create(ctx, plan.clone()).await?;
        let state = self.verify_write(ctx, &plan, written).await?;
        Self::encode(&state)
    }

    async fn read(&self, ctx: &OpContext, state: Value) -> Result<Option<Value>> {
        let state = Self::decode(state)?;
        let id = H::id(&state);
        match self.0.read(ctx, state).await? {
            Some(fresh) => Ok(Some(Self::encode(&fresh)?)),
            None => {
                info!("{} {} no longer exists; removing from state", H::TYPE_NAME, id);
                Ok(None)
            }
        }
    }

    async fn update(&self, ctx: &OpContext, prior: Value, planned: Value) -> Result<Value> {
        let replace = H::schema().replace_paths(&prior, &planned);
        if !replace.is_empty() {
            return Err(Error::RequiresReplace {
                resource: H::TYPE_NAME.to_string(),
                attributes: replace,
            });
        }

        let prior = Self::decode(prior)?;
        let plan = Self::decode(planned)?;
        H::validate(&plan)?;

        info!("Updating {} {}", H::TYPE_NAME, H::id(&plan));
        let written = self.0.update(ctx, prior, plan.clone()).await?;
        let state = self.verify_write(ctx, &plan, written).await?;
        Self::encode(&state)
    }

    async fn delete(&self, ctx: &OpContext, state: Value) -> Result<()> {
        let state = Self::decode(state)?;
        let id = H::id(&state);

        info!("Deleting {} {}", H::TYPE_NAME, id);
        self.0.delete(ctx, state.clone()).await?;

        match self.0.read(ctx, state).await {
            Ok(None) => Ok(()),
            Err(e) if e.is_not_found() => Ok(()),
            Ok(Some(_)) => Err(Error::PostWriteDrift {
                resource: H::TYPE_NAME.to_string(),
                id,
                attribute: "existence".into(),
                expected: "absent".into(),
                observed: "present".into(),
            }),
            Err(e) => Err(e),
        }
    }

    async fn import(&self, ctx: &OpContext, id: &str) -> Result<Value> {
        debug!("Importing {} {}", H::TYPE_NAME, id);
        let model = self.0.import(ctx, id).await?;
        Self::encode(&model)
    }
}

/// Wraps a [`DataSourceHandler`]
pub struct DataSourceAdapter<H>(pub H);

#[async_trait]
impl<H: DataSourceHandler> DataSource for DataSourceAdapter<H> {
    fn type_name(&self) -> &'static str {
        H::TYPE_NAME
    }

    fn schema(&self) -> Schema {
        H::schema()
    }

    fn validate_config(&self, config: &Value) -> Result<()> {
        let config: H::Config = serde_json::from_value(config.clone())?;
        H::validate(&config)
    }

    async fn read(&self, ctx: &OpContext, config: Value) -> Result<Value> {
        let config: H::Config = serde_json::from_value(config)?;
        H::validate(&config)?;
        let model = self.0.read(ctx, config).await?;
        Ok(serde_json::to_value(model)?)
    }
}

/// Wraps an [`EphemeralHandler`]
pub struct EphemeralAdapter<H>(pub H);

#[async_trait]
impl<H: EphemeralHandler> EphemeralResource for EphemeralAdapter<H> {
    fn type_name(&self) -> &'static str {
        H::TYPE_NAME
    }

    fn schema(&self) -> Schema {
        H::schema()
    }

    fn validate_config(&self, config: &Value) -> Result<()> {
        let config: H::Config = serde_json::from_value(config.clone())?;
        H::validate(&config)
    }

    async fn open(&self, ctx: &OpContext, config: Value) -> Result<OpenedEphemeral> {
        let config: H::Config = serde_json::from_value(config)?;
        H::validate(&config)?;
        let (model, private) = self.0.open(ctx, config).await?;
        Ok(OpenedEphemeral {
            result: serde_json::to_value(model)?,
            private,
        })
    }

    async fn close(&self, ctx: &OpContext, private: PrivateState) -> Result<()> {
        self.0.close(ctx, private).await
    }
}
