//! Manager module configuration (`/api/mgr/module`)
//!
//! Module options are typed on the server (bool / int / float / str). They
//! are exchanged here as strings: reads are stringified with
//! [`wire::stringify`], and writes send strings that the server coerces to
//! each option's declared type.

use crate::ceph::wire;
use crate::client::{segment, CephClient};
use crate::context::OpContext;
use crate::error::Result;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Entry of `GET /api/mgr/module`
#[derive(Debug, Clone, Deserialize)]
pub struct MgrModuleInfo {
    pub name: String,
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub always_on: bool,
}

#[derive(Debug, Serialize)]
struct SetModuleConfig<'a> {
    config: &'a BTreeMap<String, String>,
}

/// Stringify every value of a module configuration
pub fn stringify_config(raw: &BTreeMap<String, Value>) -> BTreeMap<String, String> {
    raw.iter()
        .filter(|(_, v)| !v.is_null())
        .map(|(k, v)| (k.clone(), wire::stringify(v)))
        .collect()
}

/// Manager module operations
pub struct MgrModules<'a> {
    client: &'a CephClient,
}

impl CephClient {
    pub fn mgr_modules(&self) -> MgrModules<'_> {
        MgrModules { client: self }
    }
}

impl MgrModules<'_> {
    pub async fn list(&self, ctx: &OpContext) -> Result<Vec<MgrModuleInfo>> {
        self.client.get(ctx, "mgr/module").await
    }

    /// Effective configuration of a module (defaults included), stringified
    pub async fn config(&self, ctx: &OpContext, module: &str) -> Result<BTreeMap<String, String>> {
        let raw: BTreeMap<String, Value> = self
            .client
            .get(ctx, &format!("mgr/module/{}", segment(module)))
            .await
            .map_err(|e| e.into_not_found("mgr module", module))?;
        Ok(stringify_config(&raw))
    }

    /// Set the given options; options not named are left untouched
    pub async fn set_config(&self, ctx: &OpContext, module: &str, config: &BTreeMap<String, String>) -> Result<()> {
        let _: Value = self
            .client
            .put(
                ctx,
                &format!("mgr/module/{}", segment(module)),
                &SetModuleConfig { config },
            )
            .await
            .map_err(|e| e.into_not_found("mgr module", module))?;
        Ok(())
    }
}
