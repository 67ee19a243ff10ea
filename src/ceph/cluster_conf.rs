//! Centralized cluster configuration (`/api/cluster_conf`)
//!
//! Every option carries one value per section (`global`, `osd`,
//! `osd/class:ssd`, `mgr`, ...). Manager module options live in the same
//! namespace under `mgr/<module>/<option>`.

use crate::ceph::wire;
use crate::client::{segment, ApiRequest, CephClient};
use crate::context::OpContext;
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Section manager module options are stored under
pub const MGR_SECTION: &str = "mgr";

/// One option of the configuration dump
#[derive(Debug, Clone, Deserialize)]
pub struct ConfigOption {
    pub name: String,
    #[serde(rename = "type", default)]
    pub option_type: Option<String>,
    #[serde(default)]
    pub value: Vec<SectionValue>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SectionValue {
    pub section: String,
    pub value: Value,
}

impl ConfigOption {
    /// Stringified value set in `section`
    pub fn value_in(&self, section: &str) -> Option<String> {
        self.value
            .iter()
            .find(|v| v.section == section)
            .map(|v| wire::stringify(&v.value))
    }
}

#[derive(Debug, Serialize)]
struct SetOption<'a> {
    name: &'a str,
    value: [SectionValue; 1],
}

/// Full option name of a manager module option
pub fn module_option_name(module: &str, option: &str) -> String {
    format!("mgr/{}/{}", module, option)
}

/// Cluster configuration operations
pub struct ClusterConfig<'a> {
    client: &'a CephClient,
}

impl CephClient {
    pub fn cluster_config(&self) -> ClusterConfig<'_> {
        ClusterConfig { client: self }
    }
}

impl ClusterConfig<'_> {
    pub async fn list(&self, ctx: &OpContext) -> Result<Vec<ConfigOption>> {
        self.client.get(ctx, "cluster_conf").await
    }

    pub async fn get(&self, ctx: &OpContext, name: &str) -> Result<ConfigOption> {
        self.client
            .get(ctx, &format!("cluster_conf/{}", segment(name)))
            .await
            .map_err(|e| e.into_not_found("config option", name))
    }

    /// Value of `name` in `section`; `NotFound` when the section has none
    pub async fn value(&self, ctx: &OpContext, section: &str, name: &str) -> Result<String> {
        self.get(ctx, name)
            .await?
            .value_in(section)
            .ok_or_else(|| Error::not_found("config value", format!("{}/{}", section, name)))
    }

    pub async fn set(&self, ctx: &OpContext, section: &str, name: &str, value: &str) -> Result<()> {
        let body = SetOption {
            name,
            value: [SectionValue {
                section: section.to_string(),
                value: Value::String(value.to_string()),
            }],
        };
        self.client
            .execute(ctx, ApiRequest::post("cluster_conf").json(&body)?)
            .await
    }

    pub async fn delete(&self, ctx: &OpContext, section: &str, name: &str) -> Result<()> {
        let request = ApiRequest::delete(format!("cluster_conf/{}", segment(name))).query("section", section);
        self.client
            .execute(ctx, request)
            .await
            .map_err(|e| e.into_not_found("config value", &format!("{}/{}", section, name)))
    }

    /// Options explicitly set for a manager module, keyed by short option name
    pub async fn module_options(&self, ctx: &OpContext, module: &str) -> Result<BTreeMap<String, String>> {
        let prefix = module_option_name(module, "");
        Ok(self
            .list(ctx)
            .await?
            .into_iter()
            .filter_map(|option| {
                let short = option.name.strip_prefix(&prefix)?.to_string();
                let value = option.value_in(MGR_SECTION)?;
                Some((short, value))
            })
            .collect())
    }
}
