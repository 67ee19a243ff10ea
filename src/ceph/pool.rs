//! RADOS pools (`/api/osd/pool`)
//!
//! Pool create, edit and delete run as dashboard tasks (`pool/create`,
//! `pool/edit`, `pool/delete`) and usually answer `202`.

use crate::ceph::wire;
use crate::client::{segment, ApiRequest, CephClient};
use crate::context::OpContext;
use crate::error::Result;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

const POOL_PATH: &str = "osd/pool";

// =============================================================================
// Wire Types
// =============================================================================

/// One pool as reported by the dashboard
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PoolInfo {
    pub pool_name: String,
    /// `replicated` or `erasure`
    #[serde(default, rename = "type", deserialize_with = "wire::lenient_string")]
    pub pool_type: Option<String>,
    #[serde(default, deserialize_with = "wire::lenient_u64")]
    pub size: Option<u64>,
    #[serde(default, deserialize_with = "wire::lenient_u64")]
    pub min_size: Option<u64>,
    #[serde(default, deserialize_with = "wire::lenient_u64")]
    pub pg_num: Option<u64>,
    /// Rule name; older releases report the numeric rule id
    #[serde(default, deserialize_with = "wire::lenient_string")]
    pub crush_rule: Option<String>,
    #[serde(default, deserialize_with = "wire::lenient_f64")]
    pub primary_affinity: Option<f64>,
    #[serde(default, deserialize_with = "application_names")]
    pub application_metadata: Vec<String>,
    #[serde(default)]
    pub erasure_code_profile: Option<String>,
    #[serde(default)]
    pub pg_autoscale_mode: Option<String>,
    #[serde(default, deserialize_with = "wire::lenient_u64")]
    pub quota_max_bytes: Option<u64>,
    #[serde(default, deserialize_with = "wire::lenient_u64")]
    pub quota_max_objects: Option<u64>,
    /// Per-pool option overrides, including the compression settings
    #[serde(default)]
    pub options: Map<String, Value>,
}

/// Compression settings of a pool
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PoolCompression {
    pub mode: Option<String>,
    pub algorithm: Option<String>,
    pub required_ratio: Option<f64>,
    pub min_blob_size: Option<u64>,
    pub max_blob_size: Option<u64>,
}

impl PoolInfo {
    fn option(&self, name: &str) -> Option<&Value> {
        self.options.get(name).filter(|v| !v.is_null())
    }

    pub fn compression(&self) -> PoolCompression {
        let text = |name: &str| self.option(name).map(wire::stringify).filter(|s| !s.is_empty());
        PoolCompression {
            mode: text("compression_mode"),
            algorithm: text("compression_algorithm"),
            required_ratio: text("compression_required_ratio").and_then(|s| s.parse().ok()),
            min_blob_size: text("compression_min_blob_size").and_then(|s| s.parse().ok()),
            max_blob_size: text("compression_max_blob_size").and_then(|s| s.parse().ok()),
        }
    }
}

/// Application metadata comes either as a list or as `{name: {..}}`
fn application_names<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Vec<String>, D::Error> {
    let raw = Option::<Value>::deserialize(deserializer)?;
    let mut names = match raw {
        Some(Value::Array(items)) => items.iter().map(wire::stringify).collect(),
        Some(Value::Object(map)) => map.keys().cloned().collect(),
        _ => Vec::new(),
    };
    names.sort();
    Ok(names)
}

/// Create / edit body. Unset fields are left to the cluster defaults.
#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct PoolSpec {
    pub pool: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pool_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pg_num: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_size: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rule_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub erasure_code_profile: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pg_autoscale_mode: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub primary_affinity: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub application_metadata: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quota_max_bytes: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quota_max_objects: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub compression_mode: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub compression_algorithm: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub compression_required_ratio: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub compression_min_blob_size: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub compression_max_blob_size: Option<u64>,
}

// =============================================================================
// Operations
// =============================================================================

/// Pool operations
pub struct Pools<'a> {
    client: &'a CephClient,
}

impl CephClient {
    pub fn pools(&self) -> Pools<'_> {
        Pools { client: self }
    }
}

impl Pools<'_> {
    fn path(name: &str) -> String {
        format!("{}/{}", POOL_PATH, segment(name))
    }

    pub async fn list(&self, ctx: &OpContext) -> Result<Vec<PoolInfo>> {
        self.client.get(ctx, POOL_PATH).await
    }

    pub async fn get(&self, ctx: &OpContext, name: &str) -> Result<PoolInfo> {
        self.client
            .call(ctx, ApiRequest::get(Self::path(name)).query("stats", "false"))
            .await
            .map_err(|e| e.into_not_found("pool", name))
    }

    pub async fn create(&self, ctx: &OpContext, spec: &PoolSpec) -> Result<()> {
        self.client
            .execute(ctx, ApiRequest::post(POOL_PATH).json(spec)?)
            .await
    }

    /// Apply the set fields of `spec` to an existing pool
    pub async fn update(&self, ctx: &OpContext, name: &str, spec: &PoolSpec) -> Result<()> {
        self.client
            .execute(ctx, ApiRequest::put(Self::path(name)).json(spec)?)
            .await
            .map_err(|e| e.into_not_found("pool", name))
    }

    pub async fn delete(&self, ctx: &OpContext, name: &str) -> Result<()> {
        self.client
            .execute(ctx, ApiRequest::delete(Self::path(name)))
            .await
            .map_err(|e| e.into_not_found("pool", name))
    }
}
