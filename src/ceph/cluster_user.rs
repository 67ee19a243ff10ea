//! Cluster auth principals (`/api/cluster/user`)
//!
//! cephx principals are keyed by entity (`client.admin`, `mgr.x`). The
//! dashboard lists caps as a map but exports keys only as keyring text, so
//! reads go through `POST cluster/user/export` and the keyring codec.

use crate::client::{segment, ApiRequest, CephClient};
use crate::context::OpContext;
use crate::error::{Error, Result};
use crate::keyring::{self, KeyringEntry};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use tracing::debug;

// =============================================================================
// Capability Types
// =============================================================================

/// Server types a cephx capability may target
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum CapabilityType {
    Mon,
    Mgr,
    Osd,
    Mds,
    /// Passed through verbatim; accepted alongside `mds`
    MdsCaps,
}

impl CapabilityType {
    pub const ALL: [CapabilityType; 5] = [
        CapabilityType::Mon,
        CapabilityType::Mgr,
        CapabilityType::Osd,
        CapabilityType::Mds,
        CapabilityType::MdsCaps,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            CapabilityType::Mon => "mon",
            CapabilityType::Mgr => "mgr",
            CapabilityType::Osd => "osd",
            CapabilityType::Mds => "mds",
            CapabilityType::MdsCaps => "mds-caps",
        }
    }
}

impl fmt::Display for CapabilityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CapabilityType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        CapabilityType::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| Error::UnsupportedCapability(s.to_string()))
    }
}

/// Validated, ordered capability set
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Capabilities(BTreeMap<CapabilityType, String>);

impl Capabilities {
    /// Convert a plan-level map, rejecting empty sets and unknown keys
    pub fn from_map(caps: &BTreeMap<String, String>) -> Result<Self> {
        if caps.is_empty() {
            return Err(Error::InvalidAttribute {
                attribute: "caps".into(),
                reason: "at least one capability is required".into(),
            });
        }
        caps.iter()
            .map(|(k, v)| Ok((k.parse::<CapabilityType>()?, v.clone())))
            .collect::<Result<BTreeMap<_, _>>>()
            .map(Capabilities)
    }

    pub fn iter(&self) -> impl Iterator<Item = (CapabilityType, &str)> {
        self.0.iter().map(|(t, v)| (*t, v.as_str()))
    }

    pub fn to_map(&self) -> BTreeMap<String, String> {
        self.iter().map(|(t, v)| (t.as_str().to_string(), v.to_string())).collect()
    }

    fn grants(&self) -> Vec<CapabilityGrant<'_>> {
        self.iter()
            .map(|(t, cap)| CapabilityGrant {
                entity: t.as_str(),
                cap,
            })
            .collect()
    }

    fn into_keyring_entry(self, entity: &str, key: &str) -> KeyringEntry {
        let mut entry = KeyringEntry::new(entity);
        entry.key = Some(key.to_string());
        for (t, v) in self.0 {
            entry.caps.insert(t.as_str().to_string(), v);
        }
        entry
    }
}

// =============================================================================
// Wire Types
// =============================================================================

/// Entry of `GET /api/cluster/user`
#[derive(Debug, Clone, Deserialize)]
pub struct ClusterUser {
    pub entity: String,
    #[serde(default)]
    pub caps: BTreeMap<String, String>,
    #[serde(default)]
    pub key: Option<String>,
}

/// One grant; `entity` here is the capability type, as the dashboard names it
#[derive(Debug, Serialize)]
struct CapabilityGrant<'a> {
    entity: &'a str,
    cap: &'a str,
}

#[derive(Debug, Serialize)]
struct CreateUser<'a> {
    user_entity: &'a str,
    capabilities: Vec<CapabilityGrant<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    import_data: Option<String>,
}

#[derive(Debug, Serialize)]
struct EditUser<'a> {
    user_entity: &'a str,
    capabilities: Vec<CapabilityGrant<'a>>,
}

#[derive(Debug, Serialize)]
struct ExportUsers<'a> {
    entities: &'a [&'a str],
}

// =============================================================================
// Operations
// =============================================================================

/// Auth principal operations
pub struct ClusterUsers<'a> {
    client: &'a CephClient,
}

impl CephClient {
    pub fn cluster_users(&self) -> ClusterUsers<'_> {
        ClusterUsers { client: self }
    }
}

impl ClusterUsers<'_> {
    pub async fn list(&self, ctx: &OpContext) -> Result<Vec<ClusterUser>> {
        self.client.get(ctx, "cluster/user").await
    }

    /// Create a principal. With `key` the principal is imported as a keyring
    /// so the caller-supplied secret is kept.
    pub async fn create(&self, ctx: &OpContext, entity: &str, caps: &Capabilities, key: Option<&str>) -> Result<()> {
        let import_data = key.map(|k| keyring::serialize(&[caps.clone().into_keyring_entry(entity, k)]));
        let body = CreateUser {
            user_entity: entity,
            capabilities: caps.grants(),
            import_data,
        };
        self.client
            .execute(ctx, ApiRequest::post("cluster/user").json(&body)?)
            .await
    }

    /// Replace the capability set of an existing principal
    pub async fn update_caps(&self, ctx: &OpContext, entity: &str, caps: &Capabilities) -> Result<()> {
        let body = EditUser {
            user_entity: entity,
            capabilities: caps.grants(),
        };
        self.client
            .execute(
                ctx,
                ApiRequest::put(format!("cluster/user/{}", segment(entity))).json(&body)?,
            )
            .await
    }

    pub async fn delete(&self, ctx: &OpContext, entity: &str) -> Result<()> {
        self.client
            .execute(ctx, ApiRequest::delete(format!("cluster/user/{}", segment(entity))))
            .await
            .map_err(|e| e.into_not_found("auth entity", entity))
    }

    /// Export keyring text for the given entities
    pub async fn export(&self, ctx: &OpContext, entities: &[&str]) -> Result<String> {
        self.client
            .post(ctx, "cluster/user/export", &ExportUsers { entities })
            .await
    }

    /// Export and decode a single principal. Export failures are returned
    /// untouched; see [`export_missing`] to classify them.
    pub async fn get(&self, ctx: &OpContext, entity: &str) -> Result<(KeyringEntry, String)> {
        let text = self.export(ctx, &[entity]).await?;
        debug!("Exported keyring for {}", entity);
        let entry = keyring::parse_entity(&text, entity)?;
        Ok((entry, text))
    }
}

/// Whether an export failure means the entity does not exist
pub fn export_missing(err: &Error) -> bool {
    match err {
        Error::Api { body, .. } => body.contains("unable to export user") || err.is_not_found(),
        other => other.is_not_found(),
    }
}
