//! Erasure-code profiles (`/api/erasure_code_profile`)
//!
//! Profile keys use Ceph's dashed names on the wire (`crush-failure-domain`)
//! and every value is a string inside the monitor; the dashboard sometimes
//! converts `k` and `m` to numbers. Profiles are immutable once created.

use crate::ceph::wire;
use crate::client::{segment, ApiRequest, CephClient};
use crate::context::OpContext;
use crate::error::Result;
use serde::{Deserialize, Serialize};

/// A profile, as sent on create and as read back
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ErasureCodeProfileInfo {
    #[serde(default)]
    pub name: String,
    #[serde(default, deserialize_with = "wire::lenient_u64", skip_serializing_if = "Option::is_none")]
    pub k: Option<u64>,
    #[serde(default, deserialize_with = "wire::lenient_u64", skip_serializing_if = "Option::is_none")]
    pub m: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plugin: Option<String>,
    #[serde(
        rename = "crush-failure-domain",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub crush_failure_domain: Option<String>,
    #[serde(
        rename = "crush-min-failure-domain",
        default,
        deserialize_with = "wire::lenient_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub crush_min_failure_domain: Option<String>,
    #[serde(
        rename = "crush-osds-per-failure-domain",
        default,
        deserialize_with = "wire::lenient_u64",
        skip_serializing_if = "Option::is_none"
    )]
    pub crush_osds_per_failure_domain: Option<u64>,
    #[serde(
        rename = "packetsize",
        default,
        deserialize_with = "wire::lenient_u64",
        skip_serializing_if = "Option::is_none"
    )]
    pub packet_size: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub technique: Option<String>,
    #[serde(rename = "crush-root", default, skip_serializing_if = "Option::is_none")]
    pub crush_root: Option<String>,
    #[serde(
        rename = "crush-device-class",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub crush_device_class: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub directory: Option<String>,
}

/// Erasure-code profile operations
pub struct ErasureCodeProfiles<'a> {
    client: &'a CephClient,
}

impl CephClient {
    pub fn erasure_code_profiles(&self) -> ErasureCodeProfiles<'_> {
        ErasureCodeProfiles { client: self }
    }
}

impl ErasureCodeProfiles<'_> {
    pub async fn list(&self, ctx: &OpContext) -> Result<Vec<ErasureCodeProfileInfo>> {
        self.client.get(ctx, "erasure_code_profile").await
    }

    pub async fn get(&self, ctx: &OpContext, name: &str) -> Result<ErasureCodeProfileInfo> {
        let mut profile: ErasureCodeProfileInfo = self
            .client
            .get(ctx, &format!("erasure_code_profile/{}", segment(name)))
            .await
            .map_err(|e| e.into_not_found("erasure code profile", name))?;
        if profile.name.is_empty() {
            profile.name = name.to_string();
        }
        Ok(profile)
    }

    pub async fn create(&self, ctx: &OpContext, profile: &ErasureCodeProfileInfo) -> Result<()> {
        self.client
            .execute(ctx, ApiRequest::post("erasure_code_profile").json(profile)?)
            .await
    }

    pub async fn delete(&self, ctx: &OpContext, name: &str) -> Result<()> {
        self.client
            .execute(
                ctx,
                ApiRequest::delete(format!("erasure_code_profile/{}", segment(name))),
            )
            .await
            .map_err(|e| e.into_not_found("erasure code profile", name))
    }
}
