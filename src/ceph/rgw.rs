//! RADOS Gateway users, subusers and keys (`/api/rgw/user`)
//!
//! The dashboard proxies RGW admin ops. User creation may answer `202` with
//! an `rgw/user/create` task; the client resolves that transparently.
//! Keys have no endpoint of their own: they are listed on the owning user.

use crate::ceph::wire;
use crate::client::{segment, ApiRequest, CephClient};
use crate::context::OpContext;
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use tracing::debug;

// =============================================================================
// Identifiers and Enums
// =============================================================================

/// `parent_uid:subuser_name`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SubuserId {
    pub uid: String,
    pub name: String,
}

impl SubuserId {
    pub fn new(uid: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            uid: uid.into(),
            name: name.into(),
        }
    }

    /// Build from parts, checking both are non-empty and colon-free
    pub fn try_new(uid: &str, name: &str) -> Result<Self> {
        format!("{}:{}", uid, name).parse()
    }
}

impl fmt::Display for SubuserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.uid, self.name)
    }
}

impl FromStr for SubuserId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.split_once(':') {
            Some((uid, name)) if !uid.is_empty() && !name.is_empty() && !name.contains(':') => {
                Ok(SubuserId::new(uid, name))
            }
            _ => Err(Error::InvalidId {
                id: s.to_string(),
                reason: "expected <uid>:<subuser>".into(),
            }),
        }
    }
}

/// Subuser access level
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubuserPermission {
    Read,
    Write,
    ReadWrite,
    FullControl,
}

impl SubuserPermission {
    pub const MODEL_VALUES: &'static [&'static str] = &["read", "write", "readwrite", "full-control"];

    /// Value used in plans and state
    pub fn as_model(self) -> &'static str {
        match self {
            SubuserPermission::Read => "read",
            SubuserPermission::Write => "write",
            SubuserPermission::ReadWrite => "readwrite",
            SubuserPermission::FullControl => "full-control",
        }
    }

    /// Value the dashboard accepts as `access`
    pub fn as_wire(self) -> &'static str {
        match self {
            SubuserPermission::FullControl => "full",
            other => other.as_model(),
        }
    }

    pub fn from_model(value: &str) -> Result<Self> {
        match value {
            "read" => Ok(SubuserPermission::Read),
            "write" => Ok(SubuserPermission::Write),
            "readwrite" => Ok(SubuserPermission::ReadWrite),
            "full-control" => Ok(SubuserPermission::FullControl),
            other => Err(Error::UnknownEnum {
                kind: "subuser permission".into(),
                value: other.to_string(),
            }),
        }
    }

    /// RGW reports `full-control` and `read-write`; the dashboard form
    /// uses `full` and `readwrite`
    pub fn from_wire(value: &str) -> Result<Self> {
        match value {
            "full" | "full-control" => Ok(SubuserPermission::FullControl),
            "read-write" | "readwrite" => Ok(SubuserPermission::ReadWrite),
            "read" => Ok(SubuserPermission::Read),
            "write" => Ok(SubuserPermission::Write),
            other => Err(Error::UnknownEnum {
                kind: "subuser permission".into(),
                value: other.to_string(),
            }),
        }
    }
}

// =============================================================================
// Wire Types
// =============================================================================

/// `GET /api/rgw/user/{uid}`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RgwUser {
    #[serde(default)]
    pub user_id: String,
    #[serde(default)]
    pub uid: String,
    #[serde(default)]
    pub tenant: String,
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub max_buckets: i64,
    #[serde(default, deserialize_with = "wire::flag")]
    pub suspended: bool,
    #[serde(default, deserialize_with = "wire::flag")]
    pub system: bool,
    #[serde(default, deserialize_with = "wire::flag")]
    pub admin: bool,
    #[serde(default)]
    pub subusers: Vec<RgwSubuserInfo>,
    #[serde(default)]
    pub keys: Vec<RgwS3KeyInfo>,
    #[serde(default)]
    pub swift_keys: Vec<RgwSwiftKeyInfo>,
}

impl RgwUser {
    /// Canonical user id as reported by RGW
    pub fn id(&self) -> &str {
        if self.user_id.is_empty() {
            &self.uid
        } else {
            &self.user_id
        }
    }

    pub fn subuser(&self, id: &SubuserId) -> Option<&RgwSubuserInfo> {
        let full = id.to_string();
        self.subusers.iter().find(|s| s.id == full)
    }

    pub fn s3_key(&self, access_key: &str) -> Option<&RgwS3KeyInfo> {
        self.keys.iter().find(|k| k.access_key == access_key)
    }

    pub fn swift_key(&self, id: &SubuserId) -> Option<&RgwSwiftKeyInfo> {
        let full = id.to_string();
        self.swift_keys.iter().find(|k| k.user == full)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RgwSubuserInfo {
    /// `uid:subuser`
    pub id: String,
    #[serde(default)]
    pub permissions: String,
}

fn active_default() -> bool {
    true
}

#[derive(Debug, Clone, Deserialize)]
pub struct RgwS3KeyInfo {
    /// Owning user or `uid:subuser`
    pub user: String,
    pub access_key: String,
    #[serde(default)]
    pub secret_key: String,
    #[serde(default = "active_default", deserialize_with = "wire::flag")]
    pub active: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RgwSwiftKeyInfo {
    pub user: String,
    #[serde(default)]
    pub secret_key: String,
    #[serde(default = "active_default", deserialize_with = "wire::flag")]
    pub active: bool,
}

/// Body of `POST /api/rgw/user`
#[derive(Debug, Clone, Serialize)]
pub struct CreateRgwUser {
    pub uid: String,
    pub display_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_buckets: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system: Option<bool>,
    /// `0` or `1`
    pub suspended: u8,
    pub generate_key: bool,
}

/// Body of `PUT /api/rgw/user/{uid}`
#[derive(Debug, Clone, Serialize)]
pub struct UpdateRgwUser {
    pub display_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_buckets: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system: Option<bool>,
    pub suspended: u8,
}

#[derive(Debug, Serialize)]
struct CreateSubuser<'a> {
    subuser: &'a str,
    access: &'a str,
    key_type: &'a str,
    generate_secret: bool,
}

#[derive(Debug, Serialize)]
struct EditSubuser<'a> {
    access: &'a str,
}

#[derive(Debug, Serialize)]
struct CreateKey<'a> {
    key_type: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    subuser: Option<&'a str>,
    generate_key: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    access_key: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    secret_key: Option<&'a str>,
}

pub fn suspended_to_wire(suspended: bool) -> u8 {
    u8::from(suspended)
}

// =============================================================================
// Operations
// =============================================================================

/// RGW user, subuser and key operations
pub struct RgwUsers<'a> {
    client: &'a CephClient,
}

impl CephClient {
    pub fn rgw_users(&self) -> RgwUsers<'_> {
        RgwUsers { client: self }
    }
}

impl RgwUsers<'_> {
    fn user_path(uid: &str) -> String {
        format!("rgw/user/{}", segment(uid))
    }

    /// All user ids
    pub async fn list(&self, ctx: &OpContext) -> Result<Vec<String>> {
        self.client.get(ctx, "rgw/user").await
    }

    pub async fn get(&self, ctx: &OpContext, uid: &str) -> Result<RgwUser> {
        self.client
            .get(ctx, &Self::user_path(uid))
            .await
            .map_err(|e| e.into_not_found("rgw user", uid))
    }

    pub async fn create(&self, ctx: &OpContext, request: &CreateRgwUser) -> Result<()> {
        let created: Value = self
            .client
            .call(ctx, ApiRequest::post("rgw/user").json(request)?)
            .await?;
        debug!("RGW user {} created: {}", request.uid, !created.is_null());
        Ok(())
    }

    pub async fn update(&self, ctx: &OpContext, uid: &str, request: &UpdateRgwUser) -> Result<()> {
        self.client
            .execute(ctx, ApiRequest::put(Self::user_path(uid)).json(request)?)
            .await
            .map_err(|e| e.into_not_found("rgw user", uid))
    }

    pub async fn delete(&self, ctx: &OpContext, uid: &str) -> Result<()> {
        self.client
            .execute(ctx, ApiRequest::delete(Self::user_path(uid)))
            .await
            .map_err(|e| e.into_not_found("rgw user", uid))
    }

    // =========================================================================
    // Subusers
    // =========================================================================

    pub async fn create_subuser(&self, ctx: &OpContext, id: &SubuserId, permission: SubuserPermission) -> Result<()> {
        let body = CreateSubuser {
            subuser: &id.name,
            access: permission.as_wire(),
            key_type: "swift",
            generate_secret: false,
        };
        self.client
            .execute(
                ctx,
                ApiRequest::post(format!("{}/subuser", Self::user_path(&id.uid))).json(&body)?,
            )
            .await
    }

    pub async fn update_subuser(&self, ctx: &OpContext, id: &SubuserId, permission: SubuserPermission) -> Result<()> {
        let body = EditSubuser {
            access: permission.as_wire(),
        };
        self.client
            .execute(
                ctx,
                ApiRequest::put(format!("{}/subuser/{}", Self::user_path(&id.uid), segment(&id.name)))
                    .json(&body)?,
            )
            .await
            .map_err(|e| e.into_not_found("rgw subuser", &id.to_string()))
    }

    /// Remove a subuser together with its keys
    pub async fn delete_subuser(&self, ctx: &OpContext, id: &SubuserId) -> Result<()> {
        let request = ApiRequest::delete(format!("{}/subuser/{}", Self::user_path(&id.uid), segment(&id.name)))
            .query("purge_keys", "true");
        self.client
            .execute(ctx, request)
            .await
            .map_err(|e| e.into_not_found("rgw subuser", &id.to_string()))
    }

    // =========================================================================
    // Keys
    // =========================================================================

    /// Add an S3 key to `uid` (or to one of its subusers) and return it.
    ///
    /// Without an explicit access key RGW generates one; the new key is then
    /// identified by diffing the user's key list around the call.
    pub async fn create_s3_key(
        &self,
        ctx: &OpContext,
        uid: &str,
        subuser: Option<&str>,
        access_key: Option<&str>,
        secret_key: Option<&str>,
    ) -> Result<RgwS3KeyInfo> {
        let before: BTreeSet<String> = self
            .get(ctx, uid)
            .await?
            .keys
            .into_iter()
            .map(|k| k.access_key)
            .collect();

        let body = CreateKey {
            key_type: "s3",
            subuser,
            generate_key: access_key.is_none() || secret_key.is_none(),
            access_key,
            secret_key,
        };
        self.client
            .execute(
                ctx,
                ApiRequest::post(format!("{}/key", Self::user_path(uid))).json(&body)?,
            )
            .await?;

        let owner = match subuser {
            Some(sub) => SubuserId::new(uid, sub).to_string(),
            None => uid.to_string(),
        };
        let user = self.get(ctx, uid).await?;
        user.keys
            .into_iter()
            .find(|k| match access_key {
                Some(wanted) => k.access_key == wanted,
                None => k.user == owner && !before.contains(&k.access_key),
            })
            .ok_or_else(|| Error::not_found("rgw s3 key", format!("new key of {}", owner)))
    }

    pub async fn delete_s3_key(&self, ctx: &OpContext, uid: &str, subuser: Option<&str>, access_key: &str) -> Result<()> {
        let mut request = ApiRequest::delete(format!("{}/key", Self::user_path(uid)))
            .query("key_type", "s3")
            .query("access_key", access_key);
        if let Some(sub) = subuser {
            request = request.query("subuser", sub);
        }
        self.client
            .execute(ctx, request)
            .await
            .map_err(|e| e.into_not_found("rgw s3 key", access_key))
    }

    /// Set (or generate) the Swift secret of a subuser
    pub async fn create_swift_key(
        &self,
        ctx: &OpContext,
        id: &SubuserId,
        secret_key: Option<&str>,
    ) -> Result<RgwSwiftKeyInfo> {
        let body = CreateKey {
            key_type: "swift",
            subuser: Some(&id.name),
            generate_key: secret_key.is_none(),
            access_key: None,
            secret_key,
        };
        self.client
            .execute(
                ctx,
                ApiRequest::post(format!("{}/key", Self::user_path(&id.uid))).json(&body)?,
            )
            .await?;

        let user = self.get(ctx, &id.uid).await?;
        user.swift_key(id)
            .cloned()
            .ok_or_else(|| Error::not_found("rgw swift key", id.to_string()))
    }

    pub async fn delete_swift_key(&self, ctx: &OpContext, id: &SubuserId) -> Result<()> {
        let request = ApiRequest::delete(format!("{}/key", Self::user_path(&id.uid)))
            .query("key_type", "swift")
            .query("subuser", &id.name);
        self.client
            .execute(ctx, request)
            .await
            .map_err(|e| e.into_not_found("rgw swift key", &id.to_string()))
    }
}
