//! Managed resources
//!
//! One [`ResourceHandler`](crate::domain::ResourceHandler) per Ceph object
//! kind. Handlers project between typed plan models and the typed wire
//! structs of [`crate::ceph`]; the reconciliation state machine itself lives
//! in [`ResourceAdapter`](crate::domain::ResourceAdapter).

pub mod auth;
pub mod config_value;
pub mod crush_rule;
pub mod erasure_code_profile;
pub mod mgr_module_config;
pub mod pool;
pub mod rgw_key;
pub mod rgw_subuser;
pub mod rgw_user;

use crate::domain::Nullable;
use crate::error::{Error, Result};

/// Map a `NotFound` read into `None`
pub(crate) fn found<T>(result: Result<T>) -> Result<Option<T>> {
    match result {
        Ok(v) => Ok(Some(v)),
        Err(e) if e.is_not_found() => Ok(None),
        Err(e) => Err(e),
    }
}

/// Empty strings from the wire mean "not set"
pub(crate) fn non_empty(value: impl Into<String>) -> Nullable<String> {
    let value = value.into();
    if value.is_empty() {
        Nullable::Null
    } else {
        Nullable::Value(value)
    }
}

/// Reject an explicitly empty string attribute
pub(crate) fn require_non_empty(attribute: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(Error::InvalidAttribute {
            attribute: attribute.to_string(),
            reason: "must not be empty".into(),
        });
    }
    Ok(())
}

/// Check a closed-set string attribute
pub(crate) fn one_of(attribute: &str, value: &Nullable<String>, allowed: &[&str]) -> Result<()> {
    match value.value() {
        Some(v) if !allowed.contains(&v.as_str()) => Err(Error::UnknownEnum {
            kind: attribute.to_string(),
            value: v.clone(),
        }),
        _ => Ok(()),
    }
}
