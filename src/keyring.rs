//! Keyring Codec
//!
//! Parses and emits the Ceph keyring text format:
//!
//! ```text
//! [client.admin]
//!     key = AQBvaBFZAAAAABAA9VHgwCgQS3uM3bgCFStbpg==
//!     caps mon = "allow *"
//!     caps osd = allow rw pool=foo
//! ```
//!
//! The dashboard returns exported keyrings as one opaque string; this module
//! splits it into structured entries.

use crate::error::{Error, Result};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;

/// One `[entity]` block of a keyring
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyringEntry {
    /// Entity name, e.g. `client.admin`
    pub entity: String,
    /// Base64 secret; absent when the block has no `key =` line
    pub key: Option<String>,
    /// Capability type to grant string, in file order
    pub caps: IndexMap<String, String>,
}

impl KeyringEntry {
    pub fn new(entity: impl Into<String>) -> Self {
        Self {
            entity: entity.into(),
            ..Default::default()
        }
    }
}

/// Parse keyring text into its entries, in file order
pub fn parse(text: &str) -> Result<Vec<KeyringEntry>> {
    let mut entries = Vec::new();
    let mut current: Option<KeyringEntry> = None;

    for (idx, raw) in text.lines().enumerate() {
        let lineno = idx + 1;
        let line = raw.trim();
        if line.is_empty() {
            continue;
        }
        // Comments are only accepted inside a record
        if current.is_some() && (line.starts_with('#') || line.starts_with(';')) {
            continue;
        }

        if let Some(rest) = line.strip_prefix('[') {
            let entity = rest.strip_suffix(']').ok_or_else(|| {
                Error::InvalidKeyring(format!("line {}: unterminated section header", lineno))
            })?;
            let entity = entity.trim();
            if entity.is_empty() {
                return Err(Error::InvalidKeyring(format!(
                    "line {}: empty entity name",
                    lineno
                )));
            }
            if let Some(done) = current.replace(KeyringEntry::new(entity)) {
                entries.push(done);
            }
            continue;
        }

        let entry = current.as_mut().ok_or_else(|| {
            Error::InvalidKeyring(format!(
                "line {}: expected [entity] header before {:?}",
                lineno, line
            ))
        })?;

        let (lhs, rhs) = line.split_once('=').ok_or_else(|| {
            Error::InvalidKeyring(format!("line {}: expected `name = value`", lineno))
        })?;
        let lhs = lhs.trim();
        let rhs = rhs.trim();

        if lhs == "key" {
            entry.key = Some(rhs.to_string());
        } else if lhs == "caps" {
            return Err(Error::InvalidKeyring(format!(
                "line {}: caps without a type",
                lineno
            )));
        } else if let Some(cap_type) = lhs
            .strip_prefix("caps")
            .filter(|rest| rest.starts_with(char::is_whitespace))
        {
            entry
                .caps
                .insert(cap_type.trim().to_string(), unquote(rhs).to_string());
        }
        // Other settings (auid, ...) carry nothing the provider models.
    }

    entries.extend(current);

    if entries.is_empty() {
        return Err(Error::InvalidKeyring("no entries found".into()));
    }
    Ok(entries)
}

/// Parse keyring text that must contain exactly the given entity
pub fn parse_entity(text: &str, entity: &str) -> Result<KeyringEntry> {
    parse(text)?
        .into_iter()
        .find(|e| e.entity == entity)
        .ok_or_else(|| Error::InvalidKeyring(format!("no entry for {}", entity)))
}

/// Serialize entries back into keyring text. Caps values are written unquoted.
pub fn serialize(entries: &[KeyringEntry]) -> String {
    let mut out = String::new();
    for entry in entries {
        let _ = writeln!(out, "[{}]", entry.entity);
        if let Some(key) = &entry.key {
            let _ = writeln!(out, "\tkey = {}", key);
        }
        for (cap_type, grant) in &entry.caps {
            let _ = writeln!(out, "\tcaps {} = {}", cap_type, grant);
        }
    }
    out
}

fn unquote(value: &str) -> &str {
    value
        .strip_prefix('"')
        .and_then(|v| v.strip_suffix('"'))
        .unwrap_or(value)
}
