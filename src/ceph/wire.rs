//! Wire projection helpers
//!
//! The dashboard is loose with JSON types: flags arrive as `0/1`, `true`,
//! or `"true"`; numbers sometimes arrive as strings. These helpers absorb
//! that at the deserialization boundary.

use serde::de::{self, Deserializer};
use serde::Deserialize;
use serde_json::Value;

/// Accept `true/false`, `0/1` and their string forms
pub fn flag<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
    let raw = Option::<Value>::deserialize(deserializer)?;
    match raw {
        None | Some(Value::Null) => Ok(false),
        Some(v) => value_to_flag(&v).ok_or_else(|| de::Error::custom(format!("not a flag: {}", v))),
    }
}

pub fn value_to_flag(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::Number(n) => n.as_i64().map(|i| i != 0),
        Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "1" | "yes" | "on" => Some(true),
            "false" | "0" | "no" | "off" | "" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

/// Optional unsigned integer that may arrive as a JSON string
pub fn lenient_u64<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<u64>, D::Error> {
    match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(n)) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| *f >= 0.0 && f.fract() == 0.0).map(|f| f as u64))
            .map(Some)
            .ok_or_else(|| de::Error::custom(format!("not an unsigned integer: {}", n))),
        Some(Value::String(s)) if s.trim().is_empty() => Ok(None),
        Some(Value::String(s)) => s
            .trim()
            .parse::<u64>()
            .map(Some)
            .map_err(|e| de::Error::custom(format!("{:?}: {}", s, e))),
        Some(other) => Err(de::Error::custom(format!("not an unsigned integer: {}", other))),
    }
}

/// Optional float that may arrive as a JSON string
pub fn lenient_f64<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<f64>, D::Error> {
    match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(n)) => Ok(n.as_f64()),
        Some(Value::String(s)) if s.trim().is_empty() => Ok(None),
        Some(Value::String(s)) => s
            .trim()
            .parse::<f64>()
            .map(Some)
            .map_err(|e| de::Error::custom(format!("{:?}: {}", s, e))),
        Some(other) => Err(de::Error::custom(format!("not a number: {}", other))),
    }
}

/// Optional string that may arrive as a number (e.g. CRUSH rule id vs name)
pub fn lenient_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
    match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => Ok(None),
        Some(v) => Ok(Some(stringify(&v))),
    }
}

/// Canonical string form of a typed config value.
///
/// Booleans become `true`/`false`; integers keep every digit; floats use
/// positional decimal notation, never exponents.
pub fn stringify(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::Bool(b) => b.to_string(),
        Value::String(s) => s.clone(),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                i.to_string()
            } else if let Some(u) = n.as_u64() {
                u.to_string()
            } else {
                n.as_f64().map(|f| format!("{}", f)).unwrap_or_else(|| n.to_string())
            }
        }
        other => other.to_string(),
    }
}
