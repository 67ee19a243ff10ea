//! Three-valued attribute values
//!
//! Plan and state documents distinguish an attribute that is absent (unset,
//! or unknown until apply) from one explicitly set to `null` and from one
//! holding a value. `Option<T>` cannot express all three, and "zero means
//! absent" sentinels lose real zeros, so optional attributes use
//! [`Nullable<T>`] with:
//!
//! ```ignore
//! #[serde(default, skip_serializing_if = "Nullable::is_unset")]
//! pub pg_num: Nullable<u32>,
//! ```

use schemars::gen::SchemaGenerator;
use schemars::schema::Schema;
use schemars::JsonSchema;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// An optional attribute value: unset, explicit null, or a value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Nullable<T> {
    /// Key absent from the document
    Unset,
    /// Key present with `null`
    Null,
    /// Key present with a value
    Value(T),
}

impl<T> Default for Nullable<T> {
    fn default() -> Self {
        Nullable::Unset
    }
}

impl<T> Nullable<T> {
    pub fn is_unset(&self) -> bool {
        matches!(self, Nullable::Unset)
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Nullable::Null)
    }

    pub fn is_value(&self) -> bool {
        matches!(self, Nullable::Value(_))
    }

    pub fn value(&self) -> Option<&T> {
        match self {
            Nullable::Value(v) => Some(v),
            _ => None,
        }
    }

    pub fn into_option(self) -> Option<T> {
        match self {
            Nullable::Value(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_ref(&self) -> Nullable<&T> {
        match self {
            Nullable::Unset => Nullable::Unset,
            Nullable::Null => Nullable::Null,
            Nullable::Value(v) => Nullable::Value(v),
        }
    }

    pub fn map<U, F: FnOnce(T) -> U>(self, f: F) -> Nullable<U> {
        match self {
            Nullable::Unset => Nullable::Unset,
            Nullable::Null => Nullable::Null,
            Nullable::Value(v) => Nullable::Value(f(v)),
        }
    }

    /// Keep a value, otherwise fall back to `other`
    pub fn or(self, other: Nullable<T>) -> Nullable<T> {
        match self {
            Nullable::Value(_) => self,
            _ => other,
        }
    }
}

impl<T: Clone> Nullable<T> {
    pub fn cloned_option(&self) -> Option<T> {
        self.value().cloned()
    }

    /// Wire value for a field the API clears with a sentinel: an explicit
    /// null sends `clear`, unset sends nothing
    pub fn cloned_or_clear(&self, clear: T) -> Option<T> {
        match self {
            Nullable::Unset => None,
            Nullable::Null => Some(clear),
            Nullable::Value(v) => Some(v.clone()),
        }
    }
}

impl<T> From<Option<T>> for Nullable<T> {
    fn from(value: Option<T>) -> Self {
        match value {
            Some(v) => Nullable::Value(v),
            None => Nullable::Null,
        }
    }
}

impl<T: Serialize> Serialize for Nullable<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Nullable::Value(v) => v.serialize(serializer),
            _ => serializer.serialize_none(),
        }
    }
}

impl<'de, T: Deserialize<'de>> Deserialize<'de> for Nullable<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        // Only reached when the key is present; absent keys use `Default`.
        Option::<T>::deserialize(deserializer).map(Nullable::from)
    }
}

impl<T: JsonSchema> JsonSchema for Nullable<T> {
    fn is_referenceable() -> bool {
        false
    }

    fn schema_name() -> String {
        Option::<T>::schema_name()
    }

    fn json_schema(gen: &mut SchemaGenerator) -> Schema {
        Option::<T>::json_schema(gen)
    }
}
