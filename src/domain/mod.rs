//! Domain layer - reconciliation engine and port definitions
//!
//! This module defines the contracts adapters implement (ports), the schema
//! and plan-modifier machinery, three-valued attribute values, and the
//! post-write drift checks every resource runs.

pub mod drift;
pub mod ports;
pub mod schema;
pub mod value;

pub use drift::{float_eq, keep_numeric_spelling, numeric_str_eq, DriftCheck, FLOAT_TOLERANCE};
pub use ports::*;
pub use schema::{Attribute, AttributeType, PlannedChange, Schema};
pub use value::Nullable;
