//! Resource schemas and plan modifiers
//!
//! Each resource, data source and ephemeral resource publishes a [`Schema`]:
//! an attribute table with plan-time behaviour flags plus the JSON Schema of
//! its model. The two plan modifiers the provider relies on are implemented
//! here:
//!
//! - `use_state_for_unknown`: a computed attribute left unknown by the plan
//!   keeps its prior state value (secrets survive no-op plans)
//! - `requires_replace`: a change forces destroy + create

use schemars::JsonSchema;
use serde::Serialize;
use serde_json::Value;

// =============================================================================
// Attributes
// =============================================================================

/// Attribute value type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AttributeType {
    String,
    Int,
    Float,
    Bool,
    StringMap,
    StringList,
    Object,
    ObjectList,
}

/// One attribute of a schema
#[derive(Debug, Clone, Serialize)]
pub struct Attribute {
    pub name: &'static str,
    #[serde(rename = "type")]
    pub ty: AttributeType,
    pub description: &'static str,
    pub required: bool,
    pub optional: bool,
    pub computed: bool,
    pub sensitive: bool,
    pub requires_replace: bool,
    pub use_state_for_unknown: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub one_of: Option<&'static [&'static str]>,
}

impl Attribute {
    fn new(name: &'static str, ty: AttributeType) -> Self {
        Self {
            name,
            ty,
            description: "",
            required: false,
            optional: false,
            computed: false,
            sensitive: false,
            requires_replace: false,
            use_state_for_unknown: false,
            one_of: None,
        }
    }

    /// Must be set in configuration
    pub fn required(name: &'static str, ty: AttributeType) -> Self {
        Self {
            required: true,
            ..Self::new(name, ty)
        }
    }

    /// May be set in configuration; never filled in by the provider
    pub fn optional(name: &'static str, ty: AttributeType) -> Self {
        Self {
            optional: true,
            ..Self::new(name, ty)
        }
    }

    /// Read-only, filled in by the provider
    pub fn computed(name: &'static str, ty: AttributeType) -> Self {
        Self {
            computed: true,
            ..Self::new(name, ty)
        }
    }

    /// May be set in configuration, otherwise filled in by the provider
    pub fn optional_computed(name: &'static str, ty: AttributeType) -> Self {
        Self {
            optional: true,
            computed: true,
            ..Self::new(name, ty)
        }
    }

    pub fn describe(mut self, description: &'static str) -> Self {
        self.description = description;
        self
    }

    pub fn sensitive(mut self) -> Self {
        self.sensitive = true;
        self
    }

    pub fn requires_replace(mut self) -> Self {
        self.requires_replace = true;
        self
    }

    pub fn use_state_for_unknown(mut self) -> Self {
        self.use_state_for_unknown = true;
        self
    }

    pub fn one_of(mut self, values: &'static [&'static str]) -> Self {
        self.one_of = Some(values);
        self
    }
}

// =============================================================================
// Schema
// =============================================================================

/// Schema of one resource, data source or ephemeral resource
#[derive(Debug, Clone, Serialize)]
pub struct Schema {
    pub version: u32,
    pub description: &'static str,
    pub attributes: Vec<Attribute>,
    /// JSON Schema of the model document
    pub json_schema: Value,
}

/// Result of applying plan modifiers
#[derive(Debug, Clone, PartialEq)]
pub struct PlannedChange {
    /// Proposed state with modifiers applied
    pub planned_state: Value,
    /// Attributes whose change forces replacement
    pub requires_replace: Vec<String>,
}

impl Schema {
    /// Start a schema whose JSON Schema is derived from model `M`
    pub fn for_model<M: JsonSchema>(description: &'static str) -> Self {
        let root = schemars::schema_for!(M);
        Self {
            version: 0,
            description,
            attributes: Vec::new(),
            json_schema: serde_json::to_value(root).unwrap_or(Value::Null),
        }
    }

    pub fn attribute(mut self, attribute: Attribute) -> Self {
        self.attributes.push(attribute);
        self
    }

    pub fn get(&self, name: &str) -> Option<&Attribute> {
        self.attributes.iter().find(|a| a.name == name)
    }

    /// Apply `use_state_for_unknown` and collect `requires_replace` paths.
    ///
    /// Unknown values are keys absent from `proposed`. On create (`prior` is
    /// `None`) the proposal is returned untouched.
    pub fn modify_plan(&self, prior: Option<&Value>, mut proposed: Value) -> PlannedChange {
        let Some(prior) = prior.and_then(Value::as_object) else {
            return PlannedChange {
                planned_state: proposed,
                requires_replace: Vec::new(),
            };
        };

        if let Some(planned) = proposed.as_object_mut() {
            for attr in self.attributes.iter().filter(|a| a.use_state_for_unknown) {
                if planned.contains_key(attr.name) {
                    continue;
                }
                if let Some(previous) = prior.get(attr.name) {
                    planned.insert(attr.name.to_string(), previous.clone());
                }
            }
        }

        let requires_replace = self.replace_paths(&Value::Object(prior.clone()), &proposed);
        PlannedChange {
            planned_state: proposed,
            requires_replace,
        }
    }

    /// Replace-only attributes whose planned value differs from the prior one.
    /// Attributes still unknown in the plan are not counted.
    pub fn replace_paths(&self, prior: &Value, planned: &Value) -> Vec<String> {
        self.attributes
            .iter()
            .filter(|a| a.requires_replace)
            .filter_map(|a| {
                let next = planned.get(a.name)?;
                let previous = prior.get(a.name).unwrap_or(&Value::Null);
                if a.computed && next.is_null() {
                    return None;
                }
                (next != previous).then(|| a.name.to_string())
            })
            .collect()
    }

    /// Names of sensitive attributes
    pub fn sensitive_attributes(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.attributes
            .iter()
            .filter(|a| a.sensitive)
            .map(|a| a.name)
    }
}
