//! Schema - Define type schemas for resources
//!
//! Providers define schemas for each resource type, enabling type
//! validation before any API call is made.

use std::collections::HashMap;
use std::fmt;

use crate::resource::Value;

/// Attribute type
#[derive(Debug, Clone)]
pub enum AttributeType {
    /// String
    String,
    /// Integer
    Int,
    /// Floating point number (integers are accepted)
    Float,
    /// Boolean
    Bool,
    /// Enum (list of allowed values)
    Enum(Vec<String>),
    /// Custom type (with validation function)
    Custom {
        name: String,
        base: Box<AttributeType>,
        validate: fn(&Value) -> Result<(), String>,
    },
    /// List
    List(Box<AttributeType>),
    /// Map
    Map(Box<AttributeType>),
    /// Nested configuration block, written as a list of objects
    Block(Vec<AttributeSchema>),
}

impl AttributeType {
    /// Check if a value conforms to this type
    pub fn validate(&self, value: &Value) -> Result<(), TypeError> {
        match (self, value) {
            (AttributeType::String, Value::String(_)) => Ok(()),
            (AttributeType::Int, Value::Int(_)) => Ok(()),
            (AttributeType::Float, Value::Float(_) | Value::Int(_)) => Ok(()),
            (AttributeType::Bool, Value::Bool(_)) => Ok(()),

            (AttributeType::Enum(variants), Value::String(s)) => {
                if variants.iter().any(|v| v == s) {
                    Ok(())
                } else {
                    Err(TypeError::InvalidEnumVariant {
                        value: s.clone(),
                        expected: variants.clone(),
                    })
                }
            }

            (AttributeType::Custom { validate, base, .. }, v) => {
                base.validate(v)?;
                validate(v).map_err(|msg| TypeError::ValidationFailed { message: msg })
            }

            (AttributeType::List(inner), Value::List(items)) => {
                for (i, item) in items.iter().enumerate() {
                    inner.validate(item).map_err(|e| TypeError::ListItemError {
                        index: i,
                        inner: Box::new(e),
                    })?;
                }
                Ok(())
            }

            (AttributeType::Map(inner), Value::Map(map)) => {
                for (k, v) in map {
                    inner.validate(v).map_err(|e| TypeError::MapValueError {
                        key: k.clone(),
                        inner: Box::new(e),
                    })?;
                }
                Ok(())
            }

            (AttributeType::Block(fields), Value::List(items)) => {
                for (i, item) in items.iter().enumerate() {
                    let result = match item {
                        Value::Map(map) => validate_block(fields, map),
                        other => Err(TypeError::TypeMismatch {
                            expected: "Block".to_string(),
                            got: other.type_name(),
                        }),
                    };
                    result.map_err(|e| TypeError::ListItemError {
                        index: i,
                        inner: Box::new(e),
                    })?;
                }
                Ok(())
            }

            _ => Err(TypeError::TypeMismatch {
                expected: self.type_name(),
                got: value.type_name(),
            }),
        }
    }

    fn type_name(&self) -> String {
        match self {
            AttributeType::String => "String".to_string(),
            AttributeType::Int => "Int".to_string(),
            AttributeType::Float => "Float".to_string(),
            AttributeType::Bool => "Bool".to_string(),
            AttributeType::Enum(variants) => format!("Enum({})", variants.join(" | ")),
            AttributeType::Custom { name, .. } => name.clone(),
            AttributeType::List(inner) => format!("List<{}>", inner.type_name()),
            AttributeType::Map(inner) => format!("Map<{}>", inner.type_name()),
            AttributeType::Block(_) => "Block".to_string(),
        }
    }
}

impl fmt::Display for AttributeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.type_name())
    }
}

/// Validate the fields of one block item
fn validate_block(fields: &[AttributeSchema], map: &HashMap<String, Value>) -> Result<(), TypeError> {
    for field in fields {
        match map.get(&field.name) {
            Some(v) => {
                field
                    .attr_type
                    .validate(v)
                    .map_err(|e| TypeError::MapValueError {
                        key: field.name.clone(),
                        inner: Box::new(e),
                    })?;
                field.check_max_items(v)?;
            }
            None if field.required && field.default.is_none() => {
                return Err(TypeError::MissingRequired {
                    name: field.name.clone(),
                });
            }
            None => {}
        }
    }
    for key in map.keys() {
        if !fields.iter().any(|f| &f.name == key) {
            return Err(TypeError::UnknownAttribute { name: key.clone() });
        }
    }
    Ok(())
}

/// Type error
#[derive(Debug, Clone, thiserror::Error)]
pub enum TypeError {
    #[error("Type mismatch: expected {expected}, got {got}")]
    TypeMismatch { expected: String, got: String },

    #[error("Invalid enum variant '{value}', expected one of: {}", expected.join(", "))]
    InvalidEnumVariant {
        value: String,
        expected: Vec<String>,
    },

    #[error("Validation failed: {message}")]
    ValidationFailed { message: String },

    #[error("Required attribute '{name}' is missing")]
    MissingRequired { name: String },

    #[error("Unknown attribute '{name}'")]
    UnknownAttribute { name: String },

    #[error("Attribute '{name}' is computed and cannot be set")]
    ComputedOnly { name: String },

    #[error("Attribute '{name}' allows at most {max} items, got {got}")]
    TooManyItems { name: String, max: usize, got: usize },

    #[error("List item at index {index}: {inner}")]
    ListItemError { index: usize, inner: Box<TypeError> },

    #[error("Map value for key '{key}': {inner}")]
    MapValueError { key: String, inner: Box<TypeError> },
}

impl Value {
    fn type_name(&self) -> String {
        match self {
            Value::String(_) => "String".to_string(),
            Value::Int(_) => "Int".to_string(),
            Value::Float(_) => "Float".to_string(),
            Value::Bool(_) => "Bool".to_string(),
            Value::List(_) => "List".to_string(),
            Value::Map(_) => "Map".to_string(),
        }
    }
}

/// Attribute schema
#[derive(Debug, Clone)]
pub struct AttributeSchema {
    pub name: String,
    pub attr_type: AttributeType,
    pub required: bool,
    /// Set by the provider; users may not set it unless also optional
    pub computed: bool,
    /// Optional attribute whose value the provider fills in when unset
    pub optional_computed: bool,
    /// Changing this attribute requires replacing the resource
    pub force_new: bool,
    pub max_items: Option<usize>,
    pub default: Option<Value>,
    /// Sent with every create and update but never reported back, so it
    /// cannot drift
    pub write_only: bool,
    pub description: Option<String>,
}

impl AttributeSchema {
    pub fn new(name: impl Into<String>, attr_type: AttributeType) -> Self {
        Self {
            name: name.into(),
            attr_type,
            required: false,
            computed: false,
            optional_computed: false,
            force_new: false,
            max_items: None,
            default: None,
            write_only: false,
            description: None,
        }
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn computed(mut self) -> Self {
        self.computed = true;
        self
    }

    /// Optional input that is also populated from the API when left unset
    pub fn optional_computed(mut self) -> Self {
        self.optional_computed = true;
        self
    }

    pub fn force_new(mut self) -> Self {
        self.force_new = true;
        self
    }

    pub fn max_items(mut self, max: usize) -> Self {
        self.max_items = Some(max);
        self
    }

    pub fn with_default(mut self, value: Value) -> Self {
        self.default = Some(value);
        self
    }

    pub fn write_only(mut self) -> Self {
        self.write_only = true;
        self
    }

    pub fn with_description(mut self, desc: impl Into<String>) -> Self {
        self.description = Some(desc.into());
        self
    }

    /// Whether `want` differs from the observed value. Attributes the API
    /// does not report count as unchanged while left at their default.
    fn differs(&self, current: Option<&Value>, want: &Value) -> bool {
        if self.write_only {
            return false;
        }
        match current {
            Some(have) => !have.satisfies(want),
            None => self.default.as_ref().is_none_or(|d| !d.equivalent(want)),
        }
    }

    /// Whether leaving the attribute out of the desired state removes a
    /// value the object still has. Computed and write-only attributes are
    /// never removed this way.
    fn removed(&self, current: Option<&Value>) -> bool {
        if self.computed || self.optional_computed || self.write_only {
            return false;
        }
        current.is_some_and(|have| match have {
            Value::String(s) => !s.is_empty(),
            Value::List(items) => !items.is_empty(),
            Value::Map(map) => !map.is_empty(),
            _ => true,
        })
    }

    fn check_max_items(&self, value: &Value) -> Result<(), TypeError> {
        if let (Some(max), Value::List(items)) = (self.max_items, value)
            && items.len() > max
        {
            return Err(TypeError::TooManyItems {
                name: self.name.clone(),
                max,
                got: items.len(),
            });
        }
        Ok(())
    }
}

/// Rewrites desired attributes into the form the API reports them in
pub type Normalizer = fn(&mut HashMap<String, Value>);

/// Resource schema
#[derive(Debug, Clone)]
pub struct ResourceSchema {
    pub resource_type: String,
    pub attributes: HashMap<String, AttributeSchema>,
    pub description: Option<String>,
    pub normalizer: Option<Normalizer>,
}

impl ResourceSchema {
    pub fn new(resource_type: impl Into<String>) -> Self {
        Self {
            resource_type: resource_type.into(),
            attributes: HashMap::new(),
            description: None,
            normalizer: None,
        }
    }

    /// Applied to desired attributes before they are compared
    pub fn with_normalizer(mut self, normalizer: Normalizer) -> Self {
        self.normalizer = Some(normalizer);
        self
    }

    pub fn attribute(mut self, schema: AttributeSchema) -> Self {
        self.attributes.insert(schema.name.clone(), schema);
        self
    }

    pub fn with_description(mut self, desc: impl Into<String>) -> Self {
        self.description = Some(desc.into());
        self
    }

    /// Attribute names in alphabetical order
    pub fn attribute_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.attributes.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Validate resource attributes
    pub fn validate(&self, attributes: &HashMap<String, Value>) -> Result<(), Vec<TypeError>> {
        let mut errors = Vec::new();

        // Check required attributes
        for (name, schema) in &self.attributes {
            if schema.required && !attributes.contains_key(name) && schema.default.is_none() {
                errors.push(TypeError::MissingRequired { name: name.clone() });
            }
        }

        // Type check each attribute
        for (name, value) in attributes {
            match self.attributes.get(name) {
                Some(schema) if schema.computed && !schema.optional_computed => {
                    errors.push(TypeError::ComputedOnly { name: name.clone() });
                }
                Some(schema) => {
                    if let Err(e) = schema.attr_type.validate(value) {
                        errors.push(e);
                    } else if let Err(e) = schema.check_max_items(value) {
                        errors.push(e);
                    }
                }
                None => errors.push(TypeError::UnknownAttribute { name: name.clone() }),
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// Fill in defaults for attributes the user left unset, then normalize
    pub fn with_defaults(&self, attributes: &HashMap<String, Value>) -> HashMap<String, Value> {
        let mut merged = attributes.clone();
        for (name, schema) in &self.attributes {
            if let Some(default) = &schema.default {
                merged.entry(name.clone()).or_insert_with(|| default.clone());
            }
        }
        if let Some(normalize) = self.normalizer {
            normalize(&mut merged);
        }
        merged
    }

    /// Names of force-new attributes whose desired value differs from the current one
    pub fn requires_replacement(
        &self,
        current: &HashMap<String, Value>,
        desired: &HashMap<String, Value>,
    ) -> Vec<String> {
        let desired = self.with_defaults(desired);
        let mut changed: Vec<String> = self
            .attributes
            .values()
            .filter(|schema| schema.force_new)
            .filter(|schema| match desired.get(&schema.name) {
                None => schema.removed(current.get(&schema.name)),
                Some(want) => schema.differs(current.get(&schema.name), want),
            })
            .map(|schema| schema.name.clone())
            .collect();
        changed.sort();
        changed
    }

    /// Names of updatable attributes whose desired value differs from the current one
    pub fn changed_attributes(
        &self,
        current: &HashMap<String, Value>,
        desired: &HashMap<String, Value>,
    ) -> Vec<String> {
        let desired = self.with_defaults(desired);
        let mut changed: Vec<String> = self
            .attributes
            .values()
            .filter(|schema| match desired.get(&schema.name) {
                // Unset optional+computed attributes keep whatever the API chose
                None => schema.removed(current.get(&schema.name)),
                Some(want) => {
                    (!schema.computed || schema.optional_computed)
                        && schema.differs(current.get(&schema.name), want)
                }
            })
            .map(|schema| schema.name.clone())
            .collect();
        changed.sort();
        changed
    }
}

/// Helper functions for common types
pub mod types {
    use super::*;

    /// Positive integer type
    pub fn positive_int() -> AttributeType {
        AttributeType::Custom {
            name: "PositiveInt".to_string(),
            base: Box::new(AttributeType::Int),
            validate: |value| {
                if let Value::Int(n) = value {
                    if *n > 0 {
                        Ok(())
                    } else {
                        Err("Value must be positive".to_string())
                    }
                } else {
                    Err("Expected integer".to_string())
                }
            },
        }
    }

    /// Non-negative integer type
    pub fn non_negative_int() -> AttributeType {
        AttributeType::Custom {
            name: "NonNegativeInt".to_string(),
            base: Box::new(AttributeType::Int),
            validate: |value| match value {
                Value::Int(n) if *n >= 0 => Ok(()),
                Value::Int(_) => Err("Value must not be negative".to_string()),
                _ => Err("Expected integer".to_string()),
            },
        }
    }

    /// Port number type (1-65535)
    pub fn port_number() -> AttributeType {
        AttributeType::Custom {
            name: "PortNumber".to_string(),
            base: Box::new(AttributeType::Int),
            validate: |value| {
                if let Value::Int(n) = value {
                    if (1..=65535).contains(n) {
                        Ok(())
                    } else {
                        Err("Port number must be between 1 and 65535".to_string())
                    }
                } else {
                    Err("Expected integer".to_string())
                }
            },
        }
    }

    /// Percentage type (0-100, fractional values allowed)
    pub fn percentage() -> AttributeType {
        AttributeType::Custom {
            name: "Percentage".to_string(),
            base: Box::new(AttributeType::Float),
            validate: |value| match value.as_float() {
                Some(f) if (0.0..=100.0).contains(&f) => Ok(()),
                Some(f) => Err(format!("Percentage must be between 0 and 100, got {}", f)),
                None => Err("Expected number".to_string()),
            },
        }
    }

    /// ARN string type
    pub fn arn() -> AttributeType {
        AttributeType::Custom {
            name: "Arn".to_string(),
            base: Box::new(AttributeType::String),
            validate: |value| match value.as_str() {
                Some(s) if crate::arn::is_arn(s) => Ok(()),
                Some(s) => Err(format!("'{}' is not a valid ARN", s)),
                None => Err("Expected string".to_string()),
            },
        }
    }

    /// 12-digit AWS account ID
    pub fn aws_account_id() -> AttributeType {
        AttributeType::Custom {
            name: "AwsAccountId".to_string(),
            base: Box::new(AttributeType::String),
            validate: |value| match value.as_str() {
                Some(s) if s.len() == 12 && s.bytes().all(|b| b.is_ascii_digit()) => Ok(()),
                Some(s) => Err(format!("'{}' is not a 12-digit AWS account ID", s)),
                None => Err("Expected string".to_string()),
            },
        }
    }

    /// String list type
    pub fn string_list() -> AttributeType {
        AttributeType::List(Box::new(AttributeType::String))
    }

    /// String map type (used for tags)
    pub fn string_map() -> AttributeType {
        AttributeType::Map(Box::new(AttributeType::String))
    }

    /// Enum from a list of literal values
    pub fn one_of(values: &[&str]) -> AttributeType {
        AttributeType::Enum(values.iter().map(|v| v.to_string()).collect())
    }
}
