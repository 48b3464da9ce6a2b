//! Helpers for reading desired attributes and building state attributes

use std::collections::HashMap;

use tfaws_core::provider::{ProviderError, ProviderResult};
use tfaws_core::resource::{ResourceId, Value};

pub type Attributes = HashMap<String, Value>;

pub fn get_str<'a>(attrs: &'a Attributes, key: &str) -> Option<&'a str> {
    attrs.get(key).and_then(Value::as_str)
}

pub fn get_string(attrs: &Attributes, key: &str) -> Option<String> {
    get_str(attrs, key).map(str::to_string)
}

/// Like `get_str`, treating an empty string as unset
pub fn get_non_empty_str<'a>(attrs: &'a Attributes, key: &str) -> Option<&'a str> {
    get_str(attrs, key).filter(|s| !s.is_empty())
}

pub fn get_bool(attrs: &Attributes, key: &str) -> Option<bool> {
    attrs.get(key).and_then(Value::as_bool)
}

pub fn get_int(attrs: &Attributes, key: &str) -> Option<i64> {
    attrs.get(key).and_then(Value::as_int)
}

/// Integer attribute narrowed to the `i32` the SDKs use
pub fn get_i32(attrs: &Attributes, key: &str) -> Option<i32> {
    get_int(attrs, key).and_then(|i| i32::try_from(i).ok())
}

pub fn get_float(attrs: &Attributes, key: &str) -> Option<f64> {
    attrs.get(key).and_then(Value::as_float)
}

pub fn get_string_list(attrs: &Attributes, key: &str) -> Vec<String> {
    attrs
        .get(key)
        .and_then(Value::as_list)
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

/// The first item of a nested block. A bare map is accepted too.
pub fn get_block<'a>(attrs: &'a Attributes, key: &str) -> Option<&'a Attributes> {
    match attrs.get(key)? {
        Value::List(items) => items.first().and_then(Value::as_map),
        Value::Map(map) => Some(map),
        _ => None,
    }
}

/// All items of a nested block
pub fn get_blocks<'a>(attrs: &'a Attributes, key: &str) -> Vec<&'a Attributes> {
    match attrs.get(key) {
        Some(Value::List(items)) => items.iter().filter_map(Value::as_map).collect(),
        Some(Value::Map(map)) => vec![map],
        _ => Vec::new(),
    }
}

/// Whether a block attribute is declared with at least one item
pub fn has_block(attrs: &Attributes, key: &str) -> bool {
    !get_blocks(attrs, key).is_empty()
}

pub fn require_str<'a>(attrs: &'a Attributes, key: &str, id: &ResourceId) -> ProviderResult<&'a str> {
    get_str(attrs, key).ok_or_else(|| {
        ProviderError::new(format!("Attribute '{}' is required", key)).for_resource(id.clone())
    })
}

pub fn string_list<I, S>(items: I) -> Value
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    Value::List(items.into_iter().map(|s| Value::String(s.into())).collect())
}

/// A single-item block
pub fn block(attrs: Attributes) -> Value {
    Value::List(vec![Value::Map(attrs)])
}

pub fn blocks(items: impl IntoIterator<Item = Attributes>) -> Value {
    Value::List(items.into_iter().map(Value::Map).collect())
}

/// Insert `value` under `key` when it is present
pub fn insert_opt<V: Into<Value>>(attrs: &mut Attributes, key: &str, value: Option<V>) {
    if let Some(v) = value {
        attrs.insert(key.to_string(), v.into());
    }
}

/// Random token for idempotent create calls
pub fn idempotency_token() -> String {
    uuid::Uuid::new_v4().to_string()
}
