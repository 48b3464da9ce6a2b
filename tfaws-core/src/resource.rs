//! Resource - Representing resources and their state

use std::collections::HashMap;

/// Unique identifier for a resource
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResourceId {
    /// Resource type (e.g., "guardduty.detector", "globalaccelerator.listener")
    pub resource_type: String,
    /// Resource name (logical name given in the resource document)
    pub name: String,
}

impl ResourceId {
    pub fn new(resource_type: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            resource_type: resource_type.into(),
            name: name.into(),
        }
    }
}

impl std::fmt::Display for ResourceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.resource_type, self.name)
    }
}

/// Attribute value of a resource
///
/// Nested configuration blocks are represented as a `List` of `Map`s,
/// even when the block allows a single item.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    String(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    List(Vec<Value>),
    Map(HashMap<String, Value>),
}

impl Value {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Integers widen to floats, so `traffic_dial_percentage = 100` is accepted
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Float(f) => Some(*f),
            Value::Int(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&HashMap<String, Value>> {
        match self {
            Value::Map(map) => Some(map),
            _ => None,
        }
    }

    /// Equality that treats `Int` and `Float` holding the same number as equal
    pub fn equivalent(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Int(_) | Value::Float(_), Value::Int(_) | Value::Float(_)) => {
                self.as_float() == other.as_float()
            }
            (Value::List(a), Value::List(b)) => {
                a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.equivalent(y))
            }
            (Value::Map(a), Value::Map(b)) => {
                a.len() == b.len()
                    && a.iter()
                        .all(|(k, v)| b.get(k).is_some_and(|other| v.equivalent(other)))
            }
            _ => self == other,
        }
    }

    /// Whether this value, as read back from the cloud, meets `desired`.
    /// Like [`Value::equivalent`], except that nested block keys missing
    /// from `desired` are ignored: they hold values the API filled in.
    pub fn satisfies(&self, desired: &Value) -> bool {
        match (self, desired) {
            (Value::List(a), Value::List(b)) => {
                a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.satisfies(y))
            }
            (Value::Map(a), Value::Map(b)) => b
                .iter()
                .all(|(k, want)| a.get(k).is_some_and(|have| have.satisfies(want))),
            _ => self.equivalent(desired),
        }
    }

    /// Convert a JSON value into an attribute value
    ///
    /// `null` has no attribute representation and yields `None`.
    pub fn from_json(value: &serde_json::Value) -> Option<Value> {
        match value {
            serde_json::Value::Null => None,
            serde_json::Value::String(s) => Some(Value::String(s.clone())),
            serde_json::Value::Bool(b) => Some(Value::Bool(*b)),
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Some(Value::Int(i))
                } else {
                    n.as_f64().map(Value::Float)
                }
            }
            serde_json::Value::Array(arr) => Some(Value::List(
                arr.iter().filter_map(Value::from_json).collect(),
            )),
            serde_json::Value::Object(obj) => Some(Value::Map(
                obj.iter()
                    .filter_map(|(k, v)| Value::from_json(v).map(|v| (k.clone(), v)))
                    .collect(),
            )),
        }
    }

    /// Convert an attribute value into JSON
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::String(s) => serde_json::Value::String(s.clone()),
            Value::Int(i) => serde_json::Value::from(*i),
            Value::Float(f) => serde_json::Number::from_f64(*f)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Value::Bool(b) => serde_json::Value::Bool(*b),
            Value::List(items) => {
                serde_json::Value::Array(items.iter().map(Value::to_json).collect())
            }
            Value::Map(map) => {
                // Sorted keys keep printed state stable between runs
                let mut keys: Vec<&String> = map.keys().collect();
                keys.sort();
                let mut obj = serde_json::Map::new();
                for key in keys {
                    obj.insert(key.clone(), map[key].to_json());
                }
                serde_json::Value::Object(obj)
            }
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::Int(i as i64)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

/// Desired state declared by the user
#[derive(Debug, Clone, PartialEq)]
pub struct Resource {
    pub id: ResourceId,
    pub attributes: HashMap<String, Value>,
    /// If true, this is a data source (read-only) that won't be modified
    pub read_only: bool,
}

impl Resource {
    pub fn new(resource_type: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: ResourceId::new(resource_type, name),
            attributes: HashMap::new(),
            read_only: false,
        }
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: Value) -> Self {
        self.attributes.insert(key.into(), value);
        self
    }

    pub fn with_read_only(mut self, read_only: bool) -> Self {
        self.read_only = read_only;
        self
    }

    /// Returns true if this resource is a data source (read-only)
    pub fn is_data_source(&self) -> bool {
        self.read_only
    }
}

/// Current state fetched from actual infrastructure
#[derive(Debug, Clone, PartialEq)]
pub struct State {
    pub id: ResourceId,
    /// Provider identifier (an ARN, a detector ID, or a composite ID)
    pub identifier: Option<String>,
    pub attributes: HashMap<String, Value>,
    /// Whether this state exists
    pub exists: bool,
}

impl State {
    pub fn not_found(id: ResourceId) -> Self {
        Self {
            id,
            identifier: None,
            attributes: HashMap::new(),
            exists: false,
        }
    }

    pub fn existing(id: ResourceId, attributes: HashMap<String, Value>) -> Self {
        Self {
            id,
            identifier: None,
            attributes,
            exists: true,
        }
    }

    pub fn with_identifier(mut self, identifier: impl Into<String>) -> Self {
        self.identifier = Some(identifier.into());
        self
    }

    /// Render the state as a JSON object (identifier plus attributes)
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "type": self.id.resource_type,
            "name": self.id.name,
            "identifier": self.identifier,
            "exists": self.exists,
            "attributes": Value::Map(self.attributes.clone()).to_json(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn json_conversion_keeps_nested_blocks() {
        let input = json!({
            "name": "example",
            "enabled": true,
            "port_range": [{"from_port": 80, "to_port": 81}],
            "traffic_dial_percentage": 50.5,
            "ignored": null
        });

        let value = Value::from_json(&input).unwrap();
        let map = value.as_map().unwrap();
        assert_eq!(map.get("name"), Some(&Value::from("example")));
        assert_eq!(map.get("enabled"), Some(&Value::Bool(true)));
        assert_eq!(map.get("traffic_dial_percentage"), Some(&Value::Float(50.5)));
        assert!(!map.contains_key("ignored"));

        let ranges = map.get("port_range").and_then(Value::as_list).unwrap();
        let first = ranges[0].as_map().unwrap();
        assert_eq!(first.get("from_port"), Some(&Value::Int(80)));

        let back = value.to_json();
        assert_eq!(back["port_range"][0]["to_port"], json!(81));
        assert_eq!(back["enabled"], json!(true));
    }

    #[test]
    fn int_widens_to_float() {
        assert_eq!(Value::Int(100).as_float(), Some(100.0));
        assert_eq!(Value::from("100").as_float(), None);
    }

    #[test]
    fn numbers_are_equivalent_across_types() {
        assert!(Value::Int(100).equivalent(&Value::Float(100.0)));
        assert!(!Value::Int(100).equivalent(&Value::Float(100.5)));
        assert!(!Value::Int(1).equivalent(&Value::from("1")));
        assert!(Value::List(vec![Value::Int(1)]).equivalent(&Value::List(vec![Value::Float(1.0)])));
    }

    #[test]
    fn read_values_satisfy_partial_blocks() {
        let block = |pairs: &[(&str, Value)]| {
            Value::List(vec![Value::Map(
                pairs.iter().map(|(k, v)| (k.to_string(), v.clone())).collect(),
            )])
        };
        let read = block(&[("content", Value::from("Hi")), ("group_number", Value::Int(1))]);
        let desired = block(&[("content", Value::from("Hi"))]);
        assert!(read.satisfies(&desired));
        assert!(!read.equivalent(&desired));
        assert!(!desired.satisfies(&read));
        assert!(!read.satisfies(&block(&[("content", Value::from("Hello"))])));
    }

    #[test]
    fn state_json_contains_identifier() {
        let id = ResourceId::new("guardduty.detector", "main");
        let mut attrs = HashMap::new();
        attrs.insert("enable".to_string(), Value::Bool(true));
        let state = State::existing(id, attrs).with_identifier("abc123");

        let rendered = state.to_json();
        assert_eq!(rendered["identifier"], json!("abc123"));
        assert_eq!(rendered["attributes"]["enable"], json!(true));
        assert_eq!(rendered["exists"], json!(true));
    }
}
