//! Key/value resource tags

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use crate::resource::Value;

const AWS_TAG_PREFIX: &str = "aws:";

/// Tag keys the provider never manages
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IgnoreTagsConfig {
    #[serde(default)]
    pub keys: Vec<String>,
    #[serde(default)]
    pub key_prefixes: Vec<String>,
}

impl IgnoreTagsConfig {
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty() && self.key_prefixes.is_empty()
    }
}

/// Ordered set of tags
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeyValueTags(BTreeMap<String, String>);

impl KeyValueTags {
    pub fn new() -> Self {
        Self::default()
    }

    /// Tags from a `Map` attribute value. Non-string values are skipped.
    pub fn from_value(value: Option<&Value>) -> Self {
        let Some(Value::Map(map)) = value else {
            return Self::new();
        };
        Self(
            map.iter()
                .filter_map(|(k, v)| v.as_str().map(|s| (k.clone(), s.to_string())))
                .collect(),
        )
    }

    pub fn to_value(&self) -> Value {
        Value::Map(
            self.0
                .iter()
                .map(|(k, v)| (k.clone(), Value::String(v.clone())))
                .collect(),
        )
    }

    pub fn to_hash_map(&self) -> HashMap<String, String> {
        self.0.clone().into_iter().collect()
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn keys(&self) -> Vec<String> {
        self.0.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Drop tags managed by AWS itself
    pub fn ignore_aws(self) -> Self {
        Self(
            self.0
                .into_iter()
                .filter(|(k, _)| !k.starts_with(AWS_TAG_PREFIX))
                .collect(),
        )
    }

    /// Drop tags the provider configuration says to ignore
    pub fn ignore_config(self, config: &IgnoreTagsConfig) -> Self {
        Self(
            self.0
                .into_iter()
                .filter(|(k, _)| {
                    !config.keys.iter().any(|ignored| ignored == k)
                        && !config.key_prefixes.iter().any(|p| k.starts_with(p.as_str()))
                })
                .collect(),
        )
    }

    /// Tags of `self` overlaid with `other`; `other` wins on conflicts
    pub fn merge(&self, other: &KeyValueTags) -> Self {
        let mut merged = self.0.clone();
        merged.extend(other.0.iter().map(|(k, v)| (k.clone(), v.clone())));
        Self(merged)
    }

    /// Keys present in `self` but missing from `new`
    pub fn removed(&self, new: &KeyValueTags) -> Vec<String> {
        self.0
            .keys()
            .filter(|k| !new.0.contains_key(*k))
            .cloned()
            .collect()
    }

    /// Tags of `new` that are missing from `self` or have another value
    pub fn updated(&self, new: &KeyValueTags) -> Self {
        Self(
            new.0
                .iter()
                .filter(|(k, v)| self.0.get(*k) != Some(*v))
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
        )
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for KeyValueTags {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tags(pairs: &[(&str, &str)]) -> KeyValueTags {
        pairs.iter().copied().collect()
    }

    #[test]
    fn value_conversion_skips_non_strings() {
        let mut map = HashMap::new();
        map.insert("Name".to_string(), Value::from("main"));
        map.insert("Count".to_string(), Value::Int(1));
        let parsed = KeyValueTags::from_value(Some(&Value::Map(map)));
        assert_eq!(parsed, tags(&[("Name", "main")]));
        assert_eq!(KeyValueTags::from_value(None), KeyValueTags::new());

        let Value::Map(back) = parsed.to_value() else {
            panic!("expected map");
        };
        assert_eq!(back.get("Name"), Some(&Value::from("main")));
    }

    #[test]
    fn ignores_aws_and_configured_keys() {
        let all = tags(&[
            ("aws:cloudformation:stack-name", "s"),
            ("Name", "main"),
            ("Owner", "ops"),
            ("ci:run", "42"),
        ]);
        let config = IgnoreTagsConfig {
            keys: vec!["Owner".to_string()],
            key_prefixes: vec!["ci:".to_string()],
        };
        assert_eq!(all.ignore_aws().ignore_config(&config), tags(&[("Name", "main")]));
    }

    #[test]
    fn removed_and_updated() {
        let old = tags(&[("a", "1"), ("b", "2"), ("c", "3")]);
        let new = tags(&[("a", "1"), ("b", "20"), ("d", "4")]);
        assert_eq!(old.removed(&new), vec!["c".to_string()]);
        assert_eq!(old.updated(&new), tags(&[("b", "20"), ("d", "4")]));
    }

    #[test]
    fn resource_tags_override_default_tags() {
        let defaults = tags(&[("Env", "prod"), ("Team", "sec")]);
        let resource = tags(&[("Team", "net")]);
        assert_eq!(
            defaults.merge(&resource),
            tags(&[("Env", "prod"), ("Team", "net")])
        );
    }
}
