//! Resource documents
//!
//! A document is a JSON object with a `resources` list. Each entry names a
//! resource type, a local name, and optionally the provider identifier of an
//! object that already exists.

use std::collections::HashSet;
use std::fs;
use std::path::Path;

use serde::Deserialize;

use tfaws_core::provider::ResourceType;
use tfaws_core::resource::{Resource, Value};

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Document {
    pub resources: Vec<ResourceEntry>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ResourceEntry {
    #[serde(rename = "type")]
    pub resource_type: String,
    pub name: String,
    #[serde(default)]
    pub identifier: Option<String>,
    /// Data sources are only read, never changed
    #[serde(default)]
    pub data: bool,
    #[serde(default)]
    pub attributes: serde_json::Map<String, serde_json::Value>,
}

impl ResourceEntry {
    pub fn to_resource(&self) -> Resource {
        let mut resource =
            Resource::new(&self.resource_type, &self.name).with_read_only(self.data);
        for (key, value) in &self.attributes {
            if let Some(value) = Value::from_json(value) {
                resource.attributes.insert(key.clone(), value);
            }
        }
        resource
    }

    pub fn label(&self) -> String {
        if self.data {
            format!("data.{}.{}", self.resource_type, self.name)
        } else {
            format!("{}.{}", self.resource_type, self.name)
        }
    }
}

impl Document {
    pub fn parse(content: &str) -> Result<Self, String> {
        serde_json::from_str(content).map_err(|e| format!("Parse error: {}", e))
    }

    pub fn load(path: &Path) -> Result<Self, String> {
        let content = fs::read_to_string(path)
            .map_err(|e| format!("Failed to read {}: {}", path.display(), e))?;
        Self::parse(&content)
    }

    /// Check every entry against the schema of its type
    ///
    /// Returns one message per problem found.
    pub fn validate(&self, types: &[Box<dyn ResourceType>]) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();
        let mut seen = HashSet::new();

        for entry in &self.resources {
            let label = entry.label();
            if !seen.insert(label.clone()) {
                errors.push(format!("{}: declared more than once", label));
            }
            if entry.data && entry.identifier.is_some() {
                errors.push(format!("{}: data sources cannot have an identifier", label));
            }

            let Some(resource_type) = types
                .iter()
                .find(|t| t.name() == entry.resource_type && t.is_data_source() == entry.data)
            else {
                let kind = if entry.data { "data source" } else { "resource type" };
                errors.push(format!("{}: unknown {} '{}'", label, kind, entry.resource_type));
                continue;
            };

            let resource = entry.to_resource();
            if let Err(type_errors) = resource_type.schema().validate(&resource.attributes) {
                errors.extend(type_errors.into_iter().map(|e| format!("{}: {}", label, e)));
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tfaws_provider_aws::resources::resource_types;

    #[test]
    fn load_document_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"resources": [
                {{"type": "guardduty.detector", "name": "main", "attributes": {{"enable": true}}}},
                {{"type": "lex.bot", "name": "orders", "data": true,
                  "attributes": {{"name": "OrderFlowers", "version": null}}}}
            ]}}"#
        )
        .unwrap();

        let doc = Document::load(file.path()).unwrap();
        assert_eq!(doc.resources.len(), 2);
        assert_eq!(doc.resources[0].identifier, None);

        let bot = doc.resources[1].to_resource();
        assert!(bot.is_data_source());
        assert_eq!(bot.attributes.get("name"), Some(&Value::from("OrderFlowers")));
        assert!(!bot.attributes.contains_key("version"));
        assert_eq!(doc.resources[1].label(), "data.lex.bot.orders");
    }

    #[test]
    fn missing_file_is_reported() {
        let err = Document::load(Path::new("/nonexistent/tfaws.json")).unwrap_err();
        assert!(err.starts_with("Failed to read /nonexistent/tfaws.json"));
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let err = Document::parse(r#"{"resources": [], "outputs": {}}"#).unwrap_err();
        assert!(err.starts_with("Parse error"));
    }

    #[test]
    fn validate_reports_every_problem() {
        let doc = Document::parse(
            r#"{"resources": [
                {"type": "guardduty.detector", "name": "main",
                 "attributes": {"enable": "yes"}},
                {"type": "guardduty.detector", "name": "main"},
                {"type": "s3.bucket", "name": "logs"},
                {"type": "guardduty.filter", "name": "f", "data": true},
                {"type": "globalaccelerator.accelerator", "name": "ga",
                 "attributes": {"name": "web", "dns_name": "x.awsglobalaccelerator.com"}}
            ]}"#,
        )
        .unwrap();

        let errors = doc.validate(&resource_types()).unwrap_err();
        let has = |needle: &str| errors.iter().any(|e| e.contains(needle));
        assert!(has("guardduty.detector.main: Type mismatch"));
        assert!(has("guardduty.detector.main: declared more than once"));
        assert!(has("s3.bucket.logs: unknown resource type 's3.bucket'"));
        assert!(has("data.guardduty.filter.f: unknown data source 'guardduty.filter'"));
        assert!(has("Attribute 'dns_name' is computed and cannot be set"));
    }

    #[test]
    fn valid_document_passes() {
        let doc = Document::parse(
            r#"{"resources": [
                {"type": "guardduty.detector", "name": "main",
                 "attributes": {"enable": true, "finding_publishing_frequency": "SIX_HOURS"}},
                {"type": "globalaccelerator.accelerator", "name": "web", "data": true,
                 "attributes": {"name": "web"}}
            ]}"#,
        )
        .unwrap();
        assert!(doc.validate(&resource_types()).is_ok());
    }
}
