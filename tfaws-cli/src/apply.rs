//! Reconciling document entries against live infrastructure

use std::fmt;

use tfaws_core::provider::{Provider, ProviderError, ProviderResult};
use tfaws_core::resource::State;

use crate::document::ResourceEntry;

/// What `apply` did for one entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Read,
    Create,
    /// The identified object was gone and has been created again
    Recreate,
    Replace,
    Update,
    Unchanged,
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Action::Read => "read",
            Action::Create => "created",
            Action::Recreate => "recreated",
            Action::Replace => "replaced",
            Action::Update => "updated",
            Action::Unchanged => "unchanged",
        };
        write!(f, "{}", s)
    }
}

/// Bring one entry to its declared state
pub async fn apply_entry(
    provider: &dyn Provider,
    entry: &ResourceEntry,
) -> ProviderResult<(Action, State)> {
    let resource = entry.to_resource();
    if entry.data {
        let state = provider.read_data_source(&resource).await?;
        return Ok((Action::Read, state));
    }

    let Some(identifier) = entry.identifier.as_deref() else {
        let state = provider.create(&resource).await?;
        return Ok((Action::Create, state));
    };

    let current = provider.read(&resource.id, identifier).await?;
    if !current.exists {
        log::warn!("{} ({}) no longer exists, creating it", resource.id, identifier);
        let state = provider.create(&resource).await?;
        return Ok((Action::Recreate, state));
    }

    let schema = provider
        .resource_types()
        .into_iter()
        .find(|t| t.name() == resource.id.resource_type && !t.is_data_source())
        .map(|t| t.schema())
        .ok_or_else(|| {
            ProviderError::new(format!("Unknown resource type: {}", resource.id.resource_type))
                .for_resource(resource.id.clone())
        })?;

    let replaced = schema.requires_replacement(&current.attributes, &resource.attributes);
    if !replaced.is_empty() {
        log::info!("{} must be replaced: {}", resource.id, replaced.join(", "));
        provider.delete(&resource.id, identifier).await?;
        let state = provider.create(&resource).await?;
        return Ok((Action::Replace, state));
    }

    let changed = schema.changed_attributes(&current.attributes, &resource.attributes);
    if changed.is_empty() {
        return Ok((Action::Unchanged, current));
    }
    log::info!("{} changed: {}", resource.id, changed.join(", "));
    let state = provider
        .update(&resource.id, identifier, &current, &resource)
        .await?;
    Ok((Action::Update, state))
}

/// Entries `destroy` acts on, last declared first
pub fn destroy_order(entries: &[ResourceEntry]) -> Vec<&ResourceEntry> {
    entries
        .iter()
        .rev()
        .filter(|e| !e.data && e.identifier.is_some())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;
    use tfaws_core::provider::{BoxFuture, ResourceType};
    use tfaws_core::resource::{Resource, ResourceId, Value};
    use tfaws_core::schema::{AttributeSchema, AttributeType, ResourceSchema};

    struct WidgetType;

    impl ResourceType for WidgetType {
        fn name(&self) -> &'static str {
            "test.widget"
        }

        fn schema(&self) -> ResourceSchema {
            ResourceSchema::new("test.widget")
                .attribute(AttributeSchema::new("name", AttributeType::String).force_new())
                .attribute(AttributeSchema::new("size", AttributeType::Int))
                .attribute(AttributeSchema::new("label", AttributeType::String))
        }
    }

    /// Records calls and serves a fixed set of existing objects
    #[derive(Default)]
    struct FakeProvider {
        existing: HashMap<String, HashMap<String, Value>>,
        calls: Mutex<Vec<String>>,
    }

    impl FakeProvider {
        fn with_widget(identifier: &str, name: &str, size: i64) -> Self {
            let mut attrs = HashMap::new();
            attrs.insert("name".to_string(), Value::from(name));
            attrs.insert("size".to_string(), Value::Int(size));
            let mut existing = HashMap::new();
            existing.insert(identifier.to_string(), attrs);
            Self {
                existing,
                ..Default::default()
            }
        }

        fn record(&self, call: String) {
            self.calls.lock().unwrap().push(call);
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    impl Provider for FakeProvider {
        fn name(&self) -> &'static str {
            "fake"
        }

        fn resource_types(&self) -> Vec<Box<dyn ResourceType>> {
            vec![Box::new(WidgetType)]
        }

        fn read(&self, id: &ResourceId, identifier: &str) -> BoxFuture<'_, ProviderResult<State>> {
            self.record(format!("read {}", identifier));
            let state = match self.existing.get(identifier) {
                Some(attrs) => State::existing(id.clone(), attrs.clone()).with_identifier(identifier),
                None => State::not_found(id.clone()),
            };
            Box::pin(async move { Ok(state) })
        }

        fn read_data_source(&self, resource: &Resource) -> BoxFuture<'_, ProviderResult<State>> {
            self.record(format!("lookup {}", resource.id));
            let state = State::existing(resource.id.clone(), resource.attributes.clone())
                .with_identifier("found");
            Box::pin(async move { Ok(state) })
        }

        fn create(&self, resource: &Resource) -> BoxFuture<'_, ProviderResult<State>> {
            self.record(format!("create {}", resource.id));
            let state = State::existing(resource.id.clone(), resource.attributes.clone())
                .with_identifier("w-new");
            Box::pin(async move { Ok(state) })
        }

        fn update(
            &self,
            id: &ResourceId,
            identifier: &str,
            _from: &State,
            to: &Resource,
        ) -> BoxFuture<'_, ProviderResult<State>> {
            self.record(format!("update {}", identifier));
            let state = State::existing(id.clone(), to.attributes.clone()).with_identifier(identifier);
            Box::pin(async move { Ok(state) })
        }

        fn delete(&self, _id: &ResourceId, identifier: &str) -> BoxFuture<'_, ProviderResult<()>> {
            self.record(format!("delete {}", identifier));
            Box::pin(async { Ok(()) })
        }
    }

    fn widget(identifier: Option<&str>, name: &str, size: i64) -> ResourceEntry {
        let mut attributes = serde_json::Map::new();
        attributes.insert("name".to_string(), serde_json::json!(name));
        attributes.insert("size".to_string(), serde_json::json!(size));
        ResourceEntry {
            resource_type: "test.widget".to_string(),
            name: "w".to_string(),
            identifier: identifier.map(str::to_string),
            data: false,
            attributes,
        }
    }

    #[tokio::test]
    async fn unidentified_entries_are_created() {
        let provider = FakeProvider::default();
        let (action, state) = apply_entry(&provider, &widget(None, "a", 1)).await.unwrap();
        assert_eq!(action, Action::Create);
        assert_eq!(state.identifier.as_deref(), Some("w-new"));
        assert_eq!(provider.calls(), vec!["create test.widget.w"]);
    }

    #[tokio::test]
    async fn matching_entries_are_left_alone() {
        let provider = FakeProvider::with_widget("w-1", "a", 1);
        let (action, state) = apply_entry(&provider, &widget(Some("w-1"), "a", 1))
            .await
            .unwrap();
        assert_eq!(action, Action::Unchanged);
        assert_eq!(state.identifier.as_deref(), Some("w-1"));
        assert_eq!(provider.calls(), vec!["read w-1"]);
    }

    #[tokio::test]
    async fn updatable_changes_update_in_place() {
        let provider = FakeProvider::with_widget("w-1", "a", 1);
        let (action, _) = apply_entry(&provider, &widget(Some("w-1"), "a", 2))
            .await
            .unwrap();
        assert_eq!(action, Action::Update);
        assert_eq!(provider.calls(), vec!["read w-1", "update w-1"]);
    }

    #[tokio::test]
    async fn removed_attributes_update_in_place() {
        let mut provider = FakeProvider::with_widget("w-1", "a", 1);
        provider
            .existing
            .get_mut("w-1")
            .unwrap()
            .insert("label".to_string(), Value::from("blue"));
        let (action, state) = apply_entry(&provider, &widget(Some("w-1"), "a", 1))
            .await
            .unwrap();
        assert_eq!(action, Action::Update);
        assert!(!state.attributes.contains_key("label"));
        assert_eq!(provider.calls(), vec!["read w-1", "update w-1"]);
    }

    #[tokio::test]
    async fn force_new_changes_replace() {
        let provider = FakeProvider::with_widget("w-1", "a", 1);
        let (action, state) = apply_entry(&provider, &widget(Some("w-1"), "b", 1))
            .await
            .unwrap();
        assert_eq!(action, Action::Replace);
        assert_eq!(state.identifier.as_deref(), Some("w-new"));
        assert_eq!(
            provider.calls(),
            vec!["read w-1", "delete w-1", "create test.widget.w"]
        );
    }

    #[tokio::test]
    async fn vanished_objects_are_recreated() {
        let provider = FakeProvider::default();
        let (action, _) = apply_entry(&provider, &widget(Some("w-gone"), "a", 1))
            .await
            .unwrap();
        assert_eq!(action, Action::Recreate);
        assert_eq!(provider.calls(), vec!["read w-gone", "create test.widget.w"]);
    }

    #[tokio::test]
    async fn data_sources_are_only_read() {
        let provider = FakeProvider::default();
        let mut entry = widget(None, "a", 1);
        entry.data = true;
        let (action, _) = apply_entry(&provider, &entry).await.unwrap();
        assert_eq!(action, Action::Read);
        assert_eq!(provider.calls(), vec!["lookup test.widget.w"]);
    }

    #[test]
    fn destroy_runs_in_reverse_and_skips_unmanaged() {
        let mut first = widget(Some("w-1"), "a", 1);
        first.name = "first".to_string();
        let mut lookup = widget(None, "a", 1);
        lookup.data = true;
        let pending = widget(None, "b", 1);
        let mut last = widget(Some("w-2"), "c", 1);
        last.name = "last".to_string();

        let entries = vec![first, lookup, pending, last];
        let order: Vec<&str> = destroy_order(&entries)
            .iter()
            .map(|e| e.name.as_str())
            .collect();
        assert_eq!(order, vec!["last", "first"]);
    }
}
