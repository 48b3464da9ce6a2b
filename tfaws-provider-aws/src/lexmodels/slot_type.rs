use aws_sdk_lexmodelbuilding::Client;
use aws_sdk_lexmodelbuilding::operation::get_slot_type::GetSlotTypeOutput;
use aws_sdk_lexmodelbuilding::operation::put_slot_type::builders::PutSlotTypeFluentBuilder;
use aws_sdk_lexmodelbuilding::types::SlotValueSelectionStrategy;
use tfaws_core::provider::{ProviderError, ProviderResult};
use tfaws_core::resource::{Resource, ResourceId, State, Value};

use super::flex::{expand_enumeration_values, flatten_enumeration_values, format_date};
use super::{
    CREATE_TIMEOUT, DELETE_TIMEOUT, LATEST_VERSION, UPDATE_TIMEOUT, exists, keep_write_only,
    latest_slot_type_version, retry_on_conflict, state_version, wait_deleted,
};
use crate::AwsProvider;
use crate::errors::{is_not_found, is_not_found_error, sdk_error};
use crate::flex::{Attributes, get_blocks, get_bool, get_str, get_string, insert_opt, require_str};

const WRITE_ONLY: &[&str] = &["create_version"];

pub(crate) fn flatten_slot_type(output: &GetSlotTypeOutput) -> Attributes {
    let mut attrs = Attributes::new();
    insert_opt(&mut attrs, "name", output.name());
    insert_opt(&mut attrs, "description", output.description());
    insert_opt(&mut attrs, "checksum", output.checksum());
    insert_opt(&mut attrs, "created_date", format_date(output.created_date()));
    insert_opt(&mut attrs, "last_updated_date", format_date(output.last_updated_date()));
    insert_opt(
        &mut attrs,
        "value_selection_strategy",
        output.value_selection_strategy().map(|s| s.as_str()),
    );
    attrs.insert(
        "enumeration_value".to_string(),
        flatten_enumeration_values(output.enumeration_values()),
    );
    attrs
}

pub(crate) fn put_slot_type_request(
    client: &Client,
    attrs: &Attributes,
    id: &ResourceId,
    checksum: Option<String>,
) -> ProviderResult<PutSlotTypeFluentBuilder> {
    let name = require_str(attrs, "name", id)?;
    let values = expand_enumeration_values(&get_blocks(attrs, "enumeration_value"))?;
    Ok(client
        .put_slot_type()
        .name(name)
        .set_description(get_string(attrs, "description"))
        .set_enumeration_values(Some(values))
        .value_selection_strategy(SlotValueSelectionStrategy::from(
            get_str(attrs, "value_selection_strategy").unwrap_or("ORIGINAL_VALUE"),
        ))
        .create_version(get_bool(attrs, "create_version").unwrap_or(false))
        .set_checksum(checksum))
}

async fn find_slot_type_version(
    client: &Client,
    name: &str,
    version: &str,
) -> ProviderResult<Option<GetSlotTypeOutput>> {
    match client.get_slot_type().name(name).version(version).send().await {
        Ok(output) => Ok(Some(output)),
        Err(e) if is_not_found(&e) => Ok(None),
        Err(e) => Err(sdk_error(
            format!("reading Lex Slot Type ({}) version ({})", name, version),
            e,
        )),
    }
}

impl AwsProvider {
    pub(crate) async fn read_lex_slot_type(
        &self,
        id: &ResourceId,
        identifier: &str,
    ) -> ProviderResult<State> {
        let client = &self.conns.lexmodels;
        let Some(output) = find_slot_type_version(client, identifier, LATEST_VERSION)
            .await
            .map_err(|e| e.for_resource(id.clone()))?
        else {
            log::warn!("Lex Slot Type ({}) not found", identifier);
            return Ok(State::not_found(id.clone()));
        };

        let latest = latest_slot_type_version(client, identifier)
            .await
            .map_err(|e| e.for_resource(id.clone()))?;

        let mut attrs = flatten_slot_type(&output);
        attrs.insert("version".to_string(), Value::from(state_version(latest)));
        Ok(State::existing(id.clone(), attrs).with_identifier(identifier))
    }

    async fn put_lex_slot_type(
        &self,
        id: &ResourceId,
        attrs: &Attributes,
        checksum: Option<String>,
        timeout: std::time::Duration,
    ) -> ProviderResult<String> {
        let name = require_str(attrs, "name", id)?;
        let request = put_slot_type_request(&self.conns.lexmodels, attrs, id, checksum)
            .map_err(|e| e.for_resource(id.clone()))?;

        retry_on_conflict(timeout, || {
            let request = request.clone();
            async move {
                request
                    .send()
                    .await
                    .map_err(|e| sdk_error(format!("putting Lex Slot Type ({})", name), e))
            }
        })
        .await
        .map_err(|e| e.for_resource(id.clone()))?;
        Ok(name.to_string())
    }

    pub(crate) async fn create_lex_slot_type(&self, resource: Resource) -> ProviderResult<State> {
        let name = self
            .put_lex_slot_type(&resource.id, &resource.attributes, None, CREATE_TIMEOUT)
            .await?;
        log::info!("Created Lex Slot Type {}", name);

        let mut state = self.read_lex_slot_type(&resource.id, &name).await?;
        keep_write_only(&mut state, &resource.attributes, WRITE_ONLY);
        Ok(state)
    }

    pub(crate) async fn update_lex_slot_type(
        &self,
        id: ResourceId,
        identifier: &str,
        from: State,
        to: Resource,
    ) -> ProviderResult<State> {
        let checksum = get_string(&from.attributes, "checksum");
        self.put_lex_slot_type(&id, &to.attributes, checksum, UPDATE_TIMEOUT)
            .await?;
        log::info!("Updated Lex Slot Type {}", identifier);

        let mut state = self.read_lex_slot_type(&id, identifier).await?;
        keep_write_only(&mut state, &to.attributes, WRITE_ONLY);
        Ok(state)
    }

    pub(crate) async fn delete_lex_slot_type(
        &self,
        id: ResourceId,
        identifier: &str,
    ) -> ProviderResult<()> {
        let client = &self.conns.lexmodels;
        log::info!("Deleting Lex Slot Type {}", identifier);

        let result = retry_on_conflict(DELETE_TIMEOUT, || async move {
            client
                .delete_slot_type()
                .name(identifier)
                .send()
                .await
                .map_err(|e| sdk_error(format!("deleting Lex Slot Type ({})", identifier), e))
        })
        .await;
        match result {
            Ok(_) => {}
            Err(e) if is_not_found_error(&e) => return Ok(()),
            Err(e) => return Err(e.for_resource(id)),
        }

        wait_deleted("Slot Type", identifier, || async move {
            Ok(exists(
                find_slot_type_version(client, identifier, LATEST_VERSION).await?,
            ))
        })
        .await
        .map_err(|e| e.for_resource(id))
    }

    pub(crate) async fn read_lex_slot_type_data(&self, resource: Resource) -> ProviderResult<State> {
        let id = resource.id.clone();
        let name = require_str(&resource.attributes, "name", &id)?;
        let version = get_str(&resource.attributes, "version").unwrap_or(LATEST_VERSION);

        let output = find_slot_type_version(&self.conns.lexmodels, name, version)
            .await
            .map_err(|e| e.for_resource(id.clone()))?
            .ok_or_else(|| {
                ProviderError::new(format!(
                    "Lex Slot Type ({}) version ({}) not found",
                    name, version
                ))
                .for_resource(id.clone())
            })?;

        let mut attrs = flatten_slot_type(&output);
        attrs.insert(
            "version".to_string(),
            Value::from(output.version().unwrap_or(version)),
        );
        Ok(State::existing(id, attrs).with_identifier(name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aws_sdk_lexmodelbuilding::types::EnumerationValue;
    use crate::flex::{block, string_list};
    use crate::lexmodels::test_client;

    #[test]
    fn flatten_slot_type_values() {
        let output = GetSlotTypeOutput::builder()
            .name("FlowerTypes")
            .enumeration_values(
                EnumerationValue::builder()
                    .value("lilies")
                    .synonyms("lily")
                    .build()
                    .unwrap(),
            )
            .value_selection_strategy(SlotValueSelectionStrategy::TopResolution)
            .version("$LATEST")
            .build();

        let attrs = flatten_slot_type(&output);
        assert_eq!(
            attrs.get("value_selection_strategy"),
            Some(&Value::from("TOP_RESOLUTION"))
        );
        let mut value = Attributes::new();
        value.insert("value".to_string(), Value::from("lilies"));
        value.insert("synonyms".to_string(), string_list(["lily"]));
        assert_eq!(attrs["enumeration_value"], block(value));
    }

    #[tokio::test]
    async fn put_request_defaults_to_original_value() {
        let id = ResourceId::new("lex.slot_type", "flowers");
        let mut value = Attributes::new();
        value.insert("value".to_string(), Value::from("tulips"));
        let mut attrs = Attributes::new();
        attrs.insert("name".to_string(), Value::from("FlowerTypes"));
        attrs.insert("enumeration_value".to_string(), block(value));

        let request = put_slot_type_request(&test_client(), &attrs, &id, None).unwrap();
        assert_eq!(
            request.get_value_selection_strategy(),
            &Some(SlotValueSelectionStrategy::OriginalValue)
        );
        assert_eq!(request.get_create_version(), &Some(false));
        assert_eq!(request.get_enumeration_values().as_ref().map(Vec::len), Some(1));
    }
}
