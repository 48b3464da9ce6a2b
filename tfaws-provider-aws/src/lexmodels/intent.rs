use aws_sdk_lexmodelbuilding::Client;
use aws_sdk_lexmodelbuilding::operation::get_intent::GetIntentOutput;
use aws_sdk_lexmodelbuilding::operation::put_intent::builders::PutIntentFluentBuilder;
use tfaws_core::provider::{ProviderError, ProviderResult};
use tfaws_core::resource::{Resource, ResourceId, State, Value};

use super::flex::{
    expand_code_hook, expand_follow_up_prompt, expand_fulfillment_activity, expand_prompt,
    expand_slots, expand_statement, flatten_code_hook, flatten_follow_up_prompt,
    flatten_fulfillment_activity, flatten_prompt, flatten_slots, flatten_statement, format_date,
};
use super::{
    CREATE_TIMEOUT, DELETE_TIMEOUT, LATEST_VERSION, UPDATE_TIMEOUT, exists, keep_write_only,
    latest_intent_version, lex_arn, retry_on_conflict, state_version, wait_deleted,
};
use crate::AwsProvider;
use crate::errors::{is_not_found, is_not_found_error, sdk_error};
use crate::flex::{
    Attributes, get_block, get_blocks, get_bool, get_str, get_string, get_string_list,
    insert_opt, require_str, string_list,
};

const WRITE_ONLY: &[&str] = &["create_version"];

pub(crate) fn flatten_intent(output: &GetIntentOutput) -> Attributes {
    let mut attrs = Attributes::new();
    insert_opt(&mut attrs, "name", output.name());
    insert_opt(&mut attrs, "description", output.description());
    insert_opt(&mut attrs, "checksum", output.checksum());
    insert_opt(&mut attrs, "created_date", format_date(output.created_date()));
    insert_opt(&mut attrs, "last_updated_date", format_date(output.last_updated_date()));
    insert_opt(&mut attrs, "parent_intent_signature", output.parent_intent_signature());
    if !output.sample_utterances().is_empty() {
        attrs.insert(
            "sample_utterances".to_string(),
            string_list(output.sample_utterances().iter().cloned()),
        );
    }
    if !output.slots().is_empty() {
        attrs.insert("slot".to_string(), flatten_slots(output.slots()));
    }
    if let Some(activity) = output.fulfillment_activity() {
        attrs.insert(
            "fulfillment_activity".to_string(),
            flatten_fulfillment_activity(activity),
        );
    }
    if let Some(prompt) = output.confirmation_prompt() {
        attrs.insert("confirmation_prompt".to_string(), flatten_prompt(prompt));
    }
    if let Some(statement) = output.rejection_statement() {
        attrs.insert("rejection_statement".to_string(), flatten_statement(statement));
    }
    if let Some(statement) = output.conclusion_statement() {
        attrs.insert("conclusion_statement".to_string(), flatten_statement(statement));
    }
    if let Some(hook) = output.dialog_code_hook() {
        attrs.insert("dialog_code_hook".to_string(), flatten_code_hook(hook));
    }
    if let Some(follow_up) = output.follow_up_prompt() {
        attrs.insert("follow_up_prompt".to_string(), flatten_follow_up_prompt(follow_up));
    }
    attrs
}

pub(crate) fn put_intent_request(
    client: &Client,
    attrs: &Attributes,
    id: &ResourceId,
    checksum: Option<String>,
) -> ProviderResult<PutIntentFluentBuilder> {
    let name = require_str(attrs, "name", id)?;
    let activity = get_block(attrs, "fulfillment_activity").ok_or_else(|| {
        ProviderError::new("Attribute 'fulfillment_activity' is required").for_resource(id.clone())
    })?;
    let slots = get_blocks(attrs, "slot");
    let utterances = get_string_list(attrs, "sample_utterances");

    Ok(client
        .put_intent()
        .name(name)
        .set_description(get_string(attrs, "description"))
        .fulfillment_activity(expand_fulfillment_activity(activity)?)
        .set_slots((!slots.is_empty()).then(|| expand_slots(&slots)).transpose()?)
        .set_sample_utterances((!utterances.is_empty()).then_some(utterances))
        .set_confirmation_prompt(
            get_block(attrs, "confirmation_prompt").map(expand_prompt).transpose()?,
        )
        .set_rejection_statement(
            get_block(attrs, "rejection_statement")
                .map(expand_statement)
                .transpose()?,
        )
        .set_conclusion_statement(
            get_block(attrs, "conclusion_statement")
                .map(expand_statement)
                .transpose()?,
        )
        .set_dialog_code_hook(
            get_block(attrs, "dialog_code_hook")
                .map(expand_code_hook)
                .transpose()?,
        )
        .set_follow_up_prompt(
            get_block(attrs, "follow_up_prompt")
                .map(expand_follow_up_prompt)
                .transpose()?,
        )
        .set_parent_intent_signature(get_string(attrs, "parent_intent_signature"))
        .create_version(get_bool(attrs, "create_version").unwrap_or(false))
        .set_checksum(checksum))
}

async fn find_intent_version(
    client: &Client,
    name: &str,
    version: &str,
) -> ProviderResult<Option<GetIntentOutput>> {
    match client.get_intent().name(name).version(version).send().await {
        Ok(output) => Ok(Some(output)),
        Err(e) if is_not_found(&e) => Ok(None),
        Err(e) => Err(sdk_error(
            format!("reading Lex Intent ({}) version ({})", name, version),
            e,
        )),
    }
}

impl AwsProvider {
    pub(crate) async fn read_lex_intent(
        &self,
        id: &ResourceId,
        identifier: &str,
    ) -> ProviderResult<State> {
        let client = &self.conns.lexmodels;
        let Some(output) = find_intent_version(client, identifier, LATEST_VERSION)
            .await
            .map_err(|e| e.for_resource(id.clone()))?
        else {
            log::warn!("Lex Intent ({}) not found", identifier);
            return Ok(State::not_found(id.clone()));
        };

        let latest = latest_intent_version(client, identifier)
            .await
            .map_err(|e| e.for_resource(id.clone()))?;

        let mut attrs = flatten_intent(&output);
        attrs.insert(
            "arn".to_string(),
            Value::from(lex_arn(&self.conns, format!("intent:{}", identifier))),
        );
        attrs.insert("version".to_string(), Value::from(state_version(latest)));
        Ok(State::existing(id.clone(), attrs).with_identifier(identifier))
    }

    async fn put_lex_intent(
        &self,
        id: &ResourceId,
        attrs: &Attributes,
        checksum: Option<String>,
        timeout: std::time::Duration,
    ) -> ProviderResult<String> {
        let name = require_str(attrs, "name", id)?;
        let request = put_intent_request(&self.conns.lexmodels, attrs, id, checksum)
            .map_err(|e| e.for_resource(id.clone()))?;

        retry_on_conflict(timeout, || {
            let request = request.clone();
            async move {
                request
                    .send()
                    .await
                    .map_err(|e| sdk_error(format!("putting Lex Intent ({})", name), e))
            }
        })
        .await
        .map_err(|e| e.for_resource(id.clone()))?;
        Ok(name.to_string())
    }

    pub(crate) async fn create_lex_intent(&self, resource: Resource) -> ProviderResult<State> {
        let name = self
            .put_lex_intent(&resource.id, &resource.attributes, None, CREATE_TIMEOUT)
            .await?;
        log::info!("Created Lex Intent {}", name);

        let mut state = self.read_lex_intent(&resource.id, &name).await?;
        keep_write_only(&mut state, &resource.attributes, WRITE_ONLY);
        Ok(state)
    }

    pub(crate) async fn update_lex_intent(
        &self,
        id: ResourceId,
        identifier: &str,
        from: State,
        to: Resource,
    ) -> ProviderResult<State> {
        let checksum = get_string(&from.attributes, "checksum");
        self.put_lex_intent(&id, &to.attributes, checksum, UPDATE_TIMEOUT)
            .await?;
        log::info!("Updated Lex Intent {}", identifier);

        let mut state = self.read_lex_intent(&id, identifier).await?;
        keep_write_only(&mut state, &to.attributes, WRITE_ONLY);
        Ok(state)
    }

    /// Fails while a bot still references the intent; conflicts are retried
    pub(crate) async fn delete_lex_intent(
        &self,
        id: ResourceId,
        identifier: &str,
    ) -> ProviderResult<()> {
        let client = &self.conns.lexmodels;
        log::info!("Deleting Lex Intent {}", identifier);

        let result = retry_on_conflict(DELETE_TIMEOUT, || async move {
            client
                .delete_intent()
                .name(identifier)
                .send()
                .await
                .map_err(|e| sdk_error(format!("deleting Lex Intent ({})", identifier), e))
        })
        .await;
        match result {
            Ok(_) => {}
            Err(e) if is_not_found_error(&e) => return Ok(()),
            Err(e) => return Err(e.for_resource(id)),
        }

        wait_deleted("Intent", identifier, || async move {
            Ok(exists(find_intent_version(client, identifier, LATEST_VERSION).await?))
        })
        .await
        .map_err(|e| e.for_resource(id))
    }

    pub(crate) async fn read_lex_intent_data(&self, resource: Resource) -> ProviderResult<State> {
        let id = resource.id.clone();
        let name = require_str(&resource.attributes, "name", &id)?;
        let version = get_str(&resource.attributes, "version").unwrap_or(LATEST_VERSION);

        let output = find_intent_version(&self.conns.lexmodels, name, version)
            .await
            .map_err(|e| e.for_resource(id.clone()))?
            .ok_or_else(|| {
                ProviderError::new(format!("Lex Intent ({}) version ({}) not found", name, version))
                    .for_resource(id.clone())
            })?;

        let mut attrs = flatten_intent(&output);
        attrs.insert(
            "arn".to_string(),
            Value::from(lex_arn(&self.conns, format!("intent:{}", name))),
        );
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
    use aws_sdk_lexmodelbuilding::types::{
        ContentType, FulfillmentActivity, FulfillmentActivityType, Message, Slot, SlotConstraint,
        Statement,
    };
    use crate::flex::block;
    use crate::lexmodels::test_client;

    fn return_intent() -> Attributes {
        let mut activity = Attributes::new();
        activity.insert("type".to_string(), Value::from("ReturnIntent"));
        activity
    }

    #[test]
    fn flatten_intent_blocks() {
        let output = GetIntentOutput::builder()
            .name("OrderFlowersIntent")
            .sample_utterances("I would like to pick up flowers")
            .slots(
                Slot::builder()
                    .name("FlowerType")
                    .slot_constraint(SlotConstraint::Required)
                    .slot_type("FlowerTypes")
                    .slot_type_version("$LATEST")
                    .build()
                    .unwrap(),
            )
            .fulfillment_activity(
                FulfillmentActivity::builder()
                    .r#type(FulfillmentActivityType::ReturnIntent)
                    .build()
                    .unwrap(),
            )
            .rejection_statement(
                Statement::builder()
                    .messages(
                        Message::builder()
                            .content("Okay, I will not place your order.")
                            .content_type(ContentType::PlainText)
                            .build()
                            .unwrap(),
                    )
                    .build()
                    .unwrap(),
            )
            .checksum("c-3")
            .build();

        let attrs = flatten_intent(&output);
        assert!(attrs["fulfillment_activity"].satisfies(&block(return_intent())));
        assert_eq!(
            attrs["sample_utterances"],
            string_list(["I would like to pick up flowers"])
        );
        assert_eq!(attrs["slot"].as_list().map(<[Value]>::len), Some(1));
        assert!(attrs.contains_key("rejection_statement"));
        assert!(!attrs.contains_key("confirmation_prompt"));
        assert!(!attrs.contains_key("follow_up_prompt"));
    }

    #[tokio::test]
    async fn put_request_requires_fulfillment_activity() {
        let id = ResourceId::new("lex.intent", "order");
        let mut attrs = Attributes::new();
        attrs.insert("name".to_string(), Value::from("OrderFlowersIntent"));

        let client = test_client();
        let err = put_intent_request(&client, &attrs, &id, None).unwrap_err();
        assert!(err.to_string().contains("fulfillment_activity"));

        attrs.insert("fulfillment_activity".to_string(), block(return_intent()));
        attrs.insert("create_version".to_string(), Value::Bool(true));
        let request = put_intent_request(&client, &attrs, &id, Some("c-3".to_string())).unwrap();
        assert_eq!(request.get_create_version(), &Some(true));
        assert_eq!(request.get_checksum().as_deref(), Some("c-3"));
        assert_eq!(request.get_slots(), &None);
        assert_eq!(
            request.get_fulfillment_activity().as_ref().map(|a| a.r#type()),
            Some(&FulfillmentActivityType::ReturnIntent)
        );
    }
}
