use aws_sdk_lexmodelbuilding::Client;
use aws_sdk_lexmodelbuilding::operation::get_bot::GetBotOutput;
use aws_sdk_lexmodelbuilding::operation::put_bot::builders::PutBotFluentBuilder;
use aws_sdk_lexmodelbuilding::types::{Locale, ProcessBehavior, Status};
use tfaws_core::provider::{ProviderError, ProviderResult};
use tfaws_core::resource::{Resource, ResourceId, State, Value};
use tfaws_core::waiter::{Refreshed, StateChangeConf};

use super::flex::{
    expand_intents, expand_prompt, expand_statement, flatten_intents, flatten_prompt,
    flatten_statement, format_date,
};
use super::{
    CREATE_TIMEOUT, DELETE_TIMEOUT, LATEST_VERSION, UPDATE_TIMEOUT, exists, keep_write_only,
    latest_bot_version, lex_arn, retry_on_conflict, state_version, wait_deleted,
};
use crate::AwsProvider;
use crate::errors::{is_not_found, is_not_found_error, sdk_error};
use crate::flex::{
    Attributes, get_block, get_blocks, get_bool, get_float, get_i32, get_str, get_string,
    insert_opt, require_str,
};

const WRITE_ONLY: &[&str] = &["create_version", "process_behavior"];

/// A published version shows up within a few polls, or not at all
const VERSION_NOT_FOUND_CHECKS: u32 = 5;

/// Bot attributes as reported by GetBot, without `arn` and `version`
pub(crate) fn flatten_bot(output: &GetBotOutput) -> Attributes {
    let mut attrs = Attributes::new();
    insert_opt(&mut attrs, "name", output.name());
    insert_opt(&mut attrs, "description", output.description());
    attrs.insert("intent".to_string(), flatten_intents(output.intents()));
    insert_opt(&mut attrs, "enable_model_improvements", output.enable_model_improvements());
    insert_opt(
        &mut attrs,
        "nlu_intent_confidence_threshold",
        output.nlu_intent_confidence_threshold(),
    );
    if let Some(prompt) = output.clarification_prompt() {
        attrs.insert("clarification_prompt".to_string(), flatten_prompt(prompt));
    }
    if let Some(statement) = output.abort_statement() {
        attrs.insert("abort_statement".to_string(), flatten_statement(statement));
    }
    insert_opt(&mut attrs, "status", output.status().map(|s| s.as_str()));
    insert_opt(&mut attrs, "failure_reason", output.failure_reason());
    insert_opt(&mut attrs, "created_date", format_date(output.created_date()));
    insert_opt(&mut attrs, "last_updated_date", format_date(output.last_updated_date()));
    insert_opt(
        &mut attrs,
        "idle_session_ttl_in_seconds",
        output.idle_session_ttl_in_seconds(),
    );
    insert_opt(&mut attrs, "voice_id", output.voice_id());
    insert_opt(&mut attrs, "checksum", output.checksum());
    insert_opt(&mut attrs, "locale", output.locale().map(|l| l.as_str()));
    insert_opt(&mut attrs, "child_directed", output.child_directed());
    insert_opt(&mut attrs, "detect_sentiment", output.detect_sentiment());
    attrs
}

/// PutBot request for the desired attributes. `checksum` is the one of the
/// bot being replaced, `None` on create.
pub(crate) fn put_bot_request(
    client: &Client,
    attrs: &Attributes,
    id: &ResourceId,
    checksum: Option<String>,
) -> ProviderResult<PutBotFluentBuilder> {
    let name = require_str(attrs, "name", id)?;
    let intents = expand_intents(&get_blocks(attrs, "intent"))?;
    let clarification_prompt = get_block(attrs, "clarification_prompt")
        .map(expand_prompt)
        .transpose()?;
    let abort_statement = get_block(attrs, "abort_statement")
        .map(expand_statement)
        .transpose()?;

    Ok(client
        .put_bot()
        .name(name)
        .set_description(get_string(attrs, "description"))
        .set_intents(Some(intents))
        .set_clarification_prompt(clarification_prompt)
        .set_abort_statement(abort_statement)
        .child_directed(get_bool(attrs, "child_directed").unwrap_or(false))
        .create_version(get_bool(attrs, "create_version").unwrap_or(false))
        .detect_sentiment(get_bool(attrs, "detect_sentiment").unwrap_or(false))
        .enable_model_improvements(get_bool(attrs, "enable_model_improvements").unwrap_or(false))
        .idle_session_ttl_in_seconds(get_i32(attrs, "idle_session_ttl_in_seconds").unwrap_or(300))
        .locale(Locale::from(get_str(attrs, "locale").unwrap_or("en-US")))
        .nlu_intent_confidence_threshold(
            get_float(attrs, "nlu_intent_confidence_threshold").unwrap_or(0.0),
        )
        .process_behavior(ProcessBehavior::from(
            get_str(attrs, "process_behavior").unwrap_or("SAVE"),
        ))
        .set_voice_id(get_string(attrs, "voice_id"))
        .set_checksum(checksum))
}

pub(crate) async fn find_bot_version(
    client: &Client,
    name: &str,
    version: &str,
) -> ProviderResult<Option<GetBotOutput>> {
    match client
        .get_bot()
        .name(name)
        .version_or_alias(version)
        .send()
        .await
    {
        Ok(output) => Ok(Some(output)),
        Err(e) if is_not_found(&e) => Ok(None),
        Err(e) => Err(sdk_error(
            format!("reading Lex Bot ({}) version ({})", name, version),
            e,
        )),
    }
}

/// A failed build ends the wait with the bot's failure reason
async fn status_bot_version(
    client: &Client,
    name: &str,
    version: &str,
) -> ProviderResult<Refreshed<GetBotOutput>> {
    let Some(output) = find_bot_version(client, name, version).await? else {
        return Ok(None);
    };
    if output.status() == Some(&Status::Failed) {
        return Err(ProviderError::new(format!(
            "Lex Bot ({}) version ({}) failed: {}",
            name,
            version,
            output.failure_reason().unwrap_or_default()
        )));
    }
    let status = output.status().map(|s| s.as_str().to_string()).unwrap_or_default();
    Ok(Some((output, status)))
}

async fn wait_bot_version_created(
    client: &Client,
    name: &str,
    version: &str,
    timeout: std::time::Duration,
) -> ProviderResult<()> {
    StateChangeConf::new(
        &[Status::Building.as_str()],
        &[
            Status::NotBuilt.as_str(),
            Status::Ready.as_str(),
            Status::ReadyBasicTesting.as_str(),
        ],
        timeout,
    )
    .with_not_found_checks(VERSION_NOT_FOUND_CHECKS)
    .wait_for_state(|| status_bot_version(client, name, version))
    .await
    .map_err(|e| {
        ProviderError::from(e).context(format!(
            "waiting for Lex Bot ({}) version ({}) to build",
            name, version
        ))
    })?;
    Ok(())
}

impl AwsProvider {
    pub(crate) async fn read_lex_bot(&self, id: &ResourceId, identifier: &str) -> ProviderResult<State> {
        let client = &self.conns.lexmodels;
        let Some(output) = find_bot_version(client, identifier, LATEST_VERSION)
            .await
            .map_err(|e| e.for_resource(id.clone()))?
        else {
            log::warn!("Lex Bot ({}) not found", identifier);
            return Ok(State::not_found(id.clone()));
        };

        let latest = latest_bot_version(client, identifier)
            .await
            .map_err(|e| e.for_resource(id.clone()))?;

        let mut attrs = flatten_bot(&output);
        attrs.insert(
            "arn".to_string(),
            Value::from(lex_arn(&self.conns, format!("bot:{}", identifier))),
        );
        attrs.insert("version".to_string(), Value::from(state_version(latest)));
        Ok(State::existing(id.clone(), attrs).with_identifier(identifier))
    }

    /// Put the bot and wait for the version the put produced to settle
    async fn put_lex_bot(
        &self,
        id: &ResourceId,
        attrs: &Attributes,
        checksum: Option<String>,
        timeout: std::time::Duration,
    ) -> ProviderResult<String> {
        let client = &self.conns.lexmodels;
        let name = require_str(attrs, "name", id)?;
        let request =
            put_bot_request(client, attrs, id, checksum).map_err(|e| e.for_resource(id.clone()))?;

        let output = retry_on_conflict(timeout, || {
            let request = request.clone();
            async move {
                request
                    .send()
                    .await
                    .map_err(|e| sdk_error(format!("putting Lex Bot ({})", name), e))
            }
        })
        .await
        .map_err(|e| e.for_resource(id.clone()))?;

        let version = output.version().unwrap_or(LATEST_VERSION);
        wait_bot_version_created(client, name, version, timeout)
            .await
            .map_err(|e| e.for_resource(id.clone()))?;
        Ok(name.to_string())
    }

    pub(crate) async fn create_lex_bot(&self, resource: Resource) -> ProviderResult<State> {
        let id = resource.id.clone();
        let name = self
            .put_lex_bot(&id, &resource.attributes, None, CREATE_TIMEOUT)
            .await?;
        log::info!("Created Lex Bot {}", name);

        let mut state = self.read_lex_bot(&id, &name).await?;
        keep_write_only(&mut state, &resource.attributes, WRITE_ONLY);
        Ok(state)
    }

    pub(crate) async fn update_lex_bot(
        &self,
        id: ResourceId,
        identifier: &str,
        from: State,
        to: Resource,
    ) -> ProviderResult<State> {
        let checksum = get_string(&from.attributes, "checksum");
        self.put_lex_bot(&id, &to.attributes, checksum, UPDATE_TIMEOUT)
            .await?;
        log::info!("Updated Lex Bot {}", identifier);

        let mut state = self.read_lex_bot(&id, identifier).await?;
        keep_write_only(&mut state, &to.attributes, WRITE_ONLY);
        Ok(state)
    }

    /// Deleting a bot removes all of its versions
    pub(crate) async fn delete_lex_bot(&self, id: ResourceId, identifier: &str) -> ProviderResult<()> {
        let client = &self.conns.lexmodels;
        log::info!("Deleting Lex Bot {}", identifier);

        let result = retry_on_conflict(DELETE_TIMEOUT, || async move {
            client
                .delete_bot()
                .name(identifier)
                .send()
                .await
                .map_err(|e| sdk_error(format!("deleting Lex Bot ({})", identifier), e))
        })
        .await;
        match result {
            Ok(_) => {}
            Err(e) if is_not_found_error(&e) => return Ok(()),
            Err(e) => return Err(e.for_resource(id)),
        }

        wait_deleted("Bot", identifier, || async move {
            Ok(exists(find_bot_version(client, identifier, LATEST_VERSION).await?))
        })
        .await
        .map_err(|e| e.for_resource(id))
    }

    /// A bot by `name` at `version`, `$LATEST` unless given
    pub(crate) async fn read_lex_bot_data(&self, resource: Resource) -> ProviderResult<State> {
        let id = resource.id.clone();
        let attrs = &resource.attributes;
        let name = require_str(attrs, "name", &id)?;
        let version = get_str(attrs, "version").unwrap_or(LATEST_VERSION);

        let output = find_bot_version(&self.conns.lexmodels, name, version)
            .await
            .map_err(|e| e.for_resource(id.clone()))?
            .ok_or_else(|| {
                ProviderError::new(format!("Lex Bot ({}) version ({}) not found", name, version))
                    .for_resource(id.clone())
            })?;

        let mut state_attrs = flatten_bot(&output);
        state_attrs.insert(
            "arn".to_string(),
            Value::from(lex_arn(&self.conns, format!("bot:{}", name))),
        );
        state_attrs.insert(
            "version".to_string(),
            Value::from(output.version().unwrap_or(version)),
        );
        Ok(State::existing(id, state_attrs).with_identifier(name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aws_sdk_lexmodelbuilding::primitives::DateTime;
    use aws_sdk_lexmodelbuilding::types::{ContentType, Intent, Message, Prompt};
    use crate::flex::{block, blocks};
    use crate::lexmodels::test_client;

    fn intent(name: &str, version: &str) -> Attributes {
        let mut item = Attributes::new();
        item.insert("intent_name".to_string(), Value::from(name));
        item.insert("intent_version".to_string(), Value::from(version));
        item
    }

    #[test]
    fn flatten_reports_bot_settings() {
        let output = GetBotOutput::builder()
            .name("OrderFlowers")
            .intents(
                Intent::builder()
                    .intent_name("OrderFlowersIntent")
                    .intent_version("1")
                    .build()
                    .unwrap(),
            )
            .clarification_prompt(
                Prompt::builder()
                    .max_attempts(2)
                    .messages(
                        Message::builder()
                            .content("I didn't understand you, what would you like to do?")
                            .content_type(ContentType::PlainText)
                            .build()
                            .unwrap(),
                    )
                    .build()
                    .unwrap(),
            )
            .status(Status::NotBuilt)
            .checksum("c-1")
            .locale(Locale::EnUs)
            .child_directed(false)
            .idle_session_ttl_in_seconds(600)
            .nlu_intent_confidence_threshold(0.5)
            .created_date(DateTime::from_secs(1_577_836_800))
            .build();

        let attrs = flatten_bot(&output);
        assert_eq!(attrs.get("status"), Some(&Value::from("NOT_BUILT")));
        assert_eq!(attrs.get("locale"), Some(&Value::from("en-US")));
        assert_eq!(attrs.get("idle_session_ttl_in_seconds"), Some(&Value::Int(600)));
        assert_eq!(
            attrs.get("nlu_intent_confidence_threshold"),
            Some(&Value::Float(0.5))
        );
        assert_eq!(
            attrs.get("created_date"),
            Some(&Value::from("2020-01-01T00:00:00Z"))
        );
        assert_eq!(
            attrs["intent"],
            blocks([intent("OrderFlowersIntent", "1")])
        );
        assert!(attrs.contains_key("clarification_prompt"));
        assert!(!attrs.contains_key("abort_statement"));
    }

    #[tokio::test]
    async fn put_request_carries_checksum_and_defaults() {
        let id = ResourceId::new("lex.bot", "flowers");
        let mut attrs = Attributes::new();
        attrs.insert("name".to_string(), Value::from("OrderFlowers"));
        attrs.insert("child_directed".to_string(), Value::Bool(false));
        attrs.insert("intent".to_string(), block(intent("OrderFlowersIntent", "$LATEST")));

        let client = test_client();
        let request = put_bot_request(&client, &attrs, &id, Some("c-1".to_string())).unwrap();
        assert_eq!(request.get_checksum().as_deref(), Some("c-1"));
        assert_eq!(request.get_process_behavior(), &Some(ProcessBehavior::Save));
        assert_eq!(request.get_intents().as_ref().map(Vec::len), Some(1));

        let create = put_bot_request(&client, &attrs, &id, None).unwrap();
        assert_eq!(create.get_checksum(), &None);
    }

    #[tokio::test]
    async fn put_request_rejects_incomplete_intents() {
        let id = ResourceId::new("lex.bot", "flowers");
        let mut attrs = Attributes::new();
        attrs.insert("name".to_string(), Value::from("OrderFlowers"));
        let mut partial = Attributes::new();
        partial.insert("intent_name".to_string(), Value::from("OrderFlowersIntent"));
        attrs.insert("intent".to_string(), block(partial));

        let err = put_bot_request(&test_client(), &attrs, &id, None).unwrap_err();
        assert!(err.to_string().starts_with("invalid Lex bot intent"));
    }
}
