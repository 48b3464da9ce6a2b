use aws_sdk_lexmodelbuilding::Client;
use aws_sdk_lexmodelbuilding::operation::get_bot_alias::GetBotAliasOutput;
use aws_sdk_lexmodelbuilding::operation::put_bot_alias::builders::PutBotAliasFluentBuilder;
use tfaws_core::provider::{ProviderError, ProviderResult};
use tfaws_core::resource::{Resource, ResourceId, State, Value};

use super::flex::{expand_conversation_logs, flatten_conversation_logs, format_date};
use super::{
    CREATE_TIMEOUT, DELETE_TIMEOUT, UPDATE_TIMEOUT, bot_alias_create_id, bot_alias_parse_id,
    exists, lex_arn, retry_on_conflict, wait_deleted,
};
use crate::AwsProvider;
use crate::errors::{is_not_found, is_not_found_error, sdk_error};
use crate::flex::{Attributes, get_block, get_string, insert_opt, require_str};

pub(crate) fn flatten_bot_alias(output: &GetBotAliasOutput) -> Attributes {
    let mut attrs = Attributes::new();
    insert_opt(&mut attrs, "name", output.name());
    insert_opt(&mut attrs, "bot_name", output.bot_name());
    insert_opt(&mut attrs, "bot_version", output.bot_version());
    insert_opt(&mut attrs, "description", output.description());
    insert_opt(&mut attrs, "checksum", output.checksum());
    insert_opt(&mut attrs, "created_date", format_date(output.created_date()));
    insert_opt(&mut attrs, "last_updated_date", format_date(output.last_updated_date()));
    if let Some(logs) = output.conversation_logs() {
        attrs.insert("conversation_logs".to_string(), flatten_conversation_logs(logs));
    }
    attrs
}

pub(crate) fn put_bot_alias_request(
    client: &Client,
    attrs: &Attributes,
    id: &ResourceId,
    checksum: Option<String>,
) -> ProviderResult<PutBotAliasFluentBuilder> {
    let conversation_logs = get_block(attrs, "conversation_logs")
        .map(expand_conversation_logs)
        .transpose()?;
    Ok(client
        .put_bot_alias()
        .name(require_str(attrs, "name", id)?)
        .bot_name(require_str(attrs, "bot_name", id)?)
        .bot_version(require_str(attrs, "bot_version", id)?)
        .set_description(get_string(attrs, "description"))
        .set_conversation_logs(conversation_logs)
        .set_checksum(checksum))
}

async fn find_bot_alias(
    client: &Client,
    bot_name: &str,
    name: &str,
) -> ProviderResult<Option<GetBotAliasOutput>> {
    match client.get_bot_alias().bot_name(bot_name).name(name).send().await {
        Ok(output) => Ok(Some(output)),
        Err(e) if is_not_found(&e) => Ok(None),
        Err(e) => Err(sdk_error(
            format!("reading Lex Bot Alias ({}:{})", bot_name, name),
            e,
        )),
    }
}

impl AwsProvider {
    fn bot_alias_state(
        &self,
        id: &ResourceId,
        output: &GetBotAliasOutput,
        bot_name: &str,
        name: &str,
    ) -> State {
        let mut attrs = flatten_bot_alias(output);
        attrs.insert(
            "arn".to_string(),
            Value::from(lex_arn(&self.conns, format!("bot:{}:{}", bot_name, name))),
        );
        State::existing(id.clone(), attrs).with_identifier(bot_alias_create_id(bot_name, name))
    }

    pub(crate) async fn read_lex_bot_alias(
        &self,
        id: &ResourceId,
        identifier: &str,
    ) -> ProviderResult<State> {
        let (bot_name, name) =
            bot_alias_parse_id(identifier).map_err(|e| ProviderError::from(e).for_resource(id.clone()))?;
        let Some(output) = find_bot_alias(&self.conns.lexmodels, &bot_name, &name)
            .await
            .map_err(|e| e.for_resource(id.clone()))?
        else {
            log::warn!("Lex Bot Alias ({}) not found", identifier);
            return Ok(State::not_found(id.clone()));
        };
        Ok(self.bot_alias_state(id, &output, &bot_name, &name))
    }

    async fn put_lex_bot_alias(
        &self,
        id: &ResourceId,
        attrs: &Attributes,
        checksum: Option<String>,
        timeout: std::time::Duration,
    ) -> ProviderResult<String> {
        let request = put_bot_alias_request(&self.conns.lexmodels, attrs, id, checksum)
            .map_err(|e| e.for_resource(id.clone()))?;
        let bot_name = require_str(attrs, "bot_name", id)?;
        let name = require_str(attrs, "name", id)?;
        let identifier = bot_alias_create_id(bot_name, name);

        retry_on_conflict(timeout, || {
            let request = request.clone();
            let identifier = identifier.as_str();
            async move {
                request
                    .send()
                    .await
                    .map_err(|e| sdk_error(format!("putting Lex Bot Alias ({})", identifier), e))
            }
        })
        .await
        .map_err(|e| e.for_resource(id.clone()))?;
        Ok(identifier)
    }

    pub(crate) async fn create_lex_bot_alias(&self, resource: Resource) -> ProviderResult<State> {
        let identifier = self
            .put_lex_bot_alias(&resource.id, &resource.attributes, None, CREATE_TIMEOUT)
            .await?;
        log::info!("Created Lex Bot Alias {}", identifier);
        self.read_lex_bot_alias(&resource.id, &identifier).await
    }

    pub(crate) async fn update_lex_bot_alias(
        &self,
        id: ResourceId,
        identifier: &str,
        from: State,
        to: Resource,
    ) -> ProviderResult<State> {
        let checksum = get_string(&from.attributes, "checksum");
        self.put_lex_bot_alias(&id, &to.attributes, checksum, UPDATE_TIMEOUT)
            .await?;
        log::info!("Updated Lex Bot Alias {}", identifier);
        self.read_lex_bot_alias(&id, identifier).await
    }

    pub(crate) async fn delete_lex_bot_alias(
        &self,
        id: ResourceId,
        identifier: &str,
    ) -> ProviderResult<()> {
        let client = &self.conns.lexmodels;
        let (bot_name, name) =
            bot_alias_parse_id(identifier).map_err(|e| ProviderError::from(e).for_resource(id.clone()))?;
        let (bot_name, name) = (bot_name.as_str(), name.as_str());
        log::info!("Deleting Lex Bot Alias {}", identifier);

        let result = retry_on_conflict(DELETE_TIMEOUT, || async move {
            client
                .delete_bot_alias()
                .bot_name(bot_name)
                .name(name)
                .send()
                .await
                .map_err(|e| sdk_error(format!("deleting Lex Bot Alias ({})", identifier), e))
        })
        .await;
        match result {
            Ok(_) => {}
            Err(e) if is_not_found_error(&e) => return Ok(()),
            Err(e) => return Err(e.for_resource(id)),
        }

        wait_deleted("Bot Alias", identifier, || async move {
            Ok(exists(find_bot_alias(client, bot_name, name).await?))
        })
        .await
        .map_err(|e| e.for_resource(id))
    }

    pub(crate) async fn read_lex_bot_alias_data(&self, resource: Resource) -> ProviderResult<State> {
        let id = resource.id.clone();
        let bot_name = require_str(&resource.attributes, "bot_name", &id)?;
        let name = require_str(&resource.attributes, "name", &id)?;

        let output = find_bot_alias(&self.conns.lexmodels, bot_name, name)
            .await
            .map_err(|e| e.for_resource(id.clone()))?
            .ok_or_else(|| {
                ProviderError::new(format!("Lex Bot Alias ({}:{}) not found", bot_name, name))
                    .for_resource(id.clone())
            })?;
        Ok(self.bot_alias_state(&id, &output, bot_name, name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aws_sdk_lexmodelbuilding::types::{
        ConversationLogsResponse, Destination, LogSettingsResponse, LogType,
    };
    use crate::flex::{block, blocks};
    use crate::lexmodels::test_client;

    #[test]
    fn flatten_alias_with_logs() {
        let output = GetBotAliasOutput::builder()
            .name("prod")
            .bot_name("OrderFlowers")
            .bot_version("2")
            .checksum("c-2")
            .conversation_logs(
                ConversationLogsResponse::builder()
                    .iam_role_arn("arn:aws:iam::111111111111:role/lex")
                    .log_settings(
                        LogSettingsResponse::builder()
                            .destination(Destination::CloudwatchLogs)
                            .log_type(LogType::Text)
                            .resource_arn("arn:aws:logs:us-east-1:111111111111:log-group:lex")
                            .resource_prefix("aws/lex/OrderFlowers/prod")
                            .build(),
                    )
                    .build(),
            )
            .build();

        let attrs = flatten_bot_alias(&output);
        assert_eq!(attrs.get("bot_version"), Some(&Value::from("2")));
        assert_eq!(attrs.get("checksum"), Some(&Value::from("c-2")));
        assert!(!attrs.contains_key("description"));

        let mut setting = Attributes::new();
        setting.insert("destination".to_string(), Value::from("CLOUDWATCH_LOGS"));
        setting.insert("log_type".to_string(), Value::from("TEXT"));
        let mut logs = Attributes::new();
        logs.insert("log_settings".to_string(), blocks([setting]));
        assert!(attrs["conversation_logs"].satisfies(&block(logs)));
    }

    #[tokio::test]
    async fn put_request_requires_bot_version() {
        let id = ResourceId::new("lex.bot_alias", "prod");
        let mut attrs = Attributes::new();
        attrs.insert("name".to_string(), Value::from("prod"));
        attrs.insert("bot_name".to_string(), Value::from("OrderFlowers"));

        let client = test_client();
        let err = put_bot_alias_request(&client, &attrs, &id, None).unwrap_err();
        assert!(err.to_string().contains("Attribute 'bot_version' is required"));

        attrs.insert("bot_version".to_string(), Value::from("$LATEST"));
        let request = put_bot_alias_request(&client, &attrs, &id, Some("c-1".to_string())).unwrap();
        assert_eq!(request.get_bot_version().as_deref(), Some("$LATEST"));
        assert_eq!(request.get_checksum().as_deref(), Some("c-1"));
        assert_eq!(request.get_conversation_logs(), &None);
    }
}
