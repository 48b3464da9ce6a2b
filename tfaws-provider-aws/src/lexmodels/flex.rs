//! Conversions between Lex nested blocks and SDK types
//!
//! Most Lex structures have required members, so their builders fail when a
//! block is incomplete. Those failures surface as `ProviderError`s.

use aws_sdk_lexmodelbuilding::error::BuildError;
use aws_sdk_lexmodelbuilding::primitives::{DateTime, DateTimeFormat};
use aws_sdk_lexmodelbuilding::types::{
    CodeHook, ContentType, ConversationLogsRequest, ConversationLogsResponse, Destination,
    EnumerationValue, FollowUpPrompt, FulfillmentActivity, FulfillmentActivityType, Intent, LogSettingsRequest,
    LogType, Message, Prompt, Slot, SlotConstraint, Statement,
};
use tfaws_core::provider::{ProviderError, ProviderResult};
use tfaws_core::resource::Value;

use crate::flex::{
    Attributes, block, blocks, get_block, get_blocks, get_i32, get_str, get_string, get_string_list,
    insert_opt, string_list,
};

fn built<T>(what: &str, result: Result<T, BuildError>) -> ProviderResult<T> {
    result.map_err(|e| ProviderError::new(format!("invalid Lex {}", what)).with_cause(e))
}

/// RFC 3339 rendering of an API timestamp
pub(crate) fn format_date(date: Option<&DateTime>) -> Option<String> {
    date.and_then(|d| d.fmt(DateTimeFormat::DateTime).ok())
}

pub(crate) fn expand_messages(items: &[&Attributes]) -> ProviderResult<Vec<Message>> {
    items
        .iter()
        .map(|m| {
            built(
                "message",
                Message::builder()
                    .set_content(get_string(m, "content"))
                    .set_content_type(get_str(m, "content_type").map(ContentType::from))
                    .set_group_number(get_i32(m, "group_number"))
                    .build(),
            )
        })
        .collect()
}

pub(crate) fn flatten_messages(messages: &[Message]) -> Value {
    blocks(messages.iter().map(|m| {
        let mut item = Attributes::new();
        item.insert("content".to_string(), Value::from(m.content()));
        item.insert("content_type".to_string(), Value::from(m.content_type().as_str()));
        insert_opt(&mut item, "group_number", m.group_number());
        item
    }))
}

pub(crate) fn expand_prompt(prompt: &Attributes) -> ProviderResult<Prompt> {
    built(
        "prompt",
        Prompt::builder()
            .set_messages(Some(expand_messages(&get_blocks(prompt, "message"))?))
            .set_max_attempts(get_i32(prompt, "max_attempts"))
            .set_response_card(get_string(prompt, "response_card"))
            .build(),
    )
}

pub(crate) fn flatten_prompt(prompt: &Prompt) -> Value {
    let mut item = Attributes::new();
    item.insert("max_attempts".to_string(), Value::from(prompt.max_attempts()));
    item.insert("message".to_string(), flatten_messages(prompt.messages()));
    insert_opt(&mut item, "response_card", prompt.response_card());
    block(item)
}

pub(crate) fn expand_statement(statement: &Attributes) -> ProviderResult<Statement> {
    built(
        "statement",
        Statement::builder()
            .set_messages(Some(expand_messages(&get_blocks(statement, "message"))?))
            .set_response_card(get_string(statement, "response_card"))
            .build(),
    )
}

pub(crate) fn flatten_statement(statement: &Statement) -> Value {
    let mut item = Attributes::new();
    item.insert("message".to_string(), flatten_messages(statement.messages()));
    insert_opt(&mut item, "response_card", statement.response_card());
    block(item)
}

pub(crate) fn expand_code_hook(hook: &Attributes) -> ProviderResult<CodeHook> {
    built(
        "code hook",
        CodeHook::builder()
            .set_message_version(get_string(hook, "message_version"))
            .set_uri(get_string(hook, "uri"))
            .build(),
    )
}

pub(crate) fn flatten_code_hook(hook: &CodeHook) -> Value {
    let mut item = Attributes::new();
    item.insert("message_version".to_string(), Value::from(hook.message_version()));
    item.insert("uri".to_string(), Value::from(hook.uri()));
    block(item)
}

pub(crate) fn expand_follow_up_prompt(follow_up: &Attributes) -> ProviderResult<FollowUpPrompt> {
    let prompt = get_block(follow_up, "prompt").map(expand_prompt).transpose()?;
    let rejection = get_block(follow_up, "rejection_statement")
        .map(expand_statement)
        .transpose()?;
    Ok(FollowUpPrompt::builder()
        .set_prompt(prompt)
        .set_rejection_statement(rejection)
        .build())
}

pub(crate) fn flatten_follow_up_prompt(follow_up: &FollowUpPrompt) -> Value {
    let mut item = Attributes::new();
    if let Some(prompt) = follow_up.prompt() {
        item.insert("prompt".to_string(), flatten_prompt(prompt));
    }
    if let Some(statement) = follow_up.rejection_statement() {
        item.insert("rejection_statement".to_string(), flatten_statement(statement));
    }
    block(item)
}

pub(crate) fn expand_fulfillment_activity(activity: &Attributes) -> ProviderResult<FulfillmentActivity> {
    let code_hook = get_block(activity, "code_hook").map(expand_code_hook).transpose()?;
    built(
        "fulfillment activity",
        FulfillmentActivity::builder()
            .set_type(get_str(activity, "type").map(FulfillmentActivityType::from))
            .set_code_hook(code_hook)
            .build(),
    )
}

pub(crate) fn flatten_fulfillment_activity(activity: &FulfillmentActivity) -> Value {
    let mut item = Attributes::new();
    item.insert("type".to_string(), Value::from(activity.r#type().as_str()));
    if let Some(hook) = activity.code_hook() {
        item.insert("code_hook".to_string(), flatten_code_hook(hook));
    }
    block(item)
}

pub(crate) fn expand_slots(items: &[&Attributes]) -> ProviderResult<Vec<Slot>> {
    items
        .iter()
        .map(|s| {
            let prompt = get_block(s, "value_elicitation_prompt")
                .map(expand_prompt)
                .transpose()?;
            let utterances = get_string_list(s, "sample_utterances");
            built(
                "slot",
                Slot::builder()
                    .set_name(get_string(s, "name"))
                    .set_description(get_string(s, "description"))
                    .set_priority(get_i32(s, "priority"))
                    .set_response_card(get_string(s, "response_card"))
                    .set_sample_utterances((!utterances.is_empty()).then_some(utterances))
                    .set_slot_constraint(get_str(s, "slot_constraint").map(SlotConstraint::from))
                    .set_slot_type(get_string(s, "slot_type"))
                    .set_slot_type_version(get_string(s, "slot_type_version"))
                    .set_value_elicitation_prompt(prompt)
                    .build(),
            )
        })
        .collect()
}

pub(crate) fn flatten_slots(slots: &[Slot]) -> Value {
    blocks(slots.iter().map(|s| {
        let mut item = Attributes::new();
        item.insert("name".to_string(), Value::from(s.name()));
        insert_opt(&mut item, "description", s.description());
        insert_opt(&mut item, "priority", s.priority());
        insert_opt(&mut item, "response_card", s.response_card());
        if !s.sample_utterances().is_empty() {
            item.insert(
                "sample_utterances".to_string(),
                string_list(s.sample_utterances().iter().cloned()),
            );
        }
        item.insert(
            "slot_constraint".to_string(),
            Value::from(s.slot_constraint().as_str()),
        );
        insert_opt(&mut item, "slot_type", s.slot_type());
        insert_opt(&mut item, "slot_type_version", s.slot_type_version());
        if let Some(prompt) = s.value_elicitation_prompt() {
            item.insert("value_elicitation_prompt".to_string(), flatten_prompt(prompt));
        }
        item
    }))
}

pub(crate) fn expand_enumeration_values(items: &[&Attributes]) -> ProviderResult<Vec<EnumerationValue>> {
    items
        .iter()
        .map(|v| {
            let synonyms = get_string_list(v, "synonyms");
            built(
                "enumeration value",
                EnumerationValue::builder()
                    .set_value(get_string(v, "value"))
                    .set_synonyms((!synonyms.is_empty()).then_some(synonyms))
                    .build(),
            )
        })
        .collect()
}

pub(crate) fn flatten_enumeration_values(values: &[EnumerationValue]) -> Value {
    blocks(values.iter().map(|v| {
        let mut item = Attributes::new();
        item.insert("value".to_string(), Value::from(v.value()));
        if !v.synonyms().is_empty() {
            item.insert("synonyms".to_string(), string_list(v.synonyms().iter().cloned()));
        }
        item
    }))
}

pub(crate) fn expand_intents(items: &[&Attributes]) -> ProviderResult<Vec<Intent>> {
    items
        .iter()
        .map(|i| {
            built(
                "bot intent",
                Intent::builder()
                    .set_intent_name(get_string(i, "intent_name"))
                    .set_intent_version(get_string(i, "intent_version"))
                    .build(),
            )
        })
        .collect()
}

pub(crate) fn flatten_intents(intents: &[Intent]) -> Value {
    blocks(intents.iter().map(|i| {
        let mut item = Attributes::new();
        item.insert("intent_name".to_string(), Value::from(i.intent_name()));
        item.insert("intent_version".to_string(), Value::from(i.intent_version()));
        item
    }))
}

pub(crate) fn expand_conversation_logs(logs: &Attributes) -> ProviderResult<ConversationLogsRequest> {
    let settings = get_blocks(logs, "log_settings")
        .into_iter()
        .map(|s| {
            built(
                "log settings",
                LogSettingsRequest::builder()
                    .set_destination(get_str(s, "destination").map(Destination::from))
                    .set_log_type(get_str(s, "log_type").map(LogType::from))
                    .set_resource_arn(get_string(s, "resource_arn"))
                    .set_kms_key_arn(get_string(s, "kms_key_arn"))
                    .build(),
            )
        })
        .collect::<ProviderResult<Vec<_>>>()?;
    built(
        "conversation logs",
        ConversationLogsRequest::builder()
            .set_iam_role_arn(get_string(logs, "iam_role_arn"))
            .set_log_settings(Some(settings))
            .build(),
    )
}

pub(crate) fn flatten_conversation_logs(logs: &ConversationLogsResponse) -> Value {
    let mut item = Attributes::new();
    insert_opt(&mut item, "iam_role_arn", logs.iam_role_arn());
    item.insert(
        "log_settings".to_string(),
        blocks(logs.log_settings().iter().map(|s| {
            let mut setting = Attributes::new();
            insert_opt(&mut setting, "destination", s.destination().map(|d| d.as_str()));
            insert_opt(&mut setting, "log_type", s.log_type().map(|t| t.as_str()));
            insert_opt(&mut setting, "resource_arn", s.resource_arn());
            insert_opt(&mut setting, "kms_key_arn", s.kms_key_arn());
            insert_opt(&mut setting, "resource_prefix", s.resource_prefix());
            setting
        })),
    );
    block(item)
}
