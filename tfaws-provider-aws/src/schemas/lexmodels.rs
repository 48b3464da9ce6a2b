//! Lex Model Building resource schema definitions

use aws_sdk_lexmodelbuilding::types::{
    ContentType, Destination, FulfillmentActivityType, Locale, LogType, ProcessBehavior,
    SlotConstraint, SlotValueSelectionStrategy,
};
use tfaws_core::resource::Value;
use tfaws_core::schema::{AttributeSchema, AttributeType, ResourceSchema, types};

use super::types as aws_types;

fn message() -> AttributeType {
    AttributeType::Block(vec![
        AttributeSchema::new("content", AttributeType::String).required(),
        AttributeSchema::new("content_type", types::one_of(ContentType::values())).required(),
        AttributeSchema::new("group_number", types::positive_int()),
    ])
}

fn messages() -> AttributeSchema {
    AttributeSchema::new("message", message()).required().max_items(15)
}

fn prompt() -> AttributeType {
    AttributeType::Block(vec![
        AttributeSchema::new("max_attempts", aws_types::lex_max_attempts()).required(),
        messages(),
        AttributeSchema::new("response_card", AttributeType::String),
    ])
}

fn statement() -> AttributeType {
    AttributeType::Block(vec![
        messages(),
        AttributeSchema::new("response_card", AttributeType::String),
    ])
}

fn code_hook() -> AttributeType {
    AttributeType::Block(vec![
        AttributeSchema::new("message_version", AttributeType::String).required(),
        AttributeSchema::new("uri", types::arn()).required(),
    ])
}

fn single(name: &str, attr_type: AttributeType) -> AttributeSchema {
    AttributeSchema::new(name, attr_type).max_items(1)
}

fn computed_dates(schema: ResourceSchema) -> ResourceSchema {
    schema
        .attribute(AttributeSchema::new("checksum", AttributeType::String).computed())
        .attribute(AttributeSchema::new("created_date", AttributeType::String).computed())
        .attribute(AttributeSchema::new("last_updated_date", AttributeType::String).computed())
}

fn create_version() -> AttributeSchema {
    AttributeSchema::new("create_version", AttributeType::Bool)
        .with_default(Value::Bool(false))
        .write_only()
        .with_description("Publish a numbered version after each change")
}

pub fn bot_schema() -> ResourceSchema {
    let intents = AttributeType::Block(vec![
        AttributeSchema::new("intent_name", aws_types::lex_name()).required(),
        AttributeSchema::new("intent_version", aws_types::lex_version()).required(),
    ]);
    let schema = ResourceSchema::new("lex.bot")
        .with_description("An Amazon Lex (V1) conversational bot")
        .attribute(AttributeSchema::new("name", aws_types::lex_name()).required().force_new())
        .attribute(AttributeSchema::new("description", AttributeType::String))
        .attribute(single("abort_statement", statement()))
        .attribute(single("clarification_prompt", prompt()))
        .attribute(AttributeSchema::new("child_directed", AttributeType::Bool).required())
        .attribute(create_version())
        .attribute(
            AttributeSchema::new("detect_sentiment", AttributeType::Bool)
                .with_default(Value::Bool(false)),
        )
        .attribute(
            AttributeSchema::new("enable_model_improvements", AttributeType::Bool)
                .with_default(Value::Bool(false)),
        )
        .attribute(
            AttributeSchema::new("idle_session_ttl_in_seconds", aws_types::lex_idle_session_ttl())
                .with_default(Value::Int(300)),
        )
        .attribute(AttributeSchema::new("intent", intents).required().max_items(250))
        .attribute(
            AttributeSchema::new("locale", types::one_of(Locale::values()))
                .with_default(Value::from("en-US"))
                .force_new(),
        )
        .attribute(
            AttributeSchema::new("nlu_intent_confidence_threshold", aws_types::confidence_threshold())
                .with_default(Value::Float(0.0)),
        )
        .attribute(
            AttributeSchema::new("process_behavior", types::one_of(ProcessBehavior::values()))
                .with_default(Value::from("SAVE"))
                .write_only(),
        )
        .attribute(AttributeSchema::new("voice_id", AttributeType::String).optional_computed())
        .attribute(AttributeSchema::new("arn", AttributeType::String).computed())
        .attribute(AttributeSchema::new("status", AttributeType::String).computed())
        .attribute(AttributeSchema::new("failure_reason", AttributeType::String).computed())
        .attribute(AttributeSchema::new("version", AttributeType::String).computed());
    computed_dates(schema)
}

pub fn bot_alias_schema() -> ResourceSchema {
    let log_settings = AttributeType::Block(vec![
        AttributeSchema::new("destination", types::one_of(Destination::values())).required(),
        AttributeSchema::new("log_type", types::one_of(LogType::values())).required(),
        AttributeSchema::new("resource_arn", types::arn()).required(),
        AttributeSchema::new("kms_key_arn", types::arn()),
        AttributeSchema::new("resource_prefix", AttributeType::String),
    ]);
    let conversation_logs = AttributeType::Block(vec![
        AttributeSchema::new("iam_role_arn", types::arn()).required(),
        AttributeSchema::new("log_settings", log_settings),
    ]);
    let schema = ResourceSchema::new("lex.bot_alias")
        .with_description("A named pointer to a version of a Lex bot")
        .attribute(AttributeSchema::new("bot_name", aws_types::lex_name()).required().force_new())
        .attribute(AttributeSchema::new("bot_version", aws_types::lex_version()).required())
        .attribute(AttributeSchema::new("name", aws_types::lex_name()).required().force_new())
        .attribute(AttributeSchema::new("description", AttributeType::String))
        .attribute(single("conversation_logs", conversation_logs))
        .attribute(AttributeSchema::new("arn", AttributeType::String).computed());
    computed_dates(schema)
}

pub fn intent_schema() -> ResourceSchema {
    let slot = AttributeType::Block(vec![
        AttributeSchema::new("name", aws_types::lex_name()).required(),
        AttributeSchema::new("description", AttributeType::String),
        AttributeSchema::new("priority", types::non_negative_int()),
        AttributeSchema::new("response_card", AttributeType::String),
        AttributeSchema::new("sample_utterances", types::string_list()).max_items(10),
        AttributeSchema::new("slot_constraint", types::one_of(SlotConstraint::values()))
            .required(),
        AttributeSchema::new("slot_type", AttributeType::String).required(),
        AttributeSchema::new("slot_type_version", aws_types::lex_version()),
        single("value_elicitation_prompt", prompt()),
    ]);
    let fulfillment_activity = AttributeType::Block(vec![
        AttributeSchema::new("type", types::one_of(FulfillmentActivityType::values())).required(),
        single("code_hook", code_hook()),
    ]);
    let follow_up_prompt = AttributeType::Block(vec![
        single("prompt", prompt()).required(),
        single("rejection_statement", statement()).required(),
    ]);
    let schema = ResourceSchema::new("lex.intent")
        .with_description("A Lex intent: an action the user wants to perform")
        .attribute(AttributeSchema::new("name", aws_types::lex_name()).required().force_new())
        .attribute(AttributeSchema::new("description", AttributeType::String))
        .attribute(AttributeSchema::new("sample_utterances", types::string_list()).max_items(1500))
        .attribute(AttributeSchema::new("slot", slot).max_items(100))
        .attribute(single("fulfillment_activity", fulfillment_activity).required())
        .attribute(single("confirmation_prompt", prompt()))
        .attribute(single("rejection_statement", statement()))
        .attribute(single("conclusion_statement", statement()))
        .attribute(single("dialog_code_hook", code_hook()))
        .attribute(single("follow_up_prompt", follow_up_prompt))
        .attribute(AttributeSchema::new("parent_intent_signature", AttributeType::String))
        .attribute(create_version())
        .attribute(AttributeSchema::new("arn", AttributeType::String).computed())
        .attribute(AttributeSchema::new("version", AttributeType::String).computed());
    computed_dates(schema)
}

pub fn slot_type_schema() -> ResourceSchema {
    let enumeration_value = AttributeType::Block(vec![
        AttributeSchema::new("value", AttributeType::String).required(),
        AttributeSchema::new("synonyms", types::string_list()),
    ]);
    let schema = ResourceSchema::new("lex.slot_type")
        .with_description("A custom Lex slot type and its values")
        .attribute(AttributeSchema::new("name", aws_types::lex_name()).required().force_new())
        .attribute(AttributeSchema::new("description", AttributeType::String))
        .attribute(
            AttributeSchema::new("enumeration_value", enumeration_value)
                .required()
                .max_items(10000),
        )
        .attribute(
            AttributeSchema::new(
                "value_selection_strategy",
                types::one_of(SlotValueSelectionStrategy::values()),
            )
            .with_default(Value::from("ORIGINAL_VALUE")),
        )
        .attribute(create_version())
        .attribute(AttributeSchema::new("version", AttributeType::String).computed());
    computed_dates(schema)
}

/// Data sources read a named object at a version, `$LATEST` unless given
fn versioned_data_source(resource_type: &str, base: ResourceSchema) -> ResourceSchema {
    super::data_source_schema(resource_type, base, &[])
        .attribute(AttributeSchema::new("name", aws_types::lex_name()).required())
        .attribute(
            AttributeSchema::new("version", aws_types::lex_version())
                .with_default(Value::from("$LATEST")),
        )
}

pub fn bot_data_source_schema() -> ResourceSchema {
    versioned_data_source("lex.bot", bot_schema())
}

pub fn intent_data_source_schema() -> ResourceSchema {
    versioned_data_source("lex.intent", intent_schema())
}

pub fn slot_type_data_source_schema() -> ResourceSchema {
    versioned_data_source("lex.slot_type", slot_type_schema())
}

pub fn bot_alias_data_source_schema() -> ResourceSchema {
    super::data_source_schema("lex.bot_alias", bot_alias_schema(), &[])
        .attribute(AttributeSchema::new("bot_name", aws_types::lex_name()).required())
        .attribute(AttributeSchema::new("name", aws_types::lex_name()).required())
}

pub fn schemas() -> Vec<ResourceSchema> {
    vec![
        bot_schema(),
        bot_alias_schema(),
        intent_schema(),
        slot_type_schema(),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn map(pairs: Vec<(&str, Value)>) -> Value {
        Value::Map(pairs.into_iter().map(|(k, v)| (k.to_string(), v)).collect())
    }

    fn plain_message(text: &str) -> Value {
        Value::List(vec![map(vec![
            ("content", Value::from(text)),
            ("content_type", Value::from("PlainText")),
        ])])
    }

    #[test]
    fn bot_with_prompt_validates() {
        let mut attrs = HashMap::new();
        attrs.insert("name".to_string(), Value::from("OrderFlowers"));
        attrs.insert("child_directed".to_string(), Value::Bool(false));
        attrs.insert(
            "intent".to_string(),
            Value::List(vec![map(vec![
                ("intent_name", Value::from("OrderFlowers")),
                ("intent_version", Value::from("1")),
            ])]),
        );
        attrs.insert(
            "clarification_prompt".to_string(),
            Value::List(vec![map(vec![
                ("max_attempts", Value::Int(2)),
                ("message", plain_message("Sorry, can you repeat that?")),
            ])]),
        );
        assert!(bot_schema().validate(&attrs).is_ok());

        attrs.insert("locale".to_string(), Value::from("xx-XX"));
        assert!(bot_schema().validate(&attrs).is_err());
    }

    #[test]
    fn write_only_defaults_do_not_diff() {
        let schema = bot_schema();
        let mut desired = HashMap::new();
        desired.insert("name".to_string(), Value::from("OrderFlowers"));
        desired.insert("process_behavior".to_string(), Value::from("SAVE"));

        let mut current = HashMap::new();
        current.insert("name".to_string(), Value::from("OrderFlowers"));
        current.insert("idle_session_ttl_in_seconds".to_string(), Value::Int(300));
        current.insert("nlu_intent_confidence_threshold".to_string(), Value::Int(0));
        current.insert("locale".to_string(), Value::from("en-US"));
        current.insert("detect_sentiment".to_string(), Value::Bool(false));
        current.insert("enable_model_improvements".to_string(), Value::Bool(false));
        assert!(schema.changed_attributes(&current, &desired).is_empty());

        desired.insert("process_behavior".to_string(), Value::from("BUILD"));
        desired.insert("create_version".to_string(), Value::Bool(true));
        assert!(schema.changed_attributes(&current, &desired).is_empty());

        desired.insert("description".to_string(), Value::from("Orders flowers"));
        assert_eq!(
            schema.changed_attributes(&current, &desired),
            vec!["description".to_string()]
        );
    }

    #[test]
    fn intent_requires_fulfillment_activity() {
        let mut attrs = HashMap::new();
        attrs.insert("name".to_string(), Value::from("BookHotel"));
        assert!(intent_schema().validate(&attrs).is_err());

        attrs.insert(
            "fulfillment_activity".to_string(),
            Value::List(vec![map(vec![("type", Value::from("ReturnIntent"))])]),
        );
        assert!(intent_schema().validate(&attrs).is_ok());
    }

    #[test]
    fn data_sources_default_to_latest() {
        let schema = bot_data_source_schema();
        let mut attrs = HashMap::new();
        assert!(schema.validate(&attrs).is_err());

        attrs.insert("name".to_string(), Value::from("OrderFlowers"));
        assert!(schema.validate(&attrs).is_ok());
        assert_eq!(
            schema.with_defaults(&attrs).get("version"),
            Some(&Value::from("$LATEST"))
        );

        attrs.insert("checksum".to_string(), Value::from("abc"));
        assert!(schema.validate(&attrs).is_err());
    }
}
