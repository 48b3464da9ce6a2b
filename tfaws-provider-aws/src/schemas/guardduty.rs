//! GuardDuty resource schema definitions

use aws_sdk_guardduty::types::{
    DetectorFeature, FeatureAdditionalConfiguration, FindingPublishingFrequency, IpSetFormat,
};
use tfaws_core::resource::Value;
use tfaws_core::schema::{AttributeSchema, AttributeType, ResourceSchema, types};

use super::types as aws_types;
use crate::guardduty::normalize_finding_criteria;

fn feature_status() -> AttributeType {
    types::one_of(&["ENABLED", "DISABLED"])
}

/// A block holding a single `enable` flag
fn enable_block() -> AttributeType {
    AttributeType::Block(vec![AttributeSchema::new("enable", AttributeType::Bool).required()])
}

fn single(name: &str, attr_type: AttributeType) -> AttributeSchema {
    AttributeSchema::new(name, attr_type).max_items(1)
}

fn datasources() -> AttributeType {
    AttributeType::Block(vec![
        single("s3_logs", enable_block()),
        single(
            "kubernetes",
            AttributeType::Block(vec![single("audit_logs", enable_block()).required()]),
        ),
        single(
            "malware_protection",
            AttributeType::Block(vec![
                single(
                    "scan_ec2_instance_with_findings",
                    AttributeType::Block(vec![single("ebs_volumes", enable_block()).required()]),
                )
                .required(),
            ]),
        ),
    ])
}

fn additional_configuration() -> AttributeType {
    AttributeType::Block(vec![
        AttributeSchema::new(
            "name",
            types::one_of(FeatureAdditionalConfiguration::values()),
        )
        .required(),
        AttributeSchema::new("status", feature_status()).required(),
    ])
}

pub fn detector_schema() -> ResourceSchema {
    ResourceSchema::new("guardduty.detector")
        .with_description("A GuardDuty detector, the regional on/off switch for the service")
        .attribute(AttributeSchema::new("enable", AttributeType::Bool).with_default(Value::Bool(true)))
        .attribute(
            AttributeSchema::new(
                "finding_publishing_frequency",
                types::one_of(FindingPublishingFrequency::values()),
            )
            .optional_computed(),
        )
        .attribute(single("datasources", datasources()).optional_computed())
        .attribute(AttributeSchema::new("tags", types::string_map()))
        .attribute(AttributeSchema::new("tags_all", types::string_map()).computed())
        .attribute(AttributeSchema::new("account_id", AttributeType::String).computed())
        .attribute(AttributeSchema::new("arn", AttributeType::String).computed())
}

pub fn detector_feature_schema() -> ResourceSchema {
    ResourceSchema::new("guardduty.detector_feature")
        .with_description("One protection plan feature of a GuardDuty detector")
        .attribute(AttributeSchema::new("detector_id", AttributeType::String).required().force_new())
        .attribute(
            AttributeSchema::new("name", types::one_of(DetectorFeature::values()))
                .required()
                .force_new(),
        )
        .attribute(AttributeSchema::new("status", feature_status()).required())
        .attribute(
            // GuardDuty reports every sub-feature, including those never configured
            AttributeSchema::new("additional_configuration", additional_configuration())
                .optional_computed(),
        )
}

fn criterion() -> AttributeType {
    AttributeType::Block(vec![
        AttributeSchema::new("field", AttributeType::String).required(),
        AttributeSchema::new("equals", types::string_list()),
        AttributeSchema::new("not_equals", types::string_list()),
        AttributeSchema::new("greater_than", AttributeType::String),
        AttributeSchema::new("greater_than_or_equal", AttributeType::String),
        AttributeSchema::new("less_than", AttributeType::String),
        AttributeSchema::new("less_than_or_equal", AttributeType::String),
    ])
}

pub fn filter_schema() -> ResourceSchema {
    ResourceSchema::new("guardduty.filter")
        .with_description("A GuardDuty findings filter")
        .attribute(AttributeSchema::new("detector_id", AttributeType::String).required().force_new())
        .attribute(
            AttributeSchema::new("name", aws_types::guardduty_filter_name())
                .required()
                .force_new(),
        )
        .attribute(AttributeSchema::new("description", AttributeType::String))
        .attribute(AttributeSchema::new("rank", types::positive_int()).required())
        .attribute(AttributeSchema::new("action", types::one_of(&["NOOP", "ARCHIVE"])).required())
        .attribute(
            single(
                "finding_criteria",
                AttributeType::Block(vec![AttributeSchema::new("criterion", criterion()).required()]),
            )
            .required(),
        )
        .attribute(AttributeSchema::new("tags", types::string_map()))
        .attribute(AttributeSchema::new("tags_all", types::string_map()).computed())
        .attribute(AttributeSchema::new("arn", AttributeType::String).computed())
        .with_normalizer(normalize_finding_criteria)
}

/// IP sets and threat intel sets share one shape
fn list_schema(resource_type: &str, description: &str) -> ResourceSchema {
    ResourceSchema::new(resource_type)
        .with_description(description)
        .attribute(AttributeSchema::new("detector_id", AttributeType::String).required().force_new())
        .attribute(AttributeSchema::new("name", AttributeType::String).required())
        .attribute(
            AttributeSchema::new("format", types::one_of(IpSetFormat::values()))
                .required()
                .force_new(),
        )
        .attribute(AttributeSchema::new("location", AttributeType::String).required())
        .attribute(AttributeSchema::new("activate", AttributeType::Bool).required())
        .attribute(AttributeSchema::new("tags", types::string_map()))
        .attribute(AttributeSchema::new("tags_all", types::string_map()).computed())
        .attribute(AttributeSchema::new("arn", AttributeType::String).computed())
}

pub fn ipset_schema() -> ResourceSchema {
    list_schema("guardduty.ipset", "A list of trusted IP addresses")
}

pub fn threatintelset_schema() -> ResourceSchema {
    list_schema("guardduty.threatintelset", "A list of known malicious IP addresses")
}

pub fn member_schema() -> ResourceSchema {
    ResourceSchema::new("guardduty.member")
        .with_description("A member account associated with an administrator detector")
        .attribute(
            AttributeSchema::new("account_id", types::aws_account_id())
                .required()
                .force_new(),
        )
        .attribute(AttributeSchema::new("detector_id", AttributeType::String).required().force_new())
        .attribute(AttributeSchema::new("email", AttributeType::String).required().force_new())
        .attribute(AttributeSchema::new("invite", AttributeType::Bool).with_default(Value::Bool(false)))
        .attribute(
            AttributeSchema::new("disable_email_notification", AttributeType::Bool)
                .with_default(Value::Bool(false)),
        )
        .attribute(AttributeSchema::new("invitation_message", AttributeType::String))
        .attribute(AttributeSchema::new("relationship_status", AttributeType::String).computed())
}

pub fn publishing_destination_schema() -> ResourceSchema {
    ResourceSchema::new("guardduty.publishing_destination")
        .with_description("Export destination for GuardDuty findings")
        .attribute(AttributeSchema::new("detector_id", AttributeType::String).required().force_new())
        .attribute(AttributeSchema::new("destination_arn", types::arn()).required())
        .attribute(AttributeSchema::new("kms_key_arn", types::arn()).required())
        .attribute(
            AttributeSchema::new("destination_type", types::one_of(&["S3"]))
                .with_default(Value::from("S3")),
        )
}

pub fn organization_admin_account_schema() -> ResourceSchema {
    ResourceSchema::new("guardduty.organization_admin_account")
        .with_description("The delegated GuardDuty administrator of an organization")
        .attribute(
            AttributeSchema::new("admin_account_id", types::aws_account_id())
                .required()
                .force_new(),
        )
}

/// Lookup of the detector in the current region
pub fn detector_data_source_schema() -> ResourceSchema {
    let feature = AttributeType::Block(vec![
        AttributeSchema::new("name", AttributeType::String),
        AttributeSchema::new("status", AttributeType::String),
        AttributeSchema::new(
            "additional_configuration",
            AttributeType::Block(vec![
                AttributeSchema::new("name", AttributeType::String),
                AttributeSchema::new("status", AttributeType::String),
            ]),
        ),
    ]);
    ResourceSchema::new("guardduty.detector")
        .with_description("The GuardDuty detector of the current region")
        .attribute(AttributeSchema::new("id", AttributeType::String).optional_computed())
        .attribute(AttributeSchema::new("status", AttributeType::String).computed())
        .attribute(AttributeSchema::new("service_role_arn", AttributeType::String).computed())
        .attribute(
            AttributeSchema::new("finding_publishing_frequency", AttributeType::String).computed(),
        )
        .attribute(AttributeSchema::new("features", feature).computed())
        .attribute(AttributeSchema::new("arn", AttributeType::String).computed())
        .attribute(AttributeSchema::new("tags", types::string_map()).computed())
}

pub fn schemas() -> Vec<ResourceSchema> {
    vec![
        detector_schema(),
        detector_feature_schema(),
        filter_schema(),
        ipset_schema(),
        threatintelset_schema(),
        member_schema(),
        publishing_destination_schema(),
        organization_admin_account_schema(),
    ]
}
