//! Global Accelerator resource schema definitions

use tfaws_core::resource::Value;
use tfaws_core::schema::{AttributeSchema, AttributeType, ResourceSchema, types};

use super::types as aws_types;

fn ip_sets() -> AttributeType {
    AttributeType::Block(vec![
        AttributeSchema::new("ip_family", AttributeType::String),
        AttributeSchema::new("ip_addresses", types::string_list()),
    ])
}

fn flow_logs_attributes() -> AttributeType {
    AttributeType::Block(vec![
        AttributeSchema::new("flow_logs_enabled", AttributeType::Bool)
            .with_default(Value::Bool(false)),
        AttributeSchema::new("flow_logs_s3_bucket", AttributeType::String),
        AttributeSchema::new("flow_logs_s3_prefix", AttributeType::String),
    ])
}

pub fn accelerator_schema() -> ResourceSchema {
    ResourceSchema::new("globalaccelerator.accelerator")
        .with_description("A Global Accelerator accelerator")
        .attribute(AttributeSchema::new("name", aws_types::accelerator_name()).required())
        .attribute(
            AttributeSchema::new("ip_address_type", types::one_of(&["IPV4", "DUAL_STACK"]))
                .with_default(Value::from("IPV4")),
        )
        .attribute(
            AttributeSchema::new("ip_addresses", types::string_list())
                .optional_computed()
                .force_new()
                .max_items(2)
                .with_description("Bring-your-own IPv4 addresses for the static IP set"),
        )
        .attribute(AttributeSchema::new("enabled", AttributeType::Bool).with_default(Value::Bool(true)))
        .attribute(
            AttributeSchema::new("attributes", flow_logs_attributes())
                .optional_computed()
                .max_items(1),
        )
        .attribute(AttributeSchema::new("tags", types::string_map()))
        .attribute(AttributeSchema::new("tags_all", types::string_map()).computed())
        .attribute(AttributeSchema::new("dns_name", AttributeType::String).computed())
        .attribute(AttributeSchema::new("dual_stack_dns_name", AttributeType::String).computed())
        .attribute(AttributeSchema::new("hosted_zone_id", AttributeType::String).computed())
        .attribute(AttributeSchema::new("ip_sets", ip_sets()).computed())
}

pub fn listener_schema() -> ResourceSchema {
    ResourceSchema::new("globalaccelerator.listener")
        .with_description("A listener processing inbound connections to an accelerator")
        .attribute(
            AttributeSchema::new("accelerator_arn", types::arn())
                .required()
                .force_new(),
        )
        .attribute(
            AttributeSchema::new("client_affinity", types::one_of(&["NONE", "SOURCE_IP"]))
                .with_default(Value::from("NONE")),
        )
        .attribute(AttributeSchema::new("protocol", types::one_of(&["TCP", "UDP"])).required())
        .attribute(
            AttributeSchema::new(
                "port_range",
                AttributeType::Block(vec![
                    AttributeSchema::new("from_port", types::port_number()),
                    AttributeSchema::new("to_port", types::port_number()),
                ]),
            )
            .required()
            .max_items(10),
        )
}

pub fn endpoint_group_schema() -> ResourceSchema {
    ResourceSchema::new("globalaccelerator.endpoint_group")
        .with_description("A group of regional endpoints behind a listener")
        .attribute(AttributeSchema::new("listener_arn", types::arn()).required().force_new())
        .attribute(
            AttributeSchema::new("endpoint_group_region", AttributeType::String)
                .optional_computed()
                .force_new()
                .with_description("Defaults to the provider region"),
        )
        .attribute(
            AttributeSchema::new("health_check_interval_seconds", aws_types::health_check_interval())
                .with_default(Value::Int(30)),
        )
        .attribute(AttributeSchema::new("health_check_path", AttributeType::String).optional_computed())
        .attribute(AttributeSchema::new("health_check_port", types::port_number()).optional_computed())
        .attribute(
            AttributeSchema::new("health_check_protocol", types::one_of(&["TCP", "HTTP", "HTTPS"]))
                .with_default(Value::from("TCP")),
        )
        .attribute(
            AttributeSchema::new("threshold_count", aws_types::threshold_count())
                .with_default(Value::Int(3)),
        )
        .attribute(
            AttributeSchema::new("traffic_dial_percentage", types::percentage())
                .with_default(Value::Float(100.0)),
        )
        .attribute(
            AttributeSchema::new(
                "endpoint_configuration",
                AttributeType::Block(vec![
                    AttributeSchema::new("endpoint_id", AttributeType::String),
                    AttributeSchema::new("weight", aws_types::endpoint_weight()),
                    AttributeSchema::new("client_ip_preservation_enabled", AttributeType::Bool),
                ]),
            )
            .max_items(10),
        )
        .attribute(
            AttributeSchema::new(
                "port_override",
                AttributeType::Block(vec![
                    AttributeSchema::new("endpoint_port", types::port_number()).required(),
                    AttributeSchema::new("listener_port", types::port_number()).required(),
                ]),
            )
            .max_items(10),
        )
        .attribute(AttributeSchema::new("arn", AttributeType::String).computed())
}

/// Lookup of an existing accelerator by ARN or name
pub fn accelerator_data_source_schema() -> ResourceSchema {
    super::data_source_schema(
        "globalaccelerator.accelerator",
        accelerator_schema().attribute(AttributeSchema::new("arn", AttributeType::String)),
        &["arn", "name"],
    )
}

pub fn schemas() -> Vec<ResourceSchema> {
    vec![
        accelerator_schema(),
        listener_schema(),
        endpoint_group_schema(),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn port_range(from: i64, to: i64) -> Value {
        let mut map = HashMap::new();
        map.insert("from_port".to_string(), Value::Int(from));
        map.insert("to_port".to_string(), Value::Int(to));
        Value::Map(map)
    }

    #[test]
    fn listener_requires_port_range() {
        let schema = listener_schema();
        let mut attrs = HashMap::new();
        attrs.insert(
            "accelerator_arn".to_string(),
            Value::from("arn:aws:globalaccelerator::111111111111:accelerator/a-1"),
        );
        attrs.insert("protocol".to_string(), Value::from("TCP"));
        assert!(schema.validate(&attrs).is_err());

        attrs.insert("port_range".to_string(), Value::List(vec![port_range(80, 81)]));
        assert!(schema.validate(&attrs).is_ok());

        let too_many = (0..11).map(|i| port_range(1000 + i, 1000 + i)).collect();
        attrs.insert("port_range".to_string(), Value::List(too_many));
        assert!(schema.validate(&attrs).is_err());
    }

    #[test]
    fn accelerator_defaults_and_computed() {
        let schema = accelerator_schema();
        let mut attrs = HashMap::new();
        attrs.insert("name".to_string(), Value::from("example"));
        assert!(schema.validate(&attrs).is_ok());

        let with_defaults = schema.with_defaults(&attrs);
        assert_eq!(with_defaults.get("ip_address_type"), Some(&Value::from("IPV4")));
        assert_eq!(with_defaults.get("enabled"), Some(&Value::Bool(true)));

        attrs.insert("dns_name".to_string(), Value::from("a1234.awsglobalaccelerator.com"));
        assert!(schema.validate(&attrs).is_err());
    }

    #[test]
    fn endpoint_group_accepts_integer_dial() {
        let schema = endpoint_group_schema();
        let mut attrs = HashMap::new();
        attrs.insert(
            "listener_arn".to_string(),
            Value::from("arn:aws:globalaccelerator::111111111111:accelerator/a-1/listener/l-1"),
        );
        attrs.insert("traffic_dial_percentage".to_string(), Value::Int(50));
        assert!(schema.validate(&attrs).is_ok());

        attrs.insert("health_check_interval_seconds".to_string(), Value::Int(15));
        assert!(schema.validate(&attrs).is_err());
    }

    #[test]
    fn data_source_takes_arn_or_name() {
        let schema = accelerator_data_source_schema();
        let mut attrs = HashMap::new();
        attrs.insert("name".to_string(), Value::from("example"));
        assert!(schema.validate(&attrs).is_ok());

        attrs.insert("enabled".to_string(), Value::Bool(true));
        assert!(schema.validate(&attrs).is_err());
    }
}
