//! Resource type definitions
//!
//! Each resource and data source type implements `ResourceType`, pairing its
//! name with the schema function from `schemas`.

use tfaws_core::provider::ResourceType;
use tfaws_core::schema::ResourceSchema;

use crate::schemas::{globalaccelerator, guardduty, lexmodels};

macro_rules! define_resource_type {
    ($name:ident, $type_name:expr, $schema:path) => {
        pub struct $name;
        impl ResourceType for $name {
            fn name(&self) -> &'static str {
                $type_name
            }
            fn schema(&self) -> ResourceSchema {
                $schema()
            }
        }
    };
    (data $name:ident, $type_name:expr, $schema:path) => {
        pub struct $name;
        impl ResourceType for $name {
            fn name(&self) -> &'static str {
                $type_name
            }
            fn schema(&self) -> ResourceSchema {
                $schema()
            }
            fn is_data_source(&self) -> bool {
                true
            }
        }
    };
}

// Global Accelerator
define_resource_type!(AcceleratorType, "globalaccelerator.accelerator", globalaccelerator::accelerator_schema);
define_resource_type!(ListenerType, "globalaccelerator.listener", globalaccelerator::listener_schema);
define_resource_type!(EndpointGroupType, "globalaccelerator.endpoint_group", globalaccelerator::endpoint_group_schema);
define_resource_type!(data AcceleratorDataType, "globalaccelerator.accelerator", globalaccelerator::accelerator_data_source_schema);

// GuardDuty
define_resource_type!(DetectorType, "guardduty.detector", guardduty::detector_schema);
define_resource_type!(DetectorFeatureType, "guardduty.detector_feature", guardduty::detector_feature_schema);
define_resource_type!(FilterType, "guardduty.filter", guardduty::filter_schema);
define_resource_type!(IpSetType, "guardduty.ipset", guardduty::ipset_schema);
define_resource_type!(ThreatIntelSetType, "guardduty.threatintelset", guardduty::threatintelset_schema);
define_resource_type!(MemberType, "guardduty.member", guardduty::member_schema);
define_resource_type!(PublishingDestinationType, "guardduty.publishing_destination", guardduty::publishing_destination_schema);
define_resource_type!(OrganizationAdminAccountType, "guardduty.organization_admin_account", guardduty::organization_admin_account_schema);
define_resource_type!(data DetectorDataType, "guardduty.detector", guardduty::detector_data_source_schema);

// Lex Model Building
define_resource_type!(BotType, "lex.bot", lexmodels::bot_schema);
define_resource_type!(BotAliasType, "lex.bot_alias", lexmodels::bot_alias_schema);
define_resource_type!(IntentType, "lex.intent", lexmodels::intent_schema);
define_resource_type!(SlotTypeType, "lex.slot_type", lexmodels::slot_type_schema);
define_resource_type!(data BotDataType, "lex.bot", lexmodels::bot_data_source_schema);
define_resource_type!(data BotAliasDataType, "lex.bot_alias", lexmodels::bot_alias_data_source_schema);
define_resource_type!(data IntentDataType, "lex.intent", lexmodels::intent_data_source_schema);
define_resource_type!(data SlotTypeDataType, "lex.slot_type", lexmodels::slot_type_data_source_schema);

/// Returns all resource and data source types supported by this provider
pub fn resource_types() -> Vec<Box<dyn ResourceType>> {
    vec![
        Box::new(AcceleratorType),
        Box::new(ListenerType),
        Box::new(EndpointGroupType),
        Box::new(DetectorType),
        Box::new(DetectorFeatureType),
        Box::new(FilterType),
        Box::new(IpSetType),
        Box::new(ThreatIntelSetType),
        Box::new(MemberType),
        Box::new(PublishingDestinationType),
        Box::new(OrganizationAdminAccountType),
        Box::new(BotType),
        Box::new(BotAliasType),
        Box::new(IntentType),
        Box::new(SlotTypeType),
        Box::new(AcceleratorDataType),
        Box::new(DetectorDataType),
        Box::new(BotDataType),
        Box::new(BotAliasDataType),
        Box::new(IntentDataType),
        Box::new(SlotTypeDataType),
    ]
}

/// Find the type for a resource, or for a data source when `data` is set
pub fn find_resource_type(name: &str, data: bool) -> Option<Box<dyn ResourceType>> {
    resource_types()
        .into_iter()
        .find(|t| t.name() == name && t.is_data_source() == data)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_type_has_a_matching_schema() {
        for t in resource_types() {
            assert_eq!(t.schema().resource_type, t.name());
        }
    }

    #[test]
    fn data_sources_share_names_with_resources() {
        let detector = find_resource_type("guardduty.detector", false).unwrap();
        assert!(detector.schema().attributes.contains_key("datasources"));

        let lookup = find_resource_type("guardduty.detector", true).unwrap();
        assert!(lookup.schema().attributes.contains_key("features"));

        assert!(find_resource_type("guardduty.member", true).is_none());
        assert!(find_resource_type("s3.bucket", false).is_none());
    }
}
