//! AWS resource schema definitions

pub mod globalaccelerator;
pub mod guardduty;
pub mod lexmodels;
pub mod types;

use tfaws_core::schema::ResourceSchema;

/// Derive a data source schema from a resource schema
///
/// Every attribute becomes computed. The names in `inputs` stay settable as
/// optional lookup keys.
pub fn data_source_schema(
    resource_type: &str,
    base: ResourceSchema,
    inputs: &[&str],
) -> ResourceSchema {
    let mut schema = ResourceSchema::new(resource_type);
    schema.description = base.description;
    for (name, mut attr) in base.attributes {
        attr.required = false;
        attr.force_new = false;
        attr.default = None;
        attr.computed = true;
        attr.optional_computed = inputs.contains(&name.as_str());
        schema = schema.attribute(attr);
    }
    schema
}

/// Returns all resource schemas
pub fn all_schemas() -> Vec<ResourceSchema> {
    let mut schemas = Vec::new();
    schemas.extend(globalaccelerator::schemas());
    schemas.extend(guardduty::schemas());
    schemas.extend(lexmodels::schemas());
    schemas
}

/// Returns all data source schemas
pub fn data_source_schemas() -> Vec<ResourceSchema> {
    vec![
        globalaccelerator::accelerator_data_source_schema(),
        guardduty::detector_data_source_schema(),
        lexmodels::bot_data_source_schema(),
        lexmodels::bot_alias_data_source_schema(),
        lexmodels::intent_data_source_schema(),
        lexmodels::slot_type_data_source_schema(),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn resource_types_are_unique() {
        let schemas = all_schemas();
        let names: HashSet<&str> = schemas.iter().map(|s| s.resource_type.as_str()).collect();
        assert_eq!(names.len(), schemas.len());
        assert_eq!(schemas.len(), 15);
    }

    #[test]
    fn data_source_inputs_stay_settable() {
        let schema = data_source_schema(
            "guardduty.detector",
            guardduty::detector_schema(),
            &["finding_publishing_frequency"],
        );
        let input = &schema.attributes["finding_publishing_frequency"];
        assert!(input.computed && input.optional_computed);
        let output = &schema.attributes["enable"];
        assert!(output.computed && !output.optional_computed);
        assert!(output.default.is_none());
    }
}
