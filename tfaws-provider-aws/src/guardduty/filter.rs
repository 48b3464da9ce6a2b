use std::collections::HashMap;

use aws_sdk_guardduty::types::{Condition, FilterAction, FindingCriteria};
use chrono::{DateTime, SecondsFormat, Utc};
use tfaws_core::provider::{ProviderError, ProviderResult};
use tfaws_core::resource::{Resource, ResourceId, State, Value};
use tfaws_core::tags::KeyValueTags;

use super::{detector_arn, filter_create_id, filter_parse_id, tags_from_sdk, update_tags};
use crate::AwsProvider;
use crate::errors::{is_not_found, is_not_found_error, sdk_error};
use crate::flex::{
    Attributes, block, blocks, get_block, get_blocks, get_i32, get_str, get_string, get_string_list,
    idempotency_token, insert_opt, require_str, string_list,
};

/// Comparisons on this field take RFC 3339 timestamps
const UPDATED_AT: &str = "updatedAt";

const COMPARISONS: [&str; 4] = [
    "greater_than",
    "greater_than_or_equal",
    "less_than",
    "less_than_or_equal",
];

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CriterionError {
    #[error("parsing {comparison} value for {field}: {value} is not an integer")]
    NotAnInteger {
        field: String,
        comparison: String,
        value: String,
    },

    #[error("parsing {comparison} value for {field}: {value} is neither an RFC 3339 timestamp nor an integer")]
    NotATimestamp {
        field: String,
        comparison: String,
        value: String,
    },
}

impl From<CriterionError> for ProviderError {
    fn from(err: CriterionError) -> Self {
        ProviderError::new(err.to_string())
    }
}

/// Parse a comparison value. `updatedAt` also accepts RFC 3339, converted
/// to epoch milliseconds.
fn parse_comparison(field: &str, comparison: &str, value: &str) -> Result<i64, CriterionError> {
    if field == UPDATED_AT {
        if let Ok(t) = DateTime::parse_from_rfc3339(value) {
            return Ok(t.timestamp_millis());
        }
        return value.parse().map_err(|_| CriterionError::NotATimestamp {
            field: field.to_string(),
            comparison: comparison.to_string(),
            value: value.to_string(),
        });
    }
    value.parse().map_err(|_| CriterionError::NotAnInteger {
        field: field.to_string(),
        comparison: comparison.to_string(),
        value: value.to_string(),
    })
}

fn format_comparison(field: &str, value: i64) -> String {
    if field == UPDATED_AT
        && let Some(t) = DateTime::<Utc>::from_timestamp_millis(value)
    {
        return t.to_rfc3339_opts(SecondsFormat::Secs, true);
    }
    value.to_string()
}

/// Rewrite desired `updatedAt` comparisons into the RFC 3339 form reads
/// return, so epoch milliseconds and other offsets compare as equal
pub(crate) fn normalize_finding_criteria(attrs: &mut Attributes) {
    let Some(Value::List(criteria)) = attrs.get_mut("finding_criteria") else {
        return;
    };
    for criteria in criteria.iter_mut() {
        let Value::Map(criteria) = criteria else {
            continue;
        };
        let Some(Value::List(items)) = criteria.get_mut("criterion") else {
            continue;
        };
        for item in items.iter_mut() {
            let Value::Map(item) = item else {
                continue;
            };
            if item.get("field").and_then(Value::as_str) != Some(UPDATED_AT) {
                continue;
            }
            for comparison in COMPARISONS {
                if let Some(Value::String(value)) = item.get_mut(comparison)
                    && let Ok(millis) = parse_comparison(UPDATED_AT, comparison, value.as_str())
                {
                    *value = format_comparison(UPDATED_AT, millis);
                }
            }
        }
    }
}

pub(crate) fn expand_finding_criteria(criteria: &Attributes) -> Result<FindingCriteria, CriterionError> {
    let mut conditions = HashMap::new();
    for criterion in get_blocks(criteria, "criterion") {
        let Some(field) = get_str(criterion, "field") else {
            continue;
        };
        let mut values = [None; 4];
        for (slot, comparison) in values.iter_mut().zip(COMPARISONS) {
            if let Some(v) = get_str(criterion, comparison).filter(|v| !v.is_empty()) {
                *slot = Some(parse_comparison(field, comparison, v)?);
            }
        }
        let equals = get_string_list(criterion, "equals");
        let not_equals = get_string_list(criterion, "not_equals");

        let condition = Condition::builder()
            .set_equals((!equals.is_empty()).then_some(equals))
            .set_not_equals((!not_equals.is_empty()).then_some(not_equals))
            .set_greater_than(values[0])
            .set_greater_than_or_equal(values[1])
            .set_less_than(values[2])
            .set_less_than_or_equal(values[3])
            .build();
        conditions.insert(field.to_string(), condition);
    }
    Ok(FindingCriteria::builder().set_criterion(Some(conditions)).build())
}

/// Criteria ordered by field name
pub(crate) fn flatten_finding_criteria(criteria: &FindingCriteria) -> Value {
    let mut fields: Vec<(&String, &Condition)> = criteria.criterion().into_iter().flatten().collect();
    fields.sort_by(|a, b| a.0.cmp(b.0));

    let criterion = blocks(fields.into_iter().map(|(field, condition)| {
        let mut item = Attributes::new();
        item.insert("field".to_string(), Value::from(field.as_str()));
        if !condition.equals().is_empty() {
            item.insert("equals".to_string(), string_list(condition.equals().iter().cloned()));
        }
        if !condition.not_equals().is_empty() {
            item.insert(
                "not_equals".to_string(),
                string_list(condition.not_equals().iter().cloned()),
            );
        }
        let values = [
            condition.greater_than(),
            condition.greater_than_or_equal(),
            condition.less_than(),
            condition.less_than_or_equal(),
        ];
        for (comparison, value) in COMPARISONS.iter().zip(values) {
            insert_opt(&mut item, comparison, value.map(|v| format_comparison(field, v)));
        }
        item
    }));

    let mut attrs = Attributes::new();
    attrs.insert("criterion".to_string(), criterion);
    block(attrs)
}

impl AwsProvider {
    pub(crate) async fn read_guardduty_filter(
        &self,
        id: &ResourceId,
        identifier: &str,
    ) -> ProviderResult<State> {
        let (detector_id, name) =
            filter_parse_id(identifier).map_err(|e| ProviderError::from(e).for_resource(id.clone()))?;

        let result = self
            .conns
            .guardduty
            .get_filter()
            .detector_id(&detector_id)
            .filter_name(&name)
            .send()
            .await;
        let output = match result {
            Ok(output) => output,
            Err(e) if is_not_found(&e) => {
                log::warn!("GuardDuty Filter ({}) not found", identifier);
                return Ok(State::not_found(id.clone()));
            }
            Err(e) => {
                return Err(sdk_error(format!("reading GuardDuty Filter ({})", identifier), e)
                    .for_resource(id.clone()));
            }
        };

        let mut attrs = Attributes::new();
        attrs.insert("detector_id".to_string(), Value::from(detector_id.as_str()));
        insert_opt(&mut attrs, "name", output.name());
        insert_opt(&mut attrs, "description", output.description().filter(|d| !d.is_empty()));
        insert_opt(&mut attrs, "action", output.action().map(|a| a.as_str()));
        insert_opt(&mut attrs, "rank", output.rank());
        if let Some(criteria) = output.finding_criteria() {
            attrs.insert("finding_criteria".to_string(), flatten_finding_criteria(criteria));
        }
        attrs.insert(
            "arn".to_string(),
            Value::from(detector_arn(&self.conns, &detector_id, Some(("filter", &name)))),
        );
        self.conns
            .set_tag_attributes(&mut attrs, tags_from_sdk(output.tags()));
        Ok(State::existing(id.clone(), attrs).with_identifier(identifier))
    }

    pub(crate) async fn create_guardduty_filter(&self, resource: Resource) -> ProviderResult<State> {
        let id = resource.id.clone();
        let attrs = &resource.attributes;
        let detector_id = require_str(attrs, "detector_id", &id)?;
        let name = require_str(attrs, "name", &id)?;
        let criteria = get_block(attrs, "finding_criteria").ok_or_else(|| {
            ProviderError::new("Attribute 'finding_criteria' is required").for_resource(id.clone())
        })?;
        let criteria =
            expand_finding_criteria(criteria).map_err(|e| ProviderError::from(e).for_resource(id.clone()))?;
        let tags = self.conns.desired_tags(attrs);

        self.conns
            .guardduty
            .create_filter()
            .detector_id(detector_id)
            .name(name)
            .set_description(get_string(attrs, "description"))
            .set_action(get_str(attrs, "action").map(FilterAction::from))
            .set_rank(get_i32(attrs, "rank"))
            .finding_criteria(criteria)
            .client_token(idempotency_token())
            .set_tags((!tags.is_empty()).then(|| tags.to_hash_map()))
            .send()
            .await
            .map_err(|e| {
                sdk_error(format!("creating GuardDuty Filter ({})", name), e).for_resource(id.clone())
            })?;

        let identifier = filter_create_id(detector_id, name);
        log::info!("Created GuardDuty Filter {}", identifier);
        self.read_guardduty_filter(&id, &identifier).await
    }

    pub(crate) async fn update_guardduty_filter(
        &self,
        id: ResourceId,
        identifier: &str,
        from: State,
        to: Resource,
    ) -> ProviderResult<State> {
        let attrs = &to.attributes;
        let client = &self.conns.guardduty;
        let (detector_id, name) =
            filter_parse_id(identifier).map_err(|e| ProviderError::from(e).for_resource(id.clone()))?;
        let criteria = get_block(attrs, "finding_criteria")
            .map(expand_finding_criteria)
            .transpose()
            .map_err(|e| ProviderError::from(e).for_resource(id.clone()))?;

        client
            .update_filter()
            .detector_id(&detector_id)
            .filter_name(&name)
            .set_description(get_string(attrs, "description"))
            .set_action(get_str(attrs, "action").map(FilterAction::from))
            .set_rank(get_i32(attrs, "rank"))
            .set_finding_criteria(criteria)
            .send()
            .await
            .map_err(|e| {
                sdk_error(format!("updating GuardDuty Filter ({})", identifier), e)
                    .for_resource(id.clone())
            })?;

        let arn = detector_arn(&self.conns, &detector_id, Some(("filter", &name)));
        let old_tags = KeyValueTags::from_value(from.attributes.get("tags_all"));
        update_tags(client, &arn, &old_tags, &self.conns.desired_tags(attrs))
            .await
            .map_err(|e| e.for_resource(id.clone()))?;

        self.read_guardduty_filter(&id, identifier).await
    }

    pub(crate) async fn delete_guardduty_filter(
        &self,
        id: ResourceId,
        identifier: &str,
    ) -> ProviderResult<()> {
        let (detector_id, name) =
            filter_parse_id(identifier).map_err(|e| ProviderError::from(e).for_resource(id.clone()))?;
        log::info!("Deleting GuardDuty Filter {}", identifier);

        match self
            .conns
            .guardduty
            .delete_filter()
            .detector_id(detector_id)
            .filter_name(name)
            .send()
            .await
        {
            Ok(_) => Ok(()),
            Err(e) => {
                let err = sdk_error(format!("deleting GuardDuty Filter ({})", identifier), e);
                if is_not_found_error(&err) {
                    Ok(())
                } else {
                    Err(err.for_resource(id))
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schemas::guardduty::filter_schema;

    fn criterion(pairs: &[(&str, Value)]) -> Attributes {
        pairs.iter().map(|(k, v)| (k.to_string(), v.clone())).collect()
    }

    fn criteria(items: Vec<Attributes>) -> Attributes {
        let mut attrs = Attributes::new();
        attrs.insert("criterion".to_string(), blocks(items));
        attrs
    }

    #[test]
    fn expand_equality_and_numeric_criteria() {
        let expanded = expand_finding_criteria(&criteria(vec![
            criterion(&[
                ("field", Value::from("region")),
                ("equals", string_list(["eu-west-1"])),
            ]),
            criterion(&[
                ("field", Value::from("severity")),
                ("greater_than_or_equal", Value::from("4")),
            ]),
        ]))
        .unwrap();

        let conditions = expanded.criterion().unwrap();
        assert_eq!(conditions["region"].equals(), ["eu-west-1".to_string()]);
        assert_eq!(conditions["severity"].greater_than_or_equal(), Some(4));
        assert_eq!(conditions["severity"].greater_than(), None);
    }

    #[test]
    fn updated_at_takes_timestamps() {
        let expanded = expand_finding_criteria(&criteria(vec![criterion(&[
            ("field", Value::from("updatedAt")),
            ("greater_than", Value::from("2020-01-01T00:00:00Z")),
            ("less_than", Value::from("1609459200000")),
        ])]))
        .unwrap();
        let condition = &expanded.criterion().unwrap()["updatedAt"];
        assert_eq!(condition.greater_than(), Some(1_577_836_800_000));
        assert_eq!(condition.less_than(), Some(1_609_459_200_000));

        let flattened = flatten_finding_criteria(&expanded);
        let item = flattened.as_list().unwrap()[0].as_map().unwrap()["criterion"]
            .as_list()
            .unwrap()[0]
            .as_map()
            .unwrap()
            .clone();
        assert_eq!(item.get("greater_than"), Some(&Value::from("2020-01-01T00:00:00Z")));
        assert_eq!(item.get("less_than"), Some(&Value::from("2021-01-01T00:00:00Z")));
    }

    #[test]
    fn epoch_millis_updated_at_matches_what_reads_return() {
        let wanted = criteria(vec![criterion(&[
            ("field", Value::from("updatedAt")),
            ("greater_than", Value::from("1577836800000")),
            ("less_than", Value::from("2021-01-01T09:00:00+09:00")),
        ])]);
        let current_criteria = flatten_finding_criteria(&expand_finding_criteria(&wanted).unwrap());

        let mut current = Attributes::new();
        current.insert("finding_criteria".to_string(), current_criteria);
        let mut desired = Attributes::new();
        desired.insert("finding_criteria".to_string(), block(wanted));

        let schema = filter_schema();
        assert!(schema.changed_attributes(&current, &desired).is_empty());

        normalize_finding_criteria(&mut desired);
        let item = desired["finding_criteria"].as_list().unwrap()[0].as_map().unwrap()["criterion"]
            .as_list()
            .unwrap()[0]
            .as_map()
            .unwrap()
            .clone();
        assert_eq!(item.get("greater_than"), Some(&Value::from("2020-01-01T00:00:00Z")));
        assert_eq!(item.get("less_than"), Some(&Value::from("2021-01-01T00:00:00Z")));
    }

    #[test]
    fn invalid_comparisons_are_errors() {
        let err = expand_finding_criteria(&criteria(vec![criterion(&[
            ("field", Value::from("severity")),
            ("less_than", Value::from("high")),
        ])]))
        .unwrap_err();
        assert_eq!(
            err,
            CriterionError::NotAnInteger {
                field: "severity".to_string(),
                comparison: "less_than".to_string(),
                value: "high".to_string(),
            }
        );

        assert!(matches!(
            parse_comparison("updatedAt", "greater_than", "yesterday"),
            Err(CriterionError::NotATimestamp { .. })
        ));
    }

    #[test]
    fn flatten_orders_by_field() {
        let mut conditions = HashMap::new();
        conditions.insert(
            "type".to_string(),
            Condition::builder().not_equals("Recon:EC2/PortProbeUnprotectedPort").build(),
        );
        conditions.insert(
            "severity".to_string(),
            Condition::builder().less_than(7).build(),
        );
        let criteria = FindingCriteria::builder().set_criterion(Some(conditions)).build();

        let flattened = flatten_finding_criteria(&criteria);
        let items = flattened.as_list().unwrap()[0].as_map().unwrap()["criterion"]
            .as_list()
            .unwrap()
            .to_vec();
        let fields: Vec<_> = items
            .iter()
            .map(|i| i.as_map().unwrap()["field"].as_str().unwrap().to_string())
            .collect();
        assert_eq!(fields, vec!["severity", "type"]);
        assert_eq!(items[0].as_map().unwrap().get("less_than"), Some(&Value::from("7")));
    }
}
