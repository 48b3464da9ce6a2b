//! GuardDuty resources
//!
//! Everything hangs off a regional detector. Child resources carry the
//! detector ID in their own composite ID.

mod detector;
mod detector_feature;
mod filter;
mod member;
mod organization_admin_account;
mod publishing_destination;
mod threat_list;

use std::collections::HashMap;
use std::time::Duration;

use aws_sdk_guardduty::Client;
use tfaws_core::arn::Arn;
use tfaws_core::id::{IdError, create_resource_id, parse_resource_id};
use tfaws_core::provider::{ProviderError, ProviderResult};
use tfaws_core::tags::KeyValueTags;

use crate::conns::AwsConns;
use crate::errors::sdk_error;

pub(crate) use filter::normalize_finding_criteria;
pub(crate) use threat_list::ThreatList;

const SERVICE: &str = "guardduty";

pub(crate) const ID_SEPARATOR: &str = ":";
pub(crate) const FEATURE_ID_SEPARATOR: &str = ",";

pub(crate) const WAIT_TIMEOUT: Duration = Duration::from_secs(5 * 60);

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("GuardDuty filter ID must be of the form <Detector ID>:<Filter Name>, was provided: {0}")]
pub struct FilterIdError(String);

impl From<FilterIdError> for ProviderError {
    fn from(err: FilterIdError) -> Self {
        ProviderError::new(err.to_string())
    }
}

/// `(detector ID, child ID)` of a `detectorID:childID` identifier
fn decode_child_id(id: &str) -> Result<(String, String), IdError> {
    let parts = parse_resource_id(id, ID_SEPARATOR, 2)?;
    Ok((parts[0].to_string(), parts[1].to_string()))
}

/// `(IP set ID, detector ID)`
pub fn decode_ipset_id(id: &str) -> Result<(String, String), IdError> {
    decode_child_id(id).map(|(detector, set)| (set, detector))
}

/// `(threat intel set ID, detector ID)`
pub fn decode_threat_intel_set_id(id: &str) -> Result<(String, String), IdError> {
    decode_child_id(id).map(|(detector, set)| (set, detector))
}

/// `(detector ID, account ID)`
pub fn decode_member_id(id: &str) -> Result<(String, String), IdError> {
    decode_child_id(id)
}

/// `(detector ID, destination ID)`
pub fn decode_publishing_destination_id(id: &str) -> Result<(String, String), IdError> {
    decode_child_id(id)
}

/// `(detector ID, feature name)`
pub fn decode_detector_feature_id(id: &str) -> Result<(String, String), IdError> {
    let parts = parse_resource_id(id, FEATURE_ID_SEPARATOR, 2)?;
    Ok((parts[0].to_string(), parts[1].to_string()))
}

pub fn filter_create_id(detector_id: &str, filter_name: &str) -> String {
    create_resource_id(&[detector_id, filter_name], ID_SEPARATOR)
}

/// `(detector ID, filter name)`
pub fn filter_parse_id(id: &str) -> Result<(String, String), FilterIdError> {
    match id.split(ID_SEPARATOR).collect::<Vec<_>>().as_slice() {
        [detector, name] if !detector.is_empty() && !name.is_empty() => {
            Ok((detector.to_string(), name.to_string()))
        }
        _ => Err(FilterIdError(id.to_string())),
    }
}

/// ARN of a detector, or of a resource below it when `child` is given
pub(crate) fn detector_arn(conns: &AwsConns, detector_id: &str, child: Option<(&str, &str)>) -> String {
    let mut resource = format!("detector/{}", detector_id);
    if let Some((kind, name)) = child {
        resource.push_str(&format!("/{}/{}", kind, name));
    }
    Arn {
        partition: conns.partition.clone(),
        service: SERVICE.to_string(),
        region: conns.region.clone(),
        account_id: conns.account_id.clone(),
        resource,
    }
    .to_string()
}

pub(crate) fn tags_from_sdk(tags: Option<&HashMap<String, String>>) -> KeyValueTags {
    tags.into_iter().flatten().map(|(k, v)| (k.as_str(), v.as_str())).collect()
}

pub(crate) async fn update_tags(
    client: &Client,
    arn: &str,
    old: &KeyValueTags,
    new: &KeyValueTags,
) -> ProviderResult<()> {
    let removed = old.removed(new);
    if !removed.is_empty() {
        client
            .untag_resource()
            .resource_arn(arn)
            .set_tag_keys(Some(removed))
            .send()
            .await
            .map_err(|e| sdk_error(format!("untagging GuardDuty resource ({})", arn), e))?;
    }

    let updated = old.updated(new);
    if !updated.is_empty() {
        client
            .tag_resource()
            .resource_arn(arn)
            .set_tags(Some(updated.to_hash_map()))
            .send()
            .await
            .map_err(|e| sdk_error(format!("tagging GuardDuty resource ({})", arn), e))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ipset_id_is_detector_then_set() {
        let (set, detector) = decode_ipset_id("d-123:s-456").unwrap();
        assert_eq!(set, "s-456");
        assert_eq!(detector, "d-123");

        assert!(decode_ipset_id("d-123").is_err());
        assert!(decode_threat_intel_set_id("d-123:").is_err());
        assert!(decode_threat_intel_set_id("a:b:c").is_err());
    }

    #[test]
    fn filter_ids() {
        let id = filter_create_id("d-123", "my-filter");
        assert_eq!(id, "d-123:my-filter");
        assert_eq!(
            filter_parse_id(&id).unwrap(),
            ("d-123".to_string(), "my-filter".to_string())
        );

        let err = filter_parse_id("d-123").unwrap_err();
        assert_eq!(
            err.to_string(),
            "GuardDuty filter ID must be of the form <Detector ID>:<Filter Name>, was provided: d-123"
        );
        assert!(filter_parse_id("d-123:a:b").is_err());
    }

    #[test]
    fn feature_ids_use_a_comma() {
        assert_eq!(
            decode_detector_feature_id("d-1,EKS_RUNTIME_MONITORING").unwrap(),
            ("d-1".to_string(), "EKS_RUNTIME_MONITORING".to_string())
        );
        assert!(decode_detector_feature_id("d-1:EKS_RUNTIME_MONITORING").is_err());
    }

    #[test]
    fn sdk_tags_convert() {
        let mut tags = HashMap::new();
        tags.insert("Name".to_string(), "main".to_string());
        let converted = tags_from_sdk(Some(&tags));
        assert_eq!(converted.get("Name"), Some("main"));
        assert!(tags_from_sdk(None).is_empty());
    }
}
