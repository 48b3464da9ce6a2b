//! IP sets and threat intel sets
//!
//! Both are S3-hosted lists attached to a detector with identical lifecycles,
//! differing only in the API operations used.

use std::collections::HashMap;

use aws_sdk_guardduty::Client;
use aws_sdk_guardduty::types::{IpSetFormat, ThreatIntelSetFormat};
use tfaws_core::id::create_resource_id;
use tfaws_core::provider::{ProviderError, ProviderResult};
use tfaws_core::resource::{Resource, ResourceId, State, Value};
use tfaws_core::tags::KeyValueTags;
use tfaws_core::waiter::{Refreshed, StateChangeConf};

use super::{
    ID_SEPARATOR, WAIT_TIMEOUT, decode_ipset_id, decode_threat_intel_set_id, detector_arn,
    tags_from_sdk, update_tags,
};
use crate::AwsProvider;
use crate::errors::{is_not_found, is_not_found_error, sdk_error};
use crate::flex::{Attributes, get_bool, idempotency_token, require_str};

const STATUS_ACTIVE: &str = "ACTIVE";
const STATUS_ACTIVATING: &str = "ACTIVATING";
const STATUS_INACTIVE: &str = "INACTIVE";
const STATUS_DEACTIVATING: &str = "DEACTIVATING";
const STATUS_DELETE_PENDING: &str = "DELETE_PENDING";
const STATUS_DELETED: &str = "DELETED";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ThreatList {
    IpSet,
    ThreatIntelSet,
}

/// What a Get call reports about a list
#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct ThreatListInfo {
    pub name: Option<String>,
    pub format: Option<String>,
    pub location: Option<String>,
    pub status: String,
    pub tags: HashMap<String, String>,
}

impl ThreatList {
    fn label(self) -> &'static str {
        match self {
            ThreatList::IpSet => "GuardDuty IPSet",
            ThreatList::ThreatIntelSet => "GuardDuty ThreatIntelSet",
        }
    }

    /// Resource kind in the ARN
    fn arn_kind(self) -> &'static str {
        match self {
            ThreatList::IpSet => "ipset",
            ThreatList::ThreatIntelSet => "threatintelset",
        }
    }

    /// `detectorID:setID`, the inverse of `decode_id`
    pub(crate) fn encode_id(detector_id: &str, set_id: &str) -> String {
        create_resource_id(&[detector_id, set_id], ID_SEPARATOR)
    }

    /// `(detector ID, set ID)`
    pub(crate) fn decode_id(self, id: &str) -> ProviderResult<(String, String)> {
        let (set_id, detector_id) = match self {
            ThreatList::IpSet => decode_ipset_id(id)?,
            ThreatList::ThreatIntelSet => decode_threat_intel_set_id(id)?,
        };
        Ok((detector_id, set_id))
    }

    async fn get(
        self,
        client: &Client,
        detector_id: &str,
        set_id: &str,
    ) -> ProviderResult<Option<ThreatListInfo>> {
        let context = || format!("reading {} ({})", self.label(), set_id);
        let info = match self {
            ThreatList::IpSet => {
                match client
                    .get_ip_set()
                    .detector_id(detector_id)
                    .ip_set_id(set_id)
                    .send()
                    .await
                {
                    Ok(out) => ThreatListInfo {
                        name: out.name().map(str::to_string),
                        format: out.format().map(|f| f.as_str().to_string()),
                        location: out.location().map(str::to_string),
                        status: out.status().map(|s| s.as_str().to_string()).unwrap_or_default(),
                        tags: out.tags().cloned().unwrap_or_default(),
                    },
                    Err(e) if is_not_found(&e) => return Ok(None),
                    Err(e) => return Err(sdk_error(context(), e)),
                }
            }
            ThreatList::ThreatIntelSet => {
                match client
                    .get_threat_intel_set()
                    .detector_id(detector_id)
                    .threat_intel_set_id(set_id)
                    .send()
                    .await
                {
                    Ok(out) => ThreatListInfo {
                        name: out.name().map(str::to_string),
                        format: out.format().map(|f| f.as_str().to_string()),
                        location: out.location().map(str::to_string),
                        status: out.status().map(|s| s.as_str().to_string()).unwrap_or_default(),
                        tags: out.tags().cloned().unwrap_or_default(),
                    },
                    Err(e) if is_not_found(&e) => return Ok(None),
                    Err(e) => return Err(sdk_error(context(), e)),
                }
            }
        };
        Ok(Some(info))
    }

    /// Status for waiters. A deleted list counts as gone.
    async fn status(
        self,
        client: &Client,
        detector_id: &str,
        set_id: &str,
    ) -> ProviderResult<Refreshed<ThreatListInfo>> {
        Ok(self
            .get(client, detector_id, set_id)
            .await?
            .filter(|info| info.status != STATUS_DELETED)
            .map(|info| {
                let status = info.status.clone();
                (info, status)
            }))
    }

    async fn wait_settled(self, client: &Client, detector_id: &str, set_id: &str) -> ProviderResult<()> {
        StateChangeConf::new(
            &[STATUS_ACTIVATING, STATUS_DEACTIVATING],
            &[STATUS_ACTIVE, STATUS_INACTIVE],
            WAIT_TIMEOUT,
        )
        .wait_for_state(|| self.status(client, detector_id, set_id))
        .await
        .map_err(|e| {
            ProviderError::from(e).context(format!("waiting for {} ({}) to settle", self.label(), set_id))
        })?;
        Ok(())
    }

    async fn wait_deleted(self, client: &Client, detector_id: &str, set_id: &str) -> ProviderResult<()> {
        let gone: [&str; 0] = [];
        StateChangeConf::new(
            &[
                STATUS_ACTIVE,
                STATUS_ACTIVATING,
                STATUS_INACTIVE,
                STATUS_DEACTIVATING,
                STATUS_DELETE_PENDING,
            ],
            &gone,
            WAIT_TIMEOUT,
        )
        .wait_for_state(|| self.status(client, detector_id, set_id))
        .await
        .map_err(|e| {
            ProviderError::from(e).context(format!("waiting for {} ({}) delete", self.label(), set_id))
        })?;
        Ok(())
    }
}

pub(crate) fn flatten_threat_list(info: &ThreatListInfo) -> Attributes {
    let mut attrs = Attributes::new();
    for (key, value) in [
        ("name", &info.name),
        ("format", &info.format),
        ("location", &info.location),
    ] {
        if let Some(v) = value {
            attrs.insert(key.to_string(), Value::from(v.as_str()));
        }
    }
    attrs.insert(
        "activate".to_string(),
        Value::Bool(info.status == STATUS_ACTIVE),
    );
    attrs
}

impl AwsProvider {
    pub(crate) async fn read_guardduty_threat_list(
        &self,
        kind: ThreatList,
        id: &ResourceId,
        identifier: &str,
    ) -> ProviderResult<State> {
        let (detector_id, set_id) = kind
            .decode_id(identifier)
            .map_err(|e| e.for_resource(id.clone()))?;
        let info = kind
            .get(&self.conns.guardduty, &detector_id, &set_id)
            .await
            .map_err(|e| e.for_resource(id.clone()))?;
        let Some(info) = info.filter(|i| i.status != STATUS_DELETED) else {
            log::warn!("{} ({}) not found", kind.label(), identifier);
            return Ok(State::not_found(id.clone()));
        };

        let mut attrs = flatten_threat_list(&info);
        attrs.insert("detector_id".to_string(), Value::from(detector_id.as_str()));
        attrs.insert(
            "arn".to_string(),
            Value::from(detector_arn(
                &self.conns,
                &detector_id,
                Some((kind.arn_kind(), &set_id)),
            )),
        );
        self.conns
            .set_tag_attributes(&mut attrs, tags_from_sdk(Some(&info.tags)));
        Ok(State::existing(id.clone(), attrs).with_identifier(identifier))
    }

    pub(crate) async fn create_guardduty_threat_list(
        &self,
        kind: ThreatList,
        resource: Resource,
    ) -> ProviderResult<State> {
        let id = resource.id.clone();
        let attrs = &resource.attributes;
        let client = &self.conns.guardduty;
        let detector_id = require_str(attrs, "detector_id", &id)?;
        let name = require_str(attrs, "name", &id)?;
        let format = require_str(attrs, "format", &id)?;
        let location = require_str(attrs, "location", &id)?;
        let activate = get_bool(attrs, "activate").unwrap_or(false);
        let tags = self.conns.desired_tags(attrs);
        let tags = (!tags.is_empty()).then(|| tags.to_hash_map());
        let context = || format!("creating {} ({})", kind.label(), name);

        let set_id = match kind {
            ThreatList::IpSet => client
                .create_ip_set()
                .detector_id(detector_id)
                .name(name)
                .format(IpSetFormat::from(format))
                .location(location)
                .activate(activate)
                .client_token(idempotency_token())
                .set_tags(tags)
                .send()
                .await
                .map_err(|e| sdk_error(context(), e).for_resource(id.clone()))?
                .ip_set_id()
                .map(str::to_string),
            ThreatList::ThreatIntelSet => client
                .create_threat_intel_set()
                .detector_id(detector_id)
                .name(name)
                .format(ThreatIntelSetFormat::from(format))
                .location(location)
                .activate(activate)
                .client_token(idempotency_token())
                .set_tags(tags)
                .send()
                .await
                .map_err(|e| sdk_error(context(), e).for_resource(id.clone()))?
                .threat_intel_set_id()
                .map(str::to_string),
        };
        let set_id = set_id.ok_or_else(|| {
            ProviderError::new(format!("{} create returned no ID", kind.label())).for_resource(id.clone())
        })?;
        log::info!("Created {} {}", kind.label(), set_id);

        kind.wait_settled(client, detector_id, &set_id)
            .await
            .map_err(|e| e.for_resource(id.clone()))?;

        let identifier = ThreatList::encode_id(detector_id, &set_id);
        self.read_guardduty_threat_list(kind, &id, &identifier).await
    }

    pub(crate) async fn update_guardduty_threat_list(
        &self,
        kind: ThreatList,
        id: ResourceId,
        identifier: &str,
        from: State,
        to: Resource,
    ) -> ProviderResult<State> {
        let attrs = &to.attributes;
        let client = &self.conns.guardduty;
        let (detector_id, set_id) = kind
            .decode_id(identifier)
            .map_err(|e| e.for_resource(id.clone()))?;
        let name = require_str(attrs, "name", &id)?;
        let location = require_str(attrs, "location", &id)?;
        let activate = get_bool(attrs, "activate").unwrap_or(false);
        let context = || format!("updating {} ({})", kind.label(), identifier);

        match kind {
            ThreatList::IpSet => {
                client
                    .update_ip_set()
                    .detector_id(&detector_id)
                    .ip_set_id(&set_id)
                    .name(name)
                    .location(location)
                    .activate(activate)
                    .send()
                    .await
                    .map_err(|e| sdk_error(context(), e).for_resource(id.clone()))?;
            }
            ThreatList::ThreatIntelSet => {
                client
                    .update_threat_intel_set()
                    .detector_id(&detector_id)
                    .threat_intel_set_id(&set_id)
                    .name(name)
                    .location(location)
                    .activate(activate)
                    .send()
                    .await
                    .map_err(|e| sdk_error(context(), e).for_resource(id.clone()))?;
            }
        }

        kind.wait_settled(client, &detector_id, &set_id)
            .await
            .map_err(|e| e.for_resource(id.clone()))?;

        let arn = detector_arn(&self.conns, &detector_id, Some((kind.arn_kind(), &set_id)));
        let old_tags = KeyValueTags::from_value(from.attributes.get("tags_all"));
        update_tags(client, &arn, &old_tags, &self.conns.desired_tags(attrs))
            .await
            .map_err(|e| e.for_resource(id.clone()))?;

        self.read_guardduty_threat_list(kind, &id, identifier).await
    }

    pub(crate) async fn delete_guardduty_threat_list(
        &self,
        kind: ThreatList,
        id: ResourceId,
        identifier: &str,
    ) -> ProviderResult<()> {
        let client = &self.conns.guardduty;
        let (detector_id, set_id) = kind
            .decode_id(identifier)
            .map_err(|e| e.for_resource(id.clone()))?;
        let context = || format!("deleting {} ({})", kind.label(), identifier);
        log::info!("Deleting {} {}", kind.label(), identifier);

        let result = match kind {
            ThreatList::IpSet => client
                .delete_ip_set()
                .detector_id(&detector_id)
                .ip_set_id(&set_id)
                .send()
                .await
                .map(|_| ())
                .map_err(|e| sdk_error(context(), e)),
            ThreatList::ThreatIntelSet => client
                .delete_threat_intel_set()
                .detector_id(&detector_id)
                .threat_intel_set_id(&set_id)
                .send()
                .await
                .map(|_| ())
                .map_err(|e| sdk_error(context(), e)),
        };
        match result {
            Ok(()) => {}
            Err(e) if is_not_found_error(&e) => return Ok(()),
            Err(e) => return Err(e.for_resource(id)),
        }

        kind.wait_deleted(client, &detector_id, &set_id)
            .await
            .map_err(|e| e.for_resource(id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_ids_for_both_kinds() {
        assert_eq!(
            ThreatList::IpSet.decode_id("d-1:s-2").unwrap(),
            ("d-1".to_string(), "s-2".to_string())
        );
        assert_eq!(
            ThreatList::ThreatIntelSet.decode_id("d-1:t-2").unwrap(),
            ("d-1".to_string(), "t-2".to_string())
        );
        assert!(ThreatList::IpSet.decode_id("d-1").is_err());
    }

    #[test]
    fn created_ids_decode_to_their_parts() {
        let identifier = ThreatList::encode_id("d-1", "t-2");
        assert_eq!(identifier, "d-1:t-2");
        assert_eq!(
            ThreatList::ThreatIntelSet.decode_id(&identifier).unwrap(),
            ("d-1".to_string(), "t-2".to_string())
        );
    }

    #[test]
    fn activate_follows_status() {
        let mut info = ThreatListInfo {
            name: Some("trusted".to_string()),
            format: Some("TXT".to_string()),
            location: Some("https://s3.amazonaws.com/bucket/ips.txt".to_string()),
            status: STATUS_ACTIVE.to_string(),
            tags: HashMap::new(),
        };
        let attrs = flatten_threat_list(&info);
        assert_eq!(attrs.get("activate"), Some(&Value::Bool(true)));
        assert_eq!(attrs.get("format"), Some(&Value::from("TXT")));

        info.status = STATUS_INACTIVE.to_string();
        assert_eq!(
            flatten_threat_list(&info).get("activate"),
            Some(&Value::Bool(false))
        );
    }

    #[test]
    fn arn_kinds() {
        assert_eq!(ThreatList::IpSet.arn_kind(), "ipset");
        assert_eq!(ThreatList::ThreatIntelSet.arn_kind(), "threatintelset");
    }
}
