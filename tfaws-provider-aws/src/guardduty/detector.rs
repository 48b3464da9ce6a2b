use std::time::Duration;

use aws_sdk_guardduty::operation::get_detector::GetDetectorOutput;
use aws_sdk_guardduty::types::{
    DataSourceConfigurations, DataSourceConfigurationsResult, DataSourceStatus,
    DetectorFeatureConfigurationResult, DetectorStatus, FindingPublishingFrequency,
    KubernetesAuditLogsConfiguration, KubernetesConfiguration, MalwareProtectionConfiguration,
    S3LogsConfiguration, ScanEc2InstanceWithFindings,
};
use tfaws_core::provider::{ProviderError, ProviderResult};
use tfaws_core::resource::{Resource, ResourceId, State, Value};
use tfaws_core::retry::retry_when;
use tfaws_core::tags::KeyValueTags;

use super::{detector_arn, tags_from_sdk, update_tags};
use crate::AwsProvider;
use crate::errors::{is_not_found, is_not_found_error, is_provider_aws_err, sdk_error};
use crate::flex::{
    Attributes, block, blocks, get_block, get_bool, get_str, get_string, idempotency_token,
    insert_opt,
};
use crate::schemas::guardduty::detector_schema;

const DELETE_TIMEOUT: Duration = Duration::from_secs(2 * 60);

/// `datasources` block to the API shape. Sub-blocks left out are not sent.
pub(crate) fn expand_data_sources(datasources: &Attributes) -> DataSourceConfigurations {
    let s3_logs = get_block(datasources, "s3_logs")
        .map(|s3| S3LogsConfiguration::builder().set_enable(get_bool(s3, "enable")).build());

    let kubernetes = get_block(datasources, "kubernetes")
        .and_then(|k| get_block(k, "audit_logs"))
        .map(|audit| {
            KubernetesConfiguration::builder()
                .audit_logs(
                    KubernetesAuditLogsConfiguration::builder()
                        .set_enable(get_bool(audit, "enable"))
                        .build(),
                )
                .build()
        });

    let malware_protection = get_block(datasources, "malware_protection")
        .and_then(|m| get_block(m, "scan_ec2_instance_with_findings"))
        .and_then(|scan| get_block(scan, "ebs_volumes"))
        .map(|ebs| {
            MalwareProtectionConfiguration::builder()
                .scan_ec2_instance_with_findings(
                    ScanEc2InstanceWithFindings::builder()
                        .set_ebs_volumes(get_bool(ebs, "enable"))
                        .build(),
                )
                .build()
        });

    DataSourceConfigurations::builder()
        .set_s3_logs(s3_logs)
        .set_kubernetes(kubernetes)
        .set_malware_protection(malware_protection)
        .build()
}

fn enabled_block(status: Option<&DataSourceStatus>) -> Value {
    let mut item = Attributes::new();
    item.insert(
        "enable".to_string(),
        Value::Bool(status == Some(&DataSourceStatus::Enabled)),
    );
    block(item)
}

fn nested(key: &str, value: Value) -> Value {
    let mut item = Attributes::new();
    item.insert(key.to_string(), value);
    block(item)
}

pub(crate) fn flatten_data_sources(result: &DataSourceConfigurationsResult) -> Value {
    let mut attrs = Attributes::new();
    if let Some(s3) = result.s3_logs() {
        attrs.insert("s3_logs".to_string(), enabled_block(s3.status()));
    }
    if let Some(audit) = result.kubernetes().and_then(|k| k.audit_logs()) {
        attrs.insert(
            "kubernetes".to_string(),
            nested("audit_logs", enabled_block(audit.status())),
        );
    }
    if let Some(ebs) = result
        .malware_protection()
        .and_then(|m| m.scan_ec2_instance_with_findings())
        .and_then(|s| s.ebs_volumes())
    {
        attrs.insert(
            "malware_protection".to_string(),
            nested(
                "scan_ec2_instance_with_findings",
                nested("ebs_volumes", enabled_block(ebs.status())),
            ),
        );
    }
    block(attrs)
}

/// `features` of the detector data source
pub(crate) fn flatten_features(features: &[DetectorFeatureConfigurationResult]) -> Value {
    blocks(features.iter().map(|f| {
        let mut item = Attributes::new();
        insert_opt(&mut item, "name", f.name().map(|n| n.as_str()));
        insert_opt(&mut item, "status", f.status().map(|s| s.as_str()));
        item.insert(
            "additional_configuration".to_string(),
            blocks(f.additional_configuration().iter().map(|c| {
                let mut config = Attributes::new();
                insert_opt(&mut config, "name", c.name().map(|n| n.as_str()));
                insert_opt(&mut config, "status", c.status().map(|s| s.as_str()));
                config
            })),
        );
        item
    }))
}

pub(crate) fn flatten_detector(detector: &GetDetectorOutput) -> Attributes {
    let mut attrs = Attributes::new();
    attrs.insert(
        "enable".to_string(),
        Value::Bool(detector.status() == Some(&DetectorStatus::Enabled)),
    );
    insert_opt(
        &mut attrs,
        "finding_publishing_frequency",
        detector.finding_publishing_frequency().map(|f| f.as_str()),
    );
    if let Some(data_sources) = detector.data_sources() {
        attrs.insert("datasources".to_string(), flatten_data_sources(data_sources));
    }
    attrs
}

/// Get a detector, `None` if it does not exist
pub(crate) async fn find_detector_by_id(
    client: &aws_sdk_guardduty::Client,
    detector_id: &str,
) -> ProviderResult<Option<GetDetectorOutput>> {
    match client.get_detector().detector_id(detector_id).send().await {
        Ok(output) => Ok(Some(output)),
        Err(e) if is_not_found(&e) => Ok(None),
        Err(e) => Err(sdk_error(format!("reading GuardDuty Detector ({})", detector_id), e)),
    }
}

/// Deletion refused because members are still being detached
pub(crate) fn is_members_still_attached(err: &ProviderError) -> bool {
    is_provider_aws_err(
        err,
        "BadRequestException",
        "cannot delete detector while it has invited or associated members",
    )
}

impl AwsProvider {
    pub(crate) async fn read_guardduty_detector(
        &self,
        id: &ResourceId,
        identifier: &str,
    ) -> ProviderResult<State> {
        let detector = find_detector_by_id(&self.conns.guardduty, identifier)
            .await
            .map_err(|e| e.for_resource(id.clone()))?;
        let Some(detector) = detector else {
            log::warn!("GuardDuty Detector ({}) not found", identifier);
            return Ok(State::not_found(id.clone()));
        };

        let mut attrs = flatten_detector(&detector);
        attrs.insert("account_id".to_string(), Value::from(self.conns.account_id.as_str()));
        attrs.insert(
            "arn".to_string(),
            Value::from(detector_arn(&self.conns, identifier, None)),
        );
        self.conns
            .set_tag_attributes(&mut attrs, tags_from_sdk(detector.tags()));
        Ok(State::existing(id.clone(), attrs).with_identifier(identifier))
    }

    pub(crate) async fn create_guardduty_detector(&self, resource: Resource) -> ProviderResult<State> {
        let id = resource.id.clone();
        let attrs = &resource.attributes;
        let tags = self.conns.desired_tags(attrs);

        let mut request = self
            .conns
            .guardduty
            .create_detector()
            .enable(get_bool(attrs, "enable").unwrap_or(true))
            .client_token(idempotency_token())
            .set_finding_publishing_frequency(
                get_str(attrs, "finding_publishing_frequency").map(FindingPublishingFrequency::from),
            );
        if let Some(datasources) = get_block(attrs, "datasources") {
            request = request.data_sources(expand_data_sources(datasources));
        }
        if !tags.is_empty() {
            request = request.set_tags(Some(tags.to_hash_map()));
        }

        let output = request.send().await.map_err(|e| {
            sdk_error("creating GuardDuty Detector", e).for_resource(id.clone())
        })?;
        let detector_id = output
            .detector_id()
            .ok_or_else(|| {
                ProviderError::new("CreateDetector returned no detector ID").for_resource(id.clone())
            })?
            .to_string();
        log::info!("Created GuardDuty Detector {}", detector_id);

        self.read_guardduty_detector(&id, &detector_id).await
    }

    pub(crate) async fn update_guardduty_detector(
        &self,
        id: ResourceId,
        identifier: &str,
        from: State,
        to: Resource,
    ) -> ProviderResult<State> {
        let attrs = &to.attributes;
        let client = &self.conns.guardduty;
        let changed = detector_schema().changed_attributes(&from.attributes, attrs);

        if changed
            .iter()
            .any(|c| matches!(c.as_str(), "enable" | "finding_publishing_frequency" | "datasources"))
        {
            let mut request = client
                .update_detector()
                .detector_id(identifier)
                .enable(get_bool(attrs, "enable").unwrap_or(true))
                .set_finding_publishing_frequency(
                    get_str(attrs, "finding_publishing_frequency")
                        .map(FindingPublishingFrequency::from),
                );
            if changed.iter().any(|c| c == "datasources")
                && let Some(datasources) = get_block(attrs, "datasources")
            {
                request = request.data_sources(expand_data_sources(datasources));
            }
            request.send().await.map_err(|e| {
                sdk_error(format!("updating GuardDuty Detector ({})", identifier), e)
                    .for_resource(id.clone())
            })?;
        }

        let old_tags = KeyValueTags::from_value(from.attributes.get("tags_all"));
        let new_tags = self.conns.desired_tags(attrs);
        update_tags(
            client,
            &detector_arn(&self.conns, identifier, None),
            &old_tags,
            &new_tags,
        )
        .await
        .map_err(|e| e.for_resource(id.clone()))?;

        self.read_guardduty_detector(&id, identifier).await
    }

    /// Members still attached to the detector block deletion for a while
    /// after they are removed
    pub(crate) async fn delete_guardduty_detector(
        &self,
        id: ResourceId,
        identifier: &str,
    ) -> ProviderResult<()> {
        log::info!("Deleting GuardDuty Detector {}", identifier);
        let client = &self.conns.guardduty;
        let result = retry_when(
            DELETE_TIMEOUT,
            || async move {
                client
                    .delete_detector()
                    .detector_id(identifier)
                    .send()
                    .await
                    .map_err(|e| sdk_error(format!("deleting GuardDuty Detector ({})", identifier), e))
            },
            is_members_still_attached,
        )
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(e) if is_not_found_error(&e) => Ok(()),
            Err(e) => Err(e.for_resource(id)),
        }
    }

    /// The detector given by `id`, or the only one in the region
    pub(crate) async fn read_guardduty_detector_data(&self, resource: Resource) -> ProviderResult<State> {
        let id = resource.id.clone();
        let client = &self.conns.guardduty;

        let detector_id = match get_string(&resource.attributes, "id").filter(|s| !s.is_empty()) {
            Some(detector_id) => detector_id,
            None => {
                let mut detector_ids = Vec::new();
                let mut next_token = None;
                loop {
                    let output = client
                        .list_detectors()
                        .set_next_token(next_token)
                        .send()
                        .await
                        .map_err(|e| {
                            sdk_error("listing GuardDuty Detectors", e).for_resource(id.clone())
                        })?;
                    detector_ids.extend(output.detector_ids().iter().cloned());
                    next_token = output.next_token().map(str::to_string);
                    if next_token.is_none() {
                        break;
                    }
                }
                match detector_ids.as_slice() {
                    [only] => only.clone(),
                    [] => {
                        return Err(ProviderError::new("no GuardDuty Detectors found")
                            .for_resource(id));
                    }
                    many => {
                        return Err(ProviderError::new(format!(
                            "found {} GuardDuty Detectors, expected exactly one; set id",
                            many.len()
                        ))
                        .for_resource(id));
                    }
                }
            }
        };

        let detector = find_detector_by_id(client, &detector_id)
            .await
            .map_err(|e| e.for_resource(id.clone()))?
            .ok_or_else(|| {
                ProviderError::new(format!("GuardDuty Detector ({}) not found", detector_id))
                    .for_resource(id.clone())
            })?;

        let mut attrs = Attributes::new();
        attrs.insert("id".to_string(), Value::from(detector_id.as_str()));
        insert_opt(&mut attrs, "status", detector.status().map(|s| s.as_str()));
        insert_opt(&mut attrs, "service_role_arn", detector.service_role());
        insert_opt(
            &mut attrs,
            "finding_publishing_frequency",
            detector.finding_publishing_frequency().map(|f| f.as_str()),
        );
        attrs.insert("features".to_string(), flatten_features(detector.features()));
        attrs.insert(
            "arn".to_string(),
            Value::from(detector_arn(&self.conns, &detector_id, None)),
        );
        attrs.insert(
            "tags".to_string(),
            self.conns.visible_tags(tags_from_sdk(detector.tags())).to_value(),
        );
        Ok(State::existing(id, attrs).with_identifier(detector_id))
    }
}
