use aws_sdk_guardduty::types::{
    DetectorAdditionalConfiguration, DetectorFeature, DetectorFeatureConfiguration,
    DetectorFeatureConfigurationResult, FeatureAdditionalConfiguration, FeatureStatus,
};
use tfaws_core::id::create_resource_id;
use tfaws_core::mutex::global_mutex_kv;
use tfaws_core::provider::{ProviderError, ProviderResult};
use tfaws_core::resource::{Resource, ResourceId, State, Value};

use super::detector::find_detector_by_id;
use super::{FEATURE_ID_SEPARATOR, decode_detector_feature_id};
use crate::AwsProvider;
use crate::errors::sdk_error;
use crate::flex::{Attributes, blocks, get_blocks, get_str, insert_opt, require_str};

pub(crate) fn expand_feature(attrs: &Attributes, name: &str, status: &str) -> DetectorFeatureConfiguration {
    let additional: Vec<DetectorAdditionalConfiguration> = get_blocks(attrs, "additional_configuration")
        .into_iter()
        .map(|c| {
            DetectorAdditionalConfiguration::builder()
                .set_name(get_str(c, "name").map(FeatureAdditionalConfiguration::from))
                .set_status(get_str(c, "status").map(FeatureStatus::from))
                .build()
        })
        .collect();

    DetectorFeatureConfiguration::builder()
        .name(DetectorFeature::from(name))
        .status(FeatureStatus::from(status))
        .set_additional_configuration((!additional.is_empty()).then_some(additional))
        .build()
}

/// Attributes of one feature as reported by GetDetector
pub(crate) fn flatten_feature(feature: &DetectorFeatureConfigurationResult) -> Attributes {
    let mut attrs = Attributes::new();
    insert_opt(&mut attrs, "name", feature.name().map(|n| n.as_str()));
    insert_opt(&mut attrs, "status", feature.status().map(|s| s.as_str()));
    attrs.insert(
        "additional_configuration".to_string(),
        blocks(feature.additional_configuration().iter().map(|c| {
            let mut item = Attributes::new();
            insert_opt(&mut item, "name", c.name().map(|n| n.as_str()));
            insert_opt(&mut item, "status", c.status().map(|s| s.as_str()));
            item
        })),
    );
    attrs
}

impl AwsProvider {
    pub(crate) async fn read_guardduty_detector_feature(
        &self,
        id: &ResourceId,
        identifier: &str,
    ) -> ProviderResult<State> {
        let (detector_id, name) = decode_detector_feature_id(identifier)
            .map_err(|e| ProviderError::from(e).for_resource(id.clone()))?;
        let detector = find_detector_by_id(&self.conns.guardduty, &detector_id)
            .await
            .map_err(|e| e.for_resource(id.clone()))?;

        let feature = detector.as_ref().and_then(|d| {
            d.features()
                .iter()
                .find(|f| f.name().map(|n| n.as_str()) == Some(name.as_str()))
        });
        let Some(feature) = feature else {
            log::warn!("GuardDuty Detector Feature ({}) not found", identifier);
            return Ok(State::not_found(id.clone()));
        };

        let mut attrs = flatten_feature(feature);
        attrs.insert("detector_id".to_string(), Value::from(detector_id.as_str()));
        Ok(State::existing(id.clone(), attrs).with_identifier(identifier))
    }

    /// Features are set through UpdateDetector, serialized per detector
    async fn put_guardduty_detector_feature(&self, id: &ResourceId, attrs: &Attributes) -> ProviderResult<String> {
        let detector_id = require_str(attrs, "detector_id", id)?;
        let name = require_str(attrs, "name", id)?;
        let status = require_str(attrs, "status", id)?;
        let feature = expand_feature(attrs, name, status);

        let _guard = global_mutex_kv().lock(detector_id).await;
        self.conns
            .guardduty
            .update_detector()
            .detector_id(detector_id)
            .features(feature)
            .send()
            .await
            .map_err(|e| {
                sdk_error(
                    format!("updating GuardDuty Detector ({}) Feature ({})", detector_id, name),
                    e,
                )
                .for_resource(id.clone())
            })?;

        Ok(create_resource_id(&[detector_id, name], FEATURE_ID_SEPARATOR))
    }

    pub(crate) async fn create_guardduty_detector_feature(
        &self,
        resource: Resource,
    ) -> ProviderResult<State> {
        let identifier = self
            .put_guardduty_detector_feature(&resource.id, &resource.attributes)
            .await?;
        log::info!("Configured GuardDuty Detector Feature {}", identifier);
        self.read_guardduty_detector_feature(&resource.id, &identifier)
            .await
    }

    pub(crate) async fn update_guardduty_detector_feature(
        &self,
        id: ResourceId,
        identifier: &str,
        to: Resource,
    ) -> ProviderResult<State> {
        self.put_guardduty_detector_feature(&id, &to.attributes).await?;
        self.read_guardduty_detector_feature(&id, identifier).await
    }

    /// Features cannot be removed from a detector, deleting only forgets it
    pub(crate) async fn delete_guardduty_detector_feature(
        &self,
        _id: ResourceId,
        identifier: &str,
    ) -> ProviderResult<()> {
        log::warn!(
            "GuardDuty Detector Feature ({}) is only removed from state, the detector keeps it",
            identifier
        );
        Ok(())
    }
}
