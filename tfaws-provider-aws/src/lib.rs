//! tfaws AWS Provider
//!
//! Global Accelerator, GuardDuty and Lex Model Building resources on top of
//! the AWS SDK for Rust.
//!
//! ## Module Structure
//!
//! - `config` - Provider configuration file and environment
//! - `conns` - Service clients and account facts
//! - `resources` - Resource and data source type definitions
//! - `schemas` - Attribute schemas of every type
//! - `globalaccelerator`, `guardduty`, `lexmodels` - Per-service CRUD

pub mod config;
pub mod conns;
pub mod errors;
pub mod flex;
pub mod resources;
pub mod schemas;

pub mod globalaccelerator;
pub mod guardduty;
// Lex Model Building V1 operations are marked deprecated in the SDK
#[allow(deprecated)]
pub mod lexmodels;

use tfaws_core::provider::{BoxFuture, Provider, ProviderError, ProviderResult, ResourceType};
use tfaws_core::resource::{Resource, ResourceId, State};

use config::ProviderConfig;
use conns::AwsConns;
use guardduty::ThreatList;

/// The `aws` provider
pub struct AwsProvider {
    pub(crate) conns: AwsConns,
}

impl AwsProvider {
    /// Create a provider from configuration, looking up the caller's account
    pub async fn new(config: &ProviderConfig) -> ProviderResult<Self> {
        Ok(Self {
            conns: AwsConns::new(config).await?,
        })
    }

    /// Create with already configured clients
    pub fn from_conns(conns: AwsConns) -> Self {
        Self { conns }
    }

    pub fn conns(&self) -> &AwsConns {
        &self.conns
    }
}

fn unknown_type(id: &ResourceId) -> ProviderError {
    ProviderError::new(format!("Unknown resource type: {}", id.resource_type)).for_resource(id.clone())
}

impl Provider for AwsProvider {
    fn name(&self) -> &'static str {
        "aws"
    }

    fn resource_types(&self) -> Vec<Box<dyn ResourceType>> {
        resources::resource_types()
    }

    fn read(&self, id: &ResourceId, identifier: &str) -> BoxFuture<'_, ProviderResult<State>> {
        let id = id.clone();
        let identifier = identifier.to_string();
        Box::pin(async move {
            let identifier = identifier.as_str();
            match id.resource_type.as_str() {
                "globalaccelerator.accelerator" => {
                    self.read_globalaccelerator_accelerator(&id, identifier).await
                }
                "globalaccelerator.listener" => {
                    self.read_globalaccelerator_listener(&id, identifier).await
                }
                "globalaccelerator.endpoint_group" => {
                    self.read_globalaccelerator_endpoint_group(&id, identifier).await
                }
                "guardduty.detector" => self.read_guardduty_detector(&id, identifier).await,
                "guardduty.detector_feature" => {
                    self.read_guardduty_detector_feature(&id, identifier).await
                }
                "guardduty.filter" => self.read_guardduty_filter(&id, identifier).await,
                "guardduty.ipset" => {
                    self.read_guardduty_threat_list(ThreatList::IpSet, &id, identifier)
                        .await
                }
                "guardduty.threatintelset" => {
                    self.read_guardduty_threat_list(ThreatList::ThreatIntelSet, &id, identifier)
                        .await
                }
                "guardduty.member" => self.read_guardduty_member(&id, identifier).await,
                "guardduty.publishing_destination" => {
                    self.read_guardduty_publishing_destination(&id, identifier).await
                }
                "guardduty.organization_admin_account" => {
                    self.read_guardduty_organization_admin_account(&id, identifier)
                        .await
                }
                "lex.bot" => self.read_lex_bot(&id, identifier).await,
                "lex.bot_alias" => self.read_lex_bot_alias(&id, identifier).await,
                "lex.intent" => self.read_lex_intent(&id, identifier).await,
                "lex.slot_type" => self.read_lex_slot_type(&id, identifier).await,
                _ => Err(unknown_type(&id)),
            }
        })
    }

    fn read_data_source(&self, resource: &Resource) -> BoxFuture<'_, ProviderResult<State>> {
        let resource = resource.clone();
        Box::pin(async move {
            match resource.id.resource_type.as_str() {
                "globalaccelerator.accelerator" => {
                    self.read_globalaccelerator_accelerator_data(resource).await
                }
                "guardduty.detector" => self.read_guardduty_detector_data(resource).await,
                "lex.bot" => self.read_lex_bot_data(resource).await,
                "lex.bot_alias" => self.read_lex_bot_alias_data(resource).await,
                "lex.intent" => self.read_lex_intent_data(resource).await,
                "lex.slot_type" => self.read_lex_slot_type_data(resource).await,
                _ => Err(ProviderError::new(format!(
                    "Data source not supported: {}",
                    resource.id.resource_type
                ))
                .for_resource(resource.id.clone())),
            }
        })
    }

    fn create(&self, resource: &Resource) -> BoxFuture<'_, ProviderResult<State>> {
        let resource = resource.clone();
        Box::pin(async move {
            match resource.id.resource_type.as_str() {
                "globalaccelerator.accelerator" => {
                    self.create_globalaccelerator_accelerator(resource).await
                }
                "globalaccelerator.listener" => self.create_globalaccelerator_listener(resource).await,
                "globalaccelerator.endpoint_group" => {
                    self.create_globalaccelerator_endpoint_group(resource).await
                }
                "guardduty.detector" => self.create_guardduty_detector(resource).await,
                "guardduty.detector_feature" => self.create_guardduty_detector_feature(resource).await,
                "guardduty.filter" => self.create_guardduty_filter(resource).await,
                "guardduty.ipset" => {
                    self.create_guardduty_threat_list(ThreatList::IpSet, resource)
                        .await
                }
                "guardduty.threatintelset" => {
                    self.create_guardduty_threat_list(ThreatList::ThreatIntelSet, resource)
                        .await
                }
                "guardduty.member" => self.create_guardduty_member(resource).await,
                "guardduty.publishing_destination" => {
                    self.create_guardduty_publishing_destination(resource).await
                }
                "guardduty.organization_admin_account" => {
                    self.create_guardduty_organization_admin_account(resource)
                        .await
                }
                "lex.bot" => self.create_lex_bot(resource).await,
                "lex.bot_alias" => self.create_lex_bot_alias(resource).await,
                "lex.intent" => self.create_lex_intent(resource).await,
                "lex.slot_type" => self.create_lex_slot_type(resource).await,
                _ => Err(unknown_type(&resource.id)),
            }
        })
    }

    fn update(
        &self,
        id: &ResourceId,
        identifier: &str,
        from: &State,
        to: &Resource,
    ) -> BoxFuture<'_, ProviderResult<State>> {
        let id = id.clone();
        let identifier = identifier.to_string();
        let from = from.clone();
        let to = to.clone();
        Box::pin(async move {
            let identifier = identifier.as_str();
            match id.resource_type.as_str() {
                "globalaccelerator.accelerator" => {
                    self.update_globalaccelerator_accelerator(id, identifier, from, to)
                        .await
                }
                "globalaccelerator.listener" => {
                    self.update_globalaccelerator_listener(id, identifier, to).await
                }
                "globalaccelerator.endpoint_group" => {
                    self.update_globalaccelerator_endpoint_group(id, identifier, to)
                        .await
                }
                "guardduty.detector" => {
                    self.update_guardduty_detector(id, identifier, from, to).await
                }
                "guardduty.detector_feature" => {
                    self.update_guardduty_detector_feature(id, identifier, to).await
                }
                "guardduty.filter" => self.update_guardduty_filter(id, identifier, from, to).await,
                "guardduty.ipset" => {
                    self.update_guardduty_threat_list(ThreatList::IpSet, id, identifier, from, to)
                        .await
                }
                "guardduty.threatintelset" => {
                    self.update_guardduty_threat_list(
                        ThreatList::ThreatIntelSet,
                        id,
                        identifier,
                        from,
                        to,
                    )
                    .await
                }
                "guardduty.member" => self.update_guardduty_member(id, identifier, from, to).await,
                "guardduty.publishing_destination" => {
                    self.update_guardduty_publishing_destination(id, identifier, to)
                        .await
                }
                "lex.bot" => self.update_lex_bot(id, identifier, from, to).await,
                "lex.bot_alias" => self.update_lex_bot_alias(id, identifier, from, to).await,
                "lex.intent" => self.update_lex_intent(id, identifier, from, to).await,
                "lex.slot_type" => self.update_lex_slot_type(id, identifier, from, to).await,
                "guardduty.organization_admin_account" => Err(ProviderError::new(
                    "Organization admin accounts cannot be updated, only replaced",
                )
                .for_resource(id)),
                _ => Err(unknown_type(&id)),
            }
        })
    }

    fn delete(&self, id: &ResourceId, identifier: &str) -> BoxFuture<'_, ProviderResult<()>> {
        let id = id.clone();
        let identifier = identifier.to_string();
        Box::pin(async move {
            let identifier = identifier.as_str();
            match id.resource_type.as_str() {
                "globalaccelerator.accelerator" => {
                    self.delete_globalaccelerator_accelerator(id, identifier).await
                }
                "globalaccelerator.listener" => {
                    self.delete_globalaccelerator_listener(id, identifier).await
                }
                "globalaccelerator.endpoint_group" => {
                    self.delete_globalaccelerator_endpoint_group(id, identifier).await
                }
                "guardduty.detector" => self.delete_guardduty_detector(id, identifier).await,
                "guardduty.detector_feature" => {
                    self.delete_guardduty_detector_feature(id, identifier).await
                }
                "guardduty.filter" => self.delete_guardduty_filter(id, identifier).await,
                "guardduty.ipset" => {
                    self.delete_guardduty_threat_list(ThreatList::IpSet, id, identifier)
                        .await
                }
                "guardduty.threatintelset" => {
                    self.delete_guardduty_threat_list(ThreatList::ThreatIntelSet, id, identifier)
                        .await
                }
                "guardduty.member" => self.delete_guardduty_member(id, identifier).await,
                "guardduty.publishing_destination" => {
                    self.delete_guardduty_publishing_destination(id, identifier).await
                }
                "guardduty.organization_admin_account" => {
                    self.delete_guardduty_organization_admin_account(id, identifier)
                        .await
                }
                "lex.bot" => self.delete_lex_bot(id, identifier).await,
                "lex.bot_alias" => self.delete_lex_bot_alias(id, identifier).await,
                "lex.intent" => self.delete_lex_intent(id, identifier).await,
                "lex.slot_type" => self.delete_lex_slot_type(id, identifier).await,
                _ => Err(unknown_type(&id)),
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aws_config::{BehaviorVersion, Region, SdkConfig};
    use std::collections::HashSet;

    /// Provider whose clients are never called
    fn offline_provider() -> AwsProvider {
        let sdk_config = SdkConfig::builder()
            .behavior_version(BehaviorVersion::latest())
            .region(Region::new("eu-west-1"))
            .build();
        let conns = AwsConns::from_sdk_config(
            &sdk_config,
            &ProviderConfig::default(),
            "eu-west-1".to_string(),
            "111111111111".to_string(),
            "aws".to_string(),
        );
        AwsProvider::from_conns(conns)
    }

    #[tokio::test]
    async fn unknown_types_are_rejected() {
        let provider = offline_provider();
        let id = ResourceId::new("s3.bucket", "logs");

        let err = provider.read(&id, "logs").await.unwrap_err();
        assert_eq!(err.to_string(), "[s3.bucket.logs] Unknown resource type: s3.bucket");

        let resource = Resource::new("s3.bucket", "logs");
        assert!(provider.create(&resource).await.is_err());
        assert!(provider.delete(&id, "logs").await.is_err());

        let data = Resource::new("guardduty.filter", "f").with_read_only(true);
        let err = provider.read_data_source(&data).await.unwrap_err();
        assert!(err.to_string().contains("Data source not supported: guardduty.filter"));
    }

    #[tokio::test]
    async fn admin_accounts_are_never_updated_in_place() {
        let provider = offline_provider();
        let id = ResourceId::new("guardduty.organization_admin_account", "admin");
        let from = State::existing(id.clone(), Default::default());
        let to = Resource::new("guardduty.organization_admin_account", "admin");
        let err = provider
            .update(&id, "222222222222", &from, &to)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("cannot be updated"));
    }

    #[tokio::test]
    async fn malformed_identifiers_fail_before_any_call() {
        let provider = offline_provider();
        let id = ResourceId::new("lex.bot_alias", "prod");
        assert!(provider.read(&id, "OrderFlowers").await.is_err());

        let id = ResourceId::new("guardduty.member", "m");
        assert!(provider.read(&id, "d-1").await.is_err());
    }

    #[test]
    fn every_type_is_registered_once() {
        let provider = offline_provider();
        let types = provider.resource_types();
        let resources: HashSet<&str> = types
            .iter()
            .filter(|t| !t.is_data_source())
            .map(|t| t.name())
            .collect();
        let data_sources: HashSet<&str> = types
            .iter()
            .filter(|t| t.is_data_source())
            .map(|t| t.name())
            .collect();

        assert_eq!(resources.len(), 15);
        assert_eq!(data_sources.len(), 6);
        for name in &data_sources {
            assert!(resources.contains(name), "{} has no resource", name);
        }
        for t in &types {
            assert_eq!(t.schema().resource_type, t.name());
        }
    }
}
