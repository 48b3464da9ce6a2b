//! AWS service clients and account facts shared by all resources

use aws_config::retry::RetryConfig;
use aws_config::{BehaviorVersion, Region, SdkConfig};
use aws_sdk_globalaccelerator::Client as GlobalAcceleratorClient;
use aws_sdk_guardduty::Client as GuardDutyClient;
use aws_sdk_lexmodelbuilding::Client as LexModelsClient;
use tfaws_core::arn::{Arn, partition_for_region};
use tfaws_core::provider::{ProviderError, ProviderResult};
use tfaws_core::tags::{IgnoreTagsConfig, KeyValueTags};

use crate::config::ProviderConfig;
use crate::errors::sdk_error;
use crate::flex::Attributes;

/// Global Accelerator's control plane only exists in this region
pub const GLOBAL_ACCELERATOR_REGION: &str = "us-west-2";

pub struct AwsConns {
    pub globalaccelerator: GlobalAcceleratorClient,
    pub guardduty: GuardDutyClient,
    pub lexmodels: LexModelsClient,
    pub region: String,
    pub account_id: String,
    pub partition: String,
    pub ignore_tags: IgnoreTagsConfig,
    pub default_tags: KeyValueTags,
}

impl AwsConns {
    /// Load SDK configuration and look up the caller's account
    pub async fn new(config: &ProviderConfig) -> ProviderResult<Self> {
        let region = config
            .region()
            .map_err(|e| ProviderError::new(e.to_string()))?
            .to_string();

        let mut loader =
            aws_config::defaults(BehaviorVersion::latest()).region(Region::new(region.clone()));
        if let Some(profile) = &config.profile {
            loader = loader.profile_name(profile);
        }
        if let Some(max_attempts) = config.max_attempts {
            loader = loader.retry_config(RetryConfig::standard().with_max_attempts(max_attempts));
        }
        let sdk_config = loader.load().await;

        let (account_id, partition) = caller_identity(&sdk_config, &region).await?;
        log::info!(
            "AWS provider configured: region={}, account={}, partition={}",
            region,
            account_id,
            partition
        );

        Ok(Self::from_sdk_config(&sdk_config, config, region, account_id, partition))
    }

    /// Build clients from an already loaded SDK configuration
    pub fn from_sdk_config(
        sdk_config: &SdkConfig,
        config: &ProviderConfig,
        region: String,
        account_id: String,
        partition: String,
    ) -> Self {
        let globalaccelerator_config = aws_sdk_globalaccelerator::config::Builder::from(sdk_config)
            .region(Region::new(GLOBAL_ACCELERATOR_REGION))
            .build();

        Self {
            globalaccelerator: GlobalAcceleratorClient::from_conf(globalaccelerator_config),
            guardduty: GuardDutyClient::new(sdk_config),
            lexmodels: LexModelsClient::new(sdk_config),
            region,
            account_id,
            partition,
            ignore_tags: config.ignore_tags.clone(),
            default_tags: config.default_tags.iter().collect(),
        }
    }

    /// Resource tags merged over the default tags
    pub fn all_tags(&self, resource_tags: &KeyValueTags) -> KeyValueTags {
        self.default_tags.merge(resource_tags)
    }

    /// Tags read from AWS with AWS-managed and ignored keys removed
    pub fn visible_tags(&self, tags: KeyValueTags) -> KeyValueTags {
        tags.ignore_aws().ignore_config(&self.ignore_tags)
    }

    /// Of `all` (the full tag set), the tags the resource declared itself
    pub fn resource_tags(&self, all: &KeyValueTags) -> KeyValueTags {
        all.iter()
            .filter(|(k, v)| self.default_tags.get(k) != Some(*v))
            .collect()
    }

    /// Full tag set to apply for the `tags` attribute of a resource
    pub fn desired_tags(&self, attrs: &Attributes) -> KeyValueTags {
        self.all_tags(&KeyValueTags::from_value(attrs.get("tags")))
    }

    /// Store `tags` and `tags_all` from the tags AWS reports
    pub fn set_tag_attributes(&self, attrs: &mut Attributes, listed: KeyValueTags) {
        let all = self.visible_tags(listed);
        attrs.insert("tags".to_string(), self.resource_tags(&all).to_value());
        attrs.insert("tags_all".to_string(), all.to_value());
    }
}

/// Account ID and partition of the configured credentials
async fn caller_identity(sdk_config: &SdkConfig, region: &str) -> ProviderResult<(String, String)> {
    let sts = aws_sdk_sts::Client::new(sdk_config);
    let identity = sts
        .get_caller_identity()
        .send()
        .await
        .map_err(|e| sdk_error("getting caller identity, check AWS credentials", e))?;

    let account_id = identity
        .account()
        .ok_or_else(|| ProviderError::new("No account ID returned from STS GetCallerIdentity"))?
        .to_string();

    let partition = identity
        .arn()
        .and_then(|arn| Arn::parse(arn).ok())
        .map(|arn| arn.partition)
        .unwrap_or_else(|| partition_for_region(region).to_string());

    Ok((account_id, partition))
}
