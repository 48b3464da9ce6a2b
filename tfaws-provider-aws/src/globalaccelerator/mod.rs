//! Global Accelerator resources
//!
//! Every accelerator, listener and endpoint group change is applied
//! asynchronously: the parent accelerator goes back to `IN_PROGRESS` and
//! nothing else may change until it is `DEPLOYED` again.

mod accelerator;
mod endpoint_group;
mod listener;

use std::time::Duration;

use aws_sdk_globalaccelerator::Client;
use aws_sdk_globalaccelerator::types::{Accelerator, AcceleratorStatus, Tag};
use tfaws_core::arn::{Arn, ArnError};
use tfaws_core::mutex::global_mutex_kv;
use tfaws_core::provider::{ProviderError, ProviderResult};
use tfaws_core::tags::KeyValueTags;
use tfaws_core::waiter::{Refreshed, StateChangeConf};
use tokio::sync::OwnedMutexGuard;

use crate::errors::{is_aws_err_code, sdk_error};

const SERVICE: &str = "globalaccelerator";

/// Route 53 zone of every accelerator DNS name
pub const HOSTED_ZONE_ID: &str = "Z2BJ6XQ5FK7U4H";

pub(crate) const ACCELERATOR_TIMEOUT: Duration = Duration::from_secs(30 * 60);

/// Deployments take minutes, no point polling faster than this
const DEPLOY_POLL_INTERVAL: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GlobalAcceleratorArnError {
    #[error("parsing ARN ({arn}): {source}")]
    Parse { arn: String, source: ArnError },

    #[error("expected service globalaccelerator in ARN ({arn}), got: {service}")]
    WrongService { arn: String, service: String },

    #[error("expected at least {expected} resource parts in ARN ({arn}), got: {got}")]
    TooFewParts {
        arn: String,
        expected: usize,
        got: usize,
    },
}

impl From<GlobalAcceleratorArnError> for ProviderError {
    fn from(err: GlobalAcceleratorArnError) -> Self {
        ProviderError::new(err.to_string())
    }
}

/// Keep the first `keep` resource segments of a Global Accelerator ARN that
/// has at least `minimum` of them
fn truncate_arn(arn: &str, keep: usize, minimum: usize) -> Result<String, GlobalAcceleratorArnError> {
    let parsed = Arn::parse(arn).map_err(|source| GlobalAcceleratorArnError::Parse {
        arn: arn.to_string(),
        source,
    })?;
    if parsed.service != SERVICE {
        return Err(GlobalAcceleratorArnError::WrongService {
            arn: arn.to_string(),
            service: parsed.service,
        });
    }
    let parts = parsed.resource_parts();
    if parts.len() < minimum {
        return Err(GlobalAcceleratorArnError::TooFewParts {
            arn: arn.to_string(),
            expected: minimum,
            got: parts.len(),
        });
    }
    let resource = parts[..keep].join("/");
    Ok(parsed.with_resource(resource).to_string())
}

/// `.../accelerator/A/listener/L/endpoint-group/E` to `.../accelerator/A/listener/L`
pub fn endpoint_group_arn_to_listener_arn(arn: &str) -> Result<String, GlobalAcceleratorArnError> {
    truncate_arn(arn, 4, 6)
}

/// Listener or endpoint group ARN to the ARN of its accelerator
pub fn listener_or_endpoint_group_arn_to_accelerator_arn(
    arn: &str,
) -> Result<String, GlobalAcceleratorArnError> {
    truncate_arn(arn, 2, 4)
}

/// Lock the accelerator owning a listener or endpoint group. Held until the
/// accelerator is deployed again.
pub(crate) async fn lock_accelerator(arn: &str) -> ProviderResult<OwnedMutexGuard<()>> {
    let accelerator_arn = listener_or_endpoint_group_arn_to_accelerator_arn(arn)?;
    Ok(global_mutex_kv().lock(&accelerator_arn).await)
}

/// Look up an accelerator, `None` if it does not exist
pub(crate) async fn find_accelerator_by_arn(
    client: &Client,
    arn: &str,
) -> ProviderResult<Option<Accelerator>> {
    match client.describe_accelerator().accelerator_arn(arn).send().await {
        Ok(output) => Ok(output.accelerator().cloned()),
        Err(e) if is_aws_err_code(&e, "AcceleratorNotFoundException") => Ok(None),
        Err(e) => Err(sdk_error(
            format!("reading Global Accelerator Accelerator ({})", arn),
            e,
        )),
    }
}

pub(crate) async fn status_accelerator(
    client: &Client,
    arn: &str,
) -> ProviderResult<Refreshed<Accelerator>> {
    Ok(find_accelerator_by_arn(client, arn).await?.map(|accelerator| {
        let status = accelerator
            .status()
            .map(|s| s.as_str().to_string())
            .unwrap_or_default();
        (accelerator, status)
    }))
}

pub(crate) async fn wait_accelerator_deployed(
    client: &Client,
    arn: &str,
    timeout: Duration,
) -> ProviderResult<Accelerator> {
    let conf = StateChangeConf::new(
        &[AcceleratorStatus::InProgress.as_str()],
        &[AcceleratorStatus::Deployed.as_str()],
        timeout,
    )
    .with_min_poll_interval(DEPLOY_POLL_INTERVAL);
    conf.wait_for_state(|| status_accelerator(client, arn))
        .await
        .map_err(|e| {
            ProviderError::from(e)
                .context(format!("waiting for Global Accelerator Accelerator ({}) deployment", arn))
        })?
        .ok_or_else(|| ProviderError::new(format!("Global Accelerator Accelerator ({}) not found", arn)))
}

pub(crate) fn tags_to_sdk(tags: &KeyValueTags) -> ProviderResult<Vec<Tag>> {
    tags.iter()
        .map(|(k, v)| {
            Tag::builder()
                .key(k)
                .value(v)
                .build()
                .map_err(|e| ProviderError::new("building Global Accelerator tag").with_cause(e))
        })
        .collect()
}

pub(crate) fn tags_from_sdk(tags: &[Tag]) -> KeyValueTags {
    tags.iter().map(|t| (t.key(), t.value())).collect()
}

pub(crate) async fn list_tags(client: &Client, arn: &str) -> ProviderResult<KeyValueTags> {
    let output = client
        .list_tags_for_resource()
        .resource_arn(arn)
        .send()
        .await
        .map_err(|e| sdk_error(format!("listing tags for Global Accelerator ({})", arn), e))?;
    Ok(tags_from_sdk(output.tags()))
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
            .map_err(|e| sdk_error(format!("untagging Global Accelerator ({})", arn), e))?;
    }

    let updated = old.updated(new);
    if !updated.is_empty() {
        client
            .tag_resource()
            .resource_arn(arn)
            .set_tags(Some(tags_to_sdk(&updated)?))
            .send()
            .await
            .map_err(|e| sdk_error(format!("tagging Global Accelerator ({})", arn), e))?;
    }
    Ok(())
}

#[cfg(test)]
pub(crate) fn test_client() -> Client {
    use aws_sdk_globalaccelerator::config::{BehaviorVersion, Region};

    let config = aws_sdk_globalaccelerator::Config::builder()
        .behavior_version(BehaviorVersion::latest())
        .region(Region::new("us-west-2"))
        .build();
    Client::from_conf(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    const ENDPOINT_GROUP: &str =
        "arn:aws:globalaccelerator::111111111111:accelerator/a-1/listener/l-1/endpoint-group/eg-1";
    const LISTENER: &str = "arn:aws:globalaccelerator::111111111111:accelerator/a-1/listener/l-1";
    const ACCELERATOR: &str = "arn:aws:globalaccelerator::111111111111:accelerator/a-1";

    #[test]
    fn endpoint_group_to_listener() {
        assert_eq!(endpoint_group_arn_to_listener_arn(ENDPOINT_GROUP).unwrap(), LISTENER);
    }

    #[test]
    fn endpoint_group_to_listener_errors() {
        assert!(matches!(
            endpoint_group_arn_to_listener_arn(""),
            Err(GlobalAcceleratorArnError::Parse { .. })
        ));
        assert!(matches!(
            endpoint_group_arn_to_listener_arn("not an arn"),
            Err(GlobalAcceleratorArnError::Parse { .. })
        ));

        let ec2 = "arn:aws:ec2::111111111111:accelerator/a-1/listener/l-1/endpoint-group/eg-1";
        let err = endpoint_group_arn_to_listener_arn(ec2).unwrap_err();
        assert_eq!(
            err.to_string(),
            format!("expected service globalaccelerator in ARN ({}), got: ec2", ec2)
        );

        let err = endpoint_group_arn_to_listener_arn(LISTENER).unwrap_err();
        assert_eq!(
            err,
            GlobalAcceleratorArnError::TooFewParts {
                arn: LISTENER.to_string(),
                expected: 6,
                got: 4,
            }
        );
    }

    #[test]
    fn to_accelerator() {
        assert_eq!(
            listener_or_endpoint_group_arn_to_accelerator_arn(ENDPOINT_GROUP).unwrap(),
            ACCELERATOR
        );
        assert_eq!(
            listener_or_endpoint_group_arn_to_accelerator_arn(LISTENER).unwrap(),
            ACCELERATOR
        );
        assert!(listener_or_endpoint_group_arn_to_accelerator_arn(ACCELERATOR).is_err());
    }

    #[tokio::test]
    async fn listener_and_endpoint_group_share_the_accelerator_lock() {
        let guard = lock_accelerator(LISTENER).await.unwrap();
        let blocked =
            tokio::time::timeout(Duration::from_millis(50), lock_accelerator(ENDPOINT_GROUP)).await;
        assert!(blocked.is_err());

        drop(guard);
        let other = "arn:aws:globalaccelerator::111111111111:accelerator/a-2/listener/l-9";
        let _other = lock_accelerator(other).await.unwrap();
        assert!(lock_accelerator(ENDPOINT_GROUP).await.is_ok());
        assert!(lock_accelerator(ACCELERATOR).await.is_err());
    }

    #[test]
    fn sdk_tags_round_trip_through_key_value_tags() {
        let tags: KeyValueTags = [("Name", "edge"), ("Env", "prod")].into_iter().collect();
        let sdk = tags_to_sdk(&tags).unwrap();
        assert_eq!(sdk.len(), 2);
        assert_eq!(tags_from_sdk(&sdk), tags);
    }
}
