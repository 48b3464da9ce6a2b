use std::time::Duration;

use aws_sdk_guardduty::Client;
use aws_sdk_guardduty::operation::describe_publishing_destination::DescribePublishingDestinationOutput;
use aws_sdk_guardduty::types::{DestinationProperties, DestinationType, PublishingStatus};
use tfaws_core::id::create_resource_id;
use tfaws_core::provider::{ProviderError, ProviderResult};
use tfaws_core::resource::{Resource, ResourceId, State, Value};
use tfaws_core::waiter::{Refreshed, StateChangeConf};

use super::{ID_SEPARATOR, WAIT_TIMEOUT, decode_publishing_destination_id};
use crate::AwsProvider;
use crate::errors::{is_not_found, sdk_error};
use crate::flex::{Attributes, get_str, idempotency_token, insert_opt, require_str};

/// GuardDuty needs a moment before it starts verifying the destination
const VERIFICATION_DELAY: Duration = Duration::from_secs(5);

fn destination_properties(attrs: &Attributes, id: &ResourceId) -> ProviderResult<DestinationProperties> {
    Ok(DestinationProperties::builder()
        .destination_arn(require_str(attrs, "destination_arn", id)?)
        .kms_key_arn(require_str(attrs, "kms_key_arn", id)?)
        .build())
}

pub(crate) fn flatten_publishing_destination(output: &DescribePublishingDestinationOutput) -> Attributes {
    let mut attrs = Attributes::new();
    insert_opt(
        &mut attrs,
        "destination_type",
        output.destination_type().map(|t| t.as_str()),
    );
    if let Some(properties) = output.destination_properties() {
        insert_opt(&mut attrs, "destination_arn", properties.destination_arn());
        insert_opt(&mut attrs, "kms_key_arn", properties.kms_key_arn());
    }
    attrs
}

async fn find_publishing_destination(
    client: &Client,
    detector_id: &str,
    destination_id: &str,
) -> ProviderResult<Option<DescribePublishingDestinationOutput>> {
    match client
        .describe_publishing_destination()
        .detector_id(detector_id)
        .destination_id(destination_id)
        .send()
        .await
    {
        Ok(output) => Ok(Some(output)),
        Err(e) if is_not_found(&e) => Ok(None),
        Err(e) => Err(sdk_error(
            format!(
                "reading GuardDuty Publishing Destination ({}:{})",
                detector_id, destination_id
            ),
            e,
        )),
    }
}

async fn status_publishing_destination(
    client: &Client,
    detector_id: &str,
    destination_id: &str,
) -> ProviderResult<Refreshed<DescribePublishingDestinationOutput>> {
    Ok(find_publishing_destination(client, detector_id, destination_id)
        .await?
        .map(|output| {
            let status = output.status().map(|s| s.as_str().to_string()).unwrap_or_default();
            (output, status)
        }))
}

/// New destinations are verified by GuardDuty writing a test object
async fn wait_publishing_destination_created(
    client: &Client,
    detector_id: &str,
    destination_id: &str,
) -> ProviderResult<()> {
    StateChangeConf::new(
        &[PublishingStatus::PendingVerification.as_str()],
        &[PublishingStatus::Publishing.as_str()],
        WAIT_TIMEOUT,
    )
    .with_delay(VERIFICATION_DELAY)
    .wait_for_state(|| status_publishing_destination(client, detector_id, destination_id))
    .await
    .map_err(|e| {
        ProviderError::from(e).context(format!(
            "waiting for GuardDuty Publishing Destination ({}) creation",
            destination_id
        ))
    })?;
    Ok(())
}

impl AwsProvider {
    pub(crate) async fn read_guardduty_publishing_destination(
        &self,
        id: &ResourceId,
        identifier: &str,
    ) -> ProviderResult<State> {
        let (detector_id, destination_id) = decode_publishing_destination_id(identifier)
            .map_err(|e| ProviderError::from(e).for_resource(id.clone()))?;
        let output = find_publishing_destination(&self.conns.guardduty, &detector_id, &destination_id)
            .await
            .map_err(|e| e.for_resource(id.clone()))?;
        let Some(output) = output else {
            log::warn!("GuardDuty Publishing Destination ({}) not found", identifier);
            return Ok(State::not_found(id.clone()));
        };

        let mut attrs = flatten_publishing_destination(&output);
        attrs.insert("detector_id".to_string(), Value::from(detector_id.as_str()));
        Ok(State::existing(id.clone(), attrs).with_identifier(identifier))
    }

    pub(crate) async fn create_guardduty_publishing_destination(
        &self,
        resource: Resource,
    ) -> ProviderResult<State> {
        let id = resource.id.clone();
        let attrs = &resource.attributes;
        let client = &self.conns.guardduty;
        let detector_id = require_str(attrs, "detector_id", &id)?;

        let output = client
            .create_publishing_destination()
            .detector_id(detector_id)
            .destination_type(DestinationType::from(
                get_str(attrs, "destination_type").unwrap_or("S3"),
            ))
            .destination_properties(destination_properties(attrs, &id)?)
            .client_token(idempotency_token())
            .send()
            .await
            .map_err(|e| {
                sdk_error(
                    format!("creating GuardDuty Publishing Destination for detector ({})", detector_id),
                    e,
                )
                .for_resource(id.clone())
            })?;
        let destination_id = output
            .destination_id()
            .ok_or_else(|| {
                ProviderError::new("CreatePublishingDestination returned no destination ID")
                    .for_resource(id.clone())
            })?
            .to_string();
        log::info!("Created GuardDuty Publishing Destination {}", destination_id);

        wait_publishing_destination_created(client, detector_id, &destination_id)
            .await
            .map_err(|e| e.for_resource(id.clone()))?;

        let identifier = create_resource_id(&[detector_id, destination_id.as_str()], ID_SEPARATOR);
        self.read_guardduty_publishing_destination(&id, &identifier).await
    }

    pub(crate) async fn update_guardduty_publishing_destination(
        &self,
        id: ResourceId,
        identifier: &str,
        to: Resource,
    ) -> ProviderResult<State> {
        let (detector_id, destination_id) = decode_publishing_destination_id(identifier)
            .map_err(|e| ProviderError::from(e).for_resource(id.clone()))?;

        self.conns
            .guardduty
            .update_publishing_destination()
            .detector_id(&detector_id)
            .destination_id(&destination_id)
            .destination_properties(destination_properties(&to.attributes, &id)?)
            .send()
            .await
            .map_err(|e| {
                sdk_error(
                    format!("updating GuardDuty Publishing Destination ({})", identifier),
                    e,
                )
                .for_resource(id.clone())
            })?;

        self.read_guardduty_publishing_destination(&id, identifier).await
    }

    pub(crate) async fn delete_guardduty_publishing_destination(
        &self,
        id: ResourceId,
        identifier: &str,
    ) -> ProviderResult<()> {
        let (detector_id, destination_id) = decode_publishing_destination_id(identifier)
            .map_err(|e| ProviderError::from(e).for_resource(id.clone()))?;
        log::info!("Deleting GuardDuty Publishing Destination {}", identifier);

        match self
            .conns
            .guardduty
            .delete_publishing_destination()
            .detector_id(detector_id)
            .destination_id(destination_id)
            .send()
            .await
        {
            Ok(_) => Ok(()),
            Err(e) if is_not_found(&e) => Ok(()),
            Err(e) => Err(sdk_error(
                format!("deleting GuardDuty Publishing Destination ({})", identifier),
                e,
            )
            .for_resource(id)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn destination_properties_are_required() {
        let id = ResourceId::new("guardduty.publishing_destination", "findings");
        let mut attrs = Attributes::new();
        attrs.insert(
            "destination_arn".to_string(),
            Value::from("arn:aws:s3:::findings-bucket"),
        );
        assert!(destination_properties(&attrs, &id).is_err());

        attrs.insert(
            "kms_key_arn".to_string(),
            Value::from("arn:aws:kms:eu-west-1:111111111111:key/abc"),
        );
        let properties = destination_properties(&attrs, &id).unwrap();
        assert_eq!(properties.destination_arn(), Some("arn:aws:s3:::findings-bucket"));
    }
}
