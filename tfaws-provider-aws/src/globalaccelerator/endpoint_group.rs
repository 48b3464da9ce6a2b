use aws_sdk_globalaccelerator::Client;
use aws_sdk_globalaccelerator::operation::update_endpoint_group::builders::UpdateEndpointGroupFluentBuilder;
use aws_sdk_globalaccelerator::types::{
    EndpointConfiguration, EndpointDescription, EndpointGroup, HealthCheckProtocol, PortOverride,
};
use tfaws_core::provider::{ProviderError, ProviderResult};
use tfaws_core::resource::{Resource, ResourceId, State, Value};

use super::{
    ACCELERATOR_TIMEOUT, endpoint_group_arn_to_listener_arn,
    listener_or_endpoint_group_arn_to_accelerator_arn, lock_accelerator, wait_accelerator_deployed,
};
use crate::AwsProvider;
use crate::errors::{is_aws_err_code, is_not_found_error, sdk_error};
use crate::flex::{
    Attributes, blocks, get_blocks, get_bool, get_float, get_i32, get_string, idempotency_token,
    insert_opt, require_str,
};

pub(crate) fn expand_endpoint_configurations(items: &[&Attributes]) -> Vec<EndpointConfiguration> {
    items
        .iter()
        .map(|item| {
            EndpointConfiguration::builder()
                .set_endpoint_id(get_string(item, "endpoint_id"))
                .set_weight(get_i32(item, "weight"))
                .set_client_ip_preservation_enabled(get_bool(item, "client_ip_preservation_enabled"))
                .build()
        })
        .collect()
}

pub(crate) fn expand_port_overrides(items: &[&Attributes]) -> Vec<PortOverride> {
    items
        .iter()
        .map(|item| {
            PortOverride::builder()
                .set_endpoint_port(get_i32(item, "endpoint_port"))
                .set_listener_port(get_i32(item, "listener_port"))
                .build()
        })
        .collect()
}

/// Dial percentage as the API takes it, rejecting values outside 0 to 100
fn traffic_dial_percentage(attrs: &Attributes, id: &ResourceId) -> ProviderResult<Option<f32>> {
    match get_float(attrs, "traffic_dial_percentage") {
        Some(dial) if !(0.0..=100.0).contains(&dial) => Err(ProviderError::new(format!(
            "traffic_dial_percentage must be between 0 and 100, got: {}",
            dial
        ))
        .for_resource(id.clone())),
        dial => Ok(dial.map(|d| d as f32)),
    }
}

fn health_check_protocol(attrs: &Attributes) -> Option<HealthCheckProtocol> {
    get_string(attrs, "health_check_protocol").map(|p| HealthCheckProtocol::from(p.as_str()))
}

/// Removed blocks are sent as empty lists so the API clears them
fn update_endpoint_group_request(
    client: &Client,
    identifier: &str,
    attrs: &Attributes,
    id: &ResourceId,
) -> ProviderResult<UpdateEndpointGroupFluentBuilder> {
    Ok(client
        .update_endpoint_group()
        .endpoint_group_arn(identifier)
        .set_health_check_interval_seconds(get_i32(attrs, "health_check_interval_seconds"))
        .set_health_check_path(get_string(attrs, "health_check_path"))
        .set_health_check_port(get_i32(attrs, "health_check_port"))
        .set_health_check_protocol(health_check_protocol(attrs))
        .set_threshold_count(get_i32(attrs, "threshold_count"))
        .set_traffic_dial_percentage(traffic_dial_percentage(attrs, id)?)
        .set_endpoint_configurations(Some(expand_endpoint_configurations(&get_blocks(
            attrs,
            "endpoint_configuration",
        ))))
        .set_port_overrides(Some(expand_port_overrides(&get_blocks(attrs, "port_override")))))
}

fn flatten_endpoint_descriptions(endpoints: &[EndpointDescription]) -> Value {
    blocks(endpoints.iter().map(|e| {
        let mut item = Attributes::new();
        insert_opt(&mut item, "endpoint_id", e.endpoint_id());
        insert_opt(&mut item, "weight", e.weight());
        insert_opt(
            &mut item,
            "client_ip_preservation_enabled",
            e.client_ip_preservation_enabled(),
        );
        item
    }))
}

pub(crate) fn flatten_endpoint_group(group: &EndpointGroup) -> Attributes {
    let mut attrs = Attributes::new();
    insert_opt(&mut attrs, "arn", group.endpoint_group_arn());
    insert_opt(&mut attrs, "endpoint_group_region", group.endpoint_group_region());
    insert_opt(
        &mut attrs,
        "health_check_interval_seconds",
        group.health_check_interval_seconds(),
    );
    insert_opt(
        &mut attrs,
        "health_check_path",
        group.health_check_path().filter(|p| !p.is_empty()),
    );
    insert_opt(&mut attrs, "health_check_port", group.health_check_port());
    insert_opt(
        &mut attrs,
        "health_check_protocol",
        group.health_check_protocol().map(|p| p.as_str()),
    );
    insert_opt(&mut attrs, "threshold_count", group.threshold_count());
    insert_opt(
        &mut attrs,
        "traffic_dial_percentage",
        group.traffic_dial_percentage().map(f64::from),
    );
    attrs.insert(
        "endpoint_configuration".to_string(),
        flatten_endpoint_descriptions(group.endpoint_descriptions()),
    );
    attrs.insert(
        "port_override".to_string(),
        blocks(group.port_overrides().iter().map(|o| {
            let mut item = Attributes::new();
            insert_opt(&mut item, "endpoint_port", o.endpoint_port());
            insert_opt(&mut item, "listener_port", o.listener_port());
            item
        })),
    );
    attrs
}

impl AwsProvider {
    pub(crate) async fn read_globalaccelerator_endpoint_group(
        &self,
        id: &ResourceId,
        identifier: &str,
    ) -> ProviderResult<State> {
        let result = self
            .conns
            .globalaccelerator
            .describe_endpoint_group()
            .endpoint_group_arn(identifier)
            .send()
            .await;
        let group = match result {
            Ok(output) => output.endpoint_group().cloned(),
            Err(e) if is_aws_err_code(&e, "EndpointGroupNotFoundException") => None,
            Err(e) => {
                return Err(sdk_error(
                    format!("reading Global Accelerator Endpoint Group ({})", identifier),
                    e,
                )
                .for_resource(id.clone()));
            }
        };
        let Some(group) = group else {
            log::warn!("Global Accelerator Endpoint Group ({}) not found", identifier);
            return Ok(State::not_found(id.clone()));
        };

        let listener_arn = endpoint_group_arn_to_listener_arn(identifier)
            .map_err(|e| ProviderError::from(e).for_resource(id.clone()))?;
        let mut attrs = flatten_endpoint_group(&group);
        attrs.insert("listener_arn".to_string(), Value::from(listener_arn));
        Ok(State::existing(id.clone(), attrs).with_identifier(identifier))
    }

    pub(crate) async fn create_globalaccelerator_endpoint_group(
        &self,
        resource: Resource,
    ) -> ProviderResult<State> {
        let id = resource.id.clone();
        let attrs = &resource.attributes;
        let client = &self.conns.globalaccelerator;
        let listener_arn = require_str(attrs, "listener_arn", &id)?;
        let region =
            get_string(attrs, "endpoint_group_region").unwrap_or_else(|| self.conns.region.clone());

        let guard = lock_accelerator(listener_arn)
            .await
            .map_err(|e| e.for_resource(id.clone()))?;
        let mut request = client
            .create_endpoint_group()
            .listener_arn(listener_arn)
            .endpoint_group_region(&region)
            .idempotency_token(idempotency_token())
            .set_health_check_interval_seconds(get_i32(attrs, "health_check_interval_seconds"))
            .set_health_check_path(get_string(attrs, "health_check_path"))
            .set_health_check_port(get_i32(attrs, "health_check_port"))
            .set_health_check_protocol(health_check_protocol(attrs))
            .set_threshold_count(get_i32(attrs, "threshold_count"))
            .set_traffic_dial_percentage(traffic_dial_percentage(attrs, &id)?);

        let endpoints = get_blocks(attrs, "endpoint_configuration");
        if !endpoints.is_empty() {
            request = request.set_endpoint_configurations(Some(expand_endpoint_configurations(&endpoints)));
        }
        let overrides = get_blocks(attrs, "port_override");
        if !overrides.is_empty() {
            request = request.set_port_overrides(Some(expand_port_overrides(&overrides)));
        }

        let output = request.send().await.map_err(|e| {
            sdk_error(
                format!("creating Global Accelerator Endpoint Group for ({})", listener_arn),
                e,
            )
            .for_resource(id.clone())
        })?;
        let arn = output
            .endpoint_group()
            .and_then(|g| g.endpoint_group_arn())
            .ok_or_else(|| {
                ProviderError::new("CreateEndpointGroup returned no endpoint group ARN")
                    .for_resource(id.clone())
            })?
            .to_string();
        log::info!("Created Global Accelerator Endpoint Group {}", arn);

        self.wait_endpoint_group_accelerator(&id, &arn).await?;
        drop(guard);
        self.read_globalaccelerator_endpoint_group(&id, &arn).await
    }

    pub(crate) async fn update_globalaccelerator_endpoint_group(
        &self,
        id: ResourceId,
        identifier: &str,
        to: Resource,
    ) -> ProviderResult<State> {
        let request =
            update_endpoint_group_request(&self.conns.globalaccelerator, identifier, &to.attributes, &id)?;
        let guard = lock_accelerator(identifier)
            .await
            .map_err(|e| e.for_resource(id.clone()))?;
        request
            .send()
            .await
            .map_err(|e| {
                sdk_error(
                    format!("updating Global Accelerator Endpoint Group ({})", identifier),
                    e,
                )
                .for_resource(id.clone())
            })?;

        self.wait_endpoint_group_accelerator(&id, identifier).await?;
        drop(guard);
        self.read_globalaccelerator_endpoint_group(&id, identifier).await
    }

    pub(crate) async fn delete_globalaccelerator_endpoint_group(
        &self,
        id: ResourceId,
        identifier: &str,
    ) -> ProviderResult<()> {
        log::info!("Deleting Global Accelerator Endpoint Group {}", identifier);
        let _guard = lock_accelerator(identifier)
            .await
            .map_err(|e| e.for_resource(id.clone()))?;
        if let Err(e) = self
            .conns
            .globalaccelerator
            .delete_endpoint_group()
            .endpoint_group_arn(identifier)
            .send()
            .await
        {
            let err = sdk_error(
                format!("deleting Global Accelerator Endpoint Group ({})", identifier),
                e,
            );
            if is_not_found_error(&err) {
                return Ok(());
            }
            return Err(err.for_resource(id));
        }

        self.wait_endpoint_group_accelerator(&id, identifier).await
    }

    async fn wait_endpoint_group_accelerator(&self, id: &ResourceId, arn: &str) -> ProviderResult<()> {
        let accelerator_arn = listener_or_endpoint_group_arn_to_accelerator_arn(arn)
            .map_err(|e| ProviderError::from(e).for_resource(id.clone()))?;
        wait_accelerator_deployed(&self.conns.globalaccelerator, &accelerator_arn, ACCELERATOR_TIMEOUT)
            .await
            .map_err(|e| e.for_resource(id.clone()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::globalaccelerator::test_client;

    #[test]
    fn expand_endpoint_configuration_blocks() {
        let mut item = Attributes::new();
        item.insert("endpoint_id".to_string(), Value::from("eipalloc-1"));
        item.insert("weight".to_string(), Value::Int(128));
        let configs = expand_endpoint_configurations(&[&item]);
        assert_eq!(configs.len(), 1);
        assert_eq!(configs[0].endpoint_id(), Some("eipalloc-1"));
        assert_eq!(configs[0].weight(), Some(128));
        assert_eq!(configs[0].client_ip_preservation_enabled(), None);

        assert!(expand_endpoint_configurations(&[]).is_empty());
    }

    #[test]
    fn flatten_endpoint_group_fields() {
        let group = EndpointGroup::builder()
            .endpoint_group_arn(
                "arn:aws:globalaccelerator::111111111111:accelerator/a-1/listener/l-1/endpoint-group/eg-1",
            )
            .endpoint_group_region("eu-west-1")
            .health_check_interval_seconds(10)
            .health_check_protocol(HealthCheckProtocol::Http)
            .health_check_path("/health")
            .threshold_count(3)
            .traffic_dial_percentage(50.0)
            .endpoint_descriptions(
                EndpointDescription::builder()
                    .endpoint_id("i-123")
                    .weight(100)
                    .client_ip_preservation_enabled(true)
                    .build(),
            )
            .port_overrides(PortOverride::builder().listener_port(80).endpoint_port(8080).build())
            .build();

        let attrs = flatten_endpoint_group(&group);
        assert_eq!(attrs.get("endpoint_group_region"), Some(&Value::from("eu-west-1")));
        assert_eq!(attrs.get("traffic_dial_percentage"), Some(&Value::Float(50.0)));
        assert_eq!(attrs.get("health_check_protocol"), Some(&Value::from("HTTP")));
        assert!(!attrs.contains_key("health_check_port"));

        let endpoint = attrs["endpoint_configuration"].as_list().unwrap()[0].as_map().unwrap();
        assert_eq!(endpoint.get("weight"), Some(&Value::Int(100)));
        let port = attrs["port_override"].as_list().unwrap()[0].as_map().unwrap();
        assert_eq!(port.get("endpoint_port"), Some(&Value::Int(8080)));
    }

    const ENDPOINT_GROUP: &str =
        "arn:aws:globalaccelerator::111111111111:accelerator/a-1/listener/l-1/endpoint-group/eg-1";

    #[test]
    fn update_clears_removed_blocks() {
        let id = ResourceId::new("globalaccelerator.endpoint_group", "web");
        let mut attrs = Attributes::new();
        attrs.insert("traffic_dial_percentage".to_string(), Value::Int(40));

        let request =
            update_endpoint_group_request(&test_client(), ENDPOINT_GROUP, &attrs, &id)
                .unwrap();
        assert_eq!(request.get_endpoint_group_arn().as_deref(), Some(ENDPOINT_GROUP));
        assert_eq!(request.get_endpoint_configurations(), &Some(vec![]));
        assert_eq!(request.get_port_overrides(), &Some(vec![]));
        assert_eq!(request.get_traffic_dial_percentage(), &Some(40.0));
        assert_eq!(request.get_health_check_port(), &None);
    }

    #[test]
    fn traffic_dial_outside_percentage_range_is_rejected() {
        let id = ResourceId::new("globalaccelerator.endpoint_group", "web");
        let mut attrs = Attributes::new();
        assert_eq!(traffic_dial_percentage(&attrs, &id).unwrap(), None);

        attrs.insert("traffic_dial_percentage".to_string(), Value::Float(0.0));
        assert_eq!(traffic_dial_percentage(&attrs, &id).unwrap(), Some(0.0));

        attrs.insert("traffic_dial_percentage".to_string(), Value::Float(100.5));
        let err = traffic_dial_percentage(&attrs, &id).unwrap_err();
        assert!(err.message.contains("between 0 and 100"));

        attrs.insert("traffic_dial_percentage".to_string(), Value::Int(-1));
        assert!(traffic_dial_percentage(&attrs, &id).is_err());
        assert!(
            update_endpoint_group_request(&test_client(), ENDPOINT_GROUP, &attrs, &id)
                .is_err()
        );
    }

    #[test]
    fn empty_health_check_path_is_dropped() {
        let group = EndpointGroup::builder().health_check_path("").build();
        assert!(!flatten_endpoint_group(&group).contains_key("health_check_path"));
    }
}
