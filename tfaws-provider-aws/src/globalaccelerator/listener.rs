use aws_sdk_globalaccelerator::types::{ClientAffinity, Listener, PortRange, Protocol};
use tfaws_core::mutex::global_mutex_kv;
use tfaws_core::provider::{ProviderError, ProviderResult};
use tfaws_core::resource::{Resource, ResourceId, State, Value};

use super::{
    ACCELERATOR_TIMEOUT, listener_or_endpoint_group_arn_to_accelerator_arn, lock_accelerator,
    wait_accelerator_deployed,
};
use crate::AwsProvider;
use crate::errors::{is_aws_err_code, is_not_found_error, sdk_error};
use crate::flex::{
    Attributes, blocks, get_blocks, get_i32, get_str, idempotency_token, insert_opt, require_str,
};

pub(crate) fn expand_port_ranges(items: &[&Attributes]) -> Vec<PortRange> {
    items
        .iter()
        .map(|item| {
            PortRange::builder()
                .set_from_port(get_i32(item, "from_port"))
                .set_to_port(get_i32(item, "to_port"))
                .build()
        })
        .collect()
}

/// Port ranges ordered by `from_port`, the API returns them in any order
pub(crate) fn flatten_port_ranges(ranges: &[PortRange]) -> Value {
    let mut ranges: Vec<&PortRange> = ranges.iter().collect();
    ranges.sort_by_key(|r| r.from_port());
    blocks(ranges.into_iter().map(|r| {
        let mut item = Attributes::new();
        insert_opt(&mut item, "from_port", r.from_port());
        insert_opt(&mut item, "to_port", r.to_port());
        item
    }))
}

pub(crate) fn flatten_listener(listener: &Listener) -> Attributes {
    let mut attrs = Attributes::new();
    insert_opt(&mut attrs, "protocol", listener.protocol().map(|p| p.as_str()));
    insert_opt(
        &mut attrs,
        "client_affinity",
        listener.client_affinity().map(|c| c.as_str()),
    );
    attrs.insert("port_range".to_string(), flatten_port_ranges(listener.port_ranges()));
    attrs
}

impl AwsProvider {
    pub(crate) async fn read_globalaccelerator_listener(
        &self,
        id: &ResourceId,
        identifier: &str,
    ) -> ProviderResult<State> {
        let result = self
            .conns
            .globalaccelerator
            .describe_listener()
            .listener_arn(identifier)
            .send()
            .await;
        let listener = match result {
            Ok(output) => output.listener().cloned(),
            Err(e) if is_aws_err_code(&e, "ListenerNotFoundException") => None,
            Err(e) => {
                return Err(sdk_error(
                    format!("reading Global Accelerator Listener ({})", identifier),
                    e,
                )
                .for_resource(id.clone()));
            }
        };
        let Some(listener) = listener else {
            log::warn!("Global Accelerator Listener ({}) not found", identifier);
            return Ok(State::not_found(id.clone()));
        };

        let accelerator_arn = listener_or_endpoint_group_arn_to_accelerator_arn(identifier)
            .map_err(|e| ProviderError::from(e).for_resource(id.clone()))?;
        let mut attrs = flatten_listener(&listener);
        attrs.insert("accelerator_arn".to_string(), Value::from(accelerator_arn));
        Ok(State::existing(id.clone(), attrs).with_identifier(identifier))
    }

    pub(crate) async fn create_globalaccelerator_listener(
        &self,
        resource: Resource,
    ) -> ProviderResult<State> {
        let id = resource.id.clone();
        let attrs = &resource.attributes;
        let client = &self.conns.globalaccelerator;
        let accelerator_arn = require_str(attrs, "accelerator_arn", &id)?;
        let protocol = require_str(attrs, "protocol", &id)?;

        let guard = global_mutex_kv().lock(accelerator_arn).await;
        let output = client
            .create_listener()
            .accelerator_arn(accelerator_arn)
            .protocol(Protocol::from(protocol))
            .client_affinity(ClientAffinity::from(
                get_str(attrs, "client_affinity").unwrap_or("NONE"),
            ))
            .set_port_ranges(Some(expand_port_ranges(&get_blocks(attrs, "port_range"))))
            .idempotency_token(idempotency_token())
            .send()
            .await
            .map_err(|e| {
                sdk_error(
                    format!("creating Global Accelerator Listener for ({})", accelerator_arn),
                    e,
                )
                .for_resource(id.clone())
            })?;

        let arn = output
            .listener()
            .and_then(|l| l.listener_arn())
            .ok_or_else(|| {
                ProviderError::new("CreateListener returned no listener ARN").for_resource(id.clone())
            })?
            .to_string();
        log::info!("Created Global Accelerator Listener {}", arn);

        wait_accelerator_deployed(client, accelerator_arn, ACCELERATOR_TIMEOUT)
            .await
            .map_err(|e| e.for_resource(id.clone()))?;
        drop(guard);

        self.read_globalaccelerator_listener(&id, &arn).await
    }

    pub(crate) async fn update_globalaccelerator_listener(
        &self,
        id: ResourceId,
        identifier: &str,
        to: Resource,
    ) -> ProviderResult<State> {
        let attrs = &to.attributes;
        let client = &self.conns.globalaccelerator;
        let protocol = require_str(attrs, "protocol", &id)?;

        let guard = lock_accelerator(identifier)
            .await
            .map_err(|e| e.for_resource(id.clone()))?;
        client
            .update_listener()
            .listener_arn(identifier)
            .protocol(Protocol::from(protocol))
            .client_affinity(ClientAffinity::from(
                get_str(attrs, "client_affinity").unwrap_or("NONE"),
            ))
            .set_port_ranges(Some(expand_port_ranges(&get_blocks(attrs, "port_range"))))
            .send()
            .await
            .map_err(|e| {
                sdk_error(format!("updating Global Accelerator Listener ({})", identifier), e)
                    .for_resource(id.clone())
            })?;

        self.wait_listener_accelerator(&id, identifier).await?;
        drop(guard);
        self.read_globalaccelerator_listener(&id, identifier).await
    }

    pub(crate) async fn delete_globalaccelerator_listener(
        &self,
        id: ResourceId,
        identifier: &str,
    ) -> ProviderResult<()> {
        log::info!("Deleting Global Accelerator Listener {}", identifier);
        let _guard = lock_accelerator(identifier)
            .await
            .map_err(|e| e.for_resource(id.clone()))?;
        if let Err(e) = self
            .conns
            .globalaccelerator
            .delete_listener()
            .listener_arn(identifier)
            .send()
            .await
        {
            let err = sdk_error(
                format!("deleting Global Accelerator Listener ({})", identifier),
                e,
            );
            if is_not_found_error(&err) {
                return Ok(());
            }
            return Err(err.for_resource(id));
        }

        self.wait_listener_accelerator(&id, identifier).await
    }

    async fn wait_listener_accelerator(&self, id: &ResourceId, arn: &str) -> ProviderResult<()> {
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

    fn range(from: i32, to: i32) -> PortRange {
        PortRange::builder().from_port(from).to_port(to).build()
    }

    #[test]
    fn port_ranges_are_sorted() {
        let value = flatten_port_ranges(&[range(443, 443), range(80, 81)]);
        let items = value.as_list().unwrap();
        let first = items[0].as_map().unwrap();
        assert_eq!(first.get("from_port"), Some(&Value::Int(80)));
        assert_eq!(first.get("to_port"), Some(&Value::Int(81)));
        let second = items[1].as_map().unwrap();
        assert_eq!(second.get("from_port"), Some(&Value::Int(443)));
    }

    #[test]
    fn expand_port_ranges_from_blocks() {
        let mut item = Attributes::new();
        item.insert("from_port".to_string(), Value::Int(8080));
        item.insert("to_port".to_string(), Value::Int(8090));
        let ranges = expand_port_ranges(&[&item]);
        assert_eq!(ranges, vec![range(8080, 8090)]);
    }

    #[test]
    fn flatten_listener_fields() {
        let listener = Listener::builder()
            .listener_arn("arn:aws:globalaccelerator::111111111111:accelerator/a-1/listener/l-1")
            .protocol(Protocol::Udp)
            .client_affinity(ClientAffinity::SourceIp)
            .port_ranges(range(53, 53))
            .build();
        let attrs = flatten_listener(&listener);
        assert_eq!(attrs.get("protocol"), Some(&Value::from("UDP")));
        assert_eq!(attrs.get("client_affinity"), Some(&Value::from("SOURCE_IP")));
        assert_eq!(attrs.get("port_range").and_then(Value::as_list).map(<[Value]>::len), Some(1));
    }
}
