use aws_sdk_globalaccelerator::types::{Accelerator, AcceleratorAttributes, IpAddressType};
use tfaws_core::provider::{ProviderError, ProviderResult};
use tfaws_core::resource::{Resource, ResourceId, State, Value};
use tfaws_core::tags::KeyValueTags;

use super::{
    ACCELERATOR_TIMEOUT, HOSTED_ZONE_ID, find_accelerator_by_arn, list_tags, tags_to_sdk,
    update_tags, wait_accelerator_deployed,
};
use crate::AwsProvider;
use crate::errors::{is_not_found_error, sdk_error};
use crate::flex::{
    Attributes, block, blocks, get_block, get_bool, get_str, get_string, get_string_list,
    idempotency_token, insert_opt, require_str, string_list,
};
use crate::schemas::globalaccelerator::accelerator_schema;

/// State attributes of an accelerator, without flow log attributes and tags
pub(crate) fn flatten_accelerator(accelerator: &Accelerator) -> Attributes {
    let mut attrs = Attributes::new();
    insert_opt(&mut attrs, "name", accelerator.name());
    insert_opt(
        &mut attrs,
        "ip_address_type",
        accelerator.ip_address_type().map(|t| t.as_str()),
    );
    insert_opt(&mut attrs, "enabled", accelerator.enabled());
    insert_opt(&mut attrs, "dns_name", accelerator.dns_name());
    insert_opt(&mut attrs, "dual_stack_dns_name", accelerator.dual_stack_dns_name());
    attrs.insert("hosted_zone_id".to_string(), Value::from(HOSTED_ZONE_ID));

    let ip_sets = accelerator.ip_sets().iter().map(|set| {
        let mut item = Attributes::new();
        insert_opt(&mut item, "ip_family", set.ip_family());
        item.insert("ip_addresses".to_string(), string_list(set.ip_addresses()));
        item
    });
    attrs.insert("ip_sets".to_string(), blocks(ip_sets));

    let ipv4: Vec<&String> = accelerator
        .ip_sets()
        .iter()
        .filter(|set| set.ip_family().is_none_or(|f| f.eq_ignore_ascii_case("ipv4")))
        .flat_map(|set| set.ip_addresses())
        .collect();
    attrs.insert("ip_addresses".to_string(), string_list(ipv4.into_iter().cloned()));
    attrs
}

pub(crate) fn flatten_accelerator_attributes(attributes: &AcceleratorAttributes) -> Value {
    let mut attrs = Attributes::new();
    attrs.insert(
        "flow_logs_enabled".to_string(),
        Value::Bool(attributes.flow_logs_enabled().unwrap_or(false)),
    );
    insert_opt(&mut attrs, "flow_logs_s3_bucket", attributes.flow_logs_s3_bucket());
    insert_opt(&mut attrs, "flow_logs_s3_prefix", attributes.flow_logs_s3_prefix());
    block(attrs)
}

/// Whether an accelerator matches the `arn` and `name` a data source asks for
pub(crate) fn accelerator_lookup_matches(
    accelerator: &Accelerator,
    arn: Option<&str>,
    name: Option<&str>,
) -> bool {
    arn.is_none_or(|arn| accelerator.accelerator_arn() == Some(arn))
        && name.is_none_or(|name| accelerator.name() == Some(name))
}

impl AwsProvider {
    pub(crate) async fn read_globalaccelerator_accelerator(
        &self,
        id: &ResourceId,
        identifier: &str,
    ) -> ProviderResult<State> {
        let client = &self.conns.globalaccelerator;
        let Some(accelerator) = find_accelerator_by_arn(client, identifier)
            .await
            .map_err(|e| e.for_resource(id.clone()))?
        else {
            log::warn!("Global Accelerator Accelerator ({}) not found", identifier);
            return Ok(State::not_found(id.clone()));
        };

        let mut attrs = self
            .accelerator_state(&accelerator, identifier)
            .await
            .map_err(|e| e.for_resource(id.clone()))?;
        attrs.remove("arn");
        Ok(State::existing(id.clone(), attrs).with_identifier(identifier))
    }

    /// Full state attributes of an accelerator, including its ARN
    async fn accelerator_state(
        &self,
        accelerator: &Accelerator,
        arn: &str,
    ) -> ProviderResult<Attributes> {
        let client = &self.conns.globalaccelerator;
        let mut attrs = flatten_accelerator(accelerator);
        attrs.insert("arn".to_string(), Value::from(arn));

        let output = client
            .describe_accelerator_attributes()
            .accelerator_arn(arn)
            .send()
            .await
            .map_err(|e| {
                sdk_error(
                    format!("reading Global Accelerator Accelerator ({}) attributes", arn),
                    e,
                )
            })?;
        if let Some(attributes) = output.accelerator_attributes() {
            attrs.insert("attributes".to_string(), flatten_accelerator_attributes(attributes));
        }

        let tags = list_tags(client, arn).await?;
        self.conns.set_tag_attributes(&mut attrs, tags);
        Ok(attrs)
    }

    pub(crate) async fn create_globalaccelerator_accelerator(
        &self,
        resource: Resource,
    ) -> ProviderResult<State> {
        let id = resource.id.clone();
        let attrs = &resource.attributes;
        let client = &self.conns.globalaccelerator;
        let name = require_str(attrs, "name", &id)?;

        let ip_addresses = get_string_list(attrs, "ip_addresses");
        let tags = self.conns.desired_tags(attrs);
        let output = client
            .create_accelerator()
            .name(name)
            .ip_address_type(IpAddressType::from(
                get_str(attrs, "ip_address_type").unwrap_or("IPV4"),
            ))
            .enabled(get_bool(attrs, "enabled").unwrap_or(true))
            .idempotency_token(idempotency_token())
            .set_ip_addresses((!ip_addresses.is_empty()).then_some(ip_addresses))
            .set_tags((!tags.is_empty()).then(|| tags_to_sdk(&tags)).transpose()?)
            .send()
            .await
            .map_err(|e| {
                sdk_error(format!("creating Global Accelerator Accelerator ({})", name), e)
                    .for_resource(id.clone())
            })?;

        let arn = output
            .accelerator()
            .and_then(|a| a.accelerator_arn())
            .ok_or_else(|| {
                ProviderError::new("CreateAccelerator returned no accelerator ARN")
                    .for_resource(id.clone())
            })?
            .to_string();
        log::info!("Created Global Accelerator Accelerator {}", arn);

        wait_accelerator_deployed(client, &arn, ACCELERATOR_TIMEOUT)
            .await
            .map_err(|e| e.for_resource(id.clone()))?;

        if let Some(attributes) = get_block(attrs, "attributes") {
            self.update_accelerator_attributes(&arn, attributes)
                .await
                .map_err(|e| e.for_resource(id.clone()))?;
        }

        self.read_globalaccelerator_accelerator(&id, &arn).await
    }

    async fn update_accelerator_attributes(
        &self,
        arn: &str,
        attributes: &Attributes,
    ) -> ProviderResult<()> {
        let client = &self.conns.globalaccelerator;
        let enabled = get_bool(attributes, "flow_logs_enabled").unwrap_or(false);
        let mut request = client
            .update_accelerator_attributes()
            .accelerator_arn(arn)
            .flow_logs_enabled(enabled);
        if enabled {
            request = request
                .set_flow_logs_s3_bucket(get_string(attributes, "flow_logs_s3_bucket"))
                .set_flow_logs_s3_prefix(get_string(attributes, "flow_logs_s3_prefix"));
        }
        request.send().await.map_err(|e| {
            sdk_error(
                format!("updating Global Accelerator Accelerator ({}) attributes", arn),
                e,
            )
        })?;

        wait_accelerator_deployed(client, arn, ACCELERATOR_TIMEOUT).await?;
        Ok(())
    }

    pub(crate) async fn update_globalaccelerator_accelerator(
        &self,
        id: ResourceId,
        identifier: &str,
        from: State,
        to: Resource,
    ) -> ProviderResult<State> {
        let client = &self.conns.globalaccelerator;
        let attrs = &to.attributes;
        let changed = accelerator_schema().changed_attributes(&from.attributes, attrs);
        let has_change = |names: &[&str]| changed.iter().any(|c| names.contains(&c.as_str()));

        if has_change(&["name", "ip_address_type", "enabled"]) {
            client
                .update_accelerator()
                .accelerator_arn(identifier)
                .set_name(get_string(attrs, "name"))
                .ip_address_type(IpAddressType::from(
                    get_str(attrs, "ip_address_type").unwrap_or("IPV4"),
                ))
                .enabled(get_bool(attrs, "enabled").unwrap_or(true))
                .send()
                .await
                .map_err(|e| {
                    sdk_error(
                        format!("updating Global Accelerator Accelerator ({})", identifier),
                        e,
                    )
                    .for_resource(id.clone())
                })?;

            wait_accelerator_deployed(client, identifier, ACCELERATOR_TIMEOUT)
                .await
                .map_err(|e| e.for_resource(id.clone()))?;
        }

        if has_change(&["attributes"])
            && let Some(attributes) = get_block(attrs, "attributes")
        {
            self.update_accelerator_attributes(identifier, attributes)
                .await
                .map_err(|e| e.for_resource(id.clone()))?;
        }

        let old_tags = KeyValueTags::from_value(from.attributes.get("tags_all"));
        let new_tags = self.conns.desired_tags(attrs);
        update_tags(client, identifier, &old_tags, &new_tags)
            .await
            .map_err(|e| e.for_resource(id.clone()))?;

        self.read_globalaccelerator_accelerator(&id, identifier).await
    }

    /// Accelerators must be disabled before they can be deleted
    pub(crate) async fn delete_globalaccelerator_accelerator(
        &self,
        id: ResourceId,
        identifier: &str,
    ) -> ProviderResult<()> {
        let client = &self.conns.globalaccelerator;
        let Some(accelerator) = find_accelerator_by_arn(client, identifier)
            .await
            .map_err(|e| e.for_resource(id.clone()))?
        else {
            return Ok(());
        };

        if accelerator.enabled().unwrap_or(false) {
            client
                .update_accelerator()
                .accelerator_arn(identifier)
                .enabled(false)
                .send()
                .await
                .map_err(|e| {
                    sdk_error(
                        format!("disabling Global Accelerator Accelerator ({})", identifier),
                        e,
                    )
                    .for_resource(id.clone())
                })?;

            wait_accelerator_deployed(client, identifier, ACCELERATOR_TIMEOUT)
                .await
                .map_err(|e| e.for_resource(id.clone()))?;
        }

        log::info!("Deleting Global Accelerator Accelerator {}", identifier);
        if let Err(e) = client
            .delete_accelerator()
            .accelerator_arn(identifier)
            .send()
            .await
        {
            let err = sdk_error(
                format!("deleting Global Accelerator Accelerator ({})", identifier),
                e,
            );
            if !is_not_found_error(&err) {
                return Err(err.for_resource(id));
            }
        }
        Ok(())
    }

    /// Find one accelerator by `arn` and/or `name`
    pub(crate) async fn read_globalaccelerator_accelerator_data(
        &self,
        resource: Resource,
    ) -> ProviderResult<State> {
        let id = resource.id.clone();
        let attrs = &resource.attributes;
        let arn = get_str(attrs, "arn");
        let name = get_str(attrs, "name");
        let client = &self.conns.globalaccelerator;

        let mut matches = Vec::new();
        let mut next_token = None;
        loop {
            let output = client
                .list_accelerators()
                .set_next_token(next_token)
                .send()
                .await
                .map_err(|e| {
                    sdk_error("listing Global Accelerator Accelerators", e).for_resource(id.clone())
                })?;
            matches.extend(
                output
                    .accelerators()
                    .iter()
                    .filter(|a| accelerator_lookup_matches(a, arn, name))
                    .cloned(),
            );
            next_token = output.next_token().map(str::to_string);
            if next_token.is_none() {
                break;
            }
        }

        let accelerator = match matches.as_slice() {
            [one] => one,
            [] => {
                return Err(ProviderError::new("no matching Global Accelerator Accelerator found")
                    .for_resource(id));
            }
            _ => {
                return Err(ProviderError::new(format!(
                    "{} Global Accelerator Accelerators matched; use additional constraints to reduce matches to a single Global Accelerator Accelerator",
                    matches.len()
                ))
                .for_resource(id));
            }
        };

        let accelerator_arn = accelerator.accelerator_arn().unwrap_or_default().to_string();
        let attrs = self
            .accelerator_state(accelerator, &accelerator_arn)
            .await
            .map_err(|e| e.for_resource(id.clone()))?;
        Ok(State::existing(id, attrs).with_identifier(accelerator_arn))
    }
}
