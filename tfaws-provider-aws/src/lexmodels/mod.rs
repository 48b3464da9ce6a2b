//! Lex Model Building (V1) resources
//!
//! Bots, intents and slot types are edited at `$LATEST` and can be
//! published as numbered versions. Every put that replaces an existing
//! object has to send that object's current checksum.

mod bot;
mod bot_alias;
mod flex;
mod intent;
mod slot_type;

use std::future::Future;
use std::time::Duration;

use aws_sdk_lexmodelbuilding::Client;
use tfaws_core::arn::Arn;
use tfaws_core::id::{IdError, create_resource_id, parse_resource_id};
use tfaws_core::provider::{ProviderError, ProviderResult};
use tfaws_core::resource::State;
use tfaws_core::retry::retry_when;
use tfaws_core::waiter::{Refreshed, StateChangeConf};

use crate::conns::AwsConns;
use crate::errors::{is_provider_aws_err, sdk_error};
use crate::flex::Attributes;

const SERVICE: &str = "lex";

/// Version that always points at the editable draft
pub const LATEST_VERSION: &str = "$LATEST";

pub(crate) const ALIAS_ID_SEPARATOR: &str = ":";

pub(crate) const CREATE_TIMEOUT: Duration = Duration::from_secs(60);
pub(crate) const UPDATE_TIMEOUT: Duration = Duration::from_secs(60);
pub(crate) const DELETE_TIMEOUT: Duration = Duration::from_secs(5 * 60);
const DELETE_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Status reported by deletion waits while the object is still readable
const EXISTS_STATUS: &str = "EXISTS";

/// Highest numbered version, `$LATEST` and other labels are ignored
pub fn latest_numeric_version<'a>(versions: impl IntoIterator<Item = &'a str>) -> Option<String> {
    versions
        .into_iter()
        .filter_map(|v| v.parse::<u64>().ok())
        .max()
        .map(|v| v.to_string())
}

/// Version reported in state: the newest published one, else `$LATEST`
pub(crate) fn state_version(latest: Option<String>) -> String {
    latest.unwrap_or_else(|| LATEST_VERSION.to_string())
}

/// Walk every page of a `Get*Versions` call, `page` returning the versions
/// on one page and the next token
async fn collect_versions<F, Fut>(mut page: F) -> ProviderResult<Vec<String>>
where
    F: FnMut(Option<String>) -> Fut,
    Fut: Future<Output = ProviderResult<(Vec<String>, Option<String>)>>,
{
    let mut versions = Vec::new();
    let mut next_token = None;
    loop {
        let (page_versions, next) = page(next_token).await?;
        versions.extend(page_versions);
        next_token = next;
        if next_token.is_none() {
            return Ok(versions);
        }
    }
}

pub(crate) async fn latest_bot_version(client: &Client, name: &str) -> ProviderResult<Option<String>> {
    let versions = collect_versions(|next_token| async move {
        let output = client
            .get_bot_versions()
            .name(name)
            .set_next_token(next_token)
            .send()
            .await
            .map_err(|e| sdk_error(format!("listing Lex Bot ({}) versions", name), e))?;
        Ok((
            output.bots().iter().filter_map(|b| b.version()).map(str::to_string).collect(),
            output.next_token().map(str::to_string),
        ))
    })
    .await?;
    Ok(latest_numeric_version(versions.iter().map(String::as_str)))
}

pub(crate) async fn latest_intent_version(client: &Client, name: &str) -> ProviderResult<Option<String>> {
    let versions = collect_versions(|next_token| async move {
        let output = client
            .get_intent_versions()
            .name(name)
            .set_next_token(next_token)
            .send()
            .await
            .map_err(|e| sdk_error(format!("listing Lex Intent ({}) versions", name), e))?;
        Ok((
            output.intents().iter().filter_map(|i| i.version()).map(str::to_string).collect(),
            output.next_token().map(str::to_string),
        ))
    })
    .await?;
    Ok(latest_numeric_version(versions.iter().map(String::as_str)))
}

pub(crate) async fn latest_slot_type_version(
    client: &Client,
    name: &str,
) -> ProviderResult<Option<String>> {
    let versions = collect_versions(|next_token| async move {
        let output = client
            .get_slot_type_versions()
            .name(name)
            .set_next_token(next_token)
            .send()
            .await
            .map_err(|e| sdk_error(format!("listing Lex Slot Type ({}) versions", name), e))?;
        Ok((
            output.slot_types().iter().filter_map(|s| s.version()).map(str::to_string).collect(),
            output.next_token().map(str::to_string),
        ))
    })
    .await?;
    Ok(latest_numeric_version(versions.iter().map(String::as_str)))
}

/// Repeat `op` while Lex reports a conflicting change in progress
pub(crate) async fn retry_on_conflict<T, F, Fut>(timeout: Duration, op: F) -> ProviderResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = ProviderResult<T>>,
{
    retry_when(timeout, op, |e| is_provider_aws_err(e, "ConflictException", "")).await
}

/// Wait until `refresh`, built on `exists`, stops finding the object
pub(crate) async fn wait_deleted<T, F, Fut>(what: &str, name: &str, refresh: F) -> ProviderResult<()>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = ProviderResult<Refreshed<T>>>,
{
    let gone: [&str; 0] = [];
    StateChangeConf::new(&[EXISTS_STATUS], &gone, DELETE_TIMEOUT)
        .with_poll_interval(DELETE_POLL_INTERVAL)
        .wait_for_state(refresh)
        .await
        .map_err(|e| ProviderError::from(e).context(format!("waiting for Lex {} ({}) deletion", what, name)))?;
    Ok(())
}

/// Refresh result for objects without a status of their own
pub(crate) fn exists<T>(object: Option<T>) -> Refreshed<T> {
    object.map(|o| (o, EXISTS_STATUS.to_string()))
}

/// Lex never returns write-only attributes, state keeps the values sent
pub(crate) fn keep_write_only(state: &mut State, desired: &Attributes, names: &[&str]) {
    for name in names {
        if let Some(value) = desired.get(*name) {
            state.attributes.insert(name.to_string(), value.clone());
        }
    }
}

pub(crate) fn lex_arn(conns: &AwsConns, resource: String) -> String {
    Arn {
        partition: conns.partition.clone(),
        service: SERVICE.to_string(),
        region: conns.region.clone(),
        account_id: conns.account_id.clone(),
        resource,
    }
    .to_string()
}

pub fn bot_alias_create_id(bot_name: &str, alias_name: &str) -> String {
    create_resource_id(&[bot_name, alias_name], ALIAS_ID_SEPARATOR)
}

/// `(bot name, alias name)`
pub fn bot_alias_parse_id(id: &str) -> Result<(String, String), IdError> {
    let parts = parse_resource_id(id, ALIAS_ID_SEPARATOR, 2)?;
    Ok((parts[0].to_string(), parts[1].to_string()))
}

/// Client that is never sent anything, for inspecting built requests
#[cfg(test)]
pub(crate) fn test_client() -> Client {
    use aws_sdk_lexmodelbuilding::config::{BehaviorVersion, Region};

    let config = aws_sdk_lexmodelbuilding::Config::builder()
        .behavior_version(BehaviorVersion::latest())
        .region(Region::new("us-east-1"))
        .build();
    Client::from_conf(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn latest_numeric_version_skips_latest() {
        assert_eq!(
            latest_numeric_version(["$LATEST", "1", "10", "2"]),
            Some("10".to_string())
        );
        assert_eq!(latest_numeric_version(["$LATEST"]), None);
        assert_eq!(latest_numeric_version([]), None);
    }

    #[test]
    fn unpublished_objects_report_latest() {
        assert_eq!(state_version(None), "$LATEST");
        assert_eq!(state_version(Some("3".to_string())), "3");
    }

    #[test]
    fn bot_alias_ids() {
        let id = bot_alias_create_id("OrderFlowers", "prod");
        assert_eq!(id, "OrderFlowers:prod");
        assert_eq!(
            bot_alias_parse_id(&id).unwrap(),
            ("OrderFlowers".to_string(), "prod".to_string())
        );
        assert!(bot_alias_parse_id("OrderFlowers").is_err());
        assert!(bot_alias_parse_id(":prod").is_err());
    }

    #[test]
    fn write_only_values_are_kept() {
        let mut state = State::existing(
            tfaws_core::resource::ResourceId::new("lex.intent", "book"),
            Attributes::new(),
        );
        let mut desired = Attributes::new();
        desired.insert("create_version".to_string(), tfaws_core::resource::Value::Bool(true));
        desired.insert("description".to_string(), tfaws_core::resource::Value::from("x"));
        keep_write_only(&mut state, &desired, &["create_version", "process_behavior"]);
        assert_eq!(
            state.attributes.get("create_version"),
            Some(&tfaws_core::resource::Value::Bool(true))
        );
        assert!(!state.attributes.contains_key("description"));
        assert!(!state.attributes.contains_key("process_behavior"));
    }

    #[test]
    fn refreshed_existence() {
        assert_eq!(exists(Some(1)), Some((1, "EXISTS".to_string())));
        assert_eq!(exists::<i32>(None), None);
    }

    #[tokio::test]
    async fn versions_are_collected_across_pages() {
        let mut calls = 0;
        let versions = collect_versions(|token| {
            calls += 1;
            async move {
                match token.as_deref() {
                    None => Ok((vec!["$LATEST".to_string(), "1".to_string()], Some("p2".to_string()))),
                    Some("p2") => Ok((vec!["2".to_string()], None)),
                    Some(other) => Err(ProviderError::new(format!("unexpected token {}", other))),
                }
            }
        })
        .await
        .unwrap();
        assert_eq!(calls, 2);
        assert_eq!(versions, ["$LATEST", "1", "2"]);
    }
}
