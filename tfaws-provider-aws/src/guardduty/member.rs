use aws_sdk_guardduty::Client;
use aws_sdk_guardduty::types::{AccountDetail, Member, UnprocessedAccount};
use tfaws_core::id::create_resource_id;
use tfaws_core::provider::{ProviderError, ProviderResult};
use tfaws_core::resource::{Resource, ResourceId, State, Value};
use tfaws_core::retry::retry_when_not_found;
use tfaws_core::waiter::{Refreshed, StateChangeConf};

use super::{ID_SEPARATOR, WAIT_TIMEOUT, decode_member_id};
use crate::AwsProvider;
use crate::errors::{is_not_found, sdk_error};
use crate::flex::{Attributes, get_bool, get_string, insert_opt, require_str};

/// Relationship statuses of a member that has been invited at some point
const INVITED_STATUSES: [&str; 4] = ["Disabled", "Enabled", "Invited", "EmailVerificationInProgress"];

/// Fail on the first account the API could not process
fn check_unprocessed(accounts: &[UnprocessedAccount], action: &str) -> ProviderResult<()> {
    match accounts.first() {
        Some(account) => Err(ProviderError::new(format!(
            "{} GuardDuty Member ({}) failed: {}",
            action,
            account.account_id().unwrap_or_default(),
            account.result().unwrap_or_default()
        ))),
        None => Ok(()),
    }
}

pub(crate) fn flatten_member(member: &Member) -> Attributes {
    let mut attrs = Attributes::new();
    insert_opt(&mut attrs, "account_id", member.account_id());
    insert_opt(&mut attrs, "detector_id", member.detector_id());
    insert_opt(&mut attrs, "email", member.email());
    let status = member.relationship_status().unwrap_or_default();
    attrs.insert("relationship_status".to_string(), Value::from(status));
    attrs.insert(
        "invite".to_string(),
        Value::Bool(INVITED_STATUSES.contains(&status)),
    );
    attrs
}

async fn find_member(
    client: &Client,
    detector_id: &str,
    account_id: &str,
) -> ProviderResult<Option<Member>> {
    match client
        .get_members()
        .detector_id(detector_id)
        .account_ids(account_id)
        .send()
        .await
    {
        Ok(output) => Ok(output.members().first().cloned()),
        Err(e) if is_not_found(&e) => Ok(None),
        Err(e) => Err(sdk_error(
            format!("reading GuardDuty Member ({}:{})", detector_id, account_id),
            e,
        )),
    }
}

async fn status_member_relationship(
    client: &Client,
    detector_id: &str,
    account_id: &str,
) -> ProviderResult<Refreshed<Member>> {
    Ok(find_member(client, detector_id, account_id).await?.map(|member| {
        let status = member.relationship_status().unwrap_or_default().to_string();
        (member, status)
    }))
}

async fn wait_member_invited(client: &Client, detector_id: &str, account_id: &str) -> ProviderResult<()> {
    StateChangeConf::new(
        &["Created", "EmailVerificationInProgress"],
        &["Invited"],
        WAIT_TIMEOUT,
    )
    .wait_for_state(|| status_member_relationship(client, detector_id, account_id))
    .await
    .map_err(|e| {
        ProviderError::from(e).context(format!(
            "waiting for GuardDuty Member ({}:{}) invitation",
            detector_id, account_id
        ))
    })?;
    Ok(())
}

impl AwsProvider {
    pub(crate) async fn read_guardduty_member(
        &self,
        id: &ResourceId,
        identifier: &str,
    ) -> ProviderResult<State> {
        let (detector_id, account_id) =
            decode_member_id(identifier).map_err(|e| ProviderError::from(e).for_resource(id.clone()))?;
        let member = find_member(&self.conns.guardduty, &detector_id, &account_id)
            .await
            .map_err(|e| e.for_resource(id.clone()))?;
        let Some(member) = member else {
            log::warn!("GuardDuty Member ({}) not found", identifier);
            return Ok(State::not_found(id.clone()));
        };

        let mut attrs = flatten_member(&member);
        attrs
            .entry("detector_id".to_string())
            .or_insert_with(|| Value::from(detector_id.as_str()));
        Ok(State::existing(id.clone(), attrs).with_identifier(identifier))
    }

    pub(crate) async fn create_guardduty_member(&self, resource: Resource) -> ProviderResult<State> {
        let id = resource.id.clone();
        let attrs = &resource.attributes;
        let client = &self.conns.guardduty;
        let detector_id = require_str(attrs, "detector_id", &id)?;
        let account_id = require_str(attrs, "account_id", &id)?;
        let email = require_str(attrs, "email", &id)?;

        let output = client
            .create_members()
            .detector_id(detector_id)
            .account_details(AccountDetail::builder().account_id(account_id).email(email).build())
            .send()
            .await
            .map_err(|e| {
                sdk_error(format!("creating GuardDuty Member ({})", account_id), e)
                    .for_resource(id.clone())
            })?;
        check_unprocessed(output.unprocessed_accounts(), "creating")
            .map_err(|e| e.for_resource(id.clone()))?;

        let identifier = create_resource_id(&[detector_id, account_id], ID_SEPARATOR);
        log::info!("Created GuardDuty Member {}", identifier);

        // GetMembers can miss a member for a short while after CreateMembers
        retry_when_not_found(WAIT_TIMEOUT, || find_member(client, detector_id, account_id))
            .await
            .map_err(|e| e.for_resource(id.clone()))?
            .ok_or_else(|| {
                ProviderError::new(format!("GuardDuty Member ({}) not found after creation", identifier))
                    .for_resource(id.clone())
            })?;

        if get_bool(attrs, "invite").unwrap_or(false) {
            self.invite_guardduty_member(&id, attrs, detector_id, account_id)
                .await?;
        }

        self.read_guardduty_member(&id, &identifier).await
    }

    async fn invite_guardduty_member(
        &self,
        id: &ResourceId,
        attrs: &Attributes,
        detector_id: &str,
        account_id: &str,
    ) -> ProviderResult<()> {
        let client = &self.conns.guardduty;
        let output = client
            .invite_members()
            .detector_id(detector_id)
            .account_ids(account_id)
            .disable_email_notification(get_bool(attrs, "disable_email_notification").unwrap_or(false))
            .set_message(get_string(attrs, "invitation_message"))
            .send()
            .await
            .map_err(|e| {
                sdk_error(format!("inviting GuardDuty Member ({})", account_id), e)
                    .for_resource(id.clone())
            })?;
        check_unprocessed(output.unprocessed_accounts(), "inviting")
            .map_err(|e| e.for_resource(id.clone()))?;

        wait_member_invited(client, detector_id, account_id)
            .await
            .map_err(|e| e.for_resource(id.clone()))
    }

    /// Only `invite` and its settings can change in place
    pub(crate) async fn update_guardduty_member(
        &self,
        id: ResourceId,
        identifier: &str,
        from: State,
        to: Resource,
    ) -> ProviderResult<State> {
        let attrs = &to.attributes;
        let (detector_id, account_id) =
            decode_member_id(identifier).map_err(|e| ProviderError::from(e).for_resource(id.clone()))?;

        let was_invited = get_bool(&from.attributes, "invite").unwrap_or(false);
        let invite = get_bool(attrs, "invite").unwrap_or(false);
        if invite && !was_invited {
            self.invite_guardduty_member(&id, attrs, &detector_id, &account_id)
                .await?;
        } else if !invite && was_invited {
            let output = self
                .conns
                .guardduty
                .disassociate_members()
                .detector_id(&detector_id)
                .account_ids(&account_id)
                .send()
                .await
                .map_err(|e| {
                    sdk_error(format!("disassociating GuardDuty Member ({})", identifier), e)
                        .for_resource(id.clone())
                })?;
            check_unprocessed(output.unprocessed_accounts(), "disassociating")
                .map_err(|e| e.for_resource(id.clone()))?;
        }

        self.read_guardduty_member(&id, identifier).await
    }

    pub(crate) async fn delete_guardduty_member(
        &self,
        id: ResourceId,
        identifier: &str,
    ) -> ProviderResult<()> {
        let (detector_id, account_id) =
            decode_member_id(identifier).map_err(|e| ProviderError::from(e).for_resource(id.clone()))?;
        log::info!("Deleting GuardDuty Member {}", identifier);

        let output = match self
            .conns
            .guardduty
            .delete_members()
            .detector_id(&detector_id)
            .account_ids(&account_id)
            .send()
            .await
        {
            Ok(output) => output,
            Err(e) if is_not_found(&e) => return Ok(()),
            Err(e) => {
                return Err(sdk_error(format!("deleting GuardDuty Member ({})", identifier), e)
                    .for_resource(id));
            }
        };
        check_unprocessed(output.unprocessed_accounts(), "deleting").map_err(|e| e.for_resource(id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invite_follows_relationship_status() {
        let member = Member::builder()
            .account_id("111111111111")
            .detector_id("d-1")
            .email("security@example.com")
            .relationship_status("Invited")
            .build();
        let attrs = flatten_member(&member);
        assert_eq!(attrs.get("invite"), Some(&Value::Bool(true)));
        assert_eq!(attrs.get("relationship_status"), Some(&Value::from("Invited")));

        let created = Member::builder().relationship_status("Created").build();
        assert_eq!(flatten_member(&created).get("invite"), Some(&Value::Bool(false)));
    }

    #[test]
    fn unprocessed_accounts_fail() {
        assert!(check_unprocessed(&[], "creating").is_ok());

        let account = UnprocessedAccount::builder()
            .account_id("111111111111")
            .result("The request is rejected because the account is already a member")
            .build();
        let err = check_unprocessed(&[account], "creating").unwrap_err();
        assert_eq!(
            err.to_string(),
            "creating GuardDuty Member (111111111111) failed: The request is rejected because the account is already a member"
        );
    }
}
