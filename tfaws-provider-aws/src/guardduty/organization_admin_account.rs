use aws_sdk_guardduty::Client;
use aws_sdk_guardduty::types::{AdminAccount, AdminStatus};
use tfaws_core::provider::{ProviderError, ProviderResult};
use tfaws_core::resource::{Resource, ResourceId, State, Value};
use tfaws_core::waiter::{Refreshed, StateChangeConf};

use super::WAIT_TIMEOUT;
use crate::AwsProvider;
use crate::errors::{is_not_found, sdk_error};
use crate::flex::{Attributes, require_str};

/// The delegated admin with `admin_account_id`, walking every page
async fn find_admin_account(client: &Client, admin_account_id: &str) -> ProviderResult<Option<AdminAccount>> {
    let mut next_token = None;
    loop {
        let output = client
            .list_organization_admin_accounts()
            .set_next_token(next_token)
            .send()
            .await
            .map_err(|e| sdk_error("listing GuardDuty Organization Admin Accounts", e))?;
        if let Some(account) = output
            .admin_accounts()
            .iter()
            .find(|a| a.admin_account_id() == Some(admin_account_id))
        {
            return Ok(Some(account.clone()));
        }
        next_token = output.next_token().map(str::to_string);
        if next_token.is_none() {
            return Ok(None);
        }
    }
}

async fn status_admin_account(client: &Client, admin_account_id: &str) -> ProviderResult<Refreshed<AdminAccount>> {
    Ok(find_admin_account(client, admin_account_id).await?.map(|account| {
        let status = account
            .admin_status()
            .map(|s| s.as_str().to_string())
            .unwrap_or_default();
        (account, status)
    }))
}

async fn wait_admin_account_enabled(client: &Client, admin_account_id: &str) -> ProviderResult<()> {
    let pending: [&str; 0] = [];
    // Organizations reports ENABLED before every endpoint agrees
    StateChangeConf::new(&pending, &[AdminStatus::Enabled.as_str()], WAIT_TIMEOUT)
        .with_continuous_target_occurence(2)
        .wait_for_state(|| status_admin_account(client, admin_account_id))
        .await
        .map_err(|e| {
            ProviderError::from(e).context(format!(
                "waiting for GuardDuty Organization Admin Account ({}) to enable",
                admin_account_id
            ))
        })?;
    Ok(())
}

async fn wait_admin_account_not_found(client: &Client, admin_account_id: &str) -> ProviderResult<()> {
    let gone: [&str; 0] = [];
    StateChangeConf::new(
        &[AdminStatus::Enabled.as_str(), AdminStatus::DisableInProgress.as_str()],
        &gone,
        WAIT_TIMEOUT,
    )
    .wait_for_state(|| status_admin_account(client, admin_account_id))
    .await
    .map_err(|e| {
        ProviderError::from(e).context(format!(
            "waiting for GuardDuty Organization Admin Account ({}) to disable",
            admin_account_id
        ))
    })?;
    Ok(())
}

impl AwsProvider {
    pub(crate) async fn read_guardduty_organization_admin_account(
        &self,
        id: &ResourceId,
        identifier: &str,
    ) -> ProviderResult<State> {
        let account = find_admin_account(&self.conns.guardduty, identifier)
            .await
            .map_err(|e| e.for_resource(id.clone()))?;
        if account.is_none() {
            log::warn!("GuardDuty Organization Admin Account ({}) not found", identifier);
            return Ok(State::not_found(id.clone()));
        }

        let mut attrs = Attributes::new();
        attrs.insert("admin_account_id".to_string(), Value::from(identifier));
        Ok(State::existing(id.clone(), attrs).with_identifier(identifier))
    }

    pub(crate) async fn create_guardduty_organization_admin_account(
        &self,
        resource: Resource,
    ) -> ProviderResult<State> {
        let id = resource.id.clone();
        let client = &self.conns.guardduty;
        let admin_account_id = require_str(&resource.attributes, "admin_account_id", &id)?;

        client
            .enable_organization_admin_account()
            .admin_account_id(admin_account_id)
            .send()
            .await
            .map_err(|e| {
                sdk_error(
                    format!("enabling GuardDuty Organization Admin Account ({})", admin_account_id),
                    e,
                )
                .for_resource(id.clone())
            })?;
        log::info!("Enabled GuardDuty Organization Admin Account {}", admin_account_id);

        wait_admin_account_enabled(client, admin_account_id)
            .await
            .map_err(|e| e.for_resource(id.clone()))?;

        self.read_guardduty_organization_admin_account(&id, admin_account_id)
            .await
    }

    pub(crate) async fn delete_guardduty_organization_admin_account(
        &self,
        id: ResourceId,
        identifier: &str,
    ) -> ProviderResult<()> {
        let client = &self.conns.guardduty;
        log::info!("Disabling GuardDuty Organization Admin Account {}", identifier);

        match client
            .disable_organization_admin_account()
            .admin_account_id(identifier)
            .send()
            .await
        {
            Ok(_) => {}
            Err(e) if is_not_found(&e) => return Ok(()),
            Err(e) => {
                return Err(sdk_error(
                    format!("disabling GuardDuty Organization Admin Account ({})", identifier),
                    e,
                )
                .for_resource(id));
            }
        }

        wait_admin_account_not_found(client, identifier)
            .await
            .map_err(|e| e.for_resource(id))
    }
}
