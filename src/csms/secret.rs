// This file is part of the terraform-provider-huaweicloud-dew project
//
// Copyright (C) ANEO, 2024-2024. All rights reserved.
//
// Licensed under the Apache License, Version 2.0 (the "License")
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use anyhow::{Context, Result};
use async_trait::async_trait;
use tracing::{info, warn};

use tf_provider::value::{Value, ValueEmpty};
use tf_provider::schema::Schema;
use tf_provider::{AttributePath, Diagnostics, Resource};

use crate::client::{ClientHandle, DewClient};
use crate::utils::{
    assign, boolean, keep_created, non_empty, opt_string, owned, parse_timestamp,
    replace_if_changed, string, string_values, strings, tag_values, tags, timestamp, WithNormalize,
    WithSchema, WithValidate,
};

use super::api::{self, CreateSecret, UpdateSecret, SECRET_GONE_CODES};
use super::state::SecretState;

#[derive(Debug, Default, Clone)]
pub struct CsmsSecretResource {
    client: ClientHandle,
}

impl CsmsSecretResource {
    pub fn new(client: ClientHandle) -> Self {
        Self { client }
    }
}

impl<'a> SecretState<'a> {
    /// Load the secret and its latest version, `false` when the secret is gone.
    ///
    /// The id of a secret is its name.
    async fn load(&mut self, client: &DewClient, refresh: bool) -> Result<bool> {
        let region = client.region_of(&self.region);
        let name = self.id.as_str().to_owned();

        let secret = match api::get_secret(client, &region, &name).await {
            Ok(secret) => secret,
            Err(err) if err.is_gone(SECRET_GONE_CODES) => return Ok(false),
            Err(err) => return Err(err).context("unable to read the secret"),
        };

        assign(&mut self.region, string(region.as_str()), refresh);
        assign(&mut self.name, string(secret.name.as_str()), refresh);
        assign(&mut self.secret_id, string(secret.id.as_str()), refresh);
        assign(&mut self.kms_key_id, opt_string(secret.kms_key_id), refresh);
        assign(&mut self.description, opt_string(secret.description), refresh);
        assign(&mut self.secret_type, opt_string(secret.secret_type), refresh);
        assign(
            &mut self.auto_rotation,
            secret.auto_rotation.map_or(Value::Null, Value::Value),
            refresh,
        );
        assign(&mut self.rotation_period, opt_string(secret.rotation_period), refresh);
        assign(
            &mut self.enterprise_project_id,
            opt_string(secret.enterprise_project_id),
            refresh,
        );
        assign(&mut self.status, opt_string(secret.state), refresh);
        assign(&mut self.create_time, timestamp(secret.create_time), refresh);
        assign(&mut self.rotation_time, timestamp(secret.rotation_time), refresh);
        assign(
            &mut self.next_rotation_time,
            timestamp(secret.next_rotation_time),
            refresh,
        );
        if refresh && (!secret.event_subscriptions.is_empty() || !self.event_subscriptions.is_null())
        {
            self.event_subscriptions = string_values(secret.event_subscriptions);
        }

        let version = api::get_version(client, &region, &name, "latest")
            .await
            .context("unable to read the latest version of the secret")?;
        let metadata = version.version_metadata;
        assign(&mut self.latest_version, string(metadata.id), refresh);
        assign(
            &mut self.version_stages,
            string_values(metadata.version_stages),
            refresh,
        );
        if refresh {
            // Keep the configured spelling of an equivalent date
            let current = non_empty(&self.expire_time).and_then(|text| parse_timestamp(text).ok());
            if current != metadata.expire_time {
                self.expire_time = timestamp(metadata.expire_time);
            }
            if let Some(text) = version.secret_string {
                if self.secret_binary.is_null() {
                    self.secret_text = string(text);
                }
            }
            if let Some(binary) = version.secret_binary {
                if self.secret_text.is_null() {
                    self.secret_binary = string(binary);
                }
            }
        }

        let remote_tags = api::secret_tags(client, &region, &secret.id)
            .await
            .context("unable to read the tags of the secret")?;
        if refresh && (!remote_tags.is_empty() || !self.tags.is_null()) {
            self.tags = tag_values(remote_tags);
        }

        Ok(true)
    }

    async fn create_remote(&mut self, client: &DewClient) -> Result<()> {
        let region = client.region_of(&self.region);
        let name = owned(&self.name).unwrap_or_default();
        let secret = api::create_secret(
            client,
            &region,
            &CreateSecret {
                name: name.clone(),
                kms_key_id: owned(&self.kms_key_id),
                description: owned(&self.description),
                secret_string: owned(&self.secret_text),
                secret_binary: owned(&self.secret_binary),
                secret_type: owned(&self.secret_type),
                auto_rotation: boolean(&self.auto_rotation),
                rotation_period: owned(&self.rotation_period),
                event_subscriptions: strings(&self.event_subscriptions),
                enterprise_project_id: owned(&self.enterprise_project_id)
                    .or_else(|| client.enterprise_project_id().map(str::to_owned)),
            },
        )
        .await
        .context("unable to create the secret")?;
        info!(secret = %name, secret_id = %secret.id, "secret created");
        self.id = string(name.as_str());

        self.apply_expiry(client, &region, &name).await?;
        let wanted = tags(&self.tags);
        if !wanted.is_empty() {
            api::update_secret_tags(client, &region, &secret.id, &Default::default(), &wanted)
                .await
                .context("unable to tag the secret")?;
        }
        Ok(())
    }

    /// Set `expire_time` on the latest version
    async fn apply_expiry(&self, client: &DewClient, region: &str, name: &str) -> Result<()> {
        let Some(expire_time) = non_empty(&self.expire_time) else {
            return Ok(());
        };
        let expire_time = parse_timestamp(expire_time)?;
        let latest = api::get_version(client, region, name, "latest")
            .await
            .context("unable to read the latest version of the secret")?;
        api::update_version_expiry(
            client,
            region,
            name,
            &latest.version_metadata.id,
            expire_time,
        )
        .await
        .context("unable to set the expiration of the secret")?;
        Ok(())
    }

    async fn update_remote(&self, client: &DewClient, prior: &SecretState<'_>) -> Result<()> {
        let region = client.region_of(&self.region);
        let name = self.id.as_str();

        if self.kms_key_id != prior.kms_key_id
            || self.description != prior.description
            || self.auto_rotation != prior.auto_rotation
            || self.rotation_period != prior.rotation_period
            || self.event_subscriptions != prior.event_subscriptions
        {
            api::update_secret(
                client,
                &region,
                name,
                &UpdateSecret {
                    kms_key_id: owned(&self.kms_key_id),
                    description: owned(&self.description).unwrap_or_default(),
                    auto_rotation: boolean(&self.auto_rotation),
                    rotation_period: owned(&self.rotation_period),
                    event_subscriptions: strings(&self.event_subscriptions),
                },
            )
            .await
            .context("unable to update the secret")?;
        }

        let new_value =
            self.secret_text != prior.secret_text || self.secret_binary != prior.secret_binary;
        if new_value {
            let version = api::create_version(
                client,
                &region,
                name,
                non_empty(&self.secret_text),
                non_empty(&self.secret_binary),
            )
            .await
            .context("unable to store the new value of the secret")?;
            info!(secret = name, version = %version.id, "secret version created");
        }
        // A new version starts without expiration
        if new_value || self.expire_time != prior.expire_time {
            self.apply_expiry(client, &region, name).await?;
        }

        let (old, new) = (tags(&prior.tags), tags(&self.tags));
        if old != new {
            api::update_secret_tags(client, &region, self.secret_id.as_str(), &old, &new)
                .await
                .context("unable to update the tags of the secret")?;
        }
        Ok(())
    }
}

#[async_trait]
impl Resource for CsmsSecretResource {
    type State<'a> = SecretState<'a>;
    type PrivateState<'a> = ValueEmpty;
    type ProviderMetaState<'a> = ValueEmpty;

    fn schema(&self, _diags: &mut Diagnostics) -> Option<Schema> {
        Some(SecretState::schema())
    }

    async fn validate<'a>(&self, diags: &mut Diagnostics, config: Self::State<'a>) -> Option<()> {
        config.validate(diags, AttributePath::default()).await;

        if diags.errors.is_empty() {
            Some(())
        } else {
            None
        }
    }

    async fn read<'a>(
        &self,
        diags: &mut Diagnostics,
        state: Self::State<'a>,
        private_state: Self::PrivateState<'a>,
        _provider_meta_state: Self::ProviderMetaState<'a>,
    ) -> Option<(Self::State<'a>, Self::PrivateState<'a>)> {
        let client = self.client.get(diags)?;
        let mut state = state;
        match state.load(&client, true).await {
            Ok(true) => Some((state, private_state)),
            Ok(false) => {
                warn!(secret = state.id.as_str(), "secret is gone, removing it from the state");
                None
            }
            Err(err) => {
                diags.root_error("Failed to read the CSMS secret", format!("{err:#}"));
                None
            }
        }
    }

    async fn plan_create<'a>(
        &self,
        diags: &mut Diagnostics,
        proposed_state: Self::State<'a>,
        _config_state: Self::State<'a>,
        _provider_meta_state: Self::ProviderMetaState<'a>,
    ) -> Option<(Self::State<'a>, Self::PrivateState<'a>)> {
        let mut state = proposed_state;
        state.normalize(diags);
        Some((state, Default::default()))
    }

    async fn plan_update<'a>(
        &self,
        _diags: &mut Diagnostics,
        prior_state: Self::State<'a>,
        proposed_state: Self::State<'a>,
        _config_state: Self::State<'a>,
        prior_private_state: Self::PrivateState<'a>,
        _provider_meta_state: Self::ProviderMetaState<'a>,
    ) -> Option<(
        Self::State<'a>,
        Self::PrivateState<'a>,
        Vec<AttributePath>,
    )> {
        let mut state = proposed_state;
        let mut replace = Vec::new();
        replace_if_changed(&mut replace, "region", &prior_state.region, &state.region);
        replace_if_changed(&mut replace, "name", &prior_state.name, &state.name);
        replace_if_changed(
            &mut replace,
            "secret_type",
            &prior_state.secret_type,
            &state.secret_type,
        );
        replace_if_changed(
            &mut replace,
            "enterprise_project_id",
            &prior_state.enterprise_project_id,
            &state.enterprise_project_id,
        );

        if state.secret_text != prior_state.secret_text
            || state.secret_binary != prior_state.secret_binary
        {
            state.latest_version = Value::Unknown;
            state.version_stages = Value::Unknown;
        }
        if state.auto_rotation != prior_state.auto_rotation
            || state.rotation_period != prior_state.rotation_period
        {
            state.next_rotation_time = Value::Unknown;
        }

        Some((state, prior_private_state, replace))
    }

    async fn plan_destroy<'a>(
        &self,
        _diags: &mut Diagnostics,
        _prior_state: Self::State<'a>,
        prior_private_state: Self::PrivateState<'a>,
        _provider_meta_state: Self::ProviderMetaState<'a>,
    ) -> Option<Self::PrivateState<'a>> {
        Some(prior_private_state)
    }

    async fn create<'a>(
        &self,
        diags: &mut Diagnostics,
        planned_state: Self::State<'a>,
        _config_state: Self::State<'a>,
        private_state: Self::PrivateState<'a>,
        _provider_meta_state: Self::ProviderMetaState<'a>,
    ) -> Option<(Self::State<'a>, Self::PrivateState<'a>)> {
        let client = self.client.get(diags)?;
        let mut state = planned_state;

        if let Err(err) = state.create_remote(&client).await {
            diags.root_error("Failed to create the CSMS secret", format!("{err:#}"));
            let id = state.id.clone();
            return keep_created(&id, state, private_state);
        }
        match state.load(&client, false).await {
            Ok(true) => (),
            Ok(false) => {
                diags.root_error(
                    "Failed to read the created CSMS secret",
                    "The secret disappeared right after its creation.",
                );
                return None;
            }
            Err(err) => {
                diags.root_error("Failed to read the created CSMS secret", format!("{err:#}"));
                let id = state.id.clone();
                return keep_created(&id, state, private_state);
            }
        }
        state.settle();
        Some((state, private_state))
    }

    async fn update<'a>(
        &self,
        diags: &mut Diagnostics,
        prior_state: Self::State<'a>,
        planned_state: Self::State<'a>,
        _config_state: Self::State<'a>,
        private_state: Self::PrivateState<'a>,
        _provider_meta_state: Self::ProviderMetaState<'a>,
    ) -> Option<(Self::State<'a>, Self::PrivateState<'a>)> {
        let client = self.client.get(diags)?;
        let mut state = planned_state;

        if let Err(err) = state.update_remote(&client, &prior_state).await {
            diags.root_error("Failed to update the CSMS secret", format!("{err:#}"));
            return None;
        }
        match state.load(&client, false).await {
            Ok(true) => (),
            Ok(false) => {
                diags.root_error(
                    "Failed to read the updated CSMS secret",
                    "The secret disappeared during its update.",
                );
                return None;
            }
            Err(err) => {
                diags.root_error("Failed to read the updated CSMS secret", format!("{err:#}"));
                return None;
            }
        }
        state.settle();
        Some((state, private_state))
    }

    async fn destroy<'a>(
        &self,
        diags: &mut Diagnostics,
        state: Self::State<'a>,
        _planned_private_state: Self::PrivateState<'a>,
        _provider_meta_state: Self::ProviderMetaState<'a>,
    ) -> Option<()> {
        let client = self.client.get(diags)?;
        let region = client.region_of(&state.region);

        match api::delete_secret(&client, &region, state.id.as_str()).await {
            Ok(()) => {
                info!(secret = state.id.as_str(), "secret deleted");
                Some(())
            }
            Err(err) if err.is_gone(SECRET_GONE_CODES) => Some(()),
            Err(err) => {
                diags.root_error("Failed to delete the CSMS secret", err.to_string());
                None
            }
        }
    }

    async fn import<'a>(
        &self,
        _diags: &mut Diagnostics,
        id: String,
    ) -> Option<(Self::State<'a>, Self::PrivateState<'a>)> {
        let state = SecretState {
            id: string(id),
            ..Default::default()
        };
        Some((state, Default::default()))
    }
}
