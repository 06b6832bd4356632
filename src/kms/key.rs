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
    assign, boolean, keep_created, non_empty, number, opt_string, owned, replace_if_changed, string,
    tag_values, tags, WithNormalize, WithSchema, WithValidate,
};

use super::api::{self, CreateKey, KEY_GONE_CODES};
use super::state::{KeyState, DEFAULT_PENDING_DAYS};

#[derive(Debug, Default, Clone)]
pub struct KmsKeyResource {
    client: ClientHandle,
}

impl KmsKeyResource {
    pub fn new(client: ClientHandle) -> Self {
        Self { client }
    }
}

impl<'a> KeyState<'a> {
    /// Load the remote key into the state, `false` when the key is gone
    async fn load(&mut self, client: &DewClient, refresh: bool) -> Result<bool> {
        let region = client.region_of(&self.region);
        let key_id = self.id.as_str().to_owned();

        let key = match api::describe_key(client, &region, &key_id).await {
            Ok(key) => key,
            Err(err) if err.is_gone(KEY_GONE_CODES) => return Ok(false),
            Err(err) => return Err(err).context("unable to describe the key"),
        };
        if key.is_pending_deletion() {
            return Ok(false);
        }

        assign(&mut self.region, string(region.as_str()), refresh);
        assign(&mut self.key_id, string(key.key_id.as_str()), refresh);
        assign(&mut self.key_alias, opt_string(key.key_alias.clone()), refresh);
        assign(
            &mut self.key_description,
            opt_string(key.key_description.clone()),
            refresh,
        );
        assign(&mut self.key_algorithm, opt_string(key.key_spec.clone()), refresh);
        assign(&mut self.key_usage, opt_string(key.key_usage.clone()), refresh);
        assign(&mut self.origin, opt_string(key.origin.clone()), refresh);
        assign(&mut self.keystore_id, opt_string(key.keystore_id.clone()), refresh);
        assign(
            &mut self.enterprise_project_id,
            opt_string(key.sys_enterprise_project_id.clone()),
            refresh,
        );
        assign(&mut self.domain_id, opt_string(key.domain_id.clone()), refresh);
        assign(&mut self.key_state, opt_string(key.key_state.clone()), refresh);
        assign(&mut self.creation_date, opt_string(key.creation_date.clone()), refresh);
        assign(
            &mut self.scheduled_deletion_date,
            opt_string(key.scheduled_deletion_date.clone()),
            refresh,
        );
        assign(
            &mut self.expiration_time,
            opt_string(key.expiration_time.clone()),
            refresh,
        );
        // Pending activation and pending import keys are not enabled either
        assign(
            &mut self.is_enabled,
            Value::Value(key.key_state.as_deref() == Some("2")),
            refresh,
        );

        // Rotation is only available for symmetric keys generated by KMS
        match api::rotation_status(client, &region, &key_id).await {
            Ok(rotation) => {
                assign(
                    &mut self.rotation_enabled,
                    Value::Value(rotation.key_rotation_enabled),
                    refresh,
                );
                assign(
                    &mut self.rotation_interval,
                    rotation.rotation_interval.map_or(Value::Null, Value::Value),
                    refresh,
                );
                assign(
                    &mut self.rotation_number,
                    rotation.number_of_rotations.map_or(Value::Null, Value::Value),
                    refresh,
                );
            }
            Err(err) => {
                warn!(key_id = %key_id, %err, "unable to read the rotation status");
                assign(&mut self.rotation_enabled, Value::Null, refresh);
                assign(&mut self.rotation_interval, Value::Null, refresh);
                assign(&mut self.rotation_number, Value::Null, refresh);
            }
        }

        let remote_tags = api::key_tags(client, &region, &key_id)
            .await
            .context("unable to read the tags of the key")?;
        // An unset `tags` stays unset while there are none
        if refresh && (!remote_tags.is_empty() || !self.tags.is_null()) {
            self.tags = tag_values(remote_tags);
        }

        Ok(true)
    }

    async fn create_remote(&mut self, client: &DewClient) -> Result<()> {
        let region = client.region_of(&self.region);
        let key_id = api::create_key(
            client,
            &region,
            &CreateKey {
                key_alias: owned(&self.key_alias).unwrap_or_default(),
                key_spec: owned(&self.key_algorithm),
                key_usage: owned(&self.key_usage),
                key_description: owned(&self.key_description),
                origin: owned(&self.origin),
                enterprise_project_id: owned(&self.enterprise_project_id)
                    .or_else(|| client.enterprise_project_id().map(str::to_owned)),
                keystore_id: owned(&self.keystore_id),
            },
        )
        .await
        .context("unable to create the key")?;
        info!(key_id = %key_id, "key created");
        self.id = string(key_id.as_str());

        if boolean(&self.is_enabled) == Some(false) {
            api::key_action(client, &region, "disable-key", &key_id)
                .await
                .context("unable to disable the key")?;
        }
        if boolean(&self.rotation_enabled) == Some(true) {
            api::key_action(client, &region, "enable-key-rotation", &key_id)
                .await
                .context("unable to enable the rotation of the key")?;
            if let Some(interval) = number(&self.rotation_interval) {
                api::update_rotation_interval(client, &region, &key_id, interval)
                    .await
                    .context("unable to set the rotation interval")?;
            }
        }
        let wanted = tags(&self.tags);
        if !wanted.is_empty() {
            api::update_key_tags(client, &region, &key_id, &Default::default(), &wanted)
                .await
                .context("unable to tag the key")?;
        }
        Ok(())
    }

    async fn update_remote(&self, client: &DewClient, prior: &KeyState<'_>) -> Result<()> {
        let region = client.region_of(&self.region);
        let key_id = self.id.as_str();

        if let Some(alias) = non_empty(&self.key_alias) {
            if self.key_alias != prior.key_alias {
                api::update_alias(client, &region, key_id, alias)
                    .await
                    .context("unable to update the alias of the key")?;
            }
        }
        if self.key_description != prior.key_description {
            api::update_description(
                client,
                &region,
                key_id,
                non_empty(&self.key_description).unwrap_or_default(),
            )
            .await
            .context("unable to update the description of the key")?;
        }
        if let Some(enabled) = boolean(&self.is_enabled) {
            if boolean(&prior.is_enabled) != Some(enabled) {
                let action = if enabled { "enable-key" } else { "disable-key" };
                api::key_action(client, &region, action, key_id)
                    .await
                    .with_context(|| format!("unable to {action}"))?;
            }
        }

        let rotation = boolean(&self.rotation_enabled);
        if let Some(enabled) = rotation {
            if boolean(&prior.rotation_enabled) != Some(enabled) {
                let action = if enabled {
                    "enable-key-rotation"
                } else {
                    "disable-key-rotation"
                };
                api::key_action(client, &region, action, key_id)
                    .await
                    .with_context(|| format!("unable to {action}"))?;
            }
        }
        if rotation == Some(true) {
            if let Some(interval) = number(&self.rotation_interval) {
                if number(&prior.rotation_interval) != Some(interval) {
                    api::update_rotation_interval(client, &region, key_id, interval)
                        .await
                        .context("unable to update the rotation interval")?;
                }
            }
        }

        let (old, new) = (tags(&prior.tags), tags(&self.tags));
        if old != new {
            api::update_key_tags(client, &region, key_id, &old, &new)
                .await
                .context("unable to update the tags of the key")?;
        }
        Ok(())
    }
}

#[async_trait]
impl Resource for KmsKeyResource {
    type State<'a> = KeyState<'a>;
    type PrivateState<'a> = ValueEmpty;
    type ProviderMetaState<'a> = ValueEmpty;

    fn schema(&self, _diags: &mut Diagnostics) -> Option<Schema> {
        Some(KeyState::schema())
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
                warn!(key_id = state.id.as_str(), "key is gone, removing it from the state");
                None
            }
            Err(err) => {
                diags.root_error("Failed to read the KMS key", format!("{err:#}"));
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
        replace_if_changed(
            &mut replace,
            "key_algorithm",
            &prior_state.key_algorithm,
            &state.key_algorithm,
        );
        replace_if_changed(&mut replace, "key_usage", &prior_state.key_usage, &state.key_usage);
        replace_if_changed(&mut replace, "origin", &prior_state.origin, &state.origin);
        replace_if_changed(
            &mut replace,
            "keystore_id",
            &prior_state.keystore_id,
            &state.keystore_id,
        );
        replace_if_changed(
            &mut replace,
            "enterprise_project_id",
            &prior_state.enterprise_project_id,
            &state.enterprise_project_id,
        );

        if state.is_enabled != prior_state.is_enabled {
            state.key_state = Value::Unknown;
        }
        if state.rotation_enabled != prior_state.rotation_enabled
            && state.rotation_interval == prior_state.rotation_interval
        {
            state.rotation_interval = Value::Unknown;
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
            diags.root_error("Failed to create the KMS key", format!("{err:#}"));
            let id = state.id.clone();
            return keep_created(&id, state, private_state);
        }
        match state.load(&client, false).await {
            Ok(true) => (),
            Ok(false) => {
                diags.root_error(
                    "Failed to read the created KMS key",
                    "The key disappeared right after its creation.",
                );
                return None;
            }
            Err(err) => {
                diags.root_error("Failed to read the created KMS key", format!("{err:#}"));
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
            diags.root_error("Failed to update the KMS key", format!("{err:#}"));
            return None;
        }
        match state.load(&client, false).await {
            Ok(true) => (),
            Ok(false) => {
                diags.root_error(
                    "Failed to read the updated KMS key",
                    "The key disappeared during its update.",
                );
                return None;
            }
            Err(err) => {
                diags.root_error("Failed to read the updated KMS key", format!("{err:#}"));
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
        let pending_days = number(&state.pending_days).unwrap_or(DEFAULT_PENDING_DAYS);

        match api::schedule_deletion(&client, &region, state.id.as_str(), pending_days).await {
            Ok(()) => {
                info!(key_id = state.id.as_str(), pending_days, "key deletion scheduled");
                Some(())
            }
            Err(err) if err.is_gone(KEY_GONE_CODES) => Some(()),
            Err(err) => {
                diags.root_error("Failed to delete the KMS key", err.to_string());
                None
            }
        }
    }

    async fn import<'a>(
        &self,
        _diags: &mut Diagnostics,
        id: String,
    ) -> Option<(Self::State<'a>, Self::PrivateState<'a>)> {
        let state = KeyState {
            id: string(id),
            ..Default::default()
        };
        Some((state, Default::default()))
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use crate::client::testing::{client, PROJECT_ID};

    use super::*;

    async fn mock(server: &MockServer, action: &str, body: serde_json::Value, response: serde_json::Value) {
        Mock::given(method("POST"))
            .and(path(format!("/v1.0/{PROJECT_ID}/kms/{action}")))
            .and(body_json(body))
            .respond_with(ResponseTemplate::new(200).set_body_json(response))
            .expect(1)
            .mount(server)
            .await;
    }

    async fn mock_tags(server: &MockServer) {
        Mock::given(method("GET"))
            .and(path(format!("/v1.0/{PROJECT_ID}/kms/k1/tags")))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"tags": []})))
            .mount(server)
            .await;
    }

    fn described(state: &str) -> serde_json::Value {
        json!({"key_info": {
            "key_id": "k1",
            "domain_id": "d1",
            "key_alias": "app",
            "key_spec": "AES_256",
            "key_usage": "ENCRYPT_DECRYPT",
            "origin": "kms",
            "key_state": state,
            "creation_date": "1700000000000",
            "sys_enterprise_project_id": "0",
        }})
    }

    #[tokio::test]
    async fn create_disabled_key_with_rotation() {
        let server = MockServer::start().await;
        mock(
            &server,
            "create-key",
            json!({"key_alias": "app", "key_spec": "AES_256"}),
            json!({"key_info": {"key_id": "k1", "domain_id": "d1"}}),
        )
        .await;
        mock(&server, "disable-key", json!({"key_id": "k1"}), json!({})).await;
        mock(&server, "enable-key-rotation", json!({"key_id": "k1"}), json!({})).await;
        mock(
            &server,
            "update-key-rotation-interval",
            json!({"key_id": "k1", "rotation_interval": 90}),
            json!({}),
        )
        .await;
        mock(&server, "describe-key", json!({"key_id": "k1"}), described("3")).await;
        mock(
            &server,
            "get-key-rotation-status",
            json!({"key_id": "k1"}),
            json!({"key_rotation_enabled": true, "rotation_interval": 90, "number_of_rotations": 0}),
        )
        .await;
        mock_tags(&server).await;

        let client = client(&server.uri());
        let mut state = KeyState {
            key_alias: string("app"),
            key_algorithm: string("AES_256"),
            is_enabled: Value::Value(false),
            rotation_enabled: Value::Value(true),
            rotation_interval: Value::Value(90),
            ..Default::default()
        };
        state.normalize(&mut Diagnostics::default());
        state.create_remote(&client).await.unwrap();
        assert!(state.load(&client, false).await.unwrap());
        state.settle();

        assert_eq!(state.id, string("k1"));
        assert_eq!(state.key_state, string("3"));
        assert_eq!(state.is_enabled, Value::Value(false));
        assert_eq!(state.rotation_number, Value::Value(0));
        assert_eq!(state.enterprise_project_id, string("0"));
        assert!(state.tags.is_null());
    }

    #[tokio::test]
    async fn failed_disable_keeps_the_created_key() {
        let server = MockServer::start().await;
        mock(
            &server,
            "create-key",
            json!({"key_alias": "app"}),
            json!({"key_info": {"key_id": "k1", "domain_id": "d1"}}),
        )
        .await;
        Mock::given(method("POST"))
            .and(path(format!("/v1.0/{PROJECT_ID}/kms/disable-key")))
            .respond_with(ResponseTemplate::new(500).set_body_json(json!({
                "error": {"error_code": "KMS.0500", "error_msg": "internal error"}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let resource = KmsKeyResource::new(client(&server.uri()).into());
        let mut planned = KeyState {
            key_alias: string("app"),
            is_enabled: Value::Value(false),
            ..Default::default()
        };
        planned.normalize(&mut Diagnostics::default());

        let mut diags = Diagnostics::default();
        let (state, _) = resource
            .create(
                &mut diags,
                planned.clone(),
                planned,
                Default::default(),
                Default::default(),
            )
            .await
            .unwrap();
        assert!(!diags.errors.is_empty());
        assert_eq!(state.id, string("k1"));
        assert!(!state.key_state.is_unknown());
    }

    #[tokio::test]
    async fn pending_deletion_is_gone() {
        let server = MockServer::start().await;
        mock(&server, "describe-key", json!({"key_id": "k1"}), described("4")).await;

        let mut state = KeyState {
            id: string("k1"),
            ..Default::default()
        };
        assert!(!state.load(&client(&server.uri()), true).await.unwrap());
    }

    #[tokio::test]
    async fn missing_key_is_gone() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(400).set_body_json(
                json!({"error": {"error_code": "KMS.0207", "error_msg": "key not found"}}),
            ))
            .mount(&server)
            .await;

        let mut state = KeyState {
            id: string("k1"),
            ..Default::default()
        };
        assert!(!state.load(&client(&server.uri()), true).await.unwrap());
    }

    #[tokio::test]
    async fn update_only_changed_attributes() {
        let server = MockServer::start().await;
        mock(
            &server,
            "update-key-description",
            json!({"key_id": "k1", "key_description": "new"}),
            json!({}),
        )
        .await;
        mock(&server, "enable-key", json!({"key_id": "k1"}), json!({})).await;
        Mock::given(method("POST"))
            .and(path(format!("/v1.0/{PROJECT_ID}/kms/k1/tags/action")))
            .and(body_json(json!({"action": "create", "tags": [{"key": "env", "value": "dev"}]})))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        let prior = KeyState {
            id: string("k1"),
            key_alias: string("app"),
            key_description: string("old"),
            is_enabled: Value::Value(false),
            rotation_enabled: Value::Value(false),
            ..Default::default()
        };
        let planned = KeyState {
            key_description: string("new"),
            is_enabled: Value::Value(true),
            tags: crate::utils::tag_values([("env".to_owned(), "dev".to_owned())].into()),
            ..prior.clone()
        };
        planned
            .update_remote(&client(&server.uri()), &prior)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn force_new_attributes() {
        let resource = KmsKeyResource::default();
        let prior = KeyState {
            id: string("k1"),
            key_alias: string("app"),
            key_algorithm: string("AES_256"),
            is_enabled: Value::Value(true),
            ..Default::default()
        };
        let proposed = KeyState {
            key_algorithm: string("SM4"),
            is_enabled: Value::Value(false),
            ..prior.clone()
        };
        let (planned, _, replace) = resource
            .plan_update(
                &mut Diagnostics::default(),
                prior,
                proposed.clone(),
                proposed,
                Default::default(),
                Default::default(),
            )
            .await
            .unwrap();
        assert_eq!(replace.len(), 1);
        assert!(planned.key_state.is_unknown());
    }
}
