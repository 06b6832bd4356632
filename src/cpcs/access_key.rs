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
    assign, keep_created, non_empty, opt_string, owned, replace_if_changed, string, timestamp,
    WithNormalize, WithSchema, WithValidate,
};

use super::api::{self, CPCS_GONE_CODES};
use super::state::AccessKeyState;

#[derive(Debug, Default, Clone)]
pub struct CpcsAppAccessKeyResource {
    client: ClientHandle,
}

impl CpcsAppAccessKeyResource {
    pub fn new(client: ClientHandle) -> Self {
        Self { client }
    }
}

impl<'a> AccessKeyState<'a> {
    async fn load(&mut self, client: &DewClient, refresh: bool) -> Result<bool> {
        let region = client.region_of(&self.region);
        let app_id = owned(&self.app_id).unwrap_or_default();
        let access_keys = match api::list_access_keys(client, &region, &app_id).await {
            Ok(access_keys) => access_keys,
            Err(err) if err.is_gone(CPCS_GONE_CODES) => return Ok(false),
            Err(err) => return Err(err).context("unable to list the access keys of the app"),
        };
        let Some(access_key) = access_keys
            .into_iter()
            .find(|access_key| access_key.access_key_id == self.id.as_str())
        else {
            return Ok(false);
        };

        assign(&mut self.region, string(region.as_str()), refresh);
        assign(&mut self.key_name, string(access_key.key_name), refresh);
        assign(&mut self.status, opt_string(access_key.status), refresh);
        assign(&mut self.app_name, opt_string(access_key.app_name), refresh);
        assign(
            &mut self.is_downloaded,
            access_key.is_downloaded.map_or(Value::Null, Value::Value),
            refresh,
        );
        assign(&mut self.created_at, timestamp(access_key.create_time), refresh);
        assign(
            &mut self.downloaded_at,
            timestamp(access_key.download_time),
            refresh,
        );
        Ok(true)
    }

    /// Enable or disable the access key according to `status`
    async fn apply_status(&self, client: &DewClient, region: &str) -> Result<()> {
        let Some(status) = non_empty(&self.status) else {
            return Ok(());
        };
        api::access_key_action(
            client,
            region,
            self.app_id.as_str(),
            self.id.as_str(),
            status,
        )
        .await
        .with_context(|| format!("unable to {status} the access key"))
    }

    async fn create_remote(&mut self, client: &DewClient) -> Result<()> {
        let region = client.region_of(&self.region);
        let app_id = owned(&self.app_id).unwrap_or_default();
        let key_name = owned(&self.key_name).unwrap_or_default();

        let access_key_id = api::create_access_key(client, &region, &app_id, &key_name)
            .await
            .context("unable to create the access key")?;
        info!(app_id = %app_id, access_key_id = %access_key_id, "access key created");
        self.id = string(access_key_id.as_str());

        let secret = api::download_access_key(client, &region, &app_id, &access_key_id)
            .await
            .context("unable to download the access key")?;
        self.access_key = string(secret.access_key);
        self.secret_key = string(secret.secret_key);

        // New access keys are enabled
        if non_empty(&self.status) == Some("disable") {
            self.apply_status(client, &region).await?;
        }
        Ok(())
    }
}

#[async_trait]
impl Resource for CpcsAppAccessKeyResource {
    type State<'a> = AccessKeyState<'a>;
    type PrivateState<'a> = ValueEmpty;
    type ProviderMetaState<'a> = ValueEmpty;

    fn schema(&self, _diags: &mut Diagnostics) -> Option<Schema> {
        Some(AccessKeyState::schema())
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
                warn!(
                    access_key_id = state.id.as_str(),
                    "access key is gone, removing it from the state"
                );
                None
            }
            Err(err) => {
                diags.root_error("Failed to read the CPCS access key", format!("{err:#}"));
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
        let state = proposed_state;
        let mut replace = Vec::new();
        replace_if_changed(&mut replace, "region", &prior_state.region, &state.region);
        replace_if_changed(&mut replace, "app_id", &prior_state.app_id, &state.app_id);
        replace_if_changed(&mut replace, "key_name", &prior_state.key_name, &state.key_name);
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
            diags.root_error("Failed to create the CPCS access key", format!("{err:#}"));
            let id = state.id.clone();
            return keep_created(&id, state, private_state);
        }
        match state.load(&client, false).await {
            Ok(true) => (),
            Ok(false) => {
                diags.root_error(
                    "Failed to read the created CPCS access key",
                    "The access key disappeared right after its creation.",
                );
                return None;
            }
            Err(err) => {
                diags.root_error(
                    "Failed to read the created CPCS access key",
                    format!("{err:#}"),
                );
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
        let region = client.region_of(&state.region);

        if state.status != prior_state.status {
            if let Err(err) = state.apply_status(&client, &region).await {
                diags.root_error("Failed to update the CPCS access key", format!("{err:#}"));
                return None;
            }
        }
        match state.load(&client, false).await {
            Ok(true) => (),
            Ok(false) => {
                diags.root_error(
                    "Failed to read the updated CPCS access key",
                    "The access key disappeared during its update.",
                );
                return None;
            }
            Err(err) => {
                diags.root_error(
                    "Failed to read the updated CPCS access key",
                    format!("{err:#}"),
                );
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

        match api::delete_access_key(&client, &region, state.app_id.as_str(), state.id.as_str())
            .await
        {
            Ok(()) => Some(()),
            Err(err) if err.is_gone(CPCS_GONE_CODES) => Some(()),
            Err(err) => {
                diags.root_error("Failed to delete the CPCS access key", err.to_string());
                None
            }
        }
    }

    /// `<app_id>/<access_key_id>`, the secret part cannot be imported
    async fn import<'a>(
        &self,
        diags: &mut Diagnostics,
        id: String,
    ) -> Option<(Self::State<'a>, Self::PrivateState<'a>)> {
        let Some((app_id, access_key_id)) = id.split_once('/') else {
            diags.root_error(
                "Invalid import id",
                format!("Expected `<app_id>/<access_key_id>`, got `{id}`."),
            );
            return None;
        };
        let state = AccessKeyState {
            id: string(access_key_id),
            app_id: string(app_id),
            ..Default::default()
        };
        Some((state, Default::default()))
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use crate::client::testing::{client, PROJECT_ID};

    use super::*;

    async fn mock_listing(server: &MockServer, status: &str) {
        Mock::given(method("GET"))
            .and(path(format!("/v1/{PROJECT_ID}/dew/cpcs/apps/a1/access-keys")))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "result": [{
                    "access_key_id": "k1",
                    "key_name": "ci",
                    "app_name": "billing",
                    "status": status,
                    "is_downloaded": true,
                    "create_time": 1704067200000i64,
                    "download_time": 1704067200000i64,
                }],
                "total_num": 1,
            })))
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn create_downloads_once_and_disables() {
        let server = MockServer::start().await;
        let base = format!("/v1/{PROJECT_ID}/dew/cpcs/apps/a1/access-keys");
        Mock::given(method("POST"))
            .and(path(base.clone()))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"access_key_id": "k1"})))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path(format!("{base}/k1/download")))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"access_key": "AK", "secret_key": "SK"})),
            )
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path(format!("{base}/k1/disable")))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;
        mock_listing(&server, "disable").await;

        let resource = CpcsAppAccessKeyResource::new(client(&server.uri()).into());
        let mut planned = AccessKeyState {
            app_id: string("a1"),
            key_name: string("ci"),
            status: string("disable"),
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
        assert!(diags.errors.is_empty());
        assert_eq!(state.id, string("k1"));
        assert_eq!(state.access_key, string("AK"));
        assert_eq!(state.secret_key, string("SK"));
        assert_eq!(state.app_name, string("billing"));
        assert_eq!(state.is_downloaded, Value::Value(true));
    }

    #[tokio::test]
    async fn refresh_keeps_the_downloaded_secret() {
        let server = MockServer::start().await;
        mock_listing(&server, "enable").await;

        let resource = CpcsAppAccessKeyResource::new(client(&server.uri()).into());
        let state = AccessKeyState {
            id: string("k1"),
            app_id: string("a1"),
            key_name: string("ci"),
            status: string("disable"),
            secret_key: string("SK"),
            ..Default::default()
        };
        let (state, _) = resource
            .read(
                &mut Diagnostics::default(),
                state,
                Default::default(),
                Default::default(),
            )
            .await
            .unwrap();
        assert_eq!(state.status, string("enable"));
        assert_eq!(state.secret_key, string("SK"));
    }

    #[tokio::test]
    async fn import_needs_both_ids() {
        let resource = CpcsAppAccessKeyResource::default();
        let mut diags = Diagnostics::default();
        assert!(resource.import(&mut diags, "k1".to_owned()).await.is_none());
        assert_eq!(diags.errors.len(), 1);

        let (state, _) = resource
            .import(&mut Diagnostics::default(), "a1/k1".to_owned())
            .await
            .unwrap();
        assert_eq!(state.app_id, string("a1"));
        assert_eq!(state.id, string("k1"));
    }
}
