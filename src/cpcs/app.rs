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

use tf_provider::value::ValueEmpty;
use tf_provider::schema::Schema;
use tf_provider::{AttributePath, Diagnostics, Resource};

use crate::client::{ClientHandle, DewClient};
use crate::utils::{
    assign, non_empty, opt_string, owned, replace_if_changed, string, timestamp, WithNormalize,
    WithSchema, WithValidate,
};

use super::api::{self, CreateApp, CPCS_GONE_CODES};
use super::state::AppState;

#[derive(Debug, Default, Clone)]
pub struct CpcsAppResource {
    client: ClientHandle,
}

impl CpcsAppResource {
    pub fn new(client: ClientHandle) -> Self {
        Self { client }
    }
}

impl<'a> AppState<'a> {
    /// Apps can only be listed, the name narrows the listing when known
    async fn load(&mut self, client: &DewClient, refresh: bool) -> Result<bool> {
        let region = client.region_of(&self.region);
        let apps = api::list_apps(client, &region, non_empty(&self.name))
            .await
            .context("unable to list the apps")?;
        let Some(app) = apps
            .into_iter()
            .find(|app| app.app_id == self.id.as_str())
        else {
            return Ok(false);
        };

        assign(&mut self.region, string(region.as_str()), refresh);
        assign(&mut self.name, string(app.app_name), refresh);
        assign(&mut self.vpc_id, opt_string(app.vpc_id), refresh);
        assign(&mut self.vpc_name, opt_string(app.vpc_name), refresh);
        assign(&mut self.subnet_id, opt_string(app.subnet_id), refresh);
        assign(&mut self.subnet_name, opt_string(app.subnet_name), refresh);
        assign(&mut self.description, opt_string(app.description), refresh);
        assign(&mut self.account_name, opt_string(app.account_name), refresh);
        assign(&mut self.created_at, timestamp(app.create_time), refresh);
        Ok(true)
    }
}

#[async_trait]
impl Resource for CpcsAppResource {
    type State<'a> = AppState<'a>;
    type PrivateState<'a> = ValueEmpty;
    type ProviderMetaState<'a> = ValueEmpty;

    fn schema(&self, _diags: &mut Diagnostics) -> Option<Schema> {
        Some(AppState::schema())
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
                warn!(app_id = state.id.as_str(), "app is gone, removing it from the state");
                None
            }
            Err(err) => {
                diags.root_error("Failed to read the CPCS app", format!("{err:#}"));
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
        replace_if_changed(&mut replace, "name", &prior_state.name, &state.name);
        replace_if_changed(&mut replace, "vpc_id", &prior_state.vpc_id, &state.vpc_id);
        replace_if_changed(&mut replace, "vpc_name", &prior_state.vpc_name, &state.vpc_name);
        replace_if_changed(
            &mut replace,
            "subnet_id",
            &prior_state.subnet_id,
            &state.subnet_id,
        );
        replace_if_changed(
            &mut replace,
            "subnet_name",
            &prior_state.subnet_name,
            &state.subnet_name,
        );
        replace_if_changed(
            &mut replace,
            "description",
            &prior_state.description,
            &state.description,
        );
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
        let region = client.region_of(&state.region);

        let request = CreateApp {
            app_name: owned(&state.name).unwrap_or_default(),
            vpc_id: owned(&state.vpc_id).unwrap_or_default(),
            vpc_name: owned(&state.vpc_name).unwrap_or_default(),
            subnet_id: owned(&state.subnet_id).unwrap_or_default(),
            subnet_name: owned(&state.subnet_name).unwrap_or_default(),
            description: owned(&state.description),
        };
        let app_id = match api::create_app(&client, &region, &request).await {
            Ok(app_id) => app_id,
            Err(err) => {
                diags.root_error("Failed to create the CPCS app", err.to_string());
                return None;
            }
        };
        info!(app_id = %app_id, name = %request.app_name, "app created");
        state.id = string(app_id);

        match state.load(&client, false).await {
            Ok(true) => (),
            Ok(false) => {
                diags.root_error(
                    "Failed to read the created CPCS app",
                    "The app disappeared right after its creation.",
                );
                return None;
            }
            Err(err) => {
                diags.root_error("Failed to read the created CPCS app", format!("{err:#}"));
                return None;
            }
        }
        state.settle();
        Some((state, private_state))
    }

    /// Every argument forces a replacement
    async fn update<'a>(
        &self,
        _diags: &mut Diagnostics,
        _prior_state: Self::State<'a>,
        planned_state: Self::State<'a>,
        _config_state: Self::State<'a>,
        private_state: Self::PrivateState<'a>,
        _provider_meta_state: Self::ProviderMetaState<'a>,
    ) -> Option<(Self::State<'a>, Self::PrivateState<'a>)> {
        Some((planned_state, private_state))
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

        match api::delete_app(&client, &region, state.id.as_str()).await {
            Ok(()) => Some(()),
            Err(err) if err.is_gone(CPCS_GONE_CODES) => Some(()),
            Err(err) => {
                diags.root_error("Failed to delete the CPCS app", err.to_string());
                None
            }
        }
    }

    async fn import<'a>(
        &self,
        _diags: &mut Diagnostics,
        id: String,
    ) -> Option<(Self::State<'a>, Self::PrivateState<'a>)> {
        let state = AppState {
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

    fn planned<'a>() -> AppState<'a> {
        let mut state = AppState {
            name: string("billing"),
            vpc_id: string("vpc-1"),
            vpc_name: string("main"),
            subnet_id: string("subnet-1"),
            subnet_name: string("private"),
            ..Default::default()
        };
        state.normalize(&mut Diagnostics::default());
        state
    }

    #[tokio::test]
    async fn create_then_find_in_listing() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(format!("/v1/{PROJECT_ID}/dew/cpcs/apps")))
            .and(body_json(json!({
                "app_name": "billing",
                "vpc_id": "vpc-1",
                "vpc_name": "main",
                "subnet_id": "subnet-1",
                "subnet_name": "private",
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"app_id": "a2"})))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path(format!("/v1/{PROJECT_ID}/dew/cpcs/apps")))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "result": [
                    {"app_id": "a1", "app_name": "billing-old"},
                    {
                        "app_id": "a2",
                        "app_name": "billing",
                        "vpc_id": "vpc-1",
                        "vpc_name": "main",
                        "subnet_id": "subnet-1",
                        "subnet_name": "private",
                        "account_name": "ops",
                        "create_time": 1704067200000i64,
                    },
                ],
                "total_num": 2,
            })))
            .mount(&server)
            .await;

        let resource = CpcsAppResource::new(client(&server.uri()).into());
        let planned = planned();
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
        assert_eq!(state.id, string("a2"));
        assert_eq!(state.account_name, string("ops"));
        assert_eq!(state.created_at, string("2024-01-01T00:00:00Z"));
        assert!(state.description.is_null());
    }

    #[tokio::test]
    async fn missing_app_is_removed() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(format!("/v1/{PROJECT_ID}/dew/cpcs/apps")))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"result": [], "total_num": 0})),
            )
            .mount(&server)
            .await;

        let resource = CpcsAppResource::new(client(&server.uri()).into());
        let state = AppState {
            id: string("a2"),
            name: string("billing"),
            ..Default::default()
        };
        let mut diags = Diagnostics::default();
        let read = resource
            .read(&mut diags, state, Default::default(), Default::default())
            .await;
        assert!(read.is_none());
        assert!(diags.errors.is_empty());
    }

    #[tokio::test]
    async fn any_change_replaces() {
        let resource = CpcsAppResource::default();
        let prior = AppState {
            id: string("a2"),
            ..planned()
        };
        let proposed = AppState {
            subnet_id: string("subnet-2"),
            description: string("moved"),
            ..prior.clone()
        };
        let (_, _, replace) = resource
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
        assert_eq!(replace.len(), 2);
    }
}
