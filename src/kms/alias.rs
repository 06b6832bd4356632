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
    assign, non_empty, opt_string, owned, replace_if_changed, string, WithNormalize, WithSchema,
    WithValidate,
};

use super::api::{self, KEY_GONE_CODES};
use super::state::AliasState;

#[derive(Debug, Default, Clone)]
pub struct KmsAliasResource {
    client: ClientHandle,
}

impl KmsAliasResource {
    pub fn new(client: ClientHandle) -> Self {
        Self { client }
    }
}

impl<'a> AliasState<'a> {
    /// The alias is its own id, it is looked up among the aliases of every key
    async fn load(&mut self, client: &DewClient, refresh: bool) -> Result<bool> {
        let region = client.region_of(&self.region);
        let alias_name = self.id.as_str().to_owned();

        let aliases = api::list_aliases(client, &region, None)
            .await
            .context("unable to list the aliases")?;
        let Some(alias) = aliases.into_iter().find(|alias| alias.alias == alias_name) else {
            return Ok(false);
        };

        assign(&mut self.region, string(region.as_str()), refresh);
        assign(&mut self.alias, string(alias.alias.as_str()), refresh);
        assign(&mut self.key_id, string(alias.key_id.as_str()), refresh);
        assign(&mut self.alias_urn, opt_string(alias.alias_urn), refresh);
        assign(&mut self.domain_id, opt_string(alias.domain_id), refresh);
        assign(&mut self.create_time, opt_string(alias.create_time), refresh);
        assign(&mut self.update_time, opt_string(alias.update_time), refresh);
        Ok(true)
    }
}

#[async_trait]
impl Resource for KmsAliasResource {
    type State<'a> = AliasState<'a>;
    type PrivateState<'a> = ValueEmpty;
    type ProviderMetaState<'a> = ValueEmpty;

    fn schema(&self, _diags: &mut Diagnostics) -> Option<Schema> {
        Some(AliasState::schema())
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
                warn!(alias = state.id.as_str(), "alias is gone, removing it from the state");
                None
            }
            Err(err) => {
                diags.root_error("Failed to read the KMS alias", format!("{err:#}"));
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
        replace_if_changed(&mut replace, "alias", &prior_state.alias, &state.alias);
        if state.key_id != prior_state.key_id {
            state.update_time = Value::Unknown;
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
        let region = client.region_of(&state.region);
        let key_id = owned(&state.key_id).unwrap_or_default();
        let alias_name = owned(&state.alias).unwrap_or_default();

        let alias = match api::create_alias(&client, &region, &key_id, &alias_name).await {
            Ok(alias) => alias,
            Err(err) => {
                diags.root_error("Failed to create the KMS alias", err.to_string());
                return None;
            }
        };
        info!(alias = %alias_name, key_id = %key_id, "alias created");

        state.id = string(alias_name.as_str());
        assign(&mut state.region, string(region), false);
        assign(&mut state.alias_urn, opt_string(alias.alias_urn), false);
        assign(&mut state.domain_id, opt_string(alias.domain_id), false);
        assign(&mut state.create_time, opt_string(alias.create_time), false);
        assign(&mut state.update_time, opt_string(alias.update_time), false);
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

        if let (Some(alias), Some(key_id)) = (non_empty(&state.alias), non_empty(&state.key_id)) {
            if state.key_id != prior_state.key_id {
                if let Err(err) = api::associate_alias(&client, &region, alias, key_id).await {
                    diags.root_error("Failed to associate the KMS alias", err.to_string());
                    return None;
                }
                info!(alias, key_id, "alias associated");
            }
        }

        match state.load(&client, false).await {
            Ok(true) => (),
            Ok(false) => {
                diags.root_error(
                    "Failed to read the updated KMS alias",
                    "The alias disappeared during its update.",
                );
                return None;
            }
            Err(err) => {
                diags.root_error("Failed to read the updated KMS alias", format!("{err:#}"));
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

        match api::delete_alias(&client, &region, state.key_id.as_str(), state.id.as_str()).await {
            Ok(()) => Some(()),
            Err(err) if err.is_gone(KEY_GONE_CODES) => Some(()),
            Err(err) => {
                diags.root_error("Failed to delete the KMS alias", err.to_string());
                None
            }
        }
    }

    async fn import<'a>(
        &self,
        _diags: &mut Diagnostics,
        id: String,
    ) -> Option<(Self::State<'a>, Self::PrivateState<'a>)> {
        let state = AliasState {
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

    #[tokio::test]
    async fn alias_is_found_by_name() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(format!("/v1.0/{PROJECT_ID}/kms/aliases")))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "aliases": [
                    {"key_id": "k1", "alias": "alias/other"},
                    {"key_id": "k2", "alias": "alias/app", "alias_urn": "urn:kms:alias/app"},
                ],
                "page_info": {"current_count": 2},
            })))
            .mount(&server)
            .await;

        let mut state = AliasState {
            id: string("alias/app"),
            ..Default::default()
        };
        assert!(state.load(&client(&server.uri()), true).await.unwrap());
        assert_eq!(state.key_id, string("k2"));
        assert_eq!(state.alias, string("alias/app"));
        assert_eq!(state.alias_urn, string("urn:kms:alias/app"));
        assert!(state.create_time.is_null());
    }

    #[tokio::test]
    async fn deletion_body() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path(format!("/v1.0/{PROJECT_ID}/kms/aliases")))
            .and(body_json(json!({"key_id": "k2", "aliases": ["alias/app"]})))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let resource = KmsAliasResource::new(client(&server.uri()).into());
        let state = AliasState {
            id: string("alias/app"),
            alias: string("alias/app"),
            key_id: string("k2"),
            ..Default::default()
        };
        let mut diags = Diagnostics::default();
        assert!(resource
            .destroy(&mut diags, state, Default::default(), Default::default())
            .await
            .is_some());
        assert!(diags.errors.is_empty());
    }
}
