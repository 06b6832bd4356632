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

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use tracing::{info, warn};

use tf_provider::value::ValueEmpty;
use tf_provider::schema::Schema;
use tf_provider::{AttributePath, Diagnostics, Resource};

use crate::client::{ClientHandle, DewClient};
use crate::utils::{
    assign, opt_string, owned, replace_if_changed, string, string_values, strings, WithNormalize,
    WithSchema, WithValidate,
};

use super::api::{self, CreateGrant, KEY_GONE_CODES};
use super::state::GrantState;

#[derive(Debug, Default, Clone)]
pub struct KmsGrantResource {
    client: ClientHandle,
}

impl KmsGrantResource {
    pub fn new(client: ClientHandle) -> Self {
        Self { client }
    }
}

/// Split a `{key_id}/{grant_id}` identifier
pub(super) fn split_grant_id(id: &str) -> Result<(&str, &str)> {
    match id.split_once('/') {
        Some((key_id, grant_id)) if !key_id.is_empty() && !grant_id.is_empty() => {
            Ok((key_id, grant_id))
        }
        _ => Err(anyhow!(
            "invalid grant id `{id}`, expected `<key_id>/<grant_id>`"
        )),
    }
}

impl<'a> GrantState<'a> {
    async fn load(&mut self, client: &DewClient, refresh: bool) -> Result<bool> {
        let region = client.region_of(&self.region);
        let id = self.id.as_str().to_owned();
        let (key_id, grant_id) = split_grant_id(&id)?;

        let grants = match api::list_grants(client, &region, key_id).await {
            Ok(grants) => grants,
            Err(err) if err.is_gone(KEY_GONE_CODES) => return Ok(false),
            Err(err) => return Err(err).context("unable to list the grants of the key"),
        };
        let Some(grant) = grants.into_iter().find(|grant| grant.grant_id == grant_id) else {
            return Ok(false);
        };

        assign(&mut self.region, string(region.as_str()), refresh);
        assign(&mut self.key_id, string(key_id), refresh);
        assign(&mut self.grant_id, string(grant_id), refresh);
        assign(&mut self.name, opt_string(grant.name), refresh);
        assign(
            &mut self.grantee_principal,
            opt_string(grant.grantee_principal),
            refresh,
        );
        assign(
            &mut self.grantee_principal_type,
            opt_string(grant.grantee_principal_type),
            refresh,
        );
        assign(&mut self.operations, string_values(grant.operations), refresh);
        assign(
            &mut self.retiring_principal,
            opt_string(grant.retiring_principal),
            refresh,
        );
        assign(&mut self.creator, opt_string(grant.issuing_principal), refresh);
        assign(&mut self.creation_date, opt_string(grant.creation_date), refresh);
        Ok(true)
    }
}

#[async_trait]
impl Resource for KmsGrantResource {
    type State<'a> = GrantState<'a>;
    type PrivateState<'a> = ValueEmpty;
    type ProviderMetaState<'a> = ValueEmpty;

    fn schema(&self, _diags: &mut Diagnostics) -> Option<Schema> {
        Some(GrantState::schema())
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
                warn!(id = state.id.as_str(), "grant is gone, removing it from the state");
                None
            }
            Err(err) => {
                diags.root_error("Failed to read the KMS grant", format!("{err:#}"));
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
        replace_if_changed(&mut replace, "key_id", &prior_state.key_id, &state.key_id);
        replace_if_changed(
            &mut replace,
            "grantee_principal",
            &prior_state.grantee_principal,
            &state.grantee_principal,
        );
        replace_if_changed(
            &mut replace,
            "grantee_principal_type",
            &prior_state.grantee_principal_type,
            &state.grantee_principal_type,
        );
        replace_if_changed(&mut replace, "operations", &prior_state.operations, &state.operations);
        replace_if_changed(&mut replace, "name", &prior_state.name, &state.name);
        replace_if_changed(
            &mut replace,
            "retiring_principal",
            &prior_state.retiring_principal,
            &state.retiring_principal,
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
        let key_id = owned(&state.key_id).unwrap_or_default();

        let request = CreateGrant {
            key_id: key_id.clone(),
            grantee_principal: owned(&state.grantee_principal).unwrap_or_default(),
            operations: strings(&state.operations),
            name: owned(&state.name),
            retiring_principal: owned(&state.retiring_principal),
            grantee_principal_type: owned(&state.grantee_principal_type),
        };
        let grant_id = match api::create_grant(&client, &region, &request).await {
            Ok(grant_id) => grant_id,
            Err(err) => {
                diags.root_error("Failed to create the KMS grant", err.to_string());
                return None;
            }
        };
        info!(key_id = %key_id, grant_id = %grant_id, "grant created");
        state.id = string(format!("{key_id}/{grant_id}"));

        match state.load(&client, false).await {
            Ok(true) => (),
            Ok(false) => {
                diags.root_error(
                    "Failed to read the created KMS grant",
                    format!("The grant {grant_id} is not listed by the key {key_id}."),
                );
                return None;
            }
            Err(err) => {
                diags.root_error("Failed to read the created KMS grant", format!("{err:#}"));
                return None;
            }
        }
        state.settle();
        Some((state, private_state))
    }

    async fn update<'a>(
        &self,
        _diags: &mut Diagnostics,
        _prior_state: Self::State<'a>,
        planned_state: Self::State<'a>,
        _config_state: Self::State<'a>,
        private_state: Self::PrivateState<'a>,
        _provider_meta_state: Self::ProviderMetaState<'a>,
    ) -> Option<(Self::State<'a>, Self::PrivateState<'a>)> {
        // Every argument forces a replacement
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
        let (key_id, grant_id) = match split_grant_id(state.id.as_str()) {
            Ok(ids) => ids,
            Err(err) => {
                diags.root_error("Failed to delete the KMS grant", err.to_string());
                return None;
            }
        };

        match api::revoke_grant(&client, &region, key_id, grant_id).await {
            Ok(()) => Some(()),
            Err(err) if err.is_gone(KEY_GONE_CODES) => Some(()),
            Err(err) => {
                diags.root_error("Failed to delete the KMS grant", err.to_string());
                None
            }
        }
    }

    async fn import<'a>(
        &self,
        diags: &mut Diagnostics,
        id: String,
    ) -> Option<(Self::State<'a>, Self::PrivateState<'a>)> {
        if let Err(err) = split_grant_id(&id) {
            diags.root_error("Invalid import id", err.to_string());
            return None;
        }
        let state = GrantState {
            id: string(id),
            ..Default::default()
        };
        Some((state, Default::default()))
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use tf_provider::value::Value;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use crate::client::testing::{client, PROJECT_ID};

    use super::*;

    #[test]
    fn grant_ids() {
        assert_eq!(split_grant_id("k1/g1").unwrap(), ("k1", "g1"));
        assert!(split_grant_id("k1").is_err());
        assert!(split_grant_id("/g1").is_err());
        assert!(split_grant_id("k1/").is_err());
    }

    #[tokio::test]
    async fn read_grant_from_listing() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(format!("/v1.0/{PROJECT_ID}/kms/list-grants")))
            .and(body_json(json!({"key_id": "k1", "limit": "100"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "grants": [
                    {"key_id": "k1", "grant_id": "g0", "operations": ["sign"]},
                    {
                        "key_id": "k1",
                        "grant_id": "g1",
                        "name": "reader",
                        "grantee_principal": "u1",
                        "grantee_principal_type": "user",
                        "operations": ["describe-key", "decrypt-data"],
                        "issuing_principal": "admin",
                        "creation_date": "1700000000000",
                    },
                ],
                "truncated": "false",
            })))
            .mount(&server)
            .await;

        let client = client(&server.uri());
        let mut state = GrantState {
            id: string("k1/g1"),
            ..Default::default()
        };
        assert!(state.load(&client, true).await.unwrap());
        assert_eq!(state.name, string("reader"));
        assert_eq!(state.creator, string("admin"));
        assert_eq!(
            state.operations,
            Value::Value(vec![string("describe-key"), string("decrypt-data")])
        );

        let mut missing = GrantState {
            id: string("k1/g2"),
            ..Default::default()
        };
        assert!(!missing.load(&client, true).await.unwrap());
    }

    #[tokio::test]
    async fn every_change_replaces() {
        let prior = GrantState {
            id: string("k1/g1"),
            key_id: string("k1"),
            grantee_principal: string("u1"),
            operations: Value::Value(vec![string("describe-key")]),
            ..Default::default()
        };
        let proposed = GrantState {
            operations: Value::Value(vec![string("describe-key"), string("sign")]),
            grantee_principal: string("u2"),
            ..prior.clone()
        };
        let (_, _, replace) = KmsGrantResource::default()
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
