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

use std::collections::BTreeMap;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use futures::{stream, StreamExt, TryStreamExt};

use tf_provider::value::{Value, ValueEmpty};
use tf_provider::schema::Schema;
use tf_provider::{AttributePath, DataSource, Diagnostics};

use crate::client::DewClient;
use crate::utils::{
    data_source_struct, hash_id, non_empty, number, opt_string, owned, string, string_values,
    tag_values, tags, WithSchema, WithValidate,
};

use super::api::{self, CreateDataKey, KeyInfo};
use super::state::{
    DataKeyState, GrantItem, GrantsDataSourceState, KeyDataSourceState, KeyFilter, KeyItem,
    KeysDataSourceState,
};

const DETAIL_CONCURRENCY: usize = 8;

data_source_struct!(KmsKeyDataSource);
data_source_struct!(KmsKeysDataSource);
data_source_struct!(KmsGrantsDataSource);
data_source_struct!(KmsDataKeyDataSource);

/// Keys matching `filter`, with their tags, in listing order
async fn find_keys(
    client: &DewClient,
    region: &str,
    filter: &KeyFilter<'_>,
) -> Result<Vec<(KeyInfo, BTreeMap<String, String>)>> {
    let keys = api::list_keys(
        client,
        region,
        non_empty(&filter.key_state),
        non_empty(&filter.enterprise_project_id),
    )
    .await
    .context("unable to list the keys")?;

    let mut found: Vec<(usize, KeyInfo, BTreeMap<String, String>)> =
        stream::iter(keys.into_iter().filter(|key| filter.matches(key)).enumerate())
            .map(|(i, key)| async move {
                let tags = api::key_tags(client, region, &key.key_id)
                    .await
                    .with_context(|| format!("unable to read the tags of the key {}", key.key_id))?;
                Ok::<_, anyhow::Error>((i, key, tags))
            })
            .buffer_unordered(DETAIL_CONCURRENCY)
            .try_collect()
            .await?;
    found.sort_by_key(|(i, _, _)| *i);
    Ok(found.into_iter().map(|(_, key, tags)| (key, tags)).collect())
}

fn key_item<'a>(key: KeyInfo, key_tags: BTreeMap<String, String>) -> KeyItem<'a> {
    KeyItem {
        key_id: string(key.key_id),
        key_alias: opt_string(key.key_alias),
        key_description: opt_string(key.key_description),
        key_algorithm: opt_string(key.key_spec),
        key_usage: opt_string(key.key_usage),
        key_state: opt_string(key.key_state),
        origin: opt_string(key.origin),
        domain_id: opt_string(key.domain_id),
        default_key_flag: opt_string(key.default_key_flag),
        creation_date: opt_string(key.creation_date),
        scheduled_deletion_date: opt_string(key.scheduled_deletion_date),
        expiration_time: opt_string(key.expiration_time),
        enterprise_project_id: opt_string(key.sys_enterprise_project_id),
        keystore_id: opt_string(key.keystore_id),
        tags: tag_values(key_tags),
    }
}

impl<'a> KeyDataSourceState<'a> {
    async fn load(&mut self, client: &DewClient) -> Result<()> {
        let region = client.region_of(&self.region);
        let mut keys = find_keys(client, &region, &self.filter()).await?;
        if keys.len() != 1 {
            return Err(anyhow!(
                "{} keys match the filters, exactly one is required",
                keys.len()
            ));
        }
        let Some((key, key_tags)) = keys.pop() else {
            return Err(anyhow!("no key matches the filters"));
        };

        let rotation = api::rotation_status(client, &region, &key.key_id).await.ok();

        let item = key_item(key, key_tags);
        self.id = item.key_id.clone();
        self.region = string(region);
        self.key_id = item.key_id;
        self.key_alias = item.key_alias;
        self.key_description = item.key_description;
        self.key_state = item.key_state;
        self.enterprise_project_id = item.enterprise_project_id;
        self.key_algorithm = item.key_algorithm;
        self.key_usage = item.key_usage;
        self.origin = item.origin;
        self.domain_id = item.domain_id;
        self.default_key_flag = item.default_key_flag;
        self.creation_date = item.creation_date;
        self.scheduled_deletion_date = item.scheduled_deletion_date;
        self.expiration_time = item.expiration_time;
        self.keystore_id = item.keystore_id;
        self.tags = item.tags;
        self.rotation_enabled = rotation
            .as_ref()
            .map_or(Value::Null, |rotation| Value::Value(rotation.key_rotation_enabled));
        self.rotation_interval = rotation
            .as_ref()
            .and_then(|rotation| rotation.rotation_interval)
            .map_or(Value::Null, Value::Value);
        self.rotation_number = rotation
            .as_ref()
            .and_then(|rotation| rotation.number_of_rotations)
            .map_or(Value::Null, Value::Value);
        Ok(())
    }
}

#[async_trait]
impl DataSource for KmsKeyDataSource {
    type State<'a> = KeyDataSourceState<'a>;
    type ProviderMetaState<'a> = ValueEmpty;

    fn schema(&self, _diags: &mut Diagnostics) -> Option<Schema> {
        Some(KeyDataSourceState::schema())
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
        config: Self::State<'a>,
        _provider_meta_state: Self::ProviderMetaState<'a>,
    ) -> Option<Self::State<'a>> {
        let client = self.client.get(diags)?;
        let mut state = config;
        if let Err(err) = state.load(&client).await {
            diags.root_error("Failed to find the KMS key", format!("{err:#}"));
            return None;
        }
        Some(state)
    }
}

#[async_trait]
impl DataSource for KmsKeysDataSource {
    type State<'a> = KeysDataSourceState<'a>;
    type ProviderMetaState<'a> = ValueEmpty;

    fn schema(&self, _diags: &mut Diagnostics) -> Option<Schema> {
        Some(KeysDataSourceState::schema())
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
        config: Self::State<'a>,
        _provider_meta_state: Self::ProviderMetaState<'a>,
    ) -> Option<Self::State<'a>> {
        let client = self.client.get(diags)?;
        let mut state = config;
        let region = client.region_of(&state.region);

        let keys = match find_keys(&client, &region, &state.filter()).await {
            Ok(keys) => keys,
            Err(err) => {
                diags.root_error("Failed to list the KMS keys", format!("{err:#}"));
                return None;
            }
        };
        state.id = string(hash_id(keys.iter().map(|(key, _)| key.key_id.as_str())));
        state.region = string(region);
        state.keys = Value::Value(
            keys.into_iter()
                .map(|(key, key_tags)| Value::Value(key_item(key, key_tags)))
                .collect(),
        );
        Some(state)
    }
}

#[async_trait]
impl DataSource for KmsGrantsDataSource {
    type State<'a> = GrantsDataSourceState<'a>;
    type ProviderMetaState<'a> = ValueEmpty;

    fn schema(&self, _diags: &mut Diagnostics) -> Option<Schema> {
        Some(GrantsDataSourceState::schema())
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
        config: Self::State<'a>,
        _provider_meta_state: Self::ProviderMetaState<'a>,
    ) -> Option<Self::State<'a>> {
        let client = self.client.get(diags)?;
        let mut state = config;
        let region = client.region_of(&state.region);
        let key_id = owned(&state.key_id).unwrap_or_default();

        let grants = match api::list_grants(&client, &region, &key_id).await {
            Ok(grants) => grants,
            Err(err) => {
                diags.root_error("Failed to list the KMS grants", err.to_string());
                return None;
            }
        };
        let name = non_empty(&state.name).map(str::to_owned);
        let grants: Vec<_> = grants
            .into_iter()
            .filter(|grant| name.is_none() || grant.name == name)
            .collect();

        state.id = string(hash_id(grants.iter().map(|grant| grant.grant_id.as_str())));
        state.region = string(region);
        state.grants = Value::Value(
            grants
                .into_iter()
                .map(|grant| {
                    Value::Value(GrantItem {
                        id: string(grant.grant_id),
                        name: opt_string(grant.name),
                        grantee_principal: opt_string(grant.grantee_principal),
                        grantee_principal_type: opt_string(grant.grantee_principal_type),
                        operations: string_values(grant.operations),
                        creator: opt_string(grant.issuing_principal),
                        retiring_principal: opt_string(grant.retiring_principal),
                        creation_date: opt_string(grant.creation_date),
                    })
                })
                .collect(),
        );
        Some(state)
    }
}

#[async_trait]
impl DataSource for KmsDataKeyDataSource {
    type State<'a> = DataKeyState<'a>;
    type ProviderMetaState<'a> = ValueEmpty;

    fn schema(&self, _diags: &mut Diagnostics) -> Option<Schema> {
        Some(DataKeyState::schema())
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
        config: Self::State<'a>,
        _provider_meta_state: Self::ProviderMetaState<'a>,
    ) -> Option<Self::State<'a>> {
        let client = self.client.get(diags)?;
        let mut state = config;
        let region = client.region_of(&state.region);
        let context = tags(&state.encryption_context);

        let request = CreateDataKey {
            key_id: owned(&state.key_id).unwrap_or_default(),
            datakey_length: number(&state.datakey_length).unwrap_or(512).to_string(),
            encryption_context: (!context.is_empty()).then_some(context),
        };
        let data_key = match api::create_data_key(&client, &region, &request).await {
            Ok(data_key) => data_key,
            Err(err) => {
                diags.root_error("Failed to create the data key", err.to_string());
                return None;
            }
        };

        state.id = string(hash_id([data_key.key_id.as_str(), data_key.cipher_text.as_str()]));
        state.region = string(region);
        state.plain_text = string(data_key.plain_text);
        state.cipher_text = string(data_key.cipher_text);
        Some(state)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use wiremock::matchers::{body_json, method, path, path_regex};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use crate::client::testing::{client, PROJECT_ID};

    use super::*;

    async fn key_server() -> MockServer {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(format!("/v1.0/{PROJECT_ID}/kms/list-keys")))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "key_details": [
                    {"key_id": "k1", "key_alias": "app", "key_state": "2", "key_spec": "AES_256"},
                    {"key_id": "k2", "key_alias": "db", "key_state": "2", "key_spec": "SM4"},
                    {"key_id": "k3", "key_alias": "db", "key_state": "3", "key_spec": "SM4"},
                ],
                "truncated": "false",
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path_regex(r"^/v1\.0/[0-9a-f]+/kms/k[0-9]/tags$"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"tags": [{"key": "env", "value": "prod"}]})),
            )
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path(format!("/v1.0/{PROJECT_ID}/kms/get-key-rotation-status")))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "key_rotation_enabled": true,
                "rotation_interval": 365,
                "number_of_rotations": 2,
            })))
            .mount(&server)
            .await;
        server
    }

    #[tokio::test]
    async fn keys_are_filtered_in_order() {
        let server = key_server().await;
        let client = client(&server.uri());
        let filter = KeyFilter {
            key_alias: string("db"),
            ..Default::default()
        };
        let keys = find_keys(&client, crate::client::testing::REGION, &filter)
            .await
            .unwrap();
        let ids: Vec<_> = keys.iter().map(|(key, _)| key.key_id.as_str()).collect();
        assert_eq!(ids, vec!["k2", "k3"]);
        assert_eq!(keys[0].1.get("env").map(String::as_str), Some("prod"));
    }

    #[tokio::test]
    async fn single_key_is_required() {
        let server = key_server().await;
        let client = client(&server.uri());

        let mut ambiguous = KeyDataSourceState {
            key_alias: string("db"),
            ..Default::default()
        };
        assert!(ambiguous.load(&client).await.is_err());

        let mut state = KeyDataSourceState {
            key_alias: string("db"),
            key_state: string("3"),
            ..Default::default()
        };
        state.load(&client).await.unwrap();
        assert_eq!(state.id, string("k3"));
        assert_eq!(state.key_algorithm, string("SM4"));
        assert_eq!(state.rotation_number, Value::Value(2));
    }

    #[tokio::test]
    async fn data_key_request() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(format!("/v1.0/{PROJECT_ID}/kms/create-datakey")))
            .and(body_json(json!({"key_id": "k1", "datakey_length": "256"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "key_id": "k1",
                "plain_text": "00ff",
                "cipher_text": "abcd",
            })))
            .expect(1)
            .mount(&server)
            .await;

        let data_source = KmsDataKeyDataSource::new(client(&server.uri()).into());
        let config = DataKeyState {
            key_id: string("k1"),
            datakey_length: Value::Value(256),
            ..Default::default()
        };
        let state = data_source
            .read(&mut Diagnostics::default(), config, Default::default())
            .await
            .unwrap();
        assert_eq!(state.plain_text, string("00ff"));
        assert_eq!(state.cipher_text, string("abcd"));
    }
}
