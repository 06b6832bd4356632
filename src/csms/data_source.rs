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

use async_trait::async_trait;

use tf_provider::value::{Value, ValueEmpty};
use tf_provider::schema::Schema;
use tf_provider::{AttributePath, DataSource, Diagnostics};

use crate::utils::{
    data_source_struct, hash_id, matches_filter, non_empty, opt_string, owned, string,
    string_values, timestamp, WithSchema, WithValidate,
};

use super::api::{self, Event, Secret};
use super::state::{
    EventItem, EventsDataSourceState, SecretItem, SecretVersionState, SecretsDataSourceState,
};

data_source_struct!(CsmsSecretsDataSource);
data_source_struct!(CsmsSecretVersionDataSource);
data_source_struct!(CsmsEventsDataSource);

impl<'a> SecretsDataSourceState<'a> {
    fn matches(&self, secret: &Secret) -> bool {
        matches_filter(&self.name, Some(secret.name.as_str()))
            && matches_filter(&self.secret_id, Some(secret.id.as_str()))
            && matches_filter(&self.status, secret.state.as_deref())
            && matches_filter(
                &self.enterprise_project_id,
                secret.enterprise_project_id.as_deref(),
            )
    }
}

fn secret_item<'a>(secret: Secret) -> SecretItem<'a> {
    SecretItem {
        id: string(secret.id),
        name: string(secret.name),
        status: opt_string(secret.state),
        kms_key_id: opt_string(secret.kms_key_id),
        description: opt_string(secret.description),
        secret_type: opt_string(secret.secret_type),
        auto_rotation: secret.auto_rotation.map_or(Value::Null, Value::Value),
        rotation_period: opt_string(secret.rotation_period),
        rotation_time: timestamp(secret.rotation_time),
        next_rotation_time: timestamp(secret.next_rotation_time),
        event_subscriptions: string_values(secret.event_subscriptions),
        enterprise_project_id: opt_string(secret.enterprise_project_id),
        created_at: timestamp(secret.create_time),
        updated_at: timestamp(secret.update_time),
        scheduled_deleted_at: timestamp(secret.scheduled_delete_time),
    }
}

fn event_item<'a>(event: Event) -> EventItem<'a> {
    let notification = event.notification.unwrap_or_default();
    EventItem {
        id: string(event.event_id),
        name: string(event.name),
        event_types: string_values(event.event_types),
        status: opt_string(event.state),
        target_type: opt_string(Some(notification.target_type)),
        target_id: opt_string(Some(notification.target_id)),
        target_name: opt_string(Some(notification.target_name)),
        created_at: timestamp(event.create_time),
        updated_at: timestamp(event.update_time),
    }
}

#[async_trait]
impl DataSource for CsmsSecretsDataSource {
    type State<'a> = SecretsDataSourceState<'a>;
    type ProviderMetaState<'a> = ValueEmpty;

    fn schema(&self, _diags: &mut Diagnostics) -> Option<Schema> {
        Some(SecretsDataSourceState::schema())
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

        let secrets = match api::list_secrets(&client, &region, non_empty(&state.event_name)).await
        {
            Ok(secrets) => secrets,
            Err(err) => {
                diags.root_error("Failed to list the CSMS secrets", err.to_string());
                return None;
            }
        };
        let secrets: Vec<_> = secrets
            .into_iter()
            .filter(|secret| state.matches(secret))
            .collect();

        state.id = string(hash_id(secrets.iter().map(|secret| secret.id.as_str())));
        state.region = string(region);
        state.secrets = Value::Value(
            secrets
                .into_iter()
                .map(|secret| Value::Value(secret_item(secret)))
                .collect(),
        );
        Some(state)
    }
}

#[async_trait]
impl DataSource for CsmsSecretVersionDataSource {
    type State<'a> = SecretVersionState<'a>;
    type ProviderMetaState<'a> = ValueEmpty;

    fn schema(&self, _diags: &mut Diagnostics) -> Option<Schema> {
        Some(SecretVersionState::schema())
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
        let secret_name = owned(&state.secret_name).unwrap_or_default();
        let version = non_empty(&state.version).unwrap_or("latest");

        let version = match api::get_version(&client, &region, &secret_name, version).await {
            Ok(version) => version,
            Err(err) => {
                diags.root_error("Failed to read the CSMS secret version", err.to_string());
                return None;
            }
        };
        let metadata = version.version_metadata;

        state.id = string(format!("{secret_name}/{}", metadata.id));
        state.region = string(region);
        state.version = string(metadata.id);
        state.secret_text = opt_string(version.secret_string);
        state.secret_binary = opt_string(version.secret_binary);
        state.version_stages = string_values(metadata.version_stages);
        state.kms_key_id = opt_string(metadata.kms_key_id);
        state.created_at = timestamp(metadata.create_time);
        state.expire_time = timestamp(metadata.expire_time);
        Some(state)
    }
}

#[async_trait]
impl DataSource for CsmsEventsDataSource {
    type State<'a> = EventsDataSourceState<'a>;
    type ProviderMetaState<'a> = ValueEmpty;

    fn schema(&self, _diags: &mut Diagnostics) -> Option<Schema> {
        Some(EventsDataSourceState::schema())
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

        let events = match api::list_events(&client, &region).await {
            Ok(events) => events,
            Err(err) => {
                diags.root_error("Failed to list the CSMS events", err.to_string());
                return None;
            }
        };
        let events: Vec<_> = events
            .into_iter()
            .filter(|event| {
                matches_filter(&state.name, Some(event.name.as_str()))
                    && matches_filter(&state.status, event.state.as_deref())
            })
            .collect();

        state.id = string(hash_id(events.iter().map(|event| event.event_id.as_str())));
        state.region = string(region);
        state.events = Value::Value(
            events
                .into_iter()
                .map(|event| Value::Value(event_item(event)))
                .collect(),
        );
        Some(state)
    }
}
