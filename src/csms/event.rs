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
    assign, opt_string, owned, replace_if_changed, string, string_values, strings, timestamp,
    WithNormalize, WithSchema, WithValidate,
};

use super::api::{self, CreateEvent, Notification, UpdateEvent, SECRET_GONE_CODES};
use super::state::{EventState, DEFAULT_TARGET_TYPE};

#[derive(Debug, Default, Clone)]
pub struct CsmsEventResource {
    client: ClientHandle,
}

impl CsmsEventResource {
    pub fn new(client: ClientHandle) -> Self {
        Self { client }
    }
}

impl<'a> EventState<'a> {
    fn notification(&self) -> Notification {
        Notification {
            target_type: owned(&self.target_type).unwrap_or_else(|| DEFAULT_TARGET_TYPE.to_owned()),
            target_id: owned(&self.target_id).unwrap_or_default(),
            target_name: owned(&self.target_name).unwrap_or_default(),
        }
    }

    async fn load(&mut self, client: &DewClient, refresh: bool) -> Result<bool> {
        let region = client.region_of(&self.region);
        let event = match api::get_event(client, &region, self.id.as_str()).await {
            Ok(event) => event,
            Err(err) if err.is_gone(SECRET_GONE_CODES) => return Ok(false),
            Err(err) => return Err(err).context("unable to read the event"),
        };
        let notification = event.notification.unwrap_or_default();

        assign(&mut self.region, string(region.as_str()), refresh);
        assign(&mut self.name, string(event.name.as_str()), refresh);
        assign(&mut self.event_id, string(event.event_id), refresh);
        assign(&mut self.event_types, string_values(event.event_types), refresh);
        assign(&mut self.status, opt_string(event.state), refresh);
        assign(
            &mut self.target_type,
            opt_string(Some(notification.target_type)),
            refresh,
        );
        assign(
            &mut self.target_id,
            opt_string(Some(notification.target_id)),
            refresh,
        );
        assign(
            &mut self.target_name,
            opt_string(Some(notification.target_name)),
            refresh,
        );
        assign(&mut self.created_at, timestamp(event.create_time), refresh);
        assign(&mut self.updated_at, timestamp(event.update_time), refresh);
        Ok(true)
    }
}

#[async_trait]
impl Resource for CsmsEventResource {
    type State<'a> = EventState<'a>;
    type PrivateState<'a> = ValueEmpty;
    type ProviderMetaState<'a> = ValueEmpty;

    fn schema(&self, _diags: &mut Diagnostics) -> Option<Schema> {
        Some(EventState::schema())
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
                warn!(event = state.id.as_str(), "event is gone, removing it from the state");
                None
            }
            Err(err) => {
                diags.root_error("Failed to read the CSMS event", format!("{err:#}"));
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
        if state != prior_state {
            state.updated_at = Value::Unknown;
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
        let name = owned(&state.name).unwrap_or_default();

        let request = CreateEvent {
            name: name.clone(),
            event_types: strings(&state.event_types),
            state: owned(&state.status).unwrap_or_default(),
            notification: state.notification(),
        };
        if let Err(err) = api::create_event(&client, &region, &request).await {
            diags.root_error("Failed to create the CSMS event", err.to_string());
            return None;
        }
        info!(event = %name, "event created");
        state.id = string(name);

        match state.load(&client, false).await {
            Ok(true) => (),
            Ok(false) => {
                diags.root_error(
                    "Failed to read the created CSMS event",
                    "The event disappeared right after its creation.",
                );
                return None;
            }
            Err(err) => {
                diags.root_error("Failed to read the created CSMS event", format!("{err:#}"));
                return None;
            }
        }
        state.settle();
        Some((state, private_state))
    }

    async fn update<'a>(
        &self,
        diags: &mut Diagnostics,
        _prior_state: Self::State<'a>,
        planned_state: Self::State<'a>,
        _config_state: Self::State<'a>,
        private_state: Self::PrivateState<'a>,
        _provider_meta_state: Self::ProviderMetaState<'a>,
    ) -> Option<(Self::State<'a>, Self::PrivateState<'a>)> {
        let client = self.client.get(diags)?;
        let mut state = planned_state;
        let region = client.region_of(&state.region);

        let request = UpdateEvent {
            event_types: strings(&state.event_types),
            state: owned(&state.status).unwrap_or_default(),
            notification: state.notification(),
        };
        if let Err(err) = api::update_event(&client, &region, state.id.as_str(), &request).await {
            diags.root_error("Failed to update the CSMS event", err.to_string());
            return None;
        }

        match state.load(&client, false).await {
            Ok(true) => (),
            Ok(false) => {
                diags.root_error(
                    "Failed to read the updated CSMS event",
                    "The event disappeared during its update.",
                );
                return None;
            }
            Err(err) => {
                diags.root_error("Failed to read the updated CSMS event", format!("{err:#}"));
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

        match api::delete_event(&client, &region, state.id.as_str()).await {
            Ok(()) => Some(()),
            Err(err) if err.is_gone(SECRET_GONE_CODES) => Some(()),
            Err(err) => {
                diags.root_error("Failed to delete the CSMS event", err.to_string());
                None
            }
        }
    }

    async fn import<'a>(
        &self,
        _diags: &mut Diagnostics,
        id: String,
    ) -> Option<(Self::State<'a>, Self::PrivateState<'a>)> {
        let state = EventState {
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
    async fn create_with_default_target_type() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(format!("/v1/{PROJECT_ID}/csms/events")))
            .and(body_json(json!({
                "name": "on-rotation",
                "event_types": ["SECRET_ROTATED"],
                "state": "ENABLED",
                "notification": {
                    "target_type": "SMN",
                    "target_id": "urn:smn:topic",
                    "target_name": "topic",
                },
            })))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path(format!("/v1/{PROJECT_ID}/csms/events/on-rotation")))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"event": {
                "event_id": "e1",
                "name": "on-rotation",
                "event_types": ["SECRET_ROTATED"],
                "state": "ENABLED",
                "notification": {
                    "target_type": "SMN",
                    "target_id": "urn:smn:topic",
                    "target_name": "topic",
                },
                "create_time": 1704067200000i64,
            }})))
            .mount(&server)
            .await;

        let resource = CsmsEventResource::new(client(&server.uri()).into());
        let mut planned = EventState {
            name: string("on-rotation"),
            event_types: string_values(["SECRET_ROTATED".to_owned()]),
            status: string("ENABLED"),
            target_id: string("urn:smn:topic"),
            target_name: string("topic"),
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
        assert_eq!(state.id, string("on-rotation"));
        assert_eq!(state.event_id, string("e1"));
        assert_eq!(state.target_type, string("SMN"));
        assert_eq!(state.created_at, string("2024-01-01T00:00:00Z"));
        assert!(state.updated_at.is_null());
    }

    #[tokio::test]
    async fn change_plans_a_new_update_time() {
        let resource = CsmsEventResource::default();
        let prior = EventState {
            id: string("on-rotation"),
            name: string("on-rotation"),
            status: string("ENABLED"),
            updated_at: string("2024-01-01T00:00:00Z"),
            ..Default::default()
        };
        let proposed = EventState {
            status: string("DISABLED"),
            ..prior.clone()
        };
        let (state, _, replace) = resource
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
        assert!(replace.is_empty());
        assert!(state.updated_at.is_unknown());
    }
}
