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

use std::collections::HashSet;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use tracing::{info, warn};

use tf_provider::value::ValueEmpty;
use tf_provider::schema::Schema;
use tf_provider::{AttributePath, Diagnostics, Resource};

use crate::client::wait::{wait_for_state, StateChangeConf, WaitError};
use crate::client::{ClientHandle, DewClient};
use crate::utils::{
    owned, replace_if_changed, string, timeout, TimeoutKind, WithNormalize, WithSchema,
    WithValidate,
};

use super::api::{self, Task, SECRET_GONE_CODES};
use super::state::RotateState;

const ROTATION_PENDING: &[&str] = &["PENDING", "EXECUTING"];
const ROTATION_TARGET: &[&str] = &["SUCCESS"];
const DEFAULT_ROTATION_TIMEOUT: Duration = Duration::from_secs(600);

#[derive(Debug, Default, Clone)]
pub struct CsmsSecretRotateResource {
    client: ClientHandle,
}

impl CsmsSecretRotateResource {
    pub fn new(client: ClientHandle) -> Self {
        Self { client }
    }
}

/// Latest rotation task of the secret that is not in `known`, with its status
async fn rotation_task(
    client: &DewClient,
    region: &str,
    secret_name: &str,
    known: &HashSet<String>,
) -> Result<Option<(Task, String)>> {
    let tasks = api::list_tasks(client, region, secret_name).await?;
    let Some(task) = tasks
        .into_iter()
        .filter(|task| !known.contains(&task.task_id))
        .max_by_key(|task| task.task_time.unwrap_or_default())
    else {
        return Ok(None);
    };
    if task.task_status == "FAILED" {
        return Err(anyhow!(
            "rotation task {} failed: [{}] {}",
            task.task_id,
            task.task_error_code.as_deref().unwrap_or_default(),
            task.task_error_msg.as_deref().unwrap_or_default(),
        ));
    }
    let status = task.task_status.clone();
    Ok(Some((task, status)))
}

async fn wait_for_rotation(
    client: &DewClient,
    region: &str,
    secret_name: &str,
    known: &HashSet<String>,
    conf: &StateChangeConf<'_>,
) -> Result<Task, WaitError> {
    wait_for_state(conf, || rotation_task(client, region, secret_name, known)).await
}

impl<'a> RotateState<'a> {
    async fn rotate(&mut self, client: &DewClient) -> Result<()> {
        let region = client.region_of(&self.region);
        let secret_name = owned(&self.secret_name).unwrap_or_default();

        let known: HashSet<String> = api::list_tasks(client, &region, &secret_name)
            .await
            .context("unable to list the rotation tasks of the secret")?
            .into_iter()
            .map(|task| task.task_id)
            .collect();
        api::rotate_secret(client, &region, &secret_name)
            .await
            .context("unable to rotate the secret")?;

        let conf = StateChangeConf::new(
            ROTATION_PENDING,
            ROTATION_TARGET,
            timeout(&self.timeouts, TimeoutKind::Create, DEFAULT_ROTATION_TIMEOUT),
        );
        let task = wait_for_rotation(client, &region, &secret_name, &known, &conf)
            .await
            .context("rotation of the secret did not complete")?;
        info!(secret = %secret_name, task_id = %task.task_id, "secret rotated");

        let latest = api::get_version(client, &region, &secret_name, "latest")
            .await
            .context("unable to read the rotated version of the secret")?;
        self.id = string(secret_name);
        self.region = string(region);
        self.version_id = string(latest.version_metadata.id);
        Ok(())
    }
}

#[async_trait]
impl Resource for CsmsSecretRotateResource {
    type State<'a> = RotateState<'a>;
    type PrivateState<'a> = ValueEmpty;
    type ProviderMetaState<'a> = ValueEmpty;

    fn schema(&self, _diags: &mut Diagnostics) -> Option<Schema> {
        Some(RotateState::schema())
    }

    async fn validate<'a>(&self, diags: &mut Diagnostics, config: Self::State<'a>) -> Option<()> {
        config.validate(diags, AttributePath::default()).await;

        if diags.errors.is_empty() {
            Some(())
        } else {
            None
        }
    }

    /// Only checks that the rotated secret still exists
    async fn read<'a>(
        &self,
        diags: &mut Diagnostics,
        state: Self::State<'a>,
        private_state: Self::PrivateState<'a>,
        _provider_meta_state: Self::ProviderMetaState<'a>,
    ) -> Option<(Self::State<'a>, Self::PrivateState<'a>)> {
        let client = self.client.get(diags)?;
        let region = client.region_of(&state.region);

        match api::get_secret(&client, &region, state.id.as_str()).await {
            Ok(_) => Some((state, private_state)),
            Err(err) if err.is_gone(SECRET_GONE_CODES) => {
                warn!(secret = state.id.as_str(), "rotated secret is gone, removing the rotation");
                None
            }
            Err(err) => {
                diags.root_error("Failed to read the rotated CSMS secret", err.to_string());
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
        replace_if_changed(
            &mut replace,
            "secret_name",
            &prior_state.secret_name,
            &state.secret_name,
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

        if let Err(err) = state.rotate(&client).await {
            diags.root_error("Failed to rotate the CSMS secret", format!("{err:#}"));
            return None;
        }
        state.settle();
        Some((state, private_state))
    }

    /// Only the timeouts can change in place
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
        _diags: &mut Diagnostics,
        state: Self::State<'a>,
        _planned_private_state: Self::PrivateState<'a>,
        _provider_meta_state: Self::ProviderMetaState<'a>,
    ) -> Option<()> {
        info!(
            secret = state.id.as_str(),
            "rotation removed from the state, the secret is unchanged"
        );
        Some(())
    }

    async fn import<'a>(
        &self,
        _diags: &mut Diagnostics,
        id: String,
    ) -> Option<(Self::State<'a>, Self::PrivateState<'a>)> {
        let state = RotateState {
            id: string(id.as_str()),
            secret_name: string(id),
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

    use crate::client::testing::{client, PROJECT_ID, REGION};

    use super::*;

    fn conf() -> StateChangeConf<'static> {
        StateChangeConf::new(ROTATION_PENDING, ROTATION_TARGET, Duration::from_secs(5))
            .delay(Duration::ZERO)
            .poll_interval(Duration::from_millis(10))
            .not_found_checks(2)
    }

    async fn mock_tasks(server: &MockServer, tasks: serde_json::Value) {
        Mock::given(method("GET"))
            .and(path(format!("/v1/{PROJECT_ID}/csms/tasks")))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"tasks": tasks, "page_info": {"next_marker": null}})),
            )
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn previous_tasks_are_ignored() {
        let server = MockServer::start().await;
        mock_tasks(
            &server,
            json!([
                {"task_id": "t0", "task_status": "SUCCESS", "task_time": 2000},
                {"task_id": "t1", "task_status": "SUCCESS", "task_time": 1000},
            ]),
        )
        .await;

        let known = HashSet::from(["t0".to_owned()]);
        let task = wait_for_rotation(&client(&server.uri()), REGION, "db", &known, &conf())
            .await
            .unwrap();
        assert_eq!(task.task_id, "t1");
    }

    #[tokio::test]
    async fn failed_rotation_reports_the_task_error() {
        let server = MockServer::start().await;
        mock_tasks(
            &server,
            json!([{
                "task_id": "t1",
                "task_status": "FAILED",
                "task_error_code": "CSMS.0601",
                "task_error_msg": "function timeout",
            }]),
        )
        .await;

        let err = wait_for_rotation(
            &client(&server.uri()),
            REGION,
            "db",
            &HashSet::new(),
            &conf(),
        )
        .await
        .unwrap_err();
        assert!(err.to_string().contains("function timeout"));
    }

    #[tokio::test]
    async fn missing_task_is_not_found() {
        let server = MockServer::start().await;
        mock_tasks(&server, json!([])).await;

        let err = wait_for_rotation(
            &client(&server.uri()),
            REGION,
            "db",
            &HashSet::new(),
            &conf(),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, WaitError::NotFound(_)));
    }
}
