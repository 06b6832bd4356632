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

use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use futures::{stream, StreamExt, TryStreamExt};
use tracing::{info, warn};

use tf_provider::value::{Value, ValueEmpty};
use tf_provider::schema::Schema;
use tf_provider::{AttributePath, Diagnostics, Resource};

use crate::client::wait::{wait_for_state, StateChangeConf};
use crate::client::{ClientHandle, DewClient};
use crate::utils::{
    boolean, number, owned, replace_if_changed, string, timeout, TimeoutKind, WithNormalize,
    WithSchema, WithValidate,
};

use super::api::{self, Server, ServerAuth, Task, KEYPAIR_GONE_CODES};
use super::state::{AssociateState, ServerBlock};

const TASK_PENDING: &[&str] = &["READY", "RUNNING"];
const TASK_TARGET: &[&str] = &["SUCCESS"];
const DEFAULT_TASK_TIMEOUT: Duration = Duration::from_secs(600);
const SERVER_CONCURRENCY: usize = 4;

#[derive(Debug, Default, Clone)]
pub struct KpsKeypairAssociateResource {
    client: ClientHandle,
}

impl KpsKeypairAssociateResource {
    pub fn new(client: ClientHandle) -> Self {
        Self { client }
    }
}

/// The task with its status stripped of the operation: `RUNNING_RESET` is `RUNNING`
async fn task_status(
    client: &DewClient,
    region: &str,
    task_id: &str,
) -> Result<Option<(Task, String)>> {
    let task = match api::get_task(client, region, task_id).await {
        Ok(task) => task,
        Err(err) if err.is_not_found() => return Ok(None),
        Err(err) => return Err(err).context("unable to read the keypair task"),
    };
    let status = task
        .task_status
        .split_once('_')
        .map_or(task.task_status.as_str(), |(status, _)| status)
        .to_owned();
    if status == "FAILED" {
        return Err(anyhow!(
            "task {} on server {} failed: {}",
            task.task_id,
            task.server_id.as_deref().unwrap_or_default(),
            task.task_error_msg.as_deref().unwrap_or_default(),
        ));
    }
    Ok(Some((task, status)))
}

async fn wait_for_task(
    client: &DewClient,
    region: &str,
    task_id: &str,
    conf: &StateChangeConf<'_>,
) -> Result<Task> {
    let task = wait_for_state(conf, || task_status(client, region, task_id))
        .await
        .with_context(|| format!("keypair task {task_id} did not complete"))?;
    Ok(task)
}

fn server(block: &ServerBlock) -> Server {
    let auth = match (owned(&block.auth_type), owned(&block.auth_key)) {
        (Some(auth_type), Some(key)) => Some(ServerAuth { auth_type, key }),
        _ => None,
    };
    Server {
        id: owned(&block.id).unwrap_or_default(),
        port: number(&block.port),
        disable_password: boolean(&block.disable_password),
        auth,
    }
}

impl<'a> AssociateState<'a> {
    fn servers(&self) -> Vec<Server> {
        match &self.servers {
            Value::Value(servers) => servers
                .iter()
                .filter_map(|block| match block {
                    Value::Value(block) => Some(server(block)),
                    _ => None,
                })
                .collect(),
            _ => Vec::new(),
        }
    }

    async fn associate(&self, client: &DewClient) -> Result<()> {
        let region = client.region_of(&self.region);
        let keypair_name = owned(&self.keypair_name).unwrap_or_default();
        let conf = StateChangeConf::new(
            TASK_PENDING,
            TASK_TARGET,
            timeout(&self.timeouts, TimeoutKind::Create, DEFAULT_TASK_TIMEOUT),
        );
        let region = region.as_str();
        let keypair_name = keypair_name.as_str();
        let conf = &conf;

        stream::iter(self.servers())
            .map(|server| async move {
                let task_id = api::associate(client, region, keypair_name, &server)
                    .await
                    .with_context(|| format!("unable to associate the server {}", server.id))?;
                wait_for_task(client, region, &task_id, conf).await?;
                info!(keypair = keypair_name, server = %server.id, "keypair associated");
                Ok::<_, anyhow::Error>(())
            })
            .buffer_unordered(SERVER_CONCURRENCY)
            .try_collect::<Vec<()>>()
            .await?;
        Ok(())
    }

    async fn disassociate(&self, client: &DewClient) -> Result<()> {
        let region = client.region_of(&self.region);
        let conf = StateChangeConf::new(
            TASK_PENDING,
            TASK_TARGET,
            timeout(&self.timeouts, TimeoutKind::Delete, DEFAULT_TASK_TIMEOUT),
        );
        let region = region.as_str();
        let conf = &conf;

        stream::iter(self.servers())
            .map(|server| async move {
                let task_id = match api::disassociate(client, region, &server).await {
                    Ok(task_id) => task_id,
                    Err(err) if err.is_gone(KEYPAIR_GONE_CODES) => return Ok(()),
                    Err(err) => {
                        return Err(err).with_context(|| {
                            format!("unable to disassociate the server {}", server.id)
                        })
                    }
                };
                wait_for_task(client, region, &task_id, conf).await?;
                info!(server = %server.id, "keypair disassociated");
                Ok::<_, anyhow::Error>(())
            })
            .buffer_unordered(SERVER_CONCURRENCY)
            .try_collect::<Vec<()>>()
            .await?;
        Ok(())
    }
}

#[async_trait]
impl Resource for KpsKeypairAssociateResource {
    type State<'a> = AssociateState<'a>;
    type PrivateState<'a> = ValueEmpty;
    type ProviderMetaState<'a> = ValueEmpty;

    fn schema(&self, _diags: &mut Diagnostics) -> Option<Schema> {
        Some(AssociateState::schema())
    }

    async fn validate<'a>(&self, diags: &mut Diagnostics, config: Self::State<'a>) -> Option<()> {
        config.validate(diags, AttributePath::default()).await;

        if diags.errors.is_empty() {
            Some(())
        } else {
            None
        }
    }

    /// Servers do not report their keypair, only the keypair itself is checked
    async fn read<'a>(
        &self,
        diags: &mut Diagnostics,
        state: Self::State<'a>,
        private_state: Self::PrivateState<'a>,
        _provider_meta_state: Self::ProviderMetaState<'a>,
    ) -> Option<(Self::State<'a>, Self::PrivateState<'a>)> {
        let client = self.client.get(diags)?;
        let region = client.region_of(&state.region);

        match api::get_keypair(&client, &region, state.keypair_name.as_str()).await {
            Ok(_) => Some((state, private_state)),
            Err(err) if err.is_gone(KEYPAIR_GONE_CODES) => {
                warn!(
                    keypair = state.keypair_name.as_str(),
                    "keypair is gone, removing the association"
                );
                None
            }
            Err(err) => {
                diags.root_error("Failed to read the associated keypair", err.to_string());
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
            "keypair_name",
            &prior_state.keypair_name,
            &state.keypair_name,
        );
        replace_if_changed(&mut replace, "servers", &prior_state.servers, &state.servers);
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

        if let Err(err) = state.associate(&client).await {
            diags.root_error("Failed to associate the keypair", format!("{err:#}"));
            return None;
        }
        state.id = state.keypair_name.clone();
        state.region = string(client.region_of(&state.region));
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
        diags: &mut Diagnostics,
        state: Self::State<'a>,
        _planned_private_state: Self::PrivateState<'a>,
        _provider_meta_state: Self::ProviderMetaState<'a>,
    ) -> Option<()> {
        let client = self.client.get(diags)?;

        if let Err(err) = state.disassociate(&client).await {
            diags.root_error("Failed to disassociate the keypair", format!("{err:#}"));
            return None;
        }
        Some(())
    }

    async fn import<'a>(
        &self,
        diags: &mut Diagnostics,
        _id: String,
    ) -> Option<(Self::State<'a>, Self::PrivateState<'a>)> {
        diags.root_error(
            "Import is not supported",
            "The servers of a keypair association cannot be read back.",
        );
        None
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use crate::client::testing::{client, PROJECT_ID, REGION};
    use crate::client::wait::WaitError;

    use super::*;

    fn conf() -> StateChangeConf<'static> {
        StateChangeConf::new(TASK_PENDING, TASK_TARGET, Duration::from_secs(5))
            .delay(Duration::ZERO)
            .poll_interval(Duration::from_millis(10))
            .not_found_checks(2)
    }

    async fn mock_task(server: &MockServer, task_id: &str, status: &str) {
        Mock::given(method("GET"))
            .and(path(format!("/v3/{PROJECT_ID}/tasks/{task_id}")))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "task_id": task_id,
                "server_id": "s1",
                "task_status": status,
                "task_error_msg": "server is stopped",
            })))
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn task_statuses_lose_their_operation() {
        let server = MockServer::start().await;
        mock_task(&server, "t1", "SUCCESS_RESET").await;

        let client = client(&server.uri());
        let task = wait_for_state(&conf(), || task_status(&client, REGION, "t1"))
            .await
            .unwrap();
        assert_eq!(task.task_id, "t1");
    }

    #[tokio::test]
    async fn failed_task_reports_its_error() {
        let server = MockServer::start().await;
        mock_task(&server, "t1", "FAILED_REPLACE").await;

        let client = client(&server.uri());
        let err = wait_for_state(&conf(), || task_status(&client, REGION, "t1"))
            .await
            .unwrap_err();
        assert!(matches!(err, WaitError::Refresh(_)));
        assert!(err.to_string().contains("server is stopped"));
    }

    #[tokio::test]
    async fn create_associates_every_server() {
        let server = MockServer::start().await;
        for (id, task_id) in [("s1", "t1"), ("s2", "t2")] {
            Mock::given(method("POST"))
                .and(path(format!("/v3/{PROJECT_ID}/keypairs/associate")))
                .and(body_json(json!({"keypair_name": "deploy", "server": {"id": id}})))
                .respond_with(ResponseTemplate::new(200).set_body_json(json!({"task_id": task_id})))
                .expect(1)
                .mount(&server)
                .await;
            mock_task(&server, task_id, "SUCCESS_RESET").await;
        }

        let resource = KpsKeypairAssociateResource::new(client(&server.uri()).into());
        let server_block = |id: &str| {
            Value::Value(ServerBlock {
                id: string(id),
                ..Default::default()
            })
        };
        let timeouts = Value::Value(vec![Value::Value(crate::utils::Timeouts {
            create: string("1m"),
            ..Default::default()
        })]);
        let mut planned = AssociateState {
            keypair_name: string("deploy"),
            servers: Value::Value(vec![server_block("s1"), server_block("s2")]),
            timeouts,
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
        assert_eq!(state.id, string("deploy"));
        assert_eq!(state.region, string(REGION));
    }
}
