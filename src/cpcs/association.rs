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

use anyhow::{Context, Result};
use async_trait::async_trait;
use tracing::{info, warn};

use tf_provider::value::ValueEmpty;
use tf_provider::schema::Schema;
use tf_provider::{AttributePath, Diagnostics, Resource};

use crate::client::wait::{wait_for_state, StateChangeConf};
use crate::client::{ClientHandle, DewClient};
use crate::utils::{
    assign, keep_created, opt_string, owned, replace_if_changed, string, timeout, TimeoutKind,
    WithNormalize, WithSchema, WithValidate,
};

use super::api::{self, AppCluster, CPCS_GONE_CODES};
use super::state::AssociationState;

const ASSOCIATE_PENDING: &[&str] = &["ASSOCIATING"];
const ASSOCIATE_TARGET: &[&str] = &["ASSOCIATED"];
const ASSOCIATE_FAILED: &[&str] = &["ASSOCIATE_FAILED"];
const DISASSOCIATE_PENDING: &[&str] = &["ASSOCIATED", "DISASSOCIATING"];
const DISASSOCIATE_TARGET: &[&str] = &["DISASSOCIATED"];
const DEFAULT_ASSOCIATION_TIMEOUT: Duration = Duration::from_secs(600);

#[derive(Debug, Default, Clone)]
pub struct CpcsAppClusterAssociationResource {
    client: ClientHandle,
}

impl CpcsAppClusterAssociationResource {
    pub fn new(client: ClientHandle) -> Self {
        Self { client }
    }
}

/// The cluster as seen from the app, `None` when it is not associated
async fn find_cluster(
    client: &DewClient,
    region: &str,
    app_id: &str,
    cluster_id: &str,
) -> Result<Option<AppCluster>> {
    let clusters = match api::list_app_clusters(client, region, app_id).await {
        Ok(clusters) => clusters,
        Err(err) if err.is_gone(CPCS_GONE_CODES) => return Ok(None),
        Err(err) => return Err(err).context("unable to list the clusters of the app"),
    };
    Ok(clusters
        .into_iter()
        .find(|cluster| cluster.cluster_id == cluster_id))
}

async fn association_status(
    client: &DewClient,
    region: &str,
    app_id: &str,
    cluster_id: &str,
) -> Result<Option<(AppCluster, String)>> {
    let cluster = find_cluster(client, region, app_id, cluster_id).await?;
    Ok(cluster.map(|cluster| {
        let status = cluster.status.clone();
        (cluster, status)
    }))
}

/// A cluster missing from the app counts as `DISASSOCIATED`
async fn disassociation_status(
    client: &DewClient,
    region: &str,
    app_id: &str,
    cluster_id: &str,
) -> Result<Option<((), String)>> {
    let status = find_cluster(client, region, app_id, cluster_id)
        .await?
        .map_or_else(|| DISASSOCIATE_TARGET[0].to_owned(), |cluster| cluster.status);
    Ok(Some(((), status)))
}

impl<'a> AssociationState<'a> {
    fn ids(&self) -> (String, String) {
        (
            owned(&self.app_id).unwrap_or_default(),
            owned(&self.cluster_id).unwrap_or_default(),
        )
    }

    async fn load(&mut self, client: &DewClient, refresh: bool) -> Result<bool> {
        let region = client.region_of(&self.region);
        let (app_id, cluster_id) = self.ids();
        let Some(cluster) = find_cluster(client, &region, &app_id, &cluster_id).await? else {
            return Ok(false);
        };

        assign(&mut self.region, string(region.as_str()), refresh);
        assign(&mut self.cluster_name, opt_string(cluster.cluster_name), refresh);
        assign(&mut self.status, string(cluster.status), refresh);
        Ok(true)
    }

    async fn associate(&mut self, client: &DewClient) -> Result<()> {
        let region = client.region_of(&self.region);
        let (app_id, cluster_id) = self.ids();

        api::cluster_association(client, &region, &app_id, &cluster_id, "association")
            .await
            .context("unable to associate the cluster with the app")?;
        self.id = string(format!("{app_id}/{cluster_id}"));

        let conf = StateChangeConf::new(
            ASSOCIATE_PENDING,
            ASSOCIATE_TARGET,
            timeout(&self.timeouts, TimeoutKind::Create, DEFAULT_ASSOCIATION_TIMEOUT),
        )
        .failed(ASSOCIATE_FAILED);
        wait_for_state(&conf, || {
            association_status(client, &region, &app_id, &cluster_id)
        })
        .await
        .context("association did not complete")?;
        info!(app_id = %app_id, cluster_id = %cluster_id, "cluster associated");
        Ok(())
    }

    async fn disassociate(&self, client: &DewClient) -> Result<()> {
        let region = client.region_of(&self.region);
        let (app_id, cluster_id) = self.ids();

        match api::cluster_association(client, &region, &app_id, &cluster_id, "disassociation")
            .await
        {
            Ok(()) => (),
            Err(err) if err.is_gone(CPCS_GONE_CODES) => return Ok(()),
            Err(err) => {
                return Err(err).context("unable to disassociate the cluster from the app")
            }
        }

        let conf = StateChangeConf::new(
            DISASSOCIATE_PENDING,
            DISASSOCIATE_TARGET,
            timeout(&self.timeouts, TimeoutKind::Delete, DEFAULT_ASSOCIATION_TIMEOUT),
        );
        wait_for_state(&conf, || {
            disassociation_status(client, &region, &app_id, &cluster_id)
        })
        .await
        .context("disassociation did not complete")?;
        info!(app_id = %app_id, cluster_id = %cluster_id, "cluster disassociated");
        Ok(())
    }
}

#[async_trait]
impl Resource for CpcsAppClusterAssociationResource {
    type State<'a> = AssociationState<'a>;
    type PrivateState<'a> = ValueEmpty;
    type ProviderMetaState<'a> = ValueEmpty;

    fn schema(&self, _diags: &mut Diagnostics) -> Option<Schema> {
        Some(AssociationState::schema())
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
                    association = state.id.as_str(),
                    "association is gone, removing it from the state"
                );
                None
            }
            Err(err) => {
                diags.root_error("Failed to read the CPCS cluster association", format!("{err:#}"));
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
        replace_if_changed(
            &mut replace,
            "cluster_id",
            &prior_state.cluster_id,
            &state.cluster_id,
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

        if let Err(err) = state.associate(&client).await {
            diags.root_error("Failed to associate the CPCS cluster", format!("{err:#}"));
            let id = state.id.clone();
            return keep_created(&id, state, private_state);
        }
        match state.load(&client, false).await {
            Ok(true) => (),
            Ok(false) => {
                diags.root_error(
                    "Failed to read the CPCS cluster association",
                    "The association disappeared right after its creation.",
                );
                return None;
            }
            Err(err) => {
                diags.root_error("Failed to read the CPCS cluster association", format!("{err:#}"));
                let id = state.id.clone();
                return keep_created(&id, state, private_state);
            }
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
        diags: &mut Diagnostics,
        state: Self::State<'a>,
        _planned_private_state: Self::PrivateState<'a>,
        _provider_meta_state: Self::ProviderMetaState<'a>,
    ) -> Option<()> {
        let client = self.client.get(diags)?;

        if let Err(err) = state.disassociate(&client).await {
            diags.root_error("Failed to disassociate the CPCS cluster", format!("{err:#}"));
            return None;
        }
        Some(())
    }

    /// `<app_id>/<cluster_id>`
    async fn import<'a>(
        &self,
        diags: &mut Diagnostics,
        id: String,
    ) -> Option<(Self::State<'a>, Self::PrivateState<'a>)> {
        let Some((app_id, cluster_id)) = id.split_once('/') else {
            diags.root_error(
                "Invalid import id",
                format!("Expected `<app_id>/<cluster_id>`, got `{id}`."),
            );
            return None;
        };
        let state = AssociationState {
            id: string(id.as_str()),
            app_id: string(app_id),
            cluster_id: string(cluster_id),
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
    use crate::client::wait::WaitError;

    use super::*;

    fn conf(
        pending: &'static [&'static str],
        target: &'static [&'static str],
    ) -> StateChangeConf<'static> {
        StateChangeConf::new(pending, target, Duration::from_secs(5))
            .failed(ASSOCIATE_FAILED)
            .delay(Duration::ZERO)
            .poll_interval(Duration::from_millis(10))
            .not_found_checks(2)
    }

    async fn mock_clusters(server: &MockServer, clusters: serde_json::Value) {
        Mock::given(method("GET"))
            .and(path(format!("/v1/{PROJECT_ID}/dew/cpcs/apps/a1/cluster")))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "result": clusters,
                "total_num": 1,
            })))
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn associated_cluster_is_found() {
        let server = MockServer::start().await;
        mock_clusters(
            &server,
            json!([{"cluster_id": "c1", "cluster_name": "hsm", "status": "ASSOCIATED"}]),
        )
        .await;

        let client = client(&server.uri());
        let cluster = wait_for_state(&conf(ASSOCIATE_PENDING, ASSOCIATE_TARGET), || {
            association_status(&client, REGION, "a1", "c1")
        })
        .await
        .unwrap();
        assert_eq!(cluster.cluster_name.as_deref(), Some("hsm"));
    }

    #[tokio::test]
    async fn failed_association() {
        let server = MockServer::start().await;
        mock_clusters(
            &server,
            json!([{"cluster_id": "c1", "status": "ASSOCIATE_FAILED"}]),
        )
        .await;

        let client = client(&server.uri());
        let err = wait_for_state(&conf(ASSOCIATE_PENDING, ASSOCIATE_TARGET), || {
            association_status(&client, REGION, "a1", "c1")
        })
        .await
        .unwrap_err();
        assert!(matches!(err, WaitError::Failed(state) if state == "ASSOCIATE_FAILED"));
    }

    #[tokio::test]
    async fn removed_cluster_is_disassociated() {
        let server = MockServer::start().await;
        mock_clusters(&server, json!([{"cluster_id": "c2", "status": "ASSOCIATED"}])).await;

        let client = client(&server.uri());
        wait_for_state(&conf(DISASSOCIATE_PENDING, DISASSOCIATE_TARGET), || {
            disassociation_status(&client, REGION, "a1", "c1")
        })
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn destroy_waits_for_removal() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(format!(
                "/v1/{PROJECT_ID}/dew/cpcs/apps/a1/cluster/disassociation"
            )))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;
        mock_clusters(&server, json!([])).await;

        let resource = CpcsAppClusterAssociationResource::new(client(&server.uri()).into());
        let state = AssociationState {
            id: string("a1/c1"),
            app_id: string("a1"),
            cluster_id: string("c1"),
            ..Default::default()
        };
        let mut diags = Diagnostics::default();
        let destroyed = resource
            .destroy(&mut diags, state, Default::default(), Default::default())
            .await;
        assert!(destroyed.is_some());
        assert!(diags.errors.is_empty());
    }
}
