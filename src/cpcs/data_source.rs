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
    data_source_struct, hash_id, matches_filter, non_empty, opt_string, string, timestamp,
    WithSchema, WithValidate,
};

use super::api::{self, App, Cluster, Instance};
use super::state::{
    AppItem, AppsDataSourceState, ClusterItem, ClustersDataSourceState, InstanceItem,
    InstancesDataSourceState,
};

data_source_struct!(CpcsAppsDataSource);
data_source_struct!(CpcsClustersDataSource);
data_source_struct!(CpcsInstancesDataSource);

fn app_item<'a>(app: App) -> AppItem<'a> {
    AppItem {
        app_id: string(app.app_id),
        app_name: string(app.app_name),
        vpc_id: opt_string(app.vpc_id),
        vpc_name: opt_string(app.vpc_name),
        subnet_id: opt_string(app.subnet_id),
        subnet_name: opt_string(app.subnet_name),
        description: opt_string(app.description),
        account_name: opt_string(app.account_name),
        created_at: timestamp(app.create_time),
    }
}

impl<'a> ClustersDataSourceState<'a> {
    fn matches(&self, cluster: &Cluster) -> bool {
        matches_filter(&self.name, Some(cluster.cluster_name.as_str()))
            && matches_filter(&self.status, cluster.status.as_deref())
            && matches_filter(&self.service_type, cluster.service_type.as_deref())
    }
}

fn cluster_item<'a>(cluster: Cluster) -> ClusterItem<'a> {
    ClusterItem {
        cluster_id: string(cluster.cluster_id),
        cluster_name: string(cluster.cluster_name),
        status: opt_string(cluster.status),
        service_type: opt_string(cluster.service_type),
        az: opt_string(cluster.az),
        instance_num: cluster.instance_num.map_or(Value::Null, Value::Value),
        created_at: timestamp(cluster.create_time),
    }
}

impl<'a> InstancesDataSourceState<'a> {
    fn matches(&self, instance: &Instance) -> bool {
        matches_filter(&self.name, Some(instance.instance_name.as_str()))
            && matches_filter(&self.status, instance.status.as_deref())
            && matches_filter(&self.service_type, instance.service_type.as_deref())
            && matches_filter(&self.cluster_id, instance.cluster_id.as_deref())
    }
}

fn instance_item<'a>(instance: Instance) -> InstanceItem<'a> {
    InstanceItem {
        instance_id: string(instance.instance_id),
        instance_name: string(instance.instance_name),
        status: opt_string(instance.status),
        service_type: opt_string(instance.service_type),
        cluster_id: opt_string(instance.cluster_id),
        az: opt_string(instance.az),
        specification: opt_string(instance.specification),
        image_name: opt_string(instance.image_name),
        created_at: timestamp(instance.create_time),
        expired_at: timestamp(instance.expired_time),
    }
}

#[async_trait]
impl DataSource for CpcsAppsDataSource {
    type State<'a> = AppsDataSourceState<'a>;
    type ProviderMetaState<'a> = ValueEmpty;

    fn schema(&self, _diags: &mut Diagnostics) -> Option<Schema> {
        Some(AppsDataSourceState::schema())
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

        let apps = match api::list_apps(&client, &region, non_empty(&state.app_name)).await {
            Ok(apps) => apps,
            Err(err) => {
                diags.root_error("Failed to list the CPCS apps", err.to_string());
                return None;
            }
        };
        let apps: Vec<_> = apps
            .into_iter()
            .filter(|app| matches_filter(&state.vpc_id, app.vpc_id.as_deref()))
            .collect();

        state.id = string(hash_id(apps.iter().map(|app| app.app_id.as_str())));
        state.region = string(region);
        state.apps = Value::Value(
            apps.into_iter()
                .map(|app| Value::Value(app_item(app)))
                .collect(),
        );
        Some(state)
    }
}

#[async_trait]
impl DataSource for CpcsClustersDataSource {
    type State<'a> = ClustersDataSourceState<'a>;
    type ProviderMetaState<'a> = ValueEmpty;

    fn schema(&self, _diags: &mut Diagnostics) -> Option<Schema> {
        Some(ClustersDataSourceState::schema())
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

        let clusters = match api::list_clusters(&client, &region).await {
            Ok(clusters) => clusters,
            Err(err) => {
                diags.root_error("Failed to list the CPCS clusters", err.to_string());
                return None;
            }
        };
        let clusters: Vec<_> = clusters
            .into_iter()
            .filter(|cluster| state.matches(cluster))
            .collect();

        state.id = string(hash_id(
            clusters.iter().map(|cluster| cluster.cluster_id.as_str()),
        ));
        state.region = string(region);
        state.clusters = Value::Value(
            clusters
                .into_iter()
                .map(|cluster| Value::Value(cluster_item(cluster)))
                .collect(),
        );
        Some(state)
    }
}

#[async_trait]
impl DataSource for CpcsInstancesDataSource {
    type State<'a> = InstancesDataSourceState<'a>;
    type ProviderMetaState<'a> = ValueEmpty;

    fn schema(&self, _diags: &mut Diagnostics) -> Option<Schema> {
        Some(InstancesDataSourceState::schema())
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

        let instances = match api::list_instances(&client, &region).await {
            Ok(instances) => instances,
            Err(err) => {
                diags.root_error("Failed to list the CPCS instances", err.to_string());
                return None;
            }
        };
        let instances: Vec<_> = instances
            .into_iter()
            .filter(|instance| state.matches(instance))
            .collect();

        state.id = string(hash_id(
            instances.iter().map(|instance| instance.instance_id.as_str()),
        ));
        state.region = string(region);
        state.instances = Value::Value(
            instances
                .into_iter()
                .map(|instance| Value::Value(instance_item(instance)))
                .collect(),
        );
        Some(state)
    }
}
