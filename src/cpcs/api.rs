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

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::client::pagination::{collect_by_page, NumberedPage, NUMBERED_PAGE_SIZE};
use crate::client::{ApiError, ApiRequest, DewClient, Service};

const BASE: &str = "v1/{project_id}/dew/cpcs";

/// Error codes of an app, access key or association that does not exist
pub const CPCS_GONE_CODES: &[&str] = &["CPCS.0001", "CPCS.0404"];

#[derive(Debug, Deserialize)]
#[serde(bound = "T: DeserializeOwned")]
struct Paged<T> {
    #[serde(default = "Vec::new")]
    result: Vec<T>,
    total_num: Option<u64>,
}

/// Every item of a `page_num`/`page_size` listing
async fn list_paged<T: DeserializeOwned>(
    client: &DewClient,
    region: &str,
    path: &str,
    filters: &[(&str, Option<&str>)],
) -> Result<Vec<T>, ApiError> {
    collect_by_page(|page_num| async move {
        let mut request = ApiRequest::get(Service::Cpcs, region, path)
            .query("page_num", page_num)
            .query("page_size", NUMBERED_PAGE_SIZE);
        for (key, value) in filters {
            request = request.query_opt(key, *value);
        }
        let page: Paged<T> = client.call(request).await?;
        Ok(NumberedPage {
            items: page.result,
            total: page.total_num,
        })
    })
    .await
}

#[derive(Debug, Default, Serialize)]
pub struct CreateApp {
    pub app_name: String,
    pub vpc_id: String,
    pub vpc_name: String,
    pub subnet_id: String,
    pub subnet_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Default, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct App {
    pub app_id: String,
    pub app_name: String,
    pub vpc_id: Option<String>,
    pub vpc_name: Option<String>,
    pub subnet_id: Option<String>,
    pub subnet_name: Option<String>,
    pub description: Option<String>,
    pub account_name: Option<String>,
    pub create_time: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct CreatedApp {
    app_id: String,
}

pub async fn create_app(client: &DewClient, region: &str, body: &CreateApp) -> Result<String, ApiError> {
    let created: CreatedApp = client
        .call(ApiRequest::post(Service::Cpcs, region, format!("{BASE}/apps")).json(body))
        .await?;
    Ok(created.app_id)
}

pub async fn list_apps(
    client: &DewClient,
    region: &str,
    app_name: Option<&str>,
) -> Result<Vec<App>, ApiError> {
    list_paged(
        client,
        region,
        &format!("{BASE}/apps"),
        &[("app_name", app_name)],
    )
    .await
}

pub async fn delete_app(client: &DewClient, region: &str, app_id: &str) -> Result<(), ApiError> {
    client
        .execute(ApiRequest::delete(
            Service::Cpcs,
            region,
            format!("{BASE}/apps/{app_id}"),
        ))
        .await
}

#[derive(Debug, Default, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct AccessKey {
    pub access_key_id: String,
    pub key_name: String,
    pub app_name: Option<String>,
    /// `enable` or `disable`
    pub status: Option<String>,
    pub is_downloaded: Option<bool>,
    pub create_time: Option<i64>,
    pub download_time: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct CreatedAccessKey {
    access_key_id: String,
}

#[derive(Debug, Default, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct AccessKeySecret {
    pub access_key: String,
    pub secret_key: String,
}

pub async fn create_access_key(
    client: &DewClient,
    region: &str,
    app_id: &str,
    key_name: &str,
) -> Result<String, ApiError> {
    let created: CreatedAccessKey = client
        .call(
            ApiRequest::post(
                Service::Cpcs,
                region,
                format!("{BASE}/apps/{app_id}/access-keys"),
            )
            .json(&json!({ "key_name": key_name })),
        )
        .await?;
    Ok(created.access_key_id)
}

pub async fn list_access_keys(
    client: &DewClient,
    region: &str,
    app_id: &str,
) -> Result<Vec<AccessKey>, ApiError> {
    list_paged(
        client,
        region,
        &format!("{BASE}/apps/{app_id}/access-keys"),
        &[],
    )
    .await
}

/// `action` is `enable` or `disable`
pub async fn access_key_action(
    client: &DewClient,
    region: &str,
    app_id: &str,
    access_key_id: &str,
    action: &str,
) -> Result<(), ApiError> {
    client
        .execute(ApiRequest::post(
            Service::Cpcs,
            region,
            format!("{BASE}/apps/{app_id}/access-keys/{access_key_id}/{action}"),
        ))
        .await
}

/// The secret part of an access key, only available once
pub async fn download_access_key(
    client: &DewClient,
    region: &str,
    app_id: &str,
    access_key_id: &str,
) -> Result<AccessKeySecret, ApiError> {
    client
        .call(ApiRequest::get(
            Service::Cpcs,
            region,
            format!("{BASE}/apps/{app_id}/access-keys/{access_key_id}/download"),
        ))
        .await
}

pub async fn delete_access_key(
    client: &DewClient,
    region: &str,
    app_id: &str,
    access_key_id: &str,
) -> Result<(), ApiError> {
    client
        .execute(ApiRequest::delete(
            Service::Cpcs,
            region,
            format!("{BASE}/apps/{app_id}/access-keys/{access_key_id}"),
        ))
        .await
}

#[derive(Debug, Default, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct AppCluster {
    pub cluster_id: String,
    pub cluster_name: Option<String>,
    /// `ASSOCIATING`, `ASSOCIATED`, `ASSOCIATE_FAILED` or `DISASSOCIATING`
    pub status: String,
    pub vpc_id: Option<String>,
    pub subnet_id: Option<String>,
    pub create_time: Option<i64>,
}

/// `action` is `association` or `disassociation`
pub async fn cluster_association(
    client: &DewClient,
    region: &str,
    app_id: &str,
    cluster_id: &str,
    action: &str,
) -> Result<(), ApiError> {
    client
        .execute(
            ApiRequest::post(
                Service::Cpcs,
                region,
                format!("{BASE}/apps/{app_id}/cluster/{action}"),
            )
            .json(&json!({ "cluster_id": cluster_id })),
        )
        .await
}

pub async fn list_app_clusters(
    client: &DewClient,
    region: &str,
    app_id: &str,
) -> Result<Vec<AppCluster>, ApiError> {
    list_paged(
        client,
        region,
        &format!("{BASE}/apps/{app_id}/cluster"),
        &[],
    )
    .await
}

#[derive(Debug, Default, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct Cluster {
    pub cluster_id: String,
    pub cluster_name: String,
    pub status: Option<String>,
    pub service_type: Option<String>,
    pub az: Option<String>,
    pub instance_num: Option<i64>,
    pub create_time: Option<i64>,
}

pub async fn list_clusters(client: &DewClient, region: &str) -> Result<Vec<Cluster>, ApiError> {
    list_paged(client, region, &format!("{BASE}/cluster"), &[]).await
}

#[derive(Debug, Default, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct Instance {
    pub instance_id: String,
    pub instance_name: String,
    pub status: Option<String>,
    pub service_type: Option<String>,
    pub cluster_id: Option<String>,
    pub az: Option<String>,
    pub specification: Option<String>,
    pub image_name: Option<String>,
    pub create_time: Option<i64>,
    pub expired_time: Option<i64>,
}

pub async fn list_instances(client: &DewClient, region: &str) -> Result<Vec<Instance>, ApiError> {
    list_paged(client, region, &format!("{BASE}/instances"), &[]).await
}

#[cfg(test)]
mod tests {
    use wiremock::matchers::{body_json, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use crate::client::testing::{client, PROJECT_ID, REGION};

    use super::*;

    #[tokio::test]
    async fn apps_stop_at_total() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(format!("/v1/{PROJECT_ID}/dew/cpcs/apps")))
            .and(query_param("page_num", "1"))
            .and(query_param("app_name", "billing"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "result": [{"app_id": "a1", "app_name": "billing", "create_time": 1704067200000i64}],
                "total_num": 1,
            })))
            .expect(1)
            .mount(&server)
            .await;

        let apps = list_apps(&client(&server.uri()), REGION, Some("billing"))
            .await
            .unwrap();
        assert_eq!(apps.len(), 1);
        assert_eq!(apps[0].app_id, "a1");
    }

    #[tokio::test]
    async fn clusters_span_pages() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(format!("/v1/{PROJECT_ID}/dew/cpcs/cluster")))
            .and(query_param("page_num", "1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "result": [{"cluster_id": "c1", "cluster_name": "one"}],
                "total_num": 2,
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path(format!("/v1/{PROJECT_ID}/dew/cpcs/cluster")))
            .and(query_param("page_num", "2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "result": [{"cluster_id": "c2", "cluster_name": "two"}],
                "total_num": 2,
            })))
            .mount(&server)
            .await;

        let clusters = list_clusters(&client(&server.uri()), REGION).await.unwrap();
        let ids: Vec<_> = clusters.iter().map(|cluster| cluster.cluster_id.as_str()).collect();
        assert_eq!(ids, vec!["c1", "c2"]);
    }

    #[tokio::test]
    async fn association_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(format!("/v1/{PROJECT_ID}/dew/cpcs/apps/a1/cluster/association")))
            .and(body_json(json!({"cluster_id": "c1"})))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        cluster_association(&client(&server.uri()), REGION, "a1", "c1", "association")
            .await
            .unwrap();
    }
}
