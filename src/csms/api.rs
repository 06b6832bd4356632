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

use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::client::pagination::{collect_by_marker, MarkerPage, PageInfo, MARKER_PAGE_LIMIT};
use crate::client::{tags, ApiError, ApiRequest, DewClient, Service};

const BASE: &str = "v1/{project_id}";

/// Error codes of a secret or an event that does not exist
pub const SECRET_GONE_CODES: &[&str] = &["CSMS.0401", "CSMS.0403"];

#[derive(Debug, Default, Serialize)]
pub struct CreateSecret {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kms_key_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub secret_string: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub secret_binary: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub secret_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auto_rotation: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rotation_period: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub event_subscriptions: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enterprise_project_id: Option<String>,
}

#[derive(Debug, Default, Serialize)]
pub struct UpdateSecret {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kms_key_id: Option<String>,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auto_rotation: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rotation_period: Option<String>,
    pub event_subscriptions: Vec<String>,
}

#[derive(Debug, Default, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct Secret {
    pub id: String,
    pub name: String,
    pub state: Option<String>,
    pub kms_key_id: Option<String>,
    pub description: Option<String>,
    pub secret_type: Option<String>,
    pub auto_rotation: Option<bool>,
    pub rotation_period: Option<String>,
    pub rotation_time: Option<i64>,
    pub next_rotation_time: Option<i64>,
    pub event_subscriptions: Vec<String>,
    pub enterprise_project_id: Option<String>,
    pub create_time: Option<i64>,
    pub update_time: Option<i64>,
    pub scheduled_delete_time: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct SecretResponse {
    secret: Secret,
}

#[derive(Debug, Default, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct VersionMetadata {
    pub id: String,
    pub secret_name: Option<String>,
    pub kms_key_id: Option<String>,
    pub create_time: Option<i64>,
    pub expire_time: Option<i64>,
    pub version_stages: Vec<String>,
}

#[derive(Debug, Default, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct Version {
    pub version_metadata: VersionMetadata,
    pub secret_string: Option<String>,
    pub secret_binary: Option<String>,
}

#[derive(Debug, Deserialize)]
struct VersionResponse {
    version: Version,
}

#[derive(Debug, Deserialize)]
struct VersionMetadataResponse {
    version_metadata: VersionMetadata,
}

pub async fn create_secret(
    client: &DewClient,
    region: &str,
    body: &CreateSecret,
) -> Result<Secret, ApiError> {
    let response: SecretResponse = client
        .call(ApiRequest::post(Service::Csms, region, format!("{BASE}/secrets")).json(body))
        .await?;
    Ok(response.secret)
}

pub async fn get_secret(client: &DewClient, region: &str, name: &str) -> Result<Secret, ApiError> {
    let response: SecretResponse = client
        .call(ApiRequest::get(
            Service::Csms,
            region,
            format!("{BASE}/secrets/{name}"),
        ))
        .await?;
    Ok(response.secret)
}

pub async fn update_secret(
    client: &DewClient,
    region: &str,
    name: &str,
    body: &UpdateSecret,
) -> Result<(), ApiError> {
    client
        .execute(
            ApiRequest::put(Service::Csms, region, format!("{BASE}/secrets/{name}")).json(body),
        )
        .await
}

pub async fn delete_secret(client: &DewClient, region: &str, name: &str) -> Result<(), ApiError> {
    client
        .execute(ApiRequest::delete(
            Service::Csms,
            region,
            format!("{BASE}/secrets/{name}"),
        ))
        .await
}

/// New version holding either a text or a base64 binary value
pub async fn create_version(
    client: &DewClient,
    region: &str,
    name: &str,
    secret_string: Option<&str>,
    secret_binary: Option<&str>,
) -> Result<VersionMetadata, ApiError> {
    let mut body = json!({});
    if let Some(secret_string) = secret_string {
        body["secret_string"] = json!(secret_string);
    }
    if let Some(secret_binary) = secret_binary {
        body["secret_binary"] = json!(secret_binary);
    }
    let response: VersionResponse = client
        .call(
            ApiRequest::post(Service::Csms, region, format!("{BASE}/secrets/{name}/versions"))
                .json(&body),
        )
        .await?;
    Ok(response.version.version_metadata)
}

/// `version` is a version id or `latest`
pub async fn get_version(
    client: &DewClient,
    region: &str,
    name: &str,
    version: &str,
) -> Result<Version, ApiError> {
    let response: VersionResponse = client
        .call(ApiRequest::get(
            Service::Csms,
            region,
            format!("{BASE}/secrets/{name}/versions/{version}"),
        ))
        .await?;
    Ok(response.version)
}

pub async fn update_version_expiry(
    client: &DewClient,
    region: &str,
    name: &str,
    version: &str,
    expire_time: i64,
) -> Result<VersionMetadata, ApiError> {
    let response: VersionMetadataResponse = client
        .call(
            ApiRequest::put(
                Service::Csms,
                region,
                format!("{BASE}/secrets/{name}/versions/{version}"),
            )
            .json(&json!({ "expire_time": expire_time })),
        )
        .await?;
    Ok(response.version_metadata)
}

pub async fn rotate_secret(client: &DewClient, region: &str, name: &str) -> Result<(), ApiError> {
    client
        .execute(ApiRequest::post(
            Service::Csms,
            region,
            format!("{BASE}/secrets/{name}/rotate"),
        ))
        .await
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct SecretList {
    secrets: Vec<Secret>,
    page_info: PageInfo,
}

pub async fn list_secrets(
    client: &DewClient,
    region: &str,
    event_name: Option<&str>,
) -> Result<Vec<Secret>, ApiError> {
    collect_by_marker(|marker| async move {
        let list: SecretList = client
            .call(
                ApiRequest::get(Service::Csms, region, format!("{BASE}/secrets"))
                    .query("limit", MARKER_PAGE_LIMIT)
                    .query_opt("marker", marker)
                    .query_opt("event_name", event_name),
            )
            .await?;
        Ok(MarkerPage {
            items: list.secrets,
            next_marker: list.page_info.next_marker,
        })
    })
    .await
}

pub async fn secret_tags(
    client: &DewClient,
    region: &str,
    secret_id: &str,
) -> Result<BTreeMap<String, String>, ApiError> {
    tags::get_tags(
        client,
        Service::Csms,
        region,
        &format!("{BASE}/csms/{secret_id}"),
    )
    .await
}

pub async fn update_secret_tags(
    client: &DewClient,
    region: &str,
    secret_id: &str,
    old: &BTreeMap<String, String>,
    new: &BTreeMap<String, String>,
) -> Result<(), ApiError> {
    tags::update_tags(
        client,
        Service::Csms,
        region,
        &format!("{BASE}/csms/{secret_id}"),
        old,
        new,
    )
    .await
}

#[derive(Debug, Default, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct Task {
    pub task_id: String,
    pub secret_name: Option<String>,
    pub operate_type: Option<String>,
    pub task_status: String,
    pub task_time: Option<i64>,
    pub task_error_code: Option<String>,
    pub task_error_msg: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct TaskList {
    tasks: Vec<Task>,
    page_info: PageInfo,
}

/// Rotation tasks of a secret
pub async fn list_tasks(
    client: &DewClient,
    region: &str,
    secret_name: &str,
) -> Result<Vec<Task>, ApiError> {
    collect_by_marker(|marker| async move {
        let list: TaskList = client
            .call(
                ApiRequest::get(Service::Csms, region, format!("{BASE}/csms/tasks"))
                    .query("secret_name", secret_name)
                    .query("limit", MARKER_PAGE_LIMIT)
                    .query_opt("marker", marker),
            )
            .await?;
        Ok(MarkerPage {
            items: list.tasks,
            next_marker: list.page_info.next_marker,
        })
    })
    .await
}

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Notification {
    pub target_type: String,
    pub target_id: String,
    pub target_name: String,
}

#[derive(Debug, Default, Serialize)]
pub struct CreateEvent {
    pub name: String,
    pub event_types: Vec<String>,
    pub state: String,
    pub notification: Notification,
}

#[derive(Debug, Default, Serialize)]
pub struct UpdateEvent {
    pub event_types: Vec<String>,
    pub state: String,
    pub notification: Notification,
}

#[derive(Debug, Default, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct Event {
    pub event_id: String,
    pub name: String,
    pub event_types: Vec<String>,
    pub state: Option<String>,
    pub notification: Option<Notification>,
    pub create_time: Option<i64>,
    pub update_time: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct EventResponse {
    event: Event,
}

pub async fn create_event(
    client: &DewClient,
    region: &str,
    body: &CreateEvent,
) -> Result<(), ApiError> {
    client
        .execute(ApiRequest::post(Service::Csms, region, format!("{BASE}/csms/events")).json(body))
        .await
}

pub async fn get_event(client: &DewClient, region: &str, name: &str) -> Result<Event, ApiError> {
    let response: EventResponse = client
        .call(ApiRequest::get(
            Service::Csms,
            region,
            format!("{BASE}/csms/events/{name}"),
        ))
        .await?;
    Ok(response.event)
}

pub async fn update_event(
    client: &DewClient,
    region: &str,
    name: &str,
    body: &UpdateEvent,
) -> Result<(), ApiError> {
    client
        .execute(
            ApiRequest::put(Service::Csms, region, format!("{BASE}/csms/events/{name}"))
                .json(body),
        )
        .await
}

pub async fn delete_event(client: &DewClient, region: &str, name: &str) -> Result<(), ApiError> {
    client
        .execute(ApiRequest::delete(
            Service::Csms,
            region,
            format!("{BASE}/csms/events/{name}"),
        ))
        .await
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct EventList {
    events: Vec<Event>,
    page_info: PageInfo,
}

pub async fn list_events(client: &DewClient, region: &str) -> Result<Vec<Event>, ApiError> {
    collect_by_marker(|marker| async move {
        let list: EventList = client
            .call(
                ApiRequest::get(Service::Csms, region, format!("{BASE}/csms/events"))
                    .query("limit", MARKER_PAGE_LIMIT)
                    .query_opt("marker", marker),
            )
            .await?;
        Ok(MarkerPage {
            items: list.events,
            next_marker: list.page_info.next_marker,
        })
    })
    .await
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use wiremock::matchers::{body_json, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use crate::client::testing::{client, PROJECT_ID, REGION};

    use super::*;

    #[tokio::test]
    async fn secret_creation_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(format!("/v1/{PROJECT_ID}/secrets")))
            .and(body_json(json!({
                "name": "db-password",
                "secret_string": "hunter2",
                "auto_rotation": false,
                "event_subscriptions": ["on-expiry"],
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "secret": {"id": "s1", "name": "db-password", "state": "ENABLED"}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let secret = create_secret(
            &client(&server.uri()),
            REGION,
            &CreateSecret {
                name: "db-password".to_owned(),
                secret_string: Some("hunter2".to_owned()),
                auto_rotation: Some(false),
                event_subscriptions: vec!["on-expiry".to_owned()],
                ..Default::default()
            },
        )
        .await
        .unwrap();
        assert_eq!(secret.id, "s1");
        assert_eq!(secret.state.as_deref(), Some("ENABLED"));
    }

    #[tokio::test]
    async fn latest_version() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(format!("/v1/{PROJECT_ID}/secrets/db/versions/latest")))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "version": {
                    "version_metadata": {
                        "id": "v2",
                        "version_stages": ["SYSCURRENT"],
                        "create_time": 1700000000000i64,
                    },
                    "secret_string": "hunter2",
                }
            })))
            .mount(&server)
            .await;

        let version = get_version(&client(&server.uri()), REGION, "db", "latest")
            .await
            .unwrap();
        assert_eq!(version.version_metadata.id, "v2");
        assert_eq!(version.version_metadata.version_stages, vec!["SYSCURRENT"]);
        assert_eq!(version.secret_string.as_deref(), Some("hunter2"));
    }

    #[tokio::test]
    async fn tasks_of_a_secret() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(format!("/v1/{PROJECT_ID}/csms/tasks")))
            .and(query_param("secret_name", "db"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "tasks": [{"task_id": "t1", "task_status": "EXECUTING", "operate_type": "ROTATE"}],
                "page_info": {"next_marker": null},
            })))
            .expect(1)
            .mount(&server)
            .await;

        let tasks = list_tasks(&client(&server.uri()), REGION, "db").await.unwrap();
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].task_status, "EXECUTING");
    }

    #[tokio::test]
    async fn secret_tags_path() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(format!("/v1/{PROJECT_ID}/csms/s1/tags")))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"tags": []})))
            .expect(1)
            .mount(&server)
            .await;

        assert!(secret_tags(&client(&server.uri()), REGION, "s1")
            .await
            .unwrap()
            .is_empty());
    }
}
