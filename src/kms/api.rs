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

use crate::client::pagination::{
    collect_by_marker, MarkerPage, PageInfo, MARKER_PAGE_LIMIT,
};
use crate::client::{tags, ApiError, ApiRequest, DewClient, Service};

const BASE: &str = "v1.0/{project_id}/kms";

/// Error codes of a key that does not exist anymore
pub const KEY_GONE_CODES: &[&str] = &["KMS.0205", "KMS.0207"];

pub const KEY_STATE_PENDING_DELETION: &str = "4";

#[derive(Debug, Default, Serialize)]
pub struct CreateKey {
    pub key_alias: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key_spec: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key_usage: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key_description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub origin: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enterprise_project_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub keystore_id: Option<String>,
}

#[derive(Debug, Default, Clone, PartialEq, Deserialize)]
pub struct KeyInfo {
    pub key_id: String,
    pub domain_id: Option<String>,
    pub key_alias: Option<String>,
    pub key_spec: Option<String>,
    pub key_usage: Option<String>,
    pub key_description: Option<String>,
    pub creation_date: Option<String>,
    pub scheduled_deletion_date: Option<String>,
    pub key_state: Option<String>,
    pub default_key_flag: Option<String>,
    pub expiration_time: Option<String>,
    pub origin: Option<String>,
    pub sys_enterprise_project_id: Option<String>,
    pub keystore_id: Option<String>,
}

impl KeyInfo {
    pub fn is_pending_deletion(&self) -> bool {
        self.key_state.as_deref() == Some(KEY_STATE_PENDING_DELETION)
    }
}

#[derive(Debug, Deserialize)]
struct KeyInfoResponse {
    key_info: KeyInfo,
}

#[derive(Debug, Default, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct RotationStatus {
    pub key_rotation_enabled: bool,
    pub rotation_interval: Option<i64>,
    pub last_rotation_time: Option<String>,
    pub number_of_rotations: Option<i64>,
}

pub async fn create_key(
    client: &DewClient,
    region: &str,
    body: &CreateKey,
) -> Result<String, ApiError> {
    let response: KeyInfoResponse = client
        .call(ApiRequest::post(Service::Kms, region, format!("{BASE}/create-key")).json(body))
        .await?;
    Ok(response.key_info.key_id)
}

pub async fn describe_key(
    client: &DewClient,
    region: &str,
    key_id: &str,
) -> Result<KeyInfo, ApiError> {
    let response: KeyInfoResponse = client
        .call(
            ApiRequest::post(Service::Kms, region, format!("{BASE}/describe-key"))
                .json(&json!({ "key_id": key_id })),
        )
        .await?;
    Ok(response.key_info)
}

/// Key actions taking only a key id: `enable-key`, `disable-key`,
/// `enable-key-rotation`, `disable-key-rotation`
pub async fn key_action(
    client: &DewClient,
    region: &str,
    action: &str,
    key_id: &str,
) -> Result<(), ApiError> {
    client
        .execute(
            ApiRequest::post(Service::Kms, region, format!("{BASE}/{action}"))
                .json(&json!({ "key_id": key_id })),
        )
        .await
}

pub async fn update_alias(
    client: &DewClient,
    region: &str,
    key_id: &str,
    key_alias: &str,
) -> Result<(), ApiError> {
    client
        .execute(
            ApiRequest::post(Service::Kms, region, format!("{BASE}/update-key-alias"))
                .json(&json!({ "key_id": key_id, "key_alias": key_alias })),
        )
        .await
}

pub async fn update_description(
    client: &DewClient,
    region: &str,
    key_id: &str,
    key_description: &str,
) -> Result<(), ApiError> {
    client
        .execute(
            ApiRequest::post(Service::Kms, region, format!("{BASE}/update-key-description"))
                .json(&json!({ "key_id": key_id, "key_description": key_description })),
        )
        .await
}

pub async fn update_rotation_interval(
    client: &DewClient,
    region: &str,
    key_id: &str,
    rotation_interval: i64,
) -> Result<(), ApiError> {
    client
        .execute(
            ApiRequest::post(
                Service::Kms,
                region,
                format!("{BASE}/update-key-rotation-interval"),
            )
            .json(&json!({ "key_id": key_id, "rotation_interval": rotation_interval })),
        )
        .await
}

pub async fn rotation_status(
    client: &DewClient,
    region: &str,
    key_id: &str,
) -> Result<RotationStatus, ApiError> {
    client
        .call(
            ApiRequest::post(Service::Kms, region, format!("{BASE}/get-key-rotation-status"))
                .json(&json!({ "key_id": key_id })),
        )
        .await
}

pub async fn schedule_deletion(
    client: &DewClient,
    region: &str,
    key_id: &str,
    pending_days: i64,
) -> Result<(), ApiError> {
    client
        .execute(
            ApiRequest::post(Service::Kms, region, format!("{BASE}/schedule-key-deletion"))
                .json(&json!({ "key_id": key_id, "pending_days": pending_days.to_string() })),
        )
        .await
}

pub async fn key_tags(
    client: &DewClient,
    region: &str,
    key_id: &str,
) -> Result<BTreeMap<String, String>, ApiError> {
    tags::get_tags(client, Service::Kms, region, &format!("{BASE}/{key_id}")).await
}

pub async fn update_key_tags(
    client: &DewClient,
    region: &str,
    key_id: &str,
    old: &BTreeMap<String, String>,
    new: &BTreeMap<String, String>,
) -> Result<(), ApiError> {
    tags::update_tags(
        client,
        Service::Kms,
        region,
        &format!("{BASE}/{key_id}"),
        old,
        new,
    )
    .await
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct KeyList {
    key_details: Vec<KeyInfo>,
    next_marker: Option<String>,
    truncated: Option<String>,
}

/// Every key of the project, optionally restricted to a key state
pub async fn list_keys(
    client: &DewClient,
    region: &str,
    key_state: Option<&str>,
    enterprise_project_id: Option<&str>,
) -> Result<Vec<KeyInfo>, ApiError> {
    collect_by_marker(|marker| async move {
        let mut body = json!({ "limit": MARKER_PAGE_LIMIT.to_string() });
        if let Some(marker) = marker {
            body["marker"] = json!(marker);
        }
        if let Some(key_state) = key_state {
            body["key_state"] = json!(key_state);
        }
        if let Some(enterprise_project_id) = enterprise_project_id {
            body["enterprise_project_id"] = json!(enterprise_project_id);
        }
        let list: KeyList = client
            .call(ApiRequest::post(Service::Kms, region, format!("{BASE}/list-keys")).json(&body))
            .await?;
        let truncated = list.truncated.as_deref() == Some("true");
        Ok(MarkerPage {
            items: list.key_details,
            next_marker: list.next_marker.filter(|_| truncated),
        })
    })
    .await
}

#[derive(Debug, Default, Serialize)]
pub struct CreateGrant {
    pub key_id: String,
    pub grantee_principal: String,
    pub operations: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retiring_principal: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub grantee_principal_type: Option<String>,
}

#[derive(Debug, Default, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct Grant {
    pub key_id: String,
    pub grant_id: String,
    pub name: Option<String>,
    pub grantee_principal: Option<String>,
    pub grantee_principal_type: Option<String>,
    pub operations: Vec<String>,
    pub issuing_principal: Option<String>,
    pub retiring_principal: Option<String>,
    pub creation_date: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GrantCreated {
    grant_id: String,
}

pub async fn create_grant(
    client: &DewClient,
    region: &str,
    body: &CreateGrant,
) -> Result<String, ApiError> {
    let created: GrantCreated = client
        .call(ApiRequest::post(Service::Kms, region, format!("{BASE}/create-grant")).json(body))
        .await?;
    Ok(created.grant_id)
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct GrantList {
    grants: Vec<Grant>,
    next_marker: Option<String>,
    truncated: Option<String>,
}

pub async fn list_grants(
    client: &DewClient,
    region: &str,
    key_id: &str,
) -> Result<Vec<Grant>, ApiError> {
    collect_by_marker(|marker| async move {
        let mut body = json!({ "key_id": key_id, "limit": MARKER_PAGE_LIMIT.to_string() });
        if let Some(marker) = marker {
            body["marker"] = json!(marker);
        }
        let list: GrantList = client
            .call(ApiRequest::post(Service::Kms, region, format!("{BASE}/list-grants")).json(&body))
            .await?;
        let truncated = list.truncated.as_deref() == Some("true");
        Ok(MarkerPage {
            items: list.grants,
            next_marker: list.next_marker.filter(|_| truncated),
        })
    })
    .await
}

pub async fn revoke_grant(
    client: &DewClient,
    region: &str,
    key_id: &str,
    grant_id: &str,
) -> Result<(), ApiError> {
    client
        .execute(
            ApiRequest::post(Service::Kms, region, format!("{BASE}/revoke-grant"))
                .json(&json!({ "key_id": key_id, "grant_id": grant_id })),
        )
        .await
}

#[derive(Debug, Default, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct Alias {
    pub key_id: String,
    pub alias: String,
    pub alias_urn: Option<String>,
    pub domain_id: Option<String>,
    pub create_time: Option<String>,
    pub update_time: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AliasCreated {
    alias: Alias,
}

pub async fn create_alias(
    client: &DewClient,
    region: &str,
    key_id: &str,
    alias: &str,
) -> Result<Alias, ApiError> {
    let created: AliasCreated = client
        .call(
            ApiRequest::post(Service::Kms, region, format!("{BASE}/aliases"))
                .json(&json!({ "key_id": key_id, "alias": alias })),
        )
        .await?;
    Ok(created.alias)
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct AliasList {
    aliases: Vec<Alias>,
    page_info: PageInfo,
}

/// Aliases of a key, or of every key without `key_id`
pub async fn list_aliases(
    client: &DewClient,
    region: &str,
    key_id: Option<&str>,
) -> Result<Vec<Alias>, ApiError> {
    collect_by_marker(|marker| async move {
        let list: AliasList = client
            .call(
                ApiRequest::get(Service::Kms, region, format!("{BASE}/aliases"))
                    .query_opt("key_id", key_id)
                    .query("limit", MARKER_PAGE_LIMIT)
                    .query_opt("marker", marker),
            )
            .await?;
        Ok(MarkerPage {
            items: list.aliases,
            next_marker: list.page_info.next_marker,
        })
    })
    .await
}

pub async fn associate_alias(
    client: &DewClient,
    region: &str,
    alias: &str,
    target_key_id: &str,
) -> Result<(), ApiError> {
    client
        .execute(
            ApiRequest::post(Service::Kms, region, format!("{BASE}/alias/associate"))
                .json(&json!({ "alias": alias, "target_key_id": target_key_id })),
        )
        .await
}

pub async fn delete_alias(
    client: &DewClient,
    region: &str,
    key_id: &str,
    alias: &str,
) -> Result<(), ApiError> {
    client
        .execute(
            ApiRequest::delete(Service::Kms, region, format!("{BASE}/aliases"))
                .json(&json!({ "key_id": key_id, "aliases": [alias] })),
        )
        .await
}

#[derive(Debug, Default, Serialize)]
pub struct CreateDataKey {
    pub key_id: String,
    pub datakey_length: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub encryption_context: Option<BTreeMap<String, String>>,
}

#[derive(Debug, Default, Clone, Deserialize)]
#[serde(default)]
pub struct DataKey {
    pub key_id: String,
    pub plain_text: String,
    pub cipher_text: String,
}

pub async fn create_data_key(
    client: &DewClient,
    region: &str,
    body: &CreateDataKey,
) -> Result<DataKey, ApiError> {
    client
        .call(ApiRequest::post(Service::Kms, region, format!("{BASE}/create-datakey")).json(body))
        .await
}
