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

use super::{ApiError, ApiRequest, DewClient, Service};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    pub key: String,
    #[serde(default)]
    pub value: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct TagList {
    tags: Vec<Tag>,
}

#[derive(Debug, Serialize)]
struct TagAction<'a> {
    action: &'a str,
    tags: Vec<Tag>,
}

/// Tags of a resource, `base` is the path of the resource tags like `v1.0/{project_id}/kms/{key_id}`
pub async fn get_tags(
    client: &DewClient,
    service: Service,
    region: &str,
    base: &str,
) -> Result<BTreeMap<String, String>, ApiError> {
    let list: TagList = client
        .call(ApiRequest::get(service, region, format!("{base}/tags")))
        .await?;
    Ok(list.tags.into_iter().map(|tag| (tag.key, tag.value)).collect())
}

/// Apply the difference between the `old` and `new` tags
pub async fn update_tags(
    client: &DewClient,
    service: Service,
    region: &str,
    base: &str,
    old: &BTreeMap<String, String>,
    new: &BTreeMap<String, String>,
) -> Result<(), ApiError> {
    let (removed, added) = diff(old, new);
    let path = format!("{base}/tags/action");
    if !removed.is_empty() {
        client
            .execute(ApiRequest::post(service, region, path.as_str()).json(&TagAction {
                action: "delete",
                tags: removed,
            }))
            .await?;
    }
    if !added.is_empty() {
        client
            .execute(ApiRequest::post(service, region, path.as_str()).json(&TagAction {
                action: "create",
                tags: added,
            }))
            .await?;
    }
    Ok(())
}

/// Tags to delete and tags to create, a changed value is deleted then created
fn diff(old: &BTreeMap<String, String>, new: &BTreeMap<String, String>) -> (Vec<Tag>, Vec<Tag>) {
    let removed = old
        .iter()
        .filter(|(k, v)| new.get(*k) != Some(*v))
        .map(|(k, v)| Tag {
            key: k.clone(),
            value: v.clone(),
        })
        .collect();
    let added = new
        .iter()
        .filter(|(k, v)| old.get(*k) != Some(*v))
        .map(|(k, v)| Tag {
            key: k.clone(),
            value: v.clone(),
        })
        .collect();
    (removed, added)
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use crate::client::testing::{client, PROJECT_ID, REGION};

    use super::*;

    fn map(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn tag_diff() {
        let (removed, added) = diff(
            &map(&[("keep", "1"), ("drop", "2"), ("change", "3")]),
            &map(&[("keep", "1"), ("change", "4"), ("new", "5")]),
        );
        let keys = |tags: &[Tag]| tags.iter().map(|t| t.key.clone()).collect::<Vec<_>>();
        assert_eq!(keys(&removed), vec!["change", "drop"]);
        assert_eq!(keys(&added), vec!["change", "new"]);
    }

    #[tokio::test]
    async fn tag_actions() {
        let server = MockServer::start().await;
        let base = format!("/v1.0/{PROJECT_ID}/kms/k1/tags/action");
        Mock::given(method("POST"))
            .and(path(base.as_str()))
            .and(body_json(json!({"action": "delete", "tags": [{"key": "a", "value": "1"}]})))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path(base.as_str()))
            .and(body_json(json!({"action": "create", "tags": [{"key": "b", "value": "2"}]})))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        update_tags(
            &client(&server.uri()),
            Service::Kms,
            REGION,
            "v1.0/{project_id}/kms/k1",
            &map(&[("a", "1")]),
            &map(&[("b", "2")]),
        )
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn read_tags() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(format!("/v1/{PROJECT_ID}/s1/tags")))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "tags": [{"key": "env", "value": "prod"}]
            })))
            .mount(&server)
            .await;

        let tags = get_tags(
            &client(&server.uri()),
            Service::Csms,
            REGION,
            "v1/{project_id}/s1",
        )
        .await
        .unwrap();
        assert_eq!(tags, map(&[("env", "prod")]));
    }
}
