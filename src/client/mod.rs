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

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, RwLock};
use std::time::Duration;

use lazy_static::lazy_static;
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tf_provider::value::ValueString;
use tf_provider::Diagnostics;
use time::OffsetDateTime;
use tokio::sync::Mutex;
use tracing::{debug, warn};
use url::Url;

use crate::config::{ClientConfig, Credentials};
use crate::utils::non_empty;

pub mod error;
pub mod pagination;
pub mod signer;
pub mod tags;
pub mod wait;

pub use error::ApiError;

lazy_static! {
    /// Service name to endpoint host prefix
    pub static ref SERVICE_CATALOG: BTreeMap<&'static str, &'static str> = BTreeMap::from([
        ("kms", "kms"),
        ("csms", "kms"),
        ("cpcs", "kms"),
        ("kps", "kms"),
        ("iam", "iam"),
    ]);
}

const CONTENT_TYPE: &str = "application/json;charset=UTF-8";
const PROJECT_PLACEHOLDER: &str = "{project_id}";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Service {
    Kms,
    Csms,
    Cpcs,
    Kps,
    Iam,
}

impl Service {
    pub fn name(self) -> &'static str {
        match self {
            Service::Kms => "kms",
            Service::Csms => "csms",
            Service::Cpcs => "cpcs",
            Service::Kps => "kps",
            Service::Iam => "iam",
        }
    }
}

/// One REST call, `path` is relative to the service endpoint and may contain `{project_id}`
#[derive(Debug)]
pub struct ApiRequest {
    method: Method,
    service: Service,
    region: String,
    path: String,
    query: Vec<(String, String)>,
    body: Option<serde_json::Result<Vec<u8>>>,
}

impl ApiRequest {
    pub fn new(method: Method, service: Service, region: &str, path: impl Into<String>) -> Self {
        Self {
            method,
            service,
            region: region.to_owned(),
            path: path.into(),
            query: Vec::new(),
            body: None,
        }
    }

    pub fn get(service: Service, region: &str, path: impl Into<String>) -> Self {
        Self::new(Method::GET, service, region, path)
    }

    pub fn post(service: Service, region: &str, path: impl Into<String>) -> Self {
        Self::new(Method::POST, service, region, path)
    }

    pub fn put(service: Service, region: &str, path: impl Into<String>) -> Self {
        Self::new(Method::PUT, service, region, path)
    }

    pub fn delete(service: Service, region: &str, path: impl Into<String>) -> Self {
        Self::new(Method::DELETE, service, region, path)
    }

    pub fn query(mut self, key: &str, value: impl ToString) -> Self {
        self.query.push((key.to_owned(), value.to_string()));
        self
    }

    pub fn query_opt(self, key: &str, value: Option<impl ToString>) -> Self {
        match value {
            Some(value) => self.query(key, value),
            None => self,
        }
    }

    pub fn json(mut self, body: &impl Serialize) -> Self {
        self.body = Some(serde_json::to_vec(body));
        self
    }
}

#[derive(Debug, Deserialize)]
struct ProjectList {
    #[serde(default)]
    projects: Vec<Project>,
}

#[derive(Debug, Deserialize)]
struct Project {
    id: String,
    name: String,
}

/// REST client shared by every resource of the provider
#[derive(Debug)]
pub struct DewClient {
    http: reqwest::Client,
    config: ClientConfig,
    /// project id by region
    projects: Mutex<HashMap<String, String>>,
}

impl DewClient {
    pub fn new(config: ClientConfig) -> Result<Self, ApiError> {
        let http = reqwest::Client::builder()
            .use_rustls_tls()
            .danger_accept_invalid_certs(config.insecure)
            .timeout(Duration::from_secs(300))
            .build()
            .map_err(|err| ApiError::Config(err.to_string()))?;
        Ok(Self {
            http,
            config,
            projects: Default::default(),
        })
    }

    pub fn region(&self) -> &str {
        &self.config.region
    }

    /// Region of a resource, falling back to the provider region
    pub fn region_of(&self, region: &ValueString) -> String {
        non_empty(region).unwrap_or(&self.config.region).to_owned()
    }

    pub fn enterprise_project_id(&self) -> Option<&str> {
        self.config.enterprise_project_id.as_deref()
    }

    /// Base URL of a service, always ending with `/`
    pub fn endpoint(&self, service: Service, region: &str) -> String {
        if let Some(endpoint) = self.config.endpoints.get(service.name()) {
            return endpoint.clone();
        }
        let host = SERVICE_CATALOG
            .get(service.name())
            .copied()
            .unwrap_or(service.name());
        format!("https://{host}.{region}.{}/", self.config.cloud)
    }

    /// Project id of `region`, from the configuration or looked up through IAM once
    pub async fn project_id(&self, region: &str) -> Result<String, ApiError> {
        if region == self.config.region {
            if let Some(project_id) = &self.config.project_id {
                return Ok(project_id.clone());
            }
        }

        let mut projects = self.projects.lock().await;
        if let Some(project_id) = projects.get(region) {
            return Ok(project_id.clone());
        }

        let url = self.url(Service::Iam, region, "v3/projects")?;
        let query = vec![("name".to_owned(), region.to_owned())];
        let body = self
            .dispatch(&Method::GET, url, &query, None, None)
            .await?;
        let list: ProjectList = decode(&Method::GET, "v3/projects", &body)?;
        let project = list
            .projects
            .into_iter()
            .find(|project| project.name == region)
            .ok_or_else(|| ApiError::Config(format!("no project found for region {region}")))?;

        debug!(region, project_id = %project.id, "resolved project");
        projects.insert(region.to_owned(), project.id.clone());
        Ok(project.id)
    }

    /// Send the request and decode its JSON response, an empty body decodes as `{}`
    pub async fn call<T: DeserializeOwned>(&self, request: ApiRequest) -> Result<T, ApiError> {
        let method = request.method.clone();
        let path = request.path.clone();
        let body = self.send(request).await?;
        decode(&method, &path, &body)
    }

    /// Send the request and ignore its response
    pub async fn execute(&self, request: ApiRequest) -> Result<(), ApiError> {
        self.send(request).await.map(|_| ())
    }

    pub async fn send(&self, request: ApiRequest) -> Result<Vec<u8>, ApiError> {
        let project_id = if request.path.contains(PROJECT_PLACEHOLDER) {
            Some(self.project_id(&request.region).await?)
        } else {
            None
        };
        let path = match &project_id {
            Some(project_id) => request.path.replace(PROJECT_PLACEHOLDER, project_id),
            None => request.path.clone(),
        };
        let url = self.url(request.service, &request.region, &path)?;
        let body = match request.body {
            Some(Ok(body)) => Some(body),
            Some(Err(source)) => {
                return Err(ApiError::Encode {
                    method: request.method,
                    url: url.to_string(),
                    source,
                })
            }
            None => None,
        };

        self.dispatch(
            &request.method,
            url,
            &request.query,
            body.as_deref(),
            project_id.as_deref(),
        )
        .await
    }

    fn url(&self, service: Service, region: &str, path: &str) -> Result<Url, ApiError> {
        let endpoint = self.endpoint(service, region);
        Url::parse(&endpoint)
            .and_then(|base| base.join(path))
            .map_err(|err| ApiError::Config(format!("invalid endpoint {endpoint}{path}: {err}")))
    }

    /// Sign and send a request, retrying the throttled ones
    async fn dispatch(
        &self,
        method: &Method,
        mut url: Url,
        query: &[(String, String)],
        body: Option<&[u8]>,
        project_id: Option<&str>,
    ) -> Result<Vec<u8>, ApiError> {
        if !query.is_empty() {
            url.set_query(Some(&signer::canonical_query(query)));
        }

        let mut retries = 0;
        loop {
            let headers = self.headers(method, &url, query, body, project_id);
            let mut builder = self.http.request(method.clone(), url.clone());
            for (name, value) in &headers {
                if name != "host" {
                    builder = builder.header(name.as_str(), value.as_str());
                }
            }
            if let Some(body) = body {
                builder = builder.body(body.to_vec());
            }

            debug!(%method, %url, "sending request");
            let response = builder.send().await.map_err(|source| ApiError::Transport {
                method: method.clone(),
                url: url.to_string(),
                source,
            })?;
            let status = response.status();
            let content = response
                .bytes()
                .await
                .map_err(|source| ApiError::Transport {
                    method: method.clone(),
                    url: url.to_string(),
                    source,
                })?
                .to_vec();

            if status.is_success() {
                return Ok(content);
            }
            if status.as_u16() == 429 && retries < self.config.max_retries {
                retries += 1;
                let backoff = throttling_backoff(retries);
                warn!(%method, %url, ?backoff, "request throttled, retrying");
                tokio::time::sleep(backoff).await;
                continue;
            }

            let (code, message) = error::parse_error_body(&content);
            return Err(ApiError::Response {
                method: method.clone(),
                url: url.to_string(),
                status: status.as_u16(),
                code,
                message,
            });
        }
    }

    fn headers(
        &self,
        method: &Method,
        url: &Url,
        query: &[(String, String)],
        body: Option<&[u8]>,
        project_id: Option<&str>,
    ) -> BTreeMap<String, String> {
        let mut headers = BTreeMap::new();
        let host = match (url.host_str(), url.port()) {
            (Some(host), Some(port)) => format!("{host}:{port}"),
            (Some(host), None) => host.to_owned(),
            _ => String::new(),
        };
        headers.insert("host".to_owned(), host);
        if body.is_some() {
            headers.insert("content-type".to_owned(), CONTENT_TYPE.to_owned());
        }
        if let Some(project_id) = project_id {
            headers.insert("x-project-id".to_owned(), project_id.to_owned());
        }

        match &self.config.credentials {
            Credentials::Token(token) => {
                headers.insert("x-auth-token".to_owned(), token.clone());
            }
            Credentials::AkSk {
                access_key,
                secret_key,
                security_token,
            } => {
                if let Some(security_token) = security_token {
                    headers.insert("x-security-token".to_owned(), security_token.clone());
                }
                headers.insert(
                    signer::HEADER_DATE.to_owned(),
                    signer::sdk_date(OffsetDateTime::now_utc()),
                );
                let authorization = signer::authorization(
                    access_key,
                    secret_key,
                    &signer::SigningInput {
                        method: method.as_str(),
                        path: url.path(),
                        query,
                        headers: &headers,
                        body: body.unwrap_or_default(),
                    },
                );
                headers.insert("authorization".to_owned(), authorization);
            }
        }
        headers
    }
}

/// 2^n minutes, at most 30
fn throttling_backoff(retries: u32) -> Duration {
    let minutes = 2u64.saturating_pow(retries).min(30);
    Duration::from_secs(minutes * 60)
}

fn decode<T: DeserializeOwned>(method: &Method, path: &str, body: &[u8]) -> Result<T, ApiError> {
    let body = if body.iter().all(u8::is_ascii_whitespace) {
        b"{}".as_slice()
    } else {
        body
    };
    serde_json::from_slice(body).map_err(|source| ApiError::Decode {
        method: method.clone(),
        url: path.to_owned(),
        source,
    })
}

/// Configured client, shared between the provider and its resources
#[derive(Debug, Clone, Default)]
pub struct ClientHandle {
    inner: Arc<RwLock<Option<Arc<DewClient>>>>,
}

impl ClientHandle {
    pub fn set(&self, client: DewClient) {
        if let Ok(mut inner) = self.inner.write() {
            *inner = Some(Arc::new(client));
        }
    }

    pub fn get(&self, diags: &mut Diagnostics) -> Option<Arc<DewClient>> {
        let client = self.inner.read().ok().and_then(|inner| inner.clone());
        if client.is_none() {
            diags.root_error(
                "The provider has not been configured",
                "The provider block could not be configured, see the previous errors.",
            );
        }
        client
    }
}

impl From<DewClient> for ClientHandle {
    fn from(client: DewClient) -> Self {
        let handle = Self::default();
        handle.set(client);
        handle
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::collections::BTreeMap;

    use super::*;

    pub const PROJECT_ID: &str = "0123456789abcdef";
    pub const REGION: &str = "cn-north-4";

    /// Client signing with a fake key pair, every service served by `endpoint`
    pub fn client(endpoint: &str) -> DewClient {
        let endpoints = SERVICE_CATALOG
            .keys()
            .map(|service| (service.to_string(), format!("{endpoint}/")))
            .collect::<BTreeMap<_, _>>();
        DewClient::new(ClientConfig {
            region: REGION.to_owned(),
            credentials: Credentials::AkSk {
                access_key: "AK".to_owned(),
                secret_key: "SK".to_owned(),
                security_token: None,
            },
            project_id: Some(PROJECT_ID.to_owned()),
            cloud: "example.com".to_owned(),
            enterprise_project_id: None,
            insecure: false,
            max_retries: 0,
            endpoints,
        })
        .unwrap()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use wiremock::matchers::{body_json, header, header_exists, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::testing::{client, PROJECT_ID, REGION};
    use super::*;

    #[test]
    fn default_endpoints() {
        let mut config = client("http://localhost").config.clone();
        config.endpoints.clear();
        let client = DewClient::new(config).unwrap();
        assert_eq!(
            client.endpoint(Service::Csms, "eu-west-101"),
            "https://kms.eu-west-101.example.com/"
        );
        assert_eq!(
            client.endpoint(Service::Iam, "eu-west-101"),
            "https://iam.eu-west-101.example.com/"
        );
    }

    #[test]
    fn backoff_is_capped() {
        assert_eq!(throttling_backoff(1), Duration::from_secs(120));
        assert_eq!(throttling_backoff(4), Duration::from_secs(960));
        assert_eq!(throttling_backoff(5), Duration::from_secs(1800));
        assert_eq!(throttling_backoff(40), Duration::from_secs(1800));
    }

    #[tokio::test]
    async fn signed_json_call() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(format!("/v1.0/{PROJECT_ID}/kms/describe-key")))
            .and(header("x-project-id", PROJECT_ID))
            .and(header("content-type", CONTENT_TYPE))
            .and(header_exists("x-sdk-date"))
            .and(header_exists("authorization"))
            .and(body_json(json!({"key_id": "k1"})))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"key_info": {"key_id": "k1"}})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let client = client(&server.uri());
        let response: serde_json::Value = client
            .call(
                ApiRequest::post(Service::Kms, REGION, "v1.0/{project_id}/kms/describe-key")
                    .json(&json!({"key_id": "k1"})),
            )
            .await
            .unwrap();
        assert_eq!(response["key_info"]["key_id"], "k1");
    }

    #[tokio::test]
    async fn query_parameters() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(format!("/v1/{PROJECT_ID}/secrets")))
            .and(query_param("limit", "100"))
            .and(query_param("marker", "a b"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"secrets": []})))
            .expect(1)
            .mount(&server)
            .await;

        client(&server.uri())
            .execute(
                ApiRequest::get(Service::Csms, REGION, "v1/{project_id}/secrets")
                    .query("limit", 100)
                    .query_opt("marker", Some("a b"))
                    .query_opt("name", None::<&str>),
            )
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn error_response() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404).set_body_json(
                json!({"error_code": "CSMS.0401", "error_msg": "secret does not exist"}),
            ))
            .mount(&server)
            .await;

        let err = client(&server.uri())
            .execute(ApiRequest::get(
                Service::Csms,
                REGION,
                "v1/{project_id}/secrets/missing",
            ))
            .await
            .unwrap_err();
        assert!(err.is_not_found());
        assert_eq!(err.code(), Some("CSMS.0401"));
        assert!(err.to_string().contains("secret does not exist"));
    }

    #[tokio::test]
    async fn empty_response_decodes() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .respond_with(ResponseTemplate::new(204))
            .mount(&server)
            .await;

        #[derive(Deserialize)]
        struct Nothing {}
        let _: Nothing = client(&server.uri())
            .call(ApiRequest::delete(Service::Kps, REGION, "v3/{project_id}/keypairs/k"))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn project_lookup_is_cached() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v3/projects"))
            .and(query_param("name", "eu-west-101"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "projects": [{"id": "eu-project", "name": "eu-west-101"}]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = client(&server.uri());
        assert_eq!(client.project_id(REGION).await.unwrap(), PROJECT_ID);
        assert_eq!(client.project_id("eu-west-101").await.unwrap(), "eu-project");
        assert_eq!(client.project_id("eu-west-101").await.unwrap(), "eu-project");
    }

    #[test]
    fn unconfigured_handle() {
        let mut diags = Diagnostics::default();
        assert!(ClientHandle::default().get(&mut diags).is_none());
        assert_eq!(diags.errors.len(), 1);
    }
}
