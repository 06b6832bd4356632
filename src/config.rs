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

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use tf_provider::schema::AttributeType;
use tf_provider::value::{Value, ValueBool, ValueMap, ValueNumber, ValueString};
use tf_provider::schema::{Block, Description, Schema};
use tf_provider::{map, AttributePath, Diagnostics};

use crate::client::SERVICE_CATALOG;
use crate::utils::{
    boolean, non_empty, number, optional, sensitive, string_map, tags, WithSchema, WithValidate,
};

pub const DEFAULT_CLOUD: &str = "myhuaweicloud.com";
pub const DEFAULT_MAX_RETRIES: u32 = 5;

/// Provider block
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderConfig<'a> {
    pub region: ValueString<'a>,
    pub access_key: ValueString<'a>,
    pub secret_key: ValueString<'a>,
    pub security_token: ValueString<'a>,
    pub token: ValueString<'a>,
    pub project_id: ValueString<'a>,
    pub cloud: ValueString<'a>,
    pub enterprise_project_id: ValueString<'a>,
    pub insecure: ValueBool,
    pub max_retries: ValueNumber,
    pub endpoints: ValueMap<'a, ValueString<'a>>,
}

impl<'a> WithSchema for ProviderConfig<'a> {
    fn schema() -> Schema {
        Schema {
            version: 1,
            block: Block {
                attributes: map! {
                    "region" => optional(AttributeType::String, "Default region, or `HW_REGION_NAME`"),
                    "access_key" => optional(AttributeType::String, "Access key, or `HW_ACCESS_KEY`"),
                    "secret_key" => sensitive(optional(AttributeType::String, "Secret key, or `HW_SECRET_KEY`")),
                    "security_token" => sensitive(optional(
                        AttributeType::String,
                        "Security token of temporary credentials, or `HW_SECURITY_TOKEN`",
                    )),
                    "token" => sensitive(optional(
                        AttributeType::String,
                        "IAM token used instead of an access key, or `HW_AUTH_TOKEN`",
                    )),
                    "project_id" => optional(
                        AttributeType::String,
                        "Project of the default region, or `HW_PROJECT_ID`",
                    ),
                    "cloud" => optional(
                        AttributeType::String,
                        "Endpoint domain suffix, or `HW_CLOUD`, defaults to `myhuaweicloud.com`",
                    ),
                    "enterprise_project_id" => optional(
                        AttributeType::String,
                        "Default enterprise project, or `HW_ENTERPRISE_PROJECT_ID`",
                    ),
                    "insecure" => optional(AttributeType::Bool, "Skip TLS verification, or `HW_INSECURE`"),
                    "max_retries" => optional(
                        AttributeType::Number,
                        "Number of retries of throttled requests, or `HW_MAX_RETRIES`, defaults to 5",
                    ),
                    "endpoints" => optional(
                        string_map(),
                        "Endpoint overrides, by service name (`kms`, `csms`, `cpcs`, `kps`, `iam`)",
                    ),
                },
                description: Description::plain("Data Encryption Workshop"),
                ..Default::default()
            },
        }
    }
}

#[async_trait]
impl<'a> WithValidate for ProviderConfig<'a> {
    async fn validate(&self, diags: &mut Diagnostics, attr_path: AttributePath) {
        if let Some(max_retries) = number(&self.max_retries) {
            if max_retries < 0 {
                diags.error_short(
                    "`max_retries` should be positive",
                    attr_path.clone().attribute("max_retries"),
                );
            }
        }
        for service in tags(&self.endpoints).keys() {
            if !SERVICE_CATALOG.contains_key(service.as_str()) {
                diags.error(
                    format!("Unknown service `{service}`"),
                    "Endpoints can be overridden for the services kms, csms, cpcs, kps and iam.",
                    attr_path.clone().attribute("endpoints").key(service.clone()),
                );
            }
        }
        if non_empty(&self.token).is_some()
            && (non_empty(&self.access_key).is_some() || non_empty(&self.secret_key).is_some())
        {
            diags.error_short(
                "`token` cannot be combined with `access_key` and `secret_key`",
                attr_path.attribute("token"),
            );
        }
    }
}

#[derive(Clone)]
pub enum Credentials {
    AkSk {
        access_key: String,
        secret_key: String,
        security_token: Option<String>,
    },
    Token(String),
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Credentials::AkSk { access_key, .. } => f
                .debug_struct("AkSk")
                .field("access_key", access_key)
                .finish_non_exhaustive(),
            Credentials::Token(_) => f.write_str("Token"),
        }
    }
}

/// Provider configuration once merged with the environment
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub region: String,
    pub credentials: Credentials,
    pub project_id: Option<String>,
    pub cloud: String,
    pub enterprise_project_id: Option<String>,
    pub insecure: bool,
    pub max_retries: u32,
    pub endpoints: BTreeMap<String, String>,
}

impl ClientConfig {
    pub fn from_env(config: &ProviderConfig) -> Result<Self> {
        Self::resolve(config, |name| std::env::var(name).ok())
    }

    /// Attributes take precedence over the environment variables given by `env`
    pub fn resolve(config: &ProviderConfig, env: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let lookup = |value: &ValueString, name: &str| {
            non_empty(value)
                .map(str::to_owned)
                .or_else(|| env(name).filter(|v| !v.is_empty()))
        };

        let region = lookup(&config.region, "HW_REGION_NAME")
            .ok_or_else(|| anyhow!("the region must be set, with `region` or `HW_REGION_NAME`"))?;

        let token = lookup(&config.token, "HW_AUTH_TOKEN");
        let access_key = lookup(&config.access_key, "HW_ACCESS_KEY");
        let secret_key = lookup(&config.secret_key, "HW_SECRET_KEY");
        let credentials = match (access_key, secret_key, token) {
            (Some(access_key), Some(secret_key), _) => Credentials::AkSk {
                access_key,
                secret_key,
                security_token: lookup(&config.security_token, "HW_SECURITY_TOKEN"),
            },
            (None, None, Some(token)) => Credentials::Token(token),
            (Some(_), None, _) => return Err(anyhow!("`access_key` is set without `secret_key`")),
            (None, Some(_), _) => return Err(anyhow!("`secret_key` is set without `access_key`")),
            (None, None, None) => {
                return Err(anyhow!(
                    "no credentials: set `access_key` and `secret_key`, or `token`"
                ))
            }
        };

        let insecure = match boolean(&config.insecure) {
            Some(insecure) => insecure,
            None => env("HW_INSECURE")
                .map(|v| matches!(v.to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
                .unwrap_or(false),
        };

        let max_retries = match number(&config.max_retries) {
            Some(n) => u32::try_from(n).context("`max_retries` should be positive")?,
            None => match env("HW_MAX_RETRIES") {
                Some(n) => n
                    .parse()
                    .with_context(|| format!("invalid HW_MAX_RETRIES `{n}`"))?,
                None => DEFAULT_MAX_RETRIES,
            },
        };

        let endpoints = tags(&config.endpoints)
            .into_iter()
            .map(|(service, mut endpoint)| {
                if !endpoint.ends_with('/') {
                    endpoint.push('/');
                }
                (service, endpoint)
            })
            .collect();

        Ok(Self {
            region,
            credentials,
            project_id: lookup(&config.project_id, "HW_PROJECT_ID"),
            cloud: lookup(&config.cloud, "HW_CLOUD").unwrap_or_else(|| DEFAULT_CLOUD.to_owned()),
            enterprise_project_id: lookup(&config.enterprise_project_id, "HW_ENTERPRISE_PROJECT_ID"),
            insecure,
            max_retries,
            endpoints,
        })
    }
}

impl<'a> ProviderConfig<'a> {
    pub fn is_fully_known(&self) -> bool {
        [
            &self.region,
            &self.access_key,
            &self.secret_key,
            &self.security_token,
            &self.token,
            &self.project_id,
            &self.cloud,
            &self.enterprise_project_id,
        ]
        .iter()
        .all(|value| !value.is_unknown())
            && !self.insecure.is_unknown()
            && !self.max_retries.is_unknown()
            && !matches!(self.endpoints, Value::Unknown)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use crate::utils::string;

    use super::*;

    fn env(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn environment_fallback() {
        let config = ClientConfig::resolve(
            &ProviderConfig::default(),
            env(&[
                ("HW_REGION_NAME", "cn-north-4"),
                ("HW_ACCESS_KEY", "AK"),
                ("HW_SECRET_KEY", "SK"),
                ("HW_MAX_RETRIES", "2"),
                ("HW_INSECURE", "true"),
            ]),
        )
        .unwrap();
        assert_eq!(config.region, "cn-north-4");
        assert_eq!(config.cloud, DEFAULT_CLOUD);
        assert_eq!(config.max_retries, 2);
        assert!(config.insecure);
        assert!(matches!(
            config.credentials,
            Credentials::AkSk { ref access_key, security_token: None, .. } if access_key == "AK"
        ));
    }

    #[test]
    fn attributes_take_precedence() {
        let provider = ProviderConfig {
            region: string("eu-west-101"),
            token: string("TOKEN"),
            max_retries: Value::Value(0),
            endpoints: Value::Value(
                [(std::borrow::Cow::from("kms"), string("https://kms.internal"))]
                    .into_iter()
                    .collect(),
            ),
            ..Default::default()
        };
        let config =
            ClientConfig::resolve(&provider, env(&[("HW_REGION_NAME", "cn-north-4")])).unwrap();
        assert_eq!(config.region, "eu-west-101");
        assert_eq!(config.max_retries, 0);
        assert!(matches!(config.credentials, Credentials::Token(ref t) if t == "TOKEN"));
        assert_eq!(
            config.endpoints.get("kms").map(String::as_str),
            Some("https://kms.internal/")
        );
    }

    #[test]
    fn missing_settings() {
        assert!(ClientConfig::resolve(&ProviderConfig::default(), env(&[])).is_err());
        assert!(ClientConfig::resolve(
            &ProviderConfig::default(),
            env(&[("HW_REGION_NAME", "r"), ("HW_ACCESS_KEY", "AK")])
        )
        .is_err());
    }

    #[tokio::test]
    async fn validation() {
        let provider = ProviderConfig {
            max_retries: Value::Value(-1),
            token: string("TOKEN"),
            access_key: string("AK"),
            endpoints: Value::Value(
                [(std::borrow::Cow::from("ecs"), string("https://ecs"))]
                    .into_iter()
                    .collect(),
            ),
            ..Default::default()
        };
        let mut diags = Diagnostics::default();
        provider.validate(&mut diags, AttributePath::default()).await;
        assert_eq!(diags.errors.len(), 3);
    }

    #[test]
    fn credentials_are_redacted() {
        let credentials = Credentials::AkSk {
            access_key: "AK".into(),
            secret_key: "very-secret".into(),
            security_token: None,
        };
        assert!(!format!("{credentials:?}").contains("very-secret"));
    }
}
