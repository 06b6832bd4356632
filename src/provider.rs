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

use std::collections::HashMap;

use async_trait::async_trait;
use tracing::info;

use tf_provider::DynamicDataSource;
use tf_provider::DynamicResource;
use tf_provider::schema::Schema;
use tf_provider::value::ValueEmpty;
use tf_provider::{map, AttributePath, Diagnostics, Provider};

use crate::client::{ClientHandle, DewClient};
use crate::config::{ClientConfig, ProviderConfig};
use crate::cpcs::{
    CpcsAppAccessKeyResource, CpcsAppClusterAssociationResource, CpcsAppResource,
    CpcsAppsDataSource, CpcsClustersDataSource, CpcsInstancesDataSource,
};
use crate::csms::{
    CsmsEventResource, CsmsEventsDataSource, CsmsSecretResource, CsmsSecretRotateResource,
    CsmsSecretVersionDataSource, CsmsSecretsDataSource,
};
use crate::kms::{
    KmsAliasResource, KmsDataKeyDataSource, KmsGrantResource, KmsGrantsDataSource,
    KmsKeyDataSource, KmsKeyResource, KmsKeysDataSource,
};
use crate::kps::{KpsKeypairAssociateResource, KpsKeypairResource, KpsKeypairsDataSource};
use crate::utils::{WithSchema, WithValidate};

#[derive(Debug, Default, Clone)]
pub struct DewProvider {
    client: ClientHandle,
}

#[async_trait]
impl Provider for DewProvider {
    type Config<'a> = ProviderConfig<'a>;
    type MetaState<'a> = ValueEmpty;

    fn schema(&self, _diags: &mut Diagnostics) -> Option<Schema> {
        Some(ProviderConfig::schema())
    }

    async fn validate<'a>(&self, diags: &mut Diagnostics, config: Self::Config<'a>) -> Option<()> {
        config.validate(diags, AttributePath::default()).await;

        if diags.errors.is_empty() {
            Some(())
        } else {
            None
        }
    }

    async fn configure<'a>(
        &self,
        diags: &mut Diagnostics,
        terraform_version: String,
        config: Self::Config<'a>,
    ) -> Option<()> {
        if !config.is_fully_known() {
            diags.root_error(
                "Provider configuration is not known",
                "The provider block depends on values only known after apply.",
            );
            return None;
        }

        let config = match ClientConfig::from_env(&config) {
            Ok(config) => config,
            Err(err) => {
                diags.root_error("Invalid provider configuration", format!("{err:#}"));
                return None;
            }
        };
        info!(
            region = %config.region,
            terraform_version = %terraform_version,
            "configuring the provider"
        );

        match DewClient::new(config) {
            Ok(client) => {
                self.client.set(client);
                Some(())
            }
            Err(err) => {
                diags.root_error("Failed to build the HTTP client", err.to_string());
                None
            }
        }
    }

    fn get_resources(
        &self,
        _diags: &mut Diagnostics,
    ) -> Option<HashMap<String, Box<dyn DynamicResource>>> {
        let client = &self.client;
        Some(map! {
            "kms_key" => KmsKeyResource::new(client.clone()),
            "kms_grant" => KmsGrantResource::new(client.clone()),
            "kms_alias" => KmsAliasResource::new(client.clone()),
            "csms_secret" => CsmsSecretResource::new(client.clone()),
            "csms_event" => CsmsEventResource::new(client.clone()),
            "csms_secret_rotate" => CsmsSecretRotateResource::new(client.clone()),
            "cpcs_app" => CpcsAppResource::new(client.clone()),
            "cpcs_app_access_key" => CpcsAppAccessKeyResource::new(client.clone()),
            "cpcs_app_cluster_association" => CpcsAppClusterAssociationResource::new(client.clone()),
            "kps_keypair" => KpsKeypairResource::new(client.clone()),
            "kps_keypair_associate" => KpsKeypairAssociateResource::new(client.clone()),
        })
    }

    fn get_data_sources(
        &self,
        _diags: &mut Diagnostics,
    ) -> Option<HashMap<String, Box<dyn DynamicDataSource>>> {
        let client = &self.client;
        Some(map! {
            "kms_key" => KmsKeyDataSource::new(client.clone()),
            "kms_keys" => KmsKeysDataSource::new(client.clone()),
            "kms_grants" => KmsGrantsDataSource::new(client.clone()),
            "kms_data_key" => KmsDataKeyDataSource::new(client.clone()),
            "csms_secrets" => CsmsSecretsDataSource::new(client.clone()),
            "csms_secret_version" => CsmsSecretVersionDataSource::new(client.clone()),
            "csms_events" => CsmsEventsDataSource::new(client.clone()),
            "cpcs_apps" => CpcsAppsDataSource::new(client.clone()),
            "cpcs_clusters" => CpcsClustersDataSource::new(client.clone()),
            "cpcs_instances" => CpcsInstancesDataSource::new(client.clone()),
            "kps_keypairs" => KpsKeypairsDataSource::new(client.clone()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry() {
        let provider = DewProvider::default();
        let mut diags = Diagnostics::default();
        let resources = provider.get_resources(&mut diags).unwrap();
        let data_sources = provider.get_data_sources(&mut diags).unwrap();
        assert_eq!(resources.len(), 11);
        assert_eq!(data_sources.len(), 11);
        assert!(resources.contains_key("kms_key"));
        assert!(data_sources.contains_key("kps_keypairs"));
    }

    #[tokio::test]
    async fn configure_without_credentials() {
        let provider = DewProvider::default();
        let mut diags = Diagnostics::default();
        let config = ProviderConfig {
            region: crate::utils::string("cn-north-4"),
            access_key: crate::utils::string("AK"),
            ..Default::default()
        };
        assert!(provider
            .configure(&mut diags, "1.7.0".to_owned(), config)
            .await
            .is_none());
        assert_eq!(diags.errors.len(), 1);
    }
}
