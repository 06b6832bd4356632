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
use serde::{Deserialize, Serialize};

use tf_provider::schema::AttributeType;
use tf_provider::value::{Value, ValueBool, ValueList, ValueNumber, ValueString};
use tf_provider::schema::{Block, Description, Schema};
use tf_provider::{map, AttributePath, Diagnostics};

use crate::utils::{
    check_one_of, common_attributes, computed, null_if_unknown, object_list, optional,
    optional_computed, required, sensitive, timeouts_block, unknown_if_null, validate_timeouts,
    TimeoutsBlock, WithNormalize, WithSchema, WithValidate,
};

pub const ACCESS_KEY_STATUSES: &[&str] = &["enable", "disable"];

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppState<'a> {
    pub id: ValueString<'a>,
    pub region: ValueString<'a>,
    pub name: ValueString<'a>,
    pub vpc_id: ValueString<'a>,
    pub vpc_name: ValueString<'a>,
    pub subnet_id: ValueString<'a>,
    pub subnet_name: ValueString<'a>,
    pub description: ValueString<'a>,
    pub account_name: ValueString<'a>,
    pub created_at: ValueString<'a>,
}

impl<'a> WithSchema for AppState<'a> {
    fn schema() -> Schema {
        let mut attributes = common_attributes();
        attributes.extend::<std::collections::HashMap<String, tf_provider::schema::Attribute>>(map! {
            "name" => required(AttributeType::String, "Name of the app"),
            "vpc_id" => required(AttributeType::String, "VPC of the app"),
            "vpc_name" => required(AttributeType::String, "Name of the VPC"),
            "subnet_id" => required(AttributeType::String, "Subnet of the app"),
            "subnet_name" => required(AttributeType::String, "Name of the subnet"),
            "description" => optional(AttributeType::String, "Description of the app"),
            "account_name" => computed(AttributeType::String, "Account owning the app"),
            "created_at" => computed(AttributeType::String, "Creation time"),
        });
        Schema {
            version: 1,
            block: Block {
                attributes,
                description: Description::plain(
                    "CPCS app, every argument change creates a new app",
                ),
                ..Default::default()
            },
        }
    }
}

#[async_trait]
impl<'a> WithValidate for AppState<'a> {
    async fn validate(&self, diags: &mut Diagnostics, attr_path: AttributePath) {
        if let Value::Value(name) = &self.name {
            if name.is_empty() || name.len() > 64 {
                diags.error_short(
                    "`name` should have between 1 and 64 characters",
                    attr_path.attribute("name"),
                );
            }
        }
    }
}

impl<'a> WithNormalize for AppState<'a> {
    fn normalize(&mut self, _diags: &mut Diagnostics) {
        for value in [
            &mut self.id,
            &mut self.region,
            &mut self.account_name,
            &mut self.created_at,
        ] {
            unknown_if_null(value);
        }
    }

    fn settle(&mut self) {
        for value in [
            &mut self.id,
            &mut self.region,
            &mut self.account_name,
            &mut self.created_at,
        ] {
            null_if_unknown(value);
        }
    }
}

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccessKeyState<'a> {
    pub id: ValueString<'a>,
    pub region: ValueString<'a>,
    pub app_id: ValueString<'a>,
    pub key_name: ValueString<'a>,
    pub status: ValueString<'a>,
    pub access_key: ValueString<'a>,
    pub secret_key: ValueString<'a>,
    pub app_name: ValueString<'a>,
    pub is_downloaded: ValueBool,
    pub created_at: ValueString<'a>,
    pub downloaded_at: ValueString<'a>,
}

impl<'a> WithSchema for AccessKeyState<'a> {
    fn schema() -> Schema {
        let mut attributes = common_attributes();
        attributes.extend::<std::collections::HashMap<String, tf_provider::schema::Attribute>>(map! {
            "app_id" => required(
                AttributeType::String,
                "App of the access key, changing it creates a new access key",
            ),
            "key_name" => required(
                AttributeType::String,
                "Name of the access key, changing it creates a new access key",
            ),
            "status" => optional_computed(AttributeType::String, "`enable` or `disable`"),
            "access_key" => sensitive(computed(
                AttributeType::String,
                "Access key, downloaded once after the creation",
            )),
            "secret_key" => sensitive(computed(
                AttributeType::String,
                "Secret key, downloaded once after the creation",
            )),
            "app_name" => computed(AttributeType::String, "Name of the app"),
            "is_downloaded" => computed(AttributeType::Bool, "Whether the secret was downloaded"),
            "created_at" => computed(AttributeType::String, "Creation time"),
            "downloaded_at" => computed(AttributeType::String, "Download time"),
        });
        Schema {
            version: 1,
            block: Block {
                attributes,
                description: Description::plain("Access key of a CPCS app"),
                ..Default::default()
            },
        }
    }
}

#[async_trait]
impl<'a> WithValidate for AccessKeyState<'a> {
    async fn validate(&self, diags: &mut Diagnostics, attr_path: AttributePath) {
        check_one_of(
            diags,
            &self.status,
            ACCESS_KEY_STATUSES,
            attr_path.attribute("status"),
        );
    }
}

impl<'a> WithNormalize for AccessKeyState<'a> {
    fn normalize(&mut self, _diags: &mut Diagnostics) {
        for value in [
            &mut self.id,
            &mut self.region,
            &mut self.status,
            &mut self.access_key,
            &mut self.secret_key,
            &mut self.app_name,
            &mut self.created_at,
            &mut self.downloaded_at,
        ] {
            unknown_if_null(value);
        }
        unknown_if_null(&mut self.is_downloaded);
    }

    fn settle(&mut self) {
        for value in [
            &mut self.id,
            &mut self.region,
            &mut self.status,
            &mut self.access_key,
            &mut self.secret_key,
            &mut self.app_name,
            &mut self.created_at,
            &mut self.downloaded_at,
        ] {
            null_if_unknown(value);
        }
        null_if_unknown(&mut self.is_downloaded);
    }
}

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssociationState<'a> {
    pub id: ValueString<'a>,
    pub region: ValueString<'a>,
    pub app_id: ValueString<'a>,
    pub cluster_id: ValueString<'a>,
    pub cluster_name: ValueString<'a>,
    pub status: ValueString<'a>,
    pub timeouts: TimeoutsBlock<'a>,
}

impl<'a> WithSchema for AssociationState<'a> {
    fn schema() -> Schema {
        let mut attributes = common_attributes();
        attributes.extend::<std::collections::HashMap<String, tf_provider::schema::Attribute>>(map! {
            "app_id" => required(
                AttributeType::String,
                "App to associate, changing it creates a new association",
            ),
            "cluster_id" => required(
                AttributeType::String,
                "Cluster to associate, changing it creates a new association",
            ),
            "cluster_name" => computed(AttributeType::String, "Name of the cluster"),
            "status" => computed(AttributeType::String, "Status of the association"),
        });
        Schema {
            version: 1,
            block: Block {
                attributes,
                blocks: map! {
                    "timeouts" => timeouts_block(),
                },
                description: Description::plain("Association of a CPCS app with a cluster"),
                ..Default::default()
            },
        }
    }
}

#[async_trait]
impl<'a> WithValidate for AssociationState<'a> {
    async fn validate(&self, diags: &mut Diagnostics, attr_path: AttributePath) {
        validate_timeouts(diags, &self.timeouts, attr_path.attribute("timeouts"));
    }
}

impl<'a> WithNormalize for AssociationState<'a> {
    fn normalize(&mut self, _diags: &mut Diagnostics) {
        for value in [
            &mut self.id,
            &mut self.region,
            &mut self.cluster_name,
            &mut self.status,
        ] {
            unknown_if_null(value);
        }
    }

    fn settle(&mut self) {
        for value in [
            &mut self.id,
            &mut self.region,
            &mut self.cluster_name,
            &mut self.status,
        ] {
            null_if_unknown(value);
        }
    }
}

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppItem<'a> {
    pub app_id: ValueString<'a>,
    pub app_name: ValueString<'a>,
    pub vpc_id: ValueString<'a>,
    pub vpc_name: ValueString<'a>,
    pub subnet_id: ValueString<'a>,
    pub subnet_name: ValueString<'a>,
    pub description: ValueString<'a>,
    pub account_name: ValueString<'a>,
    pub created_at: ValueString<'a>,
}

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppsDataSourceState<'a> {
    pub id: ValueString<'a>,
    pub region: ValueString<'a>,
    pub app_name: ValueString<'a>,
    pub vpc_id: ValueString<'a>,
    pub apps: ValueList<Value<AppItem<'a>>>,
}

impl<'a> WithSchema for AppsDataSourceState<'a> {
    fn schema() -> Schema {
        let mut attributes = common_attributes();
        attributes.extend::<std::collections::HashMap<String, tf_provider::schema::Attribute>>(map! {
            "app_name" => optional(AttributeType::String, "Name of the apps"),
            "vpc_id" => optional(AttributeType::String, "VPC of the apps"),
            "apps" => computed(
                object_list(map! {
                    "app_id" => AttributeType::String,
                    "app_name" => AttributeType::String,
                    "vpc_id" => AttributeType::String,
                    "vpc_name" => AttributeType::String,
                    "subnet_id" => AttributeType::String,
                    "subnet_name" => AttributeType::String,
                    "description" => AttributeType::String,
                    "account_name" => AttributeType::String,
                    "created_at" => AttributeType::String,
                }),
                "Apps matching the filters",
            ),
        });
        Schema {
            version: 1,
            block: Block {
                attributes,
                description: Description::plain("CPCS apps matching the filters"),
                ..Default::default()
            },
        }
    }
}

#[async_trait]
impl<'a> WithValidate for AppsDataSourceState<'a> {
    async fn validate(&self, _diags: &mut Diagnostics, _attr_path: AttributePath) {}
}

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusterItem<'a> {
    pub cluster_id: ValueString<'a>,
    pub cluster_name: ValueString<'a>,
    pub status: ValueString<'a>,
    pub service_type: ValueString<'a>,
    pub az: ValueString<'a>,
    pub instance_num: ValueNumber,
    pub created_at: ValueString<'a>,
}

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClustersDataSourceState<'a> {
    pub id: ValueString<'a>,
    pub region: ValueString<'a>,
    pub name: ValueString<'a>,
    pub status: ValueString<'a>,
    pub service_type: ValueString<'a>,
    pub clusters: ValueList<Value<ClusterItem<'a>>>,
}

impl<'a> WithSchema for ClustersDataSourceState<'a> {
    fn schema() -> Schema {
        let mut attributes = common_attributes();
        attributes.extend::<std::collections::HashMap<String, tf_provider::schema::Attribute>>(map! {
            "name" => optional(AttributeType::String, "Name of the clusters"),
            "status" => optional(AttributeType::String, "Status of the clusters"),
            "service_type" => optional(AttributeType::String, "Service type of the clusters"),
            "clusters" => computed(
                object_list(map! {
                    "cluster_id" => AttributeType::String,
                    "cluster_name" => AttributeType::String,
                    "status" => AttributeType::String,
                    "service_type" => AttributeType::String,
                    "az" => AttributeType::String,
                    "instance_num" => AttributeType::Number,
                    "created_at" => AttributeType::String,
                }),
                "Clusters matching the filters",
            ),
        });
        Schema {
            version: 1,
            block: Block {
                attributes,
                description: Description::plain("CPCS clusters matching the filters"),
                ..Default::default()
            },
        }
    }
}

#[async_trait]
impl<'a> WithValidate for ClustersDataSourceState<'a> {
    async fn validate(&self, _diags: &mut Diagnostics, _attr_path: AttributePath) {}
}

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstanceItem<'a> {
    pub instance_id: ValueString<'a>,
    pub instance_name: ValueString<'a>,
    pub status: ValueString<'a>,
    pub service_type: ValueString<'a>,
    pub cluster_id: ValueString<'a>,
    pub az: ValueString<'a>,
    pub specification: ValueString<'a>,
    pub image_name: ValueString<'a>,
    pub created_at: ValueString<'a>,
    pub expired_at: ValueString<'a>,
}

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstancesDataSourceState<'a> {
    pub id: ValueString<'a>,
    pub region: ValueString<'a>,
    pub name: ValueString<'a>,
    pub status: ValueString<'a>,
    pub service_type: ValueString<'a>,
    pub cluster_id: ValueString<'a>,
    pub instances: ValueList<Value<InstanceItem<'a>>>,
}

impl<'a> WithSchema for InstancesDataSourceState<'a> {
    fn schema() -> Schema {
        let mut attributes = common_attributes();
        attributes.extend::<std::collections::HashMap<String, tf_provider::schema::Attribute>>(map! {
            "name" => optional(AttributeType::String, "Name of the instances"),
            "status" => optional(AttributeType::String, "Status of the instances"),
            "service_type" => optional(AttributeType::String, "Service type of the instances"),
            "cluster_id" => optional(AttributeType::String, "Cluster of the instances"),
            "instances" => computed(
                object_list(map! {
                    "instance_id" => AttributeType::String,
                    "instance_name" => AttributeType::String,
                    "status" => AttributeType::String,
                    "service_type" => AttributeType::String,
                    "cluster_id" => AttributeType::String,
                    "az" => AttributeType::String,
                    "specification" => AttributeType::String,
                    "image_name" => AttributeType::String,
                    "created_at" => AttributeType::String,
                    "expired_at" => AttributeType::String,
                }),
                "Instances matching the filters",
            ),
        });
        Schema {
            version: 1,
            block: Block {
                attributes,
                description: Description::plain("CPCS instances matching the filters"),
                ..Default::default()
            },
        }
    }
}

#[async_trait]
impl<'a> WithValidate for InstancesDataSourceState<'a> {
    async fn validate(&self, _diags: &mut Diagnostics, _attr_path: AttributePath) {}
}

#[cfg(test)]
mod tests {
    use crate::utils::string;

    use super::*;

    #[tokio::test]
    async fn access_key_status() {
        let mut diags = Diagnostics::default();
        AccessKeyState {
            status: string("enabled"),
            ..Default::default()
        }
        .validate(&mut diags, AttributePath::default()).await;
        assert_eq!(diags.errors.len(), 1);
    }

    #[test]
    fn planned_access_key_is_unknown() {
        let mut state = AccessKeyState {
            app_id: string("a1"),
            key_name: string("ci"),
            ..Default::default()
        };
        state.normalize(&mut Diagnostics::default());
        assert!(state.secret_key.is_unknown());
        assert!(state.status.is_unknown());
        assert!(state.is_downloaded.is_unknown());
    }
}
