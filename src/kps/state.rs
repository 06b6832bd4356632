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

use tf_provider::schema::{AttributeType, NestedBlock};
use tf_provider::value::{Value, ValueBool, ValueList, ValueNumber, ValueString};
use tf_provider::schema::{Block, Description, Schema};
use tf_provider::{map, AttributePath, Diagnostics};

use crate::utils::{
    check_one_of, common_attributes, computed, non_empty, null_if_unknown, object_list, optional,
    optional_computed, required, sensitive, timeouts_block, unknown_if_null, validate_timeouts,
    TimeoutsBlock, WithNormalize, WithSchema, WithValidate,
};

pub const SCOPES: &[&str] = &["user", "account"];
pub const ENCRYPTION_TYPES: &[&str] = &["default", "kms"];
pub const AUTH_TYPES: &[&str] = &["password", "keypair"];

/// Check an OpenSSH public key line: `<type> <base64> [comment]`
pub fn check_public_key(public_key: &str) -> Result<(), String> {
    let mut fields = public_key.split_whitespace();
    let (Some(_), Some(data)) = (fields.next(), fields.next()) else {
        return Err("expected `<type> <base64 key> [comment]`".to_owned());
    };
    russh_keys::parse_public_key_base64(data)
        .map(|_| ())
        .map_err(|err| err.to_string())
}

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeypairState<'a> {
    pub id: ValueString<'a>,
    pub region: ValueString<'a>,
    pub name: ValueString<'a>,
    pub scope: ValueString<'a>,
    pub encryption_type: ValueString<'a>,
    pub kms_key_name: ValueString<'a>,
    pub description: ValueString<'a>,
    pub public_key: ValueString<'a>,
    pub private_key: ValueString<'a>,
    pub key_file: ValueString<'a>,
    pub user_id: ValueString<'a>,
    pub fingerprint: ValueString<'a>,
    pub is_managed: ValueBool,
    pub created_at: ValueString<'a>,
}

impl<'a> WithSchema for KeypairState<'a> {
    fn schema() -> Schema {
        let mut attributes = common_attributes();
        attributes.extend::<std::collections::HashMap<String, tf_provider::schema::Attribute>>(map! {
            "name" => required(
                AttributeType::String,
                "Name of the keypair, changing it creates a new keypair",
            ),
            "scope" => optional_computed(
                AttributeType::String,
                "`user` or `account`, defaults to `user`, changing it creates a new keypair",
            ),
            "encryption_type" => optional(
                AttributeType::String,
                "Protection of the private key hosted by the service: `default` or `kms`",
            ),
            "kms_key_name" => optional(
                AttributeType::String,
                "KMS key protecting the private key when `encryption_type` is `kms`",
            ),
            "description" => optional(AttributeType::String, "Description of the keypair"),
            "public_key" => optional_computed(
                AttributeType::String,
                "OpenSSH public key to import, generated by the service when unset",
            ),
            "private_key" => sensitive(optional(
                AttributeType::String,
                "Private key to host in the service, requires `encryption_type`",
            )),
            "key_file" => optional(
                AttributeType::String,
                "Local file receiving the private key generated by the service",
            ),
            "user_id" => computed(AttributeType::String, "User owning the keypair"),
            "fingerprint" => computed(AttributeType::String, "Fingerprint of the public key"),
            "is_managed" => computed(
                AttributeType::Bool,
                "Whether the private key is hosted by the service",
            ),
            "created_at" => computed(AttributeType::String, "Creation time"),
        });
        Schema {
            version: 1,
            block: Block {
                attributes,
                description: Description::plain("SSH keypair"),
                ..Default::default()
            },
        }
    }
}

#[async_trait]
impl<'a> WithValidate for KeypairState<'a> {
    async fn validate(&self, diags: &mut Diagnostics, attr_path: AttributePath) {
        check_one_of(diags, &self.scope, SCOPES, attr_path.clone().attribute("scope"));
        check_one_of(
            diags,
            &self.encryption_type,
            ENCRYPTION_TYPES,
            attr_path.clone().attribute("encryption_type"),
        );
        if non_empty(&self.encryption_type) == Some("kms") && self.kms_key_name.is_null() {
            diags.error(
                "Missing `kms_key_name`",
                "`kms_key_name` is required when `encryption_type` is `kms`.",
                attr_path.clone().attribute("kms_key_name"),
            );
        }
        if !self.private_key.is_null() && self.encryption_type.is_null() {
            diags.error(
                "Missing `encryption_type`",
                "A hosted `private_key` must be protected, set `encryption_type`.",
                attr_path.clone().attribute("encryption_type"),
            );
        }
        if let Some(public_key) = non_empty(&self.public_key) {
            if let Err(err) = check_public_key(public_key) {
                diags.error(
                    "Invalid OpenSSH public key",
                    err,
                    attr_path.clone().attribute("public_key"),
                );
            }
            if !self.key_file.is_null() {
                diags.error_short(
                    "`key_file` cannot be set with an imported `public_key`",
                    attr_path.attribute("key_file"),
                );
            }
        }
    }
}

impl<'a> WithNormalize for KeypairState<'a> {
    fn normalize(&mut self, _diags: &mut Diagnostics) {
        for value in [
            &mut self.id,
            &mut self.region,
            &mut self.scope,
            &mut self.public_key,
            &mut self.user_id,
            &mut self.fingerprint,
            &mut self.created_at,
        ] {
            unknown_if_null(value);
        }
        unknown_if_null(&mut self.is_managed);
    }

    fn settle(&mut self) {
        for value in [
            &mut self.id,
            &mut self.region,
            &mut self.scope,
            &mut self.public_key,
            &mut self.user_id,
            &mut self.fingerprint,
            &mut self.created_at,
        ] {
            null_if_unknown(value);
        }
        null_if_unknown(&mut self.is_managed);
    }
}

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerBlock<'a> {
    pub id: ValueString<'a>,
    pub port: ValueNumber,
    pub disable_password: ValueBool,
    pub auth_type: ValueString<'a>,
    pub auth_key: ValueString<'a>,
}

fn servers_block() -> NestedBlock {
    NestedBlock::List(Block {
        attributes: map! {
            "id" => required(AttributeType::String, "Server receiving the keypair"),
            "port" => optional(AttributeType::Number, "SSH port of the server, defaults to 22"),
            "disable_password" => optional(
                AttributeType::Bool,
                "Whether the password login is disabled",
            ),
            "auth_type" => optional(
                AttributeType::String,
                "Credential of the server: `password` or `keypair`",
            ),
            "auth_key" => sensitive(optional(
                AttributeType::String,
                "Password or private key matching `auth_type`",
            )),
        },
        description: Description::plain("Server to associate with the keypair"),
        ..Default::default()
    })
}

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssociateState<'a> {
    pub id: ValueString<'a>,
    pub region: ValueString<'a>,
    pub keypair_name: ValueString<'a>,
    pub servers: ValueList<Value<ServerBlock<'a>>>,
    pub timeouts: TimeoutsBlock<'a>,
}

impl<'a> WithSchema for AssociateState<'a> {
    fn schema() -> Schema {
        let mut attributes = common_attributes();
        attributes.extend::<std::collections::HashMap<String, tf_provider::schema::Attribute>>(map! {
            "keypair_name" => required(
                AttributeType::String,
                "Keypair to associate, changing it creates a new association",
            ),
        });
        Schema {
            version: 1,
            block: Block {
                attributes,
                blocks: map! {
                    "servers" => servers_block(),
                    "timeouts" => timeouts_block(),
                },
                description: Description::plain(
                    "Association of a keypair with servers, changing the servers creates a new association",
                ),
                ..Default::default()
            },
        }
    }
}

#[async_trait]
impl<'a> WithValidate for AssociateState<'a> {
    async fn validate(&self, diags: &mut Diagnostics, attr_path: AttributePath) {
        if let Value::Value(servers) = &self.servers {
            if servers.is_empty() {
                diags.error_short(
                    "At least one server is required",
                    attr_path.clone().attribute("servers"),
                );
            }
            for (i, server) in servers.iter().enumerate() {
                let Value::Value(server) = server else {
                    continue;
                };
                let server_path = attr_path.clone().attribute("servers").index(i as i64);
                check_one_of(
                    diags,
                    &server.auth_type,
                    AUTH_TYPES,
                    server_path.clone().attribute("auth_type"),
                );
                if server.auth_type.is_null() != server.auth_key.is_null() {
                    diags.error_short(
                        "`auth_type` and `auth_key` go together",
                        server_path.attribute("auth_key"),
                    );
                }
            }
        }
        validate_timeouts(diags, &self.timeouts, attr_path.attribute("timeouts"));
    }
}

impl<'a> WithNormalize for AssociateState<'a> {
    fn normalize(&mut self, _diags: &mut Diagnostics) {
        unknown_if_null(&mut self.id);
        unknown_if_null(&mut self.region);
    }

    fn settle(&mut self) {
        null_if_unknown(&mut self.id);
        null_if_unknown(&mut self.region);
    }
}

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeypairItem<'a> {
    pub name: ValueString<'a>,
    pub scope: ValueString<'a>,
    pub public_key: ValueString<'a>,
    pub fingerprint: ValueString<'a>,
    pub is_managed: ValueBool,
}

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeypairsDataSourceState<'a> {
    pub id: ValueString<'a>,
    pub region: ValueString<'a>,
    pub name: ValueString<'a>,
    pub fingerprint: ValueString<'a>,
    pub public_key: ValueString<'a>,
    pub is_managed: ValueBool,
    pub keypairs: ValueList<Value<KeypairItem<'a>>>,
}

impl<'a> WithSchema for KeypairsDataSourceState<'a> {
    fn schema() -> Schema {
        let mut attributes = common_attributes();
        attributes.extend::<std::collections::HashMap<String, tf_provider::schema::Attribute>>(map! {
            "name" => optional(AttributeType::String, "Name of the keypairs"),
            "fingerprint" => optional(AttributeType::String, "Fingerprint of the keypairs"),
            "public_key" => optional(AttributeType::String, "Public key of the keypairs"),
            "is_managed" => optional(
                AttributeType::Bool,
                "Whether the private key is hosted by the service",
            ),
            "keypairs" => computed(
                object_list(map! {
                    "name" => AttributeType::String,
                    "scope" => AttributeType::String,
                    "public_key" => AttributeType::String,
                    "fingerprint" => AttributeType::String,
                    "is_managed" => AttributeType::Bool,
                }),
                "Keypairs matching the filters",
            ),
        });
        Schema {
            version: 1,
            block: Block {
                attributes,
                description: Description::plain("Keypairs matching the filters"),
                ..Default::default()
            },
        }
    }
}

#[async_trait]
impl<'a> WithValidate for KeypairsDataSourceState<'a> {
    async fn validate(&self, _diags: &mut Diagnostics, _attr_path: AttributePath) {}
}

#[cfg(test)]
mod tests {
    use crate::utils::string;

    use super::*;

    const PUBLIC_KEY: &str = "ssh-ed25519 AAAAC3NzaC1lZDI1NTE5AAAAIJdD7y3aLq454yWBdwLWbieU1ebz9/cu7/QEXn9OIeZJ deploy@ci";

    #[test]
    fn public_keys() {
        assert!(check_public_key(PUBLIC_KEY).is_ok());
        assert!(check_public_key("ssh-ed25519").is_err());
        assert!(check_public_key("ssh-ed25519 bm90IGEga2V5").is_err());
    }

    #[tokio::test]
    async fn kms_protection_needs_a_key() {
        let mut diags = Diagnostics::default();
        KeypairState {
            name: string("deploy"),
            encryption_type: string("kms"),
            ..Default::default()
        }
        .validate(&mut diags, AttributePath::default()).await;
        assert_eq!(diags.errors.len(), 1);
    }

    #[tokio::test]
    async fn imported_public_key_has_no_key_file() {
        let mut diags = Diagnostics::default();
        KeypairState {
            name: string("deploy"),
            public_key: string(PUBLIC_KEY),
            key_file: string("/tmp/deploy.pem"),
            ..Default::default()
        }
        .validate(&mut diags, AttributePath::default()).await;
        assert_eq!(diags.errors.len(), 1);
    }

    #[tokio::test]
    async fn server_credentials_go_together() {
        let mut diags = Diagnostics::default();
        AssociateState {
            keypair_name: string("deploy"),
            servers: Value::Value(vec![Value::Value(ServerBlock {
                id: string("s1"),
                auth_type: string("password"),
                ..Default::default()
            })]),
            ..Default::default()
        }
        .validate(&mut diags, AttributePath::default()).await;
        assert_eq!(diags.errors.len(), 1);
    }
}
