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
use tf_provider::value::{Value, ValueBool, ValueList, ValueMap, ValueNumber, ValueString};
use tf_provider::schema::{Block, Description, Schema};
use tf_provider::{map, AttributePath, Diagnostics};

use crate::utils::{
    check_one_of, check_range, common_attributes, computed, non_empty, null_if_unknown,
    object_list, optional, optional_computed, required, sensitive, string_list, string_map,
    unknown_if_null, WithNormalize, WithSchema, WithValidate,
};

pub const KEY_ALGORITHMS: &[&str] = &[
    "AES_256", "SM4", "RSA_2048", "RSA_3072", "RSA_4096", "EC_P256", "EC_P384", "SM2",
    "HMAC_256", "HMAC_384", "HMAC_512", "HMAC_SM3",
];
pub const KEY_USAGES: &[&str] = &["ENCRYPT_DECRYPT", "SIGN_VERIFY", "GENERATE_VERIFY_MAC"];
pub const KEY_ORIGINS: &[&str] = &["kms", "external"];
pub const KEY_STATES: &[&str] = &["1", "2", "3", "4", "5"];
pub const GRANT_OPERATIONS: &[&str] = &[
    "create-datakey",
    "create-datakey-without-plaintext",
    "encrypt-datakey",
    "decrypt-datakey",
    "describe-key",
    "retire-grant",
    "encrypt-data",
    "decrypt-data",
    "sign",
    "verify",
    "generate-mac",
    "verify-mac",
];
pub const PRINCIPAL_TYPES: &[&str] = &["user", "domain"];

pub const DEFAULT_PENDING_DAYS: i64 = 7;

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeyState<'a> {
    pub id: ValueString<'a>,
    pub region: ValueString<'a>,
    pub key_alias: ValueString<'a>,
    pub key_description: ValueString<'a>,
    pub key_algorithm: ValueString<'a>,
    pub key_usage: ValueString<'a>,
    pub origin: ValueString<'a>,
    pub keystore_id: ValueString<'a>,
    pub enterprise_project_id: ValueString<'a>,
    pub pending_days: ValueNumber,
    pub is_enabled: ValueBool,
    pub rotation_enabled: ValueBool,
    pub rotation_interval: ValueNumber,
    pub tags: ValueMap<'a, ValueString<'a>>,
    pub key_id: ValueString<'a>,
    pub domain_id: ValueString<'a>,
    pub key_state: ValueString<'a>,
    pub creation_date: ValueString<'a>,
    pub scheduled_deletion_date: ValueString<'a>,
    pub expiration_time: ValueString<'a>,
    pub rotation_number: ValueNumber,
}

impl<'a> WithSchema for KeyState<'a> {
    fn schema() -> Schema {
        let mut attributes = common_attributes();
        attributes.extend::<std::collections::HashMap<String, tf_provider::schema::Attribute>>(map! {
            "key_alias" => required(AttributeType::String, "Alias of the key"),
            "key_description" => optional(AttributeType::String, "Description of the key"),
            "key_algorithm" => optional_computed(
                AttributeType::String,
                "Algorithm of the key, defaults to `AES_256`, changing it creates a new key",
            ),
            "key_usage" => optional_computed(
                AttributeType::String,
                "Usage of the key, changing it creates a new key",
            ),
            "origin" => optional_computed(
                AttributeType::String,
                "`kms` or `external`, changing it creates a new key",
            ),
            "keystore_id" => optional_computed(
                AttributeType::String,
                "Dedicated keystore of the key, changing it creates a new key",
            ),
            "enterprise_project_id" => optional_computed(
                AttributeType::String,
                "Enterprise project of the key, changing it creates a new key",
            ),
            "pending_days" => optional(
                AttributeType::Number,
                "Days before the deletion of the key once destroyed, from 7 to 1096, defaults to 7",
            ),
            "is_enabled" => optional_computed(AttributeType::Bool, "Whether the key is enabled"),
            "rotation_enabled" => optional_computed(
                AttributeType::Bool,
                "Whether the key material is rotated",
            ),
            "rotation_interval" => optional_computed(
                AttributeType::Number,
                "Days between two rotations, from 30 to 365",
            ),
            "tags" => optional(string_map(), "Tags of the key"),
            "key_id" => computed(AttributeType::String, "Id of the key"),
            "domain_id" => computed(AttributeType::String, "Account of the key"),
            "key_state" => computed(AttributeType::String, "State of the key, from 1 to 5"),
            "creation_date" => computed(AttributeType::String, "Creation time, in milliseconds"),
            "scheduled_deletion_date" => computed(
                AttributeType::String,
                "Scheduled deletion time, in milliseconds",
            ),
            "expiration_time" => computed(
                AttributeType::String,
                "Expiration time of imported key material",
            ),
            "rotation_number" => computed(AttributeType::Number, "Number of rotations"),
        });
        Schema {
            version: 1,
            block: Block {
                attributes,
                description: Description::plain("KMS key"),
                ..Default::default()
            },
        }
    }
}

#[async_trait]
impl<'a> WithValidate for KeyState<'a> {
    async fn validate(&self, diags: &mut Diagnostics, attr_path: AttributePath) {
        check_one_of(
            diags,
            &self.key_algorithm,
            KEY_ALGORITHMS,
            attr_path.clone().attribute("key_algorithm"),
        );
        check_one_of(
            diags,
            &self.key_usage,
            KEY_USAGES,
            attr_path.clone().attribute("key_usage"),
        );
        check_one_of(
            diags,
            &self.origin,
            KEY_ORIGINS,
            attr_path.clone().attribute("origin"),
        );
        check_range(
            diags,
            &self.pending_days,
            7,
            1096,
            attr_path.clone().attribute("pending_days"),
        );
        check_range(
            diags,
            &self.rotation_interval,
            30,
            365,
            attr_path.clone().attribute("rotation_interval"),
        );
        if let Value::Value(alias) = &self.key_alias {
            if alias.is_empty() || alias.len() > 255 {
                diags.error_short(
                    "`key_alias` should have between 1 and 255 characters",
                    attr_path.attribute("key_alias"),
                );
            }
        }
    }
}

impl<'a> WithNormalize for KeyState<'a> {
    fn normalize(&mut self, _diags: &mut Diagnostics) {
        for value in [
            &mut self.id,
            &mut self.region,
            &mut self.key_algorithm,
            &mut self.key_usage,
            &mut self.origin,
            &mut self.keystore_id,
            &mut self.enterprise_project_id,
            &mut self.key_id,
            &mut self.domain_id,
            &mut self.key_state,
            &mut self.creation_date,
            &mut self.scheduled_deletion_date,
            &mut self.expiration_time,
        ] {
            unknown_if_null(value);
        }
        unknown_if_null(&mut self.is_enabled);
        unknown_if_null(&mut self.rotation_enabled);
        unknown_if_null(&mut self.rotation_interval);
        unknown_if_null(&mut self.rotation_number);
    }

    fn settle(&mut self) {
        for value in [
            &mut self.id,
            &mut self.region,
            &mut self.key_alias,
            &mut self.key_description,
            &mut self.key_algorithm,
            &mut self.key_usage,
            &mut self.origin,
            &mut self.keystore_id,
            &mut self.enterprise_project_id,
            &mut self.key_id,
            &mut self.domain_id,
            &mut self.key_state,
            &mut self.creation_date,
            &mut self.scheduled_deletion_date,
            &mut self.expiration_time,
        ] {
            null_if_unknown(value);
        }
        null_if_unknown(&mut self.is_enabled);
        null_if_unknown(&mut self.rotation_enabled);
        null_if_unknown(&mut self.rotation_interval);
        null_if_unknown(&mut self.rotation_number);
        null_if_unknown(&mut self.tags);
    }
}

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct GrantState<'a> {
    pub id: ValueString<'a>,
    pub region: ValueString<'a>,
    pub key_id: ValueString<'a>,
    pub grantee_principal: ValueString<'a>,
    pub grantee_principal_type: ValueString<'a>,
    pub operations: ValueList<ValueString<'a>>,
    pub name: ValueString<'a>,
    pub retiring_principal: ValueString<'a>,
    pub grant_id: ValueString<'a>,
    pub creator: ValueString<'a>,
    pub creation_date: ValueString<'a>,
}

impl<'a> WithSchema for GrantState<'a> {
    fn schema() -> Schema {
        let mut attributes = common_attributes();
        attributes.extend::<std::collections::HashMap<String, tf_provider::schema::Attribute>>(map! {
            "key_id" => required(AttributeType::String, "Key of the grant"),
            "grantee_principal" => required(
                AttributeType::String,
                "User or account receiving the grant",
            ),
            "grantee_principal_type" => optional_computed(
                AttributeType::String,
                "`user` or `domain`, defaults to `user`",
            ),
            "operations" => required(string_list(), "Granted operations"),
            "name" => optional_computed(AttributeType::String, "Name of the grant"),
            "retiring_principal" => optional(
                AttributeType::String,
                "User allowed to retire the grant",
            ),
            "grant_id" => computed(AttributeType::String, "Id of the grant"),
            "creator" => computed(AttributeType::String, "User who created the grant"),
            "creation_date" => computed(AttributeType::String, "Creation time, in milliseconds"),
        });
        Schema {
            version: 1,
            block: Block {
                attributes,
                description: Description::plain(
                    "KMS grant, every argument change creates a new grant",
                ),
                ..Default::default()
            },
        }
    }
}

#[async_trait]
impl<'a> WithValidate for GrantState<'a> {
    async fn validate(&self, diags: &mut Diagnostics, attr_path: AttributePath) {
        check_one_of(
            diags,
            &self.grantee_principal_type,
            PRINCIPAL_TYPES,
            attr_path.clone().attribute("grantee_principal_type"),
        );
        if let Value::Value(operations) = &self.operations {
            if operations.is_empty() {
                diags.error_short(
                    "At least one operation should be granted",
                    attr_path.clone().attribute("operations"),
                );
            }
            for (i, operation) in operations.iter().enumerate() {
                check_one_of(
                    diags,
                    operation,
                    GRANT_OPERATIONS,
                    attr_path.clone().attribute("operations").index(i as i64),
                );
            }
        }
    }
}

impl<'a> WithNormalize for GrantState<'a> {
    fn normalize(&mut self, _diags: &mut Diagnostics) {
        for value in [
            &mut self.id,
            &mut self.region,
            &mut self.grantee_principal_type,
            &mut self.name,
            &mut self.grant_id,
            &mut self.creator,
            &mut self.creation_date,
        ] {
            unknown_if_null(value);
        }
    }

    fn settle(&mut self) {
        for value in [
            &mut self.id,
            &mut self.region,
            &mut self.grantee_principal_type,
            &mut self.name,
            &mut self.retiring_principal,
            &mut self.grant_id,
            &mut self.creator,
            &mut self.creation_date,
        ] {
            null_if_unknown(value);
        }
    }
}

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct AliasState<'a> {
    pub id: ValueString<'a>,
    pub region: ValueString<'a>,
    pub key_id: ValueString<'a>,
    pub alias: ValueString<'a>,
    pub alias_urn: ValueString<'a>,
    pub domain_id: ValueString<'a>,
    pub create_time: ValueString<'a>,
    pub update_time: ValueString<'a>,
}

impl<'a> WithSchema for AliasState<'a> {
    fn schema() -> Schema {
        let mut attributes = common_attributes();
        attributes.extend::<std::collections::HashMap<String, tf_provider::schema::Attribute>>(map! {
            "key_id" => required(AttributeType::String, "Key the alias points to"),
            "alias" => required(
                AttributeType::String,
                "Alias, starting with `alias/`, changing it creates a new alias",
            ),
            "alias_urn" => computed(AttributeType::String, "URN of the alias"),
            "domain_id" => computed(AttributeType::String, "Account of the alias"),
            "create_time" => computed(AttributeType::String, "Creation time"),
            "update_time" => computed(AttributeType::String, "Last update time"),
        });
        Schema {
            version: 1,
            block: Block {
                attributes,
                description: Description::plain("KMS alias"),
                ..Default::default()
            },
        }
    }
}

#[async_trait]
impl<'a> WithValidate for AliasState<'a> {
    async fn validate(&self, diags: &mut Diagnostics, attr_path: AttributePath) {
        if let Value::Value(alias) = &self.alias {
            if !alias.starts_with("alias/") || alias.len() <= "alias/".len() {
                diags.error(
                    format!("Invalid alias `{alias}`"),
                    "An alias should start with `alias/`, like `alias/my-key`.",
                    attr_path.attribute("alias"),
                );
            }
        }
    }
}

impl<'a> WithNormalize for AliasState<'a> {
    fn normalize(&mut self, _diags: &mut Diagnostics) {
        for value in [
            &mut self.id,
            &mut self.region,
            &mut self.alias_urn,
            &mut self.domain_id,
            &mut self.create_time,
            &mut self.update_time,
        ] {
            unknown_if_null(value);
        }
    }

    fn settle(&mut self) {
        for value in [
            &mut self.id,
            &mut self.region,
            &mut self.alias_urn,
            &mut self.domain_id,
            &mut self.create_time,
            &mut self.update_time,
        ] {
            null_if_unknown(value);
        }
    }
}

/// Key as listed by the key data sources
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeyItem<'a> {
    pub key_id: ValueString<'a>,
    pub key_alias: ValueString<'a>,
    pub key_description: ValueString<'a>,
    pub key_algorithm: ValueString<'a>,
    pub key_usage: ValueString<'a>,
    pub key_state: ValueString<'a>,
    pub origin: ValueString<'a>,
    pub domain_id: ValueString<'a>,
    pub default_key_flag: ValueString<'a>,
    pub creation_date: ValueString<'a>,
    pub scheduled_deletion_date: ValueString<'a>,
    pub expiration_time: ValueString<'a>,
    pub enterprise_project_id: ValueString<'a>,
    pub keystore_id: ValueString<'a>,
    pub tags: ValueMap<'a, ValueString<'a>>,
}

/// Filters shared by `kms_key` and `kms_keys`
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeyFilter<'a> {
    pub key_alias: ValueString<'a>,
    pub key_id: ValueString<'a>,
    pub key_description: ValueString<'a>,
    pub key_state: ValueString<'a>,
    pub enterprise_project_id: ValueString<'a>,
}

fn key_filter_attributes() -> std::collections::HashMap<String, tf_provider::schema::Attribute> {
    map! {
        "key_alias" => optional_computed(AttributeType::String, "Alias of the key"),
        "key_id" => optional_computed(AttributeType::String, "Id of the key"),
        "key_description" => optional_computed(AttributeType::String, "Description of the key"),
        "key_state" => optional_computed(AttributeType::String, "State of the key, from 1 to 5"),
        "enterprise_project_id" => optional_computed(
            AttributeType::String,
            "Enterprise project of the key",
        ),
    }
}

fn validate_key_filter(filter: &KeyFilter, diags: &mut Diagnostics, attr_path: AttributePath) {
    check_one_of(
        diags,
        &filter.key_state,
        KEY_STATES,
        attr_path.attribute("key_state"),
    );
}

impl<'a> KeyFilter<'a> {
    pub fn matches(&self, key: &super::api::KeyInfo) -> bool {
        let test = |filter: &ValueString, value: Option<&str>| match non_empty(filter) {
            Some(filter) => value == Some(filter),
            None => true,
        };
        test(&self.key_alias, key.key_alias.as_deref())
            && test(&self.key_id, Some(key.key_id.as_str()))
            && test(&self.key_description, key.key_description.as_deref())
            && test(&self.key_state, key.key_state.as_deref())
            && test(
                &self.enterprise_project_id,
                key.sys_enterprise_project_id.as_deref(),
            )
    }
}

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeyDataSourceState<'a> {
    pub id: ValueString<'a>,
    pub region: ValueString<'a>,
    pub key_alias: ValueString<'a>,
    pub key_id: ValueString<'a>,
    pub key_description: ValueString<'a>,
    pub key_state: ValueString<'a>,
    pub enterprise_project_id: ValueString<'a>,
    pub key_algorithm: ValueString<'a>,
    pub key_usage: ValueString<'a>,
    pub origin: ValueString<'a>,
    pub domain_id: ValueString<'a>,
    pub default_key_flag: ValueString<'a>,
    pub creation_date: ValueString<'a>,
    pub scheduled_deletion_date: ValueString<'a>,
    pub expiration_time: ValueString<'a>,
    pub keystore_id: ValueString<'a>,
    pub tags: ValueMap<'a, ValueString<'a>>,
    pub rotation_enabled: ValueBool,
    pub rotation_interval: ValueNumber,
    pub rotation_number: ValueNumber,
}

impl<'a> KeyDataSourceState<'a> {
    pub fn filter(&self) -> KeyFilter<'a> {
        KeyFilter {
            key_alias: self.key_alias.clone(),
            key_id: self.key_id.clone(),
            key_description: self.key_description.clone(),
            key_state: self.key_state.clone(),
            enterprise_project_id: self.enterprise_project_id.clone(),
        }
    }
}

impl<'a> WithSchema for KeyDataSourceState<'a> {
    fn schema() -> Schema {
        let mut attributes = common_attributes();
        attributes.extend(key_filter_attributes());
        attributes.extend::<std::collections::HashMap<String, tf_provider::schema::Attribute>>(map! {
            "key_algorithm" => computed(AttributeType::String, "Algorithm of the key"),
            "key_usage" => computed(AttributeType::String, "Usage of the key"),
            "origin" => computed(AttributeType::String, "Origin of the key material"),
            "domain_id" => computed(AttributeType::String, "Account of the key"),
            "default_key_flag" => computed(AttributeType::String, "`1` for a default key"),
            "creation_date" => computed(AttributeType::String, "Creation time, in milliseconds"),
            "scheduled_deletion_date" => computed(
                AttributeType::String,
                "Scheduled deletion time, in milliseconds",
            ),
            "expiration_time" => computed(
                AttributeType::String,
                "Expiration time of imported key material",
            ),
            "keystore_id" => computed(AttributeType::String, "Keystore of the key"),
            "tags" => computed(string_map(), "Tags of the key"),
            "rotation_enabled" => computed(AttributeType::Bool, "Whether the key is rotated"),
            "rotation_interval" => computed(AttributeType::Number, "Days between two rotations"),
            "rotation_number" => computed(AttributeType::Number, "Number of rotations"),
        });
        Schema {
            version: 1,
            block: Block {
                attributes,
                description: Description::plain("Single KMS key matching the filters"),
                ..Default::default()
            },
        }
    }
}

#[async_trait]
impl<'a> WithValidate for KeyDataSourceState<'a> {
    async fn validate(&self, diags: &mut Diagnostics, attr_path: AttributePath) {
        validate_key_filter(&self.filter(), diags, attr_path);
    }
}

pub fn key_item_type() -> AttributeType {
    AttributeType::Object(map! {
        "key_id" => AttributeType::String,
        "key_alias" => AttributeType::String,
        "key_description" => AttributeType::String,
        "key_algorithm" => AttributeType::String,
        "key_usage" => AttributeType::String,
        "key_state" => AttributeType::String,
        "origin" => AttributeType::String,
        "domain_id" => AttributeType::String,
        "default_key_flag" => AttributeType::String,
        "creation_date" => AttributeType::String,
        "scheduled_deletion_date" => AttributeType::String,
        "expiration_time" => AttributeType::String,
        "enterprise_project_id" => AttributeType::String,
        "keystore_id" => AttributeType::String,
        "tags" => string_map(),
    })
}

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeysDataSourceState<'a> {
    pub id: ValueString<'a>,
    pub region: ValueString<'a>,
    pub key_alias: ValueString<'a>,
    pub key_id: ValueString<'a>,
    pub key_description: ValueString<'a>,
    pub key_state: ValueString<'a>,
    pub enterprise_project_id: ValueString<'a>,
    pub keys: ValueList<Value<KeyItem<'a>>>,
}

impl<'a> KeysDataSourceState<'a> {
    pub fn filter(&self) -> KeyFilter<'a> {
        KeyFilter {
            key_alias: self.key_alias.clone(),
            key_id: self.key_id.clone(),
            key_description: self.key_description.clone(),
            key_state: self.key_state.clone(),
            enterprise_project_id: self.enterprise_project_id.clone(),
        }
    }
}

impl<'a> WithSchema for KeysDataSourceState<'a> {
    fn schema() -> Schema {
        let mut attributes = common_attributes();
        attributes.extend(key_filter_attributes());
        attributes.insert(
            "keys".to_owned(),
            computed(
                AttributeType::List(Box::new(key_item_type())),
                "Keys matching the filters",
            ),
        );
        Schema {
            version: 1,
            block: Block {
                attributes,
                description: Description::plain("KMS keys matching the filters"),
                ..Default::default()
            },
        }
    }
}

#[async_trait]
impl<'a> WithValidate for KeysDataSourceState<'a> {
    async fn validate(&self, diags: &mut Diagnostics, attr_path: AttributePath) {
        validate_key_filter(&self.filter(), diags, attr_path);
    }
}

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct GrantItem<'a> {
    pub id: ValueString<'a>,
    pub name: ValueString<'a>,
    pub grantee_principal: ValueString<'a>,
    pub grantee_principal_type: ValueString<'a>,
    pub operations: ValueList<ValueString<'a>>,
    pub creator: ValueString<'a>,
    pub retiring_principal: ValueString<'a>,
    pub creation_date: ValueString<'a>,
}

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct GrantsDataSourceState<'a> {
    pub id: ValueString<'a>,
    pub region: ValueString<'a>,
    pub key_id: ValueString<'a>,
    pub name: ValueString<'a>,
    pub grants: ValueList<Value<GrantItem<'a>>>,
}

impl<'a> WithSchema for GrantsDataSourceState<'a> {
    fn schema() -> Schema {
        let mut attributes = common_attributes();
        attributes.extend::<std::collections::HashMap<String, tf_provider::schema::Attribute>>(map! {
            "key_id" => required(AttributeType::String, "Key of the grants"),
            "name" => optional(AttributeType::String, "Name of the grants"),
            "grants" => computed(
                object_list(map! {
                    "id" => AttributeType::String,
                    "name" => AttributeType::String,
                    "grantee_principal" => AttributeType::String,
                    "grantee_principal_type" => AttributeType::String,
                    "operations" => string_list(),
                    "creator" => AttributeType::String,
                    "retiring_principal" => AttributeType::String,
                    "creation_date" => AttributeType::String,
                }),
                "Grants of the key",
            ),
        });
        Schema {
            version: 1,
            block: Block {
                attributes,
                description: Description::plain("Grants of a KMS key"),
                ..Default::default()
            },
        }
    }
}

#[async_trait]
impl<'a> WithValidate for GrantsDataSourceState<'a> {
    async fn validate(&self, _diags: &mut Diagnostics, _attr_path: AttributePath) {}
}

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataKeyState<'a> {
    pub id: ValueString<'a>,
    pub region: ValueString<'a>,
    pub key_id: ValueString<'a>,
    pub datakey_length: ValueNumber,
    pub encryption_context: ValueMap<'a, ValueString<'a>>,
    pub plain_text: ValueString<'a>,
    pub cipher_text: ValueString<'a>,
}

impl<'a> WithSchema for DataKeyState<'a> {
    fn schema() -> Schema {
        let mut attributes = common_attributes();
        attributes.extend::<std::collections::HashMap<String, tf_provider::schema::Attribute>>(map! {
            "key_id" => required(AttributeType::String, "Key encrypting the data key"),
            "datakey_length" => required(
                AttributeType::Number,
                "Length of the data key in bits, a multiple of 8 up to 8192",
            ),
            "encryption_context" => optional(string_map(), "Additional authenticated data"),
            "plain_text" => sensitive(computed(AttributeType::String, "Data key, hex encoded")),
            "cipher_text" => computed(AttributeType::String, "Encrypted data key, hex encoded"),
        });
        Schema {
            version: 1,
            block: Block {
                attributes,
                description: Description::plain("Data key generated by KMS"),
                ..Default::default()
            },
        }
    }
}

#[async_trait]
impl<'a> WithValidate for DataKeyState<'a> {
    async fn validate(&self, diags: &mut Diagnostics, attr_path: AttributePath) {
        if let Value::Value(length) = self.datakey_length {
            if length <= 0 || length > 8192 || length % 8 != 0 {
                diags.error(
                    format!("Invalid data key length `{length}`"),
                    "The length should be a multiple of 8, between 8 and 8192.",
                    attr_path.attribute("datakey_length"),
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::kms::api::KeyInfo;
    use crate::utils::string;

    use super::*;

    #[test]
    fn planned_key_is_unknown() {
        let mut state = KeyState {
            key_alias: string("app"),
            ..Default::default()
        };
        state.normalize(&mut Diagnostics::default());
        assert!(state.id.is_unknown());
        assert!(state.is_enabled.is_unknown());
        assert!(state.key_description.is_null());
        assert!(state.tags.is_null());

        state.settle();
        assert!(state.id.is_null());
        assert_eq!(state.key_alias, string("app"));
    }

    #[tokio::test]
    async fn key_validation() {
        let state = KeyState {
            key_alias: string("app"),
            key_algorithm: string("DES"),
            pending_days: Value::Value(3),
            rotation_interval: Value::Value(30),
            ..Default::default()
        };
        let mut diags = Diagnostics::default();
        state.validate(&mut diags, AttributePath::default()).await;
        assert_eq!(diags.errors.len(), 2);
    }

    #[tokio::test]
    async fn alias_prefix() {
        let mut diags = Diagnostics::default();
        AliasState {
            alias: string("my-key"),
            ..Default::default()
        }
        .validate(&mut diags, AttributePath::default()).await;
        AliasState {
            alias: string("alias/my-key"),
            ..Default::default()
        }
        .validate(&mut diags, AttributePath::default()).await;
        assert_eq!(diags.errors.len(), 1);
    }

    #[tokio::test]
    async fn grant_operations() {
        let mut diags = Diagnostics::default();
        GrantState {
            operations: Value::Value(vec![string("describe-key"), string("delete-key")]),
            grantee_principal_type: string("role"),
            ..Default::default()
        }
        .validate(&mut diags, AttributePath::default()).await;
        assert_eq!(diags.errors.len(), 2);
    }

    #[test]
    fn key_filter() {
        let key = KeyInfo {
            key_id: "k1".to_owned(),
            key_alias: Some("app".to_owned()),
            key_state: Some("2".to_owned()),
            ..Default::default()
        };
        let mut filter = KeyFilter {
            key_alias: string("app"),
            ..Default::default()
        };
        assert!(filter.matches(&key));
        filter.key_state = string("3");
        assert!(!filter.matches(&key));
        filter.key_state = Value::Unknown;
        filter.key_description = string("described");
        assert!(!filter.matches(&key));
    }

    #[tokio::test]
    async fn data_key_length() {
        let mut diags = Diagnostics::default();
        for length in [512, 12, 0, 8200] {
            DataKeyState {
                datakey_length: Value::Value(length),
                ..Default::default()
            }
            .validate(&mut diags, AttributePath::default()).await;
        }
        assert_eq!(diags.errors.len(), 3);
    }
}
