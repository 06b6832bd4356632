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
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde::{Deserialize, Serialize};

use tf_provider::schema::AttributeType;
use tf_provider::value::{Value, ValueBool, ValueList, ValueMap, ValueString};
use tf_provider::schema::{Block, Description, Schema};
use tf_provider::{map, AttributePath, Diagnostics};

use crate::utils::{
    check_one_of, common_attributes, computed, null_if_unknown, object_list, optional,
    optional_computed, parse_timestamp, required, sensitive, string_list, string_map,
    timeouts_block, unknown_if_null, validate_timeouts, TimeoutsBlock, WithNormalize, WithSchema,
    WithValidate,
};

pub const SECRET_TYPES: &[&str] = &["COMMON", "RDS", "RDS-FG", "GaussDB-FG", "TaurusDB-FG"];
pub const SECRET_STATUSES: &[&str] = &["ENABLED", "DISABLED", "PENDING_DELETE", "FROZEN"];
pub const EVENT_TYPES: &[&str] = &[
    "SECRET_VERSION_CREATED",
    "SECRET_VERSION_EXPIRED",
    "SECRET_ROTATED",
    "SECRET_DELETED",
];
pub const EVENT_STATUSES: &[&str] = &["ENABLED", "DISABLED"];
pub const DEFAULT_TARGET_TYPE: &str = "SMN";

fn check_name(diags: &mut Diagnostics, value: &ValueString<'_>, attr_path: AttributePath) {
    if let Value::Value(name) = value {
        let valid = !name.is_empty()
            && name.len() <= 64
            && name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'));
        if !valid {
            diags.error(
                format!("Invalid name `{name}`"),
                "A name has from 1 to 64 letters, digits, `_`, `-` or `.`.",
                attr_path,
            );
        }
    }
}

/// `6h` to `24h`, or `1d` to `1000d`
fn check_rotation_period(diags: &mut Diagnostics, value: &ValueString<'_>, attr_path: AttributePath) {
    let Value::Value(period) = value else {
        return;
    };
    let (amount, unit) = period.split_at(period.len().saturating_sub(1));
    let valid = match (amount.parse::<u32>(), unit) {
        (Ok(hours), "h") => (6..=24).contains(&hours),
        (Ok(days), "d") => (1..=1000).contains(&days),
        _ => false,
    };
    if !valid {
        diags.error(
            format!("Invalid rotation period `{period}`"),
            "Expected a number of hours from `6h` to `24h`, or of days from `1d` to `1000d`.",
            attr_path,
        );
    }
}

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct SecretState<'a> {
    pub id: ValueString<'a>,
    pub region: ValueString<'a>,
    pub name: ValueString<'a>,
    pub secret_text: ValueString<'a>,
    pub secret_binary: ValueString<'a>,
    pub kms_key_id: ValueString<'a>,
    pub description: ValueString<'a>,
    pub secret_type: ValueString<'a>,
    pub auto_rotation: ValueBool,
    pub rotation_period: ValueString<'a>,
    pub event_subscriptions: ValueList<ValueString<'a>>,
    pub enterprise_project_id: ValueString<'a>,
    pub expire_time: ValueString<'a>,
    pub tags: ValueMap<'a, ValueString<'a>>,
    pub secret_id: ValueString<'a>,
    pub status: ValueString<'a>,
    pub latest_version: ValueString<'a>,
    pub version_stages: ValueList<ValueString<'a>>,
    pub create_time: ValueString<'a>,
    pub rotation_time: ValueString<'a>,
    pub next_rotation_time: ValueString<'a>,
}

impl<'a> WithSchema for SecretState<'a> {
    fn schema() -> Schema {
        let mut attributes = common_attributes();
        attributes.extend::<std::collections::HashMap<String, tf_provider::schema::Attribute>>(map! {
            "name" => required(
                AttributeType::String,
                "Name of the secret, changing it creates a new secret",
            ),
            "secret_text" => sensitive(optional(
                AttributeType::String,
                "Text value of the secret, conflicts with `secret_binary`",
            )),
            "secret_binary" => sensitive(optional(
                AttributeType::String,
                "Base64 encoded binary value of the secret, conflicts with `secret_text`",
            )),
            "kms_key_id" => optional_computed(
                AttributeType::String,
                "KMS key encrypting the secret, defaults to the `csms/default` key",
            ),
            "description" => optional(AttributeType::String, "Description of the secret"),
            "secret_type" => optional_computed(
                AttributeType::String,
                "Type of the secret, defaults to `COMMON`, changing it creates a new secret",
            ),
            "auto_rotation" => optional_computed(
                AttributeType::Bool,
                "Whether the secret is rotated automatically",
            ),
            "rotation_period" => optional(
                AttributeType::String,
                "Automatic rotation period, like `6h` or `30d`",
            ),
            "event_subscriptions" => optional(string_list(), "Events notified for the secret"),
            "enterprise_project_id" => optional_computed(
                AttributeType::String,
                "Enterprise project of the secret, changing it creates a new secret",
            ),
            "expire_time" => optional_computed(
                AttributeType::String,
                "Expiration of the latest version, an RFC 3339 date, kept when unset",
            ),
            "tags" => optional(string_map(), "Tags of the secret"),
            "secret_id" => computed(AttributeType::String, "Id of the secret"),
            "status" => computed(AttributeType::String, "Status of the secret"),
            "latest_version" => computed(AttributeType::String, "Id of the latest version"),
            "version_stages" => computed(string_list(), "Stages of the latest version"),
            "create_time" => computed(AttributeType::String, "Creation time"),
            "rotation_time" => computed(AttributeType::String, "Last rotation time"),
            "next_rotation_time" => computed(AttributeType::String, "Next rotation time"),
        });
        Schema {
            version: 1,
            block: Block {
                attributes,
                description: Description::plain("CSMS secret"),
                ..Default::default()
            },
        }
    }
}

#[async_trait]
impl<'a> WithValidate for SecretState<'a> {
    async fn validate(&self, diags: &mut Diagnostics, attr_path: AttributePath) {
        check_name(diags, &self.name, attr_path.clone().attribute("name"));
        check_one_of(
            diags,
            &self.secret_type,
            SECRET_TYPES,
            attr_path.clone().attribute("secret_type"),
        );
        check_rotation_period(
            diags,
            &self.rotation_period,
            attr_path.clone().attribute("rotation_period"),
        );

        match (&self.secret_text, &self.secret_binary) {
            (Value::Null, Value::Null) => diags.root_error(
                "Missing secret value",
                "One of `secret_text` or `secret_binary` is required.",
            ),
            (Value::Null, _) | (_, Value::Null) => (),
            _ => diags.error_short(
                "`secret_text` and `secret_binary` conflict",
                attr_path.clone().attribute("secret_binary"),
            ),
        }
        if let Value::Value(binary) = &self.secret_binary {
            if let Err(err) = BASE64.decode(binary.as_bytes()) {
                diags.error(
                    "`secret_binary` is not base64",
                    err.to_string(),
                    attr_path.clone().attribute("secret_binary"),
                );
            }
        }
        if let Value::Value(expire_time) = &self.expire_time {
            if let Err(err) = parse_timestamp(expire_time) {
                diags.error(
                    "Invalid `expire_time`",
                    err.to_string(),
                    attr_path.clone().attribute("expire_time"),
                );
            }
        }
        if let Value::Value(events) = &self.event_subscriptions {
            if events.len() > 1 {
                diags.error_short(
                    "A secret is subscribed to one event at most",
                    attr_path.attribute("event_subscriptions"),
                );
            }
        }
    }
}

impl<'a> WithNormalize for SecretState<'a> {
    fn normalize(&mut self, _diags: &mut Diagnostics) {
        for value in [
            &mut self.id,
            &mut self.region,
            &mut self.kms_key_id,
            &mut self.secret_type,
            &mut self.enterprise_project_id,
            &mut self.secret_id,
            &mut self.status,
            &mut self.latest_version,
            &mut self.create_time,
            &mut self.rotation_time,
            &mut self.next_rotation_time,
        ] {
            unknown_if_null(value);
        }
        unknown_if_null(&mut self.auto_rotation);
        unknown_if_null(&mut self.version_stages);
    }

    fn settle(&mut self) {
        for value in [
            &mut self.id,
            &mut self.region,
            &mut self.kms_key_id,
            &mut self.description,
            &mut self.secret_type,
            &mut self.enterprise_project_id,
            &mut self.expire_time,
            &mut self.secret_id,
            &mut self.status,
            &mut self.latest_version,
            &mut self.create_time,
            &mut self.rotation_time,
            &mut self.next_rotation_time,
        ] {
            null_if_unknown(value);
        }
        null_if_unknown(&mut self.auto_rotation);
        null_if_unknown(&mut self.version_stages);
        null_if_unknown(&mut self.event_subscriptions);
        null_if_unknown(&mut self.tags);
    }
}

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventState<'a> {
    pub id: ValueString<'a>,
    pub region: ValueString<'a>,
    pub name: ValueString<'a>,
    pub event_types: ValueList<ValueString<'a>>,
    pub status: ValueString<'a>,
    pub target_type: ValueString<'a>,
    pub target_id: ValueString<'a>,
    pub target_name: ValueString<'a>,
    pub event_id: ValueString<'a>,
    pub created_at: ValueString<'a>,
    pub updated_at: ValueString<'a>,
}

impl<'a> WithSchema for EventState<'a> {
    fn schema() -> Schema {
        let mut attributes = common_attributes();
        attributes.extend::<std::collections::HashMap<String, tf_provider::schema::Attribute>>(map! {
            "name" => required(
                AttributeType::String,
                "Name of the event, changing it creates a new event",
            ),
            "event_types" => required(string_list(), "Notified secret events"),
            "status" => required(AttributeType::String, "`ENABLED` or `DISABLED`"),
            "target_type" => optional_computed(
                AttributeType::String,
                "Type of the notification target, only `SMN`",
            ),
            "target_id" => required(AttributeType::String, "URN of the SMN topic"),
            "target_name" => required(AttributeType::String, "Name of the SMN topic"),
            "event_id" => computed(AttributeType::String, "Id of the event"),
            "created_at" => computed(AttributeType::String, "Creation time"),
            "updated_at" => computed(AttributeType::String, "Last update time"),
        });
        Schema {
            version: 1,
            block: Block {
                attributes,
                description: Description::plain("CSMS event notifying secret changes"),
                ..Default::default()
            },
        }
    }
}

#[async_trait]
impl<'a> WithValidate for EventState<'a> {
    async fn validate(&self, diags: &mut Diagnostics, attr_path: AttributePath) {
        check_name(diags, &self.name, attr_path.clone().attribute("name"));
        check_one_of(
            diags,
            &self.status,
            EVENT_STATUSES,
            attr_path.clone().attribute("status"),
        );
        check_one_of(
            diags,
            &self.target_type,
            &[DEFAULT_TARGET_TYPE],
            attr_path.clone().attribute("target_type"),
        );
        if let Value::Value(event_types) = &self.event_types {
            if event_types.is_empty() {
                diags.error_short(
                    "At least one event type is required",
                    attr_path.clone().attribute("event_types"),
                );
            }
            for (i, event_type) in event_types.iter().enumerate() {
                check_one_of(
                    diags,
                    event_type,
                    EVENT_TYPES,
                    attr_path.clone().attribute("event_types").index(i as i64),
                );
            }
        }
    }
}

impl<'a> WithNormalize for EventState<'a> {
    fn normalize(&mut self, _diags: &mut Diagnostics) {
        for value in [
            &mut self.id,
            &mut self.region,
            &mut self.target_type,
            &mut self.event_id,
            &mut self.created_at,
            &mut self.updated_at,
        ] {
            unknown_if_null(value);
        }
    }

    fn settle(&mut self) {
        for value in [
            &mut self.id,
            &mut self.region,
            &mut self.target_type,
            &mut self.event_id,
            &mut self.created_at,
            &mut self.updated_at,
        ] {
            null_if_unknown(value);
        }
    }
}

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct RotateState<'a> {
    pub id: ValueString<'a>,
    pub region: ValueString<'a>,
    pub secret_name: ValueString<'a>,
    pub version_id: ValueString<'a>,
    pub timeouts: TimeoutsBlock<'a>,
}

impl<'a> WithSchema for RotateState<'a> {
    fn schema() -> Schema {
        let mut attributes = common_attributes();
        attributes.extend::<std::collections::HashMap<String, tf_provider::schema::Attribute>>(map! {
            "secret_name" => required(
                AttributeType::String,
                "Secret to rotate, changing it rotates the new secret",
            ),
            "version_id" => computed(AttributeType::String, "Version created by the rotation"),
        });
        Schema {
            version: 1,
            block: Block {
                attributes,
                blocks: map! {
                    "timeouts" => timeouts_block(),
                },
                description: Description::plain(
                    "Rotation of a CSMS secret, applied once at creation",
                ),
                ..Default::default()
            },
        }
    }
}

#[async_trait]
impl<'a> WithValidate for RotateState<'a> {
    async fn validate(&self, diags: &mut Diagnostics, attr_path: AttributePath) {
        validate_timeouts(diags, &self.timeouts, attr_path.attribute("timeouts"));
    }
}

impl<'a> WithNormalize for RotateState<'a> {
    fn normalize(&mut self, _diags: &mut Diagnostics) {
        unknown_if_null(&mut self.id);
        unknown_if_null(&mut self.region);
        unknown_if_null(&mut self.version_id);
    }

    fn settle(&mut self) {
        null_if_unknown(&mut self.id);
        null_if_unknown(&mut self.region);
        null_if_unknown(&mut self.version_id);
    }
}

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct SecretItem<'a> {
    pub id: ValueString<'a>,
    pub name: ValueString<'a>,
    pub status: ValueString<'a>,
    pub kms_key_id: ValueString<'a>,
    pub description: ValueString<'a>,
    pub secret_type: ValueString<'a>,
    pub auto_rotation: ValueBool,
    pub rotation_period: ValueString<'a>,
    pub rotation_time: ValueString<'a>,
    pub next_rotation_time: ValueString<'a>,
    pub event_subscriptions: ValueList<ValueString<'a>>,
    pub enterprise_project_id: ValueString<'a>,
    pub created_at: ValueString<'a>,
    pub updated_at: ValueString<'a>,
    pub scheduled_deleted_at: ValueString<'a>,
}

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct SecretsDataSourceState<'a> {
    pub id: ValueString<'a>,
    pub region: ValueString<'a>,
    pub name: ValueString<'a>,
    pub secret_id: ValueString<'a>,
    pub status: ValueString<'a>,
    pub event_name: ValueString<'a>,
    pub enterprise_project_id: ValueString<'a>,
    pub secrets: ValueList<Value<SecretItem<'a>>>,
}

impl<'a> WithSchema for SecretsDataSourceState<'a> {
    fn schema() -> Schema {
        let mut attributes = common_attributes();
        attributes.extend::<std::collections::HashMap<String, tf_provider::schema::Attribute>>(map! {
            "name" => optional(AttributeType::String, "Name of the secret"),
            "secret_id" => optional(AttributeType::String, "Id of the secret"),
            "status" => optional(AttributeType::String, "Status of the secrets"),
            "event_name" => optional(AttributeType::String, "Event the secrets are subscribed to"),
            "enterprise_project_id" => optional(
                AttributeType::String,
                "Enterprise project of the secrets",
            ),
            "secrets" => computed(
                object_list(map! {
                    "id" => AttributeType::String,
                    "name" => AttributeType::String,
                    "status" => AttributeType::String,
                    "kms_key_id" => AttributeType::String,
                    "description" => AttributeType::String,
                    "secret_type" => AttributeType::String,
                    "auto_rotation" => AttributeType::Bool,
                    "rotation_period" => AttributeType::String,
                    "rotation_time" => AttributeType::String,
                    "next_rotation_time" => AttributeType::String,
                    "event_subscriptions" => string_list(),
                    "enterprise_project_id" => AttributeType::String,
                    "created_at" => AttributeType::String,
                    "updated_at" => AttributeType::String,
                    "scheduled_deleted_at" => AttributeType::String,
                }),
                "Secrets matching the filters",
            ),
        });
        Schema {
            version: 1,
            block: Block {
                attributes,
                description: Description::plain("CSMS secrets matching the filters"),
                ..Default::default()
            },
        }
    }
}

#[async_trait]
impl<'a> WithValidate for SecretsDataSourceState<'a> {
    async fn validate(&self, diags: &mut Diagnostics, attr_path: AttributePath) {
        check_one_of(
            diags,
            &self.status,
            SECRET_STATUSES,
            attr_path.attribute("status"),
        );
    }
}

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct SecretVersionState<'a> {
    pub id: ValueString<'a>,
    pub region: ValueString<'a>,
    pub secret_name: ValueString<'a>,
    pub version: ValueString<'a>,
    pub secret_text: ValueString<'a>,
    pub secret_binary: ValueString<'a>,
    pub version_stages: ValueList<ValueString<'a>>,
    pub kms_key_id: ValueString<'a>,
    pub created_at: ValueString<'a>,
    pub expire_time: ValueString<'a>,
}

impl<'a> WithSchema for SecretVersionState<'a> {
    fn schema() -> Schema {
        let mut attributes = common_attributes();
        attributes.extend::<std::collections::HashMap<String, tf_provider::schema::Attribute>>(map! {
            "secret_name" => required(AttributeType::String, "Name of the secret"),
            "version" => optional_computed(
                AttributeType::String,
                "Id of the version, defaults to the latest one",
            ),
            "secret_text" => sensitive(computed(AttributeType::String, "Text value")),
            "secret_binary" => sensitive(computed(
                AttributeType::String,
                "Binary value, base64 encoded",
            )),
            "version_stages" => computed(string_list(), "Stages of the version"),
            "kms_key_id" => computed(AttributeType::String, "KMS key encrypting the version"),
            "created_at" => computed(AttributeType::String, "Creation time"),
            "expire_time" => computed(AttributeType::String, "Expiration time"),
        });
        Schema {
            version: 1,
            block: Block {
                attributes,
                description: Description::plain("Version of a CSMS secret"),
                ..Default::default()
            },
        }
    }
}

#[async_trait]
impl<'a> WithValidate for SecretVersionState<'a> {
    async fn validate(&self, diags: &mut Diagnostics, attr_path: AttributePath) {
        check_name(diags, &self.secret_name, attr_path.attribute("secret_name"));
    }
}

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventItem<'a> {
    pub id: ValueString<'a>,
    pub name: ValueString<'a>,
    pub event_types: ValueList<ValueString<'a>>,
    pub status: ValueString<'a>,
    pub target_type: ValueString<'a>,
    pub target_id: ValueString<'a>,
    pub target_name: ValueString<'a>,
    pub created_at: ValueString<'a>,
    pub updated_at: ValueString<'a>,
}

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventsDataSourceState<'a> {
    pub id: ValueString<'a>,
    pub region: ValueString<'a>,
    pub name: ValueString<'a>,
    pub status: ValueString<'a>,
    pub events: ValueList<Value<EventItem<'a>>>,
}

impl<'a> WithSchema for EventsDataSourceState<'a> {
    fn schema() -> Schema {
        let mut attributes = common_attributes();
        attributes.extend::<std::collections::HashMap<String, tf_provider::schema::Attribute>>(map! {
            "name" => optional(AttributeType::String, "Name of the event"),
            "status" => optional(AttributeType::String, "`ENABLED` or `DISABLED`"),
            "events" => computed(
                object_list(map! {
                    "id" => AttributeType::String,
                    "name" => AttributeType::String,
                    "event_types" => string_list(),
                    "status" => AttributeType::String,
                    "target_type" => AttributeType::String,
                    "target_id" => AttributeType::String,
                    "target_name" => AttributeType::String,
                    "created_at" => AttributeType::String,
                    "updated_at" => AttributeType::String,
                }),
                "Events matching the filters",
            ),
        });
        Schema {
            version: 1,
            block: Block {
                attributes,
                description: Description::plain("CSMS events matching the filters"),
                ..Default::default()
            },
        }
    }
}

#[async_trait]
impl<'a> WithValidate for EventsDataSourceState<'a> {
    async fn validate(&self, diags: &mut Diagnostics, attr_path: AttributePath) {
        check_one_of(
            diags,
            &self.status,
            EVENT_STATUSES,
            attr_path.attribute("status"),
        );
    }
}
