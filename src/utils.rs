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

use std::borrow::Cow;
use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use crypto::digest::Digest;
use crypto::sha2::Sha256;
use serde::{Deserialize, Serialize};
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

use tf_provider::schema::{Attribute, AttributeConstraint, AttributeType, NestedBlock};
use tf_provider::value::{Value, ValueBool, ValueList, ValueMap, ValueNumber, ValueString};
use tf_provider::schema::{Block, Description, Schema};
use tf_provider::{map, AttributePath, Diagnostics};

pub(crate) trait WithSchema {
    fn schema() -> Schema;
}

#[async_trait]
pub(crate) trait WithValidate {
    async fn validate(&self, diags: &mut Diagnostics, attr_path: AttributePath);
}

pub(crate) trait WithNormalize {
    /// Mark the computed attributes without a value as unknown
    fn normalize(&mut self, diags: &mut Diagnostics);
    /// Replace the attributes still unknown after an apply by null
    fn settle(&mut self);
}

/// State to return from a create that failed once the remote object existed.
///
/// Terraform keeps such an object as tainted; `None` would leave it orphaned.
pub(crate) fn keep_created<S: WithNormalize, P>(
    id: &ValueString,
    mut state: S,
    private_state: P,
) -> Option<(S, P)> {
    if id.is_null() || id.is_unknown() {
        return None;
    }
    state.settle();
    Some((state, private_state))
}

/// Data source holding the configured client
macro_rules! data_source_struct {
    ($name:ident) => {
        #[derive(Debug, Default, Clone)]
        pub struct $name {
            client: $crate::client::ClientHandle,
        }

        impl $name {
            pub fn new(client: $crate::client::ClientHandle) -> Self {
                Self { client }
            }
        }
    };
}
pub(crate) use data_source_struct;

pub(crate) fn attribute(
    attr_type: AttributeType,
    constraint: AttributeConstraint,
    description: &str,
) -> Attribute {
    Attribute {
        attr_type,
        description: Description::plain(description),
        constraint,
        sensitive: false,
        deprecated: false,
    }
}

pub(crate) fn required(attr_type: AttributeType, description: &str) -> Attribute {
    attribute(attr_type, AttributeConstraint::Required, description)
}

pub(crate) fn optional(attr_type: AttributeType, description: &str) -> Attribute {
    attribute(attr_type, AttributeConstraint::Optional, description)
}

pub(crate) fn computed(attr_type: AttributeType, description: &str) -> Attribute {
    attribute(attr_type, AttributeConstraint::Computed, description)
}

pub(crate) fn optional_computed(attr_type: AttributeType, description: &str) -> Attribute {
    attribute(attr_type, AttributeConstraint::OptionalComputed, description)
}

pub(crate) fn sensitive(mut attribute: Attribute) -> Attribute {
    attribute.sensitive = true;
    attribute
}

pub(crate) fn string_list() -> AttributeType {
    AttributeType::List(Box::new(AttributeType::String))
}

pub(crate) fn string_map() -> AttributeType {
    AttributeType::Map(Box::new(AttributeType::String))
}

pub(crate) fn object_list(fields: HashMap<String, AttributeType>) -> AttributeType {
    AttributeType::List(Box::new(AttributeType::Object(fields)))
}

/// `id` and `region`, shared by every resource
pub(crate) fn common_attributes() -> HashMap<String, Attribute> {
    map! {
        "id" => computed(AttributeType::String, "Unique identifier of the resource"),
        "region" => optional_computed(
            AttributeType::String,
            "Region of the resource, defaults to the provider region",
        ),
    }
}

/// Go-like durations: `30s`, `10m`, `1h30m`
pub(crate) fn parse_duration(text: &str) -> Result<Duration> {
    let text = text.trim();
    if text.is_empty() {
        return Err(anyhow!("empty duration"));
    }

    let mut total = Duration::ZERO;
    let mut digits = String::new();
    let mut chars = text.chars().peekable();
    while let Some(c) = chars.next() {
        if c.is_ascii_digit() {
            digits.push(c);
            continue;
        }
        let amount: u64 = digits
            .parse()
            .map_err(|_| anyhow!("invalid duration `{text}`: missing amount before `{c}`"))?;
        digits.clear();
        let unit = match (c, chars.peek()) {
            ('m', Some('s')) => {
                chars.next();
                Duration::from_millis(1)
            }
            ('h', _) => Duration::from_secs(3600),
            ('m', _) => Duration::from_secs(60),
            ('s', _) => Duration::from_secs(1),
            _ => return Err(anyhow!("invalid duration `{text}`: unknown unit `{c}`")),
        };
        total = u32::try_from(amount)
            .ok()
            .and_then(|amount| unit.checked_mul(amount))
            .and_then(|step| total.checked_add(step))
            .ok_or_else(|| anyhow!("invalid duration `{text}`: too long"))?;
    }
    if !digits.is_empty() {
        return Err(anyhow!("invalid duration `{text}`: missing unit"));
    }
    Ok(total)
}

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct Timeouts<'a> {
    pub create: ValueString<'a>,
    pub update: ValueString<'a>,
    pub delete: ValueString<'a>,
}

pub(crate) type TimeoutsBlock<'a> = ValueList<Value<Timeouts<'a>>>;

pub(crate) fn timeouts_block() -> NestedBlock {
    NestedBlock::List(Block {
        attributes: map! {
            "create" => optional(AttributeType::String, "Timeout of the creation, like `10m`"),
            "update" => optional(AttributeType::String, "Timeout of the update, like `10m`"),
            "delete" => optional(AttributeType::String, "Timeout of the deletion, like `10m`"),
        },
        description: Description::plain("Operation timeouts"),
        ..Default::default()
    })
}

pub(crate) enum TimeoutKind {
    Create,
    Update,
    Delete,
}

pub(crate) fn timeout(block: &TimeoutsBlock, kind: TimeoutKind, default: Duration) -> Duration {
    let Value::Value(timeouts) = block else {
        return default;
    };
    let Some(Value::Value(timeouts)) = timeouts.first() else {
        return default;
    };
    let value = match kind {
        TimeoutKind::Create => &timeouts.create,
        TimeoutKind::Update => &timeouts.update,
        TimeoutKind::Delete => &timeouts.delete,
    };
    non_empty(value)
        .and_then(|text| parse_duration(text).ok())
        .unwrap_or(default)
}

pub(crate) fn validate_timeouts(
    diags: &mut Diagnostics,
    block: &TimeoutsBlock,
    attr_path: AttributePath,
) {
    let Value::Value(timeouts) = block else {
        return;
    };
    for (i, timeouts) in timeouts.iter().enumerate() {
        let Value::Value(timeouts) = timeouts else {
            continue;
        };
        for (name, value) in [
            ("create", &timeouts.create),
            ("update", &timeouts.update),
            ("delete", &timeouts.delete),
        ] {
            if let Some(text) = non_empty(value) {
                if let Err(err) = parse_duration(text) {
                    diags.error(
                        "Invalid timeout",
                        err.to_string(),
                        attr_path.clone().index(i as i64).attribute(name),
                    );
                }
            }
        }
    }
}

/// Non-empty string value, `None` for null, unknown or empty strings
pub(crate) fn non_empty<'a>(value: &'a ValueString<'_>) -> Option<&'a str> {
    match value {
        Value::Value(s) if !s.is_empty() => Some(s.as_ref()),
        _ => None,
    }
}

pub(crate) fn owned(value: &ValueString<'_>) -> Option<String> {
    non_empty(value).map(str::to_owned)
}

pub(crate) fn string<'a>(value: impl Into<String>) -> ValueString<'a> {
    Value::Value(Cow::Owned(value.into()))
}

/// Null for `None` and empty strings
pub(crate) fn opt_string<'a>(value: Option<impl Into<String>>) -> ValueString<'a> {
    match value.map(Into::into) {
        Some(s) if !s.is_empty() => Value::Value(Cow::Owned(s)),
        _ => Value::Null,
    }
}

pub(crate) fn number(value: &ValueNumber) -> Option<i64> {
    match value {
        Value::Value(n) => Some(*n),
        _ => None,
    }
}

pub(crate) fn boolean(value: &ValueBool) -> Option<bool> {
    match value {
        Value::Value(b) => Some(*b),
        _ => None,
    }
}

pub(crate) fn strings(value: &ValueList<ValueString<'_>>) -> Vec<String> {
    match value {
        Value::Value(items) => items
            .iter()
            .filter_map(|item| non_empty(item).map(str::to_owned))
            .collect(),
        _ => Vec::new(),
    }
}

pub(crate) fn string_values<'a>(items: impl IntoIterator<Item = String>) -> ValueList<ValueString<'a>> {
    Value::Value(items.into_iter().map(string).collect())
}

pub(crate) fn tags(value: &ValueMap<'_, ValueString<'_>>) -> BTreeMap<String, String> {
    match value {
        Value::Value(tags) => tags
            .iter()
            .filter_map(|(k, v)| match v {
                Value::Value(v) => Some((k.to_string(), v.to_string())),
                _ => None,
            })
            .collect(),
        _ => BTreeMap::new(),
    }
}

pub(crate) fn tag_values<'a>(tags: BTreeMap<String, String>) -> ValueMap<'a, ValueString<'a>> {
    Value::Value(
        tags.into_iter()
            .map(|(k, v)| (Cow::Owned(k), string(v)))
            .collect(),
    )
}

/// Assign a value read from the API: always while refreshing, only the
/// unknown attributes after an apply.
pub(crate) fn assign<T>(target: &mut Value<T>, value: Value<T>, refresh: bool) {
    if refresh || target.is_unknown() {
        *target = value;
    }
}

pub(crate) fn unknown_if_null<T>(value: &mut Value<T>) {
    if value.is_null() {
        *value = Value::Unknown;
    }
}

pub(crate) fn null_if_unknown<T>(value: &mut Value<T>) {
    if value.is_unknown() {
        *value = Value::Null;
    }
}

/// Record `name` as requiring a replacement when its planned value differs from the prior one
pub(crate) fn replace_if_changed<T: PartialEq>(
    paths: &mut Vec<AttributePath>,
    name: &'static str,
    prior: &Value<T>,
    planned: &Value<T>,
) {
    if prior != planned {
        paths.push(AttributePath::new(name));
    }
}

/// Stable id of a data source result, from the ids of its items
pub(crate) fn hash_id<'a>(ids: impl IntoIterator<Item = &'a str>) -> String {
    let mut hasher = Sha256::new();
    for id in ids {
        hasher.input_str(id);
        hasher.input(&[0]);
    }
    hasher.result_str()
}

/// Milliseconds since the epoch from an RFC 3339 date
pub(crate) fn parse_timestamp(text: &str) -> Result<i64> {
    let date = OffsetDateTime::parse(text, &Rfc3339)
        .map_err(|err| anyhow!("invalid RFC 3339 date `{text}`: {err}"))?;
    Ok((date.unix_timestamp_nanos() / 1_000_000) as i64)
}

/// RFC 3339 date, in UTC, from milliseconds since the epoch
pub(crate) fn format_timestamp(millis: i64) -> Option<String> {
    OffsetDateTime::from_unix_timestamp_nanos(millis as i128 * 1_000_000)
        .ok()?
        .format(&Rfc3339)
        .ok()
}

pub(crate) fn timestamp<'a>(millis: Option<i64>) -> ValueString<'a> {
    opt_string(millis.and_then(format_timestamp))
}

/// `true` when the filter is unset or equal to the value
pub(crate) fn matches_filter(filter: &ValueString, value: Option<&str>) -> bool {
    match non_empty(filter) {
        Some(filter) => value == Some(filter),
        None => true,
    }
}

pub(crate) fn check_one_of(
    diags: &mut Diagnostics,
    value: &ValueString<'_>,
    allowed: &[&str],
    attr_path: AttributePath,
) {
    if let Value::Value(value) = value {
        if !allowed.contains(&value.as_ref()) {
            diags.error(
                format!("Invalid value `{value}`"),
                format!("Expected one of: {}", allowed.iter().join_with(", ")),
                attr_path,
            );
        }
    }
}

pub(crate) fn check_range(
    diags: &mut Diagnostics,
    value: &ValueNumber,
    min: i64,
    max: i64,
    attr_path: AttributePath,
) {
    if let Value::Value(value) = value {
        if *value < min || *value > max {
            diags.error(
                format!("Invalid value `{value}`"),
                format!("Expected a value between {min} and {max}"),
                attr_path,
            );
        }
    }
}

pub struct DisplayJoiner<'a, T, I>
where
    T: Iterator<Item = I>,
    I: std::fmt::Display,
{
    iter: RefCell<T>,
    sep: &'a str,
}

pub trait DisplayJoinable {
    type Joiner<'a>;
    fn join_with(self, sep: &str) -> Self::Joiner<'_>;
}

impl<T, I> DisplayJoinable for T
where
    T: Iterator<Item = I>,
    I: std::fmt::Display,
{
    type Joiner<'a> = DisplayJoiner<'a, T, I>;

    fn join_with(self, sep: &str) -> Self::Joiner<'_> {
        DisplayJoiner {
            iter: RefCell::new(self),
            sep,
        }
    }
}

impl<'a, T, I> std::fmt::Display for DisplayJoiner<'a, T, I>
where
    T: Iterator<Item = I>,
    I: std::fmt::Display,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut sep = "";
        let mut iter = self.iter.try_borrow_mut().or(Err(std::fmt::Error))?;
        for elt in iter.by_ref() {
            f.write_str(sep)?;
            f.write_fmt(format_args!("{elt}"))?;
            sep = self.sep;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn durations() {
        assert_eq!(parse_duration("45s").unwrap(), Duration::from_secs(45));
        assert_eq!(parse_duration("10m").unwrap(), Duration::from_secs(600));
        assert_eq!(parse_duration("1h30m").unwrap(), Duration::from_secs(5400));
        assert_eq!(parse_duration("250ms").unwrap(), Duration::from_millis(250));
        assert!(parse_duration("4294967296s").is_err());
        assert!(parse_duration("4294967295h").is_err());
        assert!(parse_duration("").is_err());
        assert!(parse_duration("10").is_err());
        assert!(parse_duration("m").is_err());
        assert!(parse_duration("3d").is_err());
    }

    #[test]
    fn timeouts_fallback_to_default() {
        let default = Duration::from_secs(60);
        assert_eq!(timeout(&Value::Null, TimeoutKind::Create, default), default);

        let block: TimeoutsBlock = Value::Value(vec![Value::Value(Timeouts {
            create: string("5m"),
            update: string("nonsense"),
            delete: Value::Null,
        })]);
        assert_eq!(
            timeout(&block, TimeoutKind::Create, default),
            Duration::from_secs(300)
        );
        assert_eq!(timeout(&block, TimeoutKind::Update, default), default);
        assert_eq!(timeout(&block, TimeoutKind::Delete, default), default);
    }

    #[test]
    fn assign_only_unknown_after_apply() {
        let mut configured = string("configured");
        assign(&mut configured, string("remote"), false);
        assert_eq!(configured, string("configured"));
        assign(&mut configured, string("remote"), true);
        assert_eq!(configured, string("remote"));

        let mut unknown: ValueString = Value::Unknown;
        assign(&mut unknown, string("remote"), false);
        assert_eq!(unknown, string("remote"));
    }

    #[test]
    fn empty_strings_are_null() {
        assert_eq!(opt_string(Some("")), Value::Null);
        assert_eq!(opt_string(None::<String>), Value::Null);
        assert_eq!(opt_string(Some("a")), string("a"));
        assert_eq!(non_empty(&string("")), None);
    }

    #[test]
    fn tags_skip_null_values() {
        let value: ValueMap<ValueString> = Value::Value(
            [
                (Cow::from("owner"), string("team")),
                (Cow::from("unset"), Value::Null),
            ]
            .into_iter()
            .collect(),
        );
        let tags = tags(&value);
        assert_eq!(tags.len(), 1);
        assert_eq!(tags.get("owner").map(String::as_str), Some("team"));
    }

    #[test]
    fn replacement_paths() {
        let mut paths = Vec::new();
        replace_if_changed(&mut paths, "name", &string("a"), &string("a"));
        assert!(paths.is_empty());
        replace_if_changed(&mut paths, "name", &string("a"), &string("b"));
        replace_if_changed(&mut paths, "scope", &string("a"), &Value::Unknown);
        assert_eq!(paths.len(), 2);
    }

    #[test]
    fn hashed_ids() {
        assert_eq!(hash_id(["a", "b"]), hash_id(["a", "b"]));
        assert_ne!(hash_id(["a", "b"]), hash_id(["ab"]));
        assert_eq!(hash_id(["a"]).len(), 64);
    }

    #[test]
    fn timestamps() {
        assert_eq!(parse_timestamp("2024-01-01T00:00:00Z").unwrap(), 1704067200000);
        assert_eq!(parse_timestamp("2024-01-01T08:00:00+08:00").unwrap(), 1704067200000);
        assert!(parse_timestamp("2024-01-01").is_err());
        assert_eq!(
            format_timestamp(1704067200000).as_deref(),
            Some("2024-01-01T00:00:00Z")
        );
        assert_eq!(timestamp(None), Value::Null);
    }

    #[test]
    fn join() {
        assert_eq!(["a", "b", "c"].iter().join_with(", ").to_string(), "a, b, c");
    }
}
