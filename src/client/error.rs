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

use reqwest::Method;
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("invalid client configuration: {0}")]
    Config(String),
    #[error("unable to encode the body of {method} {url}: {source}")]
    Encode {
        method: Method,
        url: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("{method} {url} failed: {source}")]
    Transport {
        method: Method,
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("{method} {url} returned {status}: [{code}] {message}")]
    Response {
        method: Method,
        url: String,
        status: u16,
        code: String,
        message: String,
    },
    #[error("unable to decode the response of {method} {url}: {source}")]
    Decode {
        method: Method,
        url: String,
        #[source]
        source: serde_json::Error,
    },
}

impl ApiError {
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Response { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn code(&self) -> Option<&str> {
        match self {
            ApiError::Response { code, .. } => Some(code.as_str()),
            _ => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.status() == Some(404)
    }

    /// Not found, or one of the service specific codes meaning the object is gone
    pub fn is_gone(&self, codes: &[&str]) -> bool {
        self.is_not_found() || self.code().is_some_and(|code| codes.contains(&code))
    }
}

/// Extract `(error_code, error_msg)` from an error response body.
///
/// The services answer either `{"error_code": .., "error_msg": ..}` or
/// `{"error": {"error_code"|"code": .., "error_msg"|"message": ..}}`.
pub(crate) fn parse_error_body(body: &[u8]) -> (String, String) {
    let Ok(json) = serde_json::from_slice::<Value>(body) else {
        return (
            String::new(),
            String::from_utf8_lossy(body).trim().to_owned(),
        );
    };
    let root = json.get("error").filter(|e| e.is_object()).unwrap_or(&json);
    let field = |names: &[&str]| {
        names
            .iter()
            .find_map(|name| root.get(*name).and_then(Value::as_str))
            .unwrap_or_default()
            .to_owned()
    };
    (
        field(&["error_code", "code"]),
        field(&["error_msg", "message"]),
    )
}
