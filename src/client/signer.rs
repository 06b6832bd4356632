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

//! `SDK-HMAC-SHA256` request signing with an access key / secret key pair.

use std::collections::BTreeMap;

use crypto::{digest::Digest, hmac::Hmac, mac::Mac, sha2::Sha256};
use percent_encoding::percent_decode_str;
use time::OffsetDateTime;

pub const ALGORITHM: &str = "SDK-HMAC-SHA256";
pub const HEADER_DATE: &str = "x-sdk-date";

pub struct SigningInput<'a> {
    pub method: &'a str,
    pub path: &'a str,
    pub query: &'a [(String, String)],
    /// lowercase header name to value, every header here is signed
    pub headers: &'a BTreeMap<String, String>,
    pub body: &'a [u8],
}

/// `yyyyMMddTHHmmssZ`
pub fn sdk_date(date: OffsetDateTime) -> String {
    format!(
        "{:04}{:02}{:02}T{:02}{:02}{:02}Z",
        date.year(),
        u8::from(date.month()),
        date.day(),
        date.hour(),
        date.minute(),
        date.second()
    )
}

/// RFC 3986 escaping, only the unreserved characters are kept
pub fn escape(text: &str) -> String {
    escape_bytes(text.as_bytes())
}

fn escape_bytes(bytes: &[u8]) -> String {
    let mut escaped = String::with_capacity(bytes.len());
    for &byte in bytes {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                escaped.push(byte as char)
            }
            _ => escaped.push_str(&format!("%{byte:02X}")),
        }
    }
    escaped
}

/// `path` comes percent-encoded from the URL, each segment is decoded before its escaping
pub fn canonical_uri(path: &str) -> String {
    let mut uri = path
        .split('/')
        .map(|segment| escape_bytes(&percent_decode_str(segment).collect::<Vec<u8>>()))
        .collect::<Vec<_>>()
        .join("/");
    if !uri.ends_with('/') {
        uri.push('/');
    }
    uri
}

pub fn canonical_query(query: &[(String, String)]) -> String {
    let mut pairs = query
        .iter()
        .map(|(k, v)| (escape(k), escape(v)))
        .collect::<Vec<_>>();
    pairs.sort();
    pairs
        .into_iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join("&")
}

fn signed_headers(headers: &BTreeMap<String, String>) -> String {
    headers.keys().cloned().collect::<Vec<_>>().join(";")
}

pub fn canonical_request(input: &SigningInput) -> String {
    let canonical_headers = input
        .headers
        .iter()
        .map(|(k, v)| format!("{k}:{}\n", v.trim()))
        .collect::<String>();
    format!(
        "{}\n{}\n{}\n{}\n{}\n{}",
        input.method,
        canonical_uri(input.path),
        canonical_query(input.query),
        canonical_headers,
        signed_headers(input.headers),
        sha256_hex(input.body),
    )
}

pub fn string_to_sign(canonical_request: &str, date: &str) -> String {
    format!(
        "{ALGORITHM}\n{date}\n{}",
        sha256_hex(canonical_request.as_bytes())
    )
}

/// Value of the `Authorization` header; `input.headers` must contain the `x-sdk-date` header
pub fn authorization(access_key: &str, secret_key: &str, input: &SigningInput) -> String {
    let date = input
        .headers
        .get(HEADER_DATE)
        .map(String::as_str)
        .unwrap_or_default();
    let canonical = canonical_request(input);
    let signature = hmac_sha256_hex(
        secret_key.as_bytes(),
        string_to_sign(&canonical, date).as_bytes(),
    );
    format!(
        "{ALGORITHM} Access={access_key}, SignedHeaders={}, Signature={signature}",
        signed_headers(input.headers)
    )
}

fn sha256_hex(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.input(data);
    hasher.result_str()
}

fn hmac_sha256_hex(key: &[u8], data: &[u8]) -> String {
    let mut mac = Hmac::new(Sha256::new(), key);
    mac.input(data);
    hex::encode(mac.result().code())
}

#[cfg(test)]
mod tests {
    use time::macros::datetime;

    use super::*;

    const EMPTY_SHA256: &str = "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855";

    #[test]
    fn digests() {
        assert_eq!(sha256_hex(b""), EMPTY_SHA256);
        assert_eq!(
            sha256_hex(b"abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
        assert_eq!(
            hmac_sha256_hex(b"Jefe", b"what do ya want for nothing?"),
            "5bdcc146bf60754e6a042426089575c75a003f089d2739839dec58b964ec3843"
        );
    }

    #[test]
    fn date_format() {
        assert_eq!(sdk_date(datetime!(2024-03-05 07:08:09 UTC)), "20240305T070809Z");
    }

    #[test]
    fn escaping() {
        assert_eq!(escape("abc-_.~XYZ019"), "abc-_.~XYZ019");
        assert_eq!(escape("a b/c"), "a%20b%2Fc");
        assert_eq!(escape("é"), "%C3%A9");
    }

    #[test]
    fn uri_ends_with_slash() {
        assert_eq!(canonical_uri("/v1/p/secrets"), "/v1/p/secrets/");
        assert_eq!(canonical_uri("/v1/p/secrets/"), "/v1/p/secrets/");
        assert_eq!(canonical_uri(""), "/");
    }

    #[test]
    fn encoded_path_is_escaped_once() {
        let url = url::Url::parse("https://kms.example.com/v1/p/secrets/db pass~1").unwrap();
        assert_eq!(url.path(), "/v1/p/secrets/db%20pass~1");
        assert_eq!(canonical_uri(url.path()), "/v1/p/secrets/db%20pass~1/");
        assert_eq!(canonical_uri("/v1/p/secrets/a%2Fb"), "/v1/p/secrets/a%2Fb/");
    }

    #[test]
    fn query_is_sorted() {
        let query = vec![
            ("marker".to_owned(), "a b".to_owned()),
            ("limit".to_owned(), "10".to_owned()),
        ];
        assert_eq!(canonical_query(&query), "limit=10&marker=a%20b");
        assert_eq!(canonical_query(&[]), "");
    }

    #[test]
    fn canonical_request_layout() {
        let headers = BTreeMap::from([
            ("host".to_owned(), "kms.region.example.com".to_owned()),
            (HEADER_DATE.to_owned(), "20240305T070809Z".to_owned()),
        ]);
        let query = vec![("limit".to_owned(), "10".to_owned())];
        let input = SigningInput {
            method: "GET",
            path: "/v1/project/secrets",
            query: &query,
            headers: &headers,
            body: b"",
        };
        assert_eq!(
            canonical_request(&input),
            format!(
                "GET\n/v1/project/secrets/\nlimit=10\nhost:kms.region.example.com\nx-sdk-date:20240305T070809Z\n\nhost;x-sdk-date\n{EMPTY_SHA256}"
            )
        );
    }

    #[test]
    fn authorization_is_deterministic() {
        let headers = BTreeMap::from([
            ("host".to_owned(), "kms.region.example.com".to_owned()),
            (HEADER_DATE.to_owned(), "20240305T070809Z".to_owned()),
        ]);
        let input = SigningInput {
            method: "POST",
            path: "/v1.0/project/kms/create-key",
            query: &[],
            headers: &headers,
            body: br#"{"key_alias":"a"}"#,
        };
        let first = authorization("AK", "SK", &input);
        let second = authorization("AK", "SK", &input);
        assert_eq!(first, second);
        assert!(first.starts_with("SDK-HMAC-SHA256 Access=AK, SignedHeaders=host;x-sdk-date, Signature="));
        assert_ne!(first, authorization("AK", "other", &input));
    }
}
