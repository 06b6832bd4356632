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

use std::collections::HashSet;
use std::future::Future;

use serde::Deserialize;

use super::ApiError;

pub const MARKER_PAGE_LIMIT: u32 = 100;
pub const NUMBERED_PAGE_SIZE: u32 = 50;

/// Page of a marker paginated listing
#[derive(Debug)]
pub struct MarkerPage<T> {
    pub items: Vec<T>,
    pub next_marker: Option<String>,
}

/// Page of a `page_num` paginated listing
#[derive(Debug)]
pub struct NumberedPage<T> {
    pub items: Vec<T>,
    pub total: Option<u64>,
}

/// `page_info` object of the marker paginated listings
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct PageInfo {
    pub next_marker: Option<String>,
    pub current_count: Option<u64>,
}

/// Fetch every page, following the markers.
///
/// Stops on an empty page, a missing marker, or a marker already requested.
pub async fn collect_by_marker<T, F, Fut>(mut fetch: F) -> Result<Vec<T>, ApiError>
where
    F: FnMut(Option<String>) -> Fut,
    Fut: Future<Output = Result<MarkerPage<T>, ApiError>>,
{
    let mut items = Vec::new();
    let mut requested = HashSet::new();
    let mut marker: Option<String> = None;
    loop {
        let page = fetch(marker.clone()).await?;
        if page.items.is_empty() {
            break;
        }
        items.extend(page.items);
        match page.next_marker {
            Some(next) if !next.is_empty() && requested.insert(next.clone()) => {
                marker = Some(next)
            }
            _ => break,
        }
    }
    Ok(items)
}

/// Fetch every page, from `page_num` 1.
///
/// Stops on an empty page or once `total` items have been collected.
pub async fn collect_by_page<T, F, Fut>(mut fetch: F) -> Result<Vec<T>, ApiError>
where
    F: FnMut(u64) -> Fut,
    Fut: Future<Output = Result<NumberedPage<T>, ApiError>>,
{
    let mut items = Vec::new();
    let mut page_num = 1;
    loop {
        let page = fetch(page_num).await?;
        if page.items.is_empty() {
            break;
        }
        items.extend(page.items);
        if page.total.is_some_and(|total| items.len() as u64 >= total) {
            break;
        }
        page_num += 1;
    }
    Ok(items)
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;

    #[tokio::test]
    async fn marker_pages() {
        let requested = Mutex::new(Vec::new());
        let items = collect_by_marker(|marker| {
            requested.lock().unwrap().push(marker.clone());
            async move {
                Ok(match marker.as_deref() {
                    None => MarkerPage {
                        items: vec![1, 2],
                        next_marker: Some("b".to_owned()),
                    },
                    Some("b") => MarkerPage {
                        items: vec![3],
                        next_marker: None,
                    },
                    Some(other) => panic!("unexpected marker {other}"),
                })
            }
        })
        .await
        .unwrap();
        assert_eq!(items, vec![1, 2, 3]);
        assert_eq!(
            *requested.lock().unwrap(),
            vec![None, Some("b".to_owned())]
        );
    }

    #[tokio::test]
    async fn repeated_marker_stops() {
        let items = collect_by_marker(|_| async {
            Ok(MarkerPage {
                items: vec!["x"],
                next_marker: Some("same".to_owned()),
            })
        })
        .await
        .unwrap();
        assert_eq!(items, vec!["x", "x"]);
    }

    #[tokio::test]
    async fn marker_cycle_stops() {
        let requested = Mutex::new(Vec::new());
        let items = collect_by_marker(|marker| {
            requested.lock().unwrap().push(marker.clone());
            async move {
                let (item, next) = match marker.as_deref() {
                    None => (0, "a"),
                    Some("a") => (1, "b"),
                    Some("b") => (2, "a"),
                    Some(other) => panic!("unexpected marker {other}"),
                };
                Ok(MarkerPage {
                    items: vec![item],
                    next_marker: Some(next.to_owned()),
                })
            }
        })
        .await
        .unwrap();
        assert_eq!(items, vec![0, 1, 2]);
        assert_eq!(
            *requested.lock().unwrap(),
            vec![None, Some("a".to_owned()), Some("b".to_owned())]
        );
    }

    #[tokio::test]
    async fn empty_page_stops() {
        let items: Vec<u32> = collect_by_marker(|_| async {
            Ok(MarkerPage {
                items: vec![],
                next_marker: Some("ignored".to_owned()),
            })
        })
        .await
        .unwrap();
        assert!(items.is_empty());
    }

    #[tokio::test]
    async fn numbered_pages_stop_at_total() {
        let items = collect_by_page(|page_num| async move {
            Ok(NumberedPage {
                items: vec![page_num * 10, page_num * 10 + 1],
                total: Some(5),
            })
        })
        .await
        .unwrap();
        assert_eq!(items, vec![10, 11, 20, 21, 30, 31]);
    }

    #[tokio::test]
    async fn numbered_pages_stop_when_empty() {
        let items = collect_by_page(|page_num| async move {
            Ok(NumberedPage {
                items: if page_num < 3 { vec![page_num] } else { vec![] },
                total: None,
            })
        })
        .await
        .unwrap();
        assert_eq!(items, vec![1, 2]);
    }

    #[tokio::test]
    async fn errors_are_propagated() {
        let err = collect_by_page::<u32, _, _>(|_| async {
            Err(ApiError::Config("boom".to_owned()))
        })
        .await
        .unwrap_err();
        assert!(matches!(err, ApiError::Config(_)));
    }
}
