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

use std::future::Future;
use std::time::Duration;

use thiserror::Error;
use tracing::{debug, warn};

use crate::utils::DisplayJoinable;

/// Poll a remote object until its status reaches a target or a failure value.
///
/// Any other status keeps the wait going, `pending` only names the expected ones.
#[derive(Debug, Clone)]
pub struct StateChangeConf<'a> {
    pub pending: &'a [&'a str],
    pub target: &'a [&'a str],
    pub failed: &'a [&'a str],
    pub timeout: Duration,
    pub delay: Duration,
    pub poll_interval: Duration,
    /// Consecutive refreshes allowed to find nothing
    pub not_found_checks: u32,
}

impl<'a> StateChangeConf<'a> {
    pub fn new(pending: &'a [&'a str], target: &'a [&'a str], timeout: Duration) -> Self {
        Self {
            pending,
            target,
            failed: &[],
            timeout,
            delay: Duration::from_secs(5),
            poll_interval: Duration::from_secs(5),
            not_found_checks: 20,
        }
    }

    pub fn failed(mut self, failed: &'a [&'a str]) -> Self {
        self.failed = failed;
        self
    }

    pub fn delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    pub fn not_found_checks(mut self, not_found_checks: u32) -> Self {
        self.not_found_checks = not_found_checks;
        self
    }
}

#[derive(Debug, Error)]
pub enum WaitError {
    #[error("timeout after {timeout:?} waiting for state `{target}`, last state: `{last_state}`")]
    Timeout {
        timeout: Duration,
        target: String,
        last_state: String,
    },
    #[error("reached the failure state `{0}`")]
    Failed(String),
    #[error("object not found after {0} checks")]
    NotFound(u32),
    #[error(transparent)]
    Refresh(#[from] anyhow::Error),
}

/// Call `refresh` until it reports a target state.
///
/// `refresh` gives the object with its current state, or `None` when the object does not exist.
pub async fn wait_for_state<T, F, Fut>(
    conf: &StateChangeConf<'_>,
    mut refresh: F,
) -> Result<T, WaitError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = anyhow::Result<Option<(T, String)>>>,
{
    let mut last_state = String::new();
    let outcome =
        tokio::time::timeout(conf.timeout, poll(conf, &mut refresh, &mut last_state)).await;
    match outcome {
        Ok(result) => result,
        Err(_) => Err(WaitError::Timeout {
            timeout: conf.timeout,
            target: conf.target.iter().join_with(", ").to_string(),
            last_state,
        }),
    }
}

async fn poll<T, F, Fut>(
    conf: &StateChangeConf<'_>,
    refresh: &mut F,
    last_state: &mut String,
) -> Result<T, WaitError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = anyhow::Result<Option<(T, String)>>>,
{
    tokio::time::sleep(conf.delay).await;

    let mut not_found = 0;
    loop {
        match refresh().await? {
            None => {
                not_found += 1;
                if not_found > conf.not_found_checks {
                    return Err(WaitError::NotFound(not_found));
                }
            }
            Some((value, state)) => {
                not_found = 0;
                debug!(state = %state, "refreshed state");
                if conf.target.contains(&state.as_str()) {
                    return Ok(value);
                }
                if conf.failed.contains(&state.as_str()) {
                    return Err(WaitError::Failed(state));
                }
                if !conf.pending.contains(&state.as_str()) {
                    warn!(state = %state, "unlisted state, still waiting");
                }
                *last_state = state;
            }
        }
        tokio::time::sleep(conf.poll_interval).await;
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use anyhow::anyhow;

    use super::*;

    fn conf<'a>(timeout_ms: u64) -> StateChangeConf<'a> {
        StateChangeConf::new(&["RUNNING"], &["SUCCESS"], Duration::from_millis(timeout_ms))
            .failed(&["FAILED"])
            .delay(Duration::ZERO)
            .poll_interval(Duration::from_millis(1))
            .not_found_checks(2)
    }

    async fn sequence(states: &[Option<&str>], calls: &AtomicUsize) -> anyhow::Result<Option<(usize, String)>> {
        let i = calls.fetch_add(1, Ordering::SeqCst);
        let state = states.get(i).copied().unwrap_or(states[states.len() - 1]);
        Ok(state.map(|state| (i, state.to_owned())))
    }

    #[tokio::test]
    async fn reaches_target() {
        let calls = AtomicUsize::new(0);
        let states = [Some("RUNNING"), Some("RUNNING"), Some("SUCCESS")];
        let value = wait_for_state(&conf(1000), || sequence(&states, &calls))
            .await
            .unwrap();
        assert_eq!(value, 2);
    }

    #[tokio::test]
    async fn failed_state() {
        let calls = AtomicUsize::new(0);
        let states = [Some("RUNNING"), Some("FAILED")];
        let err = wait_for_state(&conf(1000), || sequence(&states, &calls))
            .await
            .unwrap_err();
        assert!(matches!(err, WaitError::Failed(state) if state == "FAILED"));
    }

    #[tokio::test]
    async fn unlisted_state_keeps_waiting() {
        let calls = AtomicUsize::new(0);
        let states = [Some("RUNNING"), Some("QUEUED"), Some("SUCCESS")];
        let value = wait_for_state(&conf(1000), || sequence(&states, &calls))
            .await
            .unwrap();
        assert_eq!(value, 2);
    }

    #[tokio::test]
    async fn not_found_tolerance() {
        let calls = AtomicUsize::new(0);
        let states = [None, None, Some("SUCCESS")];
        assert_eq!(
            wait_for_state(&conf(1000), || sequence(&states, &calls))
                .await
                .unwrap(),
            2
        );

        let calls = AtomicUsize::new(0);
        let states = [None];
        let err = wait_for_state(&conf(1000), || sequence(&states, &calls))
            .await
            .unwrap_err();
        assert!(matches!(err, WaitError::NotFound(3)));
    }

    #[tokio::test]
    async fn timeout_reports_last_state() {
        let calls = AtomicUsize::new(0);
        let states = [Some("RUNNING")];
        let err = wait_for_state(&conf(20), || sequence(&states, &calls))
            .await
            .unwrap_err();
        match err {
            WaitError::Timeout { last_state, .. } => assert_eq!(last_state, "RUNNING"),
            err => panic!("unexpected error: {err}"),
        }
    }

    #[tokio::test]
    async fn refresh_error() {
        let err = wait_for_state(&conf(1000), || async {
            Err::<Option<((), String)>, _>(anyhow!("boom"))
        })
        .await
        .unwrap_err();
        assert_eq!(err.to_string(), "boom");
    }
}
