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

use anyhow::{anyhow, Result};
use tracing_subscriber::EnvFilter;

mod client;
mod config;
mod cpcs;
mod csms;
mod kms;
mod kps;
mod provider;
mod utils;

use provider::DewProvider;

/// Log filter from `TF_LOG_PROVIDER`, then `TF_LOG`, `info` otherwise
fn log_filter() -> EnvFilter {
    ["TF_LOG_PROVIDER", "TF_LOG"]
        .iter()
        .filter_map(|name| std::env::var(name).ok())
        .find_map(|level| EnvFilter::try_new(level.to_ascii_lowercase()).ok())
        .unwrap_or_else(|| EnvFilter::new("info"))
}

#[tokio::main]
async fn main() -> Result<()> {
    // stdout carries the plugin handshake
    tracing_subscriber::fmt()
        .with_env_filter(log_filter())
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();

    tf_provider::serve("huaweicloud", DewProvider::default())
        .await
        .map_err(|err| anyhow!("{err}"))
}
