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

//! Cloud Password Cryptographic Service: apps, their access keys and clusters

mod access_key;
mod api;
mod app;
mod association;
mod data_source;
mod state;

pub use access_key::CpcsAppAccessKeyResource;
pub use app::CpcsAppResource;
pub use association::CpcsAppClusterAssociationResource;
pub use data_source::{CpcsAppsDataSource, CpcsClustersDataSource, CpcsInstancesDataSource};
