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

//! Key Management Service: keys, grants, aliases and data keys

mod alias;
mod api;
mod data_source;
mod grant;
mod key;
mod state;

pub use alias::KmsAliasResource;
pub use data_source::{
    KmsDataKeyDataSource, KmsGrantsDataSource, KmsKeyDataSource, KmsKeysDataSource,
};
pub use grant::KmsGrantResource;
pub use key::KmsKeyResource;
