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

use tf_provider::value::{Value, ValueEmpty};
use tf_provider::schema::Schema;
use tf_provider::{AttributePath, DataSource, Diagnostics};

use crate::utils::{
    boolean, data_source_struct, hash_id, matches_filter, opt_string, string, WithSchema,
    WithValidate,
};

use super::api::{self, Keypair};
use super::state::{KeypairItem, KeypairsDataSourceState};

data_source_struct!(KpsKeypairsDataSource);

impl<'a> KeypairsDataSourceState<'a> {
    fn matches(&self, keypair: &Keypair) -> bool {
        let managed = match boolean(&self.is_managed) {
            Some(managed) => keypair.is_key_protection.unwrap_or_default() == managed,
            None => true,
        };
        managed
            && matches_filter(&self.name, Some(keypair.name.as_str()))
            && matches_filter(&self.fingerprint, keypair.fingerprint.as_deref())
            && matches_filter(&self.public_key, keypair.public_key.as_deref())
    }
}

fn keypair_item<'a>(keypair: Keypair) -> KeypairItem<'a> {
    KeypairItem {
        name: string(keypair.name),
        scope: opt_string(keypair.scope),
        public_key: opt_string(keypair.public_key),
        fingerprint: opt_string(keypair.fingerprint),
        is_managed: keypair.is_key_protection.map_or(Value::Null, Value::Value),
    }
}

#[async_trait]
impl DataSource for KpsKeypairsDataSource {
    type State<'a> = KeypairsDataSourceState<'a>;
    type ProviderMetaState<'a> = ValueEmpty;

    fn schema(&self, _diags: &mut Diagnostics) -> Option<Schema> {
        Some(KeypairsDataSourceState::schema())
    }

    async fn validate<'a>(&self, diags: &mut Diagnostics, config: Self::State<'a>) -> Option<()> {
        config.validate(diags, AttributePath::default()).await;

        if diags.errors.is_empty() {
            Some(())
        } else {
            None
        }
    }

    async fn read<'a>(
        &self,
        diags: &mut Diagnostics,
        config: Self::State<'a>,
        _provider_meta_state: Self::ProviderMetaState<'a>,
    ) -> Option<Self::State<'a>> {
        let client = self.client.get(diags)?;
        let mut state = config;
        let region = client.region_of(&state.region);

        let keypairs = match api::list_keypairs(&client, &region).await {
            Ok(keypairs) => keypairs,
            Err(err) => {
                diags.root_error("Failed to list the keypairs", err.to_string());
                return None;
            }
        };
        let keypairs: Vec<_> = keypairs
            .into_iter()
            .filter(|keypair| state.matches(keypair))
            .collect();

        state.id = string(hash_id(keypairs.iter().map(|keypair| keypair.name.as_str())));
        state.region = string(region);
        state.keypairs = Value::Value(
            keypairs
                .into_iter()
                .map(|keypair| Value::Value(keypair_item(keypair)))
                .collect(),
        );
        Some(state)
    }
}
