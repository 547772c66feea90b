//! Azure Blob Storage backend implementation.

use object_store::azure::{AzureConfigKey, MicrosoftAzureBuilder};
use object_store::path::Path;
use object_store::{ObjectStore, RetryConfig};
use snafu::prelude::*;
use std::collections::HashMap;
use std::sync::Arc;

use crate::error::{AzureConfigSnafu, StorageError, UnknownOptionSnafu};

use super::{BackendConfig, StorageProvider};

/// Option key holding a full Azure storage connection string.
pub const CONNECTION_STRING_OPTION: &str = "connection_string";

/// Azure Blob Storage configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AzureConfig {
    pub account: String,
    pub container: String,
    pub key: Option<Path>,
}

/// Split an Azure connection string into its `Name=Value` pairs.
///
/// Values may contain `=` (base64 account keys), so only the first one splits.
pub(crate) fn parse_connection_string(value: &str) -> HashMap<String, String> {
    value
        .split(';')
        .filter_map(|part| part.split_once('='))
        .map(|(k, v)| (k.trim().to_string(), v.trim().to_string()))
        .filter(|(k, _)| !k.is_empty())
        .collect()
}

fn apply_connection_string(
    mut builder: MicrosoftAzureBuilder,
    value: &str,
) -> MicrosoftAzureBuilder {
    for (name, value) in parse_connection_string(value) {
        builder = match name.as_str() {
            "AccountName" => builder.with_account(value),
            "AccountKey" => builder.with_access_key(value),
            "SharedAccessSignature" => builder.with_config(AzureConfigKey::SasKey, value),
            "UseDevelopmentStorage" => builder.with_use_emulator(value.eq_ignore_ascii_case("true")),
            _ => builder,
        };
    }
    builder
}

impl StorageProvider {
    pub(super) fn construct_azure(
        config: AzureConfig,
        options: HashMap<String, String>,
    ) -> Result<Self, StorageError> {
        let mut builder = MicrosoftAzureBuilder::from_env()
            .with_account(&config.account)
            .with_container_name(&config.container)
            .with_retry(RetryConfig::default());

        for (key, value) in &options {
            if key == CONNECTION_STRING_OPTION {
                builder = apply_connection_string(builder, value);
                continue;
            }
            let config_key: AzureConfigKey = key
                .parse()
                .map_err(|_| UnknownOptionSnafu { key: key.clone() }.build())?;
            builder = builder.with_config(config_key, value);
        }

        let canonical_url = format!(
            "https://{}.blob.core.windows.net/{}",
            config.account, config.container
        );

        let object_store: Arc<dyn ObjectStore> =
            Arc::new(builder.build().context(AzureConfigSnafu)?);

        Ok(Self {
            config: BackendConfig::Azure(config),
            object_store,
            canonical_url,
        })
    }
}
