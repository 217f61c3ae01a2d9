//! Parameter store access
//!
//! Endpoints, ports, and passwords live in SSM under hierarchical paths
//! such as `/edo/<env>/redshift/host`. Passwords are always fetched with
//! decryption.

use aws_config::SdkConfig;
use aws_sdk_ssm::Client;
use tracing::debug;

use crate::error::{BatchError, BatchResult};

/// Wrapper over the SSM client
#[derive(Clone)]
pub struct ParameterStore {
    client: Client,
}

impl ParameterStore {
    pub fn new(sdk_config: &SdkConfig) -> Self {
        Self {
            client: Client::new(sdk_config),
        }
    }

    /// Fetch a single parameter value
    pub async fn get_parameter(&self, name: &str, with_decryption: bool) -> BatchResult<String> {
        debug!(parameter = %name, "Fetching parameter");

        let response = self
            .client
            .get_parameter()
            .name(name)
            .with_decryption(with_decryption)
            .send()
            .await
            .map_err(|err| BatchError::parameter_store(name, err.to_string()))?;

        response
            .parameter()
            .and_then(|parameter| parameter.value())
            .map(str::to_string)
            .ok_or_else(|| BatchError::parameter_store(name, "parameter has no value"))
    }

    /// Fetch every parameter under a path prefix, keyed by its final segment
    ///
    /// `/edo/dev/redshift/host` comes back as `("host", value)`. Pagination
    /// is followed to the end.
    pub async fn get_parameters_by_path(
        &self,
        path: &str,
        with_decryption: bool,
    ) -> BatchResult<Vec<(String, String)>> {
        debug!(path = %path, "Fetching parameters by path");

        let mut parameters = Vec::new();
        let mut pages = self
            .client
            .get_parameters_by_path()
            .path(path)
            .recursive(false)
            .with_decryption(with_decryption)
            .into_paginator()
            .send();

        while let Some(page) = pages.next().await {
            let page = page.map_err(|err| BatchError::parameter_store(path, err.to_string()))?;
            for parameter in page.parameters() {
                let (Some(name), Some(value)) = (parameter.name(), parameter.value()) else {
                    continue;
                };
                let short_name = name.rsplit('/').next().unwrap_or(name);
                parameters.push((short_name.to_string(), value.to_string()));
            }
        }

        Ok(parameters)
    }
}
