//! DNS server lookup
//!
//! Nameservers for guest customization are published cluster-wide in the
//! `vmoperator-network-config` ConfigMap. A failed lookup never blocks a
//! power on; the caller logs it and customizes without DNS servers.

use std::net::IpAddr;

use async_trait::async_trait;
use k8s_openapi::api::core::v1::ConfigMap;
use kube::{Api, Client};
use tracing::debug;

use crate::error::ControllerError;

/// ConfigMap holding the cluster network settings
pub const NETWORK_CONFIG_MAP_NAME: &str = "vmoperator-network-config";
/// Key of the nameserver list in [`NETWORK_CONFIG_MAP_NAME`]
pub const NAMESERVERS_KEY: &str = "nameservers";

/// Source of the DNS servers handed to guest customization.
#[async_trait]
pub trait NameserverSource: Send + Sync {
    async fn get_nameservers(&self) -> Result<Vec<String>, ControllerError>;
}

/// Reads nameservers from the network ConfigMap in the operator namespace.
#[derive(Clone)]
pub struct ConfigMapNameservers {
    api: Api<ConfigMap>,
}

impl ConfigMapNameservers {
    pub fn new(client: Client, namespace: &str) -> Self {
        Self { api: Api::namespaced(client, namespace) }
    }
}

#[async_trait]
impl NameserverSource for ConfigMapNameservers {
    async fn get_nameservers(&self) -> Result<Vec<String>, ControllerError> {
        let config_map = self.api.get(NETWORK_CONFIG_MAP_NAME).await?;
        let raw = config_map
            .data
            .as_ref()
            .and_then(|data| data.get(NAMESERVERS_KEY))
            .ok_or_else(|| {
                ControllerError::Nameservers(format!(
                    "ConfigMap {NETWORK_CONFIG_MAP_NAME} has no {NAMESERVERS_KEY:?} key"
                ))
            })?;
        let nameservers = parse_nameservers(raw)?;
        debug!("Read {} nameservers from ConfigMap {}", nameservers.len(), NETWORK_CONFIG_MAP_NAME);
        Ok(nameservers)
    }
}

/// A fixed nameserver list.
#[derive(Debug, Clone, Default)]
pub struct StaticNameservers(pub Vec<String>);

#[async_trait]
impl NameserverSource for StaticNameservers {
    async fn get_nameservers(&self) -> Result<Vec<String>, ControllerError> {
        Ok(self.0.clone())
    }
}

/// Parse a whitespace and/or comma separated list of IP addresses.
pub fn parse_nameservers(raw: &str) -> Result<Vec<String>, ControllerError> {
    let nameservers = raw
        .split(|c: char| c == ',' || c.is_whitespace())
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<IpAddr>()
                .map(|ip| ip.to_string())
                .map_err(|_| ControllerError::Nameservers(format!("invalid nameserver address {s:?}")))
        })
        .collect::<Result<Vec<_>, _>>()?;

    if nameservers.is_empty() {
        return Err(ControllerError::Nameservers("nameserver list is empty".to_string()));
    }
    Ok(nameservers)
}
