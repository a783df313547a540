//! Provider configuration
//!
//! Loaded once from environment variables by the process embedding the
//! engine and handed to every [`Session`](crate::Session). Nothing here is
//! read from global state during a convergence pass.

use std::collections::BTreeMap;
use std::env;

use tracing::info;

use crate::constants::PROVIDER_TAG_CATEGORY_NAME_KEY;
use crate::error::ControllerError;

/// JSON object of extra-config keys set on every VM; values may be templates
pub const JSON_EXTRA_CONFIG_ENV: &str = "JSON_EXTRA_CONFIG";
/// Enables PCI passthrough devices (vGPU and dynamic DirectPath I/O)
pub const FSS_THUNDER_PCI_DEVICES_ENV: &str = "FSS_THUNDERPCIDEVICES";
/// Enables guest metadata templating
pub const FSS_VM_SERVICE_V1ALPHA2_ENV: &str = "FSS_WCP_VMSERVICE_V1ALPHA2";
/// Lowest CPU frequency among the cluster's hosts, in MHz
pub const MIN_CPU_FREQ_MHZ_ENV: &str = "VSPHERE_MIN_CPU_FREQ_MHZ";

/// Provider tag table keys, each read from the environment variable of the same name
pub const PROVIDER_TAG_KEYS: [&str; 3] = [
    PROVIDER_TAG_CATEGORY_NAME_KEY,
    "CtrlVmVmAntiAffinityTagName",
    "WorkerVmVmAntiAffinityTagName",
];

/// Used when the cluster frequency is not configured
pub const DEFAULT_MIN_CPU_FREQ_MHZ: u64 = 1000;

/// Feature switches consulted by the config spec builder and the power-on path.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FeatureFlags {
    /// Reconcile PCI passthrough devices and their MMIO extra-config
    pub pci_passthrough_devices: bool,
    /// Render guest metadata values as templates before power on
    pub metadata_templating: bool,
}

/// Engine-wide settings shared by every convergence pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderConfig {
    /// Extra-config entries added to every VM, rendered against the VM spec
    pub global_extra_config: BTreeMap<String, String>,
    /// Lowest CPU frequency in the cluster, used to convert CPU quantities to MHz
    pub min_cpu_freq_mhz: u64,
    /// Provider tag table: annotation value or well-known key to display name
    pub tag_info: BTreeMap<String, String>,
    pub features: FeatureFlags,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            global_extra_config: BTreeMap::new(),
            min_cpu_freq_mhz: DEFAULT_MIN_CPU_FREQ_MHZ,
            tag_info: BTreeMap::new(),
            features: FeatureFlags::default(),
        }
    }
}

impl ProviderConfig {
    /// Load configuration from the process environment.
    pub fn from_env() -> Result<Self, ControllerError> {
        let config = Self::from_vars(|key| env::var(key).ok())?;

        info!("Provider configuration:");
        info!("  Global extra-config keys: {}", config.global_extra_config.len());
        info!("  Min CPU frequency: {} MHz", config.min_cpu_freq_mhz);
        info!("  PCI passthrough devices: {}", config.features.pci_passthrough_devices);
        info!("  Metadata templating: {}", config.features.metadata_templating);

        Ok(config)
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_vars(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ControllerError> {
        let global_extra_config = match lookup(JSON_EXTRA_CONFIG_ENV) {
            Some(raw) if !raw.trim().is_empty() => serde_json::from_str::<BTreeMap<String, String>>(&raw)
                .map_err(|e| ControllerError::InvalidConfig(format!("{JSON_EXTRA_CONFIG_ENV}: {e}")))?,
            _ => BTreeMap::new(),
        };

        let min_cpu_freq_mhz = match lookup(MIN_CPU_FREQ_MHZ_ENV) {
            Some(raw) => {
                let freq = raw.trim().parse::<u64>().map_err(|e| {
                    ControllerError::InvalidConfig(format!("{MIN_CPU_FREQ_MHZ_ENV}={raw:?}: {e}"))
                })?;
                if freq == 0 {
                    return Err(ControllerError::InvalidConfig(format!(
                        "{MIN_CPU_FREQ_MHZ_ENV} must be greater than zero"
                    )));
                }
                freq
            }
            None => DEFAULT_MIN_CPU_FREQ_MHZ,
        };

        let tag_info = PROVIDER_TAG_KEYS
            .iter()
            .filter_map(|key| lookup(key).map(|value| (key.to_string(), value)))
            .collect();

        let features = FeatureFlags {
            pci_passthrough_devices: flag_enabled(lookup(FSS_THUNDER_PCI_DEVICES_ENV)),
            metadata_templating: flag_enabled(lookup(FSS_VM_SERVICE_V1ALPHA2_ENV)),
        };

        Ok(Self { global_extra_config, min_cpu_freq_mhz, tag_info, features })
    }
}

fn flag_enabled(value: Option<String>) -> bool {
    value.is_some_and(|v| v.trim().eq_ignore_ascii_case("true"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_defaults_when_unset() {
        let config = ProviderConfig::from_vars(lookup(&[])).unwrap();
        assert_eq!(config, ProviderConfig::default());
    }

    #[test]
    fn test_reads_all_variables() {
        let config = ProviderConfig::from_vars(lookup(&[
            (JSON_EXTRA_CONFIG_ENV, r#"{"guestinfo.image":"{{.ImageName}}"}"#),
            (FSS_THUNDER_PCI_DEVICES_ENV, "true"),
            (FSS_VM_SERVICE_V1ALPHA2_ENV, "TRUE"),
            (MIN_CPU_FREQ_MHZ_ENV, "2400"),
            (PROVIDER_TAG_CATEGORY_NAME_KEY, "aa-category"),
            ("CtrlVmVmAntiAffinityTagName", "ctrl-tag"),
        ]))
        .unwrap();

        assert_eq!(config.global_extra_config.get("guestinfo.image").map(String::as_str), Some("{{.ImageName}}"));
        assert!(config.features.pci_passthrough_devices);
        assert!(config.features.metadata_templating);
        assert_eq!(config.min_cpu_freq_mhz, 2400);
        assert_eq!(config.tag_info.len(), 2);
        assert_eq!(config.tag_info[PROVIDER_TAG_CATEGORY_NAME_KEY], "aa-category");
    }

    #[test]
    fn test_flag_must_be_true() {
        let config = ProviderConfig::from_vars(lookup(&[(FSS_THUNDER_PCI_DEVICES_ENV, "1")])).unwrap();
        assert!(!config.features.pci_passthrough_devices);
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        let err = ProviderConfig::from_vars(lookup(&[(JSON_EXTRA_CONFIG_ENV, "[1, 2]")])).unwrap_err();
        assert!(matches!(err, ControllerError::InvalidConfig(_)));

        let err = ProviderConfig::from_vars(lookup(&[(MIN_CPU_FREQ_MHZ_ENV, "fast")])).unwrap_err();
        assert!(matches!(err, ControllerError::InvalidConfig(_)));

        let err = ProviderConfig::from_vars(lookup(&[(MIN_CPU_FREQ_MHZ_ENV, "0")])).unwrap_err();
        assert!(matches!(err, ControllerError::InvalidConfig(_)));
    }
}
