//! VirtualMachine CRD
//!
//! Declarative desired state of a VM and the status projected back from the
//! hypervisor on every convergence pass.

use std::collections::BTreeMap;

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(CustomResource, Debug, Clone, Serialize, Deserialize, JsonSchema, Default)]
#[kube(
    group = "vmoperator.microscaler.io",
    version = "v1alpha1",
    kind = "VirtualMachine",
    namespaced,
    status = "VirtualMachineStatus"
)]
#[serde(rename_all = "camelCase")]
pub struct VirtualMachineSpec {
    /// Name of the VirtualMachineImage to deploy
    #[serde(default)]
    pub image_name: String,

    /// Name of the VirtualMachineClass describing hardware and policy
    #[serde(default)]
    pub class_name: String,

    /// Requested power state
    #[serde(default)]
    pub power_state: VirtualMachinePowerState,

    /// Network interfaces, in guest order
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub network_interfaces: Vec<VirtualMachineNetworkInterface>,

    /// Volumes attached to the VM
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub volumes: Vec<VirtualMachineVolume>,

    /// Guest customization metadata source
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vm_metadata: Option<VirtualMachineMetadata>,

    /// Storage class for the VM's disks
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storage_class: Option<String>,

    /// Name of the VirtualMachineSetResourcePolicy this VM belongs to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_policy_name: Option<String>,

    /// Advanced hypervisor options
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub advanced_options: Option<VirtualMachineAdvancedOptions>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, JsonSchema, Default, PartialEq, Eq)]
/// VM power state, spelled as the hypervisor reports it
#[serde(rename_all = "camelCase")]
pub enum VirtualMachinePowerState {
    /// Powered off
    #[default]
    PoweredOff,
    /// Powered on
    PoweredOn,
    /// Suspended (only ever observed, never requested)
    Suspended,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct VirtualMachineNetworkInterface {
    /// Backend providing the network (e.g. "vsphere-distributed", "nsx-t")
    #[serde(default)]
    pub network_type: String,

    /// Name of the network to attach to
    #[serde(default)]
    pub network_name: String,

    /// Virtual NIC model (defaults to vmxnet3)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ethernet_card_type: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct VirtualMachineVolume {
    /// Volume name, unique within the VM
    pub name: String,

    /// Claim-backed volume attached by the volume controller
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub persistent_volume_claim: Option<PersistentVolumeClaimVolumeSource>,

    /// Disk that ships with the image and is resized in place
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vsphere_volume: Option<VsphereVolumeSource>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PersistentVolumeClaimVolumeSource {
    /// Claim name in the VM's namespace
    pub claim_name: String,

    /// Attach read-only
    #[serde(default)]
    pub read_only: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct VsphereVolumeSource {
    /// Requested capacity, keyed by resource name ("ephemeral-storage")
    #[serde(default)]
    pub capacity: BTreeMap<String, String>,

    /// Hypervisor device key of the disk to resize
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_key: Option<i32>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct VirtualMachineMetadata {
    /// ConfigMap holding the metadata key/value payload
    #[serde(default)]
    pub config_map_name: String,

    /// How the payload reaches the guest
    #[serde(default)]
    pub transport: VirtualMachineMetadataTransport,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, JsonSchema, Default, PartialEq, Eq)]
/// Guest metadata delivery mechanism
pub enum VirtualMachineMetadataTransport {
    /// guestinfo.* extra-config keys
    #[default]
    ExtraConfig,
    /// OVF environment vApp properties
    OvfEnv,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct VirtualMachineAdvancedOptions {
    /// Change block tracking; unset leaves the hypervisor value alone
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub change_block_tracking: Option<bool>,

    /// Default volume provisioning options
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_volume_provisioning_options: Option<VolumeProvisioningOptions>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct VolumeProvisioningOptions {
    /// Thin-provision disks
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thin_provisioned: Option<bool>,

    /// Eagerly zero disks
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub eager_zeroed: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct VirtualMachineStatus {
    /// Host the VM currently runs on
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub host: String,

    /// Observed power state
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub power_state: Option<VirtualMachinePowerState>,

    /// Lifecycle phase
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phase: Option<VMStatusPhase>,

    /// Hypervisor managed object id
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub unique_id: String,

    /// BIOS UUID
    #[serde(default, rename = "biosUUID", skip_serializing_if = "String::is_empty")]
    pub bios_uuid: String,

    /// Instance UUID
    #[serde(default, rename = "instanceUUID", skip_serializing_if = "String::is_empty")]
    pub instance_uuid: String,

    /// Primary guest IP address
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub vm_ip: String,

    /// Guest-reported NICs
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub network_interfaces: Vec<NetworkInterfaceStatus>,

    /// Volume attachment state, maintained by the volume controller
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub volumes: Vec<VirtualMachineVolumeStatus>,

    /// Observed change block tracking
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub change_block_tracking: Option<bool>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
/// VM lifecycle phase
pub enum VMStatusPhase {
    /// Being created
    Creating,
    /// Exists on the hypervisor
    Created,
    /// Being deleted
    Deleting,
    /// Gone from the hypervisor
    Deleted,
    /// Not determined
    Unknown,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct NetworkInterfaceStatus {
    /// Link state
    #[serde(default)]
    pub connected: bool,

    /// MAC address
    #[serde(default)]
    pub mac_address: String,

    /// Addresses in CIDR notation
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ip_addresses: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct VirtualMachineVolumeStatus {
    /// Volume name from the spec
    pub name: String,

    /// Whether the disk is attached
    #[serde(default)]
    pub attached: bool,

    /// Disk UUID once attached
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub disk_uuid: String,

    /// Last attach error
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub error: String,
}

impl VirtualMachine {
    /// `namespace/name`, used as the logging and error key.
    pub fn key(&self) -> String {
        format!(
            "{}/{}",
            self.metadata.namespace.as_deref().unwrap_or("default"),
            self.metadata.name.as_deref().unwrap_or_default()
        )
    }

    /// Looks up a metadata annotation.
    pub fn annotation(&self, key: &str) -> Option<&str> {
        self.metadata
            .annotations
            .as_ref()
            .and_then(|a| a.get(key))
            .map(String::as_str)
    }
}
