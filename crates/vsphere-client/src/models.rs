//! vSphere object model
//!
//! These models mirror the vSphere API data objects the convergence engine
//! reads (`VirtualMachineConfigInfo`, `GuestInfo`, summary) and writes
//! (`VirtualMachineConfigSpec`, `CustomizationSpec`). Polymorphic vSphere
//! types (device backings) are closed enums.

use serde::{Deserialize, Serialize};

/// Reference to a managed object (VM, host, cluster)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
pub struct ManagedObjectReference {
    #[serde(rename = "type")]
    pub type_: String,
    pub value: String,
}

impl ManagedObjectReference {
    /// Reference to a `VirtualMachine` managed object.
    pub fn virtual_machine(value: impl Into<String>) -> Self {
        Self { type_: "VirtualMachine".to_string(), value: value.into() }
    }

    /// Reference to a `HostSystem` managed object.
    pub fn host_system(value: impl Into<String>) -> Self {
        Self { type_: "HostSystem".to_string(), value: value.into() }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub enum VirtualMachinePowerState {
    #[default]
    PoweredOff,
    PoweredOn,
    Suspended,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub enum VirtualMachineConnectionState {
    #[default]
    Connected,
    Disconnected,
    Orphaned,
    Inaccessible,
    Invalid,
}

impl std::fmt::Display for VirtualMachineConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Connected => "connected",
            Self::Disconnected => "disconnected",
            Self::Orphaned => "orphaned",
            Self::Inaccessible => "inaccessible",
            Self::Invalid => "invalid",
        };
        f.write_str(s)
    }
}

/// Key/value entry of a VM's extra-config
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct OptionValue {
    pub key: String,
    pub value: String,
}

impl OptionValue {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self { key: key.into(), value: value.into() }
    }
}

/// CPU (MHz) or memory (MB) reservation and limit
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct ResourceAllocationInfo {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reservation: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<i64>,
}

/// Extension that owns the VM
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ManagedByInfo {
    pub extension_key: String,
    #[serde(rename = "type")]
    pub type_: String,
}

// ---------------------------------------------------------------------------
// Devices
// ---------------------------------------------------------------------------

/// A virtual device. `key` is assigned by the hypervisor and is only stable
/// for the lifetime of one session; negative keys are placeholders for
/// devices that do not exist yet.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct VirtualDevice {
    pub key: i32,
    pub kind: DeviceKind,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum DeviceKind {
    Disk(VirtualDisk),
    EthernetCard(VirtualEthernetCard),
    PciPassthrough(VirtualPciPassthrough),
    /// Controllers, CD-ROMs and anything else the engine never reconciles
    Other { type_name: String },
}

impl VirtualDevice {
    pub fn ethernet_card(key: i32, card: VirtualEthernetCard) -> Self {
        Self { key, kind: DeviceKind::EthernetCard(card) }
    }

    pub fn pci_passthrough(key: i32, backing: PciPassthroughBacking) -> Self {
        Self {
            key,
            kind: DeviceKind::PciPassthrough(VirtualPciPassthrough { backing: Some(backing) }),
        }
    }

    pub fn disk(key: i32, capacity_in_bytes: i64) -> Self {
        Self {
            key,
            kind: DeviceKind::Disk(VirtualDisk { capacity_in_bytes, file_name: String::new() }),
        }
    }

    pub fn as_ethernet_card(&self) -> Option<&VirtualEthernetCard> {
        match &self.kind {
            DeviceKind::EthernetCard(card) => Some(card),
            _ => None,
        }
    }

    pub fn as_pci_passthrough(&self) -> Option<&VirtualPciPassthrough> {
        match &self.kind {
            DeviceKind::PciPassthrough(pci) => Some(pci),
            _ => None,
        }
    }

    pub fn as_disk(&self) -> Option<&VirtualDisk> {
        match &self.kind {
            DeviceKind::Disk(disk) => Some(disk),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct VirtualDisk {
    pub capacity_in_bytes: i64,
    #[serde(default)]
    pub file_name: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum EthernetCardType {
    #[default]
    Vmxnet3,
    Vmxnet2,
    E1000,
    E1000e,
    Pcnet32,
    Sriov,
}

impl std::str::FromStr for EthernetCardType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "vmxnet3" => Ok(Self::Vmxnet3),
            "vmxnet2" => Ok(Self::Vmxnet2),
            "e1000" => Ok(Self::E1000),
            "e1000e" => Ok(Self::E1000e),
            "pcnet32" => Ok(Self::Pcnet32),
            "sriov" => Ok(Self::Sriov),
            other => Err(format!("unsupported ethernet card type: {other}")),
        }
    }
}

/// How the card's MAC address was chosen
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum MacAddressType {
    Manual,
    Generated,
    Assigned,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct VirtualEthernetCard {
    pub card_type: EthernetCardType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address_type: Option<MacAddressType>,
    #[serde(default)]
    pub mac_address: String,
    #[serde(default)]
    pub external_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backing: Option<EthernetCardBacking>,
}

/// Network a card is connected to
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum EthernetCardBacking {
    /// Standard switch port group, by name
    Network { device_name: String },
    /// Distributed switch port group
    DistributedVirtualPort { switch_uuid: String, portgroup_key: String },
    /// NSX opaque network
    OpaqueNetwork { opaque_network_id: String, opaque_network_type: String },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct VirtualPciPassthrough {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backing: Option<PciPassthroughBacking>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AllowedDevice {
    pub vendor_id: i32,
    pub device_id: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum PciPassthroughBacking {
    /// NVIDIA vGPU profile
    Vmiop { vgpu: String },
    /// Dynamic DirectPath I/O: any host device matching one allowed entry
    Dynamic { allowed_device: Vec<AllowedDevice>, custom_label: String },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct VirtualHardware {
    pub num_cpu: i32,
    #[serde(rename = "memoryMB")]
    pub memory_mb: i32,
    #[serde(default)]
    pub device: Vec<VirtualDevice>,
}

// ---------------------------------------------------------------------------
// vApp
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct VAppPropertyInfo {
    pub key: i32,
    pub id: String,
    #[serde(default)]
    pub label: String,
    #[serde(rename = "type", default)]
    pub type_: String,
    #[serde(default)]
    pub value: String,
    #[serde(default)]
    pub default_value: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_configurable: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct VAppConfigInfo {
    #[serde(default)]
    pub property: Vec<VAppPropertyInfo>,
    #[serde(default)]
    pub ovf_environment_transport: Vec<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum ArrayUpdateOperation {
    Add,
    Remove,
    Edit,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct VAppPropertySpec {
    pub operation: ArrayUpdateOperation,
    pub info: VAppPropertyInfo,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct VmConfigSpec {
    #[serde(default)]
    pub property: Vec<VAppPropertySpec>,
    #[serde(default)]
    pub ovf_environment_transport: Vec<String>,
}

// ---------------------------------------------------------------------------
// Config, runtime, guest, summary
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct VirtualMachineConfigInfo {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub uuid: String,
    #[serde(default)]
    pub instance_uuid: String,
    #[serde(default)]
    pub annotation: String,
    #[serde(default)]
    pub hardware: VirtualHardware,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cpu_allocation: Option<ResourceAllocationInfo>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memory_allocation: Option<ResourceAllocationInfo>,
    #[serde(default)]
    pub extra_config: Vec<OptionValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vapp_config: Option<VAppConfigInfo>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub change_tracking_enabled: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub managed_by: Option<ManagedByInfo>,
}

impl VirtualMachineConfigInfo {
    /// Value of an extra-config key. Later entries win over earlier ones.
    pub fn extra_config_value(&self, key: &str) -> Option<&str> {
        self.extra_config
            .iter()
            .rev()
            .find(|opt| opt.key == key)
            .map(|opt| opt.value.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct VirtualMachineRuntimeInfo {
    pub power_state: VirtualMachinePowerState,
    pub connection_state: VirtualMachineConnectionState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host: Option<ManagedObjectReference>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct GuestIpAddress {
    pub ip_address: String,
    pub prefix_length: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct NetIpConfigInfo {
    #[serde(default)]
    pub ip_address: Vec<GuestIpAddress>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct GuestNicInfo {
    #[serde(default)]
    pub network: String,
    #[serde(default)]
    pub mac_address: String,
    #[serde(default)]
    pub connected: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ip_config: Option<NetIpConfigInfo>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct GuestInfo {
    #[serde(default)]
    pub ip_address: String,
    #[serde(default)]
    pub host_name: String,
    #[serde(default)]
    pub net: Vec<GuestNicInfo>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct VirtualMachineConfigSummary {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub uuid: String,
    #[serde(default)]
    pub instance_uuid: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct VirtualMachineSummary {
    pub config: VirtualMachineConfigSummary,
    pub runtime: VirtualMachineRuntimeInfo,
}

/// Result of a property collector retrieval. Only the requested properties
/// are populated; `config` may also be absent when the VM is disconnected.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct VirtualMachineProperties {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config: Option<VirtualMachineConfigInfo>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub runtime: Option<VirtualMachineRuntimeInfo>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub guest: Option<GuestInfo>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<VirtualMachineSummary>,
}

// ---------------------------------------------------------------------------
// Reconfigure
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "camelCase")]
pub enum DeviceConfigOperation {
    Remove,
    Edit,
    Add,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct VirtualDeviceConfigSpec {
    pub operation: DeviceConfigOperation,
    pub device: VirtualDevice,
}

impl VirtualDeviceConfigSpec {
    pub fn add(device: VirtualDevice) -> Self {
        Self { operation: DeviceConfigOperation::Add, device }
    }

    pub fn remove(device: VirtualDevice) -> Self {
        Self { operation: DeviceConfigOperation::Remove, device }
    }

    pub fn edit(device: VirtualDevice) -> Self {
        Self { operation: DeviceConfigOperation::Edit, device }
    }
}

/// Sparse reconfigure request. Every field left at its default is untouched
/// by the hypervisor, so `VirtualMachineConfigSpec::default()` is a no-op.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct VirtualMachineConfigSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub annotation: Option<String>,
    #[serde(default, rename = "numCPUs", skip_serializing_if = "Option::is_none")]
    pub num_cpus: Option<i32>,
    #[serde(default, rename = "memoryMB", skip_serializing_if = "Option::is_none")]
    pub memory_mb: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub managed_by: Option<ManagedByInfo>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cpu_allocation: Option<ResourceAllocationInfo>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memory_allocation: Option<ResourceAllocationInfo>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub extra_config: Vec<OptionValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vapp_config: Option<VmConfigSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub change_tracking_enabled: Option<bool>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub device_change: Vec<VirtualDeviceConfigSpec>,
}

impl VirtualMachineConfigSpec {
    /// True when applying this spec would change nothing.
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

// ---------------------------------------------------------------------------
// Guest customization
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum CustomizationIdentity {
    LinuxPrep {
        host_name: String,
        #[serde(default)]
        domain: String,
        #[serde(default, rename = "hwClockUTC", skip_serializing_if = "Option::is_none")]
        hw_clock_utc: Option<bool>,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct CustomizationGlobalIpSettings {
    #[serde(default)]
    pub dns_server_list: Vec<String>,
    #[serde(default)]
    pub dns_suffix_list: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum CustomizationIpGenerator {
    #[default]
    Dhcp,
    Fixed { ip_address: String },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct CustomizationIpSettings {
    pub ip: CustomizationIpGenerator,
    #[serde(default)]
    pub subnet_mask: String,
    #[serde(default)]
    pub gateway: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct CustomizationAdapterMapping {
    #[serde(default)]
    pub mac_address: String,
    pub adapter: CustomizationIpSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CustomizationSpec {
    pub identity: CustomizationIdentity,
    #[serde(rename = "globalIPSettings")]
    pub global_ip_settings: CustomizationGlobalIpSettings,
    #[serde(default)]
    pub nic_setting_map: Vec<CustomizationAdapterMapping>,
}
