//! VirtualMachineClass CRD
//!
//! Describes a VM's hardware shape and resource policy.
//! Quantities use Kubernetes notation ("2", "500m", "4Gi").

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(CustomResource, Debug, Clone, Serialize, Deserialize, JsonSchema, Default)]
#[kube(
    group = "vmoperator.microscaler.io",
    version = "v1alpha1",
    kind = "VirtualMachineClass"
)]
#[serde(rename_all = "camelCase")]
pub struct VirtualMachineClassSpec {
    /// Virtual hardware presented to the guest
    #[serde(default)]
    pub hardware: VirtualMachineClassHardware,

    /// Resource reservations and limits
    #[serde(default)]
    pub policies: VirtualMachineClassPolicies,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct VirtualMachineClassHardware {
    /// Number of virtual CPUs
    #[serde(default)]
    pub cpus: i64,

    /// Memory size as a quantity (e.g. "4Gi")
    #[serde(default)]
    pub memory: String,

    /// Passthrough devices
    #[serde(default)]
    pub devices: VirtualDevices,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct VirtualDevices {
    /// NVIDIA vGPU profiles
    #[serde(default, rename = "vgpuDevices", skip_serializing_if = "Vec::is_empty")]
    pub vgpu_devices: Vec<VGPUDevice>,

    /// Dynamic DirectPath I/O devices
    #[serde(default, rename = "dynamicDirectPathIODevices", skip_serializing_if = "Vec::is_empty")]
    pub dynamic_direct_path_io_devices: Vec<DynamicDirectPathIODevice>,
}

impl VirtualDevices {
    /// True when the class requests any PCI passthrough hardware.
    pub fn has_passthrough(&self) -> bool {
        !self.vgpu_devices.is_empty() || !self.dynamic_direct_path_io_devices.is_empty()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct VGPUDevice {
    /// vGPU profile name (e.g. "grid_t4-4q")
    pub profile_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DynamicDirectPathIODevice {
    /// PCI vendor id
    #[serde(rename = "vendorID")]
    pub vendor_id: i64,

    /// PCI device id
    #[serde(rename = "deviceID")]
    pub device_id: i64,

    /// Label distinguishing otherwise identical devices
    #[serde(default)]
    pub custom_label: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct VirtualMachineClassPolicies {
    /// Requests and limits
    #[serde(default)]
    pub resources: VirtualMachineClassResources,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct VirtualMachineClassResources {
    /// Guaranteed allocation (maps to hypervisor reservation)
    #[serde(default)]
    pub requests: VirtualMachineResourceSpec,

    /// Upper bound (maps to hypervisor limit)
    #[serde(default)]
    pub limits: VirtualMachineResourceSpec,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct VirtualMachineResourceSpec {
    /// CPU quantity (e.g. "1000m")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cpu: Option<String>,

    /// Memory quantity (e.g. "2Gi")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memory: Option<String>,
}
