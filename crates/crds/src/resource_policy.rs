//! VirtualMachineSetResourcePolicy CRD
//!
//! Groups VMs into a resource pool, folder and cluster modules.

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(CustomResource, Debug, Clone, Serialize, Deserialize, JsonSchema, Default)]
#[kube(
    group = "vmoperator.microscaler.io",
    version = "v1alpha1",
    kind = "VirtualMachineSetResourcePolicy",
    namespaced,
    status = "VirtualMachineSetResourcePolicyStatus"
)]
#[serde(rename_all = "camelCase")]
pub struct VirtualMachineSetResourcePolicySpec {
    /// Resource pool VMs of this set are placed in
    #[serde(default)]
    pub resource_pool: ResourcePoolSpec,

    /// Folder VMs of this set are placed in
    #[serde(default)]
    pub folder: FolderSpec,

    /// Cluster modules to create for this set
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub cluster_module: Vec<ClusterModuleSpec>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ResourcePoolSpec {
    /// Resource pool name
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct FolderSpec {
    /// Folder name
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ClusterModuleSpec {
    /// Group name referenced by the VM's cluster module annotation
    pub group_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "camelCase")]
pub struct VirtualMachineSetResourcePolicyStatus {
    /// Cluster modules created on the hypervisor for this policy
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub cluster_modules: Vec<ClusterModuleStatus>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ClusterModuleStatus {
    /// Group name from the spec
    pub group_name: String,

    /// Hypervisor-assigned module UUID
    pub module_uuid: String,

    /// Managed object id of the cluster owning the module
    #[serde(default)]
    pub cluster_moid: String,
}

impl VirtualMachineSetResourcePolicy {
    /// Looks up the module UUID registered for `group_name`.
    pub fn module_uuid(&self, group_name: &str) -> Option<&str> {
        self.status
            .as_ref()?
            .cluster_modules
            .iter()
            .find(|m| m.group_name == group_name)
            .map(|m| m.module_uuid.as_str())
            .filter(|uuid| !uuid.is_empty())
    }
}
