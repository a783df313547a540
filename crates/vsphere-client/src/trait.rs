//! VSphereClient trait for mocking
//!
//! This trait abstracts the vSphere session the convergence engine talks to.
//! Session bootstrap and authentication happen before a value implementing
//! it is handed to the engine; tests use `MockVSphereClient`.

use crate::error::VSphereError;
use crate::models::*;

/// Trait for vSphere virtual machine operations
///
/// Every call blocks (awaits) until the underlying hypervisor task finishes.
/// All async methods must be `Send` to work with Tokio's work-stealing runtime.
#[async_trait::async_trait]
pub trait VSphereClientTrait: Send + Sync {
    /// Resolve the VM backing a namespaced `VirtualMachine` resource
    async fn get_virtual_machine(&self, namespace: &str, name: &str) -> Result<ManagedObjectReference, VSphereError>;

    /// Retrieve a subset of VM properties ("config", "runtime", "guest", "summary",
    /// or a nested path such as "config.changeTrackingEnabled")
    async fn get_properties(&self, vm: &ManagedObjectReference, property_names: &[&str]) -> Result<VirtualMachineProperties, VSphereError>;

    // VM write operations
    async fn reconfigure(&self, vm: &ManagedObjectReference, spec: &VirtualMachineConfigSpec) -> Result<(), VSphereError>;
    async fn set_power_state(&self, vm: &ManagedObjectReference, state: VirtualMachinePowerState) -> Result<(), VSphereError>;
    async fn customize(&self, vm: &ManagedObjectReference, spec: &CustomizationSpec) -> Result<(), VSphereError>;
    /// Fast suspend/resume: checkpoint save and restore of a running VM
    async fn invoke_fsr(&self, vm: &ManagedObjectReference) -> Result<(), VSphereError>;

    /// Display name of a host system
    async fn host_name(&self, host: &ManagedObjectReference) -> Result<String, VSphereError>;

    // Cluster modules and tags
    async fn is_vm_member_of_cluster_module(&self, module_uuid: &str, vm: &ManagedObjectReference) -> Result<bool, VSphereError>;
    async fn add_vm_to_cluster_module(&self, module_uuid: &str, vm: &ManagedObjectReference) -> Result<(), VSphereError>;
    /// Attach a tag; attaching an already attached tag succeeds
    async fn attach_tag_to_vm(&self, tag_name: &str, category_name: &str, vm: &ManagedObjectReference) -> Result<(), VSphereError>;
}
