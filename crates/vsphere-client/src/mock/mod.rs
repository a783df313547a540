//! Mock VSphereClient for unit testing
//!
//! This module provides a mock implementation of VSphereClientTrait that can be used
//! in unit tests without requiring a vCenter instance.
//!
//! The mock is organized into:
//! - `apply.rs` - Applying reconfigure specs to the in-memory VM
//! - `helpers.rs` - Builders for VM fixtures

mod apply;
mod helpers;

pub use helpers::*;

use crate::error::{Fault, VSphereError};
use crate::models::*;
use crate::vsphere_trait::VSphereClientTrait;
use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Mutex};

/// Extra-config key the hypervisor sets while a customization package is pending
pub(crate) const GOSC_PENDING_KEY: &str = "tools.deployPkg.fileName";

/// A write call recorded by the mock
#[derive(Debug, Clone, PartialEq)]
pub enum MockCall {
    Reconfigure(VirtualMachineConfigSpec),
    SetPowerState(VirtualMachinePowerState),
    Customize(CustomizationSpec),
    InvokeFsr,
    AddVmToClusterModule(String),
    AttachTag { tag: String, category: String },
}

/// In-memory VM state
#[derive(Debug, Clone, Default)]
pub struct MockVm {
    pub config: Option<VirtualMachineConfigInfo>,
    pub runtime: VirtualMachineRuntimeInfo,
    pub guest: Option<GuestInfo>,
}

/// Mock VSphereClient for testing
///
/// This mock stores VMs in memory, applies reconfigure and power operations
/// to them, and records every write call for assertions.
#[derive(Clone, Default)]
pub struct MockVSphereClient {
    pub(crate) vms: Arc<Mutex<HashMap<String, MockVm>>>,
    pub(crate) vm_refs: Arc<Mutex<HashMap<(String, String), ManagedObjectReference>>>,
    pub(crate) hosts: Arc<Mutex<HashMap<String, String>>>,
    pub(crate) cluster_modules: Arc<Mutex<HashMap<String, BTreeSet<String>>>>,
    pub(crate) attached_tags: Arc<Mutex<BTreeSet<(String, String, String)>>>,
    pub(crate) calls: Arc<Mutex<Vec<(String, MockCall)>>>,
    pub(crate) customize_fault: Arc<Mutex<Option<Fault>>>,
    pub(crate) reconfigure_error: Arc<Mutex<Option<String>>>,
    // Counter for hypervisor-assigned device keys
    pub(crate) next_device_key: Arc<Mutex<i32>>,
}

impl std::fmt::Debug for MockVSphereClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockVSphereClient").finish_non_exhaustive()
    }
}

impl MockVSphereClient {
    /// Create a new mock client
    pub fn new() -> Self {
        Self {
            next_device_key: Arc::new(Mutex::new(4000)),
            ..Default::default()
        }
    }

    /// Register a VM under `namespace/name` (for test setup)
    pub fn add_vm(&self, namespace: &str, name: &str, moid: &str, vm: MockVm) -> ManagedObjectReference {
        let vm_ref = ManagedObjectReference::virtual_machine(moid);
        self.vm_refs
            .lock()
            .unwrap()
            .insert((namespace.to_string(), name.to_string()), vm_ref.clone());
        self.vms.lock().unwrap().insert(moid.to_string(), vm);
        vm_ref
    }

    /// Register a host name (for test setup)
    pub fn add_host(&self, moid: &str, name: &str) {
        self.hosts.lock().unwrap().insert(moid.to_string(), name.to_string());
    }

    /// Make every subsequent customize call fail with `fault`
    pub fn fail_customize_with(&self, fault: Fault) {
        *self.customize_fault.lock().unwrap() = Some(fault);
    }

    /// Make every subsequent reconfigure call fail
    pub fn fail_reconfigure_with(&self, message: impl Into<String>) {
        *self.reconfigure_error.lock().unwrap() = Some(message.into());
    }

    /// Mutate a VM's state (for test setup between passes)
    pub fn update_vm(&self, moid: &str, f: impl FnOnce(&mut MockVm)) {
        if let Some(vm) = self.vms.lock().unwrap().get_mut(moid) {
            f(vm);
        }
    }

    /// Snapshot of a VM's state
    pub fn vm(&self, moid: &str) -> Option<MockVm> {
        self.vms.lock().unwrap().get(moid).cloned()
    }

    /// Every recorded write call, in order
    pub fn calls(&self) -> Vec<MockCall> {
        self.calls.lock().unwrap().iter().map(|(_, c)| c.clone()).collect()
    }

    /// Forget recorded calls
    pub fn clear_calls(&self) {
        self.calls.lock().unwrap().clear();
    }

    /// Recorded reconfigure specs, in order
    pub fn reconfigure_calls(&self) -> Vec<VirtualMachineConfigSpec> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                MockCall::Reconfigure(spec) => Some(spec),
                _ => None,
            })
            .collect()
    }

    /// Members of a cluster module
    pub fn cluster_module_members(&self, module_uuid: &str) -> BTreeSet<String> {
        self.cluster_modules
            .lock()
            .unwrap()
            .get(module_uuid)
            .cloned()
            .unwrap_or_default()
    }

    /// Attached (tag, category, vm moid) triples
    pub fn attached_tags(&self) -> BTreeSet<(String, String, String)> {
        self.attached_tags.lock().unwrap().clone()
    }

    fn record(&self, vm: &ManagedObjectReference, call: MockCall) {
        self.calls.lock().unwrap().push((vm.value.clone(), call));
    }

    fn with_vm<T>(
        &self,
        vm: &ManagedObjectReference,
        f: impl FnOnce(&mut MockVm) -> Result<T, VSphereError>,
    ) -> Result<T, VSphereError> {
        let mut vms = self.vms.lock().unwrap();
        let state = vms
            .get_mut(&vm.value)
            .ok_or_else(|| VSphereError::NotFound(format!("VirtualMachine {}", vm.value)))?;
        f(state)
    }

    fn allocate_device_key(&self) -> i32 {
        let mut key = self.next_device_key.lock().unwrap();
        let current = *key;
        *key += 1;
        current
    }
}

#[async_trait::async_trait]
impl VSphereClientTrait for MockVSphereClient {
    async fn get_virtual_machine(&self, namespace: &str, name: &str) -> Result<ManagedObjectReference, VSphereError> {
        self.vm_refs
            .lock()
            .unwrap()
            .get(&(namespace.to_string(), name.to_string()))
            .cloned()
            .ok_or_else(|| VSphereError::NotFound(format!("VirtualMachine {namespace}/{name}")))
    }

    async fn get_properties(&self, vm: &ManagedObjectReference, property_names: &[&str]) -> Result<VirtualMachineProperties, VSphereError> {
        self.with_vm(vm, |state| {
            let mut props = VirtualMachineProperties::default();
            for name in property_names {
                match *name {
                    "config" => props.config = state.config.clone(),
                    "config.changeTrackingEnabled" => {
                        if props.config.is_none() {
                            props.config = state.config.as_ref().map(|c| VirtualMachineConfigInfo {
                                change_tracking_enabled: c.change_tracking_enabled,
                                ..Default::default()
                            });
                        }
                    }
                    "runtime" => props.runtime = Some(state.runtime.clone()),
                    "guest" => props.guest = state.guest.clone(),
                    "summary" => {
                        let config = state.config.as_ref().map(|c| VirtualMachineConfigSummary {
                            name: c.name.clone(),
                            uuid: c.uuid.clone(),
                            instance_uuid: c.instance_uuid.clone(),
                        });
                        props.summary = Some(VirtualMachineSummary {
                            config: config.unwrap_or_default(),
                            runtime: state.runtime.clone(),
                        });
                    }
                    other => {
                        return Err(VSphereError::InvalidRequest(format!("unknown property: {other}")));
                    }
                }
            }
            Ok(props)
        })
    }

    async fn reconfigure(&self, vm: &ManagedObjectReference, spec: &VirtualMachineConfigSpec) -> Result<(), VSphereError> {
        self.record(vm, MockCall::Reconfigure(spec.clone()));
        if let Some(message) = self.reconfigure_error.lock().unwrap().clone() {
            return Err(VSphereError::TaskFailed { fault: Fault::InvalidState, message });
        }
        self.with_vm(vm, |state| {
            let config = state
                .config
                .as_mut()
                .ok_or_else(|| VSphereError::TaskFailed {
                    fault: Fault::InvalidState,
                    message: "VM config is not available".to_string(),
                })?;
            apply::apply_config_spec(config, spec, || self.allocate_device_key())
        })
    }

    async fn set_power_state(&self, vm: &ManagedObjectReference, power_state: VirtualMachinePowerState) -> Result<(), VSphereError> {
        self.record(vm, MockCall::SetPowerState(power_state));
        self.with_vm(vm, |state| {
            if power_state == VirtualMachinePowerState::PoweredOn {
                // The guest consumes the pending customization package at boot.
                if let Some(config) = state.config.as_mut() {
                    config.extra_config.retain(|opt| opt.key != GOSC_PENDING_KEY);
                }
            }
            state.runtime.power_state = power_state;
            Ok(())
        })
    }

    async fn customize(&self, vm: &ManagedObjectReference, spec: &CustomizationSpec) -> Result<(), VSphereError> {
        self.record(vm, MockCall::Customize(spec.clone()));
        if let Some(fault) = self.customize_fault.lock().unwrap().clone() {
            return Err(VSphereError::TaskFailed {
                fault,
                message: "customization failed".to_string(),
            });
        }
        self.with_vm(vm, |state| {
            if let Some(config) = state.config.as_mut() {
                let package = format!("imcf-{}", uuid::Uuid::new_v4());
                config.extra_config.push(OptionValue::new(GOSC_PENDING_KEY, package));
            }
            Ok(())
        })
    }

    async fn invoke_fsr(&self, vm: &ManagedObjectReference) -> Result<(), VSphereError> {
        self.record(vm, MockCall::InvokeFsr);
        self.with_vm(vm, |state| {
            if state.runtime.power_state == VirtualMachinePowerState::PoweredOn {
                Ok(())
            } else {
                Err(VSphereError::TaskFailed {
                    fault: Fault::InvalidPowerState,
                    message: "fast suspend/resume requires a powered on VM".to_string(),
                })
            }
        })
    }

    async fn host_name(&self, host: &ManagedObjectReference) -> Result<String, VSphereError> {
        self.hosts
            .lock()
            .unwrap()
            .get(&host.value)
            .cloned()
            .ok_or_else(|| VSphereError::NotFound(format!("HostSystem {}", host.value)))
    }

    async fn is_vm_member_of_cluster_module(&self, module_uuid: &str, vm: &ManagedObjectReference) -> Result<bool, VSphereError> {
        Ok(self
            .cluster_modules
            .lock()
            .unwrap()
            .get(module_uuid)
            .is_some_and(|members| members.contains(&vm.value)))
    }

    async fn add_vm_to_cluster_module(&self, module_uuid: &str, vm: &ManagedObjectReference) -> Result<(), VSphereError> {
        self.record(vm, MockCall::AddVmToClusterModule(module_uuid.to_string()));
        self.cluster_modules
            .lock()
            .unwrap()
            .entry(module_uuid.to_string())
            .or_default()
            .insert(vm.value.clone());
        Ok(())
    }

    async fn attach_tag_to_vm(&self, tag_name: &str, category_name: &str, vm: &ManagedObjectReference) -> Result<(), VSphereError> {
        self.record(vm, MockCall::AttachTag { tag: tag_name.to_string(), category: category_name.to_string() });
        if tag_name.is_empty() || category_name.is_empty() {
            return Err(VSphereError::NotFound(format!("tag {tag_name:?} in category {category_name:?}")));
        }
        self.attached_tags.lock().unwrap().insert((
            tag_name.to_string(),
            category_name.to_string(),
            vm.value.clone(),
        ));
        Ok(())
    }
}
