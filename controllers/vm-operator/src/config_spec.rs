//! Config spec builder
//!
//! Compares a VM's current hypervisor configuration with its class, spec and
//! metadata, and produces a sparse `VirtualMachineConfigSpec` carrying only
//! what differs. Every builder here is pure; device changes are added by the
//! power-on path.

use std::collections::BTreeMap;

use crds::{
    VIRTUAL_MACHINE_IMAGE_V1ALPHA1_COMPATIBLE_CONDITION, VirtualDevices, VirtualMachine,
    VirtualMachineClassHardware, VirtualMachineClassResources, VirtualMachineClassSpec, VirtualMachineImage,
    VirtualMachineMetadataTransport, VirtualMachineSpec,
};
use vsphere_client::{
    ManagedByInfo, OptionValue, ResourceAllocationInfo, VirtualMachineConfigInfo, VirtualMachineConfigSpec,
    VmConfigSpec,
};

use crate::config::{FeatureFlags, ProviderConfig};
use crate::constants::*;
use crate::error::ControllerError;
use crate::quantity::{cpu_quantity_to_mhz, memory_quantity_to_mb, parse_quantity};
use crate::session::VmMetadata;
use crate::template::render_or_literal;
use crate::vapp::merged_vapp_config_spec;

/// Desired state the config spec is built from.
#[derive(Debug, Clone, Copy)]
pub struct ConfigSpecArgs<'a> {
    pub vm: &'a VirtualMachine,
    pub vm_class: &'a VirtualMachineClassSpec,
    pub vm_image: Option<&'a VirtualMachineImage>,
    pub vm_metadata: Option<&'a VmMetadata>,
    pub provider: &'a ProviderConfig,
}

/// Annotation, vCPU count, memory size and the managed-by marker.
pub fn update_hardware_config_spec(
    config: &VirtualMachineConfigInfo,
    hardware: &VirtualMachineClassHardware,
    spec: &mut VirtualMachineConfigSpec,
) -> Result<(), ControllerError> {
    if config.annotation != VC_VM_ANNOTATION {
        spec.annotation = Some(VC_VM_ANNOTATION.to_string());
    }

    let num_cpus = i32::try_from(hardware.cpus)
        .map_err(|_| ControllerError::InvalidConfig(format!("class CPU count {} out of range", hardware.cpus)))?;
    if num_cpus > 0 && config.hardware.num_cpu != num_cpus {
        spec.num_cpus = Some(num_cpus);
    }

    let memory = parse_quantity(&hardware.memory)?;
    if !memory.is_zero() {
        let memory_mb = memory_quantity_to_mb(&memory)?;
        if i64::from(config.hardware.memory_mb) != memory_mb {
            spec.memory_mb = Some(memory_mb);
        }
    }

    // Stamped once; whoever set it owns the VM.
    if config.managed_by.is_none() {
        spec.managed_by = Some(ManagedByInfo {
            extension_key: MANAGED_BY_EXTENSION_KEY.to_string(),
            type_: MANAGED_BY_TYPE.to_string(),
        });
    }

    Ok(())
}

/// CPU reservation and limit in MHz.
pub fn cpu_allocation(
    config: &VirtualMachineConfigInfo,
    resources: &VirtualMachineClassResources,
    min_cpu_freq_mhz: u64,
) -> Result<Option<ResourceAllocationInfo>, ControllerError> {
    let to_mhz = |quantity: Option<&String>| -> Result<Option<i64>, ControllerError> {
        let Some(quantity) = quantity else { return Ok(None) };
        let quantity = parse_quantity(quantity)?;
        if quantity.is_zero() {
            return Ok(None);
        }
        cpu_quantity_to_mhz(&quantity, min_cpu_freq_mhz).map(Some)
    };

    let reservation = to_mhz(resources.requests.cpu.as_ref())?;
    let limit = to_mhz(resources.limits.cpu.as_ref())?;
    Ok(allocation_delta(config.cpu_allocation.as_ref(), reservation, limit))
}

/// Memory reservation and limit in MB.
pub fn memory_allocation(
    config: &VirtualMachineConfigInfo,
    resources: &VirtualMachineClassResources,
) -> Result<Option<ResourceAllocationInfo>, ControllerError> {
    let to_mb = |quantity: Option<&String>| -> Result<Option<i64>, ControllerError> {
        let Some(quantity) = quantity else { return Ok(None) };
        let quantity = parse_quantity(quantity)?;
        if quantity.is_zero() {
            return Ok(None);
        }
        memory_quantity_to_mb(&quantity).map(Some)
    };

    let reservation = to_mb(resources.requests.memory.as_ref())?;
    let limit = to_mb(resources.limits.memory.as_ref())?;
    Ok(allocation_delta(config.memory_allocation.as_ref(), reservation, limit))
}

/// Desired values that differ from `current`. An unspecified desired value
/// never clears a current one.
fn allocation_delta(
    current: Option<&ResourceAllocationInfo>,
    reservation: Option<i64>,
    limit: Option<i64>,
) -> Option<ResourceAllocationInfo> {
    let changed = |desired: Option<i64>, current: Option<i64>| desired.filter(|d| current != Some(*d));

    let reservation = changed(reservation, current.and_then(|c| c.reservation));
    let limit = changed(limit, current.and_then(|c| c.limit));
    if reservation.is_none() && limit.is_none() {
        return None;
    }
    Some(ResourceAllocationInfo { reservation, limit })
}

/// Extra-config entries a VM should carry, accumulated from several sources
/// and merged by the caller. Later merges win on duplicate keys.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtraConfig(BTreeMap<String, String>);

impl ExtraConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn merge(mut self, other: ExtraConfig) -> Self {
        self.0.extend(other.0);
        self
    }

    /// Entries whose key is not present in `current` at all. Existing keys
    /// belong to the guest and are never overwritten.
    pub fn missing_from(&self, current: &VirtualMachineConfigInfo) -> Vec<OptionValue> {
        self.0
            .iter()
            .filter(|(key, _)| current.extra_config_value(key).is_none())
            .map(|(key, value)| OptionValue::new(key.clone(), value.clone()))
            .collect()
    }
}

impl FromIterator<(String, String)> for ExtraConfig {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Provider-wide entries, each value rendered as a template against the VM
/// spec. A value that fails to render is used as is.
pub fn global_extra_config(table: &BTreeMap<String, String>, vm: &VirtualMachine) -> ExtraConfig {
    if table.is_empty() {
        return ExtraConfig::new();
    }
    let data = serde_json::to_value(&vm.spec).unwrap_or_default();
    table
        .iter()
        .map(|(key, value)| (key.clone(), render_or_literal(key, value, &data)))
        .collect()
}

/// `guestinfo.*` metadata entries when metadata travels in extra-config.
pub fn guest_info_extra_config(vm_metadata: Option<&VmMetadata>) -> ExtraConfig {
    match vm_metadata {
        Some(metadata) if metadata.transport == VirtualMachineMetadataTransport::ExtraConfig => metadata
            .data
            .iter()
            .filter(|(key, _)| key.starts_with(EXTRA_CONFIG_GUEST_INFO_PREFIX))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect(),
        _ => ExtraConfig::new(),
    }
}

/// Entries required by passthrough devices: power off instead of migrating
/// for dynamic DirectPath I/O, and the 64-bit MMIO window for any device.
pub fn passthrough_extra_config(vm: &VirtualMachine, devices: &VirtualDevices, features: FeatureFlags) -> ExtraConfig {
    let mut extra_config = ExtraConfig::new();
    if !features.pci_passthrough_devices {
        return extra_config;
    }

    if !devices.dynamic_direct_path_io_devices.is_empty() {
        extra_config.insert(MM_POWER_OFF_VM_EXTRA_CONFIG_KEY, EXTRA_CONFIG_TRUE);
    }

    if devices.has_passthrough() {
        let mmio_size = vm
            .annotation(PCI_PASSTHRU_MMIO_OVERRIDE_ANNOTATION)
            .filter(|size| !size.is_empty())
            .unwrap_or(PCI_PASSTHRU_MMIO_SIZE_DEFAULT);
        if mmio_size != "0" {
            extra_config.insert(PCI_PASSTHRU_MMIO_EXTRA_CONFIG_KEY, EXTRA_CONFIG_TRUE);
            extra_config.insert(PCI_PASSTHRU_MMIO_SIZE_EXTRA_CONFIG_KEY, mmio_size);
        }
    }

    extra_config
}

/// Extra-config delta: every desired entry missing from the VM, plus the
/// legacy cloud-init handshake for v1alpha1-compatible images, which moves
/// a guest-reported `ready` to `enabled`.
pub fn extra_config_delta(
    config: &VirtualMachineConfigInfo,
    desired: &ExtraConfig,
    vm_image: Option<&VirtualMachineImage>,
) -> Vec<OptionValue> {
    let mut delta = desired.missing_from(config);

    let compatible = vm_image.is_some_and(|image| image.is_condition_true(VIRTUAL_MACHINE_IMAGE_V1ALPHA1_COMPATIBLE_CONDITION));
    if compatible && config.extra_config_value(VM_OPERATOR_V1ALPHA1_EXTRA_CONFIG_KEY) == Some(VM_OPERATOR_V1ALPHA1_CONFIG_READY) {
        delta.push(OptionValue::new(VM_OPERATOR_V1ALPHA1_EXTRA_CONFIG_KEY, VM_OPERATOR_V1ALPHA1_CONFIG_ENABLED));
    }

    delta
}

/// vApp property edits when metadata travels in the OVF environment and the
/// VM already has a vApp config.
pub fn vapp_config(config: &VirtualMachineConfigInfo, vm_metadata: Option<&VmMetadata>) -> Option<VmConfigSpec> {
    let metadata = vm_metadata.filter(|m| m.transport == VirtualMachineMetadataTransport::OvfEnv)?;
    let vapp = config.vapp_config.as_ref()?;
    merged_vapp_config_spec(&metadata.data, &vapp.property)
}

/// Desired change block tracking, when set and different from current.
pub fn change_block_tracking(config: &VirtualMachineConfigInfo, vm_spec: &VirtualMachineSpec) -> Option<bool> {
    let desired = vm_spec.advanced_options.as_ref()?.change_block_tracking?;
    (config.change_tracking_enabled != Some(desired)).then_some(desired)
}

/// Everything but device changes.
pub fn build_config_spec(
    config: &VirtualMachineConfigInfo,
    args: &ConfigSpecArgs<'_>,
) -> Result<VirtualMachineConfigSpec, ControllerError> {
    let mut spec = VirtualMachineConfigSpec::default();

    update_hardware_config_spec(config, &args.vm_class.hardware, &mut spec)?;
    spec.cpu_allocation = cpu_allocation(config, &args.vm_class.policies.resources, args.provider.min_cpu_freq_mhz)?;
    spec.memory_allocation = memory_allocation(config, &args.vm_class.policies.resources)?;

    let desired_extra_config = global_extra_config(&args.provider.global_extra_config, args.vm)
        .merge(guest_info_extra_config(args.vm_metadata))
        .merge(passthrough_extra_config(args.vm, &args.vm_class.hardware.devices, args.provider.features));
    spec.extra_config = extra_config_delta(config, &desired_extra_config, args.vm_image);

    spec.vapp_config = vapp_config(config, args.vm_metadata);
    spec.change_tracking_enabled = change_block_tracking(config, &args.vm.spec);

    Ok(spec)
}
