//! Applies a reconfigure spec to an in-memory VM config the way the
//! hypervisor would.

use crate::error::VSphereError;
use crate::models::*;

pub(crate) fn apply_config_spec(
    config: &mut VirtualMachineConfigInfo,
    spec: &VirtualMachineConfigSpec,
    mut allocate_key: impl FnMut() -> i32,
) -> Result<(), VSphereError> {
    if let Some(annotation) = &spec.annotation {
        config.annotation = annotation.clone();
    }
    if let Some(num_cpus) = spec.num_cpus {
        config.hardware.num_cpu = num_cpus;
    }
    if let Some(memory_mb) = spec.memory_mb {
        config.hardware.memory_mb = i32::try_from(memory_mb)
            .map_err(|e| VSphereError::InvalidRequest(format!("memoryMB {memory_mb}: {e}")))?;
    }
    if let Some(managed_by) = &spec.managed_by {
        config.managed_by = Some(managed_by.clone());
    }
    if let Some(alloc) = &spec.cpu_allocation {
        merge_allocation(config.cpu_allocation.get_or_insert_with(Default::default), alloc);
    }
    if let Some(alloc) = &spec.memory_allocation {
        merge_allocation(config.memory_allocation.get_or_insert_with(Default::default), alloc);
    }

    for opt in &spec.extra_config {
        // An empty value deletes the key.
        config.extra_config.retain(|existing| existing.key != opt.key);
        if !opt.value.is_empty() {
            config.extra_config.push(opt.clone());
        }
    }

    if let Some(vapp) = &spec.vapp_config {
        let info = config
            .vapp_config
            .as_mut()
            .ok_or_else(|| VSphereError::InvalidRequest("VM has no vApp config".to_string()))?;
        for prop in &vapp.property {
            match prop.operation {
                ArrayUpdateOperation::Add => info.property.push(prop.info.clone()),
                ArrayUpdateOperation::Remove => info.property.retain(|p| p.key != prop.info.key),
                ArrayUpdateOperation::Edit => {
                    let existing = info
                        .property
                        .iter_mut()
                        .find(|p| p.key == prop.info.key)
                        .ok_or_else(|| VSphereError::InvalidRequest(format!("no vApp property with key {}", prop.info.key)))?;
                    *existing = prop.info.clone();
                }
            }
        }
        if !vapp.ovf_environment_transport.is_empty() {
            info.ovf_environment_transport = vapp.ovf_environment_transport.clone();
        }
    }

    if let Some(enabled) = spec.change_tracking_enabled {
        config.change_tracking_enabled = Some(enabled);
    }

    let devices = &mut config.hardware.device;
    for change in &spec.device_change {
        match change.operation {
            DeviceConfigOperation::Remove => {
                let before = devices.len();
                devices.retain(|d| d.key != change.device.key);
                if devices.len() == before {
                    return Err(VSphereError::InvalidRequest(format!("no device with key {}", change.device.key)));
                }
            }
            DeviceConfigOperation::Edit => {
                let existing = devices
                    .iter_mut()
                    .find(|d| d.key == change.device.key)
                    .ok_or_else(|| VSphereError::InvalidRequest(format!("no device with key {}", change.device.key)))?;
                *existing = change.device.clone();
            }
            DeviceConfigOperation::Add => {
                let mut device = change.device.clone();
                if device.key < 0 {
                    device.key = allocate_key();
                }
                devices.push(device);
            }
        }
    }

    Ok(())
}

fn merge_allocation(current: &mut ResourceAllocationInfo, update: &ResourceAllocationInfo) {
    if update.reservation.is_some() {
        current.reservation = update.reservation;
    }
    if update.limit.is_some() {
        current.limit = update.limit;
    }
}
