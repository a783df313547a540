//! Expected device lists and device-change assembly
//!
//! Builds the devices a VM should carry from its class and spec, and orders
//! the combined device-change list the way the hypervisor requires.

use crds::{VirtualDevices, VirtualMachine};
use tracing::debug;
use vsphere_client::{
    AllowedDevice, DeviceKind, PciPassthroughBacking, VirtualDevice, VirtualDeviceConfigSpec, VirtualDisk,
};

use crate::constants::{EPHEMERAL_STORAGE, PCI_DEVICE_KEY_START};
use crate::error::ControllerError;
use crate::quantity::parse_quantity;

/// Passthrough devices requested by a class, vGPUs first, with placeholder
/// keys counting down from -200.
pub fn create_pci_devices(devices: &VirtualDevices) -> Result<Vec<VirtualDevice>, ControllerError> {
    let mut device_key = PCI_DEVICE_KEY_START;
    let mut expected = Vec::with_capacity(devices.vgpu_devices.len() + devices.dynamic_direct_path_io_devices.len());

    for vgpu in &devices.vgpu_devices {
        expected.push(VirtualDevice::pci_passthrough(
            device_key,
            PciPassthroughBacking::Vmiop { vgpu: vgpu.profile_name.clone() },
        ));
        device_key -= 1;
    }

    for dev in &devices.dynamic_direct_path_io_devices {
        let allowed = AllowedDevice {
            vendor_id: pci_id(dev.vendor_id, "vendorID")?,
            device_id: pci_id(dev.device_id, "deviceID")?,
        };
        expected.push(VirtualDevice::pci_passthrough(
            device_key,
            PciPassthroughBacking::Dynamic { allowed_device: vec![allowed], custom_label: dev.custom_label.clone() },
        ));
        device_key -= 1;
    }

    Ok(expected)
}

fn pci_id(value: i64, field: &str) -> Result<i32, ControllerError> {
    i32::try_from(value).map_err(|_| ControllerError::InvalidConfig(format!("{field} {value} out of range")))
}

/// Edit changes growing image disks to the capacity requested by
/// `spec.volumes[].vsphereVolume`. A disk is never shrunk.
pub fn disk_device_changes(
    vm: &VirtualMachine,
    current: &[VirtualDevice],
) -> Result<Vec<VirtualDeviceConfigSpec>, ControllerError> {
    let mut changes = Vec::new();

    for volume in &vm.spec.volumes {
        let Some(source) = &volume.vsphere_volume else {
            continue;
        };
        let (Some(device_key), Some(capacity)) = (source.device_key, source.capacity.get(EPHEMERAL_STORAGE)) else {
            continue;
        };

        let desired_bytes = parse_quantity(capacity)?
            .value()
            .ok_or_else(|| ControllerError::InvalidQuantity(capacity.clone(), "out of range".to_string()))?;

        let (device, disk) = current
            .iter()
            .find_map(|d| (d.key == device_key).then_some(d).zip(d.as_disk()))
            .ok_or_else(|| {
                ControllerError::InvalidConfig(format!(
                    "volume {}: no virtual disk with device key {}",
                    volume.name, device_key
                ))
            })?;

        if desired_bytes < disk.capacity_in_bytes {
            return Err(ControllerError::InvalidConfig(format!(
                "volume {}: cannot shrink disk {} from {} to {} bytes",
                volume.name, device_key, disk.capacity_in_bytes, desired_bytes
            )));
        }
        if desired_bytes == disk.capacity_in_bytes {
            continue;
        }

        debug!(
            "Growing disk {} of volume {} from {} to {} bytes",
            device_key, volume.name, disk.capacity_in_bytes, desired_bytes
        );
        let mut grown = device.clone();
        grown.kind = DeviceKind::Disk(VirtualDisk {
            capacity_in_bytes: desired_bytes,
            file_name: disk.file_name.clone(),
        });
        changes.push(VirtualDeviceConfigSpec::edit(grown));
    }

    Ok(changes)
}

/// Orders a device-change list Remove, then Edit, then Add. The sort is
/// stable, so each group keeps the order it was assembled in.
pub fn order_device_changes(changes: &mut [VirtualDeviceConfigSpec]) {
    changes.sort_by_key(|change| change.operation);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crds::{DynamicDirectPathIODevice, VGPUDevice, VirtualMachineVolume, VsphereVolumeSource};
    use vsphere_client::DeviceConfigOperation;

    fn vm_with_volume(device_key: i32, capacity: &str) -> VirtualMachine {
        let mut vm = VirtualMachine::new("vm-1", Default::default());
        vm.spec.volumes = vec![VirtualMachineVolume {
            name: "root".to_string(),
            persistent_volume_claim: None,
            vsphere_volume: Some(VsphereVolumeSource {
                capacity: [(EPHEMERAL_STORAGE.to_string(), capacity.to_string())].into_iter().collect(),
                device_key: Some(device_key),
            }),
        }];
        vm
    }

    #[test]
    fn test_create_pci_devices_keys() {
        let devices = VirtualDevices {
            vgpu_devices: vec![
                VGPUDevice { profile_name: "grid-a".to_string() },
                VGPUDevice { profile_name: "grid-b".to_string() },
            ],
            dynamic_direct_path_io_devices: vec![DynamicDirectPathIODevice {
                vendor_id: 0x10de,
                device_id: 0x1eb8,
                custom_label: "gpu".to_string(),
            }],
        };

        let expected = create_pci_devices(&devices).unwrap();
        assert_eq!(expected.iter().map(|d| d.key).collect::<Vec<_>>(), vec![-200, -201, -202]);
        assert_eq!(
            expected[2].as_pci_passthrough().unwrap().backing,
            Some(PciPassthroughBacking::Dynamic {
                allowed_device: vec![AllowedDevice { vendor_id: 0x10de, device_id: 0x1eb8 }],
                custom_label: "gpu".to_string(),
            })
        );
    }

    #[test]
    fn test_create_pci_devices_rejects_out_of_range_id() {
        let devices = VirtualDevices {
            vgpu_devices: vec![],
            dynamic_direct_path_io_devices: vec![DynamicDirectPathIODevice {
                vendor_id: i64::from(i32::MAX) + 1,
                device_id: 1,
                custom_label: String::new(),
            }],
        };
        assert!(matches!(create_pci_devices(&devices), Err(ControllerError::InvalidConfig(_))));
    }

    #[test]
    fn test_disk_grows() {
        let current = vec![VirtualDevice::disk(2000, 10 * 1024 * 1024 * 1024)];
        let changes = disk_device_changes(&vm_with_volume(2000, "20Gi"), &current).unwrap();

        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].operation, DeviceConfigOperation::Edit);
        assert_eq!(changes[0].device.as_disk().unwrap().capacity_in_bytes, 20 * 1024 * 1024 * 1024);
    }

    #[test]
    fn test_disk_same_size_is_noop() {
        let current = vec![VirtualDevice::disk(2000, 10 * 1024 * 1024 * 1024)];
        assert!(disk_device_changes(&vm_with_volume(2000, "10Gi"), &current).unwrap().is_empty());
    }

    #[test]
    fn test_disk_shrink_and_unknown_key_are_errors() {
        let current = vec![VirtualDevice::disk(2000, 10 * 1024 * 1024 * 1024)];
        assert!(matches!(
            disk_device_changes(&vm_with_volume(2000, "5Gi"), &current),
            Err(ControllerError::InvalidConfig(_))
        ));
        assert!(matches!(
            disk_device_changes(&vm_with_volume(2001, "20Gi"), &current),
            Err(ControllerError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_order_device_changes_is_stable() {
        let mut changes = vec![
            VirtualDeviceConfigSpec::edit(VirtualDevice::disk(2000, 1)),
            VirtualDeviceConfigSpec::add(VirtualDevice::disk(-1, 1)),
            VirtualDeviceConfigSpec::remove(VirtualDevice::disk(4000, 1)),
            VirtualDeviceConfigSpec::add(VirtualDevice::disk(-2, 1)),
            VirtualDeviceConfigSpec::remove(VirtualDevice::disk(4001, 1)),
        ];
        order_device_changes(&mut changes);

        let keys: Vec<_> = changes.iter().map(|c| (c.operation, c.device.key)).collect();
        assert_eq!(
            keys,
            vec![
                (DeviceConfigOperation::Remove, 4000),
                (DeviceConfigOperation::Remove, 4001),
                (DeviceConfigOperation::Edit, 2000),
                (DeviceConfigOperation::Add, -1),
                (DeviceConfigOperation::Add, -2),
            ]
        );
    }
}
