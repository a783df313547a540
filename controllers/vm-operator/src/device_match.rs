//! Device matching by backing equality
//!
//! Device keys are assigned by the hypervisor and change between sessions, so
//! an expected device is paired with a current one by comparing what it is
//! connected to. Each pairing consumes the current device, which lets several
//! otherwise identical devices (two cards of the same vGPU profile) coexist.

use vsphere_client::{
    EthernetCardBacking, MacAddressType, PciPassthroughBacking, VirtualDevice, VirtualDeviceConfigSpec,
    VirtualEthernetCard, VirtualPciPassthrough,
};

/// A device type whose instances are matched by backing.
pub trait BackingMatch {
    /// The typed view of `device`, or `None` for other device types.
    fn select(device: &VirtualDevice) -> Option<&Self>;

    /// True when `self` (expected) and `current` are the same logical device.
    fn backing_matches(&self, current: &Self) -> bool;
}

impl BackingMatch for VirtualEthernetCard {
    fn select(device: &VirtualDevice) -> Option<&Self> {
        device.as_ethernet_card()
    }

    fn backing_matches(&self, current: &Self) -> bool {
        // Only the network provider assigns MACs and external ids; when it
        // did, they identify the card.
        if self.address_type == Some(MacAddressType::Manual) && self.mac_address != current.mac_address {
            return false;
        }
        if !self.external_id.is_empty() && self.external_id != current.external_id {
            return false;
        }

        let (Some(expected), Some(current)) = (&self.backing, &current.backing) else {
            return false;
        };
        match (expected, current) {
            (
                EthernetCardBacking::Network { device_name: a },
                EthernetCardBacking::Network { device_name: b },
            ) => a == b,
            (
                EthernetCardBacking::DistributedVirtualPort { switch_uuid: a_switch, portgroup_key: a_pg },
                EthernetCardBacking::DistributedVirtualPort { switch_uuid: b_switch, portgroup_key: b_pg },
            ) => a_switch == b_switch && a_pg == b_pg,
            (
                EthernetCardBacking::OpaqueNetwork { opaque_network_id: a, .. },
                EthernetCardBacking::OpaqueNetwork { opaque_network_id: b, .. },
            ) => a == b,
            (
                EthernetCardBacking::Network { .. }
                | EthernetCardBacking::DistributedVirtualPort { .. }
                | EthernetCardBacking::OpaqueNetwork { .. },
                _,
            ) => false,
        }
    }
}

impl BackingMatch for VirtualPciPassthrough {
    fn select(device: &VirtualDevice) -> Option<&Self> {
        device.as_pci_passthrough()
    }

    fn backing_matches(&self, current: &Self) -> bool {
        let (Some(expected), Some(current)) = (&self.backing, &current.backing) else {
            return false;
        };
        match (expected, current) {
            (PciPassthroughBacking::Vmiop { vgpu: a }, PciPassthroughBacking::Vmiop { vgpu: b }) => a == b,
            (
                PciPassthroughBacking::Dynamic { allowed_device: expected_devs, custom_label: a },
                PciPassthroughBacking::Dynamic { allowed_device: current_devs, custom_label: b },
            ) => a == b && expected_devs.iter().any(|dev| current_devs.contains(dev)),
            (PciPassthroughBacking::Vmiop { .. } | PciPassthroughBacking::Dynamic { .. }, _) => false,
        }
    }
}

/// Devices of type `T` from a device list, in order.
pub fn select_by_type<T: BackingMatch>(devices: &[VirtualDevice]) -> Vec<VirtualDevice> {
    devices.iter().filter(|d| T::select(d).is_some()).cloned().collect()
}

/// Match `expected` against the `T` devices in `current`.
///
/// Returns a Remove for every current device left unmatched (in current
/// order) followed by an Add for every expected device without a match (in
/// expected order). Matched devices produce no change.
pub fn match_devices<T: BackingMatch>(
    expected: &[VirtualDevice],
    current: &[VirtualDevice],
) -> Vec<VirtualDeviceConfigSpec> {
    let mut remaining: Vec<&VirtualDevice> = current.iter().filter(|d| T::select(d).is_some()).collect();
    let mut adds = Vec::new();

    for expected_dev in expected {
        let matching_idx = T::select(expected_dev).and_then(|exp| {
            remaining
                .iter()
                .position(|cur| T::select(cur).is_some_and(|cur| exp.backing_matches(cur)))
        });

        match matching_idx {
            Some(idx) => {
                remaining.remove(idx);
            }
            None => adds.push(VirtualDeviceConfigSpec::add(expected_dev.clone())),
        }
    }

    remaining
        .into_iter()
        .map(|dev| VirtualDeviceConfigSpec::remove(dev.clone()))
        .chain(adds)
        .collect()
}
