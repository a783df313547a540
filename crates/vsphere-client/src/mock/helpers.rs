//! Builders for mock VM fixtures

use super::MockVm;
use crate::models::*;

/// A connected, powered off VM with 2 vCPUs, 2 GiB of memory and no devices
pub fn powered_off_vm(name: &str) -> MockVm {
    MockVm {
        config: Some(VirtualMachineConfigInfo {
            name: name.to_string(),
            uuid: uuid::Uuid::new_v4().to_string(),
            instance_uuid: uuid::Uuid::new_v4().to_string(),
            hardware: VirtualHardware { num_cpu: 2, memory_mb: 2048, device: vec![] },
            ..Default::default()
        }),
        runtime: VirtualMachineRuntimeInfo {
            power_state: VirtualMachinePowerState::PoweredOff,
            connection_state: VirtualMachineConnectionState::Connected,
            host: None,
        },
        guest: None,
    }
}

/// A connected, powered on VM running on `host_moid`
pub fn powered_on_vm(name: &str, host_moid: &str) -> MockVm {
    let mut vm = powered_off_vm(name);
    vm.runtime.power_state = VirtualMachinePowerState::PoweredOn;
    vm.runtime.host = Some(ManagedObjectReference::host_system(host_moid));
    vm
}

/// A vmxnet3 card on a standard port group
pub fn network_card(mac_address: &str, network: &str) -> VirtualEthernetCard {
    VirtualEthernetCard {
        card_type: EthernetCardType::Vmxnet3,
        address_type: Some(MacAddressType::Generated),
        mac_address: mac_address.to_string(),
        external_id: String::new(),
        backing: Some(EthernetCardBacking::Network { device_name: network.to_string() }),
    }
}

/// Guest info reporting one NIC with the given addresses
pub fn guest_with_nic(mac_address: &str, addresses: &[(&str, i32)]) -> GuestInfo {
    GuestInfo {
        ip_address: addresses.first().map(|(ip, _)| ip.to_string()).unwrap_or_default(),
        host_name: String::new(),
        net: vec![GuestNicInfo {
            network: String::new(),
            mac_address: mac_address.to_string(),
            connected: true,
            ip_config: Some(NetIpConfigInfo {
                ip_address: addresses
                    .iter()
                    .map(|(ip, prefix)| GuestIpAddress { ip_address: ip.to_string(), prefix_length: *prefix })
                    .collect(),
            }),
        }],
    }
}
