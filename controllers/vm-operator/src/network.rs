//! Network interfaces
//!
//! The network provider turns each `spec.networkInterfaces` entry into a
//! concrete ethernet card plus the customization the guest needs for it.
//! The engine only fixes up placeholder device keys and hands the cards to
//! the device matcher.

use async_trait::async_trait;
use crds::{VirtualMachine, VirtualMachineNetworkInterface};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use vsphere_client::{
    CustomizationAdapterMapping, CustomizationIpSettings, EthernetCardBacking, EthernetCardType,
    MacAddressType, VirtualDevice, VirtualEthernetCard, VirtualMachineConfigInfo,
};

use crate::constants::{MAX_NETWORK_INTERFACES, NETWORK_INTERFACE_DEVICE_KEY_START};
use crate::device_match::select_by_type;
use crate::error::ControllerError;
use crate::session::Session;

/// Addressing assigned to an interface, exposed to metadata templates.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IpConfig {
    #[serde(rename = "IP")]
    pub ip: String,
    #[serde(rename = "IPFamily")]
    pub ip_family: String,
    #[serde(rename = "Gateway")]
    pub gateway: String,
    #[serde(rename = "SubnetMask")]
    pub subnet_mask: String,
}

/// A provisioned network interface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkInterfaceInfo {
    /// The ethernet card to attach
    pub device: VirtualDevice,
    /// Guest network settings for the card, if any
    pub customization: Option<CustomizationAdapterMapping>,
    /// Static addressing, if any
    pub ip_configs: Vec<IpConfig>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NetworkInterfaceInfoList(pub Vec<NetworkInterfaceInfo>);

impl NetworkInterfaceInfoList {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Cards in interface order.
    pub fn devices(&self) -> Vec<VirtualDevice> {
        self.0.iter().map(|info| info.device.clone()).collect()
    }

    /// Per-adapter customization, skipping interfaces without one.
    pub fn interface_customizations(&self) -> Vec<CustomizationAdapterMapping> {
        self.0.iter().filter_map(|info| info.customization.clone()).collect()
    }

    pub fn ip_configs(&self) -> Vec<IpConfig> {
        self.0.iter().flat_map(|info| info.ip_configs.iter().cloned()).collect()
    }
}

/// Allocates the concrete network identity of an interface.
#[async_trait]
pub trait NetworkProvider: Send + Sync {
    async fn ensure_network_interface(
        &self,
        vm: &VirtualMachine,
        interface: &VirtualMachineNetworkInterface,
    ) -> Result<NetworkInterfaceInfo, ControllerError>;
}

/// Attaches interfaces to standard port groups by name, with DHCP addressing.
#[derive(Debug, Clone, Default)]
pub struct NamedNetworkProvider;

#[async_trait]
impl NetworkProvider for NamedNetworkProvider {
    async fn ensure_network_interface(
        &self,
        vm: &VirtualMachine,
        interface: &VirtualMachineNetworkInterface,
    ) -> Result<NetworkInterfaceInfo, ControllerError> {
        if interface.network_name.is_empty() {
            return Err(ControllerError::NetworkInterface(format!(
                "VM {}: interface of type {:?} has no network name",
                vm.key(),
                interface.network_type
            )));
        }

        let card_type = match interface.ethernet_card_type.as_deref() {
            Some(card_type) => card_type
                .parse::<EthernetCardType>()
                .map_err(|e| ControllerError::NetworkInterface(format!("VM {}: {}", vm.key(), e)))?,
            None => EthernetCardType::default(),
        };

        let card = VirtualEthernetCard {
            card_type,
            address_type: Some(MacAddressType::Generated),
            mac_address: String::new(),
            external_id: String::new(),
            backing: Some(EthernetCardBacking::Network { device_name: interface.network_name.clone() }),
        };

        Ok(NetworkInterfaceInfo {
            device: VirtualDevice::ethernet_card(0, card),
            customization: Some(CustomizationAdapterMapping::default()),
            ip_configs: Vec::new(),
        })
    }
}

impl Session {
    /// Provision every interface in the VM spec. Cards get placeholder keys
    /// counting down from -100 so they never collide with existing devices.
    /// More than [`MAX_NETWORK_INTERFACES`] would run into the PCI key range.
    pub(crate) async fn ensure_network_interfaces(
        &self,
        vm: &VirtualMachine,
    ) -> Result<NetworkInterfaceInfoList, ControllerError> {
        if vm.spec.network_interfaces.len() > MAX_NETWORK_INTERFACES {
            return Err(ControllerError::InvalidConfig(format!(
                "{} network interfaces exceeds the limit of {}",
                vm.spec.network_interfaces.len(),
                MAX_NETWORK_INTERFACES
            )));
        }

        let mut device_key = NETWORK_INTERFACE_DEVICE_KEY_START;
        let mut net_if_list = Vec::with_capacity(vm.spec.network_interfaces.len());

        for interface in &vm.spec.network_interfaces {
            let mut info = self.network_provider.ensure_network_interface(vm, interface).await?;
            info.device.key = device_key;
            debug!(
                "VM {}: network interface {} ready with device key {}",
                vm.key(),
                interface.network_name,
                device_key
            );
            net_if_list.push(info);
            device_key -= 1;
        }

        Ok(NetworkInterfaceInfoList(net_if_list))
    }
}

/// An interface list mirroring the cards the VM already has, each with DHCP
/// customization. Used when the spec lists no interfaces, so a cloned VM
/// keeps its cards instead of having them all removed.
pub fn fake_up_cloned_net_if_list(vm_key: &str, config: &VirtualMachineConfigInfo) -> NetworkInterfaceInfoList {
    let list: Vec<_> = select_by_type::<VirtualEthernetCard>(&config.hardware.device)
        .into_iter()
        .filter_map(|device| {
            let mac_address = device.as_ethernet_card()?.mac_address.clone();
            Some(NetworkInterfaceInfo {
                device,
                customization: Some(CustomizationAdapterMapping {
                    mac_address,
                    adapter: CustomizationIpSettings::default(),
                }),
                ip_configs: Vec::new(),
            })
        })
        .collect();

    if !list.is_empty() {
        info!("VM {}: no interfaces in spec, keeping {} existing cards", vm_key, list.len());
    }
    NetworkInterfaceInfoList(list)
}

#[cfg(test)]
mod tests {
    use super::*;
    use vsphere_client::mock::network_card;
    use vsphere_client::CustomizationIpGenerator;

    fn interface(name: &str, card_type: Option<&str>) -> VirtualMachineNetworkInterface {
        VirtualMachineNetworkInterface {
            network_type: "vsphere-distributed".to_string(),
            network_name: name.to_string(),
            ethernet_card_type: card_type.map(str::to_string),
        }
    }

    #[tokio::test]
    async fn test_named_provider_builds_card() {
        let vm = VirtualMachine::new("vm-1", Default::default());
        let info = NamedNetworkProvider
            .ensure_network_interface(&vm, &interface("vm-network", Some("e1000e")))
            .await
            .unwrap();

        let card = info.device.as_ethernet_card().unwrap();
        assert_eq!(card.card_type, EthernetCardType::E1000e);
        assert_eq!(card.backing, Some(EthernetCardBacking::Network { device_name: "vm-network".to_string() }));
        assert_eq!(info.customization.unwrap().adapter.ip, CustomizationIpGenerator::Dhcp);
    }

    #[tokio::test]
    async fn test_named_provider_rejects_bad_interfaces() {
        let vm = VirtualMachine::new("vm-1", Default::default());
        let err = NamedNetworkProvider
            .ensure_network_interface(&vm, &interface("", None))
            .await
            .unwrap_err();
        assert!(matches!(err, ControllerError::NetworkInterface(_)));

        let err = NamedNetworkProvider
            .ensure_network_interface(&vm, &interface("vm-network", Some("token-ring")))
            .await
            .unwrap_err();
        assert!(matches!(err, ControllerError::NetworkInterface(_)));
    }

    #[test]
    fn test_fake_up_mirrors_current_cards() {
        let config = VirtualMachineConfigInfo {
            hardware: vsphere_client::VirtualHardware {
                num_cpu: 1,
                memory_mb: 1024,
                device: vec![
                    VirtualDevice::disk(2000, 1 << 30),
                    VirtualDevice::ethernet_card(4000, network_card("aa:bb", "vm-network")),
                ],
            },
            ..Default::default()
        };

        let list = fake_up_cloned_net_if_list("default/vm-1", &config);
        assert_eq!(list.len(), 1);
        assert_eq!(list.devices()[0].key, 4000);
        assert_eq!(list.interface_customizations()[0].mac_address, "aa:bb");
    }

    #[test]
    fn test_list_accessors() {
        let list = NetworkInterfaceInfoList(vec![
            NetworkInterfaceInfo {
                device: VirtualDevice::ethernet_card(-100, network_card("", "a")),
                customization: None,
                ip_configs: vec![IpConfig { ip: "10.0.0.2".to_string(), ..Default::default() }],
            },
            NetworkInterfaceInfo {
                device: VirtualDevice::ethernet_card(-101, network_card("", "b")),
                customization: Some(CustomizationAdapterMapping::default()),
                ip_configs: vec![],
            },
        ]);

        assert_eq!(list.devices().len(), 2);
        assert_eq!(list.interface_customizations().len(), 1);
        assert_eq!(list.ip_configs()[0].ip, "10.0.0.2");
    }
}
