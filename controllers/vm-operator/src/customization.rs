//! Guest customization gate
//!
//! A customization request is issued on every power on unless one is
//! already waiting for the guest, or the VM opts out with an annotation.

use crds::VirtualMachine;
use tracing::info;
use vsphere_client::{
    CustomizationAdapterMapping, CustomizationGlobalIpSettings, CustomizationIdentity, CustomizationSpec,
    ManagedObjectReference, VirtualMachineConfigInfo,
};

use crate::constants::{
    GOSC_PENDING_EXTRA_CONFIG_KEY, VSPHERE_CUSTOMIZATION_BYPASS_DISABLE, VSPHERE_CUSTOMIZATION_BYPASS_KEY,
};
use crate::error::ControllerError;
use crate::network::NetworkInterfaceInfoList;
use crate::session::Session;

/// True while the hypervisor holds a customization package the guest has
/// not consumed yet.
pub fn is_customization_pending(config: &VirtualMachineConfigInfo) -> bool {
    config
        .extra_config_value(GOSC_PENDING_EXTRA_CONFIG_KEY)
        .is_some_and(|value| !value.is_empty())
}

/// Linux customization with a fixed host name and a UTC hardware clock.
pub fn customization_spec(
    vm_name: &str,
    dns_servers: &[String],
    nic_setting_map: Vec<CustomizationAdapterMapping>,
) -> CustomizationSpec {
    CustomizationSpec {
        identity: CustomizationIdentity::LinuxPrep {
            host_name: vm_name.to_string(),
            domain: String::new(),
            hw_clock_utc: Some(true),
        },
        global_ip_settings: CustomizationGlobalIpSettings {
            dns_server_list: dns_servers.to_vec(),
            dns_suffix_list: Vec::new(),
        },
        nic_setting_map,
    }
}

impl Session {
    pub(crate) async fn customize_vm(
        &self,
        vm: &VirtualMachine,
        vm_ref: &ManagedObjectReference,
        config: &VirtualMachineConfigInfo,
        dns_servers: &[String],
        net_if_list: &NetworkInterfaceInfoList,
    ) -> Result<(), ControllerError> {
        let vm_key = vm.key();

        if vm.annotation(VSPHERE_CUSTOMIZATION_BYPASS_KEY) == Some(VSPHERE_CUSTOMIZATION_BYPASS_DISABLE) {
            info!("VM {}: skipping customization because of the {} annotation", vm_key, VSPHERE_CUSTOMIZATION_BYPASS_KEY);
            return Ok(());
        }

        // TODO: detect a stale pending customization and clear it, so that a
        // package the guest never consumed cannot block customization forever.
        if is_customization_pending(config) {
            info!("VM {}: skipping customization because it is already pending", vm_key);
            return Ok(());
        }

        let spec = customization_spec(
            vm.metadata.name.as_deref().unwrap_or_default(),
            dns_servers,
            net_if_list.interface_customizations(),
        );

        info!("VM {}: customizing with {:?}", vm_key, spec);
        match self.client.customize(vm_ref, &spec).await {
            Ok(()) => Ok(()),
            Err(e) if e.is_customization_pending() => {
                info!("VM {}: customization already pending on the hypervisor", vm_key);
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }
}
