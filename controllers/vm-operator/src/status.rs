//! Status projection
//!
//! Overwrites the observed fields of `VirtualMachineStatus` from the
//! hypervisor's view of the VM.

use crds::{NetworkInterfaceStatus, VMStatusPhase, VirtualMachine, VirtualMachineStatus};
use tracing::{debug, warn};
use vsphere_client::{
    GuestInfo, GuestIpAddress, GuestNicInfo, ManagedObjectReference, VirtualMachineConfigInfo, VirtualMachineSummary,
};

use crate::error::{ControllerError, StepErrors};
use crate::power::from_vsphere_power_state;
use crate::session::Session;

pub const STATUS_PROPERTIES: &[&str] = &["config.changeTrackingEnabled", "guest", "summary"];

/// `address/prefix`
pub fn ip_cidr_notation(ip: &GuestIpAddress) -> String {
    format!("{}/{}", ip.ip_address, ip.prefix_length)
}

fn nic_status(nic: &GuestNicInfo) -> NetworkInterfaceStatus {
    NetworkInterfaceStatus {
        connected: nic.connected,
        mac_address: nic.mac_address.clone(),
        ip_addresses: nic
            .ip_config
            .as_ref()
            .map(|c| c.ip_address.iter().map(ip_cidr_notation).collect())
            .unwrap_or_default(),
    }
}

/// Project hypervisor state onto `status`. `host` is the resolved host name,
/// empty when the VM has no host or the lookup failed.
pub fn project_status(
    status: &mut VirtualMachineStatus,
    vm_ref: &ManagedObjectReference,
    summary: &VirtualMachineSummary,
    guest: Option<&GuestInfo>,
    config: Option<&VirtualMachineConfigInfo>,
    host: String,
) {
    status.phase = Some(VMStatusPhase::Created);
    status.power_state = Some(from_vsphere_power_state(summary.runtime.power_state));
    status.unique_id = vm_ref.value.clone();
    status.bios_uuid = summary.config.uuid.clone();
    status.instance_uuid = summary.config.instance_uuid.clone();

    status.host = host;

    match guest {
        Some(guest) => {
            status.vm_ip = guest.ip_address.clone();
            status.network_interfaces = guest.net.iter().map(nic_status).collect();
        }
        None => {
            status.vm_ip.clear();
            status.network_interfaces.clear();
        }
    }

    status.change_block_tracking = config.and_then(|c| c.change_tracking_enabled);
}

impl Session {
    /// Refresh `vm.status`. A failed property read leaves the status as it
    /// was. The host is empty when the VM has none or the lookup fails; a
    /// failed lookup is reported.
    pub(crate) async fn update_vm_status(
        &self,
        vm: &mut VirtualMachine,
        vm_ref: &ManagedObjectReference,
        errors: &mut StepErrors,
    ) -> Result<(), ControllerError> {
        let vm_key = vm.key();
        let props = self.client.get_properties(vm_ref, STATUS_PROPERTIES).await?;
        let summary = props.summary.ok_or(ControllerError::MissingProperty("summary"))?;

        let host = match summary.runtime.host.as_ref() {
            Some(host_ref) => match self.client.host_name(host_ref).await {
                Ok(name) => name,
                Err(e) => {
                    warn!("VM {}: failed to look up host {}: {}", vm_key, host_ref.value, e);
                    errors.report(e.into());
                    String::new()
                }
            },
            None => String::new(),
        };

        let status = vm.status.get_or_insert_default();
        project_status(status, vm_ref, &summary, props.guest.as_ref(), props.config.as_ref(), host);
        debug!("VM {}: status {:?}", vm_key, status);

        Ok(())
    }
}
