//! Power state transitions
//!
//! A powered off VM is fully reconfigured and customized right before it is
//! powered on. A powered on VM only gets the settings that can change live.

use crds::{VirtualMachine, VirtualMachinePowerState};
use serde_json::Value;
use tracing::{error, info};
use vsphere_client::{
    ManagedObjectReference, VirtualEthernetCard, VirtualMachineConfigInfo, VirtualMachineConfigSpec,
    VirtualPciPassthrough,
};

use crate::config_spec::{ConfigSpecArgs, build_config_spec, change_block_tracking};
use crate::device_match::match_devices;
use crate::devices::{create_pci_devices, disk_device_changes, order_device_changes};
use crate::error::{ControllerError, StepErrors};
use crate::network::{NetworkInterfaceInfoList, fake_up_cloned_net_if_list};
use crate::session::{Session, VmConfigArgs, VmMetadata};
use crate::template::{Template, TemplateData};
use crate::volumes::ensure_volumes_attached;

/// Inputs resolved at the start of the power-on sequence.
#[derive(Debug, Clone, Default)]
pub(crate) struct VmUpdateArgs {
    pub net_if_list: NetworkInterfaceInfoList,
    pub dns_servers: Vec<String>,
    /// Metadata with templates rendered
    pub vm_metadata: Option<VmMetadata>,
}

pub(crate) fn to_vsphere_power_state(state: VirtualMachinePowerState) -> vsphere_client::VirtualMachinePowerState {
    match state {
        VirtualMachinePowerState::PoweredOff => vsphere_client::VirtualMachinePowerState::PoweredOff,
        VirtualMachinePowerState::PoweredOn => vsphere_client::VirtualMachinePowerState::PoweredOn,
        VirtualMachinePowerState::Suspended => vsphere_client::VirtualMachinePowerState::Suspended,
    }
}

pub(crate) fn from_vsphere_power_state(state: vsphere_client::VirtualMachinePowerState) -> VirtualMachinePowerState {
    match state {
        vsphere_client::VirtualMachinePowerState::PoweredOff => VirtualMachinePowerState::PoweredOff,
        vsphere_client::VirtualMachinePowerState::PoweredOn => VirtualMachinePowerState::PoweredOn,
        vsphere_client::VirtualMachinePowerState::Suspended => VirtualMachinePowerState::Suspended,
    }
}

/// Render every metadata value against the interface and DNS data. A value
/// that fails to render is kept verbatim and the failure is logged.
pub(crate) fn render_metadata_templates(
    vm_key: &str,
    metadata: &mut VmMetadata,
    data: &TemplateData,
    errors: &mut StepErrors,
) {
    let data = serde_json::to_value(data).unwrap_or(Value::Null);
    for (key, value) in metadata.data.iter_mut() {
        if !value.contains("{{") {
            continue;
        }
        match Template::parse(key, value).and_then(|t| t.execute(&data)) {
            Ok(rendered) => *value = rendered,
            Err(e) => errors.log_only(vm_key, "metadata template", e.into()),
        }
    }
}

impl Session {
    /// Everything that must happen before power on: interfaces, DNS,
    /// templates, reconfigure, customization and volume checks.
    pub(crate) async fn prepare_vm_for_power_on(
        &self,
        vm: &VirtualMachine,
        vm_ref: &ManagedObjectReference,
        config: &VirtualMachineConfigInfo,
        args: &VmConfigArgs,
        errors: &mut StepErrors,
    ) -> Result<(), ControllerError> {
        let vm_key = vm.key();

        let mut net_if_list = self.ensure_network_interfaces(vm).await?;
        if net_if_list.is_empty() {
            // keep the cards a cloned VM came with
            net_if_list = fake_up_cloned_net_if_list(&vm_key, config);
        }

        let dns_servers = match self.nameservers.get_nameservers().await {
            Ok(servers) => servers,
            Err(e) => {
                errors.log_only(&vm_key, "nameserver lookup", e);
                Vec::new()
            }
        };

        let mut vm_metadata = args.vm_metadata.clone();
        if self.config.features.metadata_templating {
            if let Some(metadata) = vm_metadata.as_mut() {
                let data = TemplateData {
                    network_interfaces: net_if_list.ip_configs(),
                    name_servers: dns_servers.clone(),
                };
                render_metadata_templates(&vm_key, metadata, &data, errors);
            }
        }

        let update_args = VmUpdateArgs { net_if_list, dns_servers, vm_metadata };

        self.pre_power_on_reconfigure(vm, vm_ref, config, args, &update_args).await?;
        self.customize_vm(vm, vm_ref, config, &update_args.dns_servers, &update_args.net_if_list)
            .await?;
        ensure_volumes_attached(vm)?;

        Ok(())
    }

    /// The full config spec: config fields plus disk, network and, when
    /// enabled, passthrough device changes.
    pub(crate) fn pre_power_on_config_spec(
        &self,
        vm: &VirtualMachine,
        config: &VirtualMachineConfigInfo,
        args: &VmConfigArgs,
        update_args: &VmUpdateArgs,
    ) -> Result<VirtualMachineConfigSpec, ControllerError> {
        let mut spec = build_config_spec(
            config,
            &ConfigSpecArgs {
                vm,
                vm_class: &args.vm_class.spec,
                vm_image: args.vm_image.as_ref(),
                vm_metadata: update_args.vm_metadata.as_ref(),
                provider: &self.config,
            },
        )?;

        let current = &config.hardware.device;
        spec.device_change.extend(disk_device_changes(vm, current)?);
        spec.device_change
            .extend(match_devices::<VirtualEthernetCard>(&update_args.net_if_list.devices(), current));

        if self.config.features.pci_passthrough_devices {
            let expected = create_pci_devices(&args.vm_class.spec.hardware.devices)?;
            spec.device_change.extend(match_devices::<VirtualPciPassthrough>(&expected, current));
        }

        order_device_changes(&mut spec.device_change);
        Ok(spec)
    }

    pub(crate) async fn pre_power_on_reconfigure(
        &self,
        vm: &VirtualMachine,
        vm_ref: &ManagedObjectReference,
        config: &VirtualMachineConfigInfo,
        args: &VmConfigArgs,
        update_args: &VmUpdateArgs,
    ) -> Result<(), ControllerError> {
        let spec = self.pre_power_on_config_spec(vm, config, args, update_args)?;
        if spec.is_empty() {
            return Ok(());
        }

        info!("VM {}: pre power on reconfigure: {:?}", vm.key(), spec);
        self.client.reconfigure(vm_ref, &spec).await.map_err(|e| {
            error!("VM {}: pre power on reconfigure failed: {}", vm.key(), e);
            ControllerError::from(e)
        })
    }

    /// Live reconfigure of a powered on VM. Only change block tracking is
    /// applied, followed by a fast suspend/resume so the running VM picks
    /// the change up.
    pub(crate) async fn powered_on_reconfigure(
        &self,
        vm: &VirtualMachine,
        vm_ref: &ManagedObjectReference,
        config: &VirtualMachineConfigInfo,
    ) -> Result<(), ControllerError> {
        let spec = VirtualMachineConfigSpec {
            change_tracking_enabled: change_block_tracking(config, &vm.spec),
            ..Default::default()
        };
        if spec.is_empty() {
            return Ok(());
        }

        info!("VM {}: powered on reconfigure: {:?}", vm.key(), spec);
        if let Err(e) = self.client.reconfigure(vm_ref, &spec).await {
            error!("VM {}: powered on reconfigure failed: {}", vm.key(), e);
            return Err(e.into());
        }

        if spec.change_tracking_enabled.is_some() {
            if let Err(e) = self.client.invoke_fsr(vm_ref).await {
                error!("VM {}: fast suspend/resume for change block tracking failed: {}", vm.key(), e);
                return Err(e.into());
            }
        }

        Ok(())
    }
}
