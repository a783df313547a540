//! Convergence session
//!
//! A `Session` holds the hypervisor client and the collaborators a
//! convergence pass needs. It keeps no state between passes.

use std::collections::BTreeMap;

use crds::{
    VirtualMachine, VirtualMachineClass, VirtualMachineImage, VirtualMachineMetadataTransport,
    VirtualMachinePowerState, VirtualMachineSetResourcePolicy,
};
use tracing::{debug, info};
use vsphere_client::VSphereClientTrait;

use crate::config::ProviderConfig;
use crate::error::{ControllerError, StepErrors};
use crate::nameservers::NameserverSource;
use crate::network::NetworkProvider;
use crate::power::to_vsphere_power_state;

/// Guest metadata resolved from the VM's metadata ConfigMap.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VmMetadata {
    pub data: BTreeMap<String, String>,
    pub transport: VirtualMachineMetadataTransport,
}

/// Objects referenced by the VM, resolved by the caller before a pass.
#[derive(Debug, Clone)]
pub struct VmConfigArgs {
    pub vm_class: VirtualMachineClass,
    pub vm_image: Option<VirtualMachineImage>,
    pub vm_metadata: Option<VmMetadata>,
    pub resource_policy: Option<VirtualMachineSetResourcePolicy>,
}

/// Converges hypervisor VMs toward their `VirtualMachine` resources.
pub struct Session {
    pub(crate) client: Box<dyn VSphereClientTrait + Send + Sync>,
    pub(crate) network_provider: Box<dyn NetworkProvider + Send + Sync>,
    pub(crate) nameservers: Box<dyn NameserverSource + Send + Sync>,
    pub(crate) config: ProviderConfig,
}

impl Session {
    /// Creates a new session.
    pub fn new(
        client: Box<dyn VSphereClientTrait + Send + Sync>,
        network_provider: Box<dyn NetworkProvider + Send + Sync>,
        nameservers: Box<dyn NameserverSource + Send + Sync>,
        config: ProviderConfig,
    ) -> Self {
        Self {
            client,
            network_provider,
            nameservers,
            config,
        }
    }

    /// Runs one convergence pass for `vm`.
    ///
    /// This method:
    /// 1. Reads the VM's config and runtime
    /// 2. Records the BIOS UUID so the volume controller can proceed
    /// 3. Applies the desired power state, reconfiguring and customizing
    ///    before power on, or applying live changes to a running VM
    /// 4. Refreshes `vm.status`
    /// 5. Attaches cluster modules and tags
    ///
    /// Recoverable failures along the way are returned together after the
    /// status refresh; `vm.status` is updated even then.
    pub async fn update_virtual_machine(
        &self,
        vm: &mut VirtualMachine,
        args: &VmConfigArgs,
    ) -> Result<(), ControllerError> {
        let vm_key = vm.key();
        let namespace = vm.metadata.namespace.as_deref().unwrap_or("default").to_string();
        let name = vm.metadata.name.as_deref().unwrap_or_default().to_string();

        info!("Updating VM {}", vm_key);
        let mut errors = StepErrors::default();

        let vm_ref = self.client.get_virtual_machine(&namespace, &name).await?;
        let props = self.client.get_properties(&vm_ref, &["config", "runtime"]).await?;
        let runtime = props.runtime.ok_or(ControllerError::MissingProperty("runtime"))?;
        let is_off = runtime.power_state == vsphere_client::VirtualMachinePowerState::PoweredOff;

        if let Some(config) = props.config.as_ref() {
            vm.status.get_or_insert_default().bios_uuid = config.uuid.clone();
        }

        match vm.spec.power_state {
            VirtualMachinePowerState::PoweredOff => {
                if !is_off {
                    info!("VM {}: powering off", vm_key);
                    self.client
                        .set_power_state(&vm_ref, to_vsphere_power_state(VirtualMachinePowerState::PoweredOff))
                        .await?;
                }
            }
            VirtualMachinePowerState::PoweredOn => {
                let config = props
                    .config
                    .as_ref()
                    .ok_or(ControllerError::ConfigUnavailable(runtime.connection_state))?;

                if is_off {
                    self.prepare_vm_for_power_on(vm, &vm_ref, config, args, &mut errors).await?;
                    info!("VM {}: powering on", vm_key);
                    self.client
                        .set_power_state(&vm_ref, to_vsphere_power_state(VirtualMachinePowerState::PoweredOn))
                        .await?;
                } else {
                    self.powered_on_reconfigure(vm, &vm_ref, config).await?;
                }
            }
            VirtualMachinePowerState::Suspended => {
                debug!("VM {}: suspend is never requested, leaving power state as is", vm_key);
            }
        }

        self.update_vm_status(vm, &vm_ref, &mut errors).await?;
        if errors.logged_count() > 0 {
            debug!("VM {}: {} non-fatal step failures logged", vm_key, errors.logged_count());
        }
        errors.finish()?;

        self.attach_tags_and_modules(vm, &vm_ref, args.resource_policy.as_ref()).await?;

        info!("VM {} updated", vm_key);
        Ok(())
    }
}
