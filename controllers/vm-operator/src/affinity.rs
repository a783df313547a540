//! Cluster module membership and provider tags
//!
//! VMs carrying both the cluster module and provider tag annotations are
//! placed in their set's cluster module and tagged for anti-affinity.

use crds::{VirtualMachine, VirtualMachineSetResourcePolicy};
use tracing::{debug, info};
use vsphere_client::ManagedObjectReference;

use crate::constants::{CLUSTER_MODULE_NAME_KEY, PROVIDER_TAG_CATEGORY_NAME_KEY, PROVIDER_TAGS_ANNOTATION_KEY};
use crate::error::ControllerError;
use crate::session::Session;

impl Session {
    pub(crate) async fn attach_tags_and_modules(
        &self,
        vm: &VirtualMachine,
        vm_ref: &ManagedObjectReference,
        resource_policy: Option<&VirtualMachineSetResourcePolicy>,
    ) -> Result<(), ControllerError> {
        let (Some(group_name), Some(tag_key)) = (
            vm.annotation(CLUSTER_MODULE_NAME_KEY),
            vm.annotation(PROVIDER_TAGS_ANNOTATION_KEY),
        ) else {
            return Ok(());
        };
        let vm_key = vm.key();

        let module_uuid = resource_policy
            .and_then(|policy| policy.module_uuid(group_name))
            .ok_or_else(|| ControllerError::ClusterModuleNotFound(group_name.to_string()))?;

        if self.client.is_vm_member_of_cluster_module(module_uuid, vm_ref).await? {
            debug!("VM {}: already a member of cluster module {}", vm_key, module_uuid);
        } else {
            info!("VM {}: adding to cluster module {} ({})", vm_key, group_name, module_uuid);
            self.client.add_vm_to_cluster_module(module_uuid, vm_ref).await?;
        }

        let tag_name = self.config.tag_info.get(tag_key).ok_or_else(|| {
            ControllerError::InvalidConfig(format!("no provider tag configured for {tag_key}"))
        })?;
        let category_name = self.config.tag_info.get(PROVIDER_TAG_CATEGORY_NAME_KEY).ok_or_else(|| {
            ControllerError::InvalidConfig(format!("{PROVIDER_TAG_CATEGORY_NAME_KEY} is not configured"))
        })?;

        debug!("VM {}: attaching tag {} in category {}", vm_key, tag_name, category_name);
        self.client.attach_tag_to_vm(tag_name, category_name, vm_ref).await?;

        Ok(())
    }
}
