//! Persistent volume readiness
//!
//! Claims are attached by the volume controller, which reports progress in
//! `status.volumes`. A VM must not power on before every claim is attached.

use crds::VirtualMachine;

use crate::error::ControllerError;

/// Ok when every claim-backed volume is reported attached.
pub fn ensure_volumes_attached(vm: &VirtualMachine) -> Result<(), ControllerError> {
    let statuses = vm.status.as_ref().map(|s| s.volumes.as_slice()).unwrap_or_default();

    // vSphere volumes ship with the image and have no status entry.
    for volume in vm.spec.volumes.iter().filter(|v| v.persistent_volume_claim.is_some()) {
        match statuses.iter().find(|s| s.name == volume.name) {
            Some(status) if status.attached => {}
            Some(_) => return Err(ControllerError::VolumeNotAttached(volume.name.clone())),
            None => return Err(ControllerError::VolumeStatusPending(volume.name.clone())),
        }
    }

    Ok(())
}
