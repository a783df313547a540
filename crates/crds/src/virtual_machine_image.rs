//! VirtualMachineImage CRD
//!
//! Describes an OVF image available for VM deployment.

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::conditions::{Condition, is_condition_true};

/// Set when the image's guest tooling understands the legacy defer-cloud-init handshake
pub const VIRTUAL_MACHINE_IMAGE_V1ALPHA1_COMPATIBLE_CONDITION: &str =
    "VirtualMachineImageV1Alpha1Compatible";

#[derive(CustomResource, Debug, Clone, Serialize, Deserialize, JsonSchema, Default)]
#[kube(
    group = "vmoperator.microscaler.io",
    version = "v1alpha1",
    kind = "VirtualMachineImage",
    status = "VirtualMachineImageStatus"
)]
#[serde(rename_all = "camelCase")]
pub struct VirtualMachineImageSpec {
    /// Image format (e.g. "ovf")
    #[serde(rename = "type", default)]
    pub type_: String,

    /// Source the image was published from (e.g. "Content Library")
    #[serde(default)]
    pub image_source_type: String,

    /// Guest operating system type reported by the image
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub os_type: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "camelCase")]
pub struct VirtualMachineImageStatus {
    /// Observed conditions
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<Condition>,
}

impl VirtualMachineImage {
    /// Returns true when the image reports `type_` with status `True`.
    pub fn is_condition_true(&self, type_: &str) -> bool {
        self.status
            .as_ref()
            .is_some_and(|s| is_condition_true(&s.conditions, type_))
    }
}
