//! vApp property merge for OVF environment metadata

use std::collections::BTreeMap;

use vsphere_client::{ArrayUpdateOperation, VAppPropertyInfo, VAppPropertySpec, VmConfigSpec};

use crate::constants::OVF_ENVIRONMENT_TRANSPORT_GUEST_INFO;

/// Edits setting every user-configurable property whose id appears in
/// `data` to the new value. `None` when no property changes.
pub fn merged_vapp_config_spec(data: &BTreeMap<String, String>, properties: &[VAppPropertyInfo]) -> Option<VmConfigSpec> {
    let edits: Vec<VAppPropertySpec> = properties
        .iter()
        .filter(|prop| prop.user_configurable == Some(true))
        .filter_map(|prop| {
            let value = data.get(&prop.id)?;
            if *value == prop.value {
                return None;
            }
            Some(VAppPropertySpec {
                operation: ArrayUpdateOperation::Edit,
                info: VAppPropertyInfo { value: value.clone(), ..prop.clone() },
            })
        })
        .collect();

    if edits.is_empty() {
        return None;
    }
    Some(VmConfigSpec {
        property: edits,
        ovf_environment_transport: vec![OVF_ENVIRONMENT_TRANSPORT_GUEST_INFO.to_string()],
    })
}
