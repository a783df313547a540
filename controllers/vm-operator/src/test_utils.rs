//! Test utilities for unit testing the convergence engine
//!
//! Builders for the resources a pass reads and a session wired to a
//! `MockVSphereClient`.

use std::collections::BTreeMap;

use crds::*;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use vsphere_client::MockVSphereClient;

use crate::config::ProviderConfig;
use crate::nameservers::StaticNameservers;
use crate::network::NamedNetworkProvider;
use crate::session::{Session, VmConfigArgs, VmMetadata};

pub const TEST_NAMESPACE: &str = "default";
pub const TEST_NAMESERVER: &str = "10.0.0.53";

/// Helper to create a test VirtualMachine
pub fn create_test_vm(name: &str, power_state: VirtualMachinePowerState) -> VirtualMachine {
    VirtualMachine {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            namespace: Some(TEST_NAMESPACE.to_string()),
            ..Default::default()
        },
        spec: VirtualMachineSpec {
            image_name: "ubuntu-22.04".to_string(),
            class_name: "best-effort-small".to_string(),
            power_state,
            ..Default::default()
        },
        status: None,
    }
}

/// Adds an annotation to `vm`
pub fn annotate(vm: &mut VirtualMachine, key: &str, value: &str) {
    vm.metadata
        .annotations
        .get_or_insert_with(BTreeMap::new)
        .insert(key.to_string(), value.to_string());
}

/// A network interface on a standard port group
pub fn create_test_interface(network_name: &str) -> VirtualMachineNetworkInterface {
    VirtualMachineNetworkInterface {
        network_type: "vsphere-distributed".to_string(),
        network_name: network_name.to_string(),
        ethernet_card_type: None,
    }
}

/// Helper to create a test VirtualMachineClass matching the mock VM's 2 vCPUs and 2 GiB
pub fn create_test_vm_class() -> VirtualMachineClass {
    VirtualMachineClass::new(
        "best-effort-small",
        VirtualMachineClassSpec {
            hardware: VirtualMachineClassHardware {
                cpus: 2,
                memory: "2Gi".to_string(),
                ..Default::default()
            },
            ..Default::default()
        },
    )
}

/// Helper to create a test VirtualMachineImage, optionally v1alpha1-compatible
pub fn create_test_vm_image(v1alpha1_compatible: bool) -> VirtualMachineImage {
    let mut image = VirtualMachineImage::new(
        "ubuntu-22.04",
        VirtualMachineImageSpec {
            type_: "ovf".to_string(),
            image_source_type: "Content Library".to_string(),
            os_type: Some("ubuntu64Guest".to_string()),
        },
    );
    if v1alpha1_compatible {
        image.status = Some(VirtualMachineImageStatus {
            conditions: vec![Condition::true_condition(VIRTUAL_MACHINE_IMAGE_V1ALPHA1_COMPATIBLE_CONDITION)],
        });
    }
    image
}

/// Helper to create a test resource policy with one cluster module
pub fn create_test_resource_policy(group_name: &str, module_uuid: &str) -> VirtualMachineSetResourcePolicy {
    let mut policy = VirtualMachineSetResourcePolicy::new(
        "policy",
        VirtualMachineSetResourcePolicySpec {
            cluster_module: vec![ClusterModuleSpec { group_name: group_name.to_string() }],
            ..Default::default()
        },
    );
    policy.metadata.namespace = Some(TEST_NAMESPACE.to_string());
    policy.status = Some(VirtualMachineSetResourcePolicyStatus {
        cluster_modules: vec![ClusterModuleStatus {
            group_name: group_name.to_string(),
            module_uuid: module_uuid.to_string(),
            cluster_moid: "domain-c8".to_string(),
        }],
    });
    policy
}

/// Extra-config metadata with the given entries
pub fn create_test_metadata(entries: &[(&str, &str)]) -> VmMetadata {
    VmMetadata {
        data: entries.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect(),
        transport: VirtualMachineMetadataTransport::ExtraConfig,
    }
}

/// Config args with the test class and no image, metadata or policy
pub fn create_test_config_args() -> VmConfigArgs {
    VmConfigArgs {
        vm_class: create_test_vm_class(),
        vm_image: None,
        vm_metadata: None,
        resource_policy: None,
    }
}

/// A session backed by `client`, a clone sharing its state
pub fn create_test_session(client: &MockVSphereClient, config: ProviderConfig) -> Session {
    Session::new(
        Box::new(client.clone()),
        Box::new(NamedNetworkProvider),
        Box::new(StaticNameservers(vec![TEST_NAMESERVER.to_string()])),
        config,
    )
}
