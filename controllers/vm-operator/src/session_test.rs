//! Unit tests for session module

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use crds::{
        PersistentVolumeClaimVolumeSource, VGPUDevice, VMStatusPhase, VirtualMachineAdvancedOptions,
        VirtualMachinePowerState, VirtualMachineStatus, VirtualMachineVolume, VirtualMachineVolumeStatus,
    };
    use vsphere_client::mock::{guest_with_nic, network_card, powered_off_vm, powered_on_vm};
    use vsphere_client::{
        DeviceConfigOperation, DeviceKind, Fault, MockCall, MockVSphereClient, OptionValue, VirtualDevice,
        VirtualMachineConfigSpec,
    };

    use crate::config::{FeatureFlags, ProviderConfig};
    use crate::constants::*;
    use crate::error::ControllerError;
    use crate::nameservers::NameserverSource;
    use crate::network::NamedNetworkProvider;
    use crate::session::Session;
    use crate::test_utils::*;

    const MOID: &str = "vm-1";

    struct FailingNameservers;

    #[async_trait]
    impl NameserverSource for FailingNameservers {
        async fn get_nameservers(&self) -> Result<Vec<String>, ControllerError> {
            Err(ControllerError::Nameservers("configmap not found".to_string()))
        }
    }

    fn setup_powered_off(name: &str) -> MockVSphereClient {
        let client = MockVSphereClient::new();
        client.add_vm(TEST_NAMESPACE, name, MOID, powered_off_vm(name));
        client
    }

    fn setup_powered_on(name: &str) -> MockVSphereClient {
        let client = MockVSphereClient::new();
        client.add_vm(TEST_NAMESPACE, name, MOID, powered_on_vm(name, "host-1"));
        client.add_host("host-1", "esx-1.local");
        client
    }

    fn with_cbt(vm: &mut crds::VirtualMachine, enabled: bool) {
        vm.spec.advanced_options = Some(VirtualMachineAdvancedOptions {
            change_block_tracking: Some(enabled),
            ..Default::default()
        });
    }

    fn customize_count(client: &MockVSphereClient) -> usize {
        client.calls().iter().filter(|c| matches!(c, MockCall::Customize(_))).count()
    }

    fn last_reconfigure(client: &MockVSphereClient) -> VirtualMachineConfigSpec {
        client.reconfigure_calls().pop().expect("a reconfigure call")
    }

    fn extra_config_value<'a>(spec: &'a VirtualMachineConfigSpec, key: &str) -> Option<&'a str> {
        spec.extra_config.iter().find(|opt| opt.key == key).map(|opt| opt.value.as_str())
    }

    #[tokio::test]
    async fn test_power_on_reconfigures_customizes_and_powers_on() {
        let client = setup_powered_off("vm1");
        let session = create_test_session(&client, ProviderConfig::default());
        let mut vm = create_test_vm("vm1", VirtualMachinePowerState::PoweredOn);
        vm.spec.network_interfaces = vec![create_test_interface("vm-network")];

        session.update_virtual_machine(&mut vm, &create_test_config_args()).await.unwrap();

        let calls = client.calls();
        assert_eq!(calls.len(), 3, "unexpected calls: {calls:?}");
        let MockCall::Reconfigure(spec) = &calls[0] else {
            panic!("expected reconfigure first, got {:?}", calls[0]);
        };
        assert_eq!(spec.annotation.as_deref(), Some(VC_VM_ANNOTATION));
        assert!(spec.managed_by.is_some());
        assert_eq!(spec.num_cpus, None);
        assert_eq!(spec.memory_mb, None);
        assert_eq!(spec.device_change.len(), 1);
        assert_eq!(spec.device_change[0].operation, DeviceConfigOperation::Add);
        assert_eq!(spec.device_change[0].device.key, NETWORK_INTERFACE_DEVICE_KEY_START);

        let MockCall::Customize(customization) = &calls[1] else {
            panic!("expected customize second, got {:?}", calls[1]);
        };
        assert_eq!(customization.global_ip_settings.dns_server_list, vec![TEST_NAMESERVER.to_string()]);
        assert_eq!(customization.nic_setting_map.len(), 1);
        assert_eq!(calls[2], MockCall::SetPowerState(vsphere_client::VirtualMachinePowerState::PoweredOn));

        let status = vm.status.as_ref().unwrap();
        assert_eq!(status.phase, Some(VMStatusPhase::Created));
        assert_eq!(status.power_state, Some(VirtualMachinePowerState::PoweredOn));
        assert_eq!(status.unique_id, MOID);
        let uuid = client.vm(MOID).unwrap().config.unwrap().uuid;
        assert_eq!(status.bios_uuid, uuid);
    }

    #[tokio::test]
    async fn test_converged_vm_has_no_writes() {
        let client = setup_powered_off("vm1");
        let session = create_test_session(&client, ProviderConfig::default());
        let mut vm = create_test_vm("vm1", VirtualMachinePowerState::PoweredOn);
        vm.spec.network_interfaces = vec![create_test_interface("vm-network")];
        with_cbt(&mut vm, true);
        let args = create_test_config_args();

        session.update_virtual_machine(&mut vm, &args).await.unwrap();
        client.clear_calls();

        session.update_virtual_machine(&mut vm, &args).await.unwrap();
        assert!(client.calls().is_empty(), "second pass wrote: {:?}", client.calls());
    }

    #[tokio::test]
    async fn test_power_on_reconfigure_is_idempotent_across_power_cycle() {
        let client = setup_powered_off("vm1");
        let session = create_test_session(&client, ProviderConfig::default());
        let mut vm = create_test_vm("vm1", VirtualMachinePowerState::PoweredOn);
        vm.spec.network_interfaces = vec![create_test_interface("vm-network")];
        let args = create_test_config_args();

        session.update_virtual_machine(&mut vm, &args).await.unwrap();
        assert_eq!(client.reconfigure_calls().len(), 1);

        client.update_vm(MOID, |state| state.runtime.power_state = vsphere_client::VirtualMachinePowerState::PoweredOff);
        client.clear_calls();

        session.update_virtual_machine(&mut vm, &args).await.unwrap();
        assert!(client.reconfigure_calls().is_empty(), "unexpected reconfigure: {:?}", client.reconfigure_calls());
        assert_eq!(customize_count(&client), 1);
    }

    #[tokio::test]
    async fn test_cbt_on_running_vm_invokes_fsr_once() {
        let client = setup_powered_on("vm1");
        let session = create_test_session(&client, ProviderConfig::default());
        let mut vm = create_test_vm("vm1", VirtualMachinePowerState::PoweredOn);
        with_cbt(&mut vm, true);

        session.update_virtual_machine(&mut vm, &create_test_config_args()).await.unwrap();

        let calls = client.calls();
        assert_eq!(
            calls,
            vec![
                MockCall::Reconfigure(VirtualMachineConfigSpec {
                    change_tracking_enabled: Some(true),
                    ..Default::default()
                }),
                MockCall::InvokeFsr,
            ]
        );

        let status = vm.status.as_ref().unwrap();
        assert_eq!(status.change_block_tracking, Some(true));
        assert_eq!(status.host, "esx-1.local");
    }

    #[tokio::test]
    async fn test_running_vm_without_cbt_change_is_untouched() {
        let client = setup_powered_on("vm1");
        client.update_vm(MOID, |state| {
            state.guest = Some(guest_with_nic("00:50:56:aa:bb:cc", &[("10.0.0.5", 24)]));
        });
        let session = create_test_session(&client, ProviderConfig::default());
        let mut vm = create_test_vm("vm1", VirtualMachinePowerState::PoweredOn);

        session.update_virtual_machine(&mut vm, &create_test_config_args()).await.unwrap();

        assert!(client.calls().is_empty());
        let status = vm.status.as_ref().unwrap();
        assert_eq!(status.vm_ip, "10.0.0.5");
        assert_eq!(status.network_interfaces[0].ip_addresses, vec!["10.0.0.5/24".to_string()]);
    }

    #[tokio::test]
    async fn test_power_off() {
        let client = setup_powered_on("vm1");
        let session = create_test_session(&client, ProviderConfig::default());
        let mut vm = create_test_vm("vm1", VirtualMachinePowerState::PoweredOff);

        session.update_virtual_machine(&mut vm, &create_test_config_args()).await.unwrap();

        assert_eq!(client.calls(), vec![MockCall::SetPowerState(vsphere_client::VirtualMachinePowerState::PoweredOff)]);
        assert_eq!(vm.status.unwrap().power_state, Some(VirtualMachinePowerState::PoweredOff));
    }

    #[tokio::test]
    async fn test_power_on_without_config_fails() {
        let client = setup_powered_off("vm1");
        client.update_vm(MOID, |state| {
            state.config = None;
            state.runtime.connection_state = vsphere_client::VirtualMachineConnectionState::Disconnected;
        });
        let session = create_test_session(&client, ProviderConfig::default());
        let mut vm = create_test_vm("vm1", VirtualMachinePowerState::PoweredOn);

        let err = session.update_virtual_machine(&mut vm, &create_test_config_args()).await.unwrap_err();

        assert!(matches!(err, ControllerError::ConfigUnavailable(_)));
        assert_eq!(err.to_string(), "VM config is not available, connectionState=disconnected");
        assert!(client.calls().is_empty());
    }

    #[tokio::test]
    async fn test_unknown_vm_is_an_error() {
        let client = MockVSphereClient::new();
        let session = create_test_session(&client, ProviderConfig::default());
        let mut vm = create_test_vm("missing", VirtualMachinePowerState::PoweredOn);

        let err = session.update_virtual_machine(&mut vm, &create_test_config_args()).await.unwrap_err();
        assert!(matches!(err, ControllerError::VSphere(_)));
        assert!(vm.status.is_none());
    }

    #[tokio::test]
    async fn test_unattached_volume_blocks_power_on() {
        let client = setup_powered_off("vm1");
        let session = create_test_session(&client, ProviderConfig::default());
        let mut vm = create_test_vm("vm1", VirtualMachinePowerState::PoweredOn);
        vm.spec.volumes = vec![VirtualMachineVolume {
            name: "data".to_string(),
            persistent_volume_claim: Some(PersistentVolumeClaimVolumeSource {
                claim_name: "data-pvc".to_string(),
                read_only: false,
            }),
            vsphere_volume: None,
        }];

        let err = session.update_virtual_machine(&mut vm, &create_test_config_args()).await.unwrap_err();
        assert!(matches!(err, ControllerError::VolumeStatusPending(_)));
        assert!(err.is_retryable());

        vm.status.get_or_insert_default().volumes = vec![VirtualMachineVolumeStatus {
            name: "data".to_string(),
            attached: false,
            ..Default::default()
        }];
        let err = session.update_virtual_machine(&mut vm, &create_test_config_args()).await.unwrap_err();
        assert!(matches!(err, ControllerError::VolumeNotAttached(_)));
        assert!(err.is_retryable());

        assert!(
            !client.calls().iter().any(|c| matches!(c, MockCall::SetPowerState(_))),
            "VM must not be powered on"
        );
        // The BIOS UUID is recorded even though the pass failed.
        assert!(!vm.status.unwrap().bios_uuid.is_empty());
    }

    #[tokio::test]
    async fn test_customization_bypass_annotation() {
        let client = setup_powered_off("vm1");
        let session = create_test_session(&client, ProviderConfig::default());
        let mut vm = create_test_vm("vm1", VirtualMachinePowerState::PoweredOn);
        annotate(&mut vm, VSPHERE_CUSTOMIZATION_BYPASS_KEY, VSPHERE_CUSTOMIZATION_BYPASS_DISABLE);

        session.update_virtual_machine(&mut vm, &create_test_config_args()).await.unwrap();

        assert_eq!(customize_count(&client), 0);
        assert_eq!(client.vm(MOID).unwrap().runtime.power_state, vsphere_client::VirtualMachinePowerState::PoweredOn);
    }

    #[tokio::test]
    async fn test_pending_customization_is_not_repeated() {
        let client = setup_powered_off("vm1");
        client.update_vm(MOID, |state| {
            if let Some(config) = state.config.as_mut() {
                config.extra_config.push(OptionValue::new(GOSC_PENDING_EXTRA_CONFIG_KEY, "imcf-pending"));
            }
        });
        let session = create_test_session(&client, ProviderConfig::default());
        let mut vm = create_test_vm("vm1", VirtualMachinePowerState::PoweredOn);

        session.update_virtual_machine(&mut vm, &create_test_config_args()).await.unwrap();

        assert_eq!(customize_count(&client), 0);
        assert_eq!(client.vm(MOID).unwrap().runtime.power_state, vsphere_client::VirtualMachinePowerState::PoweredOn);
    }

    #[tokio::test]
    async fn test_customization_pending_fault_is_swallowed() {
        let client = setup_powered_off("vm1");
        client.fail_customize_with(Fault::CustomizationPending);
        let session = create_test_session(&client, ProviderConfig::default());
        let mut vm = create_test_vm("vm1", VirtualMachinePowerState::PoweredOn);

        session.update_virtual_machine(&mut vm, &create_test_config_args()).await.unwrap();
        assert_eq!(client.vm(MOID).unwrap().runtime.power_state, vsphere_client::VirtualMachinePowerState::PoweredOn);
    }

    #[tokio::test]
    async fn test_customization_failure_stops_power_on() {
        let client = setup_powered_off("vm1");
        client.fail_customize_with(Fault::Other("CustomizationFault".to_string()));
        let session = create_test_session(&client, ProviderConfig::default());
        let mut vm = create_test_vm("vm1", VirtualMachinePowerState::PoweredOn);

        let err = session.update_virtual_machine(&mut vm, &create_test_config_args()).await.unwrap_err();
        assert!(matches!(err, ControllerError::VSphere(_)));
        assert!(!err.is_retryable());
        assert_eq!(client.vm(MOID).unwrap().runtime.power_state, vsphere_client::VirtualMachinePowerState::PoweredOff);
    }

    #[tokio::test]
    async fn test_reconfigure_failure_stops_power_on() {
        let client = setup_powered_off("vm1");
        client.fail_reconfigure_with("busy");
        let session = create_test_session(&client, ProviderConfig::default());
        let mut vm = create_test_vm("vm1", VirtualMachinePowerState::PoweredOn);

        assert!(session.update_virtual_machine(&mut vm, &create_test_config_args()).await.is_err());
        assert_eq!(customize_count(&client), 0);
    }

    #[tokio::test]
    async fn test_too_many_network_interfaces_is_rejected() {
        let client = setup_powered_off("vm1");
        let session = create_test_session(&client, ProviderConfig::default());
        let mut vm = create_test_vm("vm1", VirtualMachinePowerState::PoweredOn);
        vm.spec.network_interfaces = (0..=MAX_NETWORK_INTERFACES)
            .map(|i| create_test_interface(&format!("net-{i}")))
            .collect();

        let err = session.update_virtual_machine(&mut vm, &create_test_config_args()).await.unwrap_err();
        assert!(matches!(err, ControllerError::InvalidConfig(_)), "unexpected error: {err}");
        assert!(client.calls().is_empty());

        vm.spec.network_interfaces.truncate(MAX_NETWORK_INTERFACES);
        let list = session.ensure_network_interfaces(&vm).await.unwrap();
        assert_eq!(list.devices().last().map(|d| d.key), Some(PCI_DEVICE_KEY_START + 1));
    }

    #[tokio::test]
    async fn test_host_lookup_failure_is_aggregated() {
        let client = MockVSphereClient::new();
        client.add_vm(TEST_NAMESPACE, "vm1", MOID, powered_on_vm("vm1", "host-unknown"));
        let session = create_test_session(&client, ProviderConfig::default());
        let mut vm = create_test_vm("vm1", VirtualMachinePowerState::PoweredOn);
        vm.status = Some(VirtualMachineStatus { host: "esx-old".to_string(), ..Default::default() });
        annotate(&mut vm, CLUSTER_MODULE_NAME_KEY, "control-plane");
        annotate(&mut vm, PROVIDER_TAGS_ANNOTATION_KEY, "CtrlVmVmAntiAffinityTagName");

        let err = session.update_virtual_machine(&mut vm, &create_test_config_args()).await.unwrap_err();

        let ControllerError::Aggregate(aggregate) = &err else {
            panic!("expected aggregate error, got {err:?}");
        };
        assert_eq!(aggregate.errors().len(), 1);
        assert!(err.to_string().contains("host-unknown"));

        let status = vm.status.as_ref().unwrap();
        assert!(status.host.is_empty());
        assert_eq!(status.power_state, Some(VirtualMachinePowerState::PoweredOn));
        assert!(client.calls().is_empty(), "affinity must not run: {:?}", client.calls());
    }

    fn affinity_config() -> ProviderConfig {
        ProviderConfig {
            tag_info: [
                (PROVIDER_TAG_CATEGORY_NAME_KEY.to_string(), "aa-category".to_string()),
                ("CtrlVmVmAntiAffinityTagName".to_string(), "ctrl-aa-tag".to_string()),
            ]
            .into_iter()
            .collect(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_attach_tags_and_modules_is_idempotent() {
        let client = setup_powered_on("vm1");
        let session = create_test_session(&client, affinity_config());
        let mut vm = create_test_vm("vm1", VirtualMachinePowerState::PoweredOn);
        annotate(&mut vm, CLUSTER_MODULE_NAME_KEY, "control-plane");
        annotate(&mut vm, PROVIDER_TAGS_ANNOTATION_KEY, "CtrlVmVmAntiAffinityTagName");
        let mut args = create_test_config_args();
        args.resource_policy = Some(create_test_resource_policy("control-plane", "module-uuid-1"));

        session.update_virtual_machine(&mut vm, &args).await.unwrap();

        assert!(client.cluster_module_members("module-uuid-1").contains(MOID));
        assert!(client.attached_tags().contains(&(
            "ctrl-aa-tag".to_string(),
            "aa-category".to_string(),
            MOID.to_string()
        )));

        client.clear_calls();
        session.update_virtual_machine(&mut vm, &args).await.unwrap();
        assert!(
            !client.calls().iter().any(|c| matches!(c, MockCall::AddVmToClusterModule(_))),
            "membership must not be added twice"
        );
        assert_eq!(client.attached_tags().len(), 1);
    }

    #[tokio::test]
    async fn test_missing_cluster_module_is_an_error() {
        let client = setup_powered_on("vm1");
        let session = create_test_session(&client, affinity_config());
        let mut vm = create_test_vm("vm1", VirtualMachinePowerState::PoweredOn);
        annotate(&mut vm, CLUSTER_MODULE_NAME_KEY, "control-plane");
        annotate(&mut vm, PROVIDER_TAGS_ANNOTATION_KEY, "CtrlVmVmAntiAffinityTagName");

        let err = session.update_virtual_machine(&mut vm, &create_test_config_args()).await.unwrap_err();
        assert!(matches!(err, ControllerError::ClusterModuleNotFound(ref group) if group == "control-plane"));

        let mut args = create_test_config_args();
        args.resource_policy = Some(create_test_resource_policy("workers", "module-uuid-2"));
        let err = session.update_virtual_machine(&mut vm, &args).await.unwrap_err();
        assert!(matches!(err, ControllerError::ClusterModuleNotFound(_)));
    }

    #[tokio::test]
    async fn test_single_affinity_annotation_is_ignored() {
        let client = setup_powered_on("vm1");
        let session = create_test_session(&client, affinity_config());
        let mut vm = create_test_vm("vm1", VirtualMachinePowerState::PoweredOn);
        annotate(&mut vm, CLUSTER_MODULE_NAME_KEY, "control-plane");

        session.update_virtual_machine(&mut vm, &create_test_config_args()).await.unwrap();
        assert!(client.calls().is_empty());
    }

    #[tokio::test]
    async fn test_no_interfaces_keeps_existing_cards() {
        let client = setup_powered_off("vm1");
        client.update_vm(MOID, |state| {
            if let Some(config) = state.config.as_mut() {
                config.hardware.device = vec![
                    VirtualDevice::ethernet_card(4000, network_card("00:50:56:00:00:01", "vm-network")),
                    VirtualDevice::disk(2000, 10 * 1024 * 1024 * 1024),
                ];
            }
        });
        let session = create_test_session(&client, ProviderConfig::default());
        let mut vm = create_test_vm("vm1", VirtualMachinePowerState::PoweredOn);

        session.update_virtual_machine(&mut vm, &create_test_config_args()).await.unwrap();

        let spec = last_reconfigure(&client);
        assert!(spec.device_change.is_empty(), "no device changes expected: {:?}", spec.device_change);

        let customization = client
            .calls()
            .into_iter()
            .find_map(|c| match c {
                MockCall::Customize(spec) => Some(spec),
                _ => None,
            })
            .unwrap();
        assert_eq!(customization.nic_setting_map.len(), 1);
        assert_eq!(customization.nic_setting_map[0].mac_address, "00:50:56:00:00:01");
    }

    #[tokio::test]
    async fn test_interface_change_removes_before_add() {
        let client = setup_powered_off("vm1");
        client.update_vm(MOID, |state| {
            if let Some(config) = state.config.as_mut() {
                config.hardware.device =
                    vec![VirtualDevice::ethernet_card(4000, network_card("00:50:56:00:00:01", "old-network"))];
            }
        });
        let session = create_test_session(&client, ProviderConfig::default());
        let mut vm = create_test_vm("vm1", VirtualMachinePowerState::PoweredOn);
        vm.spec.network_interfaces = vec![create_test_interface("new-network")];

        session.update_virtual_machine(&mut vm, &create_test_config_args()).await.unwrap();

        let spec = last_reconfigure(&client);
        let ops: Vec<_> = spec.device_change.iter().map(|c| (c.operation, c.device.key)).collect();
        assert_eq!(
            ops,
            vec![
                (DeviceConfigOperation::Remove, 4000),
                (DeviceConfigOperation::Add, NETWORK_INTERFACE_DEVICE_KEY_START),
            ]
        );
    }

    #[tokio::test]
    async fn test_passthrough_devices_follow_feature_flag() {
        let mut args = create_test_config_args();
        args.vm_class.spec.hardware.devices.vgpu_devices = vec![VGPUDevice { profile_name: "grid_t4-4q".to_string() }];

        let client = setup_powered_off("vm1");
        let session = create_test_session(&client, ProviderConfig::default());
        let mut vm = create_test_vm("vm1", VirtualMachinePowerState::PoweredOn);
        session.update_virtual_machine(&mut vm, &args).await.unwrap();

        let spec = last_reconfigure(&client);
        assert!(spec.device_change.is_empty());
        assert_eq!(extra_config_value(&spec, PCI_PASSTHRU_MMIO_EXTRA_CONFIG_KEY), None);

        let client = setup_powered_off("vm1");
        let config = ProviderConfig {
            features: FeatureFlags { pci_passthrough_devices: true, ..Default::default() },
            ..Default::default()
        };
        let session = create_test_session(&client, config);
        let mut vm = create_test_vm("vm1", VirtualMachinePowerState::PoweredOn);
        session.update_virtual_machine(&mut vm, &args).await.unwrap();

        let spec = last_reconfigure(&client);
        assert_eq!(spec.device_change.len(), 1);
        assert_eq!(spec.device_change[0].operation, DeviceConfigOperation::Add);
        assert_eq!(spec.device_change[0].device.key, PCI_DEVICE_KEY_START);
        assert!(matches!(spec.device_change[0].device.kind, DeviceKind::PciPassthrough(_)));
        assert_eq!(extra_config_value(&spec, PCI_PASSTHRU_MMIO_EXTRA_CONFIG_KEY), Some(EXTRA_CONFIG_TRUE));
        assert_eq!(
            extra_config_value(&spec, PCI_PASSTHRU_MMIO_SIZE_EXTRA_CONFIG_KEY),
            Some(PCI_PASSTHRU_MMIO_SIZE_DEFAULT)
        );
    }

    #[tokio::test]
    async fn test_metadata_templates_rendered_when_enabled() {
        let mut args = create_test_config_args();
        args.vm_metadata = Some(create_test_metadata(&[
            ("guestinfo.dns", "{{ index .NameServers 0 }}"),
            ("guestinfo.broken", "{{ .NameServers"),
            ("guestinfo.plain", "plain"),
        ]));

        let client = setup_powered_off("vm1");
        let config = ProviderConfig {
            features: FeatureFlags { metadata_templating: true, ..Default::default() },
            ..Default::default()
        };
        let session = create_test_session(&client, config);
        let mut vm = create_test_vm("vm1", VirtualMachinePowerState::PoweredOn);
        session.update_virtual_machine(&mut vm, &args).await.unwrap();

        let spec = last_reconfigure(&client);
        assert_eq!(extra_config_value(&spec, "guestinfo.dns"), Some(TEST_NAMESERVER));
        assert_eq!(extra_config_value(&spec, "guestinfo.broken"), Some("{{ .NameServers"));
        assert_eq!(extra_config_value(&spec, "guestinfo.plain"), Some("plain"));

        let client = setup_powered_off("vm1");
        let session = create_test_session(&client, ProviderConfig::default());
        let mut vm = create_test_vm("vm1", VirtualMachinePowerState::PoweredOn);
        session.update_virtual_machine(&mut vm, &args).await.unwrap();

        let spec = last_reconfigure(&client);
        assert_eq!(extra_config_value(&spec, "guestinfo.dns"), Some("{{ index .NameServers 0 }}"));
    }

    #[tokio::test]
    async fn test_nameserver_failure_is_logged_only() {
        let client = setup_powered_off("vm1");
        let session = Session::new(
            Box::new(client.clone()),
            Box::new(NamedNetworkProvider),
            Box::new(FailingNameservers),
            ProviderConfig::default(),
        );
        let mut vm = create_test_vm("vm1", VirtualMachinePowerState::PoweredOn);

        session.update_virtual_machine(&mut vm, &create_test_config_args()).await.unwrap();

        let customization = client
            .calls()
            .into_iter()
            .find_map(|c| match c {
                MockCall::Customize(spec) => Some(spec),
                _ => None,
            })
            .unwrap();
        assert!(customization.global_ip_settings.dns_server_list.is_empty());
        assert_eq!(client.vm(MOID).unwrap().runtime.power_state, vsphere_client::VirtualMachinePowerState::PoweredOn);
    }
}
