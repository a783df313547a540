//! Well-known annotation keys, extra-config keys and marker values.

/// Annotation stamped on every VM this engine manages
pub const VC_VM_ANNOTATION: &str = "Virtual Machine managed by the vSphere Virtual Machine service";

/// Extension key of the managed-by marker
pub const MANAGED_BY_EXTENSION_KEY: &str = "com.vmware.vcenter.wcp";
/// Managed entity type of the managed-by marker
pub const MANAGED_BY_TYPE: &str = "VirtualMachine";

/// Extra-config boolean spellings
pub const EXTRA_CONFIG_TRUE: &str = "TRUE";

/// Guest metadata keys carried in extra-config must use this prefix
pub const EXTRA_CONFIG_GUEST_INFO_PREFIX: &str = "guestinfo.";

/// Set by the hypervisor while a customization package waits for the guest
pub const GOSC_PENDING_EXTRA_CONFIG_KEY: &str = "tools.deployPkg.fileName";

/// Annotation controlling guest customization
pub const VSPHERE_CUSTOMIZATION_BYPASS_KEY: &str = "vsphere-customization";
/// Value of [`VSPHERE_CUSTOMIZATION_BYPASS_KEY`] that disables customization
pub const VSPHERE_CUSTOMIZATION_BYPASS_DISABLE: &str = "disable";

/// Annotation overriding the 64-bit MMIO window size, in GB
pub const PCI_PASSTHRU_MMIO_OVERRIDE_ANNOTATION: &str = "vmoperator.vmware.com/pci-passthru-64bit-mmio-size";
pub const PCI_PASSTHRU_MMIO_EXTRA_CONFIG_KEY: &str = "pciPassthru.use64bitMMIO";
pub const PCI_PASSTHRU_MMIO_SIZE_EXTRA_CONFIG_KEY: &str = "pciPassthru.64bitMMIOSizeGB";
pub const PCI_PASSTHRU_MMIO_SIZE_DEFAULT: &str = "512";

/// Power the VM off instead of migrating it during host maintenance
pub const MM_POWER_OFF_VM_EXTRA_CONFIG_KEY: &str = "maintenance.vm.evacuation.poweroff";

/// Legacy cloud-init handshake key for v1alpha1-compatible images
pub const VM_OPERATOR_V1ALPHA1_EXTRA_CONFIG_KEY: &str = "guestinfo.vmservice.defer-cloud-init";
pub const VM_OPERATOR_V1ALPHA1_CONFIG_READY: &str = "ready";
pub const VM_OPERATOR_V1ALPHA1_CONFIG_ENABLED: &str = "enabled";

/// OVF environment transport advertised on merged vApp specs
pub const OVF_ENVIRONMENT_TRANSPORT_GUEST_INFO: &str = "com.vmware.guestInfo";

/// Annotations enabling anti-affinity enforcement
pub const CLUSTER_MODULE_NAME_KEY: &str = "vsphere-cluster-module-group";
pub const PROVIDER_TAGS_ANNOTATION_KEY: &str = "vsphere-tag";
/// Provider tag table key holding the anti-affinity tag category
pub const PROVIDER_TAG_CATEGORY_NAME_KEY: &str = "CtrlVmVmAATagCategoryName";

/// First placeholder device key for network interfaces; decremented per interface
pub const NETWORK_INTERFACE_DEVICE_KEY_START: i32 = -100;
/// First placeholder device key for PCI passthrough devices; decremented per device
pub const PCI_DEVICE_KEY_START: i32 = -200;
/// Interfaces that fit below the network key range before it reaches the PCI range
pub const MAX_NETWORK_INTERFACES: usize = NETWORK_INTERFACE_DEVICE_KEY_START.abs_diff(PCI_DEVICE_KEY_START) as usize;

/// Capacity resource name used by vSphere volumes
pub const EPHEMERAL_STORAGE: &str = "ephemeral-storage";
