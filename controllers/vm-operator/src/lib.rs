//! VM Operator
//!
//! Convergence engine that drives a vSphere virtual machine toward the state
//! declared by its `VirtualMachine` resource.
//!
//! A pass reads the VM's current configuration, applies the desired power
//! state (reconfiguring, matching devices and customizing the guest before a
//! power on), projects the observed state into `VirtualMachine.status` and
//! finally attaches cluster modules and tags. Every pass is idempotent: a
//! VM that already matches its spec produces no hypervisor writes.
//!
//! # Example
//!
//! ```no_run
//! use vm_operator::{NamedNetworkProvider, ProviderConfig, Session, StaticNameservers, VmConfigArgs};
//!
//! # async fn example(
//! #     client: Box<dyn vsphere_client::VSphereClientTrait + Send + Sync>,
//! #     vm: &mut crds::VirtualMachine,
//! #     args: &VmConfigArgs,
//! # ) -> Result<(), vm_operator::ControllerError> {
//! let session = Session::new(
//!     client,
//!     Box::new(NamedNetworkProvider),
//!     Box::new(StaticNameservers(vec!["10.0.0.53".to_string()])),
//!     ProviderConfig::from_env()?,
//! );
//! session.update_virtual_machine(vm, args).await?;
//! # Ok(())
//! # }
//! ```

pub mod affinity;
pub mod config;
pub mod config_spec;
pub mod constants;
pub mod customization;
pub mod device_match;
pub mod devices;
pub mod error;
pub mod nameservers;
pub mod network;
pub mod power;
pub mod quantity;
pub mod session;
pub mod status;
pub mod template;
pub mod vapp;
pub mod volumes;

#[cfg(test)]
mod test_utils;
#[cfg(test)]
mod session_test;
#[cfg(test)]
mod template_test;

pub use config::{FeatureFlags, ProviderConfig};
pub use error::{AggregateError, ControllerError};
pub use nameservers::{ConfigMapNameservers, NameserverSource, StaticNameservers};
pub use network::{NamedNetworkProvider, NetworkInterfaceInfo, NetworkProvider};
pub use session::{Session, VmConfigArgs, VmMetadata};
